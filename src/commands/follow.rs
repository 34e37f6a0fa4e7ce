//! Implementation of the `namedsem follow` command.
//!
//! A refresh-based table of the semaphores that exist for a backing file,
//! one row per tag. Like the rest of the CLI it avoids a TUI stack: the
//! screen is cleared with ANSI escapes and keys are read from stdin on a
//! helper thread, so they arrive once the terminal hands over a line.

use crate::cli::FollowArgs;
use crate::config::{Config, parse_tags};
use crate::error::Result;
use crate::sem::{self, Mode, SemId, SemStatus, Tag};
use chrono::Utc;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
struct Row {
    tag: Tag,
    status: SemStatus,
}

/// Selection and queued command, driven by keys between refreshes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct FollowView {
    selected: usize,
    pending: Option<Mode>,
    last_result: Option<String>,
}

impl FollowView {
    /// Apply one key. `rows` is the number of rows currently shown.
    fn handle_key(&mut self, key: char, rows: usize) {
        match key {
            'j' if self.selected + 1 < rows => self.selected += 1,
            'k' => self.selected = self.selected.saturating_sub(1),
            ' ' => self.pending = Some(Mode::Relax),
            'h' => self.pending = Some(Mode::Lock),
            'l' => self.pending = Some(Mode::Unlock),
            _ => {}
        }
    }

    fn clamp(&mut self, rows: usize) {
        if self.selected >= rows {
            self.selected = rows.saturating_sub(1);
        }
    }
}

pub fn cmd_follow(args: FollowArgs, config: &Config) -> Result<()> {
    let tags = match &args.tags {
        Some(tags) => parse_tags(tags)?,
        None => config.tags()?,
    };
    let interval = Duration::from_millis(args.interval_ms.unwrap_or(config.follow_interval_ms).max(50));
    let keys = (!args.once).then(spawn_key_reader);

    let mut view = FollowView::default();

    loop {
        let mut ids = existing(&args.path, &tags);
        view.clamp(ids.len());

        if let Some(mode) = view.pending.take()
            && let Some(&(tag, id)) = ids.get(view.selected)
        {
            // Never block the display for longer than one refresh.
            let timeout_ms = interval.as_millis().min(u128::from(u64::MAX)) as u64;
            let ok = sem::apply(id, mode, timeout_ms);
            debug!(%id, %mode, ok, "follow command applied");
            view.last_result = Some(format!(
                "{} on [{}] {}",
                mode,
                tag,
                if ok { "done" } else { "had no effect" }
            ));
            ids = existing(&args.path, &tags);
            view.clamp(ids.len());
        }

        let rows = snapshot(&ids);

        if args.clear && !args.once {
            clear_screen();
        }
        render(&args.path, &rows, &view, args.once);
        let _ = io::stdout().flush();

        if args.once {
            break;
        }

        thread::sleep(interval);

        if let Some(keys) = &keys {
            for key in keys.try_iter() {
                view.handle_key(key, rows.len());
            }
        }
    }

    Ok(())
}

/// Tags in `tags` that currently have a semaphore, without opening them.
fn existing(path: &Path, tags: &[Tag]) -> Vec<(Tag, SemId)> {
    tags.iter()
        .filter_map(|&tag| sem::find(path, tag).ok().map(|id| (tag, id)))
        .collect()
}

/// Sets removed since [`existing`] ran are dropped from the table.
fn snapshot(ids: &[(Tag, SemId)]) -> Vec<Row> {
    ids.iter()
        .filter_map(|&(tag, id)| sem::status(id).ok().map(|status| Row { tag, status }))
        .collect()
}

fn render(path: &Path, rows: &[Row], view: &FollowView, once: bool) {
    if once {
        println!("namedsem follow");
    } else {
        println!("namedsem follow  (j/k select, space relax, h lock, l unlock, then Enter; Ctrl+C to exit)");
    }
    println!("Updated: {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Path:    {}", path.display());
    println!();

    if rows.is_empty() {
        println!("No semaphores.");
        return;
    }

    println!(
        "  {:3} {:>8} {:>7} {:>8} {:>8} {:>8}",
        "tag", "id", "value", "waiting", "zero", "openers"
    );
    for (index, row) in rows.iter().enumerate() {
        let marker = if index == view.selected && !once { '>' } else { ' ' };
        println!(
            "{} {:3} {:>8} {:>7} {:>8} {:>8} {:>8}",
            marker,
            row.tag,
            row.status.id,
            row.status.value,
            row.status.waiting_increase,
            row.status.waiting_zero,
            row.status.openers
        );
    }

    if let Some(result) = &view.last_result {
        println!();
        println!("Last: {}", result);
    }
}

/// Forward each stdin character to the returned channel until EOF.
fn spawn_key_reader() -> Receiver<char> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for byte in io::stdin().lock().bytes() {
            let Ok(byte) = byte else { break };
            if byte == b'\n' || byte == b'\r' {
                continue;
            }
            if tx.send(char::from(byte)).is_err() {
                break;
            }
        }
    });
    rx
}

fn clear_screen() {
    // ANSI: clear screen + move cursor to top-left.
    print!("\x1b[2J\x1b[H");
    let _ = io::stdout().flush();
}
