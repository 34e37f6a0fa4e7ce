//! Implementation of `namedsem list` and `namedsem rm`.

use crate::cli::{ListArgs, RmArgs};
use crate::config::Config;
use crate::error::{Result, SemError};
use crate::records::{Record, RecordLog};
use crate::sem::{self, SemId, Tag};
use crate::system;
use std::path::Path;
use tracing::debug;

pub fn cmd_list(args: ListArgs, config: &Config) -> Result<()> {
    match args.log {
        Some(path) => {
            let log = RecordLog::new(path);
            for record in filtered(&log, args.tag)? {
                println!("[{}] key:{:x} semid:{}", record.tag, record.key, record.id);
            }
        }
        None => {
            let entries = system::list()?;
            println!(
                "{:>12} {:>8} {:>6} {:>6} {:>8}",
                "key", "id", "perms", "nsems", "uid"
            );
            for entry in entries {
                println!(
                    "{:>12x} {:>8} {:>6o} {:>6} {:>8}{}",
                    entry.key,
                    entry.id,
                    entry.perms,
                    entry.nsems,
                    entry.uid,
                    if entry.is_ours(config.sem_mode) { "  *" } else { "" }
                );
            }
        }
    }
    Ok(())
}

pub fn cmd_rm(args: RmArgs, config: &Config) -> Result<()> {
    if args.target == "all" {
        let removed = system::remove_all_owned(config.sem_mode)?;
        println!("Removed {} semaphore(s).", removed.len());
        return Ok(());
    }

    let path = Path::new(&args.target);
    if path.is_file() {
        let removed = remove_logged(&RecordLog::new(path), args.tag)?;
        println!("Removed {} semaphore(s).", removed);
        return Ok(());
    }

    let id: SemId = args.target.parse().map_err(|_| {
        SemError::UserError(format!(
            "'{}' is not a semaphore id, a record log, or 'all'",
            args.target
        ))
    })?;
    sem::remove(id)
}

fn filtered(log: &RecordLog, tag: Option<Tag>) -> Result<Vec<Record>> {
    Ok(log
        .read_all()?
        .into_iter()
        .filter(|record| tag.is_none_or(|tag| record.tag == tag))
        .collect())
}

/// Remove every semaphore named in `log`, emptying it when no tag filter is given.
///
/// Records whose semaphore is already gone are skipped.
fn remove_logged(log: &RecordLog, tag: Option<Tag>) -> Result<usize> {
    let mut removed = 0;
    for record in filtered(log, tag)? {
        match sem::remove(record.id) {
            Ok(()) => removed += 1,
            Err(e) => debug!(id = %record.id, error = %e, "record already gone"),
        }
    }

    if tag.is_none() {
        log.truncate()?;
    }
    Ok(removed)
}
