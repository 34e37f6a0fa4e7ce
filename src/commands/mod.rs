//! Command implementations for namedsem.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Commands that act on a semaphore open it, act, and
//! close it again, so a semaphore only outlives a command while some other
//! process holds it open.

mod admin;
mod follow;

use crate::cli::{Command, CreateArgs, LockArgs, OpenArgs, QueryArgs, SemArgs, StatusArgs, UnlockArgs};
use crate::config::Config;
use crate::error::{Result, SemError};
use crate::sem::{self, Mode, Options, QueryCode, SemId, SemStatus};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Dispatch a command to its implementation.
pub fn dispatch(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Create(args) => cmd_create(args, config),
        Command::Open(args) => cmd_open(args, config),
        Command::Delete(args) => cmd_delete(args, config),
        Command::Lock(args) => cmd_lock(args, config),
        Command::Unlock(args) => cmd_unlock(args, config),
        Command::Relax(args) => cmd_relax(args, config),
        Command::Query(args) => cmd_query(args),
        Command::Status(args) => cmd_status(args),
        Command::Follow(args) => follow::cmd_follow(args, config),
        Command::List(args) => admin::cmd_list(args, config),
        Command::Rm(args) => admin::cmd_rm(args, config),
    }
}

fn cmd_create(args: CreateArgs, config: &Config) -> Result<()> {
    let id = sem::create(&args.sem.path, args.sem.tag, args.init, &Options::from(config))?;
    println!("{}", id);
    Ok(())
}

fn cmd_open(args: OpenArgs, config: &Config) -> Result<()> {
    let id = open_semaphore(&args.sem, args.init, config)?;

    let result = sem::query(id, QueryCode::Value).map(|value| {
        println!("{} {}", id, value);
        if args.hold_ms > 0 {
            thread::sleep(Duration::from_millis(args.hold_ms));
        }
    });

    let closed = sem::close(id);
    result?;
    closed?;
    Ok(())
}

fn cmd_delete(args: SemArgs, config: &Config) -> Result<()> {
    let id = sem::open(&args.path, args.tag, 0, &Options::from(config), None)?;
    sem::remove(id)
}

fn cmd_lock(args: LockArgs, config: &Config) -> Result<()> {
    let mode = if args.undo { Mode::LockUndo } else { Mode::Lock };
    run_command(&args.sem, mode, args.timeout_ms, config)
}

fn cmd_unlock(args: UnlockArgs, config: &Config) -> Result<()> {
    let mode = if args.undo { Mode::UnlockUndo } else { Mode::Unlock };
    run_command(&args.sem, mode, 0, config)
}

fn cmd_relax(args: SemArgs, config: &Config) -> Result<()> {
    match run_command(&args, Mode::Relax, 0, config) {
        Err(SemError::NoOperationDefined) => {
            println!("No waiters.");
            Ok(())
        }
        other => other,
    }
}

fn cmd_query(args: QueryArgs) -> Result<()> {
    let value = sem::query(args.id, args.code)?;
    println!("{}", value);
    Ok(())
}

fn cmd_status(args: StatusArgs) -> Result<()> {
    let id = sem::find(&args.sem.path, args.sem.tag)?;
    let status = sem::status(id)?;

    if args.json {
        let json = serde_json::to_string_pretty(&status)
            .map_err(|e| SemError::UserError(format!("failed to serialize status: {}", e)))?;
        println!("{}", json);
    } else {
        print_status(&status);
    }
    Ok(())
}

fn print_status(status: &SemStatus) {
    let time = |t: Option<chrono::DateTime<chrono::Utc>>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string())
    };

    println!("id:               {}", status.id);
    println!("value:            {}", status.value);
    println!("last pid:         {}", status.pid);
    println!("waiting to lock:  {}", status.waiting_increase);
    println!("waiting for zero: {}", status.waiting_zero);
    println!("openers:          {}", status.openers);
    println!("last operation:   {}", time(status.last_operation));
    println!("last change:      {}", time(status.last_change));
}

/// Open for a single command, recording the creation if this call made it.
fn open_semaphore(args: &SemArgs, init: i32, config: &Config) -> Result<SemId> {
    let log = config.record_log_for(&args.path);
    sem::open(&args.path, args.tag, init, &Options::from(config), Some(&log))
}

/// Open, run `mode`, close.
fn run_command(args: &SemArgs, mode: Mode, timeout_ms: u64, config: &Config) -> Result<()> {
    let id = open_semaphore(args, 0, config)?;
    let result = sem::run(id, mode, timeout_ms);

    // A timed-out safe lock has already given up our opener slot.
    if let Err(e) = &result
        && e.is_timeout()
        && mode.is_safe()
    {
        debug!(%id, "safe lock timed out; skipping close");
        return result;
    }

    let closed = sem::close(id);
    result?;
    closed?;
    Ok(())
}
