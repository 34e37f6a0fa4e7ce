//! CLI argument parsing for namedsem.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use crate::sem::{QueryCode, SemId, Tag};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// namedsem: counting semaphores shared between unrelated processes.
///
/// A semaphore is named by a file path and a one-character tag. Commands
/// that operate on a semaphore open it (creating it with value 0 if
/// needed), act, and close it again; the semaphore is destroyed when its
/// last opener closes.
#[derive(Parser, Debug)]
#[command(name = "namedsem")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (YAML). Defaults to $NAMEDSEM_CONFIG.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log lifecycle details to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for namedsem.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a semaphore with an initial value.
    ///
    /// Fails if one already exists for the path and tag. Prints the id.
    Create(CreateArgs),

    /// Open a semaphore, print its id and value, then close it.
    ///
    /// Creates it with --init if it does not exist yet.
    Open(OpenArgs),

    /// Remove a semaphore regardless of how many processes have it open.
    Delete(SemArgs),

    /// Decrement the semaphore, waiting at most TIMEOUT_MS (0 waits forever).
    #[command(alias = "p")]
    Lock(LockArgs),

    /// Increment the semaphore.
    #[command(alias = "v")]
    Unlock(UnlockArgs),

    /// Wake every process currently waiting on the semaphore.
    Relax(SemArgs),

    /// Read one attribute of a semaphore by id.
    ///
    /// Codes: v value, p last pid, n waiting to decrement, z waiting for zero,
    /// o last operation time, c last change time, r registered openers.
    Query(QueryArgs),

    /// Show every attribute of a semaphore without opening it.
    Status(StatusArgs),

    /// Live table of the semaphores for a path.
    ///
    /// Type j/k to move the selection, space to relax, h to lock and l to
    /// unlock the selected semaphore, then Enter. The command is applied on
    /// the next refresh.
    Follow(FollowArgs),

    /// List semaphores from a record log, or every semaphore on the system.
    #[command(alias = "ls")]
    List(ListArgs),

    /// Remove semaphores by id, from a record log, or `all` of ours.
    Rm(RmArgs),
}

/// A semaphore named by path and tag.
#[derive(Parser, Debug)]
pub struct SemArgs {
    /// Backing file path.
    pub path: PathBuf,

    /// Tag character (only the first character is used).
    pub tag: Tag,
}

/// Arguments for the `create` command.
#[derive(Parser, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub sem: SemArgs,

    /// Initial value.
    #[arg(allow_negative_numbers = true)]
    pub init: i32,
}

/// Arguments for the `open` command.
#[derive(Parser, Debug)]
pub struct OpenArgs {
    #[command(flatten)]
    pub sem: SemArgs,

    /// Initial value if the semaphore is created.
    #[arg(long, default_value_t = 0)]
    pub init: i32,

    /// Keep the semaphore open this long before closing it.
    #[arg(long, default_value_t = 0)]
    pub hold_ms: u64,
}

/// Arguments for the `lock` command.
#[derive(Parser, Debug)]
pub struct LockArgs {
    #[command(flatten)]
    pub sem: SemArgs,

    /// Give up after this many milliseconds (0 waits forever).
    #[arg(default_value_t = 0)]
    pub timeout_ms: u64,

    /// Undo the decrement automatically if this process dies.
    #[arg(long)]
    pub undo: bool,
}

/// Arguments for the `unlock` command.
#[derive(Parser, Debug)]
pub struct UnlockArgs {
    #[command(flatten)]
    pub sem: SemArgs,

    /// Undo the increment automatically if this process dies.
    #[arg(long)]
    pub undo: bool,
}

/// Arguments for the `query` command.
#[derive(Parser, Debug)]
pub struct QueryArgs {
    /// Semaphore id.
    pub id: SemId,

    /// Query code (v, p, n, z, o, c, r).
    pub code: QueryCode,
}

/// Arguments for the `status` command.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub sem: SemArgs,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `follow` command.
#[derive(Parser, Debug)]
pub struct FollowArgs {
    /// Backing file path.
    pub path: PathBuf,

    /// Tags to show, as one string (default from config: a-z).
    pub tags: Option<String>,

    /// Refresh interval in milliseconds (default from config).
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Render once and exit.
    #[arg(long)]
    pub once: bool,

    /// Clear the screen between refreshes.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub clear: bool,
}

/// Arguments for the `list` command.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Record log to read. Without it, lists every semaphore on the system.
    pub log: Option<PathBuf>,

    /// Only show records with this tag.
    #[arg(long)]
    pub tag: Option<Tag>,
}

/// Arguments for the `rm` command.
#[derive(Parser, Debug)]
pub struct RmArgs {
    /// A semaphore id, `all`, or a record log file.
    pub target: String,

    /// With a record log, only remove records with this tag.
    #[arg(long)]
    pub tag: Option<Tag>,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
