//! Named semaphores over System V semaphore sets.
//!
//! A semaphore is named by a backing file and a one-character tag, which
//! derive the key every process uses to find the same kernel object.
//!
//! # Counters
//!
//! Each set holds exactly three counters ([`Counter`]):
//! - `Value`: the count callers lock and unlock
//! - `OpenCount`: starts at [`BIGCOUNT`], one slot taken per opener
//! - `Lock`: guards creation and close against each other
//!
//! # Layers
//!
//! - [`key`]: path and tag to key
//! - [`executor`]: atomic operation lists and control calls
//! - [`lifecycle`]: create / open / close / remove
//! - [`query`]: read-only introspection
//! - [`timeout`]: bounded adjustments of the value
//! - [`facade`]: command tokens (`-`, `-,`, `+`, `+,`, `+*`)

pub mod executor;
pub mod facade;
mod interrupt;
pub mod key;
pub mod lifecycle;
pub mod query;
pub mod timeout;
mod types;

/// Initial opener count. Back at this value means every opener has left.
pub const BIGCOUNT: i32 = 10000;

/// Number of counters in every set.
pub const NSEMS: nix::libc::c_int = 3;

/// Default permission bits for new sets.
pub const DEFAULT_SEM_MODE: u32 = 0o777;

/// Default bound on creation retries.
pub const DEFAULT_CREATE_ATTEMPTS: u32 = 8;

// Re-export public API
pub use facade::{Mode, apply, run};
pub use key::derive_key;
pub use lifecycle::{CloseOutcome, Options, close, create, exists, find, open, remove};
pub use query::{QueryCode, SemStatus, query, status};
pub use timeout::adjust;
pub use types::{Counter, Key, KernelError, SemId, SemOp, Tag};
