//! Short command tokens mapped onto semaphore adjustments.

use super::query::{QueryCode, query};
use super::timeout::adjust;
use super::types::SemId;
use crate::error::{Result, SemError};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// A single user-level semaphore command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Decrement by one, blocking. `-` or `p`.
    Lock,
    /// Decrement by one with undo. `-,` or `p,`.
    LockUndo,
    /// Increment by one. `+` or `v`.
    Unlock,
    /// Increment by one with undo. `+,` or `v,`.
    UnlockUndo,
    /// Wake every current waiter. `+*` or `v*`.
    Relax,
}

impl Mode {
    pub fn token(self) -> &'static str {
        match self {
            Mode::Lock => "-",
            Mode::LockUndo => "-,",
            Mode::Unlock => "+",
            Mode::UnlockUndo => "+,",
            Mode::Relax => "+*",
        }
    }

    /// True if the adjustment is registered for undo.
    pub fn is_safe(self) -> bool {
        matches!(self, Mode::LockUndo | Mode::UnlockUndo)
    }
}

impl FromStr for Mode {
    type Err = SemError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "-" | "p" | "lock" => Ok(Mode::Lock),
            "-," | "p," | "lock-with-undo" => Ok(Mode::LockUndo),
            "+" | "v" | "unlock" => Ok(Mode::Unlock),
            "+," | "v," | "unlock-with-undo" => Ok(Mode::UnlockUndo),
            "+*" | "v*" | "relax" => Ok(Mode::Relax),
            other => Err(SemError::InvalidMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Run `mode` against `id`. Only the lock modes honor `timeout_ms`.
///
/// `Relax` reads the waiter count and then adds exactly that much, so
/// waiters arriving after the read are not woken by this call.
pub fn run(id: SemId, mode: Mode, timeout_ms: u64) -> Result<()> {
    debug!(%id, %mode, timeout_ms, "semaphore command");
    match mode {
        Mode::Lock => adjust(id, -1, timeout_ms, false),
        Mode::LockUndo => adjust(id, -1, timeout_ms, true),
        Mode::Unlock => adjust(id, 1, 0, false),
        Mode::UnlockUndo => adjust(id, 1, 0, true),
        Mode::Relax => {
            let waiting = query(id, QueryCode::WaitingIncrease).map_err(|_| SemError::OperationFailed)?;
            let waiting = i32::try_from(waiting).map_err(|_| SemError::OperationFailed)?;
            adjust(id, waiting, 0, false)
        }
    }
}

/// Run `mode` against `id`, reporting only whether it took effect.
///
/// A relax with nobody waiting has no effect and reports `false`.
pub fn apply(id: SemId, mode: Mode, timeout_ms: u64) -> bool {
    run(id, mode, timeout_ms).is_ok()
}
