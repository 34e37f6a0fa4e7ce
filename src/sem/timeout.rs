//! Bounded blocking adjustment of the value counter.

use super::executor;
use super::interrupt::{self, DeferredInterrupt};
use super::lifecycle;
use super::types::{Counter, SemId, SemOp};
use crate::error::{Result, SemError};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Add `delta` to the value, waiting at most `timeout_ms` (0 waits forever).
///
/// With `safe` the change is registered for undo, so the kernel reverses it
/// if this process dies while holding it. A safe waiter that times out also
/// closes `id`, giving back the opener slot it registered on open.
///
/// Kernel causes are logged and collapsed to `Timeout` or `OperationFailed`.
///
/// The timer starts before the kernel call. If it fires before this thread
/// has blocked in `semop`, the interrupt is spent and the wait that follows
/// is unbounded.
pub fn adjust(id: SemId, delta: i32, timeout_ms: u64, safe: bool) -> Result<()> {
    if delta == 0 {
        warn!(%id, "refusing to adjust semaphore by 0");
        return Err(SemError::NoOperationDefined);
    }
    let Ok(delta) = i16::try_from(delta) else {
        warn!(%id, delta, "adjustment does not fit a semaphore operation");
        return Err(SemError::OperationFailed);
    };

    let op = if safe {
        SemOp::adjust(Counter::Value, delta).with_undo()
    } else {
        SemOp::adjust(Counter::Value, delta)
    };

    let pending = if timeout_ms > 0 {
        match DeferredInterrupt::arm(Duration::from_millis(timeout_ms)) {
            Ok(pending) => Some(pending),
            Err(e) => {
                error!(%id, error = %e, "could not arm timeout");
                return Err(SemError::OperationFailed);
            }
        }
    } else {
        None
    };

    let outcome = executor::execute(id, &[op]);
    // The fired flag belongs to whoever armed the timer; untimed calls leave it alone.
    let timed_out = match pending {
        Some(armed) => {
            drop(armed);
            interrupt::take_fired()
        }
        None => false,
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(_) if timed_out => {
            debug!(%id, delta, timeout_ms, safe, "semaphore operation timed out");
            if safe && let Err(e) = lifecycle::close(id) {
                warn!(%id, error = %e, "failed to release opener slot after timeout");
            }
            Err(SemError::Timeout)
        }
        Err(cause) => {
            warn!(%id, delta, error = %cause, "semaphore operation failed");
            Err(SemError::OperationFailed)
        }
    }
}
