//! One-shot deferred interrupt used to bound a blocking `semop`.
//!
//! Arming starts a POSIX timer that delivers `SIGALRM` to the calling thread.
//! The handler only sets [`FIRED`]; the blocked call then fails with
//! `EINTR` and the arming code reads and clears the flag. Only one bounded
//! wait may be outstanding per process, since the flag is process-wide.

use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{SaFlags, SigAction, SigEvent, SigHandler, SigSet, SigevNotify, Signal, sigaction};
use nix::sys::time::TimeSpec;
use nix::sys::timer::{Expiration, Timer, TimerSetTimeFlags};
use nix::time::ClockId;
use nix::unistd::gettid;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Written only by [`on_alarm`]; read and cleared only by [`take_fired`].
static FIRED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_alarm(_signal: libc::c_int) {
    FIRED.store(true, Ordering::SeqCst);
}

fn install_handler() -> Result<(), Errno> {
    static INSTALLED: OnceLock<Result<(), Errno>> = OnceLock::new();

    *INSTALLED.get_or_init(|| {
        // No SA_RESTART: the blocked semop must return EINTR.
        let action = SigAction::new(
            SigHandler::Handler(on_alarm),
            SaFlags::empty(),
            SigSet::empty(),
        );
        // SAFETY: the handler is async-signal-safe; it only stores to an atomic.
        unsafe { sigaction(Signal::SIGALRM, &action) }.map(|_| ())
    })
}

/// A pending interrupt. Dropping it cancels the timer if it has not fired.
#[derive(Debug)]
pub struct DeferredInterrupt {
    _timer: Timer,
}

impl DeferredInterrupt {
    /// Deliver `SIGALRM` to the current thread once `after` has elapsed.
    pub fn arm(after: Duration) -> Result<Self, Errno> {
        install_handler()?;

        let event = SigEvent::new(SigevNotify::SigevThreadId {
            signal: Signal::SIGALRM,
            thread_id: gettid().as_raw(),
            si_value: 0,
        });
        let mut timer = Timer::new(ClockId::CLOCK_MONOTONIC, event)?;
        timer.set(
            Expiration::OneShot(TimeSpec::from(after)),
            TimerSetTimeFlags::empty(),
        )?;

        Ok(Self { _timer: timer })
    }
}

/// Read and clear the fired flag.
pub fn take_fired() -> bool {
    FIRED.swap(false, Ordering::SeqCst)
}
