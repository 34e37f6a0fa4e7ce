//! Create, open, close and remove named semaphores.
//!
//! The set carries three counters: the value, the opener count and a
//! bootstrap lock. The opener count starts at `BIGCOUNT` and is decremented
//! once per opener with undo, so a process that dies without closing gives
//! its slot back automatically. Whoever brings it back to `BIGCOUNT` on
//! close destroys the set.
//!
//! Every lock/mutate/unlock step is a single operation list, so no other
//! process observes an intermediate state.

use super::executor;
use super::key::{DEFAULT_FILE_MODE, derive_key};
use super::types::{Counter, Key, KernelError, SemId, SemOp, Tag};
use super::{BIGCOUNT, DEFAULT_CREATE_ATTEMPTS, DEFAULT_SEM_MODE};
use crate::config::Config;
use crate::error::{Result, SemError};
use crate::records::{Record, RecordLog};
use std::cmp::Ordering;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Wait for the lock to be free, then take it.
const LOCK: [SemOp; 2] = [
    SemOp::wait_zero(Counter::Lock),
    SemOp::adjust(Counter::Lock, 1).with_undo(),
];

/// Register as an opener and release the lock in one step.
const END_CREATE: [SemOp; 2] = [
    SemOp::adjust(Counter::OpenCount, -1).with_undo(),
    SemOp::adjust(Counter::Lock, -1).with_undo(),
];

/// Register as an opener of an existing set.
const REGISTER: [SemOp; 1] = [SemOp::adjust(Counter::OpenCount, -1).with_undo()];

/// Take the lock and give back an opener slot.
const CLOSE: [SemOp; 3] = [
    SemOp::wait_zero(Counter::Lock),
    SemOp::adjust(Counter::Lock, 1).with_undo(),
    SemOp::adjust(Counter::OpenCount, 1).with_undo(),
];

const UNLOCK: [SemOp; 1] = [SemOp::adjust(Counter::Lock, -1).with_undo()];

/// Settings for creating and opening semaphores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// How many times to retry creation when the set vanishes before it is locked.
    pub create_attempts: u32,
    /// Mode for backing files created on demand.
    pub file_mode: u32,
    /// Permission bits for new semaphore sets.
    pub sem_mode: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_attempts: DEFAULT_CREATE_ATTEMPTS,
            file_mode: DEFAULT_FILE_MODE,
            sem_mode: DEFAULT_SEM_MODE,
        }
    }
}

impl From<&Config> for Options {
    fn from(config: &Config) -> Self {
        Self {
            create_attempts: config.create_attempts,
            file_mode: config.file_mode,
            sem_mode: config.sem_mode,
        }
    }
}

/// Result of a successful close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// This was the last opener; the set has been destroyed.
    Removed,
    /// Other openers remain registered.
    StillShared { openers: i32 },
}

/// Create the semaphore for `(path, tag)` with `init` as its value.
///
/// Fails with `AlreadyExists` if a set for the key is already present;
/// callers use that to fall back to opening it. On success the caller is
/// registered as an opener.
pub fn create(path: &Path, tag: Tag, init: i32, opts: &Options) -> Result<SemId> {
    let key = derive_key(path, tag, true, opts.file_mode)?;
    bootstrap(key, init, opts)
}

/// Open the semaphore for `(path, tag)`, creating it with `init` if needed.
///
/// A fresh creation is appended to `records` when one is given.
pub fn open(
    path: &Path,
    tag: Tag,
    init: i32,
    opts: &Options,
    records: Option<&RecordLog>,
) -> Result<SemId> {
    let key = derive_key(path, tag, true, opts.file_mode)?;

    match bootstrap(key, init, opts) {
        Ok(id) => {
            info!(path = %path.display(), %tag, %id, init, "created semaphore");
            if let Some(log) = records
                && let Err(e) = log.append(&Record { tag, key, id })
            {
                warn!(error = %e, "failed to record semaphore creation");
            }
            Ok(id)
        }
        Err(SemError::AlreadyExists) => {
            let id = executor::lookup(key).map_err(|e| SemError::kernel("semget", e))?;
            executor::execute_as("open", id, &REGISTER)?;
            debug!(path = %path.display(), %tag, %id, "opened existing semaphore");
            Ok(id)
        }
        Err(e) => Err(e),
    }
}

/// Give back this caller's opener slot, destroying the set if it was the last.
///
/// An opener count above `BIGCOUNT` means more closes than opens. That is
/// reported as `InvariantViolation` and the set is left as it is.
pub fn close(id: SemId) -> Result<CloseOutcome> {
    executor::execute_as("close", id, &CLOSE)?;

    let open_count = match executor::get_value(id, Counter::OpenCount) {
        Ok(count) => count,
        Err(e) => {
            let _ = executor::execute(id, &UNLOCK);
            return Err(e);
        }
    };

    match open_count.cmp(&BIGCOUNT) {
        Ordering::Equal => {
            executor::destroy(id)?;
            info!(%id, "last opener closed; semaphore removed");
            Ok(CloseOutcome::Removed)
        }
        Ordering::Less => {
            executor::execute_as("unlock", id, &UNLOCK)?;
            let openers = BIGCOUNT - open_count;
            debug!(%id, openers, "closed; semaphore still shared");
            Ok(CloseOutcome::StillShared { openers })
        }
        Ordering::Greater => {
            error!(%id, open_count, "opener count exceeds its sentinel");
            Err(SemError::InvariantViolation { open_count })
        }
    }
}

/// Destroy the set regardless of how many openers it has.
pub fn remove(id: SemId) -> Result<()> {
    executor::destroy(id)?;
    info!(%id, "semaphore removed");
    Ok(())
}

/// Find the existing set for `(path, tag)` without registering as an opener.
pub fn find(path: &Path, tag: Tag) -> Result<SemId> {
    let key = derive_key(path, tag, false, DEFAULT_FILE_MODE)?;
    executor::lookup(key).map_err(|e| {
        if e.is_gone() {
            SemError::NotFound {
                path: path.to_path_buf(),
                tag: tag.as_char(),
            }
        } else {
            SemError::kernel("semget", e)
        }
    })
}

/// True if a set exists for `(path, tag)`. Never creates anything.
pub fn exists(path: &Path, tag: Tag) -> bool {
    find(path, tag).is_ok()
}

/// Allocate, lock, initialize and register, retrying while a concurrent
/// remover destroys the set between allocation and locking.
fn bootstrap(key: Key, init: i32, opts: &Options) -> Result<SemId> {
    bootstrap_with(key, init, opts, |id| executor::execute(id, &LOCK))
}

/// [`bootstrap`] with the locking step supplied by the caller.
fn bootstrap_with<F>(key: Key, init: i32, opts: &Options, mut lock: F) -> Result<SemId>
where
    F: FnMut(SemId) -> std::result::Result<(), KernelError>,
{
    for attempt in 1..=opts.create_attempts {
        let id = executor::allocate_exclusive(key, opts.sem_mode)?;

        match lock(id) {
            Ok(()) => return initialize(id, init),
            Err(cause) if cause.is_gone() => {
                debug!(%key, %id, attempt, "semaphore removed before it was locked; retrying");
            }
            Err(cause) => return Err(SemError::kernel("lock", cause)),
        }
    }

    Err(SemError::RetryExhausted(opts.create_attempts))
}

/// Runs with the bootstrap lock held.
fn initialize(id: SemId, init: i32) -> Result<SemId> {
    let result = (|| {
        // Zero means nobody has initialized the set yet. Two SETVALs rather
        // than SETALL so the undo value of the lock survives.
        if executor::get_value(id, Counter::OpenCount)? == 0 {
            executor::set_value(id, Counter::Value, init)?;
            executor::set_value(id, Counter::OpenCount, BIGCOUNT)?;
        }
        executor::execute_as("register", id, &END_CREATE)
    })();

    match result {
        Ok(()) => Ok(id),
        Err(e) => {
            let _ = executor::execute(id, &UNLOCK);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sem::query::{QueryCode, query};
    use crate::test_support::{BackingFile, openers};

    #[test]
    fn create_initializes_value_and_registers_one_opener() {
        let backing = BackingFile::new();
        let id = create(backing.path(), backing.tag(), 3, &Options::default()).unwrap();
        let _cleanup = backing.cleanup(id);

        assert_eq!(query(id, QueryCode::Value).unwrap(), 3);
        assert_eq!(openers(id), 1);
        assert_eq!(executor::get_value(id, Counter::Lock).unwrap(), 0);
    }

    #[test]
    fn second_create_reports_already_exists() {
        let backing = BackingFile::new();
        let opts = Options::default();
        let id = create(backing.path(), backing.tag(), 1, &opts).unwrap();
        let _cleanup = backing.cleanup(id);

        let err = create(backing.path(), backing.tag(), 1, &opts).unwrap_err();
        assert!(matches!(err, SemError::AlreadyExists));
    }

    #[test]
    fn open_existing_keeps_first_value_and_adds_an_opener() {
        let backing = BackingFile::new();
        let opts = Options::default();
        let first = open(backing.path(), backing.tag(), 5, &opts, None).unwrap();
        let _cleanup = backing.cleanup(first);

        let second = open(backing.path(), backing.tag(), 9, &opts, None).unwrap();
        assert_eq!(first, second);
        assert_eq!(query(first, QueryCode::Value).unwrap(), 5);
        assert_eq!(openers(first), 2);
    }

    #[test]
    fn open_records_only_fresh_creations() {
        let backing = BackingFile::new();
        let log = RecordLog::new(backing.dir().join("records"));
        let opts = Options::default();

        let id = open(backing.path(), backing.tag(), 1, &opts, Some(&log)).unwrap();
        let _cleanup = backing.cleanup(id);
        open(backing.path(), backing.tag(), 1, &opts, Some(&log)).unwrap();

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].tag, backing.tag());
    }

    #[test]
    fn last_close_removes_the_semaphore() {
        let backing = BackingFile::new();
        let opts = Options::default();
        let id = open(backing.path(), backing.tag(), 0, &opts, None).unwrap();
        open(backing.path(), backing.tag(), 0, &opts, None).unwrap();
        open(backing.path(), backing.tag(), 0, &opts, None).unwrap();

        assert_eq!(close(id).unwrap(), CloseOutcome::StillShared { openers: 2 });
        assert_eq!(close(id).unwrap(), CloseOutcome::StillShared { openers: 1 });
        assert!(exists(backing.path(), backing.tag()));
        assert_eq!(close(id).unwrap(), CloseOutcome::Removed);
        assert!(!exists(backing.path(), backing.tag()));
    }

    #[test]
    fn close_after_removal_fails_with_gone_id() {
        let backing = BackingFile::new();
        let id = create(backing.path(), backing.tag(), 0, &Options::default()).unwrap();
        remove(id).unwrap();

        match close(id).unwrap_err() {
            SemError::Kernel { source, .. } => assert!(source.is_gone()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unmatched_close_is_an_invariant_violation() {
        let backing = BackingFile::new();
        let id = create(backing.path(), backing.tag(), 0, &Options::default()).unwrap();
        let _cleanup = backing.cleanup(id);

        // Simulate an extra close by pushing the opener count past the sentinel.
        executor::set_value(id, Counter::OpenCount, BIGCOUNT).unwrap();

        let err = close(id).unwrap_err();
        assert!(matches!(
            err,
            SemError::InvariantViolation { open_count } if open_count == BIGCOUNT + 1
        ));
        // The set is left in place.
        assert!(exists(backing.path(), backing.tag()));
    }

    #[test]
    fn find_does_not_create_or_register() {
        let backing = BackingFile::new();
        assert!(matches!(
            find(backing.path(), backing.tag()),
            Err(SemError::NotFound { .. })
        ));

        let id = create(backing.path(), backing.tag(), 0, &Options::default()).unwrap();
        let _cleanup = backing.cleanup(id);
        assert_eq!(find(backing.path(), backing.tag()).unwrap(), id);
        assert_eq!(openers(id), 1);
    }

    #[test]
    fn find_with_missing_backing_file_fails() {
        let backing = BackingFile::new();
        let missing = backing.dir().join("nope");
        assert!(matches!(
            find(&missing, backing.tag()),
            Err(SemError::MissingBackingFile(_))
        ));
        assert!(!exists(&missing, backing.tag()));
    }

    #[test]
    fn concurrent_opens_initialize_once() {
        let backing = BackingFile::new();
        let path = backing.path().to_path_buf();
        let tag = backing.tag();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || {
                    open(&path, tag, 10 + i, &Options::default(), None).unwrap()
                })
            })
            .collect();
        let ids: Vec<SemId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let id = ids[0];
        let _cleanup = backing.cleanup(id);

        assert!(ids.iter().all(|other| *other == id));
        let value = query(id, QueryCode::Value).unwrap();
        assert!((10..18).contains(&value), "value {value} was not one of the inits");
        assert_eq!(openers(id), 8);
    }

    /// Lock step that destroys the fresh set before locking it, as a
    /// concurrent remover would, for the first `losses` attempts.
    fn losing_lock(losses: u32) -> impl FnMut(SemId) -> std::result::Result<(), KernelError> {
        let mut calls = 0;
        move |id| {
            calls += 1;
            if calls <= losses {
                executor::destroy(id).unwrap();
            }
            executor::execute(id, &LOCK)
        }
    }

    #[test]
    fn bootstrap_retries_after_the_set_vanishes() {
        let backing = BackingFile::new();
        let key = derive_key(backing.path(), backing.tag(), false, DEFAULT_FILE_MODE).unwrap();

        let id = bootstrap_with(key, 6, &Options::default(), losing_lock(2)).unwrap();
        let _cleanup = backing.cleanup(id);

        assert_eq!(query(id, QueryCode::Value).unwrap(), 6);
        assert_eq!(openers(id), 1);
        assert_eq!(find(backing.path(), backing.tag()).unwrap(), id);
    }

    #[test]
    fn bootstrap_gives_up_after_create_attempts_losses() {
        let backing = BackingFile::new();
        let key = derive_key(backing.path(), backing.tag(), false, DEFAULT_FILE_MODE).unwrap();
        let opts = Options {
            create_attempts: 3,
            ..Options::default()
        };

        let err = bootstrap_with(key, 0, &opts, losing_lock(3)).unwrap_err();
        assert!(matches!(err, SemError::RetryExhausted(3)));
        assert!(!exists(backing.path(), backing.tag()));
    }
}
