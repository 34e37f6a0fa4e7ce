//! Identifier, operation and failure types shared by the semaphore modules.

use crate::error::{Result, SemError};
use nix::errno::Errno;
use nix::libc;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Role of each counter in the three-counter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// The user-visible signal count.
    Value = 0,
    /// Remaining opener slots, starting from `BIGCOUNT`.
    OpenCount = 1,
    /// Binary flag guarding the create/close window.
    Lock = 2,
}

impl Counter {
    pub(crate) fn index(self) -> libc::c_int {
        self as libc::c_int
    }
}

/// Single-character project tag. Zero is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Tag(u8);

impl Tag {
    pub fn new(byte: u8) -> Result<Self> {
        if byte == 0 {
            return Err(SemError::InvalidTag);
        }
        Ok(Tag(byte))
    }

    pub fn as_byte(self) -> u8 {
        self.0
    }

    pub fn as_char(self) -> char {
        self.0 as char
    }
}

impl TryFrom<char> for Tag {
    type Error = SemError;

    fn try_from(c: char) -> Result<Self> {
        let byte = u8::try_from(u32::from(c)).map_err(|_| SemError::InvalidTag)?;
        Tag::new(byte)
    }
}

impl FromStr for Tag {
    type Err = SemError;

    /// Only the first character is significant, as with the command line tokens.
    fn from_str(s: &str) -> Result<Self> {
        s.chars()
            .next()
            .ok_or(SemError::InvalidTag)
            .and_then(Tag::try_from)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_char(), f)
    }
}

/// Key derived from a path and a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Key(pub(crate) libc::key_t);

impl Key {
    pub fn raw(self) -> libc::key_t {
        self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::LowerHex for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Kernel identifier of a semaphore set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SemId(pub(crate) libc::c_int);

impl SemId {
    pub fn from_raw(id: i32) -> Self {
        SemId(id)
    }

    pub fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for SemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SemId {
    type Err = SemError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<i32>()
            .ok()
            .filter(|id| *id >= 0)
            .map(SemId)
            .ok_or_else(|| SemError::UserError(format!("'{}' is not a semaphore id", s)))
    }
}

/// One step of an atomic operation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemOp {
    pub counter: Counter,
    /// Amount to add. Zero means "wait until the counter is zero".
    pub delta: i16,
    /// Reverse the delta automatically if the process exits first.
    pub undo: bool,
    /// Fail with `WouldBlock` instead of sleeping.
    pub no_wait: bool,
}

impl SemOp {
    /// Block until `counter` reads zero.
    pub const fn wait_zero(counter: Counter) -> Self {
        SemOp {
            counter,
            delta: 0,
            undo: false,
            no_wait: false,
        }
    }

    /// Add `delta` to `counter`, blocking while the result would go negative.
    pub const fn adjust(counter: Counter, delta: i16) -> Self {
        SemOp {
            counter,
            delta,
            undo: false,
            no_wait: false,
        }
    }

    pub const fn with_undo(mut self) -> Self {
        self.undo = true;
        self
    }

    pub const fn no_wait(mut self) -> Self {
        self.no_wait = true;
        self
    }

    pub(crate) fn to_sembuf(self) -> libc::sembuf {
        let mut flags: libc::c_int = 0;
        if self.undo {
            flags |= libc::SEM_UNDO;
        }
        if self.no_wait {
            flags |= libc::IPC_NOWAIT;
        }
        libc::sembuf {
            sem_num: self.counter as libc::c_ushort,
            sem_op: self.delta,
            sem_flg: flags as libc::c_short,
        }
    }
}

/// Classified failure of a System V call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("operation would block")]
    WouldBlock,
    #[error("too many operations in one call")]
    TooManyOperations,
    #[error("counter index out of range")]
    CounterIndexOutOfRange,
    #[error("invalid semaphore id")]
    InvalidId,
    #[error("semaphore was removed")]
    Removed,
    #[error("undo table exhausted")]
    UndoTableExhausted,
    #[error("interrupted by a signal")]
    Interrupted,
    #[error("counter value out of range")]
    RangeOverflow,
    #[error("a semaphore already exists for this key")]
    AlreadyExists,
    #[error("no semaphore exists for this key")]
    NoSuchKey,
    #[error("system semaphore limit reached")]
    NoSpace,
    #[error("{0}")]
    Other(Errno),
}

impl KernelError {
    /// Classify an errno left behind by `semop`.
    pub(crate) fn from_semop(errno: Errno) -> Self {
        match errno {
            Errno::E2BIG => KernelError::TooManyOperations,
            Errno::EACCES => KernelError::PermissionDenied,
            Errno::EAGAIN => KernelError::WouldBlock,
            Errno::EFBIG => KernelError::CounterIndexOutOfRange,
            Errno::EIDRM => KernelError::Removed,
            Errno::EINTR => KernelError::Interrupted,
            Errno::EINVAL => KernelError::InvalidId,
            Errno::ENOSPC => KernelError::UndoTableExhausted,
            Errno::ERANGE => KernelError::RangeOverflow,
            other => KernelError::Other(other),
        }
    }

    /// Classify an errno left behind by `semget`.
    pub(crate) fn from_semget(errno: Errno) -> Self {
        match errno {
            Errno::EACCES => KernelError::PermissionDenied,
            Errno::EEXIST => KernelError::AlreadyExists,
            Errno::EINVAL => KernelError::InvalidId,
            Errno::ENOENT => KernelError::NoSuchKey,
            Errno::ENOSPC => KernelError::NoSpace,
            other => KernelError::Other(other),
        }
    }

    /// Classify an errno left behind by `semctl`.
    pub(crate) fn from_semctl(errno: Errno) -> Self {
        match errno {
            Errno::EACCES | Errno::EPERM => KernelError::PermissionDenied,
            Errno::EIDRM => KernelError::Removed,
            Errno::EINVAL => KernelError::InvalidId,
            Errno::ERANGE => KernelError::RangeOverflow,
            other => KernelError::Other(other),
        }
    }

    /// The object no longer exists (or never did).
    pub fn is_gone(self) -> bool {
        matches!(
            self,
            KernelError::InvalidId | KernelError::Removed | KernelError::NoSuchKey
        )
    }
}
