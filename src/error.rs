//! Error types for namedsem.
//!
//! Uses thiserror for derive macros. Kernel failures carry their specific
//! cause for diagnostics, but callers only need [`SemError::exit_code`] or
//! [`SemError::is_timeout`] to decide what to do next.

use crate::exit_codes;
use crate::sem::KernelError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for namedsem operations.
#[derive(Error, Debug)]
pub enum SemError {
    /// Tag zero is reserved and cannot name a semaphore.
    #[error("tag must be a non-zero character")]
    InvalidTag,

    /// No backing file exists and creation was not requested.
    #[error("no backing file at '{}'", .0.display())]
    MissingBackingFile(PathBuf),

    /// The backing file could not be inspected or created.
    #[error("backing file '{}': {source}", path.display())]
    BackingFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The path and tag did not produce a usable key.
    #[error("could not derive a key from '{}'", .0.display())]
    DerivationFailed(PathBuf),

    /// A kernel call failed.
    #[error("{op} failed: {source}")]
    Kernel {
        op: &'static str,
        #[source]
        source: KernelError,
    },

    /// Exclusive creation found an existing object. Used as a control-flow signal.
    #[error("semaphore already exists")]
    AlreadyExists,

    /// No object is registered for the derived key.
    #[error("no semaphore exists for '{}' tag '{tag}'", path.display())]
    NotFound { path: PathBuf, tag: char },

    /// The object kept vanishing between allocation and locking.
    #[error("semaphore creation lost the race {0} times in a row")]
    RetryExhausted(u32),

    /// The opener counter went above its sentinel, which only an unmatched close can cause.
    #[error("opener count {open_count} exceeds its sentinel; close without a matching open?")]
    InvariantViolation { open_count: i32 },

    /// An adjustment of zero was requested.
    #[error("no operation is defined for an adjustment of 0")]
    NoOperationDefined,

    /// The adjustment did not complete before the deferred interrupt fired.
    #[error("timed out waiting on semaphore")]
    Timeout,

    /// The adjustment failed for a reason other than a timeout.
    #[error("semaphore operation failed")]
    OperationFailed,

    /// Unknown query code.
    #[error("invalid query code '{0}' (expected one of v, p, n, z, o, c, r)")]
    InvalidQuery(String),

    /// Unknown command token.
    #[error("invalid mode '{0}'")]
    InvalidMode(String),

    /// The administrative record log could not be read or written.
    #[error("record log '{}': {source}", path.display())]
    Records {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be loaded or failed validation.
    #[error("config: {0}")]
    Config(String),

    /// User provided invalid arguments.
    #[error("{0}")]
    UserError(String),
}

impl SemError {
    /// Wrap a kernel failure for the named operation.
    pub(crate) fn kernel(op: &'static str, source: KernelError) -> Self {
        SemError::Kernel { op, source }
    }

    /// True if the failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SemError::Timeout)
    }

    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SemError::InvalidTag
            | SemError::AlreadyExists
            | SemError::NoOperationDefined
            | SemError::InvalidQuery(_)
            | SemError::InvalidMode(_)
            | SemError::Config(_)
            | SemError::UserError(_) => exit_codes::USER_ERROR,
            SemError::MissingBackingFile(_) | SemError::NotFound { .. } => exit_codes::NOT_FOUND,
            SemError::Kernel { source, .. } if source.is_gone() => exit_codes::NOT_FOUND,
            SemError::BackingFile { .. }
            | SemError::DerivationFailed(_)
            | SemError::Kernel { .. }
            | SemError::RetryExhausted(_)
            | SemError::InvariantViolation { .. }
            | SemError::OperationFailed
            | SemError::Records { .. } => exit_codes::OPERATION_FAILURE,
            SemError::Timeout => exit_codes::TIMEOUT,
        }
    }
}

/// Result type alias for namedsem operations.
pub type Result<T> = std::result::Result<T, SemError>;
