//! Exit code constants for the namedsem CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, bad tag, bad config, object already exists)
//! - 2: Operation failure (kernel call failed, invariant violated)
//! - 3: Timeout (a bounded adjustment did not complete in time)
//! - 4: Not found (no backing file or no semaphore for the key)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments, invalid tag, invalid configuration.
pub const USER_ERROR: i32 = 1;

/// Operation failure: a kernel call failed or the object was left inconsistent.
pub const OPERATION_FAILURE: i32 = 2;

/// Timeout: the deferred interrupt fired before the adjustment completed.
pub const TIMEOUT: i32 = 3;

/// Not found: the backing file or the kernel object does not exist.
pub const NOT_FOUND: i32 = 4;
