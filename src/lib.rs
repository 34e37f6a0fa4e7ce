//! namedsem: counting semaphores named by a file path and a tag.
//!
//! Unrelated processes that agree on a path and a one-byte tag share one
//! System V semaphore set. The first opener creates and initializes it
//! without racing other openers, every opener is counted, and the last one
//! to close destroys it. Operations can be bounded by a timeout, and an
//! optional record log tracks creations for administrative cleanup.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exit_codes;
pub mod logging;
pub mod records;
pub mod sem;
pub mod system;

#[cfg(test)]
mod test_support;
