//! Config struct definition and default implementation.

use crate::sem::key::DEFAULT_FILE_MODE;
use crate::sem::{DEFAULT_CREATE_ATTEMPTS, DEFAULT_SEM_MODE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "NAMEDSEM_CONFIG";

/// Configuration for namedsem.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Semaphore settings
    // =========================================================================
    /// Attempts at creating a set before giving up on a racing remover.
    #[serde(default = "default_create_attempts")]
    pub create_attempts: u32,

    /// Permission bits for new semaphore sets.
    #[serde(default = "default_sem_mode")]
    pub sem_mode: u32,

    /// Mode for backing files created on demand.
    #[serde(default = "default_file_mode")]
    pub file_mode: u32,

    // =========================================================================
    // Record log settings
    // =========================================================================
    /// Record log path. Defaults to the backing file path plus `.records`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_log: Option<PathBuf>,

    // =========================================================================
    // Follow settings
    // =========================================================================
    /// Refresh period of `follow`, in milliseconds.
    #[serde(default = "default_follow_interval_ms")]
    pub follow_interval_ms: u64,

    /// Tags shown by `follow` when none are given.
    #[serde(default = "default_tags")]
    pub default_tags: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_attempts: default_create_attempts(),
            sem_mode: default_sem_mode(),
            file_mode: default_file_mode(),
            record_log: None,
            follow_interval_ms: default_follow_interval_ms(),
            default_tags: default_tags(),
        }
    }
}

fn default_create_attempts() -> u32 {
    DEFAULT_CREATE_ATTEMPTS
}

fn default_sem_mode() -> u32 {
    DEFAULT_SEM_MODE
}

fn default_file_mode() -> u32 {
    DEFAULT_FILE_MODE
}

fn default_follow_interval_ms() -> u64 {
    500
}

fn default_tags() -> String {
    "abcdefghijklmnopqrstuvwxyz".to_string()
}
