//! Listing of every semaphore set on the system, from `/proc/sysvipc/sem`.

use crate::error::{Result, SemError};
use crate::sem::{self, SemId};
use nix::unistd::getuid;
use std::path::Path;
use tracing::{debug, warn};

const PROC_SEM: &str = "/proc/sysvipc/sem";

/// One row of the system table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSemaphore {
    pub key: i32,
    pub id: SemId,
    pub perms: u32,
    pub nsems: u32,
    pub uid: u32,
}

impl SystemSemaphore {
    /// Looks like a set this tool created with `sem_mode` permissions.
    pub fn is_ours(&self, sem_mode: u32) -> bool {
        self.nsems == sem::NSEMS as u32 && self.perms & 0o777 == sem_mode & 0o777
    }
}

/// Every semaphore set currently allocated.
pub fn list() -> Result<Vec<SystemSemaphore>> {
    list_from(Path::new(PROC_SEM))
}

fn list_from(path: &Path) -> Result<Vec<SystemSemaphore>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SemError::UserError(format!("failed to read '{}': {}", path.display(), e))
    })?;
    Ok(parse_table(&content))
}

fn parse_table(content: &str) -> Vec<SystemSemaphore> {
    content
        .lines()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let row = parse_row(line);
            if row.is_none() {
                warn!(line, "unrecognized semaphore table row");
            }
            row
        })
        .collect()
}

fn parse_row(line: &str) -> Option<SystemSemaphore> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return None;
    }
    Some(SystemSemaphore {
        key: fields[0].parse().ok()?,
        id: SemId::from_raw(fields[1].parse().ok()?),
        perms: u32::from_str_radix(fields[2], 8).ok()?,
        nsems: fields[3].parse().ok()?,
        uid: fields[4].parse().ok()?,
    })
}

/// Remove every set owned by the caller that looks like one of ours.
///
/// Returns the ids that were removed. Sets that vanish mid-sweep are skipped.
pub fn remove_all_owned(sem_mode: u32) -> Result<Vec<SemId>> {
    let mut removed = Vec::new();

    for entry in owned(list()?, getuid().as_raw(), sem_mode) {
        match sem::remove(entry.id) {
            Ok(()) => removed.push(entry.id),
            Err(e) => debug!(id = %entry.id, error = %e, "skipping semaphore during sweep"),
        }
    }

    Ok(removed)
}

fn owned(entries: Vec<SystemSemaphore>, uid: u32, sem_mode: u32) -> Vec<SystemSemaphore> {
    entries
        .into_iter()
        .filter(|entry| entry.uid == uid && entry.is_ours(sem_mode))
        .collect()
}
