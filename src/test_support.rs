use crate::sem::{self, Counter, SemId, Tag};
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// A backing file in its own temporary directory.
pub(crate) struct BackingFile {
    dir: TempDir,
    path: std::path::PathBuf,
    tag: Tag,
}

impl BackingFile {
    pub(crate) fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sem");
        std::fs::write(&path, "").unwrap();
        Self {
            dir,
            path,
            tag: Tag::try_from('s').unwrap(),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn tag(&self) -> Tag {
        self.tag
    }

    /// Remove the semaphore when the returned guard drops, even if the test fails.
    pub(crate) fn cleanup(&self, id: SemId) -> RemoveOnDrop {
        RemoveOnDrop(id)
    }
}

pub(crate) struct RemoveOnDrop(SemId);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        // Already gone is fine: the test may have closed it.
        let _ = sem::remove(self.0);
    }
}

/// Openers currently registered on `id`.
pub(crate) fn openers(id: SemId) -> i32 {
    sem::BIGCOUNT - sem::executor::get_value(id, Counter::OpenCount).unwrap()
}

/// Block until `count` processes or threads wait on the value of `id`.
pub(crate) fn wait_for_waiters(id: SemId, count: i32) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while sem::executor::waiting_increase(id, Counter::Value).unwrap() < count {
        assert!(Instant::now() < deadline, "waiters never blocked on {id}");
        std::thread::sleep(Duration::from_millis(5));
    }
}
