//! Key derivation from a backing file and a tag.
//!
//! The backing file is only a source of identity (device and inode). It is
//! never read or written, and may be created empty on request.

use super::types::{Key, Tag};
use crate::error::{Result, SemError};
use nix::libc;
use std::ffi::CString;
use std::fs::OpenOptions;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use tracing::debug;

/// Default mode for backing files created on demand.
pub const DEFAULT_FILE_MODE: u32 = 0o666;

/// Derive the key for `(path, tag)`.
///
/// If nothing exists at `path`, an empty file is created with `file_mode`
/// when `create_if_missing` is set, otherwise the call fails with
/// `MissingBackingFile`.
pub fn derive_key(path: &Path, tag: Tag, create_if_missing: bool, file_mode: u32) -> Result<Key> {
    ensure_backing_file(path, create_if_missing, file_mode)?;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| SemError::DerivationFailed(path.to_path_buf()))?;

    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
    let key = unsafe { libc::ftok(c_path.as_ptr(), libc::c_int::from(tag.as_byte())) };

    if key == libc::IPC_PRIVATE {
        debug!(path = %path.display(), %tag, "derived key collides with the private key");
        return Err(SemError::DerivationFailed(path.to_path_buf()));
    }
    if key == -1 {
        debug!(path = %path.display(), %tag, "ftok failed");
        return Err(SemError::DerivationFailed(path.to_path_buf()));
    }

    Ok(Key(key))
}

fn ensure_backing_file(path: &Path, create_if_missing: bool, file_mode: u32) -> Result<()> {
    match path.try_exists() {
        Ok(true) => return Ok(()),
        Ok(false) => {}
        Err(e) => {
            return Err(SemError::BackingFile {
                path: path.to_path_buf(),
                source: e,
            });
        }
    }

    if !create_if_missing {
        debug!(path = %path.display(), "backing file does not exist");
        return Err(SemError::MissingBackingFile(path.to_path_buf()));
    }

    // A concurrent creator may win; that is as good as creating it ourselves.
    match OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(file_mode)
        .open(path)
    {
        Ok(_) => {
            debug!(path = %path.display(), "created backing file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(SemError::BackingFile {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tag(c: char) -> Tag {
        Tag::try_from(c).unwrap()
    }

    #[test]
    fn missing_file_is_rejected_without_create() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent");

        let err = derive_key(&path, tag('a'), false, DEFAULT_FILE_MODE).unwrap_err();
        assert!(matches!(err, SemError::MissingBackingFile(_)));
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_created_on_request() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sem");

        derive_key(&path, tag('a'), true, DEFAULT_FILE_MODE).unwrap();
        assert!(path.exists());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn key_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sem");

        let first = derive_key(&path, tag('a'), true, DEFAULT_FILE_MODE).unwrap();
        let second = derive_key(&path, tag('a'), false, DEFAULT_FILE_MODE).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn different_tags_give_different_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sem");

        let a = derive_key(&path, tag('a'), true, DEFAULT_FILE_MODE).unwrap();
        let b = derive_key(&path, tag('b'), true, DEFAULT_FILE_MODE).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn existing_file_is_left_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sem");
        std::fs::write(&path, "payload").unwrap();

        derive_key(&path, tag('z'), true, DEFAULT_FILE_MODE).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "payload");
    }
}
