//! CLI integration tests for namedsem.
//!
//! Each test names its semaphores with a backing file in its own temporary
//! directory, so keys never collide between tests. Semaphores that could
//! outlive a failing test are removed by a drop guard.

#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::thread;
use tempfile::TempDir;

fn namedsem() -> Command {
    let mut cmd = Command::cargo_bin("namedsem").unwrap();
    cmd.env_remove("NAMEDSEM_CONFIG").env_remove("NAMEDSEM_LOG");
    cmd
}

fn backing(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("sem");
    std::fs::write(&path, "").unwrap();
    path
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

/// Removes a semaphore by id when dropped.
struct RemoveOnDrop(String);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        let _ = namedsem().args(["rm", &self.0]).output();
    }
}

fn create(path: &Path, tag: &str, init: i32) -> RemoveOnDrop {
    let output = namedsem()
        .args(["create", arg(path), tag, &init.to_string()])
        .output()
        .unwrap();
    assert!(output.status.success(), "create failed: {:?}", output);
    RemoveOnDrop(String::from_utf8(output.stdout).unwrap().trim().to_string())
}

#[test]
fn create_then_status_reports_the_initial_value() {
    let temp = TempDir::new().unwrap();
    let path = backing(&temp);
    let created = create(&path, "a", 7);

    namedsem()
        .args(["status", arg(&path), "a", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"value\": 7"))
        .stdout(predicate::str::contains(format!("\"id\": {}", created.0)));

    namedsem()
        .args(["query", &created.0, "v"])
        .assert()
        .success()
        .stdout("7\n");
}

#[test]
fn create_twice_is_a_user_error() {
    let temp = TempDir::new().unwrap();
    let path = backing(&temp);
    let _created = create(&path, "a", 0);

    namedsem()
        .args(["create", arg(&path), "a", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn lock_times_out_with_its_own_exit_code() {
    let temp = TempDir::new().unwrap();
    let path = backing(&temp);
    let _created = create(&path, "a", 0);

    namedsem()
        .args(["lock", arg(&path), "a", "100"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("timed out"));
}

#[test]
fn last_close_destroys_a_created_semaphore() {
    let temp = TempDir::new().unwrap();
    let path = backing(&temp);
    let created = create(&path, "a", 1);

    namedsem()
        .args(["open", arg(&path), "a"])
        .assert()
        .success()
        .stdout(format!("{} 1\n", created.0));

    namedsem()
        .args(["status", arg(&path), "a"])
        .assert()
        .code(4);
}

#[test]
fn delete_removes_the_semaphore() {
    let temp = TempDir::new().unwrap();
    let path = backing(&temp);
    let _created = create(&path, "b", 3);

    namedsem().args(["delete", arg(&path), "b"]).assert().success();

    namedsem()
        .args(["status", arg(&path), "b"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("no semaphore exists"));
}

#[test]
fn status_on_missing_backing_file_is_not_found() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("missing");

    namedsem()
        .args(["status", arg(&path), "a"])
        .assert()
        .code(4);
    assert!(!path.exists());
}

#[test]
fn query_rejects_unknown_code() {
    namedsem()
        .args(["query", "0", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid query code"));
}

#[test]
fn concurrent_opens_share_one_initialized_semaphore() {
    let temp = TempDir::new().unwrap();
    let path = backing(&temp);
    let bin = assert_cmd::cargo::cargo_bin("namedsem");

    let children: Vec<_> = (0..4)
        .map(|_| {
            std::process::Command::new(&bin)
                .args(["open", arg(&path), "c", "--init", "5", "--hold-ms", "1000"])
                .env_remove("NAMEDSEM_CONFIG")
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .unwrap()
        })
        .collect();

    let lines: Vec<String> = children
        .into_iter()
        .map(|child| {
            let output = child.wait_with_output().unwrap();
            assert!(output.status.success(), "open failed: {:?}", output);
            String::from_utf8(output.stdout).unwrap().trim().to_string()
        })
        .collect();

    let first = &lines[0];
    for line in &lines {
        assert_eq!(line, first, "openers saw different semaphores");
        assert!(line.ends_with(" 5"), "unexpected value in '{}'", line);
    }

    // The last of them closed it.
    namedsem()
        .args(["status", arg(&path), "c"])
        .assert()
        .code(4);
}

#[test]
fn lock_wakes_when_another_process_unlocks() {
    let temp = TempDir::new().unwrap();
    let path = backing(&temp);
    let _created = create(&path, "d", 0);
    let bin = assert_cmd::cargo::cargo_bin("namedsem");

    let waiter = std::process::Command::new(&bin)
        .args(["lock", arg(&path), "d", "5000"])
        .env_remove("NAMEDSEM_CONFIG")
        .spawn()
        .unwrap();

    // Give the waiter time to block before releasing it.
    thread::sleep(std::time::Duration::from_millis(300));
    namedsem().args(["unlock", arg(&path), "d"]).assert().success();

    let status = waiter.wait_with_output().unwrap().status;
    assert!(status.success());
}

#[test]
fn records_are_listed_and_swept() {
    let temp = TempDir::new().unwrap();
    let path = backing(&temp);
    let log = temp.path().join("sem.records");

    // Creates, records, then removes on close.
    namedsem().args(["unlock", arg(&path), "e"]).assert().success();

    namedsem()
        .args(["list", arg(&log)])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("[e] key:"));

    namedsem()
        .args(["rm", arg(&log)])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0 semaphore(s)."));

    assert_eq!(std::fs::read_to_string(&log).unwrap(), "");
}

#[test]
fn configured_record_log_is_used() {
    let temp = TempDir::new().unwrap();
    let path = backing(&temp);
    let log = temp.path().join("custom.log");
    let config = temp.path().join("namedsem.yaml");
    std::fs::write(&config, format!("record_log: {}\n", log.display())).unwrap();

    namedsem()
        .env("NAMEDSEM_CONFIG", &config)
        .args(["relax", arg(&path), "f"])
        .assert()
        .success()
        .stdout("No waiters.\n");

    let content = std::fs::read_to_string(&log).unwrap();
    assert!(content.starts_with("f "), "unexpected log: {:?}", content);
    assert!(!temp.path().join("sem.records").exists());
}

#[test]
fn invalid_config_is_a_user_error() {
    let temp = TempDir::new().unwrap();
    let path = backing(&temp);
    let config = temp.path().join("namedsem.yaml");
    std::fs::write(&config, "create_attempts: 0\n").unwrap();

    namedsem()
        .args(["--config", arg(&config), "status", arg(&path), "a"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("create_attempts"));
}

#[test]
fn follow_once_renders_existing_semaphores() {
    let temp = TempDir::new().unwrap();
    let path = backing(&temp);
    let _a = create(&path, "a", 2);

    namedsem()
        .args(["follow", arg(&path), "ab", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Path:"))
        .stdout(predicate::str::contains(" a "));
}
