// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn acquire_writes_pid() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state/sjd.pid");

    let lock = InstanceLock::acquire(&path).unwrap();

    assert_eq!(lock.path(), path);
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.trim(), std::process::id().to_string());
}

#[test]
fn second_acquire_fails_and_names_the_holder() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sjd.pid");
    let _held = InstanceLock::acquire(&path).unwrap();

    let err = InstanceLock::acquire(&path).unwrap_err();

    match &err {
        LockError::Held { pid, .. } => assert_eq!(*pid, Some(std::process::id())),
        other => panic!("expected Held, got {other}"),
    }
    assert!(err.to_string().contains("already running"));
    // The holder's PID survives the failed attempt
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.trim(), std::process::id().to_string());
}

#[test]
fn drop_releases_and_clears() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sjd.pid");

    drop(InstanceLock::acquire(&path).unwrap());

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    let again = InstanceLock::acquire(&path);
    assert!(again.is_ok());
}

#[test]
fn foreign_lock_is_respected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sjd.pid");
    let foreign = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(&path).unwrap();
    foreign.lock_exclusive().unwrap();
    std::fs::write(&path, b"4242\n").unwrap();

    let err = InstanceLock::acquire(&path).unwrap_err();

    assert!(matches!(err, LockError::Held { pid: Some(4242), .. }));
}

#[test]
fn probe_reports_holder_without_taking_the_lock() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sjd.pid");
    assert_eq!(InstanceLock::probe(&path).unwrap(), LockStatus::Free);

    let held = InstanceLock::acquire(&path).unwrap();
    assert_eq!(InstanceLock::probe(&path).unwrap(), LockStatus::Held { pid: Some(std::process::id()) });

    drop(held);
    assert_eq!(InstanceLock::probe(&path).unwrap(), LockStatus::Free);
    InstanceLock::acquire(&path).unwrap();
}
