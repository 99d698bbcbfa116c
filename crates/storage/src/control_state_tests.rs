// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn file(dir: &TempDir) -> StateFile {
    StateFile::new(dir.path().join("control").join("state.json"))
}

#[test]
fn missing_file_loads_as_none() {
    let dir = TempDir::new().unwrap();
    assert_eq!(file(&dir).load().unwrap(), None);
}

#[test]
fn save_then_load_preserves_state() {
    let dir = TempDir::new().unwrap();
    let file = file(&dir);
    let state = ControlState::provisioning(NodeId::from_string("12345"), 1_700_000_000_000)
        .with_address("203.0.113.7")
        .activated();
    file.save(&state).unwrap();

    assert_eq!(file.load().unwrap(), Some(state));
    assert!(!file.path().with_extension("tmp").exists());
}

#[test]
fn provisioning_state_has_no_address() {
    let dir = TempDir::new().unwrap();
    let file = file(&dir);
    file.save(&ControlState::provisioning(NodeId::from_string("9"), 1)).unwrap();

    let json = std::fs::read_to_string(file.path()).unwrap();
    assert!(json.contains("\"v\": 1"));
    assert!(json.contains("\"phase\": \"provisioning\""));
    assert!(!json.contains("address"));
    assert!(!json.contains("condemned"));
}

#[test]
fn condemned_reason_survives_reload() {
    let dir = TempDir::new().unwrap();
    let file = file(&dir);
    let state = ControlState::provisioning(NodeId::from_string("9"), 1)
        .activated()
        .condemned(DestroyReason::StuckJobs);
    file.save(&state).unwrap();

    let json = std::fs::read_to_string(file.path()).unwrap();
    assert!(json.contains("\"condemned\": \"stuck_jobs\""));
    assert_eq!(file.load().unwrap().and_then(|s| s.condemned), Some(DestroyReason::StuckJobs));
}

#[test]
fn clear_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let file = file(&dir);
    file.save(&ControlState::provisioning(NodeId::from_string("9"), 1)).unwrap();
    file.clear().unwrap();
    file.clear().unwrap();
    assert_eq!(file.load().unwrap(), None);
}

#[test]
fn corrupt_file_is_moved_aside() {
    let dir = TempDir::new().unwrap();
    let file = file(&dir);
    std::fs::create_dir_all(file.path().parent().unwrap()).unwrap();
    std::fs::write(file.path(), b"{not json").unwrap();

    assert_eq!(file.load().unwrap(), None);
    assert!(file.path().with_extension("bak").exists());
    assert!(!file.path().exists());
}

#[test]
fn newer_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let file = file(&dir);
    std::fs::create_dir_all(file.path().parent().unwrap()).unwrap();
    std::fs::write(file.path(), br#"{"v": 99, "node_id": "1", "created_at_ms": 0, "phase": "active"}"#).unwrap();

    assert!(matches!(file.load(), Err(StateError::UnsupportedVersion { found: 99, .. })));
}
