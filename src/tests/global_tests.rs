//! Tests for global module.

use super::*;
use tempfile::tempdir;

#[test]
fn test_create_and_read_back_fields() {
    let dir = tempdir().unwrap();
    let sessions = GlobalActiveSessions::new(dir.path());

    let mut session = sessions.create("a1b2c3d4").unwrap();
    session.set_username("alice").unwrap();
    session.set_user_home_dir("/home/alice").unwrap();
    session.set_session_timeout_kill_hours(24).unwrap();

    let loaded = sessions.get("a1b2c3d4").expect("record should exist");
    assert_eq!(loaded.session_id(), "a1b2c3d4");
    assert_eq!(loaded.username(), "alice");
    assert_eq!(loaded.user_home_dir(), "/home/alice");
    assert_eq!(loaded.session_timeout_kill_hours(), 24);
}

#[test]
fn test_create_under_new_root() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("global-sessions");
    let sessions = GlobalActiveSessions::new(&root);

    let session = sessions.create("a1b2c3d4").unwrap();
    assert_eq!(session.path(), root.join("a1b2c3d4"));
    assert!(root.is_dir());

    let loaded = sessions.get("a1b2c3d4").expect("record should exist");
    assert_eq!(loaded.session_id(), "a1b2c3d4");
    assert_eq!(sessions.list().len(), 1);
}

#[test]
fn test_unset_fields_default() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("bare"), "").unwrap();

    let session = GlobalActiveSessions::new(dir.path()).get("bare").unwrap();
    assert_eq!(session.session_id(), "");
    assert_eq!(session.username(), "");
    assert_eq!(session.session_timeout_kill_hours(), 0);
}

#[test]
fn test_get_missing_record() {
    let dir = tempdir().unwrap();
    let sessions = GlobalActiveSessions::new(dir.path());
    assert!(sessions.get("nope").is_none());
    assert!(sessions.get("../etc").is_none());
    assert!(sessions.create("../etc").is_err());
}

#[test]
fn test_list_returns_every_record_file() {
    let dir = tempdir().unwrap();
    let sessions = GlobalActiveSessions::new(dir.path());
    sessions.create("bbbb").unwrap();
    sessions.create("aaaa").unwrap();
    std::fs::create_dir(dir.path().join("subdir")).unwrap();

    let ids: Vec<String> = sessions.list().iter().map(|s| s.session_id()).collect();
    assert_eq!(ids, vec!["aaaa".to_string(), "bbbb".to_string()]);
}

#[test]
fn test_list_missing_root_is_empty() {
    let dir = tempdir().unwrap();
    let sessions = GlobalActiveSessions::new(dir.path().join("missing"));
    assert!(sessions.list().is_empty());
}

#[test]
fn test_destroy_removes_record() {
    let dir = tempdir().unwrap();
    let sessions = GlobalActiveSessions::new(dir.path());
    let session = sessions.create("a1b2c3d4").unwrap();

    session.destroy().unwrap();
    assert!(sessions.get("a1b2c3d4").is_none());
    assert!(sessions.list().is_empty());
    session.destroy().unwrap();
}
