//! Tests for session module.

use super::*;
use crate::storage::LegacyPropertyStore;
use proptest::prelude::*;
use tempfile::TempDir;

fn empty_session(id: &str) -> ActiveSession {
    let storage = Arc::new(LegacyPropertyStore::new("/nonexistent/properites"));
    ActiveSession::new_empty(storage, id)
}

fn create_test_session() -> (ActiveSession, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let scratch = temp_dir.path().join("a1b2c3d4");
    let storage = Arc::new(LegacyPropertyStore::new(session_paths::properties_path(
        &scratch,
    )));
    let session = ActiveSession::provision(storage, "a1b2c3d4", scratch);
    (session, temp_dir)
}

fn ranked(id: &str, executing: bool, running: bool, last_used: f64) -> ActiveSession {
    let mut session = empty_session(id);
    session.sort_conditions = SortConditions {
        executing,
        running,
        last_used,
    };
    session
}

#[test]
fn test_empty_session_returns_defaults() {
    let session = empty_session("gone");

    assert!(session.is_empty());
    assert_eq!(session.id(), "gone");
    assert_eq!(session.project(), "");
    assert_eq!(session.working_dir(), "");
    assert!(session.initial());
    assert_eq!(session.last_used(), 0.0);
    assert!(!session.executing());
    assert!(!session.save_prompt_required());
    assert!(!session.running());
    assert_eq!(session.r_version(), "");
    assert_eq!(session.r_version_home(), "");
    assert_eq!(session.r_version_label(), "");
    assert_eq!(session.label(), "");
    assert_eq!(session.launch_parameters(), "");
    assert_eq!(session.suspend_size(), 0);
}

#[test]
fn test_empty_session_setters_are_noops() {
    let session = empty_session("gone");
    session.set_project("~/proj");
    session.set_last_used();
    session.begin_session("4.2.0", "/usr/lib/R", "");
    session.end_session();

    assert_eq!(session.project(), "");
    assert_eq!(session.last_used(), 0.0);
    assert!(session.destroy().is_ok());
    assert!(!session.validate(Path::new("/home/nobody"), true));
}

#[test]
fn test_provision_creates_directories() {
    let (session, _dir) = create_test_session();
    assert!(session.scratch_path().unwrap().is_dir());
    assert!(session.properties_path().unwrap().is_dir());
    assert!(session.properties_path().unwrap().ends_with("properites"));
}

#[test]
fn test_typed_properties_persist() {
    let (session, _dir) = create_test_session();

    session.set_project("~/proj");
    session.set_working_dir("~/proj/src");
    session.set_initial(true);
    session.set_executing(true);
    session.set_save_prompt_required(true);
    session.set_label("My analysis");
    session.set_launch_parameters("--vanilla");

    assert_eq!(session.project(), "~/proj");
    assert_eq!(session.working_dir(), "~/proj/src");
    assert!(session.initial());
    assert!(session.executing());
    assert!(session.save_prompt_required());
    assert_eq!(session.label(), "My analysis");
    assert_eq!(session.launch_parameters(), "--vanilla");

    let props = session.properties_path().unwrap();
    assert_eq!(std::fs::read_to_string(props.join("executing")).unwrap(), "1");
    assert_eq!(
        std::fs::read_to_string(props.join("launch-parameters")).unwrap(),
        "--vanilla"
    );
}

#[test]
fn test_initial_defaults_to_false_for_real_sessions() {
    let (session, _dir) = create_test_session();
    assert!(!session.initial());
}

#[test]
fn test_unparseable_values_fall_back_to_defaults() {
    let (session, _dir) = create_test_session();
    let props = session.properties_path().unwrap();
    std::fs::write(props.join("running"), "maybe").unwrap();
    std::fs::write(props.join("last-used"), "yesterday").unwrap();

    assert!(!session.running());
    assert_eq!(session.last_used(), 0.0);
}

#[test]
fn test_parse_bool_accepts_legacy_forms() {
    assert_eq!(parse_bool("1"), Some(true));
    assert_eq!(parse_bool("0"), Some(false));
    assert_eq!(parse_bool("true"), Some(true));
    assert_eq!(parse_bool("false"), Some(false));
    assert_eq!(parse_bool(""), None);
}

#[test]
fn test_last_used_is_epoch_millis() {
    let (session, _dir) = create_test_session();
    let before = chrono::Utc::now().timestamp_millis() as f64;
    session.set_last_used();

    let stamped = session.last_used();
    assert!(stamped >= before);

    let raw = std::fs::read_to_string(session.properties_path().unwrap().join("last-used")).unwrap();
    assert!(raw.chars().all(|c| c.is_ascii_digit()), "raw = {}", raw);
}

#[test]
fn test_begin_then_end_session() {
    let (session, _dir) = create_test_session();
    session.set_last_used();
    let before = session.last_used();

    session.begin_session("4.2.0", "/usr/lib/R", "4.2");
    assert!(session.running());
    assert_eq!(session.r_version(), "4.2.0");

    session.set_executing(true);
    session.end_session();

    assert!(!session.running());
    assert!(!session.executing());
    assert!(session.last_used() > before);
    assert_eq!(session.r_version_label(), "4.2");
}

#[test]
fn test_suspend_size_counts_scratch_tree() {
    let (session, _dir) = create_test_session();
    let scratch = session.scratch_path().unwrap();
    std::fs::create_dir_all(scratch.join("suspended-session-data")).unwrap();
    std::fs::write(scratch.join("suspended-session-data/env.rds"), vec![0u8; 100]).unwrap();

    assert!(session.suspend_size() >= 100);
}

#[test]
fn test_destroy_is_idempotent() {
    let (session, _dir) = create_test_session();
    session.destroy().unwrap();
    assert!(!session.scratch_path().unwrap().exists());
    assert_eq!(session.suspend_size(), 0);
    session.destroy().unwrap();

    // Reads after destruction degrade to defaults
    assert_eq!(session.project(), "");
}

#[test]
fn test_validate_requires_core_properties() {
    let dir = TempDir::new().unwrap();
    let (session, _scratch) = create_test_session();

    assert!(!session.validate(dir.path(), false));
    session.set_project(PROJECT_NONE);
    assert!(!session.validate(dir.path(), false));
    session.set_working_dir("~");
    assert!(!session.validate(dir.path(), false));
    session.set_last_used();
    assert!(session.validate(dir.path(), false));
}

#[test]
fn test_validate_checks_project_descriptor() {
    let home = TempDir::new().unwrap();
    let (session, _scratch) = create_test_session();
    session.set_project("~/proj");
    session.set_working_dir("~/proj");
    session.set_last_used();

    assert!(!session.validate(home.path(), false));

    std::fs::create_dir(home.path().join("proj")).unwrap();
    assert!(!session.validate(home.path(), false));

    std::fs::write(home.path().join("proj/proj.Rproj"), "Version: 1.0\n").unwrap();
    assert!(session.validate(home.path(), false));
}

#[test]
fn test_validate_fails_without_properties_dir() {
    let home = TempDir::new().unwrap();
    let (session, _scratch) = create_test_session();
    session.set_project(PROJECT_NONE);
    session.set_working_dir("~");
    session.set_last_used();
    std::fs::remove_dir_all(session.properties_path().unwrap()).unwrap();

    assert!(!session.validate(home.path(), false));
    // The scratch directory itself is left alone
    assert!(session.scratch_path().unwrap().exists());
}

#[test]
fn test_ranking_precedence() {
    let executing = ranked("a", true, false, 1.0);
    let running = ranked("b", false, true, 5.0);
    let recent = ranked("c", false, false, 9.0);
    let stale = ranked("d", false, false, 2.0);

    assert!(executing.greater_than(&running));
    assert!(running.greater_than(&recent));
    assert!(recent.greater_than(&stale));
    assert!(!stale.greater_than(&recent));
}

#[test]
fn test_ranking_ties_break_by_id_descending() {
    let a = ranked("aaaa0000", false, true, 10.0);
    let b = ranked("bbbb0000", false, true, 10.0);

    assert!(b.greater_than(&a));
    assert!(!a.greater_than(&b));
    assert_eq!(a.rank_cmp(&a), Ordering::Equal);
}

#[test]
fn test_refresh_reads_snapshot_once() {
    let (mut session, _dir) = create_test_session();
    session.set_running(true);
    session.set_last_used();
    assert_eq!(session.sort_conditions(), SortConditions::default());

    session.refresh_sort_conditions();
    let snapshot = session.sort_conditions();
    assert!(snapshot.running);
    assert!(snapshot.last_used > 0.0);

    // Later writes are not reflected until the next refresh
    session.set_running(false);
    assert!(session.sort_conditions().running);
}

type RankInput = (String, bool, bool, f64);

fn rank_input() -> impl Strategy<Value = RankInput> {
    (
        "[a-f0-9]{8}",
        any::<bool>(),
        any::<bool>(),
        prop_oneof![Just(0.0), Just(1000.0), 0.0..2.0e12f64],
    )
}

fn from_input(input: &RankInput) -> ActiveSession {
    let (id, executing, running, last_used) = input;
    ranked(id, *executing, *running, *last_used)
}

proptest! {
    #[test]
    fn prop_ranking_is_antisymmetric(a in rank_input(), b in rank_input()) {
        let (a, b) = (from_input(&a), from_input(&b));
        prop_assert_eq!(a.rank_cmp(&b), b.rank_cmp(&a).reverse());
        if a.id() != b.id() {
            prop_assert_ne!(a.rank_cmp(&b), Ordering::Equal);
        }
    }

    #[test]
    fn prop_ranking_is_transitive(a in rank_input(), b in rank_input(), c in rank_input()) {
        let (a, b, c) = (from_input(&a), from_input(&b), from_input(&c));
        if a.greater_than(&b) && b.greater_than(&c) {
            prop_assert!(a.greater_than(&c));
        }
    }

    #[test]
    fn prop_sorted_batch_is_descending(inputs in prop::collection::vec(rank_input(), 0..12)) {
        let mut batch: Vec<ActiveSession> = inputs.iter().map(from_input).collect();
        batch.sort_by(|a, b| b.rank_cmp(a));
        for pair in batch.windows(2) {
            prop_assert!(pair[0].rank_cmp(&pair[1]) != Ordering::Less);
        }
    }
}
