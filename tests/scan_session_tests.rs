use std::path::Path;
use tempfile::tempdir;

use material_checker::inventory::loader;
use material_checker::{
    Error, InventoryStore, JsonFileStore, LedgerSnapshot, Outcome, Phase, Progress, ScanSession,
    SessionOptions, SnapshotStore,
};

const DATASET: &str = "\
etapa_programa,id_codigo,avanco,trait
S1,A1,Sim,CE3
S2,A2,Não,E3
S3,A3,Sim,CONV
";

fn load(csv: &str) -> InventoryStore {
    let table = loader::read_from(csv.as_bytes()).unwrap();
    let (store, issues) = InventoryStore::load(&table).unwrap();
    assert!(issues.is_empty());
    store
}

fn open_session(dir: &Path, options: SessionOptions) -> ScanSession {
    ScanSession::new(
        load(DATASET),
        Box::new(JsonFileStore::new(dir, "history")),
        options,
    )
}

/// Store whose writes always fail, standing in for an unavailable disk.
struct BrokenStore;

impl SnapshotStore for BrokenStore {
    fn save(&self, _snapshot: &LedgerSnapshot) -> Result<(), Error> {
        Err(Error::Other("disk unavailable".to_string()))
    }
    fn load(&self) -> Option<LedgerSnapshot> {
        None
    }
    fn delete(&self) -> Result<(), Error> {
        Err(Error::Other("disk unavailable".to_string()))
    }
}

#[test]
fn test_matched_wrong_status_not_found_scenario() {
    let dir = tempdir().unwrap();
    let mut session = ScanSession::new(
        load("etapa_programa,id_codigo,avanco\nS1,A1,Sim\nS2,A2,Não\n"),
        Box::new(JsonFileStore::new(dir.path(), "history")),
        SessionOptions::new("Sim"),
    );

    let first = session.submit("A1").unwrap();
    assert_eq!(first.outcome, Outcome::Matched);
    assert_eq!(session.ledger().len(), 1);
    assert_eq!(
        session.progress(),
        Progress {
            total: 1,
            verified: 1,
            remaining: 0
        }
    );

    let second = session.submit("A2").unwrap();
    assert_eq!(second.outcome, Outcome::WrongStatus);
    assert_eq!(second.expected_status, "Sim");
    assert_eq!(second.actual_status.as_deref(), Some("Não"));

    let third = session.submit("Z9").unwrap();
    assert_eq!(third.outcome, Outcome::NotFound);
    assert!(third.record.is_none());

    assert_eq!(session.ledger().len(), 3);
    assert_eq!(session.phase(), Phase::Ready);
}

#[test]
fn test_each_scan_is_written_through() {
    let dir = tempdir().unwrap();
    let mut session = open_session(dir.path(), SessionOptions::new("Sim"));
    let store = JsonFileStore::new(dir.path(), "history");

    session.submit("A1");
    assert_eq!(store.load().unwrap().count, 1);
    session.submit("nope");
    let snapshot = store.load().unwrap();
    assert_eq!(snapshot.count, 2);
    assert_eq!(snapshot.entries, session.ledger().entries());
}

#[test]
fn test_repeated_trigger_appends_once() {
    let dir = tempdir().unwrap();
    let mut session = open_session(dir.path(), SessionOptions::new("Sim"));
    assert!(session.submit("A3").is_some());
    assert!(session.submit("A3").is_none());
    assert!(session.submit("A3\n").is_none());
    assert_eq!(session.ledger().len(), 1);
}

#[test]
fn test_history_survives_restart_and_restore_is_explicit() {
    let dir = tempdir().unwrap();
    {
        let mut session = open_session(dir.path(), SessionOptions::new("Sim"));
        session.submit("A1");
        session.submit("A2");
        session.submit("A3");
    }

    let mut restarted = open_session(dir.path(), SessionOptions::new("Sim"));
    assert!(restarted.ledger().is_empty());
    assert_eq!(restarted.pending_restore(), Some(3));

    assert_eq!(restarted.restore(), Some(3));
    let ids: Vec<&str> = restarted
        .ledger()
        .entries()
        .iter()
        .map(|e| e.id.as_str())
        .collect();
    assert_eq!(ids, vec!["A1", "A2", "A3"]);
    assert_eq!(restarted.progress().verified, 2);
    assert!(restarted.restore().is_none());
}

#[test]
fn test_unrestored_history_is_not_overwritten_on_disk() {
    let dir = tempdir().unwrap();
    {
        let mut session = open_session(dir.path(), SessionOptions::new("Sim"));
        session.submit("A1");
        session.submit("A2");
        session.submit("A3");
    }
    {
        // Operator never answers the restore question, scans once, quits
        let mut session = open_session(dir.path(), SessionOptions::new("Sim"));
        assert_eq!(session.pending_restore(), Some(3));
        session.submit("Z9");
        assert_eq!(session.ledger().len(), 1);
    }

    let store = JsonFileStore::new(dir.path(), "history");
    let snapshot = store.load().unwrap();
    assert_eq!(snapshot.count, 4);

    let mut third = open_session(dir.path(), SessionOptions::new("Sim"));
    assert_eq!(third.pending_restore(), Some(4));
    assert_eq!(third.restore(), Some(4));
    let ids: Vec<&str> = third
        .ledger()
        .entries()
        .iter()
        .map(|e| e.id.as_str())
        .collect();
    assert_eq!(ids, vec!["A1", "A2", "A3", "Z9"]);
}

#[test]
fn test_restore_after_session_outgrows_saved_history() {
    let dir = tempdir().unwrap();
    {
        let mut session = open_session(dir.path(), SessionOptions::new("Sim"));
        session.submit("A1");
    }

    let mut session = open_session(dir.path(), SessionOptions::new("Sim"));
    session.submit("A2");
    session.submit("A3");
    assert_eq!(session.pending_restore(), Some(1));

    assert_eq!(session.restore(), Some(3));
    assert_eq!(session.progress().verified, 2);
    let store = JsonFileStore::new(dir.path(), "history");
    assert_eq!(store.load().unwrap().entries, session.ledger().entries());
}

#[test]
fn test_discarded_history_is_dropped_from_disk() {
    let dir = tempdir().unwrap();
    {
        let mut session = open_session(dir.path(), SessionOptions::new("Sim"));
        session.submit("A1");
        session.submit("A2");
    }

    let mut session = open_session(dir.path(), SessionOptions::new("Sim"));
    session.submit("A3");
    assert_eq!(session.discard_restore(), Some(2));

    let store = JsonFileStore::new(dir.path(), "history");
    let snapshot = store.load().unwrap();
    assert_eq!(snapshot.count, 1);
    assert_eq!(snapshot.entries[0].id, "A3");
}

#[test]
fn test_clear_history_removes_snapshot() {
    let dir = tempdir().unwrap();
    let mut session = open_session(dir.path(), SessionOptions::new("Sim"));
    session.submit("A1");
    let outcome = session.clear_history();
    assert_eq!(outcome.removed, 1);
    assert!(outcome.snapshot_deleted);

    let restarted = open_session(dir.path(), SessionOptions::new("Sim"));
    assert!(restarted.pending_restore().is_none());
}

#[test]
fn test_persistence_failure_keeps_session_running() {
    let mut session = ScanSession::new(
        load(DATASET),
        Box::new(BrokenStore),
        SessionOptions::new("Sim"),
    );

    let result = session.submit("A1").unwrap();
    assert!(result.committed);
    assert!(!result.persisted);
    session.submit("A3");
    assert_eq!(session.ledger().len(), 2);

    let outcome = session.clear_history();
    assert_eq!(outcome.removed, 2);
    assert!(!outcome.snapshot_deleted);
    assert!(session.ledger().is_empty());
}

#[test]
fn test_progress_follows_filter_and_target() {
    let dir = tempdir().unwrap();
    let mut session = open_session(dir.path(), SessionOptions::new("Sim"));
    session.submit("A1");
    assert_eq!(session.progress().total, 2);

    session.set_filter(None, Some("s3"));
    let p = session.progress();
    assert_eq!(p.total, 1);
    // A1 stays verified even though it is outside the view
    assert_eq!(p.verified, 1);
    assert_eq!(p.remaining, 0);

    // Out-of-view ids read as not found
    let r = session.submit("A2").unwrap();
    assert_eq!(r.outcome, Outcome::NotFound);

    session.set_filter(None, None);
    session.set_target_status("Não");
    let p = session.progress();
    assert_eq!((p.total, p.verified, p.remaining), (1, 0, 1));
}

#[test]
fn test_remaining_always_total_minus_verified() {
    let dir = tempdir().unwrap();
    let mut session = open_session(dir.path(), SessionOptions::new("Sim"));
    for id in ["A1", "A2", "Z1", "A3", "A1", "A2", "A1"] {
        session.submit(id);
        let p = session.progress();
        assert_eq!(p.remaining, p.total as i64 - p.verified as i64);
    }
    // A1 was verified three times: the counter is not clamped
    assert_eq!(session.progress().remaining, -2);
}

#[test]
fn test_replace_inventory_keeps_ledger() {
    let dir = tempdir().unwrap();
    let mut session = open_session(dir.path(), SessionOptions::new("Sim"));
    session.submit("A1");

    session.replace_inventory(load("etapa_programa,id_codigo,avanco\nS9,B1,Sim\n"));
    assert_eq!(session.ledger().len(), 1);
    assert!(session.last_processed().is_none());
    assert_eq!(session.submit("A1").unwrap().outcome, Outcome::NotFound);
    assert_eq!(session.submit("B1").unwrap().outcome, Outcome::Matched);
}

#[test]
fn test_confirm_policy_records_on_confirm_only() {
    let dir = tempdir().unwrap();
    let mut session = open_session(
        dir.path(),
        SessionOptions::new("Sim").confirm_before_commit(true),
    );
    let store = JsonFileStore::new(dir.path(), "history");

    let held = session.submit("A1").unwrap();
    assert!(!held.committed);
    assert!(session.pending().is_some());
    assert!(store.load().is_none());

    let done = session.confirm().unwrap();
    assert!(done.committed && done.persisted);
    assert_eq!(store.load().unwrap().count, 1);
}
