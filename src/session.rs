use tracing::{debug, info, warn};

use crate::evaluator::{evaluate, Evaluation, Outcome};
use crate::inventory::{InventoryStore, MaterialRecord};
use crate::ledger::{now_timestamp, AuditEntry, AuditLedger, Progress};
use crate::persistence::{LedgerSnapshot, SnapshotStore};
use crate::reporter::{ScanReporter, SilentReporter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub target_status: String,
    pub status_filter: Option<String>,
    pub search: Option<String>,
    /// Hold matches until `confirm()` instead of recording them at once.
    pub confirm_before_commit: bool,
}

impl SessionOptions {
    pub fn new(target_status: &str) -> Self {
        Self {
            target_status: target_status.to_string(),
            status_filter: None,
            search: None,
            confirm_before_commit: false,
        }
    }

    pub fn confirm_before_commit(mut self, enabled: bool) -> Self {
        self.confirm_before_commit = enabled;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Ready,
    Resolving,
    AwaitingConfirmation,
}

/// What the presentation layer renders for one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub scanned_id: String,
    pub outcome: Outcome,
    pub record: Option<MaterialRecord>,
    pub expected_status: String,
    pub actual_status: Option<String>,
    /// Whether the scan has been appended to the ledger.
    pub committed: bool,
    /// Whether the snapshot write after the append succeeded.
    pub persisted: bool,
}

impl ScanResult {
    fn new(id: &str, target_status: &str, evaluation: &Evaluation) -> Self {
        Self {
            scanned_id: id.to_string(),
            outcome: evaluation.outcome,
            record: evaluation.record.clone(),
            expected_status: target_status.to_string(),
            actual_status: evaluation.actual_status().map(str::to_string),
            committed: false,
            persisted: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Matched
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearOutcome {
    pub removed: usize,
    pub snapshot_deleted: bool,
}

struct PendingMatch {
    result: ScanResult,
    evaluation: Evaluation,
}

/// Drives scan events for one loaded dataset: de-duplicates triggers,
/// evaluates, records to the ledger and writes the snapshot through.
pub struct ScanSession {
    inventory: InventoryStore,
    view: InventoryStore,
    options: SessionOptions,
    ledger: AuditLedger,
    store: Box<dyn SnapshotStore>,
    reporter: Box<dyn ScanReporter>,
    phase: Phase,
    last_processed: Option<String>,
    pending: Option<PendingMatch>,
    restore_candidate: Option<LedgerSnapshot>,
}

impl ScanSession {
    /// Create a session. A non-empty persisted snapshot is held as a restore
    /// candidate until `restore()` or `discard_restore()`; it is never
    /// applied or dropped implicitly.
    pub fn new(
        inventory: InventoryStore,
        store: Box<dyn SnapshotStore>,
        options: SessionOptions,
    ) -> Self {
        let view = inventory.filter(options.status_filter.as_deref(), options.search.as_deref());
        let restore_candidate = store.load().filter(|s| s.count > 0);
        if let Some(snapshot) = &restore_candidate {
            info!(
                "Previous history with {} entries is available for restore",
                snapshot.count
            );
        }

        Self {
            inventory,
            view,
            options,
            ledger: AuditLedger::new(),
            store,
            reporter: Box::new(SilentReporter),
            phase: Phase::Ready,
            last_processed: None,
            pending: None,
            restore_candidate,
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn ScanReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Process one raw input. Returns `None` when the input is ignored:
    /// blank, identical to the last processed id, arriving while a match
    /// awaits confirmation, or when the active view is empty.
    pub fn submit(&mut self, raw: &str) -> Option<ScanResult> {
        let id = raw.trim();
        if id.is_empty() {
            return None;
        }
        if self.last_processed.as_deref() == Some(id) {
            debug!("Ignoring repeated trigger for '{}'", id);
            return None;
        }
        if self.phase == Phase::AwaitingConfirmation {
            debug!("Ignoring '{}' while a match awaits confirmation", id);
            return None;
        }

        self.phase = Phase::Resolving;
        if self.view.is_empty() {
            warn!("No materials in the active view, scan of '{}' ignored", id);
            self.phase = Phase::Ready;
            return None;
        }

        let target = self.options.target_status.clone();
        let evaluation = evaluate(id, &target, &self.view);
        let mut result = ScanResult::new(id, &target, &evaluation);
        self.last_processed = Some(id.to_string());

        if result.outcome == Outcome::Matched && self.options.confirm_before_commit {
            debug!("Match for '{}' held for confirmation", id);
            self.pending = Some(PendingMatch {
                result: result.clone(),
                evaluation,
            });
            self.phase = Phase::AwaitingConfirmation;
            self.reporter.on_scan_resolved(&result);
            return Some(result);
        }

        result.persisted = self.record(id, &evaluation);
        result.committed = true;
        log_material_check(&result);
        self.phase = Phase::Ready;

        self.reporter.on_scan_resolved(&result);
        self.reporter
            .on_progress(&self.options.target_status, &self.progress());
        Some(result)
    }

    /// Record the match held for confirmation.
    pub fn confirm(&mut self) -> Option<ScanResult> {
        let PendingMatch {
            mut result,
            evaluation,
        } = self.pending.take()?;

        result.persisted = self.record(&result.scanned_id, &evaluation);
        result.committed = true;
        log_material_check(&result);
        self.last_processed = None;
        self.phase = Phase::Ready;

        self.reporter.on_commit(&result);
        self.reporter
            .on_progress(&self.options.target_status, &self.progress());
        Some(result)
    }

    /// Drop the match held for confirmation without recording it.
    pub fn skip(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        debug!("Skipped '{}'", pending.result.scanned_id);
        self.last_processed = None;
        self.phase = Phase::Ready;
        self.reporter.on_skip(&pending.result.scanned_id);
        true
    }

    /// Return the scanner to `Ready`, forgetting any pending match and the
    /// last processed id. The ledger is untouched.
    pub fn reset_scanner(&mut self) {
        self.pending = None;
        self.last_processed = None;
        self.phase = Phase::Ready;
        debug!("Scanner reset");
    }

    pub fn set_target_status(&mut self, status: &str) {
        self.options.target_status = status.to_string();
    }

    pub fn set_filter(&mut self, status: Option<&str>, search: Option<&str>) {
        self.options.status_filter = status.map(str::to_string);
        self.options.search = search.map(str::to_string);
        self.view = self.inventory.filter(status, search);
        debug!("Active view now holds {} materials", self.view.len());
    }

    /// Swap in a newly loaded dataset. The ledger is kept.
    pub fn replace_inventory(&mut self, inventory: InventoryStore) {
        self.inventory = inventory;
        self.view = self.inventory.filter(
            self.options.status_filter.as_deref(),
            self.options.search.as_deref(),
        );
        self.reset_scanner();
        info!("Dataset replaced, {} materials loaded", self.inventory.len());
    }

    pub fn progress(&self) -> Progress {
        self.ledger.progress(&self.options.target_status, &self.view)
    }

    /// Empty the ledger and delete the snapshot as one operation. A failed
    /// deletion is reported, the in-memory clear stands. An undecided
    /// restore candidate is discarded with it.
    pub fn clear_history(&mut self) -> ClearOutcome {
        let removed = self.ledger.len();
        self.ledger.clear();
        self.restore_candidate = None;

        let snapshot_deleted = match self.store.delete() {
            Ok(()) => true,
            Err(e) => {
                warn!("History cleared in memory but snapshot deletion failed: {}", e);
                self.reporter.on_persist_failed(&e.to_string());
                false
            }
        };
        info!("Cleared {} history entries", removed);
        self.reporter
            .on_progress(&self.options.target_status, &self.progress());

        ClearOutcome {
            removed,
            snapshot_deleted,
        }
    }

    /// Entry count of the persisted history found at startup, while the
    /// operator has neither restored nor discarded it.
    pub fn pending_restore(&self) -> Option<usize> {
        self.restore_candidate.as_ref().map(|s| s.count)
    }

    /// Restore the persisted history. Entries recorded in this session
    /// before the restore are kept after the restored ones. Returns the
    /// resulting ledger length.
    pub fn restore(&mut self) -> Option<usize> {
        let snapshot = self.restore_candidate.take()?;

        let mut entries = snapshot.entries;
        entries.extend(self.ledger.entries().iter().cloned());
        self.ledger.replace(entries);
        self.persist();
        info!("Restored history, {} entries", self.ledger.len());
        self.reporter
            .on_progress(&self.options.target_status, &self.progress());
        Some(self.ledger.len())
    }

    /// Drop the persisted history found at startup. From here on the
    /// snapshot holds only this session's entries. Returns the number of
    /// entries discarded.
    pub fn discard_restore(&mut self) -> Option<usize> {
        let snapshot = self.restore_candidate.take()?;
        self.persist();
        info!("Discarded previous history with {} entries", snapshot.count);
        Some(snapshot.count)
    }

    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    pub fn inventory(&self) -> &InventoryStore {
        &self.inventory
    }

    pub fn active_view(&self) -> &InventoryStore {
        &self.view
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn last_processed(&self) -> Option<&str> {
        self.last_processed.as_deref()
    }

    pub fn pending(&self) -> Option<&ScanResult> {
        self.pending.as_ref().map(|p| &p.result)
    }

    fn record(&mut self, id: &str, evaluation: &Evaluation) -> bool {
        self.ledger
            .append(AuditEntry::from_evaluation(id, evaluation, now_timestamp()));
        self.persist()
    }

    // Until the operator decides on a restore candidate, the snapshot keeps
    // the candidate's entries ahead of this session's.
    fn persist(&self) -> bool {
        let snapshot = match &self.restore_candidate {
            Some(candidate) => {
                let mut entries = candidate.entries.clone();
                entries.extend(self.ledger.entries().iter().cloned());
                LedgerSnapshot::new(entries)
            }
            None => self.ledger.snapshot(),
        };
        match self.store.save(&snapshot) {
            Ok(()) => true,
            Err(e) => {
                warn!("Snapshot save failed, continuing in memory: {}", e);
                self.reporter.on_persist_failed(&e.to_string());
                false
            }
        }
    }
}

fn log_material_check(result: &ScanResult) {
    let found = result.is_success();
    let status = result.actual_status.as_deref().unwrap_or("N/A");
    info!(
        target: "material_check",
        material_id = %result.scanned_id,
        avanco = %status,
        found,
        outcome = %result.outcome,
        "Material check"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default, Clone)]
    struct MemoryStore {
        saved: Rc<RefCell<Option<LedgerSnapshot>>>,
        saves: Rc<RefCell<usize>>,
    }

    impl SnapshotStore for MemoryStore {
        fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), Error> {
            *self.saved.borrow_mut() = Some(snapshot.clone());
            *self.saves.borrow_mut() += 1;
            Ok(())
        }
        fn load(&self) -> Option<LedgerSnapshot> {
            self.saved.borrow().clone()
        }
        fn delete(&self) -> Result<(), Error> {
            *self.saved.borrow_mut() = None;
            Ok(())
        }
    }

    fn inventory() -> InventoryStore {
        let rec = |id: &str, stage: &str, status: &str| MaterialRecord {
            id: id.to_string(),
            stage: stage.to_string(),
            trait_tag: "N/A".to_string(),
            status: status.to_string(),
        };
        InventoryStore::from_records(vec![rec("A1", "S1", "Sim"), rec("A2", "S2", "Não")])
    }

    fn session(store: MemoryStore, confirm: bool) -> ScanSession {
        ScanSession::new(
            inventory(),
            Box::new(store),
            SessionOptions::new("Sim").confirm_before_commit(confirm),
        )
    }

    #[test]
    fn test_blank_input_is_ignored() {
        let mut s = session(MemoryStore::default(), false);
        assert!(s.submit("   ").is_none());
        assert!(s.ledger().is_empty());
        assert_eq!(s.phase(), Phase::Ready);
    }

    #[test]
    fn test_repeated_trigger_is_debounced() {
        let store = MemoryStore::default();
        let mut s = session(store.clone(), false);
        assert!(s.submit("A1").is_some());
        assert!(s.submit(" A1 ").is_none());
        assert_eq!(s.ledger().len(), 1);
        assert_eq!(*store.saves.borrow(), 1);

        // A different id in between re-arms the same id
        assert!(s.submit("Z9").is_some());
        assert!(s.submit("A1").is_some());
        assert_eq!(s.ledger().len(), 3);
    }

    #[test]
    fn test_wrong_status_and_not_found_are_recorded() {
        let mut s = session(MemoryStore::default(), false);
        let wrong = s.submit("A2").unwrap();
        assert_eq!(wrong.outcome, Outcome::WrongStatus);
        assert_eq!(wrong.expected_status, "Sim");
        assert_eq!(wrong.actual_status.as_deref(), Some("Não"));
        assert!(wrong.committed && wrong.persisted);

        let missing = s.submit("Z9").unwrap();
        assert_eq!(missing.outcome, Outcome::NotFound);
        assert_eq!(s.ledger().entries()[1].stage, "Não encontrado");
        assert_eq!(s.last_processed(), Some("Z9"));
    }

    #[test]
    fn test_empty_view_is_a_no_op() {
        let mut s = session(MemoryStore::default(), false);
        s.set_filter(Some("Parcial"), None);
        assert!(s.submit("A1").is_none());
        assert!(s.last_processed().is_none());
        assert_eq!(s.phase(), Phase::Ready);
    }

    #[test]
    fn test_confirm_before_commit_holds_match() {
        let store = MemoryStore::default();
        let mut s = session(store.clone(), true);
        let held = s.submit("A1").unwrap();
        assert!(!held.committed);
        assert_eq!(s.phase(), Phase::AwaitingConfirmation);
        assert!(s.ledger().is_empty());
        assert!(s.submit("A2").is_none());

        let done = s.confirm().unwrap();
        assert!(done.committed);
        assert_eq!(s.ledger().len(), 1);
        assert_eq!(s.phase(), Phase::Ready);
        // Confirm re-arms the same id
        assert!(s.last_processed().is_none());
        assert!(s.confirm().is_none());
    }

    #[test]
    fn test_skip_discards_match() {
        let mut s = session(MemoryStore::default(), true);
        s.submit("A1").unwrap();
        assert!(s.skip());
        assert!(s.ledger().is_empty());
        assert!(!s.skip());
        assert!(s.submit("A1").is_some());
    }

    #[test]
    fn test_non_matches_bypass_confirmation() {
        let mut s = session(MemoryStore::default(), true);
        let r = s.submit("Z9").unwrap();
        assert!(r.committed);
        assert_eq!(s.phase(), Phase::Ready);
    }

    #[test]
    fn test_restore_is_explicit_and_merges() {
        let store = MemoryStore::default();
        {
            let mut first = session(store.clone(), false);
            first.submit("A1");
            first.submit("A2");
        }

        let mut second = session(store.clone(), false);
        assert!(second.ledger().is_empty());
        assert_eq!(second.pending_restore(), Some(2));

        second.submit("Z9");
        // The undecided candidate stays on disk ahead of the new entry
        assert_eq!(store.load().unwrap().count, 3);
        assert_eq!(second.ledger().len(), 1);
        assert_eq!(second.pending_restore(), Some(2));

        assert_eq!(second.restore(), Some(3));
        let ids: Vec<&str> = second.ledger().entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A2", "Z9"]);
        assert!(second.pending_restore().is_none());
        assert_eq!(store.load().unwrap().count, 3);
    }

    #[test]
    fn test_undecided_history_survives_another_session() {
        let store = MemoryStore::default();
        {
            let mut first = session(store.clone(), false);
            first.submit("A1");
            first.submit("A2");
            first.submit("Z8");
        }
        {
            let mut second = session(store.clone(), false);
            second.submit("Z9");
        }

        let third = session(store.clone(), false);
        assert_eq!(third.pending_restore(), Some(4));
        let ids: Vec<String> = store.load().unwrap().entries.into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["A1", "A2", "Z8", "Z9"]);
    }

    #[test]
    fn test_smaller_candidate_still_restorable() {
        let store = MemoryStore::default();
        {
            let mut first = session(store.clone(), false);
            first.submit("A1");
        }

        let mut second = session(store.clone(), false);
        second.submit("A2");
        second.submit("Z9");
        assert_eq!(second.pending_restore(), Some(1));
        assert_eq!(second.restore(), Some(3));
        let ids: Vec<&str> = second.ledger().entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A2", "Z9"]);
    }

    #[test]
    fn test_discard_restore_keeps_session_entries_only() {
        let store = MemoryStore::default();
        {
            let mut first = session(store.clone(), false);
            first.submit("A1");
            first.submit("A2");
        }

        let mut second = session(store.clone(), false);
        second.submit("Z9");
        assert_eq!(second.discard_restore(), Some(2));
        assert!(second.pending_restore().is_none());
        assert!(second.restore().is_none());
        assert!(second.discard_restore().is_none());

        let saved = store.load().unwrap();
        assert_eq!(saved.count, 1);
        assert_eq!(saved.entries[0].id, "Z9");
    }

    #[derive(Default, Clone)]
    struct ProgressLog(Rc<RefCell<Vec<Progress>>>);

    impl ScanReporter for ProgressLog {
        fn on_progress(&self, _target_status: &str, progress: &Progress) {
            self.0.borrow_mut().push(*progress);
        }
    }

    #[test]
    fn test_clear_and_restore_report_progress() {
        let store = MemoryStore::default();
        {
            let mut first = session(store.clone(), false);
            first.submit("A1");
        }

        let log = ProgressLog::default();
        let mut s = session(store.clone(), false).with_reporter(Box::new(log.clone()));
        s.restore();
        assert_eq!(
            log.0.borrow().last(),
            Some(&Progress { total: 1, verified: 1, remaining: 0 })
        );

        s.clear_history();
        assert_eq!(log.0.borrow().len(), 2);
        assert_eq!(
            log.0.borrow().last(),
            Some(&Progress { total: 1, verified: 0, remaining: 1 })
        );
    }

    #[test]
    fn test_clear_history_deletes_snapshot() {
        let store = MemoryStore::default();
        let mut s = session(store.clone(), false);
        s.submit("A1");
        let outcome = s.clear_history();
        assert_eq!(outcome, ClearOutcome { removed: 1, snapshot_deleted: true });
        assert!(s.ledger().is_empty());
        assert!(store.load().is_none());
    }

    #[test]
    fn test_reset_scanner_rearms_last_id() {
        let mut s = session(MemoryStore::default(), false);
        s.submit("A1");
        s.reset_scanner();
        assert!(s.submit("A1").is_some());
        assert_eq!(s.ledger().len(), 2);
    }
}
