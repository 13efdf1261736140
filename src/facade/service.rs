use crate::cases::{self, CaseFilter, CasePatch, CaseRecord, NewCase};
use crate::config::StoreConfig;
use crate::core::{CaseError, CaseId, Result};
use crate::drafts::{self, DraftSnapshot, SaveOutcome};
use crate::finalize::{self, FinalizeRequest};
use crate::issues::{self, IssueChanges, IssueId, IssueRecord, IssueStage, NewIssue};
use crate::register::{self, RegisterEntry, RegisterKind};
use crate::registry;
use crate::storage::{CaseStore, StoreStats};
use crate::workflow::{self, Stage, StageLogEntry, TransitionMatrix};
use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};

/// Entry point for editing surfaces. Every call is one store transaction.
///
/// Cheap to clone; clones share the same store.
///
/// # Examples
///
/// ```no_run
/// # use casekeeper::{CaseService, NewCase, Stage, Taxpayer};
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let service = CaseService::in_memory();
/// let id = service
///     .create(NewCase::scrutiny(Taxpayer::new("27AAPFU0939F1ZV", "Acme"), "2023-24"))
///     .await
///     .unwrap();
/// service.transition(id, Stage::IntimationDrafted).await.unwrap();
/// # });
/// ```
#[derive(Clone)]
pub struct CaseService {
    store: Arc<CaseStore>,
    matrix: Arc<TransitionMatrix>,
    snapshot_retention: usize,
}

impl CaseService {
    /// Bootstrap from `config`: validate it, open the store and recover any
    /// committed state. Opening the same directory again yields the same
    /// state.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let store = CaseStore::open(config)?;
        Ok(Self::with_store(store, config.snapshot_retention))
    }

    pub fn in_memory() -> Self {
        Self::with_store(CaseStore::in_memory(), StoreConfig::default().snapshot_retention)
    }

    fn with_store(store: CaseStore, snapshot_retention: usize) -> Self {
        Self {
            store: Arc::new(store),
            matrix: Arc::new(TransitionMatrix::standard()),
            snapshot_retention,
        }
    }

    pub fn matrix(&self) -> &TransitionMatrix {
        &self.matrix
    }

    /// Read-only access to the underlying store. Writes only go through the
    /// operations on this type:
    ///
    /// ```compile_fail
    /// # async fn tamper(service: casekeeper::CaseService) {
    /// service.store().transact(|_txn| Ok(())).await.unwrap();
    /// # }
    /// ```
    pub fn store(&self) -> &CaseStore {
        &self.store
    }

    // ------------------------------------------------------------------
    // Cases
    // ------------------------------------------------------------------

    pub async fn create(&self, new_case: NewCase) -> Result<CaseId> {
        let span = info_span!("case.create", origin = %new_case.origin);
        async move {
            let record = self
                .store
                .transact(|txn| cases::create(txn, new_case))
                .await?;
            event!(Level::INFO, case_id = %record.id(), "case created");
            Ok(record.id())
        }
        .instrument(span)
        .await
    }

    pub async fn get(&self, id: CaseId) -> Result<CaseRecord> {
        self.store.read(|tables| cases::get(tables, id)).await
    }

    pub async fn list(&self, filter: &CaseFilter) -> Result<Vec<CaseRecord>> {
        self.store.read(|tables| Ok(cases::list(tables, filter))).await
    }

    /// Apply `patch`. With `expected_version`, a stale version is reported
    /// as `ConcurrencyConflict` and nothing is written.
    pub async fn update(
        &self,
        id: CaseId,
        patch: CasePatch,
        expected_version: Option<u64>,
    ) -> Result<CaseRecord> {
        let span = info_span!("case.update", case_id = %id, expected_version = ?expected_version);
        async move {
            let result = self
                .store
                .transact(|txn| cases::update(txn, id, patch, expected_version))
                .await;
            if let Err(err @ CaseError::ConcurrencyConflict { .. }) = &result {
                event!(Level::INFO, error = %err, "update lost a version race");
            }
            result
        }
        .instrument(span)
        .await
    }

    pub async fn delete(&self, id: CaseId, expected_version: Option<u64>) -> Result<()> {
        let span = info_span!("case.delete", case_id = %id);
        self.store
            .transact(|txn| cases::delete(txn, id, expected_version))
            .instrument(span)
            .await
    }

    // ------------------------------------------------------------------
    // Workflow
    // ------------------------------------------------------------------

    pub async fn transition(&self, id: CaseId, target: Stage) -> Result<CaseRecord> {
        self.transition_inner(id, target, None).await
    }

    pub async fn transition_expecting(
        &self,
        id: CaseId,
        target: Stage,
        expected_version: u64,
    ) -> Result<CaseRecord> {
        self.transition_inner(id, target, Some(expected_version)).await
    }

    async fn transition_inner(
        &self,
        id: CaseId,
        target: Stage,
        expected_version: Option<u64>,
    ) -> Result<CaseRecord> {
        let span = info_span!("case.transition", case_id = %id, target = %target);
        let matrix = Arc::clone(&self.matrix);
        self.store
            .transact(move |txn| workflow::transition(txn, &matrix, id, target, expected_version))
            .instrument(span)
            .await
    }

    pub async fn stage_history(&self, id: CaseId) -> Result<Vec<StageLogEntry>> {
        self.store
            .read(|tables| {
                let entries = workflow::history(tables, id);
                if entries.is_empty() {
                    registry::resolve(tables, id)?;
                }
                Ok(entries)
            })
            .await
    }

    pub async fn finalize(&self, id: CaseId, request: FinalizeRequest) -> Result<CaseId> {
        let span = info_span!("case.finalize", case_id = %id, actor = %request.actor);
        let matrix = Arc::clone(&self.matrix);
        async move {
            let result = self
                .store
                .transact(move |txn| finalize::finalize(txn, &matrix, id, request))
                .await;
            match &result {
                Ok(downstream) => {
                    event!(Level::INFO, downstream = %downstream, "finalize committed")
                }
                Err(err) => event!(Level::WARN, error = %err, "finalize aborted"),
            }
            result
        }
        .instrument(span)
        .await
    }

    // ------------------------------------------------------------------
    // Issue records
    // ------------------------------------------------------------------

    pub async fn add_issue(&self, case_id: CaseId, issue: NewIssue) -> Result<IssueRecord> {
        let span = info_span!("issue.add", case_id = %case_id, stage = %issue.stage);
        self.store
            .transact(|txn| issues::add(txn, case_id, issue))
            .instrument(span)
            .await
    }

    pub async fn update_issue(
        &self,
        case_id: CaseId,
        issue_id: IssueId,
        changes: IssueChanges,
    ) -> Result<IssueRecord> {
        let span = info_span!("issue.update", case_id = %case_id, issue_id = %issue_id);
        self.store
            .transact(|txn| issues::update(txn, case_id, issue_id, changes))
            .instrument(span)
            .await
    }

    pub async fn remove_issue(&self, case_id: CaseId, issue_id: IssueId) -> Result<()> {
        let span = info_span!("issue.remove", case_id = %case_id, issue_id = %issue_id);
        self.store
            .transact(|txn| issues::remove(txn, case_id, issue_id))
            .instrument(span)
            .await
    }

    pub async fn issues(&self, case_id: CaseId, stage: Option<IssueStage>) -> Result<Vec<IssueRecord>> {
        self.store
            .read(|tables| issues::list(tables, case_id, stage))
            .await
    }

    // ------------------------------------------------------------------
    // Draft snapshots
    // ------------------------------------------------------------------

    pub async fn save_snapshot(&self, case_id: CaseId, blob: serde_json::Value) -> Result<SaveOutcome> {
        let retention = self.snapshot_retention;
        self.store
            .transact(|txn| drafts::save(txn, case_id, blob, retention))
            .instrument(info_span!("draft.save", case_id = %case_id))
            .await
    }

    pub async fn list_snapshots(&self, case_id: CaseId) -> Result<Vec<DraftSnapshot>> {
        self.store.read(|tables| drafts::list(tables, case_id)).await
    }

    pub async fn latest_snapshot(&self, case_id: CaseId) -> Result<Option<DraftSnapshot>> {
        self.store.read(|tables| drafts::latest(tables, case_id)).await
    }

    // ------------------------------------------------------------------
    // Register
    // ------------------------------------------------------------------

    pub async fn register_entry(&self, kind: RegisterKind, reference: &str) -> Result<RegisterEntry> {
        self.store
            .read(|tables| register::get(tables, kind, reference))
            .await
    }

    pub async fn register_entries(&self, case_id: CaseId) -> Result<Vec<RegisterEntry>> {
        self.store
            .read(|tables| Ok(register::entries_for_case(tables, case_id)))
            .await
    }

    // ------------------------------------------------------------------
    // Maintenance
    // ------------------------------------------------------------------

    pub async fn checkpoint(&self) -> Result<()> {
        self.store
            .checkpoint()
            .instrument(info_span!("store.checkpoint"))
            .await
    }

    pub async fn stats(&self) -> StoreStats {
        self.store.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Taxpayer;
    use serde_json::json;

    fn scrutiny() -> NewCase {
        NewCase::scrutiny(Taxpayer::new("27AAPFU0939F1ZV", "Acme Traders"), "2023-24")
    }

    #[tokio::test]
    async fn test_raw_writes_cannot_rewind_or_rewrite_issued_data() {
        use crate::core::SkipGuards;
        use crate::transaction::Change;

        let service = CaseService::in_memory();
        let id = service
            .create(
                NewCase::adjudication(Taxpayer::new("27AAPFU0939F1ZV", "Acme Traders"), "2023-24")
                    .skip_guards(SkipGuards::bypass_intimation()),
            )
            .await
            .unwrap();
        service.transition(id, Stage::NoticeDrafted).await.unwrap();
        let issue = service
            .add_issue(id, NewIssue::new(IssueStage::Notice, "ITC-1", "excess ITC"))
            .await
            .unwrap();
        let record = service.transition(id, Stage::NoticeIssued).await.unwrap();

        let mut tampered = issue.clone();
        tampered.description = "tampered".into();
        let mut rewound = record.clone();
        rewound.header_mut().stage = Stage::Intake;
        let err = service
            .store()
            .transact(|txn| {
                txn.apply(Change::PutCase(rewound))?;
                txn.apply(Change::PutIssue(tampered))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CaseError::IllegalTransition { .. }));

        assert_eq!(service.get(id).await.unwrap().stage(), Stage::NoticeIssued);
        let stored = service.issues(id, Some(IssueStage::Notice)).await.unwrap();
        assert_eq!(stored[0].description, "excess ITC");
    }

    #[tokio::test]
    async fn test_create_and_transition() {
        let service = CaseService::in_memory();
        let id = service.create(scrutiny()).await.unwrap();
        let record = service.transition(id, Stage::IntimationDrafted).await.unwrap();
        assert_eq!(record.version(), 2);
        assert_eq!(service.stage_history(id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_transition_expecting_checks_version() {
        let service = CaseService::in_memory();
        let id = service.create(scrutiny()).await.unwrap();
        let err = service
            .transition_expecting(id, Stage::IntimationDrafted, 7)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(service.get(id).await.unwrap().stage(), Stage::Intake);
    }

    #[tokio::test]
    async fn test_unknown_case_history_is_not_found() {
        let service = CaseService::in_memory();
        assert!(matches!(
            service.stage_history(CaseId::new()).await,
            Err(CaseError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip_through_service() {
        let service = CaseService::in_memory();
        let id = service.create(scrutiny()).await.unwrap();
        let outcome = service.save_snapshot(id, json!({"para": 1})).await.unwrap();
        assert!(outcome.is_stored());
        let latest = service.latest_snapshot(id).await.unwrap().unwrap();
        assert_eq!(latest.blob, json!({"para": 1}));
    }
}
