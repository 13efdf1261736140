use super::CaseService;
use crate::cases::FrozenSnapshot;
use crate::core::{CaseId, Result};
use crate::issues::{IssueRecord, IssueStage};
use crate::register::RegisterEntry;
use async_trait::async_trait;

/// Read-only view handed to document renderers. Nothing here can mutate
/// case state.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Normalized issue records of one stage tag.
    async fn issue_records(&self, case_id: CaseId, stage: IssueStage) -> Result<Vec<IssueRecord>>;

    /// The write-once copy taken at finalization, if the case has one.
    async fn frozen_snapshot(&self, case_id: CaseId) -> Result<Option<FrozenSnapshot>>;

    async fn register_entries(&self, case_id: CaseId) -> Result<Vec<RegisterEntry>>;
}

#[async_trait]
impl DocumentSource for CaseService {
    async fn issue_records(&self, case_id: CaseId, stage: IssueStage) -> Result<Vec<IssueRecord>> {
        self.issues(case_id, Some(stage)).await
    }

    async fn frozen_snapshot(&self, case_id: CaseId) -> Result<Option<FrozenSnapshot>> {
        Ok(self.get(case_id).await?.header().frozen.clone())
    }

    async fn register_entries(&self, case_id: CaseId) -> Result<Vec<RegisterEntry>> {
        CaseService::register_entries(self, case_id).await
    }
}
