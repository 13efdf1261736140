// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Every write a transaction performs is expressed as a Change. The same value
// is applied to the transaction's working tables, kept in the transaction's
// change log, and appended to the WAL on commit, so live execution and
// crash recovery share one code path (`Tables::apply`).
//
// ============================================================================

use crate::cases::CaseRecord;
use crate::core::{CaseId, OriginType};
use crate::drafts::DraftSnapshot;
use crate::issues::{IssueId, IssueRecord};
use crate::register::RegisterEntry;
use crate::workflow::StageLogEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    /// Insert a registry entry
    RegisterCase { id: CaseId, origin: OriginType },

    /// Remove a registry entry (explicit delete only)
    UnregisterCase { id: CaseId },

    /// Insert or replace a case row in the table matching its origin
    PutCase(CaseRecord),

    /// Remove a case row
    RemoveCase { id: CaseId, origin: OriginType },

    PutIssue(IssueRecord),

    RemoveIssue { case_id: CaseId, issue_id: IssueId },

    PutRegisterEntry(RegisterEntry),

    PutDraft(DraftSnapshot),

    RemoveDraft { case_id: CaseId, sequence: u64 },

    AppendStageLog(StageLogEntry),
}

impl Change {
    /// Name of the logical table affected by this change
    pub fn table_name(&self) -> &'static str {
        match self {
            Change::RegisterCase { .. } | Change::UnregisterCase { .. } => "case_registry",
            Change::PutCase(record) => match record.origin() {
                OriginType::Scrutiny => "scrutiny_cases",
                OriginType::Adjudication => "adjudication_cases",
            },
            Change::RemoveCase { origin, .. } => match origin {
                OriginType::Scrutiny => "scrutiny_cases",
                OriginType::Adjudication => "adjudication_cases",
            },
            Change::PutIssue(_) | Change::RemoveIssue { .. } => "issue_records",
            Change::PutRegisterEntry(_) => "register_entries",
            Change::PutDraft(_) | Change::RemoveDraft { .. } => "draft_snapshots",
            Change::AppendStageLog(_) => "stage_log",
        }
    }

    /// Case the change belongs to
    pub fn case_id(&self) -> CaseId {
        match self {
            Change::RegisterCase { id, .. }
            | Change::UnregisterCase { id }
            | Change::RemoveCase { id, .. } => *id,
            Change::PutCase(record) => record.id(),
            Change::PutIssue(issue) => issue.case_id,
            Change::RemoveIssue { case_id, .. } | Change::RemoveDraft { case_id, .. } => *case_id,
            Change::PutRegisterEntry(entry) => entry.case_id,
            Change::PutDraft(draft) => draft.case_id,
            Change::AppendStageLog(entry) => entry.case_id,
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(
            self,
            Change::UnregisterCase { .. }
                | Change::RemoveCase { .. }
                | Change::RemoveIssue { .. }
                | Change::RemoveDraft { .. }
        )
    }
}
