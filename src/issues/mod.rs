// ============================================================================
// Issue Records
// ============================================================================
//
// Stage-scoped claim data. Every insert, update and delete resolves the
// owning case and passes the enforcer before touching the table.
//
// ============================================================================

pub mod enforcer;
pub mod model;

pub use enforcer::{ensure_mutable, is_frozen, issuance_threshold};
pub use model::{IssueChanges, IssueId, IssueRecord, IssueStage, IssueTable, NewIssue, TaxDemand};

use crate::core::{CaseError, CaseId, Result};
use crate::registry;
use crate::storage::Tables;
use crate::transaction::{Change, Transaction};

pub(crate) fn add(txn: &mut Transaction, case_id: CaseId, issue: NewIssue) -> Result<IssueRecord> {
    let case = registry::load_case(txn.tables(), case_id)?;
    enforcer::ensure_mutable(&case, issue.stage)?;

    let record = issue.into_record(case_id, txn.now())?;
    txn.apply(Change::PutIssue(record.clone()))?;
    Ok(record)
}

pub(crate) fn update(
    txn: &mut Transaction,
    case_id: CaseId,
    issue_id: IssueId,
    changes: IssueChanges,
) -> Result<IssueRecord> {
    if changes.is_empty() {
        return Err(CaseError::Validation("Issue update contains no changes".into()));
    }
    let case = registry::load_case(txn.tables(), case_id)?;
    let mut record = find(txn.tables(), case_id, issue_id)?;
    enforcer::ensure_mutable(&case, record.stage)?;

    changes.apply(&mut record, txn.now())?;
    txn.apply(Change::PutIssue(record.clone()))?;
    Ok(record)
}

pub(crate) fn remove(txn: &mut Transaction, case_id: CaseId, issue_id: IssueId) -> Result<()> {
    let case = registry::load_case(txn.tables(), case_id)?;
    let record = find(txn.tables(), case_id, issue_id)?;
    enforcer::ensure_mutable(&case, record.stage)?;

    txn.apply(Change::RemoveIssue { case_id, issue_id })
}

/// Issue records of a case, optionally limited to one stage tag.
pub fn list(tables: &Tables, case_id: CaseId, stage: Option<IssueStage>) -> Result<Vec<IssueRecord>> {
    registry::load_case(tables, case_id)?;
    let mut records: Vec<IssueRecord> = tables
        .issues_for(case_id)
        .filter(|issue| stage.is_none_or(|tag| issue.stage == tag))
        .cloned()
        .collect();
    records.sort_by_key(|issue| (issue.stage, issue.created_at, issue.id));
    Ok(records)
}

fn find(tables: &Tables, case_id: CaseId, issue_id: IssueId) -> Result<IssueRecord> {
    tables
        .issue(case_id, issue_id)
        .cloned()
        .ok_or_else(|| CaseError::NotFound(format!("issue {} of case {}", issue_id, case_id)))
}
