// ============================================================================
// Draft Snapshot Rotation
// ============================================================================
//
// Bounded, deduplicated autosave history for in-progress editing state.
// Insert and prune happen in one transaction, so a committed save never
// leaves more than `retention` rows for the case, and never zero.
//
// ============================================================================

pub mod fingerprint;

pub use fingerprint::{canonical_json, fingerprint};

use crate::core::{CaseError, CaseId, Result, Timestamp};
use crate::registry;
use crate::storage::Tables;
use crate::transaction::{Change, Transaction};
use serde::{Deserialize, Serialize};
use tracing::{Level, event};

pub const DEFAULT_RETENTION: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub case_id: CaseId,
    /// Store-wide sequence; orders snapshots of a case oldest to newest
    pub sequence: u64,
    pub blob: serde_json::Value,
    pub fingerprint: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Same content as the newest stored snapshot; nothing written
    Unchanged,
    Stored { sequence: u64, pruned: usize },
}

impl SaveOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, SaveOutcome::Stored { .. })
    }
}

pub(crate) fn save(
    txn: &mut Transaction,
    case_id: CaseId,
    blob: serde_json::Value,
    retention: usize,
) -> Result<SaveOutcome> {
    if retention == 0 {
        return Err(CaseError::Validation(
            "Snapshot retention must be at least 1".into(),
        ));
    }
    registry::load_case(txn.tables(), case_id)?;

    let fingerprint = fingerprint::fingerprint(&blob)?;
    if let Some(newest) = txn.tables().drafts_for(case_id).last() {
        if newest.fingerprint == fingerprint {
            event!(Level::TRACE, case_id = %case_id, "draft unchanged");
            return Ok(SaveOutcome::Unchanged);
        }
    }

    let sequence = txn.next_sequence();
    txn.apply(Change::PutDraft(DraftSnapshot {
        case_id,
        sequence,
        blob,
        fingerprint,
        created_at: txn.now(),
    }))?;

    let stored: Vec<u64> = txn.tables().drafts_for(case_id).map(|d| d.sequence).collect();
    let excess = stored.len().saturating_sub(retention);
    for sequence in stored.into_iter().take(excess) {
        txn.apply(Change::RemoveDraft { case_id, sequence })?;
    }

    event!(
        Level::DEBUG,
        case_id = %case_id,
        sequence,
        pruned = excess,
        "draft stored"
    );
    Ok(SaveOutcome::Stored {
        sequence,
        pruned: excess,
    })
}

/// Snapshots of a case, newest first.
pub fn list(tables: &Tables, case_id: CaseId) -> Result<Vec<DraftSnapshot>> {
    registry::load_case(tables, case_id)?;
    let mut drafts: Vec<DraftSnapshot> = tables.drafts_for(case_id).cloned().collect();
    drafts.reverse();
    Ok(drafts)
}

pub fn latest(tables: &Tables, case_id: CaseId) -> Result<Option<DraftSnapshot>> {
    registry::load_case(tables, case_id)?;
    Ok(tables.drafts_for(case_id).last().cloned())
}
