use super::Stage;
use crate::core::{CaseId, Result, Timestamp};
use crate::storage::Tables;
use crate::transaction::{Change, Transaction};
use serde::{Deserialize, Serialize};

/// One stage change of one case. `from` is `None` for the creation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageLogEntry {
    pub case_id: CaseId,
    pub sequence: u64,
    pub from: Option<Stage>,
    pub to: Stage,
    /// Case version after the change
    pub version: u64,
    pub at: Timestamp,
}

pub(crate) fn append(
    txn: &mut Transaction,
    case_id: CaseId,
    from: Option<Stage>,
    to: Stage,
    version: u64,
) -> Result<()> {
    let entry = StageLogEntry {
        case_id,
        sequence: txn.next_sequence(),
        from,
        to,
        version,
        at: txn.now(),
    };
    txn.apply(Change::AppendStageLog(entry))
}

/// Stage history of a case, oldest first.
pub fn history(tables: &Tables, case_id: CaseId) -> Vec<StageLogEntry> {
    tables.stage_log_for(case_id).cloned().collect()
}
