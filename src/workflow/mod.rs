// ============================================================================
// Workflow State Machine
// ============================================================================
//
// Ordered stages, the transition matrix, and the transactional `transition`
// operation built on them. Stage changes anywhere in the crate (including
// finalization) go through `advance`, so the matrix cannot be bypassed.
//
// ============================================================================

pub mod history;
pub mod matrix;
pub mod stage;

pub use history::{StageLogEntry, history};
pub use matrix::{Edge, SkipFlag, TransitionMatrix, TransitionPath, TransitionRequest};
pub use stage::Stage;

use crate::cases::{self, CaseRecord};
use crate::core::{CaseId, Result};
use crate::registry;
use crate::transaction::Transaction;
use tracing::{Level, event};

/// Move `record` to `target` after the matrix approves it. Writes the case
/// row (stage, label, version, timestamp in one put) and a stage log entry.
pub(crate) fn advance(
    txn: &mut Transaction,
    matrix: &TransitionMatrix,
    mut record: CaseRecord,
    target: Stage,
    path: TransitionPath,
) -> Result<CaseRecord> {
    let from = record.stage();
    let request = TransitionRequest {
        origin: record.origin(),
        current: from,
        target,
        guards: record.header().skip_guards,
        path,
    };

    if let Err(err) = matrix.evaluate(&request) {
        event!(
            Level::INFO,
            case_id = %record.id(),
            from = %from,
            to = %target,
            error = %err,
            "transition rejected"
        );
        return Err(err);
    }

    record.set_stage(target);
    record.touch(txn.now());
    cases::controller::write_case(txn, &record)?;
    history::append(txn, record.id(), Some(from), target, record.version())?;

    event!(
        Level::DEBUG,
        case_id = %record.id(),
        from = %from,
        to = %target,
        version = record.version(),
        "stage advanced"
    );
    Ok(record)
}

/// Transition a case, optionally guarded by an expected version.
pub(crate) fn transition(
    txn: &mut Transaction,
    matrix: &TransitionMatrix,
    case_id: CaseId,
    target: Stage,
    expected_version: Option<u64>,
) -> Result<CaseRecord> {
    let record = registry::load_case(txn.tables(), case_id)?;
    cases::controller::check_version(&record, expected_version)?;
    advance(txn, matrix, record, target, TransitionPath::Direct)
}
