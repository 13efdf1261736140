use super::IssueStage;
use crate::cases::CaseRecord;
use crate::core::{CaseError, Result};
use crate::workflow::Stage;
use tracing::{Level, event};

/// Stage at which a tag's document counts as issued.
pub fn issuance_threshold(stage: IssueStage) -> Stage {
    match stage {
        IssueStage::Intimation => Stage::IntimationIssued,
        IssueStage::Notice => Stage::NoticeIssued,
        IssueStage::Hearing => Stage::HearingCompleted,
        IssueStage::Order => Stage::OrderIssued,
    }
}

pub fn is_frozen(case_stage: Stage, tag: IssueStage) -> bool {
    issuance_threshold(tag) <= case_stage
}

/// Refuse any write to `tag` data once the case has reached its threshold.
pub fn ensure_mutable(record: &CaseRecord, tag: IssueStage) -> Result<()> {
    if !is_frozen(record.stage(), tag) {
        return Ok(());
    }

    event!(
        Level::WARN,
        case_id = %record.id(),
        stage = %record.stage(),
        tag = %tag,
        "write to issued issue data refused"
    );
    Err(CaseError::IntegrityViolation(format!(
        "{} issue data of case {} is read-only since {}",
        tag,
        record.id(),
        issuance_threshold(tag)
    )))
}
