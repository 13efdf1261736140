// ============================================================================
// Finalization Transaction
// ============================================================================
//
// Issues a scrutiny intimation in one all-or-nothing step:
//
//   1. freeze the case and its intimation issue records
//   2. advance IntimationDrafted -> IntimationIssued, stamp finalized_by/at
//   3. upsert the primary register entry (office communication)
//   4. insert the secondary register entry (case document)
//   5. create the downstream adjudication case, cross-linked both ways
//
// All steps write into the caller's transaction. Any error aborts the whole
// transaction, so no partial finalize can be committed. The frozen snapshot
// doubles as the write-once guard that makes a repeated call fail with
// `AlreadyFinalized` before anything else runs.
//
// ============================================================================

use crate::cases::{self, CaseRecord, FrozenSnapshot, NewCase};
use crate::core::{CaseError, CaseId, OriginType, Result, SkipGuards};
use crate::issues::IssueStage;
use crate::register::{self, RegisterDraft, RegisterKind};
use crate::registry;
use crate::transaction::Transaction;
use crate::workflow::{self, Stage, TransitionMatrix, TransitionPath};
use tracing::{Level, event};

/// Stage a case must be at for finalization.
pub const FINALIZABLE_STAGE: Stage = Stage::IntimationDrafted;

/// Overrides for the adjudication case spawned by finalization. Unset fields
/// are copied from the source case.
#[derive(Debug, Clone, Default)]
pub struct DownstreamSeed {
    pub section: Option<String>,
    pub proper_officer: Option<String>,
    pub details: Option<serde_json::Value>,
    pub skip_guards: Option<SkipGuards>,
}

#[derive(Debug, Clone)]
pub struct FinalizeRequest {
    /// Recorded as `finalized_by`
    pub actor: String,
    pub primary: RegisterDraft,
    pub secondary: RegisterDraft,
    pub downstream: DownstreamSeed,
}

impl FinalizeRequest {
    pub fn new(actor: &str, primary: RegisterDraft, secondary: RegisterDraft) -> Self {
        Self {
            actor: actor.to_string(),
            primary,
            secondary,
            downstream: DownstreamSeed::default(),
        }
    }

    pub fn downstream(mut self, seed: DownstreamSeed) -> Self {
        self.downstream = seed;
        self
    }
}

/// Finalize `case_id` and return the id of the spawned adjudication case.
pub(crate) fn finalize(
    txn: &mut Transaction,
    matrix: &TransitionMatrix,
    case_id: CaseId,
    request: FinalizeRequest,
) -> Result<CaseId> {
    let record = registry::load_case(txn.tables(), case_id)?;

    if record.is_finalized() {
        return Err(CaseError::AlreadyFinalized(case_id));
    }
    if record.origin() != OriginType::Scrutiny {
        return Err(CaseError::Validation(format!(
            "Only scrutiny cases can be finalized; case {} is {}",
            case_id,
            record.origin()
        )));
    }
    if record.stage() != FINALIZABLE_STAGE {
        return Err(CaseError::InvalidTransition {
            from: record.stage(),
            to: Stage::IntimationIssued,
            reason: format!("finalization requires stage {}", FINALIZABLE_STAGE),
        });
    }
    if request.actor.trim().is_empty() {
        return Err(CaseError::Validation("Finalizing actor must be named".into()));
    }

    // 1. freeze
    let frozen = freeze(txn, &record)?;
    let mut record = record;
    record.header_mut().frozen = Some(frozen);

    // 2. advance; the matrix still decides
    let mut record = workflow::advance(
        txn,
        matrix,
        record,
        Stage::IntimationIssued,
        TransitionPath::Finalization,
    )?;

    // 3 + 4. register entries
    let primary = register::upsert(txn, RegisterKind::OfficeCommunication, case_id, request.primary)?;
    let secondary = register::insert(txn, RegisterKind::CaseDocument, case_id, request.secondary)?;

    // 5. downstream case
    let downstream = spawn_downstream(txn, &record, request.downstream)?;

    let header = record.header_mut();
    header.finalized_by = Some(request.actor.trim().to_string());
    header.finalized_at = Some(txn.now());
    if let CaseRecord::Scrutiny(case) = &mut record {
        case.downstream_case = Some(downstream);
    }
    cases::controller::write_case(txn, &record)?;

    event!(
        Level::INFO,
        case_id = %case_id,
        downstream = %downstream,
        primary = %primary.reference,
        secondary = %secondary.reference,
        "case finalized"
    );
    Ok(downstream)
}

fn freeze(txn: &Transaction, record: &CaseRecord) -> Result<FrozenSnapshot> {
    let mut issues: Vec<_> = txn
        .tables()
        .issues_for(record.id())
        .filter(|issue| issue.stage == IssueStage::Intimation)
        .cloned()
        .collect();
    issues.sort_by_key(|issue| (issue.created_at, issue.id));

    Ok(FrozenSnapshot {
        taken_at: txn.now(),
        stage: record.stage(),
        version: record.version(),
        case: serde_json::to_value(record)?,
        issues,
    })
}

fn spawn_downstream(
    txn: &mut Transaction,
    source: &CaseRecord,
    seed: DownstreamSeed,
) -> Result<CaseId> {
    let header = source.header();
    let mut new_case = NewCase::adjudication(header.taxpayer.clone(), header.financial_year.as_str())
        .details(seed.details.unwrap_or_else(|| header.details.clone()))
        .skip_guards(seed.skip_guards.unwrap_or_default());
    new_case.section = seed.section;
    new_case.proper_officer = seed.proper_officer;

    let mut downstream = new_case.into_record(CaseId::new(), txn.now())?;
    if let CaseRecord::Adjudication(case) = &mut downstream {
        case.source_case = Some(source.id());
    }
    cases::controller::insert_new(txn, &downstream)?;
    Ok(downstream.id())
}
