// ============================================================================
// Case Operations
// ============================================================================
//
// Create, read, update and delete for case rows. Every mutating operation
// takes an optional expected version; a mismatch is reported before any
// change is written.
//
// ============================================================================

use super::{CasePatch, CaseRecord, NewCase};
use crate::core::{CaseError, CaseId, OriginType, Result};
use crate::issues::enforcer;
use crate::registry;
use crate::storage::Tables;
use crate::transaction::{Change, Transaction};
use crate::workflow::{Stage, history};
use tracing::{Level, event};

/// Compare the stored version with the caller's expectation.
pub fn check_version(record: &CaseRecord, expected: Option<u64>) -> Result<()> {
    match expected {
        Some(expected) if expected != record.version() => {
            event!(
                Level::DEBUG,
                case_id = %record.id(),
                expected,
                actual = record.version(),
                "version mismatch"
            );
            Err(CaseError::ConcurrencyConflict {
                case_id: record.id(),
                expected,
                actual: record.version(),
            })
        }
        _ => Ok(()),
    }
}

/// Write the full case row. The registry must agree with the record's
/// variant, otherwise the write is refused.
pub(crate) fn write_case(txn: &mut Transaction, record: &CaseRecord) -> Result<()> {
    let registered = registry::resolve(txn.tables(), record.id())?;
    if registered != record.origin() {
        return Err(CaseError::IntegrityViolation(format!(
            "Case {} is registered as {} but written as {}",
            record.id(),
            registered,
            record.origin()
        )));
    }
    txn.apply(Change::PutCase(record.clone()))
}

/// Create a case at Intake with version 1 and register it.
pub(crate) fn create(txn: &mut Transaction, new_case: NewCase) -> Result<CaseRecord> {
    let record = new_case.into_record(CaseId::new(), txn.now())?;
    insert_new(txn, &record)?;
    Ok(record)
}

/// Register and write a freshly built record, with its creation log entry.
pub(crate) fn insert_new(txn: &mut Transaction, record: &CaseRecord) -> Result<()> {
    let id = record.id();
    registry::register(txn, id, record.origin())?;
    write_case(txn, record)?;
    history::append(txn, id, None, record.stage(), record.version())?;

    event!(Level::DEBUG, case_id = %id, origin = %record.origin(), "case created");
    Ok(())
}

pub fn get(tables: &Tables, id: CaseId) -> Result<CaseRecord> {
    registry::load_case(tables, id)
}

/// Apply `patch` and bump the version.
pub(crate) fn update(
    txn: &mut Transaction,
    id: CaseId,
    patch: CasePatch,
    expected_version: Option<u64>,
) -> Result<CaseRecord> {
    let mut record = registry::load_case(txn.tables(), id)?;
    check_version(&record, expected_version)?;

    patch.apply(&mut record)?;
    record.touch(txn.now());
    write_case(txn, &record)?;
    Ok(record)
}

/// Delete a case with its issues and draft snapshots.
///
/// Cascades to the case's issue records and draft snapshots. Deleting an
/// adjudication case spawned by finalization clears the source case's
/// downstream link. Register entries and the stage log are kept.
///
/// Immutability wins over the cascade: a finalized case, or one holding
/// frozen issue data, is refused with `IntegrityViolation` and can never be
/// deleted, since the cascade would have to remove issued records.
pub(crate) fn delete(txn: &mut Transaction, id: CaseId, expected_version: Option<u64>) -> Result<()> {
    let record = registry::load_case(txn.tables(), id)?;
    check_version(&record, expected_version)?;

    if record.is_finalized() {
        return Err(CaseError::IntegrityViolation(format!(
            "Case {} is finalized and cannot be deleted",
            id
        )));
    }

    let issues: Vec<_> = txn.tables().issues_for(id).cloned().collect();
    for issue in &issues {
        enforcer::ensure_mutable(&record, issue.stage)?;
    }
    for issue in issues {
        txn.apply(Change::RemoveIssue {
            case_id: id,
            issue_id: issue.id,
        })?;
    }

    let drafts: Vec<u64> = txn.tables().drafts_for(id).map(|d| d.sequence).collect();
    for sequence in drafts {
        txn.apply(Change::RemoveDraft {
            case_id: id,
            sequence,
        })?;
    }

    if let CaseRecord::Adjudication(case) = &record {
        if let Some(source_id) = case.source_case {
            clear_downstream_link(txn, source_id, id)?;
        }
    }

    txn.apply(Change::RemoveCase {
        id,
        origin: record.origin(),
    })?;
    registry::unregister(txn, id)?;

    event!(Level::INFO, case_id = %id, origin = %record.origin(), "case deleted");
    Ok(())
}

fn clear_downstream_link(txn: &mut Transaction, source_id: CaseId, removed: CaseId) -> Result<()> {
    let mut source = match registry::load_case(txn.tables(), source_id) {
        Ok(source) => source,
        Err(CaseError::NotFound(_)) => return Ok(()),
        Err(err) => return Err(err),
    };
    if let CaseRecord::Scrutiny(case) = &mut source {
        if case.downstream_case == Some(removed) {
            case.downstream_case = None;
            source.touch(txn.now());
            write_case(txn, &source)?;
        }
    }
    Ok(())
}

/// Selection criteria for [`list`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub origin: Option<OriginType>,
    pub stage: Option<Stage>,
    pub gstin: Option<String>,
    pub financial_year: Option<String>,
}

impl CaseFilter {
    pub fn matches(&self, record: &CaseRecord) -> bool {
        let header = record.header();
        self.origin.is_none_or(|origin| origin == record.origin())
            && self.stage.is_none_or(|stage| stage == header.stage)
            && self
                .gstin
                .as_deref()
                .is_none_or(|gstin| header.taxpayer.gstin.eq_ignore_ascii_case(gstin.trim()))
            && self
                .financial_year
                .as_deref()
                .is_none_or(|year| header.financial_year.as_str() == year.trim())
    }
}

/// Cases matching `filter`, oldest first. Ids whose registry entry has no
/// matching row are skipped.
pub fn list(tables: &Tables, filter: &CaseFilter) -> Vec<CaseRecord> {
    let mut records: Vec<CaseRecord> = tables
        .registered_cases()
        .filter(|(_, origin)| filter.origin.is_none_or(|wanted| wanted == *origin))
        .filter_map(|(id, _)| registry::load_case(tables, id).ok())
        .filter(|record| filter.matches(record))
        .collect();
    records.sort_by_key(|record| (record.header().created_at, record.id()));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Taxpayer;
    use crate::issues::{self, IssueStage, NewIssue};
    use crate::transaction::TransactionId;
    use serde_json::json;

    fn txn() -> Transaction {
        Transaction::new(TransactionId::new(), Tables::default())
    }

    fn taxpayer() -> Taxpayer {
        Taxpayer::new("27AAPFU0939F1ZV", "Acme Traders")
    }

    #[test]
    fn test_create_registers_and_logs() {
        let mut txn = txn();
        let record = create(&mut txn, NewCase::scrutiny(taxpayer(), "2023-24")).unwrap();

        assert_eq!(
            registry::resolve(txn.tables(), record.id()).unwrap(),
            OriginType::Scrutiny
        );
        assert_eq!(get(txn.tables(), record.id()).unwrap(), record);
        assert_eq!(history(txn.tables(), record.id()).len(), 1);
    }

    #[test]
    fn test_invalid_input_writes_nothing() {
        let mut txn = txn();
        let err = create(
            &mut txn,
            NewCase::scrutiny(Taxpayer::new("NOT-A-GSTIN", "Acme"), "2023-24"),
        )
        .unwrap_err();
        assert!(matches!(err, CaseError::Validation(_)));
        assert_eq!(txn.change_count(), 0);
    }

    #[test]
    fn test_update_bumps_version_and_checks_expectation() {
        let mut txn = txn();
        let id = create(&mut txn, NewCase::adjudication(taxpayer(), "2023-24"))
            .unwrap()
            .id();

        let updated = update(
            &mut txn,
            id,
            CasePatch::new().details(json!({"notes": "first"})),
            Some(1),
        )
        .unwrap();
        assert_eq!(updated.version(), 2);

        let err = update(
            &mut txn,
            id,
            CasePatch::new().details(json!({"notes": "stale"})),
            Some(1),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CaseError::ConcurrencyConflict {
                case_id: id,
                expected: 1,
                actual: 2
            }
        );
        assert_eq!(get(txn.tables(), id).unwrap().header().details["notes"], "first");
    }

    #[test]
    fn test_delete_cascades_issues_and_registry() {
        let mut txn = txn();
        let id = create(&mut txn, NewCase::scrutiny(taxpayer(), "2023-24"))
            .unwrap()
            .id();
        issues::add(
            &mut txn,
            id,
            NewIssue::new(IssueStage::Intimation, "ITC-01", "Excess ITC claimed"),
        )
        .unwrap();

        delete(&mut txn, id, Some(1)).unwrap();
        assert!(matches!(get(txn.tables(), id), Err(CaseError::NotFound(_))));
        assert_eq!(txn.tables().issues_for(id).count(), 0);
        assert!(registry::resolve(txn.tables(), id).is_err());
    }

    #[test]
    fn test_delete_refuses_frozen_issue_data() {
        let mut txn = txn();
        let id = create(&mut txn, NewCase::adjudication(taxpayer(), "2023-24"))
            .unwrap()
            .id();
        issues::add(
            &mut txn,
            id,
            NewIssue::new(IssueStage::Intimation, "ITC-01", "Excess ITC claimed"),
        )
        .unwrap();
        let mut record = get(txn.tables(), id).unwrap();
        record.set_stage(Stage::IntimationIssued);
        write_case(&mut txn, &record).unwrap();

        let err = delete(&mut txn, id, None).unwrap_err();
        assert!(matches!(err, CaseError::IntegrityViolation(_)));
        assert!(get(txn.tables(), id).is_ok());
    }

    #[test]
    fn test_list_filters() {
        let mut txn = txn();
        create(&mut txn, NewCase::scrutiny(taxpayer(), "2023-24")).unwrap();
        create(&mut txn, NewCase::adjudication(taxpayer(), "2022-23")).unwrap();
        create(
            &mut txn,
            NewCase::adjudication(Taxpayer::new("07AABCS1429B1Z1", "Sharma"), "2023-24"),
        )
        .unwrap();

        let all = list(txn.tables(), &CaseFilter::default());
        assert_eq!(all.len(), 3);

        let filter = CaseFilter {
            origin: Some(OriginType::Adjudication),
            gstin: Some("27aapfu0939f1zv".into()),
            ..Default::default()
        };
        let found = list(txn.tables(), &filter);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].header().financial_year.as_str(), "2022-23");

        let filter = CaseFilter {
            stage: Some(Stage::NoticeDrafted),
            ..Default::default()
        };
        assert!(list(txn.tables(), &filter).is_empty());
    }
}
