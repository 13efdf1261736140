// ============================================================================
// Case Registry
// ============================================================================
//
// Append-only (id -> origin) mapping. Every case read or write starts here;
// the entity table is chosen from the registry and never guessed from which
// table happens to hold a row. A registry/entity mismatch fails closed.
//
// ============================================================================

use crate::cases::CaseRecord;
use crate::core::{CaseError, CaseId, OriginType, Result};
use crate::storage::Tables;
use crate::transaction::{Change, Transaction};
use tracing::{Level, event};

/// Record `id` as owned by `origin`. Must run in the transaction that
/// creates the case row.
pub(crate) fn register(txn: &mut Transaction, id: CaseId, origin: OriginType) -> Result<()> {
    if txn.tables().registry_entry(&id).is_some() {
        return Err(CaseError::DuplicateRegistration(id));
    }
    txn.apply(Change::RegisterCase { id, origin })
}

pub fn resolve(tables: &Tables, id: CaseId) -> Result<OriginType> {
    tables
        .registry_entry(&id)
        .ok_or_else(|| CaseError::not_found_case(id))
}

/// Resolve the origin, then read the case from that origin's table only.
pub fn load_case(tables: &Tables, id: CaseId) -> Result<CaseRecord> {
    let origin = resolve(tables, id)?;
    let record = match origin {
        OriginType::Scrutiny => tables.scrutiny_case(&id).cloned().map(CaseRecord::Scrutiny),
        OriginType::Adjudication => tables
            .adjudication_case(&id)
            .cloned()
            .map(CaseRecord::Adjudication),
    };

    record.ok_or_else(|| {
        event!(
            Level::WARN,
            case_id = %id,
            registered_origin = %origin,
            "registry entry has no matching entity row"
        );
        CaseError::not_found_case(id)
    })
}

/// Remove the registry entry. Only explicit case deletion calls this.
pub(crate) fn unregister(txn: &mut Transaction, id: CaseId) -> Result<()> {
    resolve(txn.tables(), id)?;
    txn.apply(Change::UnregisterCase { id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cases::NewCase;
    use crate::core::{Taxpayer, now};
    use crate::transaction::TransactionId;

    fn txn() -> Transaction {
        Transaction::new(TransactionId::new(), Tables::default())
    }

    fn insert_case(txn: &mut Transaction, new_case: NewCase) -> CaseId {
        let id = CaseId::new();
        let origin = new_case.origin;
        let record = new_case.into_record(id, now()).unwrap();
        register(txn, id, origin).unwrap();
        txn.apply(Change::PutCase(record)).unwrap();
        id
    }

    fn taxpayer() -> Taxpayer {
        Taxpayer::new("29AAACB1234C1Z5", "Bharat Metals")
    }

    #[test]
    fn test_resolve_returns_registered_origin() {
        let mut txn = txn();
        let s = insert_case(&mut txn, NewCase::scrutiny(taxpayer(), "2022-23"));
        let a = insert_case(&mut txn, NewCase::adjudication(taxpayer(), "2022-23"));

        assert_eq!(resolve(txn.tables(), s).unwrap(), OriginType::Scrutiny);
        assert_eq!(resolve(txn.tables(), a).unwrap(), OriginType::Adjudication);
        assert_eq!(load_case(txn.tables(), a).unwrap().origin(), OriginType::Adjudication);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut txn = txn();
        let id = CaseId::new();
        register(&mut txn, id, OriginType::Scrutiny).unwrap();
        let err = register(&mut txn, id, OriginType::Adjudication).unwrap_err();
        assert_eq!(err, CaseError::DuplicateRegistration(id));
        assert_eq!(resolve(txn.tables(), id).unwrap(), OriginType::Scrutiny);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let tables = Tables::default();
        assert!(matches!(
            load_case(&tables, CaseId::new()),
            Err(CaseError::NotFound(_))
        ));
    }

    #[test]
    fn test_corrupted_entry_fails_closed() {
        let mut txn = txn();
        let id = insert_case(&mut txn, NewCase::scrutiny(taxpayer(), "2022-23"));
        let (mut tables, _) = {
            txn.commit().unwrap();
            txn.into_committed().unwrap()
        };
        tables.force_registry_entry(id, OriginType::Adjudication);

        assert_eq!(resolve(&tables, id).unwrap(), OriginType::Adjudication);
        assert!(matches!(load_case(&tables, id), Err(CaseError::NotFound(_))));
    }

    #[test]
    fn test_entity_without_registry_is_invisible() {
        let mut txn = txn();
        let record = NewCase::adjudication(taxpayer(), "2022-23")
            .into_record(CaseId::new(), now())
            .unwrap();
        let id = record.id();
        txn.apply(Change::PutCase(record)).unwrap();
        assert!(matches!(
            load_case(txn.tables(), id),
            Err(CaseError::NotFound(_))
        ));
    }
}
