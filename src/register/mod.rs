// ============================================================================
// Register Entries
// ============================================================================
//
// Durably numbered reference records produced only by finalization. The
// natural key within a register is the `<sequence>/<year>` reference string.
//
// ============================================================================

pub mod reference;

pub use reference::{MAX_REFERENCE_LEN, ReferenceNumber};

use crate::core::{CaseError, CaseId, Result, Timestamp};
use crate::storage::Tables;
use crate::transaction::{Change, Transaction};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegisterKind {
    /// Office communication register; upserted by reference number.
    OfficeCommunication,
    /// Register of issued case documents; insert only.
    CaseDocument,
}

impl fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterKind::OfficeCommunication => f.write_str("office_communication"),
            RegisterKind::CaseDocument => f.write_str("case_document"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterEntry {
    pub kind: RegisterKind,
    pub reference: ReferenceNumber,
    pub case_id: CaseId,
    pub subject: String,
    pub issued_on: NaiveDate,
    pub content: serde_json::Value,
    /// Incremented each time an upsert rewrites the entry
    pub revision: u32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Caller-supplied content for a register entry.
#[derive(Debug, Clone)]
pub struct RegisterDraft {
    pub reference: String,
    pub subject: String,
    pub issued_on: NaiveDate,
    pub content: serde_json::Value,
}

impl RegisterDraft {
    pub fn new(reference: &str, subject: &str, issued_on: NaiveDate) -> Self {
        Self {
            reference: reference.to_string(),
            subject: subject.to_string(),
            issued_on,
            content: serde_json::Value::Null,
        }
    }

    pub fn content(mut self, content: serde_json::Value) -> Self {
        self.content = content;
        self
    }
}

/// Insert or, when the reference already exists in `kind`, rewrite the entry
/// in place.
///
/// Stricter than a plain upsert: a reference already held by a different
/// case is never taken over. That write fails with `Validation` and the entry
/// keeps its owner, so one case's finalization cannot rewrite another case's
/// issued communication.
pub(crate) fn upsert(
    txn: &mut Transaction,
    kind: RegisterKind,
    case_id: CaseId,
    draft: RegisterDraft,
) -> Result<RegisterEntry> {
    let reference = ReferenceNumber::parse(&draft.reference)?;
    let at = txn.now();

    let entry = match txn.tables().register_entry(kind, reference.as_str()) {
        Some(existing) if existing.case_id != case_id => {
            return Err(CaseError::Validation(format!(
                "Reference {} in {} is already assigned to case {}",
                reference, kind, existing.case_id
            )));
        }
        Some(existing) => RegisterEntry {
            subject: draft.subject,
            issued_on: draft.issued_on,
            content: draft.content,
            revision: existing.revision + 1,
            updated_at: at,
            ..existing.clone()
        },
        None => new_entry(kind, reference, case_id, draft, at),
    };

    txn.apply(Change::PutRegisterEntry(entry.clone()))?;
    Ok(entry)
}

/// Insert a fresh entry; an existing reference in `kind` is an error.
pub(crate) fn insert(
    txn: &mut Transaction,
    kind: RegisterKind,
    case_id: CaseId,
    draft: RegisterDraft,
) -> Result<RegisterEntry> {
    let reference = ReferenceNumber::parse(&draft.reference)?;
    if txn.tables().register_entry(kind, reference.as_str()).is_some() {
        return Err(CaseError::Validation(format!(
            "Reference {} is already recorded in {}",
            reference, kind
        )));
    }

    let entry = new_entry(kind, reference, case_id, draft, txn.now());
    txn.apply(Change::PutRegisterEntry(entry.clone()))?;
    Ok(entry)
}

fn new_entry(
    kind: RegisterKind,
    reference: ReferenceNumber,
    case_id: CaseId,
    draft: RegisterDraft,
    at: Timestamp,
) -> RegisterEntry {
    RegisterEntry {
        kind,
        reference,
        case_id,
        subject: draft.subject,
        issued_on: draft.issued_on,
        content: draft.content,
        revision: 1,
        created_at: at,
        updated_at: at,
    }
}

pub fn get(tables: &Tables, kind: RegisterKind, reference: &str) -> Result<RegisterEntry> {
    tables
        .register_entry(kind, reference.trim())
        .cloned()
        .ok_or_else(|| {
            CaseError::NotFound(format!("register entry {} in {}", reference.trim(), kind))
        })
}

pub fn entries_for_case(tables: &Tables, case_id: CaseId) -> Vec<RegisterEntry> {
    tables
        .register_entries()
        .filter(|entry| entry.case_id == case_id)
        .cloned()
        .collect()
}
