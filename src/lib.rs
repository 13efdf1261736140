// ============================================================================
// casekeeper Library
// ============================================================================
//
// Case-lifecycle state machine and transactional storage for tax
// proceedings: registry-resolved dual-origin cases, a forward-only stage
// matrix, optimistic versioning, stage-scoped immutability, atomic
// finalization and bounded draft history.
//
// ============================================================================

pub mod cases;
pub mod config;
pub mod core;
pub mod drafts;
pub mod facade;
pub mod finalize;
pub mod issues;
pub mod register;
pub mod registry;
pub mod storage;
pub(crate) mod transaction;
pub mod workflow;

// Re-export main types for convenience
pub use cases::{CaseFilter, CasePatch, CaseRecord, FrozenSnapshot, NewCase};
pub use config::StoreConfig;
pub use crate::core::{CaseError, CaseId, FinancialYear, OriginType, Result, SkipGuards, Taxpayer};
pub use drafts::{DraftSnapshot, SaveOutcome};
pub use facade::{CaseService, DocumentSource};
pub use finalize::{DownstreamSeed, FinalizeRequest};
pub use issues::{IssueChanges, IssueId, IssueRecord, IssueStage, IssueTable, NewIssue, TaxDemand};
pub use register::{RegisterDraft, RegisterEntry, RegisterKind, ReferenceNumber};
pub use storage::{DurabilityMode, StoreStats};
pub use transaction::TransactionStats;
pub use workflow::{Stage, StageLogEntry, TransitionMatrix};
