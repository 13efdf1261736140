// ============================================================================
// Transaction Manager
// ============================================================================
//
// Hands out transactions over the committed tables and keeps counters of how
// they ended. Writers are already serialized by the store's write lock, so
// the manager never has to detect write-write conflicts itself; optimistic
// version mismatches are reported by the domain code and counted here.
//
// ============================================================================

use super::{Transaction, TransactionId};
use crate::core::CaseError;
use crate::storage::Tables;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct TransactionManager {
    started: AtomicU64,
    committed: AtomicU64,
    aborted: AtomicU64,
    conflicts: AtomicU64,
}

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransactionStats {
    pub started: u64,
    pub committed: u64,
    pub aborted: u64,
    /// Aborts caused by an optimistic version mismatch
    pub conflicts: u64,
}

impl TransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, base: Tables) -> Transaction {
        self.started.fetch_add(1, Ordering::Relaxed);
        Transaction::new(TransactionId::new(), base)
    }

    pub fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abort(&self, cause: &CaseError) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
        if matches!(cause, CaseError::ConcurrencyConflict { .. }) {
            self.conflicts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> TransactionStats {
        TransactionStats {
            started: self.started.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
        }
    }
}
