// ============================================================================
// Transaction State Management
// ============================================================================
//
// State Pattern for transaction lifecycle: Active -> Committed/Aborted.
//
// A transaction owns a copy-on-write clone of the committed tables. Writes go
// to that working copy only; the store swaps it in on commit and drops it on
// rollback, so a failing step can never leave earlier steps half-applied.
//
// ============================================================================

use super::Change;
use crate::core::{CaseError, Result, Timestamp, now};
use crate::storage::Tables;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Transaction state following the State Pattern
///
/// State transitions:
/// ```text
/// Active ──commit──> Committed
///   │
///   └──rollback──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    Aborted,
}

impl TransactionState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// A unit of all-or-nothing work against the case tables.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    /// Working copy; shares structure with the committed tables until written
    working: Tables,
    /// Changes made during this transaction, in order
    changes: Vec<Change>,
    /// Single clock reading used for every row this transaction stamps
    started_at: Timestamp,
    start_time: std::time::Instant,
}

impl Transaction {
    pub fn new(id: TransactionId, base: Tables) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            working: base,
            changes: Vec::new(),
            started_at: now(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Tables as this transaction sees them, including its own writes
    pub fn tables(&self) -> &Tables {
        &self.working
    }

    pub fn now(&self) -> Timestamp {
        self.started_at
    }

    /// Sequence number the next sequenced row (draft, stage log) will get
    pub fn next_sequence(&self) -> u64 {
        self.working.next_sequence()
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    pub fn duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Apply a change to the working copy and record it.
    ///
    /// # Errors
    /// Returns error if transaction is not active, or if the tables refuse
    /// the change (stage regression, rewritten frozen data)
    pub(crate) fn apply(&mut self, change: Change) -> Result<()> {
        if !self.state.is_active() {
            return Err(CaseError::Storage(format!(
                "Cannot apply change: transaction {} is {}",
                self.id, self.state
            )));
        }

        self.working.check(&change)?;
        self.working.apply(&change);
        self.changes.push(change);
        Ok(())
    }

    /// Mark transaction as committed
    ///
    /// # Errors
    /// Returns error if transaction is not active
    pub fn commit(&mut self) -> Result<()> {
        if !self.state.is_active() {
            return Err(CaseError::Storage(format!(
                "Cannot commit: transaction {} is already {}",
                self.id, self.state
            )));
        }

        self.state = TransactionState::Committed;
        Ok(())
    }

    /// Mark transaction as aborted and discard changes
    ///
    /// # Errors
    /// Returns error if transaction is not active
    pub fn rollback(&mut self) -> Result<()> {
        if !self.state.is_active() {
            return Err(CaseError::Storage(format!(
                "Cannot rollback: transaction {} is already {}",
                self.id, self.state
            )));
        }

        self.changes.clear();
        self.state = TransactionState::Aborted;
        Ok(())
    }

    /// Hands back the working tables and the change log of a committed
    /// transaction.
    pub(crate) fn into_committed(self) -> Result<(Tables, Vec<Change>)> {
        if self.state != TransactionState::Committed {
            return Err(CaseError::Storage(format!(
                "Transaction {} is {}, not committed",
                self.id, self.state
            )));
        }
        Ok((self.working, self.changes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CaseId, OriginType};

    fn register_change() -> Change {
        Change::RegisterCase {
            id: CaseId::new(),
            origin: OriginType::Scrutiny,
        }
    }

    #[test]
    fn test_transaction_id_generation() {
        let id1 = TransactionId::new();
        let id2 = TransactionId::new();
        assert!(id2.as_u64() > id1.as_u64());
    }

    #[test]
    fn test_transaction_lifecycle() {
        let mut txn = Transaction::new(TransactionId::new(), Tables::default());

        assert_eq!(txn.state(), TransactionState::Active);
        assert!(txn.state().is_active());

        txn.commit().unwrap();
        assert_eq!(txn.state(), TransactionState::Committed);
        assert!(!txn.state().is_active());
    }

    #[test]
    fn test_cannot_commit_twice() {
        let mut txn = Transaction::new(TransactionId::new(), Tables::default());
        txn.commit().unwrap();
        assert!(txn.commit().is_err());
    }

    #[test]
    fn test_writes_stay_in_working_copy() {
        let base = Tables::default();
        let mut txn = Transaction::new(TransactionId::new(), base.clone());
        txn.apply(register_change()).unwrap();

        assert_eq!(txn.tables().registry_len(), 1);
        assert_eq!(base.registry_len(), 0);
    }

    #[test]
    fn test_rollback_clears_changes() {
        let mut txn = Transaction::new(TransactionId::new(), Tables::default());
        txn.apply(register_change()).unwrap();
        assert_eq!(txn.change_count(), 1);

        txn.rollback().unwrap();
        assert_eq!(txn.change_count(), 0);
        assert_eq!(txn.state(), TransactionState::Aborted);
        assert!(txn.into_committed().is_err());
    }

    #[test]
    fn test_cannot_apply_after_commit() {
        let mut txn = Transaction::new(TransactionId::new(), Tables::default());
        txn.commit().unwrap();
        assert!(txn.apply(register_change()).is_err());
    }
}
