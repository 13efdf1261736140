// ============================================================================
// Transaction Management Module
// ============================================================================
//
// All-or-nothing units of work over the case tables.
//
// Design Patterns Used:
// - State Pattern: Transaction state management (Active, Committed, Aborted)
// - Command Pattern: every write is a replayable Change
// - Copy-on-Write: working copies share structure with committed tables
//
// ============================================================================

pub mod change;
pub mod manager;
pub mod state;

pub use change::Change;
pub use manager::{TransactionManager, TransactionStats};
pub use state::{Transaction, TransactionId, TransactionState};
