pub mod memory;
pub(crate) mod persistence;
pub mod tables;

pub use memory::{CaseStore, StoreStats};
pub use persistence::{DEFAULT_CHECKPOINT_THRESHOLD, DurabilityMode};
pub use tables::{TableCounts, Tables};
