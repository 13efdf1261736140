pub mod error;
pub mod types;

pub use error::{CaseError, Result};
pub use types::{CaseId, FinancialYear, OriginType, SkipGuards, Taxpayer, Timestamp, now};
