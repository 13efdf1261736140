use crate::core::CaseId;
use crate::workflow::Stage;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaseError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Case '{0}' is already registered")]
    DuplicateRegistration(CaseId),

    #[error("Concurrency conflict on case '{case_id}' (expected version {expected}, actual {actual})")]
    ConcurrencyConflict {
        case_id: CaseId,
        expected: u64,
        actual: u64,
    },

    #[error("Illegal transition: stage cannot move back from {from} to {to}")]
    IllegalTransition { from: Stage, to: Stage },

    #[error("Invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: Stage,
        to: Stage,
        reason: String,
    },

    #[error("Skip guard '{guard}' must be set to move from {from} to {to}")]
    SkipGuardViolation {
        from: Stage,
        to: Stage,
        guard: &'static str,
    },

    #[error("Case '{0}' is already finalized")]
    AlreadyFinalized(CaseId),

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl CaseError {
    pub fn not_found_case(id: CaseId) -> Self {
        Self::NotFound(format!("case '{}'", id))
    }

    /// Whether the caller may re-read the record and submit again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// Errors that must be surfaced to the operator for correction and
    /// never retried automatically.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::IllegalTransition { .. }
                | Self::InvalidTransition { .. }
                | Self::SkipGuardViolation { .. }
                | Self::AlreadyFinalized(_)
                | Self::IntegrityViolation(_)
                | Self::Validation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CaseError>;

impl<T> From<std::sync::PoisonError<T>> for CaseError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for CaseError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for CaseError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Storage(format!("Failed to encode: {}", err))
    }
}

impl From<rmp_serde::decode::Error> for CaseError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Storage(format!("Failed to decode: {}", err))
    }
}

impl From<serde_json::Error> for CaseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("Invalid JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_conflicts_are_retryable() {
        let conflict = CaseError::ConcurrencyConflict {
            case_id: CaseId::new(),
            expected: 3,
            actual: 4,
        };
        assert!(conflict.is_retryable());
        assert!(!conflict.is_usage_error());

        let illegal = CaseError::IllegalTransition {
            from: Stage::IntimationDrafted,
            to: Stage::Intake,
        };
        assert!(!illegal.is_retryable());
        assert!(illegal.is_usage_error());

        assert!(!CaseError::Storage("disk full".into()).is_usage_error());
    }

    #[test]
    fn test_error_messages_name_the_stages() {
        let err = CaseError::SkipGuardViolation {
            from: Stage::Intake,
            to: Stage::NoticeDrafted,
            guard: "bypass_intimation",
        };
        let msg = err.to_string();
        assert!(msg.contains("bypass_intimation"));
        assert!(msg.contains("Intake(10)"));
        assert!(msg.contains("NoticeDrafted(40)"));
    }
}
