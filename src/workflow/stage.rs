// ============================================================================
// Case Stages
// ============================================================================
//
// The legal-process sequence a case moves through. Stages are totally ordered
// by their numeric code; a case's stage never decreases.
//
// ============================================================================

use crate::core::{CaseError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Intake,
    IntimationDrafted,
    IntimationIssued,
    NoticeDrafted,
    NoticeIssued,
    HearingScheduled,
    HearingCompleted,
    OrderIssued,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Intake,
        Stage::IntimationDrafted,
        Stage::IntimationIssued,
        Stage::NoticeDrafted,
        Stage::NoticeIssued,
        Stage::HearingScheduled,
        Stage::HearingCompleted,
        Stage::OrderIssued,
    ];

    /// Stable numeric code persisted alongside the case.
    pub fn code(&self) -> u16 {
        match self {
            Stage::Intake => 10,
            Stage::IntimationDrafted => 20,
            Stage::IntimationIssued => 30,
            Stage::NoticeDrafted => 40,
            Stage::NoticeIssued => 50,
            Stage::HearingScheduled => 60,
            Stage::HearingCompleted => 70,
            Stage::OrderIssued => 80,
        }
    }

    pub fn from_code(code: u16) -> Result<Self> {
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.code() == code)
            .ok_or_else(|| CaseError::Validation(format!("Unknown stage code {}", code)))
    }

    /// Denormalized label written next to the numeric stage.
    pub fn status_label(&self) -> &'static str {
        match self {
            Stage::Intake => "Pending",
            Stage::IntimationDrafted => "Intimation Drafted",
            Stage::IntimationIssued => "Intimation Issued",
            Stage::NoticeDrafted => "Notice Drafted",
            Stage::NoticeIssued => "Notice Issued",
            Stage::HearingScheduled => "Hearing Scheduled",
            Stage::HearingCompleted => "Hearing Completed",
            Stage::OrderIssued => "Order Issued",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Intake => "Intake",
            Stage::IntimationDrafted => "IntimationDrafted",
            Stage::IntimationIssued => "IntimationIssued",
            Stage::NoticeDrafted => "NoticeDrafted",
            Stage::NoticeIssued => "NoticeIssued",
            Stage::HearingScheduled => "HearingScheduled",
            Stage::HearingCompleted => "HearingCompleted",
            Stage::OrderIssued => "OrderIssued",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::OrderIssued)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.code())
    }
}

impl std::str::FromStr for Stage {
    type Err = CaseError;

    /// Accepts either the numeric code or the stage name (case-insensitive).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(code) = s.parse::<u16>() {
            return Stage::from_code(code);
        }
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| CaseError::Validation(format!("Unknown stage '{}'", s)))
    }
}
