//! Natural-key reference numbers of the form `<sequence>/<year>`.

use crate::core::{CaseError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_REFERENCE_LEN: usize = 64;

/// Prefixes that editing surfaces put into reference fields before a real
/// number is allotted.
const PLACEHOLDER_PREFIXES: [&str; 8] = [
    "AUTO",
    "TEMP",
    "TMP",
    "DRAFT",
    "TBD",
    "PENDING",
    "PLACEHOLDER",
    "XXX",
];

lazy_static! {
    static ref REFERENCE_PATTERN: Regex =
        Regex::new(r"^(?P<seq>[0-9A-Za-z][0-9A-Za-z.\-]*)/(?P<year>\d{4}(?:-\d{2})?)$")
            .expect("valid reference pattern");
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceNumber {
    raw: String,
    sequence: String,
    year: String,
}

impl ReferenceNumber {
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(CaseError::Validation("Reference number is empty".into()));
        }
        if raw.chars().count() > MAX_REFERENCE_LEN {
            return Err(CaseError::Validation(format!(
                "Reference number exceeds {} characters",
                MAX_REFERENCE_LEN
            )));
        }

        let upper = raw.to_ascii_uppercase();
        if let Some(prefix) = PLACEHOLDER_PREFIXES
            .iter()
            .find(|prefix| upper.starts_with(*prefix))
        {
            return Err(CaseError::Validation(format!(
                "Reference number '{}' is a placeholder ({}...)",
                raw, prefix
            )));
        }

        let caps = REFERENCE_PATTERN.captures(raw).ok_or_else(|| {
            CaseError::Validation(format!(
                "Reference number '{}' must look like <sequence>/<year>",
                raw
            ))
        })?;

        Ok(Self {
            raw: raw.to_string(),
            sequence: caps["seq"].to_string(),
            year: caps["year"].to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn year(&self) -> &str {
        &self.year
    }
}

impl fmt::Display for ReferenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_sequence_over_year() {
        let r = ReferenceNumber::parse(" 1/2026 ").unwrap();
        assert_eq!(r.as_str(), "1/2026");
        assert_eq!(r.sequence(), "1");
        assert_eq!(r.year(), "2026");

        let r = ReferenceNumber::parse("OC-117/2025-26").unwrap();
        assert_eq!(r.sequence(), "OC-117");
        assert_eq!(r.year(), "2025-26");
    }

    #[test]
    fn test_rejects_placeholders() {
        for bad in ["AUTO-1/2026", "temp/2026", "TBD", "draft-3/2026", "XXX/2026"] {
            let err = ReferenceNumber::parse(bad).unwrap_err();
            assert!(matches!(err, CaseError::Validation(_)), "{bad}");
        }
    }

    #[test]
    fn test_rejects_overlong_and_malformed() {
        let long = format!("{}/2026", "9".repeat(MAX_REFERENCE_LEN));
        assert!(ReferenceNumber::parse(&long).is_err());
        assert!(ReferenceNumber::parse("").is_err());
        assert!(ReferenceNumber::parse("12-2026").is_err());
        assert!(ReferenceNumber::parse("12/26").is_err());
        assert!(ReferenceNumber::parse("/2026").is_err());
    }
}
