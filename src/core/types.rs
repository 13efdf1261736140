use crate::core::{CaseError, Result};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

lazy_static! {
    static ref GSTIN_PATTERN: Regex =
        Regex::new(r"^[0-9]{2}[A-Z0-9]{10}[0-9A-Z]{1}Z[0-9A-Z]{1}$").expect("valid GSTIN pattern");
    static ref FINANCIAL_YEAR_PATTERN: Regex =
        Regex::new(r"^(\d{4})-(\d{2})$").expect("valid financial year pattern");
}

pub type Timestamp = DateTime<Utc>;

/// Unique identifier of a case, shared by the registry and both entity tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaseId(pub Uuid);

impl CaseId {
    pub fn new() -> Self {
        CaseId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CaseId {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(CaseId)
            .map_err(|e| CaseError::Validation(format!("Invalid case id '{}': {}", s, e)))
    }
}

/// Which proceeding a case started life as. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OriginType {
    Scrutiny,
    Adjudication,
}

impl OriginType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginType::Scrutiny => "scrutiny",
            OriginType::Adjudication => "adjudication",
        }
    }
}

impl fmt::Display for OriginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OriginType {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scrutiny" => Ok(OriginType::Scrutiny),
            "adjudication" => Ok(OriginType::Adjudication),
            other => Err(CaseError::Validation(format!(
                "Unknown origin type '{}'",
                other
            ))),
        }
    }
}

/// Taxpayer identity as captured on the case file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxpayer {
    pub gstin: String,
    pub legal_name: String,
    pub trade_name: Option<String>,
}

impl Taxpayer {
    pub fn new(gstin: &str, legal_name: &str) -> Self {
        Self {
            gstin: gstin.trim().to_ascii_uppercase(),
            legal_name: legal_name.trim().to_string(),
            trade_name: None,
        }
    }

    pub fn trade_name(mut self, trade_name: &str) -> Self {
        self.trade_name = Some(trade_name.trim().to_string());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !GSTIN_PATTERN.is_match(&self.gstin) {
            return Err(CaseError::Validation(format!(
                "Invalid GSTIN '{}'",
                self.gstin
            )));
        }
        if self.legal_name.is_empty() {
            return Err(CaseError::Validation(
                "Taxpayer legal name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Indian financial year, e.g. `2023-24`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FinancialYear(String);

impl FinancialYear {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let caps = FINANCIAL_YEAR_PATTERN.captures(raw).ok_or_else(|| {
            CaseError::Validation(format!(
                "Financial year '{}' must look like YYYY-YY",
                raw
            ))
        })?;
        let start: u32 = caps[1]
            .parse()
            .map_err(|_| CaseError::Validation(format!("Invalid financial year '{}'", raw)))?;
        let end: u32 = caps[2]
            .parse()
            .map_err(|_| CaseError::Validation(format!("Invalid financial year '{}'", raw)))?;
        if (start + 1) % 100 != end {
            return Err(CaseError::Validation(format!(
                "Financial year '{}' must span consecutive years",
                raw
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FinancialYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Flags that permit an otherwise-forbidden stage skip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipGuards {
    /// Proceed straight to the notice without issuing an intimation.
    pub bypass_intimation: bool,
}

impl SkipGuards {
    pub fn bypass_intimation() -> Self {
        Self {
            bypass_intimation: true,
        }
    }
}

pub fn now() -> Timestamp {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_financial_year_parsing() {
        assert_eq!(FinancialYear::parse("2023-24").unwrap().as_str(), "2023-24");
        assert_eq!(FinancialYear::parse(" 1999-00 ").unwrap().as_str(), "1999-00");
        assert!(FinancialYear::parse("2023-25").is_err());
        assert!(FinancialYear::parse("2023").is_err());
        assert!(FinancialYear::parse("FY 2023-24").is_err());
    }

    #[test]
    fn test_taxpayer_validation() {
        assert!(Taxpayer::new("27aapfu0939f1zv", "Acme Traders").validate().is_ok());
        assert!(Taxpayer::new("27AAPFU0939F1ZV", "  ").validate().is_err());
        assert!(Taxpayer::new("NOT-A-GSTIN", "Acme").validate().is_err());
    }

    #[test]
    fn test_origin_round_trip_through_str() {
        assert_eq!("Scrutiny".parse::<OriginType>().unwrap(), OriginType::Scrutiny);
        assert_eq!(
            OriginType::Adjudication.to_string().parse::<OriginType>().unwrap(),
            OriginType::Adjudication
        );
        assert!("appeal".parse::<OriginType>().is_err());
    }

    #[test]
    fn test_case_id_parse() {
        let id = CaseId::new();
        assert_eq!(id.to_string().parse::<CaseId>().unwrap(), id);
        assert!("nope".parse::<CaseId>().is_err());
    }
}
