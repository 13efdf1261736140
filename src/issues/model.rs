use crate::core::{CaseError, CaseId, Result, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IssueId(pub Uuid);

impl IssueId {
    pub fn new() -> Self {
        IssueId(Uuid::new_v4())
    }
}

impl Default for IssueId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Document stage an issue record supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueStage {
    Intimation,
    Notice,
    Hearing,
    Order,
}

impl fmt::Display for IssueStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IssueStage::Intimation => "intimation",
            IssueStage::Notice => "notice",
            IssueStage::Hearing => "hearing",
            IssueStage::Order => "order",
        };
        f.write_str(label)
    }
}

impl std::str::FromStr for IssueStage {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "intimation" => Ok(IssueStage::Intimation),
            "notice" => Ok(IssueStage::Notice),
            "hearing" => Ok(IssueStage::Hearing),
            "order" => Ok(IssueStage::Order),
            other => Err(CaseError::Validation(format!(
                "Unknown issue stage '{}'",
                other
            ))),
        }
    }
}

/// Canonical tabular shape: named columns, rows of equal width.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl IssueTable {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, row: Vec<serde_json::Value>) -> Self {
        self.rows.push(row);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            if self.rows.is_empty() {
                return Ok(());
            }
            return Err(CaseError::Validation(
                "Issue table has rows but no columns".into(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            if column.trim().is_empty() {
                return Err(CaseError::Validation(
                    "Issue table column names must not be blank".into(),
                ));
            }
            if !seen.insert(column.as_str()) {
                return Err(CaseError::Validation(format!(
                    "Duplicate issue table column '{}'",
                    column
                )));
            }
        }

        for (index, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(CaseError::Validation(format!(
                    "Issue table row {} has {} cells, expected {}",
                    index,
                    row.len(),
                    self.columns.len()
                )));
            }
        }
        Ok(())
    }
}

/// Demand heads in paise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxDemand {
    pub tax: i64,
    pub interest: i64,
    pub penalty: i64,
}

impl TaxDemand {
    pub fn total(&self) -> i64 {
        self.tax + self.interest + self.penalty
    }

    fn validate(&self) -> Result<()> {
        if self.tax < 0 || self.interest < 0 || self.penalty < 0 {
            return Err(CaseError::Validation(
                "Demand amounts must not be negative".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: IssueId,
    pub case_id: CaseId,
    pub stage: IssueStage,
    pub issue_code: String,
    pub description: String,
    pub table: IssueTable,
    pub demand: TaxDemand,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for a new issue record.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub stage: IssueStage,
    pub issue_code: String,
    pub description: String,
    pub table: IssueTable,
    pub demand: TaxDemand,
}

impl NewIssue {
    pub fn new(stage: IssueStage, issue_code: &str, description: &str) -> Self {
        Self {
            stage,
            issue_code: issue_code.to_string(),
            description: description.to_string(),
            table: IssueTable::default(),
            demand: TaxDemand::default(),
        }
    }

    pub fn table(mut self, table: IssueTable) -> Self {
        self.table = table;
        self
    }

    pub fn demand(mut self, demand: TaxDemand) -> Self {
        self.demand = demand;
        self
    }

    pub(crate) fn into_record(self, case_id: CaseId, at: Timestamp) -> Result<IssueRecord> {
        validate_code(&self.issue_code)?;
        self.table.validate()?;
        self.demand.validate()?;
        Ok(IssueRecord {
            id: IssueId::new(),
            case_id,
            stage: self.stage,
            issue_code: self.issue_code.trim().to_string(),
            description: self.description,
            table: self.table,
            demand: self.demand,
            created_at: at,
            updated_at: at,
        })
    }
}

/// Partial edit of an issue record. The stage tag itself is never editable.
#[derive(Debug, Clone, Default)]
pub struct IssueChanges {
    pub issue_code: Option<String>,
    pub description: Option<String>,
    pub table: Option<IssueTable>,
    pub demand: Option<TaxDemand>,
}

impl IssueChanges {
    pub fn is_empty(&self) -> bool {
        self.issue_code.is_none()
            && self.description.is_none()
            && self.table.is_none()
            && self.demand.is_none()
    }

    pub(crate) fn apply(self, record: &mut IssueRecord, at: Timestamp) -> Result<()> {
        if let Some(code) = self.issue_code {
            validate_code(&code)?;
            record.issue_code = code.trim().to_string();
        }
        if let Some(description) = self.description {
            record.description = description;
        }
        if let Some(table) = self.table {
            table.validate()?;
            record.table = table;
        }
        if let Some(demand) = self.demand {
            demand.validate()?;
            record.demand = demand;
        }
        record.updated_at = at;
        Ok(())
    }
}

fn validate_code(code: &str) -> Result<()> {
    if code.trim().is_empty() {
        return Err(CaseError::Validation("Issue code must not be empty".into()));
    }
    Ok(())
}
