use crate::core::{
    CaseError, CaseId, FinancialYear, OriginType, Result, SkipGuards, Taxpayer, Timestamp,
};
use crate::issues::IssueRecord;
use crate::workflow::Stage;
use serde::{Deserialize, Serialize};

/// Fields every case carries regardless of origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseHeader {
    pub id: CaseId,
    pub taxpayer: Taxpayer,
    pub financial_year: FinancialYear,
    pub stage: Stage,
    /// Human-readable label kept in step with `stage`.
    pub status: String,
    pub version: u64,
    pub skip_guards: SkipGuards,
    /// Free-form working data owned by the editing surface.
    pub details: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Write-once copy taken at finalization.
    pub frozen: Option<FrozenSnapshot>,
    pub finalized_by: Option<String>,
    pub finalized_at: Option<Timestamp>,
}

impl CaseHeader {
    fn new(
        id: CaseId,
        taxpayer: Taxpayer,
        financial_year: FinancialYear,
        skip_guards: SkipGuards,
        details: serde_json::Value,
        at: Timestamp,
    ) -> Self {
        Self {
            id,
            taxpayer,
            financial_year,
            stage: Stage::Intake,
            status: Stage::Intake.status_label().to_string(),
            version: 1,
            skip_guards,
            details,
            created_at: at,
            updated_at: at,
            frozen: None,
            finalized_by: None,
            finalized_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrutinyCase {
    pub header: CaseHeader,
    /// Reference of the scrutiny selection (e.g. the ASMT file number).
    pub scrutiny_reference: Option<String>,
    /// Adjudication case spawned when this case was finalized.
    pub downstream_case: Option<CaseId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjudicationCase {
    pub header: CaseHeader,
    /// Statutory section under which the demand is raised.
    pub section: Option<String>,
    pub proper_officer: Option<String>,
    /// Scrutiny case this proceeding was spawned from, if any.
    pub source_case: Option<CaseId>,
}

/// A case as stored: the variant is the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CaseRecord {
    Scrutiny(ScrutinyCase),
    Adjudication(AdjudicationCase),
}

impl CaseRecord {
    pub fn header(&self) -> &CaseHeader {
        match self {
            CaseRecord::Scrutiny(case) => &case.header,
            CaseRecord::Adjudication(case) => &case.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut CaseHeader {
        match self {
            CaseRecord::Scrutiny(case) => &mut case.header,
            CaseRecord::Adjudication(case) => &mut case.header,
        }
    }

    pub fn id(&self) -> CaseId {
        self.header().id
    }

    pub fn origin(&self) -> OriginType {
        match self {
            CaseRecord::Scrutiny(_) => OriginType::Scrutiny,
            CaseRecord::Adjudication(_) => OriginType::Adjudication,
        }
    }

    pub fn stage(&self) -> Stage {
        self.header().stage
    }

    pub fn status(&self) -> &str {
        &self.header().status
    }

    pub fn version(&self) -> u64 {
        self.header().version
    }

    pub fn is_finalized(&self) -> bool {
        self.header().frozen.is_some()
    }

    pub fn as_scrutiny(&self) -> Option<&ScrutinyCase> {
        match self {
            CaseRecord::Scrutiny(case) => Some(case),
            CaseRecord::Adjudication(_) => None,
        }
    }

    pub fn as_adjudication(&self) -> Option<&AdjudicationCase> {
        match self {
            CaseRecord::Adjudication(case) => Some(case),
            CaseRecord::Scrutiny(_) => None,
        }
    }

    /// Case linked to this one by finalization, in either direction.
    pub fn linked_case(&self) -> Option<CaseId> {
        match self {
            CaseRecord::Scrutiny(case) => case.downstream_case,
            CaseRecord::Adjudication(case) => case.source_case,
        }
    }

    /// Moves the stage and its label together. Version handling is the
    /// caller's job.
    pub(crate) fn set_stage(&mut self, stage: Stage) {
        let header = self.header_mut();
        header.stage = stage;
        header.status = stage.status_label().to_string();
    }

    pub(crate) fn touch(&mut self, at: Timestamp) {
        let header = self.header_mut();
        header.version += 1;
        header.updated_at = at;
    }
}

/// Copy of a case's data at the moment its document was issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrozenSnapshot {
    pub taken_at: Timestamp,
    pub stage: Stage,
    pub version: u64,
    pub case: serde_json::Value,
    pub issues: Vec<IssueRecord>,
}

/// Input for creating a case.
#[derive(Debug, Clone)]
pub struct NewCase {
    pub origin: OriginType,
    pub taxpayer: Taxpayer,
    pub financial_year: String,
    pub skip_guards: SkipGuards,
    pub details: serde_json::Value,
    pub scrutiny_reference: Option<String>,
    pub section: Option<String>,
    pub proper_officer: Option<String>,
}

impl NewCase {
    pub fn new(origin: OriginType, taxpayer: Taxpayer, financial_year: &str) -> Self {
        Self {
            origin,
            taxpayer,
            financial_year: financial_year.to_string(),
            skip_guards: SkipGuards::default(),
            details: serde_json::Value::Object(Default::default()),
            scrutiny_reference: None,
            section: None,
            proper_officer: None,
        }
    }

    pub fn scrutiny(taxpayer: Taxpayer, financial_year: &str) -> Self {
        Self::new(OriginType::Scrutiny, taxpayer, financial_year)
    }

    pub fn adjudication(taxpayer: Taxpayer, financial_year: &str) -> Self {
        Self::new(OriginType::Adjudication, taxpayer, financial_year)
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn skip_guards(mut self, guards: SkipGuards) -> Self {
        self.skip_guards = guards;
        self
    }

    pub fn scrutiny_reference(mut self, reference: &str) -> Self {
        self.scrutiny_reference = Some(reference.to_string());
        self
    }

    pub fn section(mut self, section: &str) -> Self {
        self.section = Some(section.to_string());
        self
    }

    pub fn proper_officer(mut self, officer: &str) -> Self {
        self.proper_officer = Some(officer.to_string());
        self
    }

    /// Validates the input and builds the row stored for it.
    pub(crate) fn into_record(self, id: CaseId, at: Timestamp) -> Result<CaseRecord> {
        self.taxpayer.validate()?;
        let financial_year = FinancialYear::parse(&self.financial_year)?;
        if !self.details.is_object() {
            return Err(CaseError::Validation(
                "Case details must be a JSON object".into(),
            ));
        }

        let header = CaseHeader::new(
            id,
            self.taxpayer,
            financial_year,
            self.skip_guards,
            self.details,
            at,
        );

        match self.origin {
            OriginType::Scrutiny => {
                if self.section.is_some() || self.proper_officer.is_some() {
                    return Err(CaseError::Validation(
                        "Section and proper officer apply to adjudication cases only".into(),
                    ));
                }
                Ok(CaseRecord::Scrutiny(ScrutinyCase {
                    header,
                    scrutiny_reference: self.scrutiny_reference,
                    downstream_case: None,
                }))
            }
            OriginType::Adjudication => {
                if self.scrutiny_reference.is_some() {
                    return Err(CaseError::Validation(
                        "Scrutiny reference applies to scrutiny cases only".into(),
                    ));
                }
                Ok(CaseRecord::Adjudication(AdjudicationCase {
                    header,
                    section: self.section,
                    proper_officer: self.proper_officer,
                    source_case: None,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::now;
    use serde_json::json;

    fn taxpayer() -> Taxpayer {
        Taxpayer::new("27AAPFU0939F1ZV", "Acme Traders")
    }

    #[test]
    fn test_new_case_starts_pending_at_version_one() {
        let record = NewCase::scrutiny(taxpayer(), "2023-24")
            .into_record(CaseId::new(), now())
            .unwrap();
        assert_eq!(record.origin(), OriginType::Scrutiny);
        assert_eq!(record.stage(), Stage::Intake);
        assert_eq!(record.status(), "Pending");
        assert_eq!(record.version(), 1);
        assert!(!record.is_finalized());
    }

    #[test]
    fn test_origin_specific_fields_are_checked() {
        let err = NewCase::scrutiny(taxpayer(), "2023-24")
            .section("73")
            .into_record(CaseId::new(), now())
            .unwrap_err();
        assert!(matches!(err, CaseError::Validation(_)));

        let err = NewCase::adjudication(taxpayer(), "2023-24")
            .scrutiny_reference("ASMT/1")
            .into_record(CaseId::new(), now())
            .unwrap_err();
        assert!(matches!(err, CaseError::Validation(_)));
    }

    #[test]
    fn test_details_must_be_object() {
        let err = NewCase::adjudication(taxpayer(), "2023-24")
            .details(json!([1, 2, 3]))
            .into_record(CaseId::new(), now())
            .unwrap_err();
        assert!(matches!(err, CaseError::Validation(_)));
    }

    #[test]
    fn test_set_stage_keeps_label_in_step() {
        let mut record = NewCase::adjudication(taxpayer(), "2023-24")
            .into_record(CaseId::new(), now())
            .unwrap();
        record.set_stage(Stage::NoticeIssued);
        assert_eq!(record.stage(), Stage::NoticeIssued);
        assert_eq!(record.status(), "Notice Issued");
    }
}
