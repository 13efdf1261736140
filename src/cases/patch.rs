use super::CaseRecord;
use crate::core::{CaseError, FinancialYear, Result, SkipGuards};

/// Partial changes to a case. Stage, version, origin and frozen data are
/// deliberately absent: they change only through the workflow and
/// finalization paths.
#[derive(Debug, Clone, Default)]
pub struct CasePatch {
    pub legal_name: Option<String>,
    /// `Some(None)` clears the trade name
    pub trade_name: Option<Option<String>>,
    pub financial_year: Option<String>,
    /// Merged key by key into the stored details; a `null` value removes the key
    pub details: Option<serde_json::Value>,
    pub skip_guards: Option<SkipGuards>,
    pub scrutiny_reference: Option<String>,
    pub section: Option<String>,
    pub proper_officer: Option<String>,
}

impl CasePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn legal_name(mut self, name: &str) -> Self {
        self.legal_name = Some(name.to_string());
        self
    }

    pub fn trade_name(mut self, name: Option<&str>) -> Self {
        self.trade_name = Some(name.map(str::to_string));
        self
    }

    pub fn financial_year(mut self, year: &str) -> Self {
        self.financial_year = Some(year.to_string());
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn skip_guards(mut self, guards: SkipGuards) -> Self {
        self.skip_guards = Some(guards);
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

    pub fn is_empty(&self) -> bool {
        self.legal_name.is_none()
            && self.trade_name.is_none()
            && self.financial_year.is_none()
            && self.details.is_none()
            && self.skip_guards.is_none()
            && self.scrutiny_reference.is_none()
            && self.section.is_none()
            && self.proper_officer.is_none()
    }

    /// Apply to `record`. Validation happens before anything is written, so
    /// a rejected patch leaves `record` untouched.
    pub(crate) fn apply(self, record: &mut CaseRecord) -> Result<()> {
        if self.is_empty() {
            return Err(CaseError::Validation("Patch contains no changes".into()));
        }

        let financial_year = self
            .financial_year
            .as_deref()
            .map(FinancialYear::parse)
            .transpose()?;
        if let Some(name) = &self.legal_name {
            if name.trim().is_empty() {
                return Err(CaseError::Validation(
                    "Taxpayer legal name must not be empty".into(),
                ));
            }
        }
        if let Some(details) = &self.details {
            if !details.is_object() {
                return Err(CaseError::Validation(
                    "Case details must be a JSON object".into(),
                ));
            }
        }
        match record {
            CaseRecord::Scrutiny(_) if self.section.is_some() || self.proper_officer.is_some() => {
                return Err(CaseError::Validation(
                    "Section and proper officer apply to adjudication cases only".into(),
                ));
            }
            CaseRecord::Adjudication(_) if self.scrutiny_reference.is_some() => {
                return Err(CaseError::Validation(
                    "Scrutiny reference applies to scrutiny cases only".into(),
                ));
            }
            _ => {}
        }

        match record {
            CaseRecord::Scrutiny(case) => {
                if let Some(reference) = self.scrutiny_reference {
                    case.scrutiny_reference = Some(reference);
                }
            }
            CaseRecord::Adjudication(case) => {
                if let Some(section) = self.section {
                    case.section = Some(section);
                }
                if let Some(officer) = self.proper_officer {
                    case.proper_officer = Some(officer);
                }
            }
        }

        let header = record.header_mut();
        if let Some(name) = self.legal_name {
            header.taxpayer.legal_name = name.trim().to_string();
        }
        if let Some(trade_name) = self.trade_name {
            header.taxpayer.trade_name = trade_name.map(|n| n.trim().to_string());
        }
        if let Some(year) = financial_year {
            header.financial_year = year;
        }
        if let Some(guards) = self.skip_guards {
            header.skip_guards = guards;
        }
        if let Some(serde_json::Value::Object(changes)) = self.details {
            merge_details(&mut header.details, changes);
        }
        Ok(())
    }
}

fn merge_details(target: &mut serde_json::Value, changes: serde_json::Map<String, serde_json::Value>) {
    if !target.is_object() {
        *target = serde_json::Value::Object(Default::default());
    }
    if let serde_json::Value::Object(map) = target {
        for (key, value) in changes {
            if value.is_null() {
                map.remove(&key);
            } else {
                map.insert(key, value);
            }
        }
    }
}
