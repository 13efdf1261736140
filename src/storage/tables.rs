use crate::cases::{AdjudicationCase, CaseHeader, CaseRecord, ScrutinyCase};
use crate::core::{CaseError, CaseId, OriginType, Result};
use crate::drafts::DraftSnapshot;
use crate::issues::{IssueId, IssueRecord, IssueStage, is_frozen};
use crate::register::{RegisterEntry, RegisterKind};
use crate::transaction::Change;
use crate::workflow::StageLogEntry;
use im::OrdMap;
use serde::{Deserialize, Serialize};

/// All durable state, one persistent map per logical table.
///
/// Cloning is O(1): maps share structure until one side writes, which is
/// what makes per-transaction working copies affordable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tables {
    /// Case registry: the only authority on which table owns a case
    registry: OrdMap<CaseId, OriginType>,
    scrutiny_cases: OrdMap<CaseId, ScrutinyCase>,
    adjudication_cases: OrdMap<CaseId, AdjudicationCase>,
    issues: OrdMap<(CaseId, IssueId), IssueRecord>,
    register: OrdMap<(RegisterKind, String), RegisterEntry>,
    drafts: OrdMap<(CaseId, u64), DraftSnapshot>,
    stage_log: OrdMap<(CaseId, u64), StageLogEntry>,
    next_sequence: u64,
}

/// Row counts per table, used for snapshot metadata and stats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCounts {
    pub registry: usize,
    pub scrutiny_cases: usize,
    pub adjudication_cases: usize,
    pub issues: usize,
    pub register_entries: usize,
    pub drafts: usize,
    pub stage_log: usize,
}

impl TableCounts {
    pub fn total(&self) -> usize {
        self.registry
            + self.scrutiny_cases
            + self.adjudication_cases
            + self.issues
            + self.register_entries
            + self.drafts
            + self.stage_log
    }
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage-level backstop run on every live write before it is applied.
    ///
    /// The domain operations enforce these rules first with richer errors;
    /// this only catches writes that reach the tables without them. WAL
    /// replay skips it, since the log holds changes that already passed.
    pub(crate) fn check(&self, change: &Change) -> Result<()> {
        match change {
            Change::PutCase(record) => {
                let Some(stored) = self.case_header(record.id(), record.origin()) else {
                    return Ok(());
                };
                if record.stage() < stored.stage {
                    return Err(CaseError::IllegalTransition {
                        from: stored.stage,
                        to: record.stage(),
                    });
                }
                if stored.frozen.is_some() && record.header().frozen != stored.frozen {
                    return Err(CaseError::IntegrityViolation(format!(
                        "frozen snapshot of case {} is write-once",
                        record.id()
                    )));
                }
                Ok(())
            }
            Change::PutIssue(issue) => {
                self.check_issue_tag(issue.case_id, issue.stage)?;
                match self.issue(issue.case_id, issue.id) {
                    Some(existing) if existing.stage != issue.stage => {
                        self.check_issue_tag(issue.case_id, existing.stage)
                    }
                    _ => Ok(()),
                }
            }
            Change::RemoveIssue { case_id, issue_id } => match self.issue(*case_id, *issue_id) {
                Some(existing) => self.check_issue_tag(*case_id, existing.stage),
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    fn check_issue_tag(&self, case_id: CaseId, tag: IssueStage) -> Result<()> {
        let header = self
            .registry_entry(&case_id)
            .and_then(|origin| self.case_header(case_id, origin))
            .ok_or_else(|| {
                CaseError::IntegrityViolation(format!("issue written for unknown case {}", case_id))
            })?;
        if is_frozen(header.stage, tag) {
            return Err(CaseError::IntegrityViolation(format!(
                "{} issue data of case {} is read-only at {}",
                tag, case_id, header.stage
            )));
        }
        Ok(())
    }

    fn case_header(&self, id: CaseId, origin: OriginType) -> Option<&CaseHeader> {
        match origin {
            OriginType::Scrutiny => self.scrutiny_cases.get(&id).map(|case| &case.header),
            OriginType::Adjudication => self.adjudication_cases.get(&id).map(|case| &case.header),
        }
    }

    /// Apply a change. Used both by live transactions and by WAL replay.
    pub(crate) fn apply(&mut self, change: &Change) {
        match change {
            Change::RegisterCase { id, origin } => {
                self.registry.insert(*id, *origin);
            }
            Change::UnregisterCase { id } => {
                self.registry.remove(id);
            }
            Change::PutCase(record) => match record {
                CaseRecord::Scrutiny(case) => {
                    self.scrutiny_cases.insert(case.header.id, case.clone());
                }
                CaseRecord::Adjudication(case) => {
                    self.adjudication_cases.insert(case.header.id, case.clone());
                }
            },
            Change::RemoveCase { id, origin } => match origin {
                OriginType::Scrutiny => {
                    self.scrutiny_cases.remove(id);
                }
                OriginType::Adjudication => {
                    self.adjudication_cases.remove(id);
                }
            },
            Change::PutIssue(issue) => {
                self.issues.insert((issue.case_id, issue.id), issue.clone());
            }
            Change::RemoveIssue { case_id, issue_id } => {
                self.issues.remove(&(*case_id, *issue_id));
            }
            Change::PutRegisterEntry(entry) => {
                self.register.insert(
                    (entry.kind, entry.reference.as_str().to_string()),
                    entry.clone(),
                );
            }
            Change::PutDraft(draft) => {
                self.bump_sequence(draft.sequence);
                self.drafts
                    .insert((draft.case_id, draft.sequence), draft.clone());
            }
            Change::RemoveDraft { case_id, sequence } => {
                self.drafts.remove(&(*case_id, *sequence));
            }
            Change::AppendStageLog(entry) => {
                self.bump_sequence(entry.sequence);
                self.stage_log
                    .insert((entry.case_id, entry.sequence), entry.clone());
            }
        }
    }

    fn bump_sequence(&mut self, used: u64) {
        if used >= self.next_sequence {
            self.next_sequence = used + 1;
        }
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    pub fn registry_entry(&self, id: &CaseId) -> Option<OriginType> {
        self.registry.get(id).copied()
    }

    pub fn registry_len(&self) -> usize {
        self.registry.len()
    }

    /// Registered case ids in key order
    pub fn registered_cases(&self) -> impl Iterator<Item = (CaseId, OriginType)> + '_ {
        self.registry.iter().map(|(id, origin)| (*id, *origin))
    }

    // ------------------------------------------------------------------
    // Entity tables. Callers go through `registry::load_case`.
    // ------------------------------------------------------------------

    pub(crate) fn scrutiny_case(&self, id: &CaseId) -> Option<&ScrutinyCase> {
        self.scrutiny_cases.get(id)
    }

    pub(crate) fn adjudication_case(&self, id: &CaseId) -> Option<&AdjudicationCase> {
        self.adjudication_cases.get(id)
    }

    // ------------------------------------------------------------------
    // Issue records
    // ------------------------------------------------------------------

    pub fn issues_for(&self, case_id: CaseId) -> impl Iterator<Item = &IssueRecord> + '_ {
        self.issues
            .iter()
            .filter(move |((owner, _), _)| *owner == case_id)
            .map(|(_, issue)| issue)
    }

    pub fn issue(&self, case_id: CaseId, issue_id: IssueId) -> Option<&IssueRecord> {
        self.issues.get(&(case_id, issue_id))
    }

    // ------------------------------------------------------------------
    // Register
    // ------------------------------------------------------------------

    pub fn register_entry(&self, kind: RegisterKind, reference: &str) -> Option<&RegisterEntry> {
        self.register.get(&(kind, reference.to_string()))
    }

    pub fn register_entries(&self) -> impl Iterator<Item = &RegisterEntry> + '_ {
        self.register.values()
    }

    // ------------------------------------------------------------------
    // Draft snapshots and stage log, oldest first
    // ------------------------------------------------------------------

    pub fn drafts_for(&self, case_id: CaseId) -> impl Iterator<Item = &DraftSnapshot> + '_ {
        self.drafts
            .iter()
            .filter(move |((owner, _), _)| *owner == case_id)
            .map(|(_, draft)| draft)
    }

    pub fn stage_log_for(&self, case_id: CaseId) -> impl Iterator<Item = &StageLogEntry> + '_ {
        self.stage_log
            .iter()
            .filter(move |((owner, _), _)| *owner == case_id)
            .map(|(_, entry)| entry)
    }

    pub fn counts(&self) -> TableCounts {
        TableCounts {
            registry: self.registry.len(),
            scrutiny_cases: self.scrutiny_cases.len(),
            adjudication_cases: self.adjudication_cases.len(),
            issues: self.issues.len(),
            register_entries: self.register.len(),
            drafts: self.drafts.len(),
            stage_log: self.stage_log.len(),
        }
    }

    /// Overwrites a registry entry without any checks. Only tests use this,
    /// to simulate a corrupted registry.
    #[cfg(test)]
    pub(crate) fn force_registry_entry(&mut self, id: CaseId, origin: OriginType) {
        self.registry.insert(id, origin);
    }
}
