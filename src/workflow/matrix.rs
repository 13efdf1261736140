// ============================================================================
// Transition Matrix
// ============================================================================
//
// Explicit edge list plus guard predicates. Every stage change in the crate
// is decided here and nowhere else.
//
// Checks run in a fixed order so that callers always get the most specific
// error:
//   1. regression            -> IllegalTransition
//   2. hearing shortcut      -> InvalidTransition
//   3. origin restrictions   -> InvalidTransition
//   4. missing edge          -> InvalidTransition
//   5. unmet skip guard      -> SkipGuardViolation
//
// ============================================================================

use super::Stage;
use crate::core::{CaseError, OriginType, Result, SkipGuards};

/// Skip flags an edge may demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipFlag {
    BypassIntimation,
}

impl SkipFlag {
    pub fn name(&self) -> &'static str {
        match self {
            SkipFlag::BypassIntimation => "bypass_intimation",
        }
    }

    pub fn is_set(&self, guards: &SkipGuards) -> bool {
        match self {
            SkipFlag::BypassIntimation => guards.bypass_intimation,
        }
    }
}

/// How a stage change was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPath {
    /// An ordinary `transition` call from an editing surface.
    Direct,
    /// The stage advance performed inside a finalization transaction.
    Finalization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: Stage,
    pub to: Stage,
    pub requires: Option<SkipFlag>,
}

impl Edge {
    const fn open(from: Stage, to: Stage) -> Self {
        Self {
            from,
            to,
            requires: None,
        }
    }

    const fn guarded(from: Stage, to: Stage, flag: SkipFlag) -> Self {
        Self {
            from,
            to,
            requires: Some(flag),
        }
    }
}

/// Inputs for a single transition decision.
#[derive(Debug, Clone, Copy)]
pub struct TransitionRequest {
    pub origin: OriginType,
    pub current: Stage,
    pub target: Stage,
    pub guards: SkipGuards,
    pub path: TransitionPath,
}

#[derive(Debug, Clone)]
pub struct TransitionMatrix {
    edges: Vec<Edge>,
}

impl Default for TransitionMatrix {
    fn default() -> Self {
        Self::standard()
    }
}

impl TransitionMatrix {
    pub fn standard() -> Self {
        use Stage::*;
        Self {
            edges: vec![
                Edge::open(Intake, IntimationDrafted),
                Edge::open(IntimationDrafted, IntimationIssued),
                Edge::open(IntimationIssued, NoticeDrafted),
                Edge::guarded(Intake, NoticeDrafted, SkipFlag::BypassIntimation),
                Edge::open(NoticeDrafted, NoticeIssued),
                Edge::open(NoticeIssued, HearingScheduled),
                // adjournment
                Edge::open(HearingScheduled, HearingScheduled),
                Edge::open(HearingScheduled, HearingCompleted),
                Edge::open(HearingCompleted, OrderIssued),
            ],
        }
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, from: Stage, to: Stage) -> Option<&Edge> {
        self.edges.iter().find(|e| e.from == from && e.to == to)
    }

    /// Stages reachable from `from` in one step, ignoring guards and origin.
    pub fn successors(&self, from: Stage) -> Vec<Stage> {
        self.edges
            .iter()
            .filter(|e| e.from == from)
            .map(|e| e.to)
            .collect()
    }

    /// Furthest stage a case of the given origin may ever reach.
    pub fn final_stage_for(origin: OriginType) -> Stage {
        match origin {
            OriginType::Scrutiny => Stage::IntimationIssued,
            OriginType::Adjudication => Stage::OrderIssued,
        }
    }

    /// Decides whether `request` is legal, returning the edge taken.
    pub fn evaluate(&self, request: &TransitionRequest) -> Result<Edge> {
        let TransitionRequest {
            origin,
            current,
            target,
            guards,
            path,
        } = *request;

        if target < current {
            return Err(CaseError::IllegalTransition {
                from: current,
                to: target,
            });
        }

        if target == Stage::OrderIssued && current < Stage::HearingCompleted {
            return Err(CaseError::InvalidTransition {
                from: current,
                to: target,
                reason: "the hearing must be completed before an order is issued".into(),
            });
        }

        if target > Self::final_stage_for(origin) {
            return Err(CaseError::InvalidTransition {
                from: current,
                to: target,
                reason: format!(
                    "{} cases end at {}",
                    origin,
                    Self::final_stage_for(origin)
                ),
            });
        }

        if origin == OriginType::Scrutiny
            && target == Stage::IntimationIssued
            && path == TransitionPath::Direct
        {
            return Err(CaseError::InvalidTransition {
                from: current,
                to: target,
                reason: "scrutiny intimations are issued only through finalization".into(),
            });
        }

        let edge = self
            .edge(current, target)
            .copied()
            .ok_or_else(|| CaseError::InvalidTransition {
                from: current,
                to: target,
                reason: "no such edge in the transition matrix".into(),
            })?;

        if let Some(flag) = edge.requires {
            if !flag.is_set(&guards) {
                return Err(CaseError::SkipGuardViolation {
                    from: current,
                    to: target,
                    guard: flag.name(),
                });
            }
        }

        Ok(edge)
    }
}
