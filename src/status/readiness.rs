//! Launch readiness determination
//!
//! ## Level precedence
//!
//! ```text
//! any critical milestone failed             → Scrubbed
//! any milestone failed                      → Hold
//! all critical complete, nothing pending    → Ready
//! all critical complete                     → Partial
//! otherwise                                 → NotReady
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::processing::MilestoneTracker;
use crate::types::{
    LaunchReadiness, Milestone, MilestoneState, MilestoneStatus, ReadinessLevel,
};

const READY_MESSAGE: &str = "All systems ready for launch";

/// Computes launch readiness from the tracker's current state.
///
/// Holds no state besides the critical set; every call recomputes.
pub struct ReadinessComputer {
    tracker: Arc<MilestoneTracker>,
    critical: BTreeSet<Milestone>,
}

impl ReadinessComputer {
    pub fn new(tracker: Arc<MilestoneTracker>) -> Self {
        Self {
            tracker,
            critical: Milestone::CRITICAL.into_iter().collect(),
        }
    }

    pub fn compute(&self) -> LaunchReadiness {
        assess(&self.tracker.get_all_statuses(), &self.critical)
    }

    pub fn is_go_for_launch(&self) -> bool {
        self.compute().level == ReadinessLevel::Ready
    }

    /// One line per critical milestone that is not yet complete.
    pub fn blocking_issues(&self) -> Vec<String> {
        blocking_issues_for(&self.tracker.get_all_statuses(), &self.critical)
    }

    /// Verdict and blocking issues derived from a single status snapshot.
    pub fn evaluate(&self) -> (LaunchReadiness, Vec<String>) {
        let statuses = self.tracker.get_all_statuses();
        (
            assess(&statuses, &self.critical),
            blocking_issues_for(&statuses, &self.critical),
        )
    }
}

/// Describe each incomplete critical milestone: the failure reason, or
/// the state and progress.
pub fn blocking_issues_for(
    statuses: &BTreeMap<Milestone, MilestoneStatus>,
    critical: &BTreeSet<Milestone>,
) -> Vec<String> {
    critical
        .iter()
        .filter_map(|m| statuses.get(m))
        .filter(|s| !s.is_complete())
        .map(|s| match s.state {
            MilestoneState::Failed => format!(
                "{}: failed ({})",
                s.milestone,
                s.error_message.as_deref().unwrap_or("Unknown error")
            ),
            state => format!("{}: {} ({:.1}%)", s.milestone, state, s.progress_percent),
        })
        .collect()
}

/// Pure readiness assessment over a status map.
pub fn assess(
    statuses: &BTreeMap<Milestone, MilestoneStatus>,
    critical: &BTreeSet<Milestone>,
) -> LaunchReadiness {
    let mut ready = Vec::new();
    let mut pending = Vec::new();
    let mut failed = Vec::new();

    for (milestone, status) in statuses {
        match status.state {
            MilestoneState::Complete => ready.push(*milestone),
            MilestoneState::Failed => failed.push(*milestone),
            MilestoneState::NotStarted | MilestoneState::InProgress => pending.push(*milestone),
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let overall_progress = if statuses.is_empty() {
        0.0
    } else {
        ready.len() as f64 / statuses.len() as f64 * 100.0
    };

    let critical_failed: Vec<Milestone> =
        failed.iter().copied().filter(|m| critical.contains(m)).collect();
    let critical_ready = critical
        .iter()
        .filter(|m| statuses.contains_key(m))
        .all(|m| ready.contains(m));

    let (level, message) = if !critical_failed.is_empty() {
        (
            ReadinessLevel::Scrubbed,
            format!(
                "Launch scrubbed due to critical failures: {}",
                join(&critical_failed)
            ),
        )
    } else if !failed.is_empty() {
        (
            ReadinessLevel::Hold,
            format!("Launch on hold: {}", join(&failed)),
        )
    } else if critical_ready && pending.is_empty() {
        (ReadinessLevel::Ready, READY_MESSAGE.to_string())
    } else if critical_ready {
        (
            ReadinessLevel::Partial,
            format!(
                "Critical milestones complete - {} milestones pending",
                pending.len()
            ),
        )
    } else {
        (
            ReadinessLevel::NotReady,
            format!("Not ready - {} milestones pending", pending.len()),
        )
    };

    LaunchReadiness {
        level,
        ready_milestones: ready,
        pending_milestones: pending,
        failed_milestones: failed,
        overall_progress,
        message,
    }
}

fn join(milestones: &[Milestone]) -> String {
    milestones
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
