//! Launch readiness verdict types

use serde::{Deserialize, Serialize};

use super::Milestone;

/// Overall go/no-go verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessLevel {
    NotReady,
    Partial,
    Ready,
    Hold,
    Scrubbed,
}

impl std::fmt::Display for ReadinessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadinessLevel::NotReady => write!(f, "not_ready"),
            ReadinessLevel::Partial => write!(f, "partial"),
            ReadinessLevel::Ready => write!(f, "ready"),
            ReadinessLevel::Hold => write!(f, "hold"),
            ReadinessLevel::Scrubbed => write!(f, "scrubbed"),
        }
    }
}

/// Readiness snapshot derived from milestone states.
///
/// The three milestone lists partition the tracked set and keep countdown
/// order. No wall-clock field: equal inputs give equal values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchReadiness {
    pub level: ReadinessLevel,
    pub ready_milestones: Vec<Milestone>,
    pub pending_milestones: Vec<Milestone>,
    pub failed_milestones: Vec<Milestone>,
    /// Percentage of milestones in `complete` state
    pub overall_progress: f64,
    pub message: String,
}
