//! Milestone state types: MilestoneState, MilestoneStatus

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Milestone;

/// Progress state of a single countdown milestone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneState {
    #[default]
    NotStarted,
    InProgress,
    Complete,
    Failed,
}

impl std::fmt::Display for MilestoneState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MilestoneState::NotStarted => write!(f, "not_started"),
            MilestoneState::InProgress => write!(f, "in_progress"),
            MilestoneState::Complete => write!(f, "complete"),
            MilestoneState::Failed => write!(f, "failed"),
        }
    }
}

/// Current status of one milestone, mutated in place by accepted packets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneStatus {
    pub milestone: Milestone,
    pub state: MilestoneState,
    /// Last reported progress (0-100). Last write wins, not monotonic.
    pub progress_percent: f64,
    /// Timestamp of the most recently applied packet
    pub last_update: Option<DateTime<Utc>>,
    /// Set only when the milestone fails
    pub error_message: Option<String>,
    /// Last seen value per numeric payload key
    pub metrics: BTreeMap<String, f64>,
}

impl MilestoneStatus {
    /// Fresh `not_started` status.
    pub fn new(milestone: Milestone) -> Self {
        Self {
            milestone,
            state: MilestoneState::NotStarted,
            progress_percent: 0.0,
            last_update: None,
            error_message: None,
            metrics: BTreeMap::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == MilestoneState::Complete
    }
}
