//! Milestone state tracking
//!
//! One [`MilestoneStatus`] per countdown milestone, updated purely from
//! packet payloads:
//!
//! - `status`: `"complete"` | `"in_progress"` | `"failed"` (with `error`)
//! - `progress`: percent complete; non-zero progress starts a milestone
//! - any other numeric key: recorded as a metric
//!
//! Updates are last-write-wins. There is no deduplication by packet id and
//! no ordering between milestones.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use crate::ingestion::PacketListener;
use crate::types::{Milestone, MilestoneState, MilestoneStatus, Packet, PayloadValue};

const STATUS_KEY: &str = "status";
const PROGRESS_KEY: &str = "progress";
const ERROR_KEY: &str = "error";
const UNKNOWN_ERROR: &str = "Unknown error";

/// Tracks the state of every launch milestone.
pub struct MilestoneTracker {
    statuses: RwLock<BTreeMap<Milestone, MilestoneStatus>>,
}

impl Default for MilestoneTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MilestoneTracker {
    /// All milestones start `not_started`.
    pub fn new() -> Self {
        let statuses = Milestone::ALL
            .into_iter()
            .map(|m| (m, MilestoneStatus::new(m)))
            .collect();
        Self {
            statuses: RwLock::new(statuses),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<Milestone, MilestoneStatus>> {
        self.statuses.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<Milestone, MilestoneStatus>> {
        self.statuses.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a packet to its milestone.
    ///
    /// Returns false only when the milestone is not tracked.
    pub fn process(&self, packet: &Packet) -> bool {
        let mut statuses = self.write();
        let Some(status) = statuses.get_mut(&packet.milestone()) else {
            warn!(milestone = %packet.milestone(), "Packet for untracked milestone");
            return false;
        };

        let previous = status.state;
        status.last_update = Some(packet.timestamp());
        let payload = packet.payload();

        match payload.get(STATUS_KEY).and_then(PayloadValue::as_str) {
            Some("complete") => {
                status.state = MilestoneState::Complete;
                status.progress_percent = 100.0;
            }
            Some("in_progress") => status.state = MilestoneState::InProgress,
            Some("failed") => {
                status.state = MilestoneState::Failed;
                status.error_message = Some(
                    payload
                        .get(ERROR_KEY)
                        .and_then(PayloadValue::as_str)
                        .unwrap_or(UNKNOWN_ERROR)
                        .to_string(),
                );
            }
            Some(other) => debug!(milestone = %status.milestone, status = other, "Ignoring unknown status value"),
            None => {}
        }

        if let Some(value) = payload.get(PROGRESS_KEY) {
            match progress_value(value) {
                Some(progress) => {
                    status.progress_percent = progress;
                    if progress > 0.0 && status.state == MilestoneState::NotStarted {
                        status.state = MilestoneState::InProgress;
                    }
                }
                None => warn!(milestone = %status.milestone, value = ?value, "Non-numeric or non-finite progress ignored"),
            }
        }

        for (key, value) in payload {
            if key == STATUS_KEY || key == PROGRESS_KEY {
                continue;
            }
            if let Some(n) = value.as_f64() {
                status.metrics.insert(key.clone(), n);
            }
        }

        if status.state != previous {
            info!(
                milestone = %status.milestone,
                from = %previous,
                to = %status.state,
                packet_id = %packet.id(),
                "Milestone state changed"
            );
        }
        true
    }

    pub fn get_status(&self, milestone: Milestone) -> Option<MilestoneStatus> {
        self.read().get(&milestone).cloned()
    }

    /// Every status, in countdown order.
    pub fn get_all_statuses(&self) -> BTreeMap<Milestone, MilestoneStatus> {
        self.read().clone()
    }

    pub fn is_complete(&self, milestone: Milestone) -> bool {
        self.read()
            .get(&milestone)
            .is_some_and(MilestoneStatus::is_complete)
    }

    /// Return a milestone to `not_started`, clearing progress, metrics and
    /// error.
    pub fn reset(&self, milestone: Milestone) -> bool {
        let mut statuses = self.write();
        match statuses.get_mut(&milestone) {
            Some(status) => {
                *status = MilestoneStatus::new(milestone);
                info!(milestone = %milestone, "Milestone reset");
                true
            }
            None => false,
        }
    }

    pub fn completion_count(&self) -> usize {
        self.read().values().filter(|s| s.is_complete()).count()
    }
}

impl PacketListener for MilestoneTracker {
    fn on_packet(&self, packet: &Packet) {
        self.process(packet);
    }
}

/// Finite numeric progress; numeric strings are accepted too.
fn progress_value(value: &PayloadValue) -> Option<f64> {
    let progress = match value {
        PayloadValue::Number(n) => Some(*n),
        PayloadValue::Text(s) => s.trim().parse::<f64>().ok(),
        PayloadValue::Bool(_) => None,
    };
    progress.filter(|p| p.is_finite())
}
