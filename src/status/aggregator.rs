//! Milestone status history
//!
//! Time-windowed list of milestone snapshots. Cleanup walks from the
//! oldest end on every capture.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::types::{Milestone, MilestoneState, MilestoneStatus};

/// Milestone statuses captured at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub captured_at: DateTime<Utc>,
    pub statuses: BTreeMap<Milestone, MilestoneStatus>,
}

/// Stores milestone snapshots for historical queries.
#[derive(Debug)]
pub struct StatusAggregator {
    retention: Duration,
    snapshots: VecDeque<StatusSnapshot>,
}

impl StatusAggregator {
    pub fn new(retention_hours: u64) -> Self {
        let hours = i64::try_from(retention_hours).unwrap_or(i64::MAX);
        Self {
            retention: Duration::try_hours(hours).unwrap_or(Duration::MAX),
            snapshots: VecDeque::new(),
        }
    }

    pub fn capture_snapshot(&mut self, statuses: BTreeMap<Milestone, MilestoneStatus>) {
        self.capture_snapshot_at(statuses, Utc::now());
    }

    /// Capture with an explicit clock reading.
    pub fn capture_snapshot_at(
        &mut self,
        statuses: BTreeMap<Milestone, MilestoneStatus>,
        now: DateTime<Utc>,
    ) {
        self.snapshots.push_back(StatusSnapshot {
            captured_at: now,
            statuses,
        });
        self.cleanup(now);
    }

    fn cleanup(&mut self, now: DateTime<Utc>) {
        let Some(cutoff) = now.checked_sub_signed(self.retention) else {
            return;
        };
        let mut dropped = 0usize;
        while self
            .snapshots
            .front()
            .is_some_and(|s| s.captured_at < cutoff)
        {
            self.snapshots.pop_front();
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, retained = self.snapshots.len(), "Expired status snapshots removed");
        }
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    /// Snapshot captured closest to `at` (earliest wins a tie).
    pub fn status_at(&self, at: DateTime<Utc>) -> Option<&StatusSnapshot> {
        self.snapshots
            .iter()
            .min_by_key(|s| (s.captured_at - at).abs())
    }

    /// Every retained status of one milestone, oldest first.
    pub fn milestone_history(&self, milestone: Milestone) -> Vec<MilestoneStatus> {
        self.snapshots
            .iter()
            .filter_map(|s| s.statuses.get(&milestone).cloned())
            .collect()
    }

    /// For each milestone seen complete, the `last_update` of the first
    /// snapshot showing it complete.
    pub fn completion_timeline(&self) -> BTreeMap<Milestone, Option<DateTime<Utc>>> {
        let mut timeline = BTreeMap::new();
        for snapshot in &self.snapshots {
            for (milestone, status) in &snapshot.statuses {
                if status.state == MilestoneState::Complete {
                    timeline.entry(*milestone).or_insert(status.last_update);
                }
            }
        }
        timeline
    }

    /// Mean progress of one milestone across retained snapshots.
    pub fn average_progress(&self, milestone: Milestone) -> f64 {
        let history = self.milestone_history(milestone);
        if history.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = history.len() as f64;
        history.iter().map(|s| s.progress_percent).sum::<f64>() / count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 6, 0, 0).unwrap()
    }

    fn statuses(progress: f64, state: MilestoneState) -> BTreeMap<Milestone, MilestoneStatus> {
        Milestone::ALL
            .into_iter()
            .map(|m| {
                let mut s = MilestoneStatus::new(m);
                s.progress_percent = progress;
                s.state = state;
                s.last_update = Some(t0());
                (m, s)
            })
            .collect()
    }

    #[test]
    fn test_capture_and_history() {
        let mut agg = StatusAggregator::new(24);
        agg.capture_snapshot_at(statuses(10.0, MilestoneState::InProgress), t0());
        agg.capture_snapshot_at(
            statuses(30.0, MilestoneState::InProgress),
            t0() + Duration::minutes(1),
        );

        let history = agg.milestone_history(Milestone::FuelLoad);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].progress_percent, 10.0);
        assert_eq!(agg.average_progress(Milestone::FuelLoad), 20.0);
    }

    #[test]
    fn test_retention_drops_old_snapshots() {
        let mut agg = StatusAggregator::new(1);
        agg.capture_snapshot_at(statuses(0.0, MilestoneState::NotStarted), t0());
        agg.capture_snapshot_at(
            statuses(50.0, MilestoneState::InProgress),
            t0() + Duration::minutes(90),
        );

        assert_eq!(agg.snapshot_count(), 1);
        assert_eq!(agg.milestone_history(Milestone::Ignition)[0].progress_percent, 50.0);
    }

    #[test]
    fn test_status_at_picks_closest() {
        let mut agg = StatusAggregator::new(24);
        agg.capture_snapshot_at(statuses(10.0, MilestoneState::InProgress), t0());
        agg.capture_snapshot_at(
            statuses(90.0, MilestoneState::InProgress),
            t0() + Duration::minutes(10),
        );

        let snap = agg.status_at(t0() + Duration::minutes(8)).unwrap();
        assert_eq!(snap.captured_at, t0() + Duration::minutes(10));
        assert!(StatusAggregator::new(24).status_at(t0()).is_none());
    }

    #[test]
    fn test_completion_timeline_uses_first_complete() {
        let mut agg = StatusAggregator::new(24);
        let mut first = statuses(0.0, MilestoneState::NotStarted);
        let chill = first.get_mut(&Milestone::EngineChill).unwrap();
        chill.state = MilestoneState::Complete;
        chill.last_update = Some(t0() + Duration::seconds(30));
        agg.capture_snapshot_at(first, t0() + Duration::minutes(1));

        let mut second = statuses(0.0, MilestoneState::NotStarted);
        let chill = second.get_mut(&Milestone::EngineChill).unwrap();
        chill.state = MilestoneState::Complete;
        chill.last_update = Some(t0() + Duration::minutes(5));
        agg.capture_snapshot_at(second, t0() + Duration::minutes(6));

        let timeline = agg.completion_timeline();
        assert_eq!(timeline.len(), 1);
        assert_eq!(
            timeline[&Milestone::EngineChill],
            Some(t0() + Duration::seconds(30))
        );
    }

    #[test]
    fn test_average_progress_without_history() {
        assert_eq!(StatusAggregator::new(24).average_progress(Milestone::Liftoff), 0.0);
    }
}
