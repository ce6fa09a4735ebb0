//! Service state and lifecycle
//!
//! [`LaunchServices`] owns every stateful component. It is built once in
//! `main` and handed to the API and background tasks behind an `Arc`.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::config::ServiceConfig;
use crate::ingestion::TelemetryReceiver;
use crate::processing::{MilestoneTracker, StateMachine};
use crate::status::{ReadinessComputer, StatusAggregator};

// ============================================================================
// Service Lifecycle
// ============================================================================

/// Coarse service lifecycle phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServicePhase {
    /// Services built, not yet serving
    Initializing,
    /// Accepting packets
    Running,
    /// Graceful shutdown in progress
    ShuttingDown,
}

impl std::fmt::Display for ServicePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServicePhase::Initializing => write!(f, "initializing"),
            ServicePhase::Running => write!(f, "running"),
            ServicePhase::ShuttingDown => write!(f, "shutting_down"),
        }
    }
}

fn lifecycle() -> StateMachine<ServicePhase> {
    let mut sm = StateMachine::new(ServicePhase::Initializing);
    sm.add_transition(ServicePhase::Initializing, ServicePhase::Running);
    sm.add_transition(ServicePhase::Initializing, ServicePhase::ShuttingDown);
    sm.add_transition(ServicePhase::Running, ServicePhase::ShuttingDown);
    for phase in [ServicePhase::Running, ServicePhase::ShuttingDown] {
        sm.register_callback(phase, |t| {
            info!(
                from = %t.from_state,
                to = %t.to_state,
                reason = t.condition.as_deref().unwrap_or("-"),
                "Service lifecycle transition"
            );
        });
    }
    sm
}

// ============================================================================
// Launch Services
// ============================================================================

/// The ingestion, tracking and status components, wired together.
///
/// The tracker is registered as a receiver listener, so every packet the
/// receiver releases (in sequence order) updates milestone state inside
/// the receiver's critical section.
pub struct LaunchServices {
    pub receiver: Arc<TelemetryReceiver>,
    pub tracker: Arc<MilestoneTracker>,
    pub readiness: ReadinessComputer,
    pub aggregator: RwLock<StatusAggregator>,
    lifecycle: Mutex<StateMachine<ServicePhase>>,
    started_at: Instant,
}

impl LaunchServices {
    pub fn new(config: &ServiceConfig) -> Self {
        Self::with_receiver(
            TelemetryReceiver::from_config(&config.ingestion),
            config.aggregator.retention_hours,
        )
    }

    /// Wire services around a pre-built receiver.
    pub fn with_receiver(receiver: TelemetryReceiver, retention_hours: u64) -> Self {
        let receiver = Arc::new(receiver);
        let tracker = Arc::new(MilestoneTracker::new());
        receiver.register_listener(tracker.clone());

        Self {
            readiness: ReadinessComputer::new(Arc::clone(&tracker)),
            receiver,
            tracker,
            aggregator: RwLock::new(StatusAggregator::new(retention_hours)),
            lifecycle: Mutex::new(lifecycle()),
            started_at: Instant::now(),
        }
    }

    pub fn phase(&self) -> ServicePhase {
        *self
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current()
    }

    /// Request a lifecycle transition; false if not allowed from the
    /// current phase.
    pub fn transition(&self, to: ServicePhase, reason: &str) -> bool {
        self.lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .transition(to, Some(reason))
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Record the tracker's current state in the history store.
    pub async fn capture_snapshot(&self) {
        let statuses = self.tracker.get_all_statuses();
        self.aggregator.write().await.capture_snapshot(statuses);
    }
}

impl Default for LaunchServices {
    fn default() -> Self {
        Self::new(&ServiceConfig::default())
    }
}
