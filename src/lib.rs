//! Launch Telemetry: packet ingestion and launch readiness
//!
//! ## Architecture
//!
//! - **Ingestion**: bounded receiver that validates, orders and buffers packets
//! - **Processing**: per-milestone state tracking, generic state machine
//! - **Status**: go/no-go readiness and snapshot history
//! - **Pipeline**: service wiring and background tasks
//! - **API**: HTTP interface over the services

pub mod config;
pub mod types;
pub mod ingestion;
pub mod processing;
pub mod status;
pub mod pipeline;
pub mod api;

// Re-export configuration
pub use config::{ConfigError, ServiceConfig};

// Re-export domain types
pub use types::{
    LaunchReadiness, Milestone, MilestoneState, MilestoneStatus, Packet, PacketError, Payload,
    PayloadValue, ReadinessLevel,
};

// Re-export services
pub use ingestion::{IngestError, ReceiverStats, TelemetryReceiver};
pub use processing::{MilestoneTracker, StateMachine};
pub use status::{ReadinessComputer, StatusAggregator};
pub use pipeline::{LaunchServices, ServicePhase};
