//! Service Pipeline Module
//!
//! ```text
//! transport → Packet → TelemetryReceiver ──(release, in order)──→ MilestoneTracker
//!                                                                     │
//!                          ReadinessComputer::compute() ←─────────────┤
//!                          StatusAggregator (periodic snapshot) ←─────┘
//! ```

mod state;
pub mod snapshots;

pub use state::*;
