//! Shared data structures for launch countdown telemetry
//!
//! - `Packet`: one ground-station reading (ingestion input)
//! - `MilestoneStatus`: per-milestone tracked state
//! - `LaunchReadiness`: the derived go/no-go verdict

mod packet;
mod milestone;
mod readiness;

pub use packet::*;
pub use milestone::*;
pub use readiness::*;
