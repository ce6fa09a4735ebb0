//! Packet processing
//!
//! - [`MilestoneTracker`]: per-milestone state driven by packet payloads
//! - [`StateMachine`]: generic whitelist state machine for auxiliary
//!   workflows (the service lifecycle)

mod milestone_tracker;
mod state_machine;

pub use milestone_tracker::MilestoneTracker;
pub use state_machine::{StateMachine, StateTransition};
