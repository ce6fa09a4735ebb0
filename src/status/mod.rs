//! Launch status
//!
//! - [`ReadinessComputer`]: go/no-go verdict recomputed on every call
//! - [`StatusAggregator`]: retained milestone snapshots for history queries

mod aggregator;
mod readiness;

pub use aggregator::{StatusAggregator, StatusSnapshot};
pub use readiness::{assess, blocking_issues_for, ReadinessComputer};
