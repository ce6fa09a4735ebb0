//! API route handlers
//!
//! - packet submission
//! - readiness, receiver statistics and milestone status
//! - snapshot history and completion timeline

mod packets;
mod status;

pub use packets::*;
pub use status::*;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::pipeline::LaunchServices;

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub services: Arc<LaunchServices>,
    /// Cancelled on shutdown; aborts in-flight retry backoffs
    pub shutdown: CancellationToken,
}

impl ApiState {
    pub fn new(services: Arc<LaunchServices>, shutdown: CancellationToken) -> Self {
        Self { services, shutdown }
    }
}
