//! API route definitions
//!
//! - /api/v1/packets - packet submission
//! - /api/v1/readiness, /api/v1/stats - launch verdict and receiver counters
//! - /api/v1/milestones - milestone status and reset
//! - /api/v1/history, /api/v1/timeline - snapshot history

use axum::{routing::{get, post}, Router};

use super::handlers::{self, ApiState};

/// Create all versioned API routes
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/packets", post(handlers::submit_packet))
        .route("/readiness", get(handlers::get_readiness))
        .route("/stats", get(handlers::get_stats))
        .route("/milestones", get(handlers::get_milestones))
        .route("/milestones/:milestone", get(handlers::get_milestone))
        .route("/milestones/:milestone/reset", post(handlers::reset_milestone))
        .route("/history/:milestone", get(handlers::get_history))
        .route("/timeline", get(handlers::get_timeline))
        .with_state(state)
}

/// Health endpoint at root level
pub fn root_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state)
}
