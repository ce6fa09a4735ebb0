//! Readiness, milestone and history endpoints

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::response::Response;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::api::envelope::{ApiErrorResponse, ApiResponse};
use crate::pipeline::ServicePhase;
use crate::types::{LaunchReadiness, Milestone, MilestoneStatus, ReadinessLevel};

use super::ApiState;

fn parse_milestone(raw: &str) -> Result<Milestone, Response> {
    raw.parse::<Milestone>()
        .map_err(|e| ApiErrorResponse::unknown_milestone_path(e.to_string()))
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub phase: ServicePhase,
    pub uptime_secs: u64,
}

/// GET /health - Liveness and lifecycle phase
pub async fn health_check(State(state): State<ApiState>) -> Response {
    let phase = state.services.phase();
    ApiResponse::ok(HealthResponse {
        status: if phase == ServicePhase::Running { "ok" } else { "degraded" },
        phase,
        uptime_secs: state.services.uptime_secs(),
    })
}

// ============================================================================
// Readiness
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    #[serde(flatten)]
    pub readiness: LaunchReadiness,
    pub go_for_launch: bool,
    pub blocking_issues: Vec<String>,
}

/// GET /api/v1/readiness - Current go/no-go verdict
pub async fn get_readiness(State(state): State<ApiState>) -> Response {
    let (readiness, blocking_issues) = state.services.readiness.evaluate();
    ApiResponse::ok(ReadinessResponse {
        go_for_launch: readiness.level == ReadinessLevel::Ready,
        blocking_issues,
        readiness,
    })
}

/// GET /api/v1/stats - Receiver counters
pub async fn get_stats(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.services.receiver.stats())
}

// ============================================================================
// Milestones
// ============================================================================

/// GET /api/v1/milestones
pub async fn get_milestones(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.services.tracker.get_all_statuses())
}

/// GET /api/v1/milestones/:milestone
pub async fn get_milestone(
    State(state): State<ApiState>,
    Path(raw): Path<String>,
) -> Response {
    let milestone = match parse_milestone(&raw) {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    match state.services.tracker.get_status(milestone) {
        Some(status) => ApiResponse::ok(status),
        None => ApiErrorResponse::unknown_milestone_path(format!("no status for {milestone}")),
    }
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub milestone: Milestone,
    pub reset: bool,
}

/// POST /api/v1/milestones/:milestone/reset
pub async fn reset_milestone(
    State(state): State<ApiState>,
    Path(raw): Path<String>,
) -> Response {
    let milestone = match parse_milestone(&raw) {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    let reset = state.services.tracker.reset(milestone);
    info!(%milestone, "Milestone reset via API");
    ApiResponse::ok(ResetResponse { milestone, reset })
}

// ============================================================================
// History
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub milestone: Milestone,
    pub snapshots: Vec<MilestoneStatus>,
    pub average_progress: f64,
}

/// GET /api/v1/history/:milestone - Retained snapshots for one milestone
pub async fn get_history(
    State(state): State<ApiState>,
    Path(raw): Path<String>,
) -> Response {
    let milestone = match parse_milestone(&raw) {
        Ok(m) => m,
        Err(resp) => return resp,
    };
    let aggregator = state.services.aggregator.read().await;
    ApiResponse::ok(HistoryResponse {
        milestone,
        snapshots: aggregator.milestone_history(milestone),
        average_progress: aggregator.average_progress(milestone),
    })
}

/// GET /api/v1/timeline - First observed completion per milestone
pub async fn get_timeline(State(state): State<ApiState>) -> Response {
    let timeline: BTreeMap<Milestone, Option<DateTime<Utc>>> =
        state.services.aggregator.read().await.completion_timeline();
    ApiResponse::ok(timeline)
}
