//! Packet submission endpoint

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::envelope::{ApiErrorResponse, ApiResponse, ErrorCode};
use crate::types::{Packet, PacketError, Payload};

use super::ApiState;

/// Wire form of a telemetry packet.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PacketSubmission {
    pub packet_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub milestone: String,
    #[serde(default)]
    pub data: Payload,
    #[serde(default)]
    pub sequence_number: Option<u64>,
}

impl TryFrom<PacketSubmission> for Packet {
    type Error = PacketError;

    fn try_from(sub: PacketSubmission) -> Result<Self, Self::Error> {
        let packet = Packet::new(
            sub.packet_id,
            sub.timestamp,
            sub.source,
            &sub.milestone,
            sub.data,
        )?;
        Ok(match sub.sequence_number {
            Some(seq) => packet.with_sequence(seq),
            None => packet,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PacketAccepted {
    pub status: &'static str,
    pub packet_id: String,
}

/// POST /api/v1/packets - Submit one telemetry packet
pub async fn submit_packet(
    State(state): State<ApiState>,
    body: Result<Json<PacketSubmission>, JsonRejection>,
) -> Response {
    let submission = match body {
        Ok(Json(submission)) => submission,
        Err(rejection) => {
            debug!(error = %rejection, "Malformed packet submission");
            return ApiErrorResponse::submission(ErrorCode::MalformedSubmission, rejection.body_text());
        }
    };

    let packet = match Packet::try_from(submission) {
        Ok(packet) => packet,
        Err(e) => {
            warn!(error = %e, "Packet submission rejected");
            return ApiErrorResponse::submission(ErrorCode::UnknownMilestone, e.to_string());
        }
    };

    let receiver = &state.services.receiver;
    if receiver
        .receive_async_cancellable(&packet, &state.shutdown)
        .await
    {
        return ApiResponse::created(PacketAccepted {
            status: "accepted",
            packet_id: packet.id().to_string(),
        });
    }

    if state.shutdown.is_cancelled() {
        return ApiErrorResponse::packet(
            ErrorCode::ShuttingDown,
            packet.id(),
            "service shutting down",
        );
    }
    ApiErrorResponse::packet(
        ErrorCode::PacketRejected,
        packet.id(),
        format!("packet {} rejected", packet.id()),
    )
}
