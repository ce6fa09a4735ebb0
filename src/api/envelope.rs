//! Consistent response envelope for all API endpoints.
//!
//! Every response is wrapped in either [`ApiResponse`] (success) or
//! [`ApiErrorResponse`] (error), so clients see one JSON shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

pub const API_VERSION: &str = "1";

/// Metadata included in every response.
#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub timestamp: String,
    pub version: &'static str,
}

impl Default for ResponseMeta {
    fn default() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            version: API_VERSION,
        }
    }
}

/// Successful response: `{ "data": T, "meta": { ... } }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    fn with_status(status: StatusCode, data: T) -> Response {
        let body = Self {
            data,
            meta: ResponseMeta::default(),
        };
        (status, axum::Json(body)).into_response()
    }

    pub fn ok(data: T) -> Response {
        Self::with_status(StatusCode::OK, data)
    }

    pub fn created(data: T) -> Response {
        Self::with_status(StatusCode::CREATED, data)
    }
}

/// Machine-readable reason a request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Body is not a well-formed packet submission
    MalformedSubmission,
    /// Milestone name outside the launch sequence
    UnknownMilestone,
    /// Receiver refused the packet (invalid, out of order or exhausted)
    PacketRejected,
    /// Service is draining
    ShuttingDown,
}

impl ErrorCode {
    fn status(self, in_path: bool) -> StatusCode {
        match self {
            ErrorCode::UnknownMilestone if in_path => StatusCode::NOT_FOUND,
            ErrorCode::MalformedSubmission
            | ErrorCode::UnknownMilestone
            | ErrorCode::PacketRejected => StatusCode::BAD_REQUEST,
            ErrorCode::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Error detail inside [`ApiErrorResponse`].
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: ErrorCode,
    pub message: String,
    /// Submitted packet the error refers to, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packet_id: Option<String>,
}

/// Error response: `{ "error": { "code": "...", "message": "..." }, "meta": { ... } }`
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ErrorDetail,
    pub meta: ResponseMeta,
}

impl ApiErrorResponse {
    fn build(status: StatusCode, detail: ErrorDetail) -> Response {
        let body = Self {
            error: detail,
            meta: ResponseMeta::default(),
        };
        (status, axum::Json(body)).into_response()
    }

    /// Error about the request body.
    pub fn submission(code: ErrorCode, msg: impl Into<String>) -> Response {
        Self::build(
            code.status(false),
            ErrorDetail {
                code,
                message: msg.into(),
                packet_id: None,
            },
        )
    }

    /// Error about one submitted packet.
    pub fn packet(code: ErrorCode, packet_id: &str, msg: impl Into<String>) -> Response {
        Self::build(
            code.status(false),
            ErrorDetail {
                code,
                message: msg.into(),
                packet_id: Some(packet_id.to_string()),
            },
        )
    }

    /// A path names a milestone that does not exist.
    pub fn unknown_milestone_path(msg: impl Into<String>) -> Response {
        let code = ErrorCode::UnknownMilestone;
        Self::build(
            code.status(true),
            ErrorDetail {
                code,
                message: msg.into(),
                packet_id: None,
            },
        )
    }
}
