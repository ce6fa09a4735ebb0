//! Packet ingestion
//!
//! Gate-keeps and buffers telemetry packets from ground stations:
//!
//! - structural validation (non-empty id and payload)
//! - sequence-gap policy with a short reorder stage for early packets
//! - bounded FIFO buffering with oldest-first eviction
//! - bounded retry with exponential backoff (`receive_async`)
//!
//! Packets released into the main buffer are handed to registered
//! [`PacketListener`]s in release order.

mod receiver;
pub mod retry;

pub use receiver::{ReceiverStats, TelemetryReceiver};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};

use thiserror::Error;

use crate::types::Packet;

/// Why a packet was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    /// Empty id or empty payload.
    #[error("packet '{id}' is structurally invalid (empty id or payload)")]
    InvalidPacket { id: String },

    /// Sequence number at or below the last in-order sequence.
    #[error("sequence {sequence} does not advance past {last}")]
    SequenceRegression { sequence: u64, last: u64 },

    /// Sequence number too far ahead of the last in-order sequence.
    #[error("sequence {sequence} is {gap} ahead of {last} (max gap {max_gap})")]
    SequenceGap {
        sequence: u64,
        last: u64,
        gap: u64,
        max_gap: u64,
    },

    /// Sequence number already waiting in the reorder stage.
    #[error("sequence {sequence} is already staged")]
    DuplicateSequence { sequence: u64 },

    /// Acceptance failed for a recoverable reason.
    #[error("ingestion temporarily unavailable: {0}")]
    Unavailable(String),

    /// Acceptance failed unexpectedly.
    #[error("internal ingestion failure: {0}")]
    Internal(String),
}

impl IngestError {
    /// Only transient failures are worth another attempt; structural and
    /// ordering rejections fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IngestError::Unavailable(_))
    }
}

/// Observer invoked for every packet released into the main buffer.
///
/// Called synchronously inside the receiver's critical section, so
/// implementations must not call back into the receiver.
pub trait PacketListener: Send + Sync {
    fn on_packet(&self, packet: &Packet);
}

/// The acceptance step retried by [`TelemetryReceiver::receive_async_via`].
///
/// Implementations report failures without touching the receiver's error
/// counter; the retry loop does the counting.
pub trait PacketAcceptor: Send + Sync {
    fn accept(&self, packet: &Packet) -> Result<(), IngestError>;
}
