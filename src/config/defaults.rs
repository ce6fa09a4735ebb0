//! System-wide default constants.
//!
//! Grouped by subsystem. `ServiceConfig::default()` is built from these.

// ============================================================================
// Server
// ============================================================================

/// Default HTTP bind address.
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8080";

// ============================================================================
// Ingestion
// ============================================================================

/// Main packet buffer capacity before FIFO eviction kicks in.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1_000;

/// Largest tolerated jump between consecutive sequence numbers.
///
/// A gap of 1 is the next expected packet; gaps of 2..=3 are staged until
/// their predecessors arrive.
pub const DEFAULT_MAX_SEQUENCE_GAP: u64 = 3;

/// Retries after the initial attempt in `receive_async` (4 attempts total).
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base backoff delay (ms). Attempt `n` waits `base × 2^n`.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

// ============================================================================
// Status Aggregator
// ============================================================================

/// How long milestone snapshots are retained (hours).
pub const DEFAULT_RETENTION_HOURS: u64 = 24;

/// Interval between background milestone snapshots (seconds).
pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 10;
