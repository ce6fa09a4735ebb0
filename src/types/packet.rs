//! Telemetry packet model
//!
//! A [`Packet`] is one reading from a ground station. It is immutable once
//! built: milestone membership is checked at construction and rejected
//! outright, while business-level validity (non-empty id and payload) is a
//! soft check the receiver applies on ingestion.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Milestones
// ============================================================================

/// Launch countdown milestones, in countdown order.
///
/// The derived `Ord` follows declaration order, so ordered maps keyed by
/// `Milestone` iterate in countdown order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    EngineChill,
    FuelLoad,
    Pressurization,
    TerminalCount,
    Ignition,
    Liftoff,
}

impl Milestone {
    /// Every tracked milestone in countdown order.
    pub const ALL: [Milestone; 6] = [
        Milestone::EngineChill,
        Milestone::FuelLoad,
        Milestone::Pressurization,
        Milestone::TerminalCount,
        Milestone::Ignition,
        Milestone::Liftoff,
    ];

    /// Milestones whose failure scrubs the launch.
    pub const CRITICAL: [Milestone; 3] = [
        Milestone::EngineChill,
        Milestone::FuelLoad,
        Milestone::Pressurization,
    ];

    /// Wire name (`engine_chill`, `fuel_load`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Milestone::EngineChill => "engine_chill",
            Milestone::FuelLoad => "fuel_load",
            Milestone::Pressurization => "pressurization",
            Milestone::TerminalCount => "terminal_count",
            Milestone::Ignition => "ignition",
            Milestone::Liftoff => "liftoff",
        }
    }

    pub fn is_critical(self) -> bool {
        Self::CRITICAL.contains(&self)
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Milestone {
    type Err = PacketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| PacketError::UnknownMilestone(s.to_string()))
    }
}

// ============================================================================
// Payload
// ============================================================================

/// A single scalar payload value.
///
/// Untagged on the wire: `12.5`, `"complete"` and `true` map to the three
/// variants directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PayloadValue {
    /// Numeric value, if this is a number. Booleans are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PayloadValue::Number(n) => Some(*n),
            PayloadValue::Bool(_) | PayloadValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PayloadValue::Text(s) => Some(s),
            PayloadValue::Bool(_) | PayloadValue::Number(_) => None,
        }
    }
}

impl From<f64> for PayloadValue {
    fn from(v: f64) -> Self {
        PayloadValue::Number(v)
    }
}

impl From<i64> for PayloadValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(v: i64) -> Self {
        PayloadValue::Number(v as f64)
    }
}

impl From<bool> for PayloadValue {
    fn from(v: bool) -> Self {
        PayloadValue::Bool(v)
    }
}

impl From<&str> for PayloadValue {
    fn from(v: &str) -> Self {
        PayloadValue::Text(v.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(v: String) -> Self {
        PayloadValue::Text(v)
    }
}

/// Packet payload: key → scalar value.
pub type Payload = BTreeMap<String, PayloadValue>;

// ============================================================================
// Packet
// ============================================================================

/// Errors raised while constructing a [`Packet`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("invalid milestone: {0}")]
    UnknownMilestone(String),
}

/// One telemetry reading from a ground station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    id: String,
    timestamp: DateTime<Utc>,
    source: String,
    milestone: Milestone,
    payload: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sequence_number: Option<u64>,
}

impl Packet {
    /// Build a packet, resolving the milestone by wire name.
    ///
    /// Unknown milestones are a hard construction error.
    pub fn new(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
        milestone: &str,
        payload: Payload,
    ) -> Result<Self, PacketError> {
        let milestone = milestone.parse::<Milestone>()?;
        Ok(Self::for_milestone(id, timestamp, source, milestone, payload))
    }

    /// Build a packet for an already-resolved milestone.
    pub fn for_milestone(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
        milestone: Milestone,
        payload: Payload,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            source: source.into(),
            milestone,
            payload,
            sequence_number: None,
        }
    }

    /// Attach a sequence number.
    #[must_use]
    pub fn with_sequence(mut self, sequence_number: u64) -> Self {
        self.sequence_number = Some(sequence_number);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn milestone(&self) -> Milestone {
        self.milestone
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn sequence_number(&self) -> Option<u64> {
        self.sequence_number
    }

    /// Structural validity: a non-empty id and a non-empty payload.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.payload.is_empty()
    }
}
