//! Telemetry receiver: validation, sequence ordering and bounded buffering

use std::collections::{BTreeMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, error, trace, warn};

use super::retry::{panic_message, RetryPolicy, Sleeper, TokioSleeper};
use super::{IngestError, PacketAcceptor, PacketListener};
use crate::config::defaults::{DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_SEQUENCE_GAP};
use crate::config::IngestionConfig;
use crate::types::{Milestone, Packet};

/// Receiver counters, as reported to the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReceiverStats {
    pub packet_count: u64,
    pub error_count: u64,
    pub buffer_size: usize,
    pub buffer_capacity: usize,
}

/// Everything guarded by the receiver's single mutex.
#[derive(Default)]
struct ReceiverInner {
    buffer: VecDeque<Packet>,
    /// Reorder stage: early packets keyed by sequence number
    staged: BTreeMap<u64, Packet>,
    /// Highest sequence number released in order
    last_sequence: Option<u64>,
    packet_count: u64,
    error_count: u64,
    listeners: Vec<Arc<dyn PacketListener>>,
}

impl ReceiverInner {
    fn admit(&mut self, packet: Packet, capacity: usize, max_gap: u64) -> Result<(), IngestError> {
        if !packet.is_valid() {
            return Err(IngestError::InvalidPacket {
                id: packet.id().to_string(),
            });
        }

        let Some(sequence) = packet.sequence_number() else {
            self.append(packet, capacity);
            return Ok(());
        };

        if let Some(last) = self.last_sequence {
            if sequence <= last {
                return Err(IngestError::SequenceRegression { sequence, last });
            }
            let gap = sequence - last;
            if gap > max_gap {
                return Err(IngestError::SequenceGap {
                    sequence,
                    last,
                    gap,
                    max_gap,
                });
            }
        }
        if self.staged.contains_key(&sequence) {
            return Err(IngestError::DuplicateSequence { sequence });
        }

        self.staged.insert(sequence, packet);
        self.release_staged(capacity);
        Ok(())
    }

    /// Move contiguous packets from the front of the reorder stage into the
    /// main buffer.
    fn release_staged(&mut self, capacity: usize) {
        while let Some((&next, _)) = self.staged.first_key_value() {
            let contiguous = match self.last_sequence {
                Some(last) => last.checked_add(1) == Some(next),
                None => true,
            };
            if !contiguous {
                trace!(next, waiting = self.staged.len(), "Reorder stage waiting for predecessor");
                break;
            }
            let Some(packet) = self.staged.remove(&next) else {
                break;
            };
            self.last_sequence = Some(next);
            self.append(packet, capacity);
        }
    }

    /// Buffer and count the packet, then notify listeners.
    ///
    /// The packet is committed before any listener runs. A panicking
    /// listener is contained and counted as one error; the packet stays
    /// accepted and the remaining listeners still run.
    fn append(&mut self, packet: Packet, capacity: usize) {
        if self.buffer.len() >= capacity {
            if let Some(evicted) = self.buffer.pop_front() {
                trace!(evicted = %evicted.id(), "Buffer full, evicted oldest packet");
            }
        }
        self.buffer.push_back(packet);
        self.packet_count += 1;

        let Some(packet) = self.buffer.back() else {
            return;
        };
        let mut failures = 0u64;
        for listener in &self.listeners {
            if let Err(payload) =
                panic::catch_unwind(AssertUnwindSafe(|| listener.on_packet(packet)))
            {
                failures += 1;
                error!(
                    packet_id = %packet.id(),
                    panic = %panic_message(payload.as_ref()),
                    "Packet listener panicked"
                );
            }
        }
        self.error_count += failures;
    }
}

/// Receives and buffers telemetry packets from ground systems.
///
/// All mutable state sits behind one mutex, so `receive` may be called
/// from any number of request handlers concurrently.
pub struct TelemetryReceiver {
    inner: Mutex<ReceiverInner>,
    capacity: usize,
    max_sequence_gap: u64,
    pub(super) retry: RetryPolicy,
    pub(super) sleeper: Arc<dyn Sleeper>,
}

impl Default for TelemetryReceiver {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl TelemetryReceiver {
    /// Receiver with the given buffer capacity and default ordering and
    /// retry policy.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(ReceiverInner::default()),
            capacity: capacity.max(1),
            max_sequence_gap: DEFAULT_MAX_SEQUENCE_GAP,
            retry: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Receiver configured from the `[ingestion]` config section.
    pub fn from_config(config: &IngestionConfig) -> Self {
        Self::new(config.buffer_capacity)
            .with_max_sequence_gap(config.max_sequence_gap)
            .with_retry_policy(RetryPolicy {
                max_retries: config.max_retries,
                base_delay: config.retry_base_delay(),
            })
    }

    #[must_use]
    pub fn with_max_sequence_gap(mut self, max_gap: u64) -> Self {
        self.max_sequence_gap = max_gap;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Replace the backoff sleeper (tests inject a recording sleeper).
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    fn lock(&self) -> MutexGuard<'_, ReceiverInner> {
        // Inner state is consistent between statements; a panicking
        // listener must not wedge ingestion.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept a packet, returning whether it was taken.
    pub fn receive(&self, packet: &Packet) -> bool {
        self.try_receive(packet).is_ok()
    }

    /// Accept a packet, reporting why it was rejected.
    ///
    /// Every rejection increments the error counter.
    pub fn try_receive(&self, packet: &Packet) -> Result<(), IngestError> {
        let mut inner = self.lock();
        let result = inner.admit(packet.clone(), self.capacity, self.max_sequence_gap);
        match &result {
            Ok(()) => debug!(
                packet_id = %packet.id(),
                milestone = %packet.milestone(),
                sequence = ?packet.sequence_number(),
                "Packet accepted"
            ),
            Err(e) => {
                inner.error_count += 1;
                warn!(packet_id = %packet.id(), error = %e, "Packet rejected");
            }
        }
        result
    }

    /// Acceptance without error accounting (the retry loop counts).
    fn admit(&self, packet: &Packet) -> Result<(), IngestError> {
        self.lock()
            .admit(packet.clone(), self.capacity, self.max_sequence_gap)
    }

    pub(super) fn record_error(&self) {
        self.lock().error_count += 1;
    }

    /// Register an observer for released packets. Listeners run in
    /// registration order.
    pub fn register_listener(&self, listener: Arc<dyn PacketListener>) {
        self.lock().listeners.push(listener);
    }

    pub fn stats(&self) -> ReceiverStats {
        let inner = self.lock();
        ReceiverStats {
            packet_count: inner.packet_count,
            error_count: inner.error_count,
            buffer_size: inner.buffer.len(),
            buffer_capacity: self.capacity,
        }
    }

    /// Buffered packets, oldest first, optionally for one milestone.
    pub fn packets(&self, milestone: Option<Milestone>) -> Vec<Packet> {
        self.lock()
            .buffer
            .iter()
            .filter(|p| milestone.map_or(true, |m| p.milestone() == m))
            .cloned()
            .collect()
    }

    /// Buffered packet with the newest timestamp.
    pub fn latest_packet(&self, milestone: Option<Milestone>) -> Option<Packet> {
        self.lock()
            .buffer
            .iter()
            .filter(|p| milestone.map_or(true, |m| p.milestone() == m))
            .max_by_key(|p| p.timestamp())
            .cloned()
    }

    /// Drop all buffered packets. Counters and sequence state are kept.
    pub fn clear_buffer(&self) {
        let mut inner = self.lock();
        let dropped = inner.buffer.len();
        inner.buffer.clear();
        debug!(dropped, "Packet buffer cleared");
    }

    /// Packets waiting in the reorder stage for a predecessor.
    pub fn staged_count(&self) -> usize {
        self.lock().staged.len()
    }

    pub fn last_sequence_number(&self) -> Option<u64> {
        self.lock().last_sequence
    }
}

impl PacketAcceptor for TelemetryReceiver {
    fn accept(&self, packet: &Packet) -> Result<(), IngestError> {
        self.admit(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Payload, PayloadValue};
    use chrono::{Duration, TimeZone, Utc};

    fn packet(id: &str, milestone: Milestone) -> Packet {
        let mut payload = Payload::new();
        payload.insert("status".to_string(), PayloadValue::from("in_progress"));
        Packet::for_milestone(id, Utc::now(), "gs1", milestone, payload)
    }

    fn sequenced(seq: u64) -> Packet {
        packet(&format!("SEQ-{seq}"), Milestone::EngineChill).with_sequence(seq)
    }

    fn buffered_ids(receiver: &TelemetryReceiver) -> Vec<String> {
        receiver
            .packets(None)
            .iter()
            .map(|p| p.id().to_string())
            .collect()
    }

    #[test]
    fn test_receive_valid_packet() {
        let receiver = TelemetryReceiver::default();
        assert!(receiver.receive(&packet("PKT-1", Milestone::FuelLoad)));

        let stats = receiver.stats();
        assert_eq!(stats.packet_count, 1);
        assert_eq!(stats.error_count, 0);
        assert_eq!(stats.buffer_size, 1);
        assert_eq!(stats.buffer_capacity, 1000);
    }

    #[test]
    fn test_empty_payload_rejected_and_counted() {
        let receiver = TelemetryReceiver::default();
        let empty =
            Packet::for_milestone("PKT-1", Utc::now(), "gs1", Milestone::FuelLoad, Payload::new());

        assert_eq!(
            receiver.try_receive(&empty),
            Err(IngestError::InvalidPacket {
                id: "PKT-1".to_string()
            })
        );
        let stats = receiver.stats();
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.packet_count, 0);
        assert_eq!(stats.buffer_size, 0);
    }

    #[test]
    fn test_empty_id_rejected() {
        let receiver = TelemetryReceiver::default();
        assert!(!receiver.receive(&packet("", Milestone::FuelLoad)));
        assert_eq!(receiver.stats().error_count, 1);
    }

    #[test]
    fn test_fifo_eviction_keeps_newest() {
        let receiver = TelemetryReceiver::new(3);
        for i in 1..=5 {
            assert!(receiver.receive(&packet(&format!("PKT-{i}"), Milestone::Ignition)));
        }

        assert_eq!(buffered_ids(&receiver), vec!["PKT-3", "PKT-4", "PKT-5"]);
        let stats = receiver.stats();
        assert_eq!(stats.buffer_size, 3);
        assert_eq!(stats.packet_count, 5);
        assert_eq!(stats.error_count, 0);
    }

    #[test]
    fn test_first_sequence_accepted_immediately() {
        let receiver = TelemetryReceiver::default();
        assert!(receiver.receive(&sequenced(42)));
        assert_eq!(receiver.last_sequence_number(), Some(42));
        assert_eq!(receiver.stats().buffer_size, 1);
    }

    #[test]
    fn test_duplicate_and_regressed_sequence_rejected() {
        let receiver = TelemetryReceiver::default();
        assert!(receiver.receive(&sequenced(5)));

        assert_eq!(
            receiver.try_receive(&sequenced(5)),
            Err(IngestError::SequenceRegression { sequence: 5, last: 5 })
        );
        assert_eq!(receiver.stats().error_count, 1);

        assert!(!receiver.receive(&sequenced(4)));
        assert_eq!(receiver.stats().error_count, 2);
        assert_eq!(receiver.stats().packet_count, 1);
    }

    #[test]
    fn test_gap_boundary() {
        let receiver = TelemetryReceiver::default();
        assert!(receiver.receive(&sequenced(5)));

        // 9 - 5 = 4 > 3
        assert_eq!(
            receiver.try_receive(&sequenced(9)),
            Err(IngestError::SequenceGap {
                sequence: 9,
                last: 5,
                gap: 4,
                max_gap: 3
            })
        );
        // 8 - 5 = 3, staged
        assert!(receiver.receive(&sequenced(8)));
        assert_eq!(receiver.staged_count(), 1);
        assert_eq!(receiver.stats().error_count, 1);
    }

    #[test]
    fn test_out_of_order_packets_reassembled() {
        let receiver = TelemetryReceiver::default();
        assert!(receiver.receive(&sequenced(1)));
        assert!(receiver.receive(&sequenced(3)));
        assert!(receiver.receive(&sequenced(4)));

        // 3 and 4 wait for 2
        assert_eq!(buffered_ids(&receiver), vec!["SEQ-1"]);
        assert_eq!(receiver.stats().packet_count, 1);
        assert_eq!(receiver.staged_count(), 2);

        assert!(receiver.receive(&sequenced(2)));
        assert_eq!(buffered_ids(&receiver), vec!["SEQ-1", "SEQ-2", "SEQ-3", "SEQ-4"]);
        assert_eq!(receiver.last_sequence_number(), Some(4));
        assert_eq!(receiver.staged_count(), 0);
        assert_eq!(receiver.stats().packet_count, 4);
    }

    #[test]
    fn test_staged_duplicate_rejected() {
        let receiver = TelemetryReceiver::default();
        assert!(receiver.receive(&sequenced(1)));
        assert!(receiver.receive(&sequenced(3)));
        assert_eq!(
            receiver.try_receive(&sequenced(3)),
            Err(IngestError::DuplicateSequence { sequence: 3 })
        );
        assert_eq!(receiver.stats().error_count, 1);
    }

    #[test]
    fn test_unsequenced_bypass_reorder_stage() {
        let receiver = TelemetryReceiver::default();
        assert!(receiver.receive(&sequenced(1)));
        assert!(receiver.receive(&sequenced(3)));
        assert!(receiver.receive(&packet("U1", Milestone::Liftoff)));
        assert!(receiver.receive(&sequenced(2)));
        assert!(receiver.receive(&packet("U2", Milestone::Liftoff)));

        assert_eq!(
            buffered_ids(&receiver),
            vec!["SEQ-1", "U1", "SEQ-2", "SEQ-3", "U2"]
        );
    }

    #[test]
    fn test_custom_gap_threshold() {
        let receiver = TelemetryReceiver::default().with_max_sequence_gap(1);
        assert!(receiver.receive(&sequenced(1)));
        assert!(!receiver.receive(&sequenced(3)));
        assert!(receiver.receive(&sequenced(2)));
    }

    #[test]
    fn test_filter_and_latest_by_milestone() {
        let receiver = TelemetryReceiver::default();
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut payload = Payload::new();
        payload.insert("temp".to_string(), PayloadValue::from(-180.0));

        let newer = Packet::for_milestone(
            "CHILL-2",
            base + Duration::seconds(5),
            "gs1",
            Milestone::EngineChill,
            payload.clone(),
        );
        let older =
            Packet::for_milestone("CHILL-1", base, "gs1", Milestone::EngineChill, payload.clone());
        let fuel = Packet::for_milestone(
            "FUEL-1",
            base + Duration::seconds(10),
            "gs2",
            Milestone::FuelLoad,
            payload,
        );

        for p in [&newer, &older, &fuel] {
            assert!(receiver.receive(p));
        }

        assert_eq!(receiver.packets(Some(Milestone::EngineChill)).len(), 2);
        assert_eq!(
            receiver.latest_packet(Some(Milestone::EngineChill)).unwrap().id(),
            "CHILL-2"
        );
        assert_eq!(receiver.latest_packet(None).unwrap().id(), "FUEL-1");
        assert!(receiver.latest_packet(Some(Milestone::Liftoff)).is_none());
    }

    #[test]
    fn test_clear_buffer_keeps_counters() {
        let receiver = TelemetryReceiver::default();
        assert!(receiver.receive(&packet("PKT-1", Milestone::FuelLoad)));
        receiver.clear_buffer();

        let stats = receiver.stats();
        assert_eq!(stats.buffer_size, 0);
        assert_eq!(stats.packet_count, 1);
    }

    #[test]
    fn test_listeners_see_release_order() {
        struct Recorder(Mutex<Vec<String>>);
        impl PacketListener for Recorder {
            fn on_packet(&self, packet: &Packet) {
                self.0.lock().unwrap().push(packet.id().to_string());
            }
        }

        let receiver = TelemetryReceiver::default();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        receiver.register_listener(recorder.clone());

        assert!(receiver.receive(&sequenced(1)));
        assert!(receiver.receive(&sequenced(3)));
        assert!(!receiver.receive(&packet("", Milestone::FuelLoad)));
        assert!(receiver.receive(&sequenced(2)));

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["SEQ-1", "SEQ-2", "SEQ-3"]
        );
    }

    #[test]
    fn test_panicking_listener_leaves_packet_committed() {
        struct Exploder;
        impl PacketListener for Exploder {
            fn on_packet(&self, packet: &Packet) {
                if packet.id() == "BOOM" {
                    panic!("listener failure");
                }
            }
        }
        struct Recorder(Mutex<Vec<String>>);
        impl PacketListener for Recorder {
            fn on_packet(&self, packet: &Packet) {
                self.0.lock().unwrap().push(packet.id().to_string());
            }
        }

        let receiver = TelemetryReceiver::new(2);
        assert!(receiver.receive(&packet("A", Milestone::FuelLoad).with_sequence(1)));
        assert!(receiver.receive(&packet("B", Milestone::FuelLoad)));

        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        receiver.register_listener(Arc::new(Exploder));
        receiver.register_listener(recorder.clone());

        // committed despite the panic: buffered, counted, sequence advanced
        assert!(receiver.receive(&packet("BOOM", Milestone::FuelLoad).with_sequence(2)));
        assert_eq!(buffered_ids(&receiver), vec!["B", "BOOM"]);
        assert_eq!(receiver.last_sequence_number(), Some(2));
        let stats = receiver.stats();
        assert_eq!(stats.packet_count, 3);
        assert_eq!(stats.error_count, 1);
        assert_eq!(*recorder.0.lock().unwrap(), vec!["BOOM"]);

        // receiver keeps working and sequence 3 follows on
        assert!(receiver.receive(&packet("C", Milestone::FuelLoad).with_sequence(3)));
        assert_eq!(buffered_ids(&receiver), vec!["BOOM", "C"]);
        assert_eq!(receiver.stats().error_count, 1);
    }

    #[tokio::test]
    async fn test_panicking_listener_does_not_fail_async_submission() {
        struct Exploder;
        impl PacketListener for Exploder {
            fn on_packet(&self, _packet: &Packet) {
                panic!("listener failure");
            }
        }

        let receiver = TelemetryReceiver::new(2);
        receiver.register_listener(Arc::new(Exploder));

        assert!(receiver.receive_async(&sequenced(1)).await);
        assert_eq!(
            receiver.try_receive(&sequenced(1)),
            Err(IngestError::SequenceRegression { sequence: 1, last: 1 })
        );
        let stats = receiver.stats();
        assert_eq!(stats.packet_count, 1);
        assert_eq!(stats.buffer_size, 1);
        // one contained panic plus the regression
        assert_eq!(stats.error_count, 2);
    }

    #[test]
    fn test_stats_idempotent() {
        let receiver = TelemetryReceiver::default();
        assert!(receiver.receive(&packet("PKT-1", Milestone::FuelLoad)));
        assert!(!receiver.receive(&packet("", Milestone::FuelLoad)));
        assert_eq!(receiver.stats(), receiver.stats());
    }

    #[test]
    fn test_concurrent_receive_counts_every_packet() {
        let receiver = Arc::new(TelemetryReceiver::new(10_000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let receiver = Arc::clone(&receiver);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        receiver.receive(&packet(&format!("T{t}-{i}"), Milestone::Ignition));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let stats = receiver.stats();
        assert_eq!(stats.packet_count, 2000);
        assert_eq!(stats.buffer_size, 2000);
    }
}
