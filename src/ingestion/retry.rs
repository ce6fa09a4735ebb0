//! Retrying packet submission with exponential backoff
//!
//! `receive_async` is a bounded loop: one initial attempt plus
//! `max_retries` retries, sleeping `base_delay × 2^attempt` between them.
//! The backoff sleeps are the only suspension points. Sleeping goes
//! through the [`Sleeper`] seam so tests can observe delays without
//! waiting for them.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::receiver::TelemetryReceiver;
use super::{IngestError, PacketAcceptor};
use crate::config::defaults::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY_MS};
use crate::types::Packet;

/// Retry budget and backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt + 1`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Suspends the retry loop between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Counts an abandoned attempt if dropped while a backoff is pending.
///
/// Dropping the `receive_async` future (e.g. on timeout) lands here.
struct PendingBackoff<'a> {
    receiver: &'a TelemetryReceiver,
    attempt: u32,
    armed: bool,
}

impl<'a> PendingBackoff<'a> {
    fn arm(receiver: &'a TelemetryReceiver, attempt: u32) -> Self {
        Self {
            receiver,
            attempt,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingBackoff<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.receiver.record_error();
            warn!(attempt = self.attempt, "Packet submission abandoned during backoff");
        }
    }
}

pub(super) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl TelemetryReceiver {
    /// Submit a packet, retrying transient failures with backoff.
    pub async fn receive_async(&self, packet: &Packet) -> bool {
        self.receive_async_via(self, packet, &CancellationToken::new())
            .await
    }

    /// As [`receive_async`](Self::receive_async), aborting when `cancel`
    /// fires during a backoff delay.
    pub async fn receive_async_cancellable(
        &self,
        packet: &Packet,
        cancel: &CancellationToken,
    ) -> bool {
        self.receive_async_via(self, packet, cancel).await
    }

    /// Retry loop around an arbitrary acceptance step.
    ///
    /// Error accounting, all against this receiver's counter:
    /// - each failed attempt counts once
    /// - exhausting the retries counts once more
    /// - an internal failure or panic counts exactly once and ends the call
    /// - cancellation during a backoff counts once
    ///
    /// Structural and ordering rejections are not retried. Nothing
    /// propagates out; callers only see the boolean.
    pub async fn receive_async_via<A>(
        &self,
        acceptor: &A,
        packet: &Packet,
        cancel: &CancellationToken,
    ) -> bool
    where
        A: PacketAcceptor + ?Sized,
    {
        let policy = self.retry;
        let mut attempt = 0u32;

        loop {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| acceptor.accept(packet)));
            match outcome {
                Ok(Ok(())) => {
                    if attempt > 0 {
                        debug!(packet_id = %packet.id(), attempt, "Packet accepted after retry");
                    }
                    return true;
                }
                Ok(Err(IngestError::Internal(reason))) => {
                    self.record_error();
                    error!(packet_id = %packet.id(), reason = %reason, "Internal failure during packet acceptance");
                    return false;
                }
                Ok(Err(e)) if e.is_retryable() => {
                    self.record_error();
                    if attempt >= policy.max_retries {
                        break;
                    }
                    warn!(packet_id = %packet.id(), attempt, error = %e, "Packet acceptance failed, backing off");
                }
                Ok(Err(e)) => {
                    self.record_error();
                    debug!(packet_id = %packet.id(), error = %e, "Packet rejected, not retrying");
                    return false;
                }
                Err(payload) => {
                    self.record_error();
                    error!(
                        packet_id = %packet.id(),
                        panic = %panic_message(payload.as_ref()),
                        "Panic during packet acceptance"
                    );
                    return false;
                }
            }

            let delay = policy.delay_for(attempt);
            let pending = PendingBackoff::arm(self, attempt);
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    // Dropping the armed guard records the abandoned attempt
                    drop(pending);
                    return false;
                }
                () = self.sleeper.sleep(delay) => pending.disarm(),
            }
            attempt += 1;
        }

        self.record_error();
        warn!(
            packet_id = %packet.id(),
            attempts = attempt + 1,
            "Packet acceptance retries exhausted"
        );
        false
    }
}
