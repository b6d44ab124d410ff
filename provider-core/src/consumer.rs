//! Blocking poll/consume loop for queue-backed providers.
//!
//! A [`Consumer`] owns a [`MessageSource`], decodes each polled message as
//! JSON, runs the provider's formatter and forwards the alerts to an
//! [`AlertSink`]. A message that cannot be decoded or formatted is logged,
//! counted and acked, and the loop moves on. A sink failure is different:
//! the message stays unacked so the source can redeliver it, and the loop
//! stops because every later message would be lost the same way. Otherwise
//! the loop runs until [`ConsumerHandle::stop`] is called from another
//! thread; the flag is checked once per iteration, so an in-flight poll
//! finishes first.

use crate::context::ProviderContext;
use crate::error::ProviderError;
use crate::formatter::FormatFn;
use alert_registry::AlertDto;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    /// Source-specific identity (offset, receipt handle) used for acks and logs.
    pub id: String,
    pub payload: Vec<u8>,
}

pub trait MessageSource: Send {
    /// Returns the next batch; an empty batch means nothing arrived within
    /// `timeout`.
    fn poll(&mut self, timeout: Duration) -> Result<Vec<RawMessage>, ProviderError>;

    fn ack(&mut self, message: &RawMessage) -> Result<(), ProviderError>;
}

/// Collector the formatted alerts are handed to.
pub trait AlertSink {
    fn push(&self, alerts: Vec<AlertDto>) -> Result<(), ProviderError>;
}

impl AlertSink for Sender<AlertDto> {
    fn push(&self, alerts: Vec<AlertDto>) -> Result<(), ProviderError> {
        for alert in alerts {
            self.send(alert)
                .map_err(|_| ProviderError::Queue("alert collector has shut down".into()))?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumerState {
    Idle,
    Consuming,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConsumeStats {
    pub received: u64,
    pub forwarded: u64,
    pub failed: u64,
    pub alerts: u64,
}

#[derive(Default)]
struct Shared {
    consume: AtomicBool,
    running: AtomicBool,
}

/// Cloneable control for a running consumer.
#[derive(Clone)]
pub struct ConsumerHandle {
    shared: Arc<Shared>,
}

impl ConsumerHandle {
    fn armed() -> Self {
        let shared = Shared::default();
        shared.consume.store(true, Ordering::SeqCst);
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Stopping is final: a later `start_consume` returns at once.
    pub fn stop(&self) {
        self.shared.consume.store(false, Ordering::SeqCst);
    }

    pub fn state(&self) -> ConsumerState {
        if self.shared.running.load(Ordering::SeqCst) {
            ConsumerState::Consuming
        } else {
            ConsumerState::Idle
        }
    }
}

pub struct Consumer<S> {
    source: S,
    formatter: FormatFn,
    context: ProviderContext,
    handle: ConsumerHandle,
    poll_timeout: Duration,
    idle_backoff: Duration,
}

impl<S: MessageSource> Consumer<S> {
    pub fn new(source: S, formatter: FormatFn, context: ProviderContext) -> Self {
        Self {
            source,
            formatter,
            context,
            handle: ConsumerHandle::armed(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
        }
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    pub fn handle(&self) -> ConsumerHandle {
        self.handle.clone()
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Blocks until stopped. Returns what was processed during this run.
    pub fn start_consume(&mut self, sink: &dyn AlertSink) -> ConsumeStats {
        let span = self.context.span();
        let _guard = span.enter();

        let shared = Arc::clone(&self.handle.shared);
        shared.running.store(true, Ordering::SeqCst);
        tracing::info!("consume loop started");

        let mut stats = ConsumeStats::default();
        while shared.consume.load(Ordering::SeqCst) {
            let batch = match self.source.poll(self.poll_timeout) {
                Ok(batch) => batch,
                Err(err) => {
                    tracing::warn!(error = %err, "poll failed");
                    std::thread::sleep(self.idle_backoff);
                    continue;
                }
            };
            if batch.is_empty() {
                std::thread::sleep(self.idle_backoff);
                continue;
            }

            for message in batch {
                stats.received += 1;
                match self.process(&message, sink) {
                    Ok(count) => {
                        stats.forwarded += 1;
                        stats.alerts += count as u64;
                    }
                    // Redelivery cannot fix a payload the formatter rejects,
                    // so it is acked like a forwarded one.
                    Err(Failure::Rejected(err)) => {
                        stats.failed += 1;
                        tracing::warn!(message_id = %message.id, error = %err, "dropping message");
                    }
                    Err(Failure::Undelivered(err)) => {
                        stats.failed += 1;
                        tracing::error!(
                            message_id = %message.id,
                            error = %err,
                            "alert sink failed, leaving message unacked and stopping"
                        );
                        shared.consume.store(false, Ordering::SeqCst);
                        break;
                    }
                }
                if let Err(err) = self.source.ack(&message) {
                    tracing::warn!(message_id = %message.id, error = %err, "ack failed");
                }
            }
        }

        shared.running.store(false, Ordering::SeqCst);
        tracing::info!(
            received = stats.received,
            forwarded = stats.forwarded,
            failed = stats.failed,
            "consume loop stopped"
        );
        stats
    }

    fn process(&self, message: &RawMessage, sink: &dyn AlertSink) -> Result<usize, Failure> {
        let event: serde_json::Value = serde_json::from_slice(&message.payload)
            .map_err(|e| {
                Failure::Rejected(ProviderError::format(format!("payload is not JSON: {e}")))
            })?;
        let alerts = (self.formatter)(&event, Some(&self.context))
            .map_err(Failure::Rejected)?
            .into_vec();
        let count = alerts.len();
        sink.push(alerts).map_err(Failure::Undelivered)?;
        Ok(count)
    }
}

enum Failure {
    /// The payload itself is bad.
    Rejected(ProviderError),
    /// The alerts were fine but the sink did not take them.
    Undelivered(ProviderError),
}
