//! Notification queue and worker implementation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::{AlertPayload, Notifier};
use crate::error::QueueError;

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Notification queue using broadcast channel with ring buffer.
///
/// The broadcast channel provides native Drop Oldest behavior:
/// when capacity is reached, old messages are automatically overwritten.
///
/// # Thread Safety
///
/// The queue is `Clone + Send + Sync` and can be shared across tasks.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: broadcast::Sender<AlertPayload>,
}

impl NotificationQueue {
    /// Create a new notification queue with specified capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Send an alert to the queue (non-blocking).
    ///
    /// If the queue is full, the oldest messages are dropped (detected by
    /// receivers as `Lagged`).
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Alert queued successfully.
    /// * `Err(QueueError::Closed)` - No active receivers.
    pub fn send(&self, payload: AlertPayload) -> Result<(), QueueError> {
        tracing::trace!(source = %payload.source, "Enqueueing notification");
        self.tx.send(payload).map_err(|_| QueueError::Closed)?;

        metrics::gauge!("topicwatch_queue_size").set(self.tx.len() as f64);

        Ok(())
    }

    /// Create a new receiver for this queue.
    pub fn subscribe(&self) -> broadcast::Receiver<AlertPayload> {
        self.tx.subscribe()
    }

    /// Get the current number of messages in the queue.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.len() == 0
    }
}

/// Worker that consumes alerts from the queue and delivers them.
///
/// Runs until cancelled or until every queue handle is dropped.
pub struct NotificationWorker {
    rx: broadcast::Receiver<AlertPayload>,
    tx: broadcast::Sender<AlertPayload>,
    notifier: Arc<dyn Notifier>,
}

impl NotificationWorker {
    /// Create a worker. The receiver is registered immediately, so alerts
    /// sent after this call are not lost even if `run` starts later.
    pub fn new(queue: &NotificationQueue, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            rx: queue.subscribe(),
            tx: queue.tx.clone(),
            notifier,
        }
    }

    /// Run the worker loop until cancelled or queue closed.
    pub async fn run(&mut self, cancel: CancellationToken) {
        tracing::debug!(notifier = %self.notifier.name(), "Notification worker started");

        loop {
            tokio::select! {
                result = self.rx.recv() => {
                    match result {
                        Ok(payload) => {
                            self.process(payload).await;
                            metrics::gauge!("topicwatch_queue_size").set(self.tx.len() as f64);
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(
                                dropped_count = n,
                                "Queue full, dropping {} oldest notifications",
                                n
                            );
                            metrics::counter!("topicwatch_alerts_dropped_total").increment(n);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::debug!("Notification queue closed");
                            return;
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("Notification worker shutting down gracefully");
                    return;
                }
            }
        }
    }

    /// Deliver one payload. Failures are logged and never propagated.
    async fn process(&self, payload: AlertPayload) {
        let span = tracing::info_span!("process_notification", source = %payload.source);

        async {
            match self.notifier.send(&payload).await {
                Ok(()) => {
                    tracing::info!(notifier = %self.notifier.name(), "Notification sent");
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        notifier = %self.notifier.name(),
                        "Failed to send notification after all retries"
                    );
                }
            }
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for NotificationWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationWorker")
            .field("notifier", &self.notifier.name())
            .finish()
    }
}

/// Calculate exponential backoff delay.
///
/// Formula: min(base * 2^attempt, max)
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let delay = base.saturating_mul(2_u32.saturating_pow(attempt));
    std::cmp::min(delay, max)
}
