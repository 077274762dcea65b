//! Prometheus metrics exposition server.
//!
//! Exposes topicwatch metrics in Prometheus format on a configurable port.

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Register all metric descriptions for Prometheus.
///
/// Called once at startup after the recorder is installed.
pub fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        "topicwatch_updates_total",
        "Total number of updates received for tracked topics"
    );
    describe_counter!(
        "topicwatch_updates_skipped_total",
        "Total number of updates ignored because the value did not change"
    );
    describe_counter!(
        "topicwatch_alerts_fired_total",
        "Total number of alerts fired, per topic"
    );
    describe_counter!(
        "topicwatch_alerts_sent_total",
        "Total number of messages delivered to Telegram"
    );
    describe_counter!(
        "topicwatch_notify_errors_total",
        "Total number of messages that could not be delivered"
    );
    describe_counter!(
        "topicwatch_alerts_dropped_total",
        "Total number of messages dropped due to full queue"
    );
    describe_counter!(
        "topicwatch_mqtt_reconnections_total",
        "Total number of MQTT connection failures followed by a retry"
    );

    describe_gauge!(
        "topicwatch_queue_size",
        "Current number of messages in the notification queue"
    );
    describe_gauge!(
        "topicwatch_mqtt_up",
        "MQTT connection status (1=connected, 0=disconnected)"
    );
    describe_gauge!(
        "topicwatch_build_info",
        "Build information with version label (always 1)"
    );
}

/// Metrics server for Prometheus exposition on `/metrics`.
pub struct MetricsServer {
    port: u16,
    /// Signalled once the recorder is installed.
    ready_tx: Option<oneshot::Sender<()>>,
}

impl MetricsServer {
    /// Create a new metrics server bound to the given port.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ready_tx: None,
        }
    }

    /// Create a server that signals `ready_tx` once the recorder is
    /// installed. Metrics emitted before that go to the no-op recorder.
    /// If installation fails, `ready_tx` is dropped unsignalled.
    pub fn with_ready_signal(port: u16, ready_tx: oneshot::Sender<()>) -> Self {
        Self {
            port,
            ready_tx: Some(ready_tx),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Install the global recorder and serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the exporter cannot be installed (port in use,
    /// recorder already set).
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let addr: SocketAddr = ([0, 0, 0, 0], self.port).into();

        // The recorder can only be installed once per process.
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

        register_metric_descriptions();

        if let Some(tx) = self.ready_tx {
            let _ = tx.send(());
        }

        info!(port = self.port, "Metrics server started on /metrics");

        cancel.cancelled().await;

        info!("Metrics server shutting down");

        Ok(())
    }
}

/// Initialize known metrics so they appear in `/metrics` before any event.
pub fn initialize_metrics(alert_topics: &[&str]) {
    use metrics::{counter, gauge};

    gauge!("topicwatch_build_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    gauge!("topicwatch_queue_size").set(0.0);
    gauge!("topicwatch_mqtt_up").set(0.0);

    counter!("topicwatch_updates_total").absolute(0);
    counter!("topicwatch_updates_skipped_total").absolute(0);
    counter!("topicwatch_alerts_dropped_total").absolute(0);
    counter!("topicwatch_mqtt_reconnections_total").absolute(0);

    for topic in alert_topics {
        counter!("topicwatch_alerts_fired_total", "topic" => topic.to_string()).absolute(0);
    }

    tracing::debug!(topics = alert_topics.len(), "Metrics initialized to zero");
}
