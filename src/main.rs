//! Topicwatch - Telegram alerts and status digests from MQTT topics.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use topicwatch::cli::{Cli, LogFormat};
use topicwatch::config::{Config, RuntimeConfig};
use topicwatch::metrics::initialize_metrics;
use topicwatch::schedule::{schedule_startup, schedule_status};
use topicwatch::{
    BotListener, DEFAULT_QUEUE_CAPACITY, MetricsServer, MqttTransport,
    NotificationQueue, NotificationWorker, TelegramNotifier, UpdateOrchestrator,
};

/// Capacity of the engine's inbound event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// How long to wait for the Prometheus recorder before zero-initializing.
const METRICS_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize the tracing subscriber with the specified log format.
fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    match format {
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_env_filter(filter)
                .init();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_format);

    info!(config_path = %cli.config.display(), "Loading configuration");

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %cli.config.display(), "Failed to load configuration");
            std::process::exit(1);
        }
    };

    info!("Validating configuration");
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!(error = %e, "Configuration validation error");
        }
        error!(
            error_count = errors.len(),
            "Configuration validation failed"
        );
        std::process::exit(1);
    }

    if cli.validate {
        println!("Configuration is valid: {}", cli.config.display());
        println!("  MQTT broker: {}:{}", config.mqtt.host, config.mqtt.port);
        println!("  Subscriptions: {}", config.events.subscriptions.len());
        println!("  Alerts: {}", config.events.alerts.len());
        println!(
            "  Status digest: {}",
            if config.events.motd {
                "enabled"
            } else {
                "disabled"
            }
        );
        println!(
            "  Bot commands: {}",
            if cli.commands_enabled(config.telegram.commands) {
                "enabled"
            } else {
                "disabled"
            }
        );
        println!(
            "  Metrics: {} (port {})",
            if config.metrics.enabled {
                "enabled"
            } else {
                "disabled"
            },
            config.metrics.port
        );
        return Ok(());
    }

    let runtime_config = config.compile()?;
    let commands = cli.commands_enabled(runtime_config.telegram.commands);

    info!(config_path = %cli.config.display(), "topicwatch starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(runtime_config, commands))
}

/// Main async entry point. `commands` starts the bot listener.
async fn run(runtime_config: RuntimeConfig, commands: bool) -> Result<()> {
    let RuntimeConfig {
        mqtt,
        telegram,
        engine: engine_config,
        metrics,
    } = runtime_config;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let cancel = CancellationToken::new();

    let (metrics_handle, metrics_ready) = if metrics.enabled {
        let (ready_tx, ready_rx) = oneshot::channel();
        let server = MetricsServer::with_ready_signal(metrics.port, ready_tx);
        let cancel_metrics = cancel.clone();
        info!(port = metrics.port, "Starting metrics server");
        let handle = tokio::spawn(async move {
            if let Err(e) = server.run(cancel_metrics).await {
                error!(error = %e, "Metrics server error");
            }
        });
        (Some(handle), Some(ready_rx))
    } else {
        info!("Metrics server disabled");
        (None, None)
    };

    // Alerts and digests go through one queue to the Telegram notifier.
    let queue = NotificationQueue::new(DEFAULT_QUEUE_CAPACITY);
    let notifier = Arc::new(TelegramNotifier::new(
        "telegram".to_string(),
        telegram.api_url.clone(),
        telegram.bot_token.clone(),
        telegram.owner_id.clone(),
        http_client.clone(),
    ));
    let mut worker = NotificationWorker::new(&queue, notifier);

    let grace_period = engine_config.grace_period;
    let motd_on_start = engine_config.motd_on_start;
    let motd_interval = engine_config.motd_interval;

    let alert_topics: Vec<String> = engine_config
        .rules
        .iter()
        .map(|r| r.topic.clone())
        .collect();
    let engine = UpdateOrchestrator::new(engine_config, queue);
    let topics = engine.subscription_topics();

    if let Some(ready_rx) = metrics_ready {
        match tokio::time::timeout(METRICS_READY_TIMEOUT, ready_rx).await {
            Ok(Ok(())) => {
                let alert_topics: Vec<&str> = alert_topics.iter().map(String::as_str).collect();
                initialize_metrics(&alert_topics);
            }
            Ok(Err(_)) => warn!("Metrics recorder not installed, skipping initialization"),
            Err(_) => warn!("Timed out waiting for metrics recorder"),
        }
    }

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let cancel_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c signal");
            return;
        }
        info!("Received shutdown signal, initiating graceful shutdown");
        cancel_signal.cancel();
    });

    let worker_cancel = cancel.clone();
    let worker_handle = tokio::spawn(async move {
        worker.run(worker_cancel).await;
    });

    let (connected_tx, connected_rx) = oneshot::channel();
    let transport = MqttTransport::new(&mqtt, topics).with_connected_signal(connected_tx);
    tokio::spawn(transport.run(tx.clone(), cancel.clone()));

    if commands {
        let listener = BotListener::new(&telegram, reqwest::Client::new());
        tokio::spawn(listener.run(tx.clone(), cancel.clone()));
    } else {
        info!("Bot commands disabled");
    }

    tokio::spawn(schedule_startup(
        connected_rx,
        tx.clone(),
        grace_period,
        motd_on_start,
        cancel.clone(),
    ));

    if let Some(interval) = motd_interval {
        tokio::spawn(schedule_status(tx.clone(), interval, cancel.clone()));
    }
    drop(tx);

    let engine_result = engine.run(rx, cancel.clone()).await;
    cancel.cancel();

    info!("Waiting for notification worker to drain queue...");
    let _ = tokio::time::timeout(Duration::from_secs(5), worker_handle).await;

    if let Some(handle) = metrics_handle {
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    }

    match engine_result {
        Ok(()) => {
            info!("topicwatch shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Engine error");
            Err(anyhow::anyhow!("Engine error: {}", e))
        }
    }
}
