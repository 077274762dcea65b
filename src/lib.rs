// src/lib.rs
//! Topicwatch - Telegram alerts and status digests from MQTT topics.

pub mod bot;
pub mod cli;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod rules;
pub mod schedule;
pub mod subscription;
pub mod template;
pub mod transport;

// Re-export commonly used types
pub use bot::{BotCommand, BotListener};
pub use cli::LogFormat;
pub use condition::TestKind;
pub use engine::{EngineEvent, UpdateOrchestrator, UpdateOutcome};
pub use metrics::{MetricsServer, register_metric_descriptions};
pub use notify::{
    AlertPayload, DEFAULT_QUEUE_CAPACITY, NotificationQueue, NotificationWorker, Notifier,
    TelegramNotifier, backoff_delay,
};
pub use rules::{AlertRule, AlertRuleEngine};
pub use subscription::{Subscription, SubscriptionStore};
pub use transport::{MqttTransport, TopicUpdate};
