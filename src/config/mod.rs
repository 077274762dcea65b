//! Configuration loading and validation for topicwatch.
//!
//! This module handles loading the YAML (or JSON) configuration file,
//! validation, and resolving environment variables for secrets.

mod env;
mod runtime;
mod secret;
mod types;
mod validation;

pub use env::{resolve_env_vars, resolve_motd_template, resolve_path};
pub use runtime::{EngineConfig, MqttSettings, RuntimeConfig, TelegramSettings};
pub use secret::SecretString;
pub use types::{
    AlertConfig, Config, DEFAULT_CONFIG_PATH, DEFAULT_TELEGRAM_API_URL, EventsConfig,
    MetricsConfig, MqttConfig, TelegramConfig,
};
pub use validation::{BrokerUrl, parse_broker_url};
