//! Core configuration types and loading.

use super::env::{resolve_env_vars, resolve_path};
use super::secret::SecretString;
use super::validation::{parse_broker_url, validate_port};
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/topicwatch/config.yaml";

/// Default Telegram Bot API base URL.
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Main configuration structure for topicwatch.
///
/// Loaded from YAML; JSON files are accepted as well.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// MQTT broker connection settings.
    pub mqtt: MqttConfig,
    /// Telegram bot settings.
    pub telegram: TelegramConfig,
    /// Subscriptions, alert rules and status digest settings.
    pub events: EventsConfig,
    /// Metrics exposition configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Directory of the loaded file, used to resolve relative paths.
    #[serde(skip)]
    pub config_dir: PathBuf,
}

/// MQTT broker connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// Broker URL, e.g. `mqtt://broker.local` or `mqtts://broker.example.com`.
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub username: Option<String>,
    /// Password, `${VAR}` references are resolved from the environment.
    #[serde(default)]
    pub password: Option<SecretString>,
    #[serde(default = "default_keep_alive", with = "humantime_serde")]
    pub keep_alive: Duration,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "topicwatch".to_string()
}

fn default_keep_alive() -> Duration {
    Duration::from_secs(30)
}

/// Telegram bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot token, `${VAR}` references are resolved from the environment.
    pub bot_token: SecretString,
    /// Chat id of the bot owner: default recipient and only user answered.
    pub owner_id: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Poll for owner messages and answer them with the status digest.
    #[serde(default = "default_true")]
    pub commands: bool,
}

fn default_api_url() -> String {
    DEFAULT_TELEGRAM_API_URL.to_string()
}

pub(crate) fn default_true() -> bool {
    true
}

/// Subscriptions, alert rules and status digest settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Topics tracked for the status digest.
    #[serde(default)]
    pub subscriptions: Vec<String>,
    /// Alert rules, evaluated in this order.
    #[serde(default)]
    pub alerts: Vec<AlertConfig>,
    /// Enable the status digest.
    #[serde(default)]
    pub motd: bool,
    /// Send the status digest once alerts are enabled.
    #[serde(default)]
    pub motd_on_start: bool,
    /// Send the status digest periodically.
    #[serde(default, with = "humantime_serde")]
    pub motd_interval: Option<Duration>,
    #[serde(default)]
    pub mu_distance: String,
    #[serde(default)]
    pub mu_temperature: String,
    /// Inline status digest template.
    #[serde(default)]
    pub motd_template: Option<String>,
    /// Status digest template file, relative to the configuration directory.
    #[serde(default)]
    pub motd_template_file: Option<String>,
    /// Delay after startup before alerts are enabled, so retained messages
    /// received on subscribe do not fire.
    #[serde(default = "default_grace_period", with = "humantime_serde")]
    pub grace_period: Duration,
}

fn default_grace_period() -> Duration {
    Duration::from_secs(5)
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            subscriptions: Vec::new(),
            alerts: Vec::new(),
            motd: false,
            motd_on_start: false,
            motd_interval: None,
            mu_distance: String::new(),
            mu_temperature: String::new(),
            motd_template: None,
            motd_template_file: None,
            grace_period: default_grace_period(),
        }
    }
}

/// One alert rule as written in the configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    pub topic: String,
    /// `*`, `<N`, `>N`, a regex, or a literal.
    pub test: String,
    /// Message template; an empty message never dispatches.
    #[serde(default)]
    pub message: String,
}

/// Metrics exposition configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    ///
    /// # Errors
    /// Returns [`ConfigError::LoadError`] if the file cannot be read.
    /// Returns [`ConfigError::ValidationError`] if the content cannot be
    /// deserialized, including missing required fields.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::parse(&content)?;
        config.config_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        Ok(config)
    }

    /// Parse configuration from YAML or JSON text.
    ///
    /// Relative paths resolve against the current directory.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        config.config_dir = PathBuf::from(".");
        Ok(config)
    }

    /// Validate the whole configuration.
    ///
    /// # Errors
    /// Returns every problem found, not just the first one.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if let Err(e) = parse_broker_url(&self.mqtt.host) {
            errors.push(ConfigError::ValidationError(format!("mqtt.host: {}", e)));
        }
        if let Err(e) = validate_port(self.mqtt.port) {
            errors.push(ConfigError::ValidationError(format!("mqtt.port: {}", e)));
        }
        if self.mqtt.client_id.trim().is_empty() {
            errors.push(ConfigError::ValidationError(
                "mqtt.client_id cannot be empty".to_string(),
            ));
        }
        if self.mqtt.keep_alive < Duration::from_secs(1) {
            errors.push(ConfigError::ValidationError(
                "mqtt.keep_alive must be at least 1s".to_string(),
            ));
        }
        if let Some(ref password) = self.mqtt.password
            && let Err(e) = resolve_env_vars(password.expose())
        {
            errors.push(ConfigError::ValidationError(format!("mqtt.password: {}", e)));
        }

        match resolve_env_vars(self.telegram.bot_token.expose()) {
            Ok(token) if token.trim().is_empty() => errors.push(ConfigError::ValidationError(
                "telegram.bot_token cannot be empty".to_string(),
            )),
            Ok(_) => {}
            Err(e) => errors.push(ConfigError::ValidationError(format!(
                "telegram.bot_token: {}",
                e
            ))),
        }
        if self.telegram.owner_id.trim().is_empty() {
            errors.push(ConfigError::ValidationError(
                "telegram.owner_id cannot be empty".to_string(),
            ));
        }

        for (index, topic) in self.events.subscriptions.iter().enumerate() {
            if topic.trim().is_empty() {
                errors.push(ConfigError::ValidationError(format!(
                    "events.subscriptions[{}] cannot be empty",
                    index
                )));
            }
        }

        for (index, alert) in self.events.alerts.iter().enumerate() {
            if alert.topic.trim().is_empty() {
                errors.push(ConfigError::InvalidAlert {
                    index,
                    message: "topic cannot be empty".to_string(),
                });
            }
            if alert.message.is_empty() {
                tracing::warn!(
                    topic = %alert.topic,
                    test = %alert.test,
                    "Alert has no message and will never notify"
                );
            }
        }

        if self.events.motd
            && self.events.motd_template.is_none()
            && self.events.motd_template_file.is_none()
        {
            errors.push(ConfigError::ValidationError(
                "events.motd requires motd_template or motd_template_file".to_string(),
            ));
        }

        if let Some(ref file) = self.events.motd_template_file {
            let path = resolve_path(file, &self.config_dir);
            if !path.is_file() {
                errors.push(ConfigError::ValidationError(format!(
                    "events.motd_template_file not found: {}",
                    path.display()
                )));
            }
        }

        if matches!(self.events.motd_interval, Some(interval) if interval.is_zero()) {
            errors.push(ConfigError::ValidationError(
                "events.motd_interval must be greater than zero".to_string(),
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
