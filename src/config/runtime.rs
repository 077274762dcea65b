//! Runtime configuration with resolved secrets and classified rule tests.

use super::env::{resolve_env_vars, resolve_motd_template};
use super::secret::SecretString;
use super::types::{Config, MetricsConfig};
use super::validation::parse_broker_url;
use crate::error::ConfigError;
use crate::rules::AlertRule;
use crate::template::{DigestUnits, MotdTemplate};
use std::time::Duration;

/// Runtime configuration, produced once by [`Config::compile`].
#[derive(Debug)]
pub struct RuntimeConfig {
    pub mqtt: MqttSettings,
    pub telegram: TelegramSettings,
    pub engine: EngineConfig,
    pub metrics: MetricsConfig,
}

/// Broker connection with secrets resolved.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub keep_alive: Duration,
}

/// Telegram bot with the token resolved.
#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: SecretString,
    pub owner_id: String,
    pub api_url: String,
    pub commands: bool,
}

/// Everything the update engine needs.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Plain subscriptions, in configuration order.
    pub subscriptions: Vec<String>,
    /// Alert rules with their tests already classified.
    pub rules: Vec<AlertRule>,
    pub motd: bool,
    pub motd_on_start: bool,
    pub motd_interval: Option<Duration>,
    pub units: DigestUnits,
    pub motd_template: Option<MotdTemplate>,
    pub grace_period: Duration,
}

impl Config {
    /// Compile configuration into runtime-ready format.
    ///
    /// Expects [`Config::validate`] to have passed; remaining failures
    /// (an environment variable removed in between) are still reported.
    pub fn compile(self) -> Result<RuntimeConfig, ConfigError> {
        let broker = parse_broker_url(&self.mqtt.host).map_err(ConfigError::ValidationError)?;

        let password = self
            .mqtt
            .password
            .as_ref()
            .map(|p| resolve_env_vars(p.expose()).map(SecretString::new))
            .transpose()?;

        let bot_token = SecretString::new(resolve_env_vars(self.telegram.bot_token.expose())?);

        let motd_template = resolve_motd_template(&self.events, &self.config_dir);

        let rules = self
            .events
            .alerts
            .into_iter()
            .map(|alert| {
                let rule = AlertRule::new(alert.topic, alert.test, alert.message);
                tracing::debug!(
                    topic = %rule.topic,
                    test = %rule.raw_test,
                    kind = rule.test.kind_name(),
                    threshold = rule.test.is_threshold(),
                    "Compiled alert rule"
                );
                rule
            })
            .collect();

        Ok(RuntimeConfig {
            mqtt: MqttSettings {
                host: broker.host,
                port: self.mqtt.port,
                tls: broker.tls,
                client_id: self.mqtt.client_id,
                username: self.mqtt.username,
                password,
                keep_alive: self.mqtt.keep_alive,
            },
            telegram: TelegramSettings {
                bot_token,
                owner_id: self.telegram.owner_id,
                api_url: self.telegram.api_url.trim_end_matches('/').to_string(),
                commands: self.telegram.commands,
            },
            engine: EngineConfig {
                subscriptions: self.events.subscriptions,
                rules,
                motd: self.events.motd,
                motd_on_start: self.events.motd_on_start,
                motd_interval: self.events.motd_interval,
                units: DigestUnits {
                    distance: self.events.mu_distance,
                    temperature: self.events.mu_temperature,
                },
                motd_template,
                grace_period: self.events.grace_period,
            },
            metrics: self.metrics,
        })
    }
}
