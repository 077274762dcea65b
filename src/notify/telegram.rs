//! Telegram notifier implementation.
//!
//! Implements the `Notifier` trait for sending alerts through the Telegram
//! Bot API `sendMessage` method with exponential backoff retry.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::SecretString;
use crate::error::NotifyError;
use crate::notify::{AlertPayload, Notifier, backoff_delay};

/// Backoff base delay for Telegram retries.
const TELEGRAM_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Maximum backoff delay for Telegram retries.
const TELEGRAM_BACKOFF_MAX: Duration = Duration::from_secs(5);

/// Maximum number of attempts per message.
const TELEGRAM_MAX_RETRIES: u32 = 3;

/// Body of a `sendMessage` request.
#[derive(Debug, Clone, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Build the `sendMessage` endpoint URL.
///
/// The token is part of the path, so the result must never be logged.
pub(crate) fn method_url(api_url: &str, bot_token: &SecretString, method: &str) -> String {
    format!(
        "{}/bot{}/{}",
        api_url.trim_end_matches('/'),
        bot_token.expose(),
        method
    )
}

/// Telegram notifier.
///
/// # Retry Policy
///
/// - **5xx errors and 429**: Retry (server unavailable or rate limited)
/// - **Network errors**: Retry (timeout, connection refused)
/// - **Other 4xx errors**: Do NOT retry (bad token, unknown chat)
pub struct TelegramNotifier {
    name: String,
    api_url: String,
    bot_token: SecretString,
    /// Default chat id, used when a payload has no explicit recipient.
    owner_id: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(
        name: String,
        api_url: String,
        bot_token: SecretString,
        owner_id: String,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name,
            api_url,
            bot_token,
            owner_id,
            client,
        }
    }

    /// Default recipient of alerts.
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    fn record_error(&self, alert: &AlertPayload) {
        metrics::counter!(
            "topicwatch_notify_errors_total",
            "source" => alert.source.clone(),
            "notifier_type" => "telegram"
        )
        .increment(1);
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn notifier_type(&self) -> &str {
        "telegram"
    }

    async fn send(&self, alert: &AlertPayload) -> Result<(), NotifyError> {
        let chat_id = alert.recipient.as_deref().unwrap_or(&self.owner_id);
        let url = method_url(&self.api_url, &self.bot_token, "sendMessage");
        let body = SendMessage {
            chat_id,
            text: &alert.text,
        };

        for attempt in 0..TELEGRAM_MAX_RETRIES {
            match self.client.post(&url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(source = %alert.source, chat_id = %chat_id, "Message sent");
                    metrics::counter!(
                        "topicwatch_alerts_sent_total",
                        "source" => alert.source.clone(),
                        "notifier_type" => "telegram"
                    )
                    .increment(1);
                    return Ok(());
                }
                Ok(response)
                    if response.status().is_client_error()
                        && response.status() != reqwest::StatusCode::TOO_MANY_REQUESTS =>
                {
                    let status = response.status();
                    tracing::error!(
                        status = %status,
                        source = %alert.source,
                        "Telegram returned client error, not retrying"
                    );
                    self.record_error(alert);
                    return Err(NotifyError::SendFailed(format!("client error: {}", status)));
                }
                Ok(response) => {
                    tracing::warn!(
                        attempt = attempt,
                        status = %response.status(),
                        "Telegram returned retryable status, retrying"
                    );
                }
                Err(e) => {
                    // reqwest errors carry the URL, which contains the token.
                    tracing::warn!(
                        attempt = attempt,
                        error = %e.without_url(),
                        "Failed to reach Telegram, retrying"
                    );
                }
            }

            if attempt < TELEGRAM_MAX_RETRIES - 1 {
                let delay = backoff_delay(attempt, TELEGRAM_BACKOFF_BASE, TELEGRAM_BACKOFF_MAX);
                tracing::debug!(delay_ms = delay.as_millis(), "Waiting before retry");
                tokio::time::sleep(delay).await;
            }
        }

        tracing::error!(
            max_retries = TELEGRAM_MAX_RETRIES,
            source = %alert.source,
            "Failed to send message after all retries"
        );
        self.record_error(alert);
        Err(NotifyError::MaxRetriesExceeded)
    }
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("bot_token", &self.bot_token)
            .field("owner_id", &self.owner_id)
            .finish()
    }
}
