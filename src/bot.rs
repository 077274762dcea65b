//! Telegram command listener.
//!
//! Long-polls `getUpdates` and turns every text message from the owner into
//! an [`EngineEvent::StatusRequest`], so the digest is rendered by the engine
//! and replied to the chat the request came from. Messages from anyone else
//! are dropped.
//!
//! `/quit` (from any sender) makes the bot leave that chat and never
//! produces a digest.

use std::time::Duration;

use serde::Deserialize;
use serde::de::IgnoredAny;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{SecretString, TelegramSettings};
use crate::engine::EngineEvent;
use crate::error::BotError;
use crate::notify::backoff_delay;
use crate::notify::telegram::method_url;

/// Server-side long-poll timeout.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time allowed on top of the long-poll timeout before the HTTP
/// request is abandoned.
const REQUEST_GRACE: Duration = Duration::from_secs(10);

const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    from: Option<User>,
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(serde::Serialize)]
struct LeaveChat<'a> {
    chat_id: &'a str,
}

/// A command received from a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    /// The owner asked for the status digest.
    Status { chat: String },
    /// Leave the chat.
    Quit { chat: String },
}

/// True for `/quit` and `/quit@botname`, with or without arguments.
fn is_quit(text: &str) -> bool {
    let Some(command) = text.split_whitespace().next() else {
        return false;
    };
    let name = command.split('@').next().unwrap_or(command);
    name == "/quit"
}

/// Poller for owner commands.
pub struct BotListener {
    client: reqwest::Client,
    api_url: String,
    bot_token: SecretString,
    owner_id: String,
    poll_timeout: Duration,
    offset: i64,
}

impl BotListener {
    pub fn new(settings: &TelegramSettings, client: reqwest::Client) -> Self {
        Self {
            client,
            api_url: settings.api_url.clone(),
            bot_token: settings.bot_token.clone(),
            owner_id: settings.owner_id.trim().to_string(),
            poll_timeout: POLL_TIMEOUT,
            offset: 0,
        }
    }

    /// Override the long-poll timeout.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Offset of the next update to fetch.
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Fetch pending updates once and return the commands they carry.
    ///
    /// The offset is advanced past every received update, including ignored
    /// ones, so nothing is delivered twice.
    pub async fn poll_once(&mut self) -> Result<Vec<BotCommand>, BotError> {
        let url = method_url(&self.api_url, &self.bot_token, "getUpdates");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("offset", self.offset.to_string()),
                ("timeout", self.poll_timeout.as_secs().to_string()),
            ])
            .timeout(self.poll_timeout + REQUEST_GRACE)
            .send()
            .await
            .map_err(|e| BotError::Request(e.without_url().to_string()))?;

        let status = response.status();
        let body: ApiResponse<Vec<Update>> = response
            .json()
            .await
            .map_err(|e| BotError::Request(format!("{} ({})", e.without_url(), status)))?;

        if !body.ok {
            return Err(BotError::Api(
                body.description
                    .unwrap_or_else(|| format!("status {}", status)),
            ));
        }

        let mut commands = Vec::new();
        for update in body.result.unwrap_or_default() {
            self.offset = self.offset.max(update.update_id + 1);

            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text else {
                continue;
            };
            let chat = message.chat.id.to_string();
            if is_quit(&text) {
                commands.push(BotCommand::Quit { chat });
                continue;
            }
            let Some(from) = message.from else {
                continue;
            };
            if from.id.to_string() != self.owner_id {
                debug!(user_id = from.id, "Ignoring message from non-owner");
                continue;
            }
            commands.push(BotCommand::Status { chat });
        }

        Ok(commands)
    }

    /// Leave `chat` via `leaveChat`.
    pub async fn leave_chat(&self, chat: &str) -> Result<(), BotError> {
        let url = method_url(&self.api_url, &self.bot_token, "leaveChat");
        let response = self
            .client
            .post(&url)
            .json(&LeaveChat { chat_id: chat })
            .send()
            .await
            .map_err(|e| BotError::Request(e.without_url().to_string()))?;

        let status = response.status();
        let body: ApiResponse<IgnoredAny> = response
            .json()
            .await
            .map_err(|e| BotError::Request(format!("{} ({})", e.without_url(), status)))?;

        if !body.ok {
            return Err(BotError::Api(
                body.description
                    .unwrap_or_else(|| format!("status {}", status)),
            ));
        }
        Ok(())
    }

    /// Poll until cancelled or until the engine stops listening.
    pub async fn run(mut self, tx: mpsc::Sender<EngineEvent>, cancel: CancellationToken) {
        info!("Listening for bot commands");
        let mut attempt: u32 = 0;

        loop {
            let result = tokio::select! {
                result = self.poll_once() => result,
                _ = cancel.cancelled() => {
                    debug!("Bot listener shutting down");
                    return;
                }
            };

            match result {
                Ok(commands) => {
                    attempt = 0;
                    for command in commands {
                        match command {
                            BotCommand::Status { chat } => {
                                debug!(chat_id = %chat, "Status requested by owner");
                                let event = EngineEvent::StatusRequest {
                                    recipient: Some(chat),
                                };
                                if tx.send(event).await.is_err() {
                                    debug!("Engine stopped, closing bot listener");
                                    return;
                                }
                            }
                            BotCommand::Quit { chat } => {
                                if let Err(e) = self.leave_chat(&chat).await {
                                    warn!(chat_id = %chat, error = %e, "Failed to leave chat");
                                } else {
                                    info!(chat_id = %chat, "Left chat on /quit");
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    let delay = backoff_delay(attempt, BACKOFF_BASE, BACKOFF_MAX);
                    warn!(
                        error = %e,
                        attempt = attempt,
                        delay_secs = delay.as_secs(),
                        "Polling bot updates failed, retrying"
                    );
                    attempt = attempt.saturating_add(1);

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return,
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for BotListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotListener")
            .field("api_url", &self.api_url)
            .field("bot_token", &self.bot_token)
            .field("owner_id", &self.owner_id)
            .field("offset", &self.offset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_get_updates_response() {
        let json = r#"{
            "ok": true,
            "result": [
                {"update_id": 10, "message": {"message_id": 1, "from": {"id": 42, "is_bot": false}, "chat": {"id": 42, "type": "private"}, "text": "status"}},
                {"update_id": 11, "edited_message": {"message_id": 1}}
            ]
        }"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(json).unwrap();

        assert!(response.ok);
        let result = response.result.unwrap();
        assert_eq!(result.len(), 2);
        let message = result[0].message.as_ref().unwrap();
        assert_eq!(message.from.as_ref().unwrap().id, 42);
        assert_eq!(message.text.as_deref(), Some("status"));
        assert!(result[1].message.is_none());
    }

    #[test]
    fn parses_error_response() {
        let json = r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#;
        let response: ApiResponse<Vec<Update>> = serde_json::from_str(json).unwrap();
        assert!(!response.ok);
        assert!(response.result.is_none());
        assert_eq!(response.description.as_deref(), Some("Unauthorized"));
    }

    #[test]
    fn parses_boolean_result() {
        let json = r#"{"ok": true, "result": true}"#;
        let response: ApiResponse<IgnoredAny> = serde_json::from_str(json).unwrap();
        assert!(response.ok);
    }

    #[test]
    fn recognizes_quit_command() {
        assert!(is_quit("/quit"));
        assert!(is_quit("/quit@topicwatch_bot"));
        assert!(is_quit("  /quit now"));
        assert!(!is_quit("/quitter"));
        assert!(!is_quit("quit"));
        assert!(!is_quit("status /quit"));
        assert!(!is_quit(""));
    }

    #[test]
    fn debug_redacts_token() {
        let settings = TelegramSettings {
            bot_token: SecretString::new("123:abc".to_string()),
            owner_id: "42".to_string(),
            api_url: "https://api.telegram.org".to_string(),
            commands: true,
        };
        let listener = BotListener::new(&settings, reqwest::Client::new());
        let debug = format!("{:?}", listener);
        assert!(!debug.contains("123:abc"));
        assert_eq!(listener.offset(), 0);
    }
}
