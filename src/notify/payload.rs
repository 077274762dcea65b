//! Alert payload for notification system.

/// Source label of status digest payloads.
pub const MOTD_SOURCE: &str = "motd";

/// Payload ready to be sent to a notifier.
///
/// Must implement `Clone` as required by `broadcast::Sender`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertPayload {
    /// Fully rendered message text.
    pub text: String,
    /// Explicit recipient; `None` sends to the notifier's default (the owner).
    pub recipient: Option<String>,
    /// Topic of the firing rule, or [`MOTD_SOURCE`]. Used for logs and metrics.
    pub source: String,
}

impl AlertPayload {
    /// Payload for an alert fired by a rule on `topic`.
    pub fn alert(topic: &str, text: String) -> Self {
        Self {
            text,
            recipient: None,
            source: topic.to_string(),
        }
    }

    /// Payload carrying the status digest.
    pub fn status(text: String, recipient: Option<String>) -> Self {
        Self {
            text,
            recipient,
            source: MOTD_SOURCE.to_string(),
        }
    }
}
