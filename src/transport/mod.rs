//! Message transport from the broker to the update engine.
//!
//! The transport owns the broker connection. It (re)subscribes to every
//! watched topic each time a session is established and forwards each
//! publication as a [`TopicUpdate`] over the engine's event channel.

mod mqtt;

pub use mqtt::{MqttTransport, RECONNECT_BACKOFF_BASE, RECONNECT_BACKOFF_MAX, build_options};

/// One publication received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicUpdate {
    pub topic: String,
    /// Payload decoded as text.
    pub value: String,
}

impl TopicUpdate {
    /// Build an update from a raw payload.
    ///
    /// Payloads are treated as UTF-8 text; invalid sequences are replaced
    /// rather than dropping the whole update.
    pub fn from_payload(topic: impl Into<String>, payload: &[u8]) -> Self {
        Self {
            topic: topic.into(),
            value: String::from_utf8_lossy(payload).into_owned(),
        }
    }
}
