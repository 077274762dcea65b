//! Centralized error types for topicwatch using thiserror.

use thiserror::Error;

/// Errors related to configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config file: {0}")]
    LoadError(String),
    #[error("invalid configuration: {0}")]
    ValidationError(String),
    #[error("invalid alert #{index}: {message}")]
    InvalidAlert { index: usize, message: String },
}

/// Errors related to the MQTT broker connection.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("failed to subscribe to '{topic}': {message}")]
    SubscribeFailed { topic: String, message: String },
}

/// Errors related to notification sending.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("failed to send notification: {0}")]
    SendFailed(String),
    #[error("max retries exceeded")]
    MaxRetriesExceeded,
}

/// Errors related to loading the status digest template.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("cannot read template '{path}': {message}")]
    Load { path: String, message: String },
}

/// Errors related to notification queue operations.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("notification queue closed")]
    Closed,
}

/// Errors that stop the update engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("event channel closed")]
    ChannelClosed,
}

/// Errors related to polling the Telegram Bot API for commands.
#[derive(Error, Debug)]
pub enum BotError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("telegram api error: {0}")]
    Api(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::LoadError("file not found".to_string());
        assert_eq!(
            err.to_string(),
            "failed to load config file: file not found"
        );

        let err = ConfigError::ValidationError("missing field".to_string());
        assert_eq!(err.to_string(), "invalid configuration: missing field");
    }

    #[test]
    fn config_error_invalid_alert_display() {
        let err = ConfigError::InvalidAlert {
            index: 2,
            message: "topic cannot be empty".to_string(),
        };
        assert_eq!(err.to_string(), "invalid alert #2: topic cannot be empty");
    }

    #[test]
    fn transport_error_display() {
        let err = TransportError::SubscribeFailed {
            topic: "car/state".to_string(),
            message: "not connected".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to subscribe to 'car/state': not connected"
        );
    }

    #[test]
    fn notify_error_display() {
        let err = NotifyError::SendFailed("network error".to_string());
        assert_eq!(
            err.to_string(),
            "failed to send notification: network error"
        );

        let err = NotifyError::MaxRetriesExceeded;
        assert_eq!(err.to_string(), "max retries exceeded");
    }

    #[test]
    fn template_error_display() {
        let err = TemplateError::Load {
            path: "/etc/topicwatch/motd.txt".to_string(),
            message: "No such file or directory".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "cannot read template '/etc/topicwatch/motd.txt': No such file or directory"
        );
    }

    #[test]
    fn engine_error_display() {
        let err = EngineError::ChannelClosed;
        assert_eq!(err.to_string(), "event channel closed");
    }

    #[test]
    fn bot_error_display() {
        let err = BotError::Request("timed out".to_string());
        assert_eq!(err.to_string(), "request failed: timed out");

        let err = BotError::Api("Unauthorized".to_string());
        assert_eq!(err.to_string(), "telegram api error: Unauthorized");
    }

    #[test]
    fn queue_error_display() {
        assert_eq!(QueueError::Closed.to_string(), "notification queue closed");
    }
}
