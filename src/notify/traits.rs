//! Notifier trait definition.

use async_trait::async_trait;

use super::AlertPayload;
use crate::error::NotifyError;

/// Abstract notifier trait for delivering rendered alerts.
///
/// Implementations must be `Send + Sync` to work across async tasks.
/// Each notifier manages its own retry/backoff logic internally.
///
/// # Example
///
/// ```ignore
/// use topicwatch::notify::{Notifier, AlertPayload};
///
/// struct StdoutNotifier;
///
/// #[async_trait]
/// impl Notifier for StdoutNotifier {
///     fn name(&self) -> &str { "stdout" }
///     fn notifier_type(&self) -> &str { "stdout" }
///     async fn send(&self, alert: &AlertPayload) -> Result<(), NotifyError> {
///         println!("{}", alert.text);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Unique name of this notifier instance (e.g., "telegram").
    fn name(&self) -> &str;

    /// Type of the notifier (e.g., "telegram").
    fn notifier_type(&self) -> &str;

    /// Deliver an alert.
    ///
    /// `alert.recipient` overrides the notifier's default recipient.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Alert delivered
    /// * `Err(NotifyError)` - Failed to deliver after all retries
    async fn send(&self, alert: &AlertPayload) -> Result<(), NotifyError>;
}

impl std::fmt::Debug for dyn Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("name", &self.name())
            .field("type", &self.notifier_type())
            .finish()
    }
}
