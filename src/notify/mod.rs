//! Asynchronous notification system for topicwatch.
//!
//! - `Notifier` trait, the capability the update engine dispatches through
//! - Bounded notification queue with Drop Oldest strategy
//! - Telegram Bot API notifier with exponential backoff retry
//!
//! # Architecture
//!
//! ```text
//! engine.rs -> NotificationQueue -> NotificationWorker -> Notifier (Telegram)
//! ```
//!
//! Submitting never blocks the engine, and a failed delivery is logged by
//! the worker without affecting later alerts.

mod payload;
mod queue;
pub mod telegram;
mod traits;

pub use payload::{AlertPayload, MOTD_SOURCE};
pub use queue::{DEFAULT_QUEUE_CAPACITY, NotificationQueue, NotificationWorker, backoff_delay};
pub use telegram::TelegramNotifier;
pub use traits::Notifier;
