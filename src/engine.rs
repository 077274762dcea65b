//! Update orchestration for topicwatch.
//!
//! Every inbound event goes through a single [`UpdateOrchestrator`], which
//! owns the subscription store and the alerting switch. Processing one event
//! at a time keeps each topic's read-modify-write of `value`/`armed` atomic
//! without locks.
//!
//! # Architecture
//!
//! ```text
//! transport (MQTT) --+
//! bot listener ------+--> mpsc<EngineEvent> --> UpdateOrchestrator --> NotificationQueue
//! timers (main.rs) --+            store -> rules -> template
//! ```
//!
//! # Example
//!
//! ```ignore
//! use topicwatch::engine::UpdateOrchestrator;
//!
//! let mut engine = UpdateOrchestrator::new(runtime.engine, queue);
//! engine.enable_alerts();
//! engine.on_update("door", "open");
//! ```

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::notify::{AlertPayload, NotificationQueue};
use crate::rules::{AlertRule, AlertRuleEngine};
use crate::subscription::SubscriptionStore;
use crate::template::{
    DigestUnits, MotdTemplate, VAR_MOTD, VAR_TEST, VAR_VALUE, render, render_digest,
    uses_placeholder,
};
use crate::transport::TopicUpdate;

/// Events consumed by the orchestrator, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A publication from the broker.
    Update(TopicUpdate),
    /// End of the startup grace period.
    EnableAlerts,
    /// The owner asked for the status digest.
    StatusRequest { recipient: Option<String> },
    /// Scheduled status digest (on start or periodic).
    SendStatus,
}

/// What happened to a single update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Topic has no subscription.
    Ignored,
    /// Same value as before.
    Skipped,
    /// Stored, alerts not enabled yet.
    Tracked,
    /// Stored and evaluated, nothing to notify.
    NoMatch,
    /// Rendered text handed to the notification queue.
    Dispatched(String),
}

/// Single processing point for topic updates.
pub struct UpdateOrchestrator {
    store: SubscriptionStore,
    rules: AlertRuleEngine,
    alerts_enabled: bool,
    motd: bool,
    units: DigestUnits,
    motd_template: Option<MotdTemplate>,
    queue: NotificationQueue,
}

impl UpdateOrchestrator {
    /// Build the orchestrator. One subscription is created per distinct
    /// topic: plain subscriptions first, then alert topics. Alerts start
    /// disabled.
    pub fn new(config: EngineConfig, queue: NotificationQueue) -> Self {
        let rules = AlertRuleEngine::new(config.rules);

        let mut topics = config.subscriptions;
        topics.extend(rules.topics().into_iter().map(str::to_string));
        let store = SubscriptionStore::initialize(topics);

        info!(
            subscriptions = store.len(),
            rules = rules.len(),
            "Update engine initialized"
        );

        Self {
            store,
            rules,
            alerts_enabled: false,
            motd: config.motd,
            units: config.units,
            motd_template: config.motd_template,
            queue,
        }
    }

    /// Topics the transport must subscribe to.
    pub fn subscription_topics(&self) -> Vec<String> {
        self.store.topics()
    }

    /// Turn alerting on. Updates received before are tracked only.
    pub fn enable_alerts(&mut self) {
        if !self.alerts_enabled {
            info!("Alerts enabled");
        }
        self.alerts_enabled = true;
    }

    pub fn alerts_enabled(&self) -> bool {
        self.alerts_enabled
    }

    pub fn store(&self) -> &SubscriptionStore {
        &self.store
    }

    /// Process one update: store it, evaluate the topic's rules and dispatch
    /// the first match.
    pub fn on_update(&mut self, topic: &str, value: &str) -> UpdateOutcome {
        if !self.store.contains(topic) {
            debug!(topic = %topic, "Ignoring update for unknown topic");
            return UpdateOutcome::Ignored;
        }

        metrics::counter!("topicwatch_updates_total").increment(1);

        if !self.store.apply_update(topic, value) {
            trace!(topic = %topic, value = %value, "Value unchanged, skipping");
            metrics::counter!("topicwatch_updates_skipped_total").increment(1);
            return UpdateOutcome::Skipped;
        }
        debug!(topic = %topic, value = %value, "Subscription updated");

        if !self.alerts_enabled {
            return UpdateOutcome::Tracked;
        }

        let Some(subscription) = self.store.get_mut(topic) else {
            return UpdateOutcome::Ignored;
        };
        let matches = self.rules.evaluate(topic, value, subscription);

        let Some(rule) = matches.first().copied() else {
            return UpdateOutcome::NoMatch;
        };
        if matches.len() > 1 {
            warn!(
                topic = %topic,
                matches = matches.len(),
                test = %rule.raw_test,
                "Multiple alerts match, sending the first one"
            );
        }
        if rule.message.is_empty() {
            debug!(topic = %topic, test = %rule.raw_test, "Matching alert has no message");
            return UpdateOutcome::NoMatch;
        }

        let text = self.render_alert(rule, value);
        info!(topic = %topic, test = %rule.raw_test, value = %value, "Alert fired");
        metrics::counter!("topicwatch_alerts_fired_total", "topic" => topic.to_string())
            .increment(1);

        self.dispatch(AlertPayload::alert(topic, text.clone()));
        UpdateOutcome::Dispatched(text)
    }

    /// Render the status digest from the current subscription values.
    ///
    /// Returns an empty string when the digest is disabled, and falls back
    /// to an empty string when the template cannot be loaded.
    pub fn render_status_digest(&self) -> String {
        if !self.motd {
            return String::new();
        }
        let Some(ref source) = self.motd_template else {
            return String::new();
        };

        match source.load() {
            Ok(template) => render_digest(&template, &self.units, self.store.iter()),
            Err(e) => {
                warn!(error = %e, "Failed to load status template, skipping digest");
                String::new()
            }
        }
    }

    /// Render the digest and queue it for `recipient` (the owner when `None`).
    /// Empty digests are not sent.
    pub fn send_status(&self, recipient: Option<String>) -> bool {
        let digest = self.render_status_digest();
        if digest.is_empty() {
            debug!("Status digest is empty, not sending");
            return false;
        }
        self.dispatch(AlertPayload::status(digest, recipient));
        true
    }

    /// Consume events until the channel closes or `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ChannelClosed` when every sender is dropped
    /// before cancellation.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<EngineEvent>,
        cancel: CancellationToken,
    ) -> Result<(), EngineError> {
        info!("Update engine started");

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(event) => self.handle(event),
                        None => return Err(EngineError::ChannelClosed),
                    }
                }
                _ = cancel.cancelled() => {
                    info!("Update engine shutting down");
                    return Ok(());
                }
            }
        }
    }

    fn handle(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Update(update) => {
                self.on_update(&update.topic, &update.value);
            }
            EngineEvent::EnableAlerts => self.enable_alerts(),
            EngineEvent::StatusRequest { recipient } => {
                debug!(recipient = ?recipient, "Status requested");
                self.send_status(recipient);
            }
            EngineEvent::SendStatus => {
                self.send_status(None);
            }
        }
    }

    fn render_alert(&self, rule: &AlertRule, value: &str) -> String {
        let motd = if uses_placeholder(&rule.message, VAR_MOTD) {
            self.render_status_digest()
        } else {
            String::new()
        };

        let vars = HashMap::from([
            (VAR_VALUE, value),
            (VAR_TEST, rule.test_display()),
            (VAR_MOTD, motd.as_str()),
        ]);
        render(&rule.message, &vars)
    }

    fn dispatch(&self, payload: AlertPayload) {
        if let Err(e) = self.queue.send(payload) {
            warn!(error = %e, "Notification dropped");
        }
    }
}

impl std::fmt::Debug for UpdateOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateOrchestrator")
            .field("subscriptions", &self.store.len())
            .field("rules", &self.rules.len())
            .field("alerts_enabled", &self.alerts_enabled)
            .field("motd", &self.motd)
            .finish()
    }
}
