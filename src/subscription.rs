//! Per-topic subscription state.
//!
//! The store keeps, for every tracked topic, the current and previous value
//! and the hysteresis gate used by threshold rules. It is owned by the update
//! engine and mutated only from its single processing loop.

use std::collections::HashMap;

/// Value of a subscription that has not received any update yet.
pub const UNKNOWN_VALUE: &str = "unknown";

/// Live state of one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic: String,
    pub value: String,
    pub previous_value: String,
    /// `true` while a threshold alert may still fire, `false` once it fired
    /// and until the value comes back across the threshold.
    pub armed: bool,
}

impl Subscription {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            value: UNKNOWN_VALUE.to_string(),
            previous_value: UNKNOWN_VALUE.to_string(),
            armed: true,
        }
    }
}

/// Subscriptions keyed by topic, iterated in insertion order.
#[derive(Debug, Default)]
pub struct SubscriptionStore {
    subscriptions: Vec<Subscription>,
    index: HashMap<String, usize>,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with one subscription per distinct topic.
    ///
    /// Duplicate topics are collapsed; the first occurrence fixes the order.
    pub fn initialize<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut store = Self::new();
        for topic in topics {
            store.ensure(topic.as_ref());
        }
        store
    }

    fn ensure(&mut self, topic: &str) -> usize {
        if let Some(&idx) = self.index.get(topic) {
            return idx;
        }
        let idx = self.subscriptions.len();
        self.subscriptions.push(Subscription::new(topic));
        self.index.insert(topic.to_string(), idx);
        idx
    }

    /// Record a new value for `topic`.
    ///
    /// Returns `false` without touching the state when the value is identical
    /// to the current one. Otherwise shifts the current value into
    /// `previous_value` and returns `true`. Unknown topics are created.
    pub fn apply_update(&mut self, topic: &str, new_value: &str) -> bool {
        let idx = self.ensure(topic);
        let subscription = &mut self.subscriptions[idx];
        if subscription.value == new_value {
            return false;
        }
        subscription.previous_value =
            std::mem::replace(&mut subscription.value, new_value.to_string());
        true
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.index.contains_key(topic)
    }

    pub fn get(&self, topic: &str) -> Option<&Subscription> {
        self.index.get(topic).map(|&idx| &self.subscriptions[idx])
    }

    pub fn get_mut(&mut self, topic: &str) -> Option<&mut Subscription> {
        let idx = *self.index.get(topic)?;
        Some(&mut self.subscriptions[idx])
    }

    /// Hysteresis gate of `topic`, `None` if the topic is not tracked.
    pub fn armed(&self, topic: &str) -> Option<bool> {
        self.get(topic).map(|s| s.armed)
    }

    /// Set the hysteresis gate. Returns `false` if the topic is not tracked.
    pub fn set_armed(&mut self, topic: &str, armed: bool) -> bool {
        match self.get_mut(topic) {
            Some(subscription) => {
                subscription.armed = armed;
                true
            }
            None => false,
        }
    }

    /// Tracked topics in configuration order.
    pub fn topics(&self) -> Vec<String> {
        self.subscriptions.iter().map(|s| s.topic.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.iter()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_sets_unknown_and_armed() {
        let store = SubscriptionStore::initialize(["door", "battery"]);
        assert_eq!(store.len(), 2);

        let door = store.get("door").unwrap();
        assert_eq!(door.value, UNKNOWN_VALUE);
        assert_eq!(door.previous_value, UNKNOWN_VALUE);
        assert!(door.armed);
    }

    #[test]
    fn initialize_collapses_duplicates_and_keeps_order() {
        let store = SubscriptionStore::initialize(["a", "b", "a", "c"]);
        assert_eq!(store.topics(), vec!["a", "b", "c"]);
    }

    #[test]
    fn apply_update_shifts_previous_value() {
        let mut store = SubscriptionStore::initialize(["door"]);

        assert!(store.apply_update("door", "closed"));
        assert!(store.apply_update("door", "open"));

        let door = store.get("door").unwrap();
        assert_eq!(door.value, "open");
        assert_eq!(door.previous_value, "closed");
    }

    #[test]
    fn identical_value_is_suppressed() {
        let mut store = SubscriptionStore::initialize(["door"]);

        assert!(store.apply_update("door", "open"));
        assert!(!store.apply_update("door", "open"));

        let door = store.get("door").unwrap();
        assert_eq!(door.previous_value, UNKNOWN_VALUE);
    }

    #[test]
    fn apply_update_creates_unknown_topic() {
        let mut store = SubscriptionStore::new();
        assert!(!store.contains("late"));

        assert!(store.apply_update("late", "1"));
        assert!(store.contains("late"));
        assert_eq!(store.get("late").unwrap().previous_value, UNKNOWN_VALUE);
    }

    #[test]
    fn armed_accessors() {
        let mut store = SubscriptionStore::initialize(["battery"]);
        assert_eq!(store.armed("battery"), Some(true));

        assert!(store.set_armed("battery", false));
        assert_eq!(store.armed("battery"), Some(false));

        assert_eq!(store.armed("missing"), None);
        assert!(!store.set_armed("missing", true));
    }

    #[test]
    fn empty_string_is_a_value() {
        let mut store = SubscriptionStore::initialize(["t"]);
        assert!(store.apply_update("t", ""));
        assert!(!store.apply_update("t", ""));
    }
}
