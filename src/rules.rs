//! Alert rule evaluation with edge-triggered thresholds.
//!
//! Rules are evaluated against the value being processed. Regex, wildcard and
//! equality tests are stateless. Threshold tests use the subscription's
//! `armed` gate so a crossing fires once per excursion:
//!
//! ```text
//! <20 with values 50, 15, 10, 25, 15
//!                 |   |   |   |   |
//!         armed:  T   F   F   T   F
//!         fires:      x           x
//! ```

use crate::condition::{TestKind, parse_number};
use crate::subscription::Subscription;

/// One configured alert, compiled at load time.
#[derive(Debug, Clone)]
pub struct AlertRule {
    pub topic: String,
    pub test: TestKind,
    /// Test string as written in the configuration.
    pub raw_test: String,
    pub message: String,
}

impl AlertRule {
    pub fn new(
        topic: impl Into<String>,
        raw_test: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let raw_test = raw_test.into();
        Self {
            topic: topic.into(),
            test: TestKind::parse(&raw_test),
            raw_test,
            message: message.into(),
        }
    }

    /// Value substituted for `${test}`: the raw test without its leading
    /// comparison operator.
    pub fn test_display(&self) -> &str {
        self.raw_test
            .strip_prefix('<')
            .or_else(|| self.raw_test.strip_prefix('>'))
            .unwrap_or(&self.raw_test)
    }

    /// Evaluate this rule against `value`, updating the hysteresis gate of
    /// `subscription` for threshold tests.
    pub fn matches(&self, value: &str, subscription: &mut Subscription) -> bool {
        match &self.test {
            TestKind::Regex(regex) => regex.is_match(value),
            TestKind::Wildcard => true,
            TestKind::Equals(literal) => literal == value,
            TestKind::LessThan(threshold) => {
                latch(subscription, parse_number(value), |v| v < *threshold, |v| v > *threshold)
            }
            TestKind::GreaterThan(threshold) => {
                latch(subscription, parse_number(value), |v| v > *threshold, |v| v < *threshold)
            }
        }
    }
}

/// Fire on `crossed` while armed, re-arm on `returned`.
fn latch(
    subscription: &mut Subscription,
    value: Option<f64>,
    crossed: impl Fn(f64) -> bool,
    returned: impl Fn(f64) -> bool,
) -> bool {
    let Some(value) = value else {
        return false;
    };

    if subscription.armed && crossed(value) {
        subscription.armed = false;
        return true;
    }

    if returned(value) {
        subscription.armed = true;
    }

    false
}

/// Ordered set of alert rules.
#[derive(Debug, Default)]
pub struct AlertRuleEngine {
    rules: Vec<AlertRule>,
}

impl AlertRuleEngine {
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self { rules }
    }

    /// Evaluate every rule on `topic` against `value`.
    ///
    /// All rules on the topic are evaluated, so every threshold gate sees the
    /// value, and matches are returned in configuration order.
    pub fn evaluate(
        &self,
        topic: &str,
        value: &str,
        subscription: &mut Subscription,
    ) -> Vec<&AlertRule> {
        self.rules
            .iter()
            .filter(|rule| rule.topic == topic)
            .filter(|rule| {
                let matched = rule.matches(value, subscription);
                tracing::trace!(
                    topic = %topic,
                    test = %rule.raw_test,
                    kind = rule.test.kind_name(),
                    value = %value,
                    matched,
                    armed = subscription.armed,
                    "Evaluated alert rule"
                );
                matched
            })
            .collect()
    }

    /// Distinct rule topics in configuration order.
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = Vec::new();
        for rule in &self.rules {
            if !topics.contains(&rule.topic.as_str()) {
                topics.push(&rule.topic);
            }
        }
        topics
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fire_sequence(rule: &AlertRule, values: &[&str]) -> Vec<usize> {
        let mut subscription = Subscription::new(rule.topic.clone());
        values
            .iter()
            .enumerate()
            .filter(|(_, v)| rule.matches(v, &mut subscription))
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn less_than_fires_once_per_excursion() {
        let rule = AlertRule::new("battery", "<20", "low");
        assert_eq!(fire_sequence(&rule, &["21", "19", "19", "21", "19"]), vec![1, 4]);
    }

    #[test]
    fn greater_than_fires_once_per_excursion() {
        let rule = AlertRule::new("temp", ">30", "hot");
        assert_eq!(fire_sequence(&rule, &["25", "31", "35", "29", "32"]), vec![1, 4]);
    }

    #[test]
    fn greater_than_rearms_below_threshold() {
        let rule = AlertRule::new("temp", ">30", "hot");
        let mut subscription = Subscription::new("temp");

        assert!(rule.matches("40", &mut subscription));
        assert!(!subscription.armed);

        assert!(!rule.matches("20", &mut subscription));
        assert!(subscription.armed);
    }

    #[test]
    fn value_on_threshold_neither_fires_nor_rearms() {
        let rule = AlertRule::new("battery", "<20", "low");
        assert_eq!(fire_sequence(&rule, &["10", "20", "10"]), vec![0]);
    }

    #[test]
    fn non_numeric_value_leaves_gate_untouched() {
        let rule = AlertRule::new("battery", "<20", "low");
        let mut subscription = Subscription::new("battery");

        assert!(rule.matches("10", &mut subscription));
        assert!(!rule.matches("unavailable", &mut subscription));
        assert!(!subscription.armed);

        subscription.armed = true;
        assert!(!rule.matches("", &mut subscription));
        assert!(subscription.armed);
    }

    #[test]
    fn wildcard_matches_everything() {
        let rule = AlertRule::new("any", "*", "changed");
        let mut subscription = Subscription::new("any");
        assert!(rule.matches("", &mut subscription));
        assert!(rule.matches("anything", &mut subscription));
    }

    #[test]
    fn regex_is_case_insensitive() {
        let rule = AlertRule::new("door", "open", "Door is ${value}");
        let mut subscription = Subscription::new("door");
        assert!(rule.matches("OPEN", &mut subscription));
        assert!(!rule.matches("closed", &mut subscription));
    }

    #[test]
    fn equals_is_byte_exact() {
        let rule = AlertRule {
            topic: "mode".to_string(),
            test: TestKind::Equals("1".to_string()),
            raw_test: "1".to_string(),
            message: String::new(),
        };
        let mut subscription = Subscription::new("mode");
        assert!(rule.matches("1", &mut subscription));
        assert!(!rule.matches("1.0", &mut subscription));
        assert!(!rule.matches(" 1", &mut subscription));
    }

    #[test]
    fn test_display_strips_operator() {
        assert_eq!(AlertRule::new("t", "<20", "").test_display(), "20");
        assert_eq!(AlertRule::new("t", ">7.5", "").test_display(), "7.5");
        assert_eq!(AlertRule::new("t", "open", "").test_display(), "open");
        assert_eq!(AlertRule::new("t", "*", "").test_display(), "*");
    }

    #[test]
    fn evaluate_preserves_configuration_order() {
        let engine = AlertRuleEngine::new(vec![
            AlertRule::new("door", "*", "any"),
            AlertRule::new("window", "*", "other topic"),
            AlertRule::new("door", "open", "open"),
        ]);
        let mut subscription = Subscription::new("door");

        let matches = engine.evaluate("door", "open", &mut subscription);
        let messages: Vec<_> = matches.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["any", "open"]);
    }

    #[test]
    fn evaluate_runs_every_threshold_gate() {
        let engine = AlertRuleEngine::new(vec![
            AlertRule::new("battery", "*", "changed"),
            AlertRule::new("battery", "<20", "low"),
        ]);
        let mut subscription = Subscription::new("battery");

        let matches = engine.evaluate("battery", "10", &mut subscription);
        assert_eq!(matches.len(), 2);
        assert!(!subscription.armed);
    }

    #[test]
    fn topics_are_distinct_in_order() {
        let engine = AlertRuleEngine::new(vec![
            AlertRule::new("b", "*", ""),
            AlertRule::new("a", "*", ""),
            AlertRule::new("b", "<1", ""),
        ]);
        assert_eq!(engine.topics(), vec!["b", "a"]);
        assert_eq!(engine.len(), 3);
    }
}
