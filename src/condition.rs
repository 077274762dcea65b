//! Alert rule test expressions.
//!
//! A rule's `test` string is classified exactly once, when the configuration
//! is compiled, into a [`TestKind`]. Classification order:
//!
//! 1. `*` is a wildcard.
//! 2. `<N` / `>N` with a numeric `N` are thresholds.
//! 3. Anything that compiles as a case-insensitive regex is a regex.
//! 4. Everything else is compared literally.
//!
//! An invalid regex never fails the load, it just falls through to
//! [`TestKind::Equals`].

use regex::{Regex, RegexBuilder};

/// Classified rule condition.
#[derive(Debug, Clone)]
pub enum TestKind {
    /// Case-insensitive pattern match on the value.
    Regex(Regex),
    /// Matches every value.
    Wildcard,
    /// Numeric value strictly below the threshold (edge-triggered).
    LessThan(f64),
    /// Numeric value strictly above the threshold (edge-triggered).
    GreaterThan(f64),
    /// Byte-exact string equality.
    Equals(String),
}

impl TestKind {
    /// Classify a raw test string.
    pub fn parse(raw: &str) -> Self {
        if raw == "*" {
            return Self::Wildcard;
        }

        if let Some(threshold) = parse_threshold(raw, '<') {
            return Self::LessThan(threshold);
        }

        if let Some(threshold) = parse_threshold(raw, '>') {
            return Self::GreaterThan(threshold);
        }

        match RegexBuilder::new(raw).case_insensitive(true).build() {
            Ok(regex) => Self::Regex(regex),
            Err(e) => {
                tracing::debug!(test = %raw, error = %e, "Test is not a valid regex, using equality");
                Self::Equals(raw.to_string())
            }
        }
    }

    /// Whether the test carries hysteresis state.
    pub fn is_threshold(&self) -> bool {
        matches!(self, Self::LessThan(_) | Self::GreaterThan(_))
    }

    /// Short name used in logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Regex(_) => "regex",
            Self::Wildcard => "wildcard",
            Self::LessThan(_) => "less_than",
            Self::GreaterThan(_) => "greater_than",
            Self::Equals(_) => "equals",
        }
    }
}

fn parse_threshold(raw: &str, operator: char) -> Option<f64> {
    let number = raw.strip_prefix(operator)?;
    parse_number(number)
}

/// Parse a telemetry value as a number.
///
/// Surrounding whitespace is ignored. Empty strings, non-numbers and NaN
/// yield `None`, which compares false in every direction.
pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
}
