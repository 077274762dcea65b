//! Placeholder substitution for alert messages and the status digest.
//!
//! Templates are plain text with `${name}` placeholders. Substitution is a
//! single literal pass: every occurrence of a known placeholder is replaced by
//! its value, unknown placeholders are left verbatim, and substituted values
//! are never rescanned (a value containing `${test}` stays as is).
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use topicwatch::template::render;
//!
//! let vars = HashMap::from([("value", "open")]);
//! assert_eq!(render("Door is ${value} (${other})", &vars), "Door is open (${other})");
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::TemplateError;
use crate::subscription::Subscription;

/// Placeholder holding the triggering value.
pub const VAR_VALUE: &str = "value";
/// Placeholder holding the rule test without its comparison operator.
pub const VAR_TEST: &str = "test";
/// Placeholder holding the rendered status digest.
pub const VAR_MOTD: &str = "MOTD";
/// Distance unit placeholder of the status digest.
pub const VAR_MU_DISTANCE: &str = "mu_distance";
/// Temperature unit placeholder of the status digest.
pub const VAR_MU_TEMPERATURE: &str = "mu_temperature";

/// Maximum size of a status digest template file (1MB).
const MAX_TEMPLATE_SIZE: u64 = 1024 * 1024;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^{}]*)\}").expect("valid regex"));

/// Substitute every `${name}` found in `vars`.
pub fn render(template: &str, vars: &HashMap<&str, &str>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => (*value).to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Whether `template` references the `${name}` placeholder.
pub fn uses_placeholder(template: &str, name: &str) -> bool {
    PLACEHOLDER
        .captures_iter(template)
        .any(|caps| &caps[1] == name)
}

/// Units substituted into the status digest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestUnits {
    pub distance: String,
    pub temperature: String,
}

/// Render the status digest: units first, then `${<topic>}` for every
/// subscription. Units win if a topic shares their placeholder name.
pub fn render_digest<'a>(
    template: &str,
    units: &'a DigestUnits,
    subscriptions: impl IntoIterator<Item = &'a Subscription>,
) -> String {
    let mut vars: HashMap<&str, &str> = subscriptions
        .into_iter()
        .map(|s| (s.topic.as_str(), s.value.as_str()))
        .collect();
    vars.insert(VAR_MU_DISTANCE, &units.distance);
    vars.insert(VAR_MU_TEMPERATURE, &units.temperature);
    render(template, &vars)
}

/// Where the raw status digest template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotdTemplate {
    Inline(String),
    /// Read on every render so edits apply without a restart.
    File(PathBuf),
}

impl MotdTemplate {
    /// Load the raw template text.
    pub fn load(&self) -> Result<String, TemplateError> {
        match self {
            Self::Inline(text) => Ok(text.clone()),
            Self::File(path) => {
                let load_error = |message: String| TemplateError::Load {
                    path: path.display().to_string(),
                    message,
                };

                let metadata = std::fs::metadata(path).map_err(|e| load_error(e.to_string()))?;
                if metadata.len() > MAX_TEMPLATE_SIZE {
                    return Err(load_error(format!(
                        "exceeds maximum size of 1MB ({} bytes)",
                        metadata.len()
                    )));
                }

                std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))
            }
        }
    }
}
