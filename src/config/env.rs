//! Environment variable substitution and status template resolution.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use super::types::EventsConfig;
use crate::error::ConfigError;
use crate::template::MotdTemplate;

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

/// Resolves `${VAR_NAME}` patterns in a string from the environment.
///
/// Only applied to secret settings, never to message templates.
pub fn resolve_env_vars(value: &str) -> Result<String, ConfigError> {
    let mut missing = Vec::new();

    let resolved = ENV_VAR.replace_all(value, |caps: &regex::Captures| {
        match std::env::var(&caps[1]) {
            Ok(var_value) => var_value,
            Err(_) => {
                missing.push(caps[1].to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(resolved.into_owned())
    } else {
        Err(ConfigError::ValidationError(format!(
            "undefined environment variable{}: {}",
            if missing.len() > 1 { "s" } else { "" },
            missing.join(", ")
        )))
    }
}

/// Resolve a configured path relative to the configuration directory.
pub fn resolve_path(file: &str, config_dir: &Path) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        config_dir.join(path)
    }
}

/// Resolves the status digest template source.
/// Priority: motd_template_file > motd_template > None.
pub fn resolve_motd_template(events: &EventsConfig, config_dir: &Path) -> Option<MotdTemplate> {
    if events.motd_template.is_some() && events.motd_template_file.is_some() {
        tracing::warn!("both motd_template and motd_template_file defined, using motd_template_file");
    }

    if let Some(ref file) = events.motd_template_file {
        tracing::debug!("motd template source: file");
        return Some(MotdTemplate::File(resolve_path(file, config_dir)));
    }

    if let Some(ref template) = events.motd_template {
        tracing::debug!("motd template source: inline");
        return Some(MotdTemplate::Inline(template.clone()));
    }

    None
}
