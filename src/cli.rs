//! Command line of the `topicwatch` binary.
//!
//! Options override the configuration file only where noted; everything else
//! lives in the YAML/JSON config.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

/// Environment variable consulted when `-c` is not given.
pub const CONFIG_ENV: &str = "TOPICWATCH_CONFIG";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One line per event, for a terminal or journald.
    #[default]
    Text,
    /// Flattened JSON objects.
    Json,
}

/// Watch MQTT topics and report them to a Telegram chat.
#[derive(Parser, Debug)]
#[command(name = "topicwatch", version)]
#[command(about = "Telegram alerts and status digests from MQTT topics")]
pub struct Cli {
    /// Configuration file (YAML, or JSON with a .json extension).
    #[arg(short = 'c', long = "config", env = CONFIG_ENV, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Check the configuration, print what would be watched, and exit.
    #[arg(long)]
    pub validate: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, env = "LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Do not poll the bot for owner messages, even if `telegram.commands`
    /// is enabled.
    #[arg(long)]
    pub no_commands: bool,
}

impl Cli {
    /// Whether the bot listener should run given the configured setting.
    pub fn commands_enabled(&self, configured: bool) -> bool {
        configured && !self.no_commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["topicwatch"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    #[serial]
    fn defaults() {
        temp_env::with_vars_unset([CONFIG_ENV, "LOG_FORMAT"], || {
            let cli = parse(&[]);
            assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
            assert!(!cli.validate);
            assert!(!cli.no_commands);
            assert_eq!(cli.log_format, LogFormat::Text);
        });
    }

    #[test]
    fn config_short_and_long() {
        assert_eq!(parse(&["-c", "/a.yaml"]).config, PathBuf::from("/a.yaml"));
        assert_eq!(
            parse(&["--config", "/b.json"]).config,
            PathBuf::from("/b.json")
        );
    }

    #[test]
    #[serial]
    fn config_from_env() {
        temp_env::with_var(CONFIG_ENV, Some("/srv/topicwatch.yaml"), || {
            assert_eq!(parse(&[]).config, PathBuf::from("/srv/topicwatch.yaml"));
            assert_eq!(parse(&["-c", "/x.yaml"]).config, PathBuf::from("/x.yaml"));
        });
    }

    #[test]
    fn validate_flag() {
        assert!(parse(&["--validate"]).validate);
    }

    #[test]
    fn log_format_json() {
        assert_eq!(parse(&["--log-format", "json"]).log_format, LogFormat::Json);
    }

    #[test]
    fn log_format_invalid_rejected() {
        let result = Cli::try_parse_from(["topicwatch", "--log-format", "xml"]);
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn log_format_env_and_override() {
        temp_env::with_var("LOG_FORMAT", Some("json"), || {
            assert_eq!(parse(&[]).log_format, LogFormat::Json);
            assert_eq!(parse(&["--log-format", "text"]).log_format, LogFormat::Text);
        });
    }

    #[test]
    fn no_commands_disables_bot_listener() {
        assert!(parse(&[]).commands_enabled(true));
        assert!(!parse(&[]).commands_enabled(false));
        assert!(!parse(&["--no-commands"]).commands_enabled(true));
    }
}
