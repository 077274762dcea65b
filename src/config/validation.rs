//! Broker address and port validation.

use regex::Regex;
use std::sync::LazyLock;

/// Broker address split from the configured URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerUrl {
    /// `true` for `mqtts://` and `ssl://`.
    pub tls: bool,
    pub host: String,
}

/// Parse a broker URL of the form `scheme://hostname`.
///
/// Accepted schemes: `mqtt`, `tcp` (plain) and `mqtts`, `ssl` (TLS).
pub fn parse_broker_url(url: &str) -> Result<BrokerUrl, String> {
    static BROKER_URL: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(mqtt|mqtts|tcp|ssl)://([A-Za-z0-9][A-Za-z0-9.\-]*)/?$").expect("valid regex")
    });

    let caps = BROKER_URL.captures(url.trim()).ok_or_else(|| {
        format!(
            "invalid broker url '{}': expected mqtt://host or mqtts://host",
            url
        )
    })?;

    Ok(BrokerUrl {
        tls: matches!(&caps[1], "mqtts" | "ssl"),
        host: caps[2].to_string(),
    })
}

/// Broker port must be in `1..65535`.
pub(crate) fn validate_port(port: u16) -> Result<(), String> {
    if port == 0 || port == u16::MAX {
        Err(format!("invalid port {}: must be between 1 and 65534", port))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_broker_url_plain_and_tls() {
        assert_eq!(
            parse_broker_url("mqtt://broker.local").unwrap(),
            BrokerUrl {
                tls: false,
                host: "broker.local".to_string()
            }
        );
        assert_eq!(
            parse_broker_url("mqtts://broker.example.com/").unwrap(),
            BrokerUrl {
                tls: true,
                host: "broker.example.com".to_string()
            }
        );
        assert!(parse_broker_url("tcp://10.0.0.2").is_ok());
        assert!(parse_broker_url("ssl://10.0.0.2").unwrap().tls);
    }

    #[test]
    fn parse_broker_url_rejects_invalid() {
        assert!(parse_broker_url("broker.local").is_err());
        assert!(parse_broker_url("http://broker.local").is_err());
        assert!(parse_broker_url("mqtt://").is_err());
        assert!(parse_broker_url("mqtt://host:1883").is_err());
        assert!(parse_broker_url("").is_err());
    }

    #[test]
    fn validate_port_range() {
        assert!(validate_port(1883).is_ok());
        assert!(validate_port(1).is_ok());
        assert!(validate_port(0).is_err());
        assert!(validate_port(65535).is_err());
    }
}
