//! Process configuration, read from the environment

use std::path::PathBuf;

use uuid::Uuid;

use crate::artifact::DEFAULT_API_URL;
use crate::error::{RelayError, Result};
use crate::retry::BackoffSchedule;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BROKER_PORT: u16 = 1883;
pub const DEFAULT_TOPIC: &str = "push";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_address: String,
    pub broker: BrokerConfig,
    pub topic: String,
    pub github_api_url: String,
    pub github_token: Option<String>,
    pub backoff: BackoffSchedule,
    pub log_dir: Option<PathBuf>,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the config from any variable lookup. Empty values count as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(p) => p
                .trim()
                .parse::<u16>()
                .map_err(|e| RelayError::ConfigError(format!("Invalid PORT '{}': {}", p, e)))?,
            None => DEFAULT_PORT,
        };

        let broker_host = var("BROKER_HOST")
            .ok_or_else(|| RelayError::ConfigError("BROKER_HOST is not set".to_string()))?;
        let (host, broker_port) = split_host_port(&broker_host)?;

        let backoff = match var("BACKOFF_SCHEDULE") {
            Some(s) => BackoffSchedule::parse(&s)?,
            None => BackoffSchedule::default(),
        };

        Ok(Self {
            bind_address: format!("0.0.0.0:{}", port),
            broker: BrokerConfig {
                host,
                port: broker_port,
                user: var("BROKER_USER"),
                password: var("BROKER_PASSWORD"),
                client_id: var("BROKER_CLIENT_ID")
                    .unwrap_or_else(|| format!("artifact-relay-{}", Uuid::now_v7().simple())),
            },
            topic: var("PUBLISH_TOPIC").unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            github_api_url: var("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            github_token: var("GITHUB_TOKEN"),
            backoff,
            log_dir: var("LOG_DIR").map(PathBuf::from),
        })
    }
}

/// Accepts `host`, `host:port`, a bare IPv6 literal, or `[ipv6]:port`
fn split_host_port(value: &str) -> Result<(String, u16)> {
    let invalid = || RelayError::ConfigError(format!("Invalid BROKER_HOST '{}'", value));
    let parse_port = |port: &str| {
        port.parse::<u16>().map_err(|e| {
            RelayError::ConfigError(format!("Invalid BROKER_HOST port '{}': {}", port, e))
        })
    };

    if let Some(rest) = value.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = match tail {
            "" => DEFAULT_BROKER_PORT,
            _ => parse_port(tail.strip_prefix(':').ok_or_else(invalid)?)?,
        };
        return Ok((host.to_string(), port));
    }

    // More than one colon without brackets can only be an IPv6 address
    if value.matches(':').count() > 1 {
        return Ok((value.to_string(), DEFAULT_BROKER_PORT));
    }

    match value.split_once(':') {
        Some((host, port)) if !host.is_empty() => Ok((host.to_string(), parse_port(port)?)),
        Some(_) => Err(invalid()),
        None => Ok((value.to_string(), DEFAULT_BROKER_PORT)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn config_from(pairs: &[(&str, &str)]) -> Result<RelayConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RelayConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn applies_defaults() {
        let config = config_from(&[("BROKER_HOST", "broker.local")]).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.broker.host, "broker.local");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.broker.user, None);
        assert!(config.broker.client_id.starts_with("artifact-relay-"));
        assert_eq!(config.topic, "push");
        assert_eq!(config.github_api_url, "https://api.github.com");
        assert_eq!(config.backoff, BackoffSchedule::default());
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn reads_everything() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("BROKER_HOST", "broker.local:8883"),
            ("BROKER_USER", "relay"),
            ("BROKER_PASSWORD", "secret"),
            ("BROKER_CLIENT_ID", "relay-1"),
            ("PUBLISH_TOPIC", "updates"),
            ("GITHUB_API_URL", "http://localhost:3000"),
            ("GITHUB_TOKEN", "ghp_x"),
            ("BACKOFF_SCHEDULE", "1,2"),
            ("LOG_DIR", "/var/log/relay"),
        ])
        .unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:9000");
        assert_eq!(
            config.broker,
            BrokerConfig {
                host: "broker.local".to_string(),
                port: 8883,
                user: Some("relay".to_string()),
                password: Some("secret".to_string()),
                client_id: "relay-1".to_string(),
            }
        );
        assert_eq!(config.topic, "updates");
        assert_eq!(config.github_token.as_deref(), Some("ghp_x"));
        assert_eq!(
            config.backoff.steps(),
            &[Duration::from_secs(1), Duration::from_secs(2)]
        );
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/relay")));
    }

    #[test]
    fn broker_host_is_required() {
        assert!(matches!(
            config_from(&[("PORT", "9000")]),
            Err(RelayError::ConfigError(_))
        ));
        assert!(config_from(&[("BROKER_HOST", "  ")]).is_err());
    }

    #[test]
    fn accepts_ipv6_brokers() {
        let broker = |host: &str| config_from(&[("BROKER_HOST", host)]).unwrap().broker;

        let bracketed = broker("[::1]:8883");
        assert_eq!((bracketed.host.as_str(), bracketed.port), ("::1", 8883));

        let bracketed_default = broker("[fe80::1]");
        assert_eq!(
            (bracketed_default.host.as_str(), bracketed_default.port),
            ("fe80::1", 1883)
        );

        let bare = broker("::1");
        assert_eq!((bare.host.as_str(), bare.port), ("::1", 1883));

        assert!(config_from(&[("BROKER_HOST", "[::1")]).is_err());
        assert!(config_from(&[("BROKER_HOST", "[]:1883")]).is_err());
        assert!(config_from(&[("BROKER_HOST", "[::1]1883")]).is_err());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(config_from(&[("BROKER_HOST", "b"), ("PORT", "http")]).is_err());
        assert!(config_from(&[("BROKER_HOST", "b:notaport")]).is_err());
        assert!(config_from(&[("BROKER_HOST", ":1883")]).is_err());
        assert!(config_from(&[("BROKER_HOST", "b"), ("BACKOFF_SCHEDULE", "1,,x")]).is_err());
    }
}
