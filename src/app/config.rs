// ABOUTME: Gateway configuration: a key-value text file plus the SMSC endpoint list it carries
// ABOUTME: Every malformed entry is reported as a ConfigError naming the key and value

use crate::client::BindCredentials;
use crate::datatypes::BindMode;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "config.dat";
pub const DEFAULT_LISTEN_PORT: u16 = 7778;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("missing required key \"{0}\"")]
    MissingKey(&'static str),

    #[error("invalid value \"{value}\" for key \"{key}\": {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("line {line}: expected \"key value\"")]
    Syntax { line: usize },
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// One `systemId@password@host:port` entry of `sms_address`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmscEndpoint {
    pub system_id: String,
    pub password: String,
    pub host: String,
    pub port: u16,
}

impl SmscEndpoint {
    pub fn credentials(&self) -> BindCredentials {
        BindCredentials::new(self.system_id.as_str(), self.password.as_str())
    }
}

impl FromStr for SmscEndpoint {
    type Err = ConfigError;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let bad = |reason: &str| ConfigError::invalid("sms_address", entry, reason);

        // the password may itself contain '@', the host part never does
        let (credentials, address) = entry
            .rsplit_once('@')
            .ok_or_else(|| bad("expected systemId@password@host:port"))?;
        let (system_id, password) = credentials
            .split_once('@')
            .ok_or_else(|| bad("expected systemId@password@host:port"))?;
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| bad("missing :port"))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');

        if system_id.is_empty() {
            return Err(bad("empty system id"));
        }
        if host.is_empty() {
            return Err(bad("empty host"));
        }
        let port = port.parse::<u16>().map_err(|e| bad(&e.to_string()))?;

        Ok(SmscEndpoint {
            system_id: system_id.to_string(),
            password: password.to_string(),
            host: host.to_string(),
            port,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub smsc: Vec<SmscEndpoint>,
    /// Passed to the message store untouched.
    pub db_connection: String,
    pub listen_port: u16,
    pub heartbeat_interval: Duration,
    pub heartbeat_max_failures: u32,
    /// `None` keeps pending submissions until resolved.
    pub pending_ttl: Option<Duration>,
    pub send_interval: Duration,
    pub bind_mode: BindMode,
    pub source_addr: Option<String>,
    /// Every key read from the file, including ones the gateway ignores.
    pub raw: HashMap<String, String>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        text.parse()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw.get(key).map(String::as_str)
    }
}

fn parse_pairs(text: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut pairs = HashMap::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line
            .split_once(char::is_whitespace)
            .ok_or(ConfigError::Syntax { line: index + 1 })?;
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        pairs.insert(key.to_string(), value.to_string());
    }
    Ok(pairs)
}

fn number<T: FromStr>(pairs: &HashMap<String, String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    pairs
        .get(key)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|e| ConfigError::invalid(key, value, e.to_string()))
        })
        .transpose()
}

fn bind_mode(value: &str) -> Result<BindMode, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "transceiver" => Ok(BindMode::Transceiver),
        "transmitter" => Ok(BindMode::Transmitter),
        "receiver" => Ok(BindMode::Receiver),
        _ => Err(ConfigError::invalid(
            "bind_mode",
            value,
            "expected transceiver, transmitter or receiver",
        )),
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let raw = parse_pairs(text)?;

        let sms_address = raw
            .get("sms_address")
            .ok_or(ConfigError::MissingKey("sms_address"))?;
        let smsc = sms_address
            .split(';')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<SmscEndpoint>, _>>()?;
        if smsc.is_empty() {
            return Err(ConfigError::invalid("sms_address", sms_address, "no SMSC listed"));
        }

        let db_connection = raw
            .get("db_connection")
            .ok_or(ConfigError::MissingKey("db_connection"))?
            .clone();

        let heartbeat_max_failures = number(&raw, "heartbeat_max_failures")?.unwrap_or(3);
        if heartbeat_max_failures == 0 {
            return Err(ConfigError::invalid("heartbeat_max_failures", "0", "must be at least 1"));
        }

        Ok(Config {
            smsc,
            db_connection,
            listen_port: number(&raw, "listen_port")?.unwrap_or(DEFAULT_LISTEN_PORT),
            heartbeat_interval: Duration::from_secs(
                number(&raw, "heartbeat_interval_secs")?.unwrap_or(600),
            ),
            heartbeat_max_failures,
            pending_ttl: number(&raw, "pending_ttl_secs")?.map(Duration::from_secs),
            send_interval: Duration::from_millis(number(&raw, "send_interval_ms")?.unwrap_or(50)),
            bind_mode: raw
                .get("bind_mode")
                .map(|value| bind_mode(value))
                .transpose()?
                .unwrap_or(BindMode::Transceiver),
            source_addr: raw.get("source_addr").filter(|s| !s.is_empty()).cloned(),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# gateway settings
sms_address   "gw@s3cret@smsc.example.net:2775;backup@pw@10.0.0.2:2776"
db_connection DSN=sms;UID=gw
listen_port 8080
pending_ttl_secs 3600
bind_mode transmitter
"#;

    #[test]
    fn parses_sample_file() {
        let config: Config = SAMPLE.parse().unwrap();
        assert_eq!(config.smsc.len(), 2);
        assert_eq!(
            config.smsc[0],
            SmscEndpoint {
                system_id: "gw".into(),
                password: "s3cret".into(),
                host: "smsc.example.net".into(),
                port: 2775,
            }
        );
        assert_eq!(config.smsc[1].port, 2776);
        assert_eq!(config.db_connection, "DSN=sms;UID=gw");
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.pending_ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.bind_mode, BindMode::Transmitter);
        assert_eq!(config.get("listen_port"), Some("8080"));
    }

    #[test]
    fn defaults_apply_when_keys_are_absent() {
        let config: Config = "sms_address a@b@host:1\ndb_connection x".parse().unwrap();
        assert_eq!(config.listen_port, DEFAULT_LISTEN_PORT);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(600));
        assert_eq!(config.heartbeat_max_failures, 3);
        assert_eq!(config.pending_ttl, None);
        assert_eq!(config.send_interval, Duration::from_millis(50));
        assert_eq!(config.bind_mode, BindMode::Transceiver);
        assert_eq!(config.source_addr, None);
    }

    #[test]
    fn endpoint_accepts_ipv6_and_at_in_password() {
        let endpoint: SmscEndpoint = "gw@p@ss@[::1]:2775".parse().unwrap();
        assert_eq!(endpoint.password, "p@ss");
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.port, 2775);
    }

    #[test]
    fn malformed_entries_name_the_key() {
        for entry in ["gw@host:2775", "gw@pw@host", "gw@pw@host:notaport", "@pw@host:1"] {
            let err = entry.parse::<SmscEndpoint>().unwrap_err();
            assert!(
                matches!(&err, ConfigError::InvalidValue { key, .. } if key == "sms_address"),
                "{entry}: {err}"
            );
        }

        let err = "db_connection x".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey("sms_address")));

        let err = "sms_address a@b@h:1\ndb_connection x\nlisten_port huge"
            .parse::<Config>()
            .unwrap_err();
        assert!(err.to_string().contains("listen_port"));

        let err = "sms_address a@b@h:1\ndb_connection x\nbind_mode both"
            .parse::<Config>()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn key_without_value_is_a_syntax_error() {
        let err = "sms_address".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { line: 1 }));
    }
}
