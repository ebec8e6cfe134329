//! Configuration system.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $ZENOH_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/zenoh/config.toml
//!   3. ~/.config/zenoh/config.toml

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A locator: `<protocol>/<address>[#key=value;key=value...]`, e.g.
/// `tcp/192.168.1.1:7447` or `serial/ttyUSB0#baudrate=115200`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locator {
    pub protocol: String,
    pub address: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    #[error("locator missing '/' separator between protocol and address: {0:?}")]
    MissingProtocol(String),
    #[error("locator metadata entry is not key=value: {0:?}")]
    MalformedMetadata(String),
}

impl FromStr for Locator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (head, meta) = match s.split_once('#') {
            Some((h, m)) => (h, Some(m)),
            None => (s, None),
        };
        let (protocol, address) = head
            .split_once('/')
            .ok_or_else(|| LocatorError::MissingProtocol(s.to_string()))?;

        let mut metadata = HashMap::new();
        if let Some(meta) = meta {
            for entry in meta.split(';').filter(|e| !e.is_empty()) {
                let (k, v) = entry
                    .split_once('=')
                    .ok_or_else(|| LocatorError::MalformedMetadata(entry.to_string()))?;
                metadata.insert(k.to_string(), v.to_string());
            }
        }

        Ok(Locator {
            protocol: protocol.to_string(),
            address: address.to_string(),
            metadata,
        })
    }
}

impl TryFrom<String> for Locator {
    type Error = LocatorError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Locator> for String {
    fn from(loc: Locator) -> String {
        loc.to_string()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.protocol, self.address)?;
        if !self.metadata.is_empty() {
            write!(f, "#")?;
            let mut entries: Vec<_> = self.metadata.iter().collect();
            entries.sort();
            let joined = entries
                .into_iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(";");
            write!(f, "{joined}")?;
        }
        Ok(())
    }
}

/// Whether this node scouts for and is scouted by peers (`Peer`), or only
/// connects outward and never accepts unsolicited sessions (`Client`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Client,
    Peer,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Peer
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZenohConfig {
    pub mode: Mode,
    /// Locators to actively connect to at startup.
    pub connect: Vec<Locator>,
    /// Locators to accept inbound sessions on.
    pub listen: Vec<Locator>,
    pub scouting: ScoutingConfig,
    pub auth: AuthConfig,
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutingConfig {
    pub multicast_enabled: bool,
    pub multicast_locator: Locator,
    /// Milliseconds to wait for `Hello` replies before giving up.
    pub timeout_millis: u64,
    pub whatami: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub user: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub lease_millis: u64,
    pub keep_alive_ratio: u32,
    pub sn_resolution_bits: u8,
    pub batch_size: u16,
}

impl Default for ZenohConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            connect: Vec::new(),
            listen: Vec::new(),
            scouting: ScoutingConfig::default(),
            auth: AuthConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl Default for ScoutingConfig {
    fn default() -> Self {
        Self {
            multicast_enabled: true,
            multicast_locator: "udp/224.0.0.224:7446".parse().expect("static locator"),
            timeout_millis: 3_000,
            whatami: "peer".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            user: None,
            password: None,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            lease_millis: 10_000,
            keep_alive_ratio: 4,
            sn_resolution_bits: 32,
            batch_size: 65_535,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("zenoh")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ZenohConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            ZenohConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("ZENOH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&ZenohConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply ZENOH_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ZENOH_MODE") {
            if v.eq_ignore_ascii_case("client") {
                self.mode = Mode::Client;
            } else if v.eq_ignore_ascii_case("peer") {
                self.mode = Mode::Peer;
            }
        }
        if let Ok(v) = std::env::var("ZENOH_CONNECT") {
            self.connect = v
                .split(',')
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse().ok())
                .collect();
        }
        if let Ok(v) = std::env::var("ZENOH_LISTEN") {
            self.listen = v
                .split(',')
                .filter(|s| !s.is_empty())
                .filter_map(|s| s.parse().ok())
                .collect();
        }
        if let Ok(v) = std::env::var("ZENOH_SCOUTING_MULTICAST_ENABLED") {
            self.scouting.multicast_enabled = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("ZENOH_USER") {
            self.auth.user = Some(v);
        }
        if let Ok(v) = std::env::var("ZENOH_PASSWORD") {
            self.auth.password = Some(v);
        }
    }
}
