//! Configuration system for peerlink.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $PEERLINK_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/peerlink/config.toml
//!   3. ~/.config/peerlink/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::wire::{self, Label};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerlinkConfig {
    pub node: NodeConfig,
    pub session: SessionConfig,
    pub approval: ApprovalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Team name sent as the label of every chat message.
    pub label: String,
    /// TCP port to listen on. 0 = OS-assigned.
    pub listen_port: u16,
    /// Interface address the listener binds to.
    pub bind_host: String,
    /// Host other nodes should use to reach us. Empty = auto-detect.
    pub advertise_host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Connect and chat-reply timeout.
    pub exchange_timeout_secs: u64,
    /// How long to wait for a peer operator to answer a connection request.
    pub handshake_timeout_secs: u64,
    /// Inbound request read timeout.
    pub read_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// If true, accept every incoming connection request.
    pub auto_accept: bool,
    /// Peers (host:port) whose connection requests are accepted.
    pub allowed_peers: Vec<String>,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            label: "peer".to_string(),
            listen_port: 9000,
            bind_host: "0.0.0.0".to_string(),
            advertise_host: String::new(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            exchange_timeout_secs: wire::EXCHANGE_TIMEOUT_SECS,
            handshake_timeout_secs: wire::HANDSHAKE_TIMEOUT_SECS,
            read_timeout_secs: wire::READ_TIMEOUT_SECS,
        }
    }
}

impl SessionConfig {
    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("peerlink")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid setting {0}: {1}")]
    Invalid(&'static str, String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl PeerlinkConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            Self::from_toml(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            PeerlinkConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("PEERLINK_CONFIG")
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
            let text = toml::to_string_pretty(&PeerlinkConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Reject settings the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Label::new(self.node.label.as_str())
            .map_err(|e| ConfigError::Invalid("node.label", e.to_string()))?;
        if self.node.bind_host.is_empty() {
            return Err(ConfigError::Invalid("node.bind_host", "empty".into()));
        }
        for (name, secs) in [
            ("session.exchange_timeout_secs", self.session.exchange_timeout_secs),
            ("session.handshake_timeout_secs", self.session.handshake_timeout_secs),
            ("session.read_timeout_secs", self.session.read_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::Invalid(name, "must be non-zero".into()));
            }
        }
        Ok(())
    }

    /// Apply PEERLINK_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PEERLINK_NODE__LABEL") {
            self.node.label = v;
        }
        if let Ok(v) = std::env::var("PEERLINK_NODE__LISTEN_PORT") {
            if let Ok(p) = v.parse() {
                self.node.listen_port = p;
            }
        }
        if let Ok(v) = std::env::var("PEERLINK_NODE__ADVERTISE_HOST") {
            self.node.advertise_host = v;
        }
        if let Ok(v) = std::env::var("PEERLINK_APPROVAL__AUTO_ACCEPT") {
            self.approval.auto_accept = v == "true" || v == "1";
        }
    }
}
