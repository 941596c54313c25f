// ============================================
// File: crates/sealpost-server/src/config.rs
// ============================================
//! # Server Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the relay, loaded from TOML with
//! per-section defaults.
//!
//! ## Main Functionality
//! - `ServerConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Configuration validation
//! - `SEALPOST_TOKEN_SECRET` environment override
//!
//! ## Configuration Sections
//! - `network`: WebSocket listen address
//! - `limits`: Connection count, frame size, handshake and idle timeouts
//! - `presence`: Presence broadcast buffer
//! - `auth`: Token signing secret and lifetime
//! - `storage`: `memory` or `file` backend
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [network]
//! listen_addr = "0.0.0.0:8080"
//!
//! [limits]
//! max_connections = 1024
//! max_frame_bytes = 262144
//! handshake_timeout_secs = 10
//! idle_timeout_secs = 300
//!
//! [auth]
//! token_secret = "change-me-to-at-least-32-characters"
//! token_ttl_secs = 14400
//!
//! [storage]
//! backend = "file"
//! path = "/var/lib/sealpost/journal.jsonl"
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All config changes require server restart
//! - Without a token secret the server generates one per process: tokens
//!   stop verifying after a restart
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use sealpost_core::protocol::DEFAULT_MAX_FRAME_BYTES;

use crate::error::{Result, ServerError};

/// Environment variable overriding `auth.token_secret`.
pub const TOKEN_SECRET_ENV: &str = "SEALPOST_TOKEN_SECRET";

/// Minimum accepted secret length in bytes.
pub const MIN_TOKEN_SECRET_LEN: usize = 32;

// ============================================
// ServerConfig
// ============================================

/// Main server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Network configuration.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Presence broadcast settings.
    #[serde(default)]
    pub presence: PresenceConfig,

    /// Token settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Persistence backend.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Loads configuration from a TOML file, then applies environment
    /// overrides.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        let mut config: Self = toml::from_str(&content)
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        config.apply_env();
        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error on TOML or validation failure.
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var(TOKEN_SECRET_ENV) {
            if !secret.is_empty() {
                self.auth.token_secret = Some(secret);
            }
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// `ConfigInvalid` / `ConfigMissing` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        self.limits.validate()?;
        self.presence.validate()?;
        self.auth.validate()?;
        self.storage.validate()?;
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Returns listen address (from network config).
    #[must_use]
    pub const fn listen_addr(&self) -> SocketAddr {
        self.network.listen_addr
    }
}

// ============================================
// NetworkConfig
// ============================================

/// Network configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// WebSocket listen address.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

// ============================================
// LimitsConfig
// ============================================

/// Resource limits configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Largest accepted text frame in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Time allowed for the `auth` frame, in seconds.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    /// Connections with no inbound frame for this long are closed.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> usize {
    1024
}

fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}

fn default_handshake_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    300
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(ServerError::config_invalid(
                "limits.max_connections",
                "must be greater than 0",
            ));
        }

        if self.max_frame_bytes < 1024 {
            return Err(ServerError::config_invalid(
                "limits.max_frame_bytes",
                "must be at least 1024",
            ));
        }

        if self.handshake_timeout_secs == 0 {
            return Err(ServerError::config_invalid(
                "limits.handshake_timeout_secs",
                "must be greater than 0",
            ));
        }

        if self.idle_timeout_secs == 0 {
            return Err(ServerError::config_invalid(
                "limits.idle_timeout_secs",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Handshake timeout as a `Duration`.
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Idle timeout as a `Duration`.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_frame_bytes: default_max_frame_bytes(),
            handshake_timeout_secs: default_handshake_timeout(),
            idle_timeout_secs: default_idle_timeout(),
        }
    }
}

// ============================================
// PresenceConfig
// ============================================

/// Presence configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Buffered presence events per subscriber before it lags.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    1024
}

impl PresenceConfig {
    fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(ServerError::config_invalid(
                "presence.event_capacity",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
        }
    }
}

// ============================================
// AuthConfig
// ============================================

/// Token configuration section.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for bearer tokens.
    #[serde(default)]
    pub token_secret: Option<String>,

    /// Token lifetime in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

fn default_token_ttl() -> u64 {
    4 * 60 * 60
}

impl AuthConfig {
    fn validate(&self) -> Result<()> {
        if let Some(secret) = &self.token_secret {
            if secret.len() < MIN_TOKEN_SECRET_LEN {
                return Err(ServerError::config_invalid(
                    "auth.token_secret",
                    format!("must be at least {MIN_TOKEN_SECRET_LEN} bytes"),
                ));
            }
        }

        if self.token_ttl_secs == 0 {
            return Err(ServerError::config_invalid(
                "auth.token_ttl_secs",
                "must be greater than 0",
            ));
        }

        Ok(())
    }

    /// Token lifetime as a `Duration`.
    #[must_use]
    pub const fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_ttl_secs: default_token_ttl(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_secret", &self.token_secret.as_ref().map(|_| "[REDACTED]"))
            .field("token_ttl_secs", &self.token_ttl_secs)
            .finish()
    }
}

// ============================================
// StorageConfig
// ============================================

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Volatile, lost on restart.
    #[default]
    Memory,
    /// Append-only JSON-lines journal.
    File,
}

/// Storage configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend kind.
    #[serde(default)]
    pub backend: StorageBackend,

    /// Journal path, required for the file backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        if self.backend == StorageBackend::File && self.path.is_none() {
            return Err(ServerError::config_missing("storage.path"));
        }
        Ok(())
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.listen_addr().port(), 8080);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.auth.token_ttl(), Duration::from_secs(14_400));
    }

    #[test]
    fn test_full_config_format() {
        let toml = r#"
            [network]
            listen_addr = "127.0.0.1:9000"

            [limits]
            max_connections = 50
            max_frame_bytes = 65536
            handshake_timeout_secs = 3
            idle_timeout_secs = 60

            [presence]
            event_capacity = 16

            [auth]
            token_secret = "0123456789abcdef0123456789abcdef"
            token_ttl_secs = 600

            [storage]
            backend = "file"
            path = "/tmp/sealpost.jsonl"

            [logging]
            level = "debug"
        "#;

        let config = ServerConfig::from_str(toml).unwrap();
        assert_eq!(config.listen_addr().port(), 9000);
        assert_eq!(config.limits.max_connections, 50);
        assert_eq!(config.limits.handshake_timeout(), Duration::from_secs(3));
        assert_eq!(config.presence.event_capacity, 16);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.path.as_deref(), Some(Path::new("/tmp/sealpost.jsonl")));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = ServerConfig::from_str("[limits]\nmax_connections = 5\n").unwrap();
        assert_eq!(config.limits.max_connections, 5);
        assert_eq!(config.limits.idle_timeout_secs, 300);
        assert_eq!(config.limits.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ServerConfig::from_str("[limits]\nmax_connections = 0\n").unwrap_err();
        assert!(matches!(err, ServerError::ConfigInvalid { ref field, .. } if field == "limits.max_connections"));

        let err = ServerConfig::from_str("[auth]\ntoken_secret = \"short\"\n").unwrap_err();
        assert!(matches!(err, ServerError::ConfigInvalid { ref field, .. } if field == "auth.token_secret"));

        let err = ServerConfig::from_str("[storage]\nbackend = \"file\"\n").unwrap_err();
        assert!(matches!(err, ServerError::ConfigMissing { ref field } if field == "storage.path"));

        assert!(ServerConfig::from_str("[storage]\nbackend = \"redis\"\n").is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let mut config = ServerConfig::default();
        config.auth.token_secret = Some("0123456789abcdef0123456789abcdef".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("0123456789abcdef"));
        assert!(debug.contains("REDACTED"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.toml");
        tokio::fs::write(&path, "[network]\nlisten_addr = \"127.0.0.1:7000\"\n")
            .await
            .unwrap();

        let config = ServerConfig::load(&path).await.unwrap();
        assert_eq!(config.listen_addr().port(), 7000);

        let missing = ServerConfig::load(dir.path().join("absent.toml")).await.unwrap_err();
        assert!(missing.is_config_error());
    }
}
