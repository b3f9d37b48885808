//! Handshake configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Handshake policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Time allowed from `initiate`/`respond` to a terminal state.
    pub handshake_timeout_secs: u64,
    /// Tracked nonces per nonce manager before FIFO eviction.
    pub nonce_capacity: usize,
    /// Require the initiator's counter-signature before the responder
    /// authenticates.
    pub require_mutual_proof: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: 30,
            nonce_capacity: 10_000,
            require_mutual_proof: true,
        }
    }
}

impl AuthConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Load configuration from defaults, an optional TOML file named by
    /// `BRC_AUTH_CONFIG`, then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("BRC_AUTH_CONFIG") {
            Ok(path) => Self::load_from_file(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(secs) = std::env::var("BRC_AUTH_HANDSHAKE_TIMEOUT_SECS") {
            config.handshake_timeout_secs = secs.parse().map_err(|e| {
                ConfigError::Invalid(format!("Invalid handshake_timeout_secs: {}", e))
            })?;
        }

        if let Ok(capacity) = std::env::var("BRC_AUTH_NONCE_CAPACITY") {
            config.nonce_capacity = capacity
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("Invalid nonce_capacity: {}", e)))?;
        }

        if let Ok(flag) = std::env::var("BRC_AUTH_REQUIRE_MUTUAL_PROOF") {
            config.require_mutual_proof = flag.parse().map_err(|e| {
                ConfigError::Invalid(format!("Invalid require_mutual_proof: {}", e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.handshake_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "handshake_timeout_secs must be > 0".to_string(),
            ));
        }

        if self.nonce_capacity == 0 {
            return Err(ConfigError::Invalid("nonce_capacity must be > 0".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AuthConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.handshake_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AuthConfig::from_toml_str("nonce_capacity = 16\n").unwrap();
        assert_eq!(config.nonce_capacity, 16);
        assert_eq!(config.handshake_timeout_secs, 30);
        assert!(config.require_mutual_proof);
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(matches!(
            AuthConfig::from_toml_str("handshake_timeout_secs = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AuthConfig::from_toml_str("nonce_capacity = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            AuthConfig::from_toml_str("nonce_capacity = \"many\""),
            Err(ConfigError::Toml(_))
        ));
    }
}
