//! Server and client configuration
//!
//! Both halves load from JSON. Every field has a default, so `{}` is a
//! valid configuration that serves the sample client.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::Client;
use crate::token::JwtTokenManager;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid JSON for this shape
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Resource server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `iss` claim of issued tokens
    pub issuer: String,
    /// Access token lifetime in seconds
    pub access_token_lifetime_secs: u64,
    /// Refresh token lifetime in seconds
    pub refresh_token_lifetime_secs: u64,
    /// Hex HS256 key; a random key is used when absent
    pub token_secret: Option<String>,
    /// Registered clients
    pub clients: Vec<Client>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            issuer: "resource-auth".to_string(),
            access_token_lifetime_secs: 24 * 60 * 60,
            refresh_token_lifetime_secs: 365 * 24 * 60 * 60,
            token_secret: None,
            clients: vec![Client::sample()],
        }
    }
}

impl ServerConfig {
    /// Parse and validate JSON
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Check values that parse but cannot be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::Invalid("issuer is empty".to_string()));
        }
        if self.access_token_lifetime_secs == 0 || self.refresh_token_lifetime_secs == 0 {
            return Err(ConfigError::Invalid("token lifetimes must be positive".to_string()));
        }
        if let Some(secret) = &self.token_secret {
            self.decode_secret(secret)?;
        }
        Ok(())
    }

    fn decode_secret(&self, secret: &str) -> Result<Vec<u8>, ConfigError> {
        let bytes = hex::decode(secret)
            .map_err(|e| ConfigError::Invalid(format!("token_secret: {e}")))?;
        if bytes.len() < 32 {
            return Err(ConfigError::Invalid(
                "token_secret must be at least 32 bytes".to_string(),
            ));
        }
        Ok(bytes)
    }

    /// Access token lifetime
    pub fn access_token_lifetime(&self) -> Duration {
        Duration::from_secs(self.access_token_lifetime_secs)
    }

    /// Refresh token lifetime
    pub fn refresh_token_lifetime(&self) -> Duration {
        Duration::from_secs(self.refresh_token_lifetime_secs)
    }

    /// Token manager for this issuer and secret
    pub fn token_manager(&self) -> Result<JwtTokenManager, ConfigError> {
        Ok(match &self.token_secret {
            Some(secret) => JwtTokenManager::new(self.issuer.clone(), &self.decode_secret(secret)?),
            None => JwtTokenManager::with_random_secret(self.issuer.clone()),
        })
    }
}

/// Client app settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Id the server knows this app by
    pub client_id: String,
    /// Deadline for each request, in milliseconds
    pub request_timeout_ms: u64,
    /// Ask for a refresh token along with the access token
    pub include_refresh_token: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            client_id: Client::sample().client_id,
            request_timeout_ms: 10_000,
            include_refresh_token: true,
        }
    }
}

impl ClientConfig {
    /// Parse JSON
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot be used
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::Invalid("client_id is empty".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Read and parse a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Per-request deadline
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenIssuer;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = ServerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.access_token_lifetime(), Duration::from_secs(86_400));
        assert_eq!(config.refresh_token_lifetime(), Duration::from_secs(31_536_000));
        assert_eq!(config.clients[0].client_id, "sample_client_id");

        let client = ClientConfig::from_json_str("{}").unwrap();
        assert_eq!(client.request_timeout(), Duration::from_secs(10));
        assert!(client.include_refresh_token);
    }

    #[test]
    fn test_partial_override() {
        let config =
            ServerConfig::from_json_str(r#"{"issuer": "local", "access_token_lifetime_secs": 60}"#)
                .unwrap();
        assert_eq!(config.issuer, "local");
        assert_eq!(config.access_token_lifetime_secs, 60);
        assert_eq!(config.refresh_token_lifetime_secs, 365 * 24 * 60 * 60);
    }

    #[test]
    fn test_clients_from_json() {
        let json = r#"{
            "clients": [{
                "client_id": "notes",
                "description": "Notes App",
                "allowed_scopes": [
                    {"scope": {"identifier": "notes", "description": "Notes"}, "access": "read"}
                ]
            }]
        }"#;
        let config = ServerConfig::from_json_str(json).unwrap();
        assert_eq!(config.clients.len(), 1);
        assert_eq!(config.clients[0].allowed_scopes.len(), 1);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ServerConfig::from_json_str(r#"{"issuer": ""}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServerConfig::from_json_str(r#"{"refresh_token_lifetime_secs": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServerConfig::from_json_str(r#"{"token_secret": "abcd"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ClientConfig::from_json_str(r#"{"client_id": ""}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ServerConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_fixed_secret_survives_restart() {
        let json = format!(r#"{{"token_secret": "{}"}}"#, "ab".repeat(32));
        let config = ServerConfig::from_json_str(&json).unwrap();

        let token = config
            .token_manager()
            .unwrap()
            .generate_access_token("c", Duration::from_secs(60))
            .unwrap();
        let claims = config
            .token_manager()
            .unwrap()
            .validate_and_decode_access_token(&token)
            .unwrap();
        assert_eq!(claims.client_id.as_deref(), Some("c"));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ClientConfig::from_json_file("/nonexistent/resource-auth.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
