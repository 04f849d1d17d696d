//! Access and refresh tokens
//!
//! Tokens are HS256 JWTs signed with a server-held secret. They never
//! leave the device in the clear: the authorization exchange encrypts
//! them to the client, and the client encrypts them back when it queries
//! a resource.

use std::time::Duration;

use jsonwebtoken::{
    decode, encode, get_current_timestamp, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Token errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token could not be produced
    #[error("Cannot generate token: {0}")]
    Generation(String),
}

/// Result type for token operations
pub type TokenResult<T> = Result<T, TokenError>;

/// Which kind of token a JWT is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived token presented to resources
    Access,
    /// Long-lived token used to obtain new access tokens
    Refresh,
}

/// JWT claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer
    pub iss: String,
    /// Client the token was issued to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Access or refresh
    pub token_type: TokenType,
    /// Issued at, seconds since the epoch
    pub iat: u64,
    /// Expires at, seconds since the epoch
    pub exp: u64,
}

/// Issues and validates tokens
pub trait TokenIssuer: Send + Sync {
    /// Issue an access token for `client_id`
    fn generate_access_token(&self, client_id: &str, lifetime: Duration) -> TokenResult<String>;

    /// Issue a refresh token for `client_id`
    fn generate_refresh_token(&self, client_id: &str, lifetime: Duration) -> TokenResult<String>;

    /// Claims of a valid, unexpired access token
    fn validate_and_decode_access_token(&self, token: &str) -> Option<TokenClaims>;

    /// Claims of a valid, unexpired refresh token
    fn validate_and_decode_refresh_token(&self, token: &str) -> Option<TokenClaims>;

    /// Client a token was issued to
    fn client_id<'a>(&self, claims: &'a TokenClaims) -> Option<&'a str> {
        claims.client_id.as_deref()
    }
}

/// HS256 JWT issuer
pub struct JwtTokenManager {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtTokenManager {
    /// Create a manager signing with `secret`
    pub fn new(issuer: impl Into<String>, secret: &[u8]) -> Self {
        JwtTokenManager {
            issuer: issuer.into(),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Create a manager with a fresh random secret
    ///
    /// Tokens issued by one instance are not valid for another.
    pub fn with_random_secret(issuer: impl Into<String>) -> Self {
        let secret = crate::crypto::random_bytes::<32>();
        Self::new(issuer, &secret)
    }

    fn generate(
        &self,
        client_id: &str,
        token_type: TokenType,
        lifetime: Duration,
    ) -> TokenResult<String> {
        let now = get_current_timestamp();
        let claims = TokenClaims {
            iss: self.issuer.clone(),
            client_id: Some(client_id.to_string()),
            token_type,
            iat: now,
            exp: now.saturating_add(lifetime.as_secs()),
        };
        self.encode_claims(&claims)
    }

    fn encode_claims(&self, claims: &TokenClaims) -> TokenResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| TokenError::Generation(e.to_string()))
    }

    fn validate(&self, token: &str, expected: TokenType) -> Option<TokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);

        let claims = match decode::<TokenClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(error = %e, "token rejected");
                return None;
            }
        };

        if claims.token_type != expected || claims.client_id.is_none() {
            debug!(?expected, actual = ?claims.token_type, "token rejected");
            return None;
        }
        Some(claims)
    }
}

impl TokenIssuer for JwtTokenManager {
    fn generate_access_token(&self, client_id: &str, lifetime: Duration) -> TokenResult<String> {
        self.generate(client_id, TokenType::Access, lifetime)
    }

    fn generate_refresh_token(&self, client_id: &str, lifetime: Duration) -> TokenResult<String> {
        self.generate(client_id, TokenType::Refresh, lifetime)
    }

    fn validate_and_decode_access_token(&self, token: &str) -> Option<TokenClaims> {
        self.validate(token, TokenType::Access)
    }

    fn validate_and_decode_refresh_token(&self, token: &str) -> Option<TokenClaims> {
        self.validate(token, TokenType::Refresh)
    }
}

impl std::fmt::Debug for JwtTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtTokenManager")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}
