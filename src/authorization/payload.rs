//! Authorization payloads and envelopes
//!
//! Payloads are JSON. Envelopes carry them sealed with
//! [`SealedPayload`](crate::crypto::SealedPayload), using the client id
//! bytes as context info.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::crypto::{random_bytes, SealedPayload};
use crate::scope::ScopeRequest;

/// Plaintext of an authorization request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationPayload {
    /// Client asking for access
    pub client_id: String,
    /// Nonce correlating this request with its response
    pub state: u64,
    /// Requested scopes
    pub scopes: BTreeSet<ScopeRequest>,
    /// Whether to issue a refresh token as well
    pub include_refresh_token: bool,
    /// Random filler so identical requests encrypt differently
    pub nonce: String,
}

impl AuthorizationPayload {
    /// Build a payload with a fresh nonce
    pub fn new(
        client_id: impl Into<String>,
        state: u64,
        scopes: BTreeSet<ScopeRequest>,
        include_refresh_token: bool,
    ) -> Self {
        AuthorizationPayload {
            client_id: client_id.into(),
            state,
            scopes,
            include_refresh_token,
            nonce: hex::encode(random_bytes::<16>()),
        }
    }
}

/// Plaintext of an authorization response
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationResponsePayload {
    /// Access token
    pub access_token: String,
    /// Refresh token, when one was requested
    pub refresh_token: Option<String>,
    /// Echoed request nonce
    pub state: u64,
}

impl std::fmt::Debug for AuthorizationResponsePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationResponsePayload")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Authorization request as sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Claimed client id, used to find the keys; not trusted until the
    /// sealed payload agrees
    pub client_id: String,
    /// Sealed [`AuthorizationPayload`]
    pub sealed: SealedPayload,
}

/// Authorization response as sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationResponse {
    /// Sealed [`AuthorizationResponsePayload`]
    pub sealed: SealedPayload,
}
