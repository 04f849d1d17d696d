//! Client side of the authorization exchange

use std::collections::BTreeSet;

use tracing::debug;

use super::error::{AuthorizationError, AuthorizationResult};
use super::payload::{
    AuthorizationPayload, AuthorizationRequest, AuthorizationResponse, AuthorizationResponsePayload,
};
use crate::crypto::{random_state, SealedPayload};
use crate::scope::ScopeRequest;
use crate::storage::ClientCredentials;

/// A request in flight, kept until its response arrives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAuthorization {
    state: u64,
}

impl PendingAuthorization {
    /// Nonce the response must echo
    pub fn state(&self) -> u64 {
        self.state
    }
}

/// Tokens granted by the server
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationGrant {
    /// Access token
    pub access_token: String,
    /// Refresh token, when one was requested
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for AuthorizationGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGrant")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Seals authorization requests and opens their responses
#[derive(Debug, Clone)]
pub struct AuthorizationRequester {
    client_id: String,
}

impl AuthorizationRequester {
    /// Create a requester for `client_id`
    pub fn new(client_id: impl Into<String>) -> Self {
        AuthorizationRequester {
            client_id: client_id.into(),
        }
    }

    /// Build a sealed request for `scopes`
    pub fn request(
        &self,
        credentials: &ClientCredentials,
        scopes: BTreeSet<ScopeRequest>,
        include_refresh_token: bool,
    ) -> AuthorizationResult<(AuthorizationRequest, PendingAuthorization)> {
        let state = random_state();
        let payload = AuthorizationPayload::new(
            self.client_id.clone(),
            state,
            scopes,
            include_refresh_token,
        );
        let json = serde_json::to_vec(&payload)
            .map_err(|e| AuthorizationError::MalformedRequest(e.to_string()))?;

        let sealed = SealedPayload::seal(
            &json,
            &credentials.server_public_encryption_key,
            &credentials.client_signing_keys,
            self.client_id.as_bytes(),
        )?;

        debug!(client_id = %self.client_id, "authorization request sealed");
        Ok((
            AuthorizationRequest {
                client_id: self.client_id.clone(),
                sealed,
            },
            PendingAuthorization { state },
        ))
    }

    /// Open the response to `pending`
    pub fn handle_response(
        &self,
        credentials: &ClientCredentials,
        pending: PendingAuthorization,
        response: &AuthorizationResponse,
    ) -> AuthorizationResult<AuthorizationGrant> {
        let plaintext = response.sealed.open(
            &credentials.server_public_signing_key,
            &credentials.client_encryption_keys,
            self.client_id.as_bytes(),
        )?;

        let payload: AuthorizationResponsePayload = serde_json::from_slice(&plaintext)
            .map_err(|e| AuthorizationError::MalformedResponse(e.to_string()))?;

        if payload.state != pending.state {
            return Err(AuthorizationError::MalformedResponse(
                "state does not match request".to_string(),
            ));
        }

        Ok(AuthorizationGrant {
            access_token: payload.access_token,
            refresh_token: payload.refresh_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{EncryptionKeyPair, SigningKeyPair};

    struct Keys {
        client: ClientCredentials,
        server_signing: SigningKeyPair,
        server_encryption: EncryptionKeyPair,
    }

    fn keys() -> Keys {
        let server_signing = SigningKeyPair::generate();
        let server_encryption = EncryptionKeyPair::generate();
        Keys {
            client: ClientCredentials {
                client_signing_keys: SigningKeyPair::generate(),
                client_encryption_keys: EncryptionKeyPair::generate(),
                server_public_signing_key: *server_signing.public_key(),
                server_public_encryption_key: *server_encryption.public_key(),
            },
            server_signing,
            server_encryption,
        }
    }

    fn respond(keys: &Keys, state: u64) -> AuthorizationResponse {
        let payload = AuthorizationResponsePayload {
            access_token: "access".to_string(),
            refresh_token: None,
            state,
        };
        AuthorizationResponse {
            sealed: SealedPayload::seal(
                &serde_json::to_vec(&payload).unwrap(),
                keys.client.client_encryption_keys.public_key(),
                &keys.server_signing,
                b"client",
            )
            .unwrap(),
        }
    }

    #[test]
    fn test_request_opens_for_server() {
        let keys = keys();
        let requester = AuthorizationRequester::new("client");
        let scopes = ScopeRequest::parse_all(["a.read"]).unwrap();

        let (request, pending) = requester.request(&keys.client, scopes.clone(), true).unwrap();
        let plaintext = request
            .sealed
            .open(
                keys.client.client_signing_keys.public_key(),
                &keys.server_encryption,
                b"client",
            )
            .unwrap();
        let payload: AuthorizationPayload = serde_json::from_slice(&plaintext).unwrap();

        assert_eq!(payload.client_id, "client");
        assert_eq!(payload.state, pending.state());
        assert_eq!(payload.scopes, scopes);
        assert!(payload.include_refresh_token);
    }

    #[test]
    fn test_matching_state_accepted() {
        let keys = keys();
        let requester = AuthorizationRequester::new("client");
        let (_, pending) = requester.request(&keys.client, BTreeSet::new(), false).unwrap();

        let response = respond(&keys, pending.state());
        let grant = requester.handle_response(&keys.client, pending, &response).unwrap();
        assert_eq!(grant.access_token, "access");
    }

    #[test]
    fn test_state_mismatch_is_malformed_response() {
        let keys = keys();
        let requester = AuthorizationRequester::new("client");
        let (_, pending) = requester.request(&keys.client, BTreeSet::new(), false).unwrap();

        let response = respond(&keys, pending.state().wrapping_add(1));
        assert!(matches!(
            requester.handle_response(&keys.client, pending, &response),
            Err(AuthorizationError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_forged_response_rejected() {
        let keys = keys();
        let requester = AuthorizationRequester::new("client");
        let (_, pending) = requester.request(&keys.client, BTreeSet::new(), false).unwrap();

        let mut response = respond(&keys, pending.state());
        response.sealed.signature[5] ^= 0x01;
        assert!(matches!(
            requester.handle_response(&keys.client, pending, &response),
            Err(AuthorizationError::Crypto(_))
        ));
    }
}
