//! Server side of the authorization exchange

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::consent::{ConsentDecision, ConsentProvider, ConsentRequest};
use super::error::{AuthorizationError, AuthorizationResult};
use super::payload::{
    AuthorizationPayload, AuthorizationRequest, AuthorizationResponse, AuthorizationResponsePayload,
};
use crate::crypto::SealedPayload;
use crate::scope::{ConsentGroups, ScopeRequest};
use crate::storage::{ClientHandshake, ClientRegistry, CredentialStore};
use crate::token::TokenIssuer;

/// Opens authorization requests, asks for consent and issues tokens
pub struct AuthorizationServer {
    credentials: Arc<dyn CredentialStore>,
    registry: Arc<dyn ClientRegistry>,
    consent: Arc<dyn ConsentProvider>,
    tokens: Arc<dyn TokenIssuer>,
    access_token_lifetime: Duration,
    refresh_token_lifetime: Duration,
}

impl AuthorizationServer {
    /// Create a server over the given collaborators
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        registry: Arc<dyn ClientRegistry>,
        consent: Arc<dyn ConsentProvider>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        AuthorizationServer {
            credentials,
            registry,
            consent,
            tokens,
            access_token_lifetime: Duration::from_secs(24 * 60 * 60),
            refresh_token_lifetime: Duration::from_secs(365 * 24 * 60 * 60),
        }
    }

    /// Override the token lifetimes
    pub fn with_lifetimes(mut self, access: Duration, refresh: Duration) -> Self {
        self.access_token_lifetime = access;
        self.refresh_token_lifetime = refresh;
        self
    }

    /// Handle one authorization request
    ///
    /// Failed signature or decryption checks are reported but leave every
    /// stored record as it was.
    pub async fn authorize(
        &self,
        request: &AuthorizationRequest,
    ) -> AuthorizationResult<AuthorizationResponse> {
        let client_id = request.client_id.as_str();
        let handshake = self
            .credentials
            .client_handshake(client_id)?
            .ok_or_else(|| AuthorizationError::MalformedRequest("needs handshake".to_string()))?;

        let payload = open_request(&handshake, request).map_err(|e| {
            warn!(client_id, error = %e, "authorization request rejected");
            e
        })?;

        let client = self
            .registry
            .lookup_client(client_id)?
            .ok_or_else(|| AuthorizationError::UnknownClient(client_id.to_string()))?;

        let groups = ConsentGroups::from_request(&client.allowed_scopes, &payload.scopes);
        let offered = groups.offered();
        let decision = self
            .consent
            .request_consent(ConsentRequest {
                client_id: client.client_id.clone(),
                description: client.description.clone(),
                groups,
                include_refresh_token: payload.include_refresh_token,
            })
            .await;

        match decision {
            ConsentDecision::Approved(scopes) => {
                let approved: BTreeSet<ScopeRequest> =
                    scopes.intersection(&offered).cloned().collect();
                debug!(client_id, count = approved.len(), "scopes approved");
                self.credentials.set_approved_scopes(client_id, approved)?;
            }
            ConsentDecision::Canceled => {
                // Tokens are still issued; they just carry no grant
                debug!(client_id, "consent canceled, clearing approved scopes");
                self.credentials.clear_approved_scopes(client_id)?;
            }
            ConsentDecision::Failed(reason) => {
                warn!(client_id, %reason, "consent failed");
                return Err(AuthorizationError::ConsentFailed(reason));
            }
        }

        let access_token = self
            .tokens
            .generate_access_token(client_id, self.access_token_lifetime)?;
        let refresh_token = if payload.include_refresh_token {
            Some(
                self.tokens
                    .generate_refresh_token(client_id, self.refresh_token_lifetime)?,
            )
        } else {
            None
        };

        let response = AuthorizationResponsePayload {
            access_token,
            refresh_token,
            state: payload.state,
        };
        let json = serde_json::to_vec(&response)
            .map_err(|e| AuthorizationError::MalformedResponse(e.to_string()))?;
        let sealed = SealedPayload::seal(
            &json,
            &handshake.client_public_encryption_key,
            &handshake.server_signing_keys,
            client_id.as_bytes(),
        )?;

        info!(client_id, refresh = response.refresh_token.is_some(), "tokens issued");
        Ok(AuthorizationResponse { sealed })
    }
}

fn open_request(
    handshake: &ClientHandshake,
    request: &AuthorizationRequest,
) -> AuthorizationResult<AuthorizationPayload> {
    let plaintext = request.sealed.open(
        &handshake.client_public_signing_key,
        &handshake.server_encryption_keys,
        request.client_id.as_bytes(),
    )?;

    let payload: AuthorizationPayload = serde_json::from_slice(&plaintext)
        .map_err(|e| AuthorizationError::MalformedRequest(e.to_string()))?;

    if payload.client_id != request.client_id {
        return Err(AuthorizationError::MalformedRequest(
            "client id does not match envelope".to_string(),
        ));
    }
    Ok(payload)
}
