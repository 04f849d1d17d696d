//! Server side of resource queries

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{ApiView, ResourceError, ResourceQuery, ResourceResponse, ResourceStatus};
use crate::crypto::SealedPayload;
use crate::scope::check_permission;
use crate::storage::{ClientRegistry, CredentialStore};
use crate::token::TokenIssuer;

/// Routes queries to [`ApiView`]s after checking token and scopes
pub struct ResourceProvider {
    credentials: Arc<dyn CredentialStore>,
    registry: Arc<dyn ClientRegistry>,
    tokens: Arc<dyn TokenIssuer>,
    routes: HashMap<String, Arc<dyn ApiView>>,
}

impl ResourceProvider {
    /// Create a provider with no routes
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        registry: Arc<dyn ClientRegistry>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        ResourceProvider {
            credentials,
            registry,
            tokens,
            routes: HashMap::new(),
        }
    }

    /// Serve `view` at `path`
    pub fn route(mut self, path: impl Into<String>, view: Arc<dyn ApiView>) -> Self {
        self.routes.insert(path.into(), view);
        self
    }

    /// Answer a query
    pub fn query(&self, query: &ResourceQuery) -> ResourceResponse {
        match self.rows(query) {
            Ok(rows) => {
                debug!(
                    client_id = %query.client_id,
                    route = %query.route,
                    rows = rows.len(),
                    "query served"
                );
                ResourceResponse {
                    status: ResourceStatus::Ok,
                    rows,
                }
            }
            Err(e) => {
                warn!(
                    client_id = %query.client_id,
                    route = %query.route,
                    error = %e,
                    "query refused"
                );
                ResourceResponse::status(e.status())
            }
        }
    }

    fn rows(&self, query: &ResourceQuery) -> Result<Vec<SealedPayload>, ResourceError> {
        let view = self
            .routes
            .get(&query.route)
            .ok_or_else(|| ResourceError::NotFound(query.route.clone()))?;

        let client_id = query.client_id.as_str();
        let handshake = self
            .credentials
            .client_handshake(client_id)?
            .ok_or_else(|| ResourceError::AuthenticationFailed("no handshake".to_string()))?;

        let token = query
            .token
            .open(
                &handshake.client_public_signing_key,
                &handshake.server_encryption_keys,
                client_id.as_bytes(),
            )
            .map_err(|e| ResourceError::AuthenticationFailed(e.to_string()))?;
        let token = String::from_utf8(token)
            .map_err(|_| ResourceError::AuthenticationFailed("token is not UTF-8".to_string()))?;

        let claims = self
            .tokens
            .validate_and_decode_access_token(&token)
            .ok_or_else(|| ResourceError::AuthenticationFailed("invalid token".to_string()))?;
        if self.tokens.client_id(&claims) != Some(client_id) {
            return Err(ResourceError::AuthenticationFailed(
                "token issued to another client".to_string(),
            ));
        }

        let client = self
            .registry
            .lookup_client(client_id)?
            .ok_or_else(|| ResourceError::AuthenticationFailed("unknown client".to_string()))?;

        let approved = self
            .credentials
            .approved_scopes(&client.client_id)?
            .unwrap_or_default();
        if !check_permission(&approved, &view.required_scopes()) {
            return Err(ResourceError::InsufficientPermissions);
        }

        view.objects(client_id)?
            .iter()
            .map(|object| -> Result<SealedPayload, ResourceError> {
                let json = serde_json::to_vec(object)
                    .map_err(|e| ResourceError::MalformedRow(e.to_string()))?;
                Ok(SealedPayload::seal(
                    &json,
                    &handshake.client_public_encryption_key,
                    &handshake.server_signing_keys,
                    client_id.as_bytes(),
                )?)
            })
            .collect()
    }
}
