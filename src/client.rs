//! Client app side over a transport
//!
//! ```text
//! authorize(scopes)
//!   ├─ credentials stored? ── VERIFY ── ok ──────────────┐
//!   │                           └─ failed: credentials cleared
//!   └─ BEGIN ── COMPLETE ─────────────────────────────────┤
//!                                                          ▼
//!                                     AUTHORIZATION ── tokens
//! query(route, token) ── rows opened with stored credentials
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::authorization::{AuthorizationError, AuthorizationGrant, AuthorizationRequester};
use crate::config::ClientConfig;
use crate::error::ErrorReply;
use crate::handshake::{HandshakeError, HandshakeInitiator};
use crate::resource::{ResourceError, ResourceQuery};
use crate::scope::ScopeRequest;
use crate::storage::{ClientCredentials, ClientStorage, StorageError};
use crate::transport::{Exchange, Message, Transport, TransportError};

/// Errors seen by a client app
#[derive(Error, Debug)]
pub enum ClientError {
    /// Nothing usable came back
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Local handshake checks failed
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// Local authorization checks failed
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// Resource query failed or was refused
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Client storage failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The server answered with an error
    #[error("Server error: {0}")]
    Remote(ErrorReply),

    /// The server answered with the wrong kind of message
    #[error("Unexpected reply: {0}")]
    UnexpectedMessage(&'static str),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Talks to one resource server
pub struct ResourceClient<T: Transport> {
    config: ClientConfig,
    exchange: Exchange<T>,
    storage: Arc<dyn ClientStorage>,
    initiator: HandshakeInitiator,
    requester: AuthorizationRequester,
}

impl<T: Transport> ResourceClient<T> {
    /// Create a client speaking over `transport`
    pub fn new(config: ClientConfig, transport: T, storage: Arc<dyn ClientStorage>) -> Self {
        ResourceClient {
            exchange: Exchange::new(transport, config.request_timeout()),
            initiator: HandshakeInitiator::new(config.client_id.clone(), storage.clone()),
            requester: AuthorizationRequester::new(config.client_id.clone()),
            storage,
            config,
        }
    }

    /// Client id this app speaks for
    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    /// Stored credentials, if a handshake has completed
    pub fn credentials(&self) -> ClientResult<Option<ClientCredentials>> {
        Ok(self.storage.credentials()?)
    }

    /// Run a fresh handshake
    ///
    /// Anything short of a successful COMPLETE response leaves no
    /// credentials stored.
    pub async fn handshake(&mut self) -> ClientResult<()> {
        let begin = self.initiator.begin()?;
        let response = match self.call(Message::BeginRequest(begin)).await {
            Ok(Message::BeginResponse(response)) => response,
            Ok(other) => return Err(self.abort(unexpected(other))),
            Err(e) => return Err(self.abort(e)),
        };

        let complete = self.initiator.handle_begin_response(&response)?;
        let response = match self.call(Message::CompleteRequest(complete)).await {
            Ok(Message::CompleteResponse(response)) => response,
            Ok(other) => return Err(self.abort(unexpected(other))),
            Err(e) => return Err(self.abort(e)),
        };

        self.initiator.handle_complete_response(&response)?;
        Ok(())
    }

    /// Check that the server still holds matching keys
    ///
    /// Any failure clears the stored credentials.
    pub async fn verify(&mut self) -> ClientResult<()> {
        let proof = self.initiator.verify_request()?;
        match self.call(Message::VerifyRequest(proof)).await {
            Ok(Message::VerifyResponse(proof)) => {
                self.initiator.handle_verify_response(&proof)?;
                Ok(())
            }
            Ok(other) => Err(self.abort(unexpected(other))),
            Err(e) => Err(self.abort(e)),
        }
    }

    /// Reuse stored credentials if VERIFY passes, otherwise handshake
    pub async fn ensure_handshake(&mut self) -> ClientResult<()> {
        if self.initiator.has_credentials()? {
            match self.verify().await {
                Ok(()) => return Ok(()),
                // A dead transport will not carry a handshake either
                Err(e @ ClientError::Transport(_)) => return Err(e),
                Err(e) => debug!(
                    client_id = %self.config.client_id,
                    error = %e,
                    "verify failed, redoing handshake"
                ),
            }
        }
        self.handshake().await
    }

    /// Ask the server for tokens covering `scopes`
    pub async fn authorize(
        &mut self,
        scopes: BTreeSet<ScopeRequest>,
    ) -> ClientResult<AuthorizationGrant> {
        self.ensure_handshake().await?;
        let credentials = self.require_credentials()?;

        let (request, pending) = self.requester.request(
            &credentials,
            scopes,
            self.config.include_refresh_token,
        )?;
        let response = match self.call(Message::AuthorizationRequest(request)).await? {
            Message::AuthorizationResponse(response) => response,
            other => return Err(unexpected(other)),
        };

        let grant = self
            .requester
            .handle_response(&credentials, pending, &response)?;
        info!(client_id = %self.config.client_id, "authorization granted");
        Ok(grant)
    }

    /// Fetch and open the rows of `route`
    pub async fn query(&mut self, route: &str, access_token: &str) -> ClientResult<Vec<Value>> {
        let credentials = self.require_credentials()?;
        let query = ResourceQuery::new(
            route,
            self.config.client_id.clone(),
            access_token,
            &credentials,
        )
        .map_err(ResourceError::from)?;

        let message = Message::ResourceQuery {
            route: query.route.clone(),
            query: query.to_query_string(),
        };
        match self.call(message).await? {
            Message::ResourceResponse(response) => {
                Ok(response.open_rows(&self.config.client_id, &credentials)?)
            }
            other => Err(unexpected(other)),
        }
    }

    /// Close the transport
    pub async fn close(&mut self) -> ClientResult<()> {
        Ok(self.exchange.close().await?)
    }

    fn require_credentials(&self) -> ClientResult<ClientCredentials> {
        self.storage
            .credentials()?
            .ok_or(ClientError::Handshake(HandshakeError::NeedsHandshake))
    }

    async fn call(&mut self, message: Message) -> ClientResult<Message> {
        match self.exchange.request(&message).await? {
            Message::Error(reply) => Err(ClientError::Remote(reply)),
            reply => Ok(reply),
        }
    }

    fn abort(&mut self, error: ClientError) -> ClientError {
        warn!(client_id = %self.config.client_id, error = %error, "handshake abandoned");
        self.initiator.abort();
        error
    }
}

fn unexpected(message: Message) -> ClientError {
    ClientError::UnexpectedMessage(message.kind())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::ScriptedConsent;
    use crate::config::ServerConfig;
    use crate::error::ErrorCode;
    use crate::resource::sample_views;
    use crate::server::ResourceServer;
    use crate::storage::{CredentialStore, MemoryClientStorage, MemoryStore};
    use crate::transport::{memory, serve};

    struct Fixture {
        store: Arc<MemoryStore>,
        storage: Arc<MemoryClientStorage>,
        client: ResourceClient<memory::MemoryTransport>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let mut server = ResourceServer::from_config(
            &ServerConfig::default(),
            store.clone(),
            Arc::new(ScriptedConsent::approve_all()),
        )
        .unwrap();
        for (path, view) in sample_views() {
            server = server.route(path, Arc::new(view));
        }

        let (client_end, server_end) = memory::create_pair();
        tokio::spawn(async move { serve(server_end, &server).await });

        let storage = Arc::new(MemoryClientStorage::new());
        Fixture {
            store,
            client: ResourceClient::new(ClientConfig::default(), client_end, storage.clone()),
            storage,
        }
    }

    #[tokio::test]
    async fn test_authorize_then_query() {
        let mut f = fixture();
        let scopes = ScopeRequest::parse_all(["sample_scope_1.read"]).unwrap();

        let grant = f.client.authorize(scopes).await.unwrap();
        assert!(grant.refresh_token.is_some());

        let rows = f.client.query("sample_data_1", &grant.access_token).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_second_authorize_reuses_handshake() {
        let mut f = fixture();
        let scopes = ScopeRequest::parse_all(["sample_scope_1.read"]).unwrap();
        f.client.authorize(scopes.clone()).await.unwrap();
        let before = f.storage.credentials().unwrap().unwrap();

        f.client.authorize(scopes).await.unwrap();
        let after = f.storage.credentials().unwrap().unwrap();
        assert_eq!(
            before.server_public_signing_key,
            after.server_public_signing_key
        );
    }

    #[tokio::test]
    async fn test_server_forgetting_client_triggers_new_handshake() {
        let mut f = fixture();
        f.client.handshake().await.unwrap();
        let before = f.storage.credentials().unwrap().unwrap();
        f.store.clear_client_handshake("sample_client_id").unwrap();

        let scopes = ScopeRequest::parse_all(["sample_scope_1.read"]).unwrap();
        f.client.authorize(scopes).await.unwrap();

        let after = f.storage.credentials().unwrap().unwrap();
        assert_ne!(
            before.server_public_signing_key,
            after.server_public_signing_key
        );
    }

    #[tokio::test]
    async fn test_query_before_handshake() {
        let mut f = fixture();
        assert!(matches!(
            f.client.query("sample_data_1", "token").await,
            Err(ClientError::Handshake(HandshakeError::NeedsHandshake))
        ));
    }

    #[tokio::test]
    async fn test_unknown_client_is_refused() {
        let store = Arc::new(MemoryStore::new());
        let server = ResourceServer::from_config(
            &ServerConfig::default(),
            store,
            Arc::new(ScriptedConsent::approve_all()),
        )
        .unwrap();
        let (client_end, server_end) = memory::create_pair();
        tokio::spawn(async move { serve(server_end, &server).await });

        let config = ClientConfig {
            client_id: "stranger".to_string(),
            ..ClientConfig::default()
        };
        let mut client =
            ResourceClient::new(config, client_end, Arc::new(MemoryClientStorage::new()));

        let err = client.authorize(BTreeSet::new()).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Remote(ErrorReply {
                code: ErrorCode::UnknownClient,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_during_handshake_clears_credentials() {
        let (client_end, _server_end) = memory::create_pair();
        let config = ClientConfig {
            request_timeout_ms: 100,
            ..ClientConfig::default()
        };
        let storage = Arc::new(MemoryClientStorage::new());
        let mut client = ResourceClient::new(config, client_end, storage.clone());

        let err = client.handshake().await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(TransportError::Timeout)));
        assert!(storage.credentials().unwrap().is_none());
    }
}
