//! The resource server as one message handler

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::authorization::{AuthorizationServer, ConsentProvider};
use crate::config::{ConfigError, ServerConfig};
use crate::error::{ErrorCode, ErrorReply};
use crate::handshake::HandshakeResponder;
use crate::resource::{ApiView, ResourceProvider, ResourceQuery, ResourceResponse};
use crate::storage::{
    ClientRegistry, CredentialStore, MemoryStore, SessionStore, StaticClientRegistry,
};
use crate::token::TokenIssuer;
use crate::transport::{Message, MessageHandler};

/// Handshake, authorization and resources behind one entry point
pub struct ResourceServer {
    handshake: HandshakeResponder,
    authorization: AuthorizationServer,
    resources: ResourceProvider,
}

impl ResourceServer {
    /// Assemble a server over shared storage and collaborators
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        credentials: Arc<dyn CredentialStore>,
        registry: Arc<dyn ClientRegistry>,
        consent: Arc<dyn ConsentProvider>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        ResourceServer {
            handshake: HandshakeResponder::new(sessions, credentials.clone()),
            authorization: AuthorizationServer::new(
                credentials.clone(),
                registry.clone(),
                consent,
                tokens.clone(),
            ),
            resources: ResourceProvider::new(credentials, registry, tokens),
        }
    }

    /// Build an in-memory server from `config`
    pub fn from_config(
        config: &ServerConfig,
        store: Arc<MemoryStore>,
        consent: Arc<dyn ConsentProvider>,
    ) -> Result<Self, ConfigError> {
        let tokens = Arc::new(config.token_manager()?);
        let registry = Arc::new(StaticClientRegistry::new(config.clients.iter().cloned()));
        let mut server = Self::new(store.clone(), store, registry, consent, tokens);
        server.authorization = server
            .authorization
            .with_lifetimes(config.access_token_lifetime(), config.refresh_token_lifetime());
        Ok(server)
    }

    /// Serve `view` at `path`
    pub fn route(mut self, path: impl Into<String>, view: Arc<dyn ApiView>) -> Self {
        self.resources = self.resources.route(path, view);
        self
    }

    /// Answer one request
    ///
    /// Failures become [`Message::Error`]; a message that is itself a
    /// response is answered with `malformed_request`.
    pub async fn handle(&self, message: Message) -> Message {
        let kind = message.kind();
        debug!(kind, "handling request");

        let reply = match message {
            Message::BeginRequest(request) => self
                .handshake
                .begin(&request)
                .map(Message::BeginResponse)
                .map_err(|e| (e.code(), e.to_string())),
            Message::CompleteRequest(request) => self
                .handshake
                .complete(&request)
                .map(Message::CompleteResponse)
                .map_err(|e| (e.code(), e.to_string())),
            Message::VerifyRequest(proof) => self
                .handshake
                .verify(&proof)
                .map(Message::VerifyResponse)
                .map_err(|e| (e.code(), e.to_string())),
            Message::AuthorizationRequest(request) => self
                .authorization
                .authorize(&request)
                .await
                .map(Message::AuthorizationResponse)
                .map_err(|e| (e.code(), e.to_string())),
            Message::ResourceQuery { route, query } => {
                // Resource failures travel as a status, not an error reply
                let response = match ResourceQuery::from_query_string(route, &query) {
                    Ok(query) => self.resources.query(&query),
                    Err(e) => ResourceResponse::status(e.status()),
                };
                Ok(Message::ResourceResponse(response))
            }
            _ => Err((ErrorCode::MalformedRequest, format!("unexpected {kind}"))),
        };

        reply.unwrap_or_else(|(code, message)| {
            warn!(kind, %code, "request failed");
            Message::Error(ErrorReply::new(code, message))
        })
    }
}

#[async_trait]
impl MessageHandler for ResourceServer {
    async fn handle(&self, message: Message) -> Message {
        ResourceServer::handle(self, message).await
    }
}
