//! # resource-auth
//!
//! Mutual handshake and consent-based token authorization between a
//! client app and a resource server on the same device.
//!
//! ## Features
//!
//! - **Mutual handshake** establishing fresh signing and encryption keys on both sides
//! - **Sealed authorization** requests and responses, encrypted then signed
//! - **Consent** collected through a pluggable provider, recorded per client
//! - **Protected resources** gated on approved scopes, rows sealed to the client
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use resource_auth::{
//!     authorization::ScriptedConsent,
//!     client::ResourceClient,
//!     config::{ClientConfig, ServerConfig},
//!     resource::sample_views,
//!     scope::ScopeRequest,
//!     server::ResourceServer,
//!     storage::{MemoryClientStorage, MemoryStore},
//!     transport::{memory, serve},
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = ResourceServer::from_config(
//!     &ServerConfig::default(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(ScriptedConsent::approve_all()),
//! )?;
//! for (path, view) in sample_views() {
//!     server = server.route(path, Arc::new(view));
//! }
//!
//! let (client_end, server_end) = memory::create_pair();
//! tokio::spawn(async move { serve(server_end, &server).await });
//!
//! let mut client = ResourceClient::new(
//!     ClientConfig::default(),
//!     client_end,
//!     Arc::new(MemoryClientStorage::new()),
//! );
//! let grant = client
//!     .authorize(ScopeRequest::parse_all(["sample_scope_1.read"])?)
//!     .await?;
//! let rows = client.query("sample_data_1", &grant.access_token).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐                 ┌──────────────────────────┐
//! │    ResourceClient    │                 │      ResourceServer      │
//! │ initiator, requester │                 │ responder, authorization,│
//! │                      │                 │ resource provider        │
//! └──────────┬───────────┘                 └────────────┬─────────────┘
//!            │            ┌───────────────┐             │
//!            └───────────▶│   TRANSPORT   │◀────────────┘
//!                         │ Message codec │
//!                         └───────────────┘
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  STORAGE  ClientStorage | SessionStore | CredentialStore | Registry │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  CRYPTO   Ed25519 | X25519 | ChaCha20-Poly1305 | BLAKE3             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod authorization;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handshake;
pub mod resource;
pub mod scope;
pub mod server;
pub mod storage;
pub mod token;
pub mod transport;

// Re-export main types at crate root
pub use client::{ClientError, ClientResult, ResourceClient};
pub use config::{ClientConfig, ConfigError, ServerConfig};
pub use crypto::{CryptoError, CryptoResult, SealedPayload};
pub use error::{ErrorCode, ErrorReply};
pub use scope::{check_permission, ScopeAccess, ScopeRequest};
pub use server::ResourceServer;
