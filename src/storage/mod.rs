//! Session and credential storage
//!
//! The protocol components only see these traits. Storage handles are
//! constructed by the composing application and passed in explicitly;
//! there is no process-wide store.
//!
//! Clearing is per client and whole-record: a reader sees either the old
//! credential set or nothing, never a mix of two handshake generations.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::scope::ScopeRequest;

pub mod memory;
pub mod records;

pub use memory::{MemoryClientStorage, MemoryStore, StaticClientRegistry};
pub use records::{Client, ClientCredentials, ClientHandshake, HandshakeSession};

/// Storage errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A lock was poisoned by a panicking writer
    #[error("Storage lock poisoned: {0}")]
    LockPoisoned(&'static str),

    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Pending handshakes on the server, one per client
pub trait SessionStore: Send + Sync {
    /// Store a pending session, replacing any other for the same client
    fn store_session(&self, session: HandshakeSession) -> StorageResult<()>;

    /// Pending session for `(client_id, state)`, if that is the current one
    fn session(&self, client_id: &str, state: u64) -> StorageResult<Option<HandshakeSession>>;

    /// State nonce of the pending session for `client_id`
    fn pending_state(&self, client_id: &str) -> StorageResult<Option<u64>>;

    /// Drop any pending session for `client_id`
    fn clear(&self, client_id: &str) -> StorageResult<()>;
}

/// Durable per-client records on the server
pub trait CredentialStore: Send + Sync {
    /// Current handshake credentials for `client_id`
    fn client_handshake(&self, client_id: &str) -> StorageResult<Option<ClientHandshake>>;

    /// Register credentials, superseding any previous set in one write
    fn register_client_handshake(&self, handshake: ClientHandshake) -> StorageResult<()>;

    /// Forget the handshake credentials for `client_id`
    fn clear_client_handshake(&self, client_id: &str) -> StorageResult<()>;

    /// Scopes the user approved for `client_id`
    fn approved_scopes(&self, client_id: &str) -> StorageResult<Option<BTreeSet<ScopeRequest>>>;

    /// Replace the approved scopes for `client_id`
    fn set_approved_scopes(
        &self,
        client_id: &str,
        scopes: BTreeSet<ScopeRequest>,
    ) -> StorageResult<()>;

    /// Forget the approved scopes for `client_id`
    fn clear_approved_scopes(&self, client_id: &str) -> StorageResult<()>;
}

/// Known clients
pub trait ClientRegistry: Send + Sync {
    /// Look up a client by id
    fn lookup_client(&self, client_id: &str) -> StorageResult<Option<Client>>;
}

/// Durable credentials on the client side
pub trait ClientStorage: Send + Sync {
    /// Stored credentials, if a handshake has completed
    fn credentials(&self) -> StorageResult<Option<ClientCredentials>>;

    /// Store credentials from a completed handshake
    fn store_credentials(&self, credentials: ClientCredentials) -> StorageResult<()>;

    /// Forget all credentials
    fn clear(&self) -> StorageResult<()>;
}
