//! In-memory storage backends
//!
//! Every map is keyed by client id and guarded by its own `RwLock`, so a
//! whole record is replaced or removed in a single write.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use super::records::{Client, ClientCredentials, ClientHandshake, HandshakeSession};
use super::{
    ClientRegistry, ClientStorage, CredentialStore, SessionStore, StorageError, StorageResult,
};
use crate::scope::ScopeRequest;

/// Server-side store for pending sessions, handshakes and approved scopes
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, HandshakeSession>>,
    handshakes: RwLock<HashMap<String, ClientHandshake>>,
    approved: RwLock<HashMap<String, BTreeSet<ScopeRequest>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T, what: &'static str) -> StorageError {
    StorageError::LockPoisoned(what)
}

impl SessionStore for MemoryStore {
    fn store_session(&self, session: HandshakeSession) -> StorageResult<()> {
        let mut sessions = self.sessions.write().map_err(|e| poisoned(e, "sessions"))?;
        sessions.insert(session.client_id.clone(), session);
        Ok(())
    }

    fn session(&self, client_id: &str, state: u64) -> StorageResult<Option<HandshakeSession>> {
        let sessions = self.sessions.read().map_err(|e| poisoned(e, "sessions"))?;
        Ok(sessions
            .get(client_id)
            .filter(|session| session.state == state)
            .cloned())
    }

    fn pending_state(&self, client_id: &str) -> StorageResult<Option<u64>> {
        let sessions = self.sessions.read().map_err(|e| poisoned(e, "sessions"))?;
        Ok(sessions.get(client_id).map(|session| session.state))
    }

    fn clear(&self, client_id: &str) -> StorageResult<()> {
        let mut sessions = self.sessions.write().map_err(|e| poisoned(e, "sessions"))?;
        sessions.remove(client_id);
        Ok(())
    }
}

impl CredentialStore for MemoryStore {
    fn client_handshake(&self, client_id: &str) -> StorageResult<Option<ClientHandshake>> {
        let handshakes = self.handshakes.read().map_err(|e| poisoned(e, "handshakes"))?;
        Ok(handshakes.get(client_id).cloned())
    }

    fn register_client_handshake(&self, handshake: ClientHandshake) -> StorageResult<()> {
        let mut handshakes = self.handshakes.write().map_err(|e| poisoned(e, "handshakes"))?;
        handshakes.insert(handshake.client_id.clone(), handshake);
        Ok(())
    }

    fn clear_client_handshake(&self, client_id: &str) -> StorageResult<()> {
        let mut handshakes = self.handshakes.write().map_err(|e| poisoned(e, "handshakes"))?;
        handshakes.remove(client_id);
        Ok(())
    }

    fn approved_scopes(&self, client_id: &str) -> StorageResult<Option<BTreeSet<ScopeRequest>>> {
        let approved = self.approved.read().map_err(|e| poisoned(e, "approved scopes"))?;
        Ok(approved.get(client_id).cloned())
    }

    fn set_approved_scopes(
        &self,
        client_id: &str,
        scopes: BTreeSet<ScopeRequest>,
    ) -> StorageResult<()> {
        let mut approved = self.approved.write().map_err(|e| poisoned(e, "approved scopes"))?;
        approved.insert(client_id.to_string(), scopes);
        Ok(())
    }

    fn clear_approved_scopes(&self, client_id: &str) -> StorageResult<()> {
        let mut approved = self.approved.write().map_err(|e| poisoned(e, "approved scopes"))?;
        approved.remove(client_id);
        Ok(())
    }
}

/// Fixed set of known clients
#[derive(Debug, Clone, Default)]
pub struct StaticClientRegistry {
    clients: HashMap<String, Client>,
}

impl StaticClientRegistry {
    /// Registry containing `clients`
    pub fn new(clients: impl IntoIterator<Item = Client>) -> Self {
        StaticClientRegistry {
            clients: clients
                .into_iter()
                .map(|client| (client.client_id.clone(), client))
                .collect(),
        }
    }
}

impl ClientRegistry for StaticClientRegistry {
    fn lookup_client(&self, client_id: &str) -> StorageResult<Option<Client>> {
        Ok(self.clients.get(client_id).cloned())
    }
}

/// Client-side credential store
#[derive(Debug, Default)]
pub struct MemoryClientStorage {
    credentials: RwLock<Option<ClientCredentials>>,
}

impl MemoryClientStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl ClientStorage for MemoryClientStorage {
    fn credentials(&self) -> StorageResult<Option<ClientCredentials>> {
        let credentials = self.credentials.read().map_err(|e| poisoned(e, "credentials"))?;
        Ok(credentials.clone())
    }

    fn store_credentials(&self, credentials: ClientCredentials) -> StorageResult<()> {
        let mut slot = self.credentials.write().map_err(|e| poisoned(e, "credentials"))?;
        *slot = Some(credentials);
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        let mut slot = self.credentials.write().map_err(|e| poisoned(e, "credentials"))?;
        *slot = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{EncryptionKeyPair, SigningKeyPair};

    fn session(client_id: &str, state: u64) -> HandshakeSession {
        HandshakeSession {
            client_id: client_id.to_string(),
            state,
            client_public_signing_key: *SigningKeyPair::generate().public_key(),
            client_public_encryption_key: *EncryptionKeyPair::generate().public_key(),
            server_signing_keys: SigningKeyPair::generate(),
            server_encryption_keys: EncryptionKeyPair::generate(),
            m2: vec![2u8; 16],
        }
    }

    #[test]
    fn test_session_keyed_by_state() {
        let store = MemoryStore::new();
        store.store_session(session("client", 7)).unwrap();

        assert!(store.session("client", 7).unwrap().is_some());
        assert!(store.session("client", 8).unwrap().is_none());
        assert!(store.session("other", 7).unwrap().is_none());
        assert_eq!(store.pending_state("client").unwrap(), Some(7));
    }

    #[test]
    fn test_new_session_replaces_pending_one() {
        let store = MemoryStore::new();
        store.store_session(session("client", 1)).unwrap();
        store.store_session(session("client", 2)).unwrap();

        assert!(store.session("client", 1).unwrap().is_none());
        assert_eq!(store.pending_state("client").unwrap(), Some(2));

        SessionStore::clear(&store, "client").unwrap();
        assert_eq!(store.pending_state("client").unwrap(), None);
    }

    #[test]
    fn test_register_supersedes_previous_handshake() {
        let store = MemoryStore::new();
        let first = session("client", 1).into_client_handshake();
        let second = session("client", 2).into_client_handshake();
        let second_key = second.client_public_signing_key;

        store.register_client_handshake(first).unwrap();
        store.register_client_handshake(second).unwrap();

        let current = store.client_handshake("client").unwrap().unwrap();
        assert_eq!(current.client_public_signing_key, second_key);

        store.clear_client_handshake("client").unwrap();
        assert!(store.client_handshake("client").unwrap().is_none());
    }

    #[test]
    fn test_approved_scopes_independent_of_handshake() {
        let store = MemoryStore::new();
        let scopes = ScopeRequest::parse_all(["a.read"]).unwrap();

        store.register_client_handshake(session("client", 1).into_client_handshake()).unwrap();
        store.set_approved_scopes("client", scopes.clone()).unwrap();

        store.clear_approved_scopes("client").unwrap();
        assert!(store.approved_scopes("client").unwrap().is_none());
        assert!(store.client_handshake("client").unwrap().is_some());

        store.set_approved_scopes("client", scopes.clone()).unwrap();
        store.clear_client_handshake("client").unwrap();
        assert_eq!(store.approved_scopes("client").unwrap(), Some(scopes));
    }

    #[test]
    fn test_static_registry_lookup() {
        let registry = StaticClientRegistry::new([Client::sample()]);

        let client = registry.lookup_client("sample_client_id").unwrap().unwrap();
        assert_eq!(client.description, "Sample Client App");
        assert_eq!(client.allowed_scopes.len(), 4);
        assert!(registry.lookup_client("unknown").unwrap().is_none());
    }

    #[test]
    fn test_client_storage_clear() {
        let storage = MemoryClientStorage::new();
        assert!(storage.credentials().unwrap().is_none());

        storage
            .store_credentials(ClientCredentials {
                client_signing_keys: SigningKeyPair::generate(),
                client_encryption_keys: EncryptionKeyPair::generate(),
                server_public_signing_key: *SigningKeyPair::generate().public_key(),
                server_public_encryption_key: *EncryptionKeyPair::generate().public_key(),
            })
            .unwrap();
        assert!(storage.credentials().unwrap().is_some());

        storage.clear().unwrap();
        assert!(storage.credentials().unwrap().is_none());
    }
}
