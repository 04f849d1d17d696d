//! Records held by the storage backends

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::crypto::{EncryptionKeyPair, EncryptionPublicKey, SigningKeyPair, SigningPublicKey};
use crate::scope::{sample_allowed_scopes, AllowedScope};

/// Server-side state of a handshake between BEGIN and COMPLETE
///
/// Keyed by `(client_id, state)`. Never outlives the COMPLETE that
/// consumes it.
#[derive(Debug, Clone)]
pub struct HandshakeSession {
    /// Client the handshake belongs to
    pub client_id: String,
    /// Nonce chosen by the client for this attempt
    pub state: u64,
    /// Client's claimed signing key
    pub client_public_signing_key: SigningPublicKey,
    /// Client's claimed encryption key
    pub client_public_encryption_key: EncryptionPublicKey,
    /// Server signing keys generated for this client
    pub server_signing_keys: SigningKeyPair,
    /// Server encryption keys generated for this client
    pub server_encryption_keys: EncryptionKeyPair,
    /// Challenge the client must echo back encrypted
    pub m2: Vec<u8>,
}

impl HandshakeSession {
    /// Promote to the durable record once COMPLETE has been checked
    pub fn into_client_handshake(self) -> ClientHandshake {
        ClientHandshake {
            client_id: self.client_id,
            client_public_signing_key: self.client_public_signing_key,
            client_public_encryption_key: self.client_public_encryption_key,
            server_signing_keys: self.server_signing_keys,
            server_encryption_keys: self.server_encryption_keys,
        }
    }
}

/// Durable server-side credentials for one client
#[derive(Debug, Clone)]
pub struct ClientHandshake {
    /// Client the credentials belong to
    pub client_id: String,
    /// Client's signing key
    pub client_public_signing_key: SigningPublicKey,
    /// Client's encryption key
    pub client_public_encryption_key: EncryptionPublicKey,
    /// Server signing keys for this client
    pub server_signing_keys: SigningKeyPair,
    /// Server encryption keys for this client
    pub server_encryption_keys: EncryptionKeyPair,
}

/// Durable client-side credentials
///
/// The mirror image of the server's [`ClientHandshake`].
#[derive(Debug, Clone)]
pub struct ClientCredentials {
    /// Client signing keys
    pub client_signing_keys: SigningKeyPair,
    /// Client encryption keys
    pub client_encryption_keys: EncryptionKeyPair,
    /// Server's signing key
    pub server_public_signing_key: SigningPublicKey,
    /// Server's encryption key
    pub server_public_encryption_key: EncryptionPublicKey,
}

/// A client the server knows about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Externally assigned identifier
    pub client_id: String,
    /// Shown on the consent screen
    pub description: String,
    /// Scopes the client may ever be granted
    pub allowed_scopes: BTreeSet<AllowedScope>,
}

impl Client {
    /// The sample client with the sample scopes
    pub fn sample() -> Self {
        Client {
            client_id: "sample_client_id".to_string(),
            description: "Sample Client App".to_string(),
            allowed_scopes: sample_allowed_scopes(),
        }
    }
}
