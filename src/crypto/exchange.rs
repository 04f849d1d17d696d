//! X25519 encryption keys
//!
//! Encryption key pairs are the recipient side of hybrid encryption:
//! a sender agrees an ephemeral secret with the recipient's public key
//! and only the holder of the private key can recover it.

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::ZeroizeOnDrop;

use super::error::{CryptoError, CryptoResult};

/// Size of an X25519 key in bytes
pub const EXCHANGE_KEY_SIZE: usize = 32;

/// Size of a shared secret in bytes
pub const SHARED_SECRET_SIZE: usize = 32;

/// Public half of an encryption key pair
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncryptionPublicKey(pub [u8; EXCHANGE_KEY_SIZE]);

impl EncryptionPublicKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != EXCHANGE_KEY_SIZE {
            return Err(CryptoError::InvalidLength {
                field: "encryption public key",
                expected: EXCHANGE_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; EXCHANGE_KEY_SIZE];
        arr.copy_from_slice(bytes);
        Ok(EncryptionPublicKey(arr))
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; EXCHANGE_KEY_SIZE] {
        &self.0
    }

    /// Convert to hex
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for EncryptionPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptionPublicKey({}...)", &self.to_hex()[..16])
    }
}

/// Shared secret derived from key agreement
#[derive(ZeroizeOnDrop)]
pub struct SharedSecret {
    secret: [u8; SHARED_SECRET_SIZE],
}

impl SharedSecret {
    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.secret
    }
}

/// An X25519 key pair
///
/// Used both for the long-lived per-handshake encryption keys and for
/// the one-shot ephemeral keys inside hybrid encryption.
#[derive(ZeroizeOnDrop)]
pub struct EncryptionKeyPair {
    #[zeroize(skip)]
    public_key: EncryptionPublicKey,
    secret_key: [u8; EXCHANGE_KEY_SIZE],
}

impl EncryptionKeyPair {
    /// Generate a new key pair
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519Public::from(&secret);

        EncryptionKeyPair {
            public_key: EncryptionPublicKey(public.to_bytes()),
            secret_key: secret.to_bytes(),
        }
    }

    /// Get the public key to share with the peer
    pub fn public_key(&self) -> &EncryptionPublicKey {
        &self.public_key
    }

    /// Compute shared secret with a peer's public key
    pub fn diffie_hellman(&self, peer_public: &EncryptionPublicKey) -> SharedSecret {
        let secret = StaticSecret::from(self.secret_key);
        let peer = X25519Public::from(peer_public.0);
        let shared = secret.diffie_hellman(&peer);

        SharedSecret {
            secret: shared.to_bytes(),
        }
    }

    /// Export the private key
    ///
    /// The public key is recomputed on import, so the secret alone is the
    /// portable form.
    pub fn to_bytes(&self) -> [u8; EXCHANGE_KEY_SIZE] {
        self.secret_key
    }

    /// Import a private key exported with [`EncryptionKeyPair::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != EXCHANGE_KEY_SIZE {
            return Err(CryptoError::InvalidLength {
                field: "encryption key pair",
                expected: EXCHANGE_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut secret_key = [0u8; EXCHANGE_KEY_SIZE];
        secret_key.copy_from_slice(bytes);

        let secret = StaticSecret::from(secret_key);
        let public = X25519Public::from(&secret);

        Ok(EncryptionKeyPair {
            public_key: EncryptionPublicKey(public.to_bytes()),
            secret_key,
        })
    }
}

impl Clone for EncryptionKeyPair {
    fn clone(&self) -> Self {
        EncryptionKeyPair {
            public_key: self.public_key,
            secret_key: self.secret_key,
        }
    }
}

impl std::fmt::Debug for EncryptionKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}
