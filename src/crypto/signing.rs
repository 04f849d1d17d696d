//! Ed25519 signing keys
//!
//! Every party generates a fresh signing key pair per handshake. The
//! public half travels to the peer; the private half never leaves the
//! party that generated it.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::{CryptoError, CryptoResult};

/// Size of a public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of a secret key in bytes
pub const SECRET_KEY_SIZE: usize = 32;

/// Size of a signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Public half of a signing key pair
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SigningPublicKey(pub [u8; PUBLIC_KEY_SIZE]);

impl SigningPublicKey {
    /// Create from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidLength {
                field: "signing public key",
                expected: PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; PUBLIC_KEY_SIZE];
        arr.copy_from_slice(bytes);

        // Reject points that do not decode
        VerifyingKey::from_bytes(&arr).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(SigningPublicKey(arr))
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Convert to hex string for display
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a signature over `message`
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;

        let sig = Signature::from_slice(signature).map_err(|_| {
            CryptoError::InvalidLength {
                field: "signature",
                expected: SIGNATURE_SIZE,
                actual: signature.len(),
            }
        })?;

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

impl std::fmt::Debug for SigningPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningPublicKey({}...)", &self.to_hex()[..16])
    }
}

/// A signing key pair
///
/// The secret key is automatically zeroized when dropped.
#[derive(ZeroizeOnDrop)]
pub struct SigningKeyPair {
    #[zeroize(skip)]
    public_key: SigningPublicKey,
    secret_key: [u8; SECRET_KEY_SIZE],
}

impl SigningKeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();

        SigningKeyPair {
            public_key: SigningPublicKey(verifying_key.to_bytes()),
            secret_key: signing_key.to_bytes(),
        }
    }

    /// Get the public key
    pub fn public_key(&self) -> &SigningPublicKey {
        &self.public_key
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signing_key = SigningKey::from_bytes(&self.secret_key);
        signing_key.sign(message).to_bytes().to_vec()
    }

    /// Export to the portable form `secret || public`
    ///
    /// This exposes the secret key. Only storage backends should call it.
    pub fn to_bytes(&self) -> [u8; SECRET_KEY_SIZE + PUBLIC_KEY_SIZE] {
        let mut bytes = [0u8; SECRET_KEY_SIZE + PUBLIC_KEY_SIZE];
        bytes[..SECRET_KEY_SIZE].copy_from_slice(&self.secret_key);
        bytes[SECRET_KEY_SIZE..].copy_from_slice(&self.public_key.0);
        bytes
    }

    /// Import from the portable form produced by [`SigningKeyPair::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != SECRET_KEY_SIZE + PUBLIC_KEY_SIZE {
            return Err(CryptoError::InvalidLength {
                field: "signing key pair",
                expected: SECRET_KEY_SIZE + PUBLIC_KEY_SIZE,
                actual: bytes.len(),
            });
        }

        let mut secret_key = [0u8; SECRET_KEY_SIZE];
        secret_key.copy_from_slice(&bytes[..SECRET_KEY_SIZE]);

        let mut public_key = [0u8; PUBLIC_KEY_SIZE];
        public_key.copy_from_slice(&bytes[SECRET_KEY_SIZE..]);

        let derived_public = SigningKey::from_bytes(&secret_key).verifying_key().to_bytes();
        if derived_public != public_key {
            secret_key.zeroize();
            return Err(CryptoError::KeyPairMismatch);
        }

        Ok(SigningKeyPair {
            public_key: SigningPublicKey(public_key),
            secret_key,
        })
    }
}

impl Clone for SigningKeyPair {
    fn clone(&self) -> Self {
        SigningKeyPair {
            public_key: self.public_key,
            secret_key: self.secret_key,
        }
    }
}

impl std::fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_pairs_are_unique() {
        let a = SigningKeyPair::generate();
        let b = SigningKeyPair::generate();
        assert_ne!(a.public_key().0, b.public_key().0);
    }

    #[test]
    fn test_sign_verify() {
        let keys = SigningKeyPair::generate();
        let message = b"m1 challenge bytes";

        let signature = keys.sign(message);
        assert_eq!(signature.len(), SIGNATURE_SIZE);
        assert!(keys.public_key().verify(message, &signature).is_ok());
    }

    #[test]
    fn test_wrong_message_fails() {
        let keys = SigningKeyPair::generate();
        let signature = keys.sign(b"original");

        assert_eq!(
            keys.public_key().verify(b"tampered", &signature),
            Err(CryptoError::SignatureVerificationFailed)
        );
    }

    #[test]
    fn test_wrong_key_fails() {
        let signer = SigningKeyPair::generate();
        let other = SigningKeyPair::generate();
        let signature = signer.sign(b"data");

        assert!(other.public_key().verify(b"data", &signature).is_err());
    }

    #[test]
    fn test_flipped_signature_bit_fails() {
        let keys = SigningKeyPair::generate();
        let mut signature = keys.sign(b"data");
        signature[10] ^= 0x01;

        assert!(keys.public_key().verify(b"data", &signature).is_err());
    }

    #[test]
    fn test_short_signature_rejected() {
        let keys = SigningKeyPair::generate();
        let result = keys.public_key().verify(b"data", &[0u8; 12]);

        assert!(matches!(
            result,
            Err(CryptoError::InvalidLength {
                field: "signature",
                actual: 12,
                ..
            })
        ));
    }

    #[test]
    fn test_export_import() {
        let keys = SigningKeyPair::generate();
        let signature = keys.sign(b"persisted");

        let restored = SigningKeyPair::from_bytes(&keys.to_bytes()).unwrap();
        assert_eq!(keys.public_key(), restored.public_key());
        assert!(restored.public_key().verify(b"persisted", &signature).is_ok());
    }

    #[test]
    fn test_import_rejects_mismatched_halves() {
        let a = SigningKeyPair::generate();
        let b = SigningKeyPair::generate();

        let mut bytes = a.to_bytes();
        bytes[SECRET_KEY_SIZE..].copy_from_slice(b.public_key().as_bytes());

        assert_eq!(
            SigningKeyPair::from_bytes(&bytes).unwrap_err(),
            CryptoError::KeyPairMismatch
        );
    }

    #[test]
    fn test_public_key_from_bytes() {
        let keys = SigningKeyPair::generate();
        let restored = SigningPublicKey::from_bytes(keys.public_key().as_bytes()).unwrap();
        assert_eq!(&restored, keys.public_key());

        assert!(SigningPublicKey::from_bytes(&[1u8; 31]).is_err());
    }
}
