//! Cryptographic primitives
//!
//! - `signing`: Ed25519 key pairs for signing challenges and envelopes
//! - `exchange`: X25519 key pairs that receive hybrid-encrypted data
//! - `cipher`: ChaCha20-Poly1305 AEAD encryption
//! - `hash`: BLAKE3 key derivation and constant-time comparison
//! - `hybrid`: context-bound public-key encryption built from the above
//! - `sealed`: encrypt-then-sign envelopes for structured payloads

pub mod cipher;
pub mod error;
pub mod exchange;
pub mod hash;
pub mod hybrid;
pub mod sealed;
pub mod signing;

pub use cipher::Cipher;
pub use error::{CryptoError, CryptoResult};
pub use exchange::{EncryptionKeyPair, EncryptionPublicKey, SharedSecret};
pub use hash::{constant_time_eq, Hash};
pub use sealed::SealedPayload;
pub use signing::{SigningKeyPair, SigningPublicKey};

use rand::RngCore;

/// Size of handshake challenges and VERIFY data
pub const CHALLENGE_SIZE: usize = 1024;

/// Size of generated context info
pub const CONTEXT_INFO_SIZE: usize = 64;

/// Generate cryptographically secure random bytes
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Generate `len` cryptographically secure random bytes
pub fn random_vec(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Fresh single-use correlation nonce
pub fn random_state() -> u64 {
    rand::thread_rng().next_u64()
}

/// Fresh 1024-byte challenge
pub fn random_challenge() -> Vec<u8> {
    random_vec(CHALLENGE_SIZE)
}

/// Fresh 64-byte context info
pub fn random_context_info() -> Vec<u8> {
    random_vec(CONTEXT_INFO_SIZE)
}

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_sign_then_encrypt_flow() {
        // Sender signs, recipient decrypts and verifies
        let sender = SigningKeyPair::generate();
        let recipient = EncryptionKeyPair::generate();

        let data = random_challenge();
        let signature = sender.sign(&data);
        let context = random_context_info();
        let sealed = hybrid::encrypt(recipient.public_key(), &data, &context).unwrap();

        let opened = hybrid::decrypt(&recipient, &sealed, &context).unwrap();
        assert!(constant_time_eq(&opened, &data));
        assert!(sender.public_key().verify(&opened, &signature).is_ok());
    }

    #[test]
    fn test_random_sizes() {
        assert_eq!(random_challenge().len(), CHALLENGE_SIZE);
        assert_eq!(random_context_info().len(), CONTEXT_INFO_SIZE);
        assert_ne!(random_bytes::<16>(), random_bytes::<16>());
    }
}
