//! Hybrid public-key encryption bound to a context
//!
//! ```text
//! ephemeral = X25519 key pair (one per message)
//! shared    = X25519(ephemeral.secret, recipient.public)
//! key       = BLAKE3-derive(DOMAIN, shared || ephemeral.public || recipient.public)
//! output    = ephemeral.public(32) || nonce(12) || ChaCha20-Poly1305(key, plaintext, aad = context)
//! ```
//!
//! The context info is authenticated but not transmitted. Opening with a
//! context other than the one used to seal fails.

use zeroize::Zeroizing;

use super::cipher::{Cipher, NONCE_SIZE, TAG_SIZE};
use super::error::{CryptoError, CryptoResult};
use super::exchange::{EncryptionKeyPair, EncryptionPublicKey, EXCHANGE_KEY_SIZE};
use super::hash::Hash;

const DOMAIN: &str = "resource-auth 2024 hybrid encryption v1";

/// Bytes added to every plaintext by [`encrypt`]
pub const OVERHEAD: usize = EXCHANGE_KEY_SIZE + NONCE_SIZE + TAG_SIZE;

/// Encrypt `plaintext` to `recipient`, binding `context_info`
pub fn encrypt(
    recipient: &EncryptionPublicKey,
    plaintext: &[u8],
    context_info: &[u8],
) -> CryptoResult<Vec<u8>> {
    let ephemeral = EncryptionKeyPair::generate();
    let shared = ephemeral.diffie_hellman(recipient);

    let key = Zeroizing::new(Hash::derive_key(
        DOMAIN,
        &[
            shared.as_bytes(),
            ephemeral.public_key().as_bytes(),
            recipient.as_bytes(),
        ],
    ));
    let sealed = Cipher::new(&key).seal(plaintext, context_info)?;

    let mut out = Vec::with_capacity(EXCHANGE_KEY_SIZE + sealed.len());
    out.extend_from_slice(ephemeral.public_key().as_bytes());
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Decrypt a ciphertext produced by [`encrypt`] with the recipient's key pair
pub fn decrypt(
    recipient: &EncryptionKeyPair,
    ciphertext: &[u8],
    context_info: &[u8],
) -> CryptoResult<Vec<u8>> {
    if ciphertext.len() < OVERHEAD {
        return Err(CryptoError::DecryptionFailed);
    }

    let (ephemeral_bytes, sealed) = ciphertext.split_at(EXCHANGE_KEY_SIZE);
    let ephemeral = EncryptionPublicKey::from_bytes(ephemeral_bytes)?;
    let shared = recipient.diffie_hellman(&ephemeral);

    let key = Zeroizing::new(Hash::derive_key(
        DOMAIN,
        &[
            shared.as_bytes(),
            ephemeral.as_bytes(),
            recipient.public_key().as_bytes(),
        ],
    ));
    Cipher::new(&key).open(sealed, context_info)
}
