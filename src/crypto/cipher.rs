//! ChaCha20-Poly1305 under a single derived key
//!
//! The symmetric half of hybrid encryption. Every call to [`Cipher::seal`]
//! draws a fresh random nonce and prepends it:
//!
//! ```text
//! nonce(12) || ciphertext || tag(16)
//! ```
//!
//! The context passed to `seal` is authenticated as associated data and
//! must be passed again to `open`.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};

use super::error::{CryptoError, CryptoResult};
use super::random_bytes;

/// Key size in bytes
pub const KEY_SIZE: usize = 32;

/// Nonce size in bytes
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size in bytes
pub const TAG_SIZE: usize = 16;

/// An AEAD keyed for one hybrid message
pub struct Cipher {
    aead: ChaCha20Poly1305,
}

impl Cipher {
    /// Key the cipher
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Cipher {
            aead: ChaCha20Poly1305::new(key.into()),
        }
    }

    /// Encrypt `plaintext`, authenticating `context`
    pub fn seal(&self, plaintext: &[u8], context: &[u8]) -> CryptoResult<Vec<u8>> {
        let nonce = random_bytes::<NONCE_SIZE>();
        let body = self
            .aead
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: context,
                },
            )
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + body.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&body);
        Ok(sealed)
    }

    /// Decrypt the output of [`Cipher::seal`] under the same `context`
    pub fn open(&self, sealed: &[u8], context: &[u8]) -> CryptoResult<Vec<u8>> {
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }
        let (nonce, body) = sealed.split_at(NONCE_SIZE);

        self.aead
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: body,
                    aad: context,
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}
