//! Cryptographic error types

use thiserror::Error;

/// Errors from key handling, signing and hybrid encryption
///
/// None of these say *why* a check failed beyond the category. Peers only
/// ever see them as the generic `rejected` code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A key or signature has the wrong number of bytes
    #[error("Invalid {field} length: expected {expected}, got {actual}")]
    InvalidLength {
        /// What was being decoded
        field: &'static str,
        /// Required length in bytes
        expected: usize,
        /// Length received
        actual: usize,
    },

    /// Bytes are not a point on the curve
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// An imported key pair's public half does not belong to its secret
    #[error("Key pair halves do not match")]
    KeyPairMismatch,

    /// Signature does not verify under the expected key
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// The AEAD refused to encrypt
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Wrong key, wrong context, or tampered ciphertext
    #[error("Decryption failed")]
    DecryptionFailed,
}

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;
