//! Handshake error types

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::error::ErrorCode;
use crate::storage::StorageError;

/// Errors raised while establishing or checking a handshake
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Signature or decryption check failed
    #[error("Cryptographic check failed: {0}")]
    Crypto(#[from] CryptoError),

    /// Storage backend failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Request does not match stored state or is structurally wrong
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Response from the server is structurally wrong
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Echoed client id or state nonce does not match, or the call came
    /// in the wrong phase
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A decrypted challenge differs from the one sent
    #[error("Challenge mismatch")]
    ChallengeMismatch,

    /// No completed handshake for this client
    #[error("Needs handshake")]
    NeedsHandshake,
}

impl HandshakeError {
    /// Code reported to the peer
    pub fn code(&self) -> ErrorCode {
        match self {
            // a wrong challenge is reported like a failed decryption
            HandshakeError::Crypto(_) | HandshakeError::ChallengeMismatch => ErrorCode::Rejected,
            HandshakeError::Storage(_) => ErrorCode::Internal,
            HandshakeError::MalformedRequest(_) | HandshakeError::NeedsHandshake => {
                ErrorCode::MalformedRequest
            }
            HandshakeError::MalformedResponse(_) => ErrorCode::MalformedResponse,
            HandshakeError::InvalidState(_) => ErrorCode::InvalidState,
        }
    }
}

/// Result type for handshake operations
pub type HandshakeResult<T> = Result<T, HandshakeError>;
