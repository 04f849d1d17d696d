//! Authorization error types

use thiserror::Error;

use crate::crypto::CryptoError;
use crate::error::ErrorCode;
use crate::storage::StorageError;
use crate::token::TokenError;

/// Errors raised by the authorization exchange
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// Signature or decryption check failed
    #[error("Cryptographic check failed: {0}")]
    Crypto(#[from] CryptoError),

    /// Storage backend failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Tokens could not be issued
    #[error(transparent)]
    Token(#[from] TokenError),

    /// Request is structurally wrong or disagrees with its envelope
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Response is structurally wrong or answers another request
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// No such client
    #[error("Unknown client: {0}")]
    UnknownClient(String),

    /// The consent collaborator reported an error
    #[error("Consent failed: {0}")]
    ConsentFailed(String),
}

impl AuthorizationError {
    /// Code reported to the peer
    pub fn code(&self) -> ErrorCode {
        match self {
            AuthorizationError::Crypto(_) => ErrorCode::Rejected,
            AuthorizationError::Storage(_) => ErrorCode::Internal,
            AuthorizationError::Token(_) => ErrorCode::TokenError,
            AuthorizationError::MalformedRequest(_) => ErrorCode::MalformedRequest,
            AuthorizationError::MalformedResponse(_) => ErrorCode::MalformedResponse,
            AuthorizationError::UnknownClient(_) => ErrorCode::UnknownClient,
            AuthorizationError::ConsentFailed(_) => ErrorCode::AuthorizationFailed,
        }
    }
}

/// Result type for authorization operations
pub type AuthorizationResult<T> = Result<T, AuthorizationError>;
