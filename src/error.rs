//! Error codes that cross the process boundary
//!
//! Local errors carry detail for logs. Only an [`ErrorCode`] and, for
//! non-cryptographic failures, a short message reach the peer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorCode {
    /// The request could not be understood or does not match stored state
    MalformedRequest = 1,
    /// The response could not be understood
    MalformedResponse = 2,
    /// No such client
    UnknownClient = 3,
    /// Authorization was refused
    AuthorizationFailed = 4,
    /// Tokens could not be issued or validated
    TokenError = 5,
    /// Handshake state is out of sync
    InvalidState = 6,
    /// A signature or decryption check failed
    Rejected = 7,
    /// Storage or other local failure on the responder
    Internal = 8,
}

impl ErrorCode {
    /// Decode from the wire tag
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => ErrorCode::MalformedRequest,
            2 => ErrorCode::MalformedResponse,
            3 => ErrorCode::UnknownClient,
            4 => ErrorCode::AuthorizationFailed,
            5 => ErrorCode::TokenError,
            6 => ErrorCode::InvalidState,
            7 => ErrorCode::Rejected,
            8 => ErrorCode::Internal,
            _ => return None,
        })
    }

    /// Wire tag
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::MalformedRequest => "malformed_request",
            ErrorCode::MalformedResponse => "malformed_response",
            ErrorCode::UnknownClient => "unknown_client",
            ErrorCode::AuthorizationFailed => "authorization_failed",
            ErrorCode::TokenError => "token_error",
            ErrorCode::InvalidState => "invalid_state",
            ErrorCode::Rejected => "rejected",
            ErrorCode::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// An error as sent to the peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReply {
    /// What went wrong
    pub code: ErrorCode,
    /// Human-readable detail, empty for [`ErrorCode::Rejected`]
    pub message: String,
}

impl ErrorReply {
    /// Build a reply, dropping the detail of cryptographic failures
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = match code {
            ErrorCode::Rejected => String::new(),
            _ => message.into(),
        };
        ErrorReply { code, message }
    }
}

impl fmt::Display for ErrorReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_tags_round_trip() {
        for value in 1..=8u8 {
            let code = ErrorCode::from_u8(value).unwrap();
            assert_eq!(code.as_u8(), value);
        }
        assert_eq!(ErrorCode::from_u8(0), None);
        assert_eq!(ErrorCode::from_u8(9), None);
    }

    #[test]
    fn test_rejected_carries_no_detail() {
        let reply = ErrorReply::new(ErrorCode::Rejected, "signature verification failed");
        assert!(reply.message.is_empty());
        assert_eq!(reply.to_string(), "rejected");

        let reply = ErrorReply::new(ErrorCode::UnknownClient, "no client nobody");
        assert_eq!(reply.to_string(), "unknown_client: no client nobody");
    }
}
