//! Handshake wire structs

use crate::crypto::{EncryptionPublicKey, SigningPublicKey};

/// BEGIN: client proposes its fresh keys and a signed challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeginRequest {
    /// Client id
    pub client_id: String,
    /// Handshake nonce
    pub state: u64,
    /// Client's new signing key
    pub client_public_signing_key: SigningPublicKey,
    /// Client's new encryption key
    pub client_public_encryption_key: EncryptionPublicKey,
    /// Client challenge
    pub m1: Vec<u8>,
    /// Signature over `m1`
    pub m1_signature: Vec<u8>,
}

/// BEGIN response: server keys, signed challenge, and the client's
/// challenge encrypted back to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeginResponse {
    /// Echoed client id
    pub client_id: String,
    /// Echoed handshake nonce
    pub state: u64,
    /// Server's new signing key
    pub server_public_signing_key: SigningPublicKey,
    /// Server's new encryption key
    pub server_public_encryption_key: EncryptionPublicKey,
    /// Server challenge
    pub m2: Vec<u8>,
    /// Signature over `m2`
    pub m2_signature: Vec<u8>,
    /// `m1` encrypted to the client encryption key
    pub m1_encrypted: Vec<u8>,
    /// Context info bound into `m1_encrypted`
    pub context_info: Vec<u8>,
}

/// COMPLETE: client returns the server challenge encrypted to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteRequest {
    /// Client id
    pub client_id: String,
    /// Handshake nonce
    pub state: u64,
    /// `m2` encrypted to the server encryption key
    pub m2_encrypted: Vec<u8>,
    /// Context info bound into `m2_encrypted`
    pub context_info: Vec<u8>,
}

/// COMPLETE response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteResponse {
    /// Echoed client id
    pub client_id: String,
    /// Echoed handshake nonce
    pub state: u64,
    /// Whether the server registered the handshake
    pub success: bool,
}

/// VERIFY proof, sent in both directions
///
/// Fresh data signed with the sender's signing key and encrypted to the
/// receiver's encryption key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyProof {
    /// Client id
    pub client_id: String,
    /// Random data
    pub data: Vec<u8>,
    /// Signature over `data`
    pub signature: Vec<u8>,
    /// `data` encrypted to the receiver
    pub encrypted_data: Vec<u8>,
    /// Context info bound into `encrypted_data`
    pub context_info: Vec<u8>,
}
