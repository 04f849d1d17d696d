//! Wire messages
//!
//! Every message is a one-byte tag followed by its fields. Byte fields
//! and strings are length-prefixed, integers are little-endian.

use super::{TransportError, TransportResult};
use crate::authorization::{AuthorizationRequest, AuthorizationResponse};
use crate::crypto::{EncryptionPublicKey, SealedPayload, SigningPublicKey};
use crate::error::{ErrorCode, ErrorReply};
use crate::handshake::{BeginRequest, BeginResponse, CompleteRequest, CompleteResponse, VerifyProof};
use crate::resource::{ResourceResponse, ResourceStatus};

const TAG_BEGIN_REQUEST: u8 = 0x01;
const TAG_BEGIN_RESPONSE: u8 = 0x02;
const TAG_COMPLETE_REQUEST: u8 = 0x03;
const TAG_COMPLETE_RESPONSE: u8 = 0x04;
const TAG_VERIFY_REQUEST: u8 = 0x05;
const TAG_VERIFY_RESPONSE: u8 = 0x06;
const TAG_AUTHORIZATION_REQUEST: u8 = 0x10;
const TAG_AUTHORIZATION_RESPONSE: u8 = 0x11;
const TAG_RESOURCE_QUERY: u8 = 0x20;
const TAG_RESOURCE_RESPONSE: u8 = 0x21;
const TAG_ERROR: u8 = 0xFF;

/// Everything that crosses between client and server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Handshake BEGIN
    BeginRequest(BeginRequest),
    /// Answer to BEGIN
    BeginResponse(BeginResponse),
    /// Handshake COMPLETE
    CompleteRequest(CompleteRequest),
    /// Answer to COMPLETE
    CompleteResponse(CompleteResponse),
    /// Client VERIFY proof
    VerifyRequest(VerifyProof),
    /// Server VERIFY proof
    VerifyResponse(VerifyProof),
    /// Sealed authorization request
    AuthorizationRequest(AuthorizationRequest),
    /// Sealed authorization response
    AuthorizationResponse(AuthorizationResponse),
    /// Resource query in query-string form
    ResourceQuery {
        /// Route path
        route: String,
        /// `client_id=…&token=…&token_signature=…`
        query: String,
    },
    /// Resource rows
    ResourceResponse(ResourceResponse),
    /// Request failed
    Error(ErrorReply),
}

impl Message {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Message::BeginRequest(_) => "begin_request",
            Message::BeginResponse(_) => "begin_response",
            Message::CompleteRequest(_) => "complete_request",
            Message::CompleteResponse(_) => "complete_response",
            Message::VerifyRequest(_) => "verify_request",
            Message::VerifyResponse(_) => "verify_response",
            Message::AuthorizationRequest(_) => "authorization_request",
            Message::AuthorizationResponse(_) => "authorization_response",
            Message::ResourceQuery { .. } => "resource_query",
            Message::ResourceResponse(_) => "resource_response",
            Message::Error(_) => "error",
        }
    }

    /// Serialize message to bytes
    ///
    /// Fails when a field is longer than its length prefix can express.
    pub fn to_bytes(&self) -> TransportResult<Vec<u8>> {
        let mut w = Writer::default();

        match self {
            Message::BeginRequest(m) => {
                w.u8(TAG_BEGIN_REQUEST);
                w.str(&m.client_id)?;
                w.u64(m.state);
                w.vec16(m.client_public_signing_key.as_bytes())?;
                w.vec16(m.client_public_encryption_key.as_bytes())?;
                w.vec32(&m.m1)?;
                w.vec16(&m.m1_signature)?;
            }
            Message::BeginResponse(m) => {
                w.u8(TAG_BEGIN_RESPONSE);
                w.str(&m.client_id)?;
                w.u64(m.state);
                w.vec16(m.server_public_signing_key.as_bytes())?;
                w.vec16(m.server_public_encryption_key.as_bytes())?;
                w.vec32(&m.m2)?;
                w.vec16(&m.m2_signature)?;
                w.vec32(&m.m1_encrypted)?;
                w.vec16(&m.context_info)?;
            }
            Message::CompleteRequest(m) => {
                w.u8(TAG_COMPLETE_REQUEST);
                w.str(&m.client_id)?;
                w.u64(m.state);
                w.vec32(&m.m2_encrypted)?;
                w.vec16(&m.context_info)?;
            }
            Message::CompleteResponse(m) => {
                w.u8(TAG_COMPLETE_RESPONSE);
                w.str(&m.client_id)?;
                w.u64(m.state);
                w.u8(m.success as u8);
            }
            Message::VerifyRequest(proof) => {
                w.u8(TAG_VERIFY_REQUEST);
                w.proof(proof)?;
            }
            Message::VerifyResponse(proof) => {
                w.u8(TAG_VERIFY_RESPONSE);
                w.proof(proof)?;
            }
            Message::AuthorizationRequest(m) => {
                w.u8(TAG_AUTHORIZATION_REQUEST);
                w.str(&m.client_id)?;
                w.sealed(&m.sealed)?;
            }
            Message::AuthorizationResponse(m) => {
                w.u8(TAG_AUTHORIZATION_RESPONSE);
                w.sealed(&m.sealed)?;
            }
            Message::ResourceQuery { route, query } => {
                w.u8(TAG_RESOURCE_QUERY);
                w.str(route)?;
                w.vec32(query.as_bytes())?;
            }
            Message::ResourceResponse(m) => {
                w.u8(TAG_RESOURCE_RESPONSE);
                w.u16(m.status.code());
                w.u32(length(m.rows.len())?);
                for row in &m.rows {
                    w.sealed(row)?;
                }
            }
            Message::Error(reply) => {
                w.u8(TAG_ERROR);
                w.u8(reply.code.as_u8());
                w.str(&reply.message)?;
            }
        }

        Ok(w.0)
    }

    /// Deserialize message from bytes
    pub fn from_bytes(bytes: &[u8]) -> TransportResult<Self> {
        let mut r = Reader(bytes);
        let tag = r
            .u8()
            .map_err(|_| TransportError::InvalidData("Empty message".to_string()))?;

        let message = match tag {
            TAG_BEGIN_REQUEST => Message::BeginRequest(BeginRequest {
                client_id: r.str()?,
                state: r.u64()?,
                client_public_signing_key: r.signing_key()?,
                client_public_encryption_key: r.encryption_key()?,
                m1: r.vec32()?,
                m1_signature: r.vec16()?,
            }),
            TAG_BEGIN_RESPONSE => Message::BeginResponse(BeginResponse {
                client_id: r.str()?,
                state: r.u64()?,
                server_public_signing_key: r.signing_key()?,
                server_public_encryption_key: r.encryption_key()?,
                m2: r.vec32()?,
                m2_signature: r.vec16()?,
                m1_encrypted: r.vec32()?,
                context_info: r.vec16()?,
            }),
            TAG_COMPLETE_REQUEST => Message::CompleteRequest(CompleteRequest {
                client_id: r.str()?,
                state: r.u64()?,
                m2_encrypted: r.vec32()?,
                context_info: r.vec16()?,
            }),
            TAG_COMPLETE_RESPONSE => Message::CompleteResponse(CompleteResponse {
                client_id: r.str()?,
                state: r.u64()?,
                success: r.u8()? != 0,
            }),
            TAG_VERIFY_REQUEST => Message::VerifyRequest(r.proof()?),
            TAG_VERIFY_RESPONSE => Message::VerifyResponse(r.proof()?),
            TAG_AUTHORIZATION_REQUEST => Message::AuthorizationRequest(AuthorizationRequest {
                client_id: r.str()?,
                sealed: r.sealed()?,
            }),
            TAG_AUTHORIZATION_RESPONSE => Message::AuthorizationResponse(AuthorizationResponse {
                sealed: r.sealed()?,
            }),
            TAG_RESOURCE_QUERY => Message::ResourceQuery {
                route: r.str()?,
                query: string(r.vec32()?)?,
            },
            TAG_RESOURCE_RESPONSE => {
                let code = r.u16()?;
                let status = ResourceStatus::from_code(code).ok_or_else(|| {
                    TransportError::InvalidData(format!("Unknown status: {code}"))
                })?;
                let count = r.u32()? as usize;
                // Each row needs at least its two length prefixes
                if count > r.0.len() / 6 {
                    return Err(TransportError::InvalidData("Row count too large".to_string()));
                }
                let mut rows = Vec::with_capacity(count);
                for _ in 0..count {
                    rows.push(r.sealed()?);
                }
                Message::ResourceResponse(ResourceResponse { status, rows })
            }
            TAG_ERROR => {
                let value = r.u8()?;
                let code = ErrorCode::from_u8(value).ok_or_else(|| {
                    TransportError::InvalidData(format!("Unknown error code: {value}"))
                })?;
                Message::Error(ErrorReply {
                    code,
                    message: r.str()?,
                })
            }
            _ => {
                return Err(TransportError::InvalidData(format!(
                    "Unknown message type: {:#x}",
                    tag
                )))
            }
        };

        if !r.0.is_empty() {
            return Err(TransportError::InvalidData("Trailing bytes".to_string()));
        }
        Ok(message)
    }
}

#[derive(Default)]
struct Writer(Vec<u8>);

impl Writer {
    fn u8(&mut self, value: u8) {
        self.0.push(value);
    }

    fn u16(&mut self, value: u16) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn u64(&mut self, value: u64) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn vec16(&mut self, bytes: &[u8]) -> TransportResult<()> {
        self.u16(length(bytes.len())?);
        self.0.extend_from_slice(bytes);
        Ok(())
    }

    fn vec32(&mut self, bytes: &[u8]) -> TransportResult<()> {
        self.u32(length(bytes.len())?);
        self.0.extend_from_slice(bytes);
        Ok(())
    }

    fn str(&mut self, s: &str) -> TransportResult<()> {
        self.vec16(s.as_bytes())
    }

    fn sealed(&mut self, sealed: &SealedPayload) -> TransportResult<()> {
        self.vec32(&sealed.ciphertext)?;
        self.vec16(&sealed.signature)
    }

    fn proof(&mut self, proof: &VerifyProof) -> TransportResult<()> {
        self.str(&proof.client_id)?;
        self.vec32(&proof.data)?;
        self.vec16(&proof.signature)?;
        self.vec32(&proof.encrypted_data)?;
        self.vec16(&proof.context_info)
    }
}

fn length<N: TryFrom<usize>>(len: usize) -> TransportResult<N> {
    N::try_from(len).map_err(|_| TransportError::TooLarge(len))
}

struct Reader<'a>(&'a [u8]);

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> TransportResult<&'a [u8]> {
        if self.0.len() < len {
            return Err(TransportError::InvalidData("Not enough data".to_string()));
        }
        let (head, rest) = self.0.split_at(len);
        self.0 = rest;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> TransportResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> TransportResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> TransportResult<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> TransportResult<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn u64(&mut self) -> TransportResult<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    fn vec16(&mut self) -> TransportResult<Vec<u8>> {
        let len = self.u16()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn vec32(&mut self) -> TransportResult<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn str(&mut self) -> TransportResult<String> {
        string(self.vec16()?)
    }

    fn signing_key(&mut self) -> TransportResult<SigningPublicKey> {
        SigningPublicKey::from_bytes(&self.vec16()?)
            .map_err(|e| TransportError::InvalidData(e.to_string()))
    }

    fn encryption_key(&mut self) -> TransportResult<EncryptionPublicKey> {
        EncryptionPublicKey::from_bytes(&self.vec16()?)
            .map_err(|e| TransportError::InvalidData(e.to_string()))
    }

    fn sealed(&mut self) -> TransportResult<SealedPayload> {
        Ok(SealedPayload {
            ciphertext: self.vec32()?,
            signature: self.vec16()?,
        })
    }

    fn proof(&mut self) -> TransportResult<VerifyProof> {
        Ok(VerifyProof {
            client_id: self.str()?,
            data: self.vec32()?,
            signature: self.vec16()?,
            encrypted_data: self.vec32()?,
            context_info: self.vec16()?,
        })
    }
}

fn string(bytes: Vec<u8>) -> TransportResult<String> {
    String::from_utf8(bytes).map_err(|e| TransportError::InvalidData(e.to_string()))
}
