//! Protected resources
//!
//! A client presents its access token sealed to the server, and receives
//! each result row sealed back to it:
//!
//! ```text
//! query:  client_id, enc(pkEnc_s, token, ctx = client_id), sig_c(enc)
//! rows:   [enc(pkEnc_c, json, ctx = client_id), sig_s(enc)]...
//! ```
//!
//! Across a text-only boundary the query travels as
//! `client_id=…&token=…&token_signature=…` with standard base64 fields.
//! Every value is percent-encoded.

use std::collections::BTreeSet;
use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Value};
use thiserror::Error;

use crate::crypto::{CryptoError, CryptoResult, SealedPayload};
use crate::scope::{ScopeAccess, ScopeRequest};
use crate::storage::{ClientCredentials, StorageError};

pub mod provider;

pub use provider::ResourceProvider;

/// Outcome of a resource query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ResourceStatus {
    /// Rows follow
    Ok = 200,
    /// Query could not be parsed
    MalformedRequest = 400,
    /// Token or its envelope did not check out
    AuthenticationFailed = 401,
    /// Approved scopes do not cover the route
    InsufficientPermissions = 403,
    /// No such route
    NotFound = 404,
    /// Storage or serialization failure on the server
    InternalError = 500,
}

impl ResourceStatus {
    /// Numeric code
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Decode a numeric code
    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            200 => ResourceStatus::Ok,
            400 => ResourceStatus::MalformedRequest,
            401 => ResourceStatus::AuthenticationFailed,
            403 => ResourceStatus::InsufficientPermissions,
            404 => ResourceStatus::NotFound,
            500 => ResourceStatus::InternalError,
            _ => return None,
        })
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Resource errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// Query could not be parsed
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// Token or its envelope did not check out
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Approved scopes do not cover the route
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    /// No such route
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage backend failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A row could not be produced or opened
    #[error("Malformed row: {0}")]
    MalformedRow(String),

    /// A row failed its signature or decryption check
    #[error("Row rejected: {0}")]
    Crypto(#[from] CryptoError),

    /// The server answered with a non-OK status
    #[error("Server answered {0}")]
    Status(ResourceStatus),
}

impl ResourceError {
    /// Status reported for this error
    pub fn status(&self) -> ResourceStatus {
        match self {
            ResourceError::MalformedRequest(_) => ResourceStatus::MalformedRequest,
            ResourceError::AuthenticationFailed(_) | ResourceError::Crypto(_) => {
                ResourceStatus::AuthenticationFailed
            }
            ResourceError::InsufficientPermissions => ResourceStatus::InsufficientPermissions,
            ResourceError::NotFound(_) => ResourceStatus::NotFound,
            ResourceError::Storage(_) | ResourceError::MalformedRow(_) => {
                ResourceStatus::InternalError
            }
            ResourceError::Status(status) => *status,
        }
    }
}

/// A query for one route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceQuery {
    /// Route path, e.g. `sample_data_1`
    pub route: String,
    /// Client presenting the token
    pub client_id: String,
    /// Access token sealed to the server
    pub token: SealedPayload,
}

impl ResourceQuery {
    /// Seal `access_token` for a query on `route`
    pub fn new(
        route: impl Into<String>,
        client_id: impl Into<String>,
        access_token: &str,
        credentials: &ClientCredentials,
    ) -> CryptoResult<Self> {
        let client_id = client_id.into();
        let token = SealedPayload::seal(
            access_token.as_bytes(),
            &credentials.server_public_encryption_key,
            &credentials.client_signing_keys,
            client_id.as_bytes(),
        )?;
        Ok(ResourceQuery {
            route: route.into(),
            client_id,
            token,
        })
    }

    /// Encode the parameters as a query string
    pub fn to_query_string(&self) -> String {
        format!(
            "client_id={}&token={}&token_signature={}",
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&BASE64.encode(&self.token.ciphertext)),
            urlencoding::encode(&BASE64.encode(&self.token.signature))
        )
    }

    /// Parse the parameters of a query on `route`
    pub fn from_query_string(route: impl Into<String>, query: &str) -> Result<Self, ResourceError> {
        let mut client_id = None;
        let mut token = None;
        let mut token_signature = None;

        for pair in query.split('&') {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ResourceError::MalformedRequest(format!("bad parameter: {pair}")))?;
            let value = urlencoding::decode(value)
                .map_err(|e| ResourceError::MalformedRequest(format!("{key}: {e}")))?;
            match key {
                "client_id" => client_id = Some(value.into_owned()),
                "token" => token = Some(decode_param("token", &value)?),
                "token_signature" => {
                    token_signature = Some(decode_param("token_signature", &value)?)
                }
                _ => {}
            }
        }

        let missing = |name: &str| ResourceError::MalformedRequest(format!("missing {name}"));
        Ok(ResourceQuery {
            route: route.into(),
            client_id: client_id.ok_or_else(|| missing("client_id"))?,
            token: SealedPayload {
                ciphertext: token.ok_or_else(|| missing("token"))?,
                signature: token_signature.ok_or_else(|| missing("token_signature"))?,
            },
        })
    }
}

fn decode_param(name: &str, value: &str) -> Result<Vec<u8>, ResourceError> {
    BASE64
        .decode(value)
        .map_err(|e| ResourceError::MalformedRequest(format!("{name}: {e}")))
}

/// Answer to a [`ResourceQuery`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceResponse {
    /// Outcome
    pub status: ResourceStatus,
    /// Sealed JSON rows, empty unless `status` is OK
    pub rows: Vec<SealedPayload>,
}

impl ResourceResponse {
    /// A response with no rows
    pub fn status(status: ResourceStatus) -> Self {
        ResourceResponse {
            status,
            rows: Vec::new(),
        }
    }

    /// Check and decrypt every row
    pub fn open_rows(
        &self,
        client_id: &str,
        credentials: &ClientCredentials,
    ) -> Result<Vec<Value>, ResourceError> {
        if self.status != ResourceStatus::Ok {
            return Err(ResourceError::Status(self.status));
        }

        self.rows
            .iter()
            .map(|row| {
                let plaintext = row.open(
                    &credentials.server_public_signing_key,
                    &credentials.client_encryption_keys,
                    client_id.as_bytes(),
                )?;
                serde_json::from_slice(&plaintext)
                    .map_err(|e| ResourceError::MalformedRow(e.to_string()))
            })
            .collect()
    }
}

/// One protected route
pub trait ApiView: Send + Sync {
    /// Scopes a client must have been approved for
    fn required_scopes(&self) -> BTreeSet<ScopeRequest>;

    /// Objects returned to an authorized client
    fn objects(&self, client_id: &str) -> Result<Vec<Value>, ResourceError>;
}

/// A route that always returns the same objects
#[derive(Debug, Clone)]
pub struct StaticView {
    required: BTreeSet<ScopeRequest>,
    objects: Vec<Value>,
}

impl StaticView {
    /// Route guarded by `required` returning `objects`
    pub fn new(required: BTreeSet<ScopeRequest>, objects: Vec<Value>) -> Self {
        StaticView { required, objects }
    }
}

impl ApiView for StaticView {
    fn required_scopes(&self) -> BTreeSet<ScopeRequest> {
        self.required.clone()
    }

    fn objects(&self, _client_id: &str) -> Result<Vec<Value>, ResourceError> {
        Ok(self.objects.clone())
    }
}

/// The sample routes, keyed by path
pub fn sample_views() -> Vec<(String, StaticView)> {
    let scope_1 = ScopeRequest::new("sample_scope_1", ScopeAccess::Read);
    let scope_2 = ScopeRequest::new("sample_scope_2", ScopeAccess::Read);

    vec![
        (
            "sample_data_1".to_string(),
            StaticView::new(
                [scope_1].into_iter().collect(),
                vec![
                    json!({"identifier": "item 1", "sampleString": "data 1"}),
                    json!({"identifier": "item 2", "sampleString": "data 2"}),
                ],
            ),
        ),
        (
            "sample_data_2".to_string(),
            StaticView::new(
                [scope_2].into_iter().collect(),
                vec![
                    json!({"identifier": "item 1", "sampleInt": "1"}),
                    json!({"identifier": "item 2", "sampleInt": "2"}),
                ],
            ),
        ),
    ]
}
