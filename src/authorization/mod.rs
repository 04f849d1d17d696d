//! Consent-based token authorization
//!
//! Runs over the keys a completed handshake left on both sides. The
//! client seals `{client_id, state, scopes, include_refresh_token, nonce}`
//! to the server; the server asks the user, records what was approved,
//! and seals `{access_token, refresh_token, state}` back.

pub mod client;
pub mod consent;
pub mod error;
pub mod payload;
pub mod server;

pub use client::{AuthorizationGrant, AuthorizationRequester, PendingAuthorization};
pub use consent::{ConsentDecision, ConsentProvider, ConsentRequest, ScriptedConsent};
pub use error::{AuthorizationError, AuthorizationResult};
pub use payload::{
    AuthorizationPayload, AuthorizationRequest, AuthorizationResponse, AuthorizationResponsePayload,
};
pub use server::AuthorizationServer;
