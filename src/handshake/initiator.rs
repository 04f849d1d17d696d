//! Client side of the handshake
//!
//! ```text
//! Idle ──begin()──▶ AwaitingBeginResponse ──handle_begin_response()──▶
//!      AwaitingCompleteResponse ──handle_complete_response()──▶ Established
//!
//! any error ──▶ Failed (stored credentials cleared)
//! ```
//!
//! The initiator only builds and checks messages; the caller moves them.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::error::{HandshakeError, HandshakeResult};
use super::messages::{BeginRequest, BeginResponse, CompleteRequest, CompleteResponse, VerifyProof};
use super::verify::{check_proof, create_proof};
use crate::crypto::{
    constant_time_eq, hybrid, random_challenge, random_context_info, random_state,
    EncryptionKeyPair, SigningKeyPair,
};
use crate::storage::{ClientCredentials, ClientStorage};

/// Observable phase of the initiator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Nothing in flight
    Idle,
    /// BEGIN sent
    AwaitingBeginResponse,
    /// COMPLETE sent
    AwaitingCompleteResponse,
    /// Credentials stored
    Established,
    /// Last attempt failed; call `begin` again
    Failed,
}

/// What the client holds between BEGIN and its response
#[derive(Debug)]
struct PendingBegin {
    state: u64,
    m1: Vec<u8>,
    signing_keys: SigningKeyPair,
    encryption_keys: EncryptionKeyPair,
}

/// What the client holds between COMPLETE and its response
#[derive(Debug)]
struct PendingComplete {
    state: u64,
    credentials: ClientCredentials,
}

#[derive(Debug)]
enum InitiatorState {
    Idle,
    AwaitingBeginResponse(PendingBegin),
    AwaitingCompleteResponse(PendingComplete),
    Established,
    Failed,
}

/// Drives BEGIN, COMPLETE and VERIFY from the client side
pub struct HandshakeInitiator {
    client_id: String,
    storage: Arc<dyn ClientStorage>,
    state: InitiatorState,
}

impl HandshakeInitiator {
    /// Create an initiator for `client_id` backed by `storage`
    pub fn new(client_id: impl Into<String>, storage: Arc<dyn ClientStorage>) -> Self {
        HandshakeInitiator {
            client_id: client_id.into(),
            storage,
            state: InitiatorState::Idle,
        }
    }

    /// Client id this initiator speaks for
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Current phase
    pub fn phase(&self) -> HandshakePhase {
        match self.state {
            InitiatorState::Idle => HandshakePhase::Idle,
            InitiatorState::AwaitingBeginResponse(_) => HandshakePhase::AwaitingBeginResponse,
            InitiatorState::AwaitingCompleteResponse(_) => HandshakePhase::AwaitingCompleteResponse,
            InitiatorState::Established => HandshakePhase::Established,
            InitiatorState::Failed => HandshakePhase::Failed,
        }
    }

    /// Whether credentials from an earlier handshake are stored
    pub fn has_credentials(&self) -> HandshakeResult<bool> {
        Ok(self.storage.credentials()?.is_some())
    }

    /// Start a new handshake, discarding stored credentials and any
    /// attempt in flight
    pub fn begin(&mut self) -> HandshakeResult<BeginRequest> {
        self.state = InitiatorState::Idle;
        if let Err(e) = self.storage.clear() {
            self.state = InitiatorState::Failed;
            return Err(e.into());
        }

        let state = random_state();
        let m1 = random_challenge();
        let signing_keys = SigningKeyPair::generate();
        let encryption_keys = EncryptionKeyPair::generate();

        let request = BeginRequest {
            client_id: self.client_id.clone(),
            state,
            client_public_signing_key: *signing_keys.public_key(),
            client_public_encryption_key: *encryption_keys.public_key(),
            m1_signature: signing_keys.sign(&m1),
            m1: m1.clone(),
        };

        debug!(client_id = %self.client_id, "handshake begin");
        self.state = InitiatorState::AwaitingBeginResponse(PendingBegin {
            state,
            m1,
            signing_keys,
            encryption_keys,
        });
        Ok(request)
    }

    /// Check the BEGIN response and build COMPLETE
    pub fn handle_begin_response(
        &mut self,
        response: &BeginResponse,
    ) -> HandshakeResult<CompleteRequest> {
        let pending = match std::mem::replace(&mut self.state, InitiatorState::Failed) {
            InitiatorState::AwaitingBeginResponse(pending) => pending,
            other => {
                self.state = other;
                return Err(HandshakeError::InvalidState(
                    "no BEGIN in flight".to_string(),
                ));
            }
        };

        match self.complete_request(pending, response) {
            Ok((request, next)) => {
                debug!(client_id = %self.client_id, "handshake complete sent");
                self.state = InitiatorState::AwaitingCompleteResponse(next);
                Ok(request)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn complete_request(
        &self,
        pending: PendingBegin,
        response: &BeginResponse,
    ) -> HandshakeResult<(CompleteRequest, PendingComplete)> {
        self.check_echo(&response.client_id, response.state, pending.state)?;

        let m1 = hybrid::decrypt(
            &pending.encryption_keys,
            &response.m1_encrypted,
            &response.context_info,
        )?;
        if !constant_time_eq(&m1, &pending.m1) {
            return Err(HandshakeError::InvalidState(
                "server did not echo m1".to_string(),
            ));
        }

        response
            .server_public_signing_key
            .verify(&response.m2, &response.m2_signature)?;

        let context_info = random_context_info();
        let m2_encrypted = hybrid::encrypt(
            &response.server_public_encryption_key,
            &response.m2,
            &context_info,
        )?;

        let request = CompleteRequest {
            client_id: self.client_id.clone(),
            state: pending.state,
            m2_encrypted,
            context_info,
        };
        let next = PendingComplete {
            state: pending.state,
            credentials: ClientCredentials {
                client_signing_keys: pending.signing_keys,
                client_encryption_keys: pending.encryption_keys,
                server_public_signing_key: response.server_public_signing_key,
                server_public_encryption_key: response.server_public_encryption_key,
            },
        };
        Ok((request, next))
    }

    /// Check the COMPLETE response and store the credentials
    pub fn handle_complete_response(&mut self, response: &CompleteResponse) -> HandshakeResult<()> {
        let pending = match std::mem::replace(&mut self.state, InitiatorState::Failed) {
            InitiatorState::AwaitingCompleteResponse(pending) => pending,
            other => {
                self.state = other;
                return Err(HandshakeError::InvalidState(
                    "no COMPLETE in flight".to_string(),
                ));
            }
        };

        let result = self
            .check_echo(&response.client_id, response.state, pending.state)
            .and_then(|()| {
                if response.success {
                    Ok(())
                } else {
                    Err(HandshakeError::MalformedResponse(
                        "server refused COMPLETE".to_string(),
                    ))
                }
            })
            .and_then(|()| Ok(self.storage.store_credentials(pending.credentials)?));

        match result {
            Ok(()) => {
                info!(client_id = %self.client_id, "handshake established");
                self.state = InitiatorState::Established;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Build a VERIFY proof from the stored credentials
    pub fn verify_request(&self) -> HandshakeResult<VerifyProof> {
        let credentials = self
            .storage
            .credentials()?
            .ok_or(HandshakeError::NeedsHandshake)?;

        create_proof(
            &self.client_id,
            &credentials.client_signing_keys,
            &credentials.server_public_encryption_key,
        )
    }

    /// Check the server's VERIFY proof; any failure clears the credentials
    pub fn handle_verify_response(&mut self, proof: &VerifyProof) -> HandshakeResult<()> {
        let result = self.check_verify_response(proof);
        match result {
            Ok(()) => {
                debug!(client_id = %self.client_id, "handshake verified");
                self.state = InitiatorState::Established;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn check_verify_response(&self, proof: &VerifyProof) -> HandshakeResult<()> {
        if proof.client_id != self.client_id {
            return Err(HandshakeError::InvalidState(
                "VERIFY response for another client".to_string(),
            ));
        }
        let credentials = self
            .storage
            .credentials()?
            .ok_or(HandshakeError::NeedsHandshake)?;

        check_proof(
            proof,
            &credentials.server_public_signing_key,
            &credentials.client_encryption_keys,
        )
    }

    /// Abandon the handshake and clear stored credentials
    ///
    /// Used when the exchange fails outside the initiator, e.g. on a
    /// timeout or an error reply.
    pub fn abort(&mut self) {
        self.state = InitiatorState::Failed;
        if let Err(e) = self.storage.clear() {
            warn!(client_id = %self.client_id, error = %e, "failed to clear credentials");
        }
    }

    fn check_echo(&self, client_id: &str, state: u64, expected: u64) -> HandshakeResult<()> {
        if client_id != self.client_id {
            return Err(HandshakeError::InvalidState(
                "response for another client".to_string(),
            ));
        }
        if state != expected {
            return Err(HandshakeError::InvalidState("state mismatch".to_string()));
        }
        Ok(())
    }

    fn fail(&mut self, error: HandshakeError) -> HandshakeError {
        warn!(client_id = %self.client_id, %error, "handshake failed, clearing credentials");
        self.abort();
        error
    }
}

impl std::fmt::Debug for HandshakeInitiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeInitiator")
            .field("client_id", &self.client_id)
            .field("phase", &self.phase())
            .finish()
    }
}
