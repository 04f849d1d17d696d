//! Server side of the handshake

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::error::{HandshakeError, HandshakeResult};
use super::messages::{BeginRequest, BeginResponse, CompleteRequest, CompleteResponse, VerifyProof};
use super::verify::{check_proof, create_proof};
use crate::crypto::{
    constant_time_eq, hybrid, random_challenge, random_context_info, EncryptionKeyPair,
    SigningKeyPair, CHALLENGE_SIZE,
};
use crate::storage::{CredentialStore, HandshakeSession, SessionStore};

/// Answers BEGIN, COMPLETE and VERIFY
///
/// Any failure in BEGIN or COMPLETE drops the pending session for the
/// client. A failed VERIFY drops the client's durable handshake.
pub struct HandshakeResponder {
    sessions: Arc<dyn SessionStore>,
    credentials: Arc<dyn CredentialStore>,
}

impl HandshakeResponder {
    /// Create a responder over the given stores
    pub fn new(sessions: Arc<dyn SessionStore>, credentials: Arc<dyn CredentialStore>) -> Self {
        HandshakeResponder {
            sessions,
            credentials,
        }
    }

    /// Handle BEGIN
    pub fn begin(&self, request: &BeginRequest) -> HandshakeResult<BeginResponse> {
        self.sessions.clear(&request.client_id)?;

        match self.answer_begin(request) {
            Ok(response) => {
                debug!(client_id = %request.client_id, "handshake begin accepted");
                Ok(response)
            }
            Err(e) => {
                warn!(client_id = %request.client_id, error = %e, "handshake begin rejected");
                self.clear_pending(&request.client_id);
                Err(e)
            }
        }
    }

    fn answer_begin(&self, request: &BeginRequest) -> HandshakeResult<BeginResponse> {
        if request.m1.len() != CHALLENGE_SIZE {
            return Err(HandshakeError::MalformedRequest(format!(
                "m1 must be {CHALLENGE_SIZE} bytes"
            )));
        }

        request
            .client_public_signing_key
            .verify(&request.m1, &request.m1_signature)?;

        let context_info = random_context_info();
        let m1_encrypted = hybrid::encrypt(
            &request.client_public_encryption_key,
            &request.m1,
            &context_info,
        )?;

        let server_signing_keys = SigningKeyPair::generate();
        let server_encryption_keys = EncryptionKeyPair::generate();
        let m2 = random_challenge();

        let response = BeginResponse {
            client_id: request.client_id.clone(),
            state: request.state,
            server_public_signing_key: *server_signing_keys.public_key(),
            server_public_encryption_key: *server_encryption_keys.public_key(),
            m2_signature: server_signing_keys.sign(&m2),
            m2: m2.clone(),
            m1_encrypted,
            context_info,
        };

        self.sessions.store_session(HandshakeSession {
            client_id: request.client_id.clone(),
            state: request.state,
            client_public_signing_key: request.client_public_signing_key,
            client_public_encryption_key: request.client_public_encryption_key,
            server_signing_keys,
            server_encryption_keys,
            m2,
        })?;

        Ok(response)
    }

    /// Handle COMPLETE
    ///
    /// On success the pending session becomes the client's durable
    /// handshake, replacing any earlier one.
    pub fn complete(&self, request: &CompleteRequest) -> HandshakeResult<CompleteResponse> {
        match self.answer_complete(request) {
            Ok(response) => {
                info!(client_id = %request.client_id, "handshake registered");
                Ok(response)
            }
            Err(e) => {
                warn!(client_id = %request.client_id, error = %e, "handshake complete rejected");
                self.clear_pending(&request.client_id);
                Err(e)
            }
        }
    }

    fn answer_complete(&self, request: &CompleteRequest) -> HandshakeResult<CompleteResponse> {
        let session = self
            .sessions
            .session(&request.client_id, request.state)?
            .ok_or_else(|| {
                HandshakeError::MalformedRequest("unknown client or invalid state".to_string())
            })?;

        let m2 = hybrid::decrypt(
            &session.server_encryption_keys,
            &request.m2_encrypted,
            &request.context_info,
        )?;
        if !constant_time_eq(&m2, &session.m2) {
            return Err(HandshakeError::ChallengeMismatch);
        }

        self.credentials
            .register_client_handshake(session.into_client_handshake())?;
        self.sessions.clear(&request.client_id)?;

        Ok(CompleteResponse {
            client_id: request.client_id.clone(),
            state: request.state,
            success: true,
        })
    }

    /// Handle VERIFY and answer with the server's own proof
    pub fn verify(&self, proof: &VerifyProof) -> HandshakeResult<VerifyProof> {
        let handshake = self
            .credentials
            .client_handshake(&proof.client_id)?
            .ok_or(HandshakeError::NeedsHandshake)?;

        if let Err(e) = check_proof(
            proof,
            &handshake.client_public_signing_key,
            &handshake.server_encryption_keys,
        ) {
            warn!(client_id = %proof.client_id, error = %e, "verify failed, clearing handshake");
            self.credentials.clear_client_handshake(&proof.client_id)?;
            return Err(e);
        }

        debug!(client_id = %proof.client_id, "verify accepted");
        create_proof(
            &proof.client_id,
            &handshake.server_signing_keys,
            &handshake.client_public_encryption_key,
        )
    }

    fn clear_pending(&self, client_id: &str) {
        if let Err(e) = self.sessions.clear(client_id) {
            warn!(client_id, error = %e, "failed to clear pending session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{random_state, CryptoError};
    use crate::handshake::HandshakeInitiator;
    use crate::storage::{ClientStorage, MemoryClientStorage, MemoryStore};

    struct Fixture {
        store: Arc<MemoryStore>,
        responder: HandshakeResponder,
        client_storage: Arc<MemoryClientStorage>,
        initiator: HandshakeInitiator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let client_storage = Arc::new(MemoryClientStorage::new());
        Fixture {
            responder: HandshakeResponder::new(store.clone(), store.clone()),
            initiator: HandshakeInitiator::new("client", client_storage.clone()),
            store,
            client_storage,
        }
    }

    fn establish(f: &mut Fixture) {
        let begin = f.initiator.begin().unwrap();
        let begin_response = f.responder.begin(&begin).unwrap();
        let complete = f.initiator.handle_begin_response(&begin_response).unwrap();
        let complete_response = f.responder.complete(&complete).unwrap();
        f.initiator.handle_complete_response(&complete_response).unwrap();
    }

    #[test]
    fn test_full_handshake_mirrors_keys() {
        let mut f = fixture();
        establish(&mut f);

        let server = f.store.client_handshake("client").unwrap().unwrap();
        let client = f.client_storage.credentials().unwrap().unwrap();

        assert_eq!(server.client_public_signing_key, *client.client_signing_keys.public_key());
        assert_eq!(
            server.client_public_encryption_key,
            *client.client_encryption_keys.public_key()
        );
        assert_eq!(*server.server_signing_keys.public_key(), client.server_public_signing_key);
        assert_eq!(
            *server.server_encryption_keys.public_key(),
            client.server_public_encryption_key
        );
        assert_eq!(f.store.pending_state("client").unwrap(), None);
    }

    #[test]
    fn test_begin_with_bad_signature_stores_nothing() {
        let mut f = fixture();
        let mut begin = f.initiator.begin().unwrap();
        begin.m1_signature[3] ^= 0x10;

        assert_eq!(
            f.responder.begin(&begin).unwrap_err(),
            HandshakeError::Crypto(CryptoError::SignatureVerificationFailed)
        );
        assert_eq!(f.store.pending_state("client").unwrap(), None);
    }

    #[test]
    fn test_begin_with_short_challenge_rejected() {
        let mut f = fixture();
        let mut begin = f.initiator.begin().unwrap();
        begin.m1.truncate(16);

        assert!(matches!(
            f.responder.begin(&begin),
            Err(HandshakeError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_complete_with_wrong_state_is_not_promoted() {
        let mut f = fixture();
        let begin = f.initiator.begin().unwrap();
        let begin_response = f.responder.begin(&begin).unwrap();
        let mut complete = f.initiator.handle_begin_response(&begin_response).unwrap();
        complete.state = begin.state.wrapping_add(1);

        let err = f.responder.complete(&complete).unwrap_err();
        assert!(matches!(err, HandshakeError::MalformedRequest(_)));
        assert!(f.store.client_handshake("client").unwrap().is_none());
        assert_eq!(f.store.pending_state("client").unwrap(), None);
    }

    #[test]
    fn test_complete_with_tampered_ciphertext_is_not_promoted() {
        let mut f = fixture();
        let begin = f.initiator.begin().unwrap();
        let begin_response = f.responder.begin(&begin).unwrap();
        let mut complete = f.initiator.handle_begin_response(&begin_response).unwrap();
        let last = complete.m2_encrypted.len() - 1;
        complete.m2_encrypted[last] ^= 0x01;

        assert_eq!(
            f.responder.complete(&complete).unwrap_err().code(),
            crate::error::ErrorCode::Rejected
        );
        assert!(f.store.client_handshake("client").unwrap().is_none());
    }

    #[test]
    fn test_wrong_challenge_looks_like_failed_decryption() {
        let mut f = fixture();
        let begin = f.initiator.begin().unwrap();
        let begin_response = f.responder.begin(&begin).unwrap();
        let mut complete = f.initiator.handle_begin_response(&begin_response).unwrap();

        let session = f.store.session("client", begin.state).unwrap().unwrap();
        complete.m2_encrypted = crate::crypto::hybrid::encrypt(
            session.server_encryption_keys.public_key(),
            &vec![0u8; session.m2.len()],
            &complete.context_info,
        )
        .unwrap();

        let err = f.responder.complete(&complete).unwrap_err();
        assert_eq!(err, HandshakeError::ChallengeMismatch);
        assert_eq!(err.code(), crate::error::ErrorCode::Rejected);

        let reply = crate::error::ErrorReply::new(err.code(), err.to_string());
        assert!(reply.message.is_empty());
        assert!(f.store.client_handshake("client").unwrap().is_none());
    }

    #[test]
    fn test_second_begin_invalidates_first() {
        let mut f = fixture();
        let first = f.initiator.begin().unwrap();
        let first_response = f.responder.begin(&first).unwrap();

        let mut other = HandshakeInitiator::new("client", Arc::new(MemoryClientStorage::new()));
        let second = other.begin().unwrap();
        f.responder.begin(&second).unwrap();

        let complete = f.initiator.handle_begin_response(&first_response).unwrap();
        assert!(f.responder.complete(&complete).is_err());
        assert!(f.store.client_handshake("client").unwrap().is_none());
    }

    #[test]
    fn test_verify_round_trip() {
        let mut f = fixture();
        establish(&mut f);

        let proof = f.initiator.verify_request().unwrap();
        let answer = f.responder.verify(&proof).unwrap();
        f.initiator.handle_verify_response(&answer).unwrap();

        assert!(f.store.client_handshake("client").unwrap().is_some());
        assert!(f.client_storage.credentials().unwrap().is_some());
    }

    #[test]
    fn test_verify_without_handshake() {
        let f = fixture();
        let proof = VerifyProof {
            client_id: "client".to_string(),
            data: vec![0u8; 8],
            signature: vec![0u8; 64],
            encrypted_data: vec![],
            context_info: vec![],
        };
        assert_eq!(
            f.responder.verify(&proof).unwrap_err(),
            HandshakeError::NeedsHandshake
        );
    }

    #[test]
    fn test_verify_with_desynced_key_clears_server_record() {
        let mut f = fixture();
        establish(&mut f);

        // Replace the stored client key with an unrelated one
        let mut record = f.store.client_handshake("client").unwrap().unwrap();
        record.client_public_signing_key = *SigningKeyPair::generate().public_key();
        f.store.register_client_handshake(record).unwrap();

        let proof = f.initiator.verify_request().unwrap();
        assert!(f.responder.verify(&proof).is_err());
        assert!(f.store.client_handshake("client").unwrap().is_none());
    }

    #[test]
    fn test_client_clears_on_bad_server_proof() {
        let mut f = fixture();
        establish(&mut f);

        let proof = f.initiator.verify_request().unwrap();
        let mut answer = f.responder.verify(&proof).unwrap();
        answer.signature[0] ^= 0x01;

        assert!(f.initiator.handle_verify_response(&answer).is_err());
        assert!(f.client_storage.credentials().unwrap().is_none());
    }

    #[test]
    fn test_complete_for_unknown_client() {
        let f = fixture();
        let complete = CompleteRequest {
            client_id: "nobody".to_string(),
            state: random_state(),
            m2_encrypted: vec![0u8; 128],
            context_info: vec![0u8; 64],
        };
        assert!(matches!(
            f.responder.complete(&complete),
            Err(HandshakeError::MalformedRequest(_))
        ));
    }
}
