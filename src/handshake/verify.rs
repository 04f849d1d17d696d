//! VERIFY proofs
//!
//! A proof shows the sender still holds the signing key the receiver has
//! on file, and the receiver still holds the encryption key the sender
//! has on file.

use super::error::{HandshakeError, HandshakeResult};
use super::messages::VerifyProof;
use crate::crypto::{
    constant_time_eq, hybrid, random_challenge, random_context_info, EncryptionKeyPair,
    EncryptionPublicKey, SigningKeyPair, SigningPublicKey,
};

/// Build a proof for `client_id`
pub fn create_proof(
    client_id: &str,
    signing_keys: &SigningKeyPair,
    recipient: &EncryptionPublicKey,
) -> HandshakeResult<VerifyProof> {
    let data = random_challenge();
    let signature = signing_keys.sign(&data);
    let context_info = random_context_info();
    let encrypted_data = hybrid::encrypt(recipient, &data, &context_info)?;

    Ok(VerifyProof {
        client_id: client_id.to_string(),
        data,
        signature,
        encrypted_data,
        context_info,
    })
}

/// Check a proof against the keys on file
pub fn check_proof(
    proof: &VerifyProof,
    signer: &SigningPublicKey,
    encryption_keys: &EncryptionKeyPair,
) -> HandshakeResult<()> {
    signer.verify(&proof.data, &proof.signature)?;

    let decrypted = hybrid::decrypt(encryption_keys, &proof.encrypted_data, &proof.context_info)?;
    if !constant_time_eq(&decrypted, &proof.data) {
        return Err(HandshakeError::ChallengeMismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CryptoError;

    #[test]
    fn test_proof_accepted_with_matching_keys() {
        let signer = SigningKeyPair::generate();
        let receiver = EncryptionKeyPair::generate();

        let proof = create_proof("client", &signer, receiver.public_key()).unwrap();
        assert_eq!(proof.data.len(), 1024);
        assert_eq!(proof.context_info.len(), 64);
        assert!(check_proof(&proof, signer.public_key(), &receiver).is_ok());
    }

    #[test]
    fn test_proof_rejected_with_stale_signing_key() {
        let signer = SigningKeyPair::generate();
        let stale = SigningKeyPair::generate();
        let receiver = EncryptionKeyPair::generate();

        let proof = create_proof("client", &signer, receiver.public_key()).unwrap();
        assert_eq!(
            check_proof(&proof, stale.public_key(), &receiver),
            Err(HandshakeError::Crypto(CryptoError::SignatureVerificationFailed))
        );
    }

    #[test]
    fn test_proof_rejected_with_stale_encryption_key() {
        let signer = SigningKeyPair::generate();
        let receiver = EncryptionKeyPair::generate();
        let stale = EncryptionKeyPair::generate();

        let proof = create_proof("client", &signer, receiver.public_key()).unwrap();
        assert!(check_proof(&proof, signer.public_key(), &stale).is_err());
    }

    #[test]
    fn test_proof_rejected_when_data_swapped() {
        let signer = SigningKeyPair::generate();
        let receiver = EncryptionKeyPair::generate();

        let mut proof = create_proof("client", &signer, receiver.public_key()).unwrap();
        let other = create_proof("client", &signer, receiver.public_key()).unwrap();

        // Signed plaintext from one proof, ciphertext from another
        proof.encrypted_data = other.encrypted_data;
        proof.context_info = other.context_info;

        assert_eq!(
            check_proof(&proof, signer.public_key(), &receiver),
            Err(HandshakeError::ChallengeMismatch)
        );
    }
}
