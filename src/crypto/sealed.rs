//! Encrypt-then-sign envelopes
//!
//! The payload is hybrid-encrypted to the recipient and the ciphertext is
//! signed by the sender. The recipient checks the signature before it
//! decrypts anything.

use super::error::CryptoResult;
use super::exchange::{EncryptionKeyPair, EncryptionPublicKey};
use super::hybrid;
use super::signing::{SigningKeyPair, SigningPublicKey};

/// A ciphertext and the sender's signature over it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    /// Hybrid ciphertext
    pub ciphertext: Vec<u8>,
    /// Signature over `ciphertext`
    pub signature: Vec<u8>,
}

impl SealedPayload {
    /// Encrypt `plaintext` to `recipient` and sign the result
    pub fn seal(
        plaintext: &[u8],
        recipient: &EncryptionPublicKey,
        sender: &SigningKeyPair,
        context_info: &[u8],
    ) -> CryptoResult<Self> {
        let ciphertext = hybrid::encrypt(recipient, plaintext, context_info)?;
        let signature = sender.sign(&ciphertext);
        Ok(SealedPayload {
            ciphertext,
            signature,
        })
    }

    /// Check the sender's signature, then decrypt
    pub fn open(
        &self,
        sender: &SigningPublicKey,
        recipient: &EncryptionKeyPair,
        context_info: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        sender.verify(&self.ciphertext, &self.signature)?;
        hybrid::decrypt(recipient, &self.ciphertext, context_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CryptoError;

    #[test]
    fn test_seal_open() {
        let sender = SigningKeyPair::generate();
        let recipient = EncryptionKeyPair::generate();

        let plaintext = b"{\"state\":1}";
        let sealed =
            SealedPayload::seal(plaintext, recipient.public_key(), &sender, b"client").unwrap();
        let opened = sealed.open(sender.public_key(), &recipient, b"client").unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_flipped_ciphertext_fails_signature() {
        let sender = SigningKeyPair::generate();
        let recipient = EncryptionKeyPair::generate();

        let mut sealed =
            SealedPayload::seal(b"payload", recipient.public_key(), &sender, b"ctx").unwrap();
        sealed.ciphertext[40] ^= 0x01;

        assert_eq!(
            sealed.open(sender.public_key(), &recipient, b"ctx"),
            Err(CryptoError::SignatureVerificationFailed)
        );
    }

    #[test]
    fn test_wrong_context_fails() {
        let sender = SigningKeyPair::generate();
        let recipient = EncryptionKeyPair::generate();

        let sealed =
            SealedPayload::seal(b"payload", recipient.public_key(), &sender, b"client-a").unwrap();
        assert_eq!(
            sealed.open(sender.public_key(), &recipient, b"client-b"),
            Err(CryptoError::DecryptionFailed)
        );
    }
}
