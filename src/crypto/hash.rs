//! BLAKE3 key derivation and comparison helpers

/// Size of a hash output in bytes
pub const HASH_SIZE: usize = 32;

/// A hash output
pub type HashOutput = [u8; HASH_SIZE];

/// Hashing and key derivation operations
pub struct Hash;

impl Hash {
    /// Derive a key from several input parts under a context string
    ///
    /// Parts are absorbed in order. The context should uniquely name the
    /// purpose of the derived key.
    pub fn derive_key(context: &str, parts: &[&[u8]]) -> HashOutput {
        let mut hasher = blake3::Hasher::new_derive_key(context);
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize().into()
    }

    /// Short hex fingerprint of a public key, for display only
    pub fn fingerprint(data: &[u8]) -> String {
        let digest = blake3::hash(data);
        hex::encode(&digest.as_bytes()[..8])
    }
}

/// Compare challenges without exiting early on the first differing byte
///
/// Only the length is compared eagerly; lengths are not secret here.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_derivation() {
        let key1 = Hash::derive_key("purpose-1", &[b"shared", b"salt"]);
        let key2 = Hash::derive_key("purpose-2", &[b"shared", b"salt"]);

        // Different contexts produce different keys
        assert_ne!(key1, key2);

        // Same context produces same key
        assert_eq!(key1, Hash::derive_key("purpose-1", &[b"shared", b"salt"]));
    }

    #[test]
    fn test_key_derivation_part_order_matters() {
        let a = Hash::derive_key("ctx", &[b"one", b"two"]);
        let b = Hash::derive_key("ctx", &[b"two", b"one"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(Hash::fingerprint(b"key"), Hash::fingerprint(b"key"));
        assert_eq!(Hash::fingerprint(b"key").len(), 16);
    }

    #[test]
    fn test_constant_time_eq() {
        let a = [1u8; 32];
        let b = [1u8; 32];
        let c = [2u8; 32];

        assert!(constant_time_eq(&a, &b));
        assert!(!constant_time_eq(&a, &c));
        assert!(!constant_time_eq(&a, &a[..31]));
    }
}
