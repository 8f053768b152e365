//! Digests, randomness and commitments.
//!
//! SHA-256 is the general-purpose digest (list signing, audit chaining,
//! string-to-field reduction). Commitments use Poseidon so the circuit
//! backend can recompute them in-circuit.

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use super::CryptoError;
use crate::merkle::PoseidonHasher;

/// SHA-256 of `bytes`.
pub fn hash(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// SHA-256 over several parts, each prefixed with its length so that
/// `("ab", "c")` and `("a", "bc")` never collide.
pub fn hash_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// `n` bytes from the operating system CSPRNG.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; n];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// A uniformly random commitment nonce.
pub fn random_nonce() -> Fr {
    Fr::from_be_bytes_mod_order(&random_bytes(32))
}

/// Convert a string to a field element using SHA-256.
pub fn string_to_field(s: &str) -> Fr {
    Fr::from_be_bytes_mod_order(&hash(s.as_bytes()))
}

/// `commitment = H(secret ‖ nonce)` with H = Poseidon over BN254.
///
/// Deterministic for a fixed `(secret, nonce)` pair.
pub fn commit(secret: &str, nonce: &Fr) -> Fr {
    PoseidonHasher::new().hash_two(&string_to_field(secret), nonce)
}

/// Render a field element as 64 lower-case hex characters (big-endian).
pub fn field_to_hex(value: &Fr) -> String {
    hex::encode(value.into_bigint().to_bytes_be())
}

/// Parse a field element rendered by [`field_to_hex`].
///
/// Rejects values that are not exactly 32 bytes or not reduced modulo the
/// field order, so every element has a single accepted encoding.
pub fn field_from_hex(hex_str: &str) -> Result<Fr, CryptoError> {
    let bytes = hex::decode(hex_str.trim())?;
    if bytes.len() != 32 {
        return Err(CryptoError::NonCanonicalField(format!(
            "expected 32 bytes, got {}",
            bytes.len()
        )));
    }
    let value = Fr::from_be_bytes_mod_order(&bytes);
    if value.into_bigint().to_bytes_be() != bytes {
        return Err(CryptoError::NonCanonicalField(hex_str.to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hash_is_fixed_size_and_deterministic() {
        assert_eq!(hash(b"JP-13-113-01"), hash(b"JP-13-113-01"));
        assert_ne!(hash(b"JP-13-113-01"), hash(b"JP-13-113-02"));
    }

    #[test]
    fn test_hash_parts_is_unambiguous() {
        assert_ne!(hash_parts(&[b"ab", b"c"]), hash_parts(&[b"a", b"bc"]));
    }

    #[test]
    fn test_random_bytes_length_and_variation() {
        let a = random_bytes(32);
        let b = random_bytes(32);
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert!(random_bytes(0).is_empty());
    }

    #[test]
    fn test_commitment_hides_with_fresh_nonce() {
        let c1 = commit("JP-13-113-01", &random_nonce());
        let c2 = commit("JP-13-113-01", &random_nonce());
        assert_ne!(c1, c2);
    }

    #[test]
    fn test_field_hex_round_trip() {
        let value = string_to_field("postalCode=100-0001");
        let encoded = field_to_hex(&value);
        assert_eq!(encoded.len(), 64);
        assert_eq!(field_from_hex(&encoded).unwrap(), value);
    }

    #[test]
    fn test_field_from_hex_rejects_bad_input() {
        assert!(matches!(field_from_hex("zz"), Err(CryptoError::HexDecode(_))));
        assert!(matches!(
            field_from_hex("00ff"),
            Err(CryptoError::NonCanonicalField(_))
        ));
        // All-ones is larger than the BN254 scalar modulus.
        let too_big = "ff".repeat(32);
        assert!(matches!(
            field_from_hex(&too_big),
            Err(CryptoError::NonCanonicalField(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_commitment_is_deterministic(secret in ".{0,40}", seed in any::<u64>()) {
            let nonce = Fr::from(seed);
            prop_assert_eq!(commit(&secret, &nonce), commit(&secret, &nonce));
        }
    }
}
