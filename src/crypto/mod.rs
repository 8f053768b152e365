//! Cryptographic primitives used by every proof pattern.
//!
//! - [`hash`]: SHA-256 digests, secure randomness and Poseidon commitments
//! - [`signing`]: Ed25519 key pairs, signatures and verification

pub mod hash;
pub mod signing;

pub use hash::{
    commit, field_from_hex, field_to_hex, hash, hash_parts, random_bytes, random_nonce,
    string_to_field,
};
pub use signing::{verify, KeyPair, PublicKey, Signature};

/// Errors from hashing, encoding and signature operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid signature encoding: {0}")]
    InvalidSignature(String),

    #[error("Invalid private key material: {0}")]
    InvalidPrivateKey(String),

    #[error("Hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    #[error("Value is not a canonical field element: {0}")]
    NonCanonicalField(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
