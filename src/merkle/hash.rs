//! Poseidon hash over the BN254 scalar field.
//!
//! Used for Merkle nodes and commitments; the same parameters drive the
//! in-circuit sponge so native and circuit values agree.

use std::sync::OnceLock;

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::{
    poseidon::{PoseidonConfig, PoseidonSponge},
    CryptographicSponge,
};
use ark_ff::Field;
use ark_std::vec::Vec;

const FULL_ROUNDS: usize = 8;
const PARTIAL_ROUNDS: usize = 57;
const ALPHA: u64 = 5;
const RATE: usize = 2;
const CAPACITY: usize = 1;

/// Tag absorbed ahead of every Merkle leaf value ("LEAF").
pub const LEAF_DOMAIN: u64 = 0x4c45_4146;

static CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();

/// Poseidon hasher configured for BN254 scalar field.
#[derive(Clone)]
pub struct PoseidonHasher {
    config: PoseidonConfig<Fr>,
}

impl PoseidonHasher {
    /// Hasher with the crate-wide parameters (built once per process).
    pub fn new() -> Self {
        let config = CONFIG.get_or_init(build_config).clone();
        Self { config }
    }

    /// Hash two field elements into one.
    pub fn hash_two(&self, left: &Fr, right: &Fr) -> Fr {
        self.hash_many(&[*left, *right])
    }

    /// Tree node for a raw leaf value.
    ///
    /// The tag keeps leaf nodes apart from internal nodes and from zero
    /// padding slots: no value hashes to either.
    pub fn hash_leaf(&self, value: &Fr) -> Fr {
        self.hash_two(&Fr::from(LEAF_DOMAIN), value)
    }

    /// Hash an ordered sequence of field elements into one.
    pub fn hash_many(&self, elements: &[Fr]) -> Fr {
        let mut sponge = PoseidonSponge::new(&self.config);
        for elem in elements {
            sponge.absorb(elem);
        }
        sponge.squeeze_field_elements(1)[0]
    }

    /// Get the underlying Poseidon configuration.
    pub fn config(&self) -> &PoseidonConfig<Fr> {
        &self.config
    }
}

impl Default for PoseidonHasher {
    fn default() -> Self {
        Self::new()
    }
}

fn build_config() -> PoseidonConfig<Fr> {
    let width = RATE + CAPACITY;
    PoseidonConfig {
        full_rounds: FULL_ROUNDS,
        partial_rounds: PARTIAL_ROUNDS,
        alpha: ALPHA,
        ark: round_constants(width, FULL_ROUNDS + PARTIAL_ROUNDS),
        mds: mds_matrix(width),
        rate: RATE,
        capacity: CAPACITY,
    }
}

fn round_constants(width: usize, rounds: usize) -> Vec<Vec<Fr>> {
    (0..rounds)
        .map(|r| {
            (0..width)
                .map(|i| Fr::from(((r * width + i) as u64).wrapping_mul(0x9e3779b97f4a7c15)))
                .collect()
        })
        .collect()
}

// Cauchy matrix: entry (i, j) = 1 / (x_i + y_j).
fn mds_matrix(width: usize) -> Vec<Vec<Fr>> {
    (0..width)
        .map(|i| {
            (0..width)
                .map(|j| {
                    let x = Fr::from((i + 1) as u64);
                    let y = Fr::from((width + j + 1) as u64);
                    (x + y).inverse().unwrap_or(Fr::from(1u64))
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_two_matches_hash_many() {
        let hasher = PoseidonHasher::new();
        let a = Fr::from(11u64);
        let b = Fr::from(22u64);
        assert_eq!(hasher.hash_two(&a, &b), hasher.hash_many(&[a, b]));
    }

    #[test]
    fn test_order_matters() {
        let hasher = PoseidonHasher::new();
        let a = Fr::from(1u64);
        let b = Fr::from(2u64);
        assert_ne!(hasher.hash_two(&a, &b), hasher.hash_two(&b, &a));
    }

    #[test]
    fn test_leaf_hash_is_tagged() {
        let hasher = PoseidonHasher::new();
        let value = Fr::from(7u64);
        assert_ne!(hasher.hash_leaf(&value), value);
        assert_eq!(hasher.hash_leaf(&value), hasher.hash_two(&Fr::from(LEAF_DOMAIN), &value));
    }

    #[test]
    fn test_config_shape() {
        let hasher = PoseidonHasher::default();
        let config = hasher.config();
        assert_eq!(config.ark.len(), FULL_ROUNDS + PARTIAL_ROUNDS);
        assert_eq!(config.mds.len(), RATE + CAPACITY);
    }
}
