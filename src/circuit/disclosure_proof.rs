//! Selective disclosure circuit.
//!
//! The full address record is committed as the root of a Merkle tree whose
//! leaves are Poseidon(field_value, salt), one independently salted leaf per
//! field. The circuit proves that every revealed field opens to that root,
//! and binds the revealed values to a public digest, while the salts, the
//! paths and every non-revealed field stay private.
//!
//! Public inputs, in allocation order:
//! - `record_commitment`: root of the salted record tree
//! - `revealed_digest`: Poseidon(value_0, ..., value_{n-1}) over revealed fields

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::PoseidonConfig;
use ark_ff::PrimeField;
use ark_r1cs_std::{alloc::AllocVar, eq::EqGadget, fields::fp::FpVar};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::gadgets::{merkle_root, poseidon_hash};
use crate::crypto::hash_parts;
use crate::merkle::{MerklePath, PoseidonHasher};

/// Field value of one `key: value` record entry.
pub fn record_field_value(key: &str, value: &str) -> Fr {
    Fr::from_be_bytes_mod_order(&hash_parts(&[key.as_bytes(), value.as_bytes()]))
}

/// Private opening of one revealed field.
#[derive(Clone, Debug)]
pub struct FieldOpeningWitness {
    pub value: Fr,
    pub salt: Fr,
    pub path: MerklePath,
}

#[derive(Clone)]
struct OpeningVars {
    value: Option<Fr>,
    salt: Option<Fr>,
    path: Vec<Option<Fr>>,
    indices: Vec<Option<bool>>,
}

#[derive(Clone)]
pub struct DisclosureCircuit {
    pub poseidon_config: PoseidonConfig<Fr>,

    /// Private: revealed field openings, in key order.
    openings: Vec<OpeningVars>,

    /// Public: root of the salted record tree.
    pub record_commitment: Option<Fr>,
    /// Public: digest over revealed field values.
    pub revealed_digest: Option<Fr>,
}

impl DisclosureCircuit {
    /// Dummy-valued circuit revealing `revealed` fields of a tree of `depth`.
    pub fn new_empty(revealed: usize, depth: usize) -> Self {
        let hasher = PoseidonHasher::new();
        // Fields all sit on the same dummy path; only the shape matters.
        let value = Fr::from(1u64);
        let salt = Fr::from(2u64);
        let path = MerklePath::from_index(
            hasher.hash_two(&value, &salt),
            vec![Fr::from(0u64); depth],
            0,
        );
        let openings = (0..revealed)
            .map(|_| FieldOpeningWitness {
                value,
                salt,
                path: path.clone(),
            })
            .collect::<Vec<_>>();
        Self::new_with_witness(&openings, path.compute_root(&hasher))
    }

    pub fn new_with_witness(openings: &[FieldOpeningWitness], record_commitment: Fr) -> Self {
        let hasher = PoseidonHasher::new();
        let values: Vec<Fr> = openings.iter().map(|o| o.value).collect();
        let revealed_digest = hasher.hash_many(&values);

        Self {
            poseidon_config: hasher.config().clone(),
            openings: openings
                .iter()
                .map(|o| OpeningVars {
                    value: Some(o.value),
                    salt: Some(o.salt),
                    path: o.path.siblings.iter().map(|s| Some(*s)).collect(),
                    indices: o.path.indices.iter().map(|i| Some(*i)).collect(),
                })
                .collect(),
            record_commitment: Some(record_commitment),
            revealed_digest: Some(revealed_digest),
        }
    }

    pub fn revealed_count(&self) -> usize {
        self.openings.len()
    }

    pub fn depth(&self) -> usize {
        self.openings.first().map_or(0, |o| o.path.len())
    }

    pub fn public_inputs(&self) -> Option<Vec<Fr>> {
        Some(vec![self.record_commitment?, self.revealed_digest?])
    }
}

impl ConstraintSynthesizer<Fr> for DisclosureCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let root_var = FpVar::new_input(cs.clone(), || {
            self.record_commitment.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let digest_var = FpVar::new_input(cs.clone(), || {
            self.revealed_digest.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let mut value_vars = Vec::with_capacity(self.openings.len());
        for opening in &self.openings {
            let value_var = FpVar::new_witness(cs.clone(), || {
                opening.value.ok_or(SynthesisError::AssignmentMissing)
            })?;
            let salt_var = FpVar::new_witness(cs.clone(), || {
                opening.salt.ok_or(SynthesisError::AssignmentMissing)
            })?;

            let leaf = poseidon_hash(
                cs.clone(),
                &self.poseidon_config,
                &[value_var.clone(), salt_var],
            )?;
            let computed_root = merkle_root(
                cs.clone(),
                &self.poseidon_config,
                leaf,
                &opening.path,
                &opening.indices,
            )?;
            computed_root.enforce_equal(&root_var)?;
            value_vars.push(value_var);
        }

        let computed_digest = poseidon_hash(cs, &self.poseidon_config, &value_vars)?;
        computed_digest.enforce_equal(&digest_var)?;

        Ok(())
    }
}
