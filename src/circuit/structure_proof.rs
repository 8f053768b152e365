//! PID structure circuit.
//!
//! Proves that a committed PID decomposes into exactly `depth` non-empty
//! hierarchical segments whose first segment is a given country code,
//! without revealing any segment beyond the country.
//!
//! The depth is fixed by the circuit shape (one circuit per depth).
//!
//! Public inputs, in allocation order:
//! - `country_hash`: SHA-256 field reduction of the upper-case country code
//! - `commitment`: Poseidon(segment_0, ..., segment_{depth-1}, nonce)

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::PoseidonConfig;
use ark_r1cs_std::{alloc::AllocVar, eq::EqGadget, fields::fp::FpVar};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::gadgets::{poseidon_hash, witness_vec};
use crate::crypto::string_to_field;
use crate::merkle::PoseidonHasher;

/// Field value of a country code as exposed in public signals.
pub fn country_code_to_field(code: &str) -> Fr {
    string_to_field(&code.to_uppercase())
}

/// Field value of one PID segment. The first segment is reduced the same
/// way as [`country_code_to_field`].
pub fn segment_to_field(position: usize, segment: &str) -> Fr {
    if position == 0 {
        country_code_to_field(segment)
    } else {
        string_to_field(segment)
    }
}

/// Field value an empty segment would take; every segment must differ.
pub fn empty_segment_field() -> Fr {
    string_to_field("")
}

#[derive(Clone)]
pub struct StructureCircuit {
    pub poseidon_config: PoseidonConfig<Fr>,

    /// Private: one field element per PID segment.
    pub segments: Vec<Option<Fr>>,
    /// Private: commitment nonce.
    pub nonce: Option<Fr>,

    /// Public: hashed country code.
    pub country_hash: Option<Fr>,
    /// Public: commitment to the segments.
    pub commitment: Option<Fr>,
}

impl StructureCircuit {
    pub fn new_empty(depth: usize) -> Self {
        let segments: Vec<Fr> = (0..depth).map(|i| Fr::from(i as u64 + 1)).collect();
        Self::from_fields(&segments, Fr::from(0u64))
    }

    /// Circuit for the given PID segments (country first).
    pub fn new_with_witness<S: AsRef<str>>(segments: &[S], nonce: Fr) -> Self {
        let fields: Vec<Fr> = segments
            .iter()
            .enumerate()
            .map(|(i, s)| segment_to_field(i, s.as_ref()))
            .collect();
        Self::from_fields(&fields, nonce)
    }

    fn from_fields(fields: &[Fr], nonce: Fr) -> Self {
        let hasher = PoseidonHasher::new();
        let mut preimage = fields.to_vec();
        preimage.push(nonce);
        let commitment = hasher.hash_many(&preimage);

        Self {
            poseidon_config: hasher.config().clone(),
            segments: fields.iter().map(|f| Some(*f)).collect(),
            nonce: Some(nonce),
            country_hash: fields.first().copied(),
            commitment: Some(commitment),
        }
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn public_inputs(&self) -> Option<Vec<Fr>> {
        Some(vec![self.country_hash?, self.commitment?])
    }
}

impl ConstraintSynthesizer<Fr> for StructureCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let country_var = FpVar::new_input(cs.clone(), || {
            self.country_hash.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let commitment_var = FpVar::new_input(cs.clone(), || {
            self.commitment.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let segment_vars = witness_vec(cs.clone(), &self.segments)?;
        let nonce_var = FpVar::new_witness(cs.clone(), || {
            self.nonce.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let first = segment_vars.first().ok_or(SynthesisError::Unsatisfiable)?;
        first.enforce_equal(&country_var)?;

        let empty = FpVar::Constant(empty_segment_field());
        for segment in &segment_vars {
            segment.enforce_not_equal(&empty)?;
        }

        let mut preimage = segment_vars;
        preimage.push(nonce_var);
        let computed = poseidon_hash(cs, &self.poseidon_config, &preimage)?;
        computed.enforce_equal(&commitment_var)?;

        Ok(())
    }
}
