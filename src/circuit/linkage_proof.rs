//! Relocation linkage circuit.
//!
//! Proves that the same subject secret underlies the commitments to an old
//! and a new PID, without revealing either PID or the secret.
//!
//! How it works:
//! 1. `commitment_old = Poseidon(old_pid, secret, nonce)` was published when
//!    the old address was registered
//! 2. `commitment_new = Poseidon(new_pid, secret, nonce)`
//! 3. `linkage = Poseidon(commitment_old, commitment_new, secret)`
//!
//! Public inputs, in allocation order: `commitment_old`, `commitment_new`,
//! `linkage`.
//!
//! Private witnesses: `old_pid`, `new_pid`, `secret`, `nonce` (all as field
//! elements).

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::PoseidonConfig;
use ark_r1cs_std::{alloc::AllocVar, eq::EqGadget, fields::fp::FpVar};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};

use super::gadgets::poseidon_hash;
use crate::crypto::string_to_field;
use crate::merkle::PoseidonHasher;

/// Commitment to `pid` under a subject secret; what registration publishes
/// and what a later linkage proof must reproduce.
pub fn pid_commitment(pid: &str, secret: &str, nonce: &Fr) -> Fr {
    PoseidonHasher::new().hash_many(&[string_to_field(pid), string_to_field(secret), *nonce])
}

#[derive(Clone)]
pub struct LinkageCircuit {
    pub poseidon_config: PoseidonConfig<Fr>,

    /// Private: old PID field
    pub old_pid: Option<Fr>,
    /// Private: new PID field
    pub new_pid: Option<Fr>,
    /// Private: subject secret field
    pub secret: Option<Fr>,
    /// Private: commitment nonce
    pub nonce: Option<Fr>,

    /// Public: commitment to the old PID
    pub commitment_old: Option<Fr>,
    /// Public: commitment to the new PID
    pub commitment_new: Option<Fr>,
    /// Public: linkage digest
    pub linkage: Option<Fr>,
}

impl LinkageCircuit {
    pub fn new_empty() -> Self {
        Self::from_fields(Fr::from(1u64), Fr::from(2u64), Fr::from(3u64), Fr::from(4u64))
    }

    pub fn new_with_witness(old_pid: &str, new_pid: &str, secret: &str, nonce: Fr) -> Self {
        Self::from_fields(
            string_to_field(old_pid),
            string_to_field(new_pid),
            string_to_field(secret),
            nonce,
        )
    }

    fn from_fields(old_pid: Fr, new_pid: Fr, secret: Fr, nonce: Fr) -> Self {
        let hasher = PoseidonHasher::new();
        let commitment_old = hasher.hash_many(&[old_pid, secret, nonce]);
        let commitment_new = hasher.hash_many(&[new_pid, secret, nonce]);
        let linkage = hasher.hash_many(&[commitment_old, commitment_new, secret]);

        Self {
            poseidon_config: hasher.config().clone(),
            old_pid: Some(old_pid),
            new_pid: Some(new_pid),
            secret: Some(secret),
            nonce: Some(nonce),
            commitment_old: Some(commitment_old),
            commitment_new: Some(commitment_new),
            linkage: Some(linkage),
        }
    }

    pub fn public_inputs(&self) -> Option<Vec<Fr>> {
        Some(vec![self.commitment_old?, self.commitment_new?, self.linkage?])
    }
}

impl ConstraintSynthesizer<Fr> for LinkageCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let old_commitment_var = FpVar::new_input(cs.clone(), || {
            self.commitment_old.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let new_commitment_var = FpVar::new_input(cs.clone(), || {
            self.commitment_new.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let linkage_var = FpVar::new_input(cs.clone(), || {
            self.linkage.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let old_var = FpVar::new_witness(cs.clone(), || {
            self.old_pid.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let new_var = FpVar::new_witness(cs.clone(), || {
            self.new_pid.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let secret_var = FpVar::new_witness(cs.clone(), || {
            self.secret.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let nonce_var = FpVar::new_witness(cs.clone(), || {
            self.nonce.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let config = &self.poseidon_config;
        let computed_old = poseidon_hash(
            cs.clone(),
            config,
            &[old_var, secret_var.clone(), nonce_var.clone()],
        )?;
        computed_old.enforce_equal(&old_commitment_var)?;

        let computed_new = poseidon_hash(cs.clone(), config, &[new_var, secret_var.clone(), nonce_var])?;
        computed_new.enforce_equal(&new_commitment_var)?;

        let computed_linkage = poseidon_hash(cs, config, &[computed_old, computed_new, secret_var])?;
        computed_linkage.enforce_equal(&linkage_var)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_relations::r1cs::ConstraintSystem;

    #[test]
    fn test_linkage_circuit_valid() {
        let nonce = Fr::from(77u64);
        let circuit = LinkageCircuit::new_with_witness("JP-13-113-01", "JP-27-100-05", "s3cret", nonce);
        assert_eq!(
            circuit.commitment_old,
            Some(pid_commitment("JP-13-113-01", "s3cret", &nonce))
        );

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_mismatched_secret_is_unsatisfied() {
        let nonce = Fr::from(77u64);
        let mut circuit = LinkageCircuit::new_with_witness("JP-13-113-01", "JP-27-100-05", "other", nonce);
        circuit.commitment_old = Some(pid_commitment("JP-13-113-01", "s3cret", &nonce));

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_same_secret_different_moves_differ() {
        let nonce = Fr::from(1u64);
        let a = LinkageCircuit::new_with_witness("JP-13-113-01", "JP-27-100-05", "s", nonce);
        let b = LinkageCircuit::new_with_witness("JP-13-113-01", "JP-01-101-02", "s", nonce);

        assert_eq!(a.commitment_old, b.commitment_old);
        assert_ne!(a.linkage, b.linkage);
    }

    #[test]
    fn test_empty_circuit_for_setup() {
        let circuit = LinkageCircuit::new_empty();
        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }
}
