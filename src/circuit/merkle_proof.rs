//! Merkle membership circuit for PID sets and facility locker sets.
//!
//! Proves knowledge of a leaf and a path from that leaf to a public root,
//! plus a commitment to the leaf, without revealing which leaf.
//!
//! Public inputs, in allocation order:
//! - `root`: the candidate-set Merkle root
//! - `commitment`: Poseidon(leaf, nonce)
//! - `facility` (locker variant only): the facility the leaf is bound to
//!
//! For the locker variant the tree leaf is Poseidon(facility, locker), so a
//! locker from another facility cannot reduce to this root.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::poseidon::PoseidonConfig;
use ark_r1cs_std::{alloc::AllocVar, eq::EqGadget, fields::fp::FpVar};
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use ark_std::vec::Vec;

use super::gadgets::{merkle_root, poseidon_hash};
use crate::merkle::{MerklePath, PoseidonHasher};

#[derive(Clone)]
pub struct MerkleProofCircuit {
    pub poseidon_config: PoseidonConfig<Fr>,

    /// Private: the PID field, or the locker field for facility-bound trees.
    pub leaf_value: Option<Fr>,
    /// Private: commitment nonce.
    pub nonce: Option<Fr>,
    /// Private: sibling hashes along the Merkle path.
    pub path: Vec<Option<Fr>>,
    /// Private: path direction indicators.
    pub path_indices: Vec<Option<bool>>,

    /// Public: the Merkle root.
    pub root: Option<Fr>,
    /// Public: commitment to the leaf.
    pub commitment: Option<Fr>,
    /// Public: facility identifier field (locker variant).
    pub facility: Option<Fr>,
    /// Whether the facility input is allocated at all.
    pub facility_bound: bool,
}

impl MerkleProofCircuit {
    /// Circuit with dummy but satisfying values, for key generation.
    pub fn new_empty(depth: usize, facility_bound: bool) -> Self {
        let facility = facility_bound.then(|| Fr::from(7u64));
        let siblings = vec![Fr::from(0u64); depth];
        let path = MerklePath::from_index(Fr::from(0u64), siblings, 0);
        Self::new_with_witness(Fr::from(1u64), &path, Fr::from(2u64), facility)
    }

    /// Circuit with real witness values.
    ///
    /// `path.siblings` / `path.indices` are taken from `path`; the leaf is
    /// recomputed from `leaf_value` (and `facility`) and the public root is
    /// whatever that leaf and path reduce to.
    pub fn new_with_witness(
        leaf_value: Fr,
        path: &MerklePath,
        nonce: Fr,
        facility: Option<Fr>,
    ) -> Self {
        let hasher = PoseidonHasher::new();
        let leaf = match facility {
            Some(f) => hasher.hash_two(&f, &leaf_value),
            None => leaf_value,
        };
        let rooted = MerklePath {
            siblings: path.siblings.clone(),
            indices: path.indices.clone(),
            leaf,
        };
        let root = rooted.compute_root(&hasher);
        let commitment = hasher.hash_two(&leaf, &nonce);

        Self {
            poseidon_config: hasher.config().clone(),
            leaf_value: Some(leaf_value),
            nonce: Some(nonce),
            path: path.siblings.iter().map(|s| Some(*s)).collect(),
            path_indices: path.indices.iter().map(|i| Some(*i)).collect(),
            root: Some(root),
            commitment: Some(commitment),
            facility,
            facility_bound: facility.is_some(),
        }
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Public inputs in allocation order.
    pub fn public_inputs(&self) -> Option<Vec<Fr>> {
        let mut inputs = vec![self.root?, self.commitment?];
        if self.facility_bound {
            inputs.push(self.facility?);
        }
        Some(inputs)
    }
}

impl ConstraintSynthesizer<Fr> for MerkleProofCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let root_var = FpVar::new_input(cs.clone(), || {
            self.root.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let commitment_var = FpVar::new_input(cs.clone(), || {
            self.commitment.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let facility_var = if self.facility_bound {
            Some(FpVar::new_input(cs.clone(), || {
                self.facility.ok_or(SynthesisError::AssignmentMissing)
            })?)
        } else {
            None
        };

        let value_var = FpVar::new_witness(cs.clone(), || {
            self.leaf_value.ok_or(SynthesisError::AssignmentMissing)
        })?;
        let nonce_var = FpVar::new_witness(cs.clone(), || {
            self.nonce.ok_or(SynthesisError::AssignmentMissing)
        })?;

        let leaf_var = match facility_var {
            Some(f) => poseidon_hash(cs.clone(), &self.poseidon_config, &[f, value_var])?,
            None => value_var,
        };

        let computed_commitment = poseidon_hash(
            cs.clone(),
            &self.poseidon_config,
            &[leaf_var.clone(), nonce_var],
        )?;
        computed_commitment.enforce_equal(&commitment_var)?;

        let computed_root = merkle_root(
            cs,
            &self.poseidon_config,
            leaf_var,
            &self.path,
            &self.path_indices,
        )?;
        computed_root.enforce_equal(&root_var)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{commit, string_to_field};
    use crate::merkle::MerkleTree;
    use ark_relations::r1cs::ConstraintSystem;

    #[test]
    fn test_member_circuit_is_satisfied() {
        let tree = MerkleTree::from_strings(&["JP-13-113-01", "JP-27-100-05", "JP-01-101-02"]);
        let leaf = string_to_field("JP-27-100-05");
        let path = tree.get_path_for_leaf(&leaf).unwrap();
        let nonce = Fr::from(99u64);

        let circuit = MerkleProofCircuit::new_with_witness(leaf, &path, nonce, None);
        assert_eq!(circuit.root, Some(tree.root()));
        assert_eq!(circuit.commitment, Some(commit("JP-27-100-05", &nonce)));

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_wrong_root_is_unsatisfied() {
        let tree = MerkleTree::from_strings(&["a", "b", "c", "d"]);
        let leaf = string_to_field("c");
        let path = tree.get_path_for_leaf(&leaf).unwrap();

        let mut circuit = MerkleProofCircuit::new_with_witness(leaf, &path, Fr::from(1u64), None);
        circuit.root = Some(Fr::from(999u64));

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(!cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_facility_bound_circuit() {
        let hasher = PoseidonHasher::new();
        let facility = string_to_field("FAC-TOKYO-7");
        let lockers = ["L-01", "L-02", "L-03"];
        let leaves: Vec<Fr> = lockers
            .iter()
            .map(|l| hasher.hash_two(&facility, &string_to_field(l)))
            .collect();
        let tree = MerkleTree::new(leaves.clone());
        let path = tree.get_path(1).unwrap();

        let circuit = MerkleProofCircuit::new_with_witness(
            string_to_field("L-02"),
            &path,
            Fr::from(5u64),
            Some(facility),
        );
        assert_eq!(circuit.root, Some(tree.root()));
        assert_eq!(circuit.public_inputs().unwrap().len(), 3);

        let cs = ConstraintSystem::<Fr>::new_ref();
        circuit.generate_constraints(cs.clone()).unwrap();
        assert!(cs.is_satisfied().unwrap());
    }

    #[test]
    fn test_empty_circuit_for_setup() {
        for bound in [false, true] {
            let circuit = MerkleProofCircuit::new_empty(3, bound);
            assert_eq!(circuit.depth(), 3);
            let cs = ConstraintSystem::<Fr>::new_ref();
            circuit.generate_constraints(cs.clone()).unwrap();
            assert!(cs.is_satisfied().unwrap());
        }
    }
}
