//! Locker: a locker belongs to a named facility's candidate set.
//!
//! Leaves are `Poseidon(field(facility_id), field(locker_id))`, so a locker
//! opening only reduces to a root under the facility it was listed for.
//! Public signals: `[root, commitment, facility_id]`, the facility ID in
//! plain text. The locker itself never leaves the prover.

use ark_bn254::Fr;

use super::{
    accept_commitment_only, prove_with_backend, require_candidates, verify_with_backend, ProofMode,
    ProofObject, ProofPattern, ProofPayload,
};
use crate::circuit::{CircuitId, CircuitInput, MerkleProofCircuit};
use crate::crypto::{field_to_hex, random_nonce, string_to_field};
use crate::error::{CoreResult, ProofCoreError};
use crate::merkle::{MerkleTree, PoseidonHasher};

/// Tree leaf for `locker_id` at `facility_id`.
pub fn locker_leaf(facility_id: &str, locker_id: &str) -> Fr {
    PoseidonHasher::new().hash_two(&string_to_field(facility_id), &string_to_field(locker_id))
}

/// Candidate tree over a facility's lockers.
pub fn locker_tree<S: AsRef<str>>(facility_id: &str, lockers: &[S]) -> MerkleTree {
    MerkleTree::new(lockers.iter().map(|l| locker_leaf(facility_id, l.as_ref())).collect())
}

/// Candidate-set root a verifier computes for a facility's lockers.
pub fn locker_root<S: AsRef<str>>(facility_id: &str, lockers: &[S]) -> Fr {
    locker_tree(facility_id, lockers).root()
}

pub fn generate_locker_proof<S: AsRef<str>>(
    locker_id: &str,
    candidates: &[S],
    facility_id: &str,
    mode: &ProofMode,
) -> CoreResult<ProofObject> {
    if locker_id.trim().is_empty() || facility_id.trim().is_empty() {
        return Err(ProofCoreError::invalid("locker and facility IDs are required"));
    }
    require_candidates(candidates, "locker")?;

    let tree = locker_tree(facility_id, candidates);
    let leaf = locker_leaf(facility_id, locker_id);
    let (path, member) = tree.path_or_detached(&leaf);
    let nonce = random_nonce();

    tracing::debug!(
        facility = facility_id,
        candidates = tree.num_leaves(),
        member,
        backend = %mode.kind(),
        "building locker proof"
    );

    match mode {
        ProofMode::Fallback => {
            let root = path.compute_root(tree.hasher());
            let commitment = tree.hasher().hash_two(&leaf, &nonce);
            Ok(ProofObject::new(
                ProofPattern::Locker,
                ProofPayload::CommitmentOnly,
                vec![field_to_hex(&root), field_to_hex(&commitment), facility_id.to_string()],
            ))
        }
        ProofMode::Circuit(backend) => {
            let locker = string_to_field(locker_id);
            let facility = string_to_field(facility_id);
            let circuit = MerkleProofCircuit::new_with_witness(locker, &path, nonce, Some(facility));
            let proof = prove_with_backend(backend.as_ref(), CircuitInput::Membership(circuit))?;
            let [root, commitment, _] = <[String; 3]>::try_from(proof.public_signals.clone())
                .map_err(|_| ProofCoreError::CircuitFailed("locker circuit signal count".to_string()))?;
            Ok(ProofObject::new(
                ProofPattern::Locker,
                ProofPayload::Circuit(proof),
                vec![root, commitment, facility_id.to_string()],
            ))
        }
    }
}

/// Verify a locker proof against the facility's candidate tree of
/// `depth` levels.
pub fn verify_locker_proof(
    proof: &ProofObject,
    root: &Fr,
    depth: usize,
    facility_id: &str,
    mode: &ProofMode,
) -> CoreResult<bool> {
    proof.expect_shape(ProofPattern::Locker, 3)?;
    let claimed_root = proof.signal(0)?;
    proof.signal(1)?;
    if claimed_root != *root || proof.public_signals[2] != facility_id {
        return Ok(false);
    }

    match &proof.payload {
        ProofPayload::CommitmentOnly => accept_commitment_only(mode, ProofPattern::Locker),
        ProofPayload::Circuit(circuit_proof) => {
            let circuit_signals = [
                proof.public_signals[0].clone(),
                proof.public_signals[1].clone(),
                field_to_hex(&string_to_field(facility_id)),
            ];
            verify_with_backend(
                mode,
                circuit_proof,
                |id| *id == CircuitId::Locker { depth },
                &circuit_signals,
            )
        }
        _ => Err(ProofCoreError::invalid("locker proof carries an unexpected payload")),
    }
}
