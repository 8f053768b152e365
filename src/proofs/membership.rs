//! Membership: a PID is one of a candidate set, without saying which.
//!
//! Public signals: `[root, commitment]` where `commitment = Poseidon(leaf,
//! nonce)` and `leaf` is the PID's field reduction. Neither the leaf nor its
//! path leaves the prover.

use ark_bn254::Fr;

use super::{
    accept_commitment_only, prove_with_backend, require_candidates, verify_with_backend,
    ProofMode, ProofObject, ProofPattern, ProofPayload,
};
use crate::circuit::{CircuitId, CircuitInput, MerkleProofCircuit};
use crate::crypto::{field_to_hex, random_nonce, string_to_field};
use crate::error::{CoreResult, ProofCoreError};
use crate::merkle::MerkleTree;
use crate::pid::PlaceId;

/// Prove that `pid` is in `candidates`.
///
/// A non-member still yields a proof object; it simply never verifies
/// against the candidate root.
pub fn generate_membership_proof<S: AsRef<str>>(
    pid: &str,
    candidates: &[S],
    mode: &ProofMode,
) -> CoreResult<ProofObject> {
    let pid = PlaceId::parse(pid)?;
    require_candidates(candidates, "PID")?;

    let tree = MerkleTree::from_strings(candidates);
    let leaf = string_to_field(pid.as_str());
    let (path, member) = tree.path_or_detached(&leaf);
    let nonce = random_nonce();

    tracing::debug!(
        candidates = tree.num_leaves(),
        depth = tree.depth(),
        member,
        backend = %mode.kind(),
        "building membership proof"
    );

    match mode {
        ProofMode::Fallback => {
            let root = path.compute_root(tree.hasher());
            let commitment = tree.hasher().hash_two(&leaf, &nonce);
            Ok(ProofObject::new(
                ProofPattern::Membership,
                ProofPayload::CommitmentOnly,
                vec![field_to_hex(&root), field_to_hex(&commitment)],
            ))
        }
        ProofMode::Circuit(backend) => {
            let circuit = MerkleProofCircuit::new_with_witness(leaf, &path, nonce, None);
            let proof = prove_with_backend(backend.as_ref(), CircuitInput::Membership(circuit))?;
            let signals = proof.public_signals.clone();
            Ok(ProofObject::new(
                ProofPattern::Membership,
                ProofPayload::Circuit(proof),
                signals,
            ))
        }
    }
}

/// Verify a membership proof against the verifier's own candidate tree.
///
/// A circuit proof must be for a tree of exactly `depth`.
pub fn verify_membership_proof(
    proof: &ProofObject,
    root: &Fr,
    depth: usize,
    mode: &ProofMode,
) -> CoreResult<bool> {
    proof.expect_shape(ProofPattern::Membership, 2)?;
    let claimed_root = proof.signal(0)?;
    proof.signal(1)?;
    if claimed_root != *root {
        return Ok(false);
    }

    match &proof.payload {
        ProofPayload::CommitmentOnly => accept_commitment_only(mode, ProofPattern::Membership),
        ProofPayload::Circuit(circuit_proof) => verify_with_backend(
            mode,
            circuit_proof,
            |id| *id == CircuitId::Membership { depth },
            &proof.public_signals,
        ),
        _ => Err(ProofCoreError::invalid(
            "membership proof carries an unexpected payload",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::MerklePath;
    use crate::proofs::tests::circuit_mode;
    use proptest::prelude::*;

    const VALID: [&str; 2] = ["JP-13-113-01", "JP-27-100-05"];
    const AREA: [&str; 4] = ["JP-13-113-01", "JP-27-100-05", "JP-01-101-02", "JP-14-204-09"];

    fn root_of(candidates: &[&str]) -> Fr {
        MerkleTree::from_strings(candidates).root()
    }

    fn depth_of(candidates: &[&str]) -> usize {
        MerkleTree::from_strings(candidates).depth()
    }

    fn verify(proof: &ProofObject, candidates: &[&str], mode: &ProofMode) -> CoreResult<bool> {
        verify_membership_proof(proof, &root_of(candidates), depth_of(candidates), mode)
    }

    /// Circuit proof over `path` from `leaf_value`, as a prover without a
    /// real member would build it, claiming `root` as its public root.
    fn crafted_circuit_proof(leaf_value: Fr, path: &MerklePath, root: &Fr, mode: &ProofMode) -> ProofObject {
        let ProofMode::Circuit(backend) = mode else {
            panic!("circuit mode required");
        };
        let circuit = MerkleProofCircuit::new_with_witness(leaf_value, path, Fr::from(5u64), None);
        let proof = prove_with_backend(backend.as_ref(), CircuitInput::Membership(circuit)).unwrap();
        let mut signals = proof.public_signals.clone();
        signals[0] = field_to_hex(root);
        ProofObject::new(ProofPattern::Membership, ProofPayload::Circuit(proof), signals)
    }

    #[test]
    fn test_member_verifies_in_fallback() {
        let proof = generate_membership_proof("JP-13-113-01", &VALID, &ProofMode::Fallback).unwrap();
        assert_eq!(proof.pattern, ProofPattern::Membership);
        assert_eq!(proof.backend, crate::proofs::BackendKind::FallbackCommitment);
        assert!(verify(&proof, &VALID, &ProofMode::Fallback).unwrap());
    }

    #[test]
    fn test_non_member_fails_in_fallback() {
        let proof = generate_membership_proof("US-CA-SF-001", &VALID, &ProofMode::Fallback).unwrap();
        assert!(!verify(&proof, &VALID, &ProofMode::Fallback).unwrap());
    }

    #[test]
    fn test_member_and_non_member_with_circuit() {
        let mode = circuit_mode();

        let proof = generate_membership_proof("JP-13-113-01", &VALID, &mode).unwrap();
        assert_eq!(proof.backend, crate::proofs::BackendKind::Circuit);
        assert!(verify(&proof, &VALID, &mode).unwrap());

        let proof = generate_membership_proof("US-CA-SF-001", &VALID, &mode).unwrap();
        assert!(!verify(&proof, &VALID, &mode).unwrap());
    }

    #[test]
    fn test_wrong_root_fails() {
        let proof = generate_membership_proof("JP-13-113-01", &VALID, &ProofMode::Fallback).unwrap();
        assert!(!verify(&proof, &["JP-13-113-01", "JP-01-101-02"], &ProofMode::Fallback).unwrap());
    }

    #[test]
    fn test_fallback_proof_does_not_identify_the_member() {
        let a = generate_membership_proof("JP-27-100-05", &AREA, &ProofMode::Fallback).unwrap();
        let b = generate_membership_proof("JP-01-101-02", &AREA, &ProofMode::Fallback).unwrap();
        assert_eq!(a.payload, ProofPayload::CommitmentOnly);
        assert_eq!(a.public_signals[0], b.public_signals[0]);

        let json = a.to_json().unwrap();
        for candidate in AREA {
            assert!(!json.contains(&field_to_hex(&string_to_field(candidate))));
        }
    }

    #[test]
    fn test_root_as_leaf_is_rejected_in_circuit_mode() {
        let mode = circuit_mode();
        let tree = MerkleTree::from_strings(&AREA);

        // No member known: the root itself with an empty path.
        let forged = crafted_circuit_proof(
            tree.root(),
            &MerklePath::from_index(tree.root(), vec![], 0),
            &tree.root(),
            &mode,
        );
        assert!(matches!(
            verify(&forged, &AREA, &mode),
            Err(ProofCoreError::InvalidProofInput(_))
        ));
    }

    #[test]
    fn test_internal_node_as_leaf_is_rejected_in_circuit_mode() {
        let mode = circuit_mode();
        let tree = MerkleTree::from_strings(&AREA);
        let member = tree.get_path(0).unwrap();
        let internal = tree.hasher().hash_two(&tree.hasher().hash_leaf(&member.leaf), &member.siblings[0]);

        // One level short: rejected by shape.
        let short = MerklePath::from_index(internal, vec![member.siblings[1]], 0);
        let forged = crafted_circuit_proof(internal, &short, &tree.root(), &mode);
        assert!(matches!(
            verify(&forged, &AREA, &mode),
            Err(ProofCoreError::InvalidProofInput(_))
        ));

        // Padded to full depth: the tagged leaf no longer reduces to the root.
        let padded = MerklePath::from_index(internal, vec![Fr::from(0u64), member.siblings[1]], 0);
        let forged = crafted_circuit_proof(internal, &padded, &tree.root(), &mode);
        assert!(!verify(&forged, &AREA, &mode).unwrap());
    }

    #[test]
    fn test_wrong_depth_circuit_proof_is_rejected() {
        let mode = circuit_mode();
        let proof = generate_membership_proof("JP-13-113-01", &VALID, &mode).unwrap();
        let result = verify_membership_proof(&proof, &root_of(&VALID), depth_of(&VALID) + 1, &mode);
        assert!(matches!(result, Err(ProofCoreError::InvalidProofInput(_))));
    }

    #[test]
    fn test_commitments_are_fresh_per_call() {
        let a = generate_membership_proof("JP-13-113-01", &VALID, &ProofMode::Fallback).unwrap();
        let b = generate_membership_proof("JP-13-113-01", &VALID, &ProofMode::Fallback).unwrap();
        assert_eq!(a.public_signals[0], b.public_signals[0]);
        assert_ne!(a.public_signals[1], b.public_signals[1]);
    }

    #[test]
    fn test_rejects_malformed_input() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            generate_membership_proof("JP-13-113-01", &empty, &ProofMode::Fallback),
            Err(ProofCoreError::InvalidProofInput(_))
        ));
        assert!(matches!(
            generate_membership_proof("not a pid", &VALID, &ProofMode::Fallback),
            Err(ProofCoreError::InvalidProofInput(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_membership_complete_and_sound(
            units in proptest::collection::btree_set(1u32..10_000, 1..12),
            outsider in 10_000u32..20_000,
        ) {
            let candidates: Vec<String> = units.iter().map(|u| format!("JP-13-{u}")).collect();
            let tree = MerkleTree::from_strings(&candidates);

            for pid in &candidates {
                let proof = generate_membership_proof(pid, &candidates, &ProofMode::Fallback).unwrap();
                prop_assert!(verify_membership_proof(&proof, &tree.root(), tree.depth(), &ProofMode::Fallback).unwrap());
            }

            let stranger = format!("JP-13-{outsider}");
            let proof = generate_membership_proof(&stranger, &candidates, &ProofMode::Fallback).unwrap();
            prop_assert!(!verify_membership_proof(&proof, &tree.root(), tree.depth(), &ProofMode::Fallback).unwrap());
        }
    }
}
