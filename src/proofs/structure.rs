//! Structure: a committed PID has the expected country and depth.
//!
//! Public signals: `[country_hash, depth, commitment]`. The commitment is
//! Poseidon over the segment fields and a nonce; the depth is a decimal
//! string. The circuit itself only exposes `[country_hash, commitment]`
//! because the depth is fixed by which circuit was used.

use ark_bn254::Fr;

use super::{
    accept_commitment_only, prove_with_backend, verify_with_backend, ProofMode, ProofObject, ProofPattern,
    ProofPayload,
};
use crate::circuit::{country_code_to_field, segment_to_field, CircuitId, CircuitInput, StructureCircuit};
use crate::crypto::{field_to_hex, random_nonce};
use crate::error::{CoreResult, ProofCoreError};
use crate::merkle::PoseidonHasher;
use crate::pid::PlaceId;

/// Prove that `pid` has `depth` segments and starts with `country_code`.
///
/// The proof describes the PID as it actually is. When that differs from
/// the expected country or depth it is still produced, and a verifier
/// holding those expectations rejects it.
pub fn generate_structure_proof(
    pid: &str,
    country_code: &str,
    depth: usize,
    mode: &ProofMode,
) -> CoreResult<ProofObject> {
    let pid = PlaceId::parse(pid)?;
    if country_code.trim().is_empty() || depth == 0 {
        return Err(ProofCoreError::invalid(
            "expected country code and depth are required",
        ));
    }
    let consistent = pid.country_code().eq_ignore_ascii_case(country_code) && pid.depth() == depth;
    tracing::debug!(depth = pid.depth(), consistent, backend = %mode.kind(), "building structure proof");

    let nonce = random_nonce();
    let depth_signal = pid.depth().to_string();

    match mode {
        ProofMode::Fallback => {
            let mut preimage: Vec<Fr> = pid
                .segments()
                .iter()
                .enumerate()
                .map(|(i, s)| segment_to_field(i, s))
                .collect();
            preimage.push(nonce);
            let commitment = PoseidonHasher::new().hash_many(&preimage);
            Ok(ProofObject::new(
                ProofPattern::Structure,
                ProofPayload::CommitmentOnly,
                vec![
                    field_to_hex(&country_code_to_field(pid.country_code())),
                    depth_signal,
                    field_to_hex(&commitment),
                ],
            ))
        }
        ProofMode::Circuit(backend) => {
            let circuit = StructureCircuit::new_with_witness(pid.segments(), nonce);
            let proof = prove_with_backend(backend.as_ref(), CircuitInput::Structure(circuit))?;
            let [country_hash, commitment] = <[String; 2]>::try_from(proof.public_signals.clone())
                .map_err(|_| ProofCoreError::CircuitFailed("structure circuit signal count".to_string()))?;
            let signals = vec![country_hash, depth_signal, commitment];
            Ok(ProofObject::new(
                ProofPattern::Structure,
                ProofPayload::Circuit(proof),
                signals,
            ))
        }
    }
}

pub fn verify_structure_proof(
    proof: &ProofObject,
    country_code: &str,
    depth: usize,
    mode: &ProofMode,
) -> CoreResult<bool> {
    proof.expect_shape(ProofPattern::Structure, 3)?;
    let country_hash = proof.signal(0)?;
    let claimed_depth: usize = proof.public_signals[1]
        .parse()
        .map_err(|_| ProofCoreError::invalid("structure depth signal is not a number"))?;
    proof.signal(2)?;

    if country_hash != country_code_to_field(country_code) || claimed_depth != depth {
        return Ok(false);
    }

    match &proof.payload {
        // Commitment-only: the signals are all a fallback verifier can check.
        ProofPayload::CommitmentOnly => accept_commitment_only(mode, ProofPattern::Structure),
        ProofPayload::Circuit(circuit_proof) => {
            let circuit_signals = [
                proof.public_signals[0].clone(),
                proof.public_signals[2].clone(),
            ];
            verify_with_backend(
                mode,
                circuit_proof,
                |id| *id == CircuitId::Structure { depth },
                &circuit_signals,
            )
        }
        _ => Err(ProofCoreError::invalid("structure proof carries an unexpected payload")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proofs::tests::circuit_mode;

    #[test]
    fn test_consistent_pid_verifies() {
        let proof = generate_structure_proof("JP-13-113-01", "JP", 4, &ProofMode::Fallback).unwrap();
        assert_eq!(proof.public_signals[1], "4");
        assert!(verify_structure_proof(&proof, "JP", 4, &ProofMode::Fallback).unwrap());
        assert!(verify_structure_proof(&proof, "jp", 4, &ProofMode::Fallback).unwrap());
    }

    #[test]
    fn test_wrong_country_or_depth_fails() {
        let proof = generate_structure_proof("JP-13-113-01", "US", 4, &ProofMode::Fallback).unwrap();
        assert!(!verify_structure_proof(&proof, "US", 4, &ProofMode::Fallback).unwrap());

        let proof = generate_structure_proof("JP-13-113", "JP", 4, &ProofMode::Fallback).unwrap();
        assert!(!verify_structure_proof(&proof, "JP", 4, &ProofMode::Fallback).unwrap());
    }

    #[test]
    fn test_commitment_hides_segments() {
        let a = generate_structure_proof("JP-13-113-01", "JP", 4, &ProofMode::Fallback).unwrap();
        let b = generate_structure_proof("JP-13-113-01", "JP", 4, &ProofMode::Fallback).unwrap();
        assert_eq!(a.public_signals[0], b.public_signals[0]);
        assert_ne!(a.public_signals[2], b.public_signals[2]);
    }

    #[test]
    fn test_circuit_structure_proof() {
        let mode = circuit_mode();
        let proof = generate_structure_proof("JP-13-113-01", "JP", 4, &mode).unwrap();
        assert!(verify_structure_proof(&proof, "JP", 4, &mode).unwrap());
        assert!(!verify_structure_proof(&proof, "JP", 3, &mode).unwrap());
    }

    #[test]
    fn test_malformed_requests() {
        assert!(matches!(
            generate_structure_proof("JP--01", "JP", 3, &ProofMode::Fallback),
            Err(ProofCoreError::InvalidProofInput(_))
        ));
        assert!(matches!(
            generate_structure_proof("JP-13", "JP", 0, &ProofMode::Fallback),
            Err(ProofCoreError::InvalidProofInput(_))
        ));

        let mut proof = generate_structure_proof("JP-13", "JP", 2, &ProofMode::Fallback).unwrap();
        proof.public_signals[1] = "two".to_string();
        assert!(matches!(
            verify_structure_proof(&proof, "JP", 2, &ProofMode::Fallback),
            Err(ProofCoreError::InvalidProofInput(_))
        ));
    }

    #[test]
    fn test_circuit_verifier_requires_circuit_payload() {
        let proof = generate_structure_proof("JP-13-113-01", "JP", 4, &ProofMode::Fallback).unwrap();
        assert!(matches!(
            verify_structure_proof(&proof, "JP", 4, &circuit_mode()),
            Err(ProofCoreError::InvalidProofInput(_))
        ));
    }
}
