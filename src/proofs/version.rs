//! Version linkage: two PIDs belong to the same subject across a relocation.
//!
//! Public signals: `[commitment_old, commitment_new, linkage]` with
//! `commitment = Poseidon(field(pid), field(secret), nonce)` and
//! `linkage = Poseidon(commitment_old, commitment_new, field(secret))`.
//! The verifier checks `commitment_old` against the commitment it recorded
//! when the old address was registered.

use ark_bn254::Fr;

use super::{
    accept_commitment_only, prove_with_backend, verify_with_backend, ProofMode, ProofObject, ProofPattern,
    ProofPayload,
};
use crate::circuit::{pid_commitment, CircuitId, CircuitInput, LinkageCircuit};
use crate::crypto::{field_to_hex, string_to_field};
use crate::error::{CoreResult, ProofCoreError};
use crate::merkle::PoseidonHasher;
use crate::pid::PlaceId;

/// Private inputs of a version proof.
#[derive(Clone)]
pub struct VersionWitness {
    pub old_pid: String,
    pub new_pid: String,
    pub secret: String,
    /// Nonce used for the registration commitment of `old_pid`.
    pub nonce: Fr,
}

impl std::fmt::Debug for VersionWitness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionWitness")
            .field("old_pid", &self.old_pid)
            .field("new_pid", &self.new_pid)
            .field("secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

pub fn generate_version_proof(witness: &VersionWitness, mode: &ProofMode) -> CoreResult<ProofObject> {
    let old_pid = PlaceId::parse(&witness.old_pid)?;
    let new_pid = PlaceId::parse(&witness.new_pid)?;
    if witness.secret.is_empty() {
        return Err(ProofCoreError::invalid("subject secret is empty"));
    }
    if old_pid == new_pid {
        return Err(ProofCoreError::invalid("relocation must change the PID"));
    }
    tracing::debug!(backend = %mode.kind(), "building version proof");

    match mode {
        ProofMode::Fallback => {
            let c_old = pid_commitment(old_pid.as_str(), &witness.secret, &witness.nonce);
            let c_new = pid_commitment(new_pid.as_str(), &witness.secret, &witness.nonce);
            let linkage = PoseidonHasher::new().hash_many(&[c_old, c_new, string_to_field(&witness.secret)]);
            Ok(ProofObject::new(
                ProofPattern::Version,
                ProofPayload::CommitmentOnly,
                vec![field_to_hex(&c_old), field_to_hex(&c_new), field_to_hex(&linkage)],
            ))
        }
        ProofMode::Circuit(backend) => {
            let circuit = LinkageCircuit::new_with_witness(
                old_pid.as_str(),
                new_pid.as_str(),
                &witness.secret,
                witness.nonce,
            );
            let proof = prove_with_backend(backend.as_ref(), CircuitInput::Linkage(circuit))?;
            let signals = proof.public_signals.clone();
            Ok(ProofObject::new(ProofPattern::Version, ProofPayload::Circuit(proof), signals))
        }
    }
}

pub fn verify_version_proof(proof: &ProofObject, old_commitment: &Fr, mode: &ProofMode) -> CoreResult<bool> {
    proof.expect_shape(ProofPattern::Version, 3)?;
    let c_old = proof.signal(0)?;
    let c_new = proof.signal(1)?;
    proof.signal(2)?;

    if c_old != *old_commitment || c_old == c_new {
        return Ok(false);
    }

    match &proof.payload {
        // Commitment-only: without the secret the linkage digest cannot be
        // recomputed, so only the old commitment is checked.
        ProofPayload::CommitmentOnly => accept_commitment_only(mode, ProofPattern::Version),
        ProofPayload::Circuit(circuit_proof) => verify_with_backend(
            mode,
            circuit_proof,
            |id| *id == CircuitId::Linkage,
            &proof.public_signals,
        ),
        _ => Err(ProofCoreError::invalid("version proof carries an unexpected payload")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proofs::tests::circuit_mode;

    fn witness(secret: &str) -> VersionWitness {
        VersionWitness {
            old_pid: "JP-13-113-01".to_string(),
            new_pid: "JP-27-100-05".to_string(),
            secret: secret.to_string(),
            nonce: Fr::from(4242u64),
        }
    }

    fn registered() -> Fr {
        pid_commitment("JP-13-113-01", "subject-secret", &Fr::from(4242u64))
    }

    #[test]
    fn test_valid_linkage_verifies() {
        let proof = generate_version_proof(&witness("subject-secret"), &ProofMode::Fallback).unwrap();
        assert!(verify_version_proof(&proof, &registered(), &ProofMode::Fallback).unwrap());
    }

    #[test]
    fn test_mismatched_secret_never_verifies() {
        let proof = generate_version_proof(&witness("someone-else"), &ProofMode::Fallback).unwrap();
        assert!(!verify_version_proof(&proof, &registered(), &ProofMode::Fallback).unwrap());

        let mode = circuit_mode();
        let proof = generate_version_proof(&witness("someone-else"), &mode).unwrap();
        assert!(!verify_version_proof(&proof, &registered(), &mode).unwrap());
    }

    #[test]
    fn test_circuit_linkage_verifies() {
        let mode = circuit_mode();
        let proof = generate_version_proof(&witness("subject-secret"), &mode).unwrap();
        assert!(verify_version_proof(&proof, &registered(), &mode).unwrap());
    }

    #[test]
    fn test_same_triple_is_deterministic() {
        let a = generate_version_proof(&witness("subject-secret"), &ProofMode::Fallback).unwrap();
        let b = generate_version_proof(&witness("subject-secret"), &ProofMode::Fallback).unwrap();
        assert_eq!(a.public_signals, b.public_signals);
    }

    #[test]
    fn test_rejects_unchanged_pid_and_redacts_secret() {
        let mut w = witness("subject-secret");
        w.new_pid = w.old_pid.clone();
        assert!(matches!(
            generate_version_proof(&w, &ProofMode::Fallback),
            Err(ProofCoreError::InvalidProofInput(_))
        ));
        assert!(!format!("{w:?}").contains("subject-secret"));
    }

    #[test]
    fn test_circuit_verifier_requires_circuit_payload() {
        let proof = generate_version_proof(&witness("subject-secret"), &ProofMode::Fallback).unwrap();
        assert!(matches!(
            verify_version_proof(&proof, &registered(), &circuit_mode()),
            Err(ProofCoreError::InvalidProofInput(_))
        ));
    }
}
