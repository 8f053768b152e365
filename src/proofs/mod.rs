//! Proof builders for the five address proof patterns.
//!
//! Every builder runs in one of two modes. [`ProofMode::Fallback`] produces
//! Poseidon commitments and, for selective reveal, the openings of the
//! revealed fields. Membership, locker, structure and version fallbacks
//! carry nothing but their public signals: they hide the private input
//! computationally, and only an honest prover's output is meaningful.
//! [`ProofMode::Circuit`] hands a structured witness to a
//! [`CircuitBackend`] and ships the opaque proof. The mode that produced a
//! proof is always recorded in [`ProofObject::backend`], and a verifier that
//! holds a circuit backend refuses commitment-only proofs.
//!
//! Verification is `Ok(false)` for a well-formed proof that does not hold
//! and `Err(InvalidProofInput)` for a request that cannot be checked at all.

pub mod disclosure;
pub mod locker;
pub mod membership;
pub mod structure;
pub mod version;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ark_bn254::Fr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::{CircuitBackend, CircuitProof};
use crate::circuit::{CircuitId, CircuitInput};
use crate::crypto::field_from_hex;
use crate::error::{CoreResult, ProofCoreError};
use crate::merkle::MerkleTree;

pub use disclosure::{generate_selective_reveal_proof, verify_selective_reveal_proof};
pub use locker::{generate_locker_proof, locker_leaf, locker_root, locker_tree, verify_locker_proof};
pub use membership::{generate_membership_proof, verify_membership_proof};
pub use structure::{generate_structure_proof, verify_structure_proof};
pub use version::{generate_version_proof, verify_version_proof, VersionWitness};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProofPattern {
    Membership,
    Structure,
    SelectiveReveal,
    Version,
    Locker,
}

impl fmt::Display for ProofPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProofPattern::Membership => "membership",
            ProofPattern::Structure => "structure",
            ProofPattern::SelectiveReveal => "selective-reveal",
            ProofPattern::Version => "version",
            ProofPattern::Locker => "locker",
        })
    }
}

/// Which kind of backend produced a proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
    FallbackCommitment,
    Circuit,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::FallbackCommitment => "fallback-commitment",
            BackendKind::Circuit => "circuit",
        })
    }
}

/// Proving mode handed to every builder.
#[derive(Clone)]
pub enum ProofMode {
    Fallback,
    Circuit(Arc<dyn CircuitBackend>),
}

impl ProofMode {
    pub fn kind(&self) -> BackendKind {
        match self {
            ProofMode::Fallback => BackendKind::FallbackCommitment,
            ProofMode::Circuit(_) => BackendKind::Circuit,
        }
    }
}

impl fmt::Debug for ProofMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofMode::Fallback => f.write_str("Fallback"),
            ProofMode::Circuit(backend) => write!(f, "Circuit({})", backend.name()),
        }
    }
}

/// Opening of one revealed field of a committed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOpening {
    pub key: String,
    #[serde(with = "field_hex")]
    pub salt: Fr,
    #[serde(with = "field_hex_vec")]
    pub siblings: Vec<Fr>,
    pub index: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProofPayload {
    Disclosure { openings: Vec<FieldOpening> },
    /// The public signals are the whole proof.
    CommitmentOnly,
    Circuit(CircuitProof),
}

impl ProofPayload {
    pub fn backend_kind(&self) -> BackendKind {
        match self {
            ProofPayload::Circuit(_) => BackendKind::Circuit,
            _ => BackendKind::FallbackCommitment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofObject {
    pub pattern: ProofPattern,
    pub backend: BackendKind,
    pub payload: ProofPayload,
    pub public_signals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revealed_data: Option<BTreeMap<String, String>>,
    pub generated_at: DateTime<Utc>,
}

impl ProofObject {
    pub(crate) fn new(pattern: ProofPattern, payload: ProofPayload, public_signals: Vec<String>) -> Self {
        Self {
            pattern,
            backend: payload.backend_kind(),
            payload,
            public_signals,
            revealed_data: None,
            generated_at: Utc::now(),
        }
    }

    pub(crate) fn with_revealed_data(mut self, revealed: BTreeMap<String, String>) -> Self {
        self.revealed_data = Some(revealed);
        self
    }

    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string(self)
            .map_err(|e| ProofCoreError::invalid(format!("proof encoding: {e}")))
    }

    pub fn from_json(json: &str) -> CoreResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ProofCoreError::invalid(format!("proof decoding: {e}")))
    }

    /// Parsed field element at signal position `i`.
    pub(crate) fn signal(&self, i: usize) -> CoreResult<Fr> {
        let raw = self
            .public_signals
            .get(i)
            .ok_or_else(|| ProofCoreError::invalid(format!("missing public signal {i}")))?;
        field_from_hex(raw)
            .map_err(|e| ProofCoreError::invalid(format!("public signal {i}: {e}")))
    }

    pub(crate) fn expect_shape(&self, pattern: ProofPattern, signals: usize) -> CoreResult<()> {
        if self.pattern != pattern {
            return Err(ProofCoreError::invalid(format!(
                "expected a {pattern} proof, got {}",
                self.pattern
            )));
        }
        if self.backend != self.payload.backend_kind() {
            return Err(ProofCoreError::invalid(format!(
                "proof tagged {} carries a {} payload",
                self.backend,
                self.payload.backend_kind()
            )));
        }
        if self.public_signals.len() != signals {
            return Err(ProofCoreError::invalid(format!(
                "{pattern} proof needs {signals} public signals, got {}",
                self.public_signals.len()
            )));
        }
        Ok(())
    }
}

/// What a verifier already knows, per pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    /// Root and depth of the verifier's own current candidate tree.
    Membership { root: Fr, depth: usize },
    Structure { country_code: String, depth: usize },
    /// `None` accepts any record commitment the openings reduce to.
    SelectiveReveal { record_commitment: Option<Fr> },
    /// Commitment recorded when the old address was registered.
    Version { old_commitment: Fr },
    Locker {
        root: Fr,
        depth: usize,
        facility_id: String,
    },
}

impl Expectation {
    /// Membership expectation for the verifier's candidate PIDs.
    pub fn membership<S: AsRef<str>>(candidates: &[S]) -> Self {
        let tree = MerkleTree::from_strings(candidates);
        Expectation::Membership {
            root: tree.root(),
            depth: tree.depth(),
        }
    }

    /// Locker expectation for a facility's candidate lockers.
    pub fn locker<S: AsRef<str>>(facility_id: &str, lockers: &[S]) -> Self {
        let tree = locker::locker_tree(facility_id, lockers);
        Expectation::Locker {
            root: tree.root(),
            depth: tree.depth(),
            facility_id: facility_id.to_string(),
        }
    }

    pub fn pattern(&self) -> ProofPattern {
        match self {
            Expectation::Membership { .. } => ProofPattern::Membership,
            Expectation::Structure { .. } => ProofPattern::Structure,
            Expectation::SelectiveReveal { .. } => ProofPattern::SelectiveReveal,
            Expectation::Version { .. } => ProofPattern::Version,
            Expectation::Locker { .. } => ProofPattern::Locker,
        }
    }
}

/// Verify any proof against the matching expectation.
pub fn verify_proof(proof: &ProofObject, expectation: &Expectation, mode: &ProofMode) -> CoreResult<bool> {
    match expectation {
        Expectation::Membership { root, depth } => verify_membership_proof(proof, root, *depth, mode),
        Expectation::Structure {
            country_code,
            depth,
        } => verify_structure_proof(proof, country_code, *depth, mode),
        Expectation::SelectiveReveal { record_commitment } => {
            verify_selective_reveal_proof(proof, record_commitment.as_ref(), mode)
        }
        Expectation::Version { old_commitment } => verify_version_proof(proof, old_commitment, mode),
        Expectation::Locker {
            root,
            depth,
            facility_id,
        } => verify_locker_proof(proof, root, *depth, facility_id, mode),
    }
}

/// Prove `input` with the backend selected by `mode`.
pub(crate) fn prove_with_backend(backend: &dyn CircuitBackend, input: CircuitInput) -> CoreResult<CircuitProof> {
    let circuit_id = input.circuit_id();
    tracing::debug!(backend = backend.name(), circuit = %circuit_id, "delegating to circuit backend");
    backend.full_prove(&circuit_id, input)
}

/// Check a circuit payload: its shape must be acceptable and the backend
/// must accept `signals` for it.
pub(crate) fn verify_with_backend(
    mode: &ProofMode,
    proof: &CircuitProof,
    accept_shape: impl Fn(&CircuitId) -> bool,
    signals: &[String],
) -> CoreResult<bool> {
    let ProofMode::Circuit(backend) = mode else {
        return Err(ProofCoreError::BackendUnavailable(
            "circuit proof presented but no circuit backend is configured".to_string(),
        ));
    };
    if !accept_shape(&proof.circuit_id) {
        return Err(ProofCoreError::invalid(format!(
            "circuit {} does not fit this proof pattern",
            proof.circuit_id
        )));
    }
    backend.verify(&proof.circuit_id, signals, &proof.proof)
}

/// Outcome for a commitment-only payload whose signals already matched.
///
/// Nothing beyond the signals can be checked, so a verifier holding a
/// circuit backend does not accept one.
pub(crate) fn accept_commitment_only(mode: &ProofMode, pattern: ProofPattern) -> CoreResult<bool> {
    match mode {
        ProofMode::Fallback => Ok(true),
        ProofMode::Circuit(_) => Err(ProofCoreError::invalid(format!(
            "{pattern} proof has no circuit payload and circuits are enabled"
        ))),
    }
}

/// Reject a missing or empty candidate set.
pub(crate) fn require_candidates<S: AsRef<str>>(candidates: &[S], what: &str) -> CoreResult<()> {
    if candidates.is_empty() {
        return Err(ProofCoreError::invalid(format!("{what} candidate set is empty")));
    }
    if candidates.iter().any(|c| c.as_ref().trim().is_empty()) {
        return Err(ProofCoreError::invalid(format!("{what} candidate set contains an empty entry")));
    }
    Ok(())
}

/// Serde adapter: a field element as 64 hex characters.
pub(crate) mod field_hex {
    use ark_bn254::Fr;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::crypto::{field_from_hex, field_to_hex};

    pub fn serialize<S: Serializer>(value: &Fr, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&field_to_hex(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Fr, D::Error> {
        let s = String::deserialize(deserializer)?;
        field_from_hex(&s).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod field_hex_vec {
    use ark_bn254::Fr;
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::crypto::{field_from_hex, field_to_hex};

    pub fn serialize<S: Serializer>(values: &[Fr], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(field_to_hex))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Fr>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|s| field_from_hex(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

/// Serde adapter: opaque bytes as standard base64.
pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
