//! Circuit backend adapter.
//!
//! The proof builders only ever talk to [`CircuitBackend`]; which engine sits
//! behind it (Groth16 with derived sandbox keys, Groth16 with production key
//! files, or a test double) is a deployment decision.

mod groth16;
mod keys;

use serde::{Deserialize, Serialize};

pub use groth16::Groth16Backend;
pub use keys::{CircuitKeys, KeyStore};

use crate::circuit::{CircuitId, CircuitInput};
use crate::error::CoreResult;

/// Output of [`CircuitBackend::full_prove`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitProof {
    pub circuit_id: CircuitId,
    /// Opaque, backend-specific proof bytes.
    #[serde(with = "crate::proofs::base64_bytes")]
    pub proof: Vec<u8>,
    /// Public inputs as hex field elements, in circuit order.
    pub public_signals: Vec<String>,
}

/// A swappable proving / verifying engine.
///
/// Calls may take from milliseconds to seconds; callers bound them with a
/// timeout (see [`ProofOrchestrator`](crate::ProofOrchestrator)).
pub trait CircuitBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Prove that `input` satisfies circuit `circuit_id`.
    fn full_prove(&self, circuit_id: &CircuitId, input: CircuitInput) -> CoreResult<CircuitProof>;

    /// Check `proof` against `public_signals` for circuit `circuit_id`.
    ///
    /// `Ok(false)` means a well-formed proof that does not verify.
    fn verify(
        &self,
        circuit_id: &CircuitId,
        public_signals: &[String],
        proof: &[u8],
    ) -> CoreResult<bool>;
}
