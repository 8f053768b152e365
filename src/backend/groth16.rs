//! Groth16 (BN254) implementation of the circuit backend.

use std::path::PathBuf;
use std::sync::Arc;

use ark_bn254::{Bn254, Fr};
use ark_groth16::Groth16;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use ark_std::rand::{rngs::StdRng, SeedableRng};

use super::keys::KeyStore;
use super::{CircuitBackend, CircuitProof};
use crate::circuit::{CircuitId, CircuitInput};
use crate::config::Environment;
use crate::crypto::{field_from_hex, field_to_hex, random_bytes};
use crate::error::{CoreResult, ProofCoreError};

pub struct Groth16Backend {
    keys: Arc<KeyStore>,
}

impl Groth16Backend {
    pub fn new(environment: Environment, key_dir: Option<PathBuf>) -> Self {
        Self::with_key_store(Arc::new(KeyStore::new(environment, key_dir)))
    }

    pub fn with_key_store(keys: Arc<KeyStore>) -> Self {
        Self { keys }
    }

    pub fn key_store(&self) -> &Arc<KeyStore> {
        &self.keys
    }
}

impl CircuitBackend for Groth16Backend {
    fn name(&self) -> &'static str {
        "groth16-bn254"
    }

    fn full_prove(&self, circuit_id: &CircuitId, input: CircuitInput) -> CoreResult<CircuitProof> {
        if input.circuit_id() != *circuit_id {
            return Err(ProofCoreError::invalid(format!(
                "input has shape {} but circuit {circuit_id} was requested",
                input.circuit_id()
            )));
        }
        let public_inputs = input
            .public_inputs()
            .ok_or_else(|| ProofCoreError::invalid("circuit input is missing public values"))?;

        let keys = self.keys.get(circuit_id)?;

        let seed: [u8; 32] = random_bytes(32)
            .try_into()
            .map_err(|_| ProofCoreError::CircuitFailed("short randomness".to_string()))?;
        let mut rng = StdRng::from_seed(seed);

        let proof = Groth16::<Bn254>::prove(&keys.proving_key, input, &mut rng)
            .map_err(|e| ProofCoreError::CircuitFailed(e.to_string()))?;

        let mut proof_bytes = Vec::new();
        proof
            .serialize_compressed(&mut proof_bytes)
            .map_err(|e| ProofCoreError::CircuitFailed(e.to_string()))?;

        tracing::debug!(circuit = %circuit_id, bytes = proof_bytes.len(), "groth16 proof generated");

        Ok(CircuitProof {
            circuit_id: *circuit_id,
            proof: proof_bytes,
            public_signals: public_inputs.iter().map(field_to_hex).collect(),
        })
    }

    fn verify(
        &self,
        circuit_id: &CircuitId,
        public_signals: &[String],
        proof: &[u8],
    ) -> CoreResult<bool> {
        if public_signals.len() != circuit_id.public_input_count() {
            return Err(ProofCoreError::invalid(format!(
                "circuit {circuit_id} takes {} public signals, got {}",
                circuit_id.public_input_count(),
                public_signals.len()
            )));
        }
        let inputs = public_signals
            .iter()
            .map(|s| field_from_hex(s))
            .collect::<Result<Vec<Fr>, _>>()
            .map_err(|e| ProofCoreError::invalid(format!("public signal: {e}")))?;
        let proof = ark_groth16::Proof::<Bn254>::deserialize_compressed(proof)
            .map_err(|e| ProofCoreError::invalid(format!("undecodable groth16 proof: {e}")))?;

        let keys = self.keys.get(circuit_id)?;
        Groth16::<Bn254>::verify_with_processed_vk(&keys.prepared_vk, &inputs, &proof)
            .map_err(|e| ProofCoreError::CircuitFailed(e.to_string()))
    }
}
