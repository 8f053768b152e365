//! Groth16 key loading and caching.
//!
//! Keys are resolved once per circuit shape and then served from memory;
//! the cache is read-mostly and shared by all proving workers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ark_bn254::Bn254;
use ark_groth16::{Groth16, PreparedVerifyingKey, ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_snark::SNARK;
use ark_std::rand::{rngs::StdRng, SeedableRng};
use parking_lot::{Mutex, RwLock};

use crate::circuit::CircuitId;
use crate::config::Environment;
use crate::crypto::hash;
use crate::error::{CoreResult, ProofCoreError};

/// Proving and verifying material for one circuit shape.
pub struct CircuitKeys {
    pub proving_key: ProvingKey<Bn254>,
    pub verifying_key: VerifyingKey<Bn254>,
    pub prepared_vk: PreparedVerifyingKey<Bn254>,
}

impl CircuitKeys {
    fn new(proving_key: ProvingKey<Bn254>, verifying_key: VerifyingKey<Bn254>) -> CoreResult<Self> {
        let prepared_vk = Groth16::<Bn254>::process_vk(&verifying_key)
            .map_err(|e| ProofCoreError::BackendUnavailable(format!("verifying key: {e}")))?;
        Ok(Self {
            proving_key,
            verifying_key,
            prepared_vk,
        })
    }
}

pub struct KeyStore {
    environment: Environment,
    key_dir: Option<PathBuf>,
    cache: RwLock<HashMap<CircuitId, Arc<CircuitKeys>>>,
    // Serializes cache misses so a key is loaded or derived only once.
    loading: Mutex<()>,
}

impl KeyStore {
    pub fn new(environment: Environment, key_dir: Option<PathBuf>) -> Self {
        Self {
            environment,
            key_dir,
            cache: RwLock::new(HashMap::new()),
            loading: Mutex::new(()),
        }
    }

    /// Keys for `circuit_id`, loading or deriving them on first use.
    pub fn get(&self, circuit_id: &CircuitId) -> CoreResult<Arc<CircuitKeys>> {
        if let Some(keys) = self.cache.read().get(circuit_id) {
            tracing::trace!(circuit = %circuit_id, "circuit key cache hit");
            return Ok(Arc::clone(keys));
        }

        let _guard = self.loading.lock();
        if let Some(keys) = self.cache.read().get(circuit_id) {
            return Ok(Arc::clone(keys));
        }

        let keys = Arc::new(self.resolve(circuit_id)?);
        self.cache.write().insert(*circuit_id, Arc::clone(&keys));
        Ok(keys)
    }

    /// Number of circuit shapes currently cached.
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }

    /// Write the keys for `circuit_id` to `dir` so a production deployment
    /// can load them.
    pub fn export(&self, circuit_id: &CircuitId, dir: &Path) -> CoreResult<()> {
        let keys = self.get(circuit_id)?;
        let (pk_path, vk_path) = key_paths(dir, circuit_id);

        let mut pk_bytes = Vec::new();
        keys.proving_key
            .serialize_compressed(&mut pk_bytes)
            .map_err(|e| ProofCoreError::CircuitFailed(format!("serialize proving key: {e}")))?;
        let mut vk_bytes = Vec::new();
        keys.verifying_key
            .serialize_compressed(&mut vk_bytes)
            .map_err(|e| ProofCoreError::CircuitFailed(format!("serialize verifying key: {e}")))?;

        std::fs::create_dir_all(dir)
            .and_then(|_| std::fs::write(&pk_path, pk_bytes))
            .and_then(|_| std::fs::write(&vk_path, vk_bytes))
            .map_err(|e| ProofCoreError::BackendUnavailable(format!("write keys: {e}")))?;

        tracing::info!(circuit = %circuit_id, dir = %dir.display(), "exported circuit keys");
        Ok(())
    }

    fn resolve(&self, circuit_id: &CircuitId) -> CoreResult<CircuitKeys> {
        if let Some(dir) = &self.key_dir {
            if let Some(keys) = load_keys(dir, circuit_id)? {
                tracing::info!(circuit = %circuit_id, "loaded circuit keys from disk");
                return Ok(keys);
            }
        }

        match self.environment {
            Environment::Production => Err(ProofCoreError::BackendUnavailable(format!(
                "no key files for circuit {circuit_id}"
            ))),
            Environment::Sandbox => {
                tracing::warn!(
                    circuit = %circuit_id,
                    "deriving sandbox circuit keys; not for production use"
                );
                derive_keys(circuit_id)
            }
        }
    }
}

fn key_paths(dir: &Path, circuit_id: &CircuitId) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("{circuit_id}.pk")),
        dir.join(format!("{circuit_id}.vk")),
    )
}

/// `Ok(None)` when the key files are absent, `Err` when present but unusable.
fn load_keys(dir: &Path, circuit_id: &CircuitId) -> CoreResult<Option<CircuitKeys>> {
    let (pk_path, vk_path) = key_paths(dir, circuit_id);
    if !pk_path.exists() || !vk_path.exists() {
        return Ok(None);
    }

    let unavailable = |what: &str, e: &dyn std::fmt::Display| {
        ProofCoreError::BackendUnavailable(format!("{what} for {circuit_id}: {e}"))
    };

    let pk_bytes = std::fs::read(&pk_path).map_err(|e| unavailable("read proving key", &e))?;
    let vk_bytes = std::fs::read(&vk_path).map_err(|e| unavailable("read verifying key", &e))?;
    let proving_key = ProvingKey::<Bn254>::deserialize_compressed(&pk_bytes[..])
        .map_err(|e| unavailable("decode proving key", &e))?;
    let verifying_key = VerifyingKey::<Bn254>::deserialize_compressed(&vk_bytes[..])
        .map_err(|e| unavailable("decode verifying key", &e))?;

    CircuitKeys::new(proving_key, verifying_key).map(Some)
}

/// Circuit-specific setup with an RNG seeded from the circuit id, so every
/// sandbox process derives identical keys.
fn derive_keys(circuit_id: &CircuitId) -> CoreResult<CircuitKeys> {
    let seed = hash(format!("pid-proof/sandbox-setup/{circuit_id}").as_bytes());
    let mut rng = StdRng::from_seed(seed);

    let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(circuit_id.blank_input(), &mut rng)
        .map_err(|e| ProofCoreError::BackendUnavailable(format!("setup for {circuit_id}: {e}")))?;
    CircuitKeys::new(pk, vk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_derives_and_caches() {
        let store = KeyStore::new(Environment::Sandbox, None);
        let id = CircuitId::Membership { depth: 1 };

        let first = store.get(&id).unwrap();
        let second = store.get(&id).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.cached(), 1);
    }

    #[test]
    fn test_production_without_files_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::new(Environment::Production, Some(dir.path().to_path_buf()));
        let result = store.get(&CircuitId::Linkage);
        assert!(matches!(result, Err(ProofCoreError::BackendUnavailable(_))));
        assert_eq!(store.cached(), 0);
    }

    #[test]
    fn test_export_then_load_in_production() {
        let dir = tempfile::tempdir().unwrap();
        let id = CircuitId::Linkage;

        let sandbox = KeyStore::new(Environment::Sandbox, None);
        sandbox.export(&id, dir.path()).unwrap();

        let production = KeyStore::new(Environment::Production, Some(dir.path().to_path_buf()));
        let loaded = production.get(&id).unwrap();
        assert_eq!(loaded.verifying_key, sandbox.get(&id).unwrap().verifying_key);
    }

    #[test]
    fn test_corrupt_key_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let id = CircuitId::Linkage;
        let (pk, vk) = key_paths(dir.path(), &id);
        std::fs::write(pk, b"garbage").unwrap();
        std::fs::write(vk, b"garbage").unwrap();

        let store = KeyStore::new(Environment::Sandbox, Some(dir.path().to_path_buf()));
        assert!(matches!(
            store.get(&id),
            Err(ProofCoreError::BackendUnavailable(_))
        ));
    }
}
