//! Deployment configuration for the proof core.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{CoreResult, ProofCoreError};

pub const DEFAULT_PROOF_TIMEOUT_MS: u64 = 30_000;
pub const MAX_PROOF_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Circuit keys may be derived on first use when no key files exist.
    Sandbox,
    /// Circuit keys must be loaded from the key directory.
    Production,
}

impl std::str::FromStr for Environment {
    type Err = ProofCoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "production" => Ok(Self::Production),
            other => Err(ProofCoreError::invalid(format!("unknown environment {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofConfig {
    pub environment: Environment,

    /// Route proofs through the circuit backend instead of the commitment
    /// fallback.
    pub enable_circuits: bool,

    /// Upper bound for a single generation or verification call.
    pub proof_timeout_ms: u64,

    /// Directory holding `<circuit_id>.pk` / `<circuit_id>.vk` files.
    #[serde(default)]
    pub circuit_key_dir: Option<PathBuf>,
}

impl Default for ProofConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Sandbox,
            enable_circuits: false,
            proof_timeout_ms: DEFAULT_PROOF_TIMEOUT_MS,
            circuit_key_dir: None,
        }
    }
}

impl ProofConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `PID_PROOF_ENVIRONMENT`: sandbox/production (default: sandbox)
    /// - `PID_PROOF_ENABLE_CIRCUITS`: true/false (default: false)
    /// - `PID_PROOF_TIMEOUT_MS`: per-call timeout (default: 30000)
    /// - `PID_PROOF_KEY_DIR`: circuit key directory (default: unset)
    ///
    /// A variable that is set but cannot be parsed is an error rather than
    /// a silent default.
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CoreResult<Self> {
        let config = Self {
            environment: match lookup("PID_PROOF_ENVIRONMENT") {
                Some(value) => value.parse()?,
                None => Environment::Sandbox,
            },
            enable_circuits: match lookup("PID_PROOF_ENABLE_CIRCUITS") {
                Some(value) => value.trim().parse().map_err(|_| {
                    ProofCoreError::invalid(format!("PID_PROOF_ENABLE_CIRCUITS: expected true or false, got {value:?}"))
                })?,
                None => false,
            },
            proof_timeout_ms: match lookup("PID_PROOF_TIMEOUT_MS") {
                Some(value) => value.trim().parse().map_err(|_| {
                    ProofCoreError::invalid(format!("PID_PROOF_TIMEOUT_MS: expected milliseconds, got {value:?}"))
                })?,
                None => DEFAULT_PROOF_TIMEOUT_MS,
            },
            circuit_key_dir: lookup("PID_PROOF_KEY_DIR").map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> CoreResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ProofCoreError::invalid(format!("config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.proof_timeout_ms == 0 {
            return Err(ProofCoreError::invalid("proofTimeoutMs must be > 0"));
        }
        if self.proof_timeout_ms > MAX_PROOF_TIMEOUT_MS {
            return Err(ProofCoreError::invalid(format!(
                "proofTimeoutMs too large (max {MAX_PROOF_TIMEOUT_MS})"
            )));
        }
        if self.enable_circuits
            && self.environment == Environment::Production
            && self.circuit_key_dir.is_none()
        {
            return Err(ProofCoreError::invalid(
                "production circuits require circuitKeyDir",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProofConfig::default();
        assert_eq!(config.environment, Environment::Sandbox);
        assert!(!config.enable_circuits);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json() {
        let config = ProofConfig::from_json(
            r#"{"environment":"production","enableCircuits":true,"proofTimeoutMs":5000,"circuitKeyDir":"/var/lib/pid-proof/keys"}"#,
        )
        .unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.proof_timeout_ms, 5000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ProofConfig {
            proof_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.proof_timeout_ms = MAX_PROOF_TIMEOUT_MS + 1;
        assert!(config.validate().is_err());

        config.proof_timeout_ms = 1000;
        config.environment = Environment::Production;
        config.enable_circuits = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("SANDBOX".parse::<Environment>().unwrap(), Environment::Sandbox);
        assert!("staging".parse::<Environment>().is_err());
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: std::collections::HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_lookup_reads_variables() {
        let config = ProofConfig::from_lookup(vars(&[
            ("PID_PROOF_ENABLE_CIRCUITS", "true"),
            ("PID_PROOF_TIMEOUT_MS", "1500"),
        ]))
        .unwrap();
        assert!(config.enable_circuits);
        assert_eq!(config.proof_timeout_ms, 1500);

        let config = ProofConfig::from_lookup(vars(&[])).unwrap();
        assert!(!config.enable_circuits);
        assert_eq!(config.proof_timeout_ms, DEFAULT_PROOF_TIMEOUT_MS);
    }

    #[test]
    fn test_unparsable_variables_are_rejected() {
        for pairs in [
            [("PID_PROOF_ENABLE_CIRCUITS", "yes")],
            [("PID_PROOF_TIMEOUT_MS", "30s")],
            [("PID_PROOF_TIMEOUT_MS", "-5")],
        ] {
            assert!(matches!(
                ProofConfig::from_lookup(vars(&pairs)),
                Err(ProofCoreError::InvalidProofInput(_))
            ));
        }
    }
}
