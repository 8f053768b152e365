//! Crate-level error taxonomy.
//!
//! A well-formed proof that fails verification is `Ok(false)`, never an
//! error. Every variant here means "do not trust this proof".

use crate::crypto::CryptoError;

/// Result type for proof-core operations.
pub type CoreResult<T> = Result<T, ProofCoreError>;

#[derive(Debug, thiserror::Error)]
pub enum ProofCoreError {
    #[error("Proof core not initialized: bind an identity and key pair first")]
    NotInitialized,

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Invalid proof input: {0}")]
    InvalidProofInput(String),

    /// The caller stopped waiting. The blocking worker is not cancelled; it
    /// finishes on its own and the result is discarded.
    #[error("Proof operation exceeded the configured timeout of {timeout_ms} ms")]
    ProofTimeout { timeout_ms: u64 },

    #[error("Subject {pid} is revoked")]
    RevokedSubject { pid: String },

    #[error("Circuit backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Circuit proving failed: {0}")]
    CircuitFailed(String),
}

impl ProofCoreError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidProofInput(msg.into())
    }
}
