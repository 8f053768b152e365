//! Revocation registry and signed revocation lists.
//!
//! Entries are append-only: a revoked PID stays revoked. Lookups go through
//! a hash index so every proof verification can consult the registry
//! cheaply.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::crypto::{self, CryptoError, KeyPair, PublicKey, Signature};
use crate::error::{CoreResult, ProofCoreError};
use crate::ledger::AppendLog;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationEntry {
    pub sequence: u64,
    pub pid: String,
    pub reason: String,
    pub revoked_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct RevocationRegistry {
    log: AppendLog<RevocationEntry>,
    // PID -> position in `log`.
    index: RwLock<HashMap<String, usize>>,
}

impl RevocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke `pid`. Revoking an already revoked PID returns the original
    /// entry unchanged.
    pub fn add_entry(&self, pid: &str, reason: &str) -> CoreResult<RevocationEntry> {
        self.insert(pid, reason, false)
    }

    /// Revoke `pid` only if it has no entry yet.
    ///
    /// Of several concurrent calls for one PID exactly one succeeds; the
    /// rest fail with [`ProofCoreError::RevokedSubject`].
    pub fn try_revoke(&self, pid: &str, reason: &str) -> CoreResult<RevocationEntry> {
        self.insert(pid, reason, true)
    }

    fn insert(&self, pid: &str, reason: &str, exclusive: bool) -> CoreResult<RevocationEntry> {
        let pid = pid.trim();
        if pid.is_empty() || reason.trim().is_empty() {
            return Err(ProofCoreError::invalid("revocation needs a PID and a reason"));
        }

        // Lock order: index, then log.
        let mut index = self.index.write();
        if let Some(&position) = index.get(pid) {
            if exclusive {
                return Err(ProofCoreError::RevokedSubject { pid: pid.to_string() });
            }
            if let Some(existing) = self.log.snapshot().get(position) {
                return Ok(existing.clone());
            }
        }

        let entry = self.log.append(|existing| {
            Ok(RevocationEntry {
                sequence: existing.len() as u64,
                pid: pid.to_string(),
                reason: reason.to_string(),
                revoked_at: Utc::now(),
            })
        })?;
        index.insert(entry.pid.clone(), entry.sequence as usize);

        tracing::info!(sequence = entry.sequence, "revocation entry appended");
        Ok(entry)
    }

    pub fn is_revoked(&self, pid: &str) -> bool {
        self.index.read().contains_key(pid.trim())
    }

    pub fn entry_for(&self, pid: &str) -> Option<RevocationEntry> {
        let position = *self.index.read().get(pid.trim())?;
        self.log.snapshot().get(position).cloned()
    }

    pub fn snapshot(&self) -> Arc<Vec<RevocationEntry>> {
        self.log.snapshot()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Sign the current contents.
    pub fn sign(&self, key_pair: &KeyPair, issuer: &str) -> CoreResult<SignedRevocationList> {
        sign_list(&self.snapshot(), key_pair, issuer)
    }
}

/// A revocation list with a signature over all of its entries.
///
/// Self-describing: it carries the signer's public key, so it can be
/// re-verified from its stored bytes alone. Callers decide whether that
/// key is one they trust (see [`SignedRevocationList::verify_against`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedRevocationList {
    pub entries: Vec<RevocationEntry>,
    pub issuer: String,
    pub signed_at: DateTime<Utc>,
    /// Hex SHA-256 over the encoded entries, issuer and signing time.
    pub digest: String,
    pub signature: Signature,
    pub public_key: PublicKey,
}

fn list_digest(entries: &[RevocationEntry], issuer: &str, signed_at: &DateTime<Utc>) -> CoreResult<[u8; 32]> {
    let encoded = bincode::serialize(&(entries, issuer, signed_at))
        .map_err(|e| CryptoError::Serialization(e.to_string()))?;
    Ok(crypto::hash(&encoded))
}

pub fn sign_list(entries: &[RevocationEntry], key_pair: &KeyPair, issuer: &str) -> CoreResult<SignedRevocationList> {
    let signed_at = Utc::now().trunc_subsecs(0);
    let digest = list_digest(entries, issuer, &signed_at)?;
    tracing::debug!(entries = entries.len(), "signing revocation list");

    Ok(SignedRevocationList {
        entries: entries.to_vec(),
        issuer: issuer.to_string(),
        signed_at,
        digest: hex::encode(digest),
        signature: key_pair.sign(&digest),
        public_key: key_pair.public_key(),
    })
}

impl SignedRevocationList {
    /// Check the digest and the embedded signature.
    pub fn verify(&self) -> CoreResult<bool> {
        let digest = list_digest(&self.entries, &self.issuer, &self.signed_at)?;
        if hex::encode(digest) != self.digest {
            return Ok(false);
        }
        Ok(crypto::verify(&digest, &self.signature, &self.public_key)?)
    }

    /// [`Self::verify`], additionally requiring the list to be signed by
    /// `trusted`.
    pub fn verify_against(&self, trusted: &PublicKey) -> CoreResult<bool> {
        Ok(self.public_key == *trusted && self.verify()?)
    }

    pub fn is_revoked(&self, pid: &str) -> bool {
        self.entries.iter().any(|e| e.pid == pid)
    }

    pub fn to_bytes(&self) -> CoreResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| CryptoError::Serialization(e.to_string()).into())
    }

    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        bincode::deserialize(bytes).map_err(|e| CryptoError::Serialization(e.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_revocation_is_append_only_and_idempotent() {
        let registry = RevocationRegistry::new();
        let first = registry.add_entry("JP-13-113-01", "moved").unwrap();
        let again = registry.add_entry("JP-13-113-01", "duplicate").unwrap();

        assert_eq!(first, again);
        assert_eq!(registry.len(), 1);
        assert!(registry.is_revoked("JP-13-113-01"));
        assert!(!registry.is_revoked("JP-27-100-05"));
        assert_eq!(registry.entry_for("JP-13-113-01").unwrap().reason, "moved");
    }

    #[test]
    fn test_rejects_empty_input() {
        let registry = RevocationRegistry::new();
        assert!(registry.add_entry("", "moved").is_err());
        assert!(registry.add_entry("JP-13", " ").is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_signed_list_verifies_offline() {
        let registry = RevocationRegistry::new();
        registry.add_entry("JP-13-113-01", "moved").unwrap();
        registry.add_entry("JP-27-100-05", "fraud").unwrap();

        let issuer = KeyPair::generate();
        let list = registry.sign(&issuer, "did:example:registry").unwrap();
        let restored = SignedRevocationList::from_bytes(&list.to_bytes().unwrap()).unwrap();

        assert_eq!(restored, list);
        assert!(restored.verify().unwrap());
        assert!(restored.verify_against(&issuer.public_key()).unwrap());
        assert!(!restored.verify_against(&KeyPair::generate().public_key()).unwrap());
        assert!(restored.is_revoked("JP-27-100-05"));
    }

    #[test]
    fn test_dropping_an_entry_breaks_the_list() {
        let registry = RevocationRegistry::new();
        registry.add_entry("JP-13-113-01", "moved").unwrap();
        registry.add_entry("JP-27-100-05", "fraud").unwrap();

        let mut list = registry.sign(&KeyPair::generate(), "did:example:registry").unwrap();
        list.entries.remove(0);
        assert!(!list.verify().unwrap());
    }

    #[test]
    fn test_concurrent_revocations() {
        let registry = Arc::new(RevocationRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for i in 0..50 {
                        registry.add_entry(&format!("JP-{t}-{i}"), "bulk").unwrap();
                        registry.add_entry("JP-0-0", "shared").unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 200);
        let snapshot = registry.snapshot();
        assert!(snapshot.iter().enumerate().all(|(i, e)| e.sequence == i as u64));
    }

    #[test]
    fn test_try_revoke_succeeds_once_under_contention() {
        let registry = Arc::new(RevocationRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.try_revoke("JP-13-113-01", "relocated"))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ProofCoreError::RevokedSubject { pid } if pid == "JP-13-113-01")));
        assert_eq!(registry.len(), 1);
    }
}
