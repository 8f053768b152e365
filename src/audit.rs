//! Hash-chained audit log of address field disclosures.
//!
//! Each entry commits to its predecessor through `prev_hash`, so removing,
//! reordering or editing any stored entry is detectable offline with
//! [`verify_chain`].

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{hash_parts, CryptoError};
use crate::error::{CoreResult, ProofCoreError};
use crate::ledger::AppendLog;

/// `prev_hash` of the first entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub sequence: u64,
    pub pid: String,
    pub accessor: String,
    pub purpose: String,
    /// Exactly the fields disclosed, never a wildcard.
    pub disclosed_fields: BTreeSet<String>,
    pub timestamp: DateTime<Utc>,
    pub prev_hash: String,
    pub entry_hash: String,
}

impl AuditLogEntry {
    fn compute_hash(&self) -> String {
        let sequence = self.sequence.to_be_bytes();
        let timestamp = self.timestamp.to_rfc3339();
        let mut parts: Vec<&[u8]> = vec![
            &sequence[..],
            self.pid.as_bytes(),
            self.accessor.as_bytes(),
            self.purpose.as_bytes(),
            timestamp.as_bytes(),
            self.prev_hash.as_bytes(),
        ];
        parts.extend(self.disclosed_fields.iter().map(String::as_bytes));
        hex::encode(hash_parts(&parts))
    }
}

/// Check sequence numbers, links and hashes of a stored log.
pub fn verify_chain(entries: &[AuditLogEntry]) -> bool {
    let mut prev = GENESIS_HASH;
    for (i, entry) in entries.iter().enumerate() {
        if entry.sequence != i as u64 || entry.prev_hash != prev || entry.compute_hash() != entry.entry_hash {
            return false;
        }
        prev = entry.entry_hash.as_str();
    }
    true
}

#[derive(Debug, Default)]
pub struct AuditLog {
    log: AppendLog<AuditLogEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one disclosure of `fields` of `pid` to `accessor`.
    pub fn log_access<I, S>(&self, pid: &str, accessor: &str, purpose: &str, fields: I) -> CoreResult<AuditLogEntry>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let disclosed_fields: BTreeSet<String> = fields.into_iter().map(|f| f.as_ref().to_string()).collect();
        if disclosed_fields.is_empty() {
            return Err(ProofCoreError::invalid("an audit entry must name the disclosed fields"));
        }
        if pid.trim().is_empty() || accessor.trim().is_empty() {
            return Err(ProofCoreError::invalid("an audit entry needs a PID and an accessor"));
        }

        let entry = self.log.append(|existing| {
            let mut entry = AuditLogEntry {
                sequence: existing.len() as u64,
                pid: pid.to_string(),
                accessor: accessor.to_string(),
                purpose: purpose.to_string(),
                disclosed_fields,
                timestamp: Utc::now(),
                prev_hash: existing
                    .last()
                    .map_or_else(|| GENESIS_HASH.to_string(), |e| e.entry_hash.clone()),
                entry_hash: String::new(),
            };
            entry.entry_hash = entry.compute_hash();
            Ok(entry)
        })?;

        tracing::info!(
            sequence = entry.sequence,
            accessor = %entry.accessor,
            fields = entry.disclosed_fields.len(),
            "address disclosure recorded"
        );
        Ok(entry)
    }

    pub fn snapshot(&self) -> Arc<Vec<AuditLogEntry>> {
        self.log.snapshot()
    }

    pub fn entries_for(&self, pid: &str) -> Vec<AuditLogEntry> {
        self.snapshot().iter().filter(|e| e.pid == pid).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn verify(&self) -> bool {
        verify_chain(&self.snapshot())
    }

    pub fn to_bytes(&self) -> CoreResult<Vec<u8>> {
        bincode::serialize(self.snapshot().as_slice())
            .map_err(|e| CryptoError::Serialization(e.to_string()).into())
    }

    pub fn entries_from_bytes(bytes: &[u8]) -> CoreResult<Vec<AuditLogEntry>> {
        bincode::deserialize(bytes).map_err(|e| CryptoError::Serialization(e.to_string()).into())
    }
}
