//! Public entry point of the proof core.
//!
//! A [`ProofOrchestrator`] starts `Uninitialized`. Binding an identity and
//! a key pair moves it to `Initialized`; from then on every call is
//! independent and stateless apart from the two shared logs (revocations and
//! disclosures). Proof work runs on the blocking pool, bounded by the
//! configured timeout.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use ark_bn254::Fr;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::access::{evaluate_access_policy, AccessPolicy};
use crate::audit::{AuditLog, AuditLogEntry};
use crate::backend::{CircuitBackend, Groth16Backend};
use crate::config::ProofConfig;
use crate::credential::{self, create_address_credential, create_identity_document, IdentityDocument, SignedCredential};
use crate::crypto::{KeyPair, PublicKey};
use crate::error::{CoreResult, ProofCoreError};
use crate::pid::PlaceId;
use crate::proofs::{self, Expectation, ProofMode, ProofObject, ProofPattern, VersionWitness};
use crate::revocation::{RevocationEntry, RevocationRegistry, SignedRevocationList};

/// How long a carrier may use a granted address.
pub const CARRIER_ACCESS_HOURS: i64 = 24;

/// Identity and signing key bound at initialization.
pub struct ProverContext {
    pub identity: IdentityDocument,
    key_pair: KeyPair,
}

impl ProverContext {
    pub fn public_key(&self) -> PublicKey {
        self.key_pair.public_key()
    }
}

enum OrchestratorState {
    Uninitialized,
    Initialized(Arc<ProverContext>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRegistration {
    pub subject_id: String,
    pub pid: String,
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarrierAccessRecord {
    pub waybill_id: String,
    pub carrier: String,
    pub pid: String,
    pub granted_fields: BTreeSet<String>,
    pub denied_fields: BTreeSet<String>,
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Sequence of the audit entry, absent when nothing was granted.
    pub audit_sequence: Option<u64>,
}

/// Result of [`ProofOrchestrator::disclose_fields`].
#[derive(Debug, Clone)]
pub struct FieldDisclosure {
    pub proof: ProofObject,
    pub audit_entry: AuditLogEntry,
    pub denied_fields: BTreeSet<String>,
}

/// Result of [`ProofOrchestrator::relocate`].
#[derive(Debug, Clone)]
pub struct Relocation {
    pub proof: ProofObject,
    pub revocation: RevocationEntry,
    pub credential: SignedCredential,
}

pub struct ProofOrchestrator {
    config: ProofConfig,
    backend: Option<Arc<dyn CircuitBackend>>,
    state: RwLock<OrchestratorState>,
    revocations: RevocationRegistry,
    audit: AuditLog,
    access_policy: AccessPolicy,
}

impl ProofOrchestrator {
    /// Orchestrator for `config`; a Groth16 backend is attached when
    /// circuits are enabled.
    pub fn new(config: ProofConfig) -> CoreResult<Self> {
        config.validate()?;
        let backend = config.enable_circuits.then(|| {
            Arc::new(Groth16Backend::new(
                config.environment,
                config.circuit_key_dir.clone(),
            )) as Arc<dyn CircuitBackend>
        });
        Ok(Self::build(config, backend))
    }

    /// Orchestrator that proves with `backend` regardless of
    /// `config.enable_circuits`.
    pub fn with_backend(config: ProofConfig, backend: Arc<dyn CircuitBackend>) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self::build(config, Some(backend)))
    }

    fn build(config: ProofConfig, backend: Option<Arc<dyn CircuitBackend>>) -> Self {
        tracing::info!(
            environment = ?config.environment,
            backend = backend.as_ref().map_or("fallback-commitment", |b| b.name()),
            timeout_ms = config.proof_timeout_ms,
            "proof orchestrator created"
        );
        Self {
            config,
            backend,
            state: RwLock::new(OrchestratorState::Uninitialized),
            revocations: RevocationRegistry::new(),
            audit: AuditLog::new(),
            access_policy: AccessPolicy::carrier_default(),
        }
    }

    pub fn with_access_policy(mut self, policy: AccessPolicy) -> Self {
        self.access_policy = policy;
        self
    }

    pub fn config(&self) -> &ProofConfig {
        &self.config
    }

    pub fn mode(&self) -> ProofMode {
        match &self.backend {
            Some(backend) => ProofMode::Circuit(Arc::clone(backend)),
            None => ProofMode::Fallback,
        }
    }

    /// Bind `identity` and a key pair (generated when `None`).
    ///
    /// Calling this again replaces the bound identity; in-flight calls keep
    /// the context they started with.
    pub fn initialize(&self, identity: &str, key_pair: Option<KeyPair>) -> CoreResult<IdentityDocument> {
        let key_pair = key_pair.unwrap_or_else(KeyPair::generate);
        let document = create_identity_document(identity, &key_pair.public_key())?;
        let context = ProverContext {
            identity: document.clone(),
            key_pair,
        };
        *self.state.write() = OrchestratorState::Initialized(Arc::new(context));
        tracing::info!(identity = %document.id, "proof orchestrator initialized");
        Ok(document)
    }

    pub fn is_initialized(&self) -> bool {
        matches!(*self.state.read(), OrchestratorState::Initialized(_))
    }

    pub fn identity(&self) -> CoreResult<IdentityDocument> {
        Ok(self.context()?.identity.clone())
    }

    fn context(&self) -> CoreResult<Arc<ProverContext>> {
        match &*self.state.read() {
            OrchestratorState::Initialized(context) => Ok(Arc::clone(context)),
            OrchestratorState::Uninitialized => Err(ProofCoreError::NotInitialized),
        }
    }

    /// Run `work` on the blocking pool, giving up after the configured
    /// timeout.
    ///
    /// A timeout does not stop the worker: blocking tasks cannot be
    /// cancelled, so it runs to completion on the pool and its result is
    /// dropped. It still occupies a blocking thread until then.
    async fn run_bounded<T, F>(&self, span: tracing::Span, work: F) -> CoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> CoreResult<T> + Send + 'static,
    {
        let timeout_ms = self.config.proof_timeout_ms;
        let worker_span = span.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _entered = worker_span.enter();
            work()
        });

        async move {
            match tokio::time::timeout(Duration::from_millis(timeout_ms), task).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => Err(ProofCoreError::CircuitFailed(format!(
                    "proof worker failed: {join_error}"
                ))),
                Err(_) => {
                    tracing::warn!(timeout_ms, "proof operation timed out");
                    Err(ProofCoreError::ProofTimeout { timeout_ms })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn generate<F>(&self, pattern: ProofPattern, build: F) -> CoreResult<ProofObject>
    where
        F: FnOnce(&ProofMode) -> CoreResult<ProofObject> + Send + 'static,
    {
        self.context()?;
        let mode = self.mode();
        let span = tracing::info_span!("GeneratingProof", pattern = %pattern, backend = %mode.kind());
        let proof = self.run_bounded(span, move || build(&mode)).await?;
        tracing::info!(pattern = %pattern, backend = %proof.backend, "proof generated");
        Ok(proof)
    }

    pub async fn generate_membership_proof<S: AsRef<str>>(
        &self,
        pid: &str,
        candidates: &[S],
    ) -> CoreResult<ProofObject> {
        let pid = pid.to_string();
        let candidates = owned(candidates);
        self.generate(ProofPattern::Membership, move |mode| {
            proofs::generate_membership_proof(&pid, &candidates, mode)
        })
        .await
    }

    pub async fn generate_structure_proof(
        &self,
        pid: &str,
        country_code: &str,
        depth: usize,
    ) -> CoreResult<ProofObject> {
        let pid = pid.to_string();
        let country_code = country_code.to_string();
        self.generate(ProofPattern::Structure, move |mode| {
            proofs::generate_structure_proof(&pid, &country_code, depth, mode)
        })
        .await
    }

    pub async fn generate_selective_reveal_proof<S: AsRef<str>>(
        &self,
        record: &BTreeMap<String, String>,
        reveal: &[S],
    ) -> CoreResult<ProofObject> {
        let record = record.clone();
        let reveal = owned(reveal);
        self.generate(ProofPattern::SelectiveReveal, move |mode| {
            proofs::generate_selective_reveal_proof(&record, &reveal, mode)
        })
        .await
    }

    pub async fn generate_version_proof(&self, witness: &VersionWitness) -> CoreResult<ProofObject> {
        let witness = witness.clone();
        self.generate(ProofPattern::Version, move |mode| {
            proofs::generate_version_proof(&witness, mode)
        })
        .await
    }

    pub async fn generate_locker_proof<S: AsRef<str>>(
        &self,
        locker_id: &str,
        candidates: &[S],
        facility_id: &str,
    ) -> CoreResult<ProofObject> {
        let locker_id = locker_id.to_string();
        let candidates = owned(candidates);
        let facility_id = facility_id.to_string();
        self.generate(ProofPattern::Locker, move |mode| {
            proofs::generate_locker_proof(&locker_id, &candidates, &facility_id, mode)
        })
        .await
    }

    /// Verify `proof` against what the caller expects.
    pub async fn verify_proof(&self, proof: &ProofObject, expectation: &Expectation) -> CoreResult<bool> {
        self.context()?;
        let mode = self.mode();
        let span = tracing::info_span!(
            "VerifyingProof",
            pattern = %proof.pattern,
            backend = %proof.backend
        );
        let proof = proof.clone();
        let expectation = expectation.clone();
        let valid = self
            .run_bounded(span, move || proofs::verify_proof(&proof, &expectation, &mode))
            .await?;
        tracing::info!(valid, "proof verified");
        Ok(valid)
    }

    /// [`Self::verify_proof`] followed by the revocation gate on
    /// `subject_pid`: a valid proof about a revoked subject is an error,
    /// not `false`.
    pub async fn verify_proof_for_subject(
        &self,
        proof: &ProofObject,
        expectation: &Expectation,
        subject_pid: &str,
    ) -> CoreResult<bool> {
        if !self.verify_proof(proof, expectation).await? {
            return Ok(false);
        }
        self.ensure_not_revoked(subject_pid)?;
        Ok(true)
    }

    /// Issue a signed credential binding the registration's subject to its
    /// PID.
    pub fn register_address(&self, registration: &AddressRegistration) -> CoreResult<SignedCredential> {
        let context = self.context()?;
        let place = PlaceId::parse(&registration.pid)?;
        self.ensure_not_revoked(place.as_str())?;
        self.issue_credential(&context, &registration.subject_id, &place, &registration.country_code)
    }

    fn issue_credential(
        &self,
        context: &ProverContext,
        subject_id: &str,
        place: &PlaceId,
        country_code: &str,
    ) -> CoreResult<SignedCredential> {
        let unsigned = create_address_credential(
            subject_id,
            &context.identity.id,
            place.as_str(),
            country_code,
            place.depth(),
        )?;
        let signed = credential::sign_credential(
            unsigned,
            &context.key_pair,
            &context.identity.verification_method(),
        )?;
        tracing::info!(credential = %signed.credential.id, depth = place.depth(), "address credential issued");
        Ok(signed)
    }

    /// Signature valid AND subject not revoked. A revoked subject is
    /// reported as [`ProofCoreError::RevokedSubject`].
    pub fn verify_credential(&self, signed: &SignedCredential, public_key: &PublicKey) -> CoreResult<bool> {
        if !credential::verify_credential(signed, public_key)? {
            return Ok(false);
        }
        self.ensure_not_revoked(signed.pid())?;
        Ok(true)
    }

    /// Disclose the policy-permitted subset of `fields` to a carrier for
    /// one waybill, recording exactly what was granted.
    pub fn grant_carrier_access<S: AsRef<str>>(
        &self,
        waybill_id: &str,
        carrier: &str,
        pid: &str,
        fields: &[S],
    ) -> CoreResult<CarrierAccessRecord> {
        self.context()?;
        if waybill_id.trim().is_empty() || carrier.trim().is_empty() {
            return Err(ProofCoreError::invalid("waybill and carrier are required"));
        }
        if fields.is_empty() {
            return Err(ProofCoreError::invalid("no fields requested"));
        }
        let place = PlaceId::parse(pid)?;
        self.ensure_not_revoked(place.as_str())?;

        let decision = evaluate_access_policy(&self.access_policy, fields, carrier);
        let audit_sequence = if decision.allowed.is_empty() {
            None
        } else {
            let entry = self.audit.log_access(
                place.as_str(),
                carrier,
                &format!("delivery:{waybill_id}"),
                &decision.allowed,
            )?;
            Some(entry.sequence)
        };

        let granted_at = Utc::now();
        Ok(CarrierAccessRecord {
            waybill_id: waybill_id.to_string(),
            carrier: carrier.to_string(),
            pid: place.as_str().to_string(),
            granted_fields: decision.allowed,
            denied_fields: decision.denied,
            granted_at,
            expires_at: granted_at + chrono::Duration::hours(CARRIER_ACCESS_HOURS),
            audit_sequence,
        })
    }

    /// Selectively reveal the permitted `fields` of `record` to `accessor`
    /// and record the disclosure.
    pub async fn disclose_fields<S: AsRef<str>>(
        &self,
        pid: &str,
        accessor: &str,
        purpose: &str,
        record: &BTreeMap<String, String>,
        fields: &[S],
    ) -> CoreResult<FieldDisclosure> {
        let place = PlaceId::parse(pid)?;
        self.ensure_not_revoked(place.as_str())?;

        let decision = evaluate_access_policy(&self.access_policy, fields, accessor);
        if decision.allowed.is_empty() {
            return Err(ProofCoreError::invalid(format!(
                "no requested field may be disclosed to {accessor}"
            )));
        }
        let allowed: Vec<String> = decision.allowed.iter().cloned().collect();
        let proof = self.generate_selective_reveal_proof(record, &allowed).await?;
        let audit_entry = self
            .audit
            .log_access(place.as_str(), accessor, purpose, &decision.allowed)?;

        Ok(FieldDisclosure {
            proof,
            audit_entry,
            denied_fields: decision.denied,
        })
    }

    /// Move a subject from `witness.old_pid` to `witness.new_pid`.
    ///
    /// The version proof must verify against `old_commitment` (recorded at
    /// registration); only then is the old PID revoked and a credential for
    /// the new PID issued. An already revoked old PID cannot be relocated
    /// again, and of two concurrent relocations of one PID only the first
    /// to revoke it issues a credential.
    pub async fn relocate(
        &self,
        subject_id: &str,
        witness: &VersionWitness,
        old_commitment: &Fr,
    ) -> CoreResult<Relocation> {
        let context = self.context()?;
        let old_place = PlaceId::parse(&witness.old_pid)?;
        let new_place = PlaceId::parse(&witness.new_pid)?;
        self.ensure_not_revoked(old_place.as_str())?;
        self.ensure_not_revoked(new_place.as_str())?;

        let proof = self.generate_version_proof(witness).await?;
        let expectation = Expectation::Version {
            old_commitment: *old_commitment,
        };
        if !self.verify_proof(&proof, &expectation).await? {
            return Err(ProofCoreError::invalid(
                "version proof does not match the registered commitment",
            ));
        }

        let revocation = self.revocations.try_revoke(old_place.as_str(), "relocated")?;
        let credential = self.issue_credential(
            &context,
            subject_id,
            &new_place,
            new_place.country_code(),
        )?;
        tracing::info!(revocation = revocation.sequence, "subject relocated");

        Ok(Relocation {
            proof,
            revocation,
            credential,
        })
    }

    pub fn revoke_address(&self, pid: &str, reason: &str) -> CoreResult<RevocationEntry> {
        self.context()?;
        self.revocations.add_entry(pid, reason)
    }

    pub fn is_revoked(&self, pid: &str) -> bool {
        self.revocations.is_revoked(pid)
    }

    fn ensure_not_revoked(&self, pid: &str) -> CoreResult<()> {
        if self.revocations.is_revoked(pid) {
            tracing::warn!("rejecting revoked subject");
            return Err(ProofCoreError::RevokedSubject {
                pid: pid.trim().to_string(),
            });
        }
        Ok(())
    }

    /// Current revocation list, signed with the bound key.
    pub fn signed_revocation_list(&self) -> CoreResult<SignedRevocationList> {
        let context = self.context()?;
        self.revocations.sign(&context.key_pair, &context.identity.id)
    }

    pub fn revocations(&self) -> &RevocationRegistry {
        &self.revocations
    }

    /// Snapshot of every recorded disclosure.
    pub fn audit_log(&self) -> Arc<Vec<AuditLogEntry>> {
        self.audit.snapshot()
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }
}

fn owned<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    items.iter().map(|s| s.as_ref().to_string()).collect()
}
