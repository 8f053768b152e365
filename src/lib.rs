//! PID Proof - prove facts about an address without revealing it
//!
//! Addresses are identified by hierarchical Place IDs (`JP-13-113-01`).
//! This crate proves statements about them while keeping the address hidden:
//! - Membership: "my PID is in this delivery area"
//! - Structure: "my PID is in Japan, at prefecture-level depth 4"
//! - Selective reveal: "here are my postal code and country, nothing else"
//! - Version: "my new PID belongs to the same subject as the old one"
//! - Locker: "my parcel locker is in this facility"
//!
//! Around the proofs sit signed address credentials, an append-only
//! revocation registry, field-level access policy and a hash-chained audit
//! log of every disclosure.
//!
//! # Architecture
//!
//! 1. Caller builds a [`ProofOrchestrator`] from a [`ProofConfig`]
//! 2. Orchestrator is bound to an issuer identity and signing key
//! 3. Proofs are generated by a Groth16 backend, or by the commitment
//!    fallback when circuits are disabled
//! 4. Verifiers check a [`ProofObject`] against an [`Expectation`]

pub mod access;
pub mod audit;
pub mod backend;
pub mod circuit;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod ledger;
pub mod merkle;
pub mod orchestrator;
pub mod pid;
pub mod proofs;
pub mod revocation;

pub use access::{evaluate_access_policy, AccessDecision, AccessPolicy};
pub use audit::{AuditLog, AuditLogEntry};
pub use backend::{CircuitBackend, Groth16Backend};
pub use config::{Environment, ProofConfig};
pub use credential::{IdentityDocument, SignedCredential};
pub use crypto::{KeyPair, PublicKey, Signature};
pub use error::{CoreResult, ProofCoreError};
pub use orchestrator::{
    AddressRegistration, CarrierAccessRecord, FieldDisclosure, ProofOrchestrator, Relocation,
};
pub use pid::PlaceId;
pub use proofs::{
    verify_proof, BackendKind, Expectation, ProofMode, ProofObject, ProofPattern, VersionWitness,
};
pub use revocation::{RevocationEntry, RevocationRegistry, SignedRevocationList};
