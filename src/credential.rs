//! Identity documents and signed address credentials.
//!
//! Credentials follow the W3C Verifiable Credential envelope. The issuer's
//! Ed25519 signature covers the whole unsigned body, so any edit after
//! signing breaks verification. A valid signature says nothing about
//! revocation; the orchestrator adds that check.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{self, CryptoError, KeyPair, PublicKey, Signature};
use crate::error::{CoreResult, ProofCoreError};
use crate::pid::PlaceId;

pub const CREDENTIALS_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const ADDRESS_CREDENTIAL_TYPE: &str = "AddressCredential";

/// A subject's public identity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityDocument {
    pub id: String,
    pub public_key: PublicKey,
    pub created: DateTime<Utc>,
}

impl IdentityDocument {
    /// Key reference used in credential proofs.
    pub fn verification_method(&self) -> String {
        format!("{}#key-1", self.id)
    }
}

pub fn create_identity_document(identity: &str, public_key: &PublicKey) -> CoreResult<IdentityDocument> {
    let identity = identity.trim();
    if identity.is_empty() {
        return Err(ProofCoreError::invalid("identity must not be empty"));
    }
    Ok(IdentityDocument {
        id: identity.to_string(),
        public_key: *public_key,
        created: Utc::now(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSubject {
    pub id: String,
    pub pid: String,
    pub country_code: String,
    pub hierarchy_depth: usize,
}

/// Unsigned credential body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressCredential {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: String,
    #[serde(rename = "type")]
    pub credential_type: Vec<String>,
    pub issuer: String,
    #[serde(rename = "issuanceDate")]
    pub issuance_date: DateTime<Utc>,
    #[serde(rename = "credentialSubject")]
    pub credential_subject: AddressSubject,
}

impl AddressCredential {
    /// Bytes the issuer signs.
    pub fn signing_input(&self) -> CoreResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| CryptoError::Serialization(e.to_string()).into())
    }
}

/// Build an unsigned credential binding `subject_id` to `pid`.
///
/// `country_code` and `depth` must agree with the PID itself.
pub fn create_address_credential(
    subject_id: &str,
    issuer_id: &str,
    pid: &str,
    country_code: &str,
    depth: usize,
) -> CoreResult<AddressCredential> {
    let place = PlaceId::parse(pid)?;
    if subject_id.trim().is_empty() || issuer_id.trim().is_empty() {
        return Err(ProofCoreError::invalid("subject and issuer identities are required"));
    }
    if !place.country_code().eq_ignore_ascii_case(country_code) || place.depth() != depth {
        return Err(ProofCoreError::invalid(format!(
            "PID {place} does not match country {country_code} at depth {depth}"
        )));
    }

    Ok(AddressCredential {
        context: vec![CREDENTIALS_CONTEXT.to_string()],
        id: format!("urn:uuid:{}", Uuid::new_v4()),
        credential_type: vec![
            "VerifiableCredential".to_string(),
            ADDRESS_CREDENTIAL_TYPE.to_string(),
        ],
        issuer: issuer_id.to_string(),
        issuance_date: Utc::now().trunc_subsecs(0),
        credential_subject: AddressSubject {
            id: subject_id.to_string(),
            pid: place.as_str().to_string(),
            country_code: place.country_code().to_string(),
            hierarchy_depth: depth,
        },
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofType {
    Ed25519Signature2020,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProofPurpose {
    AssertionMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialProof {
    #[serde(rename = "type")]
    pub proof_type: ProofType,
    pub created: DateTime<Utc>,
    pub verification_method: String,
    pub proof_purpose: ProofPurpose,
    pub proof_value: Signature,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedCredential {
    #[serde(flatten)]
    pub credential: AddressCredential,
    pub proof: CredentialProof,
}

impl SignedCredential {
    pub fn pid(&self) -> &str {
        &self.credential.credential_subject.pid
    }

    pub fn subject(&self) -> &AddressSubject {
        &self.credential.credential_subject
    }
}

pub fn sign_credential(
    credential: AddressCredential,
    key_pair: &KeyPair,
    key_reference: &str,
) -> CoreResult<SignedCredential> {
    let signature = key_pair.sign(&credential.signing_input()?);
    Ok(SignedCredential {
        credential,
        proof: CredentialProof {
            proof_type: ProofType::Ed25519Signature2020,
            created: Utc::now().trunc_subsecs(0),
            verification_method: key_reference.to_string(),
            proof_purpose: ProofPurpose::AssertionMethod,
            proof_value: signature,
        },
    })
}

/// Signature check only; revocation is not consulted here.
pub fn verify_credential(signed: &SignedCredential, public_key: &PublicKey) -> CoreResult<bool> {
    let message = signed.credential.signing_input()?;
    Ok(crypto::verify(&message, &signed.proof.proof_value, public_key)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issued() -> (KeyPair, SignedCredential) {
        let issuer = KeyPair::generate();
        let credential =
            create_address_credential("did:example:alice", "did:example:registry", "JP-13-113-01", "JP", 4)
                .unwrap();
        let signed = sign_credential(credential, &issuer, "did:example:registry#key-1").unwrap();
        (issuer, signed)
    }

    #[test]
    fn test_sign_and_verify() {
        let (issuer, signed) = issued();
        assert!(verify_credential(&signed, &issuer.public_key()).unwrap());
        assert!(!verify_credential(&signed, &KeyPair::generate().public_key()).unwrap());
    }

    #[test]
    fn test_mutation_after_signing_fails() {
        let (issuer, mut signed) = issued();
        signed.credential.credential_subject.pid = "JP-13-113-02".to_string();
        assert!(!verify_credential(&signed, &issuer.public_key()).unwrap());
    }

    #[test]
    fn test_json_shape_and_roundtrip() {
        let (issuer, signed) = issued();
        let json = serde_json::to_value(&signed).unwrap();
        assert_eq!(json["@context"][0], CREDENTIALS_CONTEXT);
        assert_eq!(json["credentialSubject"]["countryCode"], "JP");
        assert_eq!(json["credentialSubject"]["hierarchyDepth"], 4);
        assert_eq!(json["proof"]["type"], "Ed25519Signature2020");
        assert_eq!(json["proof"]["proofPurpose"], "assertionMethod");
        assert!(json["id"].as_str().unwrap().starts_with("urn:uuid:"));

        let back: SignedCredential = serde_json::from_value(json).unwrap();
        assert!(verify_credential(&back, &issuer.public_key()).unwrap());
    }

    #[test]
    fn test_inconsistent_subject_is_rejected() {
        let result = create_address_credential("s", "i", "JP-13-113-01", "US", 4);
        assert!(matches!(result, Err(ProofCoreError::InvalidProofInput(_))));
        let result = create_address_credential("s", "i", "JP-13-113-01", "JP", 2);
        assert!(matches!(result, Err(ProofCoreError::InvalidProofInput(_))));
    }

    #[test]
    fn test_identity_document() {
        let key = KeyPair::generate().public_key();
        let doc = create_identity_document("did:example:registry", &key).unwrap();
        assert_eq!(doc.verification_method(), "did:example:registry#key-1");
        assert!(create_identity_document("  ", &key).is_err());
    }
}
