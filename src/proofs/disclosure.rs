//! Selective reveal: disclose some fields of a committed address record.
//!
//! The record is committed as the root of a Merkle tree with one leaf per
//! field, `Poseidon(field_value(key, value), salt)`, in key order and with an
//! independent random salt per field. The root is the record commitment, so
//! two proofs over the same record share nothing an observer can link.
//!
//! Public signals: `[record_commitment, revealed_digest]` where
//! `revealed_digest = Poseidon(field values of the revealed keys)`.

use std::collections::{BTreeMap, BTreeSet};

use ark_bn254::Fr;

use super::{
    prove_with_backend, verify_with_backend, FieldOpening, ProofMode, ProofObject, ProofPattern,
    ProofPayload,
};
use crate::circuit::{record_field_value, CircuitId, CircuitInput, DisclosureCircuit, FieldOpeningWitness};
use crate::crypto::{field_to_hex, random_nonce};
use crate::error::{CoreResult, ProofCoreError};
use crate::merkle::{MerklePath, MerkleTree, PoseidonHasher};

/// Commit to `record` and reveal exactly the fields named in `reveal`.
///
/// The returned proof's `revealed_data` holds those fields and no others.
pub fn generate_selective_reveal_proof<S: AsRef<str>>(
    record: &BTreeMap<String, String>,
    reveal: &[S],
    mode: &ProofMode,
) -> CoreResult<ProofObject> {
    if record.is_empty() {
        return Err(ProofCoreError::invalid("address record has no fields"));
    }
    let reveal: BTreeSet<&str> = reveal.iter().map(|k| k.as_ref()).collect();
    if reveal.is_empty() {
        return Err(ProofCoreError::invalid("no fields selected for disclosure"));
    }
    if let Some(missing) = reveal.iter().find(|k| !record.contains_key(**k)) {
        return Err(ProofCoreError::invalid(format!(
            "field {missing:?} is not part of the record"
        )));
    }

    let hasher = PoseidonHasher::new();
    let salted: Vec<(&String, Fr, Fr)> = record
        .iter()
        .map(|(k, v)| (k, record_field_value(k, v), random_nonce()))
        .collect();
    let tree = MerkleTree::new(
        salted
            .iter()
            .map(|(_, value, salt)| hasher.hash_two(value, salt))
            .collect(),
    );
    let record_commitment = tree.root();

    let mut openings = Vec::with_capacity(reveal.len());
    let mut witnesses = Vec::with_capacity(reveal.len());
    for (position, (key, value, salt)) in salted.iter().enumerate() {
        if !reveal.contains(key.as_str()) {
            continue;
        }
        let path = tree
            .get_path(position)
            .ok_or_else(|| ProofCoreError::invalid("record field outside the record tree"))?;
        openings.push(FieldOpening {
            key: (*key).clone(),
            salt: *salt,
            siblings: path.siblings.clone(),
            index: path.index(),
        });
        witnesses.push(FieldOpeningWitness {
            value: *value,
            salt: *salt,
            path,
        });
    }

    let revealed: BTreeMap<String, String> = record
        .iter()
        .filter(|(k, _)| reveal.contains(k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    tracing::debug!(
        fields = record.len(),
        revealed = revealed.len(),
        backend = %mode.kind(),
        "building selective reveal proof"
    );

    let proof = match mode {
        ProofMode::Fallback => {
            let values: Vec<Fr> = witnesses.iter().map(|w| w.value).collect();
            ProofObject::new(
                ProofPattern::SelectiveReveal,
                ProofPayload::Disclosure { openings },
                vec![
                    field_to_hex(&record_commitment),
                    field_to_hex(&hasher.hash_many(&values)),
                ],
            )
        }
        ProofMode::Circuit(backend) => {
            let circuit = DisclosureCircuit::new_with_witness(&witnesses, record_commitment);
            let proof = prove_with_backend(backend.as_ref(), CircuitInput::Disclosure(circuit))?;
            let signals = proof.public_signals.clone();
            ProofObject::new(
                ProofPattern::SelectiveReveal,
                ProofPayload::Circuit(proof),
                signals,
            )
        }
    };
    Ok(proof.with_revealed_data(revealed))
}

/// Verify that `revealed_data` is a faithful subset of the committed record.
pub fn verify_selective_reveal_proof(
    proof: &ProofObject,
    record_commitment: Option<&Fr>,
    mode: &ProofMode,
) -> CoreResult<bool> {
    proof.expect_shape(ProofPattern::SelectiveReveal, 2)?;
    let commitment = proof.signal(0)?;
    let digest = proof.signal(1)?;
    let revealed = proof
        .revealed_data
        .as_ref()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ProofCoreError::invalid("selective reveal proof has no revealed data"))?;

    if record_commitment.is_some_and(|expected| *expected != commitment) {
        return Ok(false);
    }

    let hasher = PoseidonHasher::new();
    let values: Vec<Fr> = revealed
        .iter()
        .map(|(k, v)| record_field_value(k, v))
        .collect();
    if hasher.hash_many(&values) != digest {
        return Ok(false);
    }

    match &proof.payload {
        ProofPayload::Disclosure { openings } => {
            let opened: BTreeSet<&str> = openings.iter().map(|o| o.key.as_str()).collect();
            if opened.len() != openings.len() || !opened.iter().copied().eq(revealed.keys().map(String::as_str)) {
                return Ok(false);
            }
            Ok(openings.iter().all(|opening| {
                revealed.get(&opening.key).is_some_and(|value| {
                    let leaf = hasher.hash_two(&record_field_value(&opening.key, value), &opening.salt);
                    MerklePath::from_index(leaf, opening.siblings.clone(), opening.index)
                        .verify(&commitment, &hasher)
                })
            }))
        }
        ProofPayload::Circuit(circuit_proof) => verify_with_backend(
            mode,
            circuit_proof,
            |id| matches!(id, CircuitId::SelectiveReveal { revealed: n, .. } if *n == revealed.len()),
            &proof.public_signals,
        ),
        _ => Err(ProofCoreError::invalid(
            "selective reveal proof carries an unexpected payload",
        )),
    }
}
