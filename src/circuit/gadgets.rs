//! In-circuit Poseidon and Merkle gadgets shared by all address circuits.

use ark_bn254::Fr;
use ark_crypto_primitives::sponge::{
    constraints::CryptographicSpongeVar,
    poseidon::{constraints::PoseidonSpongeVar, PoseidonConfig},
};
use ark_r1cs_std::{
    alloc::AllocVar, boolean::Boolean, fields::fp::FpVar, select::CondSelectGadget,
};
use ark_relations::r1cs::{ConstraintSystemRef, SynthesisError};

use crate::merkle::LEAF_DOMAIN;

/// Poseidon hash of an ordered list of variables; matches
/// [`PoseidonHasher::hash_many`](crate::merkle::PoseidonHasher::hash_many).
pub fn poseidon_hash(
    cs: ConstraintSystemRef<Fr>,
    config: &PoseidonConfig<Fr>,
    inputs: &[FpVar<Fr>],
) -> Result<FpVar<Fr>, SynthesisError> {
    let mut sponge = PoseidonSpongeVar::new(cs, config);
    for input in inputs {
        sponge.absorb(input)?;
    }
    let output = sponge.squeeze_field_elements(1)?;
    Ok(output[0].clone())
}

/// Allocate a list of private witnesses.
pub fn witness_vec(
    cs: ConstraintSystemRef<Fr>,
    values: &[Option<Fr>],
) -> Result<Vec<FpVar<Fr>>, SynthesisError> {
    values
        .iter()
        .map(|v| FpVar::new_witness(cs.clone(), || v.ok_or(SynthesisError::AssignmentMissing)))
        .collect()
}

/// Recompute a Merkle root from a raw leaf value and its authentication
/// path; matches [`MerklePath::compute_root`](crate::merkle::MerklePath::compute_root).
///
/// Siblings and direction bits are private witnesses.
pub fn merkle_root(
    cs: ConstraintSystemRef<Fr>,
    config: &PoseidonConfig<Fr>,
    leaf: FpVar<Fr>,
    siblings: &[Option<Fr>],
    indices: &[Option<bool>],
) -> Result<FpVar<Fr>, SynthesisError> {
    let sibling_vars = witness_vec(cs.clone(), siblings)?;
    let index_vars: Vec<Boolean<Fr>> = indices
        .iter()
        .map(|idx| Boolean::new_witness(cs.clone(), || idx.ok_or(SynthesisError::AssignmentMissing)))
        .collect::<Result<Vec<_>, _>>()?;

    let tag = FpVar::Constant(Fr::from(LEAF_DOMAIN));
    let mut current = poseidon_hash(cs.clone(), config, &[tag, leaf])?;
    for (sibling, is_right) in sibling_vars.iter().zip(index_vars.iter()) {
        // is_right: hash(sibling, current); otherwise hash(current, sibling)
        let left = FpVar::conditionally_select(is_right, sibling, &current)?;
        let right = FpVar::conditionally_select(is_right, &current, sibling)?;
        current = poseidon_hash(cs.clone(), config, &[left, right])?;
    }
    Ok(current)
}
