//! ZK circuit definitions for the address proof patterns.

mod disclosure_proof;
pub mod gadgets;
mod linkage_proof;
mod merkle_proof;
mod structure_proof;

use std::fmt;

use ark_bn254::Fr;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError};
use serde::{Deserialize, Serialize};

pub use disclosure_proof::{record_field_value, DisclosureCircuit, FieldOpeningWitness};
pub use linkage_proof::{pid_commitment, LinkageCircuit};
pub use merkle_proof::MerkleProofCircuit;
pub use structure_proof::{
    country_code_to_field, empty_segment_field, segment_to_field, StructureCircuit,
};

/// Identifies one circuit shape. Each shape has its own proving and
/// verifying keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CircuitId {
    Membership { depth: usize },
    Locker { depth: usize },
    Structure { depth: usize },
    SelectiveReveal { revealed: usize, depth: usize },
    Linkage,
}

impl CircuitId {
    /// A satisfying input of this shape, used for key generation.
    pub fn blank_input(&self) -> CircuitInput {
        match *self {
            CircuitId::Membership { depth } => {
                CircuitInput::Membership(MerkleProofCircuit::new_empty(depth, false))
            }
            CircuitId::Locker { depth } => {
                CircuitInput::Membership(MerkleProofCircuit::new_empty(depth, true))
            }
            CircuitId::Structure { depth } => {
                CircuitInput::Structure(StructureCircuit::new_empty(depth))
            }
            CircuitId::SelectiveReveal { revealed, depth } => {
                CircuitInput::Disclosure(DisclosureCircuit::new_empty(revealed, depth))
            }
            CircuitId::Linkage => CircuitInput::Linkage(LinkageCircuit::new_empty()),
        }
    }

    /// Number of public inputs the verifier must supply.
    pub fn public_input_count(&self) -> usize {
        match self {
            CircuitId::Membership { .. } => 2,
            CircuitId::Locker { .. } => 3,
            CircuitId::Structure { .. } => 2,
            CircuitId::SelectiveReveal { .. } => 2,
            CircuitId::Linkage => 3,
        }
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitId::Membership { depth } => write!(f, "membership-d{depth}"),
            CircuitId::Locker { depth } => write!(f, "locker-d{depth}"),
            CircuitId::Structure { depth } => write!(f, "structure-d{depth}"),
            CircuitId::SelectiveReveal { revealed, depth } => {
                write!(f, "selective-reveal-r{revealed}-d{depth}")
            }
            CircuitId::Linkage => f.write_str("linkage"),
        }
    }
}

/// Structured witness handed to a circuit backend.
#[derive(Clone)]
pub enum CircuitInput {
    /// PID membership, or locker membership when facility-bound.
    Membership(MerkleProofCircuit),
    Structure(StructureCircuit),
    Disclosure(DisclosureCircuit),
    Linkage(LinkageCircuit),
}

impl CircuitInput {
    /// The circuit shape this input satisfies.
    pub fn circuit_id(&self) -> CircuitId {
        match self {
            CircuitInput::Membership(c) if c.facility_bound => CircuitId::Locker { depth: c.depth() },
            CircuitInput::Membership(c) => CircuitId::Membership { depth: c.depth() },
            CircuitInput::Structure(c) => CircuitId::Structure { depth: c.depth() },
            CircuitInput::Disclosure(c) => CircuitId::SelectiveReveal {
                revealed: c.revealed_count(),
                depth: c.depth(),
            },
            CircuitInput::Linkage(_) => CircuitId::Linkage,
        }
    }

    /// Public inputs in the order the circuit allocates them.
    pub fn public_inputs(&self) -> Option<Vec<Fr>> {
        match self {
            CircuitInput::Membership(c) => c.public_inputs(),
            CircuitInput::Structure(c) => c.public_inputs(),
            CircuitInput::Disclosure(c) => c.public_inputs(),
            CircuitInput::Linkage(c) => c.public_inputs(),
        }
    }
}

impl ConstraintSynthesizer<Fr> for CircuitInput {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        match self {
            CircuitInput::Membership(c) => c.generate_constraints(cs),
            CircuitInput::Structure(c) => c.generate_constraints(cs),
            CircuitInput::Disclosure(c) => c.generate_constraints(cs),
            CircuitInput::Linkage(c) => c.generate_constraints(cs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_relations::r1cs::ConstraintSystem;

    #[test]
    fn test_blank_inputs_match_their_ids() {
        let ids = [
            CircuitId::Membership { depth: 2 },
            CircuitId::Locker { depth: 3 },
            CircuitId::Structure { depth: 4 },
            CircuitId::SelectiveReveal { revealed: 2, depth: 3 },
            CircuitId::Linkage,
        ];
        for id in ids {
            let input = id.blank_input();
            assert_eq!(input.circuit_id(), id);
            assert_eq!(input.public_inputs().unwrap().len(), id.public_input_count());

            let cs = ConstraintSystem::<Fr>::new_ref();
            input.generate_constraints(cs.clone()).unwrap();
            assert!(cs.is_satisfied().unwrap(), "{id} blank input must satisfy");
        }
    }

    #[test]
    fn test_circuit_id_display() {
        assert_eq!(CircuitId::Membership { depth: 3 }.to_string(), "membership-d3");
        assert_eq!(
            CircuitId::SelectiveReveal { revealed: 2, depth: 3 }.to_string(),
            "selective-reveal-r2-d3"
        );
        assert_eq!(CircuitId::Linkage.to_string(), "linkage");
    }
}
