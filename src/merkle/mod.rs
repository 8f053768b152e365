pub mod hash;
pub mod tree;

use ark_bn254::Fr;

pub use hash::{PoseidonHasher, LEAF_DOMAIN};
pub use tree::{MerklePath, MerkleTree, MAX_DEPTH};

use crate::crypto::string_to_field;

/// Build a tree over string leaves in the order given.
pub fn build_merkle_tree<S: AsRef<str>>(leaves: &[S]) -> MerkleTree {
    MerkleTree::from_strings(leaves)
}

pub fn merkle_root(tree: &MerkleTree) -> Fr {
    tree.root()
}

/// Membership path for `target` within `leaves`, or `None` when `target`
/// is not one of them.
pub fn merkle_proof<S: AsRef<str>>(leaves: &[S], target: &str) -> Option<MerklePath> {
    MerkleTree::from_strings(leaves).get_path_for_leaf(&string_to_field(target))
}
