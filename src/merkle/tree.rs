//! Binary Merkle tree over candidate sets (PIDs, locker IDs, salted fields).
//!
//! Leaf order is significant and is preserved exactly as supplied; callers
//! that want order-independent roots must sort before building.
//!
//! Leaf values enter the tree through [`PoseidonHasher::hash_leaf`]; padding
//! slots are zero. A path therefore only reduces to the root from a real leaf
//! value at full depth.

use ark_bn254::Fr;
use ark_std::vec::Vec;
use std::collections::HashMap;

use super::hash::PoseidonHasher;
use crate::crypto::string_to_field;

/// Maximum tree depth (2^30 leaves).
pub const MAX_DEPTH: usize = 30;

/// A Merkle path (proof) for membership verification.
#[derive(Clone, Debug, PartialEq)]
pub struct MerklePath {
    /// Sibling hashes along the path from leaf to root.
    pub siblings: Vec<Fr>,
    /// Path indices: false = left child, true = right child.
    pub indices: Vec<bool>,
    /// The raw leaf value being proven (hashed with the leaf tag on use).
    pub leaf: Fr,
}

impl MerklePath {
    /// Rebuild a path from a leaf position; bit `i` of `index` is the
    /// direction at level `i`.
    pub fn from_index(leaf: Fr, siblings: Vec<Fr>, index: u64) -> Self {
        let indices = (0..siblings.len()).map(|i| (index >> i) & 1 == 1).collect();
        Self {
            siblings,
            indices,
            leaf,
        }
    }

    /// Verify this path against a given root.
    pub fn verify(&self, root: &Fr, hasher: &PoseidonHasher) -> bool {
        &self.compute_root(hasher) == root
    }

    /// Reduce the path to a root by repeated pairwise hashing.
    pub fn compute_root(&self, hasher: &PoseidonHasher) -> Fr {
        self.siblings
            .iter()
            .zip(self.indices.iter())
            .fold(hasher.hash_leaf(&self.leaf), |current, (sibling, is_right)| {
                if *is_right {
                    hasher.hash_two(sibling, &current)
                } else {
                    hasher.hash_two(&current, sibling)
                }
            })
    }

    /// Leaf position encoded by the direction bits.
    pub fn index(&self) -> u64 {
        self.indices
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, is_right)| acc | ((*is_right as u64) << i))
    }

    /// Get the depth of this path.
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }
}

/// Binary Merkle tree with Poseidon hash.
#[derive(Clone)]
pub struct MerkleTree {
    /// All nodes in level order: index 0 is the root, leaf nodes come last.
    nodes: Vec<Fr>,
    /// Raw leaf values, in order.
    leaves: Vec<Fr>,
    depth: usize,
    num_leaves: usize,
    hasher: PoseidonHasher,
    /// First position of every distinct leaf value.
    leaf_index: HashMap<Fr, usize>,
}

impl MerkleTree {
    /// Build a tree from field-element leaves, padded with zero leaves to the
    /// next power of two.
    pub fn new(leaves: Vec<Fr>) -> Self {
        let hasher = PoseidonHasher::new();
        let num_leaves = leaves.len();
        let depth = Self::compute_depth(num_leaves);
        let padded_size = 1usize << depth;
        let leaf_start = padded_size - 1;

        let mut nodes = vec![Fr::from(0u64); 2 * padded_size - 1];
        let mut leaf_index = HashMap::with_capacity(num_leaves);
        for (i, leaf) in leaves.iter().enumerate() {
            nodes[leaf_start + i] = hasher.hash_leaf(leaf);
            leaf_index.entry(*leaf).or_insert(i);
        }

        // Internal nodes, bottom-up.
        for i in (0..leaf_start).rev() {
            nodes[i] = hasher.hash_two(&nodes[2 * i + 1], &nodes[2 * i + 2]);
        }

        Self {
            nodes,
            leaves,
            depth,
            num_leaves,
            hasher,
            leaf_index,
        }
    }

    /// Build a tree whose leaves are the SHA-256 field reductions of `leaves`.
    pub fn from_strings<S: AsRef<str>>(leaves: &[S]) -> Self {
        Self::new(leaves.iter().map(|s| string_to_field(s.as_ref())).collect())
    }

    /// Minimum depth needed for n leaves (at least 1, so every path has a
    /// sibling).
    fn compute_depth(n: usize) -> usize {
        if n <= 1 {
            return 1;
        }
        ((n - 1).ilog2() as usize + 1).min(MAX_DEPTH)
    }

    pub fn root(&self) -> Fr {
        self.nodes[0]
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of actual (non-padding) leaves.
    pub fn num_leaves(&self) -> usize {
        self.num_leaves
    }

    pub fn hasher(&self) -> &PoseidonHasher {
        &self.hasher
    }

    /// Position of the first occurrence of `leaf`.
    pub fn find_leaf(&self, leaf: &Fr) -> Option<usize> {
        self.leaf_index.get(leaf).copied()
    }

    pub fn contains(&self, leaf: &Fr) -> bool {
        self.leaf_index.contains_key(leaf)
    }

    /// Generate a Merkle path for a leaf at the given index.
    pub fn get_path(&self, leaf_index: usize) -> Option<MerklePath> {
        if leaf_index >= self.num_leaves {
            return None;
        }

        let leaf_start = (1usize << self.depth) - 1;
        let mut node_index = leaf_start + leaf_index;
        let leaf = self.leaves[leaf_index];
        let mut siblings = Vec::with_capacity(self.depth);
        let mut indices = Vec::with_capacity(self.depth);

        while node_index > 0 {
            let is_right = node_index % 2 == 0;
            let sibling_index = if is_right {
                node_index - 1
            } else {
                node_index + 1
            };
            siblings.push(self.nodes[sibling_index]);
            indices.push(is_right);
            node_index = (node_index - 1) / 2;
        }

        Some(MerklePath {
            siblings,
            indices,
            leaf,
        })
    }

    /// Generate a Merkle path for a specific leaf value.
    pub fn get_path_for_leaf(&self, leaf: &Fr) -> Option<MerklePath> {
        self.get_path(self.find_leaf(leaf)?)
    }

    /// The real path for a member, or a path of zero siblings with this
    /// tree's depth for a non-member.
    ///
    /// A detached path reduces to a root unrelated to this tree, so a proof
    /// built on it is well-formed but never verifies against [`Self::root`].
    pub fn path_or_detached(&self, leaf: &Fr) -> (MerklePath, bool) {
        match self.get_path_for_leaf(leaf) {
            Some(path) => (path, true),
            None => (
                MerklePath::from_index(*leaf, vec![Fr::from(0u64); self.depth], 0),
                false,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_leaf() {
        let leaf = Fr::from(42u64);
        let tree = MerkleTree::new(vec![leaf]);

        assert_eq!(tree.num_leaves(), 1);
        assert_eq!(tree.depth(), 1);
        assert!(tree.contains(&leaf));

        let path = tree.get_path(0).unwrap();
        assert!(path.verify(&tree.root(), tree.hasher()));
    }

    #[test]
    fn test_multiple_leaves() {
        let leaves: Vec<Fr> = (0..8).map(|i| Fr::from(i as u64)).collect();
        let tree = MerkleTree::new(leaves.clone());

        assert_eq!(tree.depth(), 3);
        for (i, leaf) in leaves.iter().enumerate() {
            let path = tree.get_path_for_leaf(leaf).unwrap();
            assert_eq!(path.index(), i as u64);
            assert!(path.verify(&tree.root(), tree.hasher()));
        }
    }

    #[test]
    fn test_non_power_of_two() {
        let tree = MerkleTree::from_strings(&["a", "b", "c", "d", "e"]);
        assert_eq!(tree.num_leaves(), 5);
        assert_eq!(tree.depth(), 3);
        for i in 0..5 {
            assert!(tree.get_path(i).unwrap().verify(&tree.root(), tree.hasher()));
        }
        assert!(tree.get_path(5).is_none());
    }

    #[test]
    fn test_from_index_rebuilds_same_path() {
        let tree = MerkleTree::from_strings(&["JP-13-113-01", "JP-27-100-05", "JP-01-101-02"]);
        let path = tree.get_path(2).unwrap();
        let rebuilt = MerklePath::from_index(path.leaf, path.siblings.clone(), path.index());
        assert_eq!(rebuilt, path);
    }

    #[test]
    fn test_tampered_path_fails() {
        let tree = MerkleTree::from_strings(&["a", "b", "c", "d"]);
        let mut path = tree.get_path(0).unwrap();
        path.siblings[1] = Fr::from(999u64);
        assert!(!path.verify(&tree.root(), tree.hasher()));

        let mut path = tree.get_path(0).unwrap();
        path.indices[0] = !path.indices[0];
        assert!(!path.verify(&tree.root(), tree.hasher()));
    }

    #[test]
    fn test_internal_node_is_not_a_leaf() {
        let tree = MerkleTree::from_strings(&["a", "b", "c", "d"]);
        // Level-one nodes sit at positions 1 and 2.
        let (left, right) = (tree.nodes[1], tree.nodes[2]);
        assert_eq!(tree.hasher().hash_two(&left, &right), tree.root());

        let shortcut = MerklePath::from_index(left, vec![right], 0);
        assert!(!shortcut.verify(&tree.root(), tree.hasher()));
        let root_as_leaf = MerklePath::from_index(tree.root(), vec![], 0);
        assert!(!root_as_leaf.verify(&tree.root(), tree.hasher()));
    }

    #[test]
    fn test_padding_slot_has_no_leaf_value() {
        let tree = MerkleTree::from_strings(&["a", "b", "c"]);
        let third = tree.get_path(2).unwrap();
        // Position 3 is a zero padding slot next to "c".
        let siblings = vec![tree.hasher().hash_leaf(&third.leaf), third.siblings[1]];
        let claimed = MerklePath::from_index(Fr::from(0u64), siblings, 3);
        assert!(!claimed.verify(&tree.root(), tree.hasher()));
    }

    #[test]
    fn test_leaf_order_changes_root() {
        let a = MerkleTree::from_strings(&["x", "y"]);
        let b = MerkleTree::from_strings(&["y", "x"]);
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn test_duplicate_leaf_resolves_to_first() {
        let tree = MerkleTree::from_strings(&["a", "b", "a"]);
        assert_eq!(tree.find_leaf(&string_to_field("a")), Some(0));
    }

    #[test]
    fn test_detached_path_for_non_member() {
        let tree = MerkleTree::from_strings(&["a", "b", "c"]);
        let (path, member) = tree.path_or_detached(&string_to_field("zzz"));
        assert!(!member);
        assert_eq!(path.depth(), tree.depth());
        assert!(!path.verify(&tree.root(), tree.hasher()));
    }

    proptest! {
        #[test]
        fn prop_paths_are_deterministic(leaves in prop::collection::vec("[a-z0-9]{1,8}", 1..12), pick in any::<prop::sample::Index>()) {
            let target = pick.get(&leaves).clone();
            let first = MerkleTree::from_strings(&leaves).get_path_for_leaf(&string_to_field(&target));
            let second = MerkleTree::from_strings(&leaves).get_path_for_leaf(&string_to_field(&target));
            prop_assert_eq!(first, second);
        }
    }
}
