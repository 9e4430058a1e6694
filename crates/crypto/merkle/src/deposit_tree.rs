use std::collections::BTreeMap;

use alloy_primitives::B256;
use anyhow::ensure;

use crate::{
    hash::{hash_concat, hash_leaf},
    index::{
        GeneralizedIndex, LeafIndex, generalized_index_from_leaf_index, generalized_index_parent,
        generalized_index_sibling,
    },
    is_valid_merkle_branch,
};

pub const DEFAULT_TREE_DEPTH: u64 = 32;

/// Incremental Merkle accumulator over deposit leaves.
///
/// Only written nodes are stored. Any node that was never written reads as the zero hash, so the
/// root of a partially filled tree is not the root of the same leaves padded with zero leaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositTree {
    depth: u64,
    deposit_count: u64,
    nodes: BTreeMap<GeneralizedIndex, B256>,
}

impl Default for DepositTree {
    fn default() -> Self {
        Self {
            depth: DEFAULT_TREE_DEPTH,
            deposit_count: 0,
            nodes: BTreeMap::new(),
        }
    }
}

impl DepositTree {
    pub fn new(depth: u64) -> anyhow::Result<Self> {
        ensure!(
            (1..64).contains(&depth),
            "Deposit tree depth must be between 1 and 63, got {depth}"
        );
        Ok(Self {
            depth,
            ..Default::default()
        })
    }

    pub fn depth(&self) -> u64 {
        self.depth
    }

    pub fn deposit_count(&self) -> u64 {
        self.deposit_count
    }

    /// Hash ``leaf_bytes`` into the next free leaf and recompute every ancestor up to the root.
    pub fn insert(&mut self, leaf_bytes: &[u8]) -> anyhow::Result<()> {
        ensure!(
            self.deposit_count < (1 << self.depth),
            "Deposit tree of depth {} is full",
            self.depth
        );

        let mut index = generalized_index_from_leaf_index(self.deposit_count, self.depth);
        self.nodes.insert(index, hash_leaf(leaf_bytes));
        for _ in 0..self.depth {
            index = generalized_index_parent(index);
            let left = self.node(index * 2);
            let right = self.node(index * 2 + 1);
            self.nodes
                .insert(index, hash_concat(left.as_slice(), right.as_slice()));
        }
        self.deposit_count += 1;

        Ok(())
    }

    /// Sibling hashes from the leaf at ``index`` up to (but excluding) the root.
    pub fn branch(&self, index: LeafIndex) -> anyhow::Result<Vec<B256>> {
        ensure!(
            index < self.deposit_count,
            "No deposit at index {index}, only {} inserted",
            self.deposit_count
        );

        let mut node = generalized_index_from_leaf_index(index, self.depth);
        let mut branch = Vec::with_capacity(self.depth as usize);
        for _ in 0..self.depth {
            branch.push(self.node(generalized_index_sibling(node)));
            node = generalized_index_parent(node);
        }
        Ok(branch)
    }

    /// Zero until the first insertion.
    pub fn root(&self) -> B256 {
        self.node(1)
    }

    pub fn verify_branch(
        leaf: B256,
        branch: &[B256],
        depth: u64,
        index: LeafIndex,
        expected_root: B256,
    ) -> bool {
        is_valid_merkle_branch(leaf, branch, depth, index, expected_root)
    }

    fn node(&self, index: GeneralizedIndex) -> B256 {
        self.nodes.get(&index).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::merkle_root;

    fn leaf_bytes(i: u8) -> Vec<u8> {
        vec![i; 40]
    }

    #[test]
    fn test_root_is_zero_before_first_insert() {
        let tree = DepositTree::default();
        assert_eq!(tree.root(), B256::ZERO);
        assert_eq!(tree.deposit_count(), 0);
        assert!(tree.branch(0).is_err());
    }

    #[test]
    fn test_full_tree_matches_static_root() {
        let mut tree = DepositTree::new(2).unwrap();
        let leaves = (0..4u8)
            .map(|i| {
                tree.insert(&leaf_bytes(i)).unwrap();
                hash_leaf(&leaf_bytes(i))
            })
            .collect::<Vec<_>>();

        assert_eq!(tree.root(), merkle_root(&leaves, 2).unwrap());
        assert!(tree.insert(&leaf_bytes(4)).is_err());
    }

    #[test]
    fn test_partial_tree_reads_unwritten_nodes_as_zero() {
        let mut tree = DepositTree::new(1).unwrap();
        tree.insert(&leaf_bytes(7)).unwrap();

        let expected = hash_concat(hash_leaf(&leaf_bytes(7)).as_slice(), B256::ZERO.as_slice());
        assert_eq!(tree.root(), expected);
        assert_eq!(tree.branch(0).unwrap(), vec![B256::ZERO]);
    }

    #[rstest]
    #[case::single(1)]
    #[case::odd(5)]
    #[case::power_of_two(8)]
    #[case::many(33)]
    fn test_every_branch_verifies_against_current_root(#[case] count: u8) {
        let mut tree = DepositTree::default();
        for i in 0..count {
            tree.insert(&leaf_bytes(i)).unwrap();
        }

        for i in 0..count {
            let branch = tree.branch(i as u64).unwrap();
            assert_eq!(branch.len() as u64, DEFAULT_TREE_DEPTH);
            assert!(DepositTree::verify_branch(
                hash_leaf(&leaf_bytes(i)),
                &branch,
                DEFAULT_TREE_DEPTH,
                i as u64,
                tree.root(),
            ));
        }
    }

    #[test]
    fn test_mutated_branch_fails() {
        let mut tree = DepositTree::default();
        for i in 0..6 {
            tree.insert(&leaf_bytes(i)).unwrap();
        }
        let leaf = hash_leaf(&leaf_bytes(3));
        let branch = tree.branch(3).unwrap();

        for level in 0..branch.len() {
            let mut mutated = branch.clone();
            mutated[level].0[0] ^= 0x01;
            assert!(!DepositTree::verify_branch(
                leaf,
                &mutated,
                DEFAULT_TREE_DEPTH,
                3,
                tree.root(),
            ));
        }
    }

    #[test]
    fn test_branch_goes_stale_after_later_insert() {
        let mut tree = DepositTree::default();
        tree.insert(&leaf_bytes(0)).unwrap();
        let branch = tree.branch(0).unwrap();
        tree.insert(&leaf_bytes(1)).unwrap();

        let leaf = hash_leaf(&leaf_bytes(0));
        assert!(!DepositTree::verify_branch(
            leaf,
            &branch,
            DEFAULT_TREE_DEPTH,
            0,
            tree.root()
        ));
        assert!(DepositTree::verify_branch(
            leaf,
            &tree.branch(0).unwrap(),
            DEFAULT_TREE_DEPTH,
            0,
            tree.root()
        ));
    }

    #[test]
    fn test_rejects_invalid_depth() {
        assert!(DepositTree::new(0).is_err());
        assert!(DepositTree::new(64).is_err());
    }
}
