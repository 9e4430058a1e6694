//! Binary Merkle trees over 32-byte nodes: a static tree builder used for batched roots and the
//! incremental [`DepositTree`] used to track validator deposits.

use alloy_primitives::B256;
use anyhow::ensure;

mod deposit_tree;
mod hash;
mod index;

pub use deposit_tree::{DEFAULT_TREE_DEPTH, DepositTree};
use hash::hash_concat;
use index::get_generalized_index_bit;

pub fn merkle_tree(leaves: &[B256], depth: u64) -> anyhow::Result<Vec<B256>> {
    ensure!(depth < 32, "Depth {depth} is too large for a materialized tree");
    let num_of_leaves = leaves.len();
    let bottom_length = 1 << depth;
    ensure!(
        num_of_leaves <= bottom_length,
        "Number of leaves is greater than the bottom length (depth too small)"
    );

    let mut tree = vec![B256::ZERO; bottom_length];
    tree.extend(leaves);
    tree.extend(vec![B256::ZERO; bottom_length - num_of_leaves]);

    for i in (1..bottom_length).rev() {
        let left = tree[i * 2].as_slice();
        let right = tree[i * 2 + 1].as_slice();
        tree[i] = hash_concat(left, right);
    }

    Ok(tree)
}

/// Root of the fully materialized tree over ``leaves`` padded with zero leaves.
pub fn merkle_root(leaves: &[B256], depth: u64) -> anyhow::Result<B256> {
    // The tree always holds 2 * 2^depth nodes, so index 1 is present.
    Ok(merkle_tree(leaves, depth)?[1])
}

/// Check that ``leaf`` at ``index`` hashes up to ``root`` through ``branch``.
///
/// The sibling at level ``i`` is placed on the left when bit ``i`` of ``index`` is set.
pub fn is_valid_merkle_branch(
    leaf: B256,
    branch: &[B256],
    depth: u64,
    index: u64,
    root: B256,
) -> bool {
    if (branch.len() as u64) < depth {
        return false;
    }
    let mut value = leaf;
    for i in 0..depth {
        if get_generalized_index_bit(index, i) {
            value = hash_concat(branch[i as usize].as_slice(), value.as_slice());
        } else {
            value = hash_concat(value.as_slice(), branch[i as usize].as_slice());
        }
    }
    value == root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merkle_tree() {
        let leaves = vec![
            B256::from_slice(&[0xAA; 32]),
            B256::from_slice(&[0xBB; 32]),
            B256::from_slice(&[0xCC; 32]),
            B256::from_slice(&[0xDD; 32]),
        ];

        let node_2: B256 = hash_concat(leaves[0].as_slice(), leaves[1].as_slice());
        let node_3: B256 = hash_concat(leaves[2].as_slice(), leaves[3].as_slice());

        let root: B256 = hash_concat(node_2.as_slice(), node_3.as_slice());

        let tree = merkle_tree(&leaves, 2).unwrap();
        assert_eq!(tree[1], root);
        assert_eq!(merkle_root(&leaves, 2).unwrap(), root);

        assert!(is_valid_merkle_branch(
            leaves[2],
            &[leaves[3], node_2],
            2,
            2,
            root
        ));
        assert!(!is_valid_merkle_branch(
            leaves[2],
            &[leaves[3], node_2],
            2,
            3,
            root
        ));
    }

    #[test]
    fn test_short_branch_is_rejected() {
        let leaf = B256::repeat_byte(0x01);
        assert!(!is_valid_merkle_branch(leaf, &[], 1, 0, leaf));
    }

    #[test]
    fn test_merkle_tree_rejects_too_many_leaves() {
        let leaves = vec![B256::ZERO; 3];
        assert!(merkle_tree(&leaves, 1).is_err());
    }
}
