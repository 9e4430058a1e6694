/// Position of a leaf counted from the left of the bottom layer.
pub(crate) type LeafIndex = u64;

/// Position of a node in breadth-first order with the root at 1, so node ``i`` has children
/// ``2i`` and ``2i + 1``.
pub(crate) type GeneralizedIndex = u64;

/// Whether bit ``position`` of ``index`` is set. Below the depth of the tree a leaf index and its
/// generalized index agree bit for bit.
pub(crate) fn get_generalized_index_bit(index: GeneralizedIndex, position: u64) -> bool {
    (index >> position) & 1 == 1
}

pub(crate) fn generalized_index_sibling(index: GeneralizedIndex) -> GeneralizedIndex {
    index ^ 1
}

pub(crate) fn generalized_index_parent(index: GeneralizedIndex) -> GeneralizedIndex {
    index >> 1
}

pub(crate) fn generalized_index_from_leaf_index(
    leaf_index: LeafIndex,
    depth: u64,
) -> GeneralizedIndex {
    (1 << depth) | leaf_index
}
