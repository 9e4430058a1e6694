use std::cmp::max;

use alloy_primitives::B256;
use ethereum_hashing::hash;
use tree_hash::TreeHash;

use crate::{
    constants::{
        ACTIVATION_EXIT_DELAY, SHARD_COUNT, SHUFFLE_ROUND_COUNT, SLOTS_PER_EPOCH,
        TARGET_COMMITTEE_SIZE,
    },
    error::StateTransitionError,
    signing_data::SigningData,
};

pub fn compute_signing_root<SSZObject: TreeHash>(ssz_object: &SSZObject, domain: B256) -> B256 {
    SigningData {
        object_root: ssz_object.tree_hash_root(),
        domain,
    }
    .tree_hash_root()
}

/// Return the position ``index`` moves to after a swap-or-not shuffle of ``index_count`` items.
pub fn compute_shuffled_index(
    mut index: usize,
    index_count: usize,
    seed: B256,
) -> Result<usize, StateTransitionError> {
    if index >= index_count {
        return Err(StateTransitionError::ValidatorIndexOutOfRange {
            index: index as u64,
        });
    }
    for round in 0..SHUFFLE_ROUND_COUNT {
        let seed_with_round = [seed.as_slice(), &round.to_le_bytes()].concat();
        let pivot = bytes_to_int64(&hash(&seed_with_round)[..]) % index_count as u64;

        let flip = (pivot as usize + (index_count - index)) % index_count;
        let position = max(index, flip);
        let seed_with_position = [
            seed_with_round.as_slice(),
            &(position / 256).to_le_bytes()[0..4],
        ]
        .concat();
        let source = hash(&seed_with_position);
        let byte = source[(position % 256) / 8];
        let bit = (byte >> (position % 8)) % 2;

        index = if bit == 1 { flip } else { index };
    }
    Ok(index)
}

// Return the integer deserialization of ``data`` interpreted as little-endian.
pub fn bytes_to_int64(slice: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    let len = slice.len().min(8);
    bytes[..len].copy_from_slice(&slice[..len]);
    u64::from_le_bytes(bytes)
}

/// Return the epoch number at ``slot``.
pub fn compute_epoch_at_slot(slot: u64) -> u64 {
    slot / SLOTS_PER_EPOCH
}

/// Return the start slot of ``epoch``. Saturates for the far-future sentinel.
pub fn compute_start_slot_at_epoch(epoch: u64) -> u64 {
    epoch.saturating_mul(SLOTS_PER_EPOCH)
}

/// Return the epoch at which an activation or exit triggered in ``epoch`` takes effect.
pub fn compute_activation_exit_epoch(epoch: u64) -> u64 {
    epoch + 1 + ACTIVATION_EXIT_DELAY
}

/// Number of committees in one epoch for ``active_validator_count`` validators.
pub fn compute_epoch_committee_count(active_validator_count: u64) -> u64 {
    (active_validator_count / SLOTS_PER_EPOCH / TARGET_COMMITTEE_SIZE)
        .clamp(1, SHARD_COUNT / SLOTS_PER_EPOCH)
        * SLOTS_PER_EPOCH
}

/// Return the largest integer ``x`` such that ``x**2 <= n``.
pub fn integer_squareroot(n: u64) -> u64 {
    let mut x = n;
    let mut y = x.div_ceil(2);
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

pub fn is_sorted_and_unique(indices: &[u64]) -> bool {
    indices.windows(2).all(|w| w[0] < w[1])
}

pub fn xor<T: AsRef<[u8]>>(bytes_1: T, bytes_2: T) -> B256 {
    let mut result = B256::default();
    for (i, (a, b)) in bytes_1
        .as_ref()
        .iter()
        .zip(bytes_2.as_ref())
        .take(32)
        .enumerate()
    {
        result[i] = a ^ b;
    }
    result
}
