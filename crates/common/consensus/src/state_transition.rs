use kestrel_bls::SignatureVerifier;
use kestrel_merkle::merkle_root;
use tracing::debug;

use crate::{
    beacon_block::SignedBeaconBlock,
    chain_state::ChainState,
    constants::{BATCHED_BLOCK_ROOTS_DEPTH, LATEST_BLOCK_ROOTS_LENGTH, SLOTS_PER_EPOCH},
    error::StateTransitionError,
};

/// Whether advancing from ``slot`` crosses an epoch boundary.
pub fn is_epoch_transition(slot: u64) -> bool {
    (slot + 1) % SLOTS_PER_EPOCH == 0
}

/// Advance ``state`` by one slot, applying ``signed_block`` at the new slot when present.
///
/// The input is never modified. On error the caller keeps ``state`` as the head.
pub fn state_transition(
    state: &ChainState,
    signed_block: Option<&SignedBeaconBlock>,
    verify_signatures: bool,
    verifier: &impl SignatureVerifier,
) -> Result<ChainState, StateTransitionError> {
    let mut state = state.clone();

    if is_epoch_transition(state.slot) {
        state.apply_epoch()?;
    }
    state.process_slot()?;

    if let Some(signed_block) = signed_block {
        state.apply_block(signed_block, verify_signatures, verifier)?;
        state.latest_block_root = signed_block.message.block_root();
    }
    Ok(state)
}

impl ChainState {
    /// Record the latest block root and move to the next slot.
    pub(crate) fn process_slot(&mut self) -> Result<(), StateTransitionError> {
        self.latest_block_roots[(self.slot % LATEST_BLOCK_ROOTS_LENGTH) as usize] =
            self.latest_block_root;
        self.slot += 1;

        if self.slot % LATEST_BLOCK_ROOTS_LENGTH == 0 {
            let batched_root = merkle_root(&self.latest_block_roots, BATCHED_BLOCK_ROOTS_DEPTH)
                .map_err(|_| StateTransitionError::ArithmeticOverflow("batched block roots"))?;
            self.batched_block_roots
                .push(batched_root)
                .map_err(|_| StateTransitionError::ArithmeticOverflow("batched block roots"))?;
            debug!(slot = self.slot, %batched_root, "Batched block roots");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use kestrel_bls::BlstVerifier;
    use rstest::rstest;
    use ssz::Encode;

    use super::*;
    use crate::{
        constants::MAX_DEPOSIT_AMOUNT,
        test_utils::{advance, advance_with_attestations, attestation, genesis_state, signed_block},
        traits::BlockRootLookup,
    };

    #[rstest]
    #[case::genesis(0, false)]
    #[case::mid_epoch(30, false)]
    #[case::last_slot(63, true)]
    #[case::first_slot(64, false)]
    #[case::later_epoch(127, true)]
    fn test_epoch_transition_predicate(#[case] slot: u64, #[case] expected: bool) {
        assert_eq!(is_epoch_transition(slot), expected);
    }

    #[test]
    fn test_epoch_processing_fires_once_per_epoch() {
        let mut state = genesis_state(8);
        state.latest_randao_mixes[0] = B256::repeat_byte(0x5a);

        // The mix for epoch 1 is only carried forward by epoch processing.
        let before_boundary = advance(state, 63);
        assert_eq!(before_boundary.slot, 63);
        assert_eq!(before_boundary.latest_randao_mixes[1], B256::ZERO);

        let after_boundary = advance(before_boundary, 1);
        assert_eq!(after_boundary.slot, 64);
        assert_eq!(
            after_boundary.latest_randao_mixes[1],
            B256::repeat_byte(0x5a)
        );
    }

    #[test]
    fn test_empty_slot_records_previous_root() {
        let state = genesis_state(8);
        let next = state_transition(&state, None, false, &BlstVerifier).unwrap();

        assert_eq!(next.slot, 1);
        assert_eq!(next.latest_block_root, state.latest_block_root);
        assert_eq!(next.block_root_at_slot(0), Ok(state.latest_block_root));
        assert_eq!(state.slot, 0);
    }

    #[test]
    fn test_block_root_becomes_latest() {
        let state = genesis_state(64);
        let at_slot = state_transition(&state, None, false, &BlstVerifier).unwrap();
        let block = signed_block(&at_slot, vec![]);

        let next = state_transition(&state, Some(&block), true, &BlstVerifier).unwrap();
        assert_eq!(next.latest_block_root, block.message.block_root());
        assert_eq!(next.latest_block_roots[0], state.latest_block_root);
    }

    #[test]
    fn test_transition_is_deterministic() {
        let state = advance_with_attestations(genesis_state(64), 8);
        let at_slot = state_transition(&state, None, false, &BlstVerifier).unwrap();
        let block = signed_block(&at_slot, vec![attestation(&at_slot, at_slot.slot - 4)]);

        let first = state_transition(&state, Some(&block), true, &BlstVerifier).unwrap();
        let second = state_transition(&state, Some(&block), true, &BlstVerifier).unwrap();
        assert_eq!(first.as_ssz_bytes(), second.as_ssz_bytes());
    }

    #[test]
    fn test_batched_root_appended_when_ring_wraps() {
        let mut state = genesis_state(4);
        state.slot = LATEST_BLOCK_ROOTS_LENGTH - 1;
        state.process_slot().unwrap();

        assert_eq!(state.slot, LATEST_BLOCK_ROOTS_LENGTH);
        assert_eq!(
            state.batched_block_roots.to_vec(),
            vec![merkle_root(&state.latest_block_roots, BATCHED_BLOCK_ROOTS_DEPTH).unwrap()]
        );
    }

    #[test]
    fn test_full_participation_justifies_and_finalizes() {
        let genesis = genesis_state(64);

        let epoch_0 = advance_with_attestations(genesis, 64);
        assert_eq!(epoch_0.justification_bitfield, 0b11);
        assert_eq!(epoch_0.justified_epoch, 0);
        assert_eq!(epoch_0.finalized_epoch, 0);

        let epoch_1 = advance_with_attestations(epoch_0, 128);
        assert_eq!(epoch_1.justification_bitfield, 0b111);
        assert_eq!(epoch_1.previous_justified_epoch, 0);
        assert_eq!(epoch_1.justified_epoch, 1);
        assert_eq!(epoch_1.finalized_epoch, 0);

        let epoch_2 = advance_with_attestations(epoch_1, 192);
        assert_eq!(epoch_2.justification_bitfield, 0b1111);
        assert_eq!(epoch_2.previous_justified_epoch, 1);
        assert_eq!(epoch_2.justified_epoch, 2);
        assert_eq!(epoch_2.finalized_epoch, 1);

        // Finality and fresh crosslinks on every shard allow a full registry update.
        assert_eq!(epoch_2.validator_registry_update_epoch, 2);
        assert_eq!(epoch_2.current_shuffling_start_shard, SLOTS_PER_EPOCH);
        assert_eq!(epoch_2.current_shuffling_epoch, 3);
        assert_eq!(epoch_2.previous_shuffling_start_shard, 0);

        assert_eq!(
            epoch_2.validator_registry.len(),
            epoch_2.validator_balances.len()
        );
        assert!(
            epoch_2
                .validator_balances
                .iter()
                .all(|balance| *balance > MAX_DEPOSIT_AMOUNT)
        );
    }

    #[test]
    fn test_finality_never_decreases_without_votes() {
        let mut state = advance_with_attestations(genesis_state(64), 192);
        let mut finalized_epoch = state.finalized_epoch;
        for _ in 0..3 {
            state = advance(state, SLOTS_PER_EPOCH);
            assert!(state.finalized_epoch >= finalized_epoch);
            assert_eq!(state.validator_registry.len(), state.validator_balances.len());
            finalized_epoch = state.finalized_epoch;
        }
    }
}
