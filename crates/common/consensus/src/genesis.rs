use alloy_primitives::B256;
use ssz_types::{FixedVector, VariableList};
use tracing::info;
use tree_hash::TreeHash;

use crate::{
    beacon_block::BeaconBlock,
    chain_state::{ChainState, active_index_root},
    constants::{
        GENESIS_EPOCH, GENESIS_FORK_VERSION, GENESIS_SLOT, GENESIS_START_SHARD,
        MAX_DEPOSIT_AMOUNT,
    },
    crosslink::Crosslink,
    deposit::Deposit,
    error::StateTransitionError,
    eth_1_data::Eth1Data,
    fork::Fork,
};

/// Build the genesis state from the chain-start ``deposits``.
///
/// Deposits were already proven against the deposit contract when they were collected, so no
/// branch or proof of possession is checked here.
pub fn initialize_genesis_state(
    deposits: &[Deposit],
    genesis_time: u64,
    eth1_data: Eth1Data,
) -> Result<ChainState, StateTransitionError> {
    let mut state = ChainState {
        slot: GENESIS_SLOT,
        genesis_time,
        fork: Fork {
            previous_version: GENESIS_FORK_VERSION,
            current_version: GENESIS_FORK_VERSION,
            epoch: GENESIS_EPOCH,
        },
        validator_registry: VariableList::empty(),
        validator_balances: VariableList::empty(),
        validator_registry_update_epoch: GENESIS_EPOCH,
        latest_randao_mixes: FixedVector::from_elem(B256::ZERO),
        previous_shuffling_start_shard: GENESIS_START_SHARD,
        current_shuffling_start_shard: GENESIS_START_SHARD,
        previous_shuffling_epoch: GENESIS_EPOCH,
        current_shuffling_epoch: GENESIS_EPOCH,
        previous_shuffling_seed: B256::ZERO,
        current_shuffling_seed: B256::ZERO,
        previous_justified_epoch: GENESIS_EPOCH,
        justified_epoch: GENESIS_EPOCH,
        justification_bitfield: 0,
        finalized_epoch: GENESIS_EPOCH,
        latest_crosslinks: FixedVector::from_elem(Crosslink::default()),
        latest_block_roots: FixedVector::from_elem(B256::ZERO),
        latest_active_index_roots: FixedVector::from_elem(B256::ZERO),
        latest_slashed_balances: FixedVector::from_elem(0),
        latest_attestations: VariableList::empty(),
        batched_block_roots: VariableList::empty(),
        latest_block_root: B256::ZERO,
        latest_eth1_data: eth1_data,
        eth1_data_votes: VariableList::empty(),
        deposit_index: deposits.len() as u64,
    };

    for (index, deposit) in deposits.iter().enumerate() {
        state.apply_deposit(&deposit.deposit_data, index)?;
    }

    for index in 0..state.validator_registry.len() as u64 {
        if state.effective_balance(index)? >= MAX_DEPOSIT_AMOUNT {
            state.activate_validator(index, true)?;
        }
    }

    let genesis_active_index_root =
        active_index_root(&state.active_validator_indices(GENESIS_EPOCH));
    state.latest_active_index_roots = FixedVector::from_elem(genesis_active_index_root);
    state.current_shuffling_seed = state.generate_seed(GENESIS_EPOCH);
    state.latest_block_root = BeaconBlock::genesis(state.tree_hash_root()).block_root();

    info!(
        validators = state.validator_registry.len(),
        active = state.active_validator_indices(GENESIS_EPOCH).len(),
        genesis_time,
        "Initialized genesis state"
    );
    Ok(state)
}
