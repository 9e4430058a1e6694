pub mod block_processing;
pub mod committee;
pub mod epoch_aggregates;
pub mod epoch_processing;

use alloy_primitives::{B256, aliases::B32};
use ethereum_hashing::hash_fixed;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{
    FixedVector, VariableList,
    serde_utils::{quoted_u64_fixed_vec, quoted_u64_var_list},
    typenum::{U1024, U8192, U16384, U16777216, U1099511627776},
};
use tracing::debug;
use tree_hash_derive::TreeHash;

use crate::{
    constants::{
        GENESIS_EPOCH, LATEST_ACTIVE_INDEX_ROOTS_LENGTH, LATEST_BLOCK_ROOTS_LENGTH,
        LATEST_RANDAO_MIXES_LENGTH, LATEST_SLASHED_EXIT_LENGTH, MAX_DEPOSIT_AMOUNT,
        MIN_DEPOSIT_AMOUNT, MIN_SEED_LOOKAHEAD, MIN_VALIDATOR_WITHDRAWABILITY_DELAY,
        WHISTLEBLOWER_REWARD_QUOTIENT,
    },
    crosslink::Crosslink,
    deposit::DepositData,
    error::{OperationKind, StateTransitionError, ensure_valid},
    eth_1_data::{Eth1Data, Eth1DataVote},
    fork::Fork,
    misc::{compute_activation_exit_epoch, compute_epoch_at_slot, compute_start_slot_at_epoch},
    pending_attestation::PendingAttestation,
    traits::BlockRootLookup,
    validator::Validator,
};

/// The replicated beacon chain state.
///
/// Values are never mutated in place by the public transition functions: each call clones the
/// input, works on the copy and hands the copy back only once every step has succeeded.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct ChainState {
    // Misc
    #[serde(with = "serde_utils::quoted_u64")]
    pub slot: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub genesis_time: u64,
    pub fork: Fork,

    // Validator registry
    pub validator_registry: VariableList<Validator, U1099511627776>,
    #[serde(with = "quoted_u64_var_list")]
    pub validator_balances: VariableList<u64, U1099511627776>,
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_registry_update_epoch: u64,

    // Randomness and committees
    pub latest_randao_mixes: FixedVector<B256, U8192>,
    #[serde(with = "serde_utils::quoted_u64")]
    pub previous_shuffling_start_shard: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub current_shuffling_start_shard: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub previous_shuffling_epoch: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub current_shuffling_epoch: u64,
    pub previous_shuffling_seed: B256,
    pub current_shuffling_seed: B256,

    // Finality
    #[serde(with = "serde_utils::quoted_u64")]
    pub previous_justified_epoch: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub justified_epoch: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub justification_bitfield: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub finalized_epoch: u64,

    // Recent state
    pub latest_crosslinks: FixedVector<Crosslink, U1024>,
    pub latest_block_roots: FixedVector<B256, U8192>,
    pub latest_active_index_roots: FixedVector<B256, U8192>,
    /// Balances slashed at every epoch
    #[serde(with = "quoted_u64_fixed_vec")]
    pub latest_slashed_balances: FixedVector<u64, U8192>,
    pub latest_attestations: VariableList<PendingAttestation, U16384>,
    pub batched_block_roots: VariableList<B256, U16777216>,
    pub latest_block_root: B256,

    // Ethereum 1.0 chain data
    pub latest_eth1_data: Eth1Data,
    pub eth1_data_votes: VariableList<Eth1DataVote, U1024>,
    #[serde(with = "serde_utils::quoted_u64")]
    pub deposit_index: u64,
}

impl ChainState {
    /// Return the current epoch.
    pub fn current_epoch(&self) -> u64 {
        compute_epoch_at_slot(self.slot)
    }

    /// Return the previous epoch, or the genesis epoch while still in it.
    pub fn previous_epoch(&self) -> u64 {
        self.current_epoch().saturating_sub(1)
    }

    pub fn next_epoch(&self) -> u64 {
        self.current_epoch() + 1
    }

    /// Return the randao mix at a recent ``epoch``.
    pub fn randao_mix(&self, epoch: u64) -> B256 {
        self.latest_randao_mixes[(epoch % LATEST_RANDAO_MIXES_LENGTH) as usize]
    }

    /// Return the index root at a recent ``epoch``.
    pub fn active_index_root(&self, epoch: u64) -> B256 {
        self.latest_active_index_roots[(epoch % LATEST_ACTIVE_INDEX_ROOTS_LENGTH) as usize]
    }

    /// Return the sequence of active validator indices at ``epoch``.
    pub fn active_validator_indices(&self, epoch: u64) -> Vec<u64> {
        self.validator_registry
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.is_active_validator(epoch).then_some(i as u64))
            .collect()
    }

    /// Return the randao seed for ``epoch``.
    pub fn generate_seed(&self, epoch: u64) -> B256 {
        let mix = self.randao_mix(epoch.saturating_sub(MIN_SEED_LOOKAHEAD));
        let index_root = self.active_index_root(epoch);
        B256::from(hash_fixed(
            &[mix.as_slice(), index_root.as_slice()].concat(),
        ))
    }

    /// Return the signature domain of ``domain_type`` at ``epoch``.
    pub fn domain(&self, epoch: u64, domain_type: B32) -> B256 {
        self.fork.domain(epoch, domain_type)
    }

    pub fn validator(&self, index: u64) -> Result<&Validator, StateTransitionError> {
        self.validator_registry
            .get(index as usize)
            .ok_or(StateTransitionError::ValidatorIndexOutOfRange { index })
    }

    pub(crate) fn validator_mut(
        &mut self,
        index: u64,
    ) -> Result<&mut Validator, StateTransitionError> {
        self.validator_registry
            .get_mut(index as usize)
            .ok_or(StateTransitionError::ValidatorIndexOutOfRange { index })
    }

    pub fn balance(&self, index: u64) -> Result<u64, StateTransitionError> {
        self.validator_balances
            .get(index as usize)
            .copied()
            .ok_or(StateTransitionError::ValidatorIndexOutOfRange { index })
    }

    /// Return the balance of ``index`` capped at [`MAX_DEPOSIT_AMOUNT`].
    pub fn effective_balance(&self, index: u64) -> Result<u64, StateTransitionError> {
        Ok(self.balance(index)?.min(MAX_DEPOSIT_AMOUNT))
    }

    /// Return the combined effective balance of ``indices``.
    pub fn total_balance<'a>(
        &self,
        indices: impl IntoIterator<Item = &'a u64>,
    ) -> Result<u64, StateTransitionError> {
        indices.into_iter().try_fold(0u64, |total, &index| {
            total
                .checked_add(self.effective_balance(index)?)
                .ok_or(StateTransitionError::ArithmeticOverflow("total balance"))
        })
    }

    /// Increase the validator balance at index ``index`` by ``delta``.
    pub(crate) fn increase_balance(
        &mut self,
        index: u64,
        delta: u64,
    ) -> Result<(), StateTransitionError> {
        let balance = self
            .validator_balances
            .get_mut(index as usize)
            .ok_or(StateTransitionError::ValidatorIndexOutOfRange { index })?;
        *balance = balance
            .checked_add(delta)
            .ok_or(StateTransitionError::ArithmeticOverflow("validator balance"))?;
        Ok(())
    }

    /// Decrease the validator balance at index ``index`` by ``delta`` with underflow protection.
    pub(crate) fn decrease_balance(
        &mut self,
        index: u64,
        delta: u64,
    ) -> Result<(), StateTransitionError> {
        let balance = self
            .validator_balances
            .get_mut(index as usize)
            .ok_or(StateTransitionError::ValidatorIndexOutOfRange { index })?;
        *balance = balance.saturating_sub(delta);
        Ok(())
    }

    pub(crate) fn activate_validator(
        &mut self,
        index: u64,
        is_genesis: bool,
    ) -> Result<(), StateTransitionError> {
        let activation_epoch = if is_genesis {
            GENESIS_EPOCH
        } else {
            compute_activation_exit_epoch(self.current_epoch())
        };
        self.validator_mut(index)?.activation_epoch = activation_epoch;
        Ok(())
    }

    /// Flag the validator for exit at the next registry update.
    pub(crate) fn initiate_validator_exit(&mut self, index: u64) -> Result<(), StateTransitionError> {
        self.validator_mut(index)?.initiated_exit = true;
        Ok(())
    }

    /// Schedule the exit of ``index`` unless an earlier one is already scheduled.
    pub(crate) fn exit_validator(&mut self, index: u64) -> Result<(), StateTransitionError> {
        let exit_epoch = compute_activation_exit_epoch(self.current_epoch());
        let validator = self.validator_mut(index)?;
        if validator.exit_epoch <= exit_epoch {
            return Ok(());
        }
        validator.exit_epoch = exit_epoch;
        Ok(())
    }

    /// Slash ``slashed_index`` and pay the whistleblower out of its balance.
    ///
    /// ``kind`` and ``operation_index`` identify the block operation that triggered the slashing
    /// for error reporting.
    pub(crate) fn slash_validator(
        &mut self,
        slashed_index: u64,
        whistleblower_index: u64,
        kind: OperationKind,
        operation_index: usize,
    ) -> Result<(), StateTransitionError> {
        let current_epoch = self.current_epoch();
        let withdrawable_epoch = self.validator(slashed_index)?.withdrawable_epoch;
        ensure_valid!(
            self.slot < compute_start_slot_at_epoch(withdrawable_epoch),
            kind,
            operation_index,
            "validator {slashed_index} is already withdrawable"
        );

        self.exit_validator(slashed_index)?;

        let effective_balance = self.effective_balance(slashed_index)?;
        let slashed_balance = &mut self.latest_slashed_balances
            [(current_epoch % LATEST_SLASHED_EXIT_LENGTH) as usize];
        *slashed_balance = slashed_balance
            .checked_add(effective_balance)
            .ok_or(StateTransitionError::ArithmeticOverflow("slashed balances"))?;

        let whistleblower_reward = effective_balance / WHISTLEBLOWER_REWARD_QUOTIENT;
        self.increase_balance(whistleblower_index, whistleblower_reward)?;
        self.decrease_balance(slashed_index, whistleblower_reward)?;

        let validator = self.validator_mut(slashed_index)?;
        validator.slashed = true;
        validator.withdrawable_epoch = current_epoch + LATEST_SLASHED_EXIT_LENGTH;

        debug!(slashed_index, whistleblower_index, "Slashed validator");
        Ok(())
    }

    pub(crate) fn prepare_validator_for_withdrawal(
        &mut self,
        index: u64,
    ) -> Result<(), StateTransitionError> {
        let withdrawable_epoch = self.current_epoch() + MIN_VALIDATOR_WITHDRAWABILITY_DELAY;
        self.validator_mut(index)?.withdrawable_epoch = withdrawable_epoch;
        Ok(())
    }

    /// Credit ``deposit_data`` to the registry, topping up a known pubkey or appending a new
    /// validator. Proof checks are the caller's business.
    pub(crate) fn apply_deposit(
        &mut self,
        deposit_data: &DepositData,
        operation_index: usize,
    ) -> Result<(), StateTransitionError> {
        let existing = self
            .validator_registry
            .iter()
            .position(|validator| validator.pubkey == deposit_data.pubkey);

        match existing {
            Some(index) => {
                ensure_valid!(
                    self.validator_registry[index].withdrawal_credentials
                        == deposit_data.withdrawal_credentials,
                    OperationKind::Deposit,
                    operation_index,
                    "withdrawal credentials do not match validator {index}"
                );
                self.increase_balance(index as u64, deposit_data.amount)?;
            }
            None => {
                ensure_valid!(
                    deposit_data.amount >= MIN_DEPOSIT_AMOUNT,
                    OperationKind::Deposit,
                    operation_index,
                    "deposit amount {} is below the minimum of {MIN_DEPOSIT_AMOUNT}",
                    deposit_data.amount
                );
                self.validator_registry
                    .push(Validator::from_deposit(
                        deposit_data.pubkey.clone(),
                        deposit_data.withdrawal_credentials,
                    ))
                    .map_err(|_| StateTransitionError::ArithmeticOverflow("validator registry"))?;
                self.validator_balances
                    .push(deposit_data.amount)
                    .map_err(|_| StateTransitionError::ArithmeticOverflow("validator balances"))?;
            }
        }

        Ok(())
    }
}

impl BlockRootLookup for ChainState {
    fn block_root_at_slot(&self, slot: u64) -> Result<B256, StateTransitionError> {
        if slot < self.slot && self.slot <= slot.saturating_add(LATEST_BLOCK_ROOTS_LENGTH) {
            Ok(self.latest_block_roots[(slot % LATEST_BLOCK_ROOTS_LENGTH) as usize])
        } else {
            Err(StateTransitionError::MissingHistoricalRoot {
                slot,
                state_slot: self.slot,
            })
        }
    }
}

/// Root committed for an active set: the hash of the little-endian encoded indices.
pub fn active_index_root(indices: &[u64]) -> B256 {
    let bytes = indices
        .iter()
        .flat_map(|index| index.to_le_bytes())
        .collect::<Vec<_>>();
    B256::from(hash_fixed(&bytes))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::test_utils::genesis_state;

    #[rstest]
    #[case::current_slot(10, 10, false)]
    #[case::previous_slot(9, 10, true)]
    #[case::oldest_retained(10, 10 + LATEST_BLOCK_ROOTS_LENGTH, true)]
    #[case::evicted(9, 10 + LATEST_BLOCK_ROOTS_LENGTH, false)]
    fn test_block_root_window(#[case] slot: u64, #[case] state_slot: u64, #[case] found: bool) {
        let mut state = genesis_state(4);
        state.slot = state_slot;
        assert_eq!(state.block_root_at_slot(slot).is_ok(), found);
        if !found {
            assert_eq!(
                state.block_root_at_slot(slot),
                Err(StateTransitionError::MissingHistoricalRoot { slot, state_slot })
            );
        }
    }

    #[test]
    fn test_deposit_top_up_requires_matching_credentials() {
        let mut state = genesis_state(4);
        let mut deposit_data = DepositData {
            pubkey: state.validator_registry[2].pubkey.clone(),
            withdrawal_credentials: state.validator_registry[2].withdrawal_credentials,
            amount: 5,
            proof_of_possession: Default::default(),
        };
        state.apply_deposit(&deposit_data, 0).unwrap();
        assert_eq!(state.validator_balances[2], MAX_DEPOSIT_AMOUNT + 5);
        assert_eq!(state.validator_registry.len(), 4);

        deposit_data.withdrawal_credentials = B256::repeat_byte(0xff);
        assert!(matches!(
            state.apply_deposit(&deposit_data, 3),
            Err(StateTransitionError::InvalidOperation {
                kind: OperationKind::Deposit,
                index: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_slashing_pays_whistleblower() {
        let mut state = genesis_state(4);
        state
            .slash_validator(1, 3, OperationKind::ProposerSlashing, 0)
            .unwrap();

        let reward = MAX_DEPOSIT_AMOUNT / WHISTLEBLOWER_REWARD_QUOTIENT;
        assert_eq!(state.validator_balances[1], MAX_DEPOSIT_AMOUNT - reward);
        assert_eq!(state.validator_balances[3], MAX_DEPOSIT_AMOUNT + reward);
        assert_eq!(state.latest_slashed_balances[0], MAX_DEPOSIT_AMOUNT);
        let validator = &state.validator_registry[1];
        assert!(validator.slashed);
        assert_eq!(validator.exit_epoch, compute_activation_exit_epoch(0));
        assert_eq!(validator.withdrawable_epoch, LATEST_SLASHED_EXIT_LENGTH);
    }
}
