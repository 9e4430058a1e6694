use itertools::Itertools;
use ssz_types::VariableList;
use tracing::{debug, info};

use super::{
    ChainState, active_index_root,
    committee::{CommitteeCache, CrosslinkCommittee},
    epoch_aggregates::EpochAggregates,
};
use crate::{
    constants::{
        ACTIVATION_EXIT_DELAY, ATTESTATION_INCLUSION_REWARD_QUOTIENT, BASE_REWARD_QUOTIENT,
        EJECTION_BALANCE, EPOCHS_PER_ETH1_VOTING_PERIOD, FAR_FUTURE_EPOCH,
        INACTIVITY_PENALTY_QUOTIENT, LATEST_ACTIVE_INDEX_ROOTS_LENGTH,
        LATEST_RANDAO_MIXES_LENGTH, LATEST_SLASHED_EXIT_LENGTH, MAX_BALANCE_CHURN_QUOTIENT,
        MAX_DEPOSIT_AMOUNT, MAX_EPOCHS_SINCE_FINALITY, MAX_EXIT_DEQUEUES_PER_EPOCH,
        MIN_ATTESTATION_INCLUSION_DELAY, MIN_PENALTY_QUOTIENT,
        MIN_VALIDATOR_WITHDRAWABILITY_DELAY, SHARD_COUNT, SLOTS_PER_EPOCH,
    },
    crosslink::Crosslink,
    error::StateTransitionError,
    misc::{compute_epoch_at_slot, compute_start_slot_at_epoch, integer_squareroot},
};

/// Shufflings of the previous and current epoch, the only two an epoch transition reads.
struct EpochCommittees {
    previous: CommitteeCache,
    current: CommitteeCache,
}

impl EpochCommittees {
    fn new(state: &ChainState) -> Result<Self, StateTransitionError> {
        Ok(Self {
            previous: state.committee_cache(state.previous_epoch())?,
            current: state.committee_cache(state.current_epoch())?,
        })
    }

    fn for_slot(&self, slot: u64) -> Result<&CommitteeCache, StateTransitionError> {
        let epoch = compute_epoch_at_slot(slot);
        if epoch == self.current.epoch() {
            Ok(&self.current)
        } else if epoch == self.previous.epoch() {
            Ok(&self.previous)
        } else {
            Err(StateTransitionError::CommitteeEpochOutOfRange {
                epoch,
                current_epoch: self.current.epoch(),
            })
        }
    }

    fn committees_at_slot(
        &self,
        slot: u64,
    ) -> Result<Vec<CrosslinkCommittee<'_>>, StateTransitionError> {
        self.for_slot(slot)?.committees_at_slot(slot)
    }

    fn proposer_index(&self, slot: u64) -> Result<u64, StateTransitionError> {
        self.for_slot(slot)?.proposer_index(slot)
    }
}

/// ``3 * part >= 2 * total`` without overflow.
fn is_supermajority(part: u64, total: u64) -> bool {
    3 * part as u128 >= 2 * total as u128
}

/// Apply the four finality rules to ``bitfield`` and return the new finalized epoch.
///
/// Rules match in order and can only raise ``finalized_epoch``. An expected epoch that would
/// fall before genesis never matches.
fn finalize(
    bitfield: u64,
    previous_epoch: u64,
    previous_justified_epoch: u64,
    justified_epoch: u64,
    finalized_epoch: u64,
) -> u64 {
    let rules = [
        (
            (bitfield >> 1) % 8 == 0b111,
            previous_justified_epoch,
            previous_epoch.checked_sub(2),
        ),
        (
            (bitfield >> 1) % 4 == 0b11,
            previous_justified_epoch,
            previous_epoch.checked_sub(1),
        ),
        (
            bitfield % 8 == 0b111,
            justified_epoch,
            previous_epoch.checked_sub(1),
        ),
        (bitfield % 4 == 0b11, justified_epoch, Some(previous_epoch)),
    ];

    rules
        .into_iter()
        .filter(|(pattern, candidate, expected)| *pattern && Some(*candidate) == *expected)
        .fold(finalized_epoch, |finalized, (_, candidate, _)| {
            finalized.max(candidate)
        })
}

/// Per-validator deltas, applied to balances in one pass at the end of the rewards stage.
struct Deltas {
    rewards: Vec<u64>,
    penalties: Vec<u64>,
}

impl Deltas {
    fn new(validator_count: usize) -> Self {
        Self {
            rewards: vec![0; validator_count],
            penalties: vec![0; validator_count],
        }
    }

    fn reward(&mut self, index: u64, delta: u64) -> Result<(), StateTransitionError> {
        add_delta(&mut self.rewards, index, delta)
    }

    fn penalize(&mut self, index: u64, delta: u64) -> Result<(), StateTransitionError> {
        add_delta(&mut self.penalties, index, delta)
    }
}

fn add_delta(deltas: &mut [u64], index: u64, delta: u64) -> Result<(), StateTransitionError> {
    let entry = deltas
        .get_mut(index as usize)
        .ok_or(StateTransitionError::ValidatorIndexOutOfRange { index })?;
    *entry = entry
        .checked_add(delta)
        .ok_or(StateTransitionError::ArithmeticOverflow("reward deltas"))?;
    Ok(())
}

/// ``value * numerator / denominator`` in 128-bit arithmetic.
fn scale(value: u64, numerator: u64, denominator: u64) -> Result<u64, StateTransitionError> {
    (value as u128 * numerator as u128)
        .checked_div(denominator as u128)
        .and_then(|scaled| u64::try_from(scaled).ok())
        .ok_or(StateTransitionError::ArithmeticOverflow("reward scaling"))
}

impl ChainState {
    /// Run the end-of-epoch pipeline on a copy of this state.
    pub fn process_epoch(&self) -> Result<ChainState, StateTransitionError> {
        let mut state = self.clone();
        state.apply_epoch()?;
        Ok(state)
    }

    pub(crate) fn apply_epoch(&mut self) -> Result<(), StateTransitionError> {
        let committees = EpochCommittees::new(self)?;
        let aggregates =
            EpochAggregates::new(self, self, &committees.previous, &committees.current)?;
        debug!(
            epoch = self.current_epoch(),
            previous_attestations = aggregates.previous_epoch_attestations.len(),
            current_attestations = aggregates.current_epoch_attestations.len(),
            "Computed epoch aggregates"
        );

        self.process_eth1_data_votes();
        self.process_justification_and_finalization(&aggregates);
        self.process_crosslinks(&aggregates, &committees)?;
        self.process_rewards_and_penalties(&aggregates, &committees)?;
        self.process_ejections()?;
        self.process_registry_updates(&committees.current)?;
        self.process_final_updates()
    }

    fn process_eth1_data_votes(&mut self) {
        if self.next_epoch() % EPOCHS_PER_ETH1_VOTING_PERIOD != 0 {
            return;
        }

        if let Some(vote) = self.eth1_data_votes.iter().find(|vote| {
            vote.vote_count.saturating_mul(2) > EPOCHS_PER_ETH1_VOTING_PERIOD * SLOTS_PER_EPOCH
        }) {
            info!(
                deposit_root = %vote.eth1_data.deposit_root,
                block_hash = %vote.eth1_data.block_hash,
                "Adopted eth1 data"
            );
            self.latest_eth1_data = vote.eth1_data.clone();
        }
        self.eth1_data_votes = VariableList::empty();
    }

    fn process_justification_and_finalization(&mut self, aggregates: &EpochAggregates) {
        let previous_epoch = self.previous_epoch();
        let current_epoch = self.current_epoch();
        let mut new_justified_epoch = self.justified_epoch;

        self.justification_bitfield <<= 1;
        if is_supermajority(
            aggregates.previous_epoch_boundary.balance,
            aggregates.previous_total_balance,
        ) {
            self.justification_bitfield |= 0b10;
            new_justified_epoch = previous_epoch;
        }
        if is_supermajority(
            aggregates.current_epoch_boundary.balance,
            aggregates.current_total_balance,
        ) {
            self.justification_bitfield |= 0b01;
            new_justified_epoch = current_epoch;
        }

        let finalized_epoch = finalize(
            self.justification_bitfield,
            previous_epoch,
            self.previous_justified_epoch,
            self.justified_epoch,
            self.finalized_epoch,
        );
        if finalized_epoch != self.finalized_epoch {
            info!(
                epoch = current_epoch,
                finalized_epoch, "Finalized new checkpoint"
            );
            self.finalized_epoch = finalized_epoch;
        }

        self.previous_justified_epoch = self.justified_epoch;
        if new_justified_epoch != self.justified_epoch {
            info!(
                epoch = current_epoch,
                justified_epoch = new_justified_epoch,
                "Justified new checkpoint"
            );
        }
        self.justified_epoch = new_justified_epoch;
        debug!(
            bitfield = self.justification_bitfield,
            "Processed justification"
        );
    }

    fn process_crosslinks(
        &mut self,
        aggregates: &EpochAggregates,
        committees: &EpochCommittees,
    ) -> Result<(), StateTransitionError> {
        let current_epoch = self.current_epoch();
        let start_slot = compute_start_slot_at_epoch(self.previous_epoch());
        let end_slot = compute_start_slot_at_epoch(self.next_epoch());

        for slot in start_slot..end_slot {
            for CrosslinkCommittee { shard, committee } in committees.committees_at_slot(slot)? {
                let Some(winning_root) = aggregates.winning_root(shard) else {
                    continue;
                };
                let attesters = aggregates.committee_attesters(shard, committee);
                if is_supermajority(
                    self.total_balance(&attesters)?,
                    self.total_balance(committee)?,
                ) {
                    self.latest_crosslinks[shard as usize] = Crosslink {
                        epoch: current_epoch,
                        crosslink_data_root: winning_root.crosslink_data_root,
                    };
                }
            }
        }
        debug!(epoch = current_epoch, "Processed crosslinks");
        Ok(())
    }

    fn process_rewards_and_penalties(
        &mut self,
        aggregates: &EpochAggregates,
        committees: &EpochCommittees,
    ) -> Result<(), StateTransitionError> {
        let previous_epoch = self.previous_epoch();
        let previous_total_balance = aggregates.previous_total_balance;
        let epochs_since_finality = self.current_epoch().saturating_sub(self.finalized_epoch);
        let reward_quotient = integer_squareroot(previous_total_balance) / BASE_REWARD_QUOTIENT;
        let mut deltas = Deltas::new(self.validator_registry.len());

        let base_reward = |state: &ChainState, index: u64| -> Result<u64, StateTransitionError> {
            state
                .effective_balance(index)?
                .checked_div(reward_quotient)
                .map(|reward| reward / 5)
                .ok_or(StateTransitionError::ArithmeticOverflow("base reward"))
        };
        let inactivity_penalty =
            |state: &ChainState, index: u64| -> Result<u64, StateTransitionError> {
                let leak = scale(
                    state.effective_balance(index)?,
                    epochs_since_finality,
                    INACTIVITY_PENALTY_QUOTIENT,
                )? / 2;
                base_reward(state, index)?
                    .checked_add(leak)
                    .ok_or(StateTransitionError::ArithmeticOverflow("inactivity penalty"))
            };

        let eligible = self.active_validator_indices(previous_epoch);
        let attester_sets = [
            &aggregates.previous_epoch_justified,
            &aggregates.previous_epoch_boundary,
            &aggregates.previous_epoch_head,
        ];

        if epochs_since_finality <= MAX_EPOCHS_SINCE_FINALITY {
            for &index in eligible.iter() {
                let base = base_reward(self, index)?;
                for attesters in attester_sets {
                    if attesters.contains(index) {
                        deltas.reward(
                            index,
                            scale(base, attesters.balance, previous_total_balance)?,
                        )?;
                    } else {
                        deltas.penalize(index, base)?;
                    }
                }
            }
            for (&index, inclusion) in aggregates.inclusions.iter() {
                let base = base_reward(self, index)?;
                deltas.reward(
                    index,
                    scale(
                        base,
                        MIN_ATTESTATION_INCLUSION_DELAY,
                        inclusion.inclusion_distance,
                    )?,
                )?;
            }
        } else {
            for &index in eligible.iter() {
                let base = base_reward(self, index)?;
                let inactivity = inactivity_penalty(self, index)?;
                if !aggregates.previous_epoch_justified.contains(index) {
                    deltas.penalize(index, inactivity)?;
                }
                if !aggregates.previous_epoch_boundary.contains(index) {
                    deltas.penalize(index, inactivity)?;
                }
                if !aggregates.previous_epoch_head.contains(index) {
                    deltas.penalize(index, base)?;
                }
                if self.validator(index)?.slashed {
                    deltas.penalize(index, inactivity.saturating_mul(2).saturating_add(base))?;
                }
            }
            for (&index, inclusion) in aggregates.inclusions.iter() {
                let base = base_reward(self, index)?;
                let timely = scale(
                    base,
                    MIN_ATTESTATION_INCLUSION_DELAY,
                    inclusion.inclusion_distance,
                )?;
                deltas.penalize(index, base.saturating_sub(timely))?;
            }
        }

        for (&index, inclusion) in aggregates.inclusions.iter() {
            let proposer_index = committees.proposer_index(inclusion.inclusion_slot)?;
            deltas.reward(
                proposer_index,
                base_reward(self, index)? / ATTESTATION_INCLUSION_REWARD_QUOTIENT,
            )?;
        }

        let start_slot = compute_start_slot_at_epoch(previous_epoch);
        for slot in start_slot..start_slot + SLOTS_PER_EPOCH {
            for CrosslinkCommittee { shard, committee } in committees.committees_at_slot(slot)? {
                let attesters = aggregates.committee_attesters(shard, committee);
                let attesting_balance = self.total_balance(&attesters)?;
                let committee_balance = self.total_balance(committee)?;
                for &index in committee {
                    let base = base_reward(self, index)?;
                    if attesters.contains(&index) {
                        deltas.reward(index, scale(base, attesting_balance, committee_balance)?)?;
                    } else {
                        deltas.penalize(index, base)?;
                    }
                }
            }
        }

        for (index, (reward, penalty)) in deltas
            .rewards
            .into_iter()
            .zip(deltas.penalties)
            .enumerate()
        {
            self.increase_balance(index as u64, reward)?;
            self.decrease_balance(index as u64, penalty)?;
        }
        debug!(
            epochs_since_finality,
            eligible = eligible.len(),
            "Applied rewards and penalties"
        );
        Ok(())
    }

    fn process_ejections(&mut self) -> Result<(), StateTransitionError> {
        for index in self.active_validator_indices(self.current_epoch()) {
            if self.balance(index)? < EJECTION_BALANCE {
                self.exit_validator(index)?;
                info!(index, "Ejected validator");
            }
        }
        Ok(())
    }

    fn process_registry_updates(
        &mut self,
        current_committees: &CommitteeCache,
    ) -> Result<(), StateTransitionError> {
        let current_epoch = self.current_epoch();
        let next_epoch = self.next_epoch();

        self.previous_shuffling_epoch = self.current_shuffling_epoch;
        self.previous_shuffling_start_shard = self.current_shuffling_start_shard;
        self.previous_shuffling_seed = self.current_shuffling_seed;

        self.process_slashings()?;
        self.process_exit_queue()?;

        if self.should_update_validator_registry(current_committees) {
            self.update_validator_registry()?;
            self.validator_registry_update_epoch = current_epoch;
            self.current_shuffling_start_shard = (self.current_shuffling_start_shard
                + current_committees.committee_count())
                % SHARD_COUNT;
            self.current_shuffling_epoch = next_epoch;
            self.current_shuffling_seed = self.generate_seed(next_epoch);
            info!(
                epoch = current_epoch,
                start_shard = self.current_shuffling_start_shard,
                "Updated validator registry"
            );
        } else {
            let epochs_since_update =
                current_epoch.saturating_sub(self.validator_registry_update_epoch);
            if epochs_since_update > 1 && epochs_since_update.is_power_of_two() {
                self.current_shuffling_epoch = next_epoch;
                self.current_shuffling_seed = self.generate_seed(next_epoch);
                debug!(epoch = current_epoch, "Reseeded shuffling");
            }
        }
        Ok(())
    }

    fn should_update_validator_registry(&self, current_committees: &CommitteeCache) -> bool {
        if self.finalized_epoch <= self.validator_registry_update_epoch {
            return false;
        }
        (0..current_committees.committee_count()).all(|i| {
            let shard = (self.current_shuffling_start_shard + i) % SHARD_COUNT;
            self.latest_crosslinks[shard as usize].epoch > self.validator_registry_update_epoch
        })
    }

    /// Activate queued validators and exit those that asked to, within the churn limit.
    fn update_validator_registry(&mut self) -> Result<(), StateTransitionError> {
        let total_balance =
            self.total_balance(&self.active_validator_indices(self.current_epoch()))?;
        let max_balance_churn =
            MAX_DEPOSIT_AMOUNT.max(total_balance / (2 * MAX_BALANCE_CHURN_QUOTIENT));

        let mut balance_churn = 0u64;
        for index in 0..self.validator_registry.len() as u64 {
            let validator = self.validator(index)?;
            if validator.activation_epoch == FAR_FUTURE_EPOCH
                && self.balance(index)? >= MAX_DEPOSIT_AMOUNT
            {
                balance_churn = balance_churn.saturating_add(self.effective_balance(index)?);
                if balance_churn > max_balance_churn {
                    break;
                }
                self.activate_validator(index, false)?;
            }
        }

        let mut balance_churn = 0u64;
        for index in 0..self.validator_registry.len() as u64 {
            let validator = self.validator(index)?;
            if validator.exit_epoch == FAR_FUTURE_EPOCH && validator.initiated_exit {
                balance_churn = balance_churn.saturating_add(self.effective_balance(index)?);
                if balance_churn > max_balance_churn {
                    break;
                }
                self.exit_validator(index)?;
            }
        }
        Ok(())
    }

    fn process_slashings(&mut self) -> Result<(), StateTransitionError> {
        let current_epoch = self.current_epoch();
        let total_balance = self.total_balance(&self.active_validator_indices(current_epoch))?;
        let epoch_index = (current_epoch % LATEST_SLASHED_EXIT_LENGTH) as usize;
        let total_at_end = self.latest_slashed_balances[epoch_index];
        let total_at_start = self.latest_slashed_balances
            [(epoch_index + 1) % LATEST_SLASHED_EXIT_LENGTH as usize];
        let total_penalties = total_at_end.saturating_sub(total_at_start);

        for index in 0..self.validator_registry.len() as u64 {
            let validator = self.validator(index)?;
            if !validator.slashed
                || validator
                    .withdrawable_epoch
                    .checked_sub(LATEST_SLASHED_EXIT_LENGTH / 2)
                    != Some(current_epoch)
            {
                continue;
            }

            let effective_balance = self.effective_balance(index)?;
            let proportional = if total_balance == 0 {
                0
            } else {
                scale(
                    effective_balance,
                    total_penalties.saturating_mul(3).min(total_balance),
                    total_balance,
                )?
            };
            let penalty = proportional.max(effective_balance / MIN_PENALTY_QUOTIENT);
            self.decrease_balance(index, penalty)?;
            debug!(index, penalty, "Applied slashing penalty");
        }
        Ok(())
    }

    fn process_exit_queue(&mut self) -> Result<(), StateTransitionError> {
        let current_epoch = self.current_epoch();
        let dequeued = self
            .validator_registry
            .iter()
            .enumerate()
            .filter(|(_, validator)| {
                validator.withdrawable_epoch == FAR_FUTURE_EPOCH
                    && current_epoch
                        >= validator
                            .exit_epoch
                            .saturating_add(MIN_VALIDATOR_WITHDRAWABILITY_DELAY)
            })
            .map(|(index, validator)| (validator.exit_epoch, index as u64))
            .sorted()
            .take(MAX_EXIT_DEQUEUES_PER_EPOCH as usize)
            .map(|(_, index)| index)
            .collect::<Vec<_>>();

        for index in dequeued {
            self.prepare_validator_for_withdrawal(index)?;
            debug!(index, "Validator became withdrawable");
        }
        Ok(())
    }

    fn process_final_updates(&mut self) -> Result<(), StateTransitionError> {
        let current_epoch = self.current_epoch();
        let next_epoch = self.next_epoch();

        let index_root_epoch = next_epoch + ACTIVATION_EXIT_DELAY;
        self.latest_active_index_roots
            [(index_root_epoch % LATEST_ACTIVE_INDEX_ROOTS_LENGTH) as usize] =
            active_index_root(&self.active_validator_indices(index_root_epoch));

        self.latest_slashed_balances[(next_epoch % LATEST_SLASHED_EXIT_LENGTH) as usize] =
            self.latest_slashed_balances[(current_epoch % LATEST_SLASHED_EXIT_LENGTH) as usize];
        self.latest_randao_mixes[(next_epoch % LATEST_RANDAO_MIXES_LENGTH) as usize] =
            self.randao_mix(current_epoch);

        let retained = self
            .latest_attestations
            .iter()
            .filter(|attestation| attestation.data.target_epoch() >= current_epoch)
            .cloned()
            .collect::<Vec<_>>();
        self.latest_attestations = VariableList::new(retained)
            .map_err(|_| StateTransitionError::ArithmeticOverflow("latest attestations"))?;
        Ok(())
    }
}
