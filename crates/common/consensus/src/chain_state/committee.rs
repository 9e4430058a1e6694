use ssz_types::{BitList, typenum::U4096};

use super::ChainState;
use crate::{
    constants::{SHARD_COUNT, SLOTS_PER_EPOCH},
    error::StateTransitionError,
    misc::{compute_epoch_at_slot, compute_epoch_committee_count, compute_shuffled_index},
};

/// A committee together with the shard it is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrosslinkCommittee<'a> {
    pub shard: u64,
    pub committee: &'a [u64],
}

/// One epoch's shuffling, split into committees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitteeCache {
    epoch: u64,
    start_shard: u64,
    committees: Vec<Vec<u64>>,
}

impl CommitteeCache {
    /// Shuffle for ``epoch``, which must be the state's current or previous epoch.
    pub fn new(state: &ChainState, epoch: u64) -> Result<Self, StateTransitionError> {
        let current_epoch = state.current_epoch();
        let (shuffling_epoch, start_shard, seed) = if epoch == current_epoch {
            (
                state.current_shuffling_epoch,
                state.current_shuffling_start_shard,
                state.current_shuffling_seed,
            )
        } else if epoch == state.previous_epoch() {
            (
                state.previous_shuffling_epoch,
                state.previous_shuffling_start_shard,
                state.previous_shuffling_seed,
            )
        } else {
            return Err(StateTransitionError::CommitteeEpochOutOfRange {
                epoch,
                current_epoch,
            });
        };

        let active_validator_indices = state.active_validator_indices(shuffling_epoch);
        let index_count = active_validator_indices.len();
        let shuffled = (0..index_count)
            .map(|i| {
                compute_shuffled_index(i, index_count, seed)
                    .map(|shuffled_index| active_validator_indices[shuffled_index])
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committee_count = compute_epoch_committee_count(index_count as u64);
        let length = index_count as u64;
        let committees = (0..committee_count)
            .map(|i| {
                let start = (length * i / committee_count) as usize;
                let end = (length * (i + 1) / committee_count) as usize;
                shuffled[start..end].to_vec()
            })
            .collect();

        Ok(Self {
            epoch,
            start_shard,
            committees,
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn committee_count(&self) -> u64 {
        self.committees.len() as u64
    }

    /// Committees assigned to ``slot`` in shard order.
    pub fn committees_at_slot(
        &self,
        slot: u64,
    ) -> Result<Vec<CrosslinkCommittee<'_>>, StateTransitionError> {
        let epoch = compute_epoch_at_slot(slot);
        if epoch != self.epoch {
            return Err(StateTransitionError::CommitteeEpochOutOfRange {
                epoch,
                current_epoch: self.epoch,
            });
        }

        let committees_per_slot = self.committee_count() / SLOTS_PER_EPOCH;
        let offset = slot % SLOTS_PER_EPOCH;
        let slot_start_shard = (self.start_shard + committees_per_slot * offset) % SHARD_COUNT;
        Ok((0..committees_per_slot)
            .map(|i| CrosslinkCommittee {
                shard: (slot_start_shard + i) % SHARD_COUNT,
                committee: &self.committees[(committees_per_slot * offset + i) as usize],
            })
            .collect())
    }

    pub fn committee_for_shard(
        &self,
        slot: u64,
        shard: u64,
    ) -> Result<Option<&[u64]>, StateTransitionError> {
        Ok(self
            .committees_at_slot(slot)?
            .into_iter()
            .find(|crosslink_committee| crosslink_committee.shard == shard)
            .map(|crosslink_committee| crosslink_committee.committee))
    }

    /// Validators of the ``shard`` committee at ``slot`` whose bit is set in ``bitfield``.
    ///
    /// Returns ``None`` when no such committee exists or the bitfield length does not match it.
    pub fn participants(
        &self,
        slot: u64,
        shard: u64,
        bitfield: &BitList<U4096>,
    ) -> Result<Option<Vec<u64>>, StateTransitionError> {
        let Some(committee) = self.committee_for_shard(slot, shard)? else {
            return Ok(None);
        };
        if bitfield.len() != committee.len() {
            return Ok(None);
        }
        Ok(Some(
            committee
                .iter()
                .enumerate()
                .filter(|(i, _)| bitfield.get(*i).unwrap_or(false))
                .map(|(_, index)| *index)
                .collect(),
        ))
    }

    /// The proposer at ``slot``: a member of the slot's first committee chosen by slot.
    pub fn proposer_index(&self, slot: u64) -> Result<u64, StateTransitionError> {
        let committees = self.committees_at_slot(slot)?;
        let first_committee = committees
            .first()
            .map(|crosslink_committee| crosslink_committee.committee)
            .unwrap_or_default();
        if first_committee.is_empty() {
            return Err(StateTransitionError::EmptyCommittee { slot });
        }
        Ok(first_committee[(slot % first_committee.len() as u64) as usize])
    }
}

impl ChainState {
    pub fn committee_cache(&self, epoch: u64) -> Result<CommitteeCache, StateTransitionError> {
        CommitteeCache::new(self, epoch)
    }

    /// Return the beacon proposer index at ``slot``.
    pub fn beacon_proposer_index(&self, slot: u64) -> Result<u64, StateTransitionError> {
        self.committee_cache(compute_epoch_at_slot(slot))?
            .proposer_index(slot)
    }
}
