use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::B256;

use super::{ChainState, committee::CommitteeCache};
use crate::{
    error::StateTransitionError, misc::compute_start_slot_at_epoch,
    pending_attestation::PendingAttestation, traits::BlockRootLookup,
};

/// A pending attestation with its participants resolved against the committee it was cast in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipatingAttestation {
    pub attestation: PendingAttestation,
    pub participants: Vec<u64>,
}

/// A set of attesting validators and their combined effective balance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttesterSet {
    pub indices: BTreeSet<u64>,
    pub balance: u64,
}

impl AttesterSet {
    fn new<'a>(
        state: &ChainState,
        attestations: impl IntoIterator<Item = &'a ParticipatingAttestation>,
    ) -> Result<Self, StateTransitionError> {
        let indices = attestations
            .into_iter()
            .flat_map(|attestation| attestation.participants.iter().copied())
            .collect::<BTreeSet<_>>();
        let balance = state.total_balance(&indices)?;
        Ok(Self { indices, balance })
    }

    pub fn contains(&self, index: u64) -> bool {
        self.indices.contains(&index)
    }
}

/// Earliest inclusion of a validator's previous-epoch attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inclusion {
    pub inclusion_slot: u64,
    pub inclusion_distance: u64,
}

/// The crosslink data root with the most attesting balance for one shard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinningRoot {
    pub crosslink_data_root: B256,
    pub attesters: BTreeSet<u64>,
}

/// Read-only tallies over ``latest_attestations`` that drive one epoch transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpochAggregates {
    pub current_total_balance: u64,
    pub previous_total_balance: u64,

    pub current_epoch_attestations: Vec<ParticipatingAttestation>,
    pub previous_epoch_attestations: Vec<ParticipatingAttestation>,

    pub current_epoch_boundary: AttesterSet,
    pub previous_epoch_attesters: AttesterSet,
    pub previous_epoch_justified: AttesterSet,
    pub previous_epoch_boundary: AttesterSet,
    pub previous_epoch_head: AttesterSet,

    pub inclusions: BTreeMap<u64, Inclusion>,
    pub winning_roots: BTreeMap<u64, WinningRoot>,
}

impl EpochAggregates {
    /// Classify the state's attestations. ``previous_committees`` and ``current_committees``
    /// must be the shufflings of the state's previous and current epoch.
    pub fn new(
        state: &ChainState,
        block_roots: &impl BlockRootLookup,
        previous_committees: &CommitteeCache,
        current_committees: &CommitteeCache,
    ) -> Result<Self, StateTransitionError> {
        let current_epoch = state.current_epoch();
        let previous_epoch = state.previous_epoch();

        let current_total_balance =
            state.total_balance(&state.active_validator_indices(current_epoch))?;
        let previous_total_balance =
            state.total_balance(&state.active_validator_indices(previous_epoch))?;

        let mut current_epoch_attestations = vec![];
        let mut previous_epoch_attestations = vec![];
        for attestation in state.latest_attestations.iter() {
            let data = &attestation.data;
            let epoch = data.target_epoch();
            let committees = if epoch == current_epoch {
                current_committees
            } else if epoch == previous_epoch {
                previous_committees
            } else {
                continue;
            };
            let participants = committees
                .participants(data.slot, data.shard, &attestation.aggregation_bitfield)?
                .ok_or(StateTransitionError::EmptyCommittee { slot: data.slot })?;
            let participating = ParticipatingAttestation {
                attestation: attestation.clone(),
                participants,
            };
            // Both apply during the genesis epoch.
            if epoch == previous_epoch {
                previous_epoch_attestations.push(participating.clone());
            }
            if epoch == current_epoch {
                current_epoch_attestations.push(participating);
            }
        }

        let current_epoch_boundary = if current_epoch_attestations.is_empty() {
            AttesterSet::default()
        } else {
            let boundary_root =
                block_roots.block_root_at_slot(compute_start_slot_at_epoch(current_epoch))?;
            AttesterSet::new(
                state,
                current_epoch_attestations.iter().filter(|attestation| {
                    let data = &attestation.attestation.data;
                    data.epoch_boundary_root == boundary_root
                        && data.justified_epoch == state.justified_epoch
                }),
            )?
        };

        let previous_epoch_attesters = AttesterSet::new(state, &previous_epoch_attestations)?;
        let previous_epoch_justified = AttesterSet::new(
            state,
            previous_epoch_attestations.iter().filter(|attestation| {
                attestation.attestation.data.justified_epoch == state.previous_justified_epoch
            }),
        )?;

        let mut previous_epoch_boundary = AttesterSet::default();
        let mut previous_epoch_head = AttesterSet::default();
        if !previous_epoch_attestations.is_empty() {
            let boundary_root =
                block_roots.block_root_at_slot(compute_start_slot_at_epoch(previous_epoch))?;
            previous_epoch_boundary = AttesterSet::new(
                state,
                previous_epoch_attestations.iter().filter(|attestation| {
                    attestation.attestation.data.epoch_boundary_root == boundary_root
                }),
            )?;

            let mut head_attestations = vec![];
            for attestation in previous_epoch_attestations.iter() {
                let data = &attestation.attestation.data;
                if data.beacon_block_root == block_roots.block_root_at_slot(data.slot)? {
                    head_attestations.push(attestation);
                }
            }
            previous_epoch_head = AttesterSet::new(state, head_attestations)?;
        }

        let inclusions = earliest_inclusions(&previous_epoch_attestations);
        let winning_roots = winning_roots(
            state,
            current_epoch_attestations
                .iter()
                .chain(previous_epoch_attestations.iter()),
        )?;

        Ok(Self {
            current_total_balance,
            previous_total_balance,
            current_epoch_attestations,
            previous_epoch_attestations,
            current_epoch_boundary,
            previous_epoch_attesters,
            previous_epoch_justified,
            previous_epoch_boundary,
            previous_epoch_head,
            inclusions,
            winning_roots,
        })
    }

    pub fn winning_root(&self, shard: u64) -> Option<&WinningRoot> {
        self.winning_roots.get(&shard)
    }

    /// Members of ``committee`` that attested to the winning root of ``shard``.
    pub fn committee_attesters(&self, shard: u64, committee: &[u64]) -> BTreeSet<u64> {
        self.winning_root(shard)
            .map(|winning_root| {
                committee
                    .iter()
                    .copied()
                    .filter(|index| winning_root.attesters.contains(index))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn earliest_inclusions(attestations: &[ParticipatingAttestation]) -> BTreeMap<u64, Inclusion> {
    let mut inclusions = BTreeMap::<u64, Inclusion>::new();
    for attestation in attestations {
        let inclusion_slot = attestation.attestation.inclusion_slot;
        let inclusion = Inclusion {
            inclusion_slot,
            inclusion_distance: inclusion_slot.saturating_sub(attestation.attestation.data.slot),
        };
        for index in attestation.participants.iter() {
            inclusions
                .entry(*index)
                .and_modify(|existing| {
                    if inclusion_slot < existing.inclusion_slot {
                        *existing = inclusion;
                    }
                })
                .or_insert(inclusion);
        }
    }
    inclusions
}

fn winning_roots<'a>(
    state: &ChainState,
    attestations: impl Iterator<Item = &'a ParticipatingAttestation>,
) -> Result<BTreeMap<u64, WinningRoot>, StateTransitionError> {
    let mut candidates = BTreeMap::<u64, BTreeMap<B256, BTreeSet<u64>>>::new();
    for attestation in attestations {
        let data = &attestation.attestation.data;
        candidates
            .entry(data.shard)
            .or_default()
            .entry(data.crosslink_data_root)
            .or_default()
            .extend(attestation.participants.iter().copied());
    }

    let mut winning_roots = BTreeMap::new();
    for (shard, mut roots) in candidates {
        let balances = roots
            .iter()
            .map(|(root, attesters)| Ok((*root, state.total_balance(attesters)?)))
            .collect::<Result<BTreeMap<_, _>, StateTransitionError>>()?;
        if let Some((crosslink_data_root, _)) = select_winning_root(&balances) {
            let attesters = roots.remove(&crosslink_data_root).unwrap_or_default();
            winning_roots.insert(
                shard,
                WinningRoot {
                    crosslink_data_root,
                    attesters,
                },
            );
        }
    }
    Ok(winning_roots)
}

/// Pick the root with the highest attesting balance. Ties go to the lexicographically lower root.
pub fn select_winning_root(balances: &BTreeMap<B256, u64>) -> Option<(B256, u64)> {
    balances
        .iter()
        .fold(None, |best, (root, balance)| match best {
            Some((_, best_balance)) if best_balance >= *balance => best,
            _ => Some((*root, *balance)),
        })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{
        constants::{MAX_DEPOSIT_AMOUNT, SLOTS_PER_EPOCH},
        test_utils::{advance_with_attestations, genesis_state},
    };

    #[test]
    fn test_equal_balances_pick_lower_root() {
        let mut balances = BTreeMap::new();
        balances.insert(B256::repeat_byte(0x02), 64);
        balances.insert(B256::repeat_byte(0x01), 64);

        assert_eq!(
            select_winning_root(&balances),
            Some((B256::repeat_byte(0x01), 64))
        );
    }

    #[rstest]
    #[case::higher_root_wins(10, 11, 0x02)]
    #[case::lower_root_wins(11, 10, 0x01)]
    fn test_higher_balance_wins(#[case] low: u64, #[case] high: u64, #[case] expected: u8) {
        let balances = BTreeMap::from([
            (B256::repeat_byte(0x01), low),
            (B256::repeat_byte(0x02), high),
        ]);
        assert_eq!(
            select_winning_root(&balances).map(|(root, _)| root),
            Some(B256::repeat_byte(expected))
        );
    }

    #[test]
    fn test_no_candidates() {
        assert_eq!(select_winning_root(&BTreeMap::new()), None);
    }

    #[test]
    fn test_genesis_epoch_attestations_count_as_current_and_previous() {
        let state = advance_with_attestations(genesis_state(64), 20);
        let previous = state.committee_cache(state.previous_epoch()).unwrap();
        let current = state.committee_cache(state.current_epoch()).unwrap();
        let aggregates = EpochAggregates::new(&state, &state, &previous, &current).unwrap();

        // Blocks at slots 4..=20 carried attestations for slots 0..=16.
        assert_eq!(aggregates.current_epoch_attestations.len(), 17);
        assert_eq!(aggregates.previous_epoch_attestations.len(), 17);
        assert_eq!(aggregates.current_epoch_boundary.indices.len(), 17);
        assert_eq!(aggregates.previous_epoch_head.indices.len(), 17);
        assert_eq!(
            aggregates.previous_epoch_boundary.balance,
            17 * MAX_DEPOSIT_AMOUNT
        );
        assert_eq!(aggregates.current_total_balance, 64 * MAX_DEPOSIT_AMOUNT);
        assert!(
            aggregates
                .inclusions
                .values()
                .all(|inclusion| inclusion.inclusion_distance == 4)
        );
        assert_eq!(aggregates.winning_roots.len(), 17);
        assert!(state.slot < SLOTS_PER_EPOCH);
    }
}
