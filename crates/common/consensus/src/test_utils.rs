use std::sync::LazyLock;

use alloy_primitives::B256;
use kestrel_bls::{BLSSignature, BlstVerifier, PrivateKey, PubKey, traits::Signable};
use ssz_types::{BitList, FixedVector, VariableList};

use crate::{
    attestation::Attestation,
    attestation_data::{AttestationData, AttestationDataAndCustodyBit},
    beacon_block::{BeaconBlock, BeaconBlockBody, SignedBeaconBlock},
    chain_state::ChainState,
    constants::{
        BEACON_CHAIN_SHARD_NUMBER, DOMAIN_ATTESTATION, DOMAIN_DEPOSIT, DOMAIN_PROPOSAL,
        DOMAIN_RANDAO, MAX_DEPOSIT_AMOUNT,
    },
    deposit::{Deposit, DepositData},
    eth_1_data::Eth1Data,
    fork::Fork,
    genesis::initialize_genesis_state,
    misc::{compute_epoch_at_slot, compute_signing_root, compute_start_slot_at_epoch},
    proposer_slashing::Proposal,
    state_transition::state_transition,
    traits::BlockRootLookup,
};

const KEY_COUNT: u64 = 128;

static KEYS: LazyLock<Vec<(PrivateKey, PubKey)>> = LazyLock::new(|| {
    (0..KEY_COUNT)
        .map(|index| {
            let mut ikm = [0u8; 32];
            ikm[..8].copy_from_slice(&(index + 1).to_le_bytes());
            let private_key = PrivateKey::from_seed(&ikm).unwrap();
            let pubkey = private_key.public_key().unwrap();
            (private_key, pubkey)
        })
        .collect()
});

pub fn private_key(index: u64) -> &'static PrivateKey {
    &KEYS[index as usize].0
}

pub fn pubkey(index: u64) -> PubKey {
    KEYS[index as usize].1.clone()
}

pub fn sign(index: u64, signing_root: B256) -> BLSSignature {
    private_key(index).sign(signing_root.as_slice()).unwrap()
}

pub fn withdrawal_credentials(index: u64) -> B256 {
    B256::left_padding_from(&index.to_be_bytes())
}

/// Deposit data for key ``index`` carrying a valid proof of possession.
pub fn deposit_data(index: u64, amount: u64) -> DepositData {
    let mut deposit_data = DepositData {
        pubkey: pubkey(index),
        withdrawal_credentials: withdrawal_credentials(index),
        amount,
        proof_of_possession: BLSSignature::default(),
    };
    let signing_root = compute_signing_root(
        &deposit_data.message(),
        Fork::default().domain(0, DOMAIN_DEPOSIT),
    );
    deposit_data.proof_of_possession = sign(index, signing_root);
    deposit_data
}

/// A deposit with an empty branch, as consumed by genesis.
pub fn deposit(merkle_index: u64, key_index: u64, amount: u64) -> Deposit {
    Deposit {
        branch: FixedVector::from_elem(B256::ZERO),
        index: merkle_index,
        deposit_data: deposit_data(key_index, amount),
    }
}

pub fn genesis_deposits(count: u64) -> Vec<Deposit> {
    (0..count)
        .map(|index| deposit(index, index, MAX_DEPOSIT_AMOUNT))
        .collect()
}

pub fn genesis_state(validator_count: u64) -> ChainState {
    initialize_genesis_state(
        &genesis_deposits(validator_count),
        0,
        Eth1Data::default(),
    )
    .unwrap()
}

/// An unsigned block for ``state``'s slot with a valid randao reveal.
pub fn block(state: &ChainState, body: BeaconBlockBody) -> BeaconBlock {
    let proposer_index = state.beacon_proposer_index(state.slot).unwrap();
    let epoch = state.current_epoch();
    let randao_reveal = sign(
        proposer_index,
        compute_signing_root(&epoch, state.domain(epoch, DOMAIN_RANDAO)),
    );
    BeaconBlock {
        slot: state.slot,
        parent_root: state.latest_block_root,
        state_root: B256::ZERO,
        randao_reveal,
        eth1_data: state.latest_eth1_data.clone(),
        body,
    }
}

pub fn sign_block(state: &ChainState, block: BeaconBlock) -> SignedBeaconBlock {
    let proposer_index = state.beacon_proposer_index(block.slot).unwrap();
    let proposal = Proposal {
        slot: block.slot,
        shard: BEACON_CHAIN_SHARD_NUMBER,
        block_root: block.block_root(),
    };
    let signing_root = compute_signing_root(
        &proposal,
        state.domain(state.current_epoch(), DOMAIN_PROPOSAL),
    );
    SignedBeaconBlock {
        message: block,
        signature: sign(proposer_index, signing_root),
    }
}

pub fn signed_block_with_body(state: &ChainState, body: BeaconBlockBody) -> SignedBeaconBlock {
    sign_block(state, block(state, body))
}

pub fn signed_block(state: &ChainState, attestations: Vec<Attestation>) -> SignedBeaconBlock {
    signed_block_with_body(
        state,
        BeaconBlockBody {
            attestations: VariableList::new(attestations).unwrap(),
            ..Default::default()
        },
    )
}

/// Attestation data for the first committee at ``slot``, voting for the canonical chain.
pub fn attestation_data(state: &ChainState, slot: u64, shard: u64) -> AttestationData {
    let justified_epoch = if compute_epoch_at_slot(slot + 1) >= state.current_epoch() {
        state.justified_epoch
    } else {
        state.previous_justified_epoch
    };
    AttestationData {
        slot,
        shard,
        beacon_block_root: state.block_root_at_slot(slot).unwrap(),
        epoch_boundary_root: state
            .block_root_at_slot(compute_start_slot_at_epoch(compute_epoch_at_slot(slot)))
            .unwrap(),
        crosslink_data_root: B256::ZERO,
        latest_crosslink: state.latest_crosslinks[shard as usize],
        justified_epoch,
        justified_block_root: state
            .block_root_at_slot(compute_start_slot_at_epoch(justified_epoch))
            .unwrap(),
    }
}

/// Aggregate signature of ``signers`` over ``data`` with a zero custody bit.
pub fn sign_attestation_data(
    state: &ChainState,
    data: &AttestationData,
    signers: &[u64],
) -> BLSSignature {
    let message = AttestationDataAndCustodyBit {
        data: data.clone(),
        custody_bit: false,
    };
    let signing_root = compute_signing_root(
        &message,
        state.domain(data.target_epoch(), DOMAIN_ATTESTATION),
    );
    if signers.is_empty() {
        return BLSSignature::default();
    }
    let signatures = signers
        .iter()
        .map(|index| sign(*index, signing_root))
        .collect::<Vec<_>>();
    BLSSignature::aggregate(&signatures.iter().collect::<Vec<_>>()).unwrap()
}

/// A fully signed attestation from the whole first committee at ``slot``.
pub fn attestation(state: &ChainState, slot: u64) -> Attestation {
    let committees = state
        .committee_cache(compute_epoch_at_slot(slot))
        .unwrap();
    let crosslink_committee = committees.committees_at_slot(slot).unwrap()[0];
    let committee = crosslink_committee.committee;
    let data = attestation_data(state, slot, crosslink_committee.shard);

    let mut aggregation_bitfield = BitList::with_capacity(committee.len()).unwrap();
    for i in 0..committee.len() {
        aggregation_bitfield.set(i, true).unwrap();
    }
    Attestation {
        aggregation_bitfield,
        custody_bitfield: BitList::with_capacity(committee.len()).unwrap(),
        aggregate_signature: sign_attestation_data(state, &data, committee),
        data,
    }
}

/// Advance ``slots`` empty slots.
pub fn advance(mut state: ChainState, slots: u64) -> ChainState {
    for _ in 0..slots {
        state = state_transition(&state, None, false, &BlstVerifier).unwrap();
    }
    state
}

/// Produce a block at every slot up to ``to_slot``, each carrying an attestation for the slot
/// ``MIN_ATTESTATION_INCLUSION_DELAY`` earlier.
pub fn advance_with_attestations(mut state: ChainState, to_slot: u64) -> ChainState {
    while state.slot < to_slot {
        let at_slot = state_transition(&state, None, false, &BlstVerifier).unwrap();
        let attestations = match at_slot.slot.checked_sub(4) {
            Some(slot) => vec![attestation(&at_slot, slot)],
            None => vec![],
        };
        let block = signed_block(&at_slot, attestations);
        state = state_transition(&state, Some(&block), false, &BlstVerifier).unwrap();
    }
    state
}
