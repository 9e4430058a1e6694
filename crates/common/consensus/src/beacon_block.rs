use alloy_primitives::B256;
use kestrel_bls::BLSSignature;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{
    VariableList,
    typenum::{U1, U16, U128},
};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

use crate::{
    attestation::Attestation, attester_slashing::AttesterSlashing, constants::GENESIS_SLOT,
    deposit::Deposit, eth_1_data::Eth1Data, proposer_slashing::ProposerSlashing,
    voluntary_exit::SignedVoluntaryExit,
};

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct SignedBeaconBlock {
    pub message: BeaconBlock,
    pub signature: BLSSignature,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct BeaconBlock {
    #[serde(with = "serde_utils::quoted_u64")]
    pub slot: u64,
    pub parent_root: B256,
    pub state_root: B256,
    pub randao_reveal: BLSSignature,
    pub eth1_data: Eth1Data,
    pub body: BeaconBlockBody,
}

impl BeaconBlock {
    /// The empty block every chain starts from, committing to the genesis state.
    pub fn genesis(state_root: B256) -> Self {
        Self {
            slot: GENESIS_SLOT,
            parent_root: B256::ZERO,
            state_root,
            randao_reveal: BLSSignature::default(),
            eth1_data: Eth1Data::default(),
            body: BeaconBlockBody::default(),
        }
    }

    pub fn block_root(&self) -> B256 {
        self.tree_hash_root()
    }
}

#[derive(
    Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash, Default,
)]
pub struct BeaconBlockBody {
    pub proposer_slashings: VariableList<ProposerSlashing, U16>,
    pub attester_slashings: VariableList<AttesterSlashing, U1>,
    pub attestations: VariableList<Attestation, U128>,
    pub deposits: VariableList<Deposit, U16>,
    pub voluntary_exits: VariableList<SignedVoluntaryExit, U16>,
}
