use alloy_primitives::B256;
use kestrel_bls::BLSSignature;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

/// What a proposer signs for a block: the slot, the shard it was proposed on and the block root.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Proposal {
    #[serde(with = "serde_utils::quoted_u64")]
    pub slot: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub shard: u64,
    pub block_root: B256,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct SignedProposal {
    pub message: Proposal,
    pub signature: BLSSignature,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct ProposerSlashing {
    #[serde(with = "serde_utils::quoted_u64")]
    pub proposer_index: u64,
    pub proposal_1: SignedProposal,
    pub proposal_2: SignedProposal,
}
