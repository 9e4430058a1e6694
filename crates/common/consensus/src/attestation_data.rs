use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

use crate::{crosslink::Crosslink, misc::compute_epoch_at_slot};

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct AttestationData {
    #[serde(with = "serde_utils::quoted_u64")]
    pub slot: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub shard: u64,

    /// LMD GHOST vote
    pub beacon_block_root: B256,

    /// FFG vote
    pub epoch_boundary_root: B256,

    /// Crosslink vote
    pub crosslink_data_root: B256,
    pub latest_crosslink: Crosslink,

    /// Last justified epoch in the attester's view
    #[serde(with = "serde_utils::quoted_u64")]
    pub justified_epoch: u64,
    pub justified_block_root: B256,
}

impl AttestationData {
    pub fn target_epoch(&self) -> u64 {
        compute_epoch_at_slot(self.slot)
    }

    /// Two distinct votes targeting the same epoch.
    pub fn is_double_vote(&self, other: &AttestationData) -> bool {
        self.target_epoch() == other.target_epoch()
    }

    /// ``self`` surrounds ``other``: an earlier source and a later target.
    pub fn is_surround_vote(&self, other: &AttestationData) -> bool {
        self.justified_epoch < other.justified_epoch && other.target_epoch() < self.target_epoch()
    }
}

/// The message attesters actually sign.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct AttestationDataAndCustodyBit {
    pub data: AttestationData,
    pub custody_bit: bool,
}
