use alloy_primitives::{B256, aliases::B32};
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

#[derive(
    Debug, PartialEq, Clone, Copy, Serialize, Deserialize, Encode, Decode, TreeHash, Eq, Default,
)]
pub struct Fork {
    pub previous_version: B32,
    pub current_version: B32,
    #[serde(with = "serde_utils::quoted_u64")]
    pub epoch: u64,
}

impl Fork {
    /// Return the fork version in effect at ``epoch``.
    pub fn version(&self, epoch: u64) -> B32 {
        if epoch < self.epoch {
            self.previous_version
        } else {
            self.current_version
        }
    }

    /// Return the signature domain: ``domain_type`` followed by the fork version at ``epoch``,
    /// zero padded to 32 bytes.
    pub fn domain(&self, epoch: u64, domain_type: B32) -> B256 {
        let mut domain = B256::ZERO;
        domain[..4].copy_from_slice(domain_type.as_slice());
        domain[4..8].copy_from_slice(self.version(epoch).as_slice());
        domain
    }
}
