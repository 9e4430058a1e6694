use alloy_primitives::B256;
use kestrel_bls::PubKey;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use tree_hash_derive::TreeHash;

use crate::constants::FAR_FUTURE_EPOCH;

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Validator {
    pub pubkey: PubKey,

    /// Commitment to pubkey for withdrawals
    pub withdrawal_credentials: B256,

    #[serde(with = "serde_utils::quoted_u64")]
    pub activation_epoch: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub exit_epoch: u64,

    /// When validator can withdraw funds
    #[serde(with = "serde_utils::quoted_u64")]
    pub withdrawable_epoch: u64,

    /// Set by a voluntary exit, honoured at the next registry update
    pub initiated_exit: bool,
    pub slashed: bool,
}

impl Validator {
    /// A freshly deposited validator with every lifecycle epoch unset.
    pub fn from_deposit(pubkey: PubKey, withdrawal_credentials: B256) -> Self {
        Self {
            pubkey,
            withdrawal_credentials,
            activation_epoch: FAR_FUTURE_EPOCH,
            exit_epoch: FAR_FUTURE_EPOCH,
            withdrawable_epoch: FAR_FUTURE_EPOCH,
            initiated_exit: false,
            slashed: false,
        }
    }

    pub fn is_active_validator(&self, epoch: u64) -> bool {
        self.activation_epoch <= epoch && epoch < self.exit_epoch
    }
}
