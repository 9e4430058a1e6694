use alloy_primitives::B256;
use ethereum_hashing::hash_fixed;
use kestrel_bls::{BLSSignature, PubKey};
use serde::{Deserialize, Serialize};
use ssz::Encode as _;
use ssz_derive::{Decode, Encode};
use ssz_types::{FixedVector, typenum::U32};
use tree_hash_derive::TreeHash;

/// The part of a deposit covered by the proof of possession.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct DepositMessage {
    pub pubkey: PubKey,
    pub withdrawal_credentials: B256,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct DepositData {
    pub pubkey: PubKey,
    pub withdrawal_credentials: B256,
    #[serde(with = "serde_utils::quoted_u64")]
    pub amount: u64,
    pub proof_of_possession: BLSSignature,
}

impl DepositData {
    pub fn message(&self) -> DepositMessage {
        DepositMessage {
            pubkey: self.pubkey.clone(),
            withdrawal_credentials: self.withdrawal_credentials,
        }
    }

    /// Leaf committed to the deposit tree: the hash of the SSZ encoding.
    pub fn leaf(&self) -> B256 {
        B256::from(hash_fixed(&self.as_ssz_bytes()))
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Deposit {
    /// Branch in the deposit tree
    pub branch: FixedVector<B256, U32>,

    /// Index in the deposit tree
    #[serde(with = "serde_utils::quoted_u64")]
    pub index: u64,

    pub deposit_data: DepositData,
}
