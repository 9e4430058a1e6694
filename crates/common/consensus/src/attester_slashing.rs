use kestrel_bls::BLSSignature;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{
    BitList, VariableList,
    serde_utils::quoted_u64_var_list,
    typenum::U4096,
};
use tree_hash_derive::TreeHash;

use crate::attestation_data::AttestationData;

/// An attestation with its participants spelled out by validator index.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct SlashableAttestation {
    #[serde(with = "quoted_u64_var_list")]
    pub validator_indices: VariableList<u64, U4096>,
    pub data: AttestationData,
    pub custody_bitfield: BitList<U4096>,
    pub aggregate_signature: BLSSignature,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct AttesterSlashing {
    pub slashable_attestation_1: SlashableAttestation,
    pub slashable_attestation_2: SlashableAttestation,
}
