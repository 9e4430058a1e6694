use kestrel_bls::BLSSignature;
use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{BitList, typenum::U4096};
use tree_hash_derive::TreeHash;

use crate::attestation_data::AttestationData;

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct Attestation {
    pub aggregation_bitfield: BitList<U4096>,
    pub data: AttestationData,
    pub custody_bitfield: BitList<U4096>,
    pub aggregate_signature: BLSSignature,
}
