use serde::{Deserialize, Serialize};
use ssz_derive::{Decode, Encode};
use ssz_types::{BitList, typenum::U4096};
use tree_hash_derive::TreeHash;

use crate::{attestation::Attestation, attestation_data::AttestationData};

/// An attestation as recorded in state, stamped with the slot of the block that carried it.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize, Encode, Decode, TreeHash)]
pub struct PendingAttestation {
    pub aggregation_bitfield: BitList<U4096>,
    pub data: AttestationData,
    pub custody_bitfield: BitList<U4096>,
    #[serde(with = "serde_utils::quoted_u64")]
    pub inclusion_slot: u64,
}

impl PendingAttestation {
    pub fn new(attestation: &Attestation, inclusion_slot: u64) -> Self {
        Self {
            aggregation_bitfield: attestation.aggregation_bitfield.clone(),
            data: attestation.data.clone(),
            custody_bitfield: attestation.custody_bitfield.clone(),
            inclusion_slot,
        }
    }
}
