use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ssz_derive::{Decode, Encode};
use ssz_types::{FixedVector, typenum::U96};
use tree_hash_derive::TreeHash;

use crate::{constants::SIGNATURE_BYTES_LEN, errors::BLSError, hex_serde};

/// Compressed G2 point. The all-zero value is used for unsigned messages.
#[derive(Debug, PartialEq, Clone, Encode, Decode, TreeHash, Default, Eq, Hash)]
pub struct BLSSignature {
    pub inner: FixedVector<u8, U96>,
}

impl Serialize for BLSSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        hex_serde::serialize(self.to_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for BLSSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = hex_serde::deserialize(deserializer)?;
        BLSSignature::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl BLSSignature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BLSError> {
        Ok(BLSSignature {
            inner: FixedVector::new(bytes.to_vec()).map_err(|_| BLSError::InvalidByteLength {
                expected: SIGNATURE_BYTES_LEN,
                actual: bytes.len(),
            })?,
        })
    }

    pub fn to_bytes(&self) -> &[u8] {
        self.inner.iter().as_slice()
    }
}
