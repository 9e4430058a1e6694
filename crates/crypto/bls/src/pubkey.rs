use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ssz_derive::{Decode, Encode};
use ssz_types::{FixedVector, typenum::U48};
use tree_hash_derive::TreeHash;

use crate::{constants::PUBKEY_BYTES_LEN, errors::BLSError, hex_serde};

/// Compressed G1 point as it appears in validator records and deposits.
#[derive(Debug, PartialEq, Clone, Encode, Decode, TreeHash, Default, Eq, Hash)]
pub struct PubKey {
    pub inner: FixedVector<u8, U48>,
}

impl Serialize for PubKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        hex_serde::serialize(self.to_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for PubKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = hex_serde::deserialize(deserializer)?;
        PubKey::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl PubKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BLSError> {
        Ok(PubKey {
            inner: FixedVector::new(bytes.to_vec()).map_err(|_| BLSError::InvalidByteLength {
                expected: PUBKEY_BYTES_LEN,
                actual: bytes.len(),
            })?,
        })
    }

    pub fn to_bytes(&self) -> &[u8] {
        self.inner.iter().as_slice()
    }
}

impl FromStr for PubKey {
    type Err = BLSError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PubKey::from_bytes(&hex_serde::decode(s)?)
    }
}
