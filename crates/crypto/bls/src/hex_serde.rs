use alloy_primitives::hex;
use serde::{Deserialize, Deserializer, Serializer};

use crate::errors::BLSError;

pub(crate) fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
}

pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: String = Deserialize::deserialize(deserializer)?;
    decode(&value).map_err(serde::de::Error::custom)
}

pub(crate) fn decode(value: &str) -> Result<Vec<u8>, BLSError> {
    let clean_str = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(clean_str).map_err(|_| BLSError::InvalidHexString)
}
