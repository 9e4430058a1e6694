use blst::min_pk::PublicKey as BlstPublicKey;

use crate::{errors::BLSError, pubkey::PubKey};

impl From<BlstPublicKey> for PubKey {
    fn from(value: BlstPublicKey) -> Self {
        PubKey {
            inner: value.compress().to_vec().into(),
        }
    }
}

impl PubKey {
    pub fn to_blst_pubkey(&self) -> Result<BlstPublicKey, BLSError> {
        BlstPublicKey::from_bytes(&self.inner).map_err(|_| BLSError::InvalidPublicKey)
    }
}
