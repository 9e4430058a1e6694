use alloy_primitives::B256;
use blst::min_pk::SecretKey as BlstSecretKey;

use crate::{
    PrivateKey, PubKey, constants::DST, errors::BLSError, signature::BLSSignature,
    traits::Signable,
};

impl PrivateKey {
    /// Derive a key from at least 32 bytes of input keying material.
    pub fn from_seed(ikm: &[u8]) -> Result<Self, BLSError> {
        let secret_key = BlstSecretKey::key_gen(ikm, &[])
            .map_err(|err| BLSError::BlstError(format!("{err:?}")))?;
        Ok(PrivateKey {
            inner: B256::from(secret_key.to_bytes()),
        })
    }

    pub fn public_key(&self) -> Result<PubKey, BLSError> {
        Ok(PubKey::from(self.to_blst_secret_key()?.sk_to_pk()))
    }

    fn to_blst_secret_key(&self) -> Result<BlstSecretKey, BLSError> {
        BlstSecretKey::from_bytes(self.inner.as_slice()).map_err(|_| BLSError::InvalidPrivateKey)
    }
}

impl Signable for PrivateKey {
    type Error = BLSError;

    fn sign(&self, message: &[u8]) -> Result<BLSSignature, Self::Error> {
        Ok(BLSSignature::from(
            self.to_blst_secret_key()?.sign(message, DST, &[]),
        ))
    }
}
