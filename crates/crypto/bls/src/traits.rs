use crate::{BLSSignature, PubKey};

pub trait Signable {
    type Error;

    fn sign(&self, message: &[u8]) -> Result<BLSSignature, Self::Error>;
}

pub trait Verifiable {
    type Error;

    /// Verifies a BLS signature against a public key and message.
    ///
    /// # Returns
    /// * `Ok(true)` if the signature is valid, `Ok(false)` if verification fails, or `Err` if the
    ///   signature or public key bytes do not decode to curve points
    fn verify(&self, pubkey: &PubKey, message: &[u8]) -> Result<bool, Self::Error>;

    /// Verifies the signature against a message using an aggregate of multiple public keys.
    fn fast_aggregate_verify<'a, P>(&self, pubkeys: P, message: &[u8]) -> Result<bool, Self::Error>
    where
        P: AsRef<[&'a PubKey]>;
}

/// Pluggable signature check used by the state transition.
///
/// Implementations answer a plain yes or no. Malformed keys and signatures count as invalid.
pub trait SignatureVerifier {
    fn verify(&self, pubkey: &PubKey, message: &[u8], signature: &BLSSignature) -> bool;

    /// Check one signature over ``message`` against the aggregate of ``pubkeys``.
    fn verify_aggregate(&self, pubkeys: &[&PubKey], message: &[u8], signature: &BLSSignature)
    -> bool;
}

impl<T: SignatureVerifier + ?Sized> SignatureVerifier for &T {
    fn verify(&self, pubkey: &PubKey, message: &[u8], signature: &BLSSignature) -> bool {
        (**self).verify(pubkey, message, signature)
    }

    fn verify_aggregate(
        &self,
        pubkeys: &[&PubKey],
        message: &[u8],
        signature: &BLSSignature,
    ) -> bool {
        (**self).verify_aggregate(pubkeys, message, signature)
    }
}
