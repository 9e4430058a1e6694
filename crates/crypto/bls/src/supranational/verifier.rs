use tracing::trace;

use crate::{BLSSignature, PubKey, traits::SignatureVerifier, traits::Verifiable};

/// [`SignatureVerifier`] backed by blst.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlstVerifier;

impl SignatureVerifier for BlstVerifier {
    fn verify(&self, pubkey: &PubKey, message: &[u8], signature: &BLSSignature) -> bool {
        signature.verify(pubkey, message).unwrap_or_else(|err| {
            trace!("Rejecting undecodable signature input: {err}");
            false
        })
    }

    fn verify_aggregate(
        &self,
        pubkeys: &[&PubKey],
        message: &[u8],
        signature: &BLSSignature,
    ) -> bool {
        signature
            .fast_aggregate_verify(pubkeys, message)
            .unwrap_or_else(|err| {
                trace!("Rejecting undecodable aggregate input: {err}");
                false
            })
    }
}
