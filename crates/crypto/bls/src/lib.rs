pub mod constants;
pub mod errors;
mod hex_serde;
pub mod private_key;
pub mod pubkey;
pub mod signature;
pub mod traits;

#[cfg(feature = "supranational")]
pub mod supranational;

pub use private_key::PrivateKey;
pub use pubkey::PubKey;
pub use signature::BLSSignature;
#[cfg(feature = "supranational")]
pub use supranational::verifier::BlstVerifier;
pub use traits::SignatureVerifier;
