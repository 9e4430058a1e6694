use thiserror::Error;

#[derive(Error, PartialEq, Eq, Debug, Clone)]
pub enum BLSError {
    #[error("invalid hex string")]
    InvalidHexString,
    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidByteLength { expected: usize, actual: usize },
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[cfg(feature = "supranational")]
    #[error("blst error: {0}")]
    BlstError(String),
}
