use std::fmt;

use alloy_primitives::B256;

/// Big-endian BLS secret scalar. Only ever used to sign deposits and test fixtures.
#[derive(PartialEq, Eq, Clone)]
pub struct PrivateKey {
    pub inner: B256,
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}
