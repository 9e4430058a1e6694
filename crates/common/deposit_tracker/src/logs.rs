use alloy_primitives::B256;
use kestrel_consensus::deposit::DepositData;

/// A `Deposit` event from the deposit contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositLog {
    /// Contract deposit root after this deposit was added
    pub deposit_root: B256,
    pub deposit_data: DepositData,
    pub merkle_index: u64,
    pub eth1_block_number: u64,
}

/// The `ChainStart` event fired once enough full deposits have been made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStartLog {
    pub deposit_root: B256,
    pub genesis_time: u64,
}
