use alloy_primitives::B256;

use crate::{deposit::Deposit, error::StateTransitionError};

/// Historical block root lookup used wherever a vote is compared against the canonical chain.
pub trait BlockRootLookup {
    /// Fails with [`StateTransitionError::MissingHistoricalRoot`] outside the retained window.
    fn block_root_at_slot(&self, slot: u64) -> Result<B256, StateTransitionError>;
}

/// Supplier of proof-checked deposits that have cleared the Eth1 follow distance.
pub trait DepositSource {
    /// Deposits with index at or above ``deposit_index`` from Eth1 blocks far enough behind
    /// ``eth1_head``, in index order and at most ``limit`` of them.
    fn pending_deposits(&self, eth1_head: u64, deposit_index: u64, limit: usize) -> Vec<Deposit>;
}
