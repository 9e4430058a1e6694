//! Eth1 deposit-contract log ingestion.
//!
//! Deposit logs are replayed into a local [`DepositTree`](kestrel_merkle::DepositTree) whose root
//! must track the contract's. Deposits seen before the chain-start log become the genesis
//! deposits; later ones wait in [`PendingDeposits`] until they are far enough behind the Eth1 head
//! to be included in a block.

pub mod logs;
pub mod pending;
pub mod tracker;

pub use logs::{ChainStartLog, DepositLog};
pub use pending::PendingDeposits;
pub use tracker::DepositTracker;
