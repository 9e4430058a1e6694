use std::collections::BTreeMap;

use kestrel_consensus::deposit::DepositData;
use parking_lot::RwLock;

/// Deposits received after chain start that have not been included in a block yet.
///
/// Keyed by Eth1 block number and then merkle index, which is also the iteration order. Only the
/// deposit data is kept: a branch is only valid for one deposit root, so branches are built when
/// the deposits are handed out.
#[derive(Debug, Default)]
pub struct PendingDeposits {
    deposits: RwLock<BTreeMap<(u64, u64), DepositData>>,
}

impl PendingDeposits {
    pub fn insert(&self, merkle_index: u64, deposit_data: DepositData, eth1_block_number: u64) {
        self.deposits
            .write()
            .insert((eth1_block_number, merkle_index), deposit_data);
    }

    /// Returns whether a deposit with ``merkle_index`` was buffered.
    pub fn remove(&self, merkle_index: u64) -> bool {
        let mut deposits = self.deposits.write();
        let before = deposits.len();
        deposits.retain(|(_, index), _| *index != merkle_index);
        deposits.len() != before
    }

    /// Merkle index and data of the buffered deposits from blocks at or below ``up_to_block``, or
    /// all of them for `None`.
    pub fn deposits(&self, up_to_block: Option<u64>) -> Vec<(u64, DepositData)> {
        let deposits = self.deposits.read();
        let entries = deposits.range(..=(up_to_block.unwrap_or(u64::MAX), u64::MAX));
        entries
            .map(|((_, index), deposit_data)| (*index, deposit_data.clone()))
            .collect()
    }

    /// Drop every deposit whose merkle index is below ``below_index``.
    pub fn prune(&self, below_index: u64) {
        self.deposits
            .write()
            .retain(|(_, index), _| *index >= below_index);
    }

    pub fn len(&self) -> usize {
        self.deposits.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.deposits.read().is_empty()
    }
}
