use alloy_primitives::B256;
use anyhow::{anyhow, ensure};
use kestrel_consensus::{
    constants::DEPOSIT_CONTRACT_TREE_DEPTH,
    deposit::{Deposit, DepositData},
    traits::DepositSource,
};
use kestrel_merkle::DepositTree;
use ssz::Encode;
use ssz_types::FixedVector;
use tracing::{debug, info, warn};

use crate::{
    logs::{ChainStartLog, DepositLog},
    pending::PendingDeposits,
};

/// Replays deposit-contract logs and hands out the resulting proof-carrying deposits.
///
/// Branches are built from the local tree when deposits are handed out, so they verify against
/// the root at that point rather than the root at the time each log arrived.
#[derive(Debug)]
pub struct DepositTracker {
    tree: DepositTree,
    last_merkle_index: Option<u64>,
    genesis_time: Option<u64>,
    genesis_deposit_data: Vec<DepositData>,
    chain_start_deposits: Vec<Deposit>,
    pending: PendingDeposits,
    eth1_follow_distance: u64,
}

impl DepositTracker {
    pub fn new(eth1_follow_distance: u64) -> anyhow::Result<Self> {
        Ok(Self {
            tree: DepositTree::new(DEPOSIT_CONTRACT_TREE_DEPTH)?,
            last_merkle_index: None,
            genesis_time: None,
            genesis_deposit_data: vec![],
            chain_start_deposits: vec![],
            pending: PendingDeposits::default(),
            eth1_follow_distance,
        })
    }

    pub fn deposit_root(&self) -> B256 {
        self.tree.root()
    }

    pub fn deposit_count(&self) -> u64 {
        self.tree.deposit_count()
    }

    pub fn chain_started(&self) -> bool {
        self.genesis_time.is_some()
    }

    pub fn genesis_time(&self) -> Option<u64> {
        self.genesis_time
    }

    /// Genesis deposits with branches against the chain-start root. Empty until chain start.
    pub fn chain_start_deposits(&self) -> &[Deposit] {
        &self.chain_start_deposits
    }

    pub fn pending(&self) -> &PendingDeposits {
        &self.pending
    }

    /// Add the deposit in ``log`` to the local tree.
    ///
    /// Logs at or below the last accepted merkle index are redeliveries and are skipped. A log
    /// that leaves a gap, or whose root disagrees with the local tree, is an error and leaves the
    /// tracker untouched.
    pub fn process_deposit_log(&mut self, log: &DepositLog) -> anyhow::Result<()> {
        if self
            .last_merkle_index
            .is_some_and(|last| log.merkle_index <= last)
        {
            debug!(merkle_index = log.merkle_index, "Ignoring already seen deposit log");
            return Ok(());
        }
        ensure!(
            log.merkle_index == self.tree.deposit_count(),
            "Deposit log with merkle index {} does not follow the {} deposits seen so far",
            log.merkle_index,
            self.tree.deposit_count()
        );

        let mut tree = self.tree.clone();
        tree.insert(&log.deposit_data.as_ssz_bytes())?;
        ensure!(
            tree.root() == log.deposit_root,
            "Deposit root mismatch at merkle index {}: expected {}, computed {}",
            log.merkle_index,
            log.deposit_root,
            tree.root()
        );
        self.tree = tree;
        self.last_merkle_index = Some(log.merkle_index);

        info!(
            pubkey = ?log.deposit_data.pubkey,
            merkle_index = log.merkle_index,
            "Validator registered in deposit contract"
        );
        if self.chain_started() {
            self.pending.insert(
                log.merkle_index,
                log.deposit_data.clone(),
                log.eth1_block_number,
            );
        } else {
            self.genesis_deposit_data.push(log.deposit_data.clone());
        }
        Ok(())
    }

    /// Mark the chain as started and return its genesis time.
    ///
    /// Only the first chain-start log counts. Later ones return the genesis time already
    /// recorded.
    pub fn process_chain_start_log(&mut self, log: &ChainStartLog) -> anyhow::Result<u64> {
        if let Some(genesis_time) = self.genesis_time {
            warn!(genesis_time, "Ignoring repeated chain start log");
            return Ok(genesis_time);
        }
        ensure!(
            self.tree.root() == log.deposit_root,
            "Chain start root doesn't match the local deposit root, want {} but got {}",
            self.tree.root(),
            log.deposit_root
        );

        let chain_start_deposits = self
            .genesis_deposit_data
            .iter()
            .enumerate()
            .map(|(index, deposit_data)| self.deposit(index as u64, deposit_data.clone()))
            .collect::<anyhow::Result<Vec<_>>>()?;
        self.chain_start_deposits = chain_start_deposits;
        self.genesis_deposit_data.clear();
        self.genesis_time = Some(log.genesis_time);
        info!(
            genesis_time = log.genesis_time,
            deposits = self.chain_start_deposits.len(),
            "Minimum number of validators reached for the chain to start"
        );
        Ok(log.genesis_time)
    }

    /// ``deposit_data`` at ``merkle_index`` with its branch against the current root.
    fn deposit(&self, merkle_index: u64, deposit_data: DepositData) -> anyhow::Result<Deposit> {
        Ok(Deposit {
            branch: FixedVector::new(self.tree.branch(merkle_index)?)
                .map_err(|err| anyhow!("Invalid deposit branch length: {err:?}"))?,
            index: merkle_index,
            deposit_data,
        })
    }
}

impl DepositSource for DepositTracker {
    fn pending_deposits(&self, eth1_head: u64, deposit_index: u64, limit: usize) -> Vec<Deposit> {
        let Some(up_to_block) = eth1_head.checked_sub(self.eth1_follow_distance) else {
            return vec![];
        };
        let mut pending = self
            .pending
            .deposits(Some(up_to_block))
            .into_iter()
            .filter(|(index, _)| *index >= deposit_index)
            .collect::<Vec<_>>();
        pending.sort_by_key(|(index, _)| *index);
        pending.truncate(limit);

        pending
            .into_iter()
            .filter_map(
                |(index, deposit_data)| match self.deposit(index, deposit_data) {
                    Ok(deposit) => Some(deposit),
                    Err(err) => {
                        warn!(merkle_index = index, ?err, "Failed to build deposit branch");
                        None
                    }
                },
            )
            .collect()
    }
}
