use alloy_primitives::B256;
use anyhow::ensure;
use kestrel_bls::{BLSSignature, PrivateKey, traits::Signable};
use kestrel_consensus::{
    ChainState,
    constants::{DOMAIN_DEPOSIT, GENESIS_EPOCH, GENESIS_FORK_VERSION, MAX_DEPOSIT_AMOUNT},
    deposit::DepositData,
    eth_1_data::Eth1Data,
    fork::Fork,
    initialize_genesis_state,
    misc::compute_signing_root,
};
use kestrel_deposit_tracker::{ChainStartLog, DepositLog, DepositTracker};
use kestrel_merkle::DepositTree;
use ssz::Encode;
use tracing::info;

use crate::{cli::genesis::GenesisConfig, commands::write_ssz};

/// Stand-in for the Eth1 deposit contract: keeps its own tree and stamps every deposit with the
/// resulting root, one deposit per Eth1 block.
#[derive(Debug, Default)]
struct DevDepositContract {
    tree: DepositTree,
}

impl DevDepositContract {
    fn deposit(&mut self, deposit_data: DepositData) -> anyhow::Result<DepositLog> {
        let merkle_index = self.tree.deposit_count();
        self.tree.insert(&deposit_data.as_ssz_bytes())?;
        Ok(DepositLog {
            deposit_root: self.tree.root(),
            deposit_data,
            merkle_index,
            eth1_block_number: merkle_index,
        })
    }

    fn chain_start(&self, genesis_time: u64) -> ChainStartLog {
        ChainStartLog {
            deposit_root: self.tree.root(),
            genesis_time,
        }
    }
}

/// Key ``index`` of the deterministic validator set.
pub fn interop_private_key(index: u64) -> anyhow::Result<PrivateKey> {
    let mut ikm = [0u8; 32];
    ikm[..8].copy_from_slice(&(index + 1).to_le_bytes());
    Ok(PrivateKey::from_seed(&ikm)?)
}

/// A full deposit for validator ``index`` signed with its own key.
fn interop_deposit_data(index: u64) -> anyhow::Result<DepositData> {
    let private_key = interop_private_key(index)?;
    let mut deposit_data = DepositData {
        pubkey: private_key.public_key()?,
        withdrawal_credentials: B256::left_padding_from(&index.to_be_bytes()),
        amount: MAX_DEPOSIT_AMOUNT,
        proof_of_possession: BLSSignature::default(),
    };
    let genesis_fork = Fork {
        previous_version: GENESIS_FORK_VERSION,
        current_version: GENESIS_FORK_VERSION,
        epoch: GENESIS_EPOCH,
    };
    let signing_root = compute_signing_root(
        &deposit_data.message(),
        genesis_fork.domain(GENESIS_EPOCH, DOMAIN_DEPOSIT),
    );
    deposit_data.proof_of_possession = private_key.sign(signing_root.as_slice())?;
    Ok(deposit_data)
}

pub fn build_genesis_state(config: &GenesisConfig) -> anyhow::Result<ChainState> {
    let network = &config.network;
    ensure!(
        config.validator_count >= network.chain_start_deposit_threshold,
        "{} validators is below the chain start threshold of {} for {}",
        config.validator_count,
        network.chain_start_deposit_threshold,
        network.network
    );

    let mut contract = DevDepositContract::default();
    let mut tracker = DepositTracker::new(network.eth1_follow_distance)?;
    for index in 0..config.validator_count {
        let log = contract.deposit(interop_deposit_data(index)?)?;
        tracker.process_deposit_log(&log)?;
    }
    let genesis_time = tracker.process_chain_start_log(
        &contract.chain_start(network.genesis_time(config.eth1_timestamp)),
    )?;

    let eth1_data = Eth1Data {
        deposit_root: tracker.deposit_root(),
        block_hash: B256::ZERO,
    };
    Ok(initialize_genesis_state(
        tracker.chain_start_deposits(),
        genesis_time,
        eth1_data,
    )?)
}

pub fn run_genesis(config: GenesisConfig) -> anyhow::Result<()> {
    let state = build_genesis_state(&config)?;
    write_ssz(&config.output, &state)?;
    info!(
        validators = state.validator_registry.len(),
        genesis_time = state.genesis_time,
        output = %config.output.display(),
        "Wrote genesis state"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use kestrel_network_spec::networks::DEV;
    use tempfile::TempDir;

    use super::*;
    use crate::commands::read_ssz;

    fn config(validator_count: u64, output: std::path::PathBuf) -> GenesisConfig {
        GenesisConfig {
            network: DEV.clone(),
            validator_count,
            eth1_timestamp: 1_000,
            output,
        }
    }

    #[test]
    fn test_genesis_writes_activated_state() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("genesis.ssz");

        run_genesis(config(DEV.chain_start_deposit_threshold, output.clone())).unwrap();

        let state: ChainState = read_ssz(&output).unwrap();
        assert_eq!(
            state.active_validator_indices(GENESIS_EPOCH).len() as u64,
            DEV.chain_start_deposit_threshold
        );
        assert_eq!(state.genesis_time, 1_000);
        assert_eq!(state.deposit_index, DEV.chain_start_deposit_threshold);
        assert_ne!(state.latest_eth1_data.deposit_root, B256::ZERO);
    }

    #[test]
    fn test_genesis_below_threshold_fails() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("genesis.ssz");

        assert!(
            run_genesis(config(DEV.chain_start_deposit_threshold - 1, output.clone())).is_err()
        );
        assert!(!output.exists());
    }
}
