use std::net::SocketAddr;

use anyhow::anyhow;
use kestrel_bls::BlstVerifier;
use kestrel_chain::{ChainMessage, ChainService, InMemoryStateStore};
use kestrel_consensus::ChainState;
use kestrel_metrics::TransitionMetrics;
use prometheus_exporter::prometheus::default_registry;
use tokio::sync::mpsc;
use tracing::info;

use crate::{cli::run::RunConfig, commands::read_ssz};

pub async fn run_chain(config: RunConfig) -> anyhow::Result<ChainState> {
    let anchor: ChainState = read_ssz(&config.state)?;

    let _exporter = if config.enable_metrics {
        let address = SocketAddr::new(config.metrics_address, config.metrics_port);
        info!("Serving metrics on {address}");
        Some(prometheus_exporter::start(address)?)
    } else {
        None
    };

    let mut service = ChainService::new(
        anchor,
        InMemoryStateStore::default(),
        BlstVerifier,
        config.verify_signatures,
        config.network.clone(),
    )?;
    if config.enable_metrics {
        service = service.with_metrics(TransitionMetrics::new(default_registry())?);
    }

    let (sender, receiver) = mpsc::unbounded_channel();
    let service_handle = tokio::spawn(service.start(receiver));

    for _ in 0..config.slots {
        sender.send(ChainMessage::EmptySlot)?;
    }
    drop(sender);

    let head = service_handle
        .await
        .map_err(|err| anyhow!("Chain service task failed: {err}"))??;
    info!(
        slot = head.slot,
        latest_block_root = %head.latest_block_root,
        previous_justified_epoch = head.previous_justified_epoch,
        justified_epoch = head.justified_epoch,
        finalized_epoch = head.finalized_epoch,
        "Chain service finished"
    );
    Ok(head)
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use kestrel_network_spec::networks::DEV;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        cli::genesis::GenesisConfig,
        commands::{genesis::build_genesis_state, write_ssz},
    };

    #[tokio::test]
    async fn test_run_feeds_empty_slots() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("genesis.ssz");
        let genesis = build_genesis_state(&GenesisConfig {
            network: DEV.clone(),
            validator_count: 8,
            eth1_timestamp: 0,
            output: Default::default(),
        })
        .unwrap();
        write_ssz(&state, &genesis).unwrap();

        let head = run_chain(RunConfig {
            state,
            network: DEV.clone(),
            slots: 5,
            verify_signatures: false,
            enable_metrics: false,
            metrics_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            metrics_port: 0,
        })
        .await
        .unwrap();

        assert_eq!(head.slot, 5);
        assert_eq!(head.latest_block_root, genesis.latest_block_root);
    }
}
