use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use kestrel_network_spec::{cli::network_parser, networks::NetworkSpec};

use crate::cli::constants::{DEFAULT_ETH1_TIMESTAMP, DEFAULT_NETWORK, DEFAULT_VALIDATOR_COUNT};

#[derive(Debug, Parser)]
pub struct GenesisConfig {
    #[arg(
        long,
        help = "Choose mainnet or dev, or provide a path to a YAML config file",
        default_value = DEFAULT_NETWORK,
        value_parser = network_parser
    )]
    pub network: Arc<NetworkSpec>,

    #[arg(long, help = "Number of deterministic validators to deposit", default_value_t = DEFAULT_VALIDATOR_COUNT)]
    pub validator_count: u64,

    #[arg(
        long,
        help = "Eth1 timestamp at which the chain start log fires",
        default_value_t = DEFAULT_ETH1_TIMESTAMP
    )]
    pub eth1_timestamp: u64,

    #[arg(long, help = "Where to write the SSZ encoded genesis state")]
    pub output: PathBuf,
}
