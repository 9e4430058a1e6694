use std::{net::IpAddr, path::PathBuf, sync::Arc};

use clap::Parser;
use kestrel_network_spec::{cli::network_parser, networks::NetworkSpec};

use crate::cli::constants::{
    DEFAULT_METRICS_ADDRESS, DEFAULT_METRICS_ENABLED, DEFAULT_METRICS_PORT, DEFAULT_NETWORK,
    DEFAULT_RUN_SLOTS,
};

#[derive(Debug, Parser)]
pub struct RunConfig {
    #[arg(long, help = "SSZ encoded anchor state")]
    pub state: PathBuf,

    #[arg(
        long,
        help = "Choose mainnet or dev, or provide a path to a YAML config file",
        default_value = DEFAULT_NETWORK,
        value_parser = network_parser
    )]
    pub network: Arc<NetworkSpec>,

    #[arg(long, help = "Number of empty slots to feed the chain service", default_value_t = DEFAULT_RUN_SLOTS)]
    pub slots: u64,

    #[arg(long, help = "Verify block signatures")]
    pub verify_signatures: bool,

    #[arg(long = "metrics", env = "KESTREL_METRICS", help = "Enable metrics", default_value_t = DEFAULT_METRICS_ENABLED)]
    pub enable_metrics: bool,

    #[arg(long, help = "Set metrics address", default_value_t = DEFAULT_METRICS_ADDRESS)]
    pub metrics_address: IpAddr,

    #[arg(long, help = "Set metrics port", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,
}
