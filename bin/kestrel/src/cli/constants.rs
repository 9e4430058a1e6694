use std::net::{IpAddr, Ipv4Addr};

pub const DEFAULT_ETH1_TIMESTAMP: u64 = 0;
pub const DEFAULT_METRICS_ENABLED: bool = false;
pub const DEFAULT_METRICS_ADDRESS: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
pub const DEFAULT_METRICS_PORT: u16 = 8080;
pub const DEFAULT_NETWORK: &str = "dev";
pub const DEFAULT_RUN_SLOTS: u64 = 64;
pub const DEFAULT_TRANSITION_SLOTS: u64 = 1;
pub const DEFAULT_VALIDATOR_COUNT: u64 = 64;
pub const DEFAULT_VERBOSITY: &str = "3";
