use std::{
    fmt,
    sync::{Arc, LazyLock},
};

use alloy_primitives::{Address, address};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Dev,
    Custom(String),
}

impl<'de> Deserialize<'de> for Network {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match String::deserialize(deserializer)?.as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "dev" => Ok(Network::Dev),
            custom => Ok(Network::Custom(custom.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Dev => write!(f, "dev"),
            Network::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Runtime parameters of the Eth1 side of a network: when the chain may start and which deposit
/// logs count towards it.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct NetworkSpec {
    #[serde(rename = "CONFIG_NAME")]
    pub network: Network,

    // Genesis
    pub min_genesis_time: u64,
    pub genesis_delay: u64,
    pub chain_start_deposit_threshold: u64,

    // Eth1
    pub eth1_follow_distance: u64,
    pub deposit_contract_address: Address,
}

impl NetworkSpec {
    /// Genesis time for a chain-start event observed at ``eth1_timestamp``.
    ///
    /// With a non-zero delay the timestamp is rounded up to the next multiple of the delay. The
    /// result never precedes ``min_genesis_time``.
    pub fn genesis_time(&self, eth1_timestamp: u64) -> u64 {
        let genesis_time = match self.genesis_delay {
            0 => eth1_timestamp,
            delay => (eth1_timestamp - eth1_timestamp % delay).saturating_add(delay),
        };
        genesis_time.max(self.min_genesis_time)
    }
}

pub static MAINNET: LazyLock<Arc<NetworkSpec>> = LazyLock::new(|| {
    NetworkSpec {
        network: Network::Mainnet,
        min_genesis_time: 1578009600,
        genesis_delay: 86400,
        chain_start_deposit_threshold: 16384,
        eth1_follow_distance: 1024,
        deposit_contract_address: address!("0x00000000219ab540356cBB839Cbe05303d7705Fa"),
    }
    .into()
});

pub static DEV: LazyLock<Arc<NetworkSpec>> = LazyLock::new(|| {
    NetworkSpec {
        network: Network::Dev,
        min_genesis_time: 0,
        genesis_delay: 0,
        chain_start_deposit_threshold: 8,
        eth1_follow_distance: 16,
        deposit_contract_address: address!("0x4242424242424242424242424242424242424242"),
    }
    .into()
});
