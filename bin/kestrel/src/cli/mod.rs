pub mod constants;
pub mod genesis;
pub mod run;
pub mod transition;
pub mod verbosity;

use clap::{Parser, Subcommand};

use crate::cli::{
    constants::DEFAULT_VERBOSITY,
    genesis::GenesisConfig,
    run::RunConfig,
    transition::TransitionConfig,
    verbosity::{Verbosity, verbosity_parser},
};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level, from 1 (error) to 5 (trace)
    #[arg(
        short,
        long,
        global = true,
        env = "KESTREL_VERBOSITY",
        default_value = DEFAULT_VERBOSITY,
        value_parser = verbosity_parser
    )]
    pub verbosity: Verbosity,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build a genesis state from deterministic deposits
    #[command(name = "genesis")]
    Genesis(GenesisConfig),

    /// Advance an SSZ state by empty slots or a single block
    #[command(name = "transition")]
    Transition(TransitionConfig),

    /// Drive the chain service from an SSZ state
    #[command(name = "run")]
    Run(RunConfig),
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use kestrel_network_spec::networks::Network;

    use super::*;
    use crate::cli::constants::{DEFAULT_RUN_SLOTS, DEFAULT_VALIDATOR_COUNT};

    #[test]
    fn test_cli_genesis_command() {
        let cli = Cli::parse_from([
            "program",
            "genesis",
            "--output",
            "genesis.ssz",
            "--verbosity",
            "2",
        ]);

        assert_eq!(cli.verbosity, Verbosity::Warn);
        match cli.command {
            Commands::Genesis(config) => {
                assert_eq!(config.validator_count, DEFAULT_VALIDATOR_COUNT);
                assert_eq!(config.network.network, Network::Dev);
                assert_eq!(config.output, PathBuf::from("genesis.ssz"));
            }
            _ => panic!("Expected genesis command"),
        }
    }

    #[test]
    fn test_cli_transition_command() {
        let cli = Cli::parse_from([
            "program",
            "transition",
            "--pre-state",
            "pre.ssz",
            "--block",
            "block.ssz",
            "--verify-signatures",
            "--output",
            "post.ssz",
        ]);

        assert_eq!(cli.verbosity, Verbosity::Info);
        match cli.command {
            Commands::Transition(config) => {
                assert_eq!(config.block, Some(PathBuf::from("block.ssz")));
                assert!(config.verify_signatures);
            }
            _ => panic!("Expected transition command"),
        }
    }

    #[test]
    fn test_cli_run_command() {
        let cli = Cli::parse_from([
            "program",
            "run",
            "--state",
            "genesis.ssz",
            "--network",
            "mainnet",
            "--metrics",
        ]);

        match cli.command {
            Commands::Run(config) => {
                assert_eq!(config.slots, DEFAULT_RUN_SLOTS);
                assert_eq!(config.network.network, Network::Mainnet);
                assert!(config.enable_metrics);
            }
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_verbosity() {
        assert!(Cli::try_parse_from(["program", "-v", "9", "genesis", "--output", "g.ssz"]).is_err());
    }
}
