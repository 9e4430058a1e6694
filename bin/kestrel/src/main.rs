mod cli;
mod commands;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    cli::{Cli, Commands},
    commands::{genesis::run_genesis, run::run_chain, transition::run_transition},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::builder().parse_lossy(cli.verbosity.directive()))
        .init();
    info!("Starting kestrel with verbosity {:?}", cli.verbosity);

    match cli.command {
        Commands::Genesis(config) => run_genesis(config),
        Commands::Transition(config) => run_transition(config),
        Commands::Run(config) => run_chain(config).await.map(|_| ()),
    }
}
