use std::path::PathBuf;

use clap::Parser;

use crate::cli::constants::DEFAULT_TRANSITION_SLOTS;

#[derive(Debug, Parser)]
pub struct TransitionConfig {
    #[arg(long, help = "SSZ encoded state to start from")]
    pub pre_state: PathBuf,

    #[arg(
        long,
        help = "SSZ encoded signed block to apply. Skipped slots before it are filled in"
    )]
    pub block: Option<PathBuf>,

    #[arg(
        long,
        help = "Number of empty slots to advance when no block is given",
        default_value_t = DEFAULT_TRANSITION_SLOTS
    )]
    pub slots: u64,

    #[arg(long, help = "Verify block signatures")]
    pub verify_signatures: bool,

    #[arg(long, help = "Where to write the SSZ encoded post state")]
    pub output: PathBuf,
}
