use alloy_primitives::{aliases::B32, fixed_bytes};

pub const ACTIVATION_EXIT_DELAY: u64 = 4;
pub const ATTESTATION_INCLUSION_REWARD_QUOTIENT: u64 = 8;
pub const BASE_REWARD_QUOTIENT: u64 = 32;
pub const BEACON_CHAIN_SHARD_NUMBER: u64 = u64::MAX;
pub const DEPOSIT_CONTRACT_TREE_DEPTH: u64 = 32;
pub const DOMAIN_ATTESTATION: B32 = fixed_bytes!("0x01000000");
pub const DOMAIN_DEPOSIT: B32 = fixed_bytes!("0x00000000");
pub const DOMAIN_EXIT: B32 = fixed_bytes!("0x03000000");
pub const DOMAIN_PROPOSAL: B32 = fixed_bytes!("0x02000000");
pub const DOMAIN_RANDAO: B32 = fixed_bytes!("0x04000000");
pub const EJECTION_BALANCE: u64 = 16_000_000_000;
pub const EPOCHS_PER_ETH1_VOTING_PERIOD: u64 = 16;
pub const FAR_FUTURE_EPOCH: u64 = u64::MAX;
pub const GENESIS_EPOCH: u64 = 0;
pub const GENESIS_FORK_VERSION: B32 = fixed_bytes!("0x00000000");
pub const GENESIS_SLOT: u64 = 0;
pub const GENESIS_START_SHARD: u64 = 0;
pub const INACTIVITY_PENALTY_QUOTIENT: u64 = 16_777_216;
pub const LATEST_ACTIVE_INDEX_ROOTS_LENGTH: u64 = 8192;
pub const LATEST_BLOCK_ROOTS_LENGTH: u64 = 8192;
pub const LATEST_RANDAO_MIXES_LENGTH: u64 = 8192;
pub const LATEST_SLASHED_EXIT_LENGTH: u64 = 8192;
pub const MAX_ATTESTATIONS: u64 = 128;
pub const MAX_ATTESTER_SLASHINGS: u64 = 1;
pub const MAX_BALANCE_CHURN_QUOTIENT: u64 = 32;
pub const MAX_DEPOSIT_AMOUNT: u64 = 32_000_000_000;
pub const MAX_DEPOSITS: u64 = 16;
pub const MAX_EXIT_DEQUEUES_PER_EPOCH: u64 = 4;
pub const MAX_INDICES_PER_SLASHABLE_VOTE: u64 = 4096;
pub const MAX_PROPOSER_SLASHINGS: u64 = 16;
pub const MAX_VOLUNTARY_EXITS: u64 = 16;
pub const MIN_ATTESTATION_INCLUSION_DELAY: u64 = 4;
pub const MIN_DEPOSIT_AMOUNT: u64 = 1_000_000_000;
pub const MIN_PENALTY_QUOTIENT: u64 = 32;
pub const MIN_SEED_LOOKAHEAD: u64 = 1;
pub const MIN_VALIDATOR_WITHDRAWABILITY_DELAY: u64 = 256;
pub const PERSISTENT_COMMITTEE_PERIOD: u64 = 2048;
pub const SHARD_COUNT: u64 = 1024;
pub const SHUFFLE_ROUND_COUNT: u8 = 90;
pub const SLOTS_PER_EPOCH: u64 = 64;
pub const TARGET_COMMITTEE_SIZE: u64 = 128;
pub const WHISTLEBLOWER_REWARD_QUOTIENT: u64 = 512;

/// Depth of the tree whose leaves are one full ``latest_block_roots`` ring.
pub const BATCHED_BLOCK_ROOTS_DEPTH: u64 = 13;

/// Finality is considered stalled once it lags the previous epoch by more than this.
pub const MAX_EPOCHS_SINCE_FINALITY: u64 = 4;
