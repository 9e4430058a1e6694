pub mod attestation;
pub mod attestation_data;
pub mod attester_slashing;
pub mod beacon_block;
pub mod chain_state;
pub mod constants;
pub mod crosslink;
pub mod deposit;
pub mod error;
pub mod eth_1_data;
pub mod fork;
pub mod genesis;
pub mod misc;
pub mod pending_attestation;
pub mod proposer_slashing;
pub mod signing_data;
pub mod state_transition;
pub mod traits;
pub mod validator;
pub mod voluntary_exit;

#[cfg(test)]
pub(crate) mod test_utils;

pub use chain_state::ChainState;
pub use error::{OperationKind, ProofKind, StateTransitionError};
pub use genesis::initialize_genesis_state;
pub use state_transition::state_transition;
