use kestrel_bls::BlstVerifier;
use kestrel_consensus::{
    ChainState, beacon_block::SignedBeaconBlock, state_transition::state_transition,
};
use tracing::info;

use crate::{
    cli::transition::TransitionConfig,
    commands::{read_ssz, write_ssz},
};

/// Advance ``state`` to the slot of ``signed_block`` and apply it, or advance ``slots`` empty
/// slots when there is no block.
pub fn advance_state(
    state: &ChainState,
    signed_block: Option<&SignedBeaconBlock>,
    slots: u64,
    verify_signatures: bool,
) -> anyhow::Result<ChainState> {
    let verifier = BlstVerifier;
    let mut state = state.clone();
    match signed_block {
        Some(signed_block) => {
            while state.slot + 1 < signed_block.message.slot {
                state = state_transition(&state, None, false, &verifier)?;
            }
            state = state_transition(&state, Some(signed_block), verify_signatures, &verifier)?;
        }
        None => {
            for _ in 0..slots {
                state = state_transition(&state, None, false, &verifier)?;
            }
        }
    }
    Ok(state)
}

pub fn run_transition(config: TransitionConfig) -> anyhow::Result<()> {
    let pre_state: ChainState = read_ssz(&config.pre_state)?;
    let signed_block = config
        .block
        .as_deref()
        .map(read_ssz::<SignedBeaconBlock>)
        .transpose()?;

    let post_state = advance_state(
        &pre_state,
        signed_block.as_ref(),
        config.slots,
        config.verify_signatures,
    )?;
    write_ssz(&config.output, &post_state)?;

    info!(
        pre_slot = pre_state.slot,
        post_slot = post_state.slot,
        justified_epoch = post_state.justified_epoch,
        finalized_epoch = post_state.finalized_epoch,
        output = %config.output.display(),
        "Wrote post state"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use kestrel_bls::BLSSignature;
    use kestrel_consensus::beacon_block::{BeaconBlock, BeaconBlockBody};
    use kestrel_network_spec::networks::DEV;
    use tempfile::TempDir;

    use super::*;
    use crate::{cli::genesis::GenesisConfig, commands::genesis::build_genesis_state};

    fn genesis(validator_count: u64) -> ChainState {
        build_genesis_state(&GenesisConfig {
            network: DEV.clone(),
            validator_count,
            eth1_timestamp: 0,
            output: Default::default(),
        })
        .unwrap()
    }

    fn unsigned_block(parent: &ChainState, slot: u64) -> SignedBeaconBlock {
        SignedBeaconBlock {
            message: BeaconBlock {
                slot,
                parent_root: parent.latest_block_root,
                state_root: B256::ZERO,
                randao_reveal: BLSSignature::default(),
                eth1_data: parent.latest_eth1_data.clone(),
                body: BeaconBlockBody::default(),
            },
            signature: BLSSignature::default(),
        }
    }

    #[test]
    fn test_transition_command_advances_empty_slots() {
        let dir = TempDir::new().unwrap();
        let pre_state = dir.path().join("pre.ssz");
        let output = dir.path().join("post.ssz");
        write_ssz(&pre_state, &genesis(8)).unwrap();

        run_transition(TransitionConfig {
            pre_state,
            block: None,
            slots: 3,
            verify_signatures: false,
            output: output.clone(),
        })
        .unwrap();

        let post_state: ChainState = read_ssz(&output).unwrap();
        assert_eq!(post_state.slot, 3);
    }

    #[test]
    fn test_block_after_skipped_slots() {
        let state = genesis(64);
        let block = unsigned_block(&state, 3);

        let post_state = advance_state(&state, Some(&block), 0, false).unwrap();

        assert_eq!(post_state.slot, 3);
        assert_eq!(post_state.latest_block_root, block.message.block_root());
    }

    #[test]
    fn test_unsigned_block_fails_verification() {
        let state = genesis(64);
        let block = unsigned_block(&state, 1);

        assert!(advance_state(&state, Some(&block), 0, true).is_err());
    }
}
