use std::collections::HashMap;

use alloy_primitives::B256;
use kestrel_consensus::{ChainState, beacon_block::SignedBeaconBlock};
use parking_lot::RwLock;

/// Persistence boundary of the chain service. States are keyed by the root of the latest block
/// applied to them.
pub trait StateStore {
    fn load_state(&self, block_root: B256) -> anyhow::Result<Option<ChainState>>;

    fn save_state(&self, block_root: B256, state: &ChainState) -> anyhow::Result<()>;

    /// Whether a block with this root was stored, or a state is anchored at it.
    fn has_block(&self, block_root: B256) -> bool;

    fn save_block(&self, signed_block: &SignedBeaconBlock) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    states: RwLock<HashMap<B256, ChainState>>,
    blocks: RwLock<HashMap<B256, SignedBeaconBlock>>,
}

impl InMemoryStateStore {
    pub fn block(&self, block_root: B256) -> Option<SignedBeaconBlock> {
        self.blocks.read().get(&block_root).cloned()
    }
}

impl StateStore for InMemoryStateStore {
    fn load_state(&self, block_root: B256) -> anyhow::Result<Option<ChainState>> {
        Ok(self.states.read().get(&block_root).cloned())
    }

    fn save_state(&self, block_root: B256, state: &ChainState) -> anyhow::Result<()> {
        self.states.write().insert(block_root, state.clone());
        Ok(())
    }

    fn has_block(&self, block_root: B256) -> bool {
        self.blocks.read().contains_key(&block_root) || self.states.read().contains_key(&block_root)
    }

    fn save_block(&self, signed_block: &SignedBeaconBlock) -> anyhow::Result<()> {
        self.blocks
            .write()
            .insert(signed_block.message.block_root(), signed_block.clone());
        Ok(())
    }
}

impl<T: StateStore + ?Sized> StateStore for std::sync::Arc<T> {
    fn load_state(&self, block_root: B256) -> anyhow::Result<Option<ChainState>> {
        (**self).load_state(block_root)
    }

    fn save_state(&self, block_root: B256, state: &ChainState) -> anyhow::Result<()> {
        (**self).save_state(block_root, state)
    }

    fn has_block(&self, block_root: B256) -> bool {
        (**self).has_block(block_root)
    }

    fn save_block(&self, signed_block: &SignedBeaconBlock) -> anyhow::Result<()> {
        (**self).save_block(signed_block)
    }
}
