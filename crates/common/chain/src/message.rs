use kestrel_consensus::beacon_block::SignedBeaconBlock;

/// Input to the [`ChainService`](crate::ChainService) loop. Each message advances the head by at
/// least one slot or is rejected.
#[derive(Debug, Clone)]
pub enum ChainMessage {
    Block(Box<SignedBeaconBlock>),
    EmptySlot,
}
