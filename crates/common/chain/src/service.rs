use std::sync::Arc;

use anyhow::{Context, ensure};
use kestrel_bls::SignatureVerifier;
use kestrel_consensus::{
    ChainState,
    beacon_block::SignedBeaconBlock,
    constants::MAX_DEPOSITS,
    deposit::Deposit,
    state_transition::state_transition,
    traits::DepositSource,
};
use kestrel_metrics::{TransitionMetrics, stop_timer};
use kestrel_network_spec::networks::NetworkSpec;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{message::ChainMessage, store::StateStore};

/// ChainService owns the head [ChainState] and advances it one message at a time.
///
/// There is no fork choice: a block must build on the current head block. Skipped slots between
/// the head and the block are filled with empty-slot transitions.
pub struct ChainService<S, V> {
    head: ChainState,
    store: S,
    verifier: V,
    verify_signatures: bool,
    metrics: Option<TransitionMetrics>,
    network_spec: Arc<NetworkSpec>,
}

impl<S: StateStore, V: SignatureVerifier> ChainService<S, V> {
    /// Start from ``anchor``, which is persisted under its latest block root.
    pub fn new(
        anchor: ChainState,
        store: S,
        verifier: V,
        verify_signatures: bool,
        network_spec: Arc<NetworkSpec>,
    ) -> anyhow::Result<Self> {
        store.save_state(anchor.latest_block_root, &anchor)?;
        Ok(Self {
            head: anchor,
            store,
            verifier,
            verify_signatures,
            metrics: None,
            network_spec,
        })
    }

    pub fn with_metrics(mut self, metrics: TransitionMetrics) -> Self {
        self.metrics = Some(metrics);
        self.report(true);
        self
    }

    pub fn head(&self) -> &ChainState {
        &self.head
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Drain ``receiver`` until every sender is dropped, then hand back the final head.
    pub async fn start(
        mut self,
        mut receiver: mpsc::UnboundedReceiver<ChainMessage>,
    ) -> anyhow::Result<ChainState> {
        info!(
            network = %self.network_spec.network,
            slot = self.head.slot,
            "ChainService started"
        );

        while let Some(message) = receiver.recv().await {
            if let Err(err) = self.process_message(message) {
                warn!(head_slot = self.head.slot, "Rejected chain message: {err:#}");
            }
        }

        info!(
            slot = self.head.slot,
            justified_epoch = self.head.justified_epoch,
            finalized_epoch = self.head.finalized_epoch,
            "ChainService stopped"
        );
        Ok(self.head)
    }

    /// Apply one message to the head. On error the head is left as it was and a rejected block
    /// is counted.
    pub fn process_message(&mut self, message: ChainMessage) -> anyhow::Result<()> {
        match message {
            ChainMessage::Block(signed_block) => {
                let result = self
                    .process_block(&signed_block)
                    .with_context(|| format!("Block at slot {}", signed_block.message.slot));
                if let (Err(_), Some(metrics)) = (&result, &self.metrics) {
                    metrics.rejected_blocks.inc();
                }
                result
            }
            ChainMessage::EmptySlot => self
                .process_empty_slot()
                .with_context(|| format!("Empty slot after {}", self.head.slot)),
        }
    }

    /// Up to [`MAX_DEPOSITS`] deposits the next block should include.
    pub fn deposits_for_next_block(
        &self,
        source: &impl DepositSource,
        eth1_head: u64,
    ) -> Vec<Deposit> {
        source.pending_deposits(eth1_head, self.head.deposit_index, MAX_DEPOSITS as usize)
    }

    fn process_block(&mut self, signed_block: &SignedBeaconBlock) -> anyhow::Result<()> {
        let block = &signed_block.message;
        let block_root = block.block_root();
        if self.store.has_block(block_root) {
            debug!(%block_root, "Ignoring known block");
            return Ok(());
        }
        ensure!(
            self.store.has_block(block.parent_root),
            "Unknown parent {} of block {block_root}",
            block.parent_root
        );
        ensure!(
            block.parent_root == self.head.latest_block_root,
            "Block {block_root} does not build on head block {}",
            self.head.latest_block_root
        );
        ensure!(
            block.slot > self.head.slot,
            "Block {block_root} at slot {} is not ahead of head slot {}",
            block.slot,
            self.head.slot
        );

        let timer = self
            .metrics
            .as_ref()
            .map(|metrics| metrics.start_transition_timer("block"));
        let mut state = self.head.clone();
        while state.slot + 1 < block.slot {
            state = state_transition(&state, None, false, &self.verifier)?;
        }
        let state = state_transition(
            &state,
            Some(signed_block),
            self.verify_signatures,
            &self.verifier,
        )?;
        if let Some(timer) = timer {
            stop_timer(timer);
        }

        self.store.save_block(signed_block)?;
        self.store.save_state(block_root, &state)?;
        let epoch_processed = state.current_epoch() > self.head.current_epoch();
        self.head = state;

        info!(slot = block.slot, %block_root, "Imported block");
        if let Some(metrics) = &self.metrics {
            metrics.processed_blocks.inc();
        }
        self.report(epoch_processed);
        Ok(())
    }

    fn process_empty_slot(&mut self) -> anyhow::Result<()> {
        let timer = self
            .metrics
            .as_ref()
            .map(|metrics| metrics.start_transition_timer("empty_slot"));
        let state = state_transition(&self.head, None, false, &self.verifier)?;
        if let Some(timer) = timer {
            stop_timer(timer);
        }

        self.store.save_state(state.latest_block_root, &state)?;
        let epoch_processed = state.current_epoch() > self.head.current_epoch();
        self.head = state;
        self.report(epoch_processed);
        Ok(())
    }

    fn report(&self, with_balances: bool) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        metrics.report_checkpoints(
            self.head.slot,
            self.head.justified_epoch,
            self.head.previous_justified_epoch,
            self.head.finalized_epoch,
        );
        if with_balances {
            metrics.report_balances(self.head.validator_balances.iter());
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use kestrel_bls::{BLSSignature, BlstVerifier, PubKey};
    use std::ops::Range;

    use kestrel_consensus::{
        beacon_block::{BeaconBlock, BeaconBlockBody},
        constants::{MAX_DEPOSIT_AMOUNT, SLOTS_PER_EPOCH},
        deposit::DepositData,
        eth_1_data::Eth1Data,
        initialize_genesis_state,
    };
    use kestrel_deposit_tracker::{ChainStartLog, DepositLog, DepositTracker};
    use kestrel_merkle::DepositTree;
    use kestrel_network_spec::networks::DEV;
    use parking_lot::Mutex;
    use prometheus_exporter::prometheus::Registry;
    use ssz::Encode;
    use ssz_types::{FixedVector, VariableList};

    use super::*;
    use crate::store::InMemoryStateStore;

    const VALIDATOR_COUNT: u8 = 64;

    fn deposit_data(index: u8) -> DepositData {
        DepositData {
            pubkey: PubKey {
                inner: FixedVector::from(vec![index; 48]),
            },
            withdrawal_credentials: B256::ZERO,
            amount: MAX_DEPOSIT_AMOUNT,
            proof_of_possession: BLSSignature::default(),
        }
    }

    fn genesis() -> ChainState {
        let deposits = (0..VALIDATOR_COUNT)
            .map(|index| Deposit {
                branch: FixedVector::from_elem(B256::ZERO),
                index: index as u64,
                deposit_data: deposit_data(index),
            })
            .collect::<Vec<_>>();
        initialize_genesis_state(&deposits, 0, Eth1Data::default()).unwrap()
    }

    fn service(
        verify_signatures: bool,
    ) -> (
        ChainService<Arc<InMemoryStateStore>, BlstVerifier>,
        Arc<InMemoryStateStore>,
    ) {
        let store = Arc::new(InMemoryStateStore::default());
        let service = ChainService::new(
            genesis(),
            store.clone(),
            BlstVerifier,
            verify_signatures,
            DEV.clone(),
        )
        .unwrap();
        (service, store)
    }

    /// An unsigned block at ``slot`` on top of ``parent``'s latest block.
    fn child_block(parent: &ChainState, slot: u64) -> SignedBeaconBlock {
        SignedBeaconBlock {
            message: BeaconBlock {
                slot,
                parent_root: parent.latest_block_root,
                state_root: B256::ZERO,
                randao_reveal: BLSSignature::default(),
                eth1_data: Eth1Data::default(),
                body: BeaconBlockBody::default(),
            },
            signature: BLSSignature::default(),
        }
    }

    fn block_message(block: SignedBeaconBlock) -> ChainMessage {
        ChainMessage::Block(Box::new(block))
    }

    #[test]
    fn test_empty_slots_advance_head() {
        let (mut service, store) = service(false);
        let genesis_root = service.head().latest_block_root;

        for _ in 0..3 {
            service.process_message(ChainMessage::EmptySlot).unwrap();
        }

        assert_eq!(service.head().slot, 3);
        assert_eq!(service.head().latest_block_root, genesis_root);
        assert_eq!(
            store.load_state(genesis_root).unwrap().unwrap().slot,
            3
        );
    }

    #[test]
    fn test_block_becomes_head_and_is_stored() {
        let (mut service, store) = service(false);
        let block = child_block(service.head(), 1);
        let block_root = block.message.block_root();

        service.process_message(block_message(block.clone())).unwrap();

        assert_eq!(service.head().slot, 1);
        assert_eq!(service.head().latest_block_root, block_root);
        assert!(store.has_block(block_root));
        assert_eq!(store.block(block_root), Some(block));
        assert_eq!(
            store.load_state(block_root).unwrap().as_ref(),
            Some(service.head())
        );
    }

    #[test]
    fn test_known_block_is_ignored() {
        let (mut service, _) = service(false);
        let block = child_block(service.head(), 1);

        service.process_message(block_message(block.clone())).unwrap();
        let head = service.head().clone();
        service.process_message(block_message(block)).unwrap();

        assert_eq!(service.head(), &head);
    }

    #[test]
    fn test_block_fills_skipped_slots() {
        let (mut service, _) = service(false);
        let genesis_root = service.head().latest_block_root;
        let block = child_block(service.head(), 4);

        service.process_message(block_message(block)).unwrap();

        assert_eq!(service.head().slot, 4);
        assert_eq!(service.head().latest_block_roots[3], genesis_root);
    }

    #[test]
    fn test_rejections_keep_head() {
        let registry = Registry::new();
        let (service, _) = service(false);
        let mut service = service.with_metrics(TransitionMetrics::new(&registry).unwrap());
        let genesis = service.head().clone();

        let mut orphan = child_block(&genesis, 1);
        orphan.message.parent_root = B256::repeat_byte(0x11);
        assert!(service.process_message(block_message(orphan)).is_err());

        service.process_message(ChainMessage::EmptySlot).unwrap();
        let stale = child_block(&genesis, 1);
        assert!(service.process_message(block_message(stale)).is_err());

        let metrics = service.metrics.as_ref().unwrap();
        assert_eq!(metrics.rejected_blocks.get(), 2);
        assert_eq!(metrics.processed_blocks.get(), 0);
        assert_eq!(service.head().slot, 1);
        assert_eq!(service.head().latest_block_root, genesis.latest_block_root);
    }

    #[test]
    fn test_invalid_signature_is_rejected_when_verifying() {
        let (mut service, store) = service(true);
        let block = child_block(service.head(), 1);
        let block_root = block.message.block_root();

        assert!(service.process_message(block_message(block)).is_err());
        assert_eq!(service.head().slot, 0);
        assert!(!store.has_block(block_root));
    }

    #[test]
    fn test_metrics_follow_epoch_transition() {
        let registry = Registry::new();
        let (service, _) = service(false);
        let mut service = service.with_metrics(TransitionMetrics::new(&registry).unwrap());

        for _ in 0..SLOTS_PER_EPOCH {
            service.process_message(ChainMessage::EmptySlot).unwrap();
        }

        let metrics = service.metrics.as_ref().unwrap();
        assert_eq!(metrics.last_slot.get(), SLOTS_PER_EPOCH as i64);
        assert_eq!(
            metrics.validator_balances.with_label_values(&["0"]).get(),
            service.head().validator_balances[0] as i64
        );
    }

    #[derive(Default)]
    struct RecordingSource {
        request: Mutex<Option<(u64, u64, usize)>>,
    }

    impl DepositSource for RecordingSource {
        fn pending_deposits(
            &self,
            eth1_head: u64,
            deposit_index: u64,
            limit: usize,
        ) -> Vec<Deposit> {
            *self.request.lock() = Some((eth1_head, deposit_index, limit));
            vec![]
        }
    }

    #[test]
    fn test_deposits_for_next_block_start_at_deposit_index() {
        let (service, _) = service(false);
        let source = RecordingSource::default();

        assert!(service.deposits_for_next_block(&source, 1_000).is_empty());
        assert_eq!(
            *source.request.lock(),
            Some((1_000, VALIDATOR_COUNT as u64, MAX_DEPOSITS as usize))
        );
    }

    /// Logs for the validators in ``indices`` as ``contract`` emits them.
    fn contract_logs(
        contract: &mut DepositTree,
        indices: Range<u8>,
        eth1_block_number: u64,
    ) -> Vec<DepositLog> {
        indices
            .map(|index| {
                let deposit_data = deposit_data(index);
                contract.insert(&deposit_data.as_ssz_bytes()).unwrap();
                DepositLog {
                    deposit_root: contract.root(),
                    deposit_data,
                    merkle_index: index as u64,
                    eth1_block_number,
                }
            })
            .collect()
    }

    #[test]
    fn test_block_with_tracker_deposits_is_imported() {
        let mut contract = DepositTree::default();
        let mut tracker = DepositTracker::new(DEV.eth1_follow_distance).unwrap();
        for log in contract_logs(&mut contract, 0..VALIDATOR_COUNT, 0) {
            tracker.process_deposit_log(&log).unwrap();
        }
        tracker
            .process_chain_start_log(&ChainStartLog {
                deposit_root: tracker.deposit_root(),
                genesis_time: 0,
            })
            .unwrap();
        let mut anchor = initialize_genesis_state(
            tracker.chain_start_deposits(),
            0,
            Eth1Data {
                deposit_root: tracker.deposit_root(),
                block_hash: B256::ZERO,
            },
        )
        .unwrap();

        for log in contract_logs(&mut contract, VALIDATOR_COUNT..VALIDATOR_COUNT + 3, 1) {
            tracker.process_deposit_log(&log).unwrap();
        }
        // Eth1 data agreeing with the contract after the new deposits.
        anchor.latest_eth1_data.deposit_root = tracker.deposit_root();

        let mut service = ChainService::new(
            anchor,
            Arc::new(InMemoryStateStore::default()),
            BlstVerifier,
            false,
            DEV.clone(),
        )
        .unwrap();
        let deposits = service.deposits_for_next_block(&tracker, 1 + DEV.eth1_follow_distance);
        assert_eq!(
            deposits.iter().map(|deposit| deposit.index).collect::<Vec<_>>(),
            vec![64, 65, 66]
        );

        let mut block = child_block(service.head(), 1);
        block.message.body.deposits = VariableList::new(deposits).unwrap();
        service.process_message(block_message(block)).unwrap();

        assert_eq!(service.head().deposit_index, VALIDATOR_COUNT as u64 + 3);
        assert_eq!(
            service.head().validator_registry.len(),
            VALIDATOR_COUNT as usize + 3
        );
        assert_eq!(
            service.head().validator_registry[66].pubkey,
            deposit_data(66).pubkey
        );
    }

    #[tokio::test]
    async fn test_start_drains_channel() {
        let registry = Registry::new();
        let (service, _) = service(false);
        let service = service.with_metrics(TransitionMetrics::new(&registry).unwrap());
        let block = child_block(service.head(), 3);
        let block_root = block.message.block_root();
        let mut orphan = child_block(service.head(), 1);
        orphan.message.parent_root = B256::repeat_byte(0x22);
        let (sender, receiver) = mpsc::unbounded_channel();

        sender.send(block_message(orphan)).unwrap();
        sender.send(ChainMessage::EmptySlot).unwrap();
        sender.send(ChainMessage::EmptySlot).unwrap();
        sender.send(block_message(block)).unwrap();
        sender.send(ChainMessage::EmptySlot).unwrap();
        drop(sender);

        let head = service.start(receiver).await.unwrap();
        assert_eq!(head.slot, 4);
        assert_eq!(head.latest_block_root, block_root);
        let rejected = registry
            .gather()
            .into_iter()
            .find(|family| family.get_name() == "chain_rejected_blocks_total")
            .map(|family| family.get_metric()[0].get_counter().get_value());
        assert_eq!(rejected, Some(1.0));
    }
}
