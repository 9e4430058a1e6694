use kestrel_bls::{BLSSignature, PubKey, SignatureVerifier};
use kestrel_merkle::is_valid_merkle_branch;
use tracing::{debug, info};

use super::{ChainState, committee::CommitteeCache};
use crate::{
    attestation::Attestation,
    attestation_data::{AttestationData, AttestationDataAndCustodyBit},
    attester_slashing::{AttesterSlashing, SlashableAttestation},
    beacon_block::{BeaconBlock, SignedBeaconBlock},
    constants::{
        BEACON_CHAIN_SHARD_NUMBER, DEPOSIT_CONTRACT_TREE_DEPTH, DOMAIN_ATTESTATION,
        DOMAIN_DEPOSIT, DOMAIN_EXIT, DOMAIN_PROPOSAL, DOMAIN_RANDAO,
        MAX_INDICES_PER_SLASHABLE_VOTE, MIN_ATTESTATION_INCLUSION_DELAY,
        PERSISTENT_COMMITTEE_PERIOD, SHARD_COUNT, SLOTS_PER_EPOCH,
    },
    crosslink::Crosslink,
    deposit::Deposit,
    error::{OperationKind, ProofKind, StateTransitionError, ensure_valid, ensure_verified},
    eth_1_data::{Eth1Data, Eth1DataVote},
    misc::{
        compute_activation_exit_epoch, compute_epoch_at_slot, compute_signing_root,
        compute_start_slot_at_epoch, is_sorted_and_unique, xor,
    },
    pending_attestation::PendingAttestation,
    proposer_slashing::{Proposal, ProposerSlashing},
    traits::BlockRootLookup,
    validator::Validator,
    voluntary_exit::SignedVoluntaryExit,
};

impl ChainState {
    /// Apply ``signed_block`` to a copy of this state.
    ///
    /// The block must be for the state's slot. Operations are applied in a fixed order and the
    /// first invalid one aborts the whole block, leaving ``self`` untouched.
    pub fn process_block(
        &self,
        signed_block: &SignedBeaconBlock,
        verify_signatures: bool,
        verifier: &impl SignatureVerifier,
    ) -> Result<ChainState, StateTransitionError> {
        let mut state = self.clone();
        state.apply_block(signed_block, verify_signatures, verifier)?;
        Ok(state)
    }

    pub(crate) fn apply_block(
        &mut self,
        signed_block: &SignedBeaconBlock,
        verify_signatures: bool,
        verifier: &impl SignatureVerifier,
    ) -> Result<(), StateTransitionError> {
        let block = &signed_block.message;
        if block.slot != self.slot {
            return Err(StateTransitionError::SlotMismatch {
                state_slot: self.slot,
                block_slot: block.slot,
            });
        }

        let proposer_index = self.beacon_proposer_index(self.slot)?;
        if verify_signatures {
            self.verify_proposer_signature(signed_block, proposer_index, verifier)?;
        }
        self.process_randao(block, proposer_index, verify_signatures, verifier)?;

        let body = &block.body;
        for (index, proposer_slashing) in body.proposer_slashings.iter().enumerate() {
            self.process_proposer_slashing(
                index,
                proposer_slashing,
                proposer_index,
                verify_signatures,
                verifier,
            )?;
        }
        self.process_eth1_data(&block.eth1_data)?;
        for (index, attester_slashing) in body.attester_slashings.iter().enumerate() {
            self.process_attester_slashing(
                index,
                attester_slashing,
                proposer_index,
                verify_signatures,
                verifier,
            )?;
        }
        if !body.attestations.is_empty() {
            let committees = [
                self.committee_cache(self.previous_epoch())?,
                self.committee_cache(self.current_epoch())?,
            ];
            for (index, attestation) in body.attestations.iter().enumerate() {
                self.process_attestation(
                    index,
                    attestation,
                    &committees,
                    verify_signatures,
                    verifier,
                )?;
            }
        }
        for (index, deposit) in body.deposits.iter().enumerate() {
            self.process_deposit(index, deposit, verify_signatures, verifier)?;
        }
        for (index, voluntary_exit) in body.voluntary_exits.iter().enumerate() {
            self.process_voluntary_exit(index, voluntary_exit, verify_signatures, verifier)?;
        }

        info!(
            slot = block.slot,
            proposer_index,
            attestations = body.attestations.len(),
            deposits = body.deposits.len(),
            "Processed block"
        );
        Ok(())
    }

    fn verify_proposer_signature(
        &self,
        signed_block: &SignedBeaconBlock,
        proposer_index: u64,
        verifier: &impl SignatureVerifier,
    ) -> Result<(), StateTransitionError> {
        let proposal = Proposal {
            slot: signed_block.message.slot,
            shard: BEACON_CHAIN_SHARD_NUMBER,
            block_root: signed_block.message.block_root(),
        };
        let signing_root = compute_signing_root(
            &proposal,
            self.domain(self.current_epoch(), DOMAIN_PROPOSAL),
        );
        ensure_verified!(
            verifier.verify(
                &self.validator(proposer_index)?.pubkey,
                signing_root.as_slice(),
                &signed_block.signature,
            ),
            ProofKind::BlockSignature,
            0
        );
        Ok(())
    }

    /// Mix the hash of the proposer's reveal into the current epoch's randao mix.
    fn process_randao(
        &mut self,
        block: &BeaconBlock,
        proposer_index: u64,
        verify_signatures: bool,
        verifier: &impl SignatureVerifier,
    ) -> Result<(), StateTransitionError> {
        let epoch = self.current_epoch();
        if verify_signatures {
            let signing_root = compute_signing_root(&epoch, self.domain(epoch, DOMAIN_RANDAO));
            ensure_verified!(
                verifier.verify(
                    &self.validator(proposer_index)?.pubkey,
                    signing_root.as_slice(),
                    &block.randao_reveal,
                ),
                ProofKind::RandaoReveal,
                0
            );
        }

        let mix = xor(
            self.randao_mix(epoch).as_slice(),
            ethereum_hashing::hash(block.randao_reveal.to_bytes()).as_slice(),
        );
        let length = self.latest_randao_mixes.len() as u64;
        self.latest_randao_mixes[(epoch % length) as usize] = mix;
        Ok(())
    }

    fn process_proposer_slashing(
        &mut self,
        index: usize,
        proposer_slashing: &ProposerSlashing,
        whistleblower_index: u64,
        verify_signatures: bool,
        verifier: &impl SignatureVerifier,
    ) -> Result<(), StateTransitionError> {
        const KIND: OperationKind = OperationKind::ProposerSlashing;
        let proposal_1 = &proposer_slashing.proposal_1;
        let proposal_2 = &proposer_slashing.proposal_2;
        let proposer = self.operation_validator(proposer_slashing.proposer_index, KIND, index)?;

        ensure_valid!(
            proposal_1.message.slot == proposal_2.message.slot,
            KIND,
            index,
            "proposals are for different slots"
        );
        ensure_valid!(
            proposal_1.message.shard == proposal_2.message.shard,
            KIND,
            index,
            "proposals are for different shards"
        );
        ensure_valid!(
            proposal_1.message.block_root != proposal_2.message.block_root,
            KIND,
            index,
            "proposals commit to the same block root"
        );
        ensure_valid!(
            !proposer.slashed,
            KIND,
            index,
            "proposer {} is already slashed",
            proposer_slashing.proposer_index
        );

        if verify_signatures {
            for proposal in [proposal_1, proposal_2] {
                let domain = self.domain(
                    compute_epoch_at_slot(proposal.message.slot),
                    DOMAIN_PROPOSAL,
                );
                let signing_root = compute_signing_root(&proposal.message, domain);
                ensure_verified!(
                    verifier.verify(&proposer.pubkey, signing_root.as_slice(), &proposal.signature),
                    ProofKind::ProposerSlashingSignature,
                    index
                );
            }
        }

        self.slash_validator(
            proposer_slashing.proposer_index,
            whistleblower_index,
            KIND,
            index,
        )
    }

    /// Count the block's vote for ``eth1_data``.
    fn process_eth1_data(&mut self, eth1_data: &Eth1Data) -> Result<(), StateTransitionError> {
        if let Some(vote) = self
            .eth1_data_votes
            .iter_mut()
            .find(|vote| vote.eth1_data == *eth1_data)
        {
            vote.vote_count += 1;
            return Ok(());
        }

        self.eth1_data_votes
            .push(Eth1DataVote {
                eth1_data: eth1_data.clone(),
                vote_count: 1,
            })
            .map_err(|_| StateTransitionError::ArithmeticOverflow("eth1 data votes"))
    }

    fn process_attester_slashing(
        &mut self,
        index: usize,
        attester_slashing: &AttesterSlashing,
        whistleblower_index: u64,
        verify_signatures: bool,
        verifier: &impl SignatureVerifier,
    ) -> Result<(), StateTransitionError> {
        const KIND: OperationKind = OperationKind::AttesterSlashing;
        let attestation_1 = &attester_slashing.slashable_attestation_1;
        let attestation_2 = &attester_slashing.slashable_attestation_2;

        ensure_valid!(
            attestation_1.data != attestation_2.data,
            KIND,
            index,
            "attestations carry identical data"
        );
        ensure_valid!(
            attestation_1.data.is_double_vote(&attestation_2.data)
                || attestation_1.data.is_surround_vote(&attestation_2.data)
                || attestation_2.data.is_surround_vote(&attestation_1.data),
            KIND,
            index,
            "attestations are neither a double vote nor a surround vote"
        );
        for attestation in [attestation_1, attestation_2] {
            self.verify_slashable_attestation(index, attestation, verify_signatures, verifier)?;
        }

        let mut slashable_indices = vec![];
        for validator_index in attestation_1.validator_indices.iter() {
            if attestation_2.validator_indices.contains(validator_index)
                && !self.validator(*validator_index)?.slashed
            {
                slashable_indices.push(*validator_index);
            }
        }
        ensure_valid!(
            !slashable_indices.is_empty(),
            KIND,
            index,
            "no unslashed validator is in both attestations"
        );

        for slashed_index in slashable_indices {
            self.slash_validator(slashed_index, whistleblower_index, KIND, index)?;
        }
        Ok(())
    }

    fn verify_slashable_attestation(
        &self,
        index: usize,
        attestation: &SlashableAttestation,
        verify_signatures: bool,
        verifier: &impl SignatureVerifier,
    ) -> Result<(), StateTransitionError> {
        const KIND: OperationKind = OperationKind::AttesterSlashing;
        let validator_indices = &attestation.validator_indices;

        ensure_valid!(
            attestation.custody_bitfield.is_zero(),
            KIND,
            index,
            "custody bits must be zero"
        );
        ensure_valid!(
            attestation.custody_bitfield.len() == validator_indices.len(),
            KIND,
            index,
            "custody bitfield length {} does not match {} indices",
            attestation.custody_bitfield.len(),
            validator_indices.len()
        );
        ensure_valid!(
            !validator_indices.is_empty()
                && validator_indices.len() as u64 <= MAX_INDICES_PER_SLASHABLE_VOTE,
            KIND,
            index,
            "invalid number of validator indices: {}",
            validator_indices.len()
        );
        ensure_valid!(
            is_sorted_and_unique(validator_indices),
            KIND,
            index,
            "validator indices must be strictly ascending"
        );

        let pubkeys = validator_indices
            .iter()
            .map(|validator_index| {
                self.operation_validator(*validator_index, KIND, index)
                    .map(|validator| &validator.pubkey)
            })
            .collect::<Result<Vec<_>, _>>()?;
        if verify_signatures {
            ensure_verified!(
                self.verify_attestation_signature(
                    &pubkeys,
                    &attestation.data,
                    &attestation.aggregate_signature,
                    verifier
                ),
                ProofKind::AttesterSlashingSignature,
                index
            );
        }
        Ok(())
    }

    fn process_attestation(
        &mut self,
        index: usize,
        attestation: &Attestation,
        committees: &[CommitteeCache],
        verify_signatures: bool,
        verifier: &impl SignatureVerifier,
    ) -> Result<(), StateTransitionError> {
        const KIND: OperationKind = OperationKind::Attestation;
        let data = &attestation.data;

        ensure_valid!(
            data.slot
                .checked_add(MIN_ATTESTATION_INCLUSION_DELAY)
                .is_some_and(|earliest| earliest <= self.slot)
                && data
                    .slot
                    .checked_add(SLOTS_PER_EPOCH)
                    .is_some_and(|latest| self.slot < latest),
            KIND,
            index,
            "attestation for slot {} cannot be included at slot {}",
            data.slot,
            self.slot
        );

        let expected_justified_epoch =
            if compute_epoch_at_slot(data.slot.saturating_add(1)) >= self.current_epoch() {
                self.justified_epoch
            } else {
                self.previous_justified_epoch
            };
        ensure_valid!(
            data.justified_epoch == expected_justified_epoch,
            KIND,
            index,
            "justified epoch {} does not match {expected_justified_epoch}",
            data.justified_epoch
        );
        let justified_block_root = self
            .block_root_at_slot(compute_start_slot_at_epoch(data.justified_epoch))?;
        ensure_valid!(
            data.justified_block_root == justified_block_root,
            KIND,
            index,
            "justified block root does not match the canonical chain"
        );

        ensure_valid!(
            data.shard < SHARD_COUNT,
            KIND,
            index,
            "shard {} is out of range",
            data.shard
        );
        let stored_crosslink = self.latest_crosslinks[data.shard as usize];
        let proposed_crosslink = Crosslink {
            epoch: data.target_epoch(),
            crosslink_data_root: data.crosslink_data_root,
        };
        ensure_valid!(
            data.latest_crosslink == stored_crosslink || proposed_crosslink == stored_crosslink,
            KIND,
            index,
            "crosslink does not extend the stored crosslink for shard {}",
            data.shard
        );

        let committee = match committees
            .iter()
            .find(|committee_cache| committee_cache.epoch() == data.target_epoch())
        {
            Some(committee_cache) => committee_cache.committee_for_shard(data.slot, data.shard)?,
            None => None,
        };
        ensure_valid!(
            committee.is_some(),
            KIND,
            index,
            "no committee for shard {} at slot {}",
            data.shard,
            data.slot
        );
        let committee = committee.unwrap_or_default();
        ensure_valid!(
            attestation.aggregation_bitfield.len() == committee.len()
                && attestation.custody_bitfield.len() == committee.len(),
            KIND,
            index,
            "bitfield lengths do not match committee size {}",
            committee.len()
        );
        ensure_valid!(
            !attestation.aggregation_bitfield.is_zero(),
            KIND,
            index,
            "aggregation bitfield is empty"
        );
        ensure_valid!(
            attestation.custody_bitfield.is_zero(),
            KIND,
            index,
            "custody bits must be zero"
        );

        if verify_signatures {
            let pubkeys = committee
                .iter()
                .enumerate()
                .filter(|(i, _)| attestation.aggregation_bitfield.get(*i).unwrap_or(false))
                .map(|(_, validator_index)| {
                    self.validator(*validator_index)
                        .map(|validator| &validator.pubkey)
                })
                .collect::<Result<Vec<_>, _>>()?;
            ensure_verified!(
                self.verify_attestation_signature(
                    &pubkeys,
                    data,
                    &attestation.aggregate_signature,
                    verifier
                ),
                ProofKind::AttestationSignature,
                index
            );
        }

        self.latest_attestations
            .push(PendingAttestation::new(attestation, self.slot))
            .map_err(|_| StateTransitionError::ArithmeticOverflow("latest attestations"))
    }

    fn verify_attestation_signature(
        &self,
        pubkeys: &[&PubKey],
        data: &AttestationData,
        signature: &BLSSignature,
        verifier: &impl SignatureVerifier,
    ) -> bool {
        let message = AttestationDataAndCustodyBit {
            data: data.clone(),
            custody_bit: false,
        };
        let signing_root = compute_signing_root(
            &message,
            self.domain(data.target_epoch(), DOMAIN_ATTESTATION),
        );
        verifier.verify_aggregate(pubkeys, signing_root.as_slice(), signature)
    }

    fn process_deposit(
        &mut self,
        index: usize,
        deposit: &Deposit,
        verify_signatures: bool,
        verifier: &impl SignatureVerifier,
    ) -> Result<(), StateTransitionError> {
        const KIND: OperationKind = OperationKind::Deposit;
        ensure_valid!(
            deposit.index == self.deposit_index,
            KIND,
            index,
            "deposit index {} does not match expected {}",
            deposit.index,
            self.deposit_index
        );
        ensure_verified!(
            is_valid_merkle_branch(
                deposit.deposit_data.leaf(),
                &deposit.branch,
                DEPOSIT_CONTRACT_TREE_DEPTH,
                deposit.index,
                self.latest_eth1_data.deposit_root,
            ),
            ProofKind::DepositMerkleBranch,
            index
        );
        if verify_signatures {
            let deposit_data = &deposit.deposit_data;
            let signing_root = compute_signing_root(
                &deposit_data.message(),
                self.domain(self.current_epoch(), DOMAIN_DEPOSIT),
            );
            ensure_verified!(
                verifier.verify(
                    &deposit_data.pubkey,
                    signing_root.as_slice(),
                    &deposit_data.proof_of_possession,
                ),
                ProofKind::DepositProofOfPossession,
                index
            );
        }

        self.apply_deposit(&deposit.deposit_data, index)?;
        self.deposit_index += 1;
        debug!(
            deposit_index = deposit.index,
            amount = deposit.deposit_data.amount,
            "Applied deposit"
        );
        Ok(())
    }

    fn process_voluntary_exit(
        &mut self,
        index: usize,
        signed_exit: &SignedVoluntaryExit,
        verify_signatures: bool,
        verifier: &impl SignatureVerifier,
    ) -> Result<(), StateTransitionError> {
        const KIND: OperationKind = OperationKind::VoluntaryExit;
        let exit = &signed_exit.message;
        let current_epoch = self.current_epoch();
        let validator = self.operation_validator(exit.validator_index, KIND, index)?;

        ensure_valid!(
            validator.exit_epoch > compute_activation_exit_epoch(current_epoch),
            KIND,
            index,
            "validator {} already has an exit scheduled",
            exit.validator_index
        );
        ensure_valid!(
            !validator.initiated_exit,
            KIND,
            index,
            "validator {} already initiated an exit",
            exit.validator_index
        );
        ensure_valid!(
            current_epoch >= exit.epoch,
            KIND,
            index,
            "exit is not valid before epoch {}",
            exit.epoch
        );
        ensure_valid!(
            current_epoch
                .checked_sub(validator.activation_epoch)
                .is_some_and(|active_epochs| active_epochs >= PERSISTENT_COMMITTEE_PERIOD),
            KIND,
            index,
            "validator {} has not been active for {PERSISTENT_COMMITTEE_PERIOD} epochs",
            exit.validator_index
        );

        if verify_signatures {
            let signing_root = compute_signing_root(exit, self.domain(exit.epoch, DOMAIN_EXIT));
            ensure_verified!(
                verifier.verify(
                    &validator.pubkey,
                    signing_root.as_slice(),
                    &signed_exit.signature
                ),
                ProofKind::VoluntaryExitSignature,
                index
            );
        }

        self.initiate_validator_exit(exit.validator_index)
    }

    /// Look up a validator named by a block operation. Unknown indices invalidate the operation.
    fn operation_validator(
        &self,
        validator_index: u64,
        kind: OperationKind,
        index: usize,
    ) -> Result<&Validator, StateTransitionError> {
        let validator = self.validator_registry.get(validator_index as usize);
        ensure_valid!(
            validator.is_some(),
            kind,
            index,
            "unknown validator index {validator_index}"
        );
        self.validator(validator_index)
    }
}
