use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    ProposerSlashing,
    AttesterSlashing,
    Attestation,
    Deposit,
    VoluntaryExit,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::ProposerSlashing => "proposer slashing",
            OperationKind::AttesterSlashing => "attester slashing",
            OperationKind::Attestation => "attestation",
            OperationKind::Deposit => "deposit",
            OperationKind::VoluntaryExit => "voluntary exit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofKind {
    BlockSignature,
    RandaoReveal,
    ProposerSlashingSignature,
    AttesterSlashingSignature,
    AttestationSignature,
    DepositMerkleBranch,
    DepositProofOfPossession,
    VoluntaryExitSignature,
}

impl fmt::Display for ProofKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProofKind::BlockSignature => "block signature",
            ProofKind::RandaoReveal => "randao reveal",
            ProofKind::ProposerSlashingSignature => "proposer slashing signature",
            ProofKind::AttesterSlashingSignature => "attester slashing signature",
            ProofKind::AttestationSignature => "attestation signature",
            ProofKind::DepositMerkleBranch => "deposit merkle branch",
            ProofKind::DepositProofOfPossession => "deposit proof of possession",
            ProofKind::VoluntaryExitSignature => "voluntary exit signature",
        };
        f.write_str(name)
    }
}

/// Every way a transition can fail. Nothing here is retried by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateTransitionError {
    #[error("block slot {block_slot} does not match state slot {state_slot}")]
    SlotMismatch { state_slot: u64, block_slot: u64 },

    #[error("invalid {kind} at index {index}: {reason}")]
    InvalidOperation {
        kind: OperationKind,
        index: usize,
        reason: String,
    },

    #[error("{kind} failed verification at index {index}")]
    ProofVerificationFailure { kind: ProofKind, index: usize },

    #[error("block root for slot {slot} is not retained at state slot {state_slot}")]
    MissingHistoricalRoot { slot: u64, state_slot: u64 },

    #[error("arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),

    #[error("no committee available for slot {slot}")]
    EmptyCommittee { slot: u64 },

    #[error("committees for epoch {epoch} are unavailable at current epoch {current_epoch}")]
    CommitteeEpochOutOfRange { epoch: u64, current_epoch: u64 },

    #[error("validator index {index} is out of range")]
    ValidatorIndexOutOfRange { index: u64 },
}

/// Bail with [`StateTransitionError::InvalidOperation`] unless ``cond`` holds.
macro_rules! ensure_valid {
    ($cond:expr, $kind:expr, $index:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::StateTransitionError::InvalidOperation {
                kind: $kind,
                index: $index,
                reason: format!($($arg)+),
            });
        }
    };
}

pub(crate) use ensure_valid;

/// Bail with [`StateTransitionError::ProofVerificationFailure`] unless ``cond`` holds.
macro_rules! ensure_verified {
    ($cond:expr, $kind:expr, $index:expr) => {
        if !$cond {
            return Err(
                $crate::error::StateTransitionError::ProofVerificationFailure {
                    kind: $kind,
                    index: $index,
                },
            );
        }
    };
}

pub(crate) use ensure_verified;
