//! Multisig error taxonomy
//!
//! Three families, all returned to the immediate caller:
//! - validation: rejected before any network call
//! - network: provider failures, timeouts and cancellation
//! - protocol: the chain accepted a transaction but did not emit the
//!   event needed to interpret it

use crate::core::{TxHash, TypesError};
use crate::provider::ProviderError;
use std::time::Duration;
use thiserror::Error;

/// Errors related to multisig operations
#[derive(Error, Debug)]
pub enum MultisigError {
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("At least one owner is required")]
    NoOwners,
    #[error("Duplicate owner: {0}")]
    DuplicateOwner(String),
    #[error("Invalid owner: {0}")]
    InvalidOwner(String),
    #[error("Insufficient signers: have {have}, need {need}")]
    InsufficientSigners { have: usize, need: u64 },
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] TypesError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("RPC call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Deployment {tx_hash:#x} was mined but emitted no MultisigCreated event")]
    MissingDeploymentEvent { tx_hash: TxHash },
    #[error("Submission {tx_hash:#x} was mined but emitted no TransactionSubmitted event")]
    MissingSubmissionEvent { tx_hash: TxHash },
    #[error("ABI error: {0}")]
    Abi(#[from] alloy_sol_types::Error),
}

impl MultisigError {
    /// True for failures detected before anything was sent
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MultisigError::InvalidThreshold(_)
                | MultisigError::NoOwners
                | MultisigError::DuplicateOwner(_)
                | MultisigError::InvalidOwner(_)
                | MultisigError::InsufficientSigners { .. }
                | MultisigError::InvalidInput(_)
        )
    }

    /// Revert reason when the chain rejected the call
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            MultisigError::Provider(ProviderError::Reverted { reason, .. }) => Some(reason),
            _ => None,
        }
    }
}
