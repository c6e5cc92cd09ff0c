//! Chain access layer
//!
//! The multisig components never talk to a node directly. They go through
//! two seams:
//! - [`ChainProvider`]: reads (code, nonces, views, receipts) and broadcast
//! - [`TxSigner`]: an account able to sign and send transactions (a HaLo chip
//!   in production, a [`LocalSigner`] in tests and the demo)
//!
//! [`LocalChain`] is an in-process provider that emulates the factory and
//! multisig contracts.

pub mod local;
pub mod signer;
pub mod transaction;

pub use local::{multisig_init_code_hash, LocalChain, MULTISIG_INIT_CODE};
pub use signer::{LocalSigner, TxSigner};
pub use transaction::{Log, SignedTransaction, TransactionReceipt, TransactionRequest};

use crate::core::{Address, TxHash};
use crate::crypto::KeyError;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a chain provider or signer
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Transaction reverted: {reason}")]
    Reverted {
        tx_hash: Option<TxHash>,
        reason: String,
    },
    #[error("Invalid transaction signature")]
    InvalidSignature,
    #[error("Nonce mismatch for sender: expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },
    #[error("ABI error: {0}")]
    Abi(#[from] alloy_sol_types::Error),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
}

/// Read and broadcast access to a chain
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Runtime bytecode at `address` (empty when nothing is deployed)
    async fn get_code(&self, address: Address) -> Result<Vec<u8>, ProviderError>;

    /// Number of transactions sent from `address`
    async fn get_transaction_count(&self, address: Address) -> Result<u64, ProviderError>;

    /// Gas estimate; a call that would revert fails here with the revert reason
    async fn estimate_gas(
        &self,
        from: Address,
        request: &TransactionRequest,
    ) -> Result<u64, ProviderError>;

    /// Read-only call, returns the ABI-encoded result
    async fn call(&self, request: &TransactionRequest) -> Result<Vec<u8>, ProviderError>;

    /// Broadcast a signed transaction
    async fn send_transaction(&self, tx: SignedTransaction) -> Result<TxHash, ProviderError>;

    /// Receipt of a mined transaction, `None` while pending
    async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, ProviderError>;

    /// Poll until the transaction is mined.
    ///
    /// Never gives up on its own; callers bound it with a timeout.
    async fn wait_for_receipt(
        &self,
        hash: TxHash,
        poll_interval: Duration,
    ) -> Result<TransactionReceipt, ProviderError> {
        loop {
            if let Some(receipt) = self.get_transaction_receipt(hash).await? {
                return Ok(receipt);
            }
            log::debug!("Waiting for receipt of {:#x}", hash);
            tokio::time::sleep(poll_interval).await;
        }
    }
}
