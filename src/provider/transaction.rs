//! Transaction, log and receipt types exchanged with a provider

use crate::core::{u256_to_word, Address, TxHash, H256, U256};
use crate::crypto::keccak256;
use serde::{Deserialize, Serialize};

/// An unsigned transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    /// Gas limit; filled from `estimate_gas` when absent
    pub gas: Option<u64>,
}

impl TransactionRequest {
    /// Contract call without value
    pub fn call(to: Address, data: Vec<u8>) -> Self {
        Self {
            to,
            value: U256::zero(),
            data,
            gas: None,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Hash signed by the sender: binds sender, account nonce and payload
    pub fn signing_hash(&self, from: Address, nonce: u64) -> H256 {
        let mut preimage = Vec::with_capacity(20 * 2 + 32 * 2 + 8 + self.data.len());
        preimage.extend_from_slice(from.as_bytes());
        preimage.extend_from_slice(self.to.as_bytes());
        preimage.extend_from_slice(&u256_to_word(&self.value));
        preimage.extend_from_slice(&nonce.to_be_bytes());
        preimage.extend_from_slice(&u256_to_word(&U256::from(self.gas.unwrap_or(0))));
        preimage.extend_from_slice(&self.data);
        H256(keccak256(&preimage))
    }
}

/// A transaction signed by its sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub from: Address,
    pub nonce: u64,
    pub request: TransactionRequest,
    /// Sender public key, uncompressed hex
    pub public_key: String,
    /// Compact secp256k1 signature over [`TransactionRequest::signing_hash`]
    pub signature: Vec<u8>,
}

impl SignedTransaction {
    pub fn signing_hash(&self) -> H256 {
        self.request.signing_hash(self.from, self.nonce)
    }

    /// Transaction hash: `keccak256(signing_hash ‖ signature)`
    pub fn hash(&self) -> TxHash {
        let mut preimage = self.signing_hash().as_bytes().to_vec();
        preimage.extend_from_slice(&self.signature);
        H256(keccak256(&preimage))
    }
}

/// An event emitted during execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: TxHash,
    pub from: Address,
    pub to: Address,
    /// `false` when execution reverted
    pub status: bool,
    pub block_number: u64,
    pub gas_used: u64,
    pub logs: Vec<Log>,
    pub revert_reason: Option<String>,
}

impl TransactionReceipt {
    /// Logs emitted by `address` only
    pub fn logs_from(&self, address: Address) -> impl Iterator<Item = &Log> {
        self.logs.iter().filter(move |log| log.address == address)
    }
}
