//! Wallet accounts: linked chips and the multisig accounts they own

pub mod chip;
pub mod store;

pub use crate::multisig::MultisigConfig;
pub use chip::ChipInfo;
pub use store::{Account, AccountKind, AccountStore, ACCOUNTS_FILE};

use thiserror::Error;

/// Account-related errors
#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Account already exists: {0}")]
    AlreadyExists(String),
    #[error("Account not found: {0}")]
    NotFound(String),
    #[error("Account is not a chip: {0}")]
    NotAChip(String),
    #[error("Account is not a multisig: {0}")]
    NotAMultisig(String),
    #[error("Chip {address} is already linked as '{account}'")]
    ChipAlreadyLinked { address: String, account: String },
    #[error("Multisig error: {0}")]
    Multisig(#[from] crate::multisig::MultisigError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] crate::crypto::KeyError),
}
