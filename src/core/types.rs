//! Primitive chain types
//!
//! Addresses, hashes, amounts and salts, plus the hex parsing used at every
//! input boundary. Parsing is strict: malformed input is rejected here, before
//! anything touches the network.

use crate::crypto::keccak256;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

pub use primitive_types::{H160, H256, U256};

/// 20-byte account or contract address
pub type Address = H160;

/// 32-byte transaction hash
pub type TxHash = H256;

/// Errors produced while parsing primitive values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypesError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Invalid hash: {0}")]
    InvalidHash(String),
    #[error("Invalid hex data: {0}")]
    InvalidHex(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Parse a 20-byte address from hex (`0x` prefix optional, any case)
pub fn parse_address(value: &str) -> Result<Address, TypesError> {
    let trimmed = strip_hex_prefix(value.trim());
    if trimmed.len() != 40 {
        return Err(TypesError::InvalidAddress(value.to_string()));
    }
    let bytes = hex::decode(trimmed).map_err(|_| TypesError::InvalidAddress(value.to_string()))?;
    Ok(Address::from_slice(&bytes))
}

/// Render an address as full-width lowercase `0x…` hex
pub fn format_address(address: &Address) -> String {
    format!("{:#x}", address)
}

/// Parse a 32-byte hash from hex (`0x` prefix optional)
pub fn parse_hash(value: &str) -> Result<H256, TypesError> {
    let trimmed = strip_hex_prefix(value.trim());
    if trimmed.len() != 64 {
        return Err(TypesError::InvalidHash(value.to_string()));
    }
    let bytes = hex::decode(trimmed).map_err(|_| TypesError::InvalidHash(value.to_string()))?;
    Ok(H256::from_slice(&bytes))
}

/// Render a hash as full-width lowercase `0x…` hex
pub fn format_hash(hash: &H256) -> String {
    format!("{:#x}", hash)
}

/// Parse call data. `"0x"` and `""` both mean empty data.
pub fn parse_hex_bytes(value: &str) -> Result<Vec<u8>, TypesError> {
    let trimmed = strip_hex_prefix(value.trim());
    hex::decode(trimmed).map_err(|_| TypesError::InvalidHex(value.to_string()))
}

/// Render bytes as `0x…` hex
pub fn format_hex_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse an amount in wei, decimal or `0x`/`0X` hex
pub fn parse_amount(value: &str) -> Result<U256, TypesError> {
    let value = value.trim();
    let invalid = || TypesError::InvalidAmount(value.to_string());
    let digits = strip_hex_prefix(value);
    if digits.is_empty() {
        return Err(invalid());
    }
    if digits.len() != value.len() {
        U256::from_str_radix(digits, 16).map_err(|_| invalid())
    } else {
        U256::from_dec_str(value).map_err(|_| invalid())
    }
}

/// Big-endian 32-byte representation of a `U256`
pub fn u256_to_word(value: &U256) -> [u8; 32] {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    word
}

static SALT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Caller-supplied deployment salt (32 bytes)
///
/// The same salt must be handed to both the address deriver and the factory
/// client for the predicted and deployed addresses to agree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Salt(pub H256);

impl Salt {
    /// Salt from raw bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(H256(bytes))
    }

    /// Deterministic salt from a human label: `keccak256(label)`
    pub fn from_label(label: &str) -> Self {
        Self::new(keccak256(label.as_bytes()))
    }

    /// Salt derived from the current time.
    ///
    /// Every call yields a distinct salt, so deployments using it are not
    /// reproducible.
    pub fn from_time() -> Self {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or(0);
        let counter = SALT_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self::from_label(&format!("time:{}:{}", nanos, counter))
    }

    /// Random salt
    pub fn random() -> Self {
        Self::new(rand::random())
    }

    /// Parse a salt given as 32-byte hex, falling back to hashing it as a label
    pub fn parse(value: &str) -> Self {
        match parse_hash(value) {
            Ok(hash) => Self(hash),
            Err(_) => Self::from_label(value),
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_fixed_bytes()
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({:#x})", self.0)
    }
}

impl fmt::Display for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let lower = parse_address("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1").unwrap();
        let upper = parse_address("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA1").unwrap();
        let bare = parse_address("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1").unwrap();

        assert_eq!(lower, upper);
        assert_eq!(lower, bare);
        assert_eq!(
            format_address(&lower),
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1"
        );
    }

    #[test]
    fn test_parse_address_rejects_malformed() {
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("0xzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_parse_hex_bytes() {
        assert!(parse_hex_bytes("0x").unwrap().is_empty());
        assert_eq!(parse_hex_bytes("0xdeadbeef").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(parse_hex_bytes("0xabc").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1000").unwrap(), U256::from(1000));
        assert_eq!(parse_amount("0x10").unwrap(), U256::from(16));
        assert_eq!(parse_amount("0X1f").unwrap(), U256::from(31));
        assert!(parse_amount("ten").is_err());
        assert!(parse_amount("0x").is_err());
        assert!(parse_amount("").is_err());
    }

    #[test]
    fn test_u256_word_is_big_endian() {
        let word = u256_to_word(&U256::from(2));
        assert_eq!(word[31], 2);
        assert!(word[..31].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_time_salts_differ() {
        assert_ne!(Salt::from_time(), Salt::from_time());
    }

    #[test]
    fn test_label_salt_is_stable() {
        assert_eq!(Salt::from_label("halo"), Salt::from_label("halo"));
        assert_eq!(Salt::parse("halo"), Salt::from_label("halo"));
    }
}
