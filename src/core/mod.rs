//! Core chain types
//!
//! This module contains the building blocks shared by every component:
//! - Primitive types (addresses, hashes, amounts, salts) and hex parsing
//! - The `sol!` interfaces of the factory and multisig contracts

pub mod abi;
pub mod types;

pub use abi::TransactionView;
pub use types::{
    format_address, format_hash, format_hex_bytes, parse_address, parse_amount, parse_hash,
    parse_hex_bytes, u256_to_word, Address, Salt, TxHash, TypesError, H160, H256, U256,
};
