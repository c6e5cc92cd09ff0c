//! Cryptographic utilities
//!
//! This module provides:
//! - Keccak-256 hashing (Ethereum flavour, not NIST SHA3)
//! - ECDSA key management (secp256k1) with Ethereum-style addresses

pub mod hash;
pub mod keys;

pub use hash::{keccak256, keccak256_hex};
pub use keys::{
    public_key_from_hex, public_key_to_address, sign_message, verify_signature, KeyError, KeyPair,
};
