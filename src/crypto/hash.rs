//! Keccak-256 hashing
//!
//! Used for function selectors, event topics, salts and address derivation.

use sha3::{Digest, Keccak256};

/// Computes the Keccak-256 hash of the input data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes Keccak-256 and returns it as a hex string (no `0x` prefix)
pub fn keccak256_hex(data: &[u8]) -> String {
    hex::encode(keccak256(data))
}
