//! Deterministic multisig address derivation
//!
//! The address a factory will assign is known before deployment:
//!
//! ```text
//! derived_salt = keccak256(owner_0 ‖ … ‖ owner_n ‖ uint256(threshold) ‖ salt)
//! address      = keccak256(0xff ‖ factory ‖ derived_salt ‖ init_code_hash)[12..]
//! ```
//!
//! Owners are sorted first, so any permutation of the same owner set maps to
//! the same address. The factory client passes `derived_salt` to
//! `createMultisig`, which makes the prediction match the CREATE2 deployment.

use crate::core::{format_address, u256_to_word, Address, Salt, H256, U256};
use crate::crypto::keccak256;
use crate::multisig::MultisigError;

/// CREATE2 address (EIP-1014):
/// `keccak256(0xff ‖ deployer ‖ salt ‖ init_code_hash)[12..]`
pub fn create2_address(deployer: Address, salt: H256, init_code_hash: H256) -> Address {
    let mut data = Vec::with_capacity(1 + 20 + 32 + 32);
    data.push(0xff);
    data.extend_from_slice(deployer.as_bytes());
    data.extend_from_slice(salt.as_bytes());
    data.extend_from_slice(init_code_hash.as_bytes());

    let hash = keccak256(&data);
    Address::from_slice(&hash[12..])
}

/// Validate an owner list and return it in canonical (sorted) order
pub fn normalize_owners(owners: &[Address]) -> Result<Vec<Address>, MultisigError> {
    if owners.is_empty() {
        return Err(MultisigError::NoOwners);
    }

    let mut sorted = owners.to_vec();
    sorted.sort();

    if let Some(zero) = sorted.iter().find(|owner| owner.is_zero()) {
        return Err(MultisigError::InvalidOwner(format_address(zero)));
    }
    for pair in sorted.windows(2) {
        if pair[0] == pair[1] {
            return Err(MultisigError::DuplicateOwner(format_address(&pair[0])));
        }
    }

    Ok(sorted)
}

/// Check `1 <= threshold <= owner_count`
pub fn validate_threshold(threshold: u64, owner_count: usize) -> Result<(), MultisigError> {
    if threshold == 0 {
        return Err(MultisigError::InvalidThreshold(
            "threshold must be at least 1".to_string(),
        ));
    }
    if threshold > owner_count as u64 {
        return Err(MultisigError::InvalidThreshold(format!(
            "threshold {} exceeds owner count {}",
            threshold, owner_count
        )));
    }
    Ok(())
}

/// Salt handed to the factory, binding owners, threshold and caller salt.
/// `owners` must already be normalized.
pub fn derive_salt(owners: &[Address], threshold: u64, salt: &Salt) -> H256 {
    let mut data = Vec::with_capacity(owners.len() * 20 + 32 + 32);
    for owner in owners {
        data.extend_from_slice(owner.as_bytes());
    }
    data.extend_from_slice(&u256_to_word(&U256::from(threshold)));
    data.extend_from_slice(salt.as_bytes());
    H256(keccak256(&data))
}

/// Predict the address `factory` will deploy the multisig at
pub fn compute_address(
    factory: Address,
    owners: &[Address],
    threshold: u64,
    salt: &Salt,
    init_code_hash: H256,
) -> Result<Address, MultisigError> {
    let owners = normalize_owners(owners)?;
    validate_threshold(threshold, owners.len())?;

    let derived = derive_salt(&owners, threshold, salt);
    Ok(create2_address(factory, derived, init_code_hash))
}
