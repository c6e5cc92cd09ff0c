//! Multi-signature account configuration
//!
//! Describes an M-of-N account whose owners are linked chips, and records
//! where (and whether) the contract was deployed.

use crate::account::ChipInfo;
use crate::core::{format_address, Address, Salt, TxHash, H256};
use crate::multisig::address::{compute_address, normalize_owners};
use crate::multisig::{Deployment, MultisigError};
use serde::{Deserialize, Serialize};

/// Configuration of a chip-backed multisig account
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MultisigConfig {
    /// Confirmations required (M in M-of-N)
    pub threshold: u8,
    /// Owner chips (N)
    pub chips: Vec<ChipInfo>,
    pub smart_account_address: Option<Address>,
    pub deployed: bool,
    pub deployment_tx_hash: Option<TxHash>,
    /// Salt the contract was (or will be) deployed with
    pub salt: Option<Salt>,
}

impl MultisigConfig {
    /// Create a new multisig configuration
    ///
    /// # Errors
    /// Returns error if the threshold is out of range or two chips share an
    /// address
    pub fn new(threshold: u8, chips: Vec<ChipInfo>) -> Result<Self, MultisigError> {
        if threshold == 0 {
            return Err(MultisigError::InvalidThreshold(
                "threshold must be at least 1".to_string(),
            ));
        }

        if chips.is_empty() {
            return Err(MultisigError::NoOwners);
        }

        if threshold as usize > chips.len() {
            return Err(MultisigError::InvalidThreshold(format!(
                "threshold {} exceeds chip count {}",
                threshold,
                chips.len()
            )));
        }

        let addresses: Vec<Address> = chips.iter().map(|chip| chip.address()).collect();
        normalize_owners(&addresses)?;

        Ok(Self {
            threshold,
            chips,
            smart_account_address: None,
            deployed: false,
            deployment_tx_hash: None,
            salt: None,
        })
    }

    /// Get the threshold (M)
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Get the total chip count (N)
    pub fn chip_count(&self) -> usize {
        self.chips.len()
    }

    /// Owner addresses in chip order
    pub fn owners(&self) -> Vec<Address> {
        self.chips.iter().map(|chip| chip.address()).collect()
    }

    pub fn is_owner(&self, address: &Address) -> bool {
        self.chips.iter().any(|chip| chip.address() == *address)
    }

    /// Get description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.threshold, self.chips.len())
    }

    /// Address the factory would deploy this account at with `salt`
    pub fn predict_address(
        &self,
        factory: Address,
        salt: &Salt,
        init_code_hash: H256,
    ) -> Result<Address, MultisigError> {
        compute_address(
            factory,
            &self.owners(),
            self.threshold as u64,
            salt,
            init_code_hash,
        )
    }

    /// Record a successful deployment
    pub fn mark_deployed(&mut self, deployment: &Deployment) {
        log::info!(
            "{} account deployed at {}",
            self.description(),
            format_address(&deployment.address)
        );
        self.smart_account_address = Some(deployment.address);
        self.deployed = true;
        self.deployment_tx_hash = Some(deployment.tx_hash);
        self.salt = Some(deployment.salt);
    }
}
