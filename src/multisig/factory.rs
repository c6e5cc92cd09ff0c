//! Multisig deployment through the factory contract

use crate::config::{CoordinatorConfig, FactoryConfig};
use crate::core::abi::{self, from_sol_address, MultisigCreated};
use crate::core::{format_address, Address, Salt, TxHash, H256};
use crate::multisig::address::{create2_address, derive_salt, normalize_owners, validate_threshold};
use crate::multisig::guard::CallGuard;
use crate::multisig::MultisigError;
use crate::provider::{ChainProvider, ProviderError, TransactionReceipt, TransactionRequest, TxSigner};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default receipt polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Result of a successful deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Address reported by the `MultisigCreated` event
    pub address: Address,
    pub tx_hash: TxHash,
    /// Address predicted before sending
    pub predicted: Address,
    pub salt: Salt,
}

/// Client for the external multisig factory
#[derive(Debug, Clone)]
pub struct FactoryClient {
    factory: Address,
    init_code_hash: H256,
    guard: CallGuard,
    poll_interval: Duration,
}

impl FactoryClient {
    pub fn new(factory: Address, init_code_hash: H256) -> Self {
        Self {
            factory,
            init_code_hash,
            guard: CallGuard::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Client for `factory` with timeouts taken from the coordinator settings
    pub fn from_config(
        factory: Address,
        factory_config: &FactoryConfig,
        coordinator_config: &CoordinatorConfig,
    ) -> Self {
        Self {
            factory,
            init_code_hash: factory_config.init_code_hash,
            guard: CallGuard::new(coordinator_config.rpc_timeout()),
            poll_interval: coordinator_config.poll_interval(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.guard = CallGuard::new(timeout).with_cancellation(self.guard.cancellation_token().clone());
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.guard = self.guard.with_cancellation(cancel);
        self
    }

    pub fn factory_address(&self) -> Address {
        self.factory
    }

    /// Address `deploy` will produce for these inputs
    pub fn predict_address(
        &self,
        owners: &[Address],
        threshold: u64,
        salt: &Salt,
    ) -> Result<Address, MultisigError> {
        let owners = normalize_owners(owners)?;
        validate_threshold(threshold, owners.len())?;
        Ok(create2_address(
            self.factory,
            derive_salt(&owners, threshold, salt),
            self.init_code_hash,
        ))
    }

    /// Deploy a multisig and report the address from the creation event.
    ///
    /// A mined deployment whose receipt lacks `MultisigCreated` fails with
    /// [`MultisigError::MissingDeploymentEvent`], distinct from a failed or
    /// reverted transaction.
    pub async fn deploy(
        &self,
        provider: &dyn ChainProvider,
        signer: &dyn TxSigner,
        owners: &[Address],
        threshold: u64,
        salt: &Salt,
    ) -> Result<Deployment, MultisigError> {
        let owners = normalize_owners(owners)?;
        validate_threshold(threshold, owners.len())?;

        let derived_salt = derive_salt(&owners, threshold, salt);
        let predicted = create2_address(self.factory, derived_salt, self.init_code_hash);

        log::info!(
            "Deploying {}-of-{} multisig via factory {} (predicted {})",
            threshold,
            owners.len(),
            format_address(&self.factory),
            format_address(&predicted)
        );

        let data = abi::create_multisig_call(&owners, threshold, derived_salt);
        let request = TransactionRequest::call(self.factory, data);
        let tx_hash = self
            .guard
            .run("createMultisig", signer.send(provider, request))
            .await?;
        let receipt = self.wait_for_success(provider, tx_hash).await?;

        let created = Self::find_created_event(&receipt, self.factory)?
            .ok_or(MultisigError::MissingDeploymentEvent { tx_hash })?;
        let address = from_sol_address(&created.multisig);

        if address != predicted {
            log::warn!(
                "Factory deployed {} but {} was predicted; init code hash may be stale",
                format_address(&address),
                format_address(&predicted)
            );
        }

        log::info!(
            "Multisig deployed at {} in tx {:#x}",
            format_address(&address),
            tx_hash
        );

        Ok(Deployment {
            address,
            tx_hash,
            predicted,
            salt: *salt,
        })
    }

    async fn wait_for_success(
        &self,
        provider: &dyn ChainProvider,
        tx_hash: TxHash,
    ) -> Result<TransactionReceipt, MultisigError> {
        let receipt = self
            .guard
            .run(
                "wait for deployment",
                provider.wait_for_receipt(tx_hash, self.poll_interval),
            )
            .await?;

        if !receipt.status {
            return Err(ProviderError::Reverted {
                tx_hash: Some(tx_hash),
                reason: receipt
                    .revert_reason
                    .clone()
                    .unwrap_or_else(|| "execution reverted".to_string()),
            }
            .into());
        }
        Ok(receipt)
    }

    fn find_created_event(
        receipt: &TransactionReceipt,
        factory: Address,
    ) -> Result<Option<MultisigCreated>, MultisigError> {
        for log in receipt.logs_from(factory) {
            if let Some(event) = abi::decode_event::<MultisigCreated>(log)? {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }
}
