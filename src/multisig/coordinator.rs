//! Threshold transaction coordination
//!
//! Drives a transaction through a deployed multisig:
//! 1. the first signer submits it; the contract-assigned nonce is read from
//!    the `TransactionSubmitted` event in the receipt
//! 2. the first `threshold` signers confirm that nonce, in the order given
//! 3. the first signer sends `executeTransaction`, unless the contract
//!    already executed it on the last confirmation
//!
//! The coordinator keeps no state between calls; the contract's transaction
//! table is the only source of truth. A failing confirmation aborts the run
//! with the chain error. Confirmations already mined stay on chain, so the
//! caller can resume with [`TransactionCoordinator::confirm`] and
//! [`TransactionCoordinator::execute_transaction`] for the known nonce.

use crate::config::CoordinatorConfig;
use crate::core::abi::{
    self, from_sol_addresses, from_sol_u256, IMultisig, TransactionSubmitted, TransactionView,
};
use crate::core::{format_address, Address, TxHash, U256};
use crate::multisig::factory::DEFAULT_POLL_INTERVAL;
use crate::multisig::guard::CallGuard;
use crate::multisig::MultisigError;
use crate::provider::{ChainProvider, ProviderError, TransactionReceipt, TransactionRequest, TxSigner};
use alloy_sol_types::SolCall;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How confirmations are collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationMode {
    /// One signer after another, each awaited to inclusion
    #[default]
    Sequential,
    /// All signers at once, joined before execution
    Concurrent,
}

impl FromStr for ConfirmationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequential" => Ok(ConfirmationMode::Sequential),
            "concurrent" => Ok(ConfirmationMode::Concurrent),
            other => Err(format!("unknown confirmation mode: {}", other)),
        }
    }
}

impl fmt::Display for ConfirmationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationMode::Sequential => write!(f, "sequential"),
            ConfirmationMode::Concurrent => write!(f, "concurrent"),
        }
    }
}

/// A transaction slot as stored by the multisig contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub nonce: U256,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub executed: bool,
    pub confirmations: u32,
}

impl PendingTransaction {
    fn from_view(nonce: U256, view: TransactionView) -> Self {
        Self {
            nonce,
            to: view.to,
            value: view.value,
            data: view.data,
            executed: view.executed,
            confirmations: view.confirmations.min(U256::from(u32::MAX)).as_u32(),
        }
    }
}

/// A mined submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub nonce: U256,
    pub tx_hash: TxHash,
}

/// Submits, confirms and executes multisig transactions
#[derive(Debug, Clone)]
pub struct TransactionCoordinator {
    guard: CallGuard,
    poll_interval: Duration,
    mode: ConfirmationMode,
}

impl TransactionCoordinator {
    pub fn new(config: &CoordinatorConfig) -> Self {
        Self {
            guard: CallGuard::new(config.rpc_timeout()),
            poll_interval: config.poll_interval(),
            mode: config.confirmation_mode,
        }
    }

    pub fn with_mode(mut self, mode: ConfirmationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Thread `cancel` through every call this coordinator makes
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.guard = self.guard.with_cancellation(cancel);
        self
    }

    pub fn mode(&self) -> ConfirmationMode {
        self.mode
    }

    /// Submit, collect `threshold` confirmations and execute.
    ///
    /// Returns the hash of the transaction that executed the call: the
    /// explicit `executeTransaction`, or the last confirmation when the
    /// contract executed on its own.
    #[allow(clippy::too_many_arguments)]
    pub async fn execute(
        &self,
        provider: &dyn ChainProvider,
        multisig: Address,
        signers: &[Arc<dyn TxSigner>],
        to: Address,
        value: U256,
        data: &[u8],
        threshold: u64,
    ) -> Result<TxHash, MultisigError> {
        Self::validate(multisig, signers, threshold)?;

        let submitter = signers[0].as_ref();
        let submission = self
            .submit(provider, multisig, submitter, to, value, data)
            .await?;
        let nonce = submission.nonce;

        let confirmers = &signers[..threshold as usize];
        let confirmation_hashes = self
            .collect_confirmations(provider, multisig, confirmers, nonce)
            .await?;

        let pending = self.transaction(provider, multisig, nonce).await?;
        if pending.executed {
            log::info!(
                "Transaction {} on {} executed by its last confirmation",
                nonce,
                format_address(&multisig)
            );
            return confirmation_hashes
                .last()
                .copied()
                .ok_or(MultisigError::InsufficientSigners {
                    have: 0,
                    need: threshold,
                });
        }

        self.execute_transaction(provider, multisig, submitter, nonce)
            .await
    }

    fn validate(
        multisig: Address,
        signers: &[Arc<dyn TxSigner>],
        threshold: u64,
    ) -> Result<(), MultisigError> {
        if multisig.is_zero() {
            return Err(MultisigError::InvalidOwner(
                "multisig address is zero".to_string(),
            ));
        }
        if threshold == 0 {
            return Err(MultisigError::InvalidThreshold(
                "threshold must be at least 1".to_string(),
            ));
        }
        if (signers.len() as u64) < threshold {
            return Err(MultisigError::InsufficientSigners {
                have: signers.len(),
                need: threshold,
            });
        }

        let mut seen = HashSet::new();
        for signer in signers {
            let address = signer.address();
            if !seen.insert(address) {
                return Err(MultisigError::DuplicateOwner(format_address(&address)));
            }
        }
        Ok(())
    }

    async fn collect_confirmations(
        &self,
        provider: &dyn ChainProvider,
        multisig: Address,
        confirmers: &[Arc<dyn TxSigner>],
        nonce: U256,
    ) -> Result<Vec<TxHash>, MultisigError> {
        match self.mode {
            ConfirmationMode::Sequential => {
                let mut hashes = Vec::with_capacity(confirmers.len());
                for signer in confirmers {
                    hashes.push(self.confirm(provider, multisig, signer.as_ref(), nonce).await?);
                }
                Ok(hashes)
            }
            ConfirmationMode::Concurrent => {
                try_join_all(
                    confirmers
                        .iter()
                        .map(|signer| self.confirm(provider, multisig, signer.as_ref(), nonce)),
                )
                .await
            }
        }
    }

    /// Submit a transaction and read its nonce from the submission event
    pub async fn submit(
        &self,
        provider: &dyn ChainProvider,
        multisig: Address,
        signer: &dyn TxSigner,
        to: Address,
        value: U256,
        data: &[u8],
    ) -> Result<Submission, MultisigError> {
        let request =
            TransactionRequest::call(multisig, abi::submit_transaction_call(to, value, data));
        let receipt = self
            .send_and_wait(provider, signer, request, "submitTransaction")
            .await?;
        let tx_hash = receipt.tx_hash;

        let mut submitted = None;
        for log in receipt.logs_from(multisig) {
            if let Some(event) = abi::decode_event::<TransactionSubmitted>(log)? {
                submitted = Some(from_sol_u256(&event.nonce));
                break;
            }
        }
        let nonce = submitted.ok_or(MultisigError::MissingSubmissionEvent { tx_hash })?;

        log::info!(
            "Submitted transaction {} to {} (tx {:#x})",
            nonce,
            format_address(&multisig),
            tx_hash
        );
        Ok(Submission { nonce, tx_hash })
    }

    /// Confirm `nonce` as `signer`; safe to call again for a known nonce
    pub async fn confirm(
        &self,
        provider: &dyn ChainProvider,
        multisig: Address,
        signer: &dyn TxSigner,
        nonce: U256,
    ) -> Result<TxHash, MultisigError> {
        let request = TransactionRequest::call(multisig, abi::confirm_transaction_call(nonce));
        let receipt = self
            .send_and_wait(provider, signer, request, "confirmTransaction")
            .await?;

        log::info!(
            "Transaction {} confirmed by {}",
            nonce,
            format_address(&signer.address())
        );
        Ok(receipt.tx_hash)
    }

    /// Send `executeTransaction(nonce)` as `signer`
    pub async fn execute_transaction(
        &self,
        provider: &dyn ChainProvider,
        multisig: Address,
        signer: &dyn TxSigner,
        nonce: U256,
    ) -> Result<TxHash, MultisigError> {
        let request = TransactionRequest::call(multisig, abi::execute_transaction_call(nonce));
        let receipt = self
            .send_and_wait(provider, signer, request, "executeTransaction")
            .await?;

        log::info!(
            "Transaction {} on {} executed (tx {:#x})",
            nonce,
            format_address(&multisig),
            receipt.tx_hash
        );
        Ok(receipt.tx_hash)
    }

    /// Read a transaction slot from the contract
    pub async fn transaction(
        &self,
        provider: &dyn ChainProvider,
        multisig: Address,
        nonce: U256,
    ) -> Result<PendingTransaction, MultisigError> {
        let output = self
            .view(provider, multisig, abi::transactions_call(nonce), "transactions")
            .await?;
        let view = TransactionView::decode(&output)?;
        Ok(PendingTransaction::from_view(nonce, view))
    }

    pub async fn is_confirmed_by(
        &self,
        provider: &dyn ChainProvider,
        multisig: Address,
        nonce: U256,
        owner: Address,
    ) -> Result<bool, MultisigError> {
        let output = self
            .view(
                provider,
                multisig,
                abi::is_confirmed_by_call(nonce, owner),
                "isConfirmedBy",
            )
            .await?;
        Ok(IMultisig::isConfirmedByCall::abi_decode_returns(&output)?)
    }

    pub async fn owners(
        &self,
        provider: &dyn ChainProvider,
        multisig: Address,
    ) -> Result<Vec<Address>, MultisigError> {
        let output = self
            .view(provider, multisig, abi::get_owners_call(), "getOwners")
            .await?;
        let owners = IMultisig::getOwnersCall::abi_decode_returns(&output)?;
        Ok(from_sol_addresses(&owners))
    }

    pub async fn threshold(
        &self,
        provider: &dyn ChainProvider,
        multisig: Address,
    ) -> Result<U256, MultisigError> {
        let output = self
            .view(provider, multisig, abi::threshold_call(), "threshold")
            .await?;
        let required = IMultisig::thresholdCall::abi_decode_returns(&output)?;
        Ok(from_sol_u256(&required))
    }

    async fn view(
        &self,
        provider: &dyn ChainProvider,
        multisig: Address,
        data: Vec<u8>,
        what: &str,
    ) -> Result<Vec<u8>, MultisigError> {
        let request = TransactionRequest::call(multisig, data);
        self.guard.run(what, provider.call(&request)).await
    }

    async fn send_and_wait(
        &self,
        provider: &dyn ChainProvider,
        signer: &dyn TxSigner,
        request: TransactionRequest,
        what: &str,
    ) -> Result<TransactionReceipt, MultisigError> {
        let tx_hash = self.guard.run(what, signer.send(provider, request)).await?;
        let receipt = self
            .guard
            .run(what, provider.wait_for_receipt(tx_hash, self.poll_interval))
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
}

impl Default for TransactionCoordinator {
    fn default() -> Self {
        Self {
            guard: CallGuard::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            mode: ConfirmationMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{parse_address, Salt};
    use crate::multisig::FactoryClient;
    use crate::provider::{LocalChain, LocalSigner};

    struct Fixture {
        chain: LocalChain,
        signers: Vec<Arc<dyn TxSigner>>,
        multisig: Address,
    }

    fn coordinator() -> TransactionCoordinator {
        TransactionCoordinator::default().with_poll_interval(Duration::from_millis(1))
    }

    async fn fixture(owner_count: usize, threshold: u64) -> Fixture {
        let chain = LocalChain::new();
        let signers: Vec<Arc<dyn TxSigner>> = (0..owner_count)
            .map(|_| Arc::new(LocalSigner::random()) as Arc<dyn TxSigner>)
            .collect();
        let owners: Vec<Address> = signers.iter().map(|s| s.address()).collect();

        let deployment = FactoryClient::new(chain.factory_address(), chain.init_code_hash())
            .with_poll_interval(Duration::from_millis(1))
            .deploy(
                &chain,
                signers[0].as_ref(),
                &owners,
                threshold,
                &Salt::from_label("coordinator-tests"),
            )
            .await
            .unwrap();

        Fixture {
            chain,
            signers,
            multisig: deployment.address,
        }
    }

    fn recipient() -> Address {
        parse_address("0xCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC3").unwrap()
    }

    #[tokio::test]
    async fn test_two_of_two_end_to_end() {
        let f = fixture(2, 2).await;
        let coordinator = coordinator();

        let tx_hash = coordinator
            .execute(&f.chain, f.multisig, &f.signers, recipient(), U256::zero(), &[], 2)
            .await
            .unwrap();
        assert!(!tx_hash.is_zero());

        let pending = coordinator
            .transaction(&f.chain, f.multisig, U256::zero())
            .await
            .unwrap();
        assert!(pending.executed);
        assert_eq!(pending.confirmations, 2);
        assert_eq!(pending.to, recipient());
    }

    #[tokio::test]
    async fn test_value_moves_on_execution() {
        let f = fixture(3, 2).await;
        f.chain.fund(f.multisig, U256::from(1_000));
        let coordinator = coordinator();

        coordinator
            .execute(&f.chain, f.multisig, &f.signers, recipient(), U256::from(250), &[], 2)
            .await
            .unwrap();

        assert_eq!(f.chain.balance_of(recipient()), U256::from(250));
        assert_eq!(f.chain.balance_of(f.multisig), U256::from(750));
    }

    #[tokio::test]
    async fn test_only_threshold_signers_confirm() {
        let f = fixture(3, 2).await;
        let coordinator = coordinator();

        coordinator
            .execute(&f.chain, f.multisig, &f.signers, recipient(), U256::zero(), &[], 2)
            .await
            .unwrap();

        let nonce = U256::zero();
        for (i, expected) in [true, true, false].into_iter().enumerate() {
            let confirmed = coordinator
                .is_confirmed_by(&f.chain, f.multisig, nonce, f.signers[i].address())
                .await
                .unwrap();
            assert_eq!(confirmed, expected);
        }
    }

    #[tokio::test]
    async fn test_nonce_comes_from_contract() {
        let f = fixture(2, 1).await;
        let coordinator = coordinator();

        for expected in 0..3u64 {
            let submission = coordinator
                .submit(
                    &f.chain,
                    f.multisig,
                    f.signers[1].as_ref(),
                    recipient(),
                    U256::zero(),
                    &[0xde, 0xad],
                )
                .await
                .unwrap();
            assert_eq!(submission.nonce, U256::from(expected));
        }

        let pending = coordinator
            .transaction(&f.chain, f.multisig, U256::from(2))
            .await
            .unwrap();
        assert_eq!(pending.data, vec![0xde, 0xad]);
        assert!(!pending.executed);
    }

    #[tokio::test]
    async fn test_concurrent_mode() {
        let f = fixture(3, 3).await;
        let coordinator = coordinator().with_mode(ConfirmationMode::Concurrent);

        coordinator
            .execute(&f.chain, f.multisig, &f.signers, recipient(), U256::zero(), &[], 3)
            .await
            .unwrap();

        let pending = coordinator
            .transaction(&f.chain, f.multisig, U256::zero())
            .await
            .unwrap();
        assert!(pending.executed);
        assert_eq!(pending.confirmations, 3);
    }

    #[tokio::test]
    async fn test_auto_executed_contract_skips_execute_call() {
        let f = fixture(2, 2).await;
        f.chain.set_auto_execute(true);
        let coordinator = coordinator();

        coordinator
            .execute(&f.chain, f.multisig, &f.signers, recipient(), U256::zero(), &[], 2)
            .await
            .unwrap();

        // deployment, submit and confirm; no explicit execute
        assert_eq!(
            f.chain
                .get_transaction_count(f.signers[0].address())
                .await
                .unwrap(),
            3
        );
        let pending = coordinator
            .transaction(&f.chain, f.multisig, U256::zero())
            .await
            .unwrap();
        assert!(pending.executed);
    }

    #[tokio::test]
    async fn test_non_owner_confirmation_propagates_revert() {
        let f = fixture(2, 2).await;
        let coordinator = coordinator();
        let outsider: Arc<dyn TxSigner> = Arc::new(LocalSigner::random());
        let signers = vec![f.signers[0].clone(), outsider];

        let err = coordinator
            .execute(&f.chain, f.multisig, &signers, recipient(), U256::zero(), &[], 2)
            .await
            .unwrap_err();
        assert_eq!(err.revert_reason(), Some("not an owner"));

        // The owner's confirmation stays on chain; finish with the real owner
        let nonce = U256::zero();
        assert!(coordinator
            .is_confirmed_by(&f.chain, f.multisig, nonce, f.signers[0].address())
            .await
            .unwrap());
        coordinator
            .confirm(&f.chain, f.multisig, f.signers[1].as_ref(), nonce)
            .await
            .unwrap();
        coordinator
            .execute_transaction(&f.chain, f.multisig, f.signers[1].as_ref(), nonce)
            .await
            .unwrap();
        assert!(
            coordinator
                .transaction(&f.chain, f.multisig, nonce)
                .await
                .unwrap()
                .executed
        );
    }

    #[tokio::test]
    async fn test_double_confirmation_rejected() {
        let f = fixture(2, 2).await;
        let coordinator = coordinator();
        let submission = coordinator
            .submit(
                &f.chain,
                f.multisig,
                f.signers[0].as_ref(),
                recipient(),
                U256::zero(),
                &[],
            )
            .await
            .unwrap();

        coordinator
            .confirm(&f.chain, f.multisig, f.signers[0].as_ref(), submission.nonce)
            .await
            .unwrap();
        let err = coordinator
            .confirm(&f.chain, f.multisig, f.signers[0].as_ref(), submission.nonce)
            .await
            .unwrap_err();
        assert_eq!(err.revert_reason(), Some("transaction already confirmed"));
    }

    #[tokio::test]
    async fn test_execute_below_threshold_rejected() {
        let f = fixture(2, 2).await;
        let coordinator = coordinator();
        let submission = coordinator
            .submit(
                &f.chain,
                f.multisig,
                f.signers[0].as_ref(),
                recipient(),
                U256::zero(),
                &[],
            )
            .await
            .unwrap();

        let err = coordinator
            .execute_transaction(&f.chain, f.multisig, f.signers[0].as_ref(), submission.nonce)
            .await
            .unwrap_err();
        assert_eq!(err.revert_reason(), Some("not enough confirmations"));
    }

    #[tokio::test]
    async fn test_validation_before_network() {
        let f = fixture(2, 2).await;
        f.chain.set_hang(true);
        let coordinator = coordinator();

        let err = coordinator
            .execute(&f.chain, f.multisig, &f.signers[..1], recipient(), U256::zero(), &[], 2)
            .await
            .unwrap_err();
        assert!(matches!(err, MultisigError::InsufficientSigners { have: 1, need: 2 }));

        let duplicated = vec![f.signers[0].clone(), f.signers[0].clone()];
        let err = coordinator
            .execute(&f.chain, f.multisig, &duplicated, recipient(), U256::zero(), &[], 2)
            .await
            .unwrap_err();
        assert!(matches!(err, MultisigError::DuplicateOwner(_)));

        let err = coordinator
            .execute(&f.chain, f.multisig, &f.signers, recipient(), U256::zero(), &[], 0)
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_missing_submission_event() {
        let f = fixture(2, 1).await;
        f.chain.set_emit_events(false);

        let err = coordinator()
            .execute(&f.chain, f.multisig, &f.signers, recipient(), U256::zero(), &[], 1)
            .await
            .unwrap_err();
        assert!(matches!(err, MultisigError::MissingSubmissionEvent { .. }));
    }

    #[tokio::test]
    async fn test_hung_provider_times_out() {
        let f = fixture(2, 2).await;
        f.chain.set_hang(true);
        let config = CoordinatorConfig {
            rpc_timeout_ms: 20,
            ..CoordinatorConfig::default()
        };

        let err = TransactionCoordinator::new(&config)
            .execute(&f.chain, f.multisig, &f.signers, recipient(), U256::zero(), &[], 2)
            .await
            .unwrap_err();
        assert!(matches!(err, MultisigError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_cancellation_stops_sequence() {
        let f = fixture(2, 2).await;
        f.chain.set_hang(true);
        let token = CancellationToken::new();
        let coordinator = coordinator().with_cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let err = coordinator
            .execute(&f.chain, f.multisig, &f.signers, recipient(), U256::zero(), &[], 2)
            .await
            .unwrap_err();
        assert!(matches!(err, MultisigError::Cancelled));
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_contract_views() {
        let f = fixture(3, 2).await;
        let coordinator = coordinator();

        let mut owners = coordinator.owners(&f.chain, f.multisig).await.unwrap();
        owners.sort();
        let mut expected: Vec<Address> = f.signers.iter().map(|s| s.address()).collect();
        expected.sort();

        assert_eq!(owners, expected);
        assert_eq!(
            coordinator.threshold(&f.chain, f.multisig).await.unwrap(),
            U256::from(2)
        );
    }

    #[test]
    fn test_confirmation_mode_parse() {
        assert_eq!(
            "Concurrent".parse::<ConfirmationMode>().unwrap(),
            ConfirmationMode::Concurrent
        );
        assert!("parallel".parse::<ConfirmationMode>().is_err());
    }
}
