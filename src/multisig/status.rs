//! On-chain deployment status

use crate::core::{format_address, Address};
use crate::multisig::guard::CallGuard;
use crate::provider::ChainProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Whether contract code is present at an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStatus {
    Deployed,
    NotDeployed,
    /// The provider could not answer; carries the failure message
    Unknown(String),
}

impl DeploymentStatus {
    /// `Unknown` counts as not deployed
    pub fn is_deployed(&self) -> bool {
        matches!(self, DeploymentStatus::Deployed)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, DeploymentStatus::Unknown(_))
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentStatus::Deployed => write!(f, "deployed"),
            DeploymentStatus::NotDeployed => write!(f, "not deployed"),
            DeploymentStatus::Unknown(reason) => write!(f, "unknown ({})", reason),
        }
    }
}

/// Checks code presence; never fails, provider trouble maps to `Unknown`
#[derive(Debug, Clone, Default)]
pub struct StatusChecker {
    guard: CallGuard,
}

impl StatusChecker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            guard: CallGuard::new(timeout),
        }
    }

    pub async fn check(&self, provider: &dyn ChainProvider, address: Address) -> DeploymentStatus {
        match self.guard.run("eth_getCode", provider.get_code(address)).await {
            Ok(code) if code.is_empty() => DeploymentStatus::NotDeployed,
            Ok(_) => DeploymentStatus::Deployed,
            Err(e) => {
                log::warn!(
                    "Could not read code at {}: {}",
                    format_address(&address),
                    e
                );
                DeploymentStatus::Unknown(e.to_string())
            }
        }
    }

    pub async fn is_deployed(&self, provider: &dyn ChainProvider, address: Address) -> bool {
        self.check(provider, address).await.is_deployed()
    }
}

/// Tri-state deployment check with the default timeout
pub async fn check_deployment(provider: &dyn ChainProvider, address: Address) -> DeploymentStatus {
    StatusChecker::default().check(provider, address).await
}

/// `true` iff code is present; provider failure yields `false`
pub async fn is_deployed(provider: &dyn ChainProvider, address: Address) -> bool {
    StatusChecker::default().is_deployed(provider, address).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Salt;
    use crate::multisig::FactoryClient;
    use crate::provider::{LocalChain, LocalSigner, TxSigner};

    #[tokio::test]
    async fn test_unused_address_not_deployed() {
        let chain = LocalChain::new();
        let address = Address::repeat_byte(0x42);

        assert_eq!(
            check_deployment(&chain, address).await,
            DeploymentStatus::NotDeployed
        );
        assert!(!is_deployed(&chain, address).await);
    }

    #[tokio::test]
    async fn test_deployed_after_deploy() {
        let chain = LocalChain::new();
        let signer = LocalSigner::random();
        let factory = FactoryClient::new(chain.factory_address(), chain.init_code_hash())
            .with_poll_interval(Duration::from_millis(1));
        let salt = Salt::from_label("status");

        let predicted = factory
            .predict_address(&[signer.address()], 1, &salt)
            .unwrap();
        assert!(!is_deployed(&chain, predicted).await);

        let deployment = factory
            .deploy(&chain, &signer, &[signer.address()], 1, &salt)
            .await
            .unwrap();
        assert!(is_deployed(&chain, deployment.address).await);
    }

    #[tokio::test]
    async fn test_provider_failure_is_unknown_not_error() {
        let chain = LocalChain::new();
        chain.set_fail_get_code(true);

        let status = check_deployment(&chain, chain.factory_address()).await;
        assert!(matches!(status, DeploymentStatus::Unknown(_)));
        assert!(!status.is_known());
        assert!(!is_deployed(&chain, chain.factory_address()).await);
    }

    #[tokio::test]
    async fn test_hung_provider_is_unknown() {
        let chain = LocalChain::new();
        chain.set_hang(true);

        let status = StatusChecker::new(Duration::from_millis(10))
            .check(&chain, chain.factory_address())
            .await;
        assert!(matches!(status, DeploymentStatus::Unknown(_)));
    }
}
