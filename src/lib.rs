//! HaLo Multisig: multisig coordination for chip-backed accounts
//!
//! This crate provides the pieces a wallet needs to run owner-threshold
//! multisig contracts:
//! - Deterministic CREATE2 address prediction
//! - Deployment through an external factory contract
//! - Submit / confirm / execute coordination across several signers
//! - Deployment status checks
//! - Linked chip and multisig account persistence
//! - An in-process chain emulating the factory and multisig contracts
//!
//! # Example
//!
//! ```rust
//! use halo_multisig::core::{Salt, U256};
//! use halo_multisig::multisig::{FactoryClient, TransactionCoordinator};
//! use halo_multisig::provider::{LocalChain, LocalSigner, TxSigner};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let chain = LocalChain::new();
//! let a: Arc<dyn TxSigner> = Arc::new(LocalSigner::random());
//! let b: Arc<dyn TxSigner> = Arc::new(LocalSigner::random());
//! let owners = vec![a.address(), b.address()];
//!
//! // Deploy a 2-of-2 multisig
//! let factory = FactoryClient::new(chain.factory_address(), chain.init_code_hash());
//! let deployment = factory
//!     .deploy(&chain, a.as_ref(), &owners, 2, &Salt::from_label("example"))
//!     .await
//!     .unwrap();
//!
//! // Both owners confirm a call, then it executes
//! let tx_hash = TransactionCoordinator::default()
//!     .execute(&chain, deployment.address, &[a, b], owners[0], U256::zero(), &[], 2)
//!     .await
//!     .unwrap();
//! println!("Executed in {:#x}", tx_hash);
//! # });
//! ```

pub mod account;
pub mod cli;
pub mod config;
pub mod core;
pub mod crypto;
pub mod multisig;
pub mod provider;

// Re-export commonly used types
pub use account::{Account, AccountKind, AccountStore, ChipInfo};
pub use config::{Config, CoordinatorConfig, FactoryConfig};
pub use core::{Address, Salt, TxHash, U256};
pub use crypto::KeyPair;
pub use multisig::{
    check_deployment, compute_address, is_deployed, ConfirmationMode, Deployment,
    DeploymentStatus, FactoryClient, MultisigConfig, MultisigError, TransactionCoordinator,
};
pub use provider::{ChainProvider, LocalChain, LocalSigner, TxSigner};
