//! Multi-signature account coordination
//!
//! Owner-threshold multisig contracts deployed through an external factory:
//! - [`compute_address`] predicts where the factory will deploy an account
//! - [`FactoryClient`] deploys it and reports the address from the event
//! - [`TransactionCoordinator`] drives submit, confirm and execute
//! - [`check_deployment`] tells whether code exists at an address
//!
//! # Example
//!
//! ```ignore
//! use halo_multisig::multisig::{FactoryClient, TransactionCoordinator};
//!
//! // Deploy a 2-of-2 account
//! let deployment = factory.deploy(&provider, &chip_a, &owners, 2, &salt).await?;
//!
//! // Move funds out of it with both chips
//! let tx_hash = TransactionCoordinator::default()
//!     .execute(&provider, deployment.address, &signers, recipient, value, &[], 2)
//!     .await?;
//! ```

pub mod address;
pub mod coordinator;
pub mod error;
pub mod factory;
pub mod guard;
pub mod status;
pub mod wallet;

pub use address::compute_address;
pub use coordinator::{ConfirmationMode, PendingTransaction, Submission, TransactionCoordinator};
pub use error::MultisigError;
pub use factory::{Deployment, FactoryClient};
pub use guard::CallGuard;
pub use status::{check_deployment, is_deployed, DeploymentStatus, StatusChecker};
pub use wallet::MultisigConfig;
