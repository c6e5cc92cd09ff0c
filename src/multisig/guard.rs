//! Per-call timeout and cancellation for chain RPCs

use crate::multisig::MultisigError;
use crate::provider::ProviderError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default bound on a single RPC round-trip (including waiting for a receipt)
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(60);

/// Bounds every chain call with a timeout and a shared cancellation token.
///
/// Clone the guard (or the token) to thread one cancellation through a whole
/// submit/confirm/execute sequence.
#[derive(Debug, Clone)]
pub struct CallGuard {
    timeout: Duration,
    cancel: CancellationToken,
}

impl CallGuard {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run one provider call under the timeout, racing cancellation
    pub async fn run<T, F>(&self, what: &str, call: F) -> Result<T, MultisigError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(MultisigError::Cancelled);
        }

        tokio::select! {
            _ = self.cancel.cancelled() => {
                log::warn!("{} cancelled", what);
                Err(MultisigError::Cancelled)
            }
            result = tokio::time::timeout(self.timeout, call) => match result {
                Ok(inner) => inner.map_err(MultisigError::from),
                Err(_) => {
                    log::warn!("{} timed out after {:?}", what, self.timeout);
                    Err(MultisigError::Timeout(self.timeout))
                }
            },
        }
    }
}

impl Default for CallGuard {
    fn default() -> Self {
        Self::new(DEFAULT_RPC_TIMEOUT)
    }
}
