//! Transaction signers
//!
//! A [`TxSigner`] is one owner of a multisig. In the wallet each owner is a
//! HaLo chip reached over NFC; [`LocalSigner`] keeps the key in memory.

use crate::core::{Address, TxHash};
use crate::crypto::KeyPair;
use crate::provider::{ChainProvider, ProviderError, SignedTransaction, TransactionRequest};
use async_trait::async_trait;

/// An account that can sign transactions
#[async_trait]
pub trait TxSigner: Send + Sync {
    /// Address of the signing account
    fn address(&self) -> Address;

    /// Sign `request` with the given account nonce
    async fn sign_transaction(
        &self,
        request: TransactionRequest,
        nonce: u64,
    ) -> Result<SignedTransaction, ProviderError>;

    /// Fill nonce and gas, sign, and broadcast. Returns the transaction hash
    /// without waiting for inclusion.
    async fn send(
        &self,
        provider: &dyn ChainProvider,
        mut request: TransactionRequest,
    ) -> Result<TxHash, ProviderError> {
        let from = self.address();
        let nonce = provider.get_transaction_count(from).await?;
        if request.gas.is_none() {
            request.gas = Some(provider.estimate_gas(from, &request).await?);
        }

        let signed = self.sign_transaction(request, nonce).await?;
        let hash = provider.send_transaction(signed).await?;
        log::debug!("Sent {:#x} from {:#x} (nonce {})", hash, from, nonce);
        Ok(hash)
    }
}

/// Signer backed by an in-memory secp256k1 key
#[derive(Debug, Clone)]
pub struct LocalSigner {
    key_pair: KeyPair,
}

impl LocalSigner {
    pub fn new(key_pair: KeyPair) -> Self {
        Self { key_pair }
    }

    /// Signer with a fresh random key
    pub fn random() -> Self {
        Self::new(KeyPair::generate())
    }

    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, ProviderError> {
        Ok(Self::new(KeyPair::from_private_key_hex(hex_key)?))
    }

    pub fn public_key_hex(&self) -> String {
        self.key_pair.public_key_hex()
    }
}

#[async_trait]
impl TxSigner for LocalSigner {
    fn address(&self) -> Address {
        self.key_pair.address()
    }

    async fn sign_transaction(
        &self,
        request: TransactionRequest,
        nonce: u64,
    ) -> Result<SignedTransaction, ProviderError> {
        let from = self.address();
        let hash = request.signing_hash(from, nonce);
        let signature = self.key_pair.sign(hash.as_bytes())?;

        Ok(SignedTransaction {
            from,
            nonce,
            request,
            public_key: self.key_pair.public_key_hex(),
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{public_key_from_hex, verify_signature};

    #[tokio::test]
    async fn test_local_signer_signature_verifies() {
        let signer = LocalSigner::random();
        let request = TransactionRequest::call(Address::repeat_byte(0xcc), vec![]);

        let signed = signer.sign_transaction(request, 3).await.unwrap();
        assert_eq!(signed.from, signer.address());
        assert_eq!(signed.nonce, 3);

        let public_key = public_key_from_hex(&signed.public_key).unwrap();
        assert!(
            verify_signature(&public_key, signed.signing_hash().as_bytes(), &signed.signature)
                .unwrap()
        );
    }
}
