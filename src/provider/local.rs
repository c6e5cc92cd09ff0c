//! In-process chain emulating the factory and multisig contracts
//!
//! Every transaction is mined into its own block as soon as it is sent.
//! Signatures and account nonces are checked like a node would; contract
//! calls are dispatched natively on their ABI selector. A reverting call
//! still consumes the sender nonce and yields a receipt with
//! `status == false`.

use crate::core::abi::{
    call_selector, event_log, from_b256, from_sol_address, from_sol_addresses, from_sol_u256,
    to_sol_address, to_sol_u256, IMultisig, IMultisigFactory, MultisigCreated, TransactionConfirmed,
    TransactionExecuted, TransactionSubmitted, TransactionView,
};
use crate::core::{Address, TxHash, H256, U256};
use crate::crypto::{keccak256, public_key_from_hex, public_key_to_address, verify_signature};
use crate::multisig::address::create2_address;
use crate::provider::{
    ChainProvider, Log, ProviderError, SignedTransaction, TransactionReceipt, TransactionRequest,
};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

// =============================================================================
// Constants
// =============================================================================

/// Creation code the factory deploys for every multisig
pub const MULTISIG_INIT_CODE: &[u8] = b"\x60\x80\x60\x40\x52halo-multisig-wallet-v1";

/// Runtime code left at a deployed multisig address
const MULTISIG_RUNTIME_CODE: &[u8] = b"\x60\x80\x60\x40\x52\x36\x15halo-multisig-runtime";

/// Runtime code of the factory
const FACTORY_RUNTIME_CODE: &[u8] = b"\x60\x80\x60\x40\x52\x34\x80halo-multisig-factory";

/// Intrinsic gas of any transaction
const BASE_GAS: u64 = 21_000;

/// Gas per byte of call data
const GAS_PER_DATA_BYTE: u64 = 16;

/// Flat execution cost of a contract call
const CONTRACT_CALL_GAS: u64 = 45_000;

/// `keccak256` of [`MULTISIG_INIT_CODE`]
pub fn multisig_init_code_hash() -> H256 {
    H256(keccak256(MULTISIG_INIT_CODE))
}

// =============================================================================
// Contract state
// =============================================================================

#[derive(Debug, Clone)]
struct StoredTransaction {
    to: Address,
    value: U256,
    data: Vec<u8>,
    executed: bool,
    confirmations: Vec<Address>,
}

#[derive(Debug, Clone)]
struct WalletState {
    owners: Vec<Address>,
    threshold: u64,
    transactions: Vec<StoredTransaction>,
}

impl WalletState {
    fn require_owner(&self, sender: Address) -> Result<(), String> {
        if self.owners.contains(&sender) {
            Ok(())
        } else {
            Err("not an owner".to_string())
        }
    }

    fn transaction_index(&self, nonce: U256) -> Result<usize, String> {
        if nonce >= U256::from(self.transactions.len()) {
            return Err("transaction does not exist".to_string());
        }
        Ok(nonce.as_usize())
    }
}

/// Execution switches shared by every call
#[derive(Debug, Clone, Copy)]
struct Rules {
    init_code_hash: H256,
    auto_execute: bool,
}

/// Everything a reverted call must leave untouched
#[derive(Debug, Clone, Default)]
struct WorldState {
    balances: HashMap<Address, U256>,
    code: HashMap<Address, Vec<u8>>,
    factories: HashSet<Address>,
    wallets: HashMap<Address, WalletState>,
}

impl WorldState {
    fn apply(
        &mut self,
        from: Address,
        request: &TransactionRequest,
        rules: Rules,
    ) -> Result<Vec<Log>, String> {
        self.transfer(from, request.to, request.value)?;

        if self.factories.contains(&request.to) {
            return self.run_factory(request.to, &request.data, rules);
        }
        if self.wallets.contains_key(&request.to) {
            return self.run_wallet(from, request.to, &request.data, rules);
        }
        Ok(Vec::new())
    }

    fn transfer(&mut self, from: Address, to: Address, value: U256) -> Result<(), String> {
        if value.is_zero() {
            return Ok(());
        }
        let balance = self.balances.get(&from).copied().unwrap_or_default();
        if balance < value {
            return Err("insufficient balance".to_string());
        }
        self.balances.insert(from, balance - value);
        *self.balances.entry(to).or_default() += value;
        Ok(())
    }

    fn run_factory(
        &mut self,
        factory: Address,
        data: &[u8],
        rules: Rules,
    ) -> Result<Vec<Log>, String> {
        let selector = call_selector(data).ok_or_else(|| "missing selector".to_string())?;
        if selector != IMultisigFactory::createMultisigCall::SELECTOR {
            return Err(format!("unknown factory selector 0x{}", hex::encode(selector)));
        }

        let call = IMultisigFactory::createMultisigCall::abi_decode(data).map_err(|e| e.to_string())?;
        let owners = from_sol_addresses(&call.owners);
        let threshold = from_sol_u256(&call.threshold);
        let salt = from_b256(&call.salt);

        if owners.is_empty() {
            return Err("owners required".to_string());
        }
        if owners.iter().any(|owner| owner.is_zero()) {
            return Err("invalid owner".to_string());
        }
        let unique: HashSet<&Address> = owners.iter().collect();
        if unique.len() != owners.len() {
            return Err("duplicate owner".to_string());
        }
        if threshold.is_zero() || threshold > U256::from(owners.len()) {
            return Err("invalid threshold".to_string());
        }

        let multisig = create2_address(factory, salt, rules.init_code_hash);
        if self.code.contains_key(&multisig) {
            return Err("multisig already deployed".to_string());
        }

        self.code.insert(multisig, MULTISIG_RUNTIME_CODE.to_vec());
        self.wallets.insert(
            multisig,
            WalletState {
                owners,
                threshold: threshold.as_u64(),
                transactions: Vec::new(),
            },
        );

        let event = MultisigCreated {
            multisig: to_sol_address(&multisig),
            owners: call.owners,
            threshold: call.threshold,
        };
        Ok(vec![event_log(factory, &event)])
    }

    fn run_wallet(
        &mut self,
        sender: Address,
        wallet_address: Address,
        data: &[u8],
        rules: Rules,
    ) -> Result<Vec<Log>, String> {
        let selector = call_selector(data).ok_or_else(|| "missing selector".to_string())?;
        let wallet = self
            .wallets
            .get_mut(&wallet_address)
            .ok_or_else(|| "no wallet at address".to_string())?;
        wallet.require_owner(sender)?;

        if selector == IMultisig::submitTransactionCall::SELECTOR {
            let call = IMultisig::submitTransactionCall::abi_decode(data).map_err(|e| e.to_string())?;
            let nonce = U256::from(wallet.transactions.len());
            wallet.transactions.push(StoredTransaction {
                to: from_sol_address(&call.to),
                value: from_sol_u256(&call.value),
                data: call.data.to_vec(),
                executed: false,
                confirmations: Vec::new(),
            });

            let event = TransactionSubmitted {
                nonce: to_sol_u256(&nonce),
                submitter: to_sol_address(&sender),
            };
            return Ok(vec![event_log(wallet_address, &event)]);
        }

        if selector == IMultisig::confirmTransactionCall::SELECTOR {
            let call = IMultisig::confirmTransactionCall::abi_decode(data).map_err(|e| e.to_string())?;
            let index = wallet.transaction_index(from_sol_u256(&call.nonce))?;
            let threshold = wallet.threshold as usize;
            let stored = &mut wallet.transactions[index];
            if stored.executed {
                return Err("transaction already executed".to_string());
            }
            if stored.confirmations.contains(&sender) {
                return Err("transaction already confirmed".to_string());
            }
            stored.confirmations.push(sender);
            let ready = stored.confirmations.len() >= threshold;

            let event = TransactionConfirmed {
                nonce: call.nonce,
                owner: to_sol_address(&sender),
            };
            let mut logs = vec![event_log(wallet_address, &event)];
            if rules.auto_execute && ready {
                logs.extend(self.execute_stored(wallet_address, index)?);
            }
            return Ok(logs);
        }

        if selector == IMultisig::executeTransactionCall::SELECTOR {
            let call = IMultisig::executeTransactionCall::abi_decode(data).map_err(|e| e.to_string())?;
            let index = wallet.transaction_index(from_sol_u256(&call.nonce))?;
            let stored = &wallet.transactions[index];
            if stored.executed {
                return Err("transaction already executed".to_string());
            }
            if stored.confirmations.len() < wallet.threshold as usize {
                return Err("not enough confirmations".to_string());
            }
            return self.execute_stored(wallet_address, index);
        }

        Err(format!("unknown wallet selector 0x{}", hex::encode(selector)))
    }

    fn execute_stored(&mut self, wallet_address: Address, index: usize) -> Result<Vec<Log>, String> {
        let (to, value, data) = {
            let stored = self
                .wallets
                .get(&wallet_address)
                .and_then(|wallet| wallet.transactions.get(index))
                .ok_or_else(|| "transaction does not exist".to_string())?;
            (stored.to, stored.value, stored.data.clone())
        };

        self.transfer(wallet_address, to, value)?;
        if let Some(stored) = self
            .wallets
            .get_mut(&wallet_address)
            .and_then(|wallet| wallet.transactions.get_mut(index))
        {
            stored.executed = true;
        }

        let event = TransactionExecuted {
            to: to_sol_address(&to),
            value: to_sol_u256(&value),
            data: data.into(),
        };
        Ok(vec![event_log(wallet_address, &event)])
    }

    fn view(&self, request: &TransactionRequest) -> Result<Vec<u8>, String> {
        let Some(wallet) = self.wallets.get(&request.to) else {
            return Ok(Vec::new());
        };
        let data = &request.data;
        let selector = call_selector(data).ok_or_else(|| "missing selector".to_string())?;

        if selector == IMultisig::getOwnersCall::SELECTOR {
            let owners: Vec<_> = wallet.owners.iter().map(to_sol_address).collect();
            return Ok(IMultisig::getOwnersCall::abi_encode_returns(&owners));
        }
        if selector == IMultisig::thresholdCall::SELECTOR {
            let threshold = to_sol_u256(&U256::from(wallet.threshold));
            return Ok(IMultisig::thresholdCall::abi_encode_returns(&threshold));
        }
        if selector == IMultisig::transactionsCall::SELECTOR {
            let call = IMultisig::transactionsCall::abi_decode(data).map_err(|e| e.to_string())?;
            let stored = &wallet.transactions[wallet.transaction_index(from_sol_u256(&call.nonce))?];
            let view = TransactionView {
                to: stored.to,
                value: stored.value,
                data: stored.data.clone(),
                executed: stored.executed,
                confirmations: U256::from(stored.confirmations.len()),
            };
            return Ok(view.encode());
        }
        if selector == IMultisig::isConfirmedByCall::SELECTOR {
            let call = IMultisig::isConfirmedByCall::abi_decode(data).map_err(|e| e.to_string())?;
            let stored = &wallet.transactions[wallet.transaction_index(from_sol_u256(&call.nonce))?];
            let confirmed = stored.confirmations.contains(&from_sol_address(&call.owner));
            return Ok(IMultisig::isConfirmedByCall::abi_encode_returns(&confirmed));
        }

        Err(format!("unknown view selector 0x{}", hex::encode(selector)))
    }
}

// =============================================================================
// Chain
// =============================================================================

#[derive(Debug)]
struct ChainState {
    world: WorldState,
    nonces: HashMap<Address, u64>,
    receipts: HashMap<TxHash, TransactionReceipt>,
    block_number: u64,
    auto_execute: bool,
    fail_get_code: bool,
    hang: bool,
    emit_events: bool,
}

/// In-process chain with a factory deployed at [`LocalChain::factory_address`]
#[derive(Debug)]
pub struct LocalChain {
    state: Mutex<ChainState>,
    factory: Address,
    init_code_hash: H256,
}

impl LocalChain {
    /// New chain with the multisig factory deployed
    pub fn new() -> Self {
        let factory = Address::from_slice(&keccak256(b"halo-multisig/local-factory")[12..]);

        let mut world = WorldState::default();
        world.code.insert(factory, FACTORY_RUNTIME_CODE.to_vec());
        world.factories.insert(factory);

        Self {
            state: Mutex::new(ChainState {
                world,
                nonces: HashMap::new(),
                receipts: HashMap::new(),
                block_number: 0,
                auto_execute: false,
                fail_get_code: false,
                hang: false,
                emit_events: true,
            }),
            factory,
            init_code_hash: multisig_init_code_hash(),
        }
    }

    pub fn factory_address(&self) -> Address {
        self.factory
    }

    /// Init-code hash the factory deploys with
    pub fn init_code_hash(&self) -> H256 {
        self.init_code_hash
    }

    fn lock(&self) -> Result<MutexGuard<'_, ChainState>, ProviderError> {
        self.state
            .lock()
            .map_err(|_| ProviderError::Rpc("chain state poisoned".to_string()))
    }

    fn update(&self, f: impl FnOnce(&mut ChainState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    /// Credit `amount` wei to `address`
    pub fn fund(&self, address: Address, amount: U256) {
        self.update(|state| *state.world.balances.entry(address).or_default() += amount);
    }

    pub fn balance_of(&self, address: Address) -> U256 {
        self.lock()
            .map(|state| state.world.balances.get(&address).copied().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn block_number(&self) -> u64 {
        self.lock().map(|state| state.block_number).unwrap_or(0)
    }

    /// Execute a wallet transaction as soon as its last confirmation lands
    pub fn set_auto_execute(&self, enabled: bool) {
        self.update(|state| state.auto_execute = enabled);
    }

    /// Make `get_code` fail with an RPC error
    pub fn set_fail_get_code(&self, enabled: bool) {
        self.update(|state| state.fail_get_code = enabled);
    }

    /// Make every RPC call hang forever
    pub fn set_hang(&self, enabled: bool) {
        self.update(|state| state.hang = enabled);
    }

    /// When disabled, receipts carry no logs
    pub fn set_emit_events(&self, enabled: bool) {
        self.update(|state| state.emit_events = enabled);
    }

    async fn maybe_hang(&self) {
        let hang = self.state.lock().map(|state| state.hang).unwrap_or(false);
        if hang {
            futures::future::pending::<()>().await;
        }
    }

    fn rules(&self, state: &ChainState) -> Rules {
        Rules {
            init_code_hash: self.init_code_hash,
            auto_execute: state.auto_execute,
        }
    }

    fn intrinsic_gas(state: &ChainState, request: &TransactionRequest) -> u64 {
        let mut gas = BASE_GAS + GAS_PER_DATA_BYTE * request.data.len() as u64;
        if state.world.code.contains_key(&request.to) {
            gas += CONTRACT_CALL_GAS;
        }
        gas
    }

    fn verify(tx: &SignedTransaction) -> Result<(), ProviderError> {
        let public_key =
            public_key_from_hex(&tx.public_key).map_err(|_| ProviderError::InvalidSignature)?;
        if public_key_to_address(&public_key) != tx.from {
            return Err(ProviderError::InvalidSignature);
        }
        let valid = verify_signature(&public_key, tx.signing_hash().as_bytes(), &tx.signature)
            .map_err(|_| ProviderError::InvalidSignature)?;
        if !valid {
            return Err(ProviderError::InvalidSignature);
        }
        Ok(())
    }

    fn mine(&self, tx: SignedTransaction) -> Result<TxHash, ProviderError> {
        Self::verify(&tx)?;

        let mut state = self.lock()?;
        let expected = state.nonces.get(&tx.from).copied().unwrap_or(0);
        if tx.nonce != expected {
            return Err(ProviderError::NonceMismatch {
                expected,
                got: tx.nonce,
            });
        }
        state.nonces.insert(tx.from, expected + 1);
        state.block_number += 1;

        let hash = tx.hash();
        let rules = self.rules(&state);
        let gas_used = Self::intrinsic_gas(&state, &tx.request);

        let mut next = state.world.clone();
        let (status, mut logs, revert_reason) = match next.apply(tx.from, &tx.request, rules) {
            Ok(logs) => {
                state.world = next;
                (true, logs, None)
            }
            Err(reason) => {
                log::debug!("Transaction {:#x} reverted: {}", hash, reason);
                (false, Vec::new(), Some(reason))
            }
        };
        if !state.emit_events {
            logs.clear();
        }

        let receipt = TransactionReceipt {
            tx_hash: hash,
            from: tx.from,
            to: tx.request.to,
            status,
            block_number: state.block_number,
            gas_used,
            logs,
            revert_reason,
        };
        state.receipts.insert(hash, receipt);
        Ok(hash)
    }

    fn simulate(&self, from: Address, request: &TransactionRequest) -> Result<u64, ProviderError> {
        let state = self.lock()?;
        let mut scratch = state.world.clone();
        scratch
            .apply(from, request, self.rules(&state))
            .map_err(|reason| ProviderError::Reverted {
                tx_hash: None,
                reason,
            })?;
        Ok(Self::intrinsic_gas(&state, request))
    }
}

impl Default for LocalChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainProvider for LocalChain {
    async fn get_code(&self, address: Address) -> Result<Vec<u8>, ProviderError> {
        self.maybe_hang().await;
        let state = self.lock()?;
        if state.fail_get_code {
            return Err(ProviderError::Rpc("eth_getCode failed".to_string()));
        }
        Ok(state.world.code.get(&address).cloned().unwrap_or_default())
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64, ProviderError> {
        self.maybe_hang().await;
        Ok(self.lock()?.nonces.get(&address).copied().unwrap_or(0))
    }

    async fn estimate_gas(
        &self,
        from: Address,
        request: &TransactionRequest,
    ) -> Result<u64, ProviderError> {
        self.maybe_hang().await;
        self.simulate(from, request)
    }

    async fn call(&self, request: &TransactionRequest) -> Result<Vec<u8>, ProviderError> {
        self.maybe_hang().await;
        self.lock()?
            .world
            .view(request)
            .map_err(|reason| ProviderError::Reverted {
                tx_hash: None,
                reason,
            })
    }

    async fn send_transaction(&self, tx: SignedTransaction) -> Result<TxHash, ProviderError> {
        self.maybe_hang().await;
        self.mine(tx)
    }

    async fn get_transaction_receipt(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, ProviderError> {
        self.maybe_hang().await;
        Ok(self.lock()?.receipts.get(&hash).cloned())
    }
}
