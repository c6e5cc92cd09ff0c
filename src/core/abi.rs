//! Contract interfaces of the multisig factory and wallet
//!
//! Calls and events are declared with `sol!`; encoding and decoding go
//! through `SolCall` and `SolEvent`. The rest of the crate works with
//! `primitive-types`, so the helpers here convert at the boundary.

use crate::core::types::{Address, H256, U256};
use crate::provider::Log;
use alloy_primitives::{Address as SolAddress, Bytes, B256, U256 as SolU256};
use alloy_sol_types::{sol, SolCall, SolEvent};

sol! {
    interface IMultisigFactory {
        function createMultisig(address[] owners, uint256 threshold, bytes32 salt) external returns (address multisig);

        event MultisigCreated(address multisig, address[] owners, uint256 threshold);
    }

    interface IMultisig {
        function submitTransaction(address to, uint256 value, bytes data) external returns (uint256 nonce);
        function confirmTransaction(uint256 nonce) external;
        function executeTransaction(uint256 nonce) external;
        function getOwners() external view returns (address[] owners);
        function threshold() external view returns (uint256 required);
        function transactions(uint256 nonce) external view returns (address to, uint256 value, bytes data, bool executed, uint256 confirmations);
        function isConfirmedBy(uint256 nonce, address owner) external view returns (bool confirmed);

        event TransactionSubmitted(uint256 nonce, address submitter);
        event TransactionConfirmed(uint256 nonce, address owner);
        event TransactionExecuted(address to, uint256 value, bytes data);
    }
}

pub use IMultisig::{TransactionConfirmed, TransactionExecuted, TransactionSubmitted};
pub use IMultisigFactory::MultisigCreated;

// =============================================================================
// Conversions
// =============================================================================

pub fn to_sol_address(address: &Address) -> SolAddress {
    SolAddress::from_slice(address.as_bytes())
}

pub fn from_sol_address(address: &SolAddress) -> Address {
    Address::from_slice(address.as_slice())
}

pub fn to_sol_u256(value: &U256) -> SolU256 {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    SolU256::from_be_bytes(word)
}

pub fn from_sol_u256(value: &SolU256) -> U256 {
    U256::from_big_endian(&value.to_be_bytes::<32>())
}

pub fn to_b256(hash: &H256) -> B256 {
    B256::from(hash.to_fixed_bytes())
}

pub fn from_b256(hash: &B256) -> H256 {
    H256::from_slice(hash.as_slice())
}

fn to_sol_addresses(addresses: &[Address]) -> Vec<SolAddress> {
    addresses.iter().map(to_sol_address).collect()
}

pub fn from_sol_addresses(addresses: &[SolAddress]) -> Vec<Address> {
    addresses.iter().map(from_sol_address).collect()
}

// =============================================================================
// Calls
// =============================================================================

pub fn create_multisig_call(owners: &[Address], threshold: u64, salt: H256) -> Vec<u8> {
    IMultisigFactory::createMultisigCall {
        owners: to_sol_addresses(owners),
        threshold: SolU256::from(threshold),
        salt: to_b256(&salt),
    }
    .abi_encode()
}

pub fn submit_transaction_call(to: Address, value: U256, data: &[u8]) -> Vec<u8> {
    IMultisig::submitTransactionCall {
        to: to_sol_address(&to),
        value: to_sol_u256(&value),
        data: Bytes::from(data.to_vec()),
    }
    .abi_encode()
}

pub fn confirm_transaction_call(nonce: U256) -> Vec<u8> {
    IMultisig::confirmTransactionCall {
        nonce: to_sol_u256(&nonce),
    }
    .abi_encode()
}

pub fn execute_transaction_call(nonce: U256) -> Vec<u8> {
    IMultisig::executeTransactionCall {
        nonce: to_sol_u256(&nonce),
    }
    .abi_encode()
}

pub fn get_owners_call() -> Vec<u8> {
    IMultisig::getOwnersCall {}.abi_encode()
}

pub fn threshold_call() -> Vec<u8> {
    IMultisig::thresholdCall {}.abi_encode()
}

pub fn transactions_call(nonce: U256) -> Vec<u8> {
    IMultisig::transactionsCall {
        nonce: to_sol_u256(&nonce),
    }
    .abi_encode()
}

pub fn is_confirmed_by_call(nonce: U256, owner: Address) -> Vec<u8> {
    IMultisig::isConfirmedByCall {
        nonce: to_sol_u256(&nonce),
        owner: to_sol_address(&owner),
    }
    .abi_encode()
}

/// Leading 4-byte selector of call data, if there is one
pub fn call_selector(data: &[u8]) -> Option<[u8; 4]> {
    data.get(..4).and_then(|head| head.try_into().ok())
}

// =============================================================================
// Return values
// =============================================================================

/// Decoded return value of `transactions(uint256)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionView {
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub executed: bool,
    pub confirmations: U256,
}

impl TransactionView {
    pub fn encode(&self) -> Vec<u8> {
        IMultisig::transactionsCall::abi_encode_returns(&IMultisig::transactionsReturn {
            to: to_sol_address(&self.to),
            value: to_sol_u256(&self.value),
            data: Bytes::from(self.data.clone()),
            executed: self.executed,
            confirmations: to_sol_u256(&self.confirmations),
        })
    }

    pub fn decode(output: &[u8]) -> Result<Self, alloy_sol_types::Error> {
        let returned = IMultisig::transactionsCall::abi_decode_returns(output)?;
        Ok(Self {
            to: from_sol_address(&returned.to),
            value: from_sol_u256(&returned.value),
            data: returned.data.to_vec(),
            executed: returned.executed,
            confirmations: from_sol_u256(&returned.confirmations),
        })
    }
}

// =============================================================================
// Events
// =============================================================================

/// Log emitted by `emitter` for `event`
pub fn event_log<E: SolEvent>(emitter: Address, event: &E) -> Log {
    let encoded = event.encode_log_data();
    Log {
        address: emitter,
        topics: encoded.topics().iter().map(from_b256).collect(),
        data: encoded.data.to_vec(),
    }
}

/// Decode `log` as `E`.
///
/// `Ok(None)` when the first topic belongs to another event; an error when
/// the topic matches but the payload is malformed.
pub fn decode_event<E: SolEvent>(log: &Log) -> Result<Option<E>, alloy_sol_types::Error> {
    match log.topics.first() {
        Some(topic) if to_b256(topic) == E::SIGNATURE_HASH => {
            E::decode_raw_log(log.topics.iter().map(to_b256), &log.data).map(Some)
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keccak256;

    #[test]
    fn test_selectors_match_signatures() {
        assert_eq!(
            IMultisigFactory::createMultisigCall::SELECTOR,
            keccak256(b"createMultisig(address[],uint256,bytes32)")[..4]
        );
        assert_eq!(
            IMultisig::confirmTransactionCall::SELECTOR,
            keccak256(b"confirmTransaction(uint256)")[..4]
        );
        assert_eq!(
            TransactionSubmitted::SIGNATURE_HASH.as_slice(),
            &keccak256(b"TransactionSubmitted(uint256,address)")[..]
        );
    }

    #[test]
    fn test_confirm_call_layout() {
        let data = confirm_transaction_call(U256::from(7));
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(call_selector(&data), Some(IMultisig::confirmTransactionCall::SELECTOR));
        assert_eq!(data[35], 7);
    }

    #[test]
    fn test_submit_call_decodes() {
        let to = Address::repeat_byte(0xcc);
        let data = submit_transaction_call(to, U256::from(5), &[0xde, 0xad]);

        let call = IMultisig::submitTransactionCall::abi_decode(&data).unwrap();
        assert_eq!(from_sol_address(&call.to), to);
        assert_eq!(from_sol_u256(&call.value), U256::from(5));
        assert_eq!(call.data.to_vec(), vec![0xde, 0xad]);
    }

    #[test]
    fn test_u256_conversion_is_big_endian() {
        let value = U256::from(0x0102_0304u64) << 128;
        assert_eq!(from_sol_u256(&to_sol_u256(&value)), value);
        assert_eq!(to_sol_u256(&U256::from(2)), SolU256::from(2u64));
    }

    #[test]
    fn test_decode_event_filters_by_topic() {
        let emitter = Address::repeat_byte(0xfa);
        let event = MultisigCreated {
            multisig: to_sol_address(&Address::repeat_byte(0x11)),
            owners: to_sol_addresses(&[Address::repeat_byte(0x01), Address::repeat_byte(0x02)]),
            threshold: SolU256::from(2u64),
        };
        let log = event_log(emitter, &event);

        let created = decode_event::<MultisigCreated>(&log).unwrap().unwrap();
        assert_eq!(from_sol_address(&created.multisig), Address::repeat_byte(0x11));
        assert_eq!(from_sol_addresses(&created.owners).len(), 2);
        assert!(decode_event::<TransactionSubmitted>(&log).unwrap().is_none());
    }

    #[test]
    fn test_truncated_event_data_is_error() {
        let event = TransactionExecuted {
            to: to_sol_address(&Address::repeat_byte(0xcc)),
            value: SolU256::from(9u64),
            data: Bytes::from(vec![1, 2, 3]),
        };
        let mut log = event_log(Address::repeat_byte(0xfa), &event);
        log.data.truncate(40);

        assert!(decode_event::<TransactionExecuted>(&log).is_err());
    }

    #[test]
    fn test_transaction_view_decodes() {
        let view = TransactionView {
            to: Address::repeat_byte(0xcc),
            value: U256::from(100),
            data: vec![0xab; 40],
            executed: true,
            confirmations: U256::from(2),
        };
        assert_eq!(TransactionView::decode(&view.encode()).unwrap(), view);
        assert!(TransactionView::decode(&[0u8; 20]).is_err());
    }
}
