//! Linked signing chips
//!
//! A chip is identified by the secp256k1 public key it reports; its account
//! address is derived Ethereum-style from that key.

use crate::account::AccountError;
use crate::core::{format_address, Address};
use crate::crypto::{public_key_from_hex, public_key_to_address};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A signing chip linked to the wallet
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChipInfo {
    address: Address,
    /// Uncompressed public key (hex, no prefix)
    public_key: String,
    /// Key slot on the chip
    slot: u8,
    name: Option<String>,
    linked_at: DateTime<Utc>,
}

impl ChipInfo {
    /// Link a chip from the public key it reported.
    ///
    /// Accepts compressed or uncompressed keys, `0x` optional; the key is
    /// stored uncompressed.
    pub fn from_public_key(
        public_key_hex: &str,
        slot: u8,
        name: Option<String>,
    ) -> Result<Self, AccountError> {
        let public_key = public_key_from_hex(public_key_hex)?;
        Ok(Self {
            address: public_key_to_address(&public_key),
            public_key: hex::encode(public_key.serialize_uncompressed()),
            slot,
            name,
            linked_at: Utc::now(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn linked_at(&self) -> DateTime<Utc> {
        self.linked_at
    }

    /// Name if set, otherwise the address
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format_address(&self.address),
        }
    }
}
