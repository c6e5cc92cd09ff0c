//! Account persistence
//!
//! All accounts of a wallet live in one `accounts.json` inside the data
//! directory. Every mutation rewrites the file through a temporary file and
//! an atomic rename.

use crate::account::{AccountError, ChipInfo};
use crate::core::{format_address, Address};
use crate::multisig::MultisigConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// File name of the account list inside the data directory
pub const ACCOUNTS_FILE: &str = "accounts.json";

/// What an account signs with
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AccountKind {
    /// A single linked chip
    Chip(ChipInfo),
    /// A threshold account owned by several chips
    Multisig(MultisigConfig),
}

/// A named wallet account
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub name: String,
    pub kind: AccountKind,
}

impl Account {
    pub fn chip(name: &str, chip: ChipInfo) -> Self {
        Self {
            name: name.to_string(),
            kind: AccountKind::Chip(chip),
        }
    }

    pub fn multisig(name: &str, config: MultisigConfig) -> Self {
        Self {
            name: name.to_string(),
            kind: AccountKind::Multisig(config),
        }
    }

    /// On-chain address: the chip address, or the multisig contract once known
    pub fn address(&self) -> Option<Address> {
        match &self.kind {
            AccountKind::Chip(chip) => Some(chip.address()),
            AccountKind::Multisig(config) => config.smart_account_address,
        }
    }

    pub fn as_chip(&self) -> Option<&ChipInfo> {
        match &self.kind {
            AccountKind::Chip(chip) => Some(chip),
            AccountKind::Multisig(_) => None,
        }
    }

    pub fn as_multisig(&self) -> Option<&MultisigConfig> {
        match &self.kind {
            AccountKind::Multisig(config) => Some(config),
            AccountKind::Chip(_) => None,
        }
    }

    pub fn as_multisig_mut(&mut self) -> Option<&mut MultisigConfig> {
        match &mut self.kind {
            AccountKind::Multisig(config) => Some(config),
            AccountKind::Chip(_) => None,
        }
    }

    /// One-line summary for listings
    pub fn summary(&self) -> String {
        match &self.kind {
            AccountKind::Chip(chip) => format!(
                "chip      {} (slot {})",
                format_address(&chip.address()),
                chip.slot()
            ),
            AccountKind::Multisig(config) => {
                let location = match (config.deployed, config.smart_account_address) {
                    (true, Some(address)) => format_address(&address),
                    _ => "not deployed".to_string(),
                };
                format!("multisig  {} {}", config.description(), location)
            }
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountFile {
    accounts: Vec<Account>,
}

/// JSON-backed account list
#[derive(Debug)]
pub struct AccountStore {
    data_dir: PathBuf,
    accounts: Vec<Account>,
}

impl AccountStore {
    /// Open the store in `data_dir`, creating the directory if needed
    pub fn open(data_dir: &Path) -> Result<Self, AccountError> {
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(ACCOUNTS_FILE);

        let accounts = if path.exists() {
            let file = fs::File::open(&path)?;
            let data: AccountFile = serde_json::from_reader(BufReader::new(file))?;
            data.accounts
        } else {
            Vec::new()
        };

        log::debug!("Loaded {} accounts from {}", accounts.len(), path.display());
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            accounts,
        })
    }

    fn path(&self) -> PathBuf {
        self.data_dir.join(ACCOUNTS_FILE)
    }

    /// Write all accounts to disk
    pub fn save(&self) -> Result<(), AccountError> {
        let temp_path = self.data_dir.join("accounts.tmp");
        {
            let file = fs::File::create(&temp_path)?;
            let writer = BufWriter::new(file);
            let data = AccountFile {
                accounts: self.accounts.clone(),
            };
            serde_json::to_writer_pretty(writer, &data)?;
        }

        // Atomic rename
        fs::rename(&temp_path, self.path())?;
        Ok(())
    }

    /// Add an account; names are unique
    pub fn add(&mut self, account: Account) -> Result<(), AccountError> {
        if self.get(&account.name).is_some() {
            return Err(AccountError::AlreadyExists(account.name));
        }
        log::info!("Adding account '{}'", account.name);
        self.accounts.push(account);
        if let Err(e) = self.save() {
            self.accounts.pop();
            return Err(e);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Account> {
        self.accounts.iter().find(|account| account.name == name)
    }

    pub fn list(&self) -> &[Account] {
        &self.accounts
    }

    /// Remove and return an account
    pub fn remove(&mut self, name: &str) -> Result<Account, AccountError> {
        let index = self
            .accounts
            .iter()
            .position(|account| account.name == name)
            .ok_or_else(|| AccountError::NotFound(name.to_string()))?;
        let account = self.accounts.remove(index);
        if let Err(e) = self.save() {
            self.accounts.insert(index, account);
            return Err(e);
        }
        Ok(account)
    }

    /// Link a chip from the public key it reported
    pub fn link_chip(
        &mut self,
        name: &str,
        public_key_hex: &str,
        slot: u8,
        label: Option<String>,
    ) -> Result<ChipInfo, AccountError> {
        let chip = ChipInfo::from_public_key(public_key_hex, slot, label)?;

        if let Some(existing) = self
            .accounts
            .iter()
            .find(|account| account.as_chip().map(|c| c.address()) == Some(chip.address()))
        {
            return Err(AccountError::ChipAlreadyLinked {
                address: format_address(&chip.address()),
                account: existing.name.clone(),
            });
        }

        self.add(Account::chip(name, chip.clone()))?;
        Ok(chip)
    }

    /// Create a multisig account owned by already linked chip accounts
    pub fn create_multisig(
        &mut self,
        name: &str,
        chip_names: &[String],
        threshold: u8,
    ) -> Result<MultisigConfig, AccountError> {
        let mut chips = Vec::with_capacity(chip_names.len());
        for chip_name in chip_names {
            let account = self
                .get(chip_name)
                .ok_or_else(|| AccountError::NotFound(chip_name.clone()))?;
            let chip = account
                .as_chip()
                .ok_or_else(|| AccountError::NotAChip(chip_name.clone()))?;
            chips.push(chip.clone());
        }

        let config = MultisigConfig::new(threshold, chips)?;
        self.add(Account::multisig(name, config.clone()))?;
        Ok(config)
    }

    /// Replace a stored multisig configuration (e.g. after deployment)
    pub fn update_multisig(
        &mut self,
        name: &str,
        config: MultisigConfig,
    ) -> Result<(), AccountError> {
        let index = self
            .accounts
            .iter()
            .position(|account| account.name == name)
            .ok_or_else(|| AccountError::NotFound(name.to_string()))?;
        let slot = self.accounts[index]
            .as_multisig_mut()
            .ok_or_else(|| AccountError::NotAMultisig(name.to_string()))?;
        let previous = std::mem::replace(slot, config);

        if let Err(e) = self.save() {
            if let Some(slot) = self.accounts[index].as_multisig_mut() {
                *slot = previous;
            }
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Salt, TxHash};
    use crate::crypto::KeyPair;
    use crate::multisig::Deployment;

    fn link(store: &mut AccountStore, name: &str) -> ChipInfo {
        store
            .link_chip(name, &KeyPair::generate().public_key_hex(), 1, None)
            .unwrap()
    }

    #[test]
    fn test_failed_save_leaves_accounts_unchanged() {
        let temp_dir = tempfile::tempdir().unwrap();
        let data_dir = temp_dir.path().join("store");
        let mut store = AccountStore::open(&data_dir).unwrap();
        link(&mut store, "alice");
        let config = store.create_multisig("vault", &["alice".to_string()], 1).unwrap();

        // Writes fail once the directory is gone
        fs::remove_dir_all(&data_dir).unwrap();

        let err = store
            .link_chip("bob", &KeyPair::generate().public_key_hex(), 1, None)
            .unwrap_err();
        assert!(matches!(err, AccountError::IoError(_)));
        assert!(store.get("bob").is_none());

        assert!(store.remove("alice").is_err());
        assert_eq!(store.list()[0].name, "alice");

        let mut deployed = config.clone();
        deployed.smart_account_address = Some(Address::repeat_byte(0x11));
        assert!(store.update_multisig("vault", deployed).is_err());
        assert_eq!(store.get("vault").unwrap().as_multisig(), Some(&config));

        let names: Vec<&str> = store.list().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "vault"]);
    }

    #[test]
    fn test_open_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = AccountStore::open(temp_dir.path()).unwrap();
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_link_and_reload() {
        let temp_dir = tempfile::tempdir().unwrap();
        let chip = {
            let mut store = AccountStore::open(temp_dir.path()).unwrap();
            link(&mut store, "alice")
        };

        let store = AccountStore::open(temp_dir.path()).unwrap();
        let account = store.get("alice").unwrap();
        assert_eq!(account.as_chip(), Some(&chip));
        assert_eq!(account.address(), Some(chip.address()));
        assert!(temp_dir.path().join(ACCOUNTS_FILE).exists());
        assert!(!temp_dir.path().join("accounts.tmp").exists());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = AccountStore::open(temp_dir.path()).unwrap();
        link(&mut store, "alice");

        let err = store
            .link_chip("alice", &KeyPair::generate().public_key_hex(), 1, None)
            .unwrap_err();
        assert!(matches!(err, AccountError::AlreadyExists(_)));
    }

    #[test]
    fn test_same_chip_twice_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = AccountStore::open(temp_dir.path()).unwrap();
        let key = KeyPair::generate().public_key_hex();
        store.link_chip("alice", &key, 1, None).unwrap();

        let err = store.link_chip("alice-again", &key, 2, None).unwrap_err();
        assert!(matches!(err, AccountError::ChipAlreadyLinked { .. }));
    }

    #[test]
    fn test_create_multisig_from_chips() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = AccountStore::open(temp_dir.path()).unwrap();
        let a = link(&mut store, "alice");
        let b = link(&mut store, "bob");

        let config = store
            .create_multisig("vault", &["alice".to_string(), "bob".to_string()], 2)
            .unwrap();
        assert_eq!(config.description(), "2-of-2");
        assert_eq!(config.owners(), vec![a.address(), b.address()]);

        let account = store.get("vault").unwrap();
        assert!(account.as_chip().is_none());
        assert!(account.address().is_none());
    }

    #[test]
    fn test_create_multisig_errors() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = AccountStore::open(temp_dir.path()).unwrap();
        link(&mut store, "alice");

        let err = store
            .create_multisig("vault", &["alice".to_string(), "carol".to_string()], 1)
            .unwrap_err();
        assert!(matches!(err, AccountError::NotFound(_)));

        let err = store
            .create_multisig("vault", &["alice".to_string()], 2)
            .unwrap_err();
        assert!(matches!(err, AccountError::Multisig(_)));

        store
            .create_multisig("vault", &["alice".to_string()], 1)
            .unwrap();
        let err = store
            .create_multisig("nested", &["vault".to_string()], 1)
            .unwrap_err();
        assert!(matches!(err, AccountError::NotAChip(_)));
    }

    #[test]
    fn test_update_after_deployment() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = AccountStore::open(temp_dir.path()).unwrap();
        link(&mut store, "alice");
        let mut config = store
            .create_multisig("vault", &["alice".to_string()], 1)
            .unwrap();

        config.mark_deployed(&Deployment {
            address: Address::repeat_byte(0x33),
            tx_hash: TxHash::repeat_byte(0x44),
            predicted: Address::repeat_byte(0x33),
            salt: Salt::from_label("vault"),
        });
        store.update_multisig("vault", config).unwrap();

        let mut store = AccountStore::open(temp_dir.path()).unwrap();
        let account = store.get("vault").unwrap().clone();
        assert_eq!(account.address(), Some(Address::repeat_byte(0x33)));
        let config = account.as_multisig().unwrap().clone();
        assert!(config.deployed);

        assert!(matches!(
            store.update_multisig("alice", config),
            Err(AccountError::NotAMultisig(_))
        ));
    }

    #[test]
    fn test_remove() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = AccountStore::open(temp_dir.path()).unwrap();
        link(&mut store, "alice");

        let removed = store.remove("alice").unwrap();
        assert_eq!(removed.name, "alice");
        assert!(store.get("alice").is_none());
        assert!(matches!(store.remove("alice"), Err(AccountError::NotFound(_))));

        let store = AccountStore::open(temp_dir.path()).unwrap();
        assert!(store.list().is_empty());
    }
}
