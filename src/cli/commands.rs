//! CLI commands for the multisig wallet
//!
//! Implements all command handlers for the CLI interface.

use crate::account::{AccountKind, AccountStore, ChipInfo};
use crate::config::{Config, CONFIG_FILE};
use crate::core::{
    format_address, format_hash, format_hex_bytes, parse_address, parse_amount, parse_hash,
    parse_hex_bytes, Address, Salt, U256,
};
use crate::multisig::{
    check_deployment, compute_address, FactoryClient, MultisigConfig, TransactionCoordinator,
};
use crate::provider::{LocalChain, LocalSigner, TxSigner};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Application state
pub struct AppState {
    pub config: Config,
    pub accounts: AccountStore,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load config and accounts from `data_dir`
    pub fn new(data_dir: PathBuf) -> CliResult<Self> {
        let config = Config::load_or_default(&data_dir.join(CONFIG_FILE))?;
        let accounts = AccountStore::open(&data_dir)?;

        Ok(Self {
            config,
            accounts,
            data_dir,
        })
    }
}

/// Split a comma-separated list, dropping empty entries
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_owners(value: &str) -> CliResult<Vec<Address>> {
    let mut owners = Vec::new();
    for owner in split_list(value) {
        owners.push(parse_address(&owner)?);
    }
    Ok(owners)
}

/// Write a default config file
pub fn cmd_config_init(data_dir: &Path, force: bool) -> CliResult<()> {
    let path = data_dir.join(CONFIG_FILE);

    if path.exists() && !force {
        println!("⚠️  Config already exists at {:?}", path);
        println!("   Use --force to overwrite it");
        return Ok(());
    }

    let config = Config {
        data_dir: data_dir.to_path_buf(),
        ..Config::default()
    };
    config.save(&path)?;

    println!("✅ Config written!");
    println!("   📁 Path: {:?}", path);
    println!("   ⏱️  RPC timeout: {}ms", config.coordinator.rpc_timeout_ms);
    println!(
        "   🔁 Confirmation mode: {}",
        config.coordinator.confirmation_mode
    );

    Ok(())
}

/// Predict a multisig address
pub fn cmd_address(
    state: &AppState,
    factory: Option<&str>,
    owners: &str,
    threshold: u64,
    salt: &str,
    init_code_hash: Option<&str>,
) -> CliResult<()> {
    let factory = match factory {
        Some(factory) => parse_address(factory)?,
        None => state
            .config
            .factory
            .address
            .ok_or("no factory address: pass --factory or set factory.address in the config")?,
    };
    let init_code_hash = match init_code_hash {
        Some(hash) => parse_hash(hash)?,
        None => state.config.factory.init_code_hash,
    };
    let owners = parse_owners(owners)?;
    let salt = Salt::parse(salt);

    let address = compute_address(factory, &owners, threshold, &salt, init_code_hash)?;

    println!("🔐 {}-of-{} multisig", threshold, owners.len());
    println!("   ├─ Factory: {}", format_address(&factory));
    println!("   ├─ Salt: {}", salt);
    println!("   └─ Address: {}", format_address(&address));

    Ok(())
}

/// Link a chip by its public key
pub fn cmd_account_link(
    state: &mut AppState,
    name: &str,
    public_key: &str,
    slot: u8,
    label: Option<String>,
) -> CliResult<()> {
    let chip = state.accounts.link_chip(name, public_key, slot, label)?;

    println!("✅ Chip linked!");
    println!("   📛 Account: {}", name);
    println!("   📬 Address: {}", format_address(&chip.address()));
    println!("   🔑 Slot: {}", chip.slot());

    Ok(())
}

/// List accounts
pub fn cmd_account_list(state: &AppState) -> CliResult<()> {
    let accounts = state.accounts.list();

    if accounts.is_empty() {
        println!("📭 No accounts found. Link a chip with: account link");
        return Ok(());
    }

    println!("📋 Accounts ({}):", accounts.len());
    for account in accounts {
        println!("   {:<16} {}", account.name, account.summary());
        if let AccountKind::Multisig(config) = &account.kind {
            for chip in &config.chips {
                println!("   {:<16}   └─ {}", "", chip.display_name());
            }
        }
    }

    Ok(())
}

/// Create a multisig account from linked chips
pub fn cmd_account_multisig(
    state: &mut AppState,
    name: &str,
    chips: &str,
    threshold: u8,
) -> CliResult<()> {
    let chip_names = split_list(chips);
    let config = state.accounts.create_multisig(name, &chip_names, threshold)?;

    println!("✅ Multisig account created!");
    println!("   📛 Account: {}", name);
    println!("   🔐 Policy: {}", config.description());

    if let Some(factory) = state.config.factory.address {
        let salt = Salt::from_label(name);
        let predicted =
            config.predict_address(factory, &salt, state.config.factory.init_code_hash)?;
        println!(
            "   🔮 Predicted address (salt \"{}\"): {}",
            name,
            format_address(&predicted)
        );
    }

    Ok(())
}

/// Wei credited to the multisig before the demo transfer
const DEMO_FUNDING: u64 = 1_000_000;

/// Run deploy, status check and a threshold transfer against an in-process chain.
///
/// `value` (wei, decimal or hex) defaults to a quarter of the funding;
/// `data` is hex call data attached to the transfer.
pub async fn cmd_demo(
    config: &Config,
    owner_count: usize,
    threshold: u8,
    value: Option<&str>,
    data: Option<&str>,
) -> CliResult<()> {
    // Chip slots are numbered 1..=255
    if owner_count > u8::MAX as usize {
        return Err(format!(
            "at most {} owners are supported, got {}",
            u8::MAX,
            owner_count
        )
        .into());
    }
    let amount = U256::from(DEMO_FUNDING);
    let value = match value {
        Some(value) => parse_amount(value)?,
        None => amount / 4,
    };
    let data = match data {
        Some(data) => parse_hex_bytes(data)?,
        None => Vec::new(),
    };

    let chain = LocalChain::new();
    let signers: Vec<Arc<LocalSigner>> = (0..owner_count)
        .map(|_| Arc::new(LocalSigner::random()))
        .collect();

    let mut chips = Vec::with_capacity(signers.len());
    for (index, signer) in signers.iter().enumerate() {
        let slot = u8::try_from(index + 1)?;
        chips.push(ChipInfo::from_public_key(
            &signer.public_key_hex(),
            slot,
            Some(format!("chip-{}", slot)),
        )?);
    }
    let mut account = MultisigConfig::new(threshold, chips)?;

    println!("🧪 Local chain demo: {}", account.description());
    for chip in &account.chips {
        println!(
            "   ├─ {} {}",
            chip.display_name(),
            format_address(&chip.address())
        );
    }

    // Deploy
    let factory =
        FactoryClient::from_config(chain.factory_address(), &config.factory, &config.coordinator);
    let salt = Salt::from_time();
    let predicted = factory.predict_address(&account.owners(), threshold as u64, &salt)?;

    println!("\n🔮 Predicted address: {}", format_address(&predicted));
    println!(
        "   Status before deploy: {}",
        check_deployment(&chain, predicted).await
    );

    let deployment = factory
        .deploy(
            &chain,
            signers[0].as_ref(),
            &account.owners(),
            threshold as u64,
            &salt,
        )
        .await?;
    account.mark_deployed(&deployment);

    println!("🚀 Deployed at {}", format_address(&deployment.address));
    println!("   ├─ Tx: {}", format_hash(&deployment.tx_hash));
    println!(
        "   └─ Status after deploy: {}",
        check_deployment(&chain, deployment.address).await
    );

    // Fund and spend
    chain.fund(deployment.address, amount);
    let recipient = LocalSigner::random().address();

    let dyn_signers: Vec<Arc<dyn TxSigner>> = signers
        .iter()
        .map(|signer| signer.clone() as Arc<dyn TxSigner>)
        .collect();
    let coordinator = TransactionCoordinator::new(&config.coordinator);

    println!(
        "\n💸 Sending {} to {} ({} confirmations, {})",
        value,
        format_address(&recipient),
        threshold,
        coordinator.mode()
    );
    if !data.is_empty() {
        println!("   Data: {}", format_hex_bytes(&data));
    }
    let tx_hash = coordinator
        .execute(
            &chain,
            deployment.address,
            &dyn_signers,
            recipient,
            value,
            &data,
            threshold as u64,
        )
        .await?;

    let pending = coordinator
        .transaction(&chain, deployment.address, U256::zero())
        .await?;

    println!("✅ Executed in tx {}", format_hash(&tx_hash));
    println!("   ├─ Confirmations: {}", pending.confirmations);
    println!("   ├─ Executed: {}", pending.executed);
    println!(
        "   ├─ Recipient balance: {}",
        chain.balance_of(recipient)
    );
    println!(
        "   ├─ Multisig balance: {}",
        chain.balance_of(deployment.address)
    );
    println!("   └─ Blocks mined: {}", chain.block_number());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn test_parse_owners_rejects_garbage() {
        assert!(parse_owners("0x1234").is_err());
        assert_eq!(
            parse_owners("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA1").unwrap().len(),
            1
        );
    }

    #[test]
    fn test_account_commands() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut state = AppState::new(temp_dir.path().to_path_buf()).unwrap();

        let a = crate::crypto::KeyPair::generate().public_key_hex();
        let b = crate::crypto::KeyPair::generate().public_key_hex();
        cmd_account_link(&mut state, "alice", &a, 1, None).unwrap();
        cmd_account_link(&mut state, "bob", &b, 1, None).unwrap();
        cmd_account_multisig(&mut state, "vault", "alice,bob", 2).unwrap();
        cmd_account_list(&state).unwrap();

        assert_eq!(state.accounts.list().len(), 3);
        assert!(cmd_account_multisig(&mut state, "bad", "alice,bob", 3).is_err());
    }

    #[test]
    fn test_config_init_and_address() {
        let temp_dir = tempfile::tempdir().unwrap();
        cmd_config_init(temp_dir.path(), false).unwrap();
        assert!(temp_dir.path().join(CONFIG_FILE).exists());

        let state = AppState::new(temp_dir.path().to_path_buf()).unwrap();
        let owners = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA1,0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB2";

        // No factory configured
        assert!(cmd_address(&state, None, owners, 2, "vault", None).is_err());
        cmd_address(
            &state,
            Some("0xfafafafafafafafafafafafafafafafafafafafa"),
            owners,
            2,
            "vault",
            None,
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_demo_runs() {
        let mut config = Config::default();
        config.coordinator.poll_interval_ms = 1;
        cmd_demo(&config, 3, 2, None, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_demo_with_value_and_data() {
        let mut config = Config::default();
        config.coordinator.poll_interval_ms = 1;
        cmd_demo(&config, 2, 1, Some("0X2710"), Some("0xdeadbeef"))
            .await
            .unwrap();

        assert!(cmd_demo(&config, 2, 1, Some("lots"), None).await.is_err());
        assert!(cmd_demo(&config, 2, 1, None, Some("0xabc")).await.is_err());
    }

    #[tokio::test]
    async fn test_demo_rejects_too_many_owners() {
        let config = Config::default();
        let err = cmd_demo(&config, 256, 2, None, None).await.unwrap_err();
        assert!(err.to_string().contains("at most 255 owners"));
    }
}
