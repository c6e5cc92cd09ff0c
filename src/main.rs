//! HaLo Multisig CLI Application
//!
//! A command-line interface for chip-backed multisig accounts.

use clap::{Parser, Subcommand};
use halo_multisig::cli::{self, AppState};
use halo_multisig::config::{Config, CONFIG_FILE};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "halo-multisig")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Multisig coordination for chip-backed accounts", long_about = None)]
struct Cli {
    /// Data directory for accounts and config
    #[arg(short, long, default_value = ".halo_multisig")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict the address a factory will deploy a multisig at
    Address {
        /// Factory address (defaults to the configured factory)
        #[arg(short, long)]
        factory: Option<String>,

        /// Owner addresses (comma-separated)
        #[arg(short, long)]
        owners: String,

        /// Confirmations required
        #[arg(short, long)]
        threshold: u64,

        /// Salt: 32-byte hex, or a label hashed with keccak256
        #[arg(short, long)]
        salt: String,

        /// Override the multisig init code hash
        #[arg(long)]
        init_code_hash: Option<String>,
    },

    /// Account operations
    Account {
        #[command(subcommand)]
        action: AccountCommands,
    },

    /// Deploy and spend from a multisig on an in-process chain
    Demo {
        /// Number of owner chips
        #[arg(short, long, default_value = "2")]
        owners: usize,

        /// Confirmations required
        #[arg(short, long, default_value = "2")]
        threshold: u8,

        /// Amount to send in wei, decimal or 0x hex (default: a quarter of the funding)
        #[arg(short, long)]
        value: Option<String>,

        /// Call data to attach, hex
        #[arg(long)]
        data: Option<String>,
    },

    /// Configuration operations
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Link a chip by the public key it reports
    Link {
        /// Account name
        #[arg(short, long)]
        name: String,

        /// Chip public key (hex)
        #[arg(short, long)]
        public_key: String,

        /// Key slot on the chip
        #[arg(short, long, default_value = "1")]
        slot: u8,

        /// Optional label
        #[arg(short, long)]
        label: Option<String>,
    },

    /// List all accounts
    List,

    /// Create a multisig account from linked chips
    Multisig {
        /// Account name
        #[arg(short, long)]
        name: String,

        /// Chip account names (comma-separated)
        #[arg(short, long)]
        chips: String,

        /// Confirmations required
        #[arg(short, long)]
        threshold: u8,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Handle config init separately (doesn't need full state)
    if let Commands::Config {
        action: ConfigCommands::Init { force },
    } = &cli.command
    {
        return cli::cmd_config_init(&cli.data_dir, *force);
    }

    // Demo runs on a tokio runtime against its own chain
    if let Commands::Demo {
        owners,
        threshold,
        value,
        data,
    } = &cli.command
    {
        let config = Config::load_or_default(&cli.data_dir.join(CONFIG_FILE))?;
        let rt = tokio::runtime::Runtime::new()?;
        return rt.block_on(cli::cmd_demo(
            &config,
            *owners,
            *threshold,
            value.as_deref(),
            data.as_deref(),
        ));
    }

    // Initialize application state
    let mut state = AppState::new(cli.data_dir.clone())?;

    // Process commands
    match cli.command {
        Commands::Config { .. } => unreachable!(),
        Commands::Demo { .. } => unreachable!(),

        Commands::Address {
            factory,
            owners,
            threshold,
            salt,
            init_code_hash,
        } => {
            cli::cmd_address(
                &state,
                factory.as_deref(),
                &owners,
                threshold,
                &salt,
                init_code_hash.as_deref(),
            )?;
        }

        Commands::Account { action } => match action {
            AccountCommands::Link {
                name,
                public_key,
                slot,
                label,
            } => {
                cli::cmd_account_link(&mut state, &name, &public_key, slot, label)?;
            }
            AccountCommands::List => {
                cli::cmd_account_list(&state)?;
            }
            AccountCommands::Multisig {
                name,
                chips,
                threshold,
            } => {
                cli::cmd_account_multisig(&mut state, &name, &chips, threshold)?;
            }
        },
    }

    Ok(())
}
