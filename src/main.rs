use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use secp256k1::Secp256k1;

use std::path::PathBuf;

use pow_ledger::blockchain::{Address, Block, Ledger, LedgerConfig, Transaction, Wallet};

/// Key used by the demo when none is given on the command line
const DEMO_SECRET_KEY: &str = "bb08b66b7c470d92b36c050f9936b29d76166c437bebd8dee770f42a3bbad8d4";

#[derive(Parser)]
#[command(name = "pow_ledger", about = "A minimal proof-of-work ledger", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a new secp256k1 keypair
    Keygen,

    /// Sign a transfer, mine it, print balances and show tamper detection
    Demo {
        /// Hex-encoded secret key of the sender and miner
        #[arg(long, default_value = DEMO_SECRET_KEY)]
        key: String,

        /// Recipient address
        #[arg(long, default_value = "public key goes here")]
        recipient: String,

        /// Amount to transfer
        #[arg(long, default_value_t = 10)]
        amount: i64,

        /// TOML file with ledger settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured difficulty
        #[arg(long)]
        difficulty: Option<usize>,

        /// Override the configured mining reward
        #[arg(long)]
        reward: Option<i64>,
    },
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();

    match cli.command {
        Command::Keygen => keygen(),
        Command::Demo {
            key,
            recipient,
            amount,
            config,
            difficulty,
            reward,
        } => {
            let mut config = match config {
                Some(path) => LedgerConfig::from_file(&path)
                    .with_context(|| format!("loading config from {}", path.display()))?,
                None => LedgerConfig::default(),
            };
            if let Some(difficulty) = difficulty {
                config.difficulty = difficulty;
            }
            if let Some(reward) = reward {
                config.mining_reward = reward;
            }

            demo(&key, Address(recipient), amount, config)
        }
    }
}

fn keygen() -> Result<()> {
    let secp = Secp256k1::new();
    let wallet = Wallet::generate(&secp);

    println!();
    println!("Private key: {}", wallet.export_secret_hex());
    println!();
    println!("Public key: {}", wallet.address());

    Ok(())
}

fn demo(secret_key: &str, recipient: Address, amount: i64, config: LedgerConfig) -> Result<()> {
    let secp = Secp256k1::new();
    let wallet = Wallet::from_secret_hex(&secp, secret_key).context("invalid secret key")?;
    let mut ledger = Ledger::with_config(config)?;

    info!("Wallet address: {}", wallet.address());

    let mut transaction = Transaction::new(wallet.address().clone(), recipient, amount);
    transaction.sign(&secp, &wallet)?;
    ledger.submit_transaction(transaction)?;

    info!("Starting the miner...");
    let block = ledger.mine_pending_transactions(wallet.address());
    println!("Mined block {} (nonce {})", block.hash(), block.nonce());

    println!("Balance of wallet is {}", ledger.get_balance_of_address(wallet.address()));
    println!("Is chain valid? {}", ledger.is_chain_valid());

    // The ledger never hands out mutable blocks, so tamper with a serialized copy
    let tampered = tamper_with_amount(ledger.latest_block(), 1)?;
    println!(
        "Tampered copy: hash still matches? {}, signatures still valid? {}",
        tampered.hash() == tampered.calculate_hash(),
        tampered.all_transactions_valid(&secp)
    );
    if tampered.hash() == tampered.calculate_hash() {
        warn!("Tampering went unnoticed");
    }

    Ok(())
}

fn tamper_with_amount(block: &Block, amount: i64) -> Result<Block> {
    let mut value = serde_json::to_value(block)?;
    let first = value
        .get_mut("transactions")
        .and_then(|transactions| transactions.get_mut(0))
        .context("block has no transactions")?;
    first["amount"] = serde_json::json!(amount);

    Ok(serde_json::from_value(value)?)
}
