use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use secp256k1::{Secp256k1, VerifyOnly};
use thiserror::Error;

use std::sync::atomic::AtomicBool;

use super::block::Block;
use super::config::{ConfigError, LedgerConfig};
use super::crypto::Address;
use super::transaction::{Transaction, TransactionError};

/// Seconds since the epoch of the fixed genesis timestamp (2022-07-21)
const GENESIS_TIMESTAMP: i64 = 1_658_361_600;

/// `previous_hash` of the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Transaction must include from and to addresses")]
    MissingAddress,

    #[error("Cannot add invalid transactions to chain")]
    InvalidTransaction,

    #[error("Invalid amount: {0} (must be positive)")]
    InvalidAmount(i64),

    #[error("Pending transaction pool is full ({capacity} transactions)")]
    PendingPoolFull { capacity: usize },

    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Config error: {0}")]
    ConfigError(#[from] ConfigError),
}

/// The first integrity check a block failed during chain validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainViolation {
    #[error("Block {index} contains an invalid transaction")]
    InvalidTransactions { index: usize },

    #[error("Block {index} has a stale hash")]
    StaleHash { index: usize },

    #[error("Block {index} does not link to the hash of its predecessor")]
    BrokenLink { index: usize },
}

/// Append-only chain of blocks plus the queue of transactions waiting to be mined
#[derive(Debug, Clone)]
pub struct Ledger {
    /// The chain of blocks, genesis at index 0
    chain: Vec<Block>,

    /// Pending transactions to be included in the next block
    pending_transactions: Vec<Transaction>,

    config: LedgerConfig,

    /// Context used for every signature check
    secp: Secp256k1<VerifyOnly>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Creates a ledger with the default configuration
    pub fn new() -> Self {
        Self::build(LedgerConfig::default())
    }

    /// Creates a ledger after validating `config`
    pub fn with_config(config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: LedgerConfig) -> Self {
        Ledger {
            chain: vec![Self::genesis_block()],
            pending_transactions: Vec::new(),
            config,
            secp: Secp256k1::verification_only(),
        }
    }

    /// The fixed first block: no transactions, previous hash `"0"`
    pub fn genesis_block() -> Block {
        let timestamp = DateTime::<Utc>::from_timestamp(GENESIS_TIMESTAMP, 0).unwrap_or_default();
        Block::new(timestamp, Vec::new(), GENESIS_PREVIOUS_HASH.to_string())
    }

    /// Gets the last block in the chain
    pub fn latest_block(&self) -> &Block {
        // The genesis block is never removed
        &self.chain[self.chain.len() - 1]
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn difficulty(&self) -> usize {
        self.config.difficulty
    }

    pub fn mining_reward(&self) -> i64 {
        self.config.mining_reward
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Queues a signed transfer for the next block
    pub fn submit_transaction(&mut self, transaction: Transaction) -> Result<(), LedgerError> {
        let has_sender = transaction.sender().is_some_and(|sender| !sender.is_empty());
        if !has_sender || transaction.recipient().is_empty() {
            return Err(LedgerError::MissingAddress);
        }

        if transaction.amount() <= 0 {
            return Err(LedgerError::InvalidAmount(transaction.amount()));
        }

        if self.pending_transactions.len() >= self.config.max_pending {
            return Err(LedgerError::PendingPoolFull {
                capacity: self.config.max_pending,
            });
        }

        if !transaction.verify(&self.secp)? {
            warn!("Rejected transaction {}: signature does not match sender", transaction.digest());
            return Err(LedgerError::InvalidTransaction);
        }

        debug!(
            "Accepted transaction {} ({} pending)",
            transaction.digest(),
            self.pending_transactions.len() + 1
        );
        self.pending_transactions.push(transaction);

        Ok(())
    }

    /// Mines every pending transaction plus a reward into a new block.
    ///
    /// Blocks the calling thread until the proof of work is found.
    pub fn mine_pending_transactions(&mut self, reward_address: &Address) -> &Block {
        let mut block = self.candidate_block(reward_address);
        block.mine(self.config.difficulty);

        self.append_block(block, reward_address)
    }

    /// Like [`Ledger::mine_pending_transactions`], but stops when `cancel` is set.
    ///
    /// Returns `None` on cancellation; the chain and the pending queue are
    /// then left exactly as they were.
    pub fn mine_pending_transactions_cancellable(
        &mut self,
        reward_address: &Address,
        cancel: &AtomicBool,
    ) -> Option<&Block> {
        let mut block = self.candidate_block(reward_address);

        if !block.mine_cancellable(self.config.difficulty, cancel) {
            info!("Mining aborted, {} transactions stay pending", self.pending_transactions.len());
            return None;
        }

        Some(self.append_block(block, reward_address))
    }

    fn candidate_block(&self, reward_address: &Address) -> Block {
        let mut transactions = self.pending_transactions.clone();
        transactions.push(Transaction::new_reward(reward_address.clone(), self.config.mining_reward));

        Block::new(Utc::now(), transactions, self.latest_block().hash().to_string())
    }

    fn append_block(&mut self, block: Block, reward_address: &Address) -> &Block {
        info!(
            "Block {} successfully mined with {} transactions",
            self.chain.len(),
            block.transactions().len()
        );
        self.chain.push(block);

        self.pending_transactions.clear();
        if self.config.preseed_reward {
            self.pending_transactions
                .push(Transaction::new_reward(reward_address.clone(), self.config.mining_reward));
        }

        self.latest_block()
    }

    /// Net amount received by `address` across every block in the chain
    pub fn get_balance_of_address(&self, address: &Address) -> i64 {
        let mut balance: i64 = 0;

        for block in &self.chain {
            for transaction in block.transactions() {
                if transaction.sender() == Some(address) {
                    balance = balance.saturating_sub(transaction.amount());
                }

                if transaction.recipient() == address {
                    balance = balance.saturating_add(transaction.amount());
                }
            }
        }

        balance
    }

    /// Checks every block after genesis, reporting the first failed check
    pub fn verify_chain(&self) -> Result<(), ChainViolation> {
        for (offset, pair) in self.chain.windows(2).enumerate() {
            let (previous_block, current_block) = (&pair[0], &pair[1]);
            let index = offset + 1;

            if !current_block.all_transactions_valid(&self.secp) {
                return Err(ChainViolation::InvalidTransactions { index });
            }

            if current_block.hash() != current_block.calculate_hash() {
                return Err(ChainViolation::StaleHash { index });
            }

            if current_block.previous_hash() != previous_block.hash() {
                return Err(ChainViolation::BrokenLink { index });
            }
        }

        Ok(())
    }

    /// Validates the blockchain
    pub fn is_chain_valid(&self) -> bool {
        match self.verify_chain() {
            Ok(()) => true,
            Err(violation) => {
                warn!("Chain is invalid: {}", violation);
                false
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn block_mut(&mut self, index: usize) -> &mut Block {
        &mut self.chain[index]
    }
}
