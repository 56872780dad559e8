use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use secp256k1::{Secp256k1, Verification};
use serde::{Deserialize, Serialize};

use std::sync::atomic::{AtomicBool, Ordering};

use super::crypto::sha256_hex;
use super::transaction::Transaction;

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Timestamp when the block was created
    timestamp: DateTime<Utc>,

    /// List of transactions included in this block
    transactions: Vec<Transaction>,

    /// Hash of the previous block
    previous_hash: String,

    /// Proof of work counter
    nonce: u64,

    /// Hash of the current block (calculated)
    hash: String,
}

impl Block {
    /// Creates a new block with `nonce = 0` and its tentative hash
    pub fn new(timestamp: DateTime<Utc>, transactions: Vec<Transaction>, previous_hash: String) -> Self {
        let mut block = Block {
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            hash: String::new(),
        };
        block.hash = block.calculate_hash();

        block
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Calculates the SHA-256 hash of the block's current contents
    ///
    /// Every transaction is serialized in full, signature included, so any
    /// change to a committed transfer changes the block hash.
    pub fn calculate_hash(&self) -> String {
        let block_data = serde_json::json!({
            "timestamp": self.timestamp,
            "transactions": self.transactions,
            "previous_hash": self.previous_hash,
            "nonce": self.nonce,
        });

        sha256_hex(block_data.to_string().as_bytes())
    }

    /// Whether the stored hash has at least `difficulty` leading zero hex digits
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.hash.len() >= difficulty && self.hash.bytes().take(difficulty).all(|b| b == b'0')
    }

    /// Searches for a nonce whose hash meets `difficulty`. Blocks until found.
    pub fn mine(&mut self, difficulty: usize) {
        let never = AtomicBool::new(false);
        self.mine_cancellable(difficulty, &never);
    }

    /// Same search as [`Block::mine`], but gives up once `cancel` is set.
    ///
    /// Returns `true` if the block was sealed, `false` if the search was
    /// cancelled. A cancelled block keeps whatever nonce it reached.
    pub fn mine_cancellable(&mut self, difficulty: usize, cancel: &AtomicBool) -> bool {
        while !self.meets_difficulty(difficulty) {
            if cancel.load(Ordering::Relaxed) {
                warn!("Mining cancelled at nonce {}", self.nonce);
                return false;
            }

            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.calculate_hash();
        }

        info!("Block mined: {} (nonce {})", self.hash, self.nonce);
        true
    }

    /// Checks that every transaction in the block verifies
    pub fn all_transactions_valid<C: Verification>(&self, secp: &Secp256k1<C>) -> bool {
        self.transactions.iter().all(|transaction| match transaction.verify(secp) {
            Ok(valid) => valid,
            Err(err) => {
                debug!("Transaction {} failed verification: {}", transaction.digest(), err);
                false
            }
        })
    }

    #[cfg(test)]
    pub(crate) fn transactions_mut(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }

    #[cfg(test)]
    pub(crate) fn set_previous_hash(&mut self, previous_hash: String) {
        self.previous_hash = previous_hash;
    }

    #[cfg(test)]
    pub(crate) fn set_hash(&mut self, hash: String) {
        self.hash = hash;
    }
}
