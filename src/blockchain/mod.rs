// Blockchain module
//
// This module contains the core ledger implementation including:
// - Signed transactions
// - Proof-of-work blocks
// - The ledger and its chain validation
// - secp256k1 keys and signatures
// - Ledger configuration

pub mod block;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod transaction;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{ChainViolation, Ledger, LedgerError};
pub use config::LedgerConfig;
pub use crypto::{Address, DigitalSignature, Wallet};
pub use transaction::{Transaction, TransactionError};
