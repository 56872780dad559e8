//! A minimal single-process ledger: signed transfers sealed into
//! proof-of-work blocks, with whole-chain integrity validation.

pub mod blockchain;
