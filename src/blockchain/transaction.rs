use secp256k1::{Secp256k1, Signing, Verification};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::crypto::{verify_signature, Address, CryptoError, DigitalSignature, Wallet};

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Cannot sign transactions for other wallets: key belongs to {signer}")]
    Authorization { signer: Address },

    #[error("No signature in this transaction")]
    MissingSignature,

    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

/// A transfer of `amount` from `sender` to `recipient`.
///
/// A transaction without a sender is a mining reward: it is issued by the
/// ledger itself and carries no signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender's address, `None` for mining rewards
    sender: Option<Address>,

    /// Recipient's address
    recipient: Address,

    /// Amount being transferred
    amount: i64,

    /// DER signature over the transaction digest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<DigitalSignature>,
}

impl Transaction {
    /// Creates a new unsigned transaction. No validation happens here.
    pub fn new(sender: Address, recipient: Address, amount: i64) -> Self {
        Transaction {
            sender: Some(sender),
            recipient,
            amount,
            signature: None,
        }
    }

    /// Creates a mining reward paid to `recipient`
    pub fn new_reward(recipient: Address, amount: i64) -> Self {
        Transaction {
            sender: None,
            recipient,
            amount,
            signature: None,
        }
    }

    pub fn sender(&self) -> Option<&Address> {
        self.sender.as_ref()
    }

    pub fn recipient(&self) -> &Address {
        &self.recipient
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn signature(&self) -> Option<&DigitalSignature> {
        self.signature.as_ref()
    }

    /// Checks if the transaction is a mining reward
    pub fn is_reward(&self) -> bool {
        self.sender.is_none()
    }

    /// SHA-256 over sender, recipient and amount, as raw bytes
    pub fn digest_bytes(&self) -> [u8; 32] {
        let data = serde_json::json!({
            "sender": self.sender,
            "recipient": self.recipient,
            "amount": self.amount,
        });

        Sha256::digest(data.to_string().as_bytes()).into()
    }

    /// SHA-256 over sender, recipient and amount, as lower-case hex
    pub fn digest(&self) -> String {
        hex::encode(self.digest_bytes())
    }

    /// Signs the transaction with a wallet.
    ///
    /// Fails without touching the transaction if the wallet does not own the
    /// sender address. Signing again replaces the previous signature.
    pub fn sign<C: Signing>(
        &mut self,
        secp: &Secp256k1<C>,
        wallet: &Wallet,
    ) -> Result<(), TransactionError> {
        if self.sender.as_ref() != Some(wallet.address()) {
            return Err(TransactionError::Authorization {
                signer: wallet.address().clone(),
            });
        }

        let signature = wallet.sign_digest(secp, &self.digest_bytes())?;
        self.signature = Some(signature);

        Ok(())
    }

    /// Verifies the transaction's signature against its sender.
    ///
    /// Rewards always verify. Returns `MissingSignature` for unsigned
    /// transfers and `Ok(false)` when the signature does not match.
    pub fn verify<C: Verification>(&self, secp: &Secp256k1<C>) -> Result<bool, TransactionError> {
        let sender = match &self.sender {
            Some(sender) => sender,
            None => return Ok(true),
        };

        let signature = match &self.signature {
            Some(sig) if !sig.is_empty() => sig,
            _ => return Err(TransactionError::MissingSignature),
        };

        verify_signature(secp, sender, &self.digest_bytes(), signature).map_err(TransactionError::from)
    }

    #[cfg(test)]
    pub(crate) fn set_amount(&mut self, amount: i64) {
        self.amount = amount;
    }

    #[cfg(test)]
    pub(crate) fn set_recipient(&mut self, recipient: Address) {
        self.recipient = recipient;
    }

    #[cfg(test)]
    pub(crate) fn set_sender(&mut self, sender: Option<Address>) {
        self.sender = sender;
    }

    #[cfg(test)]
    pub(crate) fn set_signature(&mut self, signature: Option<DigitalSignature>) {
        self.signature = signature;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_transfer(secp: &Secp256k1<secp256k1::All>, amount: i64) -> (Wallet, Transaction) {
        let sender = Wallet::generate(secp);
        let recipient = Wallet::generate(secp);

        let mut transaction = Transaction::new(sender.address().clone(), recipient.address().clone(), amount);
        transaction.sign(secp, &sender).unwrap();

        (sender, transaction)
    }

    #[test]
    fn test_new_transaction() {
        let transaction = Transaction::new(Address::from("alice"), Address::from("bob"), 10);

        assert_eq!(transaction.sender(), Some(&Address::from("alice")));
        assert_eq!(transaction.recipient(), &Address::from("bob"));
        assert_eq!(transaction.amount(), 10);
        assert!(transaction.signature().is_none());
        assert!(!transaction.is_reward());
    }

    #[test]
    fn test_digest_is_deterministic() {
        let first = Transaction::new(Address::from("alice"), Address::from("bob"), 10);
        let second = Transaction::new(Address::from("alice"), Address::from("bob"), 10);

        assert_eq!(first.digest(), second.digest());
        assert_eq!(first.digest().len(), 64);
        assert!(first.digest().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_digest_has_no_concatenation_ambiguity() {
        let first = Transaction::new(Address::from("ab"), Address::from("c"), 1);
        let second = Transaction::new(Address::from("a"), Address::from("bc"), 1);

        assert_ne!(first.digest(), second.digest());
    }

    #[test]
    fn test_digest_ignores_signature() {
        let secp = Secp256k1::new();
        let sender = Wallet::generate(&secp);
        let mut transaction = Transaction::new(sender.address().clone(), Address::from("bob"), 5);

        let before = transaction.digest();
        transaction.sign(&secp, &sender).unwrap();

        assert_eq!(before, transaction.digest());
    }

    #[test]
    fn test_sign_and_verify() {
        let secp = Secp256k1::new();
        let (_, transaction) = signed_transfer(&secp, 10);

        assert!(transaction.signature().is_some());
        assert!(transaction.verify(&secp).unwrap());
    }

    #[test]
    fn test_sign_with_foreign_wallet_fails_without_mutation() {
        let secp = Secp256k1::new();
        let owner = Wallet::generate(&secp);
        let thief = Wallet::generate(&secp);
        let mut transaction = Transaction::new(owner.address().clone(), thief.address().clone(), 10);

        let result = transaction.sign(&secp, &thief);

        assert!(matches!(result, Err(TransactionError::Authorization { .. })));
        assert!(transaction.signature().is_none());
    }

    #[test]
    fn test_resign_overwrites_signature() {
        let secp = Secp256k1::new();
        let (sender, mut transaction) = signed_transfer(&secp, 10);

        transaction.set_signature(Some(DigitalSignature("3000".to_string())));
        transaction.sign(&secp, &sender).unwrap();

        assert!(transaction.verify(&secp).unwrap());
    }

    #[test]
    fn test_unsigned_transfer_reports_missing_signature() {
        let secp = Secp256k1::new();
        let sender = Wallet::generate(&secp);
        let mut transaction = Transaction::new(sender.address().clone(), Address::from("bob"), 10);

        assert!(matches!(transaction.verify(&secp), Err(TransactionError::MissingSignature)));

        transaction.set_signature(Some(DigitalSignature(String::new())));
        assert!(matches!(transaction.verify(&secp), Err(TransactionError::MissingSignature)));
    }

    #[test]
    fn test_tampering_after_signing_fails_verification() {
        let secp = Secp256k1::new();

        let (_, mut amount_changed) = signed_transfer(&secp, 10);
        amount_changed.set_amount(1);
        assert!(!amount_changed.verify(&secp).unwrap());

        let (_, mut recipient_changed) = signed_transfer(&secp, 10);
        recipient_changed.set_recipient(Wallet::generate(&secp).address().clone());
        assert!(!recipient_changed.verify(&secp).unwrap());

        let (_, mut sender_changed) = signed_transfer(&secp, 10);
        sender_changed.set_sender(Some(Wallet::generate(&secp).address().clone()));
        assert!(!sender_changed.verify(&secp).unwrap());
    }

    #[test]
    fn test_reward_always_verifies() {
        let secp = Secp256k1::verification_only();
        let mut reward = Transaction::new_reward(Address::from("miner"), 100);

        assert!(reward.is_reward());
        assert!(reward.verify(&secp).unwrap());

        reward.set_signature(Some(DigitalSignature("garbage".to_string())));
        assert!(reward.verify(&secp).unwrap());
    }

    #[test]
    fn test_reward_cannot_be_signed() {
        let secp = Secp256k1::new();
        let wallet = Wallet::generate(&secp);
        let mut reward = Transaction::new_reward(wallet.address().clone(), 100);

        assert!(matches!(
            reward.sign(&secp, &wallet),
            Err(TransactionError::Authorization { .. })
        ));
    }

    #[test]
    fn test_sender_that_is_not_a_key_is_an_error() {
        let secp = Secp256k1::new();
        let mut transaction = Transaction::new(Address::from("alice"), Address::from("bob"), 10);
        transaction.set_signature(Some(DigitalSignature("3006020101020101".to_string())));

        assert!(matches!(transaction.verify(&secp), Err(TransactionError::CryptoError(_))));
    }
}
