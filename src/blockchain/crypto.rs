use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey, Signing, Verification};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use std::fmt;
use std::str::FromStr;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid digest: {0}")]
    InvalidDigest(String),

    #[error("Decoding error: {0}")]
    DecodingError(#[from] hex::FromHexError),
}

/// Hashes `data` with SHA-256 and renders the result as lower-case hex
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Represents a wallet address (uncompressed secp256k1 public key in hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Creates a new address from a public key
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        Address(hex::encode(public_key.serialize_uncompressed()))
    }

    /// Converts the address back to a public key
    pub fn to_public_key(&self) -> Result<PublicKey, CryptoError> {
        let bytes = hex::decode(&self.0)?;
        PublicKey::from_slice(&bytes).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Only accept strings that decode to a real public key
        let address = Address(s.to_string());
        address.to_public_key()?;
        Ok(address)
    }
}

/// Represents a DER-encoded ECDSA signature in hex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalSignature(pub String);

impl DigitalSignature {
    /// Creates a new digital signature from a signature
    pub fn from_signature(signature: &Signature) -> Self {
        DigitalSignature(hex::encode(&*signature.serialize_der()))
    }

    /// Converts the digital signature to a signature
    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        let bytes = hex::decode(&self.0)?;
        Signature::from_der(&bytes).map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A secp256k1 keypair together with the address it controls
#[derive(Debug, Clone)]
pub struct Wallet {
    secret_key: SecretKey,
    public_key: PublicKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn generate<C: Signing>(secp: &Secp256k1<C>) -> Self {
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self::from_parts(secret_key, public_key)
    }

    /// Creates a wallet from a hex-encoded secret key
    pub fn from_secret_hex<C: Signing>(secp: &Secp256k1<C>, secret_hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(secret_hex.trim())?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        let public_key = PublicKey::from_secret_key(secp, &secret_key);

        Ok(Self::from_parts(secret_key, public_key))
    }

    fn from_parts(secret_key: SecretKey, public_key: PublicKey) -> Self {
        Wallet {
            secret_key,
            public_key,
            address: Address::from_public_key(&public_key),
        }
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Signs a 32-byte digest with the wallet's secret key
    pub fn sign_digest<C: Signing>(
        &self,
        secp: &Secp256k1<C>,
        digest: &[u8],
    ) -> Result<DigitalSignature, CryptoError> {
        let message = Message::from_digest_slice(digest)
            .map_err(|e| CryptoError::InvalidDigest(e.to_string()))?;
        let signature = secp.sign_ecdsa(&message, &self.secret_key);

        Ok(DigitalSignature::from_signature(&signature))
    }

    /// Exports the wallet's secret key as hex
    pub fn export_secret_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }
}

/// Verifies a signature over a 32-byte digest for the given address
pub fn verify_signature<C: Verification>(
    secp: &Secp256k1<C>,
    address: &Address,
    digest: &[u8],
    signature: &DigitalSignature,
) -> Result<bool, CryptoError> {
    let public_key = address.to_public_key()?;
    let signature = signature.to_signature()?;
    let message = Message::from_digest_slice(digest)
        .map_err(|e| CryptoError::InvalidDigest(e.to_string()))?;

    Ok(secp.verify_ecdsa(&message, &signature, &public_key).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO_KEY: &str = "bb08b66b7c470d92b36c050f9936b29d76166c437bebd8dee770f42a3bbad8d4";

    #[test]
    fn test_wallet_generation() {
        let secp = Secp256k1::new();
        let wallet = Wallet::generate(&secp);

        assert_eq!(wallet.address().as_str().len(), 130);
        assert!(wallet.address().as_str().starts_with("04"));
    }

    #[test]
    fn test_wallet_from_secret_is_deterministic() {
        let secp = Secp256k1::new();
        let first = Wallet::from_secret_hex(&secp, DEMO_KEY).unwrap();
        let second = Wallet::from_secret_hex(&secp, DEMO_KEY).unwrap();

        assert_eq!(first.address(), second.address());
        assert_eq!(first.export_secret_hex(), DEMO_KEY);
    }

    #[test]
    fn test_invalid_secret_rejected() {
        let secp = Secp256k1::new();
        assert!(Wallet::from_secret_hex(&secp, "zz").is_err());
        assert!(Wallet::from_secret_hex(&secp, "00").is_err());
    }

    #[test]
    fn test_signing_and_verification() {
        let secp = Secp256k1::new();
        let wallet = Wallet::generate(&secp);
        let digest = Sha256::digest(b"Hello, world!");

        let signature = wallet.sign_digest(&secp, &digest).unwrap();
        assert!(verify_signature(&secp, wallet.address(), &digest, &signature).unwrap());

        let wrong = Sha256::digest(b"Wrong message");
        assert!(!verify_signature(&secp, wallet.address(), &wrong, &signature).unwrap());

        let other = Wallet::generate(&secp);
        assert!(!verify_signature(&secp, other.address(), &digest, &signature).unwrap());
    }

    #[test]
    fn test_address_conversion() {
        let secp = Secp256k1::new();
        let wallet = Wallet::generate(&secp);

        let public_key = wallet.address().to_public_key().unwrap();
        assert_eq!(&public_key, wallet.public_key());

        assert!("not-a-key".parse::<Address>().is_err());
        assert!(wallet.address().as_str().parse::<Address>().is_ok());
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
