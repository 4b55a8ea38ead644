//! Wallet signing.
//!
//! Decouples signing from the RPC client so that the raw private key is
//! only expanded inside `sign_message`.

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use secrecy::{ExposeSecret, SecretString};
use solana_signature::Signature;

use crate::domain::{BlockchainError, Pubkey, TransactionSigner};

/// Parse a base58 secret into a SigningKey.
///
/// Accepts a 32-byte seed or a 64-byte Solana keypair (seed ‖ public key).
pub fn signing_key_from_base58(secret: &SecretString) -> Result<SigningKey, BlockchainError> {
    let key_bytes = bs58::decode(secret.expose_secret())
        .into_vec()
        .map_err(|e| BlockchainError::InvalidSignature(e.to_string()))?;

    let key_array: [u8; 32] = match key_bytes.len() {
        64 => key_bytes[..32]
            .try_into()
            .map_err(|_| BlockchainError::InvalidSignature("Invalid keypair format".to_string()))?,
        32 => key_bytes.try_into().map_err(|v: Vec<u8>| {
            BlockchainError::InvalidSignature(format!("Key must be 32 bytes, got {}", v.len()))
        })?,
        other => {
            return Err(BlockchainError::InvalidSignature(format!(
                "Key must be 32 or 64 bytes, got {}",
                other
            )));
        }
    };

    Ok(SigningKey::from_bytes(&key_array))
}

/// Wallet backed by a key held in memory.
pub struct LocalSigner {
    secret: SecretString,
    public_key: Pubkey,
}

impl LocalSigner {
    /// Build a signer from a base58-encoded secret.
    pub fn new(secret: SecretString) -> Result<Self, BlockchainError> {
        let signing_key = signing_key_from_base58(&secret)?;
        let public_key = Pubkey::new_from_array(signing_key.verifying_key().to_bytes());
        Ok(Self { secret, public_key })
    }

    /// Build a signer from an existing key (tests, ephemeral wallets).
    #[must_use]
    pub fn from_signing_key(signing_key: &SigningKey) -> Self {
        let encoded = bs58::encode(signing_key.to_bytes()).into_string();
        Self {
            secret: SecretString::from(encoded),
            public_key: Pubkey::new_from_array(signing_key.verifying_key().to_bytes()),
        }
    }
}

#[async_trait]
impl TransactionSigner for LocalSigner {
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, BlockchainError> {
        let signing_key = signing_key_from_base58(&self.secret)?;
        Ok(Signature::from(signing_key.sign(message).to_bytes()))
    }

    fn public_key(&self) -> Pubkey {
        self.public_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Verifier, VerifyingKey};
    use rand::rngs::OsRng;

    #[test]
    fn test_signing_key_from_base58_valid_32_bytes() {
        let original_key = SigningKey::generate(&mut OsRng);
        let encoded = bs58::encode(original_key.to_bytes()).into_string();
        let secret = SecretString::from(encoded);
        let parsed = signing_key_from_base58(&secret).unwrap();
        assert_eq!(parsed.to_bytes(), original_key.to_bytes());
    }

    #[test]
    fn test_signing_key_from_base58_valid_64_bytes() {
        let original_key = SigningKey::generate(&mut OsRng);
        let mut keypair = original_key.to_bytes().to_vec();
        keypair.extend_from_slice(original_key.verifying_key().as_bytes());
        let encoded = bs58::encode(&keypair).into_string();
        let secret = SecretString::from(encoded);
        let parsed = signing_key_from_base58(&secret).unwrap();
        assert_eq!(parsed.verifying_key(), original_key.verifying_key());
    }

    #[test]
    fn test_signing_key_from_base58_invalid() {
        let secret = SecretString::from("invalid-base58!!!");
        assert!(signing_key_from_base58(&secret).is_err());
    }

    #[test]
    fn test_signing_key_from_base58_wrong_length() {
        let short_key = bs58::encode(vec![0u8; 16]).into_string();
        assert!(signing_key_from_base58(&SecretString::from(short_key)).is_err());

        let wrong_key = bs58::encode(vec![0u8; 48]).into_string();
        assert!(signing_key_from_base58(&SecretString::from(wrong_key)).is_err());
    }

    #[tokio::test]
    async fn test_local_signer_signature_verifies() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let signer = LocalSigner::from_signing_key(&signing_key);

        let signature = signer.sign_message(b"message").await.unwrap();

        let verifying_key = VerifyingKey::from_bytes(signer.public_key().as_array()).unwrap();
        let bytes: [u8; 64] = signature.as_ref().try_into().unwrap();
        assert!(
            verifying_key
                .verify(b"message", &ed25519_dalek::Signature::from_bytes(&bytes))
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_local_signer_is_deterministic() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let signer = LocalSigner::from_signing_key(&signing_key);

        let sig1 = signer.sign_message(b"test message").await.unwrap();
        let sig2 = signer.sign_message(b"test message").await.unwrap();
        assert_eq!(sig1, sig2);

        let sig3 = signer.sign_message(b"different message").await.unwrap();
        assert_ne!(sig1, sig3);
    }

    #[test]
    fn test_local_signer_new_derives_public_key() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let encoded = bs58::encode(signing_key.to_bytes()).into_string();
        let signer = LocalSigner::new(SecretString::from(encoded)).unwrap();
        assert_eq!(
            signer.public_key().to_bytes(),
            signing_key.verifying_key().to_bytes()
        );
    }
}
