//! Field-level encryption and blind-index derivation.
//!
//! The pipeline treats these as pluggable capabilities behind the [`Cryptor`]
//! and [`Indexer`] traits so the concrete algorithm can be swapped without
//! touching call sites — `services`/`pipeline` code only ever sees
//! `&dyn Cryptor` / `&dyn Indexer`. The concrete implementations here use
//! ChaCha20-Poly1305 (AEAD) for encryption and HMAC-SHA256 for the blind
//! index, both drawn from RustCrypto.

pub mod blind_index;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::RngCore;

pub use blind_index::{HmacIndexer, Indexer};

#[derive(Debug, thiserror::Error)]
pub enum CryptError {
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed")]
    Decrypt,
    #[error("malformed ciphertext: {0}")]
    Malformed(String),
}

/// Encrypts and decrypts individual field values for at-rest storage.
///
/// Implementations are expected to be stateless beyond their key material and
/// safe to share across tasks (`Send + Sync`).
pub trait Cryptor: Send + Sync {
    /// Encrypts `plaintext`, returning a self-contained, base64-encoded blob
    /// (nonce prefix + ciphertext) suitable for storing directly in a TEXT
    /// column.
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptError>;

    /// Decrypts a blob produced by [`Cryptor::encrypt`].
    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptError>;
}

/// ChaCha20-Poly1305 backed [`Cryptor`]. The stored blob is
/// `base64(nonce(12 bytes) || ciphertext || tag)`.
pub struct ChaChaCryptor {
    cipher: ChaCha20Poly1305,
}

impl ChaChaCryptor {
    /// `key_base64` must decode to exactly 32 bytes.
    pub fn new(key_base64: &str) -> Result<Self, CryptError> {
        let key_bytes = STANDARD
            .decode(key_base64)
            .map_err(|e| CryptError::InvalidKey(e.to_string()))?;
        if key_bytes.len() != 32 {
            return Err(CryptError::InvalidKey(format!(
                "expected 32-byte key, got {}",
                key_bytes.len()
            )));
        }
        let key = Key::from_slice(&key_bytes);
        Ok(Self {
            cipher: ChaCha20Poly1305::new(key),
        })
    }
}

impl Cryptor for ChaChaCryptor {
    fn encrypt(&self, plaintext: &str) -> Result<String, CryptError> {
        let mut nonce_bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptError::Encrypt)?;

        let mut blob = Vec::with_capacity(12 + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(blob))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String, CryptError> {
        let blob = STANDARD
            .decode(ciphertext)
            .map_err(|e| CryptError::Malformed(e.to_string()))?;
        if blob.len() < 12 {
            return Err(CryptError::Malformed("ciphertext shorter than nonce".into()));
        }
        let (nonce_bytes, body) = blob.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, body)
            .map_err(|_| CryptError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|e| CryptError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> String {
        STANDARD.encode([7u8; 32])
    }

    #[test]
    fn roundtrip() {
        let cryptor = ChaChaCryptor::new(&test_key()).unwrap();
        let ciphertext = cryptor.encrypt("2023 summer trip").unwrap();
        assert_ne!(ciphertext, "2023 summer trip");
        let plaintext = cryptor.decrypt(&ciphertext).unwrap();
        assert_eq!(plaintext, "2023 summer trip");
    }

    #[test]
    fn distinct_nonces_yield_distinct_ciphertexts() {
        let cryptor = ChaChaCryptor::new(&test_key()).unwrap();
        let a = cryptor.encrypt("same plaintext").unwrap();
        let b = cryptor.encrypt("same plaintext").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_short_key() {
        let short = STANDARD.encode([1u8; 16]);
        assert!(ChaChaCryptor::new(&short).is_err());
    }

    #[test]
    fn rejects_malformed_ciphertext() {
        let cryptor = ChaChaCryptor::new(&test_key()).unwrap();
        assert!(cryptor.decrypt("not-base64!!!").is_err());
    }
}
