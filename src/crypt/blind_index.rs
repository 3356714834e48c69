//! Deterministic blind-index derivation, used so `slug` can be looked up by
//! equality in the database without storing it in plaintext.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::CryptError;

type HmacSha256 = Hmac<Sha256>;

/// Derives a deterministic, keyed lookup value from a plaintext. Unlike
/// [`super::Cryptor`], the same plaintext must always produce the same
/// output under a fixed key — that's what makes it usable as a database
/// index (`slugIndex`).
pub trait Indexer: Send + Sync {
    fn blind_index(&self, plaintext: &str) -> String;
}

/// HMAC-SHA256 backed [`Indexer`]. The output is hex-encoded so it sorts and
/// compares the same way regardless of storage collation.
pub struct HmacIndexer {
    key: Vec<u8>,
}

impl HmacIndexer {
    pub fn new(key_base64: &str) -> Result<Self, CryptError> {
        let key = STANDARD
            .decode(key_base64)
            .map_err(|e| CryptError::InvalidKey(e.to_string()))?;
        if key.is_empty() {
            return Err(CryptError::InvalidKey("blind index key is empty".into()));
        }
        Ok(Self { key })
    }
}

impl Indexer for HmacIndexer {
    fn blind_index(&self, plaintext: &str) -> String {
        // HmacSha256::new_from_slice only fails for invalid key lengths,
        // which HMAC accepts unconditionally (it pads/hashes internally).
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(plaintext.as_bytes());
        let result = mac.finalize().into_bytes();
        hex_encode(&result)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{:02x}", b).expect("writing to a String never fails");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexer() -> HmacIndexer {
        HmacIndexer::new(&STANDARD.encode(b"blind-index-test-key")).unwrap()
    }

    #[test]
    fn deterministic() {
        let idx = indexer();
        let slug = "11111111-1111-1111-1111-111111111111";
        assert_eq!(idx.blind_index(slug), idx.blind_index(slug));
    }

    #[test]
    fn distinct_inputs_differ() {
        let idx = indexer();
        assert_ne!(
            idx.blind_index("11111111-1111-1111-1111-111111111111"),
            idx.blind_index("22222222-2222-2222-2222-222222222222")
        );
    }

    #[test]
    fn different_keys_differ() {
        let a = HmacIndexer::new(&STANDARD.encode(b"key-a")).unwrap();
        let b = HmacIndexer::new(&STANDARD.encode(b"key-b")).unwrap();
        let slug = "same-slug";
        assert_ne!(a.blind_index(slug), b.blind_index(slug));
    }
}
