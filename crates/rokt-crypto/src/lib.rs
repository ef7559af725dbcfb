//! AES-128-CTR encryption for file bodies and obfuscated file names.
//!
//! The cipher is unauthenticated and total: any ciphertext of the right
//! length decrypts to *some* plaintext. That is deliberate (see the
//! corruption self-healing behaviour in `rokt-storage`), not an oversight.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use thiserror::Error;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

const KEY_LEN: usize = 16;
const IV_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("iv must be exactly {IV_LEN} bytes, got {0}")]
    InvalidIv(usize),
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
}

/// A configured AES-128-CTR key/IV pair. Stateless and safely shared
/// across worker threads once constructed.
#[derive(Clone)]
pub struct Cipher {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl Cipher {
    /// `passphrase` is padded with `'0'` or truncated to exactly 16 bytes.
    /// `iv` must be exactly 16 bytes or construction fails.
    pub fn new(passphrase: &str, iv: &str) -> Result<Self, CryptoError> {
        let iv_bytes = iv.as_bytes();
        if iv_bytes.len() != IV_LEN {
            return Err(CryptoError::InvalidIv(iv_bytes.len()));
        }
        let mut key = [b'0'; KEY_LEN];
        let src = passphrase.as_bytes();
        let n = src.len().min(KEY_LEN);
        key[..n].copy_from_slice(&src[..n]);

        let mut iv_arr = [0u8; IV_LEN];
        iv_arr.copy_from_slice(iv_bytes);

        Ok(Self { key, iv: iv_arr })
    }

    /// Encrypts (or decrypts — CTR mode is its own inverse) `data` in place
    /// and returns the result.
    fn apply_keystream(&self, data: &[u8]) -> Vec<u8> {
        let mut buf = data.to_vec();
        let mut cipher = Aes128Ctr::new(&self.key.into(), &self.iv.into());
        cipher.apply_keystream(&mut buf);
        buf
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        self.apply_keystream(plaintext)
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> Vec<u8> {
        self.apply_keystream(ciphertext)
    }

    /// Encrypts `name` and hex-encodes the result (lowercase, 2 chars/byte),
    /// producing a filesystem-safe obfuscated name.
    pub fn encrypt_name(&self, name: &str) -> String {
        to_hex(&self.encrypt(name.as_bytes()))
    }

    /// Inverse of [`Cipher::encrypt_name`].
    pub fn decrypt_name(&self, hex_name: &str) -> Result<String, CryptoError> {
        let bytes = from_hex(hex_name)?;
        Ok(String::from_utf8_lossy(&self.decrypt(&bytes)).into_owned())
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

fn from_hex(s: &str) -> Result<Vec<u8>, CryptoError> {
    if s.len() % 2 != 0 {
        return Err(CryptoError::InvalidHex(s.to_string()));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| CryptoError::InvalidHex(s.to_string()))
        })
        .collect()
}
