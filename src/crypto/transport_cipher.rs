use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes128, Block};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::Error;
use crate::types::Result;

type HmacSha256 = Hmac<Sha256>;

const BLOCK_SIZE: usize = 16;

/// Per-request AES key and IV, hex encoded
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct TransportKey {
    /// 32 hex chars (16 bytes)
    pub iv_hex: String,
    /// 32 hex chars (16 bytes)
    pub key_hex: String,
}

impl fmt::Debug for TransportKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TransportKey([REDACTED])")
    }
}

/// Encrypts private keys for vendors that refuse raw key material
///
/// The key and IV are derived from HMAC-SHA256 over the request date
/// (`Mon, 02 Jan 2006 15:04:05 GMT`) keyed with the shared secret: the first
/// half of the hex digest is the IV, the second half the AES-128 key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKeyTransportCipher {
    secret: String,
}

impl fmt::Debug for PrivateKeyTransportCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKeyTransportCipher([REDACTED])")
    }
}

impl PrivateKeyTransportCipher {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Date text the vendor expects alongside the encrypted key
    pub fn request_date(timestamp: i64) -> Result<String> {
        let date = Utc
            .timestamp_opt(timestamp, 0)
            .single()
            .ok_or_else(|| Error::Crypto(format!("timestamp out of range: {}", timestamp)))?;
        Ok(date.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
    }

    /// Derive the IV and key halves for `timestamp` (unix seconds)
    pub fn derive(&self, timestamp: i64) -> Result<TransportKey> {
        let date = Self::request_date(timestamp)?;

        let mut mac = <HmacSha256 as Mac>::new_from_slice(self.secret.as_bytes())
            .map_err(|e| Error::Crypto(format!("invalid HMAC key: {}", e)))?;
        mac.update(date.as_bytes());
        let digest = Zeroizing::new(hex::encode(mac.finalize().into_bytes()));

        if digest.len() != 64 {
            return Err(Error::Crypto(format!("invalid HMAC length: {}", digest.len())));
        }
        Ok(TransportKey {
            iv_hex: digest[..32].to_string(),
            key_hex: digest[32..].to_string(),
        })
    }

    /// AES-128-CBC/PKCS#7 encrypt `key_pem`, returning standard base64
    pub fn encrypt(&self, key_pem: &str, timestamp: i64) -> Result<String> {
        let derived = self.derive(timestamp)?;
        let iv = Zeroizing::new(decode_half(&derived.iv_hex)?);
        let key = Zeroizing::new(decode_half(&derived.key_hex)?);

        let cipher = <Aes128 as KeyInit>::new_from_slice(key.as_slice())
            .map_err(|e| Error::Crypto(format!("invalid AES key: {}", e)))?;

        let mut buffer = Zeroizing::new(pkcs7_pad(key_pem.as_bytes()));
        let mut previous = [0u8; BLOCK_SIZE];
        previous.copy_from_slice(iv.as_slice());
        for chunk in buffer.chunks_mut(BLOCK_SIZE) {
            chunk
                .iter_mut()
                .zip(previous.iter())
                .for_each(|(b, p)| *b ^= p);
            cipher.encrypt_block(Block::from_mut_slice(chunk));
            previous.copy_from_slice(chunk);
        }

        Ok(STANDARD.encode(buffer.as_slice()))
    }
}

/// `(iv_hex, key_hex)` for `secret` at `timestamp`
pub fn derive_key_iv(secret: &str, timestamp: i64) -> Result<(String, String)> {
    let derived = PrivateKeyTransportCipher::new(secret).derive(timestamp)?;
    Ok((derived.iv_hex.clone(), derived.key_hex.clone()))
}

/// Shorthand for one-off use
pub fn encrypt_private_key(key_pem: &str, secret: &str, timestamp: i64) -> Result<String> {
    PrivateKeyTransportCipher::new(secret).encrypt(key_pem, timestamp)
}

fn decode_half(hex_text: &str) -> Result<Vec<u8>> {
    let bytes = hex::decode(hex_text).map_err(|e| Error::Crypto(format!("invalid hex: {}", e)))?;
    if bytes.len() != BLOCK_SIZE {
        return Err(Error::Crypto(format!("expected 16 bytes, got {}", bytes.len())));
    }
    Ok(bytes)
}

fn pkcs7_pad(input: &[u8]) -> Vec<u8> {
    let pad = BLOCK_SIZE - input.len() % BLOCK_SIZE;
    let mut out = Vec::with_capacity(input.len() + pad);
    out.extend_from_slice(input);
    out.extend(std::iter::repeat(pad as u8).take(pad));
    out
}
