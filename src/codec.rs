//! Authenticated cookie value codec
//!
//! Values are serialized to JSON, optionally encrypted, and signed together
//! with the cookie name and a timestamp. The token format is:
//! `base64url(timestamp + "|" + base64url(payload) + "|" + hmac)`, where the
//! HMAC-SHA256 covers `name|timestamp|base64url(payload)`.
//!
//! Several [`KeyPair`]s can be configured for key rotation: new tokens are
//! always produced with the first pair, while decoding tries every pair in
//! order.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use cookie::{Cookie, CookieJar, Key};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha256;

use crate::error::SessionError;

type HmacSha256 = Hmac<Sha256>;

/// Default token lifetime, in seconds (30 days)
pub const DEFAULT_MAX_AGE: u64 = 86400 * 30;

/// Default upper bound for an encoded token, in bytes
pub const DEFAULT_MAX_LENGTH: usize = 4096;

/// Minimum length of an encryption (block) key, in bytes
pub const MIN_BLOCK_KEY_LEN: usize = 32;

/// A signing key plus an optional encryption key
#[derive(Clone)]
pub struct KeyPair {
    hash_key: Vec<u8>,
    block_key: Option<Vec<u8>>,
}

impl KeyPair {
    /// Create a key pair that only signs values
    pub fn new(hash_key: impl Into<Vec<u8>>) -> Self {
        Self {
            hash_key: hash_key.into(),
            block_key: None,
        }
    }

    /// Also encrypt values with the given key (at least 32 bytes)
    pub fn with_block_key(mut self, block_key: impl Into<Vec<u8>>) -> Self {
        self.block_key = Some(block_key.into());
        self
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("hash_key", &"<redacted>")
            .field("encrypted", &self.block_key.is_some())
            .finish()
    }
}

/// Encodes and decodes values with a single key pair
#[derive(Clone)]
pub struct Codec {
    hash_key: Vec<u8>,
    cipher: Option<Key>,
    max_age: Option<u64>,
    max_length: usize,
}

impl Codec {
    /// Build a codec from a key pair.
    ///
    /// Fails when the hash key is empty or the block key is shorter than
    /// [`MIN_BLOCK_KEY_LEN`].
    pub fn new(pair: &KeyPair) -> Result<Self, SessionError> {
        if pair.hash_key.is_empty() {
            return Err(SessionError::Config("hash key is not set".to_string()));
        }
        let cipher = match &pair.block_key {
            Some(block_key) if block_key.len() < MIN_BLOCK_KEY_LEN => {
                return Err(SessionError::Config(format!(
                    "block key must be at least {} bytes, got {}",
                    MIN_BLOCK_KEY_LEN,
                    block_key.len()
                )));
            }
            Some(block_key) => Some(Key::derive_from(block_key)),
            None => None,
        };
        Ok(Self {
            hash_key: pair.hash_key.clone(),
            cipher,
            max_age: Some(DEFAULT_MAX_AGE),
            max_length: DEFAULT_MAX_LENGTH,
        })
    }

    /// Set the maximum token age in seconds. `None` disables the check.
    pub fn with_max_age(mut self, max_age: impl Into<Option<u64>>) -> Self {
        self.max_age = max_age.into();
        self
    }

    /// Set the maximum token length. `0` disables the check.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Encode a value bound to the given cookie name
    pub fn encode<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<String, SessionError> {
        self.encode_at(name, value, chrono::Utc::now().timestamp())
    }

    /// Decode a token produced by [`Codec::encode`] for the same name
    pub fn decode<T: DeserializeOwned>(&self, name: &str, token: &str) -> Result<T, SessionError> {
        self.decode_at(name, token, chrono::Utc::now().timestamp())
    }

    fn encode_at<T: Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
        now: i64,
    ) -> Result<String, SessionError> {
        let json = serde_json::to_string(value)?;
        let payload = match &self.cipher {
            Some(key) => encrypt(key, name, json)?,
            None => json,
        };
        let payload = URL_SAFE_NO_PAD.encode(payload.as_bytes());
        let timestamp = now.to_string();

        let mac = self
            .mac(name, timestamp.as_bytes(), payload.as_bytes())?
            .finalize()
            .into_bytes();

        let mut raw = format!("{}|{}|", timestamp, payload).into_bytes();
        raw.extend_from_slice(&mac);
        let token = URL_SAFE_NO_PAD.encode(raw);

        if self.max_length > 0 && token.len() > self.max_length {
            return Err(SessionError::Serialization(format!(
                "encoded value is too long ({} > {} bytes)",
                token.len(),
                self.max_length
            )));
        }
        Ok(token)
    }

    fn decode_at<T: DeserializeOwned>(
        &self,
        name: &str,
        token: &str,
        now: i64,
    ) -> Result<T, SessionError> {
        if self.max_length > 0 && token.len() > self.max_length {
            return Err(SessionError::Decode("the value is too long".to_string()));
        }
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| SessionError::Decode(format!("invalid token encoding: {}", e)))?;

        let mut parts = raw.splitn(3, |b| *b == b'|');
        let (Some(timestamp), Some(payload), Some(mac)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(SessionError::Decode("the value is not valid".to_string()));
        };

        self.mac(name, timestamp, payload)?
            .verify_slice(mac)
            .map_err(|_| SessionError::Decode("the value is not valid".to_string()))?;

        let timestamp: i64 = std::str::from_utf8(timestamp)
            .ok()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| SessionError::Decode("invalid timestamp".to_string()))?;
        if timestamp > now {
            return Err(SessionError::Decode("timestamp is too new".to_string()));
        }
        if let Some(max_age) = self.max_age {
            let max_age = i64::try_from(max_age).unwrap_or(i64::MAX);
            if timestamp < now.saturating_sub(max_age) {
                return Err(SessionError::Decode("expired timestamp".to_string()));
            }
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(|| SessionError::Decode("invalid payload encoding".to_string()))?;
        let json = match &self.cipher {
            Some(key) => decrypt(key, name, &payload)?,
            None => payload,
        };
        serde_json::from_str(&json).map_err(|e| SessionError::Decode(e.to_string()))
    }

    fn mac(&self, name: &str, timestamp: &[u8], payload: &[u8]) -> Result<HmacSha256, SessionError> {
        let mut mac = HmacSha256::new_from_slice(&self.hash_key)
            .map_err(|e| SessionError::Config(e.to_string()))?;
        mac.update(name.as_bytes());
        mac.update(b"|");
        mac.update(timestamp);
        mac.update(b"|");
        mac.update(payload);
        Ok(mac)
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("encrypted", &self.cipher.is_some())
            .field("max_age", &self.max_age)
            .field("max_length", &self.max_length)
            .finish()
    }
}

/// AES-GCM through the cookie crate's private jar; the name is the associated data.
fn encrypt(key: &Key, name: &str, plaintext: String) -> Result<String, SessionError> {
    let mut jar = CookieJar::new();
    jar.private_mut(key).add(Cookie::new(name.to_owned(), plaintext));
    jar.get(name)
        .map(|c| c.value().to_owned())
        .ok_or_else(|| SessionError::Serialization("failed to encrypt value".to_string()))
}

fn decrypt(key: &Key, name: &str, ciphertext: &str) -> Result<String, SessionError> {
    let mut jar = CookieJar::new();
    jar.add_original(Cookie::new(name.to_owned(), ciphertext.to_owned()));
    jar.private(key)
        .get(name)
        .map(|c| c.value().to_owned())
        .ok_or_else(|| SessionError::Decode("the value could not be decrypted".to_string()))
}

/// An ordered set of codecs supporting key rotation
#[derive(Clone, Debug)]
pub struct Codecs {
    codecs: Vec<Codec>,
}

impl Codecs {
    /// Build one codec per key pair. The first pair signs new tokens.
    pub fn from_pairs(pairs: &[KeyPair]) -> Result<Self, SessionError> {
        if pairs.is_empty() {
            return Err(SessionError::Config("no key pairs configured".to_string()));
        }
        let codecs = pairs.iter().map(Codec::new).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { codecs })
    }

    /// Apply a maximum token age to every codec
    pub fn with_max_age(mut self, max_age: Option<u64>) -> Self {
        self.codecs = self
            .codecs
            .into_iter()
            .map(|c| c.with_max_age(max_age))
            .collect();
        self
    }

    /// Apply a maximum token length to every codec. `0` disables the check.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.codecs = self
            .codecs
            .into_iter()
            .map(|c| c.with_max_length(max_length))
            .collect();
        self
    }

    /// Encode with the current (first) key pair
    pub fn encode<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<String, SessionError> {
        match self.codecs.first() {
            Some(codec) => codec.encode(name, value),
            None => Err(SessionError::Config("no codecs available".to_string())),
        }
    }

    /// Decode with the first key pair that accepts the token
    pub fn decode<T: DeserializeOwned>(&self, name: &str, token: &str) -> Result<T, SessionError> {
        let mut last_err = SessionError::Config("no codecs available".to_string());
        for codec in &self.codecs {
            match codec.decode(name, token) {
                Ok(value) => return Ok(value),
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    /// Encode a session identifier into a cookie token
    pub fn encode_id(&self, name: &str, id: &str) -> Result<String, SessionError> {
        self.encode(name, id)
    }

    /// Decode a cookie token back into a session identifier
    pub fn decode_id(&self, name: &str, token: &str) -> Result<String, SessionError> {
        self.decode(name, token)
    }
}
