//! Password creation, obfuscation and hashing.
//!
//! A fresh password is handed to a client only in obfuscated form: the raw
//! bytes XORed with a shared key that is cycled to the password length. The
//! store keeps nothing but a salted bcrypt hash of the raw bytes.

use base64::Engine;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::fmt;
use std::sync::Mutex;

/// A password XORed with the shared key, as exchanged with clients.
#[derive(Clone, PartialEq, Eq)]
pub struct ObfuscatedPasswd(Vec<u8>);

impl ObfuscatedPasswd {
    /// Wrap raw obfuscated bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Get the raw obfuscated bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Parse from URL-safe base64 (padding optional).
    pub fn from_base64(s: &str) -> crate::Result<Self> {
        let trimmed = s.trim().trim_end_matches('=');
        base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(trimmed)
            .map(Self)
            .map_err(|e| crate::Error::InvalidEncoding(format!("obfuscated password: {e}")))
    }

    /// Encode as URL-safe base64 without padding.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&self.0)
    }
}

impl fmt::Debug for ObfuscatedPasswd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObfuscatedPasswd({})", self.to_base64())
    }
}

impl fmt::Display for ObfuscatedPasswd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

/// XOR `data` against `key`, cycling the key to the length of `data`.
///
/// Applying it twice with the same key yields the input again. An empty key
/// leaves the data unchanged.
pub fn xor_with_key(data: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .zip(key.iter().cycle())
        .map(|(d, k)| d ^ k)
        .collect()
}

/// Creates, obfuscates, hashes and verifies installation passwords.
pub struct PasswdTransformer {
    key: Vec<u8>,
    cost: u32,
    rng: Mutex<StdRng>,
}

impl PasswdTransformer {
    /// Create a transformer seeded from the operating system's CSPRNG.
    pub fn new(key: impl Into<Vec<u8>>, cost: u32) -> crate::Result<Self> {
        Self::with_rng(key, cost, StdRng::from_os_rng())
    }

    /// Create a transformer drawing passwords and salts from `rng`.
    ///
    /// Tests pass a seeded generator here to get reproducible passwords.
    pub fn with_rng(key: impl Into<Vec<u8>>, cost: u32, rng: StdRng) -> crate::Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(crate::Error::InvalidKey(
                "password key must not be empty".to_string(),
            ));
        }
        if !(crate::MIN_HASH_COST..=crate::MAX_HASH_COST).contains(&cost) {
            return Err(crate::Error::Config(format!(
                "hash cost {cost} outside {}..={}",
                crate::MIN_HASH_COST,
                crate::MAX_HASH_COST
            )));
        }
        Ok(Self {
            key,
            cost,
            rng: Mutex::new(rng),
        })
    }

    /// Bcrypt cost used for new hashes.
    pub fn cost(&self) -> u32 {
        self.cost
    }

    fn fill_random(&self, buf: &mut [u8]) {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.fill_bytes(buf);
    }

    /// Create a new random password.
    pub fn create_passwd(&self) -> [u8; crate::PASSWD_LENGTH] {
        let mut passwd = [0u8; crate::PASSWD_LENGTH];
        self.fill_random(&mut passwd);
        passwd
    }

    /// Obfuscate a raw password with the shared key.
    pub fn obfuscate(&self, passwd: &[u8]) -> ObfuscatedPasswd {
        ObfuscatedPasswd(xor_with_key(passwd, &self.key))
    }

    /// Recover the raw password from its obfuscated form.
    pub fn unobfuscate(&self, obfuscated: &ObfuscatedPasswd) -> Vec<u8> {
        xor_with_key(obfuscated.as_bytes(), &self.key)
    }

    /// Create a salted one-way hash of a raw password.
    pub fn create_hash(&self, passwd: &[u8]) -> crate::Result<String> {
        let mut salt = [0u8; 16];
        self.fill_random(&mut salt);
        let parts = bcrypt::hash_with_salt(passwd, self.cost, salt)?;
        Ok(parts.format_for_version(bcrypt::Version::TwoB))
    }

    /// Check an obfuscated password against a stored hash.
    ///
    /// A malformed hash never verifies.
    pub fn verify(&self, obfuscated: &ObfuscatedPasswd, passwd_hash: &str) -> bool {
        bcrypt::verify(self.unobfuscate(obfuscated), passwd_hash).unwrap_or(false)
    }
}

impl fmt::Debug for PasswdTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswdTransformer")
            .field("key_len", &self.key.len())
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}
