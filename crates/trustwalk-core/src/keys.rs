//! Role keys
//!
//! Key material is opaque hex. Nothing here performs cryptography: keys only
//! need to be unique and stable so documents can name who is trusted.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bytes of randomness behind a key id or public value (64 hex characters)
pub const KEY_BYTES: usize = 32;

/// Hex identifier of a key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as hex text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key type tag; only a single scheme is modeled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    /// Recorded as `ed25519` in documents
    #[serde(rename = "ed25519")]
    Ed25519,
}

/// A role key: identifier, type and public material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    id: KeyId,
    keytype: KeyType,
    public: String,
}

impl Key {
    /// Assemble a key from its parts
    pub fn new(id: KeyId, keytype: KeyType, public: impl Into<String>) -> Self {
        Self {
            id,
            keytype,
            public: public.into(),
        }
    }

    /// Key identifier
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    /// Key type tag
    pub fn keytype(&self) -> KeyType {
        self.keytype
    }

    /// Public key material in hex
    pub fn public(&self) -> &str {
        &self.public
    }
}

/// Source of fresh key material
///
/// Seeded generators give reproducible registries, which in turn give
/// byte-identical documents across benchmark runs.
#[derive(Debug)]
pub struct KeyGenerator {
    rng: ChaCha20Rng,
}

impl KeyGenerator {
    /// Generator seeded from operating system entropy
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    /// Deterministic generator
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Generate a new ed25519-tagged key
    pub fn generate(&mut self) -> Key {
        let id = KeyId::new(self.random_hex());
        let public = self.random_hex();
        Key::new(id, KeyType::Ed25519, public)
    }

    fn random_hex(&mut self) -> String {
        let mut bytes = [0u8; KEY_BYTES];
        self.rng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}
