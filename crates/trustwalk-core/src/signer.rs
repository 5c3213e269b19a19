//! Signing seam for targets documents
//!
//! [`PseudoSigner`] is a deterministic stand-in used to generate reproducible
//! metadata for benchmarking delegation walks. It has no secret input and
//! proves nothing about who produced a document: anyone can compute it. A
//! deployment that needs real trust must plug an actual signature scheme in
//! behind [`Signer`].

use crate::hash::{sha256_hex, DIGEST_HEX_LEN};
use std::collections::BTreeSet;
use std::fmt;

/// Method label written into every signature entry
pub const SIGNATURE_METHOD: &str = "ed25519";

/// The content a signature covers: target identifiers, timestamp and version
///
/// Identifiers are kept as a sorted set, so the order they were supplied in
/// never affects the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningPayload {
    targets: BTreeSet<String>,
    timestamp: i64,
    version: u64,
}

impl SigningPayload {
    /// Build a payload from any collection of target identifiers
    pub fn new<I, S>(targets: I, timestamp: i64, version: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            timestamp,
            version,
        }
    }

    /// Sorted target identifiers
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(String::as_str)
    }

    /// Reference timestamp in seconds since the Unix epoch
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Document version
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Canonical byte form: sorted identifiers, then timestamp, then version,
    /// concatenated without separators
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        for target in &self.targets {
            out.push_str(target);
        }
        out.push_str(&self.timestamp.to_string());
        out.push_str(&self.version.to_string());
        out.into_bytes()
    }
}

/// Produces and checks signatures over a [`SigningPayload`]
pub trait Signer: Send + Sync + fmt::Debug {
    /// Method label recorded next to each signature
    fn method(&self) -> &str;

    /// Sign a payload, returning the hex signature
    fn sign(&self, payload: &SigningPayload) -> String;

    /// Check a hex signature against a payload
    fn verify(&self, payload: &SigningPayload, signature: &str) -> bool {
        self.sign(payload) == signature
    }
}

/// Deterministic benchmark signer, see the module docs
///
/// The signature is `H(canonical) || H(hex(H(canonical)))` in hex, twice the
/// length of one SHA-256 digest.
#[derive(Debug, Clone, Copy, Default)]
pub struct PseudoSigner;

impl PseudoSigner {
    /// Length of every pseudo-signature in hex characters
    pub const SIGNATURE_HEX_LEN: usize = 2 * DIGEST_HEX_LEN;
}

impl Signer for PseudoSigner {
    fn method(&self) -> &str {
        SIGNATURE_METHOD
    }

    fn sign(&self, payload: &SigningPayload) -> String {
        let first_half = sha256_hex(&payload.canonical_bytes());
        let second_half = sha256_hex(first_half.as_bytes());
        first_half + &second_half
    }
}
