//! On-disk signed targets documents
//!
//! Struct fields are declared in lexicographic order and every map is a
//! `BTreeMap`, so serializing a document always emits sorted keys and
//! identical inputs produce byte-identical files.

use crate::errors::{Result, TrustError};
use crate::keys::{KeyId, KeyType};
use crate::signer::SigningPayload;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Documents expire this many days after their reference timestamp
pub const EXPIRY_DAYS: i64 = 365;

/// Threshold written for every delegation; quorums are not modeled
pub const DELEGATION_THRESHOLD: u32 = 1;

/// Signed envelope around a targets payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedDocument {
    /// One entry per key of the producing role
    pub signatures: Vec<SignatureEntry>,
    /// The signed payload
    pub signed: TargetsPayload,
}

/// One signature over the payload's signing content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    /// Key that produced the signature
    pub keyid: KeyId,
    /// Signature method label
    pub method: String,
    /// Hex signature
    pub sig: String,
}

/// Document type tag; only targets documents exist here
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    /// Serialized as `Targets`
    Targets,
}

/// Payload of a targets document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetsPayload {
    /// Always `Targets`
    #[serde(rename = "_type")]
    pub kind: DocumentType,
    /// Delegated roles and their keys
    pub delegations: Delegations,
    /// Expiry instant, ISO-8601 UTC with a `Z` suffix
    #[serde(with = "iso8601_z")]
    pub expires: DateTime<Utc>,
    /// Targets this role vouches for directly
    pub targets: BTreeMap<String, TargetRecord>,
    /// Document version
    pub version: u64,
}

/// Delegation block: key material and ordered delegated roles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegations {
    /// Key material for every key id listed under `roles`
    pub keys: BTreeMap<KeyId, PublicKeyEntry>,
    /// Delegated roles in priority order
    pub roles: Vec<DelegatedRole>,
}

/// Public key entry of the delegation block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyEntry {
    /// Key type tag
    pub keytype: KeyType,
    /// Key value
    pub keyval: KeyValue,
}

/// Public key value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Public key material in hex
    pub public: String,
}

/// One delegation edge as recorded by the parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatedRole {
    /// Whether later siblings may be tried after this role fails to resolve
    /// a target it matched
    pub backtrack: bool,
    /// Keys trusted to sign the delegatee's document
    pub keyids: Vec<KeyId>,
    /// Delegatee name
    pub name: String,
    /// Path patterns scoping the delegation, sorted
    pub paths: Vec<String>,
    /// Number of valid signatures required
    pub threshold: u32,
}

/// Hash and length a role claims for one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
    /// Content digests
    pub hashes: TargetHashes,
    /// Length in bytes
    pub length: u64,
}

/// Content digests of a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetHashes {
    /// Hex SHA-256 digest
    pub sha256: String,
}

impl TargetRecord {
    /// Record for a digest and length
    pub fn new(sha256: impl Into<String>, length: u64) -> Self {
        Self {
            hashes: TargetHashes {
                sha256: sha256.into(),
            },
            length,
        }
    }
}

/// Expiry instant for a reference timestamp (seconds since the Unix epoch)
pub fn expiry_for(timestamp: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp, 0)
        .and_then(|start| start.checked_add_signed(Duration::days(EXPIRY_DAYS)))
        .ok_or_else(|| TrustError::config(format!("reference timestamp {timestamp} is out of range")))
}

impl TargetsPayload {
    /// Reference timestamp the document was built from
    pub fn reference_timestamp(&self) -> i64 {
        (self.expires - Duration::days(EXPIRY_DAYS)).timestamp()
    }

    /// Content covered by this document's signatures
    pub fn signing_payload(&self) -> SigningPayload {
        SigningPayload::new(
            self.targets.keys().cloned(),
            self.reference_timestamp(),
            self.version,
        )
    }
}

impl SignedDocument {
    /// Canonical encoding: sorted keys, one-space indentation
    pub fn to_canonical_json(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        Ok(out)
    }

    /// Parse a document, rejecting any that lack required fields
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

mod iso8601_z {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;
        if !text.ends_with('Z') {
            return Err(serde::de::Error::custom(format!(
                "expiry {text:?} is not a UTC timestamp ending in Z"
            )));
        }
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Render an instant the way documents store it
pub fn format_expiry(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
