//! Validated view of a role's signed document
//!
//! Parsing only guarantees the fields exist. [`RoleMetadata`] additionally
//! checks the cross-field rules a walk depends on and compiles every delegated
//! path pattern once, so a loaded document never fails halfway through a walk.

use crate::document::{SignedDocument, TargetRecord};
use crate::errors::{Result, TrustError};
use crate::keys::KeyId;
use crate::pattern::{any_match, PathPattern};
use std::collections::HashSet;

/// A delegation edge with compiled patterns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationRule {
    name: String,
    backtrack: bool,
    keyids: Vec<KeyId>,
    threshold: u32,
    paths: Vec<PathPattern>,
}

impl DelegationRule {
    /// Delegatee name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backtrack flag of the delegatee
    pub fn backtrack(&self) -> bool {
        self.backtrack
    }

    /// Keys allowed to sign the delegatee's document
    pub fn keyids(&self) -> &[KeyId] {
        &self.keyids
    }

    /// Required number of valid signatures
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Compiled path patterns
    pub fn paths(&self) -> &[PathPattern] {
        &self.paths
    }

    /// Whether this delegation covers the target
    pub fn covers(&self, target: &str) -> bool {
        any_match(&self.paths, target)
    }
}

/// A role's document after load-time validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMetadata {
    name: String,
    document: SignedDocument,
    delegations: Vec<DelegationRule>,
}

impl RoleMetadata {
    /// Validate a parsed document for `role`
    pub fn from_document(role: &str, document: SignedDocument) -> Result<Self> {
        let unavailable = |reason: String| TrustError::metadata_unavailable(role, reason);

        if document.signatures.is_empty() {
            return Err(unavailable("document carries no signatures".to_string()));
        }

        let block = &document.signed.delegations;
        let mut seen = HashSet::with_capacity(block.roles.len());
        let mut delegations = Vec::with_capacity(block.roles.len());

        for delegated in &block.roles {
            if !seen.insert(delegated.name.as_str()) {
                return Err(unavailable(format!(
                    "delegatee {} is listed more than once",
                    delegated.name
                )));
            }
            if delegated.threshold == 0 {
                return Err(unavailable(format!(
                    "delegatee {} has a zero threshold",
                    delegated.name
                )));
            }
            if let Some(missing) = delegated.keyids.iter().find(|id| !block.keys.contains_key(*id)) {
                return Err(unavailable(format!(
                    "delegatee {} names key {missing} absent from delegations.keys",
                    delegated.name
                )));
            }
            let paths = PathPattern::compile_all(delegated.paths.iter().cloned())
                .map_err(|e| unavailable(e.to_string()))?;

            delegations.push(DelegationRule {
                name: delegated.name.clone(),
                backtrack: delegated.backtrack,
                keyids: delegated.keyids.clone(),
                threshold: delegated.threshold,
                paths,
            });
        }

        Ok(Self {
            name: role.to_string(),
            document,
            delegations,
        })
    }

    /// Parse and validate raw document bytes for `role`
    pub fn from_json(role: &str, bytes: &[u8]) -> Result<Self> {
        let document = SignedDocument::from_json(bytes)
            .map_err(|e| TrustError::metadata_unavailable(role, e))?;
        Self::from_document(role, document)
    }

    /// Role this document belongs to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying signed document
    pub fn document(&self) -> &SignedDocument {
        &self.document
    }

    /// The role's own claim for a target, if any
    pub fn target(&self, target: &str) -> Option<&TargetRecord> {
        self.document.signed.targets.get(target)
    }

    /// Delegations in priority order
    pub fn delegations(&self) -> &[DelegationRule] {
        &self.delegations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{
        expiry_for, DelegatedRole, Delegations, DocumentType, KeyValue, PublicKeyEntry,
        SignatureEntry, TargetsPayload,
    };
    use crate::keys::KeyType;
    use assert_matches::assert_matches;
    use std::collections::BTreeMap;

    fn document(roles: Vec<DelegatedRole>, keys: &[&str]) -> SignedDocument {
        let keys = keys
            .iter()
            .map(|id| {
                (
                    KeyId::new(*id),
                    PublicKeyEntry {
                        keytype: KeyType::Ed25519,
                        keyval: KeyValue {
                            public: "ff".repeat(32),
                        },
                    },
                )
            })
            .collect();
        SignedDocument {
            signatures: vec![SignatureEntry {
                keyid: KeyId::new("self"),
                method: "ed25519".to_string(),
                sig: String::new(),
            }],
            signed: TargetsPayload {
                kind: DocumentType::Targets,
                delegations: Delegations { keys, roles },
                expires: expiry_for(0).unwrap(),
                targets: BTreeMap::new(),
                version: 0,
            },
        }
    }

    fn delegated(name: &str, paths: &[&str]) -> DelegatedRole {
        DelegatedRole {
            backtrack: true,
            keyids: vec![KeyId::new("k")],
            name: name.to_string(),
            paths: paths.iter().map(|p| p.to_string()).collect(),
            threshold: 1,
        }
    }

    #[test]
    fn compiles_delegation_patterns() {
        let doc = document(vec![delegated("child", &["pkg/a/.*"])], &["k"]);
        let meta = RoleMetadata::from_document("parent", doc).unwrap();
        let rule = &meta.delegations()[0];
        assert!(rule.covers("pkg/a/x"));
        assert!(!rule.covers("pkg/b/x"));
    }

    #[test]
    fn rejects_unknown_delegated_key() {
        let doc = document(vec![delegated("child", &[".*"])], &[]);
        assert_matches!(
            RoleMetadata::from_document("parent", doc),
            Err(TrustError::MetadataUnavailable { role, .. }) if role == "parent"
        );
    }

    #[test]
    fn rejects_bad_pattern_duplicate_and_zero_threshold() {
        let bad_pattern = document(vec![delegated("child", &["(["])], &["k"]);
        assert!(RoleMetadata::from_document("p", bad_pattern).is_err());

        let dup = document(vec![delegated("c", &[".*"]), delegated("c", &[".*"])], &["k"]);
        assert!(RoleMetadata::from_document("p", dup).is_err());

        let mut zero = delegated("c", &[".*"]);
        zero.threshold = 0;
        assert!(RoleMetadata::from_document("p", document(vec![zero], &["k"])).is_err());
    }

    #[test]
    fn rejects_unsigned_document() {
        let mut doc = document(Vec::new(), &[]);
        doc.signatures.clear();
        assert!(RoleMetadata::from_document("p", doc).is_err());
    }

    #[test]
    fn unparsable_bytes_name_the_role() {
        assert_matches!(
            RoleMetadata::from_json("projects", b"{not json"),
            Err(TrustError::MetadataUnavailable { role, .. }) if role == "projects"
        );
    }
}
