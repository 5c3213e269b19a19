//! Metadata builder
//!
//! Turns a frozen [`Registry`] into one signed targets document per role and
//! publishes them under the configured output directory. Builds are
//! deterministic: identical registries, target trees and settings produce
//! byte-identical documents.

use crate::config::BuildConfig;
use crate::document::{
    expiry_for, DelegatedRole, Delegations, DocumentType, KeyValue, PublicKeyEntry,
    SignatureEntry, SignedDocument, TargetRecord, TargetsPayload, DELEGATION_THRESHOLD,
};
use crate::errors::{Result, TrustError};
use crate::hash::sha256_file;
use crate::pattern::{any_match, TargetGlob};
use crate::registry::{Registry, Role, TargetSource};
use crate::signer::{PseudoSigner, Signer, SigningPayload};
use crate::store::role_document_path;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Summary of a [`MetadataBuilder::build_all`] run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Every document written, in registration order of the roles
    pub documents: Vec<PathBuf>,
    /// Total number of direct target entries across all documents
    pub targets: usize,
}

/// Builds and writes signed documents for the roles of a frozen registry
#[derive(Debug)]
pub struct MetadataBuilder<'a, S: Signer = PseudoSigner> {
    registry: &'a Registry,
    config: &'a BuildConfig,
    signer: S,
}

impl<'a> MetadataBuilder<'a, PseudoSigner> {
    /// Builder signing with the deterministic pseudo-signer
    pub fn new(registry: &'a Registry, config: &'a BuildConfig) -> Result<Self> {
        Self::with_signer(registry, config, PseudoSigner)
    }
}

impl<'a, S: Signer> MetadataBuilder<'a, S> {
    /// Builder with a custom signer; the registry must already be frozen
    pub fn with_signer(registry: &'a Registry, config: &'a BuildConfig, signer: S) -> Result<Self> {
        if !registry.is_frozen() {
            return Err(TrustError::RegistryNotFrozen {
                operation: "building metadata",
            });
        }
        Ok(Self {
            registry,
            config,
            signer,
        })
    }

    /// Assemble the signed document of one role without writing it
    pub fn build(&self, name: &str) -> Result<SignedDocument> {
        let role = self.registry.lookup(name)?;
        let targets = self.collect_targets(role)?;
        let delegations = self.delegations_of(role)?;

        let payload = SigningPayload::new(
            targets.keys().cloned(),
            self.config.reference_timestamp,
            self.config.version,
        );
        let sig = self.signer.sign(&payload);
        let signatures = role
            .keyids()
            .iter()
            .map(|keyid| SignatureEntry {
                keyid: keyid.clone(),
                method: self.signer.method().to_string(),
                sig: sig.clone(),
            })
            .collect();

        Ok(SignedDocument {
            signatures,
            signed: TargetsPayload {
                kind: DocumentType::Targets,
                delegations,
                expires: expiry_for(self.config.reference_timestamp)?,
                targets,
                version: self.config.version,
            },
        })
    }

    /// Build every role's document without writing, in registration order
    pub fn build_documents(&self) -> Result<Vec<(String, SignedDocument)>> {
        self.registry
            .roles()
            .map(|role| Ok((role.name().to_string(), self.build(role.name())?)))
            .collect()
    }

    /// Where the document of `role` is published
    pub fn document_path(&self, role: &str) -> PathBuf {
        role_document_path(&self.config.output_dir, role)
    }

    /// Publish a document atomically, creating parent directories as needed
    pub fn write(&self, role: &str, document: &SignedDocument) -> Result<PathBuf> {
        let path = self.document_path(role);
        let bytes = document.to_canonical_json()?;
        write_atomically(&path, &bytes)?;
        tracing::debug!(role = %role, path = %path.display(), "wrote document");
        Ok(path)
    }

    /// Build and publish the documents of every registered role
    pub fn build_all(&self) -> Result<BuildReport> {
        let mut report = BuildReport::default();
        for (role, document) in self.build_documents()? {
            report.targets += document.signed.targets.len();
            report.documents.push(self.write(&role, &document)?);
        }
        tracing::info!(
            documents = report.documents.len(),
            targets = report.targets,
            output = %self.config.output_dir.display(),
            "built delegation metadata"
        );
        Ok(report)
    }

    fn delegations_of(&self, role: &Role) -> Result<Delegations> {
        let mut block = Delegations::default();
        for child_name in role.delegations() {
            let child = self.registry.lookup(child_name)?;
            for keyid in child.keyids() {
                let key = self.registry.key(keyid).ok_or_else(|| TrustError::InvalidDelegation {
                    parent: role.name().to_string(),
                    reason: format!("key {keyid} of {child_name} is not registered"),
                })?;
                block.keys.insert(
                    keyid.clone(),
                    PublicKeyEntry {
                        keytype: key.keytype(),
                        keyval: KeyValue {
                            public: key.public().to_string(),
                        },
                    },
                );
            }

            let mut paths: Vec<String> = child.paths().iter().map(|p| p.as_str().to_string()).collect();
            paths.sort();
            block.roles.push(DelegatedRole {
                backtrack: child.backtrack(),
                keyids: child.keyids().to_vec(),
                name: child.name().to_string(),
                paths,
                threshold: DELEGATION_THRESHOLD,
            });
        }
        Ok(block)
    }

    fn collect_targets(&self, role: &Role) -> Result<BTreeMap<String, TargetRecord>> {
        match role.targets() {
            TargetSource::None => Ok(BTreeMap::new()),
            TargetSource::Records(records) => Ok(records.clone()),
            TargetSource::Scope(globs) => self.scan_targets(role, globs),
        }
    }

    fn scan_targets(&self, role: &Role, globs: &[TargetGlob]) -> Result<BTreeMap<String, TargetRecord>> {
        // glob yields paths without a leading `./`, so compare against the same form
        let root = normalized_root(&self.config.targets_dir);
        let escaped_root = root
            .to_str()
            .map(glob::Pattern::escape)
            .ok_or_else(|| TrustError::config(format!("target directory {} is not UTF-8", root.display())))?;

        let mut targets = BTreeMap::new();
        for scope in globs {
            let full = if escaped_root.is_empty() {
                scope.as_str().to_string()
            } else {
                format!("{}/{}", escaped_root.trim_end_matches('/'), scope.as_str())
            };
            let entries = glob::glob(&full).map_err(|e| TrustError::pattern(full.clone(), e))?;

            for entry in entries {
                let path = entry.map_err(|e| {
                    let path = e.path().to_path_buf();
                    TrustError::io(path, std::io::Error::from(e))
                })?;
                if !path.is_file() {
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&root) else {
                    tracing::warn!(
                        path = %path.display(),
                        root = %root.display(),
                        "skipping target outside the target directory"
                    );
                    continue;
                };
                let Some(identifier) = target_identifier(relative) else {
                    tracing::warn!(path = %path.display(), "skipping target with non UTF-8 path");
                    continue;
                };
                if !any_match(role.paths(), &identifier) {
                    tracing::warn!(
                        role = %role.name(),
                        target = %identifier,
                        "skipping target outside the role's delegated paths"
                    );
                    continue;
                }
                let (sha256, length) = sha256_file(&path)?;
                targets.insert(identifier, TargetRecord::new(sha256, length));
            }
        }

        tracing::debug!(role = %role.name(), targets = targets.len(), "scanned target scope");
        Ok(targets)
    }
}

/// Build and publish every role of a frozen registry with the pseudo-signer
pub fn build_all(registry: &Registry, config: &BuildConfig) -> Result<BuildReport> {
    MetadataBuilder::new(registry, config)?.build_all()
}

/// Target directory without `.` components; `.` alone becomes the empty path
fn normalized_root(root: &Path) -> PathBuf {
    root.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Identifier of a path relative to the target directory, joined with `/`
fn target_identifier(relative: &Path) -> Option<String> {
    let segments = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(segments.join("/"))
}

/// Readers of `path` see either the previous document or the complete new one
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| TrustError::config(format!("document path {} has no parent", path.display())))?;
    std::fs::create_dir_all(dir).map_err(|e| TrustError::io(dir, e))?;

    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| TrustError::io(dir, e))?;
    staged.write_all(bytes).map_err(|e| TrustError::io(staged.path(), e))?;
    staged.persist(path).map_err(|e| TrustError::io(path, e.error))?;
    Ok(())
}
