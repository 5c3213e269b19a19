//! Document stores: where the resolver gets a role's metadata from
//!
//! All stores hand out validated [`RoleMetadata`] behind an `Arc`, so a
//! document loaded for one query stays intact even if the store is refreshed
//! while the query runs.

use crate::document::SignedDocument;
use crate::errors::{Result, TrustError};
use crate::metadata::RoleMetadata;
use crate::registry::validate_role_name;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Suffix of every published document
pub const DOCUMENT_SUFFIX: &str = ".json";

/// Path of a role's document below `dir`: slashes in the role name become
/// directories, and the last segment gets the `.json` suffix
pub fn role_document_path(dir: &Path, role: &str) -> PathBuf {
    let mut path = dir.to_path_buf();
    let mut segments = role.split('/').peekable();
    while let Some(segment) = segments.next() {
        if segments.peek().is_some() {
            path.push(segment);
        } else {
            path.push(format!("{segment}{DOCUMENT_SUFFIX}"));
        }
    }
    path
}

/// Loads role documents by name
pub trait DocumentStore {
    /// Load and validate the document of `role`
    ///
    /// Missing or invalid documents are [`TrustError::MetadataUnavailable`].
    fn load(&self, role: &str) -> Result<Arc<RoleMetadata>>;
}

impl<T: DocumentStore + ?Sized> DocumentStore for &T {
    fn load(&self, role: &str) -> Result<Arc<RoleMetadata>> {
        (**self).load(role)
    }
}

impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn load(&self, role: &str) -> Result<Arc<RoleMetadata>> {
        (**self).load(role)
    }
}

/// Reads documents from a builder's output directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DocumentStore for FileStore {
    fn load(&self, role: &str) -> Result<Arc<RoleMetadata>> {
        // Names come from parent documents; never let one escape the root
        validate_role_name(role).map_err(|e| TrustError::metadata_unavailable(role, e))?;

        let path = role_document_path(&self.dir, role);
        let bytes = std::fs::read(&path).map_err(|e| {
            TrustError::metadata_unavailable(role, format!("cannot read {}: {e}", path.display()))
        })?;
        tracing::trace!(role = %role, path = %path.display(), "loaded document");
        RoleMetadata::from_json(role, &bytes).map(Arc::new)
    }
}

/// Documents held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: HashMap<String, Arc<RoleMetadata>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store filled from `(role, document)` pairs
    pub fn from_documents<I>(documents: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, SignedDocument)>,
    {
        let mut store = Self::new();
        for (role, document) in documents {
            store.insert(&role, document)?;
        }
        Ok(store)
    }

    /// Validate and add (or replace) the document of `role`
    pub fn insert(&mut self, role: &str, document: SignedDocument) -> Result<()> {
        let metadata = RoleMetadata::from_document(role, document)?;
        self.documents.insert(role.to_string(), Arc::new(metadata));
        Ok(())
    }

    /// Drop the document of `role`
    pub fn remove(&mut self, role: &str) -> bool {
        self.documents.remove(role).is_some()
    }

    /// Number of stored documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the store holds no document
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self, role: &str) -> Result<Arc<RoleMetadata>> {
        self.documents
            .get(role)
            .cloned()
            .ok_or_else(|| TrustError::metadata_unavailable(role, "no document stored for role"))
    }
}

/// Read-through cache in front of another store
///
/// The cache is never refreshed implicitly: after a rebuild call
/// [`CachedStore::invalidate`] for the rebuilt roles or [`CachedStore::clear`].
/// Failed loads are not cached.
#[derive(Debug)]
pub struct CachedStore<S> {
    inner: S,
    cache: RwLock<HashMap<String, Arc<RoleMetadata>>>,
}

impl<S: DocumentStore> CachedStore<S> {
    /// Wrap a store
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Forget one role's cached document
    pub fn invalidate(&self, role: &str) -> bool {
        self.cache.write().remove(role).is_some()
    }

    /// Forget every cached document
    pub fn clear(&self) {
        self.cache.write().clear();
    }

    /// Number of cached documents
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: DocumentStore> DocumentStore for CachedStore<S> {
    fn load(&self, role: &str) -> Result<Arc<RoleMetadata>> {
        if let Some(hit) = self.cache.read().get(role) {
            return Ok(Arc::clone(hit));
        }
        let loaded = self.inner.load(role)?;
        self.cache
            .write()
            .entry(role.to_string())
            .or_insert_with(|| Arc::clone(&loaded));
        Ok(loaded)
    }
}
