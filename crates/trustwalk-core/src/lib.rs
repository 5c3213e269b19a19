//! Trustwalk Core - delegated targets metadata and preorder resolution
//!
//! A repository of targets (files identified by relative path) is served by a
//! tree of roles. Each role signs one document listing the targets it vouches
//! for directly and the ordered delegations it hands to other roles.
//!
//! # Pipeline
//!
//! 1. [`Registry`]: register roles with their path patterns and backtrack
//!    flag, record delegations, bind target sources, then freeze.
//! 2. [`MetadataBuilder`]: turn every frozen role into a [`SignedDocument`]
//!    and publish it atomically as `<output_dir>/<role>.json`.
//! 3. [`Resolver`]: walk the published documents from a root role in
//!    preorder and report which role, if any, is authoritative for a target.
//!
//! [`layout`] wires these together for the four-branch project layout.

#![forbid(unsafe_code)]

/// Metadata builder and atomic publication
pub mod builder;

/// Layered configuration (defaults, TOML, environment)
pub mod config;

/// On-disk signed document format
pub mod document;

/// Unified error handling
pub mod errors;

/// SHA-256 helpers
pub mod hash;

/// Key identifiers and seeded key generation
pub mod keys;

/// Project repository layout
pub mod layout;

/// Validated, query-ready role documents
pub mod metadata;

/// Delegation path patterns and target globs
pub mod pattern;

/// Key/role registry
pub mod registry;

/// Preorder delegation resolver
pub mod resolver;

/// Signing seam and the pseudo-signer
pub mod signer;

/// Document stores and caching
pub mod store;

pub use builder::{build_all, BuildReport, MetadataBuilder};
pub use config::{BuildConfig, LayoutConfig, ResolveConfig, TrustwalkConfig};
pub use document::{SignedDocument, TargetRecord, TargetsPayload, DELEGATION_THRESHOLD, EXPIRY_DAYS};
pub use errors::{Result, TrustError};
pub use keys::{Key, KeyId, KeyType};
pub use layout::{build_project_registry, ProjectPartition};
pub use metadata::{DelegationRule, RoleMetadata};
pub use pattern::{PathPattern, TargetGlob};
pub use registry::{Registry, Role, TargetSource};
pub use resolver::{Authority, Resolution, Resolver, Walk};
pub use signer::{PseudoSigner, Signer, SigningPayload};
pub use store::{CachedStore, DocumentStore, FileStore, MemoryStore};
