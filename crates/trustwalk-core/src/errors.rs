//! Error types for registry construction, metadata builds and trust walks
//!
//! A target that no role is authoritative for is *not* an error: the resolver
//! reports it as [`Resolution::NotFound`](crate::Resolution::NotFound).
//! Everything here is structural and fails fast without retries.

use std::path::PathBuf;

/// Unified error type for trustwalk operations
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    /// A role with this name is already registered
    #[error("Role already registered: {name}")]
    DuplicateRole {
        /// Offending role name
        name: String,
    },

    /// A referenced role is not registered
    #[error("Unknown role: {name}")]
    UnknownRole {
        /// Missing role name
        name: String,
    },

    /// Role names become document paths, so they must be clean relative paths
    #[error("Invalid role name {name:?}: {reason}")]
    InvalidRoleName {
        /// Offending role name
        name: String,
        /// What is wrong with it
        reason: String,
    },

    /// Delegation list rejected before it reached the registry
    #[error("Invalid delegation from {parent}: {reason}")]
    InvalidDelegation {
        /// Delegating role
        parent: String,
        /// What is wrong with the child list
        reason: String,
    },

    /// Mutation attempted after the build phase ended
    #[error("Registry is frozen; {operation} is not permitted")]
    RegistryFrozen {
        /// The rejected operation
        operation: &'static str,
    },

    /// An operation needs the build phase to be over
    #[error("Registry must be frozen before {operation}")]
    RegistryNotFrozen {
        /// The operation that was attempted too early
        operation: &'static str,
    },

    /// Malformed path pattern or target glob
    #[error("Invalid pattern {pattern:?}: {reason}")]
    Pattern {
        /// The pattern text
        pattern: String,
        /// Compiler message
        reason: String,
    },

    /// The signed document of a role reached during a walk is missing or invalid
    #[error("Metadata unavailable for role {role}: {reason}")]
    MetadataUnavailable {
        /// Role whose document could not be used
        role: String,
        /// Why the document was rejected
        reason: String,
    },

    /// A role is reachable from itself through delegations
    #[error("Delegation cycle detected at role {role}")]
    CycleDetected {
        /// First role seen twice on one delegation path
        role: String,
    },

    /// Filesystem failure while building or loading metadata
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Document encoding failure
    #[error("Serialization error: {message}")]
    Serialization {
        /// Encoder message
        message: String,
    },

    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Config {
        /// What is wrong with the configuration
        message: String,
    },
}

impl TrustError {
    /// Create an unknown role error
    pub fn unknown_role(name: impl Into<String>) -> Self {
        Self::UnknownRole { name: name.into() }
    }

    /// Create a pattern error
    pub fn pattern(pattern: impl Into<String>, reason: impl ToString) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a metadata unavailable error
    pub fn metadata_unavailable(role: impl Into<String>, reason: impl ToString) -> Self {
        Self::MetadataUnavailable {
            role: role.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an I/O error bound to a path
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for TrustError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

/// Standard Result type for trustwalk operations
pub type Result<T> = std::result::Result<T, TrustError>;
