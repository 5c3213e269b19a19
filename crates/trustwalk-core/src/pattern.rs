//! Path patterns that scope a delegation, and glob scopes for target discovery

use crate::errors::{Result, TrustError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A regular expression a role is authoritative over
///
/// Matching is anchored at the start of the target identifier only: `pkg/a/`
/// matches `pkg/a/x.tar.gz`, and `.*` matches every identifier. Patterns are
/// compiled once when constructed, never per query.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathPattern {
    source: String,
    regex: Regex,
}

impl PathPattern {
    /// Compile a pattern, rejecting malformed expressions
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let regex = Regex::new(&format!("^(?:{source})"))
            .map_err(|e| TrustError::pattern(source.clone(), e))?;
        Ok(Self { source, regex })
    }

    /// Compile every pattern in a list
    pub fn compile_all<I, S>(sources: I) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        sources.into_iter().map(Self::new).collect()
    }

    /// Whether the target identifier falls under this pattern
    pub fn matches(&self, target: &str) -> bool {
        self.regex.is_match(target)
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

/// Whether any pattern in the list matches the target
pub fn any_match(patterns: &[PathPattern], target: &str) -> bool {
    patterns.iter().any(|p| p.matches(target))
}

impl PartialEq for PathPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for PathPattern {}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PathPattern").field(&self.source).finish()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for PathPattern {
    type Error = TrustError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PathPattern> for String {
    fn from(value: PathPattern) -> Self {
        value.source
    }
}

/// A glob, relative to the target directory, selecting files a role holds
/// directly (for example `packages/*/*/chem/*`)
#[derive(Clone, PartialEq, Eq)]
pub struct TargetGlob {
    pattern: glob::Pattern,
}

impl TargetGlob {
    /// Validate a glob
    pub fn new(source: impl AsRef<str>) -> Result<Self> {
        let source = source.as_ref();
        if source.starts_with('/') {
            return Err(TrustError::pattern(
                source,
                "target globs are relative to the target directory",
            ));
        }
        let pattern = glob::Pattern::new(source).map_err(|e| TrustError::pattern(source, e))?;
        Ok(Self { pattern })
    }

    /// The glob as written
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl fmt::Debug for TargetGlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TargetGlob").field(&self.as_str()).finish()
    }
}
