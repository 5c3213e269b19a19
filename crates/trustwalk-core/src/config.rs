//! Configuration for builds, project layouts and resolution
//!
//! Values come from three layers, later ones winning: built-in defaults, a
//! TOML file, and `TRUSTWALK_*` environment variables. [`TrustwalkConfig::validate`]
//! runs after merging.

use crate::document::expiry_for;
use crate::errors::{Result, TrustError};
use crate::registry::validate_role_name;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "TRUSTWALK_";

/// Settings for one metadata build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Where documents are published
    pub output_dir: PathBuf,
    /// Root that target globs and target identifiers are relative to
    pub targets_dir: PathBuf,
    /// Seconds since the Unix epoch; signatures cover it and expiry derives from it
    pub reference_timestamp: i64,
    /// Version written into every document
    pub version: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("metadata"),
            targets_dir: PathBuf::from("web"),
            reference_timestamp: 0,
            version: 0,
        }
    }
}

/// Settings for the project registry layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Simple index directory; each subdirectory names one project
    pub simple_dir: PathBuf,
    /// Seed for the project split and for key generation
    pub seed: u64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            simple_dir: PathBuf::from("web/simple"),
            seed: 0,
        }
    }
}

/// Settings for resolution queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveConfig {
    /// Role every walk starts from
    pub root: String,
    /// Whether visited documents must carry valid pseudo-signatures
    pub verify_signatures: bool,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            root: "projects".to_string(),
            verify_signatures: false,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrustwalkConfig {
    /// `[build]` table
    pub build: BuildConfig,
    /// `[layout]` table
    pub layout: LayoutConfig,
    /// `[resolve]` table
    pub resolve: ResolveConfig,
}

impl TrustwalkConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| TrustError::config(format!("invalid TOML: {e}")))
    }

    /// Read and parse a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| TrustError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    /// File (if it exists), then environment, then validation
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Self::default()
        };
        config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TRUSTWALK_*` variables from the process environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Apply `TRUSTWALK_*` overrides from an explicit variable list
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.into();
            match name {
                "OUTPUT_DIR" => self.build.output_dir = PathBuf::from(value),
                "TARGETS_DIR" => self.build.targets_dir = PathBuf::from(value),
                "REFERENCE_TIMESTAMP" => self.build.reference_timestamp = parse_number(name, &value)?,
                "VERSION" => self.build.version = parse_number(name, &value)?,
                "SIMPLE_DIR" => self.layout.simple_dir = PathBuf::from(value),
                "SEED" => self.layout.seed = parse_number(name, &value)?,
                "ROOT" => self.resolve.root = value,
                "VERIFY_SIGNATURES" => self.resolve.verify_signatures = parse_bool(name, &value)?,
                other => tracing::warn!(variable = %other, "ignoring unknown TRUSTWALK_ variable"),
            }
        }
        Ok(())
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.build.output_dir.as_os_str().is_empty() {
            return Err(TrustError::config("build.output_dir must not be empty"));
        }
        if self.build.targets_dir.as_os_str().is_empty() {
            return Err(TrustError::config("build.targets_dir must not be empty"));
        }
        if self.build.output_dir == self.build.targets_dir {
            return Err(TrustError::config(
                "build.output_dir and build.targets_dir must differ",
            ));
        }
        expiry_for(self.build.reference_timestamp)?;
        validate_role_name(&self.resolve.root)
            .map_err(|e| TrustError::config(format!("resolve.root: {e}")))?;
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| TrustError::config(format!("{ENV_PREFIX}{name}={value:?}: {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(TrustError::config(format!(
            "{ENV_PREFIX}{name}={value:?} is not a boolean"
        ))),
    }
}
