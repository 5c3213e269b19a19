//! CLI command handlers

pub mod build;
pub mod resolve;

use anyhow::{Context, Result};
use std::path::Path;
use trustwalk_core::TrustwalkConfig;

/// Load the layered configuration rooted at `path`
pub fn load_config(path: &Path) -> Result<TrustwalkConfig> {
    TrustwalkConfig::load(path).with_context(|| format!("loading config from {}", path.display()))
}
