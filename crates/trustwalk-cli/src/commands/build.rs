//! `trustwalk build`

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use trustwalk_core::layout::list_projects;
use trustwalk_core::{build_all, build_project_registry, BuildReport, ProjectPartition, TrustwalkConfig};

/// Overrides for one build; unset flags keep the configured values
#[derive(Debug, Clone, Args)]
pub struct BuildArgs {
    /// Simple index directory listing one subdirectory per project
    #[arg(long)]
    pub simple_dir: Option<PathBuf>,

    /// Root that target paths are relative to
    #[arg(long)]
    pub targets_dir: Option<PathBuf>,

    /// Where documents are published
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Seed for the project split and key generation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Version written into every document
    #[arg(long = "doc-version")]
    pub doc_version: Option<u64>,

    /// Reference timestamp in seconds since the Unix epoch
    #[arg(long)]
    pub timestamp: Option<i64>,
}

impl BuildArgs {
    fn apply(self, config: &mut TrustwalkConfig) {
        if let Some(dir) = self.simple_dir {
            config.layout.simple_dir = dir;
        }
        if let Some(dir) = self.targets_dir {
            config.build.targets_dir = dir;
        }
        if let Some(dir) = self.output {
            config.build.output_dir = dir;
        }
        if let Some(seed) = self.seed {
            config.layout.seed = seed;
        }
        if let Some(version) = self.doc_version {
            config.build.version = version;
        }
        if let Some(timestamp) = self.timestamp {
            config.build.reference_timestamp = timestamp;
        }
    }
}

/// Build and publish the project layout
pub fn run(args: BuildArgs, mut config: TrustwalkConfig) -> Result<ExitCode> {
    args.apply(&mut config);
    let report = execute(&config)?;
    println!(
        "wrote {} documents ({} targets) to {}",
        report.documents.len(),
        report.targets,
        config.build.output_dir.display()
    );
    Ok(ExitCode::SUCCESS)
}

/// Split the projects listed under the simple index and publish every document
pub fn execute(config: &TrustwalkConfig) -> Result<BuildReport> {
    config.validate().context("invalid build settings")?;

    let simple_dir = &config.layout.simple_dir;
    let projects = list_projects(simple_dir)
        .with_context(|| format!("listing projects under {}", simple_dir.display()))?;
    tracing::info!(projects = projects.len(), dir = %simple_dir.display(), "found projects");

    let partition = ProjectPartition::split(projects, config.layout.seed);
    let registry = build_project_registry(&partition, config.layout.seed)
        .context("building project registry")?;
    build_all(&registry, &config.build).context("publishing metadata")
}
