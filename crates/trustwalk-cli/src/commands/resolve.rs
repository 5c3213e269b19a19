//! `trustwalk resolve`

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use trustwalk_core::{FileStore, PseudoSigner, Resolution, Resolver, TrustwalkConfig, Walk};

/// One resolution query
#[derive(Debug, Clone, Args)]
pub struct ResolveArgs {
    /// Target identifier, relative to the target directory
    pub target: String,

    /// Role the walk starts from
    #[arg(long)]
    pub root: Option<String>,

    /// Directory holding the published documents
    #[arg(long)]
    pub metadata_dir: Option<PathBuf>,

    /// Require valid pseudo-signatures on every visited document
    #[arg(long)]
    pub verify: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Resolve a target; exits with status 1 when no role vouches for it
pub fn run(args: ResolveArgs, config: TrustwalkConfig) -> Result<ExitCode> {
    let walk = execute(&args, &config)?;

    if args.json {
        println!("{}", render_json(&args.target, &walk));
    } else {
        print_human(&args.target, &walk);
    }

    Ok(if walk.resolution.is_found() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Walk the published documents for one target
pub fn execute(args: &ResolveArgs, config: &TrustwalkConfig) -> Result<Walk> {
    let root = args.root.as_deref().unwrap_or(&config.resolve.root);
    let dir = args.metadata_dir.as_ref().unwrap_or(&config.build.output_dir);

    let mut resolver = Resolver::new(FileStore::new(dir));
    if args.verify || config.resolve.verify_signatures {
        resolver = resolver.with_signature_checks(PseudoSigner);
    }

    resolver
        .walk(root, &args.target)
        .with_context(|| format!("resolving {} from {root} in {}", args.target, dir.display()))
}

fn print_human(target: &str, walk: &Walk) {
    match &walk.resolution {
        Resolution::Found(authority) => {
            println!("{target}: {}", authority.role);
            println!("  path:   {}", authority.delegation_path.join(" -> "));
            println!("  sha256: {}", authority.record.hashes.sha256);
            println!("  length: {}", authority.record.length);
        }
        Resolution::NotFound => println!("{target}: not found"),
    }
    println!("  visited {} roles", walk.visited.len());
}

fn render_json(target: &str, walk: &Walk) -> serde_json::Value {
    match &walk.resolution {
        Resolution::Found(authority) => json!({
            "target": target,
            "found": true,
            "role": authority.role,
            "delegation_path": authority.delegation_path,
            "record": authority.record,
            "visited": walk.visited,
        }),
        Resolution::NotFound => json!({
            "target": target,
            "found": false,
            "visited": walk.visited,
        }),
    }
}
