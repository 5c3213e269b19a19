//! Project-repository delegation layout
//!
//! Projects are split into four groups, each served by its own branch under
//! the `projects` root:
//!
//! ```text
//! projects
//! ├── projects/claimed-projects          one non-backtracking role per project
//! ├── projects/rarely-updated-projects   one role holding every project's targets
//! ├── projects/new-projects              one non-backtracking role per project
//! └── projects/unclaimed-projects        catch-all holding the remaining targets
//! ```

use crate::errors::{Result, TrustError};
use crate::registry::Registry;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::collections::BTreeSet;
use std::path::Path;

/// Root of the layout
pub const PROJECTS_ROLE: &str = "projects";
/// Parent of per-project roles for claimed projects
pub const CLAIMED_ROLE: &str = "projects/claimed-projects";
/// Single role for rarely updated projects
pub const RARELY_UPDATED_ROLE: &str = "projects/rarely-updated-projects";
/// Parent of per-project roles for new projects
pub const NEW_ROLE: &str = "projects/new-projects";
/// Catch-all role for unclaimed projects
pub const UNCLAIMED_ROLE: &str = "projects/unclaimed-projects";

const CATCH_ALL: &str = ".*";

/// Projects assigned to the four layout groups
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPartition {
    /// Projects with their own delegated role
    pub claimed: Vec<String>,
    /// Projects served together by one role
    pub rarely_updated: Vec<String>,
    /// Recently registered projects with their own role
    pub new: Vec<String>,
    /// Everything else
    pub unclaimed: Vec<String>,
}

impl ProjectPartition {
    /// Shuffle `projects` with `seed` and deal them into quarters
    ///
    /// Duplicates are dropped and the input order does not matter: equal
    /// project sets and seeds give equal partitions. The remainder of the
    /// division goes to `unclaimed`.
    pub fn split<I, S>(projects: I, seed: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = projects.into_iter().map(Into::into).collect();
        let mut projects: Vec<String> = unique.into_iter().collect();
        projects.shuffle(&mut ChaCha20Rng::seed_from_u64(seed));

        let quarter = projects.len() / 4;
        let unclaimed = projects.split_off(3 * quarter);
        let new = projects.split_off(2 * quarter);
        let rarely_updated = projects.split_off(quarter);
        Self {
            claimed: projects,
            rarely_updated,
            new,
            unclaimed,
        }
    }

    /// Total number of projects
    pub fn len(&self) -> usize {
        self.claimed.len() + self.rarely_updated.len() + self.new.len() + self.unclaimed.len()
    }

    /// Whether no project was assigned
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Subdirectory names of a simple index directory, sorted
pub fn list_projects(simple_dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(simple_dir).map_err(|e| TrustError::io(simple_dir, e))?;
    let mut projects = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TrustError::io(simple_dir, e))?;
        let file_type = entry.file_type().map_err(|e| TrustError::io(entry.path(), e))?;
        if !file_type.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => projects.push(name),
            Err(name) => tracing::warn!(name = ?name, "skipping project with non UTF-8 name"),
        }
    }
    projects.sort();
    Ok(projects)
}

/// Delegation pattern for every file of `project`
pub fn project_path_pattern(project: &str) -> String {
    format!("packages/.*/.*/{}/.*", regex::escape(project))
}

/// Target scope, relative to the target directory, for files of `project`
pub fn project_target_scope(project: &str) -> String {
    format!("packages/*/*/{}/*", glob::Pattern::escape(project))
}

/// Register, delegate and freeze the full project layout
pub fn build_project_registry(partition: &ProjectPartition, seed: u64) -> Result<Registry> {
    let mut registry = Registry::with_seed(seed);

    registry.register_role(PROJECTS_ROLE, [CATCH_ALL], true)?;

    registry.register_role(CLAIMED_ROLE, [CATCH_ALL], true)?;
    let claimed = register_project_roles(&mut registry, CLAIMED_ROLE, &partition.claimed)?;
    registry.delegate(CLAIMED_ROLE, claimed)?;

    registry.register_role(
        RARELY_UPDATED_ROLE,
        partition.rarely_updated.iter().map(|p| project_path_pattern(p)),
        false,
    )?;
    registry.assign_target_scope(
        RARELY_UPDATED_ROLE,
        partition.rarely_updated.iter().map(|p| project_target_scope(p)),
    )?;

    registry.register_role(NEW_ROLE, [CATCH_ALL], true)?;
    let new = register_project_roles(&mut registry, NEW_ROLE, &partition.new)?;
    registry.delegate(NEW_ROLE, new)?;

    registry.register_role(UNCLAIMED_ROLE, [CATCH_ALL], true)?;
    registry.assign_target_scope(
        UNCLAIMED_ROLE,
        partition.unclaimed.iter().map(|p| project_target_scope(p)),
    )?;

    registry.delegate(
        PROJECTS_ROLE,
        [CLAIMED_ROLE, RARELY_UPDATED_ROLE, NEW_ROLE, UNCLAIMED_ROLE],
    )?;
    registry.freeze()?;

    tracing::info!(
        claimed = partition.claimed.len(),
        rarely_updated = partition.rarely_updated.len(),
        new = partition.new.len(),
        unclaimed = partition.unclaimed.len(),
        roles = registry.len(),
        "built project registry"
    );
    Ok(registry)
}

fn register_project_roles(registry: &mut Registry, parent: &str, projects: &[String]) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(projects.len());
    for project in projects {
        let name = format!("{parent}/{project}");
        registry.register_role(&name, [project_path_pattern(project)], false)?;
        registry.assign_target_scope(&name, [project_target_scope(project)])?;
        names.push(name);
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TargetSource;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("project{i}")).collect()
    }

    #[test]
    fn split_deals_quarters_with_remainder_unclaimed() {
        let partition = ProjectPartition::split(names(10), 7);
        assert_eq!(partition.claimed.len(), 2);
        assert_eq!(partition.rarely_updated.len(), 2);
        assert_eq!(partition.new.len(), 2);
        assert_eq!(partition.unclaimed.len(), 4);
        assert_eq!(partition.len(), 10);

        let mut all: Vec<String> = [
            &partition.claimed,
            &partition.rarely_updated,
            &partition.new,
            &partition.unclaimed,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect();
        all.sort();
        let mut expected = names(10);
        expected.sort();
        assert_eq!(all, expected);
    }

    #[test]
    fn split_ignores_input_order_and_duplicates() {
        let mut reversed = names(12);
        reversed.reverse();
        reversed.push("project3".to_string());
        assert_eq!(ProjectPartition::split(names(12), 1), ProjectPartition::split(reversed, 1));
    }

    #[test]
    fn tiny_inputs_are_all_unclaimed() {
        let partition = ProjectPartition::split(names(3), 0);
        assert!(partition.claimed.is_empty());
        assert_eq!(partition.unclaimed.len(), 3);
        assert!(ProjectPartition::split(Vec::<String>::new(), 0).is_empty());
    }

    #[test]
    fn registry_follows_layout() {
        let partition = ProjectPartition {
            claimed: vec!["chem".into()],
            rarely_updated: vec!["zyzz".into(), "zope.web".into()],
            new: vec!["agree".into()],
            unclaimed: vec!["zzz".into()],
        };
        let registry = build_project_registry(&partition, 3).unwrap();
        assert!(registry.is_frozen());
        assert_eq!(registry.len(), 7);

        let root = registry.lookup(PROJECTS_ROLE).unwrap();
        assert_eq!(
            root.delegations(),
            [CLAIMED_ROLE, RARELY_UPDATED_ROLE, NEW_ROLE, UNCLAIMED_ROLE]
        );

        let chem = registry.lookup("projects/claimed-projects/chem").unwrap();
        assert!(!chem.backtrack());
        assert!(chem.paths()[0].matches("packages/source/c/chem/chem-2.0.tar.gz"));
        assert!(!chem.paths()[0].matches("packages/source/c/chemistry/chemistry-1.0.tar.gz"));

        let rarely = registry.lookup(RARELY_UPDATED_ROLE).unwrap();
        assert!(!rarely.backtrack());
        assert_eq!(rarely.paths().len(), 2);
        assert!(rarely.paths()[1].matches("packages/source/z/zope.web/zope.web-1.0.zip"));
        assert!(!rarely.paths()[1].matches("packages/source/z/zopeXweb/zopeXweb-1.0.zip"));
        assert!(matches!(rarely.targets(), TargetSource::Scope(globs) if globs.len() == 2));

        let unclaimed = registry.lookup(UNCLAIMED_ROLE).unwrap();
        assert!(unclaimed.backtrack());
        assert!(unclaimed.delegations().is_empty());
    }

    #[test]
    fn list_projects_returns_sorted_directories() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["zzz", "agree", "chem"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("index.html"), b"").unwrap();
        assert_eq!(list_projects(dir.path()).unwrap(), ["agree", "chem", "zzz"]);
    }

    #[test]
    fn escaping_keeps_scopes_literal() {
        assert_eq!(project_target_scope("a[1]"), "packages/*/*/a[[]1[]]/*");
        assert!(!regex::Regex::new(&project_path_pattern("a+b"))
            .unwrap()
            .is_match("packages/s/a/aab/aab-1.tar.gz"));
    }
}
