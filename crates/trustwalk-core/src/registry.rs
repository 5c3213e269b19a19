//! Key/role registry
//!
//! The registry owns every [`Key`] and [`Role`] of one build session. It goes
//! through two phases: while *building*, roles are registered, delegated and
//! given target sources; once [`Registry::freeze`] succeeds the registry is
//! read-only and every mutator fails with [`TrustError::RegistryFrozen`].

use crate::document::TargetRecord;
use crate::errors::{Result, TrustError};
use crate::keys::{Key, KeyGenerator, KeyId};
use crate::pattern::{PathPattern, TargetGlob};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Where a role's direct targets come from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TargetSource {
    /// The role holds no targets itself
    #[default]
    None,
    /// Files under the target directory selected by these globs
    Scope(Vec<TargetGlob>),
    /// Records supplied directly, keyed by target identifier
    Records(BTreeMap<String, TargetRecord>),
}

impl TargetSource {
    /// Whether the role holds direct targets at all
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// A named authority in the delegation tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    name: String,
    keyids: Vec<KeyId>,
    paths: Vec<PathPattern>,
    backtrack: bool,
    delegations: Vec<String>,
    targets: TargetSource,
}

impl Role {
    /// Hierarchical role name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Keys this role signs with
    pub fn keyids(&self) -> &[KeyId] {
        &self.keyids
    }

    /// Path patterns this role is authoritative over
    pub fn paths(&self) -> &[PathPattern] {
        &self.paths
    }

    /// Whether a delegating parent may try later siblings after this role
    /// matched a target but did not resolve it
    pub fn backtrack(&self) -> bool {
        self.backtrack
    }

    /// Delegated sub-role names in priority order
    pub fn delegations(&self) -> &[String] {
        &self.delegations
    }

    /// Source of the role's direct targets
    pub fn targets(&self) -> &TargetSource {
        &self.targets
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Building,
    Frozen,
}

/// Registry of roles and keys for one build session
#[derive(Debug)]
pub struct Registry {
    roles: Vec<Role>,
    index: HashMap<String, usize>,
    keys: BTreeMap<KeyId, Key>,
    keygen: KeyGenerator,
    phase: Phase,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Empty registry drawing key material from OS entropy
    pub fn new() -> Self {
        Self::with_key_generator(KeyGenerator::from_entropy())
    }

    /// Empty registry with reproducible key material
    pub fn with_seed(seed: u64) -> Self {
        Self::with_key_generator(KeyGenerator::from_seed(seed))
    }

    fn with_key_generator(keygen: KeyGenerator) -> Self {
        Self {
            roles: Vec::new(),
            index: HashMap::new(),
            keys: BTreeMap::new(),
            keygen,
            phase: Phase::Building,
        }
    }

    /// Register a role with one fresh key and return that key's id
    pub fn register_role<I, S>(&mut self, name: &str, paths: I, backtrack: bool) -> Result<KeyId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_building("register_role")?;
        validate_role_name(name)?;
        if self.index.contains_key(name) {
            return Err(TrustError::DuplicateRole {
                name: name.to_string(),
            });
        }
        let paths = PathPattern::compile_all(paths)?;

        let key = loop {
            let candidate = self.keygen.generate();
            if !self.keys.contains_key(candidate.id()) {
                break candidate;
            }
        };
        let keyid = key.id().clone();
        self.keys.insert(keyid.clone(), key);

        self.index.insert(name.to_string(), self.roles.len());
        self.roles.push(Role {
            name: name.to_string(),
            keyids: vec![keyid.clone()],
            paths,
            backtrack,
            delegations: Vec::new(),
            targets: TargetSource::None,
        });

        tracing::debug!(role = %name, keyid = %keyid, backtrack, "registered role");
        Ok(keyid)
    }

    /// Record the ordered delegatees of `parent`, replacing any earlier list
    pub fn delegate<I, S>(&mut self, parent: &str, children: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_building("delegate")?;
        let parent_idx = self.position(parent)?;

        let children: Vec<String> = children.into_iter().map(Into::into).collect();
        self.check_delegatees(parent, &children)?;

        tracing::debug!(role = %parent, delegatees = children.len(), "recorded delegations");
        self.roles[parent_idx].delegations = children;
        Ok(())
    }

    fn check_delegatees(&self, parent: &str, children: &[String]) -> Result<()> {
        let mut seen = HashSet::with_capacity(children.len());
        for child in children {
            self.position(child)?;
            if child == parent {
                return Err(TrustError::InvalidDelegation {
                    parent: parent.to_string(),
                    reason: "a role cannot delegate to itself".to_string(),
                });
            }
            if !seen.insert(child.as_str()) {
                return Err(TrustError::InvalidDelegation {
                    parent: parent.to_string(),
                    reason: format!("{child} is listed more than once"),
                });
            }
        }
        Ok(())
    }

    /// Bind the source of a role's direct targets
    pub fn assign_targets(&mut self, name: &str, source: TargetSource) -> Result<()> {
        self.ensure_building("assign_targets")?;
        let idx = self.position(name)?;
        self.roles[idx].targets = source;
        Ok(())
    }

    /// Bind a glob scope, relative to the target directory, to a role
    pub fn assign_target_scope<I, S>(&mut self, name: &str, globs: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let globs = globs
            .into_iter()
            .map(TargetGlob::new)
            .collect::<Result<Vec<_>>>()?;
        self.assign_targets(name, TargetSource::Scope(globs))
    }

    /// Look up a role by name
    pub fn lookup(&self, name: &str) -> Result<&Role> {
        self.position(name).map(|idx| &self.roles[idx])
    }

    /// Look up key material by id
    pub fn key(&self, keyid: &KeyId) -> Option<&Key> {
        self.keys.get(keyid)
    }

    /// Roles in registration order
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.iter()
    }

    /// Number of registered roles
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Whether no role is registered
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Whether the build phase is over
    pub fn is_frozen(&self) -> bool {
        self.phase == Phase::Frozen
    }

    /// End the build phase
    ///
    /// Fails with [`TrustError::CycleDetected`] if any role can reach itself
    /// through delegations; the registry then stays in the build phase.
    pub fn freeze(&mut self) -> Result<()> {
        if let Some(role) = self.find_cycle() {
            return Err(TrustError::CycleDetected {
                role: role.to_string(),
            });
        }
        self.phase = Phase::Frozen;
        tracing::debug!(roles = self.roles.len(), "registry frozen");
        Ok(())
    }

    fn ensure_building(&self, operation: &'static str) -> Result<()> {
        match self.phase {
            Phase::Building => Ok(()),
            Phase::Frozen => Err(TrustError::RegistryFrozen { operation }),
        }
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| TrustError::unknown_role(name))
    }

    /// Depth-first search with an explicit stack; returns the first role found
    /// on its own delegation path
    fn find_cycle(&self) -> Option<&str> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            OnPath,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.roles.len()];
        for start in 0..self.roles.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            marks[start] = Mark::OnPath;
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];

            while let Some(frame) = stack.last_mut() {
                let (node, next) = *frame;
                let children = &self.roles[node].delegations;
                if next < children.len() {
                    frame.1 += 1;
                    let child = self.index[&children[next]];
                    match marks[child] {
                        Mark::OnPath => return Some(self.roles[child].name.as_str()),
                        Mark::Unvisited => {
                            marks[child] = Mark::OnPath;
                            stack.push((child, 0));
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }
        None
    }
}

/// Role names double as relative document paths
pub(crate) fn validate_role_name(name: &str) -> Result<()> {
    let invalid = |reason: &str| TrustError::InvalidRoleName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.contains('\\') || name.contains('\0') {
        return Err(invalid("name contains a forbidden character"));
    }
    for segment in name.split('/') {
        match segment {
            "" => return Err(invalid("name has an empty path segment")),
            "." | ".." => return Err(invalid("name has a relative path segment")),
            _ => {}
        }
    }
    Ok(())
}
