//! Preorder delegation resolver
//!
//! Answers "which role is authoritative for this target, and what does it
//! claim?" by walking the delegation tree from a root role:
//!
//! 1. A role's own `targets` entry wins over anything it delegates.
//! 2. Otherwise its delegatees are consulted in declared order; delegatees
//!    whose path patterns do not cover the target are skipped.
//! 3. A covering delegatee that resolves the target ends the walk.
//! 4. A covering delegatee that does *not* resolve it lets the scan continue
//!    only if its `backtrack` flag is set. With `backtrack = false` the parent
//!    gives up immediately and reports not-found to its own parent, even if a
//!    later sibling would have matched.
//!
//! Rule 4 is stricter than most delegation systems, which simply move on to
//! the next matching sibling: a non-backtracking delegatee that claims a path
//! blocks every lower-priority claim on it.
//!
//! The walk runs on an explicit stack. A role that reappears on the active
//! delegation path is reported as [`TrustError::CycleDetected`]; the on-path
//! set and the document snapshot both live for a single query.

use crate::document::TargetRecord;
use crate::errors::{Result, TrustError};
use crate::keys::KeyId;
use crate::metadata::{DelegationRule, RoleMetadata};
use crate::signer::Signer;
use crate::store::DocumentStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// The role that vouches for a target, and its claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    /// Authoritative role
    pub role: String,
    /// Roles from the root down to (and including) the authoritative role
    pub delegation_path: Vec<String>,
    /// Hash and length claimed for the target
    pub record: TargetRecord,
}

/// Outcome of a resolution; absence is a normal value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Some role vouches for the target
    Found(Authority),
    /// No reachable role vouches for the target
    NotFound,
}

impl Resolution {
    /// The claimed record, if found
    pub fn record(&self) -> Option<&TargetRecord> {
        match self {
            Self::Found(authority) => Some(&authority.record),
            Self::NotFound => None,
        }
    }

    /// The authoritative role, if found
    pub fn role(&self) -> Option<&str> {
        match self {
            Self::Found(authority) => Some(&authority.role),
            Self::NotFound => None,
        }
    }

    /// Whether some role vouches for the target
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// A resolution together with the roles it visited, in visiting order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Walk {
    /// Outcome
    pub resolution: Resolution,
    /// Every role whose document was consulted, root first
    pub visited: Vec<String>,
}

struct Frame {
    metadata: Arc<RoleMetadata>,
    /// Index of the next delegation to consider
    next: usize,
}

impl Frame {
    fn new(metadata: Arc<RoleMetadata>) -> Self {
        Self { metadata, next: 0 }
    }

    /// Advance to the next delegation covering `target`
    fn next_covering(&mut self, target: &str) -> Option<usize> {
        let rules = self.metadata.delegations();
        while self.next < rules.len() {
            let idx = self.next;
            self.next += 1;
            if rules[idx].covers(target) {
                return Some(idx);
            }
        }
        None
    }

    /// The delegation most recently descended into
    fn consulted(&self) -> Option<&DelegationRule> {
        self.next
            .checked_sub(1)
            .and_then(|idx| self.metadata.delegations().get(idx))
    }
}

/// Per-query state: documents already loaded and roles on the active path
#[derive(Default)]
struct Query {
    snapshot: HashMap<String, Arc<RoleMetadata>>,
    on_path: HashSet<String>,
    visited: Vec<String>,
}

/// Preorder resolver over a [`DocumentStore`]
pub struct Resolver<S> {
    store: S,
    signer: Option<Box<dyn Signer>>,
    root_keys: Vec<KeyId>,
}

impl<S: DocumentStore> Resolver<S> {
    /// Resolver that trusts document contents as loaded
    pub fn new(store: S) -> Self {
        Self {
            store,
            signer: None,
            root_keys: Vec::new(),
        }
    }

    /// Require every visited document to carry valid signatures
    ///
    /// Delegated documents must be signed by at least `threshold` of the key
    /// ids their parent delegated to. The root document must be signed by one
    /// of the keys given to [`Resolver::with_root_keys`], or by any key if
    /// none were given.
    pub fn with_signature_checks(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Some(Box::new(signer));
        self
    }

    /// Keys trusted to sign the root role's document
    pub fn with_root_keys(mut self, keys: impl IntoIterator<Item = KeyId>) -> Self {
        self.root_keys = keys.into_iter().collect();
        self
    }

    /// The underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve `target` starting at `root`
    pub fn resolve(&self, root: &str, target: &str) -> Result<Resolution> {
        self.walk(root, target).map(|walk| walk.resolution)
    }

    /// Resolve `target` starting at `root`, recording the visited roles
    ///
    /// Documents are loaded lazily as the walk reaches them. Each one is read
    /// at most once per query, but stores backed by a live directory (such as
    /// [`FileStore`](crate::FileStore)) can return a parent from one build and
    /// a child from the next if a rebuild lands mid-walk. Point the store at a
    /// directory that is not rebuilt in place when walks must see a single
    /// build.
    pub fn walk(&self, root: &str, target: &str) -> Result<Walk> {
        let mut query = Query::default();
        let resolution = self.run(&mut query, root, target)?;
        tracing::debug!(
            root = %root,
            target = %target,
            found = resolution.is_found(),
            visited = query.visited.len(),
            "resolution finished"
        );
        Ok(Walk {
            resolution,
            visited: query.visited,
        })
    }

    fn run(&self, query: &mut Query, root: &str, target: &str) -> Result<Resolution> {
        let root_metadata = self.enter(query, root, None)?;
        if let Some(record) = root_metadata.target(target) {
            return Ok(found(&[], &root_metadata, record));
        }
        let mut stack = vec![Frame::new(root_metadata)];

        while let Some(top) = stack.last_mut() {
            if let Some(idx) = top.next_covering(target) {
                let parent = Arc::clone(&top.metadata);
                let rule = &parent.delegations()[idx];
                let child = self.enter(query, rule.name(), Some(rule))?;

                if let Some(record) = child.target(target) {
                    return Ok(found(&stack, &child, record));
                }
                stack.push(Frame::new(child));
                continue;
            }

            // This role's delegations are exhausted without a hit. Report
            // not-found upward until some ancestor may keep scanning.
            loop {
                let Some(done) = stack.pop() else {
                    return Ok(Resolution::NotFound);
                };
                query.on_path.remove(done.metadata.name());

                let Some(parent) = stack.last() else {
                    return Ok(Resolution::NotFound);
                };
                match parent.consulted() {
                    Some(rule) if rule.backtrack() => break,
                    Some(rule) => {
                        tracing::debug!(
                            role = %parent.metadata.name(),
                            delegatee = %rule.name(),
                            "delegatee without backtrack failed to resolve; abandoning siblings"
                        );
                    }
                    None => {}
                }
            }
        }
        Ok(Resolution::NotFound)
    }

    /// Load a role for this query, checking for cycles and signatures
    fn enter(
        &self,
        query: &mut Query,
        role: &str,
        delegation: Option<&DelegationRule>,
    ) -> Result<Arc<RoleMetadata>> {
        if !query.on_path.insert(role.to_string()) {
            return Err(TrustError::CycleDetected {
                role: role.to_string(),
            });
        }
        query.visited.push(role.to_string());
        tracing::debug!(role = %role, depth = query.on_path.len(), "visiting role");

        let metadata = match query.snapshot.get(role) {
            Some(metadata) => Arc::clone(metadata),
            None => {
                let metadata = self.store.load(role)?;
                query.snapshot.insert(role.to_string(), Arc::clone(&metadata));
                metadata
            }
        };
        self.check_signatures(&metadata, delegation)?;
        Ok(metadata)
    }

    fn check_signatures(&self, metadata: &RoleMetadata, delegation: Option<&DelegationRule>) -> Result<()> {
        let Some(signer) = &self.signer else {
            return Ok(());
        };

        let (allowed, threshold): (&[KeyId], u32) = match delegation {
            Some(rule) => (rule.keyids(), rule.threshold()),
            None => (self.root_keys.as_slice(), 1),
        };
        let payload = metadata.document().signed.signing_payload();

        let mut valid = HashSet::new();
        for entry in &metadata.document().signatures {
            let trusted = (allowed.is_empty() && delegation.is_none()) || allowed.contains(&entry.keyid);
            if trusted && entry.method == signer.method() && signer.verify(&payload, &entry.sig) {
                valid.insert(&entry.keyid);
            }
        }

        if (valid.len() as u64) < u64::from(threshold) {
            return Err(TrustError::metadata_unavailable(
                metadata.name(),
                format!("{} of {threshold} required signatures are valid", valid.len()),
            ));
        }
        Ok(())
    }
}

fn found(stack: &[Frame], role: &RoleMetadata, record: &TargetRecord) -> Resolution {
    let mut delegation_path: Vec<String> = stack.iter().map(|f| f.metadata.name().to_string()).collect();
    delegation_path.push(role.name().to_string());
    Resolution::Found(Authority {
        role: role.name().to_string(),
        delegation_path,
        record: record.clone(),
    })
}
