/*!
 * Tree Store
 * In-memory ordered path->resource backend
 */

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use crate::matcher::{is_pattern, GlobMatcher, PathMatcher};
use crate::paths::{self, ancestors, canonicalize, file_name, is_base_path, is_root, join};
use crate::resource::{RepoId, Resource, ResourceSet};
use crate::traits::Repository;
use crate::types::{RepoError, RepoResult};

type Entries = BTreeMap<String, Resource>;

/// In-memory repository backed by an ordered map of canonical paths.
///
/// The map is the single source of truth: stored nodes carry no cached
/// children, and child/descendant queries are prefix scans over the ordered
/// keys. The root `/` exists from construction onward and survives `clear`.
pub struct TreeStore {
    id: RepoId,
    matcher: Box<dyn PathMatcher>,
    entries: RwLock<Entries>,
}

impl TreeStore {
    /// Create an empty store holding only the root, matching glob patterns.
    pub fn new() -> Self {
        Self::with_matcher(Box::new(GlobMatcher::new()))
    }

    /// Create an empty store with a custom pattern-matching capability.
    pub fn with_matcher(matcher: Box<dyn PathMatcher>) -> Self {
        let id = RepoId::next();
        let mut entries = Entries::new();
        entries.insert(paths::ROOT.to_string(), Self::fresh_root(id));
        Self {
            id,
            matcher,
            entries: RwLock::new(entries),
        }
    }

    fn fresh_root(id: RepoId) -> Resource {
        let mut root = Resource::node("");
        root.attach(id, paths::ROOT.to_string());
        root
    }

    /// True iff `key` sits exactly one segment below `parent`.
    fn is_direct_child(parent: &str, key: &str) -> bool {
        if key == parent || !is_base_path(parent, key) {
            return false;
        }
        let start = if is_root(parent) { 1 } else { parent.len() + 1 };
        !key[start..].contains('/')
    }

    /// Keys of `path` and all of its descendants, ascending.
    fn subtree_keys(entries: &Entries, path: &str) -> Vec<String> {
        let mut keys = Vec::new();
        if entries.contains_key(path) {
            keys.push(path.to_string());
        }
        for (key, _) in entries.range::<str, _>((Excluded(path), Unbounded)) {
            if !is_base_path(path, key) {
                break;
            }
            keys.push(key.clone());
        }
        keys
    }

    /// Create missing ancestors of `path` as empty containers.
    fn ensure_ancestors(&self, entries: &mut Entries, path: &str) -> RepoResult<()> {
        for anc in ancestors(path) {
            match entries.get(&anc) {
                None => {
                    let mut node = Resource::node(file_name(&anc));
                    node.attach(self.id, anc.clone());
                    entries.insert(anc, node);
                }
                Some(existing) if !existing.is_container() => {
                    return Err(RepoError::UnsupportedResource(format!(
                        "cannot create children under body resource {anc}"
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Ensure `path` exists as a container node.
    fn ensure_container(&self, entries: &mut Entries, path: &str) -> RepoResult<()> {
        match entries.get(path) {
            Some(existing) if existing.is_container() => Ok(()),
            Some(_) => Err(RepoError::UnsupportedResource(format!(
                "body resource {path} cannot act as a container"
            ))),
            None => {
                self.ensure_ancestors(entries, path)?;
                let mut node = Resource::node(file_name(path));
                node.attach(self.id, path.to_string());
                entries.insert(path.to_string(), node);
                Ok(())
            }
        }
    }

    /// Insert `resource` at `path`, flattening its subtree into the map.
    ///
    /// Children recurse to `path + "/" + name`, so inserting over an
    /// existing subtree merges: new children overwrite same-named entries,
    /// untouched siblings persist.
    fn insert(&self, entries: &mut Entries, path: String, mut resource: Resource) -> RepoResult<()> {
        resource.detach();

        if is_root(&path) && !resource.is_container() {
            return Err(RepoError::UnsupportedResource(
                "root must remain a container".into(),
            ));
        }

        self.ensure_ancestors(entries, &path)?;

        // A body resource is a leaf: anything previously below it goes away
        if !resource.is_container() {
            let stale: Vec<String> = Self::subtree_keys(entries, &path)
                .into_iter()
                .filter(|k| k != &path)
                .collect();
            for key in stale {
                entries.remove(&key);
            }
        }

        let children = resource.take_children();
        resource.attach(self.id, path.clone());
        entries.insert(path.clone(), resource);

        for child in children {
            if child.name().is_empty() {
                return Err(RepoError::UnsupportedResource(format!(
                    "unnamed resource cannot be added under {path}"
                )));
            }
            let child_path = join(&path, child.name());
            self.insert(entries, child_path, child)?;
        }
        Ok(())
    }

    /// Re-key `from` and every descendant under `to`. Returns entries moved.
    fn relocate(&self, entries: &mut Entries, from: &str, to: &str) -> RepoResult<usize> {
        if from == to {
            return Ok(0);
        }
        if is_base_path(from, to) {
            return Err(RepoError::invalid_path(format!(
                "cannot move {from} into its own subtree {to}"
            )));
        }

        self.ensure_ancestors(entries, to)?;

        let keys = Self::subtree_keys(entries, from);
        let mut moved = 0;
        for key in keys {
            if let Some(mut resource) = entries.remove(&key) {
                let new_key = if key == from {
                    to.to_string()
                } else {
                    format!("{to}{}", &key[from.len()..])
                };
                resource.attach(self.id, new_key.clone());
                entries.insert(new_key, resource);
                moved += 1;
            }
        }
        Ok(moved)
    }

    /// Matching canonical paths, ascending. Non-wildcard patterns behave as
    /// an exact lookup.
    fn matching_paths(&self, pattern: &str, language: &str) -> RepoResult<Vec<String>> {
        if language != self.matcher.language() {
            return Err(RepoError::UnsupportedLanguage(language.to_string()));
        }
        let pattern = canonicalize(pattern)?;
        let entries = self.entries.read();
        if !is_pattern(&pattern) {
            return Ok(if entries.contains_key(&pattern) {
                vec![pattern]
            } else {
                Vec::new()
            });
        }
        // The root has no name for a wildcard to match
        let candidates: Vec<&str> = entries
            .keys()
            .map(String::as_str)
            .filter(|k| !is_root(k))
            .collect();
        self.matcher.matches(&pattern, &candidates)
    }
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for TreeStore {
    fn id(&self) -> RepoId {
        self.id
    }

    fn name(&self) -> &str {
        "tree"
    }

    fn get(&self, path: &str) -> RepoResult<Resource> {
        let path = canonicalize(path)?;
        self.entries
            .read()
            .get(&path)
            .cloned()
            .ok_or_else(|| RepoError::not_found(path))
    }

    fn find(&self, pattern: &str) -> RepoResult<ResourceSet> {
        self.find_in(pattern, self.matcher.language())
    }

    fn find_in(&self, pattern: &str, language: &str) -> RepoResult<ResourceSet> {
        let matched = self.matching_paths(pattern, language)?;
        let entries = self.entries.read();
        Ok(matched
            .into_iter()
            .filter_map(|p| entries.get(&p).cloned())
            .collect())
    }

    fn contains(&self, pattern: &str) -> bool {
        let Ok(pattern) = canonicalize(pattern) else {
            return false;
        };
        if !is_pattern(&pattern) {
            return self.entries.read().contains_key(&pattern);
        }
        self.find(&pattern).map(|s| !s.is_empty()).unwrap_or(false)
    }

    fn list_children(&self, path: &str) -> RepoResult<ResourceSet> {
        let path = canonicalize(path)?;
        let entries = self.entries.read();
        if !entries.contains_key(&path) {
            return Err(RepoError::not_found(path));
        }
        let mut children = ResourceSet::new();
        for (key, resource) in entries.range::<str, _>((Excluded(path.as_str()), Unbounded)) {
            if !is_base_path(&path, key) {
                break;
            }
            if Self::is_direct_child(&path, key) {
                children.push(resource.clone());
            }
        }
        Ok(children)
    }

    fn add(&self, path: &str, resource: Resource) -> RepoResult<()> {
        let path = canonicalize(path)?;
        let mut entries = self.entries.write();
        self.insert(&mut entries, path, resource)
    }

    fn add_all(&self, path: &str, resources: ResourceSet) -> RepoResult<()> {
        let path = canonicalize(path)?;
        let mut entries = self.entries.write();
        self.ensure_container(&mut entries, &path)?;
        for member in resources {
            if member.name().is_empty() {
                return Err(RepoError::UnsupportedResource(format!(
                    "unnamed resource cannot be added under {path}"
                )));
            }
            let member_path = join(&path, member.name());
            self.insert(&mut entries, member_path, member)?;
        }
        Ok(())
    }

    fn move_to(&self, source_pattern: &str, target: &str) -> RepoResult<usize> {
        let source = canonicalize(source_pattern)?;
        let target = canonicalize(target)?;
        if is_root(&source) {
            return Err(RepoError::invalid_path("root cannot be moved"));
        }

        let matches = self.find(&source)?;
        if matches.is_empty() {
            return Ok(0);
        }

        let mut entries = self.entries.write();
        let mut moved = 0;

        let sole_leaf = matches.len() == 1 && !matches.iter().next().map_or(true, Resource::is_container);
        if sole_leaf {
            let from = matches.iter().next().and_then(Resource::path).map(str::to_string);
            if let Some(from) = from {
                moved += self.relocate(&mut entries, &from, &target)?;
            }
        } else {
            self.ensure_container(&mut entries, &target)?;
            for m in &matches {
                let Some(from) = m.path().map(str::to_string) else {
                    continue;
                };
                if is_root(&from) {
                    continue;
                }
                let to = join(&target, m.name());
                moved += self.relocate(&mut entries, &from, &to)?;
            }
        }
        Ok(moved)
    }

    fn remove(&self, pattern: &str) -> RepoResult<usize> {
        let pattern = canonicalize(pattern)?;
        if is_root(&pattern) {
            return Err(RepoError::invalid_path("root cannot be removed"));
        }

        let matched = self.matching_paths(&pattern, self.matcher.language())?;
        let mut entries = self.entries.write();

        // Descendants first; a set keeps overlapping matches counted once
        let mut doomed = std::collections::BTreeSet::new();
        for path in matched {
            if is_root(&path) {
                continue;
            }
            for key in Self::subtree_keys(&entries, &path) {
                doomed.insert(key);
            }
        }

        let removed = doomed.len();
        for key in doomed.iter().rev() {
            if let Some(mut resource) = entries.remove(key) {
                resource.detach();
            }
        }
        Ok(removed)
    }

    fn clear(&self) -> RepoResult<usize> {
        let mut entries = self.entries.write();
        let removed = entries.len().saturating_sub(1);
        let mut fresh = Entries::new();
        fresh.insert(paths::ROOT.to_string(), Self::fresh_root(self.id));
        *entries = fresh;
        tracing::debug!(removed = removed, "tree store cleared");
        Ok(removed)
    }
}
