/*!
 * Composite Repository
 * Mount routing, shadow computation and reference rewriting
 */

use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::paths::{self, canonicalize, is_base_path, is_root, strip_base};
use crate::resource::{RepoId, Resource, ResourceSet};
use crate::traits::Repository;
use crate::types::{RepoError, RepoResult};

/// Deferred backend constructor, invoked once on first access.
pub type RepoFactory = Box<dyn FnOnce() -> RepoResult<Box<dyn Repository>> + Send>;

/// Backend slot of one mount: realized, or still a factory.
enum Backing {
    Ready(Arc<dyn Repository>),
    Deferred(Option<RepoFactory>),
}

struct MountEntry {
    backing: Mutex<Backing>,
}

/// Repository composed of other repositories mounted at sub-paths.
///
/// Requests route to the most specific mount whose path is a base of the
/// request; the residual path is delegated to that mount's backend. Results
/// coming back from a mount are rewritten into references at their
/// composite-visible location, and entries that a more specific nested mount
/// covers (its "shadow") are dropped so overlapping mounts never
/// double-report.
pub struct Composite {
    id: RepoId,
    mounts: DashMap<String, MountEntry, RandomState>,
    /// Longest mount paths first, so prefix search finds the deepest mount.
    mount_order: RwLock<Vec<String>>,
    /// Per mount point: residual sub-paths overridden by nested mounts.
    shadows: RwLock<HashMap<String, Vec<String>, RandomState>>,
}

impl Composite {
    pub fn new() -> Self {
        Self {
            id: RepoId::next(),
            mounts: DashMap::with_hasher(RandomState::new()),
            mount_order: RwLock::new(Vec::new()),
            shadows: RwLock::new(HashMap::with_hasher(RandomState::new())),
        }
    }

    /// Mount a backend at `path`, replacing any mount already there.
    pub fn mount(&self, path: &str, repo: impl Repository + 'static) -> RepoResult<()> {
        self.mount_arc(path, Arc::new(repo))
    }

    /// Mount a backend already behind an `Arc`.
    pub fn mount_arc(&self, path: &str, repo: Arc<dyn Repository>) -> RepoResult<()> {
        let path = canonicalize(path)?;
        info!(mount = %path, backend = repo.name(), "mounting repository");
        self.mounts.insert(
            path,
            MountEntry {
                backing: Mutex::new(Backing::Ready(repo)),
            },
        );
        self.rebuild();
        Ok(())
    }

    /// Mount a factory; the backend is built on first access and cached.
    pub fn mount_deferred<F>(&self, path: &str, factory: F) -> RepoResult<()>
    where
        F: FnOnce() -> RepoResult<Box<dyn Repository>> + Send + 'static,
    {
        let path = canonicalize(path)?;
        info!(mount = %path, "mounting deferred repository");
        self.mounts.insert(
            path,
            MountEntry {
                backing: Mutex::new(Backing::Deferred(Some(Box::new(factory)))),
            },
        );
        self.rebuild();
        Ok(())
    }

    /// Remove the mount at `path`. No-op when nothing is mounted there.
    pub fn unmount(&self, path: &str) -> RepoResult<bool> {
        let path = canonicalize(path)?;
        let removed = self.mounts.remove(&path).is_some();
        if removed {
            info!(mount = %path, "unmounted repository");
            self.rebuild();
        }
        Ok(removed)
    }

    /// Mount paths, most specific first.
    pub fn mount_points(&self) -> Vec<String> {
        self.mount_order.read().clone()
    }

    /// Recompute mount order and the shadow table.
    ///
    /// O(M^2) over the mount count, rebuilt eagerly on every mount change;
    /// mount churn is rare next to queries.
    fn rebuild(&self) {
        let mut order: Vec<String> = self.mounts.iter().map(|e| e.key().clone()).collect();
        order.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut shadows: HashMap<String, Vec<String>, RandomState> =
            HashMap::with_hasher(RandomState::new());
        for p in &order {
            let mut covered = Vec::new();
            for q in &order {
                if p == q {
                    continue;
                }
                if is_root(p) || (is_base_path(p, q) && q != p) {
                    if let Some(rel) = strip_base(p, q) {
                        covered.push(rel);
                    }
                }
            }
            covered.sort();
            shadows.insert(p.clone(), covered);
        }

        *self.mount_order.write() = order;
        *self.shadows.write() = shadows;
    }

    /// Realize the backend of a mount, running its factory if needed.
    fn backend(&self, mount: &str) -> RepoResult<Arc<dyn Repository>> {
        let entry = self
            .mounts
            .get(mount)
            .ok_or_else(|| RepoError::not_found(mount.to_string()))?;
        let mut backing = entry.backing.lock();
        match &mut *backing {
            Backing::Ready(repo) => Ok(Arc::clone(repo)),
            Backing::Deferred(slot) => {
                let factory = slot.take().ok_or_else(|| {
                    RepoError::RepositoryFactoryError(format!(
                        "factory for {mount} already failed"
                    ))
                })?;
                let repo: Arc<dyn Repository> = Arc::from(factory().map_err(|e| {
                    RepoError::RepositoryFactoryError(format!("{mount}: {e}"))
                })?);
                *backing = Backing::Ready(Arc::clone(&repo));
                Ok(repo)
            }
        }
    }

    /// Route a canonical path (or pattern) to the deepest applicable mount.
    ///
    /// Returns the mount point and the residual sub-path; `None` when no
    /// mount covers the request.
    fn resolve(&self, canonical: &str) -> Option<(String, String)> {
        let order = self.mount_order.read();
        for mount in order.iter() {
            if is_base_path(mount, canonical) {
                let residual = strip_base(mount, canonical)?;
                return Some((mount.clone(), residual));
            }
        }
        None
    }

    /// Shadow entries of one mount, in residual coordinates.
    fn shadow_list(&self, mount: &str) -> Vec<String> {
        self.shadows.read().get(mount).cloned().unwrap_or_default()
    }

    fn is_shadowed(shadow_list: &[String], residual_path: &str) -> bool {
        shadow_list.iter().any(|s| is_base_path(s, residual_path))
    }

    /// Composite-visible path for a backend result.
    fn compose_path(mount: &str, residual: &str) -> String {
        if is_root(mount) {
            residual.to_string()
        } else if is_root(residual) {
            mount.to_string()
        } else {
            format!("{mount}{residual}")
        }
    }

    /// Rewrite a backend result into a reference at its composite location.
    /// Root-mount results already report their composite path unchanged.
    fn as_reference(&self, mount: &str, resource: Resource) -> Resource {
        if is_root(mount) {
            return resource;
        }
        let residual = resource.path().unwrap_or(paths::ROOT);
        let composite_path = Self::compose_path(mount, residual);
        resource.as_reference(self.id, composite_path)
    }

    /// Delegate-and-rewrite shared by `find`/`find_in`/`list_children`.
    fn rewrite_set(&self, mount: &str, set: ResourceSet) -> ResourceSet {
        let shadow_list = self.shadow_list(mount);
        set.into_iter()
            .filter(|r| {
                r.path()
                    .map(|p| !Self::is_shadowed(&shadow_list, p))
                    .unwrap_or(true)
            })
            .map(|r| self.as_reference(mount, r))
            .collect()
    }
}

impl Default for Composite {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for Composite {
    fn id(&self) -> RepoId {
        self.id
    }

    fn name(&self) -> &str {
        "composite"
    }

    fn get(&self, path: &str) -> RepoResult<Resource> {
        let path = canonicalize(path)?;
        let (mount, residual) = self
            .resolve(&path)
            .ok_or_else(|| RepoError::not_found(path.clone()))?;
        let backend = self.backend(&mount)?;
        let resource = backend.get(&residual)?;
        Ok(self.as_reference(&mount, resource))
    }

    fn find(&self, pattern: &str) -> RepoResult<ResourceSet> {
        let pattern = canonicalize(pattern)?;
        let Some((mount, residual)) = self.resolve(&pattern) else {
            return Ok(ResourceSet::new());
        };
        let backend = self.backend(&mount)?;
        let set = backend.find(&residual)?;
        Ok(self.rewrite_set(&mount, set))
    }

    fn find_in(&self, pattern: &str, language: &str) -> RepoResult<ResourceSet> {
        let pattern = canonicalize(pattern)?;
        let Some((mount, residual)) = self.resolve(&pattern) else {
            return Ok(ResourceSet::new());
        };
        let backend = self.backend(&mount)?;
        let set = backend.find_in(&residual, language)?;
        Ok(self.rewrite_set(&mount, set))
    }

    fn list_children(&self, path: &str) -> RepoResult<ResourceSet> {
        let path = canonicalize(path)?;
        let (mount, residual) = self
            .resolve(&path)
            .ok_or_else(|| RepoError::not_found(path.clone()))?;
        let backend = self.backend(&mount)?;
        let set = backend.list_children(&residual)?;
        Ok(self.rewrite_set(&mount, set))
    }

    fn add(&self, path: &str, resource: Resource) -> RepoResult<()> {
        let path = canonicalize(path)?;
        let (mount, residual) = self
            .resolve(&path)
            .ok_or_else(|| RepoError::not_found(path.clone()))?;
        self.backend(&mount)?.add(&residual, resource)
    }

    fn add_all(&self, path: &str, resources: ResourceSet) -> RepoResult<()> {
        let path = canonicalize(path)?;
        let (mount, residual) = self
            .resolve(&path)
            .ok_or_else(|| RepoError::not_found(path.clone()))?;
        self.backend(&mount)?.add_all(&residual, resources)
    }

    fn move_to(&self, source_pattern: &str, target: &str) -> RepoResult<usize> {
        let source = canonicalize(source_pattern)?;
        let target = canonicalize(target)?;
        if is_root(&source) {
            return Err(RepoError::invalid_path("root cannot be moved"));
        }
        let (src_mount, src_residual) = self
            .resolve(&source)
            .ok_or_else(|| RepoError::not_found(source.clone()))?;
        let (dst_mount, dst_residual) = self
            .resolve(&target)
            .ok_or_else(|| RepoError::not_found(target.clone()))?;
        if src_mount != dst_mount {
            return Err(RepoError::UnsupportedResource(format!(
                "cannot move across mounts {src_mount} and {dst_mount}"
            )));
        }
        self.backend(&src_mount)?.move_to(&src_residual, &dst_residual)
    }

    fn remove(&self, pattern: &str) -> RepoResult<usize> {
        let pattern = canonicalize(pattern)?;
        if is_root(&pattern) {
            return Err(RepoError::invalid_path("root cannot be removed"));
        }
        let Some((mount, residual)) = self.resolve(&pattern) else {
            return Ok(0);
        };
        self.backend(&mount)?.remove(&residual)
    }

    fn clear(&self) -> RepoResult<usize> {
        let mut removed = 0;
        let order = self.mount_order.read().clone();
        for mount in order {
            // Deferred mounts that never materialized hold nothing
            let realized = {
                let entry = match self.mounts.get(&mount) {
                    Some(e) => e,
                    None => continue,
                };
                let backing = entry.backing.lock();
                match &*backing {
                    Backing::Ready(repo) => Some(Arc::clone(repo)),
                    Backing::Deferred(_) => None,
                }
            };
            if let Some(repo) = realized {
                removed += repo.clear()?;
            }
        }
        info!(removed = removed, "composite cleared");
        Ok(removed)
    }
}
