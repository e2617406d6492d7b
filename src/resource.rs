/*!
 * Resource Model
 * Tree nodes stored by the repositories and the collection type they return
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{RepoError, RepoResult};

/// Identity of one repository instance.
///
/// Drawn from a process-wide counter so that two stores never share an id,
/// which is what makes the attached-to relation unambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId(u64);

static NEXT_REPO_ID: AtomicU64 = AtomicU64::new(1);

impl RepoId {
    pub(crate) fn next() -> Self {
        Self(NEXT_REPO_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Where a resource currently lives: owning repository plus canonical path.
///
/// A resource is attached to at most one repository at a time. Stores clear
/// any previous attachment before claiming a resource, never re-parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub repo: RepoId,
    pub path: String,
}

/// A node in the repository namespace.
///
/// Either a container (may hold children) or a body resource (leaf carrying
/// opaque content). A freshly constructed resource is detached: it has a
/// name but no path and no repository until passed to `add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    name: String,
    body: Option<Vec<u8>>,
    children: Vec<Resource>,
    attached: Option<Attachment>,
}

impl Resource {
    /// Create a detached container node.
    pub fn node(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: None,
            children: Vec::new(),
            attached: None,
        }
    }

    /// Create a detached body resource (leaf).
    pub fn file(name: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            body: Some(body.into()),
            children: Vec::new(),
            attached: None,
        }
    }

    /// Last path segment; fixed at construction.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical path, present only while attached.
    pub fn path(&self) -> Option<&str> {
        self.attached.as_ref().map(|a| a.path.as_str())
    }

    /// Owning repository, present only while attached.
    pub fn repo(&self) -> Option<RepoId> {
        self.attached.as_ref().map(|a| a.repo)
    }

    pub fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    /// Containers may hold children; body resources are always leaves.
    pub fn is_container(&self) -> bool {
        self.body.is_none()
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Replace the body content. Fails on a container that already has
    /// children (files are leaves).
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) -> RepoResult<()> {
        if !self.children.is_empty() {
            return Err(RepoError::UnsupportedResource(format!(
                "resource '{}' has children and cannot carry a body",
                self.name
            )));
        }
        self.body = Some(body.into());
        Ok(())
    }

    /// Children ordered by name. For attached resources the store's map is
    /// authoritative; this collection only describes a detached subtree.
    pub fn children(&self) -> &[Resource] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&Resource> {
        self.children
            .binary_search_by(|c| c.name.as_str().cmp(name))
            .ok()
            .map(|idx| &self.children[idx])
    }

    /// Insert a child, keeping name order. A child with an existing name
    /// replaces the previous one. Fails on a body resource.
    pub fn push_child(&mut self, child: Resource) -> RepoResult<()> {
        if !self.is_container() {
            return Err(RepoError::UnsupportedResource(format!(
                "body resource '{}' cannot hold children",
                self.name
            )));
        }
        match self
            .children
            .binary_search_by(|c| c.name.as_str().cmp(&child.name))
        {
            Ok(idx) => self.children[idx] = child,
            Err(idx) => self.children.insert(idx, child),
        }
        Ok(())
    }

    /// Builder-style `push_child`.
    pub fn with_child(mut self, child: Resource) -> RepoResult<Self> {
        self.push_child(child)?;
        Ok(self)
    }

    /// Attach at a canonical path. The name follows the path's last segment
    /// so the two can never diverge while attached.
    pub(crate) fn attach(&mut self, repo: RepoId, path: String) {
        if !crate::paths::is_root(&path) {
            self.name = crate::paths::file_name(&path).to_string();
        }
        self.attached = Some(Attachment { repo, path });
    }

    pub(crate) fn detach(&mut self) {
        self.attached = None;
    }

    /// Strip the subtree off for flattening into a store map.
    pub(crate) fn take_children(&mut self) -> Vec<Resource> {
        std::mem::take(&mut self.children)
    }

    /// Copy with the reported location rewritten; used by the composite to
    /// present mounted resources at their composite-visible path.
    pub(crate) fn as_reference(&self, repo: RepoId, path: String) -> Resource {
        let mut reference = self.clone();
        reference.attach(repo, path);
        reference
    }
}

/// Ordered collection of resources, as returned by `find`/`list_children`.
///
/// Order follows ascending path order of the producing store, so iteration
/// is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSet {
    items: Vec<Resource>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push(&mut self, resource: Resource) {
        self.items.push(resource);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.items.iter()
    }

    /// Attached paths of all members, in collection order.
    pub fn paths(&self) -> Vec<&str> {
        self.items.iter().filter_map(|r| r.path()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|r| r.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.items.iter().find(|r| r.name() == name)
    }

    pub fn into_vec(self) -> Vec<Resource> {
        self.items
    }
}

impl From<Vec<Resource>> for ResourceSet {
    fn from(items: Vec<Resource>) -> Self {
        Self { items }
    }
}

impl FromIterator<Resource> for ResourceSet {
    fn from_iter<I: IntoIterator<Item = Resource>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ResourceSet {
    type Item = Resource;
    type IntoIter = std::vec::IntoIter<Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResourceSet {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
