/*!
 * Backend Contract
 * The uniform interface every concrete store satisfies
 */

use crate::resource::{RepoId, Resource, ResourceSet};
use crate::types::RepoResult;

/// Uniform repository contract.
///
/// Every backend (tree store, local store, composite) implements this trait,
/// which is what makes mounting one repository inside another transparent to
/// the caller. All paths and patterns are canonicalized and validated for
/// absoluteness before any other work.
///
/// Receivers are `&self` with interior locking so a store can sit behind
/// `Arc<dyn Repository>`; the semantics are still single-writer and callers
/// that mutate one instance from several threads must serialize externally.
pub trait Repository: Send + Sync {
    /// Identity of this repository instance.
    fn id(&self) -> RepoId;

    /// Backend name/type.
    fn name(&self) -> &str;

    /// Exact lookup. Fails with `ResourceNotFound` when absent.
    fn get(&self, path: &str) -> RepoResult<Resource>;

    /// All resources matching a pattern, in ascending path order. A pattern
    /// without wildcards behaves as an exact lookup; a miss yields an empty
    /// set, never an error.
    fn find(&self, pattern: &str) -> RepoResult<ResourceSet>;

    /// `find` in an explicit pattern language. Fails with
    /// `UnsupportedLanguage` when the store was not built for `language`.
    fn find_in(&self, pattern: &str, language: &str) -> RepoResult<ResourceSet>;

    /// True when the pattern matches at least one resource.
    fn contains(&self, pattern: &str) -> bool {
        self.find(pattern).map(|s| !s.is_empty()).unwrap_or(false)
    }

    /// Direct children of `path`, in ascending path order. Fails with
    /// `ResourceNotFound` when `path` itself does not exist.
    fn list_children(&self, path: &str) -> RepoResult<ResourceSet>;

    /// True when `path` exists and has at least one direct child.
    fn has_children(&self, path: &str) -> RepoResult<bool> {
        Ok(!self.list_children(path)?.is_empty())
    }

    /// Attach a resource at `path`, creating missing ancestors as empty
    /// containers. A resource carrying a subtree merges with any existing
    /// subtree at the same path: new children overwrite same-named entries,
    /// untouched siblings persist.
    fn add(&self, path: &str, resource: Resource) -> RepoResult<()>;

    /// Ensure `path` as a container, then add every member at
    /// `path + "/" + member.name`.
    fn add_all(&self, path: &str, resources: ResourceSet) -> RepoResult<()>;

    /// Move everything matching `source_pattern` to `target`; descendants
    /// are re-keyed under the new location. Returns the number of resources
    /// moved, descendants included. The root cannot be moved.
    fn move_to(&self, source_pattern: &str, target: &str) -> RepoResult<usize>;

    /// Remove everything matching `pattern`, descendants first. Returns the
    /// number removed, descendants included; zero when nothing matched. The
    /// root cannot be removed.
    fn remove(&self, pattern: &str) -> RepoResult<usize>;

    /// Discard every resource and recreate a fresh root. Returns the number
    /// removed, excluding the root itself.
    fn clear(&self) -> RepoResult<usize>;
}
