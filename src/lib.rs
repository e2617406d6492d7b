/*!
 * repofs
 * Path-addressed virtual resource repository with pluggable backends
 *
 * Resources (containers and body leaves) live in a slash-separated absolute
 * namespace. The same contract is satisfied by an in-memory tree store, a
 * local-directory store and a composite that mounts other repositories at
 * sub-paths with longest-prefix routing and shadow filtering.
 */

pub mod composite;
pub mod local;
pub mod matcher;
pub mod paths;
pub mod resource;
pub mod traits;
pub mod tree;
pub mod types;

// Re-exports
pub use composite::{Composite, RepoFactory};
pub use local::LocalStore;
pub use matcher::{GlobMatcher, PathMatcher};
pub use resource::{Attachment, RepoId, Resource, ResourceSet};
pub use traits::Repository;
pub use tree::TreeStore;
pub use types::{RepoError, RepoResult};
