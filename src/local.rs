/*!
 * Local Store
 * Repository backend over a real directory tree
 */

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::matcher::{is_pattern, GlobMatcher, PathMatcher};
use crate::paths::{self, canonicalize, file_name, is_root, join};
use crate::resource::{RepoId, Resource, ResourceSet};
use crate::traits::Repository;
use crate::types::{RepoError, RepoResult};

/// Repository rooted at a host directory.
///
/// Directories appear as containers, regular files as body resources.
/// Canonicalization confines every repository path to the base directory, so
/// `..` can never escape it. Symlink traversal is an explicit construction
/// option, not process-wide state.
pub struct LocalStore {
    id: RepoId,
    root: PathBuf,
    readonly: bool,
    follow_symlinks: bool,
    matcher: Box<dyn PathMatcher>,
}

impl LocalStore {
    /// Create a store rooted at `root`.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            id: RepoId::next(),
            root: root.into(),
            readonly: false,
            follow_symlinks: true,
            matcher: Box::new(GlobMatcher::new()),
        }
    }

    /// Create a read-only store rooted at `root`.
    pub fn readonly<P: Into<PathBuf>>(root: P) -> Self {
        let mut store = Self::new(root);
        store.readonly = true;
        store
    }

    /// Whether enumeration descends through symlinked directories.
    pub fn follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Host path for a canonical repository path.
    fn resolve(&self, canonical: &str) -> PathBuf {
        // Canonical paths carry no `.`/`..`, so a plain join stays confined
        if is_root(canonical) {
            self.root.clone()
        } else {
            self.root.join(&canonical[1..])
        }
    }

    fn check_write(&self) -> RepoResult<()> {
        if self.readonly {
            return Err(RepoError::Io("read-only repository".into()));
        }
        Ok(())
    }

    fn io_error(e: io::Error, context: impl Into<String>) -> RepoError {
        match e.kind() {
            io::ErrorKind::NotFound => RepoError::ResourceNotFound(context.into()),
            _ => RepoError::Io(format!("{}: {}", context.into(), e)),
        }
    }

    fn entry_metadata(&self, host: &Path) -> io::Result<fs::Metadata> {
        if self.follow_symlinks {
            fs::metadata(host)
        } else {
            fs::symlink_metadata(host)
        }
    }

    /// Materialize the resource stored at a canonical path.
    fn load(&self, canonical: &str) -> RepoResult<Resource> {
        let host = self.resolve(canonical);
        let meta = self
            .entry_metadata(&host)
            .map_err(|e| Self::io_error(e, canonical))?;

        let mut resource = if meta.is_dir() {
            Resource::node(file_name(canonical))
        } else {
            let body = fs::read(&host).map_err(|e| Self::io_error(e, canonical))?;
            Resource::file(file_name(canonical), body)
        };
        resource.attach(self.id, canonical.to_string());
        Ok(resource)
    }

    /// Every canonical path under `canonical`, ascending; `canonical` itself
    /// is excluded.
    fn walk(&self, canonical: &str, out: &mut Vec<String>) -> RepoResult<()> {
        let host = self.resolve(canonical);
        let meta = match self.entry_metadata(&host) {
            Ok(m) => m,
            Err(_) => return Ok(()),
        };
        if !meta.is_dir() {
            return Ok(());
        }

        let iter = fs::read_dir(&host).map_err(|e| Self::io_error(e, canonical))?;
        let mut names = Vec::new();
        for entry in iter {
            let entry = entry.map_err(|e| Self::io_error(e, canonical))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        for name in names {
            let child = join(canonical, &name);
            if !self.follow_symlinks {
                let child_host = self.resolve(&child);
                if let Ok(m) = fs::symlink_metadata(&child_host) {
                    if m.file_type().is_symlink() {
                        continue;
                    }
                }
            }
            out.push(child.clone());
            self.walk(&child, out)?;
        }
        Ok(())
    }

    /// Count of a path plus all of its descendants.
    fn subtree_len(&self, canonical: &str) -> RepoResult<usize> {
        let mut descendants = Vec::new();
        self.walk(canonical, &mut descendants)?;
        Ok(descendants.len() + 1)
    }

    /// Write a detached resource (and its subtree) at a canonical path.
    fn store(&self, canonical: &str, resource: &Resource) -> RepoResult<()> {
        let host = self.resolve(canonical);
        if let Some(body) = resource.body() {
            // Files are leaves: a directory previously here goes away
            if host.is_dir() {
                fs::remove_dir_all(&host).map_err(|e| Self::io_error(e, canonical))?;
            }
            if let Some(parent) = host.parent() {
                fs::create_dir_all(parent).map_err(|e| Self::io_error(e, canonical))?;
            }
            fs::write(&host, body).map_err(|e| Self::io_error(e, canonical))?;
        } else {
            if host.is_file() {
                fs::remove_file(&host).map_err(|e| Self::io_error(e, canonical))?;
            }
            fs::create_dir_all(&host).map_err(|e| Self::io_error(e, canonical))?;
            for child in resource.children() {
                if child.name().is_empty() {
                    return Err(RepoError::UnsupportedResource(format!(
                        "unnamed resource cannot be added under {canonical}"
                    )));
                }
                self.store(&join(canonical, child.name()), child)?;
            }
        }
        Ok(())
    }

    fn matching_paths(&self, pattern: &str, language: &str) -> RepoResult<Vec<String>> {
        if language != self.matcher.language() {
            return Err(RepoError::UnsupportedLanguage(language.to_string()));
        }
        let pattern = canonicalize(pattern)?;
        if !is_pattern(&pattern) {
            let host = self.resolve(&pattern);
            return Ok(if self.entry_metadata(&host).is_ok() {
                vec![pattern]
            } else {
                Vec::new()
            });
        }
        // The root has no name for a wildcard to match; walk starts below it
        let mut candidates = Vec::new();
        self.walk(paths::ROOT, &mut candidates)?;
        let refs: Vec<&str> = candidates.iter().map(String::as_str).collect();
        self.matcher.matches(&pattern, &refs)
    }
}

impl Repository for LocalStore {
    fn id(&self) -> RepoId {
        self.id
    }

    fn name(&self) -> &str {
        "local"
    }

    fn get(&self, path: &str) -> RepoResult<Resource> {
        let path = canonicalize(path)?;
        self.load(&path)
    }

    fn find(&self, pattern: &str) -> RepoResult<ResourceSet> {
        self.find_in(pattern, self.matcher.language())
    }

    fn find_in(&self, pattern: &str, language: &str) -> RepoResult<ResourceSet> {
        let matched = self.matching_paths(pattern, language)?;
        let mut set = ResourceSet::new();
        for path in matched {
            if let Ok(resource) = self.load(&path) {
                set.push(resource);
            }
        }
        Ok(set)
    }

    fn list_children(&self, path: &str) -> RepoResult<ResourceSet> {
        let path = canonicalize(path)?;
        let host = self.resolve(&path);
        let meta = self
            .entry_metadata(&host)
            .map_err(|e| Self::io_error(e, path.as_str()))?;
        if !meta.is_dir() {
            return Ok(ResourceSet::new());
        }

        let iter = fs::read_dir(&host).map_err(|e| Self::io_error(e, path.as_str()))?;
        let mut names = Vec::new();
        for entry in iter {
            let entry = entry.map_err(|e| Self::io_error(e, path.as_str()))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();

        let mut children = ResourceSet::new();
        for name in names {
            let child = join(&path, &name);
            if !self.follow_symlinks {
                if let Ok(m) = fs::symlink_metadata(self.resolve(&child)) {
                    if m.file_type().is_symlink() {
                        continue;
                    }
                }
            }
            if let Ok(resource) = self.load(&child) {
                children.push(resource);
            }
        }
        Ok(children)
    }

    fn add(&self, path: &str, resource: Resource) -> RepoResult<()> {
        let path = canonicalize(path)?;
        self.check_write()?;
        if is_root(&path) && !resource.is_container() {
            return Err(RepoError::UnsupportedResource(
                "root must remain a container".into(),
            ));
        }
        self.store(&path, &resource)
    }

    fn add_all(&self, path: &str, resources: ResourceSet) -> RepoResult<()> {
        let path = canonicalize(path)?;
        self.check_write()?;
        fs::create_dir_all(self.resolve(&path)).map_err(|e| Self::io_error(e, path.as_str()))?;
        for member in &resources {
            if member.name().is_empty() {
                return Err(RepoError::UnsupportedResource(format!(
                    "unnamed resource cannot be added under {path}"
                )));
            }
            self.store(&join(&path, member.name()), member)?;
        }
        Ok(())
    }

    fn move_to(&self, source_pattern: &str, target: &str) -> RepoResult<usize> {
        let source = canonicalize(source_pattern)?;
        let target = canonicalize(target)?;
        self.check_write()?;
        if is_root(&source) {
            return Err(RepoError::invalid_path("root cannot be moved"));
        }

        let matched = self.matching_paths(&source, self.matcher.language())?;
        if matched.is_empty() {
            return Ok(0);
        }

        let mut moved = 0;
        let sole_leaf = matched.len() == 1 && {
            let host = self.resolve(&matched[0]);
            self.entry_metadata(&host).map(|m| !m.is_dir()).unwrap_or(false)
        };

        if sole_leaf {
            let from = &matched[0];
            let to_host = self.resolve(&target);
            if let Some(parent) = to_host.parent() {
                fs::create_dir_all(parent).map_err(|e| Self::io_error(e, target.as_str()))?;
            }
            moved += self.subtree_len(from)?;
            fs::rename(self.resolve(from), to_host).map_err(|e| Self::io_error(e, from.as_str()))?;
        } else {
            fs::create_dir_all(self.resolve(&target))
                .map_err(|e| Self::io_error(e, target.as_str()))?;
            for from in &matched {
                if is_root(from) {
                    continue;
                }
                let to = join(&target, file_name(from));
                moved += self.subtree_len(from)?;
                fs::rename(self.resolve(from), self.resolve(&to))
                    .map_err(|e| Self::io_error(e, from.as_str()))?;
            }
        }
        Ok(moved)
    }

    fn remove(&self, pattern: &str) -> RepoResult<usize> {
        let pattern = canonicalize(pattern)?;
        self.check_write()?;
        if is_root(&pattern) {
            return Err(RepoError::invalid_path("root cannot be removed"));
        }

        let mut matched = self.matching_paths(&pattern, self.matcher.language())?;
        matched.sort();

        let mut removed = 0;
        let mut last_removed: Option<String> = None;
        for path in matched {
            // Skip entries already gone with an ancestor
            if let Some(prev) = &last_removed {
                if paths::is_base_path(prev, &path) {
                    continue;
                }
            }
            let host = self.resolve(&path);
            let meta = match self.entry_metadata(&host) {
                Ok(m) => m,
                Err(_) => continue,
            };
            removed += self.subtree_len(&path)?;
            if meta.is_dir() {
                fs::remove_dir_all(&host).map_err(|e| Self::io_error(e, path.as_str()))?;
            } else {
                fs::remove_file(&host).map_err(|e| Self::io_error(e, path.as_str()))?;
            }
            last_removed = Some(path);
        }
        Ok(removed)
    }

    fn clear(&self) -> RepoResult<usize> {
        self.check_write()?;
        let mut doomed = Vec::new();
        self.walk(paths::ROOT, &mut doomed)?;
        let removed = doomed.len();

        let iter = fs::read_dir(&self.root).map_err(|e| Self::io_error(e, paths::ROOT))?;
        for entry in iter {
            let entry = entry.map_err(|e| Self::io_error(e, paths::ROOT))?;
            let host = entry.path();
            let meta =
                fs::symlink_metadata(&host).map_err(|e| Self::io_error(e, paths::ROOT))?;
            if meta.is_dir() {
                fs::remove_dir_all(&host).map_err(|e| Self::io_error(e, paths::ROOT))?;
            } else {
                fs::remove_file(&host).map_err(|e| Self::io_error(e, paths::ROOT))?;
            }
        }
        tracing::debug!(removed = removed, root = %self.root.display(), "local store cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalStore) {
        let temp = TempDir::new().unwrap();
        let store = LocalStore::new(temp.path());
        (temp, store)
    }

    #[test]
    fn test_round_trip() {
        let (_temp, store) = store();
        store
            .add("/docs/a.txt", Resource::file("a.txt", b"hello".to_vec()))
            .unwrap();

        let got = store.get("/docs/a.txt").unwrap();
        assert_eq!(got.body(), Some(&b"hello"[..]));
        assert_eq!(got.path(), Some("/docs/a.txt"));
        assert!(store.get("/docs").unwrap().is_container());
    }

    #[test]
    fn test_missing_and_invalid() {
        let (_temp, store) = store();
        assert!(matches!(
            store.get("/nope"),
            Err(RepoError::ResourceNotFound(_))
        ));
        assert!(matches!(store.get("rel"), Err(RepoError::InvalidPath(_))));
    }

    #[test]
    fn test_find_glob() {
        let (_temp, store) = store();
        store.add("/a/x.txt", Resource::file("x.txt", b"1".to_vec())).unwrap();
        store.add("/a/y.md", Resource::file("y.md", b"2".to_vec())).unwrap();
        store.add("/a/sub/z.txt", Resource::file("z.txt", b"3".to_vec())).unwrap();

        let hits = store.find("/a/*.txt").unwrap();
        assert_eq!(hits.paths(), vec!["/a/x.txt"]);
        assert!(store.contains("/a/sub"));
    }

    #[test]
    fn test_list_children_sorted() {
        let (_temp, store) = store();
        store.add("/d/b", Resource::file("b", b"2".to_vec())).unwrap();
        store.add("/d/a", Resource::file("a", b"1".to_vec())).unwrap();
        store.add("/d/c/deep", Resource::file("deep", b"3".to_vec())).unwrap();

        let children = store.list_children("/d").unwrap();
        assert_eq!(children.paths(), vec!["/d/a", "/d/b", "/d/c"]);
    }

    #[test]
    fn test_move_and_remove() {
        let (_temp, store) = store();
        store.add("/x/a", Resource::file("a", b"1".to_vec())).unwrap();
        store.add("/x/b", Resource::file("b", b"2".to_vec())).unwrap();

        assert_eq!(store.move_to("/x", "/y").unwrap(), 3);
        assert!(!store.contains("/x"));
        assert!(store.contains("/y/x/a"));

        assert_eq!(store.remove("/y").unwrap(), 4);
        assert!(!store.contains("/y"));
        assert_eq!(store.remove("/y").unwrap(), 0);
    }

    #[test]
    fn test_readonly_rejects_writes() {
        let temp = TempDir::new().unwrap();
        LocalStore::new(temp.path())
            .add("/f", Resource::file("f", b"x".to_vec()))
            .unwrap();

        let ro = LocalStore::readonly(temp.path());
        assert_eq!(ro.get("/f").unwrap().body(), Some(&b"x"[..]));
        assert!(ro.add("/g", Resource::file("g", b"y".to_vec())).is_err());
        assert!(ro.remove("/f").is_err());
    }

    #[test]
    fn test_clear() {
        let (_temp, store) = store();
        store.add("/a/b", Resource::file("b", b"1".to_vec())).unwrap();
        store.add("/c", Resource::node("c")).unwrap();

        assert_eq!(store.clear().unwrap(), 3);
        assert!(store.contains("/"));
        assert!(store.list_children("/").unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_skipped_when_disabled() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("real")).unwrap();
        std::fs::write(temp.path().join("real/f.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(temp.path().join("real"), temp.path().join("link")).unwrap();

        let following = LocalStore::new(temp.path());
        assert!(following.contains("/link/f.txt"));

        let skipping = LocalStore::new(temp.path()).follow_symlinks(false);
        let children = skipping.list_children("/").unwrap();
        assert_eq!(children.names(), vec!["real"]);
    }
}
