/*!
 * Path Rules
 * Canonicalization and prefix tests shared by every backend
 */

use crate::types::{RepoError, RepoResult};
use std::path::Path;

/// Root path of every repository
pub const ROOT: &str = "/";

/// Canonicalize a repository path.
///
/// Resolves `.` and `..` segments (clamped at root), collapses repeated
/// slashes and strips any trailing slash except for root itself. Fails with
/// `InvalidPath` when the input is empty or not absolute.
///
/// Canonicalization is idempotent: `canonicalize(canonicalize(p)?)` yields
/// the same path.
pub fn canonicalize(path: &str) -> RepoResult<String> {
    if path.is_empty() {
        return Err(RepoError::InvalidPath("empty path".into()));
    }
    if !path.starts_with('/') {
        return Err(RepoError::invalid_path(format!(
            "path must be absolute: {path}"
        )));
    }

    // Battle-tested cleaning (handles ., .., duplicate and trailing slashes)
    let cleaned = path_clean::clean(Path::new(path));
    match cleaned.to_str() {
        Some(s) => Ok(s.to_string()),
        None => Err(RepoError::invalid_path(path)),
    }
}

/// True iff `candidate` equals `base` or lives underneath it.
///
/// Both arguments are expected in canonical form; the root base matches
/// every absolute path.
pub fn is_base_path(base: &str, candidate: &str) -> bool {
    if base == ROOT {
        return candidate.starts_with('/');
    }
    candidate == base
        || (candidate.starts_with(base) && candidate.as_bytes().get(base.len()) == Some(&b'/'))
}

/// True for the repository root.
pub fn is_root(path: &str) -> bool {
    path == ROOT
}

/// Last segment of a canonical path. Root has no name and yields `""`.
pub fn file_name(path: &str) -> &str {
    if is_root(path) {
        return "";
    }
    path.rsplit('/').next().unwrap_or("")
}

/// Parent of a canonical path. Root has no parent.
pub fn parent(path: &str) -> Option<&str> {
    if is_root(path) {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Join a canonical base with a single child name.
pub fn join(base: &str, name: &str) -> String {
    if is_root(base) {
        format!("/{name}")
    } else {
        format!("{base}/{name}")
    }
}

/// Residual of `path` below `base`, kept absolute.
///
/// `strip_base("/app", "/app/data") == Some("/data")`; a path equal to the
/// base yields root; a root base returns the path unchanged. `None` when
/// `base` is not a base path of `path`.
pub fn strip_base(base: &str, path: &str) -> Option<String> {
    if !is_base_path(base, path) {
        return None;
    }
    if is_root(base) {
        return Some(path.to_string());
    }
    let rest = &path[base.len()..];
    if rest.is_empty() {
        Some(ROOT.to_string())
    } else {
        Some(rest.to_string())
    }
}

/// Strict ancestors of a canonical path, nearest the root first.
///
/// Root itself is excluded (it always exists), as is the path itself:
/// `ancestors("/a/b/c") == ["/a", "/a/b"]`.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut idx = 1;
    while let Some(next) = path[idx..].find('/') {
        out.push(path[..idx + next].to_string());
        idx += next + 1;
    }
    out
}
