/*!
 * Path Matcher
 * Pluggable pattern-matching capability consumed by the stores
 */

use crate::types::{RepoError, RepoResult};

/// Pattern language of the built-in matcher.
pub const GLOB: &str = "glob";

/// Wildcard detection: a pattern without any of these behaves as an exact
/// path in `find`/`contains`.
pub fn is_pattern(text: &str) -> bool {
    text.contains(&['*', '?', '[', '{'][..])
}

/// Matching capability over candidate paths.
///
/// Stores are built with exactly one matcher; queries that name a different
/// pattern language fail with `UnsupportedLanguage` before any matching.
pub trait PathMatcher: Send + Sync {
    /// Language this matcher implements (e.g. `"glob"`).
    fn language(&self) -> &str;

    /// All candidates matching `pattern`, preserving candidate order.
    fn matches(&self, pattern: &str, candidates: &[&str]) -> RepoResult<Vec<String>>;
}

/// Glob matcher where `*` and `?` never cross a `/` separator.
#[derive(Debug, Clone, Default)]
pub struct GlobMatcher;

impl GlobMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl PathMatcher for GlobMatcher {
    fn language(&self) -> &str {
        GLOB
    }

    fn matches(&self, pattern: &str, candidates: &[&str]) -> RepoResult<Vec<String>> {
        let glob = globset::GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| RepoError::InvalidPattern(format!("{pattern}: {e}")))?
            .compile_matcher();

        Ok(candidates
            .iter()
            .filter(|c| glob.is_match(c))
            .map(|c| c.to_string())
            .collect())
    }
}
