use globset::{GlobBuilder, GlobMatcher as CompiledGlob};

use crate::entry::Entry;
use crate::error::SearchError;

/// Determines whether an entry is a match.
///
/// The engine calls `is_match` only on candidates selected by the session's
/// [`Target`](crate::Target), so a matcher never has to filter on kind.
///
/// # Thread Safety
///
/// `Send + Sync` are required: matchers are shared by every branch of the
/// walk and called concurrently on different entries.
///
/// # Example
///
/// ```rust
/// use fastfind::{Entry, Matcher};
///
/// struct LargerThan(u64);
///
/// impl Matcher for LargerThan {
///     fn is_match(&self, entry: &Entry) -> bool {
///         entry.len > self.0
///     }
/// }
/// ```
pub trait Matcher: Send + Sync {
    /// Returns `true` if this entry should be reported.
    fn is_match(&self, entry: &Entry) -> bool;
}

impl<F> Matcher for F
where
    F: Fn(&Entry) -> bool + Send + Sync,
{
    fn is_match(&self, entry: &Entry) -> bool {
        self(entry)
    }
}

/// Matches entry names against a shell-style pattern such as `*.log` or
/// `report-??.txt`.
///
/// The pattern applies to the file name only, never to the full path.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    glob: CompiledGlob,
}

impl GlobMatcher {
    /// Compile `pattern`. Case sensitivity follows the host platform:
    /// insensitive on Windows, sensitive elsewhere.
    pub fn new(pattern: &str) -> Result<Self, SearchError> {
        Self::with_case(pattern, cfg!(windows))
    }

    pub fn with_case(pattern: &str, case_insensitive: bool) -> Result<Self, SearchError> {
        if pattern.is_empty() {
            return Err(SearchError::EmptyPattern);
        }

        let glob = GlobBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .literal_separator(true)
            .backslash_escape(!cfg!(windows))
            .build()
            .map_err(|source| SearchError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            glob: glob.compile_matcher(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.glob.glob().glob()
    }
}

impl Matcher for GlobMatcher {
    fn is_match(&self, entry: &Entry) -> bool {
        self.glob.is_match(&entry.name)
    }
}

/// Wraps an arbitrary predicate as a named matcher type.
pub struct FnMatcher<F>(pub F);

impl<F> Matcher for FnMatcher<F>
where
    F: Fn(&Entry) -> bool + Send + Sync,
{
    fn is_match(&self, entry: &Entry) -> bool {
        (self.0)(entry)
    }
}

/// Matches every entry. Used when no matcher is specified.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllMatcher;

impl Matcher for AllMatcher {
    fn is_match(&self, _entry: &Entry) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryKind;
    use std::path::PathBuf;

    fn file(name: &str) -> Entry {
        Entry {
            path: PathBuf::from("/tmp").join(name),
            name: name.to_string(),
            kind: EntryKind::File,
            depth: 1,
            len: 0,
            created: None,
            modified: None,
        }
    }

    #[test]
    fn glob_matches_on_name() {
        let m = GlobMatcher::with_case("*.log", false).unwrap();
        assert!(m.is_match(&file("app.log")));
        assert!(!m.is_match(&file("app.log.gz")));
        assert!(!m.is_match(&file("app.txt")));
    }

    #[test]
    fn glob_question_mark_is_single_char() {
        let m = GlobMatcher::with_case("report-??.txt", false).unwrap();
        assert!(m.is_match(&file("report-01.txt")));
        assert!(!m.is_match(&file("report-1.txt")));
    }

    #[test]
    fn glob_case_insensitive() {
        let m = GlobMatcher::with_case("*.LOG", true).unwrap();
        assert!(m.is_match(&file("app.log")));

        let m = GlobMatcher::with_case("*.LOG", false).unwrap();
        assert!(!m.is_match(&file("app.log")));
    }

    #[test]
    fn star_matches_everything() {
        let m = GlobMatcher::with_case("*", false).unwrap();
        assert!(m.is_match(&file("anything")));
        assert!(m.is_match(&file(".hidden")));
    }

    #[test]
    fn empty_pattern_rejected() {
        assert!(matches!(GlobMatcher::new(""), Err(SearchError::EmptyPattern)));
    }

    #[test]
    fn malformed_pattern_rejected() {
        let err = GlobMatcher::new("[abc").unwrap_err();
        assert!(matches!(err, SearchError::InvalidPattern { .. }));
    }

    #[test]
    fn closures_are_matchers() {
        let m = |e: &Entry| e.name.starts_with("inv");
        assert!(m.is_match(&file("invoice.txt")));
        assert!(!FnMatcher(|e: &Entry| e.len > 0).is_match(&file("empty.txt")));
        assert!(AllMatcher.is_match(&file("x")));
    }
}
