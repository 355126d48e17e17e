use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cancel::CancellationScope;
use crate::entry::{Entry, MatchBatch, Target};
use crate::error::SearchError;
use crate::matcher::{AllMatcher, FnMatcher, GlobMatcher, Matcher};
use crate::reporter::{DispatchMode, Observers};
use crate::results::{SearchOutcome, SearchSummary};
use crate::session::{SearchConfig, SearchSession};

// ---------------------------------------------------------------------------
// SearchBuilder
// ---------------------------------------------------------------------------

/// Entry point for configuring a search.
///
/// Created via [`fastfind::search()`](crate::search). Configure with chained
/// builder methods, then call [`build()`](SearchBuilder::build) to validate
/// into a [`SearchSession`], or [`run()`](SearchBuilder::run) to do both.
///
/// # Example
///
/// ```rust,ignore
/// let scope = CancellationScope::new();
/// let session = fastfind::search()
///     .root("/var/log")
///     .glob("*.log")
///     .cancel_scope(scope.clone())
///     .dispatch(DispatchMode::TrackedAsync)
///     .on_matches(|batch| println!("{} in {}", batch.len(), batch.dir().display()))
///     .on_completed(|outcome| println!("search {outcome}"))
///     .build()?;
/// session.run()?;
/// ```
pub struct SearchBuilder {
    roots:                 Vec<PathBuf>,
    matcher:               Option<Arc<dyn Matcher>>,
    pattern:               Option<String>,
    case_insensitive:      bool,
    target:                Target,
    dispatch:              DispatchMode,
    scope:                 CancellationScope,
    suppress_cancellation: bool,
    threads:               usize,
    fan_out_levels:        usize,
    follow_links:          bool,
    concurrent_observers:  bool,
    observers:             Observers,
}

impl Default for SearchBuilder {
    fn default() -> Self {
        Self {
            roots:                 Vec::new(),
            matcher:               None,
            pattern:               None,
            case_insensitive:      cfg!(windows),
            target:                Target::Files,
            dispatch:              DispatchMode::Inline,
            scope:                 CancellationScope::none(),
            suppress_cancellation: true,
            threads:               num_cpus(),
            fan_out_levels:        2,
            follow_links:          false,
            concurrent_observers:  false,
            observers:             Observers::default(),
        }
    }
}

impl SearchBuilder {
    // ── Roots ─────────────────────────────────────────────────────────────

    /// Add a directory to search. May be called repeatedly; roots are
    /// walked in the order they were added.
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.roots.push(path.into());
        self
    }

    /// Add several directories to search.
    pub fn roots<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.roots.extend(paths.into_iter().map(Into::into));
        self
    }

    // ── Matching ──────────────────────────────────────────────────────────

    /// Match entry names against a shell-style pattern (`*.log`,
    /// `report-??.txt`). The pattern is compiled by [`build()`](Self::build).
    pub fn glob(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self.matcher = None;
        self
    }

    /// Case-insensitive glob matching. Defaults to the host convention:
    /// on for Windows, off elsewhere. Ignored for custom matchers.
    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    /// Match with an arbitrary predicate over the entry.
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&Entry) -> bool + Send + Sync + 'static,
    {
        self.with_matcher(FnMatcher(predicate))
    }

    /// Set a custom matcher. Replaces any glob or filter set earlier.
    pub fn with_matcher(mut self, m: impl Matcher + 'static) -> Self {
        self.matcher = Some(Arc::new(m));
        self.pattern = None;
        self
    }

    /// Search for files (default) or for directories.
    pub fn target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    // ── Reporting ─────────────────────────────────────────────────────────

    /// Register a match observer. Called once per non-empty batch.
    ///
    /// In [`DispatchMode::Inline`] the observer may run on several worker
    /// threads at once and must synchronize its own state.
    pub fn on_matches<F>(mut self, f: F) -> Self
    where
        F: Fn(&MatchBatch) + Send + Sync + 'static,
    {
        self.observers.batch.push(Arc::new(f));
        self
    }

    /// Register a completion observer. Called exactly once per run, after
    /// the last match observer call.
    pub fn on_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(SearchOutcome) + Send + Sync + 'static,
    {
        self.observers.completed.push(Arc::new(f));
        self
    }

    /// Where match observers run. Defaults to [`DispatchMode::Inline`].
    pub fn dispatch(mut self, mode: DispatchMode) -> Self {
        self.dispatch = mode;
        self
    }

    /// Allow [`DispatchMode::TrackedAsync`] deliveries to call observers
    /// concurrently. Off by default: async deliveries of one run are
    /// serialized.
    pub fn concurrent_observers(mut self, yes: bool) -> Self {
        self.concurrent_observers = yes;
        self
    }

    // ── Cancellation ──────────────────────────────────────────────────────

    /// Make the search cancellable through `scope`. Without a scope the
    /// search always runs to the end.
    pub fn cancel_scope(mut self, scope: CancellationScope) -> Self {
        self.scope = scope;
        self
    }

    /// When `true` (default) a cancelled run returns `Ok` with a
    /// [`SearchOutcome::Cancelled`] summary. When `false` it returns
    /// [`SearchError::Cancelled`] after the completion observers ran.
    pub fn suppress_cancellation(mut self, yes: bool) -> Self {
        self.suppress_cancellation = yes;
        self
    }

    // ── Traversal ─────────────────────────────────────────────────────────

    /// Number of worker threads. Defaults to the number of logical cores.
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = n;
        self
    }

    /// How many levels of branch sets are spread over the worker pool
    /// before branches fall back to sequential descent. Defaults to 2.
    pub fn fan_out_levels(mut self, levels: usize) -> Self {
        self.fan_out_levels = levels;
        self
    }

    /// Treat symbolic links to directories as directories. Off by default.
    /// There is no cycle detection.
    pub fn follow_links(mut self, yes: bool) -> Self {
        self.follow_links = yes;
        self
    }

    // ── Build ─────────────────────────────────────────────────────────────

    /// Validate the configuration and produce a runnable session.
    ///
    /// # Errors
    ///
    /// Fails before touching the tree when: no roots were given, a root is
    /// empty, missing, or not a directory, the glob is empty or malformed,
    /// or the thread or fan-out count is zero.
    pub fn build(self) -> Result<SearchSession, SearchError> {
        if self.roots.is_empty() {
            return Err(SearchError::NoRoots);
        }
        for root in &self.roots {
            check_root(root)?;
        }
        if self.threads == 0 {
            return Err(SearchError::InvalidThreadCount(self.threads));
        }
        if self.fan_out_levels == 0 {
            return Err(SearchError::InvalidFanOut(self.fan_out_levels));
        }

        let matcher: Arc<dyn Matcher> = match (self.pattern, self.matcher) {
            (Some(pattern), _) => Arc::new(GlobMatcher::with_case(&pattern, self.case_insensitive)?),
            (None, Some(m))    => m,
            (None, None)       => Arc::new(AllMatcher),
        };

        Ok(SearchSession {
            roots: self.roots,
            matcher,
            scope: self.scope,
            observers: Arc::new(self.observers),
            config: SearchConfig {
                threads:               self.threads,
                fan_out_levels:        self.fan_out_levels,
                target:                self.target,
                dispatch:              self.dispatch,
                follow_links:          self.follow_links,
                suppress_cancellation: self.suppress_cancellation,
                concurrent_observers:  self.concurrent_observers,
            },
        })
    }

    /// Build and run in one step. See [`SearchSession::run`].
    pub fn run(self) -> Result<SearchSummary, SearchError> {
        self.build()?.run()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn check_root(root: &Path) -> Result<(), SearchError> {
    if root.as_os_str().is_empty() {
        return Err(SearchError::EmptyRoot);
    }
    match fs::metadata(root) {
        Ok(m) if m.is_dir() => Ok(()),
        Ok(_)               => Err(SearchError::NotADirectory(root.to_path_buf())),
        Err(_)              => Err(SearchError::RootNotFound(root.to_path_buf())),
    }
}

/// Get the logical CPU count, with a safe fallback.
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
