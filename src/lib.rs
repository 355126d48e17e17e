//! # fastfind
//!
//! Parallel recursive search for files or directories, with incremental
//! reporting and cooperative cancellation.
//!
//! Each root is walked in three phases. Runs of single-child directories are
//! followed serially on the calling thread (deep profile and cache paths are
//! common and not worth a pool task each). At the first directory with more
//! than one child, its subdirectories are spread over a rayon pool, and each
//! of those repeats the chain walk and spreads its own branch set once more.
//! Below that, every pool task does a plain sequential depth-first walk.
//!
//! Matches arrive in [`MatchBatch`]es, one per directory that had any, while
//! the walk is still running. A single completion call with the
//! [`SearchOutcome`] follows once every batch has been delivered.
//! Unreadable directories (access denied, vanished, path too long) are
//! skipped silently.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use fastfind::{CancellationScope, SearchOutcome};
//!
//! let dir = tempfile::tempdir().unwrap();
//! std::fs::write(dir.path().join("app.log"), "").unwrap();
//! std::fs::write(dir.path().join("notes.txt"), "").unwrap();
//!
//! let found = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&found);
//!
//! let summary = fastfind::search()
//!     .root(dir.path())
//!     .glob("*.log")
//!     .cancel_scope(CancellationScope::new())
//!     .on_matches(move |batch| {
//!         sink.lock().unwrap().extend(batch.entries().iter().map(|e| e.name.clone()));
//!     })
//!     .run()
//!     .unwrap();
//!
//! assert_eq!(summary.outcome, SearchOutcome::Completed);
//! assert_eq!(*found.lock().unwrap(), ["app.log"]);
//! ```
//!
//! # Custom Matchers
//!
//! Any `Fn(&Entry) -> bool` works through [`SearchBuilder::filter`]; implement
//! [`Matcher`] for reusable rules:
//!
//! ```rust
//! use fastfind::{Matcher, Entry};
//!
//! struct ExtensionMatcher(String);
//!
//! impl Matcher for ExtensionMatcher {
//!     fn is_match(&self, entry: &Entry) -> bool {
//!         entry.extension()
//!             .map(|e| e.eq_ignore_ascii_case(&self.0))
//!             .unwrap_or(false)
//!     }
//! }
//! ```

#![forbid(unsafe_code)]

mod builder;
mod cancel;
mod engine;
mod entry;
mod error;
mod lister;
mod matcher;
mod reporter;
mod results;
mod session;

// ── Public re-exports ─────────────────────────────────────────────────────────

pub use builder::SearchBuilder;
pub use cancel::CancellationScope;
pub use entry::{Entry, EntryKind, MatchBatch, Target};
pub use error::SearchError;
pub use matcher::{AllMatcher, FnMatcher, GlobMatcher, Matcher};
pub use reporter::DispatchMode;
pub use results::{SearchOutcome, SearchSummary, WalkStats};
pub use session::{SearchSession, SearchTask};

// ── Entry point ───────────────────────────────────────────────────────────────

/// Create a new [`SearchBuilder`] to configure and run a search.
///
/// # Example
///
/// ```rust
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::create_dir(dir.path().join("logs")).unwrap();
/// std::fs::write(dir.path().join("logs").join("a.log"), "").unwrap();
///
/// let summary = fastfind::search()
///     .root(dir.path())
///     .glob("*.log")
///     .run()
///     .unwrap();
///
/// assert_eq!(summary.stats.matches, 1);
/// ```
pub fn search() -> SearchBuilder {
    SearchBuilder::default()
}
