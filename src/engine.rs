use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rayon::prelude::*;
use tracing::debug;

use crate::cancel::CancellationScope;
use crate::entry::{Entry, MatchBatch};
use crate::error::SearchError;
use crate::lister::{Dir, DirLister, Listing};
use crate::matcher::Matcher;
use crate::reporter::Reporter;
use crate::results::WalkStats;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The traversal core shared by every root of one session.
///
/// A root is first chain-walked on the calling thread until the tree
/// branches. The branch set is then spread over the worker pool for
/// `fan_out_levels` levels: every level but the last chain-walks again and
/// fans out its own branch set, the last level runs a plain sequential
/// post-order descent. Must be driven from inside the session's pool
/// (`ThreadPool::install`) so that fan-out lands on that pool.
pub(crate) struct Engine<'a> {
    matcher: &'a dyn Matcher,
    lister: DirLister,
    scope: &'a CancellationScope,
    reporter: &'a Reporter,
    fan_out_levels: usize,
    counters: Counters,
}

/// Pending work of a sequential descent.
enum Step {
    Visit(Dir),
    Publish(Dir, Vec<Entry>),
}

#[derive(Default)]
struct Counters {
    dirs_listed: AtomicUsize,
    dirs_pruned: AtomicUsize,
    tasks: AtomicUsize,
}

impl<'a> Engine<'a> {
    pub fn new(
        matcher: &'a dyn Matcher,
        lister: DirLister,
        scope: &'a CancellationScope,
        reporter: &'a Reporter,
        fan_out_levels: usize,
    ) -> Self {
        Self {
            matcher,
            lister,
            scope,
            reporter,
            fan_out_levels,
            counters: Counters::default(),
        }
    }

    /// Walk one root to the end. Returns `Err(Cancelled)` as soon as any
    /// branch observes the scope cancelled, or the first fatal IO error.
    pub fn walk_root(&self, root: &Path) -> Result<(), SearchError> {
        let branches = self.find_branch(Dir::root(root.to_path_buf()))?;
        self.fan_out(branches, self.fan_out_levels)
    }

    // ── Chain walk ────────────────────────────────────────────────────────

    /// Follow single-child directories serially, publishing matches on the
    /// way, until a directory with more than one subdirectory is reached.
    /// Returns that directory's subdirectories, or nothing if the chain ended
    /// in a leaf or an unreadable directory.
    fn find_branch(&self, mut dir: Dir) -> Result<Vec<Dir>, SearchError> {
        loop {
            self.scope.check()?;

            match self.list(&dir)? {
                Listing::Pruned => return Ok(Vec::new()),
                Listing::Leaf { candidates } => {
                    self.publish(&dir, candidates);
                    return Ok(Vec::new());
                }
                Listing::Children {
                    mut subdirs,
                    candidates,
                } => {
                    self.publish(&dir, candidates);
                    if subdirs.len() > 1 {
                        return Ok(subdirs);
                    }
                    dir = subdirs.swap_remove(0);
                }
            }
        }
    }

    // ── Fan-out ───────────────────────────────────────────────────────────

    fn fan_out(&self, dirs: Vec<Dir>, levels: usize) -> Result<(), SearchError> {
        if dirs.is_empty() {
            return Ok(());
        }
        debug!(width = dirs.len(), levels, "fanning out");

        // try_for_each joins every item and short-circuits on the first
        // error, so a cancelled branch stops its siblings at their next check.
        dirs.into_par_iter().try_for_each(|dir| {
            self.counters.tasks.fetch_add(1, Ordering::Relaxed);
            if levels > 1 {
                let next = self.find_branch(dir)?;
                self.fan_out(next, levels - 1)
            } else {
                self.descend(dir)
            }
        })
    }

    // ── Sequential descent ────────────────────────────────────────────────

    /// Depth-first, post-order: every subdirectory is fully reported before
    /// this directory's own matches.
    ///
    /// Runs on an explicit stack so that chains thousands of levels deep do
    /// not exhaust a worker thread's stack.
    fn descend(&self, dir: Dir) -> Result<(), SearchError> {
        let mut stack = vec![Step::Visit(dir)];

        while let Some(step) = stack.pop() {
            self.scope.check()?;

            match step {
                Step::Visit(dir) => {
                    let (subdirs, candidates) = match self.list(&dir)? {
                        Listing::Pruned => continue,
                        Listing::Leaf { candidates } => (Vec::new(), candidates),
                        Listing::Children {
                            subdirs,
                            candidates,
                        } => (subdirs, candidates),
                    };

                    // Pushed first, popped after every subdirectory below it.
                    stack.push(Step::Publish(dir, candidates));
                    stack.extend(subdirs.into_iter().rev().map(Step::Visit));
                }
                Step::Publish(dir, candidates) => self.publish(&dir, candidates),
            }
        }
        Ok(())
    }

    // ── Helpers ───────────────────────────────────────────────────────────

    fn list(&self, dir: &Dir) -> Result<Listing, SearchError> {
        let listing = self.lister.list(dir)?;
        let counter = match listing {
            Listing::Pruned => &self.counters.dirs_pruned,
            _ => &self.counters.dirs_listed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(listing)
    }

    /// Run the matcher over `candidates` and publish the survivors as one
    /// batch. Nothing is published when no candidate matches.
    fn publish(&self, dir: &Dir, candidates: Vec<Entry>) {
        let matched: Vec<Entry> = candidates
            .into_iter()
            .filter(|e| self.matcher.is_match(e))
            .collect();

        if !matched.is_empty() {
            self.reporter
                .publish(MatchBatch::new(dir.path.clone(), matched));
        }
    }

    /// Snapshot the counters, combined with the reporter's batch counts.
    pub fn stats(&self, duration: Duration) -> WalkStats {
        WalkStats {
            dirs_listed: self.counters.dirs_listed.load(Ordering::Relaxed),
            dirs_pruned: self.counters.dirs_pruned.load(Ordering::Relaxed),
            batches: self.reporter.batches(),
            matches: self.reporter.matches(),
            tasks_dispatched: self.counters.tasks.load(Ordering::Relaxed),
            duration,
        }
    }
}
