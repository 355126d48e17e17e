use std::fmt;
use std::time::Duration;

/// How a search session ended. Exactly one is reported per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Every root was walked to the end.
    Completed,

    /// The cancellation scope fired before the walk finished.
    Cancelled,
}

impl SearchOutcome {
    pub fn is_cancelled(self) -> bool {
        self == Self::Cancelled
    }
}

impl fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// The result of [`SearchSession::run`](crate::SearchSession::run).
///
/// Matches themselves are delivered to observers as they are found; the
/// summary only carries the outcome and counters.
#[derive(Debug, Clone)]
pub struct SearchSummary {
    /// The outcome that was also passed to the completion observers.
    pub outcome: SearchOutcome,

    /// Traversal statistics across all roots.
    pub stats: WalkStats,
}

/// Counters for a finished (or cancelled) session.
#[derive(Debug, Clone, Default)]
pub struct WalkStats {
    /// Directories successfully listed.
    pub dirs_listed: usize,

    /// Directories skipped because they could not be read.
    pub dirs_pruned: usize,

    /// Match batches published.
    pub batches: usize,

    /// Entries across all published batches.
    pub matches: usize,

    /// Work items handed to the worker pool by the fan-out levels. Zero when
    /// every root was a single chain.
    pub tasks_dispatched: usize,

    /// Wall-clock time from the first listing to completion.
    pub duration: Duration,
}

impl WalkStats {
    /// Directories listed per second, clamped to 0 on zero-duration runs.
    pub fn dirs_per_sec(&self) -> usize {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            (self.dirs_listed as f64 / secs) as usize
        } else {
            0
        }
    }
}
