use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use rayon::ThreadPoolBuilder;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cancel::CancellationScope;
use crate::engine::Engine;
use crate::entry::Target;
use crate::error::SearchError;
use crate::lister::DirLister;
use crate::matcher::Matcher;
use crate::reporter::{DispatchMode, Observers, Reporter};
use crate::results::{SearchOutcome, SearchSummary};

// ---------------------------------------------------------------------------
// SearchConfig
// ---------------------------------------------------------------------------

/// Validated traversal parameters, filled in by
/// [`SearchBuilder`](crate::SearchBuilder).
#[derive(Debug, Clone)]
pub(crate) struct SearchConfig {
    pub threads: usize,
    pub fan_out_levels: usize,
    pub target: Target,
    pub dispatch: DispatchMode,
    pub follow_links: bool,
    pub suppress_cancellation: bool,
    pub concurrent_observers: bool,
}

// ---------------------------------------------------------------------------
// SearchSession
// ---------------------------------------------------------------------------

/// A validated, runnable search over one or more roots.
///
/// Roots are walked one after another; each walk is parallel internally.
/// Observers are called with every non-empty [`MatchBatch`](crate::MatchBatch)
/// and then exactly once with the [`SearchOutcome`].
///
/// Built with [`fastfind::search()`](crate::search).
pub struct SearchSession {
    pub(crate) roots: Vec<PathBuf>,
    pub(crate) matcher: Arc<dyn Matcher>,
    pub(crate) scope: CancellationScope,
    pub(crate) observers: Arc<Observers>,
    pub(crate) config: SearchConfig,
}

impl SearchSession {
    /// Run the search on the current thread and block until the completion
    /// observers have been called.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Cancelled`] if the scope was cancelled and
    ///   cancellation is not suppressed. The completion observers have
    ///   already seen [`SearchOutcome::Cancelled`] by then.
    /// - [`SearchError::Io`] for IO failures other than the ones that prune a
    ///   subtree. Completion observers are not called.
    /// - [`SearchError::ObserverPanicked`] if an async delivery panicked.
    /// - [`SearchError::ThreadPool`] if the worker pool could not start.
    ///
    /// A panic in an inline observer or in the matcher is not caught and
    /// unwinds out of `run`.
    pub fn run(&self) -> Result<SearchSummary, SearchError> {
        let start = Instant::now();
        let config = &self.config;

        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("fastfind-{i}"))
            .build()
            .map_err(|e| SearchError::ThreadPool(e.to_string()))?;
        let pool = Arc::new(pool);

        let reporter = Reporter::new(
            config.dispatch,
            Arc::clone(&self.observers),
            self.scope.clone(),
            Arc::clone(&pool),
            config.concurrent_observers,
        );
        let engine = Engine::new(
            &*self.matcher,
            DirLister::new(config.target, config.follow_links),
            &self.scope,
            &reporter,
            config.fan_out_levels,
        );

        debug!(
            roots = self.roots.len(),
            threads = config.threads,
            dispatch = ?config.dispatch,
            target = ?config.target,
            "search started"
        );

        let mut outcome = SearchOutcome::Completed;
        for root in &self.roots {
            debug!(root = %root.display(), "walking root");

            match pool.install(|| engine.walk_root(root)) {
                Ok(()) => {}
                Err(SearchError::Cancelled) => outcome = SearchOutcome::Cancelled,
                Err(e) => {
                    // Let in-flight deliveries finish before failing.
                    let _ = reporter.settle();
                    return Err(e);
                }
            }

            if reporter.settle()? {
                outcome = SearchOutcome::Cancelled;
            }
            if outcome.is_cancelled() {
                break;
            }
        }

        let outcome = reporter.finish(outcome)?;
        let stats = engine.stats(start.elapsed());
        debug!(
            %outcome,
            matches = stats.matches,
            batches = stats.batches,
            dirs = stats.dirs_listed,
            pruned = stats.dirs_pruned,
            elapsed_ms = stats.duration.as_millis() as u64,
            "search finished"
        );

        if outcome.is_cancelled() && !config.suppress_cancellation {
            return Err(SearchError::Cancelled);
        }

        Ok(SearchSummary { outcome, stats })
    }

    /// Start the search on tokio's blocking pool and return immediately.
    ///
    /// The returned task resolves when [`run`](Self::run) would have
    /// returned. Keep a clone of [`scope()`](Self::scope) to cancel it later.
    ///
    /// # Errors
    ///
    /// [`SearchError::Task`] if called outside a tokio runtime.
    pub fn run_async(self) -> Result<SearchTask, SearchError> {
        let runtime = Handle::try_current().map_err(|e| SearchError::Task(e.to_string()))?;
        Ok(SearchTask {
            handle: runtime.spawn_blocking(move || self.run()),
        })
    }

    /// Cancel the search. Safe to call from any thread, before, during, or
    /// after a run.
    ///
    /// # Errors
    ///
    /// [`SearchError::NotCancellable`] if the session was built without a
    /// cancellation scope.
    pub fn stop(&self) -> Result<(), SearchError> {
        self.scope.cancel()
    }

    pub fn scope(&self) -> &CancellationScope {
        &self.scope
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

// ---------------------------------------------------------------------------
// SearchTask
// ---------------------------------------------------------------------------

/// Handle to a search started with [`SearchSession::run_async`].
pub struct SearchTask {
    handle: JoinHandle<Result<SearchSummary, SearchError>>,
}

impl SearchTask {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for SearchTask {
    type Output = Result<SearchSummary, SearchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.handle).poll(cx).map(|joined| match joined {
            Ok(result) => result,
            Err(e) => Err(SearchError::Task(e.to_string())),
        })
    }
}
