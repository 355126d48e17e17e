//! Delivery of match batches and the completion notice to observers.
//!
//! Two dispatch modes exist. [`DispatchMode::Inline`] calls observers on the
//! traversal thread that found the batch; several branches may therefore call
//! the same observer at once. [`DispatchMode::TrackedAsync`] spawns each
//! delivery on the worker pool and keeps a handle so that completion can wait
//! for every delivery to settle first.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use rayon::ThreadPool;
use tracing::warn;

use crate::cancel::CancellationScope;
use crate::entry::MatchBatch;
use crate::error::SearchError;
use crate::results::SearchOutcome;

/// Where match observers run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// On the traversal thread, synchronously. Observers may be re-entered
    /// concurrently from different branches and must synchronize themselves.
    #[default]
    Inline,

    /// As a separate job on the worker pool. Completion is reported only
    /// after every job has finished.
    TrackedAsync,
}

pub(crate) type BatchObserver = dyn Fn(&MatchBatch) + Send + Sync;
pub(crate) type CompletionObserver = dyn Fn(SearchOutcome) + Send + Sync;

/// Registered callbacks for one session.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    pub batch: Vec<Arc<BatchObserver>>,
    pub completed: Vec<Arc<CompletionObserver>>,
}

#[derive(Debug)]
enum Delivery {
    Delivered,
    /// The scope was cancelled before the job started; observers not called.
    Skipped,
    Panicked(String),
}

pub(crate) struct Reporter {
    mode: DispatchMode,
    observers: Arc<Observers>,
    scope: CancellationScope,
    pool: Arc<ThreadPool>,
    /// Held around each async delivery unless observers opted into
    /// concurrent calls.
    serial: Option<Arc<Mutex<()>>>,
    pending: Mutex<Vec<Receiver<Delivery>>>,
    batches: AtomicUsize,
    matches: AtomicUsize,
    finished: AtomicBool,
}

impl Reporter {
    pub fn new(
        mode: DispatchMode,
        observers: Arc<Observers>,
        scope: CancellationScope,
        pool: Arc<ThreadPool>,
        concurrent_observers: bool,
    ) -> Self {
        Self {
            mode,
            observers,
            scope,
            pool,
            serial: (!concurrent_observers).then(|| Arc::new(Mutex::new(()))),
            pending: Mutex::new(Vec::new()),
            batches: AtomicUsize::new(0),
            matches: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
        }
    }

    /// Hand a non-empty batch to the observers.
    pub fn publish(&self, batch: MatchBatch) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.matches.fetch_add(batch.len(), Ordering::Relaxed);

        if self.observers.batch.is_empty() {
            return;
        }

        match self.mode {
            DispatchMode::Inline => {
                for observer in &self.observers.batch {
                    observer(&batch);
                }
            }
            DispatchMode::TrackedAsync => {
                let (tx, rx) = crossbeam_channel::bounded(1);
                self.pending.lock().push(rx);

                let observers = Arc::clone(&self.observers);
                let scope = self.scope.clone();
                let serial = self.serial.clone();

                self.pool.spawn(move || {
                    let status = if scope.is_cancelled() {
                        Delivery::Skipped
                    } else {
                        let _guard = serial.as_ref().map(|m| m.lock());
                        let call = panic::catch_unwind(AssertUnwindSafe(|| {
                            for observer in &observers.batch {
                                observer(&batch);
                            }
                        }));
                        match call {
                            Ok(()) => Delivery::Delivered,
                            Err(payload) => Delivery::Panicked(panic_message(payload)),
                        }
                    };
                    // The receiver only disappears if settle() already gave up.
                    let _ = tx.send(status);
                });
            }
        }
    }

    /// Wait for every tracked delivery published so far.
    ///
    /// Returns `true` if any delivery was skipped because the scope was
    /// cancelled. Inline mode never has anything to wait for.
    pub fn settle(&self) -> Result<bool, SearchError> {
        let handles = std::mem::take(&mut *self.pending.lock());
        let mut skipped = false;
        let mut failure = None;

        for rx in handles {
            match rx.recv() {
                Ok(Delivery::Delivered) => {}
                Ok(Delivery::Skipped) => skipped = true,
                Ok(Delivery::Panicked(msg)) => {
                    warn!(message = %msg, "match observer panicked");
                    failure.get_or_insert(SearchError::ObserverPanicked(msg));
                }
                Err(_) => {
                    failure.get_or_insert_with(|| {
                        SearchError::ObserverPanicked("delivery job dropped".into())
                    });
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(skipped),
        }
    }

    /// Settle outstanding deliveries, then notify completion observers once.
    ///
    /// A skipped delivery turns a `Completed` outcome into `Cancelled`.
    pub fn finish(&self, outcome: SearchOutcome) -> Result<SearchOutcome, SearchError> {
        let outcome = if self.settle()? {
            SearchOutcome::Cancelled
        } else {
            outcome
        };

        if !self.finished.swap(true, Ordering::AcqRel) {
            for observer in &self.observers.completed {
                observer(outcome);
            }
        }
        Ok(outcome)
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn matches(&self) -> usize {
        self.matches.load(Ordering::Relaxed)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Entry, EntryKind};
    use std::path::PathBuf;
    use std::time::Duration;

    fn pool() -> Arc<ThreadPool> {
        Arc::new(rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap())
    }

    fn batch(n: usize) -> MatchBatch {
        let entries = (0..n)
            .map(|i| Entry {
                path: PathBuf::from(format!("/d/{i}")),
                name: i.to_string(),
                kind: EntryKind::File,
                depth: 1,
                len: 0,
                created: None,
                modified: None,
            })
            .collect();
        MatchBatch::new(PathBuf::from("/d"), entries)
    }

    fn counting(
        seen: &Arc<AtomicUsize>,
        done: &Arc<Mutex<Vec<SearchOutcome>>>,
        delay: Duration,
    ) -> Arc<Observers> {
        let seen = Arc::clone(seen);
        let done = Arc::clone(done);
        Arc::new(Observers {
            batch: vec![Arc::new(move |b: &MatchBatch| {
                std::thread::sleep(delay);
                seen.fetch_add(b.len(), Ordering::SeqCst);
            })],
            completed: vec![Arc::new(move |o: SearchOutcome| done.lock().push(o))],
        })
    }

    #[test]
    fn inline_delivers_before_publish_returns() {
        let seen = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(Mutex::new(Vec::new()));
        let obs = counting(&seen, &done, Duration::ZERO);
        let reporter = Reporter::new(DispatchMode::Inline, obs, CancellationScope::none(), pool(), false);

        reporter.publish(batch(3));
        assert_eq!(seen.load(Ordering::SeqCst), 3);

        let outcome = reporter.finish(SearchOutcome::Completed).unwrap();
        assert_eq!(outcome, SearchOutcome::Completed);
        assert_eq!(*done.lock(), [SearchOutcome::Completed]);
        assert_eq!(reporter.batches(), 1);
        assert_eq!(reporter.matches(), 3);
    }

    #[test]
    fn async_finish_waits_for_every_delivery() {
        let seen = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(Mutex::new(Vec::new()));
        let obs = counting(&seen, &done, Duration::from_millis(20));
        let reporter = Reporter::new(DispatchMode::TrackedAsync, obs, CancellationScope::new(), pool(), false);

        for _ in 0..5 {
            reporter.publish(batch(2));
        }
        let outcome = reporter.finish(SearchOutcome::Completed).unwrap();

        assert_eq!(outcome, SearchOutcome::Completed);
        assert_eq!(seen.load(Ordering::SeqCst), 10);
        assert_eq!(done.lock().len(), 1);
    }

    #[test]
    fn async_delivery_after_cancel_is_skipped_and_reported() {
        let seen = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(Mutex::new(Vec::new()));
        let obs = counting(&seen, &done, Duration::ZERO);
        let scope = CancellationScope::new();
        let reporter = Reporter::new(DispatchMode::TrackedAsync, obs, scope.clone(), pool(), false);

        scope.cancel().unwrap();
        reporter.publish(batch(1));

        let outcome = reporter.finish(SearchOutcome::Completed).unwrap();
        assert_eq!(outcome, SearchOutcome::Cancelled);
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(*done.lock(), [SearchOutcome::Cancelled]);
    }

    #[test]
    fn async_observer_panic_fails_settle() {
        let obs = Arc::new(Observers {
            batch: vec![Arc::new(|_: &MatchBatch| panic!("observer blew up"))],
            completed: Vec::new(),
        });
        let reporter = Reporter::new(DispatchMode::TrackedAsync, obs, CancellationScope::none(), pool(), false);
        reporter.publish(batch(1));

        match reporter.settle() {
            Err(SearchError::ObserverPanicked(msg)) => assert!(msg.contains("blew up")),
            other => panic!("expected observer panic, got {other:?}"),
        }
    }

    #[test]
    fn completion_fires_once() {
        let seen = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(Mutex::new(Vec::new()));
        let obs = counting(&seen, &done, Duration::ZERO);
        let reporter = Reporter::new(DispatchMode::Inline, obs, CancellationScope::none(), pool(), false);

        reporter.finish(SearchOutcome::Cancelled).unwrap();
        reporter.finish(SearchOutcome::Completed).unwrap();
        assert_eq!(*done.lock(), [SearchOutcome::Cancelled]);
    }

    #[test]
    fn serialized_async_observers_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicBool::new(false));
        let (a, o) = (Arc::clone(&active), Arc::clone(&overlap));
        let obs = Arc::new(Observers {
            batch: vec![Arc::new(move |_: &MatchBatch| {
                if a.fetch_add(1, Ordering::SeqCst) > 0 {
                    o.store(true, Ordering::SeqCst);
                }
                std::thread::sleep(Duration::from_millis(5));
                a.fetch_sub(1, Ordering::SeqCst);
            })],
            completed: Vec::new(),
        });
        let reporter = Reporter::new(DispatchMode::TrackedAsync, obs, CancellationScope::none(), pool(), false);
        for _ in 0..8 {
            reporter.publish(batch(1));
        }
        reporter.finish(SearchOutcome::Completed).unwrap();
        assert!(!overlap.load(Ordering::SeqCst));
    }
}
