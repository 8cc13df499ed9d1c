//! Bounded-concurrency, order-preserving batch executor.
//!
//! Jobs are fed through a bounded channel to a fixed set of worker threads,
//! one thread per admission slot. Every queued job travels together with a
//! mutable borrow of its own result slot, so each outcome lands at its input
//! index without any locking on the result vector. `std::thread::scope` is
//! the join barrier: `run` returns only after every job has settled.
//!
//! If the OS refuses to start a worker thread the batch carries on with the
//! workers already running; with none at all, jobs settle on the calling
//! thread.

use crossbeam_channel::bounded;
use indicatif::ProgressBar;
use std::io;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use tracing::{debug, warn};

use crate::error::WorkerPanic;
use crate::models::{BatchResult, Outcome};
use crate::progress::log_progress;

/// Worker threads started for an unbounded batch. Jobs beyond this wait in
/// the queue.
pub const MAX_WORKER_THREADS: usize = 64;

/// Log-only progress lines are emitted every this many settled jobs.
const LOG_INTERVAL: u64 = 25;

/// How many jobs of one batch may be in flight at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    Bounded(NonZeroUsize),
    /// One admission slot per job, up to [`MAX_WORKER_THREADS`].
    #[default]
    Unbounded,
}

impl Concurrency {
    /// `None` when `n` is zero.
    pub fn bounded(n: usize) -> Option<Self> {
        NonZeroUsize::new(n).map(Concurrency::Bounded)
    }

    /// Number of worker threads needed for a batch of `jobs`.
    fn slots_for(self, jobs: usize) -> usize {
        match self {
            Concurrency::Bounded(n) => n.get().min(jobs),
            Concurrency::Unbounded => jobs.min(MAX_WORKER_THREADS),
        }
    }
}

/// Runs a uniform worker over a batch of jobs.
///
/// Guarantees, for every call to [`BatchExecutor::run`]:
/// - every job is attempted exactly once, with no retry;
/// - `result[i]` answers `jobs[i]` regardless of completion order;
/// - at most the configured number of worker invocations are in flight;
/// - a failing or panicking job only affects its own slot.
#[derive(Debug, Clone)]
pub struct BatchExecutor {
    concurrency: Concurrency,
    phase: &'static str,
    progress: Option<ProgressBar>,
}

impl BatchExecutor {
    pub fn new(concurrency: Concurrency) -> Self {
        Self {
            concurrency,
            phase: "batch",
            progress: None,
        }
    }

    /// Advance `pb` once per settled job; `phase` labels log-only output.
    pub fn with_progress(mut self, phase: &'static str, pb: ProgressBar) -> Self {
        self.phase = phase;
        self.progress = Some(pb);
        self
    }

    pub fn concurrency(&self) -> Concurrency {
        self.concurrency
    }

    pub fn run<T, R, E, F>(&self, jobs: Vec<T>, worker: F) -> BatchResult<R, E>
    where
        T: Send,
        R: Send,
        E: Send + From<WorkerPanic>,
        F: Fn(T) -> Outcome<R, E> + Sync,
    {
        self.run_gated(jobs, worker, |_| true)
    }

    /// `run`, with `may_spawn(i)` deciding whether worker `i` may be started.
    /// A refused worker is handled like an OS refusal to create the thread.
    fn run_gated<T, R, E, F, G>(&self, jobs: Vec<T>, worker: F, may_spawn: G) -> BatchResult<R, E>
    where
        T: Send,
        R: Send,
        E: Send + From<WorkerPanic>,
        F: Fn(T) -> Outcome<R, E> + Sync,
        G: Fn(usize) -> bool,
    {
        if jobs.is_empty() {
            return Vec::new();
        }

        let total = jobs.len();
        let slot_count = self.concurrency.slots_for(total);
        if let Some(pb) = &self.progress {
            pb.set_length(total as u64);
            pb.set_position(0);
            pb.set_message("running");
        }

        let mut results: Vec<Option<Outcome<R, E>>> = Vec::with_capacity(total);
        results.resize_with(total, || None);

        let worker = &worker;
        let settle = |index: usize, job: T, slot: &mut Option<Outcome<R, E>>| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker(job)))
                .unwrap_or_else(|payload| Err(E::from(WorkerPanic::new(index, payload))));
            *slot = Some(outcome);
            debug!(phase = self.phase, index, total, "job settled");
            self.tick(total as u64);
        };
        let settle = &settle;

        thread::scope(|scope| {
            let (job_tx, job_rx) = bounded::<(usize, T, &mut Option<Outcome<R, E>>)>(slot_count);

            let mut started = 0;
            for i in 0..slot_count {
                let spawned = if may_spawn(i) {
                    let rx = job_rx.clone();
                    thread::Builder::new()
                        .name(format!("{}-{}", self.phase, i))
                        .spawn_scoped(scope, move || {
                            while let Ok((index, job, slot)) = rx.recv() {
                                settle(index, job, slot);
                            }
                        })
                        .map(|_| ())
                } else {
                    Err(io::Error::new(io::ErrorKind::WouldBlock, "worker start refused"))
                };
                match spawned {
                    Ok(()) => started += 1,
                    Err(e) => {
                        warn!(phase = self.phase, started, wanted = slot_count, error = %e, "couldn't start worker thread");
                        break;
                    }
                }
            }
            drop(job_rx);

            if started == 0 {
                // No worker thread at all: settle every job on this thread.
                for ((index, job), slot) in jobs.into_iter().enumerate().zip(results.iter_mut()) {
                    settle(index, job, slot);
                }
                return;
            }

            for ((index, job), slot) in jobs.into_iter().enumerate().zip(results.iter_mut()) {
                if job_tx.send((index, job, slot)).is_err() {
                    break;
                }
            }
        });

        if let Some(pb) = &self.progress {
            pb.finish_with_message(format!("{} settled", total));
        }

        results
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.unwrap_or_else(|| Err(E::from(WorkerPanic::unsettled(index)))))
            .collect()
    }

    fn tick(&self, total: u64) {
        if let Some(pb) = &self.progress {
            pb.inc(1);
            log_progress(self.phase, pb.position(), total, LOG_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, Mutex};
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Rejected(usize),
        Panicked(String),
    }

    impl From<WorkerPanic> for TestError {
        fn from(p: WorkerPanic) -> Self {
            TestError::Panicked(p.message)
        }
    }

    fn bounded(n: usize) -> BatchExecutor {
        BatchExecutor::new(Concurrency::bounded(n).unwrap())
    }

    #[test]
    fn test_empty_input_never_invokes_worker() {
        let calls = AtomicUsize::new(0);
        let result: BatchResult<usize, TestError> = bounded(4).run(Vec::<usize>::new(), |j| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(j)
        });
        assert!(result.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_order_preserved_under_reverse_latency() {
        // Earlier jobs sleep longest, so they finish last.
        let jobs: Vec<u64> = (0..12).collect();
        let result: BatchResult<u64, TestError> = bounded(4).run(jobs.clone(), |j| {
            thread::sleep(Duration::from_millis((12 - j) * 5));
            Ok(j * 10)
        });
        assert_eq!(result.len(), jobs.len());
        for (i, outcome) in result.iter().enumerate() {
            assert_eq!(outcome, &Ok(i as u64 * 10));
        }
    }

    #[test]
    fn test_concurrency_bound_respected() {
        let in_flight = AtomicUsize::new(0);
        let max_seen = AtomicUsize::new(0);
        let result: BatchResult<(), TestError> = bounded(3).run((0..20).collect::<Vec<_>>(), |_j: i32| {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            max_seen.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(result.len(), 20);
        assert!(max_seen.load(Ordering::SeqCst) <= 3);
        assert!(max_seen.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_single_slot_runs_in_input_order() {
        let seen = Mutex::new(Vec::new());
        let _: BatchResult<(), TestError> = bounded(1).run(vec!["a", "b", "c", "d"], |j| {
            seen.lock().unwrap().push(j);
            Ok(())
        });
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_unbounded_runs_all_jobs_at_once() {
        // Deadlocks unless every job is in flight simultaneously.
        let jobs = 8;
        let barrier = Barrier::new(jobs);
        let result: BatchResult<usize, TestError> =
            BatchExecutor::new(Concurrency::Unbounded).run((0..jobs).collect(), |j| {
                barrier.wait();
                Ok(j)
            });
        assert_eq!(result, (0..jobs).map(Ok).collect::<Vec<_>>());
    }

    #[test]
    fn test_failure_is_isolated() {
        let attempts = AtomicUsize::new(0);
        let result = bounded(2).run((0..6).collect::<Vec<usize>>(), |j| {
            attempts.fetch_add(1, Ordering::SeqCst);
            if j == 2 {
                Err(TestError::Rejected(j))
            } else {
                Ok(j + 100)
            }
        });
        assert_eq!(attempts.load(Ordering::SeqCst), 6);
        assert_eq!(
            result,
            vec![
                Ok(100),
                Ok(101),
                Err(TestError::Rejected(2)),
                Ok(103),
                Ok(104),
                Ok(105)
            ]
        );
    }

    #[test]
    fn test_panic_is_isolated() {
        let result: BatchResult<usize, TestError> = bounded(2).run((0..5).collect(), |j| {
            if j == 1 {
                panic!("worker exploded");
            }
            Ok(j)
        });
        assert_eq!(result.len(), 5);
        assert_eq!(result[0], Ok(0));
        assert_eq!(result[1], Err(TestError::Panicked("worker exploded".to_string())));
        assert_eq!(result[2], Ok(2));
        assert_eq!(result[4], Ok(4));
    }

    #[test]
    fn test_progress_bar_counts_settled_jobs() {
        let pb = ProgressBar::hidden();
        let executor = bounded(3).with_progress("test", pb.clone());
        let _: BatchResult<usize, TestError> = executor.run((0..7).collect(), Ok);
        assert_eq!(pb.position(), 7);
        assert_eq!(pb.length(), Some(7));
    }

    #[test]
    fn test_refused_workers_fall_back_to_started_ones() {
        let in_flight = AtomicUsize::new(0);
        let max_seen = AtomicUsize::new(0);
        let executor = bounded(4);
        let result: BatchResult<usize, TestError> = executor.run_gated(
            (0..10).collect(),
            |j| {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(2));
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(j * 2)
            },
            |i| i < 2,
        );
        assert_eq!(result, (0..10).map(|j| Ok(j * 2)).collect::<Vec<_>>());
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_no_workers_settles_on_calling_thread() {
        let caller = thread::current().id();
        let result: BatchResult<bool, TestError> = BatchExecutor::new(Concurrency::Unbounded).run_gated(
            (0..5).collect::<Vec<usize>>(),
            |j| {
                if j == 3 {
                    panic!("still isolated");
                }
                Ok(thread::current().id() == caller)
            },
            |_| false,
        );
        assert_eq!(result.len(), 5);
        assert_eq!(result[0], Ok(true));
        assert_eq!(result[3], Err(TestError::Panicked("still isolated".to_string())));
        assert_eq!(result[4], Ok(true));
    }

    #[test]
    fn test_unbounded_thread_count_is_capped() {
        let threads = Mutex::new(HashSet::new());
        let result: BatchResult<(), TestError> =
            BatchExecutor::new(Concurrency::Unbounded).run((0..500).collect::<Vec<usize>>(), |_| {
                threads.lock().unwrap().insert(thread::current().id());
                thread::sleep(Duration::from_millis(1));
                Ok(())
            });
        assert_eq!(result.len(), 500);
        assert!(result.iter().all(|r| r.is_ok()));
        let used = threads.lock().unwrap().len();
        assert!(used >= 1 && used <= MAX_WORKER_THREADS);
    }

    #[test]
    fn test_concurrency_helpers() {
        assert_eq!(Concurrency::bounded(0), None);
        assert_eq!(Concurrency::bounded(4).unwrap().slots_for(10), 4);
        assert_eq!(Concurrency::bounded(4).unwrap().slots_for(2), 2);
        assert_eq!(Concurrency::Unbounded.slots_for(9), 9);
        assert_eq!(Concurrency::Unbounded.slots_for(10_000), MAX_WORKER_THREADS);
        assert_eq!(Concurrency::default(), Concurrency::Unbounded);
    }
}
