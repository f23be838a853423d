//! Task executors for per-file work.
//!
//! A phase submits all of its tasks at once and gets every result back; no
//! task is cancelled because a sibling failed.
use log::{debug, error};

use crate::error::{PrepError, PrepResult};

pub type Task<'a> = Box<dyn FnOnce() -> PrepResult<()> + Send + 'a>;

pub trait TaskExecutor: Send + Sync {
    /// Run every task to completion. Results are in submission order.
    fn run_all<'a>(&self, tasks: Vec<Task<'a>>) -> Vec<PrepResult<()>>;
}

/// Runs each task inline, in order, on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynchronousExecutor;

impl TaskExecutor for SynchronousExecutor {
    fn run_all<'a>(&self, tasks: Vec<Task<'a>>) -> Vec<PrepResult<()>> {
        tasks.into_iter().map(|task| task()).collect()
    }
}

#[cfg(feature = "pool")]
pub use pool::ThreadPoolExecutor;

#[cfg(feature = "pool")]
mod pool {
    use rayon::prelude::*;
    use rayon::{ThreadPool, ThreadPoolBuilder};

    use super::{Task, TaskExecutor};
    use crate::error::{PrepError, PrepResult};

    /// Fixed-size worker pool.
    pub struct ThreadPoolExecutor {
        pool: ThreadPool,
    }

    impl ThreadPoolExecutor {
        pub fn new(workers: usize) -> PrepResult<Self> {
            let pool = ThreadPoolBuilder::new()
                .num_threads(workers.max(1))
                .thread_name(|idx| format!("sqlprep-worker-{idx}"))
                .build()
                .map_err(|err| PrepError::config(format!("cannot start worker pool: {err}")))?;
            Ok(Self { pool })
        }

        pub fn workers(&self) -> usize {
            self.pool.current_num_threads()
        }
    }

    impl TaskExecutor for ThreadPoolExecutor {
        fn run_all<'a>(&self, tasks: Vec<Task<'a>>) -> Vec<PrepResult<()>> {
            self.pool
                .install(|| tasks.into_par_iter().map(|task| task()).collect())
        }
    }
}

/// Pool of `workers` threads, or the inline executor for `0` (and for
/// builds without the `pool` feature).
pub fn executor_for(workers: usize) -> PrepResult<Box<dyn TaskExecutor>> {
    if workers > 0 && cfg!(feature = "pool") {
        debug!("executor event=pool workers={}", workers);
        return pooled(workers);
    }
    debug!("executor event=inline requested={}", workers);
    Ok(Box::new(SynchronousExecutor))
}

#[cfg(feature = "pool")]
fn pooled(workers: usize) -> PrepResult<Box<dyn TaskExecutor>> {
    Ok(Box::new(ThreadPoolExecutor::new(workers)?))
}

#[cfg(not(feature = "pool"))]
fn pooled(_workers: usize) -> PrepResult<Box<dyn TaskExecutor>> {
    Ok(Box::new(SynchronousExecutor))
}

/// Log every failure, then return the earliest one in submission order.
pub fn first_failure(phase: &str, results: Vec<PrepResult<()>>) -> PrepResult<()> {
    let mut first: Option<PrepError> = None;
    let mut failed = 0;
    for result in results {
        if let Err(err) = result {
            failed += 1;
            error!("{phase} event=task-failed error={}", err);
            if first.is_none() {
                first = Some(err);
            }
        }
    }
    match first {
        Some(err) => {
            error!("{phase} event=failed tasks={}", failed);
            Err(err)
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tasks(counter: &AtomicUsize) -> Vec<Task<'_>> {
        (0..8)
            .map(|idx| {
                let task: Task<'_> = Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if idx % 3 == 1 {
                        Err(PrepError::config(format!("task {idx}")))
                    } else {
                        Ok(())
                    }
                });
                task
            })
            .collect()
    }

    #[test]
    fn inline_runs_everything_and_reports_first_failure() {
        let counter = AtomicUsize::new(0);
        let results = SynchronousExecutor.run_all(tasks(&counter));
        assert_eq!(counter.load(Ordering::SeqCst), 8);
        let err = first_failure("test", results).unwrap_err();
        assert_eq!(err.to_string(), "task 1");
    }

    #[cfg(feature = "pool")]
    #[test]
    fn pool_runs_everything_and_keeps_order() {
        let counter = AtomicUsize::new(0);
        let executor = ThreadPoolExecutor::new(3).unwrap();
        assert_eq!(executor.workers(), 3);
        let results = executor.run_all(tasks(&counter));
        assert_eq!(counter.load(Ordering::SeqCst), 8);
        assert_eq!(results.len(), 8);
        assert!(results[1].is_err() && results[4].is_err() && results[7].is_err());
        let err = first_failure("test", results).unwrap_err();
        assert_eq!(err.to_string(), "task 1");
    }

    #[test]
    fn zero_workers_is_inline() {
        let executor = executor_for(0).unwrap();
        assert!(executor.run_all(Vec::new()).is_empty());
    }
}
