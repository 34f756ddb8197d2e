//! Bounded fan-out over sibling tasks
//!
//! The composer resolves the content elements of one form as a batch of
//! independent tasks. [`Scheduler::run`] executes such a batch on a `rayon`
//! thread pool sized to the concurrency limit:
//!
//! - at most `limit` tasks run at once (a limit of 1 runs them strictly in
//!   order on one thread);
//! - results come back in input order whatever the completion order;
//! - the first failure is returned as soon as it is reported. Tasks that have
//!   not started yet are skipped, tasks already running finish in the
//!   background and their results are dropped.
//!
//! One scheduler serves a whole resolution pass. Nested batches (the content
//! of a fetched sub-form) run on the same pool, so the limit bounds the pass
//! as a whole, not only each level. A task waiting on a nested batch keeps
//! executing queued pool work instead of blocking its worker thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, TryRecvError};
use log::{debug, error};
use rayon::{ThreadPool, ThreadPoolBuilder, Yield};

use crate::error::{Error, Result};

/// How long a waiting worker sleeps when the pool has nothing queued.
const IDLE_WAIT: Duration = Duration::from_millis(2);

/// Worker pool for one resolution pass.
pub struct Scheduler {
    pool: ThreadPool,
    limit: usize,
}

impl Scheduler {
    /// Create a scheduler running at most `limit` tasks at once. A limit of
    /// zero is treated as one.
    pub fn new(limit: usize) -> Result<Self> {
        let limit = limit.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(limit)
            .thread_name(|index| format!("form-resolver-{}", index))
            .panic_handler(|_| error!("A resolution task panicked"))
            .build()
            .map_err(|e| Error::Scheduler {
                message: e.to_string(),
            })?;
        debug!("Started scheduler with {} worker(s)", limit);
        Ok(Self { pool, limit })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `tasks`, returning their results in input order or the first
    /// error reported.
    pub fn run<T, F>(&self, tasks: Vec<F>) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let total = tasks.len();
        let stopped = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = unbounded();
        for (index, task) in tasks.into_iter().enumerate() {
            let sender = sender.clone();
            let stopped = Arc::clone(&stopped);
            self.pool.spawn_fifo(move || {
                if stopped.load(Ordering::SeqCst) {
                    return;
                }
                let result = task();
                if result.is_err() {
                    stopped.store(true, Ordering::SeqCst);
                }
                // The receiver is gone once the batch has already failed.
                let _ = sender.send((index, result));
            });
        }
        drop(sender);

        let mut results: Vec<Option<T>> = (0..total).map(|_| None).collect();
        let mut received = 0;
        while received < total {
            let Some((index, result)) = self.receive(&receiver) else {
                break;
            };
            match result {
                Ok(value) => {
                    results[index] = Some(value);
                    received += 1;
                }
                Err(e) => {
                    debug!("Task {} of {} failed, abandoning the batch", index, total);
                    return Err(e);
                }
            }
        }

        results
            .into_iter()
            .collect::<Option<Vec<T>>>()
            .ok_or_else(|| Error::Scheduler {
                message: format!("{} task(s) ended without a result", total - received),
            })
    }

    /// Next finished task, or `None` once every task has dropped its sender.
    fn receive<M>(&self, receiver: &Receiver<M>) -> Option<M> {
        if self.pool.current_thread_index().is_none() {
            return receiver.recv().ok();
        }
        loop {
            match receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => {}
            }
            if let Some(Yield::Executed) = rayon::yield_now() {
                continue;
            }
            match receiver.recv_timeout(IDLE_WAIT) {
                Ok(message) => return Some(message),
                Err(RecvTimeoutError::Disconnected) => return None,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
    }
}
