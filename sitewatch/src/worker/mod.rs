//! Bounded worker pool.
//!
//! A fixed set of tokio tasks drains a shared job queue and publishes exactly
//! one result per claimed job on a result channel. The pool knows nothing about
//! what a job does; callers interpret the results.
//!
//! ```no_run
//! # async fn demo() -> sitewatch::common::WatchResult<()> {
//! use sitewatch::worker::{Job, WorkerPool};
//! use tokio_util::sync::CancellationToken;
//!
//! let mut pool = WorkerPool::new(4)?;
//! pool.submit((0..10).map(|i| Job::new(format!("job-{i}"), move || async move { Ok(i * 2) })))?;
//! pool.close();
//!
//! let mut results = pool.run(CancellationToken::new());
//! while let Some(result) = results.recv().await {
//!     println!("{:?}", result?);
//! }
//! # Ok(())
//! # }
//! ```

use crate::common::error::{WatchError, WatchResult};
use futures::future::BoxFuture;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Default number of workers.
pub const DEFAULT_WORKER_COUNT: usize = 20;

/// Outcome of a single job.
pub type JobResult<T> = WatchResult<T>;

type JobFn<T> = Box<dyn FnOnce() -> BoxFuture<'static, JobResult<T>> + Send>;

/// A unit of work owned by the queue until a worker claims it.
pub struct Job<T> {
    label: String,
    run: JobFn<T>,
}

impl<T: Send + 'static> Job<T> {
    /// Wrap an async closure as a job. `label` only shows up in logs.
    pub fn new<F, Fut>(label: impl Into<String>, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = JobResult<T>> + Send + 'static,
    {
        Self {
            label: label.into(),
            run: Box::new(move || Box::pin(f())),
        }
    }

    /// Label given at construction.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs the job. Cancellation interrupts it and surfaces as the job's error.
    async fn execute(self, cancel: &CancellationToken) -> JobResult<T> {
        let fut = (self.run)();
        tokio::select! {
            biased;
            result = fut => result,
            _ = cancel.cancelled() => Err(WatchError::Cancelled),
        }
    }
}

impl<T> std::fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job").field("label", &self.label).finish()
    }
}

/// Fixed-size worker pool.
///
/// Usage is `submit` (any number of times), `close`, then `run`. `run` consumes
/// the pool, so nothing can be submitted once workers are draining the queue.
pub struct WorkerPool<T> {
    worker_count: usize,
    queue_tx: Option<mpsc::Sender<Job<T>>>,
    queue_rx: mpsc::Receiver<Job<T>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Create a pool with `worker_count` workers. Zero is rejected.
    pub fn new(worker_count: usize) -> WatchResult<Self> {
        if worker_count == 0 {
            return Err(WatchError::InvalidInput(
                "worker count must be at least 1".to_string(),
            ));
        }
        let (queue_tx, queue_rx) = mpsc::channel(worker_count);
        Ok(Self {
            worker_count,
            queue_tx: Some(queue_tx),
            queue_rx,
        })
    }

    /// Number of workers `run` will spawn.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Returns true once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.queue_tx.is_none()
    }

    /// Queue a sequence of jobs.
    ///
    /// The queue is bounded, so the jobs are fed from a background task and this
    /// call never blocks. Must be called inside a tokio runtime.
    pub fn submit<I>(&self, jobs: I) -> WatchResult<()>
    where
        I: IntoIterator<Item = Job<T>>,
        I::IntoIter: Send + 'static,
    {
        let tx = self.queue_tx.as_ref().ok_or(WatchError::PoolClosed)?.clone();
        let jobs = jobs.into_iter();
        tokio::spawn(async move {
            for job in jobs {
                if let Err(rejected) = tx.send(job).await {
                    debug!(
                        job = %rejected.0.label(),
                        "Job queue dropped, discarding remaining jobs"
                    );
                    break;
                }
            }
        });
        Ok(())
    }

    /// Close the job source. Workers exit once the queue is drained.
    pub fn close(&mut self) {
        self.queue_tx.take();
    }

    /// Spawn the workers and return the result stream.
    ///
    /// The stream ends only after every worker has exited. Cancelling `cancel`
    /// stops workers from claiming new jobs; jobs already claimed still emit a
    /// result (`Err(Cancelled)` if they were interrupted).
    pub fn run(self, cancel: CancellationToken) -> ResultStream<T> {
        let Self {
            worker_count,
            queue_tx,
            queue_rx,
        } = self;
        // Dropping our sender makes `run` imply `close`.
        drop(queue_tx);

        let queue = Arc::new(Mutex::new(queue_rx));
        let (results_tx, results_rx) = mpsc::channel(worker_count);

        let mut workers = JoinSet::new();
        for id in 0..worker_count {
            workers.spawn(worker_loop(
                id,
                Arc::clone(&queue),
                results_tx.clone(),
                cancel.clone(),
            ));
        }

        // Join barrier: the last result sender is released only after all workers exit.
        tokio::spawn(async move {
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    error!(error = %e, "Worker task terminated abnormally");
                }
            }
            drop(results_tx);
            trace!(workers = worker_count, "All workers exited");
        });

        ResultStream { rx: results_rx }
    }
}

async fn claim<T>(queue: &Mutex<mpsc::Receiver<Job<T>>>) -> Option<Job<T>> {
    queue.lock().await.recv().await
}

async fn worker_loop<T: Send + 'static>(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<Job<T>>>>,
    results: mpsc::Sender<JobResult<T>>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                trace!(worker = id, "Cancelled, no longer claiming jobs");
                break;
            }
            job = claim(&queue) => job,
        };

        let Some(job) = next else {
            trace!(worker = id, "Job queue closed");
            break;
        };

        trace!(worker = id, job = %job.label(), "Claimed job");
        let result = job.execute(&cancel).await;

        if results.send(result).await.is_err() {
            debug!(worker = id, "Result stream dropped, worker exiting");
            break;
        }
    }
}

/// Unordered stream of job results.
#[derive(Debug)]
pub struct ResultStream<T> {
    rx: mpsc::Receiver<JobResult<T>>,
}

impl<T> ResultStream<T> {
    /// Next result, or `None` once every worker has exited.
    pub async fn recv(&mut self) -> Option<JobResult<T>> {
        self.rx.recv().await
    }

    /// Drain the stream to completion.
    pub async fn collect_all(mut self) -> Vec<JobResult<T>> {
        let mut all = Vec::new();
        while let Some(result) = self.rx.recv().await {
            all.push(result);
        }
        all
    }
}

impl<T> Stream for ResultStream<T> {
    type Item = JobResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
