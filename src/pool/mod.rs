//! Bounded worker pool.
//!
//! Fans a stream of work items out to a fixed number of workers, each of which
//! performs one remote call per item, and fans the outcomes back in on a single
//! output stream.
//!
//! - At most `parallelism` calls are in flight at any time.
//! - The input queue holds at most `parallelism` pending items, so a fast
//!   producer (e.g. a file reader) is slowed down to the pace of the workers.
//! - The output stream ends only after every worker has been joined, so
//!   observing its end means every outcome has been delivered.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use gapi::pool::WorkerPool;
//! # async fn run() -> Result<(), gapi::pool::PoolError> {
//! let pool = WorkerPool::new(5)?;
//! let doubled = pool
//!     .collect(0..100u64, |i| async move { Ok::<_, std::io::Error>(i * 2) })
//!     .await?;
//! assert_eq!(doubled.len(), 100);
//! # Ok(())
//! # }
//! ```

use futures::{stream, Stream, StreamExt};
use std::fmt::Debug;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;


/// Errors reported by the worker pool itself.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("parallelism must be at least 1")]
    InvalidParallelism,
    /// The pipeline was cancelled after a call failed.
    #[error("pipeline aborted after a failed call")]
    Aborted,
    /// A call failed under the abort-on-first-failure policy.
    #[error("call for {item} failed: {source}")]
    Call {
        item: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
}

impl PoolError {
    fn call_failed<T, E>(item: &T, error: E) -> Self
    where
        T: Debug,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        PoolError::Call {
            item: format!("{:?}", item),
            source: error.into(),
        }
    }
}

/// What the pool does when a call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Cancel the pipeline on the first failure. Idle workers stop taking
    /// items, in-flight calls are dropped and further submissions are refused.
    #[default]
    AbortOnFirst,
    /// Record the failure and keep processing the remaining items.
    Collect,
}

/// A successful call, paired with the item that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed<T, R> {
    pub item: T,
    pub output: R,
}

/// A failed call, paired with the item that produced it.
#[derive(Debug)]
pub struct Failed<T, E> {
    pub item: T,
    pub error: E,
}

pub type Outcome<T, R, E> = Result<Completed<T, R>, Failed<T, E>>;

/// Counts of outcomes observed by [`WorkerPool::run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolSummary {
    pub completed: usize,
    pub failed: usize,
}

/// Every outcome of a run under [`ErrorPolicy::Collect`].
#[derive(Debug)]
pub struct PoolReport<T, R, E> {
    pub completed: Vec<Completed<T, R>>,
    pub failed: Vec<Failed<T, E>>,
}

/// Fixed-size pool configuration. One pool is used per command invocation.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    parallelism: NonZeroUsize,
    policy: ErrorPolicy,
}

impl WorkerPool {
    pub fn new(parallelism: usize) -> Result<Self, PoolError> {
        let parallelism = NonZeroUsize::new(parallelism).ok_or(PoolError::InvalidParallelism)?;
        Ok(Self {
            parallelism,
            policy: ErrorPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism.get()
    }

    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Spawns the workers and returns the two ends of the pipeline.
    ///
    /// The [`Submitter`] feeds items in; dropping it (or calling
    /// [`Submitter::close`]) signals the end of input. The [`Results`] yield one
    /// outcome per processed item and end once all workers have exited.
    ///
    /// Producer and consumer must make progress concurrently when the
    /// consumer needs to observe outcomes before input ends. The output queue
    /// is unbounded, so submitting everything first and draining afterwards
    /// cannot deadlock either.
    pub fn start<T, R, E, F, Fut>(&self, call: F) -> (Submitter<T>, Results<T, R, E>)
    where
        T: Clone + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let workers_count = self.parallelism.get();
        let (input_tx, input_rx) = mpsc::channel::<T>(workers_count);
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let input_rx = Arc::new(Mutex::new(input_rx));
        let call = Arc::new(call);
        let cancel = CancellationToken::new();

        let mut workers = JoinSet::new();
        for worker_id in 0..workers_count {
            workers.spawn(worker_loop(
                worker_id,
                input_rx.clone(),
                output_tx.clone(),
                call.clone(),
                cancel.clone(),
                self.policy,
            ));
        }

        // The coordinator keeps the output queue open until every worker is
        // joined, then releases it.
        let coordinator = tokio::spawn(async move {
            let mut panicked = None;
            while let Some(joined) = workers.join_next().await {
                if let Err(err) = joined {
                    tracing::error!(error = %err, "pool worker did not finish cleanly");
                    panicked.get_or_insert_with(|| err.to_string());
                }
            }
            drop(output_tx);
            panicked
        });

        tracing::debug!(
            parallelism = workers_count,
            policy = ?self.policy,
            "worker pool started"
        );

        (
            Submitter {
                queue: input_tx,
                cancel: cancel.clone(),
            },
            Results {
                outcomes: output_rx,
                coordinator,
                cancel,
            },
        )
    }

    /// Feeds `items` into the pool while draining outcomes into `on_outcome`.
    ///
    /// Items are pulled from the stream only as fast as the workers accept
    /// them. Returns once every worker has exited.
    pub async fn run<T, R, E, S, F, Fut, O>(
        &self,
        items: S,
        call: F,
        mut on_outcome: O,
    ) -> Result<PoolSummary, PoolError>
    where
        T: Clone + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        S: Stream<Item = T>,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        O: FnMut(Outcome<T, R, E>),
    {
        let (submitter, mut results) = self.start(call);

        let produce = async move {
            futures::pin_mut!(items);
            while let Some(item) = items.next().await {
                if submitter.submit(item).await.is_err() {
                    break;
                }
            }
        };

        let consume = async {
            let mut summary = PoolSummary::default();
            while let Some(outcome) = results.next().await {
                match &outcome {
                    Ok(_) => summary.completed += 1,
                    Err(_) => summary.failed += 1,
                }
                on_outcome(outcome);
            }
            summary
        };

        let ((), summary) = tokio::join!(produce, consume);
        results.join().await?;
        Ok(summary)
    }

    /// Collecting variant: returns every successful outcome, or the first
    /// failure as [`PoolError::Call`].
    ///
    /// Under [`ErrorPolicy::Collect`] the remaining items are still processed
    /// before the first failure is returned. Use [`WorkerPool::collect_report`]
    /// to keep every per-item error.
    pub async fn collect<T, R, E, I, F, Fut>(
        &self,
        items: I,
        call: F,
    ) -> Result<Vec<Completed<T, R>>, PoolError>
    where
        T: Clone + Debug + Send + 'static,
        R: Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
        I: IntoIterator<Item = T>,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let mut completed = Vec::new();
        let mut first_failure = None;

        self.run(stream::iter(items), call, |outcome| match outcome {
            Ok(done) => completed.push(done),
            Err(failed) => {
                first_failure.get_or_insert(failed);
            }
        })
        .await?;

        match first_failure {
            Some(Failed { item, error }) => Err(PoolError::call_failed(&item, error)),
            None => Ok(completed),
        }
    }

    /// Runs every item under [`ErrorPolicy::Collect`] and returns successes and
    /// failures side by side.
    pub async fn collect_report<T, R, E, I, F, Fut>(
        &self,
        items: I,
        call: F,
    ) -> Result<PoolReport<T, R, E>, PoolError>
    where
        T: Clone + Send + 'static,
        R: Send + 'static,
        E: Send + 'static,
        I: IntoIterator<Item = T>,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let mut report = PoolReport {
            completed: Vec::new(),
            failed: Vec::new(),
        };

        self.with_policy(ErrorPolicy::Collect)
            .run(stream::iter(items), call, |outcome| match outcome {
                Ok(done) => report.completed.push(done),
                Err(failed) => report.failed.push(failed),
            })
            .await?;

        Ok(report)
    }

    /// Fire-and-forget variant: outputs are discarded, only counted.
    pub async fn for_each<T, E, S, F, Fut>(&self, items: S, call: F) -> Result<PoolSummary, PoolError>
    where
        T: Clone + Debug + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + Send + 'static,
        S: Stream<Item = T>,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        let mut first_failure = None;

        let summary = self
            .run(items, call, |outcome| {
                if let Err(failed) = outcome {
                    first_failure.get_or_insert(failed);
                }
            })
            .await?;

        match first_failure {
            Some(Failed { item, error }) if self.policy == ErrorPolicy::AbortOnFirst => {
                Err(PoolError::call_failed(&item, error))
            }
            _ => Ok(summary),
        }
    }
}

async fn worker_loop<T, R, E, F, Fut>(
    worker_id: usize,
    queue: Arc<Mutex<mpsc::Receiver<T>>>,
    outcomes: mpsc::UnboundedSender<Outcome<T, R, E>>,
    call: Arc<F>,
    cancel: CancellationToken,
    policy: ErrorPolicy,
) where
    T: Clone,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    loop {
        let next = {
            let mut queue = queue.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = queue.recv() => item,
            }
        };
        let Some(item) = next else { break };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = call(item.clone()) => result,
        };

        let outcome = match result {
            Ok(output) => Ok(Completed { item, output }),
            Err(error) => {
                if policy == ErrorPolicy::AbortOnFirst {
                    tracing::debug!(worker_id, "call failed, cancelling pipeline");
                    cancel.cancel();
                }
                Err(Failed { item, error })
            }
        };

        if outcomes.send(outcome).is_err() {
            // Nobody is listening any more.
            break;
        }
    }

    tracing::trace!(worker_id, "worker exited");
}

/// Input end of a running pipeline.
pub struct Submitter<T> {
    queue: mpsc::Sender<T>,
    cancel: CancellationToken,
}

impl<T> Submitter<T> {
    /// Queues one item, waiting while the input queue is full.
    ///
    /// Returns [`PoolError::Aborted`] once the pipeline has been cancelled or
    /// every worker has exited.
    pub async fn submit(&self, item: T) -> Result<(), PoolError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PoolError::Aborted),
            sent = self.queue.send(item) => sent.map_err(|_| PoolError::Aborted),
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Signals the end of input. Equivalent to dropping the submitter.
    pub fn close(self) {}
}

/// Output end of a running pipeline.
///
/// Dropping it cancels the pipeline: pending submissions fail with
/// [`PoolError::Aborted`] and workers stop after their current call.
pub struct Results<T, R, E> {
    outcomes: mpsc::UnboundedReceiver<Outcome<T, R, E>>,
    coordinator: JoinHandle<Option<String>>,
    cancel: CancellationToken,
}

impl<T, R, E> Results<T, R, E> {
    /// Next outcome, in completion order. `None` once all workers are done.
    pub async fn next(&mut self) -> Option<Outcome<T, R, E>> {
        self.outcomes.recv().await
    }

    /// Cancels the pipeline. Calls in flight are dropped, queued items are
    /// never started and the submitter refuses new items.
    pub fn abort(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!("worker pool aborted by consumer");
            self.cancel.cancel();
        }
    }

    /// Waits for the coordinator, discarding any outcome not yet consumed.
    pub async fn join(mut self) -> Result<(), PoolError> {
        while self.outcomes.recv().await.is_some() {}

        match (&mut self.coordinator).await {
            Ok(None) => Ok(()),
            Ok(Some(panic)) => Err(PoolError::WorkerPanicked(panic)),
            Err(err) => Err(PoolError::WorkerPanicked(err.to_string())),
        }
    }
}

impl<T, R, E> Drop for Results<T, R, E> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
