//! Bounded-concurrency fan-out for step bodies.
//!
//! Tasks start in input order, at most `max_concurrent` at a time, and the
//! next pending task starts as soon as any running one settles. Failures
//! are isolated per task: one task timing out or failing never aborts the
//! rest of the batch.

use std::future::Future;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use thiserror::Error;
use tracing::warn;

/// Limits for a fan-out batch
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyOptions {
    /// Maximum tasks in flight (0 is treated as 1)
    pub max_concurrent: usize,

    /// Per-task timeout
    pub timeout: Option<Duration>,
}

impl ConcurrencyOptions {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Failure of a single task in a batch
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task {index} timed out after {timeout:?}")]
    Timeout { index: usize, timeout: Duration },

    #[error("Task {index} failed: {error:#}")]
    Failed { index: usize, error: anyhow::Error },
}

impl TaskError {
    /// Input position of the task that failed
    pub fn index(&self) -> usize {
        match self {
            Self::Timeout { index, .. } | Self::Failed { index, .. } => *index,
        }
    }
}

async fn run_task<T, F, Fut>(
    index: usize,
    task: F,
    timeout: Option<Duration>,
) -> (usize, Result<T, TaskError>)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let outcome = match timeout {
        // Dropping the timed-out future abandons the attempt
        Some(limit) => match tokio::time::timeout(limit, task()).await {
            Ok(result) => result.map_err(|error| TaskError::Failed { index, error }),
            Err(_) => Err(TaskError::Timeout {
                index,
                timeout: limit,
            }),
        },
        None => task()
            .await
            .map_err(|error| TaskError::Failed { index, error }),
    };

    if let Err(ref e) = outcome {
        warn!(task = index, error = %e, "Concurrent task failed");
    }

    (index, outcome)
}

/// Run `tasks` with bounded concurrency.
///
/// `results[i]` is the outcome of `tasks[i]` regardless of completion order.
pub async fn run_concurrent_tasks<T, F, Fut>(
    tasks: Vec<F>,
    options: ConcurrencyOptions,
) -> Vec<Result<T, TaskError>>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let max_concurrent = options.max_concurrent.max(1);
    let total = tasks.len();

    let mut slots: Vec<Option<Result<T, TaskError>>> = (0..total).map(|_| None).collect();
    let mut in_flight = FuturesUnordered::new();

    for (index, task) in tasks.into_iter().enumerate() {
        if in_flight.len() >= max_concurrent {
            if let Some((done, outcome)) = in_flight.next().await {
                slots[done] = Some(outcome);
            }
        }
        in_flight.push(run_task(index, task, options.timeout));
    }

    while let Some((done, outcome)) = in_flight.next().await {
        slots[done] = Some(outcome);
    }

    // Every slot is filled once the stream drains
    slots.into_iter().flatten().collect()
}

/// All-or-nothing variant of [`run_concurrent_tasks`].
///
/// Every task still runs to completion; the first failure in input order is
/// returned.
pub async fn try_run_concurrent_tasks<T, F, Fut>(
    tasks: Vec<F>,
    options: ConcurrencyOptions,
) -> Result<Vec<T>, TaskError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    run_concurrent_tasks(tasks, options)
        .await
        .into_iter()
        .collect()
}
