//! Bounded-concurrency execution of independent async tasks.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;

/// Number of tasks allowed in flight when the caller does not say otherwise.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// A task that produced no value because it panicked or was cancelled.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("task {index} did not complete: {reason}")]
pub struct TaskAborted {
    pub index: usize,
    pub reason: String,
}

/// Runs a list of tasks with at most `concurrency` of them in flight.
///
/// A pool of `min(concurrency, tasks.len())` workers repeatedly claims the
/// next unclaimed index, so tasks start in input order. Every task runs to
/// completion: a failing or panicking task never stops its siblings, and
/// there is no cancellation. The output has one slot per
/// input task, at the task's original index, regardless of completion order.
#[derive(Clone, Debug)]
pub struct ConcurrencyLimiter {
    concurrency: usize,
}

impl ConcurrencyLimiter {
    /// Values below 1 are clamped to 1.
    pub fn new(concurrency: usize) -> Self {
        if concurrency == 0 {
            tracing::warn!("Concurrency of 0 requested, clamping to 1");
        }
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run<T, F, Fut>(&self, tasks: Vec<F>) -> Vec<Result<T, TaskAborted>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }

        let workers = self.concurrency.min(total);
        let queue: Arc<Vec<Mutex<Option<F>>>> =
            Arc::new(tasks.into_iter().map(|task| Mutex::new(Some(task))).collect());
        let cursor = Arc::new(AtomicUsize::new(0));
        let mut join_set = JoinSet::new();

        for _ in 0..workers {
            let queue = queue.clone();
            let cursor = cursor.clone();
            join_set.spawn(async move {
                let mut finished = Vec::new();
                loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(slot) = queue.get(index) else {
                        break;
                    };
                    let Some(task) = slot.lock().ok().and_then(|mut task| task.take()) else {
                        continue;
                    };

                    // Each task gets its own tokio task so a panic is confined
                    // to its slot and the worker moves on to the next index.
                    let result = tokio::spawn(task()).await.map_err(|e| {
                        tracing::error!(index, error = %e, "Task did not complete");
                        TaskAborted {
                            index,
                            reason: e.to_string(),
                        }
                    });
                    finished.push((index, result));
                }
                finished
            });
        }

        let mut slots: Vec<Option<Result<T, TaskAborted>>> =
            std::iter::repeat_with(|| None).take(total).collect();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(finished) => {
                    for (index, result) in finished {
                        slots[index] = Some(result);
                    }
                }
                Err(e) => tracing::error!(error = %e, "Limiter worker failed"),
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    Err(TaskAborted {
                        index,
                        reason: "no result recorded".to_string(),
                    })
                })
            })
            .collect()
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}
