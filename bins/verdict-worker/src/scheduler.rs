/// Task Scheduler - Bounded Parallel Execution
///
/// **Responsibility:**
/// Run many independent test executions with at most `parallelism` in
/// flight, handing each outcome to a result or error callback.
///
/// **Guarantees:**
/// - Every task runs exactly once
/// - A failed task never aborts the batch; the next queued task is pulled
///   in its place
/// - Callbacks are invoked one at a time from the driving task, so callers
///   can mutate plain local state (counters, report assemblers) in them
/// - `run` returns only after all tasks have finished
///
/// Completion order is unspecified.
use crate::config::default_parallelism;
use futures_util::stream::{self, StreamExt};
use std::future::Future;
use tracing::debug;

/// Completion counts for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub succeeded: usize,
    pub failed: usize,
}

impl TaskStats {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TaskScheduler {
    parallelism: usize,
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(default_parallelism())
    }
}

impl TaskScheduler {
    /// A bound of 0 is treated as 1
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: parallelism.max(1),
        }
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Drive `tasks` through `runner` until the queue is empty
    pub async fn run<I, F, Fut, T, E, R, C>(
        &self,
        tasks: I,
        runner: F,
        mut on_result: R,
        mut on_error: C,
    ) -> TaskStats
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: FnMut(T),
        C: FnMut(E),
    {
        debug!(parallelism = self.parallelism, "Dispatching tasks");

        let mut stats = TaskStats::default();
        let mut in_flight = stream::iter(tasks).map(runner).buffer_unordered(self.parallelism);

        while let Some(outcome) = in_flight.next().await {
            match outcome {
                Ok(result) => {
                    stats.succeeded += 1;
                    on_result(result);
                }
                Err(err) => {
                    stats.failed += 1;
                    on_error(err);
                }
            }
        }

        debug!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            "All tasks finished"
        );
        stats
    }
}
