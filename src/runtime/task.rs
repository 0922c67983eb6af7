// src/runtime/task.rs
//! Cancellable background analysis tasks
//!
//! Analysis only reads immutable artifacts, so a cancelled or abandoned task
//! never leaves shared state behind. Cancellation is cooperative: the closure
//! receives the task's [`CancellationToken`] and checks it between units of
//! work.

use crate::utils::errors::{EngineError, Result};
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a task ended
#[derive(Debug)]
pub enum TaskOutcome<T> {
    Completed(T),

    Cancelled,

    /// The closure returned an error or panicked
    Failed(String),
}

impl<T> TaskOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskOutcome::Completed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskOutcome::Cancelled)
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            TaskOutcome::Completed(value) => Ok(value),
            TaskOutcome::Cancelled => Err(EngineError::Cancelled),
            TaskOutcome::Failed(reason) => Err(EngineError::TaskFailed(reason)),
        }
    }
}

/// Handle to a blocking analysis running on the tokio blocking pool
pub struct AnalysisTask<T> {
    name: String,
    token: CancellationToken,
    started_at: Instant,
    handle: JoinHandle<anyhow::Result<T>>,
}

impl<T: Send + 'static> AnalysisTask<T> {
    /// Spawn `work` on the blocking pool
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(name: impl Into<String>, work: F) -> Self
    where
        F: FnOnce(CancellationToken) -> anyhow::Result<T> + Send + 'static,
    {
        let name = name.into();
        let token = CancellationToken::new();

        let task_token = token.clone();
        let task_name = name.clone();
        let handle = tokio::task::spawn_blocking(move || {
            debug!("Analysis task '{}' started", task_name);
            work(task_token)
        });

        Self {
            name,
            token,
            started_at: Instant::now(),
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request cooperative cancellation
    pub fn cancel(&self) {
        info!("Cancelling analysis task '{}'", self.name);
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Token shared with the running closure
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for the task to end
    pub async fn join(self) -> TaskOutcome<T> {
        let outcome = match self.handle.await {
            Ok(Ok(value)) => TaskOutcome::Completed(value),
            Ok(Err(err)) => {
                let cancelled = self.token.is_cancelled()
                    || matches!(err.downcast_ref::<EngineError>(), Some(EngineError::Cancelled));
                if cancelled {
                    TaskOutcome::Cancelled
                } else {
                    TaskOutcome::Failed(format!("{:#}", err))
                }
            }
            Err(err) if err.is_cancelled() => TaskOutcome::Cancelled,
            Err(err) => TaskOutcome::Failed(format!("task panicked: {}", err)),
        };

        match &outcome {
            TaskOutcome::Completed(_) => debug!(
                "Analysis task '{}' completed in {:?}",
                self.name,
                self.started_at.elapsed()
            ),
            TaskOutcome::Cancelled => info!("Analysis task '{}' cancelled", self.name),
            TaskOutcome::Failed(reason) => warn!("Analysis task '{}' failed: {}", self.name, reason),
        }
        outcome
    }
}
