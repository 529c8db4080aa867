//! Task Registry - creates, stores and settles evaluation tasks
//!
//! Features:
//! - Synchronous evaluation raced against a wall-clock timeout
//! - Background tasks with compare-and-set terminal transitions
//! - Lookup, filtered listing (insertion order) and cancellation
//!
//! The registry lock is a `parking_lot` mutex and is never held across an
//! await point; every terminal write happens under it through
//! [`Task::finish`].

use crate::executor::Executor;
use crate::state::{StatusFilter, TaskStatus};
use crate::task::{Task, TaskError, TaskId, TaskOutcome, TaskSnapshot, TaskSource};
use futures::FutureExt;
use mcbot_core::session::SessionManager;
use mcbot_foundation::{Error, LimitsConfig, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of [`TaskRegistry::submit`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Synchronous run finished with this serialized result
    Finished(String),
    /// Background task created
    Started(TaskId),
}

/// Per-status task totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub running: usize,
    pub completed: usize,
    pub error: usize,
    pub cancelled: usize,
}

impl TaskCounts {
    pub fn total(&self) -> usize {
        self.running + self.completed + self.error + self.cancelled
    }
}

#[derive(Default)]
struct TaskTable {
    by_id: HashMap<String, Task>,
    /// Insertion order
    order: Vec<TaskId>,
}

struct Inner {
    tasks: Mutex<TaskTable>,
    counter: AtomicU64,
    session: SessionManager,
    executor: Arc<dyn Executor>,
    eval_timeout: Duration,
}

/// Task Registry - handles task lifecycle and execution
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<Inner>,
}

impl TaskRegistry {
    pub fn new(session: SessionManager, executor: Arc<dyn Executor>, eval_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                tasks: Mutex::new(TaskTable::default()),
                counter: AtomicU64::new(0),
                session,
                executor,
                eval_timeout,
            }),
        }
    }

    pub fn from_limits(
        session: SessionManager,
        executor: Arc<dyn Executor>,
        limits: &LimitsConfig,
    ) -> Self {
        Self::new(session, executor, limits.eval_timeout())
    }

    pub fn eval_timeout(&self) -> Duration {
        self.inner.eval_timeout
    }

    /// Run `code` now, or start it as a background task
    ///
    /// Fails with `NotConnected` (and creates nothing) unless the session is
    /// ready. A synchronous run that outlives the eval timeout fails with
    /// `ExecutionTimeout`; the run itself is left to finish detached.
    pub async fn submit(&self, code: String, source: TaskSource, background: bool) -> Result<Submission> {
        let session = self.inner.session.require_ready()?;
        let executor = Arc::clone(&self.inner.executor);

        if !background {
            let timeout = self.inner.eval_timeout;
            let run = tokio::spawn(async move {
                executor
                    .execute(&code, &session, CancellationToken::new())
                    .await
            });

            return match tokio::time::timeout(timeout, run).await {
                Ok(Ok(result)) => result.map(Submission::Finished),
                Ok(Err(join_error)) => Err(Error::Internal(format!(
                    "Evaluation aborted: {}",
                    join_error
                ))),
                Err(_) => {
                    warn!(timeout_secs = timeout.as_secs(), "Synchronous eval timed out, leaving it detached");
                    Err(Error::ExecutionTimeout(timeout))
                }
            };
        }

        let id = TaskId::new(self.inner.counter.fetch_add(1, Ordering::SeqCst) + 1);
        let cancel = CancellationToken::new();
        {
            let mut table = self.inner.tasks.lock();
            table
                .by_id
                .insert(id.0.clone(), Task::new(id.clone(), source, cancel.clone()));
            table.order.push(id.clone());
        }
        info!(task = %id, "Background task started");

        let registry = self.clone();
        let task_id = id.clone();
        tokio::spawn(async move {
            let run = AssertUnwindSafe(executor.execute(&code, &session, cancel))
                .catch_unwind()
                .await;
            let outcome = match run {
                Ok(Ok(result)) => TaskOutcome::Completed(result),
                Ok(Err(Error::Cancelled)) => TaskOutcome::Cancelled,
                Ok(Err(err)) => TaskOutcome::Failed(TaskError::from(&err)),
                Err(panic) => TaskOutcome::Failed(TaskError {
                    message: format!("Task panicked: {}", panic_message(panic.as_ref())),
                    trace: String::new(),
                }),
            };
            registry.settle(&task_id, outcome);
        });

        Ok(Submission::Started(id))
    }

    /// Record a natural settlement; ignored when the task already settled
    fn settle(&self, id: &TaskId, outcome: TaskOutcome) {
        let mut table = self.inner.tasks.lock();
        let Some(task) = table.by_id.get_mut(id.as_str()) else {
            return;
        };
        if task.finish(outcome) {
            info!(task = %id, status = %task.status(), "Background task settled");
        } else {
            debug!(task = %id, status = %task.status(), "Task already settled, outcome dropped");
        }
    }

    pub fn get(&self, id: &str) -> Result<TaskSnapshot> {
        let table = self.inner.tasks.lock();
        table
            .by_id
            .get(id)
            .map(Task::snapshot)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    /// Tasks matching `filter`, in submission order
    pub fn list(&self, filter: StatusFilter) -> Vec<TaskSnapshot> {
        let table = self.inner.tasks.lock();
        table
            .order
            .iter()
            .filter_map(|id| table.by_id.get(id.as_str()))
            .filter(|task| filter.matches(task.status()))
            .map(Task::snapshot)
            .collect()
    }

    /// Cancel a running task and stop whatever the bot is doing
    pub async fn cancel(&self, id: &str) -> Result<TaskSnapshot> {
        let snapshot = {
            let mut table = self.inner.tasks.lock();
            let task = table
                .by_id
                .get_mut(id)
                .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
            if !task.finish(TaskOutcome::Cancelled) {
                return Err(Error::TaskNotCancellable {
                    id: id.to_string(),
                    status: task.status().as_str().to_string(),
                });
            }
            task.snapshot()
        };

        info!(task = %id, "Task cancelled");
        self.inner.session.stop_activity().await;
        Ok(snapshot)
    }

    pub fn counts(&self) -> TaskCounts {
        let table = self.inner.tasks.lock();
        let mut counts = TaskCounts::default();
        for task in table.by_id.values() {
            match task.status() {
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Error => counts.error += 1,
                TaskStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mcbot_core::session::sim::{SimOptions, SimulatedConnector};
    use mcbot_core::session::{ReadySession, SessionLimits};

    /// Executor that panics on demand
    struct Panicky;

    #[async_trait]
    impl Executor for Panicky {
        async fn execute(
            &self,
            code: &str,
            _session: &ReadySession,
            _cancel: CancellationToken,
        ) -> Result<String> {
            if code == "panic" {
                panic!("interpreter bug");
            }
            Ok(code.to_string())
        }

        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    fn session() -> SessionManager {
        let connector = Arc::new(SimulatedConnector::new(SimOptions::default()));
        SessionManager::spawn(
            connector,
            SessionLimits {
                connect_timeout: Duration::from_secs(5),
                world_wait: Duration::from_millis(50),
            },
        )
    }

    #[tokio::test]
    async fn test_not_connected_creates_nothing() {
        let registry = TaskRegistry::new(session(), Arc::new(Panicky), Duration::from_secs(1));
        let err = registry
            .submit("x".into(), TaskSource::inline("x"), true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert!(registry.list(StatusFilter::All).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let registry = TaskRegistry::new(session(), Arc::new(Panicky), Duration::from_secs(1));
        assert!(matches!(registry.get("task_9_1"), Err(Error::TaskNotFound(_))));
        assert!(matches!(
            registry.cancel("task_9_1").await,
            Err(Error::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
