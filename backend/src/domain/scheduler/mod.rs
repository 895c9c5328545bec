//! Supervisor for named long-running background tasks.
//!
//! The scheduler owns a single [`CancellationToken`] per run. `start` spawns
//! every registered task on the Tokio runtime behind a panic boundary;
//! `stop` cancels the shared token and waits for the tasks to return within a
//! budget. Tasks are never aborted: one that ignores cancellation keeps
//! running and the scheduler stays in the running state so a later `stop`
//! can wait again.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::FutureExt as _;
use futures_util::future::join_all;
use mockable::Clock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::Error;

/// Default budget for [`TaskScheduler::stop`].
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Long-running job driven by the scheduler.
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    /// Stable name used for registration and logging.
    fn name(&self) -> &str;

    /// Run until `cancel` fires.
    async fn start(&self, cancel: CancellationToken);
}

/// Scheduler lifecycle and registration failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyStarted,
    #[error("scheduler is not running")]
    NotStarted,
    #[error("task {name} is already registered")]
    TaskAlreadyExists { name: String },
    #[error("task {name} is not registered")]
    TaskNotFound { name: String },
    #[error("tasks did not stop within {timeout:?}: {pending:?}")]
    ShutdownTimeout {
        timeout: Duration,
        pending: Vec<String>,
    },
}

impl From<SchedulerError> for Error {
    fn from(value: SchedulerError) -> Self {
        match value {
            SchedulerError::AlreadyStarted
            | SchedulerError::NotStarted
            | SchedulerError::TaskAlreadyExists { .. } => Error::conflict(value.to_string()),
            SchedulerError::TaskNotFound { .. } => Error::not_found(value.to_string()),
            SchedulerError::ShutdownTimeout { .. } => Error::service_unavailable(value.to_string()),
        }
    }
}

struct RunningTask {
    name: String,
    handle: JoinHandle<()>,
}

struct Running {
    cancel: CancellationToken,
    started_at: DateTime<Utc>,
    tasks: Vec<RunningTask>,
}

#[derive(Default)]
struct SchedulerState {
    registered: Vec<Arc<dyn ScheduledTask>>,
    running: Option<Running>,
}

/// Starts, supervises and stops registered tasks.
pub struct TaskScheduler {
    clock: Arc<dyn Clock>,
    state: Mutex<SchedulerState>,
}

impl TaskScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a task. Only allowed while stopped.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::AlreadyStarted`] while running and
    /// [`SchedulerError::TaskAlreadyExists`] for a duplicate name.
    pub fn register(&self, task: Arc<dyn ScheduledTask>) -> Result<(), SchedulerError> {
        let mut state = self.state();
        if state.running.is_some() {
            return Err(SchedulerError::AlreadyStarted);
        }
        if state.registered.iter().any(|t| t.name() == task.name()) {
            return Err(SchedulerError::TaskAlreadyExists {
                name: task.name().to_owned(),
            });
        }
        info!(task = task.name(), "task registered");
        state.registered.push(task);
        Ok(())
    }

    /// Remove a task by name. Only allowed while stopped.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::AlreadyStarted`] while running and
    /// [`SchedulerError::TaskNotFound`] for an unknown name.
    pub fn unregister(&self, name: &str) -> Result<(), SchedulerError> {
        let mut state = self.state();
        if state.running.is_some() {
            return Err(SchedulerError::AlreadyStarted);
        }
        let index = state
            .registered
            .iter()
            .position(|t| t.name() == name)
            .ok_or_else(|| SchedulerError::TaskNotFound {
                name: name.to_owned(),
            })?;
        state.registered.remove(index);
        info!(task = name, "task unregistered");
        Ok(())
    }

    /// Spawn every registered task.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::AlreadyStarted`] when already running.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut state = self.state();
        if state.running.is_some() {
            return Err(SchedulerError::AlreadyStarted);
        }
        let cancel = CancellationToken::new();
        let tasks = state
            .registered
            .iter()
            .map(|task| RunningTask {
                name: task.name().to_owned(),
                handle: tokio::spawn(supervise(Arc::clone(task), cancel.clone())),
            })
            .collect::<Vec<_>>();
        info!(tasks = tasks.len(), "scheduler started");
        state.running = Some(Running {
            cancel,
            started_at: self.clock.utc(),
            tasks,
        });
        Ok(())
    }

    /// Cancel all tasks and wait up to `timeout` for them to return.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::NotStarted`] when stopped and
    /// [`SchedulerError::ShutdownTimeout`] when tasks outlive the budget. The
    /// scheduler stays running after a timeout.
    pub async fn stop(&self, timeout: Duration) -> Result<(), SchedulerError> {
        let (cancel, mut tasks) = {
            let mut state = self.state();
            let running = state.running.as_mut().ok_or(SchedulerError::NotStarted)?;
            (running.cancel.clone(), std::mem::take(&mut running.tasks))
        };
        info!(tasks = tasks.len(), ?timeout, "scheduler stopping");
        cancel.cancel();

        let drained = tokio::time::timeout(
            timeout,
            join_all(tasks.iter_mut().map(|task| &mut task.handle)),
        )
        .await;

        let mut state = self.state();
        match drained {
            Ok(_) => {
                state.running = None;
                info!("scheduler stopped");
                Ok(())
            }
            Err(_) => {
                tasks.retain(|task| !task.handle.is_finished());
                let pending: Vec<String> = tasks.iter().map(|task| task.name.clone()).collect();
                warn!(?pending, ?timeout, "scheduler shutdown timed out");
                if let Some(running) = state.running.as_mut() {
                    running.tasks.extend(tasks);
                }
                Err(SchedulerError::ShutdownTimeout { timeout, pending })
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.state().running.is_some()
    }

    /// Time since `start`, zero when stopped.
    pub fn uptime(&self) -> Duration {
        self.state()
            .running
            .as_ref()
            .and_then(|running| (self.clock.utc() - running.started_at).to_std().ok())
            .unwrap_or_default()
    }

    /// Registered task names in registration order.
    pub fn registered_tasks(&self) -> Vec<String> {
        self.state()
            .registered
            .iter()
            .map(|task| task.name().to_owned())
            .collect()
    }
}

async fn supervise(task: Arc<dyn ScheduledTask>, cancel: CancellationToken) {
    let name = task.name().to_owned();
    info!(task = %name, "task started");
    match AssertUnwindSafe(task.start(cancel)).catch_unwind().await {
        Ok(()) => info!(task = %name, "task stopped"),
        Err(panic) => error!(task = %name, panic = %panic_message(&*panic), "task panicked"),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
