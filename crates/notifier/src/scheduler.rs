//! Scheduler - where background dispatch units run

use std::future::Future;
use std::sync::Arc;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, info};

use contracts::ContractError;

/// Default thread name prefix of a dedicated scheduler
pub const DEFAULT_THREAD_NAME: &str = "herald-worker";

/// How a scheduler is obtained
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SchedulerSpec {
    /// The tokio runtime active when the first async notification is raised
    #[default]
    Ambient,
    /// A multi-threaded runtime owned by the notifier
    Dedicated {
        worker_threads: usize,
        thread_name: String,
    },
}

impl SchedulerSpec {
    /// Dedicated scheduler with the default thread name
    pub fn dedicated(worker_threads: usize) -> Self {
        Self::Dedicated {
            worker_threads,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }

    /// Check the spec can produce a scheduler
    ///
    /// # Errors
    /// Returns `ContractError::ConfigValidation` for a dedicated spec with no
    /// workers or an empty thread name.
    pub fn validate(&self) -> Result<(), ContractError> {
        match self {
            Self::Ambient => Ok(()),
            Self::Dedicated {
                worker_threads,
                thread_name,
            } => {
                if *worker_threads == 0 {
                    return Err(ContractError::config_validation(
                        "scheduler.worker_threads",
                        "dedicated scheduler needs at least one worker thread",
                    ));
                }
                if thread_name.trim().is_empty() {
                    return Err(ContractError::config_validation(
                        "scheduler.thread_name",
                        "thread name cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Create the scheduler described by this spec
    pub fn create(&self) -> Result<Scheduler, ContractError> {
        match self {
            Self::Ambient => Scheduler::ambient(),
            Self::Dedicated {
                worker_threads,
                thread_name,
            } => Scheduler::dedicated(*worker_threads, thread_name),
        }
    }
}

/// Handle to the runtime background units are spawned on
///
/// A dedicated scheduler owns its runtime; the runtime is shut down in the
/// background once the last clone is dropped, abandoning unfinished units.
#[derive(Clone)]
pub struct Scheduler {
    handle: Handle,
    owned: Option<Arc<OwnedRuntime>>,
}

struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            // A plain drop panics when the last clone goes away inside a runtime.
            runtime.shutdown_background();
            debug!("Dedicated scheduler shut down");
        }
    }
}

impl Scheduler {
    /// Use the current tokio runtime
    ///
    /// # Errors
    /// Fails when called outside a tokio runtime.
    pub fn ambient() -> Result<Self, ContractError> {
        let handle = Handle::try_current().map_err(|e| {
            ContractError::config_validation("scheduler", format!("no ambient tokio runtime: {e}"))
        })?;
        Ok(Self::from_handle(handle))
    }

    /// Build a multi-threaded runtime owned by the scheduler
    pub fn dedicated(worker_threads: usize, thread_name: &str) -> Result<Self, ContractError> {
        SchedulerSpec::Dedicated {
            worker_threads,
            thread_name: thread_name.to_string(),
        }
        .validate()?;

        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads)
            .thread_name(thread_name)
            .enable_all()
            .build()?;

        info!(
            worker_threads,
            thread_name, "Dedicated scheduler started"
        );

        Ok(Self {
            handle: runtime.handle().clone(),
            owned: Some(Arc::new(OwnedRuntime(Some(runtime)))),
        })
    }

    /// Wrap an existing runtime handle
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            owned: None,
        }
    }

    /// Runtime handle
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Whether this scheduler owns its runtime
    pub fn is_dedicated(&self) -> bool {
        self.owned.is_some()
    }

    /// Spawn a unit of work, honoring the task hints
    pub(crate) fn spawn<F>(&self, hints: TaskHints, unit: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if hints.long_running {
            let handle = self.handle.clone();
            self.handle.spawn_blocking(move || handle.block_on(unit));
        } else {
            self.handle.spawn(unit);
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("dedicated", &self.is_dedicated())
            .finish()
    }
}

/// Task creation hints applied to every background unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskHints {
    /// Run the unit on a dedicated blocking thread instead of the worker pool
    pub long_running: bool,
}

impl TaskHints {
    pub fn long_running() -> Self {
        Self { long_running: true }
    }
}
