pub(crate) mod plan;
pub(crate) mod single;
pub(crate) mod multi;

pub use multi::MultiThreadScheduler;
pub use plan::RequestKind;
pub use single::SingleThreadScheduler;

use std::time::Duration;

use crate::config::{ResourceManagerConfig, ThreadingModel};
use crate::error::ResourceError;
use crate::event::ResourceEvent;
use crate::registry::ResourceRegistry;

use plan::Planner;

/// Error returned when [`ResourceManager::wait_idle`](crate::ResourceManager::wait_idle)
/// runs out of time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleTimeout {
    /// The budget elapsed with requests still outstanding.
    Timeout {
        /// Requests not yet finished, including the active one.
        remaining_requests: usize,
    },
}

impl std::fmt::Display for IdleTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdleTimeout::Timeout { remaining_requests } => {
                write!(
                    f,
                    "Resource scheduler still busy with {remaining_requests} requests"
                )
            }
        }
    }
}

impl std::error::Error for IdleTimeout {}

/// Resource operation executor.
///
/// Dispatches to either cooperative or dedicated-worker execution. Both
/// drive the same planner, so state transitions and events are
/// identical; only where `load()`/`unload()` run differs.
///
/// - [`SingleThread`](LoadScheduler::SingleThread): operations run inside
///   `update()`, up to the configured batch per call.
/// - [`MultiThread`](LoadScheduler::MultiThread): operations run on the
///   `cairn-resource-worker` thread; `update()` only applies results.
pub enum LoadScheduler {
    /// Cooperative executor on the host thread.
    SingleThread(SingleThreadScheduler),
    /// One dedicated worker thread.
    MultiThread(MultiThreadScheduler),
}

impl LoadScheduler {
    /// Creates the executor selected by `config.threading`.
    pub fn from_config(config: &ResourceManagerConfig) -> Result<Self, ResourceError> {
        let stall_warning = Duration::from_millis(config.stall_warning_ms);
        Ok(match config.threading {
            ThreadingModel::SingleThread => Self::SingleThread(SingleThreadScheduler::new(
                config.batch_size(),
                stall_warning,
            )),
            ThreadingModel::MultiThread => {
                Self::MultiThread(MultiThreadScheduler::new(stall_warning)?)
            }
        })
    }

    pub fn threading(&self) -> ThreadingModel {
        match self {
            Self::SingleThread(_) => ThreadingModel::SingleThread,
            Self::MultiThread(_) => ThreadingModel::MultiThread,
        }
    }

    /// Steps or drains outstanding work. Never blocks on resource work.
    pub(crate) fn update(
        &mut self,
        planner: &mut Planner,
        registry: &mut ResourceRegistry,
        delta: Duration,
        events: &mut Vec<ResourceEvent>,
    ) {
        match self {
            Self::SingleThread(scheduler) => scheduler.update(planner, registry, delta, events),
            Self::MultiThread(scheduler) => scheduler.update(planner, registry, events),
        }
    }
}
