use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::ResourceError;
use crate::event::ResourceEvent;
use crate::registry::ResourceRegistry;
use crate::resource::LoadOutcome;

use super::plan::{Completion, Planner, ResourceOp};

const WORKER_NAME: &str = "cairn-resource-worker";
/// Pause between steps of a resource that is still working. Shutdown
/// interrupts it.
const RETRY_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Default)]
struct WorkQueue {
    pending: VecDeque<ResourceOp>,
    outbox: Vec<Completion>,
}

struct Shared {
    queue: Mutex<WorkQueue>,
    wake: Condvar,
    /// Checked by the worker between operations and between retries.
    shutdown: AtomicBool,
}

/// Executor with one dedicated worker thread.
///
/// `update()` drains finished operations from the outbox, applies them, and
/// submits whatever became ready. It never waits for the worker. Operations
/// run strictly in submission order.
pub struct MultiThreadScheduler {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl MultiThreadScheduler {
    pub fn new(stall_warning: Duration) -> Result<Self, ResourceError> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(WorkQueue::default()),
            wake: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name(WORKER_NAME.into())
            .spawn(move || worker_main(&worker_shared, stall_warning))
            .map_err(|e| ResourceError::Generic(format!("failed to spawn {WORKER_NAME}: {e}")))?;
        log::debug!("Started {WORKER_NAME}");
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    pub(crate) fn update(
        &mut self,
        planner: &mut Planner,
        registry: &mut ResourceRegistry,
        events: &mut Vec<ResourceEvent>,
    ) {
        let finished = std::mem::take(&mut self.shared.queue.lock().outbox);
        for completion in finished {
            planner.complete(registry, completion, events);
        }
        planner.advance(registry, events);

        let mut ready = Vec::new();
        while let Some(op) = planner.next_op(registry) {
            ready.push(op);
        }
        if !ready.is_empty() {
            self.shared.queue.lock().pending.extend(ready);
            self.shared.wake.notify_one();
        }
    }
}

impl Drop for MultiThreadScheduler {
    fn drop(&mut self) {
        {
            let _queue = self.shared.queue.lock();
            self.shared.shutdown.store(true, Ordering::Release);
        }
        self.shared.wake.notify_all();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("{WORKER_NAME} panicked");
            }
        }
    }
}

fn worker_main(shared: &Shared, stall_warning: Duration) {
    loop {
        let op = {
            let mut queue = shared.queue.lock();
            loop {
                if shared.shutdown.load(Ordering::Acquire) {
                    return;
                }
                if let Some(op) = queue.pending.pop_front() {
                    break op;
                }
                shared.wake.wait(&mut queue);
            }
        };
        let Some(result) = run_to_end(shared, &op, stall_warning) else {
            return;
        };
        shared.queue.lock().outbox.push(Completion { id: op.id, result });
    }
}

/// Steps `op` until it finishes. `None` if shutdown was requested meanwhile.
fn run_to_end(
    shared: &Shared,
    op: &ResourceOp,
    stall_warning: Duration,
) -> Option<Result<(), ResourceError>> {
    let started = Instant::now();
    let mut stall_reported = false;
    loop {
        match op.step() {
            LoadOutcome::Success => return Some(Ok(())),
            LoadOutcome::Failure(err) => return Some(Err(err)),
            LoadOutcome::StillWorking => {
                if !stall_reported && started.elapsed() >= stall_warning {
                    log::warn!(
                        "Resource {} step still working after {:?} (group slot {}, resource {})",
                        op.id.kind,
                        started.elapsed(),
                        op.id.slot,
                        op.id.index
                    );
                    stall_reported = true;
                }
                let mut queue = shared.queue.lock();
                if shared.shutdown.load(Ordering::Acquire) {
                    return None;
                }
                shared.wake.wait_for(&mut queue, RETRY_INTERVAL);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::ResourceFactory;
    use crate::group::{GroupDefinition, GroupState};
    use crate::resource::Resource;

    struct OnWorker {
        thread: Arc<Mutex<Option<String>>>,
    }

    impl Resource for OnWorker {
        fn load(&mut self) -> LoadOutcome {
            *self.thread.lock() = std::thread::current().name().map(str::to_owned);
            LoadOutcome::Success
        }

        fn unload(&mut self) -> LoadOutcome {
            LoadOutcome::Success
        }
    }

    #[test]
    fn operations_run_on_the_named_worker() {
        let seen = Arc::new(Mutex::new(None));
        let shared = Arc::clone(&seen);
        let mut factory = ResourceFactory::new();
        factory.register("w", move || {
            Box::new(OnWorker {
                thread: Arc::clone(&shared),
            })
        });
        let mut registry = ResourceRegistry::new();
        registry
            .register_group(&GroupDefinition::new("g").resource("w", "a"), &factory)
            .unwrap();

        let mut planner = Planner::new();
        let mut scheduler = MultiThreadScheduler::new(Duration::from_secs(5)).unwrap();
        planner.request_load(&mut registry, "g").unwrap();

        let mut events = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !planner.is_idle() && Instant::now() < deadline {
            scheduler.update(&mut planner, &mut registry, &mut events);
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(registry.group_state("g"), Some(GroupState::Loaded));
        assert_eq!(seen.lock().as_deref(), Some(WORKER_NAME));
    }

    struct Stuck;

    impl Resource for Stuck {
        fn load(&mut self) -> LoadOutcome {
            LoadOutcome::StillWorking
        }

        fn unload(&mut self) -> LoadOutcome {
            LoadOutcome::Success
        }
    }

    #[test]
    fn drop_interrupts_retry_wait() {
        let mut factory = ResourceFactory::new();
        factory.register("stuck", || Box::new(Stuck));
        let mut registry = ResourceRegistry::new();
        registry
            .register_group(&GroupDefinition::new("g").resource("stuck", "a"), &factory)
            .unwrap();

        let mut planner = Planner::new();
        let mut scheduler = MultiThreadScheduler::new(Duration::from_secs(5)).unwrap();
        planner.request_load(&mut registry, "g").unwrap();
        let mut events = Vec::new();
        scheduler.update(&mut planner, &mut registry, &mut events);
        std::thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        drop(scheduler);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(registry.group_state("g"), Some(GroupState::Loading));
    }

    #[test]
    fn drop_joins_idle_worker() {
        let scheduler = MultiThreadScheduler::new(Duration::from_secs(5)).unwrap();
        drop(scheduler);
    }
}
