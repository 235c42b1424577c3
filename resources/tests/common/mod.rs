//! Shared fixtures for the scheduler integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cairn_resources::{
    LoadOutcome, Resource, ResourceError, ResourceEvent, ResourceManager, ResourceManagerConfig,
    ResourceParams, ThreadingModel,
};
use parking_lot::Mutex;

/// Every `load()`/`unload()` call, as `"load:name"` / `"unload:name"`.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Resource that records its calls and follows its parameters:
///
/// - `fail_load = true` / `fail_unload = true`: the operation fails
/// - `steps = N`: the operation reports `StillWorking` N times first
pub struct Recorder {
    name: String,
    log: CallLog,
    fail_load: bool,
    fail_unload: bool,
    steps: u32,
    remaining: u32,
}

impl Recorder {
    fn new(log: CallLog) -> Self {
        Self {
            name: String::new(),
            log,
            fail_load: false,
            fail_unload: false,
            steps: 0,
            remaining: 0,
        }
    }

    fn step(&mut self, op: &str, fail: bool) -> LoadOutcome {
        if self.remaining > 0 {
            self.remaining -= 1;
            return LoadOutcome::StillWorking;
        }
        self.remaining = self.steps;
        self.log.lock().push(format!("{op}:{}", self.name));
        if fail {
            LoadOutcome::Failure(ResourceError::Generic(format!("{op} of {} failed", self.name)))
        } else {
            LoadOutcome::Success
        }
    }
}

impl Resource for Recorder {
    fn create(&mut self, params: &ResourceParams) -> Result<(), ResourceError> {
        self.name = params.require("label")?.to_owned();
        self.fail_load = params.get("fail_load") == Some("true");
        self.fail_unload = params.get("fail_unload") == Some("true");
        self.steps = params
            .get("steps")
            .map(|s| {
                s.parse()
                    .map_err(|_| ResourceError::BadParam(format!("bad steps '{s}'")))
            })
            .transpose()?
            .unwrap_or(0);
        self.remaining = self.steps;
        Ok(())
    }

    fn load(&mut self) -> LoadOutcome {
        self.step("load", self.fail_load)
    }

    fn unload(&mut self) -> LoadOutcome {
        self.step("unload", self.fail_unload)
    }
}

/// A manager wired with the `rec` resource type and an event recorder.
pub struct Harness {
    pub manager: ResourceManager,
    pub calls: CallLog,
    pub events: Arc<Mutex<Vec<ResourceEvent>>>,
}

impl Harness {
    pub fn new(threading: ThreadingModel) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let config = ResourceManagerConfig::default().with_threading(threading);
        let mut manager = ResourceManager::new(config).expect("manager");
        let calls: CallLog = Arc::default();
        let factory_log = Arc::clone(&calls);
        manager.register_resource_type("rec", move || {
            Box::new(Recorder::new(Arc::clone(&factory_log)))
        });

        let events: Arc<Mutex<Vec<ResourceEvent>>> = Arc::default();
        let sink = Arc::clone(&events);
        manager.subscribe(move |_, event| sink.lock().push(event.clone()));

        Self {
            manager,
            calls,
            events,
        }
    }

    pub fn settle(&mut self) {
        self.manager
            .wait_idle(Duration::from_secs(10))
            .expect("scheduler did not go idle");
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn events(&self) -> Vec<ResourceEvent> {
        self.events.lock().clone()
    }

    pub fn progress(&self) -> Vec<(usize, usize)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ResourceEvent::Progress { processed, total } => Some((*processed, *total)),
                _ => None,
            })
            .collect()
    }

    /// `(group, ok)` of every `GroupLoaded` event, in order.
    pub fn loaded(&self) -> Vec<(String, bool)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ResourceEvent::GroupLoaded { group, result } => {
                    Some((group.clone(), result.is_ok()))
                }
                _ => None,
            })
            .collect()
    }

    /// `(group, ok)` of every `GroupUnloaded` event, in order.
    pub fn unloaded(&self) -> Vec<(String, bool)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ResourceEvent::GroupUnloaded { group, result } => {
                    Some((group.clone(), result.is_ok()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn clear_records(&self) {
        self.calls.lock().clear();
        self.events.lock().clear();
    }
}

/// Parameters for a `rec` resource named `label`.
pub fn rec(label: &str) -> ResourceParams {
    ResourceParams::new().with("label", label)
}
