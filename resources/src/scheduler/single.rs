use std::time::Duration;

use crate::event::ResourceEvent;
use crate::registry::ResourceRegistry;
use crate::resource::LoadOutcome;

use super::plan::{Completion, OpId, Planner, ResourceOp};

/// Cooperative executor: resource operations run inside `update()` on the
/// calling thread.
///
/// At most `batch` operations finish per call. A resource reporting
/// [`LoadOutcome::StillWorking`] ends the call and is stepped again on the
/// next one, so a slow resource never blocks the host for long.
pub struct SingleThreadScheduler {
    batch: usize,
    stall_warning: Duration,
    current: Option<ResourceOp>,
    stalled_for: Duration,
    stall_reported: bool,
}

impl SingleThreadScheduler {
    pub fn new(batch: usize, stall_warning: Duration) -> Self {
        Self {
            batch: batch.max(1),
            stall_warning,
            current: None,
            stalled_for: Duration::ZERO,
            stall_reported: false,
        }
    }

    pub fn batch(&self) -> usize {
        self.batch
    }

    pub(crate) fn update(
        &mut self,
        planner: &mut Planner,
        registry: &mut ResourceRegistry,
        delta: Duration,
        events: &mut Vec<ResourceEvent>,
    ) {
        planner.advance(registry, events);

        let mut finished = 0;
        while finished < self.batch {
            if self.current.is_none() {
                self.current = planner.next_op(registry);
            }
            let Some(op) = self.current.as_ref() else {
                break;
            };

            let id = op.id;
            let result = match op.step() {
                LoadOutcome::StillWorking => {
                    self.note_stall(id, delta);
                    break;
                }
                LoadOutcome::Success => Ok(()),
                LoadOutcome::Failure(err) => Err(err),
            };

            self.current = None;
            self.stalled_for = Duration::ZERO;
            self.stall_reported = false;
            planner.complete(registry, Completion { id, result }, events);
            planner.advance(registry, events);
            finished += 1;
        }
    }

    fn note_stall(&mut self, id: OpId, delta: Duration) {
        self.stalled_for += delta;
        if !self.stall_reported && self.stalled_for >= self.stall_warning {
            log::warn!(
                "Resource {} step still working after {:?} (group slot {}, resource {})",
                id.kind,
                self.stalled_for,
                id.slot,
                id.index
            );
            self.stall_reported = true;
        }
    }
}
