//! Request queue and execution plans shared by both executors.
//!
//! The planner owns every state transition. Executors only pull
//! [`ResourceOp`]s, run them, and hand back [`Completion`]s. This keeps the
//! single-thread and multi-thread strategies observably identical.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use crate::error::{ResolveError, ResourceError};
use crate::event::ResourceEvent;
use crate::group::GroupState;
use crate::progress::ProgressTracker;
use crate::registry::ResourceRegistry;
use crate::resolver::DependencyResolver;
use crate::resource::{LoadOutcome, ResourceHandle, ResourceState};

/// The two top-level operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Load,
    Unload,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Load => f.write_str("load"),
            RequestKind::Unload => f.write_str("unload"),
        }
    }
}

/// Identifies one resource operation of one activated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OpId {
    pub seq: u64,
    pub slot: usize,
    pub index: usize,
    pub kind: RequestKind,
}

/// A resource operation ready to run on any thread.
pub(crate) struct ResourceOp {
    pub id: OpId,
    pub handle: ResourceHandle,
}

impl ResourceOp {
    /// Runs one step of the operation.
    pub(crate) fn step(&self) -> LoadOutcome {
        match self.id.kind {
            RequestKind::Load => self.handle.load(),
            RequestKind::Unload => self.handle.unload(),
        }
    }
}

/// The final result of a [`ResourceOp`].
pub(crate) struct Completion {
    pub id: OpId,
    pub result: Result<(), ResourceError>,
}

struct Request {
    seq: u64,
    kind: RequestKind,
    group: String,
    /// Groups this request moved from `Unloaded` to `Loading` at call time.
    marked: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Waiting,
    Running,
    Finished { ok: bool },
}

struct PlannedGroup {
    slot: usize,
    /// Resource indices in execution order.
    ops: Vec<usize>,
    issued: usize,
    completed: usize,
    /// Plan indices that must finish successfully before this group runs.
    prerequisites: Vec<usize>,
    status: Status,
    error: Option<ResourceError>,
}

impl PlannedGroup {
    fn new(slot: usize, ops: Vec<usize>, prerequisites: Vec<usize>) -> Self {
        Self {
            slot,
            ops,
            issued: 0,
            completed: 0,
            prerequisites,
            status: Status::Waiting,
            error: None,
        }
    }
}

struct ActivePlan {
    seq: u64,
    kind: RequestKind,
    root: String,
    groups: Vec<PlannedGroup>,
}

impl ActivePlan {
    fn is_finished(&self) -> bool {
        self.groups
            .iter()
            .all(|g| matches!(g.status, Status::Finished { .. }))
    }
}

/// FIFO queue of top-level requests plus the one currently active.
#[derive(Default)]
pub(crate) struct Planner {
    pending: VecDeque<Request>,
    active: Option<ActivePlan>,
    next_seq: u64,
    progress: ProgressTracker,
}

impl Planner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.active.is_none() && self.pending.is_empty()
    }

    /// Requests not yet finished, including the active one.
    pub(crate) fn outstanding(&self) -> usize {
        self.pending.len() + usize::from(self.active.is_some())
    }

    pub(crate) fn active_request(&self) -> Option<(RequestKind, &str)> {
        self.active.as_ref().map(|p| (p.kind, p.root.as_str()))
    }

    pub(crate) fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub(crate) fn reset(&mut self) {
        *self = Self {
            next_seq: self.next_seq,
            ..Self::default()
        };
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Accepts a load request. Validation happens now; work starts on a
    /// later `update()`.
    pub(crate) fn request_load(
        &mut self,
        registry: &mut ResourceRegistry,
        name: &str,
    ) -> Result<(), ResourceError> {
        if !registry.contains(name) {
            return Err(ResourceError::NotFound(format!("group '{name}'")));
        }
        let expansion = DependencyResolver::expand(registry, name)?;

        let mut marked = Vec::new();
        for group_name in &expansion {
            if let Some(slot) = registry.slot(group_name) {
                let group = registry.group_at_mut(slot);
                if group.state() == GroupState::Unloaded {
                    group.set_state(GroupState::Loading);
                    marked.push(slot);
                }
            }
        }

        if let Some(last) = self.pending.iter_mut().rev().find(|r| r.group == name) {
            if last.kind == RequestKind::Load {
                log::debug!("Load of '{name}' already pending");
                last.marked.extend(marked);
                return Ok(());
            }
        }

        let seq = self.take_seq();
        self.pending.push_back(Request {
            seq,
            kind: RequestKind::Load,
            group: name.to_owned(),
            marked,
        });
        Ok(())
    }

    /// Accepts an unload request. Unknown groups are ignored.
    ///
    /// A load of the same group that has not started yet is cancelled.
    pub(crate) fn request_unload(
        &mut self,
        registry: &mut ResourceRegistry,
        name: &str,
    ) -> Result<(), ResourceError> {
        if !registry.contains(name) {
            log::debug!("Unload of unknown group '{name}' ignored");
            return Ok(());
        }

        if let Some(pos) = self.pending.iter().rposition(|r| r.group == name) {
            if self.pending[pos].kind == RequestKind::Unload {
                log::debug!("Unload of '{name}' already pending");
                return Ok(());
            }
            if let Some(cancelled) = self.pending.remove(pos) {
                log::debug!("Pending load of '{name}' cancelled by unload");
                self.revert_marks(registry, &cancelled.marked);
            }
        }

        let seq = self.take_seq();
        self.pending.push_back(Request {
            seq,
            kind: RequestKind::Unload,
            group: name.to_owned(),
            marked: Vec::new(),
        });
        Ok(())
    }

    /// Returns marked groups to `Unloaded` unless another load still needs
    /// them or they already hold loaded resources.
    fn revert_marks(&self, registry: &mut ResourceRegistry, marked: &[usize]) {
        let mut needed = HashSet::new();
        for request in self
            .pending
            .iter()
            .filter(|r| r.kind == RequestKind::Load)
        {
            if let Ok(expansion) = DependencyResolver::expand(registry, &request.group) {
                needed.extend(expansion.iter().filter_map(|n| registry.slot(n)));
            }
        }
        if let Some(plan) = self.active.as_ref().filter(|p| p.kind == RequestKind::Load) {
            needed.extend(plan.groups.iter().map(|g| g.slot));
        }

        for &slot in marked {
            if needed.contains(&slot) {
                continue;
            }
            let group = registry.group_at_mut(slot);
            if group.state() == GroupState::Loading && !group.has_loaded_resources() {
                group.set_state(GroupState::Unloaded);
            }
        }
    }

    /// Activates pending requests until one has outstanding work or the
    /// queue is empty.
    pub(crate) fn advance(
        &mut self,
        registry: &mut ResourceRegistry,
        events: &mut Vec<ResourceEvent>,
    ) {
        while self.active.is_none() {
            let Some(request) = self.pending.pop_front() else {
                return;
            };
            self.activate(registry, request, events);
        }
    }

    fn activate(
        &mut self,
        registry: &mut ResourceRegistry,
        request: Request,
        events: &mut Vec<ResourceEvent>,
    ) {
        let groups = match request.kind {
            RequestKind::Load => match plan_load(registry, &request.group) {
                Ok(groups) => groups,
                Err(err) => {
                    log::error!("Cannot load group '{}': {err}", request.group);
                    self.revert_marks(registry, &request.marked);
                    events.push(ResourceEvent::GroupLoaded {
                        group: request.group,
                        result: Err(err.into()),
                    });
                    return;
                }
            },
            RequestKind::Unload => plan_unload(registry, &request.group),
        };

        if groups.is_empty() {
            log::debug!(
                "Nothing to {} for group '{}'",
                request.kind,
                request.group
            );
            return;
        }

        let total = groups.iter().map(|g| g.ops.len()).sum();
        self.progress.begin(total);
        if request.kind == RequestKind::Load {
            for group in &groups {
                registry.group_at_mut(group.slot).set_state(GroupState::Loading);
            }
        }
        log::debug!(
            "Activated {} of '{}': {} groups, {} operations",
            request.kind,
            request.group,
            groups.len(),
            total
        );

        let mut plan = ActivePlan {
            seq: request.seq,
            kind: request.kind,
            root: request.group,
            groups,
        };
        settle(&mut plan, &mut self.progress, registry, events);
        if !plan.is_finished() {
            self.active = Some(plan);
        }
    }

    /// Issues the next operation of a running group, if any.
    pub(crate) fn next_op(&mut self, registry: &mut ResourceRegistry) -> Option<ResourceOp> {
        let plan = self.active.as_mut()?;
        let group = plan
            .groups
            .iter_mut()
            .find(|g| g.status == Status::Running && g.issued < g.ops.len())?;
        let index = group.ops[group.issued];
        group.issued += 1;

        let entry = registry.group_at_mut(group.slot).entry_mut(index)?;
        if plan.kind == RequestKind::Load {
            entry.set_state(ResourceState::Loading);
        }
        Some(ResourceOp {
            id: OpId {
                seq: plan.seq,
                slot: group.slot,
                index,
                kind: plan.kind,
            },
            handle: entry.handle().clone(),
        })
    }

    /// Applies the result of a finished operation.
    pub(crate) fn complete(
        &mut self,
        registry: &mut ResourceRegistry,
        completion: Completion,
        events: &mut Vec<ResourceEvent>,
    ) {
        let Completion { id, result } = completion;
        let Some(plan) = self.active.as_mut().filter(|p| p.seq == id.seq) else {
            log::warn!("Ignoring completion of a request that is no longer active");
            return;
        };
        let Some(pos) = plan.groups.iter().position(|g| g.slot == id.slot) else {
            log::warn!("Ignoring completion for a group outside the active plan");
            return;
        };

        let group = registry.group_at_mut(id.slot);
        let group_name = group.name().to_owned();
        if let Some(entry) = group.entry_mut(id.index) {
            let state = match (id.kind, result.is_ok()) {
                (RequestKind::Load, true) => ResourceState::Loaded,
                (RequestKind::Load, false) => ResourceState::Unloaded,
                (RequestKind::Unload, true) => ResourceState::Unloaded,
                (RequestKind::Unload, false) => ResourceState::Loaded,
            };
            if let Err(err) = &result {
                log::warn!(
                    "Failed to {} '{}' in group '{group_name}': {err}",
                    id.kind,
                    entry.key()
                );
            }
            entry.set_state(state);
        }

        let planned = &mut plan.groups[pos];
        planned.completed += 1;
        if let Err(err) = result {
            planned.error.get_or_insert(err);
        }
        let (processed, total) = self.progress.advance(1);
        events.push(ResourceEvent::Progress { processed, total });

        if planned.completed >= planned.ops.len() && planned.status == Status::Running {
            finish_group(plan.kind, planned, &mut self.progress, registry, events);
        }
        settle(plan, &mut self.progress, registry, events);
        if plan.is_finished() {
            self.active = None;
        }
    }
}

fn plan_load(registry: &ResourceRegistry, root: &str) -> Result<Vec<PlannedGroup>, ResolveError> {
    let expansion = DependencyResolver::expand(registry, root)?;
    let mut slots = Vec::with_capacity(expansion.len());
    for name in &expansion {
        let slot = registry
            .slot(name)
            .ok_or_else(|| ResolveError::UnknownGroup(name.clone()))?;
        if registry.group_at(slot).state() != GroupState::Loaded {
            slots.push(slot);
        }
    }

    Ok(slots
        .iter()
        .map(|&slot| {
            let group = registry.group_at(slot);
            let prerequisites = group
                .dependencies()
                .iter()
                .filter_map(|d| registry.slot(d))
                .filter_map(|dep| slots.iter().position(|&s| s == dep))
                .collect();
            PlannedGroup::new(slot, group.indices_not_loaded(), prerequisites)
        })
        .collect())
}

/// Whether unloading `slot` has anything to undo. A group only marked
/// `Loading` by a queued load holds nothing yet.
fn holds_content(registry: &ResourceRegistry, slot: usize) -> bool {
    let group = registry.group_at(slot);
    match group.state() {
        GroupState::Unloaded => false,
        GroupState::Loading => group.has_loaded_resources(),
        GroupState::Loaded | GroupState::Unloading => true,
    }
}

/// Dependents first, then the root, then dependencies no one else holds.
fn plan_unload(registry: &ResourceRegistry, root: &str) -> Vec<PlannedGroup> {
    let Some(root_slot) = registry.slot(root) else {
        return Vec::new();
    };
    if !holds_content(registry, root_slot) {
        return Vec::new();
    }

    let mut slots: Vec<usize> = DependencyResolver::dependents(registry, root)
        .iter()
        .filter_map(|name| registry.slot(name))
        .filter(|&slot| holds_content(registry, slot))
        .collect();
    slots.push(root_slot);

    match DependencyResolver::expand(registry, root) {
        Ok(expansion) => {
            for name in expansion.iter().rev().skip(1) {
                let Some(slot) = registry.slot(name) else {
                    continue;
                };
                if slots.contains(&slot) || !holds_content(registry, slot) {
                    continue;
                }
                let still_needed = registry.iter().enumerate().any(|(other, group)| {
                    group.state() != GroupState::Unloaded
                        && !slots.contains(&other)
                        && group.dependencies().iter().any(|d| d == name)
                });
                if !still_needed {
                    slots.push(slot);
                }
            }
        }
        Err(err) => {
            log::warn!("Unloading '{root}' without its dependencies: {err}");
        }
    }

    slots
        .iter()
        .map(|&slot| {
            let name = registry.group_at(slot).name();
            let prerequisites = slots
                .iter()
                .enumerate()
                .filter(|&(_, &other)| {
                    registry
                        .group_at(other)
                        .dependencies()
                        .iter()
                        .any(|d| d == name)
                })
                .map(|(i, _)| i)
                .collect();
            PlannedGroup::new(slot, registry.group_at(slot).indices_loaded(), prerequisites)
        })
        .collect()
}

/// Releases groups whose prerequisites succeeded, abandons those with a
/// failed prerequisite, and finishes groups with nothing to do. Repeats
/// until nothing changes.
fn settle(
    plan: &mut ActivePlan,
    progress: &mut ProgressTracker,
    registry: &mut ResourceRegistry,
    events: &mut Vec<ResourceEvent>,
) {
    loop {
        let mut changed = false;
        for i in 0..plan.groups.len() {
            if plan.groups[i].status != Status::Waiting {
                continue;
            }

            let mut failed = None;
            let mut ready = true;
            for &p in &plan.groups[i].prerequisites {
                match plan.groups[p].status {
                    Status::Finished { ok: true } => {}
                    Status::Finished { ok: false } => {
                        failed = Some(p);
                        break;
                    }
                    _ => ready = false,
                }
            }

            if let Some(p) = failed {
                let culprit = registry.group_at(plan.groups[p].slot).name().to_owned();
                abandon(plan.kind, &mut plan.groups[i], &culprit, progress, registry, events);
                changed = true;
                continue;
            }
            if !ready {
                continue;
            }

            let group = &mut plan.groups[i];
            group.status = Status::Running;
            if plan.kind == RequestKind::Unload {
                registry.group_at_mut(group.slot).set_state(GroupState::Unloading);
            }
            if group.ops.is_empty() {
                finish_group(plan.kind, group, progress, registry, events);
            }
            changed = true;
        }
        if !changed {
            break;
        }
    }
}

fn abandon(
    kind: RequestKind,
    group: &mut PlannedGroup,
    culprit: &str,
    progress: &mut ProgressTracker,
    registry: &ResourceRegistry,
    events: &mut Vec<ResourceEvent>,
) {
    for _ in &group.ops {
        let (processed, total) = progress.advance(1);
        events.push(ResourceEvent::Progress { processed, total });
    }
    let error = match kind {
        RequestKind::Load => {
            ResourceError::Generic(format!("dependency group '{culprit}' failed to load"))
        }
        RequestKind::Unload => {
            ResourceError::Generic(format!("dependent group '{culprit}' failed to unload"))
        }
    };
    let name = registry.group_at(group.slot).name().to_owned();
    log::warn!("Skipping {kind} of group '{name}': {error}");
    group.status = Status::Finished { ok: false };
    events.push(completion_event(kind, name, Err(error)));
}

/// Completes a group whose operations all ran. A group that gained
/// resources through a merge while loading keeps running until those load
/// too.
fn finish_group(
    kind: RequestKind,
    planned: &mut PlannedGroup,
    progress: &mut ProgressTracker,
    registry: &mut ResourceRegistry,
    events: &mut Vec<ResourceEvent>,
) {
    if kind == RequestKind::Load && planned.error.is_none() {
        let group = registry.group_at(planned.slot);
        let added: Vec<usize> = group
            .indices_not_loaded()
            .into_iter()
            .filter(|index| !planned.ops.contains(index))
            .collect();
        if !added.is_empty() {
            log::debug!(
                "Group '{}' gained {} resources while loading",
                group.name(),
                added.len()
            );
            progress.extend(added.len());
            planned.ops.extend(added);
            return;
        }
    }

    let result = match planned.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    };
    let ok = result.is_ok();
    let group = registry.group_at_mut(planned.slot);
    if ok {
        match kind {
            RequestKind::Load if group.indices_not_loaded().is_empty() => {
                group.set_state(GroupState::Loaded);
            }
            RequestKind::Unload if !group.has_loaded_resources() => {
                group.set_state(GroupState::Unloaded);
            }
            _ => log::debug!("Group '{}' changed during {kind}", group.name()),
        }
    }
    planned.status = Status::Finished { ok };
    events.push(completion_event(kind, group.name().to_owned(), result));
}

fn completion_event(
    kind: RequestKind,
    group: String,
    result: Result<(), ResourceError>,
) -> ResourceEvent {
    match kind {
        RequestKind::Load => ResourceEvent::GroupLoaded { group, result },
        RequestKind::Unload => ResourceEvent::GroupUnloaded { group, result },
    }
}
