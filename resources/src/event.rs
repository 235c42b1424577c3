use crate::error::ResourceError;
use crate::manager::ResourceManager;

/// Notifications delivered to listeners on the host thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceEvent {
    /// A group finished loading, successfully or not.
    GroupLoaded {
        group: String,
        result: Result<(), ResourceError>,
    },
    /// A group finished unloading, successfully or not.
    GroupUnloaded {
        group: String,
        result: Result<(), ResourceError>,
    },
    /// One more resource operation of the active request finished.
    Progress { processed: usize, total: usize },
}

impl ResourceEvent {
    /// The group a completion event refers to.
    pub fn group(&self) -> Option<&str> {
        match self {
            ResourceEvent::GroupLoaded { group, .. }
            | ResourceEvent::GroupUnloaded { group, .. } => Some(group),
            ResourceEvent::Progress { .. } => None,
        }
    }
}

/// Identifies a subscribed listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) u64);

/// A listener may issue new requests through the manager it receives.
/// Those requests are queued and start on a later `update()`.
pub type Listener = Box<dyn FnMut(&mut ResourceManager, &ResourceEvent) + Send>;

/// Subscribed listeners in subscription order.
#[derive(Default)]
pub(crate) struct ListenerSet {
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
    /// Ids of the listeners currently taken out for dispatch.
    taken: Vec<ListenerId>,
    /// Taken ids unsubscribed during dispatch.
    removed: Vec<ListenerId>,
}

impl ListenerSet {
    pub(crate) fn add(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// A listener removed during dispatch receives no further events.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        if self.listeners.len() != before {
            return true;
        }
        if self.taken.contains(&id) && !self.removed.contains(&id) {
            self.removed.push(id);
            return true;
        }
        false
    }

    pub(crate) fn is_removed(&self, id: ListenerId) -> bool {
        self.removed.contains(&id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Moves the listeners out for dispatch. The id counter stays behind so
    /// listeners subscribed during dispatch get fresh ids.
    pub(crate) fn take(&mut self) -> Vec<(ListenerId, Listener)> {
        self.taken = self.listeners.iter().map(|(id, _)| *id).collect();
        std::mem::take(&mut self.listeners)
    }

    /// Puts dispatched listeners back in front of any added meanwhile,
    /// dropping the ones unsubscribed during dispatch.
    pub(crate) fn restore(&mut self, mut dispatched: Vec<(ListenerId, Listener)>) {
        self.taken.clear();
        let removed = std::mem::take(&mut self.removed);
        dispatched.retain(|(id, _)| !removed.contains(id));
        dispatched.append(&mut self.listeners);
        self.listeners = dispatched;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Listener {
        Box::new(|_, _| {})
    }

    #[test]
    fn ids_are_unique() {
        let mut set = ListenerSet::default();
        let a = set.add(noop());
        let b = set.add(noop());
        assert_ne!(a, b);
        assert!(set.remove(a));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn restore_keeps_listeners_added_during_dispatch() {
        let mut set = ListenerSet::default();
        let first = set.add(noop());
        let taken = set.take();
        let second = set.add(noop());
        set.restore(taken);
        let ids: Vec<_> = set.listeners.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, [first, second]);
    }

    #[test]
    fn remove_during_dispatch_applies_on_restore() {
        let mut set = ListenerSet::default();
        let first = set.add(noop());
        let taken = set.take();
        assert!(set.remove(first));
        assert!(set.is_removed(first));
        assert!(!set.remove(first));
        set.restore(taken);
        assert_eq!(set.len(), 0);
        assert!(!set.is_removed(first));
    }

    #[test]
    fn remove_of_unknown_id_is_false() {
        let mut set = ListenerSet::default();
        let first = set.add(noop());
        assert!(set.remove(first));
        assert!(!set.remove(first));
        let _taken = set.take();
        assert!(!set.remove(ListenerId(7)));
    }

    #[test]
    fn event_group_name() {
        let event = ResourceEvent::GroupLoaded {
            group: "menu".into(),
            result: Ok(()),
        };
        assert_eq!(event.group(), Some("menu"));
        assert_eq!(
            ResourceEvent::Progress {
                processed: 1,
                total: 2
            }
            .group(),
            None
        );
    }
}
