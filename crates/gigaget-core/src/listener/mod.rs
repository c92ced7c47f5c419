//! Mission observers and their delivery.
//!
//! A listener is registered together with the [`DeliveryContext`] it wants
//! its callbacks on. Registrations are owned explicitly: `add_listener`
//! returns an id to pass to `remove_listener`, and `Mission::subscribe`
//! returns a [`ListenerGuard`] that deregisters when dropped.

mod context;

pub use context::{DeliveryContext, EventLoop, Task, TokioContext};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::mission::Mission;

/// Callbacks for one mission's progress. Called on the listener's delivery
/// context, never under the mission's lock.
pub trait MissionListener: Send + Sync {
    fn on_progress(&self, mission: &Mission, done: u64, total: u64);
    fn on_finish(&self, mission: &Mission);
    fn on_error(&self, mission: &Mission, code: i32);
}

/// Handle returned by `Mission::add_listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Event fanned out to every registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissionEvent {
    Progress { done: u64, total: u64 },
    Finished,
    Error(i32),
}

struct Registration {
    id: ListenerId,
    listener: Arc<dyn MissionListener>,
    context: Arc<dyn DeliveryContext>,
    /// Cleared on removal so already-posted tasks become no-ops.
    active: Arc<AtomicBool>,
}

/// Listeners of one mission. Lives inside the mission's locked state, so
/// add/remove/dispatch are serialized with the notify operations.
#[derive(Default)]
pub(crate) struct ListenerSet {
    next_id: u64,
    entries: Vec<Registration>,
}

impl ListenerSet {
    pub fn add(&mut self, listener: Arc<dyn MissionListener>, context: Arc<dyn DeliveryContext>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push(Registration {
            id,
            listener,
            context,
            active: Arc::new(AtomicBool::new(true)),
        });
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        self.remove_where(|r| r.id == id) > 0
    }

    /// Remove every registration of `listener` (by identity).
    pub fn remove_listener(&mut self, listener: &Arc<dyn MissionListener>) -> usize {
        let target = Arc::as_ptr(listener) as *const ();
        self.remove_where(|r| Arc::as_ptr(&r.listener) as *const () == target)
    }

    fn remove_where(&mut self, pred: impl Fn(&Registration) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|r| {
            if pred(r) {
                r.active.store(false, Ordering::Release);
                false
            } else {
                true
            }
        });
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Post `event` to every listener on its own context.
    pub fn deliver(&self, mission: &Mission, event: MissionEvent) {
        for r in &self.entries {
            let listener = Arc::clone(&r.listener);
            let active = Arc::clone(&r.active);
            let mission = mission.clone();
            r.context.post(Box::new(move || {
                if !active.load(Ordering::Acquire) {
                    return;
                }
                match event {
                    MissionEvent::Progress { done, total } => listener.on_progress(&mission, done, total),
                    MissionEvent::Finished => listener.on_finish(&mission),
                    MissionEvent::Error(code) => listener.on_error(&mission, code),
                }
            }));
        }
    }
}

/// Scoped registration: removes the listener from its mission on drop.
#[must_use = "the listener is removed as soon as the guard is dropped"]
pub struct ListenerGuard {
    mission: Mission,
    id: ListenerId,
}

impl ListenerGuard {
    pub(crate) fn new(mission: Mission, id: ListenerId) -> Self {
        Self { mission, id }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.mission.remove_listener(self.id);
    }
}
