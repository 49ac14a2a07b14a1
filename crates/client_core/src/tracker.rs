use std::{
    collections::BTreeSet,
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use serde::Serialize;
use shared::domain::ProposalId;
use tokio::sync::broadcast;

use crate::events::ClientEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Vote,
    Execute,
}

/// Busy-state view handed to consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BusySnapshot {
    pub connecting: bool,
    pub creating: bool,
    pub proposals_loading: bool,
    pub voting: BTreeSet<ProposalId>,
    pub executing: BTreeSet<ProposalId>,
}

impl BusySnapshot {
    pub fn is_active(&self, kind: OperationKind, id: ProposalId) -> bool {
        match kind {
            OperationKind::Vote => self.voting.contains(&id),
            OperationKind::Execute => self.executing.contains(&id),
        }
    }
}

/// In-flight bookkeeping for write operations, plus the scalar busy flags.
///
/// Ids are held with set semantics: beginning an id twice leaves a single
/// membership and ending an absent id does nothing.
#[derive(Debug, Default)]
pub struct OperationTracker {
    voting: BTreeSet<ProposalId>,
    executing: BTreeSet<ProposalId>,
    connecting: bool,
    creating: bool,
    // Overlapping refreshes each hold the loading flag.
    refreshes: usize,
}

impl OperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `id` was not already in flight for `kind`.
    pub fn begin(&mut self, kind: OperationKind, id: ProposalId) -> bool {
        self.ids_mut(kind).insert(id)
    }

    /// Returns `true` when `id` was in flight for `kind`.
    pub fn end(&mut self, kind: OperationKind, id: ProposalId) -> bool {
        self.ids_mut(kind).remove(&id)
    }

    pub fn is_active(&self, kind: OperationKind, id: ProposalId) -> bool {
        match kind {
            OperationKind::Vote => self.voting.contains(&id),
            OperationKind::Execute => self.executing.contains(&id),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.voting.is_empty()
            && self.executing.is_empty()
            && !self.connecting
            && !self.creating
            && self.refreshes == 0
    }

    pub fn snapshot(&self) -> BusySnapshot {
        BusySnapshot {
            connecting: self.connecting,
            creating: self.creating,
            proposals_loading: self.refreshes > 0,
            voting: self.voting.clone(),
            executing: self.executing.clone(),
        }
    }

    fn ids_mut(&mut self, kind: OperationKind) -> &mut BTreeSet<ProposalId> {
        match kind {
            OperationKind::Vote => &mut self.voting,
            OperationKind::Execute => &mut self.executing,
        }
    }

    fn acquire(&mut self, slot: BusySlot) -> bool {
        match slot {
            BusySlot::Connecting => !mem::replace(&mut self.connecting, true),
            BusySlot::Creating => !mem::replace(&mut self.creating, true),
            BusySlot::Loading => {
                self.refreshes += 1;
                true
            }
            BusySlot::Operation(kind, id) => self.begin(kind, id),
        }
    }

    fn release(&mut self, slot: BusySlot) {
        match slot {
            BusySlot::Connecting => self.connecting = false,
            BusySlot::Creating => self.creating = false,
            BusySlot::Loading => self.refreshes = self.refreshes.saturating_sub(1),
            BusySlot::Operation(kind, id) => {
                self.end(kind, id);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BusySlot {
    Connecting,
    Creating,
    Loading,
    Operation(OperationKind, ProposalId),
}

/// Tracker shared between the coordinator and the guards it hands out.
#[derive(Clone)]
pub(crate) struct SharedTracker {
    inner: Arc<Mutex<OperationTracker>>,
    events: broadcast::Sender<ClientEvent>,
}

impl SharedTracker {
    pub(crate) fn new(events: broadcast::Sender<ClientEvent>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(OperationTracker::new())),
            events,
        }
    }

    // Critical sections never panic halfway through a transition, so a
    // poisoned lock still guards consistent state.
    fn lock(&self) -> MutexGuard<'_, OperationTracker> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn snapshot(&self) -> BusySnapshot {
        self.lock().snapshot()
    }

    pub(crate) fn is_active(&self, kind: OperationKind, id: ProposalId) -> bool {
        self.lock().is_active(kind, id)
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.lock().is_idle()
    }

    /// `None` when the slot is already held by another operation.
    pub(crate) fn acquire(&self, slot: BusySlot) -> Option<BusyGuard> {
        let acquired = self.lock().acquire(slot);
        if !acquired {
            return None;
        }
        self.publish();
        Some(BusyGuard {
            tracker: self.clone(),
            slot,
        })
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        let _ = self.events.send(ClientEvent::BusyStateChanged(snapshot));
    }
}

/// Releases its slot exactly once, on drop, whatever way the owning
/// operation finished.
pub(crate) struct BusyGuard {
    tracker: SharedTracker,
    slot: BusySlot,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.tracker.lock().release(self.slot);
        self.tracker.publish();
    }
}
