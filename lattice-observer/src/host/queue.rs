//! Update queue and the forced-update entry point.
//!
//! Requests never render synchronously: they are recorded here and drained
//! by the next [`Root::flush`](super::Root::flush). Repeated requests for the
//! same instance merge into one entry.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::instance::{Instance, InstanceId};
use crate::error::HostError;
use crate::props::Props;

/// One queued update for an instance.
#[derive(Debug, Default)]
pub(crate) struct PendingUpdate {
    /// Skip `should_component_update`.
    pub(crate) force: bool,
    /// State changes to merge, oldest first.
    pub(crate) partial_state: Option<Props>,
}

#[derive(Default)]
pub(crate) struct UpdateQueue {
    live: RefCell<HashMap<InstanceId, Weak<Instance>>>,
    pending: RefCell<IndexMap<InstanceId, PendingUpdate>>,
}

impl UpdateQueue {
    pub(crate) fn register(&self, instance: &Rc<Instance>) {
        self.live.borrow_mut().insert(instance.id(), Rc::downgrade(instance));
    }

    pub(crate) fn forget(&self, id: InstanceId) {
        self.live.borrow_mut().remove(&id);
        self.pending.borrow_mut().shift_remove(&id);
    }

    pub(crate) fn instance(&self, id: InstanceId) -> Option<Rc<Instance>> {
        self.live.borrow().get(&id).and_then(Weak::upgrade)
    }

    fn enqueue(
        &self,
        id: InstanceId,
        apply: impl FnOnce(&mut PendingUpdate),
    ) -> Result<(), HostError> {
        if !self.live.borrow().contains_key(&id) {
            return Err(HostError::NotMounted(id));
        }
        apply(self.pending.borrow_mut().entry(id).or_default());
        Ok(())
    }

    /// Remove and return the queued update for one instance.
    pub(crate) fn take(&self, id: InstanceId) -> Option<PendingUpdate> {
        self.pending.borrow_mut().shift_remove(&id)
    }

    /// Instances with a queued update, in request order.
    pub(crate) fn pending_ids(&self) -> Vec<InstanceId> {
        self.pending.borrow().keys().copied().collect()
    }

    pub(crate) fn clear(&self) {
        self.pending.borrow_mut().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.borrow().len()
    }
}

fn merge_partial(slot: &mut Option<Props>, partial: Props) {
    *slot = Some(match slot.take() {
        Some(existing) => existing.merge(&partial),
        None => partial,
    });
}

/// Requests updates for one instance.
///
/// Holds the root weakly: once the root is gone every request fails with
/// [`HostError::RootDropped`], and once the instance is unmounted with
/// [`HostError::NotMounted`].
#[derive(Clone)]
pub struct Updater {
    id: InstanceId,
    queue: Weak<UpdateQueue>,
}

impl Updater {
    pub(crate) fn new(id: InstanceId, queue: &Rc<UpdateQueue>) -> Self {
        Self {
            id,
            queue: Rc::downgrade(queue),
        }
    }

    /// An updater whose root is already gone.
    #[cfg(test)]
    pub(crate) fn detached_for_tests(id: InstanceId) -> Self {
        Self { id, queue: Weak::new() }
    }

    pub fn instance_id(&self) -> InstanceId {
        self.id
    }

    /// Queue a re-render that skips `should_component_update`.
    pub fn force_update(&self) -> Result<(), HostError> {
        let queue = self.queue.upgrade().ok_or(HostError::RootDropped)?;
        queue.enqueue(self.id, |update| update.force = true)?;
        tracing::debug!(instance = %self.id, "forced update queued");
        Ok(())
    }

    /// Queue a state change; later changes win per key.
    pub fn set_state(&self, partial: Props) -> Result<(), HostError> {
        let queue = self.queue.upgrade().ok_or(HostError::RootDropped)?;
        queue.enqueue(self.id, |update| merge_partial(&mut update.partial_state, partial))
    }

    pub(crate) fn forget(&self) {
        if let Some(queue) = self.queue.upgrade() {
            queue.forget(self.id);
        }
    }
}

impl fmt::Debug for Updater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Updater")
            .field("instance", &self.id)
            .field("root_alive", &(self.queue.strong_count() > 0))
            .finish()
    }
}
