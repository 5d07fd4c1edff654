//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects atoms and the
//! computations that read them. It owns the dependency graph and routes
//! change notifications.
//!
//! # How It Works
//!
//! 1. A tracked computation registers with the runtime and gets a handle.
//!
//! 2. After each tracked run, the computation hands the runtime the atoms it
//!    read; the runtime replaces its previous edges with the new set.
//!
//! 3. When an atom changes, the runtime:
//!    a. Finds every subscriber currently depending on it
//!    b. Outside a batch, notifies each one synchronously
//!    c. Inside a batch, queues each one once and notifies when the
//!       outermost batch ends
//!
//! # Threading
//!
//! The runtime is thread-local. Rendering is single-threaded and
//! cooperative, so no locking is involved; re-entrancy is handled by never
//! holding a borrow of the runtime while a subscriber runs.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::atom::AtomId;
use super::context::ReactiveContext;
use super::subscriber::SubscriberId;

/// A computation that can be told its dependencies changed.
pub trait Reactive {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Called when one of the computation's dependencies changed.
    fn on_stale(&self);
}

/// Handle to a registered reactive computation.
///
/// Dropping this handle unregisters the computation from the runtime.
#[derive(Debug)]
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
}

impl ReactiveHandle {
    /// The subscriber this handle keeps registered.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        Runtime::unregister(self.subscriber_id);
    }
}

/// The thread-local reactive runtime.
pub struct Runtime;

#[derive(Default)]
struct RuntimeState {
    /// Registered computations. Weak so the runtime never keeps one alive.
    reactions: HashMap<SubscriberId, Weak<dyn Reactive>>,
    /// Atom -> subscribers that read it during their last run.
    observers: HashMap<AtomId, IndexSet<SubscriberId>>,
    /// Subscriber -> atoms it read during its last run.
    dependencies: HashMap<SubscriberId, SmallVec<[AtomId; 8]>>,
    batch_depth: usize,
    /// Subscribers notified inside the current batch, in first-notified order.
    pending: IndexSet<SubscriberId>,
}

thread_local! {
    static RUNTIME: RefCell<RuntimeState> = RefCell::new(RuntimeState::default());
}

impl Runtime {
    /// Register a reactive computation with the runtime.
    ///
    /// Returns a handle that unregisters the computation when dropped.
    pub fn register(reactive: &Rc<dyn Reactive>) -> ReactiveHandle {
        let id = reactive.subscriber_id();

        RUNTIME.with(|rt| {
            rt.borrow_mut().reactions.insert(id, Rc::downgrade(reactive));
        });

        ReactiveHandle { subscriber_id: id }
    }

    /// Unregister a computation and drop all of its edges.
    fn unregister(id: SubscriberId) {
        let _ = RUNTIME.try_with(|rt| {
            let mut rt = rt.borrow_mut();
            rt.reactions.remove(&id);
            rt.pending.shift_remove(&id);
            Self::remove_edges(&mut rt, id);
        });
    }

    fn remove_edges(rt: &mut RuntimeState, subscriber_id: SubscriberId) {
        if let Some(atoms) = rt.dependencies.remove(&subscriber_id) {
            for atom in atoms {
                if let Some(subscribers) = rt.observers.get_mut(&atom) {
                    subscribers.shift_remove(&subscriber_id);
                    if subscribers.is_empty() {
                        rt.observers.remove(&atom);
                    }
                }
            }
        }
    }

    /// Replace the dependency set of a subscriber.
    ///
    /// Called after every tracked run with the atoms that run read.
    pub fn set_dependencies(subscriber_id: SubscriberId, atoms: impl IntoIterator<Item = AtomId>) {
        RUNTIME.with(|rt| {
            let mut rt = rt.borrow_mut();
            Self::remove_edges(&mut rt, subscriber_id);

            let atoms: SmallVec<[AtomId; 8]> = atoms.into_iter().collect();
            for atom in &atoms {
                rt.observers.entry(*atom).or_default().insert(subscriber_id);
            }
            tracing::trace!(
                subscriber = %subscriber_id,
                count = atoms.len(),
                "dependencies updated"
            );
            if !atoms.is_empty() {
                rt.dependencies.insert(subscriber_id, atoms);
            }
        });
    }

    /// Remove all dependencies for a subscriber.
    pub fn clear_dependencies(subscriber_id: SubscriberId) {
        let _ = RUNTIME.try_with(|rt| Self::remove_edges(&mut rt.borrow_mut(), subscriber_id));
    }

    /// Number of atoms the subscriber read during its last run.
    pub fn dependency_count(subscriber_id: SubscriberId) -> usize {
        RUNTIME.with(|rt| rt.borrow().dependencies.get(&subscriber_id).map_or(0, |d| d.len()))
    }

    /// Number of subscribers currently depending on the atom.
    pub fn observer_count(atom: AtomId) -> usize {
        RUNTIME.with(|rt| rt.borrow().observers.get(&atom).map_or(0, |s| s.len()))
    }

    /// Whether any subscriber currently depends on the atom.
    pub fn is_observed(atom: AtomId) -> bool {
        Self::observer_count(atom) > 0
    }

    /// Forget an atom that is being dropped.
    pub(crate) fn forget_atom(atom: AtomId) {
        let _ = RUNTIME.try_with(|rt| {
            let mut rt = rt.borrow_mut();
            if let Some(subscribers) = rt.observers.remove(&atom) {
                for subscriber in subscribers {
                    if let Some(deps) = rt.dependencies.get_mut(&subscriber) {
                        deps.retain(|a| *a != atom);
                    }
                }
            }
        });
    }

    /// Notify all subscribers that an atom changed.
    ///
    /// This is the core update propagation mechanism.
    pub fn notify(atom: AtomId) {
        let subscribers: SmallVec<[SubscriberId; 4]> = RUNTIME.with(|rt| {
            let mut rt = rt.borrow_mut();
            let subscribers: SmallVec<[SubscriberId; 4]> = rt
                .observers
                .get(&atom)
                .map(|s| s.iter().copied().collect())
                .unwrap_or_default();

            if rt.batch_depth > 0 {
                rt.pending.extend(subscribers);
                SmallVec::new()
            } else {
                subscribers
            }
        });

        for subscriber in subscribers {
            Self::run(subscriber);
        }
    }

    fn run(subscriber: SubscriberId) {
        let reactive = RUNTIME.with(|rt| {
            rt.borrow()
                .reactions
                .get(&subscriber)
                .and_then(Weak::upgrade)
        });
        if let Some(reactive) = reactive {
            tracing::trace!(subscriber = %subscriber, "notifying stale subscriber");
            reactive.on_stale();
        }
    }

    /// Run `f` as one transaction.
    ///
    /// Notifications raised inside `f` are delivered when the outermost batch
    /// ends, and each subscriber is notified at most once per batch.
    pub fn batch<R>(f: impl FnOnce() -> R) -> R {
        RUNTIME.with(|rt| rt.borrow_mut().batch_depth += 1);
        let guard = BatchGuard;
        let result = f();
        drop(guard);
        result
    }

    /// Whether a batch is currently open.
    pub fn in_batch() -> bool {
        RUNTIME.with(|rt| rt.borrow().batch_depth > 0)
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a tracking context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}

/// Closes a batch, delivering queued notifications when it was the outermost.
struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let outermost = RUNTIME
            .try_with(|rt| {
                let mut rt = rt.borrow_mut();
                rt.batch_depth = rt.batch_depth.saturating_sub(1);
                rt.batch_depth == 0
            })
            .unwrap_or(false);

        if !outermost || std::thread::panicking() {
            return;
        }

        while let Some(subscriber) =
            RUNTIME.with(|rt| rt.borrow_mut().pending.shift_remove_index(0))
        {
            Runtime::run(subscriber);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct MockReactive {
        id: SubscriberId,
        stale: Cell<u32>,
    }

    impl MockReactive {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                id: SubscriberId::new(),
                stale: Cell::new(0),
            })
        }
    }

    impl Reactive for MockReactive {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn on_stale(&self) {
            self.stale.set(self.stale.get() + 1);
        }
    }

    fn register(mock: &Rc<MockReactive>) -> ReactiveHandle {
        let reactive: Rc<dyn Reactive> = mock.clone();
        Runtime::register(&reactive)
    }

    #[test]
    fn runtime_registers_and_unregisters() {
        let reactive = MockReactive::new();
        let id = reactive.id;

        let handle = register(&reactive);
        Runtime::set_dependencies(id, [AtomId::from(900)]);
        assert!(RUNTIME.with(|rt| rt.borrow().reactions.contains_key(&id)));
        assert!(Runtime::is_observed(AtomId::from(900)));

        drop(handle);

        assert!(!RUNTIME.with(|rt| rt.borrow().reactions.contains_key(&id)));
        assert!(!Runtime::is_observed(AtomId::from(900)));
    }

    #[test]
    fn runtime_notifies_subscribers() {
        let first = MockReactive::new();
        let second = MockReactive::new();
        let _h1 = register(&first);
        let _h2 = register(&second);

        Runtime::set_dependencies(first.id, [AtomId::from(42)]);
        Runtime::set_dependencies(second.id, [AtomId::from(42), AtomId::from(43)]);

        Runtime::notify(AtomId::from(42));
        assert_eq!(first.stale.get(), 1);
        assert_eq!(second.stale.get(), 1);

        Runtime::notify(AtomId::from(43));
        assert_eq!(first.stale.get(), 1);
        assert_eq!(second.stale.get(), 2);
    }

    #[test]
    fn set_dependencies_replaces_previous_edges() {
        let reactive = MockReactive::new();
        let _handle = register(&reactive);

        Runtime::set_dependencies(reactive.id, [AtomId::from(100), AtomId::from(101)]);
        assert_eq!(Runtime::dependency_count(reactive.id), 2);

        Runtime::set_dependencies(reactive.id, [AtomId::from(101)]);
        assert_eq!(Runtime::dependency_count(reactive.id), 1);
        assert!(!Runtime::is_observed(AtomId::from(100)));

        Runtime::notify(AtomId::from(100));
        assert_eq!(reactive.stale.get(), 0);
    }

    #[test]
    fn runtime_clears_dependencies() {
        let reactive = MockReactive::new();
        let _handle = register(&reactive);

        Runtime::set_dependencies(reactive.id, [AtomId::from(200)]);
        assert_eq!(Runtime::observer_count(AtomId::from(200)), 1);

        Runtime::clear_dependencies(reactive.id);
        assert_eq!(Runtime::observer_count(AtomId::from(200)), 0);
        assert_eq!(Runtime::dependency_count(reactive.id), 0);
    }

    #[test]
    fn batch_defers_and_dedupes_notifications() {
        let reactive = MockReactive::new();
        let _handle = register(&reactive);
        Runtime::set_dependencies(reactive.id, [AtomId::from(300), AtomId::from(301)]);

        Runtime::batch(|| {
            Runtime::notify(AtomId::from(300));
            Runtime::notify(AtomId::from(301));
            Runtime::batch(|| Runtime::notify(AtomId::from(300)));
            assert!(Runtime::in_batch());
            assert_eq!(reactive.stale.get(), 0);
        });

        assert!(!Runtime::in_batch());
        assert_eq!(reactive.stale.get(), 1);
    }

    #[test]
    fn dropped_reactive_is_skipped() {
        let reactive = MockReactive::new();
        let id = reactive.id;
        let handle = register(&reactive);
        Runtime::set_dependencies(id, [AtomId::from(400)]);

        drop(reactive);
        // The weak entry no longer upgrades; notifying must not panic.
        Runtime::notify(AtomId::from(400));
        drop(handle);
    }
}
