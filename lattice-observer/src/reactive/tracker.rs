//! Tracking Sessions
//!
//! A [`Tracker`] runs a function, records every atom read while it ran, and
//! invokes a single invalidation callback whenever one of those atoms changes
//! afterwards.
//!
//! # How Trackers Work
//!
//! 1. `track(f)` runs `f` inside a fresh reactive context.
//!
//! 2. When `f` returns, the atoms it read replace the tracker's previous
//!    dependency set in the runtime.
//!
//! 3. A change to any of those atoms calls `on_invalidate` synchronously.
//!    The tracker does not re-run anything on its own; the owner decides.
//!
//! # Disposal
//!
//! `dispose()` is idempotent and terminal: edges are dropped, the runtime
//! forgets the tracker, and a notification already in flight finds the
//! disposed flag set and does nothing. Dropping the tracker disposes it.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use super::context::ReactiveContext;
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::subscriber::SubscriberId;

/// One dependency-tracked computation with a single invalidation callback.
pub struct Tracker {
    inner: Rc<TrackerInner>,
    handle: Option<ReactiveHandle>,
}

struct TrackerInner {
    id: SubscriberId,
    name: String,
    on_invalidate: Box<dyn Fn()>,
    disposed: Cell<bool>,
    runs: Cell<usize>,
}

impl Reactive for TrackerInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn on_stale(&self) {
        if self.disposed.get() {
            tracing::trace!(tracker = %self.name, "ignoring notification for disposed tracker");
            return;
        }
        (self.on_invalidate)();
    }
}

impl Tracker {
    /// Create a tracker. Nothing is tracked until [`Tracker::track`] runs.
    pub fn new<F>(name: impl Into<String>, on_invalidate: F) -> Self
    where
        F: Fn() + 'static,
    {
        let inner = Rc::new(TrackerInner {
            id: SubscriberId::new(),
            name: name.into(),
            on_invalidate: Box::new(on_invalidate),
            disposed: Cell::new(false),
            runs: Cell::new(0),
        });
        let reactive: Rc<dyn Reactive> = inner.clone();
        let handle = Runtime::register(&reactive);

        Self {
            inner,
            handle: Some(handle),
        }
    }

    /// Get the subscriber ID for this tracker.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Run `f`, replacing the dependency set with the atoms it reads.
    ///
    /// A disposed tracker still runs `f`, untracked, so the caller gets its
    /// result without re-establishing any subscription.
    pub fn track<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.is_disposed() {
            return ReactiveContext::untracked(f);
        }

        let ctx = ReactiveContext::enter(self.inner.id);
        let result = f();
        let dependencies = ctx.take_dependencies();
        drop(ctx);

        self.inner.runs.set(self.inner.runs.get() + 1);
        if !self.is_disposed() {
            Runtime::set_dependencies(self.inner.id, dependencies);
        }
        result
    }

    /// Dispose the tracker. Safe to call any number of times.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        tracing::trace!(tracker = %self.inner.name, "tracker disposed");
        Runtime::clear_dependencies(self.inner.id);
    }

    /// Check if the tracker has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Number of atoms read during the last tracked run.
    pub fn dependency_count(&self) -> usize {
        Runtime::dependency_count(self.inner.id)
    }

    /// Number of completed tracked runs.
    pub fn run_count(&self) -> usize {
        self.inner.runs.get()
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.dispose();
        // Unregisters from the runtime.
        self.handle.take();
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("name", &self.inner.name)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;

    fn counting_tracker(name: &str) -> (Tracker, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        let tracker = Tracker::new(name, {
            let calls = calls.clone();
            move || calls.set(calls.get() + 1)
        });
        (tracker, calls)
    }

    #[test]
    fn track_returns_result_and_records_reads() {
        let a = Signal::new(1);
        let b = Signal::new(2);
        let (tracker, _) = counting_tracker("sum");

        let sum = tracker.track(|| a.get() + b.get() + a.get());
        assert_eq!(sum, 4);
        assert_eq!(tracker.dependency_count(), 2);
        assert_eq!(tracker.run_count(), 1);
    }

    #[test]
    fn only_read_atoms_invalidate() {
        let read = Signal::new(0);
        let ignored = Signal::new(0);
        let (tracker, calls) = counting_tracker("reader");

        tracker.track(|| read.get());
        ignored.set(1);
        assert_eq!(calls.get(), 0);

        read.set(1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn retracking_refreshes_dependencies() {
        let first = Signal::new(0);
        let second = Signal::new(0);
        let (tracker, calls) = counting_tracker("switching");

        tracker.track(|| first.get());
        tracker.track(|| second.get());

        first.set(1);
        assert_eq!(calls.get(), 0);
        second.set(1);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn disposed_tracker_never_fires() {
        let signal = Signal::new(0);
        let (tracker, calls) = counting_tracker("done");

        tracker.track(|| signal.get());
        tracker.dispose();
        tracker.dispose();
        assert!(tracker.is_disposed());

        signal.set(1);
        signal.set(2);
        assert_eq!(calls.get(), 0);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn disposed_tracker_runs_untracked() {
        let signal = Signal::new(5);
        let (tracker, calls) = counting_tracker("done");
        tracker.dispose();

        assert_eq!(tracker.track(|| signal.get()), 5);
        signal.set(6);
        assert_eq!(calls.get(), 0);
        assert_eq!(tracker.dependency_count(), 0);
    }

    #[test]
    fn dispose_during_notification_stops_later_callbacks() {
        let signal = Signal::new(0);
        let slot: Rc<std::cell::RefCell<Option<Tracker>>> = Rc::default();
        let calls = Rc::new(Cell::new(0));

        let tracker = Tracker::new("self-disposing", {
            let slot = slot.clone();
            let calls = calls.clone();
            move || {
                calls.set(calls.get() + 1);
                if let Some(tracker) = slot.borrow().as_ref() {
                    tracker.dispose();
                }
            }
        });
        tracker.track(|| signal.get());
        *slot.borrow_mut() = Some(tracker);

        signal.set(1);
        signal.set(2);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn dropping_tracker_disposes() {
        let signal = Signal::new(0);
        let (tracker, calls) = counting_tracker("dropped");
        tracker.track(|| signal.get());

        drop(tracker);
        signal.set(1);
        assert_eq!(calls.get(), 0);
        assert_eq!(signal.subscriber_count(), 0);
    }
}
