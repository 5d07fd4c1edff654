//! Signal Implementation
//!
//! A Signal is the fundamental observable value. It holds a value and
//! reports reads and changes through its [`Atom`].
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a tracking scope (a tracked render), the
//!    read is recorded as a dependency of that scope.
//!
//! 2. When a signal's value changes, every computation that read it during
//!    its last run is notified.
//!
//! 3. Writing a value equal to the current one changes nothing and notifies
//!    nobody.
//!
//! # Threading
//!
//! Signals are single-threaded: clones share one `Rc` allocation, like the
//! components that read them.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::atom::{Atom, AtomId};
use crate::error::ReactiveError;

/// An observable value of type T.
///
/// # Example
///
/// ```rust
/// use lattice_observer::reactive::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

struct SignalInner<T> {
    atom: Atom,
    value: RefCell<T>,
}

impl<T: PartialEq + 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self::named("signal", value)
    }

    /// Create a signal whose name appears in logs and errors.
    pub fn named(name: impl Into<String>, value: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                atom: Atom::new(name),
                value: RefCell::new(value),
            }),
        }
    }

    /// Get the signal's atom ID.
    pub fn id(&self) -> AtomId {
        self.inner.atom.id()
    }

    pub fn name(&self) -> &str {
        self.inner.atom.name()
    }

    /// Get the current value.
    ///
    /// If called within a tracking scope, this also records the signal as a
    /// dependency of that scope.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.with(T::clone)
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.inner.atom.report_observed();
        f(&self.inner.value.borrow())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// Set a new value and notify subscribers.
    ///
    /// Returns `Ok(true)` if the value changed and subscribers were notified,
    /// `Ok(false)` if it was equal to the current value. Fails without
    /// touching the value when the write happens where state changes are
    /// disallowed.
    pub fn try_set(&self, value: T) -> Result<bool, ReactiveError> {
        self.inner.atom.check_write()?;

        if *self.inner.value.borrow() == value {
            return Ok(false);
        }

        *self.inner.value.borrow_mut() = value;
        self.inner.atom.report_changed();
        Ok(true)
    }

    /// Set a new value and notify subscribers.
    ///
    /// A refused write is logged and also fails the enclosing guarded scope.
    pub fn set(&self, value: T) {
        if let Err(err) = self.try_set(value) {
            tracing::warn!(signal = %self.name(), error = %err, "signal write refused");
        }
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.inner.value.borrow());
        self.set(next);
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.atom.observer_count()
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("atom", &self.inner.atom)
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{ReactiveContext, Tracker};
    use std::cell::Cell;

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_notifies_tracker() {
        let signal = Signal::new(0);
        let calls = Rc::new(Cell::new(0));

        let tracker = Tracker::new("reader", {
            let calls = calls.clone();
            move || calls.set(calls.get() + 1)
        });
        tracker.track(|| signal.get());

        assert_eq!(signal.subscriber_count(), 1);
        signal.set(1);
        assert_eq!(calls.get(), 1);
        signal.set(2);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn equal_write_does_not_notify() {
        let signal = Signal::new(String::from("a"));
        let calls = Rc::new(Cell::new(0));

        let tracker = Tracker::new("reader", {
            let calls = calls.clone();
            move || calls.set(calls.get() + 1)
        });
        tracker.track(|| signal.with(|s| s.len()));

        assert_eq!(signal.try_set(String::from("a")), Ok(false));
        assert_eq!(calls.get(), 0);
        assert_eq!(signal.try_set(String::from("b")), Ok(true));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn untracked_read_records_nothing() {
        let signal = Signal::new(3);
        let tracker = Tracker::new("reader", || {});
        tracker.track(|| signal.get_untracked());
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn guarded_write_to_observed_signal_is_refused() {
        let signal = Signal::named("count", 1);
        let tracker = Tracker::new("reader", || {});
        tracker.track(|| signal.get());

        let result = ReactiveContext::without_state_changes(|| signal.try_set(2));
        assert!(result.is_err());
        assert_eq!(signal.get_untracked(), 1);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);
        assert_eq!(signal1.id(), signal2.id());
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(0);
        let s2 = Signal::new(0);
        let s3 = Signal::new(0);

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
        assert_ne!(s1.id(), s3.id());
    }
}
