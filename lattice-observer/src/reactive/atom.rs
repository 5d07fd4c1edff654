//! Atoms
//!
//! An atom is the smallest observable unit: it holds no value, it only knows
//! when it is read and when it changed. Signals and tracked cells own one and
//! report through it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::context::ReactiveContext;
use super::runtime::Runtime;
use crate::error::ReactiveError;

/// Unique identifier for an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(u64);

impl AtomId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for AtomId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "atom#{}", self.0)
    }
}

/// A change-notification handle.
pub struct Atom {
    id: AtomId,
    name: String,
}

impl Atom {
    /// Create a new atom. The name shows up in logs and errors.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: AtomId::next(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> AtomId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a read in the active tracking scope.
    ///
    /// Returns `true` if a scope recorded it.
    pub fn report_observed(&self) -> bool {
        ReactiveContext::track_dependency(self.id)
    }

    /// Check that the atom may change right now.
    ///
    /// Fails when state changes are disallowed and someone observes the atom;
    /// the refusal is also remembered by the enclosing scope.
    pub fn check_write(&self) -> Result<(), ReactiveError> {
        if ReactiveContext::state_changes_allowed() || !self.is_observed() {
            return Ok(());
        }

        ReactiveContext::refuse_state_change(&self.name);
        tracing::error!(
            atom = %self.name,
            "refused state change while state changes are disallowed"
        );
        Err(ReactiveError::StateChangeNotAllowed {
            atom: self.name.clone(),
        })
    }

    /// Notify every subscriber that currently depends on this atom.
    pub fn report_changed(&self) {
        tracing::trace!(atom = %self.name, id = %self.id, "atom changed");
        Runtime::notify(self.id);
    }

    /// Whether any subscriber currently depends on this atom.
    pub fn is_observed(&self) -> bool {
        Runtime::is_observed(self.id)
    }

    /// Number of subscribers currently depending on this atom.
    pub fn observer_count(&self) -> usize {
        Runtime::observer_count(self.id)
    }
}

impl Drop for Atom {
    fn drop(&mut self) {
        Runtime::forget_atom(self.id);
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("observers", &self.observer_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::SubscriberId;

    #[test]
    fn report_observed_only_inside_scope() {
        let atom = Atom::new("flag");
        assert!(!atom.report_observed());

        let ctx = ReactiveContext::enter(SubscriberId::new());
        assert!(atom.report_observed());
        assert_eq!(ctx.take_dependencies().as_slice(), &[atom.id()]);
    }

    #[test]
    fn unobserved_atom_may_change_anywhere() {
        let atom = Atom::new("local");
        let result = ReactiveContext::without_state_changes(|| atom.check_write());
        assert_eq!(result, Ok(Ok(())));
    }

    #[test]
    fn observed_atom_refuses_change_in_guarded_scope() {
        let atom = Atom::new("shared");
        let subscriber = SubscriberId::new();
        Runtime::set_dependencies(subscriber, [atom.id()]);

        let result = ReactiveContext::without_state_changes(|| atom.check_write().is_err());
        assert_eq!(
            result,
            Err(ReactiveError::StateChangeNotAllowed { atom: "shared".into() })
        );

        assert_eq!(atom.check_write(), Ok(()));
        Runtime::clear_dependencies(subscriber);
    }

    #[test]
    fn dropping_atom_removes_edges() {
        let atom = Atom::new("short-lived");
        let id = atom.id();
        let subscriber = SubscriberId::new();
        Runtime::set_dependencies(subscriber, [id]);
        assert_eq!(Runtime::dependency_count(subscriber), 1);

        drop(atom);
        assert!(!Runtime::is_observed(id));
        assert_eq!(Runtime::dependency_count(subscriber), 0);
    }
}
