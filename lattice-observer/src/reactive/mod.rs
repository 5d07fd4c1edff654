//! Reactive Primitives
//!
//! This module implements the dependency-tracking primitive the observer
//! layer is built on: atoms, signals, and trackers.
//!
//! # Concepts
//!
//! ## Atoms
//!
//! An [`Atom`] is a change-notification handle. It reports reads to the
//! active tracking scope and reports changes to the runtime.
//!
//! ## Signals
//!
//! A [`Signal`] is a container for mutable state built on an atom. Reading
//! it inside a tracking scope records a dependency; writing a different value
//! notifies every computation that read it during its last run.
//!
//! ## Trackers
//!
//! A [`Tracker`] is one tracking session: it runs a function, records the
//! atoms read, and calls back when any of them changes. Observer components
//! run each render inside one.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When an atom is read, we check if there is an active
//! tracking context and, if so, register the dependency.
//!
//! A second thread-local stack guards against state changes: renders run
//! with changes to observed state disallowed, so a render that mutates what
//! others depend on fails instead of corrupting state.

mod atom;
mod context;
mod runtime;
mod signal;
mod subscriber;
mod tracker;

pub use atom::{Atom, AtomId};
pub use context::{Dependencies, ReactiveContext};
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use signal::Signal;
pub use subscriber::SubscriberId;
pub use tracker::Tracker;

/// Run `f` as one transaction; see [`Runtime::batch`].
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    Runtime::batch(f)
}

/// Run `f` without recording any of its reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    ReactiveContext::untracked(f)
}
