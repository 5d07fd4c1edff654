//! Observer Components
//!
//! Connects component renders to the reactive runtime.
//!
//! # How It Works
//!
//! [`observer`] turns a component type into one whose instances:
//!
//! 1. keep props and state in [`TrackedCell`]s, so reading them during render
//!    is a tracked read and a changed write notifies;
//! 2. run every render inside a [`Tracker`](crate::reactive::Tracker) with
//!    state changes disallowed, replacing the dependency set each time;
//! 3. ask the host for a forced update when a dependency changes. Requests
//!    coalesce until the next render starts, are skipped while the host is
//!    already re-rendering because of an input write, and stop for good once
//!    the instance unmounts or a render fails;
//! 4. skip host-driven updates whose props are shallow-equal and whose state
//!    is the same record.
//!
//! [`Observer`] does the same for a single render callback.

mod cell;
mod component;
mod standalone;
mod state;
mod transform;

pub use cell::{ReactiveInputs, TrackedCell};
pub use standalone::Observer;
pub use state::Phase;
pub use transform::{dispose_on_unmount, observer, observer_with, render_count, render_phase};
