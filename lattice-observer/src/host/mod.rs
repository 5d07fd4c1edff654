//! Host Framework
//!
//! A small component host: component types, element trees, mounted
//! instances with a lifecycle, and a root that reconciles and commits.
//!
//! The observer layer only relies on the contract exposed here:
//!
//! - instances are constructed from a [`ComponentType`] and keep their props
//!   and state in an [`Inputs`] storage the type chooses;
//! - `render` runs inside a pass, lifecycle callbacks run after commit;
//! - [`Updater::force_update`] queues a re-render that skips
//!   `should_component_update` and never renders synchronously;
//! - [`Root::flush`] drains the queue, giving up after too many rounds.

mod component;
mod instance;
mod node;
mod queue;
mod renderer;

pub use component::{
    Base, Component, ComponentType, Constructed, Constructor, FunctionRender, Inputs, Kind,
    PlainInputs,
};
pub use instance::{InstanceId, This};
pub use node::{Element, HostNodeId, Node};
pub(crate) use component::FunctionComponent;
pub use queue::Updater;
pub use renderer::{render_to_string, Root};
