//! Lattice Observer
//!
//! Reactive rendering for Lattice components: a component wrapped with
//! [`observer`] re-renders exactly when observable state it read during its
//! last render changes, without declaring dependencies by hand.
//!
//! # Architecture
//!
//! - `reactive`: dependency tracking (atoms, signals, tracking sessions,
//!   batching, the state-change guard)
//! - `props`: props/state records and the shallow-equality contract
//! - `host`: the component host (types, lifecycle, update queue, root)
//! - `observer`: the glue: tracked inputs, the reactive render wrapper and
//!   lifecycle adapter, the `observer` transform, the `Observer` component
//! - `instrument`: render/destroy/error/warning streams for tooling
//! - `config`: static rendering and devtools switches
//!
//! # Example
//!
//! ```rust
//! use lattice_observer::{observer, ComponentType, Node, Props, Root, Signal};
//!
//! let todos = Signal::new(vec!["write docs".to_string()]);
//!
//! let list = {
//!     let todos = todos.clone();
//!     observer(&ComponentType::function("TodoList", move |_| {
//!         let items = todos.get().into_iter().map(|t| Node::tag("li", [Node::text(t)]));
//!         Ok(Node::tag("ul", items))
//!     }))
//!     .unwrap()
//! };
//!
//! let root = Root::new();
//! root.render(list.element(Props::new())).unwrap();
//! assert_eq!(root.to_markup(), "<ul><li>write docs</li></ul>");
//!
//! // Only the list re-renders, on the next flush.
//! root.act(|| {
//!     todos.update(|t| {
//!         let mut next = t.clone();
//!         next.push("ship".to_string());
//!         next
//!     })
//! })
//! .unwrap();
//! assert_eq!(root.to_markup(), "<ul><li>write docs</li><li>ship</li></ul>");
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod instrument;
pub mod observer;
pub mod props;
pub mod reactive;

pub use config::{is_using_static_rendering, use_static_rendering, ObserverConfig, Settings};
pub use error::{HostError, ObserverError, ReactiveError, RenderError};
pub use host::{render_to_string, Component, ComponentType, Element, Node, Root, This};
pub use instrument::{
    ComponentInfo, ErrorEvent, Instrumentation, ReportEvent, Subscription, Warning,
};
pub use observer::{dispose_on_unmount, observer, observer_with, Observer};
pub use props::{shallow_equal, Props, State, Value};
pub use reactive::{batch, untracked, Signal, Tracker};
