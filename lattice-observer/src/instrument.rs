//! Instrumentation Channel
//!
//! Publish/subscribe streams for external tooling:
//!
//! - **reports**: a `render` event after each tracked render is committed
//!   and a `destroy` event on unmount. Only emitted while devtools are
//!   enabled on the owning [`ObserverConfig`](crate::ObserverConfig).
//! - **errors**: every render failure caught by an observer component.
//! - **warnings**: non-fatal misuse, also logged through `tracing`.
//!
//! Listeners run synchronously on the emitting thread. A panicking listener
//! is logged and skipped; it never unwinds into the render that emitted.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::error::RenderError;
use crate::host::{HostNodeId, InstanceId};

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// A list of listeners for one event type.
pub struct EventEmitter<E> {
    listeners: Mutex<Vec<(u64, Listener<E>)>>,
    next_id: AtomicU64,
}

impl<E: 'static> EventEmitter<E> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Add a listener. It stays subscribed until the returned handle drops.
    pub fn subscribe<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));

        let emitter: Weak<Self> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(emitter) = emitter.upgrade() {
                emitter.listeners.lock().retain(|(other, _)| *other != id);
            }
        })
    }

    /// Call every listener with `event`.
    pub fn emit(&self, event: &E) {
        // Snapshot so listeners may subscribe or unsubscribe while running.
        let listeners: Vec<Listener<E>> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::error!("instrumentation listener panicked");
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.lock().is_empty()
    }
}

impl<E: 'static> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.lock().len())
            .finish()
    }
}

/// Keeps a listener subscribed. Dropping it unsubscribes.
#[must_use = "dropping a subscription unsubscribes the listener"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(unsubscribe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Unsubscribe now.
    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }

    /// Keep the listener for the lifetime of the emitter.
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Identity of the component an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentInfo {
    pub id: InstanceId,
    pub name: String,
}

/// Render/destroy reports for devtools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReportEvent {
    Render {
        component: ComponentInfo,
        node: Option<HostNodeId>,
        /// Time spent inside the tracked render.
        render_time_us: u64,
        /// Time from render start until the commit callback.
        total_time_us: u64,
    },
    Destroy {
        component: ComponentInfo,
        node: Option<HostNodeId>,
    },
}

impl ReportEvent {
    pub fn component(&self) -> &ComponentInfo {
        match self {
            Self::Render { component, .. } | Self::Destroy { component, .. } => component,
        }
    }
}

/// A render failure caught by an observer component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub component: ComponentInfo,
    pub error: RenderError,
}

/// Non-fatal misuse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The type was already an observer; it was returned unchanged.
    AlreadyObserver { component: String },
    /// The type extends the pure base, whose update skipping conflicts with
    /// reactive re-rendering.
    PureComponentBase { component: String },
    /// The type defines its own update predicate, which can mask updates.
    CustomShouldUpdate { component: String },
    /// An update reached a component while static rendering is enabled.
    StaticRenderingUpdate { component: String },
    /// `Observer` received both a `children` and a `render` function.
    ObserverChildrenAndRender,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyObserver { component } => {
                write!(f, "`{component}` is already an observer component")
            }
            Self::PureComponentBase { component } => write!(
                f,
                "`{component}` extends the pure component base; observer manages updates itself"
            ),
            Self::CustomShouldUpdate { component } => write!(
                f,
                "`{component}` defines should_component_update; reactive updates may be suppressed"
            ),
            Self::StaticRenderingUpdate { component } => write!(
                f,
                "`{component}` received an update while static rendering is enabled"
            ),
            Self::ObserverChildrenAndRender => {
                f.write_str("Observer received both `children` and `render`; using `children`")
            }
        }
    }
}

/// The three streams plus the component-by-node registry.
///
/// Cheap to clone; clones share the same listeners.
#[derive(Clone, Default)]
pub struct Instrumentation {
    inner: Arc<InstrumentationInner>,
}

#[derive(Default)]
struct InstrumentationInner {
    reports: Arc<EventEmitter<ReportEvent>>,
    errors: Arc<EventEmitter<ErrorEvent>>,
    warnings: Arc<EventEmitter<Warning>>,
    nodes: RwLock<HashMap<HostNodeId, ComponentInfo>>,
}

impl Instrumentation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for render and destroy reports.
    pub fn on_report<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ReportEvent) + Send + Sync + 'static,
    {
        self.inner.reports.subscribe(listener)
    }

    /// Listen for render failures.
    pub fn on_error<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ErrorEvent) + Send + Sync + 'static,
    {
        self.inner.errors.subscribe(listener)
    }

    /// Listen for misuse warnings.
    pub fn on_warning<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Warning) + Send + Sync + 'static,
    {
        self.inner.warnings.subscribe(listener)
    }

    /// The component that last rendered `node`, while devtools are enabled.
    pub fn component_for_node(&self, node: HostNodeId) -> Option<ComponentInfo> {
        self.inner.nodes.read().get(&node).cloned()
    }

    /// Number of host nodes currently associated with a component.
    pub fn tracked_nodes(&self) -> usize {
        self.inner.nodes.read().len()
    }

    pub(crate) fn report_render(
        &self,
        component: ComponentInfo,
        node: Option<HostNodeId>,
        render_time_us: u64,
        total_time_us: u64,
    ) {
        if let Some(node) = node {
            self.inner.nodes.write().insert(node, component.clone());
        }
        self.inner.reports.emit(&ReportEvent::Render {
            component,
            node,
            render_time_us,
            total_time_us,
        });
    }

    pub(crate) fn report_destroy(&self, component: ComponentInfo, node: Option<HostNodeId>) {
        self.inner
            .nodes
            .write()
            .retain(|_, owner| owner.id != component.id);
        self.inner.reports.emit(&ReportEvent::Destroy { component, node });
    }

    pub(crate) fn report_error(&self, component: ComponentInfo, error: &RenderError) {
        tracing::error!(
            component = %component.name,
            instance = %component.id,
            %error,
            "render failed"
        );
        self.inner.errors.emit(&ErrorEvent {
            component,
            error: error.clone(),
        });
    }

    pub(crate) fn warn(&self, warning: Warning) {
        tracing::warn!("{warning}");
        self.inner.warnings.emit(&warning);
    }
}

impl fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instrumentation")
            .field("reports", &self.inner.reports)
            .field("errors", &self.inner.errors)
            .field("warnings", &self.inner.warnings)
            .field("tracked_nodes", &self.tracked_nodes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn dropping_a_subscription_unsubscribes() {
        let emitter = Arc::new(EventEmitter::<u32>::new());
        let seen = Arc::new(AtomicUsize::new(0));

        let sub = {
            let seen = seen.clone();
            emitter.subscribe(move |value| {
                seen.fetch_add(*value as usize, Ordering::SeqCst);
            })
        };
        emitter.emit(&2);
        drop(sub);
        emitter.emit(&5);

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn detached_subscription_stays() {
        let emitter = Arc::new(EventEmitter::<()>::new());
        emitter.subscribe(|_| {}).detach();
        assert_eq!(emitter.listener_count(), 1);
    }

    #[test]
    fn panicking_listener_does_not_stop_others() {
        let emitter = Arc::new(EventEmitter::<()>::new());
        let seen = Arc::new(AtomicUsize::new(0));

        let _bad = emitter.subscribe(|_| panic!("listener failure"));
        let _good = {
            let seen = seen.clone();
            emitter.subscribe(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            })
        };
        emitter.emit(&());

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn render_reports_register_nodes_until_destroy() {
        let instrumentation = Instrumentation::new();
        let info = ComponentInfo {
            id: InstanceId::from_raw_for_tests(1),
            name: "Card".into(),
        };
        let node = HostNodeId::from_raw_for_tests(10);

        instrumentation.report_render(info.clone(), Some(node), 3, 4);
        assert_eq!(instrumentation.component_for_node(node), Some(info.clone()));

        instrumentation.report_destroy(info, Some(node));
        assert_eq!(instrumentation.component_for_node(node), None);
    }

    #[test]
    fn report_events_serialize_with_tag() {
        let event = ReportEvent::Destroy {
            component: ComponentInfo {
                id: InstanceId::from_raw_for_tests(7),
                name: "List".into(),
            },
            node: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "destroy");
        assert_eq!(json["component"]["name"], "List");
        assert_eq!(json["component"]["id"], 7);
    }

    #[test]
    fn warnings_reach_listeners() {
        let instrumentation = Instrumentation::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let seen = seen.clone();
            instrumentation.on_warning(move |warning| seen.lock().push(warning.clone()))
        };

        instrumentation.warn(Warning::ObserverChildrenAndRender);

        assert_eq!(*seen.lock(), vec![Warning::ObserverChildrenAndRender]);
    }
}
