//! Mounted instances and the handle components see.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::component::{Base, Component, ComponentType, Inputs};
use super::node::HostNodeId;
use super::queue::{UpdateQueue, Updater};
use super::renderer::Mounted;
use crate::error::HostError;
use crate::props::{shallow_equal, Props, State};

/// Identity of one mounted component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InstanceId(u64);

impl InstanceId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_raw_for_tests(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) struct Instance {
    id: InstanceId,
    ty: ComponentType,
    key: Option<String>,
    component: Box<dyn Component>,
    inputs: Rc<dyn Inputs>,
    updater: Updater,
    pub(crate) rendered: RefCell<Mounted>,
    /// Set once the first render is committed, cleared on unmount.
    mounted: Cell<bool>,
}

impl Instance {
    pub(crate) fn new(
        ty: ComponentType,
        key: Option<String>,
        component: Box<dyn Component>,
        inputs: Rc<dyn Inputs>,
        queue: &Rc<UpdateQueue>,
    ) -> Self {
        let id = InstanceId::next();
        Self {
            id,
            ty,
            key,
            component,
            inputs,
            updater: Updater::new(id, queue),
            rendered: RefCell::new(Mounted::Empty),
            mounted: Cell::new(false),
        }
    }

    pub(crate) fn id(&self) -> InstanceId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        self.ty.name()
    }

    pub(crate) fn component_type(&self) -> &ComponentType {
        &self.ty
    }

    pub(crate) fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub(crate) fn component(&self) -> &dyn Component {
        self.component.as_ref()
    }

    pub(crate) fn inputs(&self) -> &dyn Inputs {
        self.inputs.as_ref()
    }

    pub(crate) fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    pub(crate) fn set_mounted(&self, mounted: bool) {
        self.mounted.set(mounted);
    }

    pub(crate) fn updater(&self) -> &Updater {
        &self.updater
    }

    /// Ask the component, falling back to its base's default.
    pub(crate) fn should_update(&self, next_props: &Props, next_state: &State) -> bool {
        let this = This::new(self);
        match self.component.should_component_update(&this, next_props, next_state) {
            Some(decision) => decision,
            None => match self.ty.base() {
                Base::Component => true,
                Base::PureComponent => {
                    !(shallow_equal(&self.inputs.props(), next_props)
                        && shallow_equal(&self.inputs.state(), next_state))
                }
            },
        }
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.updater.forget();
    }
}

/// The instance handle passed to render and lifecycle methods.
#[derive(Clone, Copy)]
pub struct This<'a> {
    instance: &'a Instance,
}

impl<'a> This<'a> {
    pub(crate) fn new(instance: &'a Instance) -> Self {
        Self { instance }
    }

    pub fn id(&self) -> InstanceId {
        self.instance.id()
    }

    /// Display name of the component type.
    pub fn name(&self) -> &'a str {
        self.instance.name()
    }

    pub fn component_type(&self) -> &'a ComponentType {
        self.instance.component_type()
    }

    /// Current props. Reads are tracked when the storage supports it.
    pub fn props(&self) -> Props {
        self.instance.inputs().props()
    }

    /// Current state. Reads are tracked when the storage supports it.
    pub fn state(&self) -> State {
        self.instance.inputs().state()
    }

    /// Merge `partial` into the state on the next flush.
    pub fn set_state(&self, partial: Props) -> Result<(), HostError> {
        self.instance.updater().set_state(partial)
    }

    /// Re-render on the next flush, skipping `should_component_update`.
    pub fn force_update(&self) -> Result<(), HostError> {
        self.instance.updater().force_update()
    }

    /// A detached handle for requesting updates later.
    pub fn updater(&self) -> Updater {
        self.instance.updater().clone()
    }

    /// Whether the first render has been committed and the instance has
    /// not been unmounted since.
    pub fn is_mounted(&self) -> bool {
        self.instance.is_mounted()
    }

    /// First host node this instance rendered, if any.
    pub fn host_node(&self) -> Option<HostNodeId> {
        self.instance.rendered.try_borrow().ok()?.first_host_node()
    }

    pub(crate) fn inputs(&self) -> &'a dyn Inputs {
        self.instance.inputs()
    }
}

impl fmt::Debug for This<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("This")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("mounted", &self.is_mounted())
            .finish()
    }
}
