//! Component contract.
//!
//! A [`ComponentType`] is the component construct: a named factory that
//! produces one [`Component`] per mounted instance, together with the
//! [`Inputs`] storage its props and state live in. The host owns the
//! instance and drives it through the lifecycle methods below.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::instance::This;
use super::node::{Element, Node};
use crate::error::RenderError;
use crate::props::{Props, State};

/// Instance behaviour of a class-style component.
///
/// Only `render` is required. Every lifecycle method receives the instance
/// handle so it can read inputs and request updates.
pub trait Component: 'static {
    /// Produce the element tree for the current props and state.
    fn render(&self, this: &This<'_>) -> Result<Node, RenderError>;

    /// State assigned before the first render.
    fn initial_state(&self, _props: &Props) -> State {
        State::new()
    }

    /// Called once after the first render has been committed.
    fn component_did_mount(&self, _this: &This<'_>) {}

    /// Called after every committed re-render.
    fn component_did_update(&self, _this: &This<'_>, _prev_props: &Props, _prev_state: &State) {}

    /// Called once before the instance is removed.
    fn component_will_unmount(&self, _this: &This<'_>) {}

    /// Decide whether a prop/state driven update re-renders.
    ///
    /// `None` means the component does not define a predicate and the host
    /// default for its base applies.
    fn should_component_update(
        &self,
        _this: &This<'_>,
        _next_props: &Props,
        _next_state: &State,
    ) -> Option<bool> {
        None
    }

    /// Called when an observer component is about to re-render because
    /// something it read changed. Plain components never receive it.
    fn component_will_react(&self) {}
}

/// Storage for an instance's externally-assigned inputs.
///
/// The host reads and assigns props and state only through this trait, so a
/// component type can install storage that reacts to reads and writes.
pub trait Inputs: 'static {
    fn props(&self) -> Props;
    fn assign_props(&self, props: Props);
    fn state(&self) -> State;
    fn assign_state(&self, state: State);
    fn as_any(&self) -> &dyn Any;
}

/// Plain field storage.
#[derive(Debug, Default)]
pub struct PlainInputs {
    props: RefCell<Props>,
    state: RefCell<State>,
}

impl PlainInputs {
    pub fn new(props: Props, state: State) -> Self {
        Self {
            props: RefCell::new(props),
            state: RefCell::new(state),
        }
    }
}

impl Inputs for PlainInputs {
    fn props(&self) -> Props {
        self.props.borrow().clone()
    }

    fn assign_props(&self, props: Props) {
        *self.props.borrow_mut() = props;
    }

    fn state(&self) -> State {
        self.state.borrow().clone()
    }

    fn assign_state(&self, state: State) {
        *self.state.borrow_mut() = state;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A freshly constructed instance and its input storage.
pub struct Constructed {
    pub component: Box<dyn Component>,
    pub inputs: Rc<dyn Inputs>,
}

impl Constructed {
    /// Construct with plain storage and the component's initial state.
    pub fn plain<C: Component>(component: C, props: &Props) -> Self {
        let state = component.initial_state(props);
        Self {
            component: Box::new(component),
            inputs: Rc::new(PlainInputs::new(props.clone(), state)),
        }
    }
}

/// Render function of a function component.
pub type FunctionRender = Rc<dyn Fn(&Props) -> Result<Node, RenderError>>;

/// Builds one instance from the initial props.
pub type Constructor = Rc<dyn Fn(&Props) -> Constructed>;

/// The base a class component extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
    /// Re-renders on every update unless it defines a predicate.
    Component,
    /// Skips updates whose props and state are shallow-equal.
    PureComponent,
}

/// What kind of construct a component type is.
#[derive(Clone)]
pub enum Kind {
    Class(Base),
    Function(FunctionRender),
    /// Forwards its props (including any `ref` entry) to an inner type.
    ForwardRef(ComponentType),
    /// Skips updates with shallow-equal props, wrapping an inner type.
    Memo(ComponentType),
}

impl fmt::Debug for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(base) => f.debug_tuple("Class").field(base).finish(),
            Self::Function(_) => f.write_str("Function"),
            Self::ForwardRef(inner) => f.debug_tuple("ForwardRef").field(&inner.name()).finish(),
            Self::Memo(inner) => f.debug_tuple("Memo").field(&inner.name()).finish(),
        }
    }
}

struct TypeInner {
    id: u64,
    name: String,
    kind: Kind,
    construct: Constructor,
    observer: bool,
}

/// A component construct. Cloning shares the same type; identity decides
/// whether the host updates an instance in place or remounts it.
#[derive(Clone)]
pub struct ComponentType(Rc<TypeInner>);

impl ComponentType {
    /// A class component extending the plain base.
    pub fn class<C, F>(name: impl Into<String>, ctor: F) -> Self
    where
        C: Component,
        F: Fn(&Props) -> C + 'static,
    {
        Self::class_with_base(name, Base::Component, ctor)
    }

    /// A class component extending the pure base.
    pub fn pure<C, F>(name: impl Into<String>, ctor: F) -> Self
    where
        C: Component,
        F: Fn(&Props) -> C + 'static,
    {
        Self::class_with_base(name, Base::PureComponent, ctor)
    }

    fn class_with_base<C, F>(name: impl Into<String>, base: Base, ctor: F) -> Self
    where
        C: Component,
        F: Fn(&Props) -> C + 'static,
    {
        let construct: Constructor =
            Rc::new(move |props: &Props| Constructed::plain(ctor(props), props));
        Self::from_parts(name, Kind::Class(base), construct, false)
    }

    /// A function component: render is a pure function of props.
    pub fn function<F>(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&Props) -> Result<Node, RenderError> + 'static,
    {
        let render: FunctionRender = Rc::new(render);
        let construct: Constructor = {
            let render = render.clone();
            Rc::new(move |props: &Props| {
                Constructed::plain(
                    FunctionComponent {
                        render: render.clone(),
                    },
                    props,
                )
            })
        };
        Self::from_parts(name, Kind::Function(render), construct, false)
    }

    /// A ref-forwarding wrapper around `inner`.
    pub fn forward_ref(name: impl Into<String>, inner: ComponentType) -> Self {
        let construct = inner.0.construct.clone();
        let observer = inner.is_observer();
        Self::from_parts(name, Kind::ForwardRef(inner), construct, observer)
    }

    /// Wrap `inner` so shallow-equal props skip the update.
    pub fn memo(inner: ComponentType) -> Self {
        let name = inner.name().to_owned();
        let construct = inner.0.construct.clone();
        Self::from_parts(name, Kind::Memo(inner), construct, false)
    }

    pub(crate) fn from_parts(
        name: impl Into<String>,
        kind: Kind,
        construct: Constructor,
        observer: bool,
    ) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(Rc::new(TypeInner {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            kind,
            construct,
            observer,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> &Kind {
        &self.0.kind
    }

    /// Whether the observer transform produced this type.
    pub fn is_observer(&self) -> bool {
        self.0.observer
    }

    /// The update-skipping behaviour the host applies when the instance
    /// defines no predicate of its own.
    pub fn base(&self) -> Base {
        match &self.0.kind {
            Kind::Class(base) => *base,
            Kind::Function(_) => Base::Component,
            Kind::ForwardRef(inner) => inner.base(),
            Kind::Memo(_) => Base::PureComponent,
        }
    }

    /// Build an instance for the given initial props.
    pub fn construct(&self, props: &Props) -> Constructed {
        (self.0.construct)(props)
    }

    /// An element rendering this type with `props`.
    pub fn element(&self, props: Props) -> Element {
        Element::new(self.clone(), props)
    }

    /// Whether both handles are the same type.
    pub fn same(a: &ComponentType, b: &ComponentType) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    pub(crate) fn id(&self) -> u64 {
        self.0.id
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("kind", &self.0.kind)
            .field("observer", &self.0.observer)
            .finish()
    }
}

/// Instance behaviour of a function component.
pub(crate) struct FunctionComponent {
    render: FunctionRender,
}

impl Component for FunctionComponent {
    fn render(&self, this: &This<'_>) -> Result<Node, RenderError> {
        (self.render)(&this.props())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Static;

    impl Component for Static {
        fn render(&self, _this: &This<'_>) -> Result<Node, RenderError> {
            Ok(Node::text("static"))
        }

        fn initial_state(&self, props: &Props) -> State {
            State::new().with("seed", props.get_int("seed").unwrap_or(0))
        }
    }

    #[test]
    fn class_construct_assigns_initial_inputs() {
        let ty = ComponentType::class("Static", |_| Static);
        let constructed = ty.construct(&Props::new().with("seed", 7));

        assert_eq!(constructed.inputs.props().get_int("seed"), Some(7));
        assert_eq!(constructed.inputs.state().get_int("seed"), Some(7));
        assert!(constructed.inputs.as_any().is::<PlainInputs>());
    }

    #[test]
    fn type_identity_survives_clones() {
        let a = ComponentType::function("A", |_| Ok(Node::Empty));
        let b = ComponentType::function("A", |_| Ok(Node::Empty));

        assert!(ComponentType::same(&a, &a.clone()));
        assert!(!ComponentType::same(&a, &b));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn base_follows_kind() {
        let plain = ComponentType::class("Plain", |_| Static);
        let pure = ComponentType::pure("Pure", |_| Static);
        let func = ComponentType::function("Func", |_| Ok(Node::Empty));

        assert_eq!(plain.base(), Base::Component);
        assert_eq!(pure.base(), Base::PureComponent);
        assert_eq!(func.base(), Base::Component);
        assert_eq!(ComponentType::memo(func.clone()).base(), Base::PureComponent);
        assert_eq!(ComponentType::forward_ref("Fwd", pure).base(), Base::PureComponent);
    }

    #[test]
    fn memo_keeps_the_inner_name() {
        let inner = ComponentType::function("Card", |_| Ok(Node::Empty));
        let memo = ComponentType::memo(inner);
        assert_eq!(memo.name(), "Card");
        assert!(matches!(memo.kind(), Kind::Memo(_)));
    }
}
