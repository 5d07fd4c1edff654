//! Tracked storage for props and state.

use std::any::Any;
use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use super::state::RenderState;
use crate::host::Inputs;
use crate::props::{Props, ShallowEq, State};
use crate::reactive::Atom;

/// One observable field.
///
/// Reads are reported to the active tracking scope. A write notifies only
/// when the new value is not shallow-equal to the stored one, and never
/// while its owner is forcing an update. The atom is created on the first
/// read; a field nobody read has nobody to notify.
pub struct TrackedCell<T> {
    name: String,
    value: RefCell<T>,
    atom: OnceCell<Atom>,
    changes: Cell<u64>,
}

impl<T: ShallowEq + Clone> TrackedCell<T> {
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value: RefCell::new(value),
            atom: OnceCell::new(),
            changes: Cell::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read and record the dependency.
    pub fn get(&self) -> T {
        self.atom.get_or_init(|| Atom::new(self.name.clone())).report_observed();
        self.value.borrow().clone()
    }

    pub fn get_untracked(&self) -> T {
        self.value.borrow().clone()
    }

    /// Store `value`, notifying if it changed. Returns whether it notified.
    pub(crate) fn set(&self, value: T, owner: &RenderState) -> bool {
        if owner.is_forcing_update() || self.value.borrow().shallow_eq(&value) {
            *self.value.borrow_mut() = value;
            return false;
        }

        *self.value.borrow_mut() = value;
        self.changes.set(self.changes.get() + 1);
        let _skip = owner.skipping_render();
        if let Some(atom) = self.atom.get() {
            atom.report_changed();
        }
        true
    }

    /// Number of writes that counted as a change.
    pub fn change_count(&self) -> u64 {
        self.changes.get()
    }

    /// Whether a tracking session currently depends on this field.
    pub fn is_observed(&self) -> bool {
        self.atom.get().is_some_and(Atom::is_observed)
    }
}

impl<T: fmt::Debug> fmt::Debug for TrackedCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedCell")
            .field("name", &self.name)
            .field("value", &self.value.borrow())
            .field("changes", &self.changes.get())
            .finish()
    }
}

/// Inputs storage installed by the observer transform.
pub struct ReactiveInputs {
    props: TrackedCell<Props>,
    state: TrackedCell<State>,
    render: Rc<RenderState>,
}

impl ReactiveInputs {
    pub(crate) fn new(
        component: &str,
        props: Props,
        state: State,
        render: Rc<RenderState>,
    ) -> Self {
        Self {
            props: TrackedCell::new(format!("{component}.props"), props),
            state: TrackedCell::new(format!("{component}.state"), state),
            render,
        }
    }

    pub fn props_cell(&self) -> &TrackedCell<Props> {
        &self.props
    }

    pub fn state_cell(&self) -> &TrackedCell<State> {
        &self.state
    }

    pub(crate) fn render_state(&self) -> &Rc<RenderState> {
        &self.render
    }
}

impl Inputs for ReactiveInputs {
    fn props(&self) -> Props {
        self.props.get()
    }

    fn assign_props(&self, props: Props) {
        self.props.set(props, &self.render);
    }

    fn state(&self) -> State {
        self.state.get()
    }

    fn assign_state(&self, state: State) {
        self.state.set(state, &self.render);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for ReactiveInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveInputs")
            .field("props", &self.props)
            .field("state", &self.state)
            .finish()
    }
}
