//! Reconciliation, commit and the render root.
//!
//! Rendering happens in passes. A pass renders and reconciles a subtree,
//! recording mount and update callbacks as it goes; the callbacks only run
//! once the whole pass succeeded, children before parents. Children are
//! matched by position, then by component type identity and key.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::component::ComponentType;
use super::instance::{Instance, This};
use super::node::{HostNodeId, Node};
use super::queue::{PendingUpdate, UpdateQueue};
use crate::error::HostError;
use crate::props::{Props, State};

/// The mounted counterpart of a [`Node`].
#[derive(Default)]
pub(crate) enum Mounted {
    #[default]
    Empty,
    Text {
        id: HostNodeId,
        text: String,
    },
    Tag {
        id: HostNodeId,
        name: String,
        children: Vec<Mounted>,
    },
    Fragment(Vec<Mounted>),
    Composite(Rc<Instance>),
}

impl Mounted {
    pub(crate) fn first_host_node(&self) -> Option<HostNodeId> {
        match self {
            Self::Empty => None,
            Self::Text { id, .. } | Self::Tag { id, .. } => Some(*id),
            Self::Fragment(children) => children.iter().find_map(Self::first_host_node),
            Self::Composite(instance) => instance.rendered.try_borrow().ok()?.first_host_node(),
        }
    }

    fn write_markup(&self, out: &mut String) {
        match self {
            Self::Empty => {}
            Self::Text { text, .. } => escape_into(text, out),
            Self::Tag { name, children, .. } => {
                out.push('<');
                out.push_str(name);
                out.push('>');
                for child in children {
                    child.write_markup(out);
                }
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            Self::Fragment(children) => {
                for child in children {
                    child.write_markup(out);
                }
            }
            Self::Composite(instance) => instance.rendered.borrow().write_markup(out),
        }
    }
}

fn escape_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            _ => out.push(ch),
        }
    }
}

enum Commit {
    Mount(Rc<Instance>),
    Update {
        instance: Rc<Instance>,
        prev_props: Props,
        prev_state: State,
    },
}

/// One render pass over a subtree.
struct Pass<'q> {
    queue: &'q Rc<UpdateQueue>,
    commits: Vec<Commit>,
}

impl<'q> Pass<'q> {
    fn new(queue: &'q Rc<UpdateQueue>) -> Self {
        Self {
            queue,
            commits: Vec::new(),
        }
    }

    fn mount(&mut self, node: Node) -> Result<Mounted, HostError> {
        Ok(match node {
            Node::Empty => Mounted::Empty,
            Node::Text(text) => Mounted::Text {
                id: HostNodeId::next(),
                text,
            },
            Node::Tag { name, children } => Mounted::Tag {
                id: HostNodeId::next(),
                name,
                children: self.mount_all(children)?,
            },
            Node::Fragment(children) => Mounted::Fragment(self.mount_all(children)?),
            Node::Component(element) => {
                let (ty, props, key) = element.into_parts();
                Mounted::Composite(self.mount_instance(ty, props, key)?)
            }
        })
    }

    fn mount_all(&mut self, nodes: Vec<Node>) -> Result<Vec<Mounted>, HostError> {
        nodes.into_iter().map(|node| self.mount(node)).collect()
    }

    fn mount_instance(
        &mut self,
        ty: ComponentType,
        props: Props,
        key: Option<String>,
    ) -> Result<Rc<Instance>, HostError> {
        let constructed = ty.construct(&props);
        let instance = Rc::new(Instance::new(
            ty,
            key,
            constructed.component,
            constructed.inputs,
            self.queue,
        ));
        self.queue.register(&instance);
        tracing::trace!(component = instance.name(), instance = %instance.id(), "mounting");

        let output = render(&instance)?;
        let child = self.mount(output)?;
        *instance.rendered.borrow_mut() = child;
        self.commits.push(Commit::Mount(instance.clone()));
        Ok(instance)
    }

    /// Apply new inputs to a mounted instance and re-render if it agrees.
    fn update_instance(
        &mut self,
        instance: &Rc<Instance>,
        next_props: Option<Props>,
        pending: PendingUpdate,
    ) -> Result<(), HostError> {
        let inputs = instance.inputs();
        let prev_props = inputs.props();
        let prev_state = inputs.state();
        let next_props = next_props.unwrap_or_else(|| prev_props.clone());
        let next_state = match pending.partial_state {
            Some(partial) => prev_state.merge(&partial),
            None => prev_state.clone(),
        };

        let proceed = pending.force || instance.should_update(&next_props, &next_state);
        inputs.assign_props(next_props);
        inputs.assign_state(next_state);
        if !proceed {
            tracing::trace!(
                component = instance.name(),
                instance = %instance.id(),
                "update skipped"
            );
            return Ok(());
        }

        let output = render(instance)?;
        {
            let mut rendered = instance.rendered.borrow_mut();
            self.reconcile(&mut rendered, output)?;
        }
        self.commits.push(Commit::Update {
            instance: instance.clone(),
            prev_props,
            prev_state,
        });
        Ok(())
    }

    fn reconcile(&mut self, slot: &mut Mounted, node: Node) -> Result<(), HostError> {
        match (slot, node) {
            (Mounted::Composite(instance), Node::Component(element))
                if ComponentType::same(instance.component_type(), element.component_type())
                    && instance.key() == element.key() =>
            {
                let instance = instance.clone();
                let (_, props, _) = element.into_parts();
                let pending = self.queue.take(instance.id()).unwrap_or_default();
                self.update_instance(&instance, Some(props), pending)
            }
            (Mounted::Tag { name, children, .. }, Node::Tag { name: next_name, children: next })
                if *name == next_name =>
            {
                self.reconcile_children(children, next)
            }
            (Mounted::Fragment(children), Node::Fragment(next)) => {
                self.reconcile_children(children, next)
            }
            (Mounted::Text { text, .. }, Node::Text(next)) => {
                *text = next;
                Ok(())
            }
            (Mounted::Empty, Node::Empty) => Ok(()),
            (slot, node) => {
                let fresh = self.mount(node)?;
                unmount(std::mem::replace(slot, fresh));
                Ok(())
            }
        }
    }

    fn reconcile_children(
        &mut self,
        children: &mut Vec<Mounted>,
        next: Vec<Node>,
    ) -> Result<(), HostError> {
        let next_len = next.len();
        for (index, node) in next.into_iter().enumerate() {
            match children.get_mut(index) {
                Some(slot) => self.reconcile(slot, node)?,
                None => {
                    let mounted = self.mount(node)?;
                    children.push(mounted);
                }
            }
        }
        if children.len() > next_len {
            for stale in children.drain(next_len..) {
                unmount(stale);
            }
        }
        Ok(())
    }

    /// Run the recorded lifecycle callbacks.
    fn commit(self) {
        for commit in self.commits {
            match commit {
                Commit::Mount(instance) => {
                    instance.set_mounted(true);
                    instance.component().component_did_mount(&This::new(&instance));
                }
                Commit::Update {
                    instance,
                    prev_props,
                    prev_state,
                } => {
                    if instance.is_mounted() {
                        instance
                            .component()
                            .component_did_update(&This::new(&instance), &prev_props, &prev_state);
                    }
                }
            }
        }
    }
}

fn render(instance: &Instance) -> Result<Node, HostError> {
    instance
        .component()
        .render(&This::new(instance))
        .map_err(|source| HostError::Render {
            component: instance.name().to_owned(),
            source,
        })
}

fn unmount(mounted: Mounted) {
    match mounted {
        Mounted::Composite(instance) => unmount_instance(&instance),
        Mounted::Tag { children, .. } | Mounted::Fragment(children) => {
            children.into_iter().for_each(unmount)
        }
        Mounted::Empty | Mounted::Text { .. } => {}
    }
}

fn unmount_instance(instance: &Rc<Instance>) {
    if instance.is_mounted() {
        tracing::trace!(component = instance.name(), instance = %instance.id(), "unmounting");
        instance.component().component_will_unmount(&This::new(instance));
    }
    instance.set_mounted(false);
    let child = std::mem::take(&mut *instance.rendered.borrow_mut());
    unmount(child);
    instance.updater().forget();
}

/// Resets the re-entrancy flag even if a callback panics.
struct FlushGuard<'a>(&'a Cell<bool>);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A render root: owns one mounted tree and its update queue.
pub struct Root {
    queue: Rc<UpdateQueue>,
    tree: RefCell<Mounted>,
    flushing: Cell<bool>,
    max_update_depth: usize,
}

impl Root {
    /// Rounds of cascading updates a single flush may run.
    pub const DEFAULT_MAX_UPDATE_DEPTH: usize = 50;

    pub fn new() -> Self {
        Self::with_max_update_depth(Self::DEFAULT_MAX_UPDATE_DEPTH)
    }

    pub fn with_max_update_depth(limit: usize) -> Self {
        Self {
            queue: Rc::new(UpdateQueue::default()),
            tree: RefCell::new(Mounted::Empty),
            flushing: Cell::new(false),
            max_update_depth: limit.max(1),
        }
    }

    /// Render `node` into the root, updating the existing tree in place
    /// where types and keys match, then flush queued updates.
    pub fn render(&self, node: impl Into<Node>) -> Result<(), HostError> {
        let mut pass = Pass::new(&self.queue);
        {
            let mut tree = self.tree.borrow_mut();
            pass.reconcile(&mut tree, node.into())?;
        }
        pass.commit();
        self.flush()
    }

    /// Process queued updates until none remain.
    ///
    /// Updates requested while flushing are picked up in a later round. A
    /// flush running more than the configured number of rounds clears the
    /// queue and fails with [`HostError::UpdateDepthExceeded`]. Calling
    /// flush from inside a flush is a no-op.
    pub fn flush(&self) -> Result<(), HostError> {
        if self.flushing.replace(true) {
            return Ok(());
        }
        let _guard = FlushGuard(&self.flushing);

        let mut rounds = 0;
        loop {
            let round = self.queue.pending_ids();
            if round.is_empty() {
                return Ok(());
            }
            rounds += 1;
            if rounds > self.max_update_depth {
                self.queue.clear();
                tracing::error!(limit = self.max_update_depth, "maximum update depth exceeded");
                return Err(HostError::UpdateDepthExceeded {
                    limit: self.max_update_depth,
                });
            }
            tracing::trace!(round = rounds, updates = round.len(), "flushing");

            for id in round {
                // A parent re-rendered earlier in this round may have consumed it.
                let Some(pending) = self.queue.take(id) else {
                    continue;
                };
                let Some(instance) = self.queue.instance(id) else {
                    continue;
                };
                if !instance.is_mounted() {
                    continue;
                }
                let mut pass = Pass::new(&self.queue);
                pass.update_instance(&instance, None, pending)?;
                pass.commit();
            }
        }
    }

    /// Run `f`, then flush whatever it queued.
    pub fn act<R>(&self, f: impl FnOnce() -> R) -> Result<R, HostError> {
        let result = f();
        self.flush()?;
        Ok(result)
    }

    /// Unmount the whole tree.
    pub fn unmount(&self) {
        let tree = std::mem::take(&mut *self.tree.borrow_mut());
        unmount(tree);
        self.queue.clear();
    }

    /// Serialize the mounted host tree.
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.tree.borrow().write_markup(&mut out);
        out
    }

    /// Number of updates waiting for the next flush.
    pub fn pending_updates(&self) -> usize {
        self.queue.len()
    }
}

impl Default for Root {
    fn default() -> Self {
        Self::new()
    }
}

/// Render `node` once without committing it: no lifecycle callbacks run
/// and the instances are dropped with the returned markup.
pub fn render_to_string(node: impl Into<Node>) -> Result<String, HostError> {
    let queue = Rc::new(UpdateQueue::default());
    let mut pass = Pass::new(&queue);
    let mounted = pass.mount(node.into())?;
    let mut out = String::new();
    mounted.write_markup(&mut out);
    Ok(out)
}
