//! Element trees produced by render.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::component::ComponentType;
use crate::props::Props;

/// What a render returns.
#[derive(Clone, Debug, Default)]
pub enum Node {
    /// Renders nothing.
    #[default]
    Empty,
    Text(String),
    Tag {
        name: String,
        children: Vec<Node>,
    },
    Fragment(Vec<Node>),
    Component(Element),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn tag(name: impl Into<String>, children: impl IntoIterator<Item = Node>) -> Self {
        Self::Tag {
            name: name.into(),
            children: children.into_iter().collect(),
        }
    }

    pub fn fragment(children: impl IntoIterator<Item = Node>) -> Self {
        Self::Fragment(children.into_iter().collect())
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Self::Component(element)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// A request to render a component type with some props.
#[derive(Clone)]
pub struct Element {
    ty: ComponentType,
    props: Props,
    key: Option<String>,
}

impl Element {
    pub fn new(ty: ComponentType, props: Props) -> Self {
        Self {
            ty,
            props,
            key: None,
        }
    }

    /// Give the element a key; a changed key remounts the component.
    pub fn keyed(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn component_type(&self) -> &ComponentType {
        &self.ty
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub(crate) fn into_parts(self) -> (ComponentType, Props, Option<String>) {
        (self.ty, self.props, self.key)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("type", &self.ty.name())
            .field("props", &self.props)
            .field("key", &self.key)
            .finish()
    }
}

/// Identity of a mounted host node (a tag or a text run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct HostNodeId(u64);

impl HostNodeId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
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

impl fmt::Display for HostNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}
