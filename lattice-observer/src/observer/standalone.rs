//! The `Observer` component: reactive rendering for a single callback.

use super::transform::wrap;
use crate::config::ObserverConfig;
use crate::error::RenderError;
use crate::host::{ComponentType, Element, Node};
use crate::instrument::Warning;
use crate::props::{Props, Value};

/// Renders its `children` (or `render`) function inside a tracking session,
/// so only that callback re-runs when what it reads changes.
pub struct Observer;

thread_local! {
    static GLOBAL_OBSERVER: ComponentType = Observer::component_with(ObserverConfig::global());
}

impl Observer {
    /// The `Observer` type bound to the global config. Stable per thread.
    pub fn component() -> ComponentType {
        GLOBAL_OBSERVER.with(ComponentType::clone)
    }

    /// A distinct `Observer` type bound to `config`.
    pub fn component_with(config: &ObserverConfig) -> ComponentType {
        let render_config = config.clone();
        let source = ComponentType::function("Observer", move |props| {
            let children = props.get("children").and_then(Value::as_render);
            let render = props.get("render").and_then(Value::as_render);
            match (children, render) {
                (Some(children), Some(_)) => {
                    render_config.instrumentation().warn(Warning::ObserverChildrenAndRender);
                    children()
                }
                (Some(f), None) | (None, Some(f)) => f(),
                (None, None) => Ok(Node::Empty),
            }
        });
        wrap(&source, config)
    }

    /// An `Observer` element with `render` as its child.
    pub fn element<F>(render: F) -> Element
    where
        F: Fn() -> Result<Node, RenderError> + 'static,
    {
        Self::component().element(Props::new().with("children", Value::render(render)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::host::Root;
    use crate::reactive::Signal;

    #[test]
    fn global_type_is_stable() {
        assert!(ComponentType::same(&Observer::component(), &Observer::component()));
        assert!(Observer::component().is_observer());
    }

    #[test]
    fn renders_nothing_without_a_callback() {
        let config = ObserverConfig::new();
        let root = Root::new();
        root.render(Observer::component_with(&config).element(Props::new()))
            .unwrap();
        assert_eq!(root.to_markup(), "");
    }

    #[test]
    fn render_prop_is_accepted() {
        let config = ObserverConfig::new();
        let root = Root::new();
        let props = Props::new().with("render", Value::render(|| Ok(Node::text("via render"))));
        root.render(Observer::component_with(&config).element(props)).unwrap();
        assert_eq!(root.to_markup(), "via render");
    }

    #[test]
    fn children_win_over_render_with_warning() {
        let config = ObserverConfig::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let seen = seen.clone();
            config.instrumentation().on_warning(move |w| seen.lock().push(w.clone()))
        };

        let props = Props::new()
            .with("children", Value::render(|| Ok(Node::text("children"))))
            .with("render", Value::render(|| Ok(Node::text("render"))));
        let root = Root::new();
        root.render(Observer::component_with(&config).element(props)).unwrap();

        assert_eq!(root.to_markup(), "children");
        assert_eq!(*seen.lock(), vec![Warning::ObserverChildrenAndRender]);
    }

    #[test]
    fn callback_re_runs_on_change() {
        let count = Signal::new(1);
        let root = Root::new();
        let element = {
            let count = count.clone();
            Observer::element(move || Ok(Node::text(format!("count {}", count.get()))))
        };

        root.render(Node::tag("p", [Node::from(element)])).unwrap();
        assert_eq!(root.to_markup(), "<p>count 1</p>");

        root.act(|| count.set(2)).unwrap();
        assert_eq!(root.to_markup(), "<p>count 2</p>");
    }
}
