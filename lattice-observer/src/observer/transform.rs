//! The `observer` transform.

use std::rc::Rc;

use super::cell::ReactiveInputs;
use super::component::{ObserverComponent, TypeShared};
use super::state::Phase;
use crate::config::ObserverConfig;
use crate::error::ObserverError;
use crate::host::{Base, ComponentType, Constructor, Kind, This};
use crate::instrument::Warning;
use crate::props::Props;

/// Make `ty` re-render whenever observable state it read while rendering
/// changes. Uses the global [`ObserverConfig`].
///
/// # Example
///
/// ```
/// use lattice_observer::{observer, Node, Props, Root, Signal};
///
/// let count = Signal::new(0);
/// let counter = {
///     let count = count.clone();
///     observer(&lattice_observer::ComponentType::function("Counter", move |_| {
///         Ok(Node::text(count.get().to_string()))
///     }))
///     .unwrap()
/// };
///
/// let root = Root::new();
/// root.render(counter.element(Props::new())).unwrap();
/// root.act(|| count.set(5)).unwrap();
/// assert_eq!(root.to_markup(), "5");
/// ```
pub fn observer(ty: &ComponentType) -> Result<ComponentType, ObserverError> {
    observer_with(ty, ObserverConfig::global())
}

/// [`observer`] with an explicit config.
///
/// - An observer type is returned unchanged, with a warning.
/// - `memo` types are refused; apply `memo` to the observer instead.
/// - A `forward_ref` is rebuilt around an observer of its inner render,
///   which must be a function component.
/// - Types extending the pure base are converted, with a warning.
pub fn observer_with(
    ty: &ComponentType,
    config: &ObserverConfig,
) -> Result<ComponentType, ObserverError> {
    if ty.is_observer() {
        config.instrumentation().warn(Warning::AlreadyObserver {
            component: ty.name().to_owned(),
        });
        return Ok(ty.clone());
    }

    match ty.kind() {
        Kind::Memo(_) => Err(ObserverError::MemoWrapped {
            name: ty.name().to_owned(),
        }),
        Kind::ForwardRef(inner) => {
            if !matches!(inner.kind(), Kind::Function(_)) {
                return Err(ObserverError::ForwardRefRenderNotFunction {
                    name: ty.name().to_owned(),
                });
            }
            let inner = observer_with(inner, config)?;
            Ok(ComponentType::forward_ref(ty.name(), inner))
        }
        Kind::Class(_) | Kind::Function(_) => {
            if ty.base() == Base::PureComponent {
                config.instrumentation().warn(Warning::PureComponentBase {
                    component: ty.name().to_owned(),
                });
            }
            Ok(wrap(ty, config))
        }
    }
}

/// Build the observer type around a class or function component.
pub(crate) fn wrap(source: &ComponentType, config: &ObserverConfig) -> ComponentType {
    tracing::debug!(component = source.name(), "creating observer type");
    let shared = Rc::new(TypeShared::default());
    let construct: Constructor = {
        let source = source.clone();
        let config = config.clone();
        Rc::new(move |props: &Props| ObserverComponent::construct(&source, props, &config, &shared))
    };
    ComponentType::from_parts(source.name(), Kind::Class(Base::Component), construct, true)
}

fn reactive_inputs<'a>(this: &This<'a>) -> Option<&'a ReactiveInputs> {
    this.inputs().as_any().downcast_ref::<ReactiveInputs>()
}

/// Run `disposer` once when the observer instance unmounts, or right away
/// if it already has.
pub fn dispose_on_unmount<F>(this: &This<'_>, disposer: F) -> Result<(), ObserverError>
where
    F: FnOnce() + 'static,
{
    let inputs = reactive_inputs(this).ok_or_else(|| ObserverError::NotAnObserver {
        name: this.name().to_owned(),
    })?;
    inputs.render_state().add_disposer(Box::new(disposer));
    Ok(())
}

/// Where an observer instance is in its render cycle; `None` for plain
/// components.
pub fn render_phase(this: &This<'_>) -> Option<Phase> {
    reactive_inputs(this).map(|inputs| inputs.render_state().phase())
}

/// Number of times an observer instance has rendered.
pub fn render_count(this: &This<'_>) -> Option<usize> {
    reactive_inputs(this).map(|inputs| inputs.render_state().render_count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenderError;
    use crate::host::{Component, Node};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Plain;

    impl Component for Plain {
        fn render(&self, _this: &This<'_>) -> Result<Node, RenderError> {
            Ok(Node::Empty)
        }
    }

    #[test]
    fn wraps_class_and_function_components() {
        let config = ObserverConfig::new();
        let class = observer_with(&ComponentType::class("Plain", |_| Plain), &config).unwrap();
        let function =
            observer_with(&ComponentType::function("Fn", |_| Ok(Node::Empty)), &config).unwrap();

        assert!(class.is_observer());
        assert!(function.is_observer());
        assert_eq!(function.name(), "Fn");
        assert_eq!(class.base(), Base::Component);
    }

    #[test]
    fn function_source_is_left_untouched() {
        let config = ObserverConfig::new();
        let source = ComponentType::function("Fn", |_| Ok(Node::Empty));
        let wrapped = observer_with(&source, &config).unwrap();

        assert!(!source.is_observer());
        assert!(!ComponentType::same(&source, &wrapped));
        assert!(matches!(source.kind(), Kind::Function(_)));
    }

    #[test]
    fn double_wrap_returns_same_type() {
        let config = ObserverConfig::new();
        let once = observer_with(&ComponentType::class("Plain", |_| Plain), &config).unwrap();
        let twice = observer_with(&once, &config).unwrap();
        assert!(ComponentType::same(&once, &twice));
    }

    #[test]
    fn memo_is_refused() {
        let config = ObserverConfig::new();
        let memo = ComponentType::memo(ComponentType::function("Card", |_| Ok(Node::Empty)));
        let err = observer_with(&memo, &config).unwrap_err();
        assert!(matches!(err, ObserverError::MemoWrapped { name } if name == "Card"));
    }

    #[test]
    fn forward_ref_needs_function_render() {
        let config = ObserverConfig::new();
        let bad = ComponentType::forward_ref("Fwd", ComponentType::class("Plain", |_| Plain));
        assert!(matches!(
            observer_with(&bad, &config),
            Err(ObserverError::ForwardRefRenderNotFunction { .. })
        ));

        let good = ComponentType::forward_ref(
            "Fwd",
            ComponentType::function("Inner", |_| Ok(Node::Empty)),
        );
        let wrapped = observer_with(&good, &config).unwrap();
        assert!(wrapped.is_observer());
        match wrapped.kind() {
            Kind::ForwardRef(inner) => assert!(inner.is_observer()),
            other => panic!("expected forward ref, got {other:?}"),
        }
    }

    #[test]
    fn construct_installs_reactive_inputs() {
        let config = ObserverConfig::new();
        let ty = observer_with(&ComponentType::class("Plain", |_| Plain), &config).unwrap();
        let constructed = ty.construct(&Props::new().with("a", 1));

        let inputs = constructed
            .inputs
            .as_any()
            .downcast_ref::<ReactiveInputs>()
            .expect("reactive inputs");
        assert_eq!(inputs.props_cell().get_untracked().get_int("a"), Some(1));
    }

    #[test]
    fn pure_base_is_converted_with_warning() {
        let config = ObserverConfig::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let seen = seen.clone();
            config.instrumentation().on_warning(move |w| seen.lock().push(w.clone()))
        };

        let ty = observer_with(&ComponentType::pure("Pure", |_| Plain), &config).unwrap();

        assert!(ty.is_observer());
        assert_eq!(ty.base(), Base::Component);
        assert_eq!(
            *seen.lock(),
            vec![Warning::PureComponentBase {
                component: "Pure".into()
            }]
        );
    }
}
