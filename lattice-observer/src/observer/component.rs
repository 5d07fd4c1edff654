//! The reactive render wrapper and lifecycle adapter.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use super::cell::ReactiveInputs;
use super::state::RenderState;
use crate::config::ObserverConfig;
use crate::error::RenderError;
use crate::host::{Component, ComponentType, Constructed, Node, This, Updater};
use crate::instrument::{ComponentInfo, Warning};
use crate::props::{shallow_equal, Props, State};
use crate::reactive::{untracked, ReactiveContext, Tracker};

/// Facts shared by every instance of one observer type.
#[derive(Default)]
pub(crate) struct TypeShared {
    warned_custom_predicate: Cell<bool>,
}

/// Wraps a component so each render runs inside a tracking session.
pub(crate) struct ObserverComponent {
    inner: Rc<dyn Component>,
    render: Rc<RenderState>,
    config: ObserverConfig,
    shared: Rc<TypeShared>,
}

impl ObserverComponent {
    /// Construct `source` and swap its inputs for tracked storage.
    pub(crate) fn construct(
        source: &ComponentType,
        props: &Props,
        config: &ObserverConfig,
        shared: &Rc<TypeShared>,
    ) -> Constructed {
        let Constructed { component, inputs } = source.construct(props);
        let render = Rc::new(RenderState::new());
        let inputs = ReactiveInputs::new(
            source.name(),
            inputs.props(),
            inputs.state(),
            render.clone(),
        );

        Constructed {
            component: Box::new(Self {
                inner: Rc::from(component),
                render,
                config: config.clone(),
                shared: shared.clone(),
            }),
            inputs: Rc::new(inputs),
        }
    }

    fn info(this: &This<'_>) -> ComponentInfo {
        ComponentInfo {
            id: this.id(),
            name: this.name().to_owned(),
        }
    }

    fn reactive_render(&self, this: &This<'_>) -> Result<Node, RenderError> {
        self.render.begin_render();
        if self.render.is_unmounted() {
            return untracked(|| self.inner.render(this));
        }

        let tracker = self.tracker(this);
        let result =
            tracker.track(|| ReactiveContext::without_state_changes(|| self.inner.render(this)));
        self.render.end_render();

        let result = result.unwrap_or_else(|refused| Err(refused.into()));
        if let Err(err) = &result {
            tracker.dispose();
            self.config.instrumentation().report_error(Self::info(this), err);
        }
        result
    }

    /// The installed session, created on first use.
    fn tracker(&self, this: &This<'_>) -> Rc<Tracker> {
        if let Some(tracker) = self.render.tracker() {
            return tracker;
        }

        let name = format!("{}#{}.render()", this.name(), this.id());
        tracing::trace!(session = %name, "creating tracking session");
        let tracker = Rc::new(Tracker::new(
            name,
            invalidate(
                Rc::downgrade(&self.render),
                Rc::downgrade(&self.inner),
                this.updater(),
                self.config.clone(),
            ),
        ));
        self.render.install_tracker(tracker.clone());
        tracker
    }

    fn report_render(&self, this: &This<'_>) {
        if !self.config.devtools_enabled() {
            return;
        }
        let render_time = self.render.render_time().as_micros() as u64;
        let total_time = self.render.since_render_started().as_micros() as u64;
        self.config
            .instrumentation()
            .report_render(Self::info(this), this.host_node(), render_time, total_time);
    }
}

/// What a tracking session does when a dependency changes.
///
/// While static rendering is on, changes are ignored and the session stays
/// installed, so reactivity resumes once static rendering is turned off.
fn invalidate(
    render: Weak<RenderState>,
    inner: Weak<dyn Component>,
    updater: Updater,
    config: ObserverConfig,
) -> impl Fn() + 'static {
    move || {
        let Some(render) = render.upgrade() else {
            return;
        };
        if config.is_static_rendering() {
            tracing::trace!(instance = %updater.instance_id(), "static rendering, change ignored");
            return;
        }
        if !render.mark_pending() {
            tracing::trace!(instance = %updater.instance_id(), "update already pending");
            return;
        }
        if let Some(inner) = inner.upgrade() {
            inner.component_will_react();
        }
        if render.is_skipping_render() {
            // The host is already re-rendering with these inputs.
            render.clear_pending();
            return;
        }

        let _forcing = render.forcing_update();
        if let Err(err) = updater.force_update() {
            tracing::warn!(
                instance = %updater.instance_id(),
                %err,
                "forced update failed, disposing tracking session"
            );
            render.dispose_tracker();
        }
    }
}

impl Component for ObserverComponent {
    fn render(&self, this: &This<'_>) -> Result<Node, RenderError> {
        if self.config.is_static_rendering() {
            // Plain render, but a request queued before the switch is settled.
            self.render.begin_render();
            let result = untracked(|| self.inner.render(this));
            self.render.end_render();
            return result;
        }
        self.reactive_render(this)
    }

    fn initial_state(&self, props: &Props) -> State {
        self.inner.initial_state(props)
    }

    fn component_did_mount(&self, this: &This<'_>) {
        self.inner.component_did_mount(this);
        self.report_render(this);
    }

    fn component_did_update(&self, this: &This<'_>, prev_props: &Props, prev_state: &State) {
        self.inner.component_did_update(this, prev_props, prev_state);
        self.report_render(this);
    }

    fn component_will_unmount(&self, this: &This<'_>) {
        self.inner.component_will_unmount(this);
        if !self.render.mark_unmounted() {
            return;
        }

        self.render.release_tracker();
        self.render.run_disposers();
        if self.config.devtools_enabled() {
            self.config
                .instrumentation()
                .report_destroy(Self::info(this), this.host_node());
        }
        tracing::trace!(component = this.name(), instance = %this.id(), "observer unmounted");
    }

    fn should_component_update(
        &self,
        this: &This<'_>,
        next_props: &Props,
        next_state: &State,
    ) -> Option<bool> {
        let instrumentation = self.config.instrumentation();
        if self.config.is_static_rendering() {
            instrumentation.warn(Warning::StaticRenderingUpdate {
                component: this.name().to_owned(),
            });
        }

        if let Some(decision) = self.inner.should_component_update(this, next_props, next_state) {
            if !self.shared.warned_custom_predicate.replace(true) {
                instrumentation.warn(Warning::CustomShouldUpdate {
                    component: this.name().to_owned(),
                });
            }
            return Some(decision);
        }

        let (props, state) = untracked(|| (this.props(), this.state()));
        Some(!Props::ptr_eq(&state, next_state) || !shallow_equal(&props, next_props))
    }

    fn component_will_react(&self) {
        self.inner.component_will_react();
    }
}

impl Drop for ObserverComponent {
    fn drop(&mut self) {
        // Instances that never committed are dropped without unmounting.
        self.render.release_tracker();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InstanceId;
    use crate::observer::Phase;
    use crate::reactive::Signal;

    struct Quiet;

    impl Component for Quiet {
        fn render(&self, _this: &This<'_>) -> Result<Node, RenderError> {
            Ok(Node::Empty)
        }
    }

    fn session(
        render: &Rc<RenderState>,
        inner: &Rc<dyn Component>,
        config: &ObserverConfig,
    ) -> Rc<Tracker> {
        let updater = Updater::detached_for_tests(InstanceId::from_raw_for_tests(7));
        let tracker = Rc::new(Tracker::new(
            "Quiet#7.render()",
            invalidate(Rc::downgrade(render), Rc::downgrade(inner), updater, config.clone()),
        ));
        render.install_tracker(tracker.clone());
        tracker
    }

    /// Test that a forced update the host refuses disposes the session.
    #[test]
    fn refused_forced_update_disposes_session() {
        let render = Rc::new(RenderState::new());
        let inner: Rc<dyn Component> = Rc::new(Quiet);
        let tracker = session(&render, &inner, &ObserverConfig::new());

        let value = Signal::new(0);
        tracker.track(|| value.get());
        assert_eq!(value.subscriber_count(), 1);

        value.set(1);

        assert!(tracker.is_disposed());
        assert_eq!(value.subscriber_count(), 0);
    }

    /// Test that changes are ignored while static rendering is on.
    #[test]
    fn static_rendering_ignores_changes() {
        let config = ObserverConfig::new().with_static_rendering(true);
        let render = Rc::new(RenderState::new());
        let inner: Rc<dyn Component> = Rc::new(Quiet);
        let tracker = session(&render, &inner, &config);

        let value = Signal::new(0);
        tracker.track(|| value.get());
        value.set(1);

        assert_eq!(render.phase(), Phase::Idle);
        assert!(!tracker.is_disposed());

        config.use_static_rendering(false);
        value.set(2);

        // The detached updater refuses, which proves the request was made.
        assert!(tracker.is_disposed());
    }
}
