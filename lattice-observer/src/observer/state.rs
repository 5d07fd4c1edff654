//! Per-instance render state.
//!
//! Each observer instance moves through
//! `Idle -> Rendering -> Idle`, and `Idle -> UpdatePending -> Rendering`
//! when a dependency changes. `Unmounted` is terminal. The pending phase is
//! only left by the next render, so any number of notifications before it
//! produce one update request.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::reactive::Tracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Rendering,
    /// A re-render was requested and has not started yet.
    UpdatePending,
    Unmounted,
}

pub(crate) struct RenderState {
    phase: Cell<Phase>,
    /// Set while the instance requests its own forced update.
    forcing_update: Cell<bool>,
    /// Set while a host-driven input write notifies.
    skip_render: Cell<bool>,
    tracker: RefCell<Option<Rc<Tracker>>>,
    render_started: Cell<Option<Instant>>,
    render_time: Cell<Duration>,
    renders: Cell<usize>,
    disposers: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl RenderState {
    pub(crate) fn new() -> Self {
        Self {
            phase: Cell::new(Phase::Idle),
            forcing_update: Cell::new(false),
            skip_render: Cell::new(false),
            tracker: RefCell::new(None),
            render_started: Cell::new(None),
            render_time: Cell::new(Duration::ZERO),
            renders: Cell::new(0),
            disposers: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub(crate) fn is_unmounted(&self) -> bool {
        self.phase.get() == Phase::Unmounted
    }

    pub(crate) fn begin_render(&self) {
        if !self.is_unmounted() {
            self.phase.set(Phase::Rendering);
        }
        self.render_started.set(Some(Instant::now()));
        self.renders.set(self.renders.get() + 1);
    }

    /// Leave `Rendering`. A request that arrived mid-render stays pending.
    pub(crate) fn end_render(&self) {
        if self.phase.get() == Phase::Rendering {
            self.phase.set(Phase::Idle);
        }
        if let Some(started) = self.render_started.get() {
            self.render_time.set(started.elapsed());
        }
    }

    /// Enter `UpdatePending`. Returns `false` if already pending or unmounted.
    pub(crate) fn mark_pending(&self) -> bool {
        match self.phase.get() {
            Phase::UpdatePending | Phase::Unmounted => false,
            Phase::Idle | Phase::Rendering => {
                self.phase.set(Phase::UpdatePending);
                true
            }
        }
    }

    /// Drop a pending request that turned out not to be needed.
    pub(crate) fn clear_pending(&self) {
        if self.phase.get() == Phase::UpdatePending {
            self.phase.set(Phase::Idle);
        }
    }

    /// Enter `Unmounted`. Returns `true` only the first time.
    pub(crate) fn mark_unmounted(&self) -> bool {
        self.phase.replace(Phase::Unmounted) != Phase::Unmounted
    }

    pub(crate) fn is_forcing_update(&self) -> bool {
        self.forcing_update.get()
    }

    pub(crate) fn forcing_update(&self) -> FlagGuard<'_> {
        FlagGuard::set(&self.forcing_update)
    }

    pub(crate) fn is_skipping_render(&self) -> bool {
        self.skip_render.get()
    }

    pub(crate) fn skipping_render(&self) -> FlagGuard<'_> {
        FlagGuard::set(&self.skip_render)
    }

    pub(crate) fn tracker(&self) -> Option<Rc<Tracker>> {
        self.tracker.borrow().clone()
    }

    pub(crate) fn install_tracker(&self, tracker: Rc<Tracker>) {
        *self.tracker.borrow_mut() = Some(tracker);
    }

    /// Stop the current session from firing. It stays installed, so later
    /// renders run untracked instead of subscribing again.
    pub(crate) fn dispose_tracker(&self) {
        if let Some(tracker) = self.tracker() {
            tracker.dispose();
        }
    }

    /// Dispose and release the session.
    pub(crate) fn release_tracker(&self) {
        let tracker = self.tracker.borrow_mut().take();
        if let Some(tracker) = tracker {
            tracker.dispose();
        }
    }

    pub(crate) fn render_time(&self) -> Duration {
        self.render_time.get()
    }

    /// Time since the last render started.
    pub(crate) fn since_render_started(&self) -> Duration {
        self.render_started
            .get()
            .map(|started| started.elapsed())
            .unwrap_or_default()
    }

    pub(crate) fn render_count(&self) -> usize {
        self.renders.get()
    }

    /// Run `disposer` on unmount, or now if that already happened.
    pub(crate) fn add_disposer(&self, disposer: Box<dyn FnOnce()>) {
        if self.is_unmounted() {
            disposer();
        } else {
            self.disposers.borrow_mut().push(disposer);
        }
    }

    pub(crate) fn run_disposers(&self) {
        let disposers = std::mem::take(&mut *self.disposers.borrow_mut());
        for disposer in disposers {
            disposer();
        }
    }
}

impl fmt::Debug for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderState")
            .field("phase", &self.phase.get())
            .field("forcing_update", &self.forcing_update.get())
            .field("skip_render", &self.skip_render.get())
            .field("renders", &self.renders.get())
            .finish()
    }
}

/// Holds a flag set; clears it on drop.
pub(crate) struct FlagGuard<'a> {
    flag: &'a Cell<bool>,
    previous: bool,
}

impl<'a> FlagGuard<'a> {
    fn set(flag: &'a Cell<bool>) -> Self {
        let previous = flag.replace(true);
        Self { flag, previous }
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_coalesces_until_next_render() {
        let state = RenderState::new();
        assert!(state.mark_pending());
        assert!(!state.mark_pending());
        assert_eq!(state.phase(), Phase::UpdatePending);

        state.begin_render();
        assert_eq!(state.phase(), Phase::Rendering);
        state.end_render();
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.mark_pending());
    }

    #[test]
    fn request_during_render_survives_end_of_render() {
        let state = RenderState::new();
        state.begin_render();
        assert!(state.mark_pending());
        state.end_render();
        assert_eq!(state.phase(), Phase::UpdatePending);
    }

    #[test]
    fn unmounted_is_terminal() {
        let state = RenderState::new();
        assert!(state.mark_unmounted());
        assert!(!state.mark_unmounted());
        assert!(!state.mark_pending());

        state.begin_render();
        assert_eq!(state.phase(), Phase::Unmounted);
    }

    #[test]
    fn flag_guards_restore_on_drop() {
        let state = RenderState::new();
        {
            let _forcing = state.forcing_update();
            assert!(state.is_forcing_update());
            {
                let _nested = state.forcing_update();
            }
            assert!(state.is_forcing_update());
        }
        assert!(!state.is_forcing_update());
    }

    #[test]
    fn disposers_run_once_and_late_ones_run_immediately() {
        let state = RenderState::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let early = log.clone();
        state.add_disposer(Box::new(move || early.borrow_mut().push("early")));
        state.mark_unmounted();
        state.run_disposers();
        state.run_disposers();

        let late = log.clone();
        state.add_disposer(Box::new(move || late.borrow_mut().push("late")));

        assert_eq!(*log.borrow(), ["early", "late"]);
    }
}
