//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when an atom is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (e.g., running a tracked render), we push
//! the subscriber onto the stack. When the computation completes, we pop it.
//!
//! An untracked entry (no subscriber) shadows the entries below it, so reads
//! inside [`ReactiveContext::untracked`] are never recorded.
//!
//! A second stack guards state changes. While the innermost entry forbids
//! them, writes to observed atoms are refused and remembered, so the scope
//! that forbade them can report the failure once it unwinds.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::atom::AtomId;
use super::SubscriberId;
use crate::error::ReactiveError;

/// Dependencies recorded by a single tracking scope.
pub type Dependencies = SmallVec<[AtomId; 8]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
    static STATE_SCOPES: RefCell<Vec<StateScope>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// The computation being tracked, or `None` for an untracked scope.
    subscriber_id: Option<SubscriberId>,
    /// Atoms read during this computation, in first-read order.
    dependencies: Dependencies,
}

#[derive(Debug)]
struct StateScope {
    allowed: bool,
    /// Name of the first atom whose write was refused in this scope.
    refused: Option<String>,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, any atoms that are read will
    /// register the subscriber as a dependent.
    ///
    /// The context is automatically exited when the returned guard is dropped.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        Self::push(Some(subscriber_id))
    }

    fn push(subscriber_id: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                dependencies: Dependencies::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber_id))
    }

    /// Record a dependency on the given atom.
    ///
    /// Returns `true` if a tracking scope recorded the read. Repeated reads
    /// of the same atom are recorded once.
    pub fn track_dependency(atom: AtomId) -> bool {
        CONTEXT_STACK.with(|stack| match stack.borrow_mut().last_mut() {
            Some(entry) if entry.subscriber_id.is_some() => {
                if !entry.dependencies.contains(&atom) {
                    entry.dependencies.push(atom);
                }
                true
            }
            _ => false,
        })
    }

    /// Get the dependencies collected in the current context.
    pub fn get_dependencies() -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .map(|entry| entry.dependencies.clone())
                .unwrap_or_default()
        })
    }

    /// Take the dependencies collected by this context, leaving it empty.
    pub fn take_dependencies(&self) -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|entry| std::mem::take(&mut entry.dependencies))
                .unwrap_or_default()
        })
    }

    /// Run `f` without recording any of its reads.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        let _ctx = Self::push(None);
        f()
    }

    /// Run `f` with state changes to observed atoms disallowed.
    ///
    /// Refused writes leave the atom untouched. If any write was refused the
    /// scope fails with the first refusal, even when `f` itself returned.
    pub fn without_state_changes<R>(f: impl FnOnce() -> R) -> Result<R, ReactiveError> {
        let scope = StateScopeGuard::push(false);
        let result = f();
        match scope.pop() {
            Some(atom) => Err(ReactiveError::StateChangeNotAllowed { atom }),
            None => Ok(result),
        }
    }

    /// Run `f` with state changes allowed again, e.g. for an event handler
    /// invoked synchronously from inside a render.
    pub fn with_state_changes<R>(f: impl FnOnce() -> R) -> R {
        let scope = StateScopeGuard::push(true);
        let result = f();
        scope.pop();
        result
    }

    /// Whether the innermost scope allows state changes.
    pub fn state_changes_allowed() -> bool {
        STATE_SCOPES.with(|scopes| scopes.borrow().last().map_or(true, |scope| scope.allowed))
    }

    /// Remember a refused write in the innermost scope.
    pub(crate) fn refuse_state_change(atom: &str) {
        STATE_SCOPES.with(|scopes| {
            if let Some(scope) = scopes.borrow_mut().last_mut() {
                scope.refused.get_or_insert_with(|| atom.to_owned());
            }
        });
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // try_with: guards may be dropped during thread teardown
        let _ = CONTEXT_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}

/// Pops a state scope on drop so a panicking render cannot leave the
/// thread with state changes disallowed.
struct StateScopeGuard {
    popped: bool,
}

impl StateScopeGuard {
    fn push(allowed: bool) -> Self {
        STATE_SCOPES.with(|scopes| {
            scopes.borrow_mut().push(StateScope {
                allowed,
                refused: None,
            })
        });
        Self { popped: false }
    }

    fn pop(mut self) -> Option<String> {
        self.popped = true;
        STATE_SCOPES.with(|scopes| scopes.borrow_mut().pop().and_then(|scope| scope.refused))
    }
}

impl Drop for StateScopeGuard {
    fn drop(&mut self) {
        if !self.popped {
            let _ = STATE_SCOPES.try_with(|scopes| scopes.borrow_mut().pop());
        }
    }
}
