//! Error Types
//!
//! Every fallible operation in the crate returns one of these enums.
//!
//! - [`ObserverError`]: the component handed to the observer transform (or
//!   to one of its helpers) cannot be made reactive.
//! - [`RenderError`]: a component's render logic failed. Cloneable and
//!   `Send + Sync` so it can be published on the instrumentation channel.
//! - [`ReactiveError`]: the tracking primitive refused an operation.
//! - [`HostError`]: the host framework could not complete a render or an
//!   update request.

use thiserror::Error;

use crate::host::InstanceId;

/// Configuration errors raised by the observer transform.
///
/// These are returned before a component type is produced, so a type that
/// fails here never reaches the host.
#[derive(Debug, Error)]
pub enum ObserverError {
    /// A forward-ref wrapper whose inner render is a class, not a function.
    #[error("render of forward_ref `{name}` is not a function component")]
    ForwardRefRenderNotFunction { name: String },

    /// The type is already wrapped in `memo`, which observer applies itself.
    #[error("`{name}` is wrapped in memo; apply observer to the inner component instead")]
    MemoWrapped { name: String },

    /// A helper that needs observer lifecycle support was used on a plain component.
    #[error("`{name}` is not an observer component")]
    NotAnObserver { name: String },

    /// Settings could not be parsed.
    #[error("invalid observer settings: {0}")]
    InvalidSettings(#[from] serde_json::Error),
}

/// A failed render.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The component's own render logic reported a failure.
    #[error("render failed: {0}")]
    Failed(String),

    /// The render wrote to observable state that other computations observe.
    #[error("render changed observed state `{atom}` while state changes are disallowed")]
    StateChangeNotAllowed { atom: String },
}

impl RenderError {
    /// Create a failure with the given message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<ReactiveError> for RenderError {
    fn from(err: ReactiveError) -> Self {
        match err {
            ReactiveError::StateChangeNotAllowed { atom } => Self::StateChangeNotAllowed { atom },
        }
    }
}

/// Errors from the dependency-tracking primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A write to an observed atom inside a scope that forbids state changes.
    #[error("cannot change observed state `{atom}` while state changes are disallowed")]
    StateChangeNotAllowed { atom: String },
}

/// Errors from the host framework.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// A component's render failed; the error is passed through unchanged.
    #[error("`{component}` failed to render: {source}")]
    Render {
        component: String,
        #[source]
        source: RenderError,
    },

    /// An update was requested for an instance the root no longer tracks.
    #[error("instance {0} is not mounted")]
    NotMounted(InstanceId),

    /// The root that owned the instance has been dropped.
    #[error("root has been dropped")]
    RootDropped,

    /// Flushing kept producing new updates.
    #[error("maximum update depth of {limit} exceeded")]
    UpdateDepthExceeded { limit: usize },
}

impl HostError {
    /// The render error behind this failure, if any.
    pub fn render_error(&self) -> Option<&RenderError> {
        match self {
            Self::Render { source, .. } => Some(source),
            _ => None,
        }
    }
}
