//! Error and status types for the rendering pipeline.

use thiserror::Error;

/// Error type for render operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A problem detected while validating or preparing resources.
    #[error(transparent)]
    Core(#[from] flame_core::Error),

    /// An operation was requested in a state that cannot serve it.
    #[error("invalid renderer state: {0}")]
    InvalidState(String),
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Outcome of a [`run`](crate::Renderer::run) call.
///
/// Abort is a status, not an error: partial buffers stay owned by the
/// renderer and can be inspected or discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// The requested stages completed.
    Ok,
    /// A cooperative abort was observed at a safepoint.
    Aborted,
    /// A stage failed; details were logged through the error report.
    Error,
}
