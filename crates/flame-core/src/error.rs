//! Error types for flame-core operations.
//!
//! This module provides the unified error handling system shared by the
//! rendering pipeline crates.
//!
//! # Overview
//!
//! The [`Error`] enum covers the failure modes that can occur while
//! validating a flame definition or preparing render resources:
//! - Malformed flame definitions (bad palette length, zero weights, ...)
//! - Resource exhaustion (filter bank too large, allocation too big)
//! - GPU backend failures (surfaced by the compute crate)
//!
//! Transient numeric problems during iteration (points escaping to
//! infinity) are *not* represented here; those are absorbed internally by
//! the iterator's retry policy and never reach the caller.
//!
//! # Dependencies
//!
//! - [`thiserror`] - For derive macro error implementation
//!
//! # Used By
//!
//! - [`crate::ember::Ember`] - Definition validation
//! - `flame-render` - Renderer state transitions and buffer allocation
//! - `flame-compute` - GPU kernel build/launch failures

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while preparing or validating a render.
///
/// This enum uses [`thiserror`] for automatic [`std::error::Error`] and
/// [`std::fmt::Display`] implementations.
///
/// # Categories
///
/// - **Configuration**: [`ConfigInvalid`](Error::ConfigInvalid)
/// - **Resources**: [`ResourceExhausted`](Error::ResourceExhausted)
/// - **Backend**: [`BackendFailure`](Error::BackendFailure)
#[derive(Debug, Error)]
pub enum Error {
    /// The flame definition is malformed.
    ///
    /// Detected when a definition is handed to the renderer; the renderer
    /// refuses the transition and keeps its prior state.
    #[error("invalid flame definition: {reason}")]
    ConfigInvalid {
        /// What was wrong with the definition
        reason: String,
    },

    /// A requested allocation or precomputation exceeds the allowed size.
    ///
    /// Covers both host memory (histogram/accumulator buffers) and the
    /// density filter kernel bank, which is refused above ten million
    /// entries.
    #[error("resource exhausted: {what} requires {requested}, limit is {limit}")]
    ResourceExhausted {
        /// What was being allocated
        what: String,
        /// Requested amount (elements or bytes, per `what`)
        requested: usize,
        /// The applicable limit
        limit: usize,
    },

    /// A GPU kernel failed to build or launch.
    ///
    /// Only produced by the compute path. Callers may retry on the CPU
    /// path; the failure is also reported through the diagnostics channel.
    #[error("compute backend failure: {0}")]
    BackendFailure(String),
}

impl Error {
    /// Creates an [`Error::ConfigInvalid`] error.
    #[inline]
    pub fn config_invalid(reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::ResourceExhausted`] error.
    #[inline]
    pub fn resource_exhausted(what: impl Into<String>, requested: usize, limit: usize) -> Self {
        Self::ResourceExhausted {
            what: what.into(),
            requested,
            limit,
        }
    }

    /// Creates an [`Error::BackendFailure`] error.
    #[inline]
    pub fn backend_failure(msg: impl Into<String>) -> Self {
        Self::BackendFailure(msg.into())
    }

    /// Returns `true` if this is a configuration error.
    #[inline]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigInvalid { .. })
    }

    /// Returns `true` if this is a resource exhaustion error.
    #[inline]
    pub fn is_resource_error(&self) -> bool {
        matches!(self, Self::ResourceExhausted { .. })
    }

    /// Returns `true` if this is a backend failure.
    #[inline]
    pub fn is_backend_error(&self) -> bool {
        matches!(self, Self::BackendFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_invalid() {
        let err = Error::config_invalid("palette has 17 entries, expected 256");
        assert!(err.to_string().contains("palette"));
        assert!(err.is_config_error());
        assert!(!err.is_resource_error());
    }

    #[test]
    fn test_resource_exhausted() {
        let err = Error::resource_exhausted("density filter bank", 20_000_000, 10_000_000);
        let msg = err.to_string();
        assert!(msg.contains("20000000"));
        assert!(msg.contains("10000000"));
        assert!(err.is_resource_error());
    }

    #[test]
    fn test_backend_failure() {
        let err = Error::backend_failure("shader compilation failed");
        assert!(err.is_backend_error());
        assert!(err.to_string().contains("shader"));
    }
}
