//! # flame-compute
//!
//! GPU execution path for fractal flame rendering.
//!
//! Mirrors the CPU reference pipeline (`flame-render`) as wgpu compute
//! kernels: iteration with cross-lane point shuffling, log-scale /
//! density filtering, and final accumulation. The CPU path remains the
//! reference; this path trades bitwise reproducibility against it for
//! throughput, and callers are expected to fall back to the CPU when a
//! [`ComputeError`] is reported.
//!
//! # Architecture
//!
//! ```text
//! Ember ──► pack (structs) ──► upload ──► iterate ──► density ──► accum
//!             │                             │            │          │
//!             ▼                             ▼            ▼          ▼
//!      XformGpu/EmberGpu             histogram buf   select +   final u8
//!      selection table                (atomic f32)   gather      image
//! ```
//!
//! # Feature Flags
//!
//! - `wgpu` - Enable the GPU backend (off by default; without it only
//!   the packing types and shader sources are built)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod shaders;
pub mod structs;

#[cfg(feature = "wgpu")]
mod device;
#[cfg(feature = "wgpu")]
mod renderer;

#[cfg(feature = "wgpu")]
pub use device::GpuContext;
#[cfg(feature = "wgpu")]
pub use renderer::GpuRenderer;

use thiserror::Error;

/// GPU backend errors.
///
/// All of these map onto the pipeline's backend-failure channel: the
/// render did not produce output, and retrying on the CPU path is safe.
#[derive(Error, Debug)]
pub enum ComputeError {
    /// No usable GPU adapter was found.
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    /// Device creation failed.
    #[error("failed to create device: {0}")]
    DeviceCreation(String),

    /// A kernel failed to build.
    #[error("failed to compile shader: {0}")]
    ShaderCompilation(String),

    /// The ember uses a feature the GPU interpreter does not cover.
    #[error("unsupported on GPU: {0}")]
    Unsupported(String),

    /// A buffer was the wrong size for the operation.
    #[error("buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch {
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        actual: usize,
    },

    /// A kernel dispatch or readback failed.
    #[error("GPU operation failed: {0}")]
    OperationFailed(String),
}

/// Result type for GPU operations.
pub type ComputeResult<T> = Result<T, ComputeError>;

impl From<ComputeError> for flame_core::Error {
    fn from(e: ComputeError) -> Self {
        flame_core::Error::backend_failure(e.to_string())
    }
}
