//! # flame-render
//!
//! The CPU reference renderer for fractal flames.
//!
//! The pipeline turns an [`Ember`](flame_core::Ember) into pixels:
//!
//! 1. [`iterator`] - the chaotic game, filling a supersampled histogram
//! 2. [`density`] - variable-width density estimation into the accumulator
//! 3. [`spatial`] + [`tonemap`] - downfilter and convert to 8-bit
//!
//! [`Renderer`] owns the buffers and drives the stages through a process
//! state machine, so interactive callers can redo only the cheap tail of
//! the pipeline when a display parameter changes.
//!
//! # Example
//!
//! ```rust
//! use flame_core::{Ember, Palette, Xform};
//! use flame_render::{ProcessAction, Renderer, RenderStatus};
//!
//! let mut ember = Ember::new(32, 32);
//! ember.pixels_per_unit = 16.0;
//! ember.quality = 20.0;
//! ember.de_max_radius = 0.0;
//! ember.palette = Palette::solid([1.0, 1.0, 1.0, 1.0]);
//! ember.add_xform(Xform::identity());
//!
//! let mut renderer = Renderer::new();
//! renderer.set_lane_count(1);
//! renderer.set_ember(ember, ProcessAction::FullRender).unwrap();
//! assert_eq!(renderer.run(0.0), RenderStatus::Ok);
//!
//! let mut image = Vec::new();
//! renderer.read_final(&mut image).unwrap();
//! assert_eq!(image.len(), 32 * 32 * 3);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod accum;
pub mod coords;
pub mod density;
mod error;
pub mod iterator;
mod renderer;
pub mod spatial;
pub mod tonemap;

pub use coords::CartToRaster;
pub use density::{DE_THRESH, DensityFilter, MAX_KERNEL_BANK};
pub use error::{RenderError, RenderResult, RenderStatus};
pub use iterator::{ChaosGame, DEFAULT_FUSE, IterStats, SELECTION_GRAIN, SelectionTable};
pub use renderer::{
    ProcessAction, ProcessState, ProgressCallback, RenderStats, Renderer,
};
pub use spatial::{FilterCurve, SpatialFilter};
pub use tonemap::{MappedPixel, ToneMap, calc_alpha, calc_new_rgb};
