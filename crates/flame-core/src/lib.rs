//! # flame-core
//!
//! Core data model for fractal-flame rendering.
//!
//! A fractal flame is an iterated function system whose branches
//! ("xforms") mix an affine map with non-linear "variations". This crate
//! holds the data types the whole pipeline shares:
//!
//! - [`Point`] - the mutable chaotic-game state
//! - [`Affine2D`] - six-coefficient 2D affine transforms
//! - [`Palette`] - 256-entry RGBA color lookup
//! - [`Variation`] - the open catalog of non-linear per-point functions
//! - [`Xform`] - one branch of the system, with its evaluation pipeline
//! - [`Ember`] - a complete scene: xforms, camera, palette, filters
//!
//! # Example
//!
//! ```rust
//! use flame_core::{Ember, Xform, variations};
//!
//! let mut xf = Xform::new();
//! xf.add_variation(variations::linear(1.0));
//!
//! let mut ember = Ember::new(640, 480);
//! ember.add_xform(xf);
//! ember.finalize();
//! assert!(ember.validate().is_ok());
//! ```
//!
//! Rendering lives in `flame-render` (CPU reference) and `flame-compute`
//! (GPU); keyframe animation in `flame-anim`.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod affine;
mod ember;
mod error;
mod palette;
mod point;
mod variation;
pub mod variations;
mod xform;

pub use affine::Affine2D;
pub use ember::{
    AffineInterp, Ember, EmberInterp, SpatialFilterKind, TemporalFilterKind,
};
pub use error::{Error, Result};
pub use palette::{
    PALETTE_SIZE, Palette, PaletteInterp, PaletteMode, hsv_to_rgb, rgb_to_hsv,
};
pub use point::Point;
pub use variation::{
    AssignMode, EPS, IterHelper, Param, PrecalcFlags, Variation, VariationCategory,
};
pub use xform::{BAD_VALUE_LIMIT, BadPoint, MotionFunc, Xform, adjust_opacity, bad_value};
