//! # flame-math
//!
//! Math utilities underpinning flame animation: scalar interpolation and
//! easing, periodic motion curves, and the log-polar affine blending that
//! keeps rotating xforms rigid between keyframes.

#![warn(missing_docs)]

mod interp;
mod motion;
pub mod polar;

pub use interp::{catmull_rom, catmull_rom_weights, clamp, clamp01, lerp, smoother};
pub use motion::motion_value;
pub use polar::{PolarAffine, adjust_rotation, blend as blend_polar, decompose};
