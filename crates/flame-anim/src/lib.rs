//! # flame-anim
//!
//! Keyframe animation support for flame rendering: aligning keyframe
//! embers into a common shape, blending them at arbitrary times, and the
//! temporal filters that weight motion-blur samples.
//!
//! # Example
//!
//! ```rust
//! use flame_anim::Sequence;
//! use flame_core::{Ember, Xform};
//!
//! let mut a = Ember::new(64, 64);
//! a.add_xform(Xform::identity());
//! a.time = 0.0;
//!
//! let mut b = a.clone();
//! b.time = 1.0;
//! b.xforms[0].weight = 2.0;
//!
//! let seq = Sequence::new(vec![a, b]).unwrap();
//! let mid = seq.at(0.5);
//! assert!((mid.xforms[0].weight - 1.5).abs() < 1e-4);
//! ```

#![warn(missing_docs)]

mod align;
mod interpolate;
mod temporal;

pub use align::{align, compute_wind_refs, sort_by_color_role};
pub use interpolate::{Sequence, apply_motion, blend_embers};
pub use temporal::TemporalFilter;
