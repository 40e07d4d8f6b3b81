//! The variation seam: trait, evaluation helper, and precalc declarations.
//!
//! A variation is a pure non-linear function `R^3 -> R^3` applied inside an
//! xform. Variations are held as trait objects so the catalog stays open;
//! each one declares which shared precalc fields it reads so the xform only
//! computes what is actually needed.
//!
//! # Evaluation contract
//!
//! Before a variation runs, the xform fills [`IterHelper::in_x`]/`in_y`/
//! `in_z` and computes the declared precalc fields from them. The variation
//! writes its result vector into [`IterHelper::out`]. How that result is
//! folded back (summed for regular variations, summed or assigned for
//! pre/post ones) is the xform's business, driven by
//! [`Variation::assign_mode`].

use rand::RngCore;

/// Epsilon guard against division by zero, matching the flame tradition.
pub const EPS: f32 = 1e-10;

/// Declared precalc needs of a variation, as a bitflag.
///
/// # Example
///
/// ```rust
/// use flame_core::PrecalcFlags;
///
/// let f = PrecalcFlags::SQRT_SUM_SQUARES | PrecalcFlags::ATAN_XY;
/// assert!(f.contains(PrecalcFlags::SQRT_SUM_SQUARES));
/// assert!(!f.contains(PrecalcFlags::ATAN_YX));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrecalcFlags(pub u32);

impl PrecalcFlags {
    /// No precalc needed.
    pub const NONE: Self = Self(0);
    /// `r² = x² + y²`.
    pub const SUM_SQUARES: Self = Self(1);
    /// `r = √(x² + y²)`. Implies [`SUM_SQUARES`](Self::SUM_SQUARES).
    pub const SQRT_SUM_SQUARES: Self = Self(1 | 2);
    /// `sin_a = x / max(r, ε)` and `cos_a = y / max(r, ε)`.
    /// Implies [`SQRT_SUM_SQUARES`](Self::SQRT_SUM_SQUARES).
    pub const ANGLES: Self = Self(1 | 2 | 4);
    /// `atan2(x, y)`.
    pub const ATAN_XY: Self = Self(8);
    /// `atan2(y, x)`.
    pub const ATAN_YX: Self = Self(16);

    /// Returns `true` if all bits of `other` are set in `self`.
    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no precalc is requested.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for PrecalcFlags {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for PrecalcFlags {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Where in the xform pipeline a variation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariationCategory {
    /// Runs on the affine-transformed point, feeding back into it.
    Pre,
    /// Runs on the fixed transformed point; outputs are always summed.
    #[default]
    Regular,
    /// Runs on the accumulated output point.
    Post,
}

/// How a pre/post variation's output is written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssignMode {
    /// Output is added to the current value.
    #[default]
    Sum,
    /// Output replaces the current value.
    Set,
}

/// Scratch record shared between an xform and its variations during one
/// application.
///
/// Lives on the stack of the caller; never shared between threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct IterHelper {
    /// Input x for the variation about to run.
    pub in_x: f32,
    /// Input y for the variation about to run.
    pub in_y: f32,
    /// Input z for the variation about to run.
    pub in_z: f32,
    /// Output vector written by the variation.
    pub out: [f32; 3],
    /// Precalc: `x² + y²`.
    pub sum_squares: f32,
    /// Precalc: `√(x² + y²)`.
    pub sqrt_sum_squares: f32,
    /// Precalc: `x / max(r, ε)`.
    pub sin_a: f32,
    /// Precalc: `y / max(r, ε)`.
    pub cos_a: f32,
    /// Precalc: `atan2(x, y)`.
    pub atan_xy: f32,
    /// Precalc: `atan2(y, x)`.
    pub atan_yx: f32,
    /// Color coordinate the xform computed for this step; direct-color
    /// variations may adjust it.
    pub color: f32,
}

impl IterHelper {
    /// Computes the requested precalc fields from the current input.
    pub fn precalc(&mut self, flags: PrecalcFlags) {
        if flags.contains(PrecalcFlags::SUM_SQUARES) {
            self.sum_squares = self.in_x * self.in_x + self.in_y * self.in_y;
        }
        if flags.contains(PrecalcFlags::SQRT_SUM_SQUARES) {
            self.sqrt_sum_squares = self.sum_squares.sqrt();
        }
        if flags.contains(PrecalcFlags::ANGLES) {
            let r = self.sqrt_sum_squares.max(EPS);
            self.sin_a = self.in_x / r;
            self.cos_a = self.in_y / r;
        }
        if flags.contains(PrecalcFlags::ATAN_XY) {
            self.atan_xy = self.in_x.atan2(self.in_y);
        }
        if flags.contains(PrecalcFlags::ATAN_YX) {
            self.atan_yx = self.in_y.atan2(self.in_x);
        }
    }
}

/// A named scalar parameter of a parametric variation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Param {
    /// Parameter name, stable across versions.
    pub name: &'static str,
    /// Current value.
    pub value: f32,
}

/// A non-linear per-point function applied inside an xform.
///
/// Implementations must be cheap to clone and free of interior mutability;
/// the renderer treats them as read-only during a render.
pub trait Variation: Send + Sync {
    /// Stable numeric id, used for alignment during interpolation.
    fn id(&self) -> u32;

    /// Human-readable name, used for parameter addressing.
    fn name(&self) -> &'static str;

    /// Blend weight applied to the output vector.
    fn weight(&self) -> f32;

    /// Replaces the blend weight.
    fn set_weight(&mut self, weight: f32);

    /// Pipeline position.
    fn category(&self) -> VariationCategory;

    /// Write-back mode for pre/post positions.
    fn assign_mode(&self) -> AssignMode {
        AssignMode::Sum
    }

    /// Which shared precalc fields [`eval`](Self::eval) reads.
    fn precalc_flags(&self) -> PrecalcFlags;

    /// Evaluates the variation, writing the result to `helper.out`.
    fn eval(&self, helper: &mut IterHelper, rng: &mut dyn RngCore);

    /// Named scalar parameters, empty for non-parametric variations.
    fn params(&self) -> Vec<Param> {
        Vec::new()
    }

    /// Sets a named parameter, returning `false` if the name is unknown.
    fn set_param(&mut self, _name: &str, _value: f32) -> bool {
        false
    }

    /// Clones into a boxed trait object.
    fn clone_boxed(&self) -> Box<dyn Variation>;
}

impl Clone for Box<dyn Variation> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

impl std::fmt::Debug for dyn Variation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variation")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("weight", &self.weight())
            .field("category", &self.category())
            .finish()
    }
}
