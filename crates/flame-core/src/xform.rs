//! Xforms: one affine + variation + post-affine branch of the system.
//!
//! Applying an xform to a point runs the full per-step pipeline:
//! pre-affine, PRE variations, REGULAR variations, POST variations,
//! post-affine, and the color coordinate update. This is the inner core of
//! the chaotic game, so the hot path avoids recomputing anything that can
//! be cached on the xform itself.

use crate::affine::Affine2D;
use crate::point::Point;
use crate::variation::{
    AssignMode, IterHelper, PrecalcFlags, Variation, VariationCategory,
};
use crate::variations::ids;
use rand::RngCore;

/// Magnitude beyond which a coordinate is considered to have escaped.
pub const BAD_VALUE_LIMIT: f32 = 1e10;

/// Marker error for a point whose trajectory escaped or degenerated.
///
/// Handled internally by the iterator's retry policy; it never reaches the
/// renderer's caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadPoint;

/// Periodic function kind for motion elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionFunc {
    /// `sin(2π t)`
    #[default]
    Sin,
    /// Triangle wave with period 1 and amplitude 1.
    Triangle,
    /// `(1 - cos(2π t)) / 2`
    Hill,
}

/// Returns `true` if the coordinate escaped to infinity or degenerated.
#[inline]
pub fn bad_value(v: f32) -> bool {
    !(v.abs() <= BAD_VALUE_LIMIT)
}

/// One branch of the iterated function system.
#[derive(Debug, Clone)]
pub struct Xform {
    /// Pre-variation affine transform.
    pub pre_affine: Affine2D,
    /// Post-variation affine transform.
    pub post_affine: Affine2D,
    /// Selection weight, `>= 0`.
    pub weight: f32,
    /// Palette coordinate this xform pulls the color index toward.
    pub color_x: f32,
    /// Blend rate of the color pull, in `[0, 1]`.
    pub color_speed: f32,
    /// Opacity in `[0, 1]`; 0 means the xform shapes the attractor but
    /// contributes no energy.
    pub opacity: f32,
    /// Whether this xform's affine rotates during animation.
    pub animate: bool,
    /// Weight of the variation-driven color adjustment.
    pub direct_color: f32,
    /// Xaos row: per-destination weight multipliers. Entries beyond the
    /// stored length read as 1, so xaos is absent until explicitly set.
    pub xaos: Vec<f32>,
    /// Motion elements, applied as periodic offsets at interpolation time.
    pub motion: Vec<Xform>,
    /// Motion frequency, meaningful only on elements inside `motion`.
    pub motion_freq: f32,
    /// Motion function, meaningful only on elements inside `motion`.
    pub motion_func: MotionFunc,

    pre_variations: Vec<Box<dyn Variation>>,
    variations: Vec<Box<dyn Variation>>,
    post_variations: Vec<Box<dyn Variation>>,

    // Derived caches, recomputed by cache_color_vals().
    color_speed_cache: f32,
    one_minus_color_cache: f32,
    viz_adjusted: f32,
    regular_flags: PrecalcFlags,
}

impl Xform {
    /// Creates an empty xform with an identity affine and no variations.
    pub fn new() -> Self {
        let mut xf = Self {
            pre_affine: Affine2D::IDENTITY,
            post_affine: Affine2D::IDENTITY,
            weight: 1.0,
            color_x: 0.0,
            color_speed: 0.5,
            opacity: 1.0,
            animate: false,
            direct_color: 1.0,
            xaos: Vec::new(),
            motion: Vec::new(),
            motion_freq: 0.0,
            motion_func: MotionFunc::Sin,
            pre_variations: Vec::new(),
            variations: Vec::new(),
            post_variations: Vec::new(),
            color_speed_cache: 0.0,
            one_minus_color_cache: 0.0,
            viz_adjusted: 0.0,
            regular_flags: PrecalcFlags::NONE,
        };
        xf.cache_color_vals();
        xf
    }

    /// Creates an identity xform: unit weight, single `linear(1)`.
    pub fn identity() -> Self {
        let mut xf = Self::new();
        xf.add_variation(crate::variations::linear(1.0));
        xf
    }

    /// Adds a variation, routing it to the list for its category.
    ///
    /// A flatten stays last in its list and only one is kept per category;
    /// adding a second one replaces the first.
    pub fn add_variation(&mut self, v: Box<dyn Variation>) {
        let list = match v.category() {
            VariationCategory::Pre => &mut self.pre_variations,
            VariationCategory::Regular => &mut self.variations,
            VariationCategory::Post => &mut self.post_variations,
        };
        if v.id() == ids::FLATTEN {
            list.retain(|existing| existing.id() != ids::FLATTEN);
            list.push(v);
        } else if let Some(pos) = list.iter().position(|e| e.id() == ids::FLATTEN) {
            list.insert(pos, v);
        } else {
            list.push(v);
        }
        self.update_precalc_flags();
    }

    /// Removes every variation with the given id from all three lists.
    pub fn delete_variation(&mut self, id: u32) {
        self.pre_variations.retain(|v| v.id() != id);
        self.variations.retain(|v| v.id() != id);
        self.post_variations.retain(|v| v.id() != id);
        self.update_precalc_flags();
    }

    /// Clears all variation lists.
    pub fn clear_variations(&mut self) {
        self.pre_variations.clear();
        self.variations.clear();
        self.post_variations.clear();
        self.regular_flags = PrecalcFlags::NONE;
    }

    /// Returns the variation with the given id from any list, if present.
    pub fn variation_by_id(&self, id: u32) -> Option<&dyn Variation> {
        self.all_variations().find(|v| v.id() == id)
    }

    /// Mutable lookup across all three lists.
    pub fn variation_by_id_mut(&mut self, id: u32) -> Option<&mut Box<dyn Variation>> {
        self.pre_variations
            .iter_mut()
            .chain(self.variations.iter_mut())
            .chain(self.post_variations.iter_mut())
            .find(|v| v.id() == id)
    }

    /// Iterates over all variations, pre then regular then post.
    pub fn all_variations(&self) -> impl Iterator<Item = &dyn Variation> {
        self.pre_variations
            .iter()
            .chain(self.variations.iter())
            .chain(self.post_variations.iter())
            .map(|v| v.as_ref())
    }

    /// The PRE-category list.
    #[inline]
    pub fn pre_variations(&self) -> &[Box<dyn Variation>] {
        &self.pre_variations
    }

    /// The REGULAR-category list.
    #[inline]
    pub fn variations(&self) -> &[Box<dyn Variation>] {
        &self.variations
    }

    /// The POST-category list.
    #[inline]
    pub fn post_variations(&self) -> &[Box<dyn Variation>] {
        &self.post_variations
    }

    /// Returns `true` if no variations are present in any list.
    pub fn has_no_variations(&self) -> bool {
        self.pre_variations.is_empty()
            && self.variations.is_empty()
            && self.post_variations.is_empty()
    }

    /// Normalizes the REGULAR variation weights to sum to 1.
    pub fn normalize_variation_weights(&mut self) {
        let sum: f32 = self.variations.iter().map(|v| v.weight()).sum();
        if sum != 0.0 {
            for v in &mut self.variations {
                let w = v.weight() / sum;
                v.set_weight(w);
            }
        }
    }

    /// Xaos multiplier toward destination xform `i`.
    ///
    /// Out-of-range reads return 1 so xaos is only in effect where it was
    /// explicitly provided.
    #[inline]
    pub fn xaos(&self, i: usize) -> f32 {
        self.xaos.get(i).copied().unwrap_or(1.0)
    }

    /// Sets the xaos multiplier toward destination `i`, growing the row
    /// with implicit 1 entries as needed.
    pub fn set_xaos(&mut self, i: usize, value: f32) {
        if self.xaos.len() <= i {
            self.xaos.resize(i + 1, 1.0);
        }
        self.xaos[i] = value;
    }

    /// Returns `true` if any stored xaos entry differs from 1.
    pub fn xaos_active(&self) -> bool {
        self.xaos.iter().any(|&v| v != 1.0)
    }

    /// Recomputes the caches derived from the color fields.
    ///
    /// Must be called after mutating `color_x`, `color_speed` or
    /// `opacity`. Calling it repeatedly is harmless; the caches are pure
    /// functions of those fields.
    pub fn cache_color_vals(&mut self) {
        self.color_speed_cache = self.color_speed * self.color_x;
        self.one_minus_color_cache = 1.0 - self.color_speed;
        self.viz_adjusted = adjust_opacity(self.opacity);
    }

    /// The adjusted opacity this xform stamps on the points it emits.
    #[inline]
    pub fn viz_adjusted(&self) -> f32 {
        self.viz_adjusted
    }

    /// Cached `color_speed * color_x`.
    #[inline]
    pub fn color_speed_cache(&self) -> f32 {
        self.color_speed_cache
    }

    /// Cached `1 - color_speed`.
    #[inline]
    pub fn one_minus_color_cache(&self) -> f32 {
        self.one_minus_color_cache
    }

    fn update_precalc_flags(&mut self) {
        let mut flags = PrecalcFlags::NONE;
        for v in &self.variations {
            flags |= v.precalc_flags();
        }
        self.regular_flags = flags;
    }

    /// Applies this xform to `input`, writing the result to `out`.
    ///
    /// `input` and `out` may alias in the caller by passing the same point
    /// twice through a copy; the function itself takes them separately.
    /// Returns `Err(BadPoint)` when the output x or y escaped past
    /// [`BAD_VALUE_LIMIT`] or went NaN.
    pub fn apply(
        &self,
        input: &Point,
        out: &mut Point,
        rng: &mut dyn RngCore,
    ) -> Result<(), BadPoint> {
        // Local so concurrent callers never clobber each other.
        let mut helper = IterHelper::default();

        out.viz_adjusted = self.viz_adjusted;
        out.color_index = self.color_speed_cache + self.one_minus_color_cache * input.color_index;
        helper.color = out.color_index;

        if !self.pre_variations.is_empty() || !self.variations.is_empty() {
            // The affine-transformed values feed the variations and stay
            // fixed afterwards, except under PRE variations.
            let (mut tx, mut ty) = self.pre_affine.apply(input.x, input.y);
            let mut tz = input.z;

            for v in &self.pre_variations {
                helper.in_x = tx;
                helper.in_y = ty;
                helper.in_z = tz;
                helper.precalc(v.precalc_flags());
                v.eval(&mut helper, rng);
                match v.assign_mode() {
                    AssignMode::Sum => {
                        tx += helper.out[0];
                        ty += helper.out[1];
                        tz += helper.out[2];
                    }
                    AssignMode::Set => {
                        tx = helper.out[0];
                        ty = helper.out[1];
                        tz = helper.out[2];
                    }
                }
            }

            if !self.variations.is_empty() {
                helper.in_x = tx;
                helper.in_y = ty;
                helper.in_z = tz;
                helper.precalc(self.regular_flags);

                out.x = 0.0;
                out.y = 0.0;
                out.z = 0.0;
                for v in &self.variations {
                    v.eval(&mut helper, rng);
                    out.x += helper.out[0];
                    out.y += helper.out[1];
                    out.z += helper.out[2];
                }
            } else {
                out.x = tx;
                out.y = ty;
                out.z = tz;
            }
        } else {
            let (x, y) = self.pre_affine.apply(input.x, input.y);
            out.x = x;
            out.y = y;
            out.z = input.z;
        }

        for v in &self.post_variations {
            helper.in_x = out.x;
            helper.in_y = out.y;
            helper.in_z = out.z;
            helper.precalc(v.precalc_flags());
            v.eval(&mut helper, rng);
            match v.assign_mode() {
                AssignMode::Sum => {
                    out.x += helper.out[0];
                    out.y += helper.out[1];
                    out.z += helper.out[2];
                }
                AssignMode::Set => {
                    out.x = helper.out[0];
                    out.y = helper.out[1];
                    out.z = helper.out[2];
                }
            }
        }

        if !self.post_affine.is_identity() {
            let (x, y) = self.post_affine.apply(out.x, out.y);
            out.x = x;
            out.y = y;
        }

        out.color_index += self.direct_color * (helper.color - out.color_index);

        if bad_value(out.x) || bad_value(out.y) {
            Err(BadPoint)
        } else {
            Ok(())
        }
    }
}

impl Default for Xform {
    fn default() -> Self {
        Self::new()
    }
}

/// Transforms an opacity so invisible xforms contribute nothing while
/// fully opaque ones contribute 1, with a steep rolloff in between.
#[inline]
pub fn adjust_opacity(opacity: f32) -> f32 {
    if opacity == 0.0 {
        0.0
    } else {
        10.0_f32.powf(-(1.0 / opacity).ln() / 2.0_f32.ln())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variations::{self, ids};
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    fn rng() -> XorShiftRng {
        XorShiftRng::seed_from_u64(42)
    }

    #[test]
    fn test_identity_apply() {
        let xf = Xform::identity();
        let input = Point::new(0.25, -0.5, 0.0);
        let mut out = Point::default();
        xf.apply(&input, &mut out, &mut rng()).unwrap();
        assert_relative_eq!(out.x, 0.25);
        assert_relative_eq!(out.y, -0.5);
    }

    #[test]
    fn test_affine_only_fast_path() {
        // No variations at all: only the pre affine runs.
        let mut xf = Xform::new();
        xf.pre_affine = Affine2D::new(0.5, 0.0, 0.5, 0.0, 0.5, 0.0);
        let input = Point::new(1.0, 1.0, 0.0);
        let mut out = Point::default();
        xf.apply(&input, &mut out, &mut rng()).unwrap();
        assert_relative_eq!(out.x, 1.0);
        assert_relative_eq!(out.y, 0.5);
    }

    #[test]
    fn test_color_update() {
        let mut xf = Xform::identity();
        xf.color_x = 1.0;
        xf.color_speed = 0.5;
        xf.cache_color_vals();
        let input = Point::new(0.0, 0.0, 0.0);
        let mut out = Point::default();
        xf.apply(&input, &mut out, &mut rng()).unwrap();
        // 0.5 * 1.0 + 0.5 * 0.0
        assert_relative_eq!(out.color_index, 0.5);
    }

    #[test]
    fn test_cache_color_vals_idempotent() {
        let mut xf = Xform::identity();
        xf.color_x = 0.7;
        xf.color_speed = 0.3;
        xf.opacity = 0.6;
        xf.cache_color_vals();
        let first = (
            xf.color_speed_cache(),
            xf.one_minus_color_cache(),
            xf.viz_adjusted(),
        );
        xf.cache_color_vals();
        let second = (
            xf.color_speed_cache(),
            xf.one_minus_color_cache(),
            xf.viz_adjusted(),
        );
        assert_eq!(first, second);
    }

    #[test]
    fn test_adjust_opacity_endpoints() {
        assert_eq!(adjust_opacity(0.0), 0.0);
        assert_relative_eq!(adjust_opacity(1.0), 1.0, epsilon = 1e-6);
        let half = adjust_opacity(0.5);
        assert!(half > 0.0 && half < 0.5);
    }

    #[test]
    fn test_post_affine_skipped_when_identity() {
        let mut xf = Xform::identity();
        xf.post_affine = Affine2D::IDENTITY;
        let input = Point::new(0.1, 0.2, 0.0);
        let mut out = Point::default();
        xf.apply(&input, &mut out, &mut rng()).unwrap();
        assert_relative_eq!(out.x, 0.1);

        xf.post_affine = Affine2D::new(2.0, 0.0, 0.0, 0.0, 2.0, 0.0);
        xf.apply(&input, &mut out, &mut rng()).unwrap();
        assert_relative_eq!(out.x, 0.2);
        assert_relative_eq!(out.y, 0.4);
    }

    #[test]
    fn test_bad_value_detection() {
        assert!(bad_value(f32::NAN));
        assert!(bad_value(2e10));
        assert!(bad_value(-2e10));
        assert!(!bad_value(0.0));
        assert!(!bad_value(9.9e9));
    }

    #[test]
    fn test_bad_point_returned() {
        // An exponential blowup: scale by 1e9 with a starting point at 100.
        let mut xf = Xform::new();
        xf.pre_affine = Affine2D::new(1e9, 0.0, 0.0, 0.0, 1e9, 0.0);
        xf.add_variation(variations::linear(1.0));
        let input = Point::new(100.0, 100.0, 0.0);
        let mut out = Point::default();
        assert_eq!(xf.apply(&input, &mut out, &mut rng()), Err(BadPoint));
    }

    #[test]
    fn test_xaos_default_one() {
        let xf = Xform::new();
        assert_eq!(xf.xaos(0), 1.0);
        assert_eq!(xf.xaos(99), 1.0);
        assert!(!xf.xaos_active());
    }

    #[test]
    fn test_xaos_set_grows_row() {
        let mut xf = Xform::new();
        xf.set_xaos(2, 0.0);
        assert_eq!(xf.xaos(0), 1.0);
        assert_eq!(xf.xaos(1), 1.0);
        assert_eq!(xf.xaos(2), 0.0);
        assert!(xf.xaos_active());
    }

    #[test]
    fn test_flatten_stays_last() {
        let mut xf = Xform::new();
        xf.add_variation(variations::create(ids::FLATTEN, 1.0).unwrap());
        xf.add_variation(variations::create(ids::FLATTEN, 0.5).unwrap());
        // Only one flatten survives.
        let flatten_count = xf
            .post_variations()
            .iter()
            .filter(|v| v.id() == ids::FLATTEN)
            .count();
        assert_eq!(flatten_count, 1);
    }

    #[test]
    fn test_regular_variations_sum() {
        // Two linear(0.5) sum to identity.
        let mut xf = Xform::new();
        xf.add_variation(variations::linear(0.5));
        xf.add_variation(variations::linear(0.5));
        let input = Point::new(0.8, -0.4, 0.0);
        let mut out = Point::default();
        xf.apply(&input, &mut out, &mut rng()).unwrap();
        assert_relative_eq!(out.x, 0.8, epsilon = 1e-6);
        assert_relative_eq!(out.y, -0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_normalize_variation_weights() {
        let mut xf = Xform::new();
        xf.add_variation(variations::linear(2.0));
        xf.add_variation(variations::linear(6.0));
        xf.normalize_variation_weights();
        let weights: Vec<f32> = xf.variations().iter().map(|v| v.weight()).collect();
        assert_relative_eq!(weights[0], 0.25);
        assert_relative_eq!(weights[1], 0.75);
    }
}
