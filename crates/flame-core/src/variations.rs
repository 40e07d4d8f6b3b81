//! The built-in variation catalog.
//!
//! A representative set of the classic flame variations: the parameterless
//! waveforms are table-driven through [`SimpleVariation`], the parametric
//! ones get their own types so their parameter blocks can participate in
//! interpolation. The full historical catalog runs to a hundred entries;
//! anything not listed here plugs in through the [`Variation`] trait from
//! the outside.
//!
//! Ids are stable and follow the classic ordering so definitions exported
//! from other tools keep their meaning.

use crate::variation::{
    AssignMode, EPS, IterHelper, Param, PrecalcFlags, Variation, VariationCategory,
};
use rand::RngCore;
use std::f32::consts::{FRAC_PI_4, PI};

/// Stable numeric ids for the built-in catalog.
pub mod ids {
    /// `linear`
    pub const LINEAR: u32 = 0;
    /// `sinusoidal`
    pub const SINUSOIDAL: u32 = 1;
    /// `spherical`
    pub const SPHERICAL: u32 = 2;
    /// `swirl`
    pub const SWIRL: u32 = 3;
    /// `horseshoe`
    pub const HORSESHOE: u32 = 4;
    /// `polar`
    pub const POLAR: u32 = 5;
    /// `handkerchief`
    pub const HANDKERCHIEF: u32 = 6;
    /// `heart`
    pub const HEART: u32 = 7;
    /// `disc`
    pub const DISC: u32 = 8;
    /// `spiral`
    pub const SPIRAL: u32 = 9;
    /// `hyperbolic`
    pub const HYPERBOLIC: u32 = 10;
    /// `diamond`
    pub const DIAMOND: u32 = 11;
    /// `julia`
    pub const JULIA: u32 = 13;
    /// `bent`
    pub const BENT: u32 = 14;
    /// `fisheye`
    pub const FISHEYE: u32 = 16;
    /// `exponential`
    pub const EXPONENTIAL: u32 = 18;
    /// `blob`
    pub const BLOB: u32 = 23;
    /// `fan2`
    pub const FAN2: u32 = 25;
    /// `rings2`
    pub const RINGS2: u32 = 26;
    /// `perspective`
    pub const PERSPECTIVE: u32 = 30;
    /// `julian`
    pub const JULIAN: u32 = 32;
    /// `ngon`
    pub const NGON: u32 = 38;
    /// `curl`
    pub const CURL: u32 = 39;
    /// `rectangles`
    pub const RECTANGLES: u32 = 40;
    /// `super_shape`
    pub const SUPER_SHAPE: u32 = 50;
    /// `pre_blur`
    pub const PRE_BLUR: u32 = 67;
    /// `flatten`
    pub const FLATTEN: u32 = 68;
}

type EvalFn = fn(&mut IterHelper, f32, &mut dyn RngCore);

/// A parameterless variation driven by a function pointer.
#[derive(Clone)]
pub struct SimpleVariation {
    id: u32,
    name: &'static str,
    weight: f32,
    category: VariationCategory,
    assign: AssignMode,
    flags: PrecalcFlags,
    func: EvalFn,
}

impl SimpleVariation {
    /// Moves this variation to a different pipeline position.
    pub fn with_category(mut self, category: VariationCategory) -> Self {
        self.category = category;
        self
    }

    /// Changes the write-back mode used in pre/post positions.
    pub fn with_assign(mut self, assign: AssignMode) -> Self {
        self.assign = assign;
        self
    }

    /// Replaces the weight, builder style.
    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }
}

impl Variation for SimpleVariation {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn weight(&self) -> f32 {
        self.weight
    }

    fn set_weight(&mut self, weight: f32) {
        self.weight = weight;
    }

    fn category(&self) -> VariationCategory {
        self.category
    }

    fn assign_mode(&self) -> AssignMode {
        self.assign
    }

    fn precalc_flags(&self) -> PrecalcFlags {
        self.flags
    }

    fn eval(&self, helper: &mut IterHelper, rng: &mut dyn RngCore) {
        (self.func)(helper, self.weight, rng)
    }

    fn clone_boxed(&self) -> Box<dyn Variation> {
        Box::new(self.clone())
    }
}

fn rand01(rng: &mut dyn RngCore) -> f32 {
    (rng.next_u32() >> 8) as f32 / (1u32 << 24) as f32
}

fn v_linear(h: &mut IterHelper, w: f32, _rng: &mut dyn RngCore) {
    h.out = [w * h.in_x, w * h.in_y, w * h.in_z];
}

fn v_sinusoidal(h: &mut IterHelper, w: f32, _rng: &mut dyn RngCore) {
    h.out = [w * h.in_x.sin(), w * h.in_y.sin(), w * h.in_z];
}

fn v_spherical(h: &mut IterHelper, w: f32, _rng: &mut dyn RngCore) {
    let r2 = w / (h.sum_squares + EPS);
    h.out = [r2 * h.in_x, r2 * h.in_y, w * h.in_z];
}

fn v_swirl(h: &mut IterHelper, w: f32, _rng: &mut dyn RngCore) {
    let (sr, cr) = h.sum_squares.sin_cos();
    h.out = [
        w * (sr * h.in_x - cr * h.in_y),
        w * (cr * h.in_x + sr * h.in_y),
        w * h.in_z,
    ];
}

fn v_horseshoe(h: &mut IterHelper, w: f32, _rng: &mut dyn RngCore) {
    let r = w / (h.sqrt_sum_squares + EPS);
    h.out = [
        r * (h.in_x - h.in_y) * (h.in_x + h.in_y),
        r * 2.0 * h.in_x * h.in_y,
        w * h.in_z,
    ];
}

fn v_polar(h: &mut IterHelper, w: f32, _rng: &mut dyn RngCore) {
    h.out = [
        w * h.atan_xy / PI,
        w * (h.sqrt_sum_squares - 1.0),
        w * h.in_z,
    ];
}

fn v_handkerchief(h: &mut IterHelper, w: f32, _rng: &mut dyn RngCore) {
    let a = h.atan_xy;
    let r = h.sqrt_sum_squares;
    h.out = [w * r * (a + r).sin(), w * r * (a - r).cos(), w * h.in_z];
}

fn v_heart(h: &mut IterHelper, w: f32, _rng: &mut dyn RngCore) {
    let a = h.atan_xy * h.sqrt_sum_squares;
    let r = w * h.sqrt_sum_squares;
    h.out = [r * a.sin(), -r * a.cos(), w * h.in_z];
}

fn v_disc(h: &mut IterHelper, w: f32, _rng: &mut dyn RngCore) {
    let a = h.atan_xy * (1.0 / PI);
    let r = PI * h.sqrt_sum_squares;
    h.out = [w * a * r.sin(), w * a * r.cos(), w * h.in_z];
}

fn v_spiral(h: &mut IterHelper, w: f32, _rng: &mut dyn RngCore) {
    let r = h.sqrt_sum_squares + EPS;
    let r1 = w / r;
    h.out = [
        r1 * (h.cos_a + r.sin()),
        r1 * (h.sin_a - r.cos()),
        w * h.in_z,
    ];
}

fn v_hyperbolic(h: &mut IterHelper, w: f32, _rng: &mut dyn RngCore) {
    let r = h.sqrt_sum_squares + EPS;
    h.out = [w * h.sin_a / r, w * h.cos_a * r, w * h.in_z];
}

fn v_diamond(h: &mut IterHelper, w: f32, _rng: &mut dyn RngCore) {
    let r = h.sqrt_sum_squares;
    h.out = [
        w * h.sin_a * r.cos(),
        w * h.cos_a * r.sin(),
        w * h.in_z,
    ];
}

fn v_julia(h: &mut IterHelper, w: f32, rng: &mut dyn RngCore) {
    let mut a = 0.5 * h.atan_xy;
    if rng.next_u32() & 1 != 0 {
        a += PI;
    }
    let r = w * h.sqrt_sum_squares.sqrt();
    h.out = [r * a.cos(), r * a.sin(), w * h.in_z];
}

fn v_bent(h: &mut IterHelper, w: f32, _rng: &mut dyn RngCore) {
    let nx = if h.in_x < 0.0 { h.in_x * 2.0 } else { h.in_x };
    let ny = if h.in_y < 0.0 { h.in_y * 0.5 } else { h.in_y };
    h.out = [w * nx, w * ny, w * h.in_z];
}

fn v_fisheye(h: &mut IterHelper, w: f32, _rng: &mut dyn RngCore) {
    let r = 2.0 * w / (h.sqrt_sum_squares + 1.0);
    // The historical formula swaps the axes.
    h.out = [r * h.in_y, r * h.in_x, w * h.in_z];
}

fn v_exponential(h: &mut IterHelper, w: f32, _rng: &mut dyn RngCore) {
    let d = w * (h.in_x - 1.0).exp();
    let a = PI * h.in_y;
    h.out = [d * a.cos(), d * a.sin(), w * h.in_z];
}

fn v_pre_blur(h: &mut IterHelper, w: f32, rng: &mut dyn RngCore) {
    // Approximate Gaussian from four uniforms, matching the classic kernel.
    let g = rand01(rng) + rand01(rng) + rand01(rng) + rand01(rng) - 2.0;
    let a = rand01(rng) * 2.0 * PI;
    let r = w * g;
    h.out = [r * a.cos(), r * a.sin(), 0.0];
}

fn v_flatten(h: &mut IterHelper, w: f32, _rng: &mut dyn RngCore) {
    h.out = [w * h.in_x, w * h.in_y, 0.0];
}

/// Creates a parameterless catalog variation by id.
fn simple(id: u32, weight: f32) -> Option<SimpleVariation> {
    use PrecalcFlags as F;
    let (name, flags, func, category, assign): (
        &'static str,
        PrecalcFlags,
        EvalFn,
        VariationCategory,
        AssignMode,
    ) = match id {
        ids::LINEAR => ("linear", F::NONE, v_linear, VariationCategory::Regular, AssignMode::Sum),
        ids::SINUSOIDAL => ("sinusoidal", F::NONE, v_sinusoidal, VariationCategory::Regular, AssignMode::Sum),
        ids::SPHERICAL => ("spherical", F::SUM_SQUARES, v_spherical, VariationCategory::Regular, AssignMode::Sum),
        ids::SWIRL => ("swirl", F::SUM_SQUARES, v_swirl, VariationCategory::Regular, AssignMode::Sum),
        ids::HORSESHOE => ("horseshoe", F::SQRT_SUM_SQUARES, v_horseshoe, VariationCategory::Regular, AssignMode::Sum),
        ids::POLAR => ("polar", F::SQRT_SUM_SQUARES | F::ATAN_XY, v_polar, VariationCategory::Regular, AssignMode::Sum),
        ids::HANDKERCHIEF => ("handkerchief", F::SQRT_SUM_SQUARES | F::ATAN_XY, v_handkerchief, VariationCategory::Regular, AssignMode::Sum),
        ids::HEART => ("heart", F::SQRT_SUM_SQUARES | F::ATAN_XY, v_heart, VariationCategory::Regular, AssignMode::Sum),
        ids::DISC => ("disc", F::SQRT_SUM_SQUARES | F::ATAN_XY, v_disc, VariationCategory::Regular, AssignMode::Sum),
        ids::SPIRAL => ("spiral", F::ANGLES, v_spiral, VariationCategory::Regular, AssignMode::Sum),
        ids::HYPERBOLIC => ("hyperbolic", F::ANGLES, v_hyperbolic, VariationCategory::Regular, AssignMode::Sum),
        ids::DIAMOND => ("diamond", F::ANGLES, v_diamond, VariationCategory::Regular, AssignMode::Sum),
        ids::JULIA => ("julia", F::SQRT_SUM_SQUARES | F::ATAN_XY, v_julia, VariationCategory::Regular, AssignMode::Sum),
        ids::BENT => ("bent", F::NONE, v_bent, VariationCategory::Regular, AssignMode::Sum),
        ids::FISHEYE => ("fisheye", F::SQRT_SUM_SQUARES, v_fisheye, VariationCategory::Regular, AssignMode::Sum),
        ids::EXPONENTIAL => ("exponential", F::NONE, v_exponential, VariationCategory::Regular, AssignMode::Sum),
        ids::PRE_BLUR => ("pre_blur", F::NONE, v_pre_blur, VariationCategory::Pre, AssignMode::Sum),
        ids::FLATTEN => ("flatten", F::NONE, v_flatten, VariationCategory::Post, AssignMode::Set),
        _ => return None,
    };
    Some(SimpleVariation {
        id,
        name,
        weight,
        category,
        assign,
        flags,
        func,
    })
}

/// Declares a parametric variation type with interpolatable parameters.
macro_rules! parametric {
    (
        $(#[$doc:meta])*
        $ty:ident, $id:expr, $vname:literal, $flags:expr,
        params { $($pname:ident : $plit:literal = $pdefault:expr),+ $(,)? },
        |$self_:ident, $h:ident, $w:ident, $rng:ident| $body:block
    ) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $ty {
            weight: f32,
            $(pub $pname: f32,)+
        }

        impl $ty {
            /// Creates the variation with default parameters.
            pub fn new(weight: f32) -> Self {
                Self {
                    weight,
                    $($pname: $pdefault,)+
                }
            }
        }

        impl Variation for $ty {
            fn id(&self) -> u32 {
                $id
            }

            fn name(&self) -> &'static str {
                $vname
            }

            fn weight(&self) -> f32 {
                self.weight
            }

            fn set_weight(&mut self, weight: f32) {
                self.weight = weight;
            }

            fn category(&self) -> VariationCategory {
                VariationCategory::Regular
            }

            fn precalc_flags(&self) -> PrecalcFlags {
                $flags
            }

            #[allow(unused_variables)]
            fn eval(&self, $h: &mut IterHelper, $rng: &mut dyn RngCore) {
                let $self_ = self;
                let $w = self.weight;
                $body
            }

            fn params(&self) -> Vec<Param> {
                vec![$(Param { name: $plit, value: self.$pname },)+]
            }

            fn set_param(&mut self, name: &str, value: f32) -> bool {
                match name {
                    $($plit => {
                        self.$pname = value;
                        true
                    })+
                    _ => false,
                }
            }

            fn clone_boxed(&self) -> Box<dyn Variation> {
                Box::new(self.clone())
            }
        }
    };
}

parametric!(
    /// Pulses the radius with a sine of the angle.
    Blob, ids::BLOB, "blob", PrecalcFlags::ANGLES | PrecalcFlags::ATAN_XY,
    params { low: "blob_low" = 0.2, high: "blob_high" = 1.0, waves: "blob_waves" = 4.0 },
    |v, h, w, rng| {
        let r = h.sqrt_sum_squares
            * (v.low + (v.high - v.low) * (0.5 + 0.5 * (v.waves * h.atan_xy).sin()));
        h.out = [w * h.sin_a * r, w * h.cos_a * r, w * h.in_z];
    }
);

parametric!(
    /// Folds the angle into blades.
    Fan2, ids::FAN2, "fan2", PrecalcFlags::SQRT_SUM_SQUARES | PrecalcFlags::ATAN_XY,
    params { x: "fan2_x" = 0.5, y: "fan2_y" = 1.0 },
    |v, h, w, rng| {
        let dy = v.y;
        let dx = PI * (v.x * v.x + EPS);
        let dx2 = 0.5 * dx;
        let mut a = h.atan_xy;
        let r = w * h.sqrt_sum_squares;
        let t = a + dy - dx * ((a + dy) / dx).floor();
        if t > dx2 {
            a -= dx2;
        } else {
            a += dx2;
        }
        h.out = [r * a.sin(), r * a.cos(), w * h.in_z];
    }
);

parametric!(
    /// Concentric ring folding.
    Rings2, ids::RINGS2, "rings2", PrecalcFlags::ANGLES,
    params { val: "rings2_val" = 0.5 },
    |v, h, w, rng| {
        let dx = v.val * v.val + EPS;
        let mut r = h.sqrt_sum_squares;
        r += -2.0 * dx * ((r + dx) / (2.0 * dx)).floor() + r * (1.0 - dx);
        h.out = [w * h.sin_a * r, w * h.cos_a * r, w * h.in_z];
    }
);

parametric!(
    /// Julia set of arbitrary power and distance.
    JuliaN, ids::JULIAN, "julian",
    PrecalcFlags::SUM_SQUARES | PrecalcFlags::ATAN_YX,
    params { power: "julian_power" = 1.0, dist: "julian_dist" = 1.0 },
    |v, h, w, rng| {
        let power = if v.power == 0.0 { 1.0 } else { v.power };
        let t = (rand01(rng) * power.abs()).trunc();
        let a = (h.atan_yx + 2.0 * PI * t) / power;
        let r = w * h.sum_squares.powf(v.dist / power * 0.5);
        h.out = [r * a.cos(), r * a.sin(), w * h.in_z];
    }
);

parametric!(
    /// Maps the plane onto a regular polygon.
    Ngon, ids::NGON, "ngon",
    PrecalcFlags::SUM_SQUARES | PrecalcFlags::ATAN_YX,
    params {
        sides: "ngon_sides" = 5.0,
        power: "ngon_power" = 3.0,
        circle: "ngon_circle" = 1.0,
        corners: "ngon_corners" = 2.0,
    },
    |v, h, w, rng| {
        let r_factor = h.sum_squares.powf(v.power * 0.5);
        let b = 2.0 * PI / v.sides.max(1.0);
        let mut phi = h.atan_yx - b * (h.atan_yx / b).floor();
        if phi > b * 0.5 {
            phi -= b;
        }
        let mut amp = v.corners * (1.0 / (phi.cos() + EPS) - 1.0) + v.circle;
        amp /= r_factor + EPS;
        h.out = [w * h.in_x * amp, w * h.in_y * amp, w * h.in_z];
    }
);

parametric!(
    /// Complex reciprocal curl.
    Curl, ids::CURL, "curl", PrecalcFlags::NONE,
    params { c1: "curl_c1" = 1.0, c2: "curl_c2" = 0.0 },
    |v, h, w, rng| {
        let re = 1.0 + v.c1 * h.in_x + v.c2 * (h.in_x * h.in_x - h.in_y * h.in_y);
        let im = v.c1 * h.in_y + 2.0 * v.c2 * h.in_x * h.in_y;
        let r = w / (re * re + im * im + EPS);
        h.out = [
            r * (h.in_x * re + h.in_y * im),
            r * (h.in_y * re - h.in_x * im),
            w * h.in_z,
        ];
    }
);

parametric!(
    /// Tilts the plane as seen from a camera.
    Perspective, ids::PERSPECTIVE, "perspective", PrecalcFlags::NONE,
    params { angle: "perspective_angle" = 0.62, dist: "perspective_dist" = 2.2 },
    |v, h, w, rng| {
        let t = 1.0 / (v.dist - h.in_y * v.angle.sin() + EPS);
        h.out = [
            w * v.dist * h.in_x * t,
            w * v.dist * h.in_y * v.angle.cos() * t,
            w * h.in_z,
        ];
    }
);

parametric!(
    /// Quantizes the plane into rectangles.
    Rectangles, ids::RECTANGLES, "rectangles", PrecalcFlags::NONE,
    params { x: "rectangles_x" = 1.0, y: "rectangles_y" = 1.0 },
    |v, h, w, rng| {
        let nx = if v.x == 0.0 {
            h.in_x
        } else {
            (2.0 * (h.in_x / v.x).floor() + 1.0) * v.x - h.in_x
        };
        let ny = if v.y == 0.0 {
            h.in_y
        } else {
            (2.0 * (h.in_y / v.y).floor() + 1.0) * v.y - h.in_y
        };
        h.out = [w * nx, w * ny, w * h.in_z];
    }
);

parametric!(
    /// Gielis superformula shaping.
    SuperShape, ids::SUPER_SHAPE, "super_shape",
    PrecalcFlags::SQRT_SUM_SQUARES | PrecalcFlags::ATAN_YX,
    params {
        rnd: "super_shape_rnd" = 0.0,
        m: "super_shape_m" = 4.0,
        n1: "super_shape_n1" = 1.0,
        n2: "super_shape_n2" = 1.0,
        n3: "super_shape_n3" = 1.0,
        holes: "super_shape_holes" = 0.0,
    },
    |v, h, w, rng| {
        let theta = v.m * 0.25 * h.atan_yx + FRAC_PI_4;
        let t1 = theta.cos().abs().powf(v.n2);
        let t2 = theta.sin().abs().powf(v.n3);
        let n1 = if v.n1 == 0.0 { EPS } else { v.n1 };
        let r = w
            * ((v.rnd * rand01(rng) + (1.0 - v.rnd) * h.sqrt_sum_squares) - v.holes)
            * (t1 + t2).powf(-1.0 / n1)
            / (h.sqrt_sum_squares + EPS);
        h.out = [r * h.in_x, r * h.in_y, w * h.in_z];
    }
);

/// Creates a catalog variation by id with the given weight.
///
/// Returns `None` for ids outside the built-in catalog.
///
/// # Example
///
/// ```rust
/// use flame_core::variations::{self, ids};
///
/// let v = variations::create(ids::SPHERICAL, 1.0).unwrap();
/// assert_eq!(v.name(), "spherical");
/// ```
pub fn create(id: u32, weight: f32) -> Option<Box<dyn Variation>> {
    if let Some(s) = simple(id, weight) {
        return Some(Box::new(s));
    }
    let v: Box<dyn Variation> = match id {
        ids::BLOB => Box::new(Blob::new(weight)),
        ids::FAN2 => Box::new(Fan2::new(weight)),
        ids::RINGS2 => Box::new(Rings2::new(weight)),
        ids::JULIAN => Box::new(JuliaN::new(weight)),
        ids::NGON => Box::new(Ngon::new(weight)),
        ids::CURL => Box::new(Curl::new(weight)),
        ids::PERSPECTIVE => Box::new(Perspective::new(weight)),
        ids::RECTANGLES => Box::new(Rectangles::new(weight)),
        ids::SUPER_SHAPE => Box::new(SuperShape::new(weight)),
        _ => return None,
    };
    Some(v)
}

/// Creates a catalog variation by name.
pub fn create_named(name: &str, weight: f32) -> Option<Box<dyn Variation>> {
    let id = all_ids().iter().copied().find(|&id| {
        create(id, 0.0).map(|v| v.name() == name).unwrap_or(false)
    })?;
    create(id, weight)
}

/// All ids in the built-in catalog.
pub fn all_ids() -> &'static [u32] {
    &[
        ids::LINEAR,
        ids::SINUSOIDAL,
        ids::SPHERICAL,
        ids::SWIRL,
        ids::HORSESHOE,
        ids::POLAR,
        ids::HANDKERCHIEF,
        ids::HEART,
        ids::DISC,
        ids::SPIRAL,
        ids::HYPERBOLIC,
        ids::DIAMOND,
        ids::JULIA,
        ids::BENT,
        ids::FISHEYE,
        ids::EXPONENTIAL,
        ids::BLOB,
        ids::FAN2,
        ids::RINGS2,
        ids::PERSPECTIVE,
        ids::JULIAN,
        ids::NGON,
        ids::CURL,
        ids::RECTANGLES,
        ids::SUPER_SHAPE,
        ids::PRE_BLUR,
        ids::FLATTEN,
    ]
}

/// Convenience constructor for the workhorse `linear` variation.
pub fn linear(weight: f32) -> Box<dyn Variation> {
    create(ids::LINEAR, weight).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    fn eval_at(v: &dyn Variation, x: f32, y: f32) -> [f32; 3] {
        let mut h = IterHelper {
            in_x: x,
            in_y: y,
            in_z: 0.0,
            ..Default::default()
        };
        h.precalc(v.precalc_flags());
        let mut rng = XorShiftRng::seed_from_u64(1);
        v.eval(&mut h, &mut rng);
        h.out
    }

    #[test]
    fn test_linear_identity() {
        let v = linear(1.0);
        let out = eval_at(v.as_ref(), 0.3, -0.7);
        assert_relative_eq!(out[0], 0.3);
        assert_relative_eq!(out[1], -0.7);
    }

    #[test]
    fn test_linear_weight_scales() {
        let v = linear(-1.0);
        let out = eval_at(v.as_ref(), 0.5, 0.25);
        assert_relative_eq!(out[0], -0.5);
        assert_relative_eq!(out[1], -0.25);
    }

    #[test]
    fn test_spherical_inverts_radius() {
        let v = create(ids::SPHERICAL, 1.0).unwrap();
        // At r² = 4 the point is pulled in by 1/4.
        let out = eval_at(v.as_ref(), 2.0, 0.0);
        assert_relative_eq!(out[0], 0.5, epsilon = 1e-5);
        assert_relative_eq!(out[1], 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_sinusoidal_bounded() {
        let v = create(ids::SINUSOIDAL, 1.0).unwrap();
        for i in -10..10 {
            let out = eval_at(v.as_ref(), i as f32 * 1.7, i as f32 * -0.9);
            assert!(out[0].abs() <= 1.0 && out[1].abs() <= 1.0);
        }
    }

    #[test]
    fn test_catalog_ids_resolve() {
        for &id in all_ids() {
            let v = create(id, 1.0).expect("catalog id must resolve");
            assert_eq!(v.id(), id);
            assert!(!v.name().is_empty());
        }
    }

    #[test]
    fn test_create_named() {
        let v = create_named("ngon", 0.5).unwrap();
        assert_eq!(v.id(), ids::NGON);
        assert_relative_eq!(v.weight(), 0.5);
        assert!(create_named("no_such_variation", 1.0).is_none());
    }

    #[test]
    fn test_parametric_params() {
        let mut v = Blob::new(1.0);
        assert!(v.set_param("blob_waves", 7.0));
        assert!(!v.set_param("blob_bogus", 1.0));
        let p = v.params();
        assert!(p.iter().any(|p| p.name == "blob_waves" && p.value == 7.0));
    }

    #[test]
    fn test_pre_blur_category() {
        let v = create(ids::PRE_BLUR, 1.0).unwrap();
        assert_eq!(v.category(), VariationCategory::Pre);
    }

    #[test]
    fn test_flatten_zeroes_z() {
        let v = create(ids::FLATTEN, 1.0).unwrap();
        let mut h = IterHelper {
            in_x: 1.0,
            in_y: 2.0,
            in_z: 3.0,
            ..Default::default()
        };
        let mut rng = XorShiftRng::seed_from_u64(1);
        v.eval(&mut h, &mut rng);
        assert_eq!(h.out[2], 0.0);
        assert_eq!(v.assign_mode(), AssignMode::Set);
    }

    #[test]
    fn test_rectangles_zero_param_passthrough() {
        let mut v = Rectangles::new(1.0);
        v.x = 0.0;
        v.y = 0.0;
        let out = eval_at(&v, 0.3, 0.4);
        assert_relative_eq!(out[0], 0.3, epsilon = 1e-6);
        assert_relative_eq!(out[1], 0.4, epsilon = 1e-6);
    }
}
