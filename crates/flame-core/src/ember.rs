//! The flame definition record.
//!
//! An [`Ember`] is everything a renderer needs to turn iteration into an
//! image: the xform list, the camera, the palette, and the parameters of
//! every filter stage. Loaders of any on-disk format map into this record;
//! the core never parses files itself.

use crate::error::{Error, Result};
use crate::palette::{Palette, PaletteInterp, PaletteMode};
use crate::point::Point;
use crate::xform::Xform;
use glam::Mat3;
use rand::RngCore;
use std::f32::consts::TAU;

/// Spatial (downsampling) filter kernel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpatialFilterKind {
    /// Gaussian, support 1.5.
    #[default]
    Gaussian,
    /// Hermite cubic, support 1.
    Hermite,
    /// Box, support 0.5.
    Box,
    /// Triangle, support 1.
    Triangle,
    /// Bell (box convolved three times), support 1.5.
    Bell,
    /// Cubic B-spline, support 2.
    BSpline,
    /// Lanczos windowed sinc, 3 lobes.
    Lanczos3,
    /// Lanczos windowed sinc, 2 lobes.
    Lanczos2,
    /// Mitchell-Netravali, support 2.
    Mitchell,
    /// Blackman window, support 1.
    Blackman,
    /// Catmull-Rom, support 2.
    Catrom,
    /// Hamming window, support 1.
    Hamming,
    /// Hanning window, support 1.
    Hanning,
    /// Quadratic, support 1.5.
    Quadratic,
}

/// Temporal (motion blur) filter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemporalFilterKind {
    /// Equal weights.
    #[default]
    Box,
    /// Gaussian falloff from the center sample.
    Gaussian,
    /// Exponential ramp.
    Exp,
}

/// How affines are interpolated between keyframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AffineInterp {
    /// Weighted sum of the six coefficients.
    Linear,
    /// Log-polar decomposition per basis column.
    #[default]
    Log,
}

/// How whole embers are blended between keyframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmberInterp {
    /// Two-keyframe linear blend.
    #[default]
    Linear,
    /// Four-keyframe Catmull-Rom blend.
    Smooth,
}

// Which 3D camera fields are active, as bits.
const PROJ_ZPOS: u32 = 1;
const PROJ_PERSP: u32 = 2;
const PROJ_PITCH: u32 = 4;
const PROJ_YAW: u32 = 8;
const PROJ_BLUR: u32 = 16;

/// A complete flame scene description.
///
/// # Example
///
/// ```rust
/// use flame_core::{Ember, Xform};
///
/// let mut ember = Ember::new(64, 64);
/// ember.add_xform(Xform::identity());
/// assert!(ember.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Ember {
    /// Final image width in pixels.
    pub final_ras_w: usize,
    /// Final image height in pixels.
    pub final_ras_h: usize,
    /// Width the definition was authored at, for aspect preservation.
    pub orig_final_ras_w: usize,
    /// Height the definition was authored at.
    pub orig_final_ras_h: usize,
    /// Pixels-per-unit the definition was authored at.
    pub orig_pix_per_unit: f32,

    /// Supersample factor, 1 to 4.
    pub supersample: usize,
    /// Iterations per final pixel.
    pub quality: f32,
    /// World units to pixels scale.
    pub pixels_per_unit: f32,
    /// Power-of-two zoom; quality compensates automatically.
    pub zoom: f32,
    /// Camera center x in world units.
    pub center_x: f32,
    /// Camera center y in world units.
    pub center_y: f32,
    /// Camera rotation in degrees.
    pub rotate: f32,

    /// 3D camera z position.
    pub cam_z_pos: f32,
    /// 3D perspective strength.
    pub cam_perspective: f32,
    /// 3D yaw in radians.
    pub cam_yaw: f32,
    /// 3D pitch in radians.
    pub cam_pitch: f32,
    /// Depth-of-field blur strength.
    pub cam_depth_blur: f32,

    /// Background color, RGBA in `[0, 1]` premultiplied against nothing.
    pub background: [f32; 4],

    /// Spatial filter kernel.
    pub spatial_filter_kind: SpatialFilterKind,
    /// Spatial filter radius.
    pub spatial_filter_radius: f32,

    /// Density filter minimum radius.
    pub de_min_radius: f32,
    /// Density filter maximum radius; 0 disables density estimation.
    pub de_max_radius: f32,
    /// Density filter decay curve, `> 0`.
    pub de_curve: f32,

    /// Temporal filter kind.
    pub temporal_filter_kind: TemporalFilterKind,
    /// Temporal filter width.
    pub temporal_filter_width: f32,
    /// Temporal filter exponent (Exp kind only).
    pub temporal_filter_exp: f32,
    /// Number of temporal samples per frame.
    pub temporal_samples: usize,

    /// The palette.
    pub palette: Palette,
    /// Palette lookup mode.
    pub palette_mode: PaletteMode,
    /// Palette keyframe interpolation mode.
    pub palette_interp: PaletteInterp,
    /// Affine keyframe interpolation mode.
    pub affine_interp: AffineInterp,
    /// Ember keyframe interpolation mode.
    pub interp: EmberInterp,

    /// Log-density brightness.
    pub brightness: f32,
    /// Display gamma.
    pub gamma: f32,
    /// Gamma linearization threshold.
    pub gamma_threshold: f32,
    /// Vibrancy: how much gamma is applied to the composite rather than
    /// per channel.
    pub vibrancy: f32,
    /// Highlight power; negative preserves the classic clipped look.
    pub highlight_power: f32,

    /// Keyframe time of this ember.
    pub time: f32,

    /// The xform list driving iteration.
    pub xforms: Vec<Xform>,
    /// Optional final xform; applied to emitted samples, never fed back.
    pub final_xform: Option<Xform>,

    cam_mat: Mat3,
    blur_coef: f32,
}

impl Ember {
    /// Creates an ember with the classic default parameters and an empty
    /// xform list.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            final_ras_w: width,
            final_ras_h: height,
            orig_final_ras_w: width,
            orig_final_ras_h: height,
            orig_pix_per_unit: 240.0,
            supersample: 1,
            quality: 100.0,
            pixels_per_unit: 240.0,
            zoom: 0.0,
            center_x: 0.0,
            center_y: 0.0,
            rotate: 0.0,
            cam_z_pos: 0.0,
            cam_perspective: 0.0,
            cam_yaw: 0.0,
            cam_pitch: 0.0,
            cam_depth_blur: 0.0,
            background: [0.0, 0.0, 0.0, 1.0],
            spatial_filter_kind: SpatialFilterKind::Gaussian,
            spatial_filter_radius: 0.5,
            de_min_radius: 0.0,
            de_max_radius: 9.0,
            de_curve: 0.4,
            temporal_filter_kind: TemporalFilterKind::Box,
            temporal_filter_width: 1.0,
            temporal_filter_exp: 0.0,
            temporal_samples: 1,
            palette: Palette::black(),
            palette_mode: PaletteMode::Step,
            palette_interp: PaletteInterp::Hsv,
            affine_interp: AffineInterp::Log,
            interp: EmberInterp::Linear,
            brightness: 4.0,
            gamma: 4.0,
            gamma_threshold: 0.01,
            vibrancy: 1.0,
            highlight_power: -1.0,
            time: 0.0,
            xforms: Vec::new(),
            final_xform: None,
            cam_mat: Mat3::IDENTITY,
            blur_coef: 0.0,
        }
    }

    /// Appends an xform.
    pub fn add_xform(&mut self, xform: Xform) {
        self.xforms.push(xform);
    }

    /// Number of non-final xforms.
    #[inline]
    pub fn xform_count(&self) -> usize {
        self.xforms.len()
    }

    /// Total xform count including the final xform.
    #[inline]
    pub fn total_xform_count(&self) -> usize {
        self.xforms.len() + usize::from(self.final_xform.is_some())
    }

    /// Returns an xform by index, the final xform being addressable one
    /// past the end of the regular list.
    pub fn total_xform(&self, index: usize) -> Option<&Xform> {
        if index < self.xforms.len() {
            self.xforms.get(index)
        } else if index == self.xforms.len() {
            self.final_xform.as_ref()
        } else {
            None
        }
    }

    /// Mutable variant of [`total_xform`](Self::total_xform).
    pub fn total_xform_mut(&mut self, index: usize) -> Option<&mut Xform> {
        if index < self.xforms.len() {
            self.xforms.get_mut(index)
        } else if index == self.xforms.len() {
            self.final_xform.as_mut()
        } else {
            None
        }
    }

    /// Returns `true` if any non-final xform carries an active xaos row.
    pub fn xaos_present(&self) -> bool {
        self.xforms.iter().any(|x| x.xaos_active())
    }

    /// Effective zoom scale, `2^zoom`.
    #[inline]
    pub fn zoom_scale(&self) -> f32 {
        2.0_f32.powf(self.zoom)
    }

    /// Quality compensated for zoom so that zooming in keeps density.
    #[inline]
    pub fn scaled_quality(&self) -> f32 {
        let s = self.zoom_scale();
        self.quality * s * s
    }

    /// Recomputes the caches on every xform and the camera matrix.
    ///
    /// Call once after a definition is assembled or mutated wholesale.
    pub fn finalize(&mut self) {
        for xf in &mut self.xforms {
            xf.cache_color_vals();
        }
        if let Some(fx) = &mut self.final_xform {
            fx.cache_color_vals();
        }
        self.compute_camera();
    }

    /// Which 3D camera fields are in play, as bits.
    fn proj_bits(&self) -> u32 {
        let mut bits = 0;
        if self.cam_z_pos != 0.0 {
            bits |= PROJ_ZPOS;
        }
        if self.cam_perspective != 0.0 {
            bits |= PROJ_PERSP;
        }
        if self.cam_pitch != 0.0 {
            bits |= PROJ_PITCH;
        }
        if self.cam_yaw != 0.0 {
            bits |= PROJ_YAW;
        }
        if self.cam_depth_blur != 0.0 {
            bits |= PROJ_BLUR;
        }
        bits
    }

    /// Returns `true` if any 3D camera field is set.
    #[inline]
    pub fn projection_active(&self) -> bool {
        self.proj_bits() != 0
    }

    /// Rebuilds the yaw/pitch rotation matrix and the blur coefficient.
    pub fn compute_camera(&mut self) {
        let (sy, cy) = (-self.cam_yaw).sin_cos();
        let (sp, cp) = self.cam_pitch.sin_cos();
        // Column-major: columns are the images of the basis vectors.
        self.cam_mat = Mat3::from_cols_array(&[
            cy, cp * sy, sp * sy, // column 0
            -sy, cp * cy, sp * cy, // column 1
            0.0, -sp, cp, // column 2
        ]);
        self.blur_coef = 0.1 * self.cam_depth_blur;
    }

    /// Applies the 3D camera to an emitted sample.
    ///
    /// The iterator calls this on output samples only; the feedback point
    /// stays unprojected. Which terms run depends on which camera fields
    /// are non-zero, matching the reference renderer's specialized paths.
    pub fn project(&self, point: &mut Point, rng: &mut dyn RngCore) {
        let bits = self.proj_bits();
        if bits == 0 {
            return;
        }

        let m = &self.cam_mat;
        let z = point.z - self.cam_z_pos;

        if bits & PROJ_BLUR != 0 {
            let t = rand01(rng) * TAU;
            let (dsin, dcos) = t.sin_cos();
            let (x, y, zc) = if bits & PROJ_YAW != 0 {
                (
                    m.x_axis.x * point.x + m.y_axis.x * point.y,
                    m.x_axis.y * point.x + m.y_axis.y * point.y + m.z_axis.y * z,
                    m.x_axis.z * point.x + m.y_axis.z * point.y + m.z_axis.z * z,
                )
            } else {
                (
                    point.x,
                    m.y_axis.y * point.y + m.z_axis.y * z,
                    m.y_axis.z * point.y + m.z_axis.z * z,
                )
            };
            let zr = zeps(1.0 - self.cam_perspective * zc);
            let dr = rand01(rng) * self.blur_coef * zc;
            point.x = (x + dr * dcos) / zr;
            point.y = (y + dr * dsin) / zr;
        } else if bits & (PROJ_PITCH | PROJ_YAW) != 0 {
            let (x, y, zc) = if bits & PROJ_YAW != 0 {
                (
                    m.x_axis.x * point.x + m.y_axis.x * point.y,
                    m.x_axis.y * point.x + m.y_axis.y * point.y + m.z_axis.y * z,
                    m.x_axis.z * point.x + m.y_axis.z * point.y + m.z_axis.z * z,
                )
            } else {
                (
                    point.x,
                    m.y_axis.y * point.y + m.z_axis.y * z,
                    m.y_axis.z * point.y + m.z_axis.z * z,
                )
            };
            let zr = zeps(1.0 - self.cam_perspective * zc);
            point.x = x / zr;
            point.y = y / zr;
        } else {
            let zr = zeps(1.0 - self.cam_perspective * z);
            point.x /= zr;
            point.y /= zr;
        }

        point.z -= self.cam_z_pos;
    }

    /// Validates the definition, returning the first problem found.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigInvalid`] when the definition cannot be rendered.
    pub fn validate(&self) -> Result<()> {
        if self.final_ras_w == 0 || self.final_ras_h == 0 {
            return Err(Error::config_invalid(format!(
                "final raster {}x{} has zero area",
                self.final_ras_w, self.final_ras_h
            )));
        }
        if !(1..=4).contains(&self.supersample) {
            return Err(Error::config_invalid(format!(
                "supersample {} outside 1..=4",
                self.supersample
            )));
        }
        if self.xforms.is_empty() {
            return Err(Error::config_invalid("ember has no xforms"));
        }
        if self.xforms.iter().all(|x| x.weight <= 0.0) {
            return Err(Error::config_invalid("all xform weights are zero"));
        }
        if self.xforms.iter().any(|x| x.weight < 0.0) {
            return Err(Error::config_invalid("negative xform weight"));
        }
        if self.de_max_radius > 0.0 && self.de_max_radius < self.de_min_radius {
            return Err(Error::config_invalid(format!(
                "density filter max radius {} below min radius {}",
                self.de_max_radius, self.de_min_radius
            )));
        }
        if self.de_curve <= 0.0 {
            return Err(Error::config_invalid("density filter curve must be > 0"));
        }
        if self.quality <= 0.0 {
            return Err(Error::config_invalid("quality must be > 0"));
        }
        if self.pixels_per_unit <= 0.0 {
            return Err(Error::config_invalid("pixels-per-unit must be > 0"));
        }
        if self.temporal_samples == 0 {
            return Err(Error::config_invalid("temporal samples must be >= 1"));
        }
        Ok(())
    }
}

#[inline]
fn zeps(v: f32) -> f32 {
    if v == 0.0 { 1e-10 } else { v }
}

#[inline]
fn rand01(rng: &mut dyn RngCore) -> f32 {
    (rng.next_u32() >> 8) as f32 / (1u32 << 24) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    fn one_xform_ember() -> Ember {
        let mut e = Ember::new(32, 32);
        e.add_xform(Xform::identity());
        e
    }

    #[test]
    fn test_validate_ok() {
        assert!(one_xform_ember().validate().is_ok());
    }

    #[test]
    fn test_validate_no_xforms() {
        let e = Ember::new(32, 32);
        let err = e.validate().unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_validate_zero_weights() {
        let mut e = one_xform_ember();
        e.xforms[0].weight = 0.0;
        assert!(e.validate().is_err());
    }

    #[test]
    fn test_validate_supersample() {
        let mut e = one_xform_ember();
        e.supersample = 5;
        assert!(e.validate().is_err());
        e.supersample = 4;
        assert!(e.validate().is_ok());
    }

    #[test]
    fn test_validate_de_radii() {
        let mut e = one_xform_ember();
        e.de_min_radius = 5.0;
        e.de_max_radius = 2.0;
        assert!(e.validate().is_err());
        // Disabled DE ignores the ordering.
        e.de_max_radius = 0.0;
        e.de_min_radius = 0.0;
        assert!(e.validate().is_ok());
    }

    #[test]
    fn test_scaled_quality() {
        let mut e = one_xform_ember();
        e.quality = 100.0;
        e.zoom = 1.0;
        assert_relative_eq!(e.scaled_quality(), 400.0);
    }

    #[test]
    fn test_total_xform_indexing() {
        let mut e = one_xform_ember();
        e.final_xform = Some(Xform::identity());
        assert!(e.total_xform(0).is_some());
        assert!(e.total_xform(1).is_some());
        assert!(e.total_xform(2).is_none());
        assert_eq!(e.total_xform_count(), 2);
    }

    #[test]
    fn test_projection_inactive_by_default() {
        let e = one_xform_ember();
        assert!(!e.projection_active());
        let mut p = Point::new(0.5, 0.5, 1.0);
        let before = p;
        let mut rng = XorShiftRng::seed_from_u64(3);
        e.project(&mut p, &mut rng);
        assert_eq!(p, before);
    }

    #[test]
    fn test_projection_z_perspective() {
        let mut e = one_xform_ember();
        e.cam_perspective = 0.5;
        e.finalize();
        assert!(e.projection_active());
        let mut p = Point::new(1.0, 1.0, 1.0);
        let mut rng = XorShiftRng::seed_from_u64(3);
        e.project(&mut p, &mut rng);
        // zr = 1 - 0.5 * 1 = 0.5, so x and y double.
        assert_relative_eq!(p.x, 2.0);
        assert_relative_eq!(p.y, 2.0);
    }

    #[test]
    fn test_projection_pitch_rotates() {
        let mut e = one_xform_ember();
        e.cam_pitch = std::f32::consts::FRAC_PI_2;
        e.finalize();
        let mut p = Point::new(0.0, 1.0, 0.0);
        let mut rng = XorShiftRng::seed_from_u64(3);
        e.project(&mut p, &mut rng);
        // Pitch by 90 degrees collapses y onto the z axis.
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_xaos_present() {
        let mut e = one_xform_ember();
        assert!(!e.xaos_present());
        e.xforms[0].set_xaos(0, 0.0);
        assert!(e.xaos_present());
    }
}
