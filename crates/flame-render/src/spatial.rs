//! Spatial (supersample-to-final) filters.
//!
//! A fixed-radius 2D kernel evaluated as the outer product of a 1D curve
//! on a centered grid. The discrete width is rounded so its parity matches
//! the supersample factor, which keeps the kernel centered on each final
//! pixel's block of super-raster cells.

use flame_core::SpatialFilterKind;
use std::f32::consts::PI;

/// A precomputed spatial filter kernel.
#[derive(Debug, Clone)]
pub struct SpatialFilter {
    kind: SpatialFilterKind,
    width: usize,
    coefs: Vec<f32>,
}

impl SpatialFilter {
    /// Builds the kernel.
    ///
    /// `aspect` is the pixel aspect ratio; the y axis of the kernel is
    /// compressed by it. Coefficients are normalized to sum 1.
    pub fn new(kind: SpatialFilterKind, radius: f32, supersample: usize, aspect: f32) -> Self {
        let support = kind.support();
        let fw = 2.0 * support * supersample as f32 * radius / aspect;
        let mut width = fw as usize + 1;

        // Match the kernel parity to the supersample.
        if (width ^ supersample) & 1 != 0 {
            width += 1;
        }

        let adjust = if fw > 0.0 {
            support * width as f32 / fw
        } else {
            1.0
        };

        let mut coefs = vec![0.0f32; width * width];
        for i in 0..width {
            for j in 0..width {
                let ii = ((2.0 * i as f32 + 1.0) / width as f32 - 1.0) * adjust;
                let jj = ((2.0 * j as f32 + 1.0) / width as f32 - 1.0) * adjust / aspect;
                coefs[i + j * width] = kind.eval(ii) * kind.eval(jj);
            }
        }

        let sum: f32 = coefs.iter().sum();
        if sum > 0.0 {
            for c in &mut coefs {
                *c /= sum;
            }
        }

        Self { kind, width, coefs }
    }

    /// The kernel kind.
    #[inline]
    pub fn kind(&self) -> SpatialFilterKind {
        self.kind
    }

    /// Discrete kernel width, parity-matched to the supersample.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// The normalized coefficients, row-major `width x width`.
    #[inline]
    pub fn coefs(&self) -> &[f32] {
        &self.coefs
    }

    /// Coefficient at kernel position `(i, j)`.
    #[inline]
    pub fn coef(&self, i: usize, j: usize) -> f32 {
        self.coefs[i + j * self.width]
    }
}

#[inline]
fn sinc(x: f32) -> f32 {
    if x == 0.0 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

/// Kernel curve definitions.
///
/// Each returns the 1D filter response at distance `t` from the center;
/// the support constant bounds the distance at which the response is
/// still non-zero.
pub trait FilterCurve {
    /// Half-width of the curve's support.
    fn support(&self) -> f32;
    /// The curve value at `t`.
    fn eval(&self, t: f32) -> f32;
}

impl FilterCurve for SpatialFilterKind {
    fn support(&self) -> f32 {
        match self {
            Self::Gaussian => 1.5,
            Self::Hermite => 1.0,
            Self::Box => 0.5,
            Self::Triangle => 1.0,
            Self::Bell => 1.5,
            Self::BSpline => 2.0,
            Self::Lanczos3 => 3.0,
            Self::Lanczos2 => 2.0,
            Self::Mitchell => 2.0,
            Self::Blackman => 1.0,
            Self::Catrom => 2.0,
            Self::Hamming => 1.0,
            Self::Hanning => 1.0,
            Self::Quadratic => 1.5,
        }
    }

    fn eval(&self, t: f32) -> f32 {
        match self {
            Self::Gaussian => (-2.0 * t * t).exp() * (2.0 / PI).sqrt(),
            Self::Hermite => {
                let t = t.abs();
                if t < 1.0 {
                    (2.0 * t - 3.0) * t * t + 1.0
                } else {
                    0.0
                }
            }
            Self::Box => {
                if t > -0.5 && t <= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Triangle => {
                let t = t.abs();
                if t < 1.0 { 1.0 - t } else { 0.0 }
            }
            Self::Bell => {
                let t = t.abs();
                if t < 0.5 {
                    0.75 - t * t
                } else if t < 1.5 {
                    let t = t - 1.5;
                    0.5 * t * t
                } else {
                    0.0
                }
            }
            Self::BSpline => {
                let t = t.abs();
                if t < 1.0 {
                    let tt = t * t;
                    0.5 * tt * t - tt + 2.0 / 3.0
                } else if t < 2.0 {
                    let t = 2.0 - t;
                    t * t * t / 6.0
                } else {
                    0.0
                }
            }
            Self::Lanczos3 => {
                let t = t.abs();
                if t < 3.0 { sinc(t) * sinc(t / 3.0) } else { 0.0 }
            }
            Self::Lanczos2 => {
                let t = t.abs();
                if t < 2.0 { sinc(t) * sinc(t / 2.0) } else { 0.0 }
            }
            Self::Mitchell => {
                let t = t.abs();
                let tt = t * t;
                let b = 1.0 / 3.0;
                let c = 1.0 / 3.0;
                if t < 1.0 {
                    ((12.0 - 9.0 * b - 6.0 * c) * tt * t
                        + (-18.0 + 12.0 * b + 6.0 * c) * tt
                        + (6.0 - 2.0 * b))
                        / 6.0
                } else if t < 2.0 {
                    ((-b - 6.0 * c) * tt * t
                        + (6.0 * b + 30.0 * c) * tt
                        + (-12.0 * b - 48.0 * c) * t
                        + (8.0 * b + 24.0 * c))
                        / 6.0
                } else {
                    0.0
                }
            }
            Self::Blackman => 0.42 + 0.5 * (PI * t).cos() + 0.08 * (2.0 * PI * t).cos(),
            Self::Catrom => {
                let t = t.abs();
                if t < 1.0 {
                    0.5 * (2.0 + t * t * (-5.0 + 3.0 * t))
                } else if t < 2.0 {
                    0.5 * (4.0 + t * (-8.0 + t * (5.0 - t)))
                } else {
                    0.0
                }
            }
            Self::Hamming => 0.54 + 0.46 * (PI * t).cos(),
            Self::Hanning => 0.5 + 0.5 * (PI * t).cos(),
            Self::Quadratic => {
                if t < -1.5 {
                    0.0
                } else if t < -0.5 {
                    let v = t + 1.5;
                    0.5 * v * v
                } else if t < 0.5 {
                    0.75 - t * t
                } else if t < 1.5 {
                    let v = t - 1.5;
                    0.5 * v * v
                } else {
                    0.0
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ALL_KINDS: &[SpatialFilterKind] = &[
        SpatialFilterKind::Gaussian,
        SpatialFilterKind::Hermite,
        SpatialFilterKind::Box,
        SpatialFilterKind::Triangle,
        SpatialFilterKind::Bell,
        SpatialFilterKind::BSpline,
        SpatialFilterKind::Lanczos3,
        SpatialFilterKind::Lanczos2,
        SpatialFilterKind::Mitchell,
        SpatialFilterKind::Blackman,
        SpatialFilterKind::Catrom,
        SpatialFilterKind::Hamming,
        SpatialFilterKind::Hanning,
        SpatialFilterKind::Quadratic,
    ];

    #[test]
    fn test_all_kernels_normalized() {
        for &kind in ALL_KINDS {
            let f = SpatialFilter::new(kind, 0.5, 1, 1.0);
            let sum: f32 = f.coefs().iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_parity_matches_supersample() {
        for ss in 1..=4 {
            for &kind in ALL_KINDS {
                let f = SpatialFilter::new(kind, 0.5, ss, 1.0);
                assert_eq!(
                    f.width() % 2,
                    ss % 2,
                    "kind {kind:?} ss {ss} width {}",
                    f.width()
                );
            }
        }
    }

    #[test]
    fn test_box_width_one() {
        let f = SpatialFilter::new(SpatialFilterKind::Box, 0.5, 1, 1.0);
        // Box with radius 0.5 and no supersample covers one cell.
        assert_eq!(f.width(), 1);
        assert_relative_eq!(f.coef(0, 0), 1.0);
    }

    #[test]
    fn test_gaussian_center_heaviest() {
        let f = SpatialFilter::new(SpatialFilterKind::Gaussian, 1.0, 2, 1.0);
        let w = f.width();
        let center = f.coef(w / 2, w / 2);
        assert!(center >= f.coef(0, 0));
        assert!(center > 0.0);
    }

    #[test]
    fn test_radius_grows_width() {
        let small = SpatialFilter::new(SpatialFilterKind::Gaussian, 0.5, 1, 1.0);
        let large = SpatialFilter::new(SpatialFilterKind::Gaussian, 2.0, 1, 1.0);
        assert!(large.width() > small.width());
    }

    #[test]
    fn test_sinc_at_zero() {
        assert_eq!(sinc(0.0), 1.0);
        assert_relative_eq!(sinc(1.0), 0.0, epsilon = 1e-6);
    }
}
