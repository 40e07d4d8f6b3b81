//! Log-polar affine blending.
//!
//! Linear interpolation of affine coefficients makes rotating xforms
//! collapse through the origin mid-blend. The log-polar path avoids that:
//! each basis column is decomposed into (angle, magnitude, translation),
//! angles travel the shorter arc, magnitudes blend in log space, and the
//! result is recomposed. Columns whose magnitude underflows fall back to
//! linear magnitude blending.

use flame_core::Affine2D;
use std::f32::consts::PI;

const ANGLE_EPS: f32 = 1e-6;
const TWO_PI: f32 = 2.0 * PI;

/// One affine in polar form: per basis column angle, magnitude and
/// translation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolarAffine {
    /// Column angles, `atan2` of each basis column.
    pub ang: [f32; 2],
    /// Column magnitudes.
    pub mag: [f32; 2],
    /// Translation components (c, f).
    pub trn: [f32; 2],
}

/// Decomposes an affine into polar column form.
///
/// A zero-magnitude column borrows the other column's angle so the blend
/// does not spin through an arbitrary zero angle.
pub fn decompose(affine: &Affine2D) -> PolarAffine {
    let mut out = PolarAffine::default();
    let mut zero = [false; 2];

    for col in 0..2 {
        let (cx, cy) = affine.column(col);
        out.ang[col] = cy.atan2(cx);
        out.mag[col] = (cx * cx + cy * cy).sqrt();
        zero[col] = out.mag[col] == 0.0;
        out.trn[col] = affine.translation(col);
    }

    if zero[0] && !zero[1] {
        out.ang[0] = out.ang[1];
    } else if !zero[0] && zero[1] {
        out.ang[1] = out.ang[0];
    }

    out
}

/// Adjusts the angle sequence so each step rotates the shorter way.
///
/// `winds[k]` carries the per-column reference angles of keyframe `k`'s
/// xform. A positive wind pins both angles of the step into
/// `[wind - 2π, wind]`, which biases asymmetric animate/static pairs; zero
/// winds get the plain ±π discontinuity adjustment, forcing clockwise
/// rotation at exactly 180 degrees.
pub fn adjust_rotation(seq: &mut [PolarAffine], winds: &[[f32; 2]]) {
    for col in 0..2 {
        for k in 1..seq.len() {
            let wind = winds.get(k).map(|w| w[col]).unwrap_or(0.0);
            if wind > 0.0 {
                let refang = wind - TWO_PI;
                for idx in [k - 1, k] {
                    while seq[idx].ang[col] < refang {
                        seq[idx].ang[col] += TWO_PI;
                    }
                    while seq[idx].ang[col] > refang + TWO_PI {
                        seq[idx].ang[col] -= TWO_PI;
                    }
                }
            } else {
                let d = seq[k].ang[col] - seq[k - 1].ang[col];
                if d > PI + ANGLE_EPS {
                    seq[k].ang[col] -= TWO_PI;
                } else if d < -(PI - ANGLE_EPS) {
                    seq[k].ang[col] += TWO_PI;
                }
            }
        }
    }
}

/// Blends a polar sequence with the given weights and recomposes.
///
/// Magnitudes accumulate in log space unless any entry's log drops below
/// -10, in which case that column switches to linear accumulation.
/// Translation is always linear. Weights are expected to sum to 1.
pub fn blend(seq: &[PolarAffine], coefs: &[f32]) -> Affine2D {
    debug_assert_eq!(seq.len(), coefs.len());
    let mut out = Affine2D::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);

    let mut log_mode = [true; 2];
    for col in 0..2 {
        for p in seq {
            if p.mag[col].ln() < -10.0 {
                log_mode[col] = false;
            }
        }
    }

    let mut acc_ang = [0.0f32; 2];
    let mut acc_mag = [0.0f32; 2];
    let mut acc_trn = [0.0f32; 2];

    for (p, &c) in seq.iter().zip(coefs) {
        for col in 0..2 {
            acc_ang[col] += c * p.ang[col];
            acc_mag[col] += if log_mode[col] {
                c * p.mag[col].ln()
            } else {
                c * p.mag[col]
            };
            acc_trn[col] += c * p.trn[col];
        }
    }

    for col in 0..2 {
        let mag = if log_mode[col] {
            acc_mag[col].exp()
        } else {
            acc_mag[col]
        };
        out.set_column(col, mag * acc_ang[col].cos(), mag * acc_ang[col].sin());
        out.set_translation(col, acc_trn[col]);
    }

    out
}
