//! Variable-width density-estimation filtering.
//!
//! The noise-reduction stage between iteration and final accumulation: a
//! bank of Gaussian kernels whose radius shrinks as a cell's hit count
//! grows, so sparse regions blur wide while dense detail stays sharp.
//! Every cell's contribution is also log-scaled, which is where the
//! flame's characteristic dynamic-range compression comes from.
//!
//! The bank is precomputed once per render. Kernels store only their
//! unique eighth (the packed upper triangle of one quadrant); a small
//! index table maps full-square offsets back to packed entries.

use flame_core::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Hit count below which every count gets its own kernel; above it the
/// bank is condensed by the decay curve.
pub const DE_THRESH: usize = 100;

/// Hard cap on the kernel bank size.
pub const MAX_KERNEL_BANK: f32 = 1e7;

/// The precomputed kernel bank.
#[derive(Debug, Clone)]
pub struct DensityFilter {
    min_rad: f32,
    max_rad: f32,
    curve: f32,
    supersample: usize,
    kernel_size: usize,
    filter_width: usize,
    max_filter_index: usize,
    max_filtered_counts: f32,
    widths: Vec<f32>,
    coefs: Vec<f32>,
    coef_indices: Vec<u32>,
}

impl DensityFilter {
    /// Builds the kernel bank.
    ///
    /// # Errors
    ///
    /// [`Error::ResourceExhausted`] when the decay curve would require
    /// more than ten million kernels.
    pub fn new(min_rad: f32, max_rad: f32, curve: f32, supersample: usize) -> Result<Self> {
        let curve = if curve <= 0.0 { 0.5 } else { curve };
        let max_rad = if max_rad < min_rad { min_rad + 1.0 } else { max_rad };

        let final_min_rad = min_rad * supersample as f32 + 1.0;
        let final_max_rad = max_rad * supersample as f32 + 1.0;

        let dec_count = (final_max_rad / final_min_rad).powf(1.0 / curve);
        if dec_count > MAX_KERNEL_BANK {
            return Err(Error::resource_exhausted(
                "density filter bank",
                dec_count as usize,
                MAX_KERNEL_BANK as usize,
            ));
        }
        let int_count = dec_count.ceil() as usize;

        let (max_index, max_filtered_counts) = if int_count > DE_THRESH {
            let max_index =
                (DE_THRESH as f32 + ((int_count - DE_THRESH) as f32).powf(curve)).ceil() as usize
                    + 1;
            let mfc =
                ((max_index - DE_THRESH) as f32).powf(1.0 / curve) + DE_THRESH as f32;
            (max_index, mfc)
        } else {
            (int_count, int_count as f32)
        };

        let row_size = 2 * final_max_rad.ceil() as usize - 1;
        let filter_width = (row_size - 1) / 2;
        let kernel_size = (filter_width + 1) * (filter_width + 2) / 2;

        let mut widths = vec![0.0f32; max_index];
        let mut coefs = vec![0.0f32; max_index * kernel_size];
        let mut max_filter_index = 0usize;

        for k in 0..max_index {
            let mut filter_height = if k < DE_THRESH {
                final_max_rad / ((k + 1) as f32).powf(curve)
            } else {
                let adjust = ((k - DE_THRESH) as f32).powf(1.0 / curve) + DE_THRESH as f32;
                final_max_rad / (adjust + 1.0).powf(curve)
            };

            // Once the minimum radius is reached the bank stops growing.
            if filter_height <= final_min_rad {
                filter_height = final_min_rad;
                max_filter_index = k;
            }
            widths[k] = filter_height;

            // Norm over the full square, then fill the packed triangle.
            let fw = filter_width as isize;
            let mut sum = 0.0f32;
            for j in -fw..=fw {
                for i in -fw..=fw {
                    let t = ((j * j + i * i) as f32).sqrt() / filter_height;
                    if t <= 1.0 {
                        sum += de_gaussian(t);
                    }
                }
            }

            let mut idx = k * kernel_size;
            for j in 0..=filter_width {
                for i in 0..=j {
                    let t = ((j * j + i * i) as f32).sqrt() / filter_height;
                    coefs[idx] = if t > 1.0 { 0.0 } else { de_gaussian(t) / sum };
                    idx += 1;
                }
            }

            if max_filter_index > 0 {
                break;
            }
        }

        if max_filter_index == 0 {
            max_filter_index = max_index - 1;
        }

        // One quadrant of packed-entry indices; the filter only ever reads
        // absolute offsets so a quadrant covers the full square.
        let w = filter_width + 1;
        let mut coef_indices = vec![0u32; w * w];
        let mut packed = 0u32;
        for j in 0..w {
            for i in 0..=j {
                if j == 0 && i == 0 {
                    coef_indices[0] = packed;
                } else if i == 0 {
                    coef_indices[j] = packed;
                    coef_indices[j * w] = packed;
                } else if j == i {
                    coef_indices[j * w + i] = packed;
                } else {
                    coef_indices[i * w + j] = packed;
                    coef_indices[j * w + i] = packed;
                }
                packed += 1;
            }
        }

        debug!(
            kernels = max_index,
            filter_width,
            max_filter_index,
            "density filter bank built"
        );

        Ok(Self {
            min_rad,
            max_rad,
            curve,
            supersample,
            kernel_size,
            filter_width,
            max_filter_index,
            max_filtered_counts,
            widths,
            coefs,
            coef_indices,
        })
    }

    /// Minimum radius this bank was built with.
    #[inline]
    pub fn min_rad(&self) -> f32 {
        self.min_rad
    }

    /// Maximum radius this bank was built with.
    #[inline]
    pub fn max_rad(&self) -> f32 {
        self.max_rad
    }

    /// Decay curve.
    #[inline]
    pub fn curve(&self) -> f32 {
        self.curve
    }

    /// Number of kernels in the bank.
    #[inline]
    pub fn kernel_count(&self) -> usize {
        self.widths.len()
    }

    /// Packed entries per kernel.
    #[inline]
    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    /// Tap reach in cells from the center.
    #[inline]
    pub fn filter_width(&self) -> usize {
        self.filter_width
    }

    /// Last useful kernel index; selection clamps here.
    #[inline]
    pub fn max_filter_index(&self) -> usize {
        self.max_filter_index
    }

    /// Density beyond which the widest-index kernel is always used.
    #[inline]
    pub fn max_filtered_counts(&self) -> f32 {
        self.max_filtered_counts
    }

    /// The quadrant map from absolute offsets to packed entries, row
    /// width `filter_width + 1`.
    #[inline]
    pub fn coef_indices(&self) -> &[u32] {
        &self.coef_indices
    }

    /// Effective radius of kernel `k`.
    #[inline]
    pub fn width_of(&self, k: usize) -> f32 {
        self.widths[k]
    }

    /// The packed coefficients of kernel `k`.
    pub fn kernel_coefs(&self, k: usize) -> &[f32] {
        &self.coefs[k * self.kernel_size..(k + 1) * self.kernel_size]
    }

    /// Coefficient of kernel `k` at absolute offset `(i, j)`.
    #[inline]
    pub fn coef(&self, k: usize, i: usize, j: usize) -> f32 {
        let w = self.filter_width + 1;
        let packed = self.coef_indices[j * w + i] as usize;
        self.coefs[k * self.kernel_size + packed]
    }

    /// Chooses the kernel for a local density.
    #[inline]
    pub fn select(&self, density: f32) -> usize {
        let k = if density > self.max_filtered_counts {
            self.max_filter_index
        } else if density <= DE_THRESH as f32 {
            (density.ceil() as usize).saturating_sub(1)
        } else if density != 0.0 {
            DE_THRESH + (density - DE_THRESH as f32).powf(self.curve) as usize
        } else {
            0
        };
        k.min(self.max_filter_index)
    }
}

/// The density kernel curve: a Gaussian over the unit radius.
#[inline]
fn de_gaussian(t: f32) -> f32 {
    let x = 1.5 * t;
    (-2.0 * x * x).exp() * (2.0 / std::f32::consts::PI).sqrt()
}

/// Log scale factor for a cell of hit count `alpha`.
#[inline]
pub fn log_scale(alpha: f32, k1: f32, k2: f32) -> f32 {
    if alpha <= 0.0 {
        0.0
    } else {
        k1 * (1.0 + alpha * k2).ln() / alpha
    }
}

/// Plain log-density scaling, used when density estimation is disabled.
///
/// Every histogram cell is copied to the accumulator scaled by its own
/// log factor. Returns `false` if the abort flag was observed.
pub fn log_scale_filter(
    histogram: &[[f32; 4]],
    accumulator: &mut [[f32; 4]],
    k1: f32,
    k2: f32,
    abort: &AtomicBool,
) -> bool {
    let body = |(acc, hist): (&mut [f32; 4], &[f32; 4])| {
        let ls = log_scale(hist[3], k1, k2);
        acc[0] = hist[0] * ls;
        acc[1] = hist[1] * ls;
        acc[2] = hist[2] * ls;
        acc[3] = hist[3] * ls;
    };

    #[cfg(feature = "parallel")]
    accumulator
        .par_iter_mut()
        .zip_eq(histogram.par_iter())
        .for_each(body);
    #[cfg(not(feature = "parallel"))]
    accumulator.iter_mut().zip(histogram.iter()).for_each(body);

    !abort.load(Ordering::Relaxed)
}

/// Applies the variable-width density filter.
///
/// Semantically a scatter: each histogram cell spreads its log-scaled
/// value through the kernel chosen by its local density. It is executed
/// as a gather per output cell so rows parallelize without write
/// conflicts and the per-cell summation order is fixed, keeping output
/// deterministic. The gutter guarantees every tap the scatter would make
/// lands in the allocated buffer.
///
/// Returns `false` if the abort flag was observed between row strips.
pub fn apply_density_filter(
    filter: &DensityFilter,
    histogram: &[[f32; 4]],
    accumulator: &mut [[f32; 4]],
    width: usize,
    height: usize,
    k1: f32,
    k2: f32,
    abort: &AtomicBool,
) -> bool {
    let ss = filter.supersample;
    let fw = filter.filter_width as isize;

    // Iteration domain: the supersample margin is excluded, matching the
    // reference renderer.
    let lo = ss - 1;
    let hi_x = width - lo;
    let hi_y = height - lo;

    // Pass 1: per-cell kernel selection and log scale.
    const EMPTY: u32 = u32::MAX;
    let mut select = vec![(EMPTY, 0.0f32); width * height];
    let scf = if ss > 1 && ss % 2 == 0 {
        let s = ss as f32;
        (s / (s + 1.0)).powi(2)
    } else {
        1.0
    };

    let select_row = |(y, row): (usize, &mut [(u32, f32)])| {
        if y < lo || y >= hi_y {
            return;
        }
        for x in lo..hi_x {
            let alpha = histogram[y * width + x][3];
            if alpha == 0.0 {
                continue;
            }
            let density = if ss > 1 {
                let half = ss / 2;
                let x0 = x.saturating_sub(half);
                let x1 = (x + half).min(width - 1);
                let y0 = y.saturating_sub(half);
                let y1 = (y + half).min(height - 1);
                let mut sum = 0.0f32;
                for j in y0..=y1 {
                    for i in x0..=x1 {
                        sum += histogram[j * width + i][3];
                    }
                }
                sum * scf
            } else {
                alpha
            };
            row[x] = (
                filter.select(density) as u32,
                log_scale(alpha, k1, k2),
            );
        }
    };

    #[cfg(feature = "parallel")]
    select
        .par_chunks_mut(width)
        .enumerate()
        .for_each(select_row);
    #[cfg(not(feature = "parallel"))]
    select.chunks_mut(width).enumerate().for_each(select_row);

    if abort.load(Ordering::Relaxed) {
        return false;
    }

    // Pass 2: gather. Each output cell collects from every domain cell
    // within tap range.
    let gather_row = |(y, out_row): (usize, &mut [[f32; 4]])| {
        if abort.load(Ordering::Relaxed) {
            return;
        }
        let y = y as isize;
        for (x, out) in out_row.iter_mut().enumerate() {
            let x = x as isize;
            let mut acc = [0.0f32; 4];

            let j0 = (y - fw).max(lo as isize);
            let j1 = (y + fw).min(hi_y as isize - 1);
            let i0 = (x - fw).max(lo as isize);
            let i1 = (x + fw).min(hi_x as isize - 1);

            for sy in j0..=j1 {
                let dj = (sy - y).unsigned_abs();
                for sx in i0..=i1 {
                    let src = sy as usize * width + sx as usize;
                    let (k, ls) = select[src];
                    if k == EMPTY {
                        continue;
                    }
                    let di = (sx - x).unsigned_abs();
                    let coef = filter.coef(k as usize, di, dj);
                    if coef == 0.0 {
                        continue;
                    }
                    let bucket = &histogram[src];
                    let scale = coef * ls;
                    acc[0] += bucket[0] * scale;
                    acc[1] += bucket[1] * scale;
                    acc[2] += bucket[2] * scale;
                    acc[3] += bucket[3] * scale;
                }
            }

            out[0] += acc[0];
            out[1] += acc[1];
            out[2] += acc[2];
            out[3] += acc[3];
        }
    };

    #[cfg(feature = "parallel")]
    accumulator
        .par_chunks_mut(width)
        .enumerate()
        .for_each(gather_row);
    #[cfg(not(feature = "parallel"))]
    accumulator.chunks_mut(width).enumerate().for_each(gather_row);

    !abort.load(Ordering::Relaxed)
}
