//! Temporal (motion blur) filters.
//!
//! A frame is rendered as a run of temporal samples, each an interpolated
//! ember at a slightly different time. The temporal filter decides how
//! much each sample contributes and how far from the frame center its
//! time lies.
//!
//! Weights are normalized so the strongest sample has weight 1; the mean
//! weight (`sum_filt`) feeds the renderer's log-scale constant so overall
//! brightness stays independent of the sample count.

use flame_core::TemporalFilterKind;
use std::f32::consts::FRAC_2_PI;

/// Per-sample weights and time offsets for one motion-blurred frame.
#[derive(Debug, Clone)]
pub struct TemporalFilter {
    kind: TemporalFilterKind,
    weights: Vec<f32>,
    deltas: Vec<f32>,
    sum_filt: f32,
}

impl TemporalFilter {
    /// Builds a filter for `samples` temporal samples spread over
    /// `width` time units.
    ///
    /// `filter_exp` only affects [`TemporalFilterKind::Exp`]: negative
    /// values weight early samples, positive weight late ones.
    ///
    /// # Example
    ///
    /// ```rust
    /// use flame_anim::TemporalFilter;
    /// use flame_core::TemporalFilterKind;
    ///
    /// let f = TemporalFilter::new(TemporalFilterKind::Box, 4, 1.0, 0.0);
    /// assert_eq!(f.len(), 4);
    /// assert!((f.sum_filt() - 1.0).abs() < 1e-6);
    /// ```
    pub fn new(kind: TemporalFilterKind, samples: usize, width: f32, filter_exp: f32) -> Self {
        let steps = samples.max(1);
        let mut weights = vec![0.0f32; steps];
        let mut deltas = vec![0.0f32; steps];

        if steps == 1 {
            return Self {
                kind,
                weights: vec![1.0],
                deltas: vec![0.0],
                sum_filt: 1.0,
            };
        }

        for (i, d) in deltas.iter_mut().enumerate() {
            *d = (i as f32 / (steps - 1) as f32 - 0.5) * width;
        }

        match kind {
            TemporalFilterKind::Box => {
                weights.fill(1.0);
            }
            TemporalFilterKind::Gaussian => {
                let half = steps as f32 / 2.0;
                for (i, w) in weights.iter_mut().enumerate() {
                    let t = 1.5 * (i as f32 - half).abs() / half;
                    *w = (-2.0 * t * t).exp() * FRAC_2_PI.sqrt();
                }
            }
            TemporalFilterKind::Exp => {
                for (i, w) in weights.iter_mut().enumerate() {
                    let slpx = if filter_exp >= 0.0 {
                        (i as f32 + 1.0) / steps as f32
                    } else {
                        (steps - i) as f32 / steps as f32
                    };
                    *w = slpx.powf(filter_exp.abs());
                }
            }
        }

        // Normalize to a max of 1 and record the mean.
        let max = weights.iter().cloned().fold(f32::MIN, f32::max);
        let mut sum = 0.0;
        for w in &mut weights {
            *w /= max;
            sum += *w;
        }

        Self {
            kind,
            weights,
            deltas,
            sum_filt: sum / steps as f32,
        }
    }

    /// The filter kind this was built with.
    #[inline]
    pub fn kind(&self) -> TemporalFilterKind {
        self.kind
    }

    /// Number of temporal samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Returns `true` for a degenerate single-sample filter.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Weight of sample `i`, in `(0, 1]`.
    #[inline]
    pub fn weight(&self, i: usize) -> f32 {
        self.weights[i]
    }

    /// Time offset of sample `i` relative to the frame center.
    #[inline]
    pub fn delta(&self, i: usize) -> f32 {
        self.deltas[i]
    }

    /// Mean of the normalized weights.
    #[inline]
    pub fn sum_filt(&self) -> f32 {
        self.sum_filt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_sample_degenerates() {
        for kind in [
            TemporalFilterKind::Box,
            TemporalFilterKind::Gaussian,
            TemporalFilterKind::Exp,
        ] {
            let f = TemporalFilter::new(kind, 1, 1.0, 2.0);
            assert_eq!(f.len(), 1);
            assert_eq!(f.weight(0), 1.0);
            assert_eq!(f.delta(0), 0.0);
            assert_eq!(f.sum_filt(), 1.0);
        }
    }

    #[test]
    fn test_box_uniform() {
        let f = TemporalFilter::new(TemporalFilterKind::Box, 8, 1.0, 0.0);
        for i in 0..8 {
            assert_relative_eq!(f.weight(i), 1.0);
        }
        assert_relative_eq!(f.sum_filt(), 1.0);
    }

    #[test]
    fn test_deltas_span_width() {
        let f = TemporalFilter::new(TemporalFilterKind::Box, 5, 2.0, 0.0);
        assert_relative_eq!(f.delta(0), -1.0);
        assert_relative_eq!(f.delta(4), 1.0);
        assert_relative_eq!(f.delta(2), 0.0);
    }

    #[test]
    fn test_gaussian_peaks_in_middle() {
        let f = TemporalFilter::new(TemporalFilterKind::Gaussian, 9, 1.0, 0.0);
        let max = (0..9).map(|i| f.weight(i)).fold(f32::MIN, f32::max);
        assert_relative_eq!(max, 1.0, epsilon = 1e-6);
        assert!(f.weight(4) > f.weight(0));
        assert!(f.sum_filt() < 1.0);
    }

    #[test]
    fn test_exp_ramps() {
        let rising = TemporalFilter::new(TemporalFilterKind::Exp, 6, 1.0, 1.0);
        assert!(rising.weight(5) > rising.weight(0));
        assert_relative_eq!(rising.weight(5), 1.0, epsilon = 1e-6);

        let falling = TemporalFilter::new(TemporalFilterKind::Exp, 6, 1.0, -1.0);
        assert!(falling.weight(0) > falling.weight(5));
        assert_relative_eq!(falling.weight(0), 1.0, epsilon = 1e-6);
    }
}
