//! Periodic motion functions for animated xform fields.
//!
//! Motion elements perturb xform fields with one of three unit-period
//! waveforms evaluated at `frequency * time`.

use flame_core::MotionFunc;
use std::f32::consts::TAU;

/// Evaluates a motion function at time `t` (period 1, amplitude 1).
///
/// # Example
///
/// ```rust
/// use flame_core::MotionFunc;
/// use flame_math::motion_value;
///
/// assert_eq!(motion_value(MotionFunc::Sin, 0.0), 0.0);
/// assert!((motion_value(MotionFunc::Sin, 0.25) - 1.0).abs() < 1e-6);
/// assert!((motion_value(MotionFunc::Hill, 0.5) - 1.0).abs() < 1e-6);
/// ```
pub fn motion_value(func: MotionFunc, t: f32) -> f32 {
    match func {
        MotionFunc::Sin => (TAU * t).sin(),
        MotionFunc::Triangle => {
            let mut fr = (t + 0.75) % 1.0;
            if fr < 0.0 {
                fr += 1.0;
            }
            (fr - 0.5).abs() * 4.0 - 1.0
        }
        MotionFunc::Hill => (1.0 - (TAU * t).cos()) * 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sin_period() {
        assert_relative_eq!(motion_value(MotionFunc::Sin, 0.0), 0.0);
        assert_relative_eq!(motion_value(MotionFunc::Sin, 1.0), 0.0, epsilon = 1e-6);
        assert_relative_eq!(motion_value(MotionFunc::Sin, 0.25), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_triangle_shape() {
        assert_relative_eq!(motion_value(MotionFunc::Triangle, 0.0), 0.0, epsilon = 1e-6);
        assert_relative_eq!(motion_value(MotionFunc::Triangle, 0.25), 1.0, epsilon = 1e-6);
        assert_relative_eq!(motion_value(MotionFunc::Triangle, 0.75), -1.0, epsilon = 1e-6);
        // Bounded everywhere.
        for i in 0..100 {
            let v = motion_value(MotionFunc::Triangle, i as f32 * 0.137);
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_hill_range() {
        assert_relative_eq!(motion_value(MotionFunc::Hill, 0.0), 0.0);
        assert_relative_eq!(motion_value(MotionFunc::Hill, 0.5), 1.0);
        for i in 0..100 {
            let v = motion_value(MotionFunc::Hill, i as f32 * 0.093);
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
