//! The iteration point record.
//!
//! A [`Point`] is the state that the chaotic game mutates in place: a 3D
//! position, a scalar palette coordinate, the adjusted opacity of the
//! xform that produced it, and the index of that xform (needed for xaos
//! row selection on the next step).

/// A single point in the chaotic-game trajectory.
///
/// The iterator keeps one running `Point` per worker lane and writes one
/// `Point` per productive step into the output sample buffer. The
/// `color_index` is a scalar lookup coordinate into the 256-entry palette,
/// kept in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// X position in world space.
    pub x: f32,
    /// Y position in world space.
    pub y: f32,
    /// Z position; only meaningful when a 3D camera is active.
    pub z: f32,
    /// Palette coordinate in `[0, 1]`.
    pub color_index: f32,
    /// Adjusted opacity carried from the xform that produced this point.
    pub viz_adjusted: f32,
    /// Index of the xform applied on the last step, used to select the
    /// xaos distribution row.
    pub last_xform: usize,
}

impl Point {
    /// Creates a point at the origin with the given palette coordinate.
    #[inline]
    pub fn new(x: f32, y: f32, color_index: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            color_index,
            viz_adjusted: 0.0,
            last_xform: 0,
        }
    }

    /// Randomizes position to `U(-1, 1)²` and the palette coordinate to
    /// `U(0, 1)`, the canonical trajectory start before fusing.
    pub fn randomize<R: rand::Rng>(&mut self, rng: &mut R) {
        self.x = rng.random_range(-1.0..1.0);
        self.y = rng.random_range(-1.0..1.0);
        self.z = 0.0;
        self.color_index = rng.random_range(0.0..1.0);
        self.last_xform = 0;
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xorshift::XorShiftRng;

    #[test]
    fn test_point_new() {
        let p = Point::new(1.0, 2.0, 0.5);
        assert_eq!(p.x, 1.0);
        assert_eq!(p.y, 2.0);
        assert_eq!(p.z, 0.0);
        assert_eq!(p.color_index, 0.5);
    }

    #[test]
    fn test_point_randomize_range() {
        let mut rng = XorShiftRng::seed_from_u64(7);
        let mut p = Point::default();
        for _ in 0..100 {
            p.randomize(&mut rng);
            assert!(p.x >= -1.0 && p.x < 1.0);
            assert!(p.y >= -1.0 && p.y < 1.0);
            assert!(p.color_index >= 0.0 && p.color_index < 1.0);
            assert_eq!(p.z, 0.0);
        }
    }
}
