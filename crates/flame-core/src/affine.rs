//! 2D affine transforms.
//!
//! An [`Affine2D`] holds the six coefficients `a, b, c, d, e, f` encoding
//! the map `(x, y) ↦ (a·x + b·y + c, d·x + e·y + f)`. Every xform carries
//! one as its pre-transform and optionally another as its post-transform.
//!
//! # Example
//!
//! ```rust
//! use flame_core::Affine2D;
//!
//! let half = Affine2D::new(0.5, 0.0, 0.0, 0.0, 0.5, 0.0);
//! assert_eq!(half.apply(2.0, 4.0), (1.0, 2.0));
//! assert!(Affine2D::IDENTITY.is_identity());
//! ```

/// A 2D affine transform as six coefficients.
///
/// Coefficient layout matches the conventional flame notation:
/// `x' = a·x + b·y + c`, `y' = d·x + e·y + f`.
///
/// The `wind` field carries the per-column reference angles used to bias
/// asymmetric cases during log-polar interpolation; it does not affect
/// [`apply`](Self::apply).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine2D {
    /// X-column coefficient on x.
    pub a: f32,
    /// X-column coefficient on y.
    pub b: f32,
    /// X translation.
    pub c: f32,
    /// Y-column coefficient on x.
    pub d: f32,
    /// Y-column coefficient on y.
    pub e: f32,
    /// Y translation.
    pub f: f32,
    /// Reference angles per basis column for log interpolation winding.
    pub wind: [f32; 2],
}

impl Affine2D {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 0.0,
        e: 1.0,
        f: 0.0,
        wind: [0.0; 2],
    };

    /// Creates a transform from the six coefficients.
    #[inline]
    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self {
            a,
            b,
            c,
            d,
            e,
            f,
            wind: [0.0; 2],
        }
    }

    /// Creates the 180-degree flipped identity (`-x, -y`) used as the
    /// interpolation partner for hole-prone variations.
    #[inline]
    pub fn flipped() -> Self {
        Self::new(-1.0, 0.0, 0.0, 0.0, -1.0, 0.0)
    }

    /// Creates the axis-swap transform (`y, x`) used as the fan/rings
    /// interpolation pad.
    #[inline]
    pub fn axis_swap() -> Self {
        Self::new(0.0, 1.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// Applies the transform to a point.
    #[inline]
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.b * y + self.c,
            self.d * x + self.e * y + self.f,
        )
    }

    /// Returns `true` if all coefficients equal the identity exactly.
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.a == 1.0
            && self.b == 0.0
            && self.c == 0.0
            && self.d == 0.0
            && self.e == 1.0
            && self.f == 0.0
    }

    /// Determinant of the linear part.
    #[inline]
    pub fn determinant(&self) -> f32 {
        self.a * self.e - self.b * self.d
    }

    /// Orientation angle of the x basis column.
    #[inline]
    pub fn orientation(&self) -> f32 {
        self.d.atan2(self.a)
    }

    /// Returns the requested basis column as `(x_component, y_component)`.
    ///
    /// Column 0 is `(a, d)`, column 1 is `(b, e)`.
    #[inline]
    pub fn column(&self, col: usize) -> (f32, f32) {
        match col {
            0 => (self.a, self.d),
            _ => (self.b, self.e),
        }
    }

    /// Sets the requested basis column.
    #[inline]
    pub fn set_column(&mut self, col: usize, x: f32, y: f32) {
        match col {
            0 => {
                self.a = x;
                self.d = y;
            }
            _ => {
                self.b = x;
                self.e = y;
            }
        }
    }

    /// Returns the translation component for a column (c for 0, f for 1).
    #[inline]
    pub fn translation(&self, col: usize) -> f32 {
        match col {
            0 => self.c,
            _ => self.f,
        }
    }

    /// Sets the translation component for a column.
    #[inline]
    pub fn set_translation(&mut self, col: usize, t: f32) {
        match col {
            0 => self.c = t,
            _ => self.f = t,
        }
    }
}

impl Default for Affine2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity() {
        let id = Affine2D::IDENTITY;
        assert!(id.is_identity());
        assert_eq!(id.apply(3.0, -2.0), (3.0, -2.0));
    }

    #[test]
    fn test_apply() {
        let t = Affine2D::new(0.5, 0.0, 0.5, 0.0, 0.5, 0.0);
        assert_eq!(t.apply(1.0, 1.0), (1.0, 0.5));
        assert!(!t.is_identity());
    }

    #[test]
    fn test_determinant() {
        let t = Affine2D::new(2.0, 0.0, 5.0, 0.0, 3.0, -1.0);
        assert_relative_eq!(t.determinant(), 6.0);
    }

    #[test]
    fn test_columns() {
        let mut t = Affine2D::IDENTITY;
        t.set_column(0, 0.25, 0.75);
        assert_eq!(t.column(0), (0.25, 0.75));
        assert_eq!(t.column(1), (0.0, 1.0));
        t.set_translation(1, 9.0);
        assert_eq!(t.f, 9.0);
    }

    #[test]
    fn test_flipped() {
        let t = Affine2D::flipped();
        assert_eq!(t.apply(1.0, 2.0), (-1.0, -2.0));
    }
}
