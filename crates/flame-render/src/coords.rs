//! World to raster coordinate mapping.
//!
//! Built once per render from the camera and the supersampled buffer
//! dimensions (gutter included); the iterator asks it for the histogram
//! index of every emitted sample.

use flame_core::Ember;

/// Maps Cartesian world coordinates onto super-raster indices.
#[derive(Debug, Clone)]
pub struct CartToRaster {
    raster_w: usize,
    raster_h: usize,
    ll_x: f32,
    ll_y: f32,
    ur_x: f32,
    ur_y: f32,
    px_w: f32,
    px_h: f32,
    center_x: f32,
    center_y: f32,
    rot_cos: f32,
    rot_sin: f32,
    rotated: bool,
}

impl CartToRaster {
    /// Builds the mapper for a supersampled raster of `raster_w` by
    /// `raster_h` cells covering the camera of `ember` (zoom folded into
    /// the pixels-per-unit scale).
    pub fn new(ember: &Ember, raster_w: usize, raster_h: usize) -> Self {
        let ppu = ember.pixels_per_unit * ember.zoom_scale();
        let px_per_cell = ppu * ember.supersample as f32;
        let world_w = raster_w as f32 / px_per_cell;
        let world_h = raster_h as f32 / px_per_cell;

        let rot = -ember.rotate.to_radians();
        let (rot_sin, rot_cos) = rot.sin_cos();

        Self {
            raster_w,
            raster_h,
            ll_x: ember.center_x - world_w / 2.0,
            ll_y: ember.center_y - world_h / 2.0,
            ur_x: ember.center_x + world_w / 2.0,
            ur_y: ember.center_y + world_h / 2.0,
            px_w: raster_w as f32 / world_w,
            px_h: raster_h as f32 / world_h,
            center_x: ember.center_x,
            center_y: ember.center_y,
            rot_cos,
            rot_sin,
            rotated: ember.rotate != 0.0,
        }
    }

    /// Raster width in cells.
    #[inline]
    pub fn width(&self) -> usize {
        self.raster_w
    }

    /// Raster height in cells.
    #[inline]
    pub fn height(&self) -> usize {
        self.raster_h
    }

    /// World-space bounds as `(ll_x, ll_y, ur_x, ur_y)`.
    #[inline]
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        (self.ll_x, self.ll_y, self.ur_x, self.ur_y)
    }

    /// Maps a world point to its raster index, `None` when it falls
    /// outside `[ll, ur)`.
    #[inline]
    pub fn map(&self, x: f32, y: f32) -> Option<usize> {
        let (x, y) = if self.rotated {
            let dx = x - self.center_x;
            let dy = y - self.center_y;
            (
                self.rot_cos * dx - self.rot_sin * dy + self.center_x,
                self.rot_sin * dx + self.rot_cos * dy + self.center_y,
            )
        } else {
            (x, y)
        };

        if x < self.ll_x || x >= self.ur_x || y < self.ll_y || y >= self.ur_y {
            return None;
        }

        let ix = ((x - self.ll_x) * self.px_w) as usize;
        let iy = ((y - self.ll_y) * self.px_h) as usize;
        if ix >= self.raster_w || iy >= self.raster_h {
            return None;
        }
        Some(iy * self.raster_w + ix)
    }
}
