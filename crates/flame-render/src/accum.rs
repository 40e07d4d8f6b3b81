//! Histogram accumulation.
//!
//! Every emitted sample looks up its palette color (through the dmap, the
//! palette pre-scaled by the temporal sample weight) and adds it to its
//! raster cell weighted by the producing xform's adjusted opacity. The
//! alpha channel carries the running hit count.

use crate::coords::CartToRaster;
use flame_core::{PALETTE_SIZE, PaletteMode, Point};

/// Looks up a dmap color for a palette coordinate.
///
/// Step mode indexes the nearest entry; linear mode blends adjacent
/// entries, clamping indices and fraction at the boundaries so the ends
/// of the palette are returned exactly.
#[inline]
pub fn dmap_lookup(dmap: &[[f32; 4]], color_index: f32, mode: PaletteMode) -> [f32; 4] {
    match mode {
        PaletteMode::Step => {
            let i = ((color_index * PALETTE_SIZE as f32) as isize)
                .clamp(0, PALETTE_SIZE as isize - 1) as usize;
            dmap[i]
        }
        PaletteMode::Linear => {
            let pos = (color_index * PALETTE_SIZE as f32).clamp(0.0, PALETTE_SIZE as f32 - 1.0);
            let i = pos as usize;
            let j = (i + 1).min(PALETTE_SIZE - 1);
            let frac = pos - i as f32;
            let a = dmap[i];
            let b = dmap[j];
            [
                a[0] + frac * (b[0] - a[0]),
                a[1] + frac * (b[1] - a[1]),
                a[2] + frac * (b[2] - a[2]),
                a[3] + frac * (b[3] - a[3]),
            ]
        }
    }
}

/// Accumulates a run of samples into the histogram.
///
/// Returns the number of samples that landed inside the raster. Each
/// in-bounds sample contributes exactly once; out-of-bounds samples are
/// clipped silently.
pub fn accumulate(
    samples: &[Point],
    dmap: &[[f32; 4]],
    mode: PaletteMode,
    coords: &CartToRaster,
    histogram: &mut [[f32; 4]],
) -> usize {
    let mut hits = 0;
    for s in samples {
        let Some(idx) = coords.map(s.x, s.y) else {
            continue;
        };
        let viz = s.viz_adjusted;
        if viz == 0.0 {
            continue;
        }
        let color = dmap_lookup(dmap, s.color_index, mode);
        let cell = &mut histogram[idx];
        cell[0] += color[0] * viz;
        cell[1] += color[1] * viz;
        cell[2] += color[2] * viz;
        cell[3] += color[3] * viz;
        hits += 1;
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use flame_core::{Ember, Palette, Xform};

    fn mapper() -> CartToRaster {
        let mut e = Ember::new(4, 4);
        e.pixels_per_unit = 4.0;
        e.add_xform(Xform::identity());
        CartToRaster::new(&e, 4, 4)
    }

    fn sample(x: f32, y: f32, color: f32, viz: f32) -> Point {
        Point {
            x,
            y,
            z: 0.0,
            color_index: color,
            viz_adjusted: viz,
            last_xform: 0,
        }
    }

    #[test]
    fn test_accumulate_hits_cell() {
        let coords = mapper();
        let dmap = Palette::solid([1.0, 0.5, 0.25, 1.0]).to_dmap(1.0);
        let mut hist = vec![[0.0f32; 4]; 16];

        let n = accumulate(
            &[sample(0.0, 0.0, 0.5, 1.0)],
            &dmap,
            PaletteMode::Step,
            &coords,
            &mut hist,
        );
        assert_eq!(n, 1);
        let cell = hist[2 * 4 + 2];
        assert_eq!(cell, [1.0, 0.5, 0.25, 1.0]);
    }

    #[test]
    fn test_accumulate_sums() {
        let coords = mapper();
        let dmap = Palette::solid([1.0, 1.0, 1.0, 1.0]).to_dmap(1.0);
        let mut hist = vec![[0.0f32; 4]; 16];
        let samples: Vec<Point> = (0..10).map(|_| sample(0.0, 0.0, 0.5, 1.0)).collect();
        accumulate(&samples, &dmap, PaletteMode::Step, &coords, &mut hist);
        assert_eq!(hist[2 * 4 + 2][3], 10.0);
    }

    #[test]
    fn test_opacity_weighting() {
        let coords = mapper();
        let dmap = Palette::solid([1.0, 1.0, 1.0, 1.0]).to_dmap(1.0);
        let mut hist = vec![[0.0f32; 4]; 16];
        accumulate(
            &[sample(0.0, 0.0, 0.5, 0.25)],
            &dmap,
            PaletteMode::Step,
            &coords,
            &mut hist,
        );
        assert_eq!(hist[2 * 4 + 2][0], 0.25);
        assert_eq!(hist[2 * 4 + 2][3], 0.25);
    }

    #[test]
    fn test_invisible_sample_contributes_nothing() {
        let coords = mapper();
        let dmap = Palette::solid([1.0, 1.0, 1.0, 1.0]).to_dmap(1.0);
        let mut hist = vec![[0.0f32; 4]; 16];
        let n = accumulate(
            &[sample(0.0, 0.0, 0.5, 0.0)],
            &dmap,
            PaletteMode::Step,
            &coords,
            &mut hist,
        );
        assert_eq!(n, 0);
        assert!(hist.iter().all(|c| c.iter().all(|&v| v == 0.0)));
    }

    #[test]
    fn test_out_of_bounds_clipped() {
        let coords = mapper();
        let dmap = Palette::solid([1.0, 1.0, 1.0, 1.0]).to_dmap(1.0);
        let mut hist = vec![[0.0f32; 4]; 16];
        let n = accumulate(
            &[sample(50.0, 0.0, 0.5, 1.0)],
            &dmap,
            PaletteMode::Step,
            &coords,
            &mut hist,
        );
        assert_eq!(n, 0);
    }

    #[test]
    fn test_step_lookup_uses_dmap_scale() {
        let dmap = Palette::solid([1.0, 1.0, 1.0, 1.0]).to_dmap(0.5);
        let c = dmap_lookup(&dmap, 0.5, PaletteMode::Step);
        assert_eq!(c, [0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_linear_lookup_blends() {
        let mut p = Palette::black();
        p.set_entry(100, [0.0, 0.0, 0.0, 1.0]);
        p.set_entry(101, [1.0, 1.0, 1.0, 1.0]);
        let dmap = p.to_dmap(1.0);
        let c = dmap_lookup(&dmap, 100.5 / 256.0, PaletteMode::Linear);
        assert!((c[0] - 0.5).abs() < 1e-5);
    }
}
