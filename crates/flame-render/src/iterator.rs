//! The chaotic game.
//!
//! Iteration applies a randomly chosen xform to a running point and feeds
//! the output back as the next input. Randomness is table-driven: a
//! 10 000-entry array of xform indices built from the normalized weights,
//! one row per previous-xform when xaos is active. Escaped points are
//! recovered with a bounded retry policy so transient blowups never
//! surface to the caller.

use flame_core::{Ember, Point, Xform};
use rand::{Rng, RngCore};
use tracing::trace;

/// Number of entries per selection table row.
pub const SELECTION_GRAIN: usize = 10_000;

/// Fuse iterations run before samples are kept, letting the trajectory
/// settle onto the attractor.
pub const DEFAULT_FUSE: usize = 15;

const MAX_BAD_RETRIES: usize = 5;

/// Table-driven xform selection.
///
/// Without xaos this is a single row; with xaos there are `N + 1` rows,
/// row 0 for "no previous xform" and row `k + 1` for "previous was xform
/// `k`".
#[derive(Debug, Clone)]
pub struct SelectionTable {
    entries: Vec<u16>,
    rows: usize,
    xaos: bool,
}

impl SelectionTable {
    /// Builds the table from an ember's weights and xaos rows.
    ///
    /// Entries are distributed by cumulative-sum bucketing, so each
    /// xform's share matches its normalized weight to within one entry.
    /// A row whose weights are all zero becomes all zeros.
    pub fn build(ember: &Ember) -> Self {
        let n = ember.xform_count();
        let xaos = ember.xaos_present();
        let rows = if xaos { n + 1 } else { 1 };
        let mut entries = vec![0u16; rows * SELECTION_GRAIN];

        for row in 0..rows {
            let weight_for = |i: usize| -> f32 {
                let mut w = ember.xforms[i].weight;
                if row > 0 {
                    w *= ember.xforms[row - 1].xaos(i);
                }
                w
            };

            let total: f32 = (0..n).map(weight_for).sum();
            if total <= 0.0 {
                // All zero: leave the row at index 0.
                continue;
            }

            let per_entry = total / SELECTION_GRAIN as f32;
            let row_slice = &mut entries[row * SELECTION_GRAIN..(row + 1) * SELECTION_GRAIN];
            let mut filled = 0usize;
            let mut running = 0.0f32;
            let mut limit = 0.0f32;

            for i in 0..n {
                limit += weight_for(i);
                while running < limit && filled < SELECTION_GRAIN {
                    row_slice[filled] = i as u16;
                    running += per_entry;
                    filled += 1;
                }
            }
            // Rounding slack: pad the tail with the last xform.
            while filled < SELECTION_GRAIN {
                row_slice[filled] = (n - 1) as u16;
                filled += 1;
            }
        }

        Self { entries, rows, xaos }
    }

    /// Returns `true` if the table carries per-previous-xform rows.
    #[inline]
    pub fn xaos(&self) -> bool {
        self.xaos
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// One full row of xform indices.
    pub fn row(&self, row: usize) -> &[u16] {
        &self.entries[row * SELECTION_GRAIN..(row + 1) * SELECTION_GRAIN]
    }

    /// Picks the next xform index from a raw random draw.
    ///
    /// `prev` is the previously applied xform; it selects the row when
    /// xaos is present and is ignored otherwise.
    #[inline]
    pub fn next_xform(&self, draw: u32, prev: usize) -> usize {
        let row = if self.xaos { prev + 1 } else { 0 };
        self.entries[(draw as usize % SELECTION_GRAIN) + row * SELECTION_GRAIN] as usize
    }
}

/// Counters reported from one iteration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IterStats {
    /// Productive iterations performed.
    pub iters: usize,
    /// Bad values recovered from, informational only.
    pub bad_values: usize,
}

/// The chaotic-game driver for one ember.
#[derive(Debug, Clone)]
pub struct ChaosGame {
    table: SelectionTable,
}

impl ChaosGame {
    /// Builds the selection table for `ember`.
    pub fn new(ember: &Ember) -> Self {
        Self {
            table: SelectionTable::build(ember),
        }
    }

    /// The selection table driving this game.
    #[inline]
    pub fn table(&self) -> &SelectionTable {
        &self.table
    }

    /// Runs `fuse` discarded steps followed by `samples.len()` productive
    /// steps, writing each emitted point into `samples`.
    ///
    /// `point` is the lane's running point; it persists across calls so
    /// the trajectory continues where the previous sub-batch stopped.
    /// The emitted sample passes through the final xform (gated by its
    /// opacity) and the 3D projection; the feedback point does neither.
    pub fn iterate<R: RngCore>(
        &self,
        ember: &Ember,
        fuse: usize,
        point: &mut Point,
        samples: &mut [Point],
        rng: &mut R,
    ) -> IterStats {
        let mut stats = IterStats::default();
        let mut p = *point;

        for _ in 0..fuse {
            self.step(ember, &mut p, &mut stats, rng);
        }

        for sample in samples.iter_mut() {
            self.step(ember, &mut p, &mut stats, rng);
            stats.iters += 1;

            let mut emitted = p;
            if let Some(final_xform) = &ember.final_xform {
                apply_final(final_xform, &p, &mut emitted, rng);
            }
            ember.project(&mut emitted, rng);
            *sample = emitted;
        }

        *point = p;
        trace!(iters = stats.iters, bad = stats.bad_values, "sub-batch done");
        stats
    }

    /// One feedback step: select, apply, recover on a bad value.
    ///
    /// The step's xform for xaos purposes is whichever xform actually
    /// produced (or last attempted to produce) the point, so recovery
    /// reports its final attempt back.
    #[inline]
    fn step<R: RngCore>(
        &self,
        ember: &Ember,
        p: &mut Point,
        stats: &mut IterStats,
        rng: &mut R,
    ) {
        let xi = self.table.next_xform(rng.next_u32(), p.last_xform);
        let input = *p;
        let used = match ember.xforms[xi].apply(&input, p, rng) {
            Ok(()) => xi,
            Err(_) => self.recover(ember, p, stats, rng),
        };
        p.last_xform = used;
    }

    /// Bad-value recovery: up to five retries feeding a fresh random
    /// position (color preserved) through a fresh xform; if none succeeds
    /// the position is simply randomized.
    ///
    /// Each retry draws from the selection row of the point's previous
    /// xform, so under xaos the recovered trajectory only makes
    /// transitions the matrix allows. Returns the index of the last
    /// xform attempted; the caller records it as the step's xform.
    fn recover<R: RngCore>(
        &self,
        ember: &Ember,
        point: &mut Point,
        stats: &mut IterStats,
        rng: &mut R,
    ) -> usize {
        let prev = point.last_xform;
        let mut xi = 0;
        for _ in 0..MAX_BAD_RETRIES {
            stats.bad_values += 1;
            let retry = Point {
                x: rng.random_range(-1.0..1.0),
                y: rng.random_range(-1.0..1.0),
                z: 0.0,
                color_index: point.color_index,
                viz_adjusted: point.viz_adjusted,
                last_xform: prev,
            };
            xi = self.table.next_xform(rng.next_u32(), prev);
            if ember.xforms[xi].apply(&retry, point, rng).is_ok() {
                return xi;
            }
        }
        point.x = rng.random_range(-1.0..1.0);
        point.y = rng.random_range(-1.0..1.0);
        point.z = 0.0;
        xi
    }
}

/// Applies the final xform to an emitted sample, honoring its opacity as
/// a skip probability. The adjusted visibility of the producing xform is
/// preserved on the sample either way.
fn apply_final<R: RngCore>(final_xform: &Xform, p: &Point, emitted: &mut Point, rng: &mut R) {
    let gate = final_xform.opacity >= 1.0 - f32::EPSILON
        || rng.random_range(0.0..1.0) < final_xform.opacity;
    if gate {
        let viz = p.viz_adjusted;
        // A bad value out of the final xform only affects this sample; the
        // accumulator clips it, so no retry is needed.
        let _ = final_xform.apply(p, emitted, rng);
        emitted.viz_adjusted = viz;
        emitted.last_xform = p.last_xform;
    } else {
        *emitted = *p;
    }
}
