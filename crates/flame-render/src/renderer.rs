//! The renderer: buffers, process state machine, and the full pipeline.
//!
//! One instance is meant to live for the program's duration; embers are
//! handed to it and rendered on demand. The pipeline per temporal sample
//! is iterate -> histogram, then once per frame density filter ->
//! accumulator -> spatial filter + tone map -> final image bytes.
//!
//! # Process states
//!
//! `set_ember` takes the action the caller wants on the next `run`:
//! a full render, more iterations on top of the existing histogram, a
//! re-filter, or a re-accumulation (for example after changing only
//! gamma). Requests that the current state cannot serve fall back to a
//! full render, mirroring the reference renderer's transitions.
//!
//! # Determinism
//!
//! Iteration runs on a fixed number of logical lanes, each with its own
//! seeded generator and persistent running point. Lane sample buffers
//! drain into the histogram in lane order, so two runs with the same
//! ember, seed and lane count produce bitwise-identical images.

use crate::accum::accumulate;
use crate::coords::CartToRaster;
use crate::density::{DensityFilter, apply_density_filter, log_scale_filter};
use crate::error::{RenderResult, RenderStatus};
use crate::iterator::{ChaosGame, DEFAULT_FUSE};
use crate::spatial::SpatialFilter;
use crate::tonemap::ToneMap;
use flame_anim::{Sequence, TemporalFilter};
use flame_core::{Ember, Point};
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// What the caller wants from the next [`Renderer::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessAction {
    /// Restart everything.
    #[default]
    FullRender,
    /// Add more iterations to the existing histogram.
    KeepIterating,
    /// Re-run density filtering and final accumulation only.
    FilterAndAccum,
    /// Re-run final accumulation only.
    AccumOnly,
}

/// How far the pipeline has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ProcessState {
    /// Nothing usable in the buffers.
    #[default]
    None,
    /// Iteration ran but has not finished the requested quality.
    IterStarted,
    /// Histogram is complete.
    IterDone,
    /// Accumulator holds filtered density.
    FilterDone,
    /// Final image is ready.
    AccumDone,
}

/// Progress callback: receives percent complete, returns `false` to
/// request an abort.
pub type ProgressCallback = Box<dyn Fn(f64) -> bool + Send + Sync>;

/// Counters from the last render.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderStats {
    /// Productive iterations performed.
    pub iters: usize,
    /// Bad values recovered during iteration.
    pub bad_values: usize,
}

struct Lane {
    rng: XorShiftRng,
    point: Point,
    fused: bool,
    samples: Vec<Point>,
}

/// The rendering engine.
pub struct Renderer {
    sequence: Option<Sequence>,
    base_ember: Ember,
    ember: Ember,
    state: ProcessState,
    action: ProcessAction,

    histogram: Vec<[f32; 4]>,
    accumulator: Vec<[f32; 4]>,
    final_image: Vec<u8>,
    super_w: usize,
    super_h: usize,
    gutter: usize,
    density_filter_offset: usize,

    spatial: Option<SpatialFilter>,
    temporal: Option<TemporalFilter>,
    de: Option<DensityFilter>,

    lanes: Vec<Lane>,
    lane_count: usize,
    sub_batch_size: usize,
    seed: u64,

    early_clip: bool,
    y_axis_up: bool,
    transparency: bool,
    channels: usize,

    k1: f32,
    k2: f32,

    callback: Option<ProgressCallback>,
    abort: Arc<AtomicBool>,
    stats: RenderStats,
    progress: f64,
}

impl Renderer {
    /// Creates a renderer with no ember assigned.
    pub fn new() -> Self {
        #[cfg(feature = "parallel")]
        let lane_count = rayon::current_num_threads().max(1);
        #[cfg(not(feature = "parallel"))]
        let lane_count = 1;

        Self {
            sequence: None,
            base_ember: Ember::new(0, 0),
            ember: Ember::new(0, 0),
            state: ProcessState::None,
            action: ProcessAction::FullRender,
            histogram: Vec::new(),
            accumulator: Vec::new(),
            final_image: Vec::new(),
            super_w: 0,
            super_h: 0,
            gutter: 0,
            density_filter_offset: 0,
            spatial: None,
            temporal: None,
            de: None,
            lanes: Vec::new(),
            lane_count,
            sub_batch_size: 10_000,
            seed: 0,
            early_clip: false,
            y_axis_up: false,
            transparency: false,
            channels: 3,
            k1: 0.0,
            k2: 0.0,
            callback: None,
            abort: Arc::new(AtomicBool::new(false)),
            stats: RenderStats::default(),
            progress: 0.0,
        }
    }

    /// Sets the master seed all lane generators derive from.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
        self.state = ProcessState::None;
    }

    /// Fixes the number of iteration lanes.
    ///
    /// The lane count is part of the deterministic configuration: equal
    /// counts reproduce identical images regardless of how the thread
    /// pool schedules them.
    pub fn set_lane_count(&mut self, lanes: usize) {
        self.lane_count = lanes.max(1);
        self.state = ProcessState::None;
    }

    /// Iterations each lane runs between abort/progress checks.
    pub fn set_sub_batch_size(&mut self, size: usize) {
        self.sub_batch_size = size.max(1);
    }

    /// Tone-map before the spatial filter instead of after.
    pub fn set_early_clip(&mut self, early: bool) {
        self.early_clip = early;
        if self.state == ProcessState::AccumDone {
            self.state = ProcessState::FilterDone;
        }
    }

    /// Writes image rows bottom-up instead of the default top-down.
    pub fn set_y_axis_up(&mut self, up: bool) {
        self.y_axis_up = up;
        if self.state == ProcessState::AccumDone {
            self.state = ProcessState::FilterDone;
        }
    }

    /// Produce an alpha channel from density instead of blending the
    /// background color.
    pub fn set_transparency(&mut self, transparency: bool) {
        self.transparency = transparency;
        if self.state == ProcessState::AccumDone {
            self.state = ProcessState::FilterDone;
        }
    }

    /// Output channel count, 3 or 4.
    pub fn set_channels(&mut self, channels: usize) {
        self.channels = channels.clamp(3, 4);
        if self.state == ProcessState::AccumDone {
            self.state = ProcessState::FilterDone;
        }
    }

    /// Installs the progress callback.
    pub fn set_callback(&mut self, callback: Option<ProgressCallback>) {
        self.callback = callback;
    }

    /// A handle that aborts the render when set from another thread.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Requests a cooperative abort at the next safepoint.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    /// Returns `true` if an abort has been requested.
    pub fn aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Current pipeline state.
    #[inline]
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Pending action for the next run.
    #[inline]
    pub fn action(&self) -> ProcessAction {
        self.action
    }

    /// Counters from the last run.
    #[inline]
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Iteration progress of the current or last run, in percent.
    #[inline]
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Supersampled buffer layout: `(width, height, gutter, offset)`.
    pub fn super_layout(&self) -> (usize, usize, usize, usize) {
        (
            self.super_w,
            self.super_h,
            self.gutter,
            self.density_filter_offset,
        )
    }

    /// The raw histogram, for inspection.
    pub fn histogram(&self) -> &[[f32; 4]] {
        &self.histogram
    }

    /// The filtered accumulator, for inspection.
    pub fn accumulator(&self) -> &[[f32; 4]] {
        &self.accumulator
    }

    /// Assigns an ember and the action for the next run.
    ///
    /// The definition is validated first; on failure the renderer keeps
    /// its previous ember and state untouched.
    pub fn set_ember(&mut self, ember: Ember, action: ProcessAction) -> RenderResult<()> {
        ember.validate()?;
        let mut ember = ember;
        ember.finalize();
        self.base_ember = ember;
        self.sequence = None;
        self.apply_action(action);
        Ok(())
    }

    /// Assigns a keyframe sequence for animation rendering.
    pub fn set_embers(&mut self, embers: Vec<Ember>, action: ProcessAction) -> RenderResult<()> {
        for e in &embers {
            e.validate()?;
        }
        let mut embers = embers;
        for e in &mut embers {
            e.finalize();
        }
        self.base_ember = embers[0].clone();
        self.sequence = Some(Sequence::new(embers)?);
        self.apply_action(action);
        Ok(())
    }

    fn apply_action(&mut self, action: ProcessAction) {
        match action {
            ProcessAction::FullRender => {
                self.state = ProcessState::None;
                self.action = ProcessAction::FullRender;
            }
            ProcessAction::KeepIterating => {
                if self.state == ProcessState::AccumDone && self.base_ember.temporal_samples == 1 {
                    self.state = ProcessState::IterStarted;
                    self.action = ProcessAction::KeepIterating;
                } else {
                    self.state = ProcessState::None;
                    self.action = ProcessAction::FullRender;
                }
            }
            ProcessAction::FilterAndAccum => {
                if matches!(self.state, ProcessState::None | ProcessState::IterStarted) {
                    self.state = ProcessState::None;
                    self.action = ProcessAction::FullRender;
                } else {
                    self.state = ProcessState::IterDone;
                    self.action = ProcessAction::FilterAndAccum;
                }
            }
            ProcessAction::AccumOnly => match self.state {
                ProcessState::None | ProcessState::IterStarted => {
                    self.action = ProcessAction::FullRender;
                }
                ProcessState::IterDone => {
                    self.action = ProcessAction::FilterAndAccum;
                }
                ProcessState::FilterDone => {
                    self.action = ProcessAction::AccumOnly;
                }
                ProcessState::AccumDone => {
                    self.state = ProcessState::FilterDone;
                    self.action = ProcessAction::AccumOnly;
                }
            },
        }
    }

    /// Runs the pending action, rendering at keyframe time `time`.
    ///
    /// Returns [`RenderStatus::Aborted`] if the abort flag was observed
    /// at a safepoint; partial buffers remain owned by the renderer.
    pub fn run(&mut self, time: f32) -> RenderStatus {
        self.abort.store(false, Ordering::Relaxed);
        self.stats = RenderStats::default();
        self.progress = 0.0;

        let keep_iterating = self.action == ProcessAction::KeepIterating;

        if self.state < ProcessState::IterDone {
            if let Err(e) = self.prepare(time, !keep_iterating) {
                warn!("render preparation failed: {e}");
                return RenderStatus::Error;
            }
            self.state = ProcessState::IterStarted;

            match self.iterate_all(time) {
                RenderStatus::Ok => self.state = ProcessState::IterDone,
                other => return other,
            }
        }

        if self.state < ProcessState::FilterDone {
            self.accumulator.iter_mut().for_each(|c| *c = [0.0; 4]);
            let ok = match &self.de {
                Some(de) => apply_density_filter(
                    de,
                    &self.histogram,
                    &mut self.accumulator,
                    self.super_w,
                    self.super_h,
                    self.k1,
                    self.k2,
                    &self.abort,
                ),
                None => log_scale_filter(
                    &self.histogram,
                    &mut self.accumulator,
                    self.k1,
                    self.k2,
                    &self.abort,
                ),
            };
            if !ok {
                return RenderStatus::Aborted;
            }
            self.state = ProcessState::FilterDone;
        }

        if self.state < ProcessState::AccumDone {
            self.final_accumulation();
            if self.aborted() {
                return RenderStatus::Aborted;
            }
            self.state = ProcessState::AccumDone;
        }

        self.action = ProcessAction::FullRender;
        RenderStatus::Ok
    }

    /// Copies the final image into `out`, resizing it as needed.
    ///
    /// Layout: `W x H x channels`, 8 bits per channel, R/G/B[/A],
    /// row-major, top-to-bottom unless y-up was requested.
    pub fn read_final(&self, out: &mut Vec<u8>) -> RenderResult<()> {
        if self.state < ProcessState::AccumDone {
            return Err(crate::error::RenderError::InvalidState(format!(
                "no final image in state {:?}",
                self.state
            )));
        }
        out.clear();
        out.extend_from_slice(&self.final_image);
        Ok(())
    }

    fn current_ember(&self, time: f32) -> Ember {
        match &self.sequence {
            Some(seq) => seq.at(time),
            None => self.base_ember.clone(),
        }
    }

    /// Builds filters, sizes buffers, and seeds the lanes.
    fn prepare(&mut self, time: f32, reset: bool) -> flame_core::Result<()> {
        let ember = self.current_ember(time);

        let ss = ember.supersample;
        let spatial = SpatialFilter::new(
            ember.spatial_filter_kind,
            ember.spatial_filter_radius,
            ss,
            1.0,
        );
        let temporal = TemporalFilter::new(
            ember.temporal_filter_kind,
            ember.temporal_samples,
            ember.temporal_filter_width,
            ember.temporal_filter_exp,
        );
        let de = if ember.de_max_radius > 0.0 {
            Some(DensityFilter::new(
                ember.de_min_radius,
                ember.de_max_radius,
                ember.de_curve,
                ss,
            )?)
        } else {
            None
        };

        // Gutter: enough for the density taps and for the spatial filter
        // window overhang, whichever is larger.
        let spatial_half = spatial.width().saturating_sub(ss) / 2;
        let de_gutter = de.as_ref().map(|d| d.filter_width() + 1).unwrap_or(0);
        let gutter = de_gutter.max(spatial_half);
        self.density_filter_offset = gutter - spatial_half;
        self.gutter = gutter;

        let super_w = ember.final_ras_w * ss + 2 * gutter;
        let super_h = ember.final_ras_h * ss + 2 * gutter;
        let cells = super_w * super_h;

        if cells != self.histogram.len() {
            debug!(super_w, super_h, gutter, "allocating render buffers");
            self.histogram = vec![[0.0; 4]; cells];
            self.accumulator = vec![[0.0; 4]; cells];
        } else if reset {
            self.histogram.iter_mut().for_each(|c| *c = [0.0; 4]);
        }
        self.super_w = super_w;
        self.super_h = super_h;

        // Log-scale constants. The area term uses the zoom-scaled
        // pixels-per-unit so zooming in does not dim the image.
        let ppu = ember.pixels_per_unit * ember.zoom_scale();
        let area = (ember.final_ras_w * ember.final_ras_h) as f32 / (ppu * ppu);
        self.k1 = ember.brightness * 268.0 * 255.0 / 256.0;
        self.k2 = (ss * ss) as f32 / (area * ember.scaled_quality() * temporal.sum_filt());

        if reset || self.lanes.len() != self.lane_count {
            self.lanes = (0..self.lane_count)
                .map(|i| {
                    let mut rng = XorShiftRng::seed_from_u64(lane_seed(self.seed, i));
                    let mut point = Point::default();
                    point.randomize(&mut rng);
                    Lane {
                        rng,
                        point,
                        fused: false,
                        samples: Vec::new(),
                    }
                })
                .collect();
        }

        self.spatial = Some(spatial);
        self.temporal = Some(temporal);
        self.de = de;
        self.ember = ember;
        Ok(())
    }

    /// The per-temporal-sample iteration loop.
    fn iterate_all(&mut self, time: f32) -> RenderStatus {
        let temporal = self.temporal.clone().expect("prepared");
        let samples_count = temporal.len();
        let total_per_sample = ((self.ember.scaled_quality()
            * (self.ember.final_ras_w * self.ember.final_ras_h) as f32)
            / samples_count as f32)
            .ceil() as usize;

        for ts in 0..samples_count {
            let ember_ts = if self.sequence.is_some() && samples_count > 1 {
                self.current_ember(time + temporal.delta(ts))
            } else {
                self.ember.clone()
            };

            let game = ChaosGame::new(&ember_ts);
            let coords = CartToRaster::new(&ember_ts, self.super_w, self.super_h);
            let dmap = ember_ts.palette.to_dmap(temporal.weight(ts));

            // A new ember means a new attractor: re-fuse the trajectories.
            for lane in &mut self.lanes {
                lane.fused = false;
            }

            let mut done = 0usize;
            while done < total_per_sample {
                if self.aborted() {
                    return RenderStatus::Aborted;
                }

                let remaining = total_per_sample - done;
                let per_lane = self
                    .sub_batch_size
                    .min(remaining.div_ceil(self.lane_count));

                let batch = |lane: &mut Lane| {
                    lane.samples.resize(per_lane, Point::default());
                    let fuse = if lane.fused { 0 } else { DEFAULT_FUSE };
                    lane.fused = true;
                    game.iterate(
                        &ember_ts,
                        fuse,
                        &mut lane.point,
                        &mut lane.samples,
                        &mut lane.rng,
                    )
                };

                #[cfg(feature = "parallel")]
                let stats: Vec<_> = self.lanes.par_iter_mut().map(batch).collect();
                #[cfg(not(feature = "parallel"))]
                let stats: Vec<_> = self.lanes.iter_mut().map(batch).collect();

                for s in stats {
                    self.stats.iters += s.iters;
                    self.stats.bad_values += s.bad_values;
                }

                // Lane order drain keeps the histogram deterministic.
                for lane in &self.lanes {
                    accumulate(
                        &lane.samples,
                        &dmap,
                        ember_ts.palette_mode,
                        &coords,
                        &mut self.histogram,
                    );
                }

                done += per_lane * self.lane_count;

                let pct = 100.0
                    * (ts as f64
                        + (done.min(total_per_sample) as f64 / total_per_sample as f64))
                    / samples_count as f64;
                self.progress = pct;
                if let Some(cb) = &self.callback {
                    if !cb(pct) {
                        self.abort.store(true, Ordering::Relaxed);
                    }
                }
            }
        }
        RenderStatus::Ok
    }

    /// Spatial filter + tone map into the final byte image.
    fn final_accumulation(&mut self) {
        let ember = &self.ember;
        let spatial = self.spatial.as_ref().expect("prepared");
        let tm = ToneMap {
            gamma: 1.0 / ember.gamma,
            linrange: ember.gamma_threshold,
            vibrancy: ember.vibrancy,
            highlight_power: ember.highlight_power,
            background: [
                ember.background[0] * 255.0,
                ember.background[1] * 255.0,
                ember.background[2] * 255.0,
            ],
            transparency: self.transparency,
        };

        if self.early_clip {
            let map = |cell: &mut [f32; 4]| {
                let px = tm.map_pixel(*cell);
                *cell = [px.rgb[0], px.rgb[1], px.rgb[2], px.alpha];
            };
            #[cfg(feature = "parallel")]
            self.accumulator.par_iter_mut().for_each(map);
            #[cfg(not(feature = "parallel"))]
            self.accumulator.iter_mut().for_each(map);
        }

        let w = ember.final_ras_w;
        let h = ember.final_ras_h;
        let channels = self.channels;
        let fw = spatial.width();
        let ss = ember.supersample;
        let super_w = self.super_w;
        let dfo = self.density_filter_offset;
        let y_up = self.y_axis_up;
        let transparency = self.transparency;
        let early_clip = self.early_clip;
        let accumulator = &self.accumulator;

        self.final_image.resize(w * h * channels, 0);

        let write_row = |(row, out_row): (usize, &mut [u8])| {
            // Histogram rows grow upward; image rows grow downward unless
            // y-up was requested.
            let q = if y_up { row } else { h - 1 - row };
            for p in 0..w {
                let mut bucket = [0.0f32; 4];
                for jj in 0..fw {
                    let src_row = dfo + q * ss + jj;
                    let base = src_row * super_w + dfo + p * ss;
                    for ii in 0..fw {
                        let k = spatial.coef(ii, jj);
                        let cell = &accumulator[base + ii];
                        bucket[0] += k * cell[0];
                        bucket[1] += k * cell[1];
                        bucket[2] += k * cell[2];
                        bucket[3] += k * cell[3];
                    }
                }

                let (rgb, alpha) = if early_clip {
                    (
                        [
                            bucket[0].clamp(0.0, 255.0),
                            bucket[1].clamp(0.0, 255.0),
                            bucket[2].clamp(0.0, 255.0),
                        ],
                        bucket[3].clamp(0.0, 1.0),
                    )
                } else {
                    let px = tm.map_pixel(bucket);
                    (px.rgb, px.alpha)
                };

                let o = p * channels;
                out_row[o] = rgb[0].round() as u8;
                out_row[o + 1] = rgb[1].round() as u8;
                out_row[o + 2] = rgb[2].round() as u8;
                if channels == 4 {
                    out_row[o + 3] = if transparency {
                        (alpha * 255.0).round() as u8
                    } else {
                        255
                    };
                }
            }
        };

        #[cfg(feature = "parallel")]
        self.final_image
            .par_chunks_mut(w * channels)
            .enumerate()
            .for_each(write_row);
        #[cfg(not(feature = "parallel"))]
        self.final_image
            .chunks_mut(w * channels)
            .enumerate()
            .for_each(write_row);
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Derives a lane's seed from the master seed.
///
/// SplitMix64 finalizer: adjacent lane indices land far apart in the
/// generator's state space.
fn lane_seed(master: u64, lane: usize) -> u64 {
    let mut z = master
        .wrapping_add((lane as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flame_core::{Palette, Xform};

    fn simple_ember() -> Ember {
        let mut e = Ember::new(8, 8);
        e.pixels_per_unit = 4.0;
        e.quality = 50.0;
        e.de_max_radius = 0.0;
        e.palette = Palette::solid([1.0, 1.0, 1.0, 1.0]);
        e.add_xform(Xform::identity());
        e
    }

    fn quick_renderer() -> Renderer {
        let mut r = Renderer::new();
        r.set_lane_count(2);
        r.set_seed(42);
        r
    }

    #[test]
    fn test_set_ember_validates() {
        let mut r = quick_renderer();
        let bad = Ember::new(8, 8);
        assert!(r.set_ember(bad, ProcessAction::FullRender).is_err());
        // Prior state untouched.
        assert_eq!(r.state(), ProcessState::None);
    }

    #[test]
    fn test_full_render_reaches_accum_done() {
        let mut r = quick_renderer();
        r.set_ember(simple_ember(), ProcessAction::FullRender).unwrap();
        assert_eq!(r.run(0.0), RenderStatus::Ok);
        assert_eq!(r.state(), ProcessState::AccumDone);
        let mut img = Vec::new();
        r.read_final(&mut img).unwrap();
        assert_eq!(img.len(), 8 * 8 * 3);
        assert!(r.stats().iters > 0);
    }

    #[test]
    fn test_read_final_before_render_fails() {
        let r = quick_renderer();
        let mut img = Vec::new();
        assert!(r.read_final(&mut img).is_err());
    }

    #[test]
    fn test_action_fallbacks() {
        let mut r = quick_renderer();
        // FilterAndAccum with nothing iterated falls back to full render.
        r.set_ember(simple_ember(), ProcessAction::FilterAndAccum)
            .unwrap();
        assert_eq!(r.action(), ProcessAction::FullRender);

        // KeepIterating only holds from AccumDone.
        r.run(0.0);
        r.set_ember(simple_ember(), ProcessAction::KeepIterating)
            .unwrap();
        assert_eq!(r.action(), ProcessAction::KeepIterating);
        assert_eq!(r.state(), ProcessState::IterStarted);
    }

    #[test]
    fn test_accum_only_backs_up_from_done() {
        let mut r = quick_renderer();
        r.set_ember(simple_ember(), ProcessAction::FullRender).unwrap();
        r.run(0.0);
        r.set_ember(simple_ember(), ProcessAction::AccumOnly).unwrap();
        assert_eq!(r.action(), ProcessAction::AccumOnly);
        assert_eq!(r.state(), ProcessState::FilterDone);
        assert_eq!(r.run(0.0), RenderStatus::Ok);
    }

    #[test]
    fn test_keep_iterating_accumulates_more() {
        let mut r = quick_renderer();
        r.set_ember(simple_ember(), ProcessAction::FullRender).unwrap();
        r.run(0.0);
        let first: f32 = r.histogram().iter().map(|c| c[3]).sum();

        r.set_ember(simple_ember(), ProcessAction::KeepIterating)
            .unwrap();
        r.run(0.0);
        let second: f32 = r.histogram().iter().map(|c| c[3]).sum();
        assert!(second > first);
    }

    #[test]
    fn test_determinism_same_seed() {
        let render = || {
            let mut r = quick_renderer();
            r.set_ember(simple_ember(), ProcessAction::FullRender).unwrap();
            r.run(0.0);
            let mut img = Vec::new();
            r.read_final(&mut img).unwrap();
            img
        };
        assert_eq!(render(), render());
    }

    #[test]
    fn test_different_seed_differs() {
        let render = |seed| {
            let mut r = quick_renderer();
            r.set_seed(seed);
            let mut e = simple_ember();
            e.center_x = 0.5;
            // Two half-scale maps spread mass over a segment, so the
            // trajectory sampling pattern shows through at low quality.
            e.xforms[0].pre_affine = flame_core::Affine2D::new(0.5, 0.0, 0.0, 0.0, 0.5, 0.0);
            let mut x1 = Xform::identity();
            x1.pre_affine = flame_core::Affine2D::new(0.5, 0.0, 0.5, 0.0, 0.5, 0.0);
            e.add_xform(x1);
            r.set_ember(e, ProcessAction::FullRender).unwrap();
            r.run(0.0);
            let mut img = Vec::new();
            r.read_final(&mut img).unwrap();
            img
        };
        assert_ne!(render(1), render(2));
    }

    #[test]
    fn test_abort_between_batches() {
        let mut r = quick_renderer();
        let mut e = simple_ember();
        e.quality = 100_000.0;
        r.set_sub_batch_size(100);
        r.set_ember(e, ProcessAction::FullRender).unwrap();
        r.set_callback(Some(Box::new(|_pct| false)));
        assert_eq!(r.run(0.0), RenderStatus::Aborted);
        assert!(r.state() < ProcessState::AccumDone);
    }

    #[test]
    fn test_gutter_layout() {
        let mut r = quick_renderer();
        let mut e = simple_ember();
        e.de_max_radius = 2.0;
        e.supersample = 2;
        r.set_ember(e, ProcessAction::FullRender).unwrap();
        r.run(0.0);
        let (sw, sh, gutter, dfo) = r.super_layout();
        assert_eq!(sw, 8 * 2 + 2 * gutter);
        assert_eq!(sh, sw);
        assert!(gutter >= dfo);
    }

    #[test]
    fn test_lane_seed_spread() {
        let a = lane_seed(0, 0);
        let b = lane_seed(0, 1);
        assert_ne!(a, b);
        assert_ne!(lane_seed(1, 0), a);
    }
}
