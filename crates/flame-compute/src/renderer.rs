//! Host-side orchestration of the GPU pipeline.

use crate::device::GpuContext;
use crate::shaders;
use crate::structs::{DensityParamsGpu, FinalParamsGpu, IterParamsGpu, MAX_XFORMS, XformGpu};
use crate::{ComputeError, ComputeResult};
use flame_anim::TemporalFilter;
use flame_core::Ember;
use flame_render::{DensityFilter, SelectionTable, SpatialFilter};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};
use wgpu::util::DeviceExt;

/// Workgroups per iteration dispatch; 256 lanes each.
const ITER_WORKGROUPS: u32 = 64;
const LANES: u32 = ITER_WORKGROUPS * 256;
/// Iterations per lane per dispatch, keeping one dispatch near the ~65k
/// block the host polls at.
const ITERS_PER_LANE: u32 = 4;

/// The GPU renderer.
///
/// Compiles the kernels once and renders embers on demand. Output is
/// always RGBA8. The CPU renderer remains the behavioral reference;
/// anything this path cannot express is reported as
/// [`ComputeError::Unsupported`] so the caller can fall back.
pub struct GpuRenderer {
    ctx: GpuContext,
    iter: wgpu::ComputePipeline,
    log_scale: wgpu::ComputePipeline,
    de_select: wgpu::ComputePipeline,
    de_gather: wgpu::ComputePipeline,
    final_accum: wgpu::ComputePipeline,
}

impl GpuRenderer {
    /// Initializes the device and compiles all kernels.
    pub fn new() -> ComputeResult<Self> {
        let ctx = GpuContext::new()?;
        let iter_src = shaders::iter_shader();

        let make = |label: &str, src: &str| -> ComputeResult<wgpu::ComputePipeline> {
            let module = ctx
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Wgsl(src.into()),
                });
            Ok(ctx
                .device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(label),
                    layout: None,
                    module: &module,
                    entry_point: Some("main"),
                    compilation_options: Default::default(),
                    cache: None,
                }))
        };

        let iter = make("flame-iter", &iter_src)?;
        let log_scale = make("flame-log-scale", shaders::LOG_SCALE)?;
        let de_select = make("flame-de-select", shaders::DENSITY_SELECT)?;
        let de_gather = make("flame-de-gather", shaders::DENSITY_GATHER)?;
        let final_accum = make("flame-final-accum", shaders::FINAL_ACCUM)?;

        Ok(Self {
            ctx,
            iter,
            log_scale,
            de_select,
            de_gather,
            final_accum,
        })
    }

    /// Renders an ember to RGBA8 bytes.
    ///
    /// `abort` is polled between kernel dispatches; on abort the call
    /// returns [`ComputeError::OperationFailed`] with an "aborted"
    /// message and no partial output.
    pub fn render(
        &self,
        ember: &Ember,
        seed: u64,
        abort: Option<&AtomicBool>,
    ) -> ComputeResult<Vec<u8>> {
        ember
            .validate()
            .map_err(|e| ComputeError::Unsupported(e.to_string()))?;
        if ember.projection_active() {
            return Err(ComputeError::Unsupported(
                "3D camera projection is CPU-only".into(),
            ));
        }
        if ember.total_xform_count() > MAX_XFORMS {
            return Err(ComputeError::Unsupported(format!(
                "{} xforms exceed the packed table",
                ember.total_xform_count()
            )));
        }

        // Pack xforms; the final xform sits one past the regular list.
        let mut packed: Vec<XformGpu> = Vec::with_capacity(ember.total_xform_count());
        for i in 0..ember.total_xform_count() {
            let xf = ember.total_xform(i).expect("in range");
            packed.push(XformGpu::pack(xf).map_err(|id| {
                ComputeError::Unsupported(format!("variation id {id} not in GPU interpreter"))
            })?);
        }

        // Shared precomputation with the CPU path.
        let table = SelectionTable::build(ember);
        let spatial = SpatialFilter::new(
            ember.spatial_filter_kind,
            ember.spatial_filter_radius,
            ember.supersample,
            1.0,
        );
        let temporal = TemporalFilter::new(
            ember.temporal_filter_kind,
            ember.temporal_samples,
            ember.temporal_filter_width,
            ember.temporal_filter_exp,
        );
        let de = if ember.de_max_radius > 0.0 {
            Some(
                DensityFilter::new(
                    ember.de_min_radius,
                    ember.de_max_radius,
                    ember.de_curve,
                    ember.supersample,
                )
                .map_err(|e| ComputeError::Unsupported(e.to_string()))?,
            )
        } else {
            None
        };

        let ss = ember.supersample;
        let spatial_half = spatial.width().saturating_sub(ss) / 2;
        let de_gutter = de.as_ref().map(|d| d.filter_width() + 1).unwrap_or(0);
        let gutter = de_gutter.max(spatial_half);
        let offset = gutter - spatial_half;
        let super_w = ember.final_ras_w * ss + 2 * gutter;
        let super_h = ember.final_ras_h * ss + 2 * gutter;
        let cells = super_w * super_h;

        let ppu = ember.pixels_per_unit * ember.zoom_scale();
        let area = (ember.final_ras_w * ember.final_ras_h) as f32 / (ppu * ppu);
        let k1 = ember.brightness * 268.0 * 255.0 / 256.0;
        let k2 = (ss * ss) as f32 / (area * ember.scaled_quality() * temporal.sum_filt());

        debug!(super_w, super_h, gutter, "GPU buffers sized");

        let device = &self.ctx.device;
        let queue = &self.ctx.queue;
        let usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;

        let xform_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("xforms"),
            contents: bytemuck::cast_slice(&packed),
            usage,
        });
        let dist: Vec<u32> = (0..table.rows())
            .flat_map(|r| table.row(r).iter().map(|&i| i as u32).collect::<Vec<_>>())
            .collect();
        let dist_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("selection"),
            contents: bytemuck::cast_slice(&dist),
            usage,
        });
        let palette_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("palette"),
            size: (256 * 16) as u64,
            usage,
            mapped_at_creation: false,
        });
        let hist_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("histogram"),
            size: (cells * 16) as u64,
            usage: usage | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let accum_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("accumulator"),
            size: (cells * 16) as u64,
            usage,
            mapped_at_creation: false,
        });
        let select_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("de-select"),
            size: (cells * 8) as u64,
            usage,
            mapped_at_creation: false,
        });
        let points_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("points"),
            size: (LANES as usize * 16) as u64,
            usage,
            mapped_at_creation: false,
        });
        let lane_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lane-state"),
            size: (LANES as usize * 8) as u64,
            usage,
            mapped_at_creation: false,
        });
        let image_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("image"),
            size: (ember.final_ras_w * ember.final_ras_h * 4) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let iter_params_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("iter-params"),
            size: std::mem::size_of::<IterParamsGpu>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let iter_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("iter-bind"),
            layout: &self.iter.get_bind_group_layout(0),
            entries: &[
                bind(0, &iter_params_buf),
                bind(1, &xform_buf),
                bind(2, &dist_buf),
                bind(3, &palette_buf),
                bind(4, &hist_buf),
                bind(5, &points_buf),
                bind(6, &lane_buf),
            ],
        });

        // Iterate, one temporal sample at a time.
        let total_per_sample = ((ember.scaled_quality()
            * (ember.final_ras_w * ember.final_ras_h) as f32)
            / temporal.len() as f32)
            .ceil() as usize;
        let per_dispatch = (LANES * ITERS_PER_LANE) as usize;

        for ts in 0..temporal.len() {
            let dmap = ember.palette.to_dmap(temporal.weight(ts));
            let flat: Vec<f32> = dmap.iter().flatten().copied().collect();
            queue.write_buffer(&palette_buf, 0, bytemuck::cast_slice(&flat));

            let mut fuse = flame_render::DEFAULT_FUSE as u32;
            let mut done = 0usize;
            while done < total_per_sample {
                if let Some(flag) = abort {
                    if flag.load(Ordering::Relaxed) {
                        return Err(ComputeError::OperationFailed("aborted".into()));
                    }
                }

                let params = IterParamsGpu::new(
                    ember,
                    super_w,
                    super_h,
                    fuse,
                    ITERS_PER_LANE,
                    (seed as u32) ^ ((seed >> 32) as u32) ^ (done as u32),
                );
                queue.write_buffer(&iter_params_buf, 0, bytemuck::bytes_of(&params));

                let mut encoder = device.create_command_encoder(&Default::default());
                {
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some("iterate"),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(&self.iter);
                    pass.set_bind_group(0, &iter_bind, &[]);
                    pass.dispatch_workgroups(ITER_WORKGROUPS, 1, 1);
                }
                queue.submit([encoder.finish()]);

                fuse = 0;
                done += per_dispatch;
            }
        }

        // Density filtering.
        let dp = DensityParamsGpu::new(de.as_ref(), super_w, super_h, ss, ember.de_curve, k1, k2);
        let dp_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("density-params"),
            contents: bytemuck::bytes_of(&dp),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let groups_1d = (cells as u32).div_ceil(256);
        let mut encoder = device.create_command_encoder(&Default::default());
        match &de {
            Some(de_filter) => {
                let coef_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("de-coefs"),
                    contents: bytemuck::cast_slice(all_coefs(de_filter).as_slice()),
                    usage,
                });
                let idx_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("de-indices"),
                    contents: bytemuck::cast_slice(coef_index_table(de_filter).as_slice()),
                    usage,
                });

                let select_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("de-select-bind"),
                    layout: &self.de_select.get_bind_group_layout(0),
                    entries: &[bind(0, &dp_buf), bind(1, &hist_buf), bind(2, &select_buf)],
                });
                let gather_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("de-gather-bind"),
                    layout: &self.de_gather.get_bind_group_layout(0),
                    entries: &[
                        bind(0, &dp_buf),
                        bind(1, &hist_buf),
                        bind(2, &select_buf),
                        bind(3, &coef_buf),
                        bind(4, &idx_buf),
                        bind(5, &accum_buf),
                    ],
                });

                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("density"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.de_select);
                pass.set_bind_group(0, &select_bind, &[]);
                pass.dispatch_workgroups(groups_1d, 1, 1);
                pass.set_pipeline(&self.de_gather);
                pass.set_bind_group(0, &gather_bind, &[]);
                pass.dispatch_workgroups(
                    (super_w as u32).div_ceil(16),
                    (super_h as u32).div_ceil(16),
                    1,
                );
            }
            None => {
                let log_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("log-bind"),
                    layout: &self.log_scale.get_bind_group_layout(0),
                    entries: &[bind(0, &dp_buf), bind(1, &hist_buf), bind(2, &accum_buf)],
                });
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("log-scale"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.log_scale);
                pass.set_bind_group(0, &log_bind, &[]);
                pass.dispatch_workgroups(groups_1d, 1, 1);
            }
        }
        queue.submit([encoder.finish()]);

        if let Some(flag) = abort {
            if flag.load(Ordering::Relaxed) {
                return Err(ComputeError::OperationFailed("aborted".into()));
            }
        }

        // Final accumulation.
        let fp = FinalParamsGpu {
            width: ember.final_ras_w as u32,
            height: ember.final_ras_h as u32,
            supersample: ss as u32,
            filter_width: spatial.width() as u32,
            offset: offset as u32,
            super_w: super_w as u32,
            transparency: 0,
            y_up: 0,
            gamma: 1.0 / ember.gamma,
            linrange: ember.gamma_threshold,
            vibrancy: ember.vibrancy,
            highlight_power: ember.highlight_power,
            background: [
                ember.background[0] * 255.0,
                ember.background[1] * 255.0,
                ember.background[2] * 255.0,
                0.0,
            ],
        };
        let fp_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("final-params"),
            contents: bytemuck::bytes_of(&fp),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let spatial_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("spatial-coefs"),
            contents: bytemuck::cast_slice(spatial.coefs()),
            usage,
        });
        let final_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("final-bind"),
            layout: &self.final_accum.get_bind_group_layout(0),
            entries: &[
                bind(0, &fp_buf),
                bind(1, &accum_buf),
                bind(2, &spatial_buf),
                bind(3, &image_buf),
            ],
        });

        let mut encoder = device.create_command_encoder(&Default::default());
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("final-accum"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.final_accum);
            pass.set_bind_group(0, &final_bind, &[]);
            pass.dispatch_workgroups(
                (ember.final_ras_w as u32).div_ceil(16),
                (ember.final_ras_h as u32).div_ceil(16),
                1,
            );
        }

        // Read back.
        let image_size = (ember.final_ras_w * ember.final_ras_h * 4) as u64;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging"),
            size: image_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        encoder.copy_buffer_to_buffer(&image_buf, 0, &staging, 0, image_size);
        queue.submit([encoder.finish()]);

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| ComputeError::OperationFailed("map callback lost".into()))?
            .map_err(|e| ComputeError::OperationFailed(e.to_string()))?;

        let bytes = slice.get_mapped_range().to_vec();
        staging.unmap();

        info!(
            width = ember.final_ras_w,
            height = ember.final_ras_h,
            "GPU render complete"
        );
        Ok(bytes)
    }
}

fn bind(index: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding: index,
        resource: buffer.as_entire_binding(),
    }
}

/// Flattens the bank's packed coefficients for upload.
fn all_coefs(de: &DensityFilter) -> Vec<f32> {
    (0..de.kernel_count())
        .flat_map(|k| de.kernel_coefs(k).to_vec())
        .collect()
}

/// The quadrant index table, ready for upload.
fn coef_index_table(de: &DensityFilter) -> Vec<u32> {
    de.coef_indices().to_vec()
}
