//! Packed GPU-side records.
//!
//! Everything the kernels read is uploaded as plain structs with explicit
//! layout: the ember's camera and tone parameters, a fixed-width xform
//! table with per-xform variation opcodes, and the filter banks. Layouts
//! follow WGSL uniform/storage alignment rules (vec4-sized fields, no
//! implicit padding).

use bytemuck::{Pod, Zeroable};
use flame_core::{Ember, PaletteMode, Xform, variations::ids};

/// Maximum xforms the packed table can hold (final xform included).
pub const MAX_XFORMS: usize = 32;

/// Maximum variation opcodes per xform.
pub const MAX_VARS_PER_XFORM: usize = 8;

/// Parameters carried per variation opcode.
pub const VAR_PARAMS: usize = 4;

/// Variation ids the GPU interpreter implements.
///
/// Embers using anything else are rejected so the caller can fall back
/// to the CPU path.
pub const GPU_SUPPORTED_VARIATIONS: &[u32] = &[
    ids::LINEAR,
    ids::SINUSOIDAL,
    ids::SPHERICAL,
    ids::SWIRL,
    ids::HORSESHOE,
    ids::POLAR,
    ids::HANDKERCHIEF,
    ids::HEART,
    ids::DISC,
    ids::SPIRAL,
    ids::HYPERBOLIC,
    ids::DIAMOND,
    ids::JULIA,
    ids::BENT,
    ids::FISHEYE,
    ids::EXPONENTIAL,
    ids::BLOB,
    ids::PERSPECTIVE,
];

/// One variation opcode: id, weight, and up to four parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct VarOpGpu {
    /// Variation id; `u32::MAX` terminates the list.
    pub id: u32,
    /// Blend weight.
    pub weight: f32,
    _pad: [u32; 2],
    /// Parameter block, zero-filled.
    pub params: [f32; VAR_PARAMS],
}

impl VarOpGpu {
    /// The list terminator.
    pub fn none() -> Self {
        Self {
            id: u32::MAX,
            weight: 0.0,
            _pad: [0; 2],
            params: [0.0; VAR_PARAMS],
        }
    }
}

/// One packed xform.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct XformGpu {
    /// Pre affine `a, b, c, d`.
    pub affine0: [f32; 4],
    /// Pre affine `e, f`, post-affine flag, variation count.
    pub affine1: [f32; 4],
    /// Post affine `a, b, c, d`.
    pub post0: [f32; 4],
    /// Post affine `e, f`, unused, unused.
    pub post1: [f32; 4],
    /// `color_speed_cache`, `one_minus_color_cache`, `viz_adjusted`,
    /// `direct_color`.
    pub color: [f32; 4],
    /// The variation opcode list.
    pub vars: [VarOpGpu; MAX_VARS_PER_XFORM],
}

impl XformGpu {
    /// Packs an xform, or reports which variation is unsupported.
    pub fn pack(xform: &Xform) -> Result<Self, u32> {
        let mut vars = [VarOpGpu::none(); MAX_VARS_PER_XFORM];
        let mut count = 0usize;

        for v in xform.variations() {
            if !GPU_SUPPORTED_VARIATIONS.contains(&v.id()) {
                return Err(v.id());
            }
            if count >= MAX_VARS_PER_XFORM {
                return Err(v.id());
            }
            let mut params = [0.0f32; VAR_PARAMS];
            for (slot, p) in params.iter_mut().zip(v.params()) {
                *slot = p.value;
            }
            vars[count] = VarOpGpu {
                id: v.id(),
                weight: v.weight(),
                _pad: [0; 2],
                params,
            };
            count += 1;
        }
        if !xform.pre_variations().is_empty() || !xform.post_variations().is_empty() {
            // Pre/post chains are CPU-only for now.
            return Err(u32::MAX);
        }

        let a = &xform.pre_affine;
        let p = &xform.post_affine;
        Ok(Self {
            affine0: [a.a, a.b, a.c, a.d],
            affine1: [
                a.e,
                a.f,
                if p.is_identity() { 0.0 } else { 1.0 },
                count as f32,
            ],
            post0: [p.a, p.b, p.c, p.d],
            post1: [p.e, p.f, 0.0, 0.0],
            color: [
                xform.color_speed_cache(),
                xform.one_minus_color_cache(),
                xform.viz_adjusted(),
                xform.direct_color,
            ],
            vars,
        })
    }
}

/// Per-dispatch iteration parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct IterParamsGpu {
    /// Number of non-final xforms.
    pub xform_count: u32,
    /// 1 when a final xform sits at index `xform_count`.
    pub has_final: u32,
    /// Fuse steps for this dispatch (0 after warmup).
    pub fuse: u32,
    /// Productive steps per lane.
    pub iters_per_lane: u32,
    /// 1 when per-previous-xform selection rows are active.
    pub xaos: u32,
    /// Seed mixed into every lane's generator.
    pub seed: u32,
    /// 0 step palette lookup, 1 linear.
    pub palette_mode: u32,
    /// Final-xform opacity as a gate probability.
    pub final_opacity: f32,

    /// Raster lower-left world x.
    pub ll_x: f32,
    /// Raster lower-left world y.
    pub ll_y: f32,
    /// Cells per world unit, x.
    pub px_w: f32,
    /// Cells per world unit, y.
    pub px_h: f32,

    /// Super-raster width.
    pub super_w: u32,
    /// Super-raster height.
    pub super_h: u32,
    /// Rotation cosine.
    pub rot_cos: f32,
    /// Rotation sine.
    pub rot_sin: f32,

    /// Camera center.
    pub center_x: f32,
    /// Camera center.
    pub center_y: f32,
    _pad: [f32; 2],
}

impl IterParamsGpu {
    /// Fills camera and raster fields from the ember and buffer layout.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ember: &Ember,
        super_w: usize,
        super_h: usize,
        fuse: u32,
        iters_per_lane: u32,
        seed: u32,
    ) -> Self {
        let ppu = ember.pixels_per_unit * ember.zoom_scale() * ember.supersample as f32;
        let world_w = super_w as f32 / ppu;
        let world_h = super_h as f32 / ppu;
        let rot = (-ember.rotate.to_radians()).sin_cos();

        Self {
            xform_count: ember.xform_count() as u32,
            has_final: u32::from(ember.final_xform.is_some()),
            fuse,
            iters_per_lane,
            xaos: u32::from(ember.xaos_present()),
            seed,
            palette_mode: match ember.palette_mode {
                PaletteMode::Step => 0,
                PaletteMode::Linear => 1,
            },
            final_opacity: ember.final_xform.as_ref().map(|f| f.opacity).unwrap_or(1.0),
            ll_x: ember.center_x - world_w / 2.0,
            ll_y: ember.center_y - world_h / 2.0,
            px_w: ppu,
            px_h: ppu,
            super_w: super_w as u32,
            super_h: super_h as u32,
            rot_cos: rot.1,
            rot_sin: rot.0,
            center_x: ember.center_x,
            center_y: ember.center_y,
            _pad: [0.0; 2],
        }
    }
}

/// Density / log-scale stage parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DensityParamsGpu {
    /// Super-raster width.
    pub super_w: u32,
    /// Super-raster height.
    pub super_h: u32,
    /// Supersample factor.
    pub supersample: u32,
    /// Tap reach of the widest kernel.
    pub filter_width: u32,
    /// Packed entries per kernel.
    pub kernel_size: u32,
    /// Last useful kernel index.
    pub max_filter_index: u32,
    /// Condensation threshold crossover.
    pub max_filtered_counts: f32,
    /// Decay curve.
    pub curve: f32,
    /// Brightness constant.
    pub k1: f32,
    /// Density normalization constant.
    pub k2: f32,
    _pad: [f32; 2],
}

impl DensityParamsGpu {
    /// Packs the density stage parameters, taking the bank's dimensions
    /// from `filter` when density estimation is enabled.
    pub fn new(
        filter: Option<&flame_render::DensityFilter>,
        super_w: usize,
        super_h: usize,
        supersample: usize,
        curve: f32,
        k1: f32,
        k2: f32,
    ) -> Self {
        Self {
            super_w: super_w as u32,
            super_h: super_h as u32,
            supersample: supersample as u32,
            filter_width: filter.map(|d| d.filter_width() as u32).unwrap_or(0),
            kernel_size: filter.map(|d| d.kernel_size() as u32).unwrap_or(0),
            max_filter_index: filter.map(|d| d.max_filter_index() as u32).unwrap_or(0),
            max_filtered_counts: filter.map(|d| d.max_filtered_counts()).unwrap_or(0.0),
            curve,
            k1,
            k2,
            _pad: [0.0; 2],
        }
    }
}

/// Final accumulation parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FinalParamsGpu {
    /// Final image width.
    pub width: u32,
    /// Final image height.
    pub height: u32,
    /// Supersample factor.
    pub supersample: u32,
    /// Spatial filter discrete width.
    pub filter_width: u32,
    /// Read origin inside the gutter.
    pub offset: u32,
    /// Super-raster width.
    pub super_w: u32,
    /// 1 to write alpha from density.
    pub transparency: u32,
    /// 1 to flip rows.
    pub y_up: u32,
    /// Display exponent (`1 / gamma`).
    pub gamma: f32,
    /// Gamma linearization threshold.
    pub linrange: f32,
    /// Vibrancy.
    pub vibrancy: f32,
    /// Highlight power.
    pub highlight_power: f32,
    /// Background, 0..255 scale.
    pub background: [f32; 4],
}

#[cfg(test)]
mod tests {
    use super::*;
    use flame_core::variations;

    #[test]
    fn test_pack_identity_xform() {
        let xf = Xform::identity();
        let packed = XformGpu::pack(&xf).unwrap();
        assert_eq!(packed.affine0, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(packed.affine1[3], 1.0); // one variation
        assert_eq!(packed.vars[0].id, ids::LINEAR);
        assert_eq!(packed.vars[1].id, u32::MAX);
    }

    #[test]
    fn test_pack_rejects_unsupported() {
        let mut xf = Xform::new();
        xf.add_variation(variations::create(ids::NGON, 1.0).unwrap());
        assert_eq!(XformGpu::pack(&xf).unwrap_err(), ids::NGON);
    }

    #[test]
    fn test_pack_rejects_pre_chain() {
        let mut xf = Xform::identity();
        xf.add_variation(variations::create(ids::PRE_BLUR, 0.1).unwrap());
        assert!(XformGpu::pack(&xf).is_err());
    }

    #[test]
    fn test_pack_carries_params() {
        let mut xf = Xform::new();
        let mut blob = variations::create(ids::BLOB, 0.7).unwrap();
        blob.set_param("blob_waves", 5.0);
        xf.add_variation(blob);
        let packed = XformGpu::pack(&xf).unwrap();
        assert_eq!(packed.vars[0].id, ids::BLOB);
        assert_eq!(packed.vars[0].weight, 0.7);
        assert!(packed.vars[0].params.contains(&5.0));
    }

    #[test]
    fn test_struct_sizes_vec4_aligned() {
        assert_eq!(std::mem::size_of::<VarOpGpu>() % 16, 0);
        assert_eq!(std::mem::size_of::<XformGpu>() % 16, 0);
        assert_eq!(std::mem::size_of::<IterParamsGpu>() % 16, 0);
        assert_eq!(std::mem::size_of::<FinalParamsGpu>() % 16, 0);
    }
}
