//! Keyframe interpolation.
//!
//! A [`Sequence`] holds time-sorted keyframe embers and produces the
//! blended ember for any time in between: align the participating
//! keyframes, apply motion elements, then combine every field by its
//! interpolation category (scalar-linear, color, affine, xaos-cellwise,
//! parametric-componentwise).

use crate::align::{align, compute_wind_refs, sort_by_color_role};
use flame_core::{
    AffineInterp, Affine2D, Ember, EmberInterp, Error, PALETTE_SIZE, Palette, Result, Variation,
    Xform,
};
use flame_math::{catmull_rom_weights, clamp01, motion_value};
use tracing::trace;

/// A time-sorted run of keyframe embers.
#[derive(Debug, Clone)]
pub struct Sequence {
    keyframes: Vec<Ember>,
}

impl Sequence {
    /// Creates a sequence, sorting the keyframes by time.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigInvalid`] if `keyframes` is empty.
    pub fn new(mut keyframes: Vec<Ember>) -> Result<Self> {
        if keyframes.is_empty() {
            return Err(Error::config_invalid("keyframe sequence is empty"));
        }
        keyframes.sort_by(|a, b| {
            a.time
                .partial_cmp(&b.time)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(Self { keyframes })
    }

    /// The sorted keyframes.
    #[inline]
    pub fn keyframes(&self) -> &[Ember] {
        &self.keyframes
    }

    /// Produces the ember at `time`.
    ///
    /// Times outside the keyframe span clamp to the nearest end. Linear
    /// mode blends the two bracketing keyframes; smooth mode blends the
    /// four surrounding ones with Catmull-Rom weights, falling back to
    /// linear at the sequence ends.
    pub fn at(&self, time: f32) -> Ember {
        let kf = &self.keyframes;
        if kf.len() == 1 {
            let mut only = kf[0].clone();
            apply_all_motion(&mut only, time);
            only.time = time;
            only.finalize();
            return only;
        }

        let time = time.clamp(kf[0].time, kf[kf.len() - 1].time);
        let mut i1 = 0;
        while i1 + 2 < kf.len() && kf[i1 + 1].time <= time {
            i1 += 1;
        }
        let t0 = kf[i1].time;
        let t1 = kf[i1 + 1].time;
        let span = t1 - t0;
        let frac = if span > 0.0 { (time - t0) / span } else { 0.0 };

        let smooth = kf[i1].interp == EmberInterp::Smooth
            && i1 >= 1
            && i1 + 2 < kf.len();

        trace!(time, i1, frac, smooth, "interpolating keyframes");

        let (participants, coefs): (Vec<Ember>, Vec<f32>) = if smooth {
            let w = catmull_rom_weights(frac);
            (
                kf[i1 - 1..=i1 + 2].to_vec(),
                vec![w[0], w[1], w[2], w[3]],
            )
        } else {
            (
                kf[i1..=i1 + 1].to_vec(),
                vec![1.0 - frac, frac],
            )
        };

        let mut participants = participants;
        for e in &mut participants {
            sort_by_color_role(e);
            apply_all_motion(e, time);
        }
        let mut aligned = align(&participants);
        compute_wind_refs(&mut aligned);

        let mut result = blend_embers(&aligned, &coefs);
        result.time = time;
        result.finalize();
        result
    }
}

fn apply_all_motion(ember: &mut Ember, time: f32) {
    for xf in &mut ember.xforms {
        apply_motion(xf, time);
    }
    if let Some(fx) = &mut ember.final_xform {
        apply_motion(fx, time);
    }
}

/// Applies an xform's motion elements at the given time.
///
/// Each element contributes `field * motion(freq * time)` to the base
/// xform's corresponding field; weights and colors are clamped back to
/// their valid ranges afterwards.
pub fn apply_motion(xform: &mut Xform, time: f32) {
    if xform.motion.is_empty() {
        return;
    }

    let motion = std::mem::take(&mut xform.motion);
    for mot in &motion {
        let factor = motion_value(mot.motion_func, mot.motion_freq * time);
        xform.weight += mot.weight * factor;
        xform.color_x += mot.color_x * factor;
        xform.color_speed += mot.color_speed * factor;
        xform.opacity += mot.opacity * factor;

        xform.pre_affine.a += mot.pre_affine.a * factor;
        xform.pre_affine.b += mot.pre_affine.b * factor;
        xform.pre_affine.c += mot.pre_affine.c * factor;
        xform.pre_affine.d += mot.pre_affine.d * factor;
        xform.pre_affine.e += mot.pre_affine.e * factor;
        xform.pre_affine.f += mot.pre_affine.f * factor;

        xform.post_affine.a += mot.post_affine.a * factor;
        xform.post_affine.b += mot.post_affine.b * factor;
        xform.post_affine.c += mot.post_affine.c * factor;
        xform.post_affine.d += mot.post_affine.d * factor;
        xform.post_affine.e += mot.post_affine.e * factor;
        xform.post_affine.f += mot.post_affine.f * factor;

        for mv in mot.all_variations() {
            if let Some(existing) = xform.variation_by_id_mut(mv.id()) {
                let w = existing.weight() + mv.weight() * factor;
                existing.set_weight(w);
                for p in mv.params() {
                    let current = existing
                        .params()
                        .iter()
                        .find(|ep| ep.name == p.name)
                        .map(|ep| ep.value)
                        .unwrap_or(0.0);
                    existing.set_param(p.name, current + p.value * factor);
                }
            }
        }
    }
    xform.motion = motion;

    xform.weight = xform.weight.max(0.0);
    xform.color_x = clamp01(xform.color_x);
    xform.color_speed = clamp01(xform.color_speed);
    xform.opacity = clamp01(xform.opacity);
    xform.cache_color_vals();
}

/// Blends aligned embers with the given weights.
///
/// The participants must come out of [`align`] so their xform lists have
/// identical shape; weights are expected to sum to 1.
pub fn blend_embers(aligned: &[Ember], coefs: &[f32]) -> Ember {
    debug_assert_eq!(aligned.len(), coefs.len());
    let first = &aligned[0];
    let mut out = first.clone();

    macro_rules! blend_scalar {
        ($field:ident) => {
            out.$field = aligned
                .iter()
                .zip(coefs)
                .map(|(e, &c)| c * e.$field)
                .sum();
        };
    }

    blend_scalar!(quality);
    blend_scalar!(pixels_per_unit);
    blend_scalar!(zoom);
    blend_scalar!(center_x);
    blend_scalar!(center_y);
    blend_scalar!(rotate);
    blend_scalar!(brightness);
    blend_scalar!(gamma);
    blend_scalar!(vibrancy);
    blend_scalar!(gamma_threshold);
    blend_scalar!(highlight_power);
    blend_scalar!(spatial_filter_radius);
    blend_scalar!(de_min_radius);
    blend_scalar!(de_max_radius);
    blend_scalar!(de_curve);
    blend_scalar!(cam_z_pos);
    blend_scalar!(cam_perspective);
    blend_scalar!(cam_yaw);
    blend_scalar!(cam_pitch);
    blend_scalar!(cam_depth_blur);
    blend_scalar!(temporal_filter_width);
    blend_scalar!(temporal_filter_exp);

    for ch in 0..4 {
        out.background[ch] = aligned
            .iter()
            .zip(coefs)
            .map(|(e, &c)| c * e.background[ch])
            .sum();
    }

    out.palette = blend_palettes(aligned, coefs);

    let count = first.xform_count();
    out.xforms.clear();
    for xi in 0..count {
        let parts: Vec<&Xform> = aligned.iter().map(|e| &e.xforms[xi]).collect();
        out.xforms.push(blend_xforms(&parts, coefs, first.affine_interp));
    }

    if first.final_xform.is_some() {
        let parts: Vec<&Xform> = aligned
            .iter()
            .map(|e| e.final_xform.as_ref().expect("aligned final"))
            .collect();
        out.final_xform = Some(blend_xforms(&parts, coefs, first.affine_interp));
    }

    out
}

fn blend_palettes(aligned: &[Ember], coefs: &[f32]) -> Palette {
    if aligned.len() == 2 {
        return aligned[0]
            .palette
            .blend(&aligned[1].palette, coefs[1], aligned[0].palette_interp);
    }
    // Four-way smooth blends go componentwise; the HSV path is defined
    // pairwise only.
    let mut entries = vec![[0.0f32; 4]; PALETTE_SIZE];
    for (e, &c) in aligned.iter().zip(coefs) {
        for (dst, src) in entries.iter_mut().zip(e.palette.entries()) {
            for ch in 0..4 {
                dst[ch] += c * src[ch];
            }
        }
    }
    for e in &mut entries {
        for ch in e.iter_mut() {
            *ch = clamp01(*ch);
        }
    }
    Palette::from_entries(entries).expect("palette size is fixed")
}

fn blend_xforms(parts: &[&Xform], coefs: &[f32], affine_interp: AffineInterp) -> Xform {
    let mut out = Xform::new();

    let sum = |f: &dyn Fn(&Xform) -> f32| -> f32 {
        parts.iter().zip(coefs).map(|(x, &c)| c * f(x)).sum()
    };

    out.weight = sum(&|x| x.weight).max(0.0);
    out.color_x = clamp01(sum(&|x| x.color_x));
    out.color_speed = clamp01(sum(&|x| x.color_speed));
    out.opacity = clamp01(sum(&|x| x.opacity));
    out.direct_color = clamp01(sum(&|x| x.direct_color));
    out.animate = parts[0].animate;

    // Xaos rows blend cellwise; negatives clamp to zero. Missing entries
    // read as 1 through Xform::xaos().
    let xaos_len = parts.iter().map(|x| x.xaos.len()).max().unwrap_or(0);
    if xaos_len > 0 {
        for j in 0..xaos_len {
            let v: f32 = parts.iter().zip(coefs).map(|(x, &c)| c * x.xaos(j)).sum();
            out.set_xaos(j, v.max(0.0));
        }
    }

    out.pre_affine = blend_affines(parts, coefs, affine_interp, false);
    out.post_affine = blend_affines(parts, coefs, affine_interp, true);

    // Union of variation ids, in order of first appearance.
    let mut ids_seen: Vec<u32> = Vec::new();
    for x in parts {
        for v in x.all_variations() {
            if !ids_seen.contains(&v.id()) {
                ids_seen.push(v.id());
            }
        }
    }

    for id in ids_seen {
        let template = parts
            .iter()
            .find_map(|x| x.variation_by_id(id))
            .expect("id came from the union");
        let mut blended: Box<dyn Variation> = template.clone_boxed();

        let weight: f32 = parts
            .iter()
            .zip(coefs)
            .map(|(x, &c)| c * x.variation_by_id(id).map(|v| v.weight()).unwrap_or(0.0))
            .sum();
        blended.set_weight(weight);

        for p in template.params() {
            let value: f32 = parts
                .iter()
                .zip(coefs)
                .map(|(x, &c)| {
                    let v = x
                        .variation_by_id(id)
                        .and_then(|v| v.params().iter().find(|q| q.name == p.name).map(|q| q.value))
                        .unwrap_or(p.value);
                    c * v
                })
                .sum();
            blended.set_param(p.name, value);
        }

        if weight != 0.0 {
            out.add_variation(blended);
        }
    }

    out.cache_color_vals();
    out
}

fn blend_affines(
    parts: &[&Xform],
    coefs: &[f32],
    mode: AffineInterp,
    post: bool,
) -> Affine2D {
    let get = |x: &Xform| -> Affine2D {
        if post { x.post_affine } else { x.pre_affine }
    };

    match mode {
        AffineInterp::Linear => {
            let mut out = Affine2D::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
            for (x, &c) in parts.iter().zip(coefs) {
                let a = get(x);
                out.a += c * a.a;
                out.b += c * a.b;
                out.c += c * a.c;
                out.d += c * a.d;
                out.e += c * a.e;
                out.f += c * a.f;
            }
            out
        }
        AffineInterp::Log => {
            let mut seq: Vec<flame_math::PolarAffine> =
                parts.iter().map(|x| flame_math::decompose(&get(x))).collect();
            // Wind references only apply to the pre affine.
            let winds: Vec<[f32; 2]> = if post {
                vec![[0.0; 2]; parts.len()]
            } else {
                parts.iter().map(|x| x.pre_affine.wind).collect()
            };
            flame_math::adjust_rotation(&mut seq, &winds);
            flame_math::blend_polar(&seq, coefs)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use flame_core::variations::{self, ids};
    use flame_core::MotionFunc;

    fn keyframe(time: f32, weight: f32) -> Ember {
        let mut e = Ember::new(32, 32);
        let mut xf = Xform::identity();
        xf.weight = weight;
        xf.color_x = 0.25;
        e.add_xform(xf);
        e.time = time;
        e.brightness = 4.0;
        e
    }

    #[test]
    fn test_identity_at_keyframe_times() {
        let a = keyframe(0.0, 1.0);
        let mut b = keyframe(1.0, 3.0);
        b.brightness = 8.0;
        let seq = Sequence::new(vec![a, b]).unwrap();

        let at0 = seq.at(0.0);
        assert_relative_eq!(at0.xforms[0].weight, 1.0, epsilon = 1e-5);
        assert_relative_eq!(at0.brightness, 4.0, epsilon = 1e-5);

        let at1 = seq.at(1.0);
        assert_relative_eq!(at1.xforms[0].weight, 3.0, epsilon = 1e-5);
        assert_relative_eq!(at1.brightness, 8.0, epsilon = 1e-5);
    }

    #[test]
    fn test_midpoint_blend() {
        let a = keyframe(0.0, 1.0);
        let mut b = keyframe(1.0, 3.0);
        b.brightness = 8.0;
        let seq = Sequence::new(vec![a, b]).unwrap();
        let mid = seq.at(0.5);
        assert_relative_eq!(mid.xforms[0].weight, 2.0, epsilon = 1e-5);
        assert_relative_eq!(mid.brightness, 6.0, epsilon = 1e-5);
    }

    #[test]
    fn test_out_of_range_clamps() {
        let seq = Sequence::new(vec![keyframe(0.0, 1.0), keyframe(1.0, 3.0)]).unwrap();
        assert_relative_eq!(seq.at(-5.0).xforms[0].weight, 1.0, epsilon = 1e-5);
        assert_relative_eq!(seq.at(42.0).xforms[0].weight, 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_unsorted_keyframes_sort() {
        let seq = Sequence::new(vec![keyframe(1.0, 3.0), keyframe(0.0, 1.0)]).unwrap();
        assert_eq!(seq.keyframes()[0].time, 0.0);
    }

    #[test]
    fn test_empty_sequence_rejected() {
        assert!(Sequence::new(Vec::new()).is_err());
    }

    #[test]
    fn test_parametric_variation_blend() {
        let mut a = keyframe(0.0, 1.0);
        let mut va = variations::create(ids::BLOB, 1.0).unwrap();
        va.set_param("blob_waves", 2.0);
        a.xforms[0].add_variation(va);

        let mut b = keyframe(1.0, 1.0);
        let mut vb = variations::create(ids::BLOB, 1.0).unwrap();
        vb.set_param("blob_waves", 6.0);
        b.xforms[0].add_variation(vb);

        let seq = Sequence::new(vec![a, b]).unwrap();
        let mid = seq.at(0.5);
        let blob = mid.xforms[0].variation_by_id(ids::BLOB).unwrap();
        let waves = blob
            .params()
            .iter()
            .find(|p| p.name == "blob_waves")
            .unwrap()
            .value;
        assert_relative_eq!(waves, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_one_sided_variation_fades() {
        let mut a = keyframe(0.0, 1.0);
        a.xforms[0].add_variation(variations::create(ids::SWIRL, 0.8).unwrap());
        let b = keyframe(1.0, 1.0);

        let seq = Sequence::new(vec![a, b]).unwrap();
        let quarter = seq.at(0.75);
        let swirl = quarter.xforms[0].variation_by_id(ids::SWIRL).unwrap();
        assert_relative_eq!(swirl.weight(), 0.2, epsilon = 1e-5);
    }

    #[test]
    fn test_xaos_cellwise_with_clamp() {
        let mut a = keyframe(0.0, 1.0);
        a.xforms[0].set_xaos(0, 0.0);
        let mut b = keyframe(1.0, 1.0);
        b.xforms[0].set_xaos(0, 2.0);

        let seq = Sequence::new(vec![a, b]).unwrap();
        let mid = seq.at(0.5);
        assert_relative_eq!(mid.xforms[0].xaos(0), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_log_affine_blend_keeps_rotation() {
        let mut a = keyframe(0.0, 1.0);
        let theta0: f32 = 0.0;
        let theta1: f32 = std::f32::consts::FRAC_PI_2;
        a.xforms[0].pre_affine =
            Affine2D::new(theta0.cos(), -theta0.sin(), 0.0, theta0.sin(), theta0.cos(), 0.0);
        let mut b = keyframe(1.0, 1.0);
        b.xforms[0].pre_affine =
            Affine2D::new(theta1.cos(), -theta1.sin(), 0.0, theta1.sin(), theta1.cos(), 0.0);

        let seq = Sequence::new(vec![a, b]).unwrap();
        let mid = seq.at(0.5);
        // Log mode keeps the determinant at 1 through the rotation.
        assert_relative_eq!(mid.xforms[0].pre_affine.determinant(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_motion_element() {
        let mut base = Xform::identity();
        base.weight = 1.0;
        let mut mot = Xform::new();
        mot.clear_variations();
        mot.weight = 0.5;
        mot.motion_freq = 1.0;
        mot.motion_func = MotionFunc::Sin;
        base.motion.push(mot);

        // sin(2π * 0.25) = 1, so weight becomes 1.5.
        apply_motion(&mut base, 0.25);
        assert_relative_eq!(base.weight, 1.5, epsilon = 1e-5);
    }

    #[test]
    fn test_smooth_needs_four() {
        let mut kfs: Vec<Ember> = (0..4).map(|i| keyframe(i as f32, 1.0 + i as f32)).collect();
        for k in &mut kfs {
            k.interp = EmberInterp::Smooth;
        }
        let seq = Sequence::new(kfs).unwrap();
        // Between keyframes 1 and 2 all four participate.
        let v = seq.at(1.5);
        assert!(v.xforms[0].weight > 2.0 && v.xforms[0].weight < 3.0);
        // At the ends it falls back to pairwise.
        let v0 = seq.at(0.25);
        assert!(v0.xforms[0].weight > 1.0 && v0.xforms[0].weight < 2.0);
    }
}
