//! Keyframe alignment.
//!
//! Before two embers can be blended, their xform lists must have the same
//! shape: equal counts, matching final-xform presence, and matching
//! parametric variation sets per position. Padding positions are filled
//! with identity xforms, but a plain identity interpolates badly against
//! hole-prone variations, so the padding borrows a better partner from its
//! neighbors (a 180-degree flipped `linear(-1)` against spherical-family
//! variations, zeroed parametric twins against the rest).

use flame_core::{Affine2D, AffineInterp, Ember, Variation, Xform, variations, variations::ids};
use tracing::debug;

/// Variations that punch holes when blended against a plain identity.
/// Interpolating against a flipped negative linear avoids the hole.
const FLIP_IDS: &[u32] = &[ids::SPHERICAL, ids::NGON, ids::JULIAN, ids::POLAR, ids::JULIA];

/// Parametric variations that get a zeroed twin on the padding side.
/// The value is the parameter settings that make the twin an identity.
const PARAM_PAD: &[(u32, &[(&str, f32)])] = &[
    (ids::RECTANGLES, &[("rectangles_x", 0.0), ("rectangles_y", 0.0)]),
    (ids::RINGS2, &[("rings2_val", 0.0)]),
    (ids::FAN2, &[]),
    (ids::BLOB, &[("blob_low", 1.0)]),
    (ids::PERSPECTIVE, &[]),
    (ids::CURL, &[("curl_c1", 0.0)]),
    (
        ids::SUPER_SHAPE,
        &[
            ("super_shape_n1", 2.0),
            ("super_shape_n2", 2.0),
            ("super_shape_n3", 2.0),
        ],
    ),
];

/// Sorts the xform list so color speed is the primary key, with affine
/// determinant and orientation angle as tie breakers.
///
/// Alignment pairs xforms by position, so keyframes authored with their
/// xforms in different orders still line up by color role.
pub fn sort_by_color_role(ember: &mut Ember) {
    ember.xforms.sort_by(|a, b| {
        a.color_speed
            .partial_cmp(&b.color_speed)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                a.pre_affine
                    .determinant()
                    .partial_cmp(&b.pre_affine.determinant())
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(
                a.pre_affine
                    .orientation()
                    .partial_cmp(&b.pre_affine.orientation())
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
}

/// Returns an aligned copy of the given keyframes.
///
/// Every output ember has the same xform count (padding with zero-weight
/// identities), a final xform if any input had one, and every parametric
/// variation its neighbors carry (weight 0 where it was missing).
pub fn align(sources: &[Ember]) -> Vec<Ember> {
    let max_count = sources.iter().map(|e| e.xform_count()).max().unwrap_or(0);
    let any_final = sources.iter().any(|e| e.final_xform.is_some());
    let aligned_already = sources
        .iter()
        .all(|e| e.xform_count() == max_count && e.final_xform.is_some() == any_final);

    let mut out: Vec<Ember> = sources.to_vec();

    for ember in &mut out {
        while ember.xform_count() < max_count {
            let mut pad = Xform::identity();
            pad.weight = 0.0;
            pad.color_speed = 0.0;
            pad.cache_color_vals();
            ember.add_xform(pad);
        }
        if any_final && ember.final_xform.is_none() {
            let mut pad = Xform::identity();
            pad.color_speed = 0.0;
            pad.cache_color_vals();
            ember.final_xform = Some(pad);
        }
    }

    let total = max_count + usize::from(any_final);

    // Every parametric variation present in a neighbor must exist in each
    // xform so parameters have something to blend against.
    for i in 0..out.len() {
        for xf in 0..total {
            let other_idx = if i > 0 { i - 1 } else { i + 1 };
            if other_idx >= out.len() {
                continue;
            }
            let missing: Vec<Box<dyn Variation>> = {
                let source = out[other_idx].total_xform(xf);
                let dest = out[i].total_xform(xf);
                let (Some(source), Some(dest)) = (source, dest) else {
                    continue;
                };
                source
                    .all_variations()
                    .filter(|v| !v.params().is_empty() && dest.variation_by_id(v.id()).is_none())
                    .map(|v| {
                        let mut copy = v.clone_boxed();
                        copy.set_weight(0.0);
                        copy
                    })
                    .collect()
            };
            if let Some(dest) = out[i].total_xform_mut(xf) {
                for v in missing {
                    dest.add_variation(v);
                }
            }
        }
    }

    if aligned_already {
        return out;
    }

    // Choose better identities for the padding positions.
    for i in 0..out.len() {
        for xf in sources[i].xform_count()..max_count {
            substitute_padding(&mut out, sources, i, xf);
        }
    }

    out
}

/// Replaces the plain linear in a padding xform with whatever interpolates
/// cleanly against the neighbors at the same position.
fn substitute_padding(out: &mut [Ember], sources: &[Ember], i: usize, xf: usize) {
    let count = out.len();
    let log_interp = if i == 0 {
        out[i].affine_interp == AffineInterp::Log
    } else {
        out[i - 1].affine_interp == AffineInterp::Log
    };

    let mut found = 0i32;
    let mut adds: Vec<Box<dyn Variation>> = Vec::new();
    let mut new_affine: Option<Affine2D> = None;

    for ii in [-1i64, 1] {
        let n = i as i64 + ii;
        if n < 0 || n as usize >= count {
            continue;
        }
        let n = n as usize;
        // A neighbor that is also padding has nothing to teach us.
        if xf >= sources[n].xform_count() {
            continue;
        }
        let Some(other) = out[n].total_xform(xf) else {
            continue;
        };

        if log_interp && found == 0 {
            // The spherical family trumps everything; pair it against a
            // 180-degree rotated negative identity.
            if FLIP_IDS.iter().any(|&id| other.variation_by_id(id).is_some()) {
                adds.clear();
                adds.push(variations::linear(-1.0));
                new_affine = Some(Affine2D::flipped());
                found = -1;
            }
        }

        if found == 0 {
            for &(id, params) in PARAM_PAD {
                if other.variation_by_id(id).is_some() {
                    if let Some(mut v) = variations::create(id, 1.0) {
                        for &(name, value) in params {
                            v.set_param(name, value);
                        }
                        adds.push(v);
                        found += 1;
                    }
                }
            }
        }
    }

    let Some(dest) = out[i].total_xform_mut(xf) else {
        return;
    };

    if found == 0 {
        // Nothing special nearby; the plain linear identity stands.
        return;
    }

    debug!(keyframe = i, position = xf, "substituting padding identity");
    dest.delete_variation(ids::LINEAR);
    for v in adds {
        // The neighbor merge may have copied this id in already; the
        // identity-valued substitute takes precedence.
        dest.delete_variation(v.id());
        dest.add_variation(v);
    }
    if let Some(aff) = new_affine {
        dest.pre_affine = aff;
    }
    if found > 0 {
        dest.normalize_variation_weights();
    }
}

/// Stores per-column wind reference angles on asymmetric keyframe pairs.
///
/// When one side of a pair is static (`animate` off) and the other
/// animates, the static side's angle plus a full turn becomes the wind
/// reference, pinning the rotation direction during log interpolation.
pub fn compute_wind_refs(embers: &mut [Ember]) {
    if embers.is_empty() {
        return;
    }
    let xform_count = embers[0].xform_count();

    for xfi in 0..xform_count {
        let mut angles: Vec<[f32; 2]> = Vec::with_capacity(embers.len());
        for ember in embers.iter() {
            let Some(xf) = ember.total_xform(xfi) else {
                angles.push([0.0; 2]);
                continue;
            };
            let mut a = [0.0f32; 2];
            for (col, slot) in a.iter_mut().enumerate() {
                let (cx, cy) = xf.pre_affine.column(col);
                *slot = cy.atan2(cx);
            }
            angles.push(a);
        }

        // Shorter-arc adjustment before comparing pairs.
        for k in 1..angles.len() {
            for col in 0..2 {
                let d = angles[k][col] - angles[k - 1][col];
                if d > std::f32::consts::PI + 1e-6 {
                    angles[k][col] -= 2.0 * std::f32::consts::PI;
                } else if d < -(std::f32::consts::PI - 1e-6) {
                    angles[k][col] += 2.0 * std::f32::consts::PI;
                }
            }
        }

        for k in 1..embers.len() {
            let sym0 = !embers[k - 1]
                .total_xform(xfi)
                .map(|x| x.animate)
                .unwrap_or(false);
            let sym1 = !embers[k]
                .total_xform(xfi)
                .map(|x| x.animate)
                .unwrap_or(false);

            for col in 0..2 {
                let wind = if sym1 && !sym0 {
                    Some(angles[k - 1][col] + 2.0 * std::f32::consts::PI)
                } else if sym0 && !sym1 {
                    Some(angles[k][col] + 2.0 * std::f32::consts::PI)
                } else {
                    None
                };
                if let Some(w) = wind {
                    if let Some(xf) = embers[k].total_xform_mut(xfi) {
                        xf.pre_affine.wind[col] = w;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flame_core::variations::ids;

    fn ember_with_xforms(n: usize) -> Ember {
        let mut e = Ember::new(32, 32);
        for _ in 0..n {
            e.add_xform(Xform::identity());
        }
        e
    }

    #[test]
    fn test_align_pads_to_max() {
        let a = ember_with_xforms(2);
        let b = ember_with_xforms(4);
        let aligned = align(&[a, b]);
        assert_eq!(aligned[0].xform_count(), 4);
        assert_eq!(aligned[1].xform_count(), 4);
        // Padding must not participate in selection.
        assert_eq!(aligned[0].xforms[2].weight, 0.0);
        assert_eq!(aligned[0].xforms[3].weight, 0.0);
    }

    #[test]
    fn test_align_adds_final_everywhere() {
        let a = ember_with_xforms(1);
        let mut b = ember_with_xforms(1);
        b.final_xform = Some(Xform::identity());
        let aligned = align(&[a, b]);
        assert!(aligned[0].final_xform.is_some());
        assert!(aligned[1].final_xform.is_some());
    }

    #[test]
    fn test_align_flip_substitution() {
        // Keyframe 1 has an extra xform using spherical; keyframe 0's
        // padding should become the flipped negative linear.
        let a = ember_with_xforms(1);
        let mut b = ember_with_xforms(1);
        let mut sph = Xform::new();
        sph.add_variation(variations::create(ids::SPHERICAL, 1.0).unwrap());
        b.add_xform(sph);
        let aligned = align(&[a, b]);

        let pad = &aligned[0].xforms[1];
        let lin = pad.variation_by_id(ids::LINEAR).expect("linear present");
        assert_eq!(lin.weight(), -1.0);
        assert_eq!(pad.pre_affine, Affine2D::flipped());
    }

    #[test]
    fn test_align_parametric_substitution() {
        let a = ember_with_xforms(1);
        let mut b = ember_with_xforms(1);
        let mut xf = Xform::new();
        xf.add_variation(variations::create(ids::RINGS2, 1.0).unwrap());
        b.add_xform(xf);
        // Linear affine interpolation: the flip rule is skipped and the
        // zeroed parametric twin is used instead.
        let mut a = a;
        a.affine_interp = AffineInterp::Linear;
        let aligned = align(&[a, b]);

        let pad = &aligned[0].xforms[1];
        let rings = pad.variation_by_id(ids::RINGS2).expect("rings2 pad");
        let val = rings
            .params()
            .iter()
            .find(|p| p.name == "rings2_val")
            .unwrap()
            .value;
        assert_eq!(val, 0.0);
        assert!(pad.variation_by_id(ids::LINEAR).is_none());
    }

    #[test]
    fn test_align_merges_parametric_params() {
        // Both sides have an xform at position 0, but only one carries a
        // parametric variation. The other side gets it at weight 0.
        let a = ember_with_xforms(1);
        let mut b = ember_with_xforms(1);
        let mut v = variations::create(ids::BLOB, 0.8).unwrap();
        v.set_param("blob_waves", 9.0);
        b.xforms[0].add_variation(v);
        let aligned = align(&[a, b]);

        let merged = aligned[0].xforms[0]
            .variation_by_id(ids::BLOB)
            .expect("blob merged into other side");
        assert_eq!(merged.weight(), 0.0);
        let waves = merged
            .params()
            .iter()
            .find(|p| p.name == "blob_waves")
            .unwrap()
            .value;
        assert_eq!(waves, 9.0);
    }

    #[test]
    fn test_sort_by_color_role() {
        let mut e = Ember::new(32, 32);
        let mut x1 = Xform::identity();
        x1.color_speed = 0.9;
        let mut x2 = Xform::identity();
        x2.color_speed = 0.1;
        e.add_xform(x1);
        e.add_xform(x2);
        sort_by_color_role(&mut e);
        assert!(e.xforms[0].color_speed < e.xforms[1].color_speed);
    }

    #[test]
    fn test_wind_refs_on_asymmetric_pair() {
        let mut a = ember_with_xforms(1);
        let mut b = ember_with_xforms(1);
        a.xforms[0].animate = true;
        b.xforms[0].animate = false;
        let mut seq = vec![a, b];
        compute_wind_refs(&mut seq);
        // The static side supplies the reference.
        assert!(seq[1].xforms[0].pre_affine.wind[0] > 0.0);
    }
}
