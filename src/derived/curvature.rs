//! Second-derivative curvature maps.
//!
//! Convex ground (ridges, hilltops) is positive, concave ground (valleys,
//! hollows) negative. The map stores `0.5 + k * gain`, clamped, so flat and
//! planar ground read 0.5.

use serde::{Deserialize, Serialize};

use crate::derived::{map_like, PostProcess};
use crate::heightfield::HeightField;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurvatureKind {
    /// Negative half-Laplacian; overall convexity
    #[default]
    Mean,
    /// Along the steepest slope; accelerating vs decelerating flow
    Profile,
    /// Across the slope; diverging vs converging flow
    Plan,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurvatureParams {
    pub kind: CurvatureKind,
    /// Multiplier on curvature (1/m) before encoding
    pub gain: f32,
    pub post: PostProcess,
}

impl Default for CurvatureParams {
    fn default() -> Self {
        Self {
            kind: CurvatureKind::Mean,
            gain: 10.0,
            post: PostProcess::default(),
        }
    }
}

/// Slopes flatter than this have no defined profile or plan direction.
const MIN_SLOPE: f32 = 1e-6;

/// Curvature in 1/m at `(x, z)`. Border samples reuse the nearest interior
/// stencil; grids narrower than 3 samples along an axis contribute nothing
/// along it.
pub fn curvature_at(field: &HeightField, x: usize, z: usize, kind: CurvatureKind) -> f32 {
    let (w, d) = field.dimensions();
    let scale = field.scale();
    let dx = scale.cell_size_x(w);
    let dz = scale.cell_size_z(d);
    let h = |xx: usize, zz: usize| scale.to_metres(field.get(xx, zz));

    let cx = if w >= 3 { x.clamp(1, w - 2) } else { x };
    let cz = if d >= 3 { z.clamp(1, d - 2) } else { z };
    let c = h(cx, cz);

    let (p, r) = if w >= 3 {
        let (e, wv) = (h(cx + 1, cz), h(cx - 1, cz));
        ((e - wv) / (2.0 * dx), (e - 2.0 * c + wv) / (dx * dx))
    } else {
        (0.0, 0.0)
    };
    let (q, t) = if d >= 3 {
        let (s, n) = (h(cx, cz + 1), h(cx, cz - 1));
        ((s - n) / (2.0 * dz), (s - 2.0 * c + n) / (dz * dz))
    } else {
        (0.0, 0.0)
    };
    let s = if w >= 3 && d >= 3 {
        (h(cx + 1, cz + 1) - h(cx + 1, cz - 1) - h(cx - 1, cz + 1) + h(cx - 1, cz - 1))
            / (4.0 * dx * dz)
    } else {
        0.0
    };

    match kind {
        CurvatureKind::Mean => -(r + t) * 0.5,
        CurvatureKind::Profile | CurvatureKind::Plan => {
            let g2 = p * p + q * q;
            let g = g2.sqrt();
            if g < MIN_SLOPE {
                return 0.0;
            }
            let denom = g2 * g;
            if kind == CurvatureKind::Profile {
                -(p * p * r + 2.0 * p * q * s + q * q * t) / denom
            } else {
                -(q * q * r - 2.0 * p * q * s + p * p * t) / denom
            }
        }
    }
}

pub fn curvature_map(field: &HeightField, params: &CurvatureParams) -> HeightField {
    let mut out = map_like(field, |x, z| {
        0.5 + curvature_at(field, x, z, params.kind) * params.gain
    });
    params.post.apply(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::WorldScale;

    const EPS: f32 = 1e-3;

    fn unit() -> WorldScale {
        WorldScale::new(10.0, 10.0, 10.0)
    }

    fn dome(sign: f32) -> HeightField {
        HeightField::from_fn(11, 11, |x, z| {
            let dx = x as f32 - 5.0;
            let dz = z as f32 - 5.0;
            0.5 + sign * (0.3 - 0.005 * (dx * dx + dz * dz))
        })
        .with_scale(unit())
    }

    #[test]
    fn test_plane_reads_neutral() {
        let plane = HeightField::from_fn(11, 11, |x, z| 0.1 + 0.03 * x as f32 + 0.02 * z as f32)
            .with_scale(unit());
        for kind in [CurvatureKind::Mean, CurvatureKind::Profile, CurvatureKind::Plan] {
            let map = curvature_map(&plane, &CurvatureParams { kind, ..Default::default() });
            assert!((map.get(5, 5) - 0.5).abs() < EPS, "{:?}", kind);
        }
    }

    #[test]
    fn test_hill_convex_bowl_concave() {
        let params = CurvatureParams::default();
        assert!(curvature_map(&dome(1.0), &params).get(5, 5) > 0.5);
        assert!(curvature_map(&dome(-1.0), &params).get(5, 5) < 0.5);
    }

    #[test]
    fn test_mean_curvature_value() {
        // h = 5 - 0.05 * r^2 metres => laplacian = -0.2, mean curvature = 0.1
        let k = curvature_at(&dome(1.0), 5, 5, CurvatureKind::Mean);
        assert!((k - 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_plan_curvature_on_ridge_flank() {
        // Off-centre on a dome, contours are convex: flow diverges.
        let k = curvature_at(&dome(1.0), 7, 5, CurvatureKind::Plan);
        assert!(k > 0.0);
    }

    #[test]
    fn test_profile_curvature_sign_on_crest_and_hollow() {
        // On the flank at x = 7: p = -0.2, r = -0.1, so profile = -r / |p| = 0.5.
        let crest = curvature_at(&dome(1.0), 7, 5, CurvatureKind::Profile);
        assert!(crest > 0.0);
        assert!((crest - 0.5).abs() < 1e-3);

        let hollow = curvature_at(&dome(-1.0), 7, 5, CurvatureKind::Profile);
        assert!(hollow < 0.0);
        assert!((hollow + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_flat_profile_is_zero() {
        let flat = HeightField::new_with(5, 5, 0.5);
        assert_eq!(curvature_at(&flat, 2, 2, CurvatureKind::Profile), 0.0);
    }
}
