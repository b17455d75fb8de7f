//! Aspect: the compass direction a slope faces (its downhill direction).

use serde::{Deserialize, Serialize};

use crate::derived::slope::{surface_gradient, GradientKernel};
use crate::derived::{map_like, PostProcess};
use crate::heightfield::HeightField;

/// Gradients below this (metres per metre) count as flat.
const FLAT_GRADIENT: f32 = 1e-6;

/// How the azimuth is written into [0,1].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectEncoding {
    /// Azimuth clockwise from north, 0..360 degrees mapped to 0..1. Flat is 0.
    #[default]
    Degrees,
    /// 1 = faces north, 0 = faces south, 0.5 = east, west or flat.
    NorthSouth,
    /// 1 = faces east, 0 = faces west, 0.5 = north, south or flat.
    EastWest,
    /// Eight compass classes N, NE, ... NW mapped to 0, 1/7, ... 1. Flat is 0.
    Octant,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AspectParams {
    pub encoding: AspectEncoding,
    pub kernel: GradientKernel,
    pub post: PostProcess,
}

/// Azimuth of steepest descent in degrees clockwise from north, or `None`
/// where the surface is flat.
pub fn azimuth(field: &HeightField, x: usize, z: usize, kernel: GradientKernel) -> Option<f32> {
    let (gx, gz) = surface_gradient(field, x, z, kernel);
    if gx.hypot(gz) < FLAT_GRADIENT {
        return None;
    }
    // Downhill is (-gx east, -gz south); north component is +gz.
    let deg = (-gx).atan2(gz).to_degrees();
    Some(if deg < 0.0 { deg + 360.0 } else { deg })
}

fn encode(azimuth: Option<f32>, encoding: AspectEncoding) -> f32 {
    match (encoding, azimuth) {
        (AspectEncoding::Degrees, None) | (AspectEncoding::Octant, None) => 0.0,
        (AspectEncoding::NorthSouth, None) | (AspectEncoding::EastWest, None) => 0.5,
        (AspectEncoding::Degrees, Some(a)) => a / 360.0,
        (AspectEncoding::NorthSouth, Some(a)) => a.to_radians().cos() * 0.5 + 0.5,
        (AspectEncoding::EastWest, Some(a)) => a.to_radians().sin() * 0.5 + 0.5,
        (AspectEncoding::Octant, Some(a)) => {
            let class = ((a / 45.0).round() as usize) % 8;
            class as f32 / 7.0
        }
    }
}

pub fn aspect_map(field: &HeightField, params: &AspectParams) -> HeightField {
    let mut out = map_like(field, |x, z| {
        encode(azimuth(field, x, z, params.kernel), params.encoding)
    });
    params.post.apply(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    /// Surface that drops toward the given compass direction.
    fn facing(east: f32, north: f32) -> HeightField {
        // North is -z, so height grows southward when the slope faces north.
        HeightField::from_fn(9, 9, |x, z| {
            0.5 - 0.02 * (east * x as f32 - north * z as f32)
        })
    }

    fn center(params: AspectParams, field: &HeightField) -> f32 {
        aspect_map(field, &params).get(4, 4)
    }

    #[test]
    fn test_cardinal_azimuths() {
        let params = AspectParams::default();
        assert!((center(params, &facing(0.0, 1.0)) - 0.0).abs() < EPS);
        assert!((center(params, &facing(1.0, 0.0)) - 0.25).abs() < EPS);
        assert!((center(params, &facing(0.0, -1.0)) - 0.5).abs() < EPS);
        assert!((center(params, &facing(-1.0, 0.0)) - 0.75).abs() < EPS);
    }

    #[test]
    fn test_north_south_and_east_west() {
        let ns = AspectParams {
            encoding: AspectEncoding::NorthSouth,
            ..Default::default()
        };
        let ew = AspectParams {
            encoding: AspectEncoding::EastWest,
            ..Default::default()
        };
        assert!((center(ns, &facing(0.0, 1.0)) - 1.0).abs() < EPS);
        assert!(center(ns, &facing(0.0, -1.0)).abs() < EPS);
        assert!((center(ew, &facing(1.0, 0.0)) - 1.0).abs() < EPS);
        assert!(center(ew, &facing(-1.0, 0.0)).abs() < EPS);
    }

    #[test]
    fn test_octant_classes() {
        let params = AspectParams {
            encoding: AspectEncoding::Octant,
            ..Default::default()
        };
        assert!((center(params, &facing(1.0, 1.0)) - 1.0 / 7.0).abs() < EPS);
        assert!((center(params, &facing(-1.0, 1.0)) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_flat_encodings() {
        let flat = HeightField::new_with(5, 5, 0.3);
        assert_eq!(center(AspectParams::default(), &flat), 0.0);
        let ns = AspectParams {
            encoding: AspectEncoding::NorthSouth,
            ..Default::default()
        };
        assert_eq!(aspect_map(&flat, &ns).get(2, 2), 0.5);
    }
}
