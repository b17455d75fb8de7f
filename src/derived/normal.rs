//! Normal maps from the surface gradient.

use serde::{Deserialize, Serialize};

use crate::derived::slope::{surface_gradient, GradientKernel};
use crate::derived::PostProcess;
use crate::heightfield::HeightField;
use crate::tilemap::Tilemap;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NormalSpace {
    /// X east, Y north (image up), Z out of the surface
    #[default]
    Tangent,
    /// Y-up world axes: X east, Y up, Z along the grid's Z (south)
    World,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalParams {
    /// Exaggeration of the horizontal components
    pub strength: f32,
    pub space: NormalSpace,
    pub kernel: GradientKernel,
    /// Applied to the height field before the normals are computed:
    /// flipping or inverting heights flips or inverts the relief the
    /// normals describe.
    pub post: PostProcess,
}

impl Default for NormalParams {
    fn default() -> Self {
        Self {
            strength: 1.0,
            space: NormalSpace::Tangent,
            kernel: GradientKernel::EightNeighbour,
            post: PostProcess::default(),
        }
    }
}

/// Unit normals per sample.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalMap {
    normals: Tilemap<[f32; 3]>,
    space: NormalSpace,
}

impl NormalMap {
    pub fn width(&self) -> usize {
        self.normals.width
    }

    pub fn depth(&self) -> usize {
        self.normals.height
    }

    pub fn space(&self) -> NormalSpace {
        self.space
    }

    pub fn get(&self, x: usize, z: usize) -> [f32; 3] {
        *self.normals.get(x, z)
    }

    /// Standard texture packing: each component mapped from [-1,1] to [0,1].
    pub fn packed(&self) -> Tilemap<[f32; 3]> {
        Tilemap::from_fn(self.width(), self.depth(), |x, z| {
            let [a, b, c] = self.get(x, z);
            [a * 0.5 + 0.5, b * 0.5 + 0.5, c * 0.5 + 0.5]
        })
    }
}

fn normalize([x, y, z]: [f32; 3]) -> [f32; 3] {
    let len = (x * x + y * y + z * z).sqrt();
    [x / len, y / len, z / len]
}

pub fn normal_map(field: &HeightField, params: &NormalParams) -> NormalMap {
    let mut source = field.duplicate();
    params.post.apply(&mut source);

    let normals = Tilemap::from_fn(source.width(), source.depth(), |x, z| {
        let (gx, gz) = surface_gradient(&source, x, z, params.kernel);
        let (gx, gz) = (gx * params.strength, gz * params.strength);
        match params.space {
            // d/dnorth = -d/dz, so the north component of the normal is +gz.
            NormalSpace::Tangent => normalize([-gx, gz, 1.0]),
            NormalSpace::World => normalize([-gx, 1.0, -gz]),
        }
    });

    NormalMap {
        normals,
        space: params.space,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::WorldScale;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_flat_packs_to_blue() {
        let flat = HeightField::new_with(4, 4, 0.5);
        let map = normal_map(&flat, &NormalParams::default());
        assert_eq!(map.packed().get(1, 1), &[0.5, 0.5, 1.0]);

        let world = normal_map(
            &flat,
            &NormalParams {
                space: NormalSpace::World,
                ..Default::default()
            },
        );
        assert_eq!(world.get(2, 2), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_45_degree_ramp() {
        // Rises 1 m per 1 m eastward.
        let ramp = HeightField::from_fn(11, 11, |x, _| x as f32 / 10.0)
            .with_scale(WorldScale::new(10.0, 10.0, 10.0));
        let n = normal_map(&ramp, &NormalParams::default()).get(5, 5);
        let half = std::f32::consts::FRAC_1_SQRT_2;
        assert!((n[0] + half).abs() < EPS);
        assert!(n[1].abs() < EPS);
        assert!((n[2] - half).abs() < EPS);
    }

    #[test]
    fn test_normals_are_unit_length() {
        let field = HeightField::from_fn(9, 9, |x, z| ((x * 5 + z * 3) % 7) as f32 / 7.0);
        let map = normal_map(
            &field,
            &NormalParams {
                strength: 3.0,
                ..Default::default()
            },
        );
        for z in 0..9 {
            for x in 0..9 {
                let [a, b, c] = map.get(x, z);
                assert!(((a * a + b * b + c * c).sqrt() - 1.0).abs() < EPS);
            }
        }
    }

    #[test]
    fn test_invert_flips_relief() {
        let ramp = HeightField::from_fn(11, 11, |x, _| x as f32 / 10.0);
        let params = NormalParams {
            post: PostProcess {
                invert: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let up = normal_map(&ramp, &NormalParams::default()).get(5, 5);
        let down = normal_map(&ramp, &params).get(5, 5);
        assert!((up[0] + down[0]).abs() < EPS);
    }
}
