//! Surface gradient and slope maps.

use serde::{Deserialize, Serialize};

use crate::derived::{map_like, PostProcess};
use crate::erosion::utils::gradient_at_cell;
use crate::heightfield::HeightField;

/// Finite-difference stencil for the surface gradient.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradientKernel {
    /// Central differences over the 4 cardinal neighbours
    #[default]
    FourNeighbour,
    /// Horn's weighted 3x3 stencil over all 8 neighbours; less noisy
    EightNeighbour,
}

/// Gradient in metres per metre at `(x, z)`, as (d/dx east, d/dz south).
/// Border samples use the one-sided difference that fits inside the grid.
pub fn surface_gradient(field: &HeightField, x: usize, z: usize, kernel: GradientKernel) -> (f32, f32) {
    let scale = field.scale();
    let cell_x = scale.cell_size_x(field.width());
    let cell_z = scale.cell_size_z(field.depth());

    let (gx, gz) = match kernel {
        GradientKernel::FourNeighbour => gradient_at_cell(field.tilemap(), x, z),
        GradientKernel::EightNeighbour => horn_gradient(field, x, z),
    };
    (scale.to_metres(gx) / cell_x, scale.to_metres(gz) / cell_z)
}

/// Horn gradient in height units per cell.
fn horn_gradient(field: &HeightField, x: usize, z: usize) -> (f32, f32) {
    let (w, d) = field.dimensions();
    let xl = x.saturating_sub(1);
    let xr = (x + 1).min(w - 1);
    let zu = z.saturating_sub(1);
    let zd = (z + 1).min(d - 1);

    let h = |xx: usize, zz: usize| field.get(xx, zz);

    let span_x = (xr - xl) as f32;
    let gx = if span_x > 0.0 {
        ((h(xr, zu) + 2.0 * h(xr, z) + h(xr, zd)) - (h(xl, zu) + 2.0 * h(xl, z) + h(xl, zd)))
            / (4.0 * span_x)
    } else {
        0.0
    };

    let span_z = (zd - zu) as f32;
    let gz = if span_z > 0.0 {
        ((h(xl, zd) + 2.0 * h(x, zd) + h(xr, zd)) - (h(xl, zu) + 2.0 * h(x, zu) + h(xr, zu)))
            / (4.0 * span_z)
    } else {
        0.0
    };

    (gx, gz)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlopeParams {
    pub kernel: GradientKernel,
    pub post: PostProcess,
}

/// Slope in degrees, stored as `degrees / 90` so vertical is 1.
pub fn slope_map(field: &HeightField, params: &SlopeParams) -> HeightField {
    let mut out = map_like(field, |x, z| {
        let (gx, gz) = surface_gradient(field, x, z, params.kernel);
        (gx * gx + gz * gz).sqrt().atan().to_degrees() / 90.0
    });
    params.post.apply(&mut out);
    out
}
