//! Maps derived from a height field: slope, aspect, curvature, flow
//! accumulation, and normals.
//!
//! Every extractor is a pure function of the input field. Grid X runs east
//! and grid Z runs south, so row 0 is the northern edge, matching how the
//! field looks when exported as an image.

pub mod aspect;
pub mod curvature;
pub mod flow;
pub mod normal;
pub mod slope;

pub use aspect::{aspect_map, AspectEncoding, AspectParams};
pub use curvature::{curvature_map, CurvatureKind, CurvatureParams};
pub use flow::{flow_map, FlowParams, FlowResult};
pub use normal::{normal_map, NormalMap, NormalParams, NormalSpace};
pub use slope::{slope_map, surface_gradient, GradientKernel, SlopeParams};

use serde::{Deserialize, Serialize};

use crate::heightfield::HeightField;

/// Post-processing shared by all extractors, applied in field order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcess {
    pub flip: bool,
    pub invert: bool,
    pub normalise: bool,
}

impl PostProcess {
    pub fn apply(&self, field: &mut HeightField) {
        if self.flip {
            field.flip();
        }
        if self.invert {
            field.invert();
        }
        if self.normalise {
            field.normalise();
        }
    }
}

/// Build an output map with the same size and scale as `source`.
pub(crate) fn map_like(source: &HeightField, f: impl FnMut(usize, usize) -> f32) -> HeightField {
    HeightField::from_fn(source.width(), source.depth(), f).with_scale(source.scale())
}
