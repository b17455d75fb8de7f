//! Iterative D8 flow accumulation.
//!
//! Every cell starts with one unit of flow. Each iteration moves every
//! packet one step to the steepest-descent neighbour and counts it there.
//! Packets that reach a flat cell or pit stay put and stop counting. After
//! enough iterations to cover the longest drainage path, a cell's count is
//! the number of cells upstream of it, itself included.

use serde::{Deserialize, Serialize};

use crate::derived::{map_like, PostProcess};
use crate::erosion::utils::lowest_neighbor;
use crate::heightfield::HeightField;
use crate::progress::{run_iterations, ProgressMonitor};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowParams {
    /// Routing steps; bounds the longest path traced
    pub iterations: usize,
    /// Encode `ln(1 + count)` instead of the raw count, so small
    /// tributaries stay visible next to the main channel
    pub log_scale: bool,
    pub post: PostProcess,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            iterations: 64,
            log_scale: false,
            post: PostProcess::default(),
        }
    }
}

/// Flow map plus how much of the routing ran.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowResult {
    /// Accumulation divided by its maximum
    pub map: HeightField,
    pub completed_iterations: usize,
    pub cancelled: bool,
}

pub fn flow_map(
    field: &HeightField,
    params: &FlowParams,
    monitor: &mut dyn ProgressMonitor,
) -> FlowResult {
    let (width, depth) = field.dimensions();
    let map = field.tilemap();

    let downstream: Vec<Option<usize>> = map
        .iter()
        .map(|(x, z, _)| lowest_neighbor(map, x, z).map(|(nx, nz)| nz * width + nx))
        .collect();

    let mut packets = vec![1.0f32; width * depth];
    let mut next = vec![0.0f32; width * depth];
    let mut accumulation = vec![1.0f32; width * depth];

    let completed = run_iterations(params.iterations, monitor, |_| {
        next.fill(0.0);
        for (idx, &amount) in packets.iter().enumerate() {
            if amount <= 0.0 {
                continue;
            }
            match downstream[idx] {
                Some(target) => {
                    next[target] += amount;
                    accumulation[target] += amount;
                }
                None => next[idx] += amount,
            }
        }
        std::mem::swap(&mut packets, &mut next);
    });

    let encode = |v: f32| if params.log_scale { v.ln_1p() } else { v };
    let max = accumulation.iter().copied().map(encode).fold(0.0f32, f32::max);
    let mut out = map_like(field, |x, z| {
        if max > 0.0 {
            encode(accumulation[z * width + x]) / max
        } else {
            0.0
        }
    });
    params.post.apply(&mut out);

    let cancelled = completed < params.iterations;
    tracing::debug!(
        "flow map {}x{}: {} of {} iterations",
        width,
        depth,
        completed,
        params.iterations
    );

    FlowResult {
        map: out,
        completed_iterations: completed,
        cancelled,
    }
}
