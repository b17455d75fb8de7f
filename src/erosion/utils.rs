//! Utility functions for erosion calculations
//!
//! Gradient estimation, steepest-descent lookup, and resolution of the
//! auxiliary hardness and rain grids to the target resolution.

use crate::erosion::params::RainMap;
use crate::heightfield::HeightField;
use crate::tilemap::{Tilemap, DIR_DISTANCE};

/// Calculate gradient at an integer cell position using central differences.
/// Borders fall back to one-sided differences. Returns (grad_x, grad_z) in
/// height units per cell, pointing uphill.
pub fn gradient_at_cell(map: &Tilemap<f32>, x: usize, z: usize) -> (f32, f32) {
    let width = map.width;
    let depth = map.height;

    let grad_x = if width < 2 {
        0.0
    } else if x == 0 {
        *map.get(1, z) - *map.get(0, z)
    } else if x == width - 1 {
        *map.get(x, z) - *map.get(x - 1, z)
    } else {
        (*map.get(x + 1, z) - *map.get(x - 1, z)) / 2.0
    };

    let grad_z = if depth < 2 {
        0.0
    } else if z == 0 {
        *map.get(x, 1) - *map.get(x, 0)
    } else if z == depth - 1 {
        *map.get(x, z) - *map.get(x, z - 1)
    } else {
        (*map.get(x, z + 1) - *map.get(x, z - 1)) / 2.0
    };

    (grad_x, grad_z)
}

/// Steepest-descent neighbour among the 8 surrounding cells.
/// Returns `None` for flat cells and local minima.
pub fn lowest_neighbor(map: &Tilemap<f32>, x: usize, z: usize) -> Option<(usize, usize)> {
    let h = *map.get(x, z);
    let mut best = None;
    let mut best_slope = 0.0f32;

    for dir in 0..8 {
        if let Some((nx, nz)) = map.neighbor(x, z, dir) {
            let slope = (h - *map.get(nx, nz)) / DIR_DISTANCE[dir];
            if slope > best_slope {
                best_slope = slope;
                best = Some((nx, nz));
            }
        }
    }

    best
}

/// Per-sample values of an optional auxiliary grid at `width × depth`.
/// Missing grids yield `default`; grids of another size are resampled.
pub fn resolve_grid(
    source: Option<&HeightField>,
    width: usize,
    depth: usize,
    default: f32,
) -> Vec<f32> {
    match source {
        None => vec![default; width * depth],
        Some(grid) if grid.dimensions() == (width, depth) => grid.as_slice().to_vec(),
        Some(grid) => {
            tracing::debug!(
                "resampling auxiliary grid {}x{} to {}x{}",
                grid.width(),
                grid.depth(),
                width,
                depth
            );
            grid.resample(width, depth).as_slice().to_vec()
        }
    }
}

/// Rain weight for every sample of `field`.
pub fn rain_weights(field: &HeightField, rain: &RainMap) -> Vec<f32> {
    let (width, depth) = field.dimensions();
    match rain {
        RainMap::Constant => vec![1.0; width * depth],
        RainMap::PeakWeighted => field.as_slice().to_vec(),
        RainMap::ValleyWeighted => field.as_slice().iter().map(|h| 1.0 - h).collect(),
        RainMap::SlopeWeighted => {
            let map = field.tilemap();
            let magnitudes: Vec<f32> = map
                .iter()
                .map(|(x, z, _)| {
                    let (gx, gz) = gradient_at_cell(map, x, z);
                    (gx * gx + gz * gz).sqrt()
                })
                .collect();
            let max = magnitudes.iter().copied().fold(0.0f32, f32::max);
            if max <= f32::EPSILON {
                vec![1.0; width * depth]
            } else {
                magnitudes.into_iter().map(|m| m / max).collect()
            }
        }
        RainMap::Custom(weights) => resolve_grid(Some(weights), width, depth, 1.0),
    }
}
