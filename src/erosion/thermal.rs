//! Thermal (talus) erosion.
//!
//! Each pass compares every sample with its 8 neighbours. Where the drop to
//! a neighbour is steeper than `talus_min`, part of the excess slides to it.
//! The rate ramps linearly from zero at `talus_min` to full at `talus_max`
//! and is scaled by `1 - hardness`. Moves are gathered into a delta buffer
//! and applied after the pass, so every pass conserves material exactly;
//! clamping to [0,1] happens once, after the last pass.

use crate::erosion::params::ThermalParams;
use crate::erosion::utils::resolve_grid;
use crate::erosion::{ErosionOutcome, ErosionStats};
use crate::heightfield::HeightField;
use crate::progress::{run_iterations, ProgressMonitor};
use crate::tilemap::DIR_OFFSETS;

/// Height thresholds per neighbour direction, in normalized units.
struct Talus {
    min: [f32; 8],
    max: [f32; 8],
}

impl Talus {
    fn new(field: &HeightField, params: &ThermalParams) -> Self {
        let scale = field.scale();
        let (width, depth) = field.dimensions();
        let upper = params.talus_max.max(params.talus_min);
        let mut min = [0.0; 8];
        let mut max = [0.0; 8];
        for (dir, &offset) in DIR_OFFSETS.iter().enumerate() {
            min[dir] = scale.talus_height(params.talus_min, offset, width, depth);
            max[dir] = scale.talus_height(upper, offset, width, depth);
        }
        Self { min, max }
    }

    /// Excess drop above the angle of repose, weighted by the ramp.
    /// Zero when the slope is stable.
    fn excess(&self, dir: usize, drop: f32) -> f32 {
        let lo = self.min[dir];
        if drop <= lo {
            return 0.0;
        }
        let span = self.max[dir] - lo;
        let ramp = if span > f32::EPSILON {
            ((drop - lo) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };
        (drop - lo) * ramp
    }
}

/// Run thermal erosion in place.
///
/// `hardness` is resampled if its size differs; absent hardness means every
/// sample erodes at the full rate.
pub fn thermal_erosion(
    field: &mut HeightField,
    params: &ThermalParams,
    hardness: Option<&HeightField>,
    monitor: &mut dyn ProgressMonitor,
) -> ErosionOutcome {
    let (width, depth) = field.dimensions();
    let talus = Talus::new(field, params);
    let resist = resolve_grid(hardness, width, depth, 0.0);
    let strength = params.strength.clamp(0.0, 1.0);

    tracing::info!(
        "thermal erosion: {}x{}, {} iterations, talus {:.1}-{:.1} deg",
        width,
        depth,
        params.iterations,
        params.talus_min,
        params.talus_max
    );

    let mut heights = field.as_slice().to_vec();
    let mut delta = vec![0.0f32; heights.len()];
    let mut stats = ErosionStats::default();
    let map = field.tilemap().clone();

    let completed = run_iterations(params.iterations, monitor, |iter| {
        delta.fill(0.0);
        let mut moved_this_pass = 0.0f64;

        for z in 0..depth {
            for x in 0..width {
                let idx = z * width + x;
                let erodibility = (1.0 - resist[idx]).clamp(0.0, 1.0);
                if erodibility <= 0.0 {
                    continue;
                }
                let h = heights[idx];

                let mut excess = [0.0f32; 8];
                let mut targets = [0usize; 8];
                let mut total = 0.0f32;
                let mut largest = 0.0f32;
                for dir in 0..8 {
                    if let Some((nx, nz)) = map.neighbor(x, z, dir) {
                        let n_idx = nz * width + nx;
                        let e = talus.excess(dir, h - heights[n_idx]);
                        excess[dir] = e;
                        targets[dir] = n_idx;
                        total += e;
                        largest = largest.max(e);
                    }
                }
                if total <= 0.0 {
                    continue;
                }

                // Half the largest excess levels the steepest pair.
                let moved = strength * erodibility * largest * 0.5;
                if moved <= 0.0 {
                    continue;
                }
                delta[idx] -= moved;
                for dir in 0..8 {
                    if excess[dir] > 0.0 {
                        delta[targets[dir]] += moved * excess[dir] / total;
                    }
                }
                stats.record_erosion(moved);
                moved_this_pass += moved as f64;
            }
        }

        for (h, d) in heights.iter_mut().zip(&delta) {
            *h += d;
        }
        stats.total_deposited += moved_this_pass;
        tracing::debug!("thermal pass {}: moved {:.6}", iter, moved_this_pass);
    });

    field.overwrite(&heights);
    stats.iterations = completed;
    let cancelled = completed < params.iterations;
    if cancelled {
        tracing::info!("thermal erosion cancelled after {} iterations", completed);
    }
    tracing::info!("thermal erosion done: {}", stats.summary());

    ErosionOutcome {
        stats,
        completed_iterations: completed,
        cancelled,
    }
}
