//! Grid-based hydraulic erosion.
//!
//! The simulation keeps three layers next to the terrain: standing water,
//! suspended sediment, and the cumulative dissolved material returned to the
//! caller. One iteration:
//!
//! 1. Rain: on every `rain_frequency`-th iteration each sample receives
//!    `rain_amount * weight` water from the rain map.
//! 2. Dissolve: `dissolve_rate * water * (1 - hardness)` leaves the terrain
//!    and goes into suspension.
//! 3. Flow: water moves toward lower neighbours (by water surface), carrying
//!    a proportional share of sediment. Cells with no lower neighbour keep
//!    their water and drop their sediment in place.
//! 4. Evaporate: water shrinks by `evaporation`; sediment over the remaining
//!    capacity deposits.
//!
//! Whatever is still suspended when the run ends, or is cancelled, settles
//! where it is, so terrain material is conserved up to the final clamp.

use crate::erosion::params::HydraulicParams;
use crate::erosion::utils::{rain_weights, resolve_grid};
use crate::erosion::{ErosionOutcome, ErosionStats, SedimentField};
use crate::heightfield::HeightField;
use crate::progress::{run_iterations, ProgressMonitor};
use crate::tilemap::Tilemap;

struct Layers {
    terrain: Vec<f32>,
    water: Vec<f32>,
    suspended: Vec<f32>,
    dissolved: Vec<f32>,
    // Scratch buffers for the flow step.
    next_water: Vec<f32>,
    next_suspended: Vec<f32>,
}

impl Layers {
    fn new(terrain: Vec<f32>) -> Self {
        let n = terrain.len();
        Self {
            terrain,
            water: vec![0.0; n],
            suspended: vec![0.0; n],
            dissolved: vec![0.0; n],
            next_water: vec![0.0; n],
            next_suspended: vec![0.0; n],
        }
    }

    fn deposit(&mut self, idx: usize, amount: f32, stats: &mut ErosionStats) {
        if amount > 0.0 {
            self.terrain[idx] += amount;
            stats.record_deposit(amount);
        }
    }

    fn settle_all(&mut self, stats: &mut ErosionStats) {
        for idx in 0..self.terrain.len() {
            let amount = std::mem::take(&mut self.suspended[idx]);
            self.deposit(idx, amount, stats);
        }
    }
}

/// Run hydraulic erosion in place and return the dissolved-material field.
///
/// `hardness` is resampled if its size differs; absent hardness means every
/// sample dissolves at the full rate.
pub fn hydraulic_erosion(
    field: &mut HeightField,
    params: &HydraulicParams,
    hardness: Option<&HeightField>,
    monitor: &mut dyn ProgressMonitor,
) -> (ErosionOutcome, SedimentField) {
    let (width, depth) = field.dimensions();
    let resist = resolve_grid(hardness, width, depth, 0.0);
    let rain = rain_weights(field, &params.rain_map);
    let rain_frequency = params.rain_frequency.max(1);
    let evaporation = params.evaporation.clamp(0.0, 1.0);
    let topology: Tilemap<()> = Tilemap::new(width, depth);

    tracing::info!(
        "hydraulic erosion: {}x{}, {} iterations, rain every {}",
        width,
        depth,
        params.iterations,
        rain_frequency
    );

    let mut layers = Layers::new(field.as_slice().to_vec());
    let mut stats = ErosionStats::default();

    let completed = run_iterations(params.iterations, monitor, |iter| {
        if iter % rain_frequency == 0 {
            for (w, r) in layers.water.iter_mut().zip(&rain) {
                *w += params.rain_amount * r;
            }
            tracing::debug!("hydraulic iteration {}: rainfall", iter);
        }

        // Dissolve
        for idx in 0..layers.terrain.len() {
            let erodibility = (1.0 - resist[idx]).clamp(0.0, 1.0);
            let amount = (params.dissolve_rate * layers.water[idx] * erodibility)
                .min(layers.terrain[idx])
                .max(0.0);
            if amount > 0.0 {
                layers.terrain[idx] -= amount;
                layers.suspended[idx] += amount;
                layers.dissolved[idx] += amount;
                stats.record_erosion(amount);
            }
        }

        // Flow
        layers.next_water.fill(0.0);
        layers.next_suspended.fill(0.0);
        for z in 0..depth {
            for x in 0..width {
                let idx = z * width + x;
                let water = layers.water[idx];
                let sediment = layers.suspended[idx];
                if water <= 0.0 {
                    layers.next_suspended[idx] += sediment;
                    continue;
                }

                let surface = layers.terrain[idx] + water;
                let mut drops = [0.0f32; 8];
                let mut targets = [0usize; 8];
                let mut total_drop = 0.0f32;
                for dir in 0..8 {
                    if let Some((nx, nz)) = topology.neighbor(x, z, dir) {
                        let n_idx = nz * width + nx;
                        let drop = surface - (layers.terrain[n_idx] + layers.water[n_idx]);
                        if drop > 0.0 {
                            drops[dir] = drop;
                            targets[dir] = n_idx;
                            total_drop += drop;
                        }
                    }
                }

                if total_drop <= 0.0 {
                    // Flat cell or local minimum: water pools, sediment settles.
                    layers.next_water[idx] += water;
                    layers.deposit(idx, sediment, &mut stats);
                    continue;
                }

                let outflow = water.min(total_drop * 0.5);
                let carried = sediment * outflow / water;
                layers.next_water[idx] += water - outflow;
                layers.next_suspended[idx] += sediment - carried;
                for dir in 0..8 {
                    if drops[dir] > 0.0 {
                        let share = drops[dir] / total_drop;
                        layers.next_water[targets[dir]] += outflow * share;
                        layers.next_suspended[targets[dir]] += carried * share;
                    }
                }
            }
        }
        std::mem::swap(&mut layers.water, &mut layers.next_water);
        std::mem::swap(&mut layers.suspended, &mut layers.next_suspended);

        // Evaporate and deposit over capacity
        for idx in 0..layers.terrain.len() {
            layers.water[idx] *= 1.0 - evaporation;
            let capacity = (params.capacity * layers.water[idx]).max(0.0);
            let excess = layers.suspended[idx] - capacity;
            if excess > 0.0 {
                layers.suspended[idx] = capacity;
                layers.deposit(idx, excess, &mut stats);
            }
        }
    });

    layers.settle_all(&mut stats);
    field.overwrite(&layers.terrain);

    stats.iterations = completed;
    let cancelled = completed < params.iterations;
    if cancelled {
        tracing::info!("hydraulic erosion cancelled after {} iterations", completed);
    }
    tracing::info!("hydraulic erosion done: {}", stats.summary());

    let sediment = SedimentField::from_vec(width, depth, layers.dissolved);
    (
        ErosionOutcome {
            stats,
            completed_iterations: completed,
            cancelled,
        },
        sediment,
    )
}
