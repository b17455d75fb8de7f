//! Erosion simulation module
//!
//! Implements two complementary erosion operators over a [`HeightField`]:
//! - **Thermal erosion**: material slides down slopes steeper than the talus angle
//! - **Hydraulic erosion**: rain dissolves material, carries it downhill, and deposits it
//!
//! Both operators are mask-agnostic. The `erode_*` entry points add optional
//! mask gating through [`HeightField::apply_masked`].

pub mod hydraulic;
pub mod params;
pub mod thermal;
pub mod utils;

pub use hydraulic::hydraulic_erosion;
pub use params::{ErosionPreset, HydraulicParams, RainMap, RainMapKind, ThermalParams};
pub use thermal::thermal_erosion;

use crate::heightfield::HeightField;
use crate::progress::ProgressMonitor;
use crate::tilemap::Tilemap;

/// Statistics from an erosion run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErosionStats {
    /// Total material removed from the terrain (in normalized height units)
    pub total_eroded: f64,
    /// Total material put back onto the terrain
    pub total_deposited: f64,
    /// Number of iterations processed
    pub iterations: usize,
    /// Maximum erosion at any single point in one step
    pub max_erosion: f32,
    /// Maximum deposition at any single point in one step
    pub max_deposition: f32,
}

impl ErosionStats {
    pub(crate) fn record_erosion(&mut self, amount: f32) {
        self.total_eroded += amount as f64;
        self.max_erosion = self.max_erosion.max(amount);
    }

    pub(crate) fn record_deposit(&mut self, amount: f32) {
        self.total_deposited += amount as f64;
        self.max_deposition = self.max_deposition.max(amount);
    }

    pub fn summary(&self) -> String {
        format!(
            "{} iterations | eroded {:.4} | deposited {:.4} | peak erosion {:.5} | peak deposit {:.5}",
            self.iterations,
            self.total_eroded,
            self.total_deposited,
            self.max_erosion,
            self.max_deposition
        )
    }
}

/// What an erosion call did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ErosionOutcome {
    pub stats: ErosionStats,
    /// Iterations fully applied to the field.
    pub completed_iterations: usize,
    /// The monitor asked to stop before all iterations ran.
    pub cancelled: bool,
}

/// Material dissolved by hydraulic erosion, per sample.
/// Non-negative; not bounded by 1.
#[derive(Clone, Debug, PartialEq)]
pub struct SedimentField {
    map: Tilemap<f32>,
}

impl SedimentField {
    pub fn new(width: usize, depth: usize) -> Self {
        Self {
            map: Tilemap::new_with(width, depth, 0.0),
        }
    }

    pub(crate) fn from_vec(width: usize, depth: usize, data: Vec<f32>) -> Self {
        let map = Tilemap::from_vec(width, depth, data)
            .unwrap_or_else(|| Tilemap::new_with(width, depth, 0.0));
        Self { map }
    }

    pub fn width(&self) -> usize {
        self.map.width
    }

    pub fn depth(&self) -> usize {
        self.map.height
    }

    pub fn get(&self, x: usize, z: usize) -> f32 {
        *self.map.get(x, z)
    }

    pub fn tilemap(&self) -> &Tilemap<f32> {
        &self.map
    }

    /// Sum over all samples.
    pub fn total(&self) -> f64 {
        self.map.sum()
    }

    /// Scale into [0,1] by the maximum for export. An empty field stays zero.
    pub fn normalized(&self) -> HeightField {
        let (_, max) = self.map.min_max();
        let scale = if max > f32::EPSILON { 1.0 / max } else { 0.0 };
        HeightField::from_fn(self.width(), self.depth(), |x, z| self.get(x, z) * scale)
    }

    fn scale_by(&mut self, weights: &HeightField) {
        let resolved = utils::resolve_grid(Some(weights), self.width(), self.depth(), 1.0);
        for (v, w) in self.map.as_mut_slice().iter_mut().zip(resolved) {
            *v *= w;
        }
    }
}

/// Thermal erosion, optionally gated by a mask.
///
/// `hardness` holds per-sample resistance in [0,1]: 1 never erodes, 0
/// erodes at full rate. Without a hardness map every sample is treated as
/// hardness 0, so the whole field erodes at full rate.
pub fn erode_thermal(
    field: &mut HeightField,
    params: &ThermalParams,
    hardness: Option<&HeightField>,
    mask: Option<&HeightField>,
    monitor: &mut dyn ProgressMonitor,
) -> ErosionOutcome {
    field.apply_masked(mask, |f| thermal_erosion(f, params, hardness, monitor))
}

/// Hydraulic erosion, optionally gated by a mask. The returned sediment is
/// weighted by the mask so it matches what was actually applied.
///
/// `hardness` scales dissolution by `1 - hardness`; when it is absent the
/// whole field dissolves at full rate, as for [`erode_thermal`].
pub fn erode_hydraulic(
    field: &mut HeightField,
    params: &HydraulicParams,
    hardness: Option<&HeightField>,
    mask: Option<&HeightField>,
    monitor: &mut dyn ProgressMonitor,
) -> (ErosionOutcome, SedimentField) {
    let (outcome, mut sediment) =
        field.apply_masked(mask, |f| hydraulic_erosion(f, params, hardness, monitor));
    if let Some(mask) = mask {
        sediment.scale_by(mask);
    }
    (outcome, sediment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_mask_leaves_field_untouched() {
        let original = HeightField::from_fn(12, 12, |x, z| ((x * 7 + z * 3) % 11) as f32 / 10.0);
        let mask = HeightField::new(12, 12);

        let mut field = original.duplicate();
        erode_thermal(&mut field, &ThermalParams::default(), None, Some(&mask), &mut ());
        assert_eq!(field, original);

        let (_, sediment) =
            erode_hydraulic(&mut field, &HydraulicParams::default(), None, Some(&mask), &mut ());
        assert_eq!(field, original);
        assert_eq!(sediment.total(), 0.0);
    }

    #[test]
    fn test_sediment_normalized_handles_empty() {
        let sediment = SedimentField::new(3, 3);
        assert!(sediment.normalized().as_slice().iter().all(|&v| v == 0.0));

        let sediment = SedimentField::from_vec(2, 1, vec![0.5, 2.0]);
        let n = sediment.normalized();
        assert_eq!(n.as_slice(), &[0.25, 1.0]);
    }
}
