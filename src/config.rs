//! JSON configuration for the command-line tools.
//!
//! Every section is optional in the file; anything missing takes its
//! default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::erosion::{ErosionPreset, HydraulicParams, ThermalParams};
use crate::error::Result;
use crate::mask::MergeOperator;
use crate::scale::WorldScale;
use crate::synth::NoiseParams;
use crate::world::history::DEFAULT_MAX_SNAPSHOTS;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub scale: WorldScale,
    pub thermal: ThermalParams,
    pub hydraulic: HydraulicParams,
    pub noise: NoiseParams,
    /// How two mask layers combine
    pub merge: MergeOperator,
    /// Undo snapshots kept per world session
    pub max_snapshots: usize,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            scale: WorldScale::default(),
            thermal: ThermalParams::default(),
            hydraulic: HydraulicParams::default(),
            noise: NoiseParams::default(),
            merge: MergeOperator::default(),
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
        }
    }
}

impl ForgeConfig {
    /// Defaults with both erosion sections taken from a preset.
    pub fn from_preset(preset: ErosionPreset) -> Self {
        Self {
            thermal: ThermalParams::from_preset(preset),
            hydraulic: HydraulicParams::from_preset(preset),
            ..Default::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
