//! Erosion simulation parameters and presets

use serde::{Deserialize, Serialize};

use crate::heightfield::HeightField;

/// Erosion intensity preset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErosionPreset {
    /// Few passes, low rates - softens noise without reshaping it
    Gentle,
    /// Balanced erosion
    #[default]
    Normal,
    /// Many passes, aggressive rates - deep gullies and talus aprons
    Dramatic,
}

impl ErosionPreset {
    pub fn all() -> &'static [Self] {
        &[Self::Gentle, Self::Normal, Self::Dramatic]
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Gentle => "Subtle smoothing",
            Self::Normal => "Balanced erosion",
            Self::Dramatic => "Deep gullies and scree slopes",
        }
    }
}

impl std::fmt::Display for ErosionPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gentle => write!(f, "gentle"),
            Self::Normal => write!(f, "normal"),
            Self::Dramatic => write!(f, "dramatic"),
        }
    }
}

impl std::str::FromStr for ErosionPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gentle" => Ok(Self::Gentle),
            "normal" => Ok(Self::Normal),
            "dramatic" => Ok(Self::Dramatic),
            other => Err(format!(
                "unknown erosion preset '{}' (expected gentle, normal or dramatic)",
                other
            )),
        }
    }
}

/// Thermal (talus) erosion parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalParams {
    /// Number of full-grid passes
    pub iterations: usize,

    /// Angle of repose in degrees. Slopes at or below this never move.
    pub talus_min: f32,

    /// Angle in degrees at which material moves at the full rate.
    /// Between `talus_min` and `talus_max` the rate ramps up linearly.
    pub talus_max: f32,

    /// Fraction (0.0-1.0) of the excess height difference moved per pass
    pub strength: f32,
}

impl Default for ThermalParams {
    fn default() -> Self {
        Self {
            iterations: 50,
            talus_min: 30.0,
            talus_max: 45.0,
            strength: 0.5,
        }
    }
}

impl ThermalParams {
    pub fn from_preset(preset: ErosionPreset) -> Self {
        match preset {
            ErosionPreset::Gentle => Self {
                iterations: 15,
                talus_min: 35.0,
                strength: 0.25,
                ..Default::default()
            },
            ErosionPreset::Normal => Self::default(),
            ErosionPreset::Dramatic => Self {
                iterations: 150,
                talus_min: 25.0,
                talus_max: 40.0,
                strength: 0.8,
            },
        }
    }
}

/// Per-sample water injection weight for hydraulic erosion
///
/// Stored in config files as its [`RainMapKind`]. Custom weights are runtime
/// data with no file form and are saved as `Constant`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "RainMapKind", from = "RainMapKind")]
pub enum RainMap {
    /// Same amount everywhere
    #[default]
    Constant,
    /// More rain on high ground (weight = height)
    PeakWeighted,
    /// More rain in low ground (weight = 1 - height)
    ValleyWeighted,
    /// More rain on steep ground (weight = normalized slope)
    SlopeWeighted,
    /// Caller-supplied weights, resampled to the target resolution
    Custom(HeightField),
}

/// The rain map kinds that can be written to a config file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RainMapKind {
    Constant,
    PeakWeighted,
    ValleyWeighted,
    SlopeWeighted,
}

impl From<RainMap> for RainMapKind {
    fn from(rain: RainMap) -> Self {
        match rain {
            RainMap::Constant => Self::Constant,
            RainMap::PeakWeighted => Self::PeakWeighted,
            RainMap::ValleyWeighted => Self::ValleyWeighted,
            RainMap::SlopeWeighted => Self::SlopeWeighted,
            RainMap::Custom(weights) => {
                tracing::warn!(
                    "custom {}x{} rain map cannot be stored, saving as Constant",
                    weights.width(),
                    weights.depth()
                );
                Self::Constant
            }
        }
    }
}

impl From<RainMapKind> for RainMap {
    fn from(kind: RainMapKind) -> Self {
        match kind {
            RainMapKind::Constant => Self::Constant,
            RainMapKind::PeakWeighted => Self::PeakWeighted,
            RainMapKind::ValleyWeighted => Self::ValleyWeighted,
            RainMapKind::SlopeWeighted => Self::SlopeWeighted,
        }
    }
}

/// Grid-based hydraulic erosion parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydraulicParams {
    /// Number of simulation steps
    pub iterations: usize,

    /// Rain falls on iteration 0 and then every `rain_frequency` iterations.
    /// Larger values mean fewer evaporation cycles.
    pub rain_frequency: usize,

    /// Where the rain falls
    pub rain_map: RainMap,

    /// Water added per rainfall at weight 1 (height units)
    pub rain_amount: f32,

    /// Material dissolved per unit of water per step, before hardness
    pub dissolve_rate: f32,

    /// Fraction of standing water lost per step (0.0-1.0)
    pub evaporation: f32,

    /// Sediment a unit of water can hold in suspension
    pub capacity: f32,
}

impl Default for HydraulicParams {
    fn default() -> Self {
        Self {
            iterations: 100,
            rain_frequency: 10,
            rain_map: RainMap::Constant,
            rain_amount: 0.01,
            dissolve_rate: 0.1,
            evaporation: 0.05,
            capacity: 1.0,
        }
    }
}

impl HydraulicParams {
    pub fn from_preset(preset: ErosionPreset) -> Self {
        match preset {
            ErosionPreset::Gentle => Self {
                iterations: 40,
                rain_frequency: 20,
                dissolve_rate: 0.05,
                ..Default::default()
            },
            ErosionPreset::Normal => Self::default(),
            ErosionPreset::Dramatic => Self {
                iterations: 300,
                rain_frequency: 5,
                rain_amount: 0.02,
                dissolve_rate: 0.2,
                capacity: 0.6,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_round_trip_through_str() {
        for preset in ErosionPreset::all() {
            let parsed: ErosionPreset = preset.to_string().parse().unwrap();
            assert_eq!(parsed, *preset);
        }
        assert!("volcanic".parse::<ErosionPreset>().is_err());
    }

    #[test]
    fn test_presets_order_by_intensity() {
        let gentle = HydraulicParams::from_preset(ErosionPreset::Gentle);
        let dramatic = HydraulicParams::from_preset(ErosionPreset::Dramatic);
        assert!(gentle.iterations < dramatic.iterations);
        assert!(gentle.dissolve_rate < dramatic.dissolve_rate);

        let gentle = ThermalParams::from_preset(ErosionPreset::Gentle);
        let dramatic = ThermalParams::from_preset(ErosionPreset::Dramatic);
        assert!(gentle.talus_min > dramatic.talus_min);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let params: HydraulicParams =
            serde_json::from_str(r#"{"iterations": 7, "rain_map": "PeakWeighted"}"#).unwrap();
        assert_eq!(params.iterations, 7);
        assert_eq!(params.rain_map, RainMap::PeakWeighted);
        assert_eq!(params.rain_frequency, HydraulicParams::default().rain_frequency);
    }

    #[test]
    fn test_custom_rain_map_saves_as_constant() {
        let params = HydraulicParams {
            rain_map: RainMap::Custom(HeightField::new_with(4, 4, 0.5)),
            ..Default::default()
        };
        let json = serde_json::to_string(&params).unwrap();
        let back: HydraulicParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rain_map, RainMap::Constant);
        assert_eq!(back.iterations, params.iterations);
    }
}
