//! Heightfield processing and terrain synthesis library
//!
//! Re-exports modules for use by binaries and tools.

pub mod config;
pub mod curve;
pub mod derived;
pub mod erosion;
pub mod error;
pub mod export;
pub mod heightfield;
pub mod mask;
pub mod progress;
pub mod scale;
pub mod synth;
pub mod tilemap;
pub mod world;

pub use error::{Result, TerrainError};
pub use heightfield::HeightField;
pub use scale::WorldScale;
