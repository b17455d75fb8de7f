//! World-size scale for converting normalized heights and grid cells to metres.
//!
//! A height field stores samples in [0,1]. The scale says how many metres a
//! full-range sample spans vertically and how large the whole grid is on the
//! ground, which slope and normal computations need.

use serde::{Deserialize, Serialize};

/// Physical extent of a terrain tile.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldScale {
    /// Ground extent along X in metres.
    pub size_x: f32,
    /// Ground extent along Z in metres.
    pub size_z: f32,
    /// Vertical extent in metres of a sample going from 0 to 1.
    pub height: f32,
}

/// Reference tile: 1 km square with 600 m of relief.
const REFERENCE_SIZE: f32 = 1000.0;
const REFERENCE_HEIGHT: f32 = 600.0;

impl WorldScale {
    pub fn new(size_x: f32, size_z: f32, height: f32) -> Self {
        Self { size_x, size_z, height }
    }

    /// Ground distance between adjacent samples along X for a grid `width` wide.
    pub fn cell_size_x(&self, width: usize) -> f32 {
        self.size_x / (width.max(2) - 1) as f32
    }

    /// Ground distance between adjacent samples along Z for a grid `depth` deep.
    pub fn cell_size_z(&self, depth: usize) -> f32 {
        self.size_z / (depth.max(2) - 1) as f32
    }

    /// Convert a normalized height difference to metres.
    pub fn to_metres(&self, normalized: f32) -> f32 {
        normalized * self.height
    }

    /// Convert metres to a normalized height difference.
    pub fn to_normalized(&self, metres: f32) -> f32 {
        if self.height.abs() < f32::EPSILON {
            0.0
        } else {
            metres / self.height
        }
    }

    /// Normalized height difference that corresponds to `angle_deg` between
    /// a sample and the neighbour `(dx, dz)` cells away on a `width`×`depth`
    /// grid. Used for talus thresholds; non-square cells give each direction
    /// its own run.
    pub fn talus_height(&self, angle_deg: f32, (dx, dz): (i32, i32), width: usize, depth: usize) -> f32 {
        let run = (dx as f32 * self.cell_size_x(width)).hypot(dz as f32 * self.cell_size_z(depth));
        self.to_normalized(angle_deg.to_radians().tan() * run)
    }
}

impl Default for WorldScale {
    fn default() -> Self {
        Self::new(REFERENCE_SIZE, REFERENCE_SIZE, REFERENCE_HEIGHT)
    }
}
