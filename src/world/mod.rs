//! Multi-tile terrain worlds.
//!
//! A world is an X×Z grid of tiles backed by [`LiveTerrain`] implementations.
//! [`TileWorldManager`] pulls their heights into memory, runs filters over
//! all tiles, writes them back, and keeps undo/redo history.
//!
//! Neighbouring tiles share their edge samples: the last column of tile
//! `(x, z)` is the same ground as the first column of tile `(x + 1, z)`, and
//! likewise for rows along Z.

pub mod history;
pub mod image_tiles;
pub mod manager;
pub mod memory;

pub use history::{History, WorldSnapshot};
pub use image_tiles::ImageTerrain;
pub use manager::TileWorldManager;
pub use memory::MemoryTerrain;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::heightfield::HeightField;
use crate::scale::WorldScale;

/// Tile position in the world grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub z: i32,
}

impl TileCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// A terrain tile that owns the authoritative heights, such as an engine
/// terrain object or a file on disk.
pub trait LiveTerrain {
    fn coord(&self) -> TileCoord;

    /// Samples along X and Z.
    fn resolution(&self) -> (usize, usize);

    fn world_scale(&self) -> WorldScale;

    fn read_heights(&self) -> Result<HeightField>;

    /// Replace the live heights. Implementations reject fields whose
    /// resolution differs from [`LiveTerrain::resolution`].
    fn write_heights(&mut self, field: &HeightField) -> Result<()>;
}

/// In-memory copy of one tile.
#[derive(Clone, Debug)]
pub struct Tile {
    pub coord: TileCoord,
    pub field: HeightField,
    /// Index of the backing terrain in the manager.
    pub(crate) source: usize,
}
