//! Live terrain held in process memory.

use crate::error::{Result, TerrainError};
use crate::heightfield::HeightField;
use crate::scale::WorldScale;
use crate::world::{LiveTerrain, TileCoord};

#[derive(Clone, Debug)]
pub struct MemoryTerrain {
    coord: TileCoord,
    field: HeightField,
    writes: usize,
}

impl MemoryTerrain {
    pub fn new(coord: TileCoord, field: HeightField) -> Self {
        Self {
            coord,
            field,
            writes: 0,
        }
    }

    pub fn field(&self) -> &HeightField {
        &self.field
    }

    /// Number of successful `write_heights` calls.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl LiveTerrain for MemoryTerrain {
    fn coord(&self) -> TileCoord {
        self.coord
    }

    fn resolution(&self) -> (usize, usize) {
        self.field.dimensions()
    }

    fn world_scale(&self) -> WorldScale {
        self.field.scale()
    }

    fn read_heights(&self) -> Result<HeightField> {
        Ok(self.field.clone())
    }

    fn write_heights(&mut self, field: &HeightField) -> Result<()> {
        if field.dimensions() != self.field.dimensions() {
            return Err(TerrainError::SizeMismatch {
                expected: self.field.dimensions(),
                actual: field.dimensions(),
            });
        }
        self.field = field.clone().with_scale(self.field.scale());
        self.writes += 1;
        Ok(())
    }
}
