//! Live terrain stored as 16-bit grayscale PNG tiles on disk.
//!
//! Tiles live in one directory as `tile_<x>_<z>.png`. Negative coordinates
//! are written with a leading minus sign.

use std::path::{Path, PathBuf};

use crate::error::{Result, TerrainError};
use crate::export::{export_grayscale16, import_heightfield};
use crate::heightfield::HeightField;
use crate::scale::WorldScale;
use crate::world::{LiveTerrain, TileCoord};

#[derive(Clone, Debug)]
pub struct ImageTerrain {
    path: PathBuf,
    coord: TileCoord,
    scale: WorldScale,
    resolution: (usize, usize),
}

pub fn tile_file_name(coord: TileCoord) -> String {
    format!("tile_{}_{}.png", coord.x, coord.z)
}

fn parse_tile_name(name: &str) -> Option<TileCoord> {
    let stem = name.strip_prefix("tile_")?.strip_suffix(".png")?;
    let (x, z) = stem.split_once('_')?;
    Some(TileCoord::new(x.parse().ok()?, z.parse().ok()?))
}

impl ImageTerrain {
    /// Open an existing tile image.
    pub fn open(path: impl Into<PathBuf>, coord: TileCoord, scale: WorldScale) -> Result<Self> {
        let path = path.into();
        let (w, h) = image::image_dimensions(&path)?;
        Ok(Self {
            path,
            coord,
            scale,
            resolution: (w as usize, h as usize),
        })
    }

    /// Write `field` as a new tile in `dir` and open it.
    pub fn create(dir: &Path, coord: TileCoord, field: &HeightField) -> Result<Self> {
        let path = dir.join(tile_file_name(coord));
        export_grayscale16(field, &path)?;
        Ok(Self {
            path,
            coord,
            scale: field.scale(),
            resolution: field.dimensions(),
        })
    }

    /// Every readable `tile_<x>_<z>.png` in `dir`, ordered by Z then X.
    pub fn discover(dir: &Path, scale: WorldScale) -> Result<Vec<ImageTerrain>> {
        let mut tiles = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(coord) = name.to_str().and_then(parse_tile_name) else {
                continue;
            };
            match ImageTerrain::open(entry.path(), coord, scale) {
                Ok(tile) => tiles.push(tile),
                Err(e) => tracing::warn!("skipping unreadable tile {}: {}", entry.path().display(), e),
            }
        }
        tiles.sort_by_key(|t| (t.coord.z, t.coord.x));
        tracing::info!("found {} tile(s) in {}", tiles.len(), dir.display());
        Ok(tiles)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LiveTerrain for ImageTerrain {
    fn coord(&self) -> TileCoord {
        self.coord
    }

    fn resolution(&self) -> (usize, usize) {
        self.resolution
    }

    fn world_scale(&self) -> WorldScale {
        self.scale
    }

    fn read_heights(&self) -> Result<HeightField> {
        let field = import_heightfield(&self.path)?;
        if field.dimensions() != self.resolution {
            return Err(TerrainError::SizeMismatch {
                expected: self.resolution,
                actual: field.dimensions(),
            });
        }
        Ok(field.with_scale(self.scale))
    }

    fn write_heights(&mut self, field: &HeightField) -> Result<()> {
        if field.dimensions() != self.resolution {
            return Err(TerrainError::SizeMismatch {
                expected: self.resolution,
                actual: field.dimensions(),
            });
        }
        export_grayscale16(field, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tile_name() {
        assert_eq!(parse_tile_name("tile_3_-2.png"), Some(TileCoord::new(3, -2)));
        assert_eq!(parse_tile_name("tile_-1_0.png"), Some(TileCoord::new(-1, 0)));
        assert_eq!(parse_tile_name("tile_1.png"), None);
        assert_eq!(parse_tile_name("mask_1_2.png"), None);
        assert_eq!(tile_file_name(TileCoord::new(-4, 7)), "tile_-4_7.png");
    }

    #[test]
    fn test_discover_orders_tiles() {
        let dir = tempfile::tempdir().unwrap();
        for (x, z) in [(1, 1), (0, 1), (1, 0), (0, 0)] {
            ImageTerrain::create(dir.path(), TileCoord::new(x, z), &HeightField::new(4, 4)).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let tiles = ImageTerrain::discover(dir.path(), WorldScale::default()).unwrap();
        let coords: Vec<_> = tiles.iter().map(|t| (t.coord.x, t.coord.z)).collect();
        assert_eq!(coords, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
        assert_eq!(tiles[0].resolution(), (4, 4));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut terrain =
            ImageTerrain::create(dir.path(), TileCoord::new(0, 0), &HeightField::new(8, 8)).unwrap();
        let field = HeightField::from_fn(8, 8, |x, z| (x * 8 + z) as f32 / 63.0);
        terrain.write_heights(&field).unwrap();

        let back = terrain.read_heights().unwrap();
        for (a, b) in field.as_slice().iter().zip(back.as_slice()) {
            assert!((a - b).abs() < 1e-4);
        }
        assert!(terrain.write_heights(&HeightField::new(4, 8)).is_err());
    }
}
