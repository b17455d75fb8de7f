//! Tile grid bookkeeping, world-wide filters and undo/redo.

use std::path::Path;

use crate::error::{Result, TerrainError};
use crate::export::export_heightfield;
use crate::heightfield::HeightField;
use crate::scale::WorldScale;
use crate::synth::{NoiseParams, NoiseSynthesizer};
use crate::world::history::{History, WorldSnapshot};
use crate::world::{LiveTerrain, Tile, TileCoord};

/// An X×Z grid of live terrain tiles and their in-memory copies.
///
/// Every filter follows the same cycle: run over all in-memory tiles, write
/// every tile back, then record a snapshot. Nothing reaches live terrain until
/// the in-memory pass has finished for all tiles, and a failed write is
/// rolled back before the error is returned.
pub struct TileWorldManager {
    terrains: Vec<Box<dyn LiveTerrain>>,
    tiles: Vec<Tile>,
    /// Lowest tile coordinate; grid position (0, 0)
    origin: TileCoord,
    /// Tiles along X and Z
    grid: (usize, usize),
    /// Samples per tile along X and Z
    resolution: (usize, usize),
    history: History,
}

impl TileWorldManager {
    /// Build a manager over `terrains`, which must form a complete rectangle
    /// of tiles with one shared resolution. An empty list is allowed; every
    /// operation on it then fails with `InvalidInput`.
    pub fn new(mut terrains: Vec<Box<dyn LiveTerrain>>, max_snapshots: usize) -> Result<Self> {
        terrains.sort_by_key(|t| (t.coord().z, t.coord().x));

        let mut manager = Self {
            terrains: Vec::new(),
            tiles: Vec::new(),
            origin: TileCoord::new(0, 0),
            grid: (0, 0),
            resolution: (0, 0),
            history: History::new(max_snapshots),
        };
        if terrains.is_empty() {
            return Ok(manager);
        }

        let min_x = terrains.iter().map(|t| t.coord().x).min().unwrap_or(0);
        let max_x = terrains.iter().map(|t| t.coord().x).max().unwrap_or(0);
        let min_z = terrains.iter().map(|t| t.coord().z).min().unwrap_or(0);
        let max_z = terrains.iter().map(|t| t.coord().z).max().unwrap_or(0);
        let grid = ((max_x - min_x + 1) as usize, (max_z - min_z + 1) as usize);

        if grid.0 * grid.1 != terrains.len() {
            return Err(TerrainError::InvalidParameter(format!(
                "{} tiles do not fill a {}x{} grid",
                terrains.len(),
                grid.0,
                grid.1
            )));
        }
        for pair in terrains.windows(2) {
            if pair[0].coord() == pair[1].coord() {
                return Err(TerrainError::InvalidParameter(format!(
                    "duplicate tile at {}",
                    pair[0].coord()
                )));
            }
        }

        let resolution = terrains[0].resolution();
        if resolution.0 < 2 || resolution.1 < 2 {
            return Err(TerrainError::InvalidParameter(format!(
                "tile resolution {}x{} is too small",
                resolution.0, resolution.1
            )));
        }
        if let Some(odd) = terrains.iter().find(|t| t.resolution() != resolution) {
            return Err(TerrainError::SizeMismatch {
                expected: resolution,
                actual: odd.resolution(),
            });
        }

        manager.terrains = terrains;
        manager.origin = TileCoord::new(min_x, min_z);
        manager.grid = grid;
        manager.resolution = resolution;
        tracing::info!(
            "tile world: {}x{} tiles of {}x{} samples",
            grid.0,
            grid.1,
            resolution.0,
            resolution.1
        );
        Ok(manager)
    }

    pub fn grid_size(&self) -> (usize, usize) {
        self.grid
    }

    pub fn tile_resolution(&self) -> (usize, usize) {
        self.resolution
    }

    pub fn is_loaded(&self) -> bool {
        !self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, coord: TileCoord) -> Option<&Tile> {
        self.tiles.iter().find(|t| t.coord == coord)
    }

    pub fn terrains(&self) -> &[Box<dyn LiveTerrain>] {
        &self.terrains
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Grid position of a tile, counted from the lowest coordinate.
    fn grid_position(&self, coord: TileCoord) -> (usize, usize) {
        ((coord.x - self.origin.x) as usize, (coord.z - self.origin.z) as usize)
    }

    /// Index into `tiles` for a grid position. Tiles are stored Z-major.
    fn tile_index(&self, gx: usize, gz: usize) -> usize {
        gz * self.grid.0 + gx
    }

    fn ensure_terrains(&self) -> Result<()> {
        if self.terrains.is_empty() {
            return Err(TerrainError::InvalidInput("no terrain tiles in this world".into()));
        }
        Ok(())
    }

    fn ensure_loaded(&self) -> Result<()> {
        self.ensure_terrains()?;
        if self.tiles.is_empty() {
            return Err(TerrainError::InvalidInput(
                "world has not been loaded; call load_from_world first".into(),
            ));
        }
        Ok(())
    }

    /// Pull every live tile into memory. Starts a new editing session, so
    /// history is cleared. If any tile fails to read, the previous
    /// in-memory state is kept.
    pub fn load_from_world(&mut self) -> Result<()> {
        self.ensure_terrains()?;

        let mut tiles = Vec::with_capacity(self.terrains.len());
        for (source, terrain) in self.terrains.iter().enumerate() {
            let field = terrain.read_heights()?;
            if field.dimensions() != self.resolution {
                return Err(TerrainError::SizeMismatch {
                    expected: self.resolution,
                    actual: field.dimensions(),
                });
            }
            tracing::debug!("read tile {}", terrain.coord());
            tiles.push(Tile {
                coord: terrain.coord(),
                field,
                source,
            });
        }

        self.tiles = tiles;
        self.history.clear();
        tracing::info!("loaded {} tile(s) from world", self.tiles.len());
        Ok(())
    }

    /// Write every in-memory tile back to its live terrain, tile by tile.
    ///
    /// The live heights are read first; if a later write fails, tiles already
    /// written get those heights back and the world is left as it was.
    pub fn save_to_world(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        let mut live = Vec::with_capacity(self.tiles.len());
        for tile in &self.tiles {
            live.push(Tile {
                coord: tile.coord,
                field: self.terrains[tile.source].read_heights()?,
                source: tile.source,
            });
        }
        self.write_tiles(&live)?;
        tracing::info!("saved {} tile(s) to world", self.tiles.len());
        Ok(())
    }

    /// Write `self.tiles` to the world. On the first failed write, every tile
    /// written so far is put back to its entry in `previous`.
    fn write_tiles(&mut self, previous: &[Tile]) -> Result<()> {
        for (i, tile) in self.tiles.iter().enumerate() {
            if let Err(err) = self.terrains[tile.source].write_heights(&tile.field) {
                tracing::warn!(
                    "write to tile {} failed, rolling back {} tile(s): {}",
                    tile.coord,
                    i,
                    err
                );
                for done in &previous[..i] {
                    if let Err(e) = self.terrains[done.source].write_heights(&done.field) {
                        tracing::error!("rollback of tile {} failed: {}", done.coord, e);
                    }
                }
                return Err(err);
            }
            tracing::debug!("wrote tile {}", tile.coord);
        }
        Ok(())
    }

    fn snapshot(label: &str, tiles: &[Tile]) -> WorldSnapshot {
        WorldSnapshot::new(
            label,
            tiles.iter().map(|t| (t.coord, t.field.clone())).collect(),
        )
    }

    /// Shared cycle for destructive filters: mutate every tile, optionally
    /// stitch seams, write to the world, then record history.
    ///
    /// The in-memory tiles are the live state until the write succeeds. If it
    /// fails, memory, live terrain and history all stay at the pre-filter
    /// state. The first filter of a session also records that pre-state.
    fn run_filter(
        &mut self,
        label: &str,
        stitch: bool,
        mut f: impl FnMut(&Self, &mut Tile),
    ) -> Result<()> {
        self.ensure_loaded()?;
        let before = self.tiles.clone();

        let mut tiles = std::mem::take(&mut self.tiles);
        for tile in tiles.iter_mut() {
            f(self, tile);
        }
        self.tiles = tiles;

        let stitched = if stitch { self.stitch_seams() } else { Ok(()) };
        let written = stitched.and_then(|()| self.write_tiles(&before));
        if let Err(err) = written {
            self.tiles = before;
            return Err(err);
        }

        if self.history.is_empty() {
            self.history
                .record(Self::snapshot(&format!("before {}", label), &before));
        }
        self.history.record(Self::snapshot(label, &self.tiles));
        tracing::info!("applied '{}' to {} tile(s)", label, self.tiles.len());
        Ok(())
    }

    /// Run any height-field filter over every tile, then record and save.
    pub fn apply_world_filter(
        &mut self,
        label: &str,
        mut f: impl FnMut(&mut HeightField),
    ) -> Result<()> {
        self.run_filter(label, false, |_, tile| f(&mut tile.field))
    }

    pub fn flatten_world(&mut self, height: f32) -> Result<()> {
        self.apply_world_filter("flatten", |field| {
            field.set_height(height);
        })
    }

    /// Smooth each tile, then stitch seams so tile borders still agree.
    pub fn smooth_world(&mut self, passes: usize) -> Result<()> {
        self.run_filter("smooth", true, |_, tile| {
            tile.field.smooth(passes);
        })
    }

    /// Fill every tile from one noise field so neighbouring tiles join.
    pub fn synthesize_world(&mut self, params: &NoiseParams) -> Result<()> {
        self.ensure_loaded()?;
        let synth = NoiseSynthesizer::new(params.clone())?;
        let (w, d) = self.resolution;
        self.run_filter("synthesize", false, |world, tile| {
            let (gx, gz) = world.grid_position(tile.coord);
            let origin_x = (gx * (w - 1)) as f64;
            let origin_z = (gz * (d - 1)) as f64;
            let scale = tile.field.scale();
            tile.field = synth.generate_at(w, d, origin_x, origin_z).with_scale(scale);
        })
    }

    /// Average the shared edge samples of adjacent tiles in memory.
    ///
    /// X seams are handled first, then Z seams; after both passes the corner
    /// shared by four tiles holds one value.
    pub fn stitch_seams(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        let (gw, gd) = self.grid;
        let (w, d) = self.resolution;

        for gz in 0..gd {
            for gx in 0..gw.saturating_sub(1) {
                let left = self.tile_index(gx, gz);
                let right = self.tile_index(gx + 1, gz);
                for z in 0..d {
                    let a = self.tiles[left].field.get(w - 1, z);
                    let b = self.tiles[right].field.get(0, z);
                    let mid = (a + b) * 0.5;
                    self.tiles[left].field.set(w - 1, z, mid);
                    self.tiles[right].field.set(0, z, mid);
                }
            }
        }

        for gz in 0..gd.saturating_sub(1) {
            for gx in 0..gw {
                let top = self.tile_index(gx, gz);
                let bottom = self.tile_index(gx, gz + 1);
                for x in 0..w {
                    let a = self.tiles[top].field.get(x, d - 1);
                    let b = self.tiles[bottom].field.get(x, 0);
                    let mid = (a + b) * 0.5;
                    self.tiles[top].field.set(x, d - 1, mid);
                    self.tiles[bottom].field.set(x, 0, mid);
                }
            }
        }

        tracing::debug!("stitched seams across {}x{} tiles", gw, gd);
        Ok(())
    }

    /// All tiles as one field. Shared edges appear once, so the result is
    /// `gw*(w-1)+1` by `gd*(d-1)+1` samples.
    pub fn stitched_field(&self) -> Result<HeightField> {
        self.ensure_loaded()?;
        let (gw, gd) = self.grid;
        let (w, d) = self.resolution;
        let total = (gw * (w - 1) + 1, gd * (d - 1) + 1);

        let mut out = HeightField::new(total.0, total.1);
        for tile in &self.tiles {
            let (gx, gz) = self.grid_position(tile.coord);
            let (ox, oz) = (gx * (w - 1), gz * (d - 1));
            for z in 0..d {
                for x in 0..w {
                    out.set(ox + x, oz + z, tile.field.get(x, z));
                }
            }
        }

        if let Some(first) = self.tiles.first() {
            let s = first.field.scale();
            out.set_scale(WorldScale::new(
                s.size_x * gw as f32,
                s.size_z * gd as f32,
                s.height,
            ));
        }
        Ok(out)
    }

    /// Write the stitched world as one image.
    pub fn export_world_as_image(&self, path: &Path) -> Result<()> {
        let field = self.stitched_field()?;
        export_heightfield(&field, path)
    }

    fn restore(&mut self, snapshot: &WorldSnapshot) -> Result<()> {
        if snapshot.tiles.len() != self.tiles.len() {
            return Err(TerrainError::InvalidParameter(format!(
                "snapshot '{}' holds {} tiles, world has {}",
                snapshot.label,
                snapshot.tiles.len(),
                self.tiles.len()
            )));
        }
        for (tile, (coord, field)) in self.tiles.iter().zip(&snapshot.tiles) {
            if tile.coord != *coord || tile.field.dimensions() != field.dimensions() {
                return Err(TerrainError::SizeMismatch {
                    expected: tile.field.dimensions(),
                    actual: field.dimensions(),
                });
            }
        }
        for (tile, (_, field)) in self.tiles.iter_mut().zip(&snapshot.tiles) {
            tile.field = field.clone();
        }
        Ok(())
    }

    /// Put a snapshot into memory and write it to the world. On failure the
    /// in-memory tiles and live terrain keep their current heights.
    fn apply_snapshot(&mut self, snapshot: &WorldSnapshot) -> Result<()> {
        let current = self.tiles.clone();
        let applied = self
            .restore(snapshot)
            .and_then(|()| self.write_tiles(&current));
        if applied.is_err() {
            self.tiles = current;
        }
        applied
    }

    /// Step back one snapshot and write it to the world. Returns false when
    /// there is nothing to undo. A failed write leaves the history index
    /// where it was.
    pub fn undo(&mut self) -> Result<bool> {
        self.ensure_loaded()?;
        let Some(snapshot) = self.history.undo().cloned() else {
            return Ok(false);
        };
        if let Err(err) = self.apply_snapshot(&snapshot) {
            self.history.redo();
            return Err(err);
        }
        tracing::info!("undo to '{}'", snapshot.label);
        Ok(true)
    }

    /// Step forward one snapshot and write it to the world. Returns false
    /// when there is nothing to redo. A failed write leaves the history
    /// index where it was.
    pub fn redo(&mut self) -> Result<bool> {
        self.ensure_loaded()?;
        let Some(snapshot) = self.history.redo().cloned() else {
            return Ok(false);
        };
        if let Err(err) = self.apply_snapshot(&snapshot) {
            self.history.undo();
            return Err(err);
        }
        tracing::info!("redo to '{}'", snapshot.label);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{ImageTerrain, MemoryTerrain};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Memory tile whose writes fail while the shared switch is on.
    struct FlakyTerrain {
        inner: MemoryTerrain,
        fail_writes: Rc<Cell<bool>>,
    }

    impl LiveTerrain for FlakyTerrain {
        fn coord(&self) -> TileCoord {
            self.inner.coord()
        }

        fn resolution(&self) -> (usize, usize) {
            self.inner.resolution()
        }

        fn world_scale(&self) -> WorldScale {
            self.inner.world_scale()
        }

        fn read_heights(&self) -> Result<HeightField> {
            self.inner.read_heights()
        }

        fn write_heights(&mut self, field: &HeightField) -> Result<()> {
            if self.fail_writes.get() {
                return Err(TerrainError::Io(std::io::Error::other("disk full")));
            }
            self.inner.write_heights(field)
        }
    }

    /// Two flat tiles at 0.1; the second one's writes fail on demand.
    fn flaky_world(fail_writes: Rc<Cell<bool>>) -> TileWorldManager {
        let terrains: Vec<Box<dyn LiveTerrain>> = vec![
            Box::new(MemoryTerrain::new(TileCoord::new(0, 0), HeightField::new_with(4, 4, 0.1))),
            Box::new(FlakyTerrain {
                inner: MemoryTerrain::new(TileCoord::new(1, 0), HeightField::new_with(4, 4, 0.1)),
                fail_writes,
            }),
        ];
        TileWorldManager::new(terrains, 8).unwrap()
    }

    fn all_equal(field: &HeightField, v: f32) -> bool {
        field.as_slice().iter().all(|&h| h == v)
    }

    fn random_field(rng: &mut ChaCha8Rng, w: usize, d: usize) -> HeightField {
        HeightField::from_fn(w, d, |_, _| rng.gen_range(0.0..1.0))
    }

    fn memory_world(gw: i32, gd: i32, res: usize, seed: u64) -> TileWorldManager {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut terrains: Vec<Box<dyn LiveTerrain>> = Vec::new();
        for z in 0..gd {
            for x in 0..gw {
                let field = random_field(&mut rng, res, res);
                terrains.push(Box::new(MemoryTerrain::new(TileCoord::new(x, z), field)));
            }
        }
        TileWorldManager::new(terrains, 8).unwrap()
    }

    fn live_heights(manager: &TileWorldManager) -> Vec<HeightField> {
        manager
            .terrains()
            .iter()
            .map(|t| t.read_heights().unwrap())
            .collect()
    }

    #[test]
    fn test_empty_world_is_invalid_input() {
        let mut manager = TileWorldManager::new(Vec::new(), 8).unwrap();
        assert!(matches!(manager.load_from_world(), Err(TerrainError::InvalidInput(_))));
        assert!(matches!(manager.flatten_world(0.5), Err(TerrainError::InvalidInput(_))));
        assert!(matches!(manager.undo(), Err(TerrainError::InvalidInput(_))));
    }

    #[test]
    fn test_filter_before_load_is_invalid_input() {
        let mut manager = memory_world(2, 1, 5, 1);
        let before = live_heights(&manager);
        assert!(matches!(manager.smooth_world(1), Err(TerrainError::InvalidInput(_))));
        assert_eq!(live_heights(&manager), before);
    }

    #[test]
    fn test_rejects_incomplete_grid() {
        let terrains: Vec<Box<dyn LiveTerrain>> = vec![
            Box::new(MemoryTerrain::new(TileCoord::new(0, 0), HeightField::new(4, 4))),
            Box::new(MemoryTerrain::new(TileCoord::new(1, 1), HeightField::new(4, 4))),
        ];
        assert!(TileWorldManager::new(terrains, 8).is_err());

        let mixed: Vec<Box<dyn LiveTerrain>> = vec![
            Box::new(MemoryTerrain::new(TileCoord::new(0, 0), HeightField::new(4, 4))),
            Box::new(MemoryTerrain::new(TileCoord::new(1, 0), HeightField::new(5, 4))),
        ];
        assert!(matches!(
            TileWorldManager::new(mixed, 8),
            Err(TerrainError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_load_save_round_trip_leaves_world_unchanged() {
        let mut manager = memory_world(2, 2, 6, 7);
        let before = live_heights(&manager);
        manager.load_from_world().unwrap();
        manager.save_to_world().unwrap();
        assert_eq!(live_heights(&manager), before);
        assert!(manager.history().is_empty());
    }

    #[test]
    fn test_flatten_saves_immediately() {
        let mut manager = memory_world(2, 1, 4, 3);
        manager.load_from_world().unwrap();
        manager.flatten_world(0.25).unwrap();
        for field in live_heights(&manager) {
            assert!(field.as_slice().iter().all(|&v| v == 0.25));
        }
    }

    #[test]
    fn test_undo_redo_is_linear() {
        let mut manager = memory_world(2, 1, 4, 11);
        let original = live_heights(&manager);
        manager.load_from_world().unwrap();

        manager.flatten_world(0.2).unwrap();
        manager.flatten_world(0.4).unwrap();
        assert_eq!(
            manager.history().labels(),
            vec!["before flatten", "flatten", "flatten"]
        );

        assert!(manager.undo().unwrap());
        assert!(live_heights(&manager)[0].as_slice().iter().all(|&v| v == 0.2));
        assert!(manager.undo().unwrap());
        assert_eq!(live_heights(&manager), original);
        assert!(!manager.undo().unwrap());

        assert!(manager.redo().unwrap());
        assert!(live_heights(&manager)[1].as_slice().iter().all(|&v| v == 0.2));

        // A new filter after undo drops the 0.4 snapshot.
        manager.flatten_world(0.9).unwrap();
        assert!(!manager.redo().unwrap());
        assert_eq!(manager.history().len(), 3);
        assert!(manager.undo().unwrap());
        assert!(live_heights(&manager)[0].as_slice().iter().all(|&v| v == 0.2));
    }

    #[test]
    fn test_history_capacity() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let terrains: Vec<Box<dyn LiveTerrain>> = vec![Box::new(MemoryTerrain::new(
            TileCoord::new(0, 0),
            random_field(&mut rng, 4, 4),
        ))];
        let mut manager = TileWorldManager::new(terrains, 3).unwrap();
        manager.load_from_world().unwrap();
        for h in [0.1, 0.2, 0.3, 0.4] {
            manager.flatten_world(h).unwrap();
        }
        assert_eq!(manager.history().len(), 3);
        assert!(manager.undo().unwrap());
        assert!(manager.undo().unwrap());
        assert!(!manager.undo().unwrap());
        assert!(live_heights(&manager)[0].as_slice().iter().all(|&v| v == 0.2));
    }

    #[test]
    fn test_smooth_world_stitches_seams() {
        let mut manager = memory_world(2, 2, 6, 21);
        let original = live_heights(&manager);
        manager.load_from_world().unwrap();
        manager.smooth_world(2).unwrap();

        let tile = |x, z| manager.tile(TileCoord::new(x, z)).unwrap().field.clone();
        let (a, b, c, d) = (tile(0, 0), tile(1, 0), tile(0, 1), tile(1, 1));
        for i in 0..6 {
            assert_eq!(a.get(5, i), b.get(0, i));
            assert_eq!(a.get(i, 5), c.get(i, 0));
            assert_eq!(b.get(i, 5), d.get(i, 0));
        }
        assert_eq!(a.get(5, 5), d.get(0, 0));

        // One undo reverts smoothing and stitching together.
        assert_eq!(manager.history().len(), 2);
        assert!(manager.undo().unwrap());
        assert_eq!(live_heights(&manager), original);
    }

    #[test]
    fn test_synthesize_world_is_seamless() {
        let mut manager = memory_world(2, 2, 9, 2);
        manager.load_from_world().unwrap();
        let params = NoiseParams {
            seed: 99,
            zoom: 8.0,
            ..Default::default()
        };
        manager.synthesize_world(&params).unwrap();

        let a = manager.tile(TileCoord::new(0, 0)).unwrap().field.clone();
        let b = manager.tile(TileCoord::new(1, 0)).unwrap().field.clone();
        let c = manager.tile(TileCoord::new(0, 1)).unwrap().field.clone();
        for i in 0..9 {
            assert_eq!(a.get(8, i), b.get(0, i));
            assert_eq!(a.get(i, 8), c.get(i, 0));
        }

        let stitched = manager.stitched_field().unwrap();
        let whole = NoiseSynthesizer::new(params).unwrap().generate(17, 17);
        assert_eq!(stitched.as_slice(), whole.as_slice());
    }

    #[test]
    fn test_stitched_field_layout() {
        let terrains: Vec<Box<dyn LiveTerrain>> = vec![
            Box::new(MemoryTerrain::new(TileCoord::new(3, -1), HeightField::new_with(3, 3, 0.25))),
            Box::new(MemoryTerrain::new(TileCoord::new(4, -1), HeightField::new_with(3, 3, 0.75))),
        ];
        let mut manager = TileWorldManager::new(terrains, 4).unwrap();
        manager.load_from_world().unwrap();
        let field = manager.stitched_field().unwrap();
        assert_eq!(field.dimensions(), (5, 3));
        assert_eq!(field.get(0, 0), 0.25);
        assert_eq!(field.get(4, 2), 0.75);
        assert_eq!(field.scale().size_x, WorldScale::default().size_x * 2.0);
    }

    #[test]
    fn test_image_world_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        for (x, z) in [(0, 0), (1, 0)] {
            ImageTerrain::create(dir.path(), TileCoord::new(x, z), &random_field(&mut rng, 8, 8))
                .unwrap();
        }

        let terrains: Vec<Box<dyn LiveTerrain>> =
            ImageTerrain::discover(dir.path(), WorldScale::default())
                .unwrap()
                .into_iter()
                .map(|t| Box::new(t) as Box<dyn LiveTerrain>)
                .collect();
        let mut manager = TileWorldManager::new(terrains, 8).unwrap();
        let before = live_heights(&manager);
        manager.load_from_world().unwrap();
        manager.save_to_world().unwrap();
        assert_eq!(live_heights(&manager), before);

        manager.flatten_world(0.5).unwrap();
        let out = dir.path().join("world.png");
        manager.export_world_as_image(&out).unwrap();
        assert_eq!(image::image_dimensions(&out).unwrap(), (15, 8));

        manager.undo().unwrap();
        assert_eq!(live_heights(&manager), before);
    }

    #[test]
    fn test_failed_write_rolls_back_filter() {
        let fail = Rc::new(Cell::new(true));
        let mut manager = flaky_world(fail.clone());
        manager.load_from_world().unwrap();

        assert!(manager.flatten_world(0.9).is_err());
        for field in live_heights(&manager) {
            assert!(all_equal(&field, 0.1));
        }
        for tile in manager.tiles() {
            assert!(all_equal(&tile.field, 0.1));
        }
        assert!(manager.history().is_empty());

        fail.set(false);
        manager.flatten_world(0.9).unwrap();
        assert!(live_heights(&manager).iter().all(|f| all_equal(f, 0.9)));
        assert_eq!(manager.history().labels(), vec!["before flatten", "flatten"]);
    }

    #[test]
    fn test_failed_write_keeps_history_position() {
        let fail = Rc::new(Cell::new(false));
        let mut manager = flaky_world(fail.clone());
        manager.load_from_world().unwrap();
        manager.flatten_world(0.3).unwrap();

        fail.set(true);
        assert!(manager.flatten_world(0.6).is_err());
        assert_eq!(manager.history().labels(), vec!["before flatten", "flatten"]);

        assert!(manager.undo().is_err());
        assert_eq!(manager.history().current_index(), Some(1));
        assert!(live_heights(&manager).iter().all(|f| all_equal(f, 0.3)));
        assert!(manager.tiles().iter().all(|t| all_equal(&t.field, 0.3)));

        assert!(manager.save_to_world().is_err());
        assert!(live_heights(&manager).iter().all(|f| all_equal(f, 0.3)));

        fail.set(false);
        assert!(manager.undo().unwrap());
        assert!(live_heights(&manager).iter().all(|f| all_equal(f, 0.1)));
    }
}
