//! Multi-file (tiled) elevation databases with lazy tile loading.

use crate::meridian::{longitude_to_x, output_dimensions};
use crate::metadata::{self, DatasetInfo, MetadataFile};
use crate::reader::DemSource;
use crate::resample::nan_aware_resize;
use crate::{DemError, ElevationGrid, GeoBounds, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use topo_metrics::metric_defs;
use tracing::{debug, info, warn};

/// Default maximum number of tiles to cache.
pub const DEFAULT_MAX_CACHE_SIZE: usize = 32;

/// Lowest output resolution used when assembling (30 arc-seconds).
pub const MIN_ASSEMBLY_PPD: f64 = 120.0;

/// How the tile list was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    /// Read from a JSON sidecar.
    Metadata,
    /// Scanned using GTOPO30 file naming.
    Gtopo30,
    /// Scanned for any readable DEM file.
    Generic,
}

/// One tile of a database.
#[derive(Debug, Clone, PartialEq)]
pub struct TileInfo {
    /// File stem, unique within the database.
    pub name: String,
    pub path: PathBuf,
    pub bounds: GeoBounds,
    pub width: usize,
    pub height: usize,
    pub pixels_per_degree: f64,
}

impl TileInfo {
    /// Degrees per pixel `(x, y)`.
    pub fn resolution(&self) -> (f64, f64) {
        (
            self.bounds.width_deg() / self.width.max(1) as f64,
            self.bounds.height_deg() / self.height.max(1) as f64,
        )
    }
}

/// Dataset-level figures for display and export sizing.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub name: String,
    pub source: Option<String>,
    pub kind: DatabaseKind,
    pub tiles_loaded: usize,
    pub tiles_total: usize,
    pub bounds: Option<GeoBounds>,
    pub total_width_pixels: usize,
    pub total_height_pixels: usize,
    pub pixels_per_degree: f64,
}

/// LRU cache for loaded tiles.
#[derive(Debug, Default)]
struct TileCache {
    tiles: HashMap<String, Arc<ElevationGrid>>,
    /// Access order for eviction (most recently used at the back).
    access_order: Vec<String>,
}

impl TileCache {
    fn get(&self, key: &str) -> Option<Arc<ElevationGrid>> {
        self.tiles.get(key).cloned()
    }

    /// Mark a key as recently used.
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.access_order.iter().position(|k| k == key) {
            let k = self.access_order.remove(pos);
            self.access_order.push(k);
        }
    }

    fn insert(&mut self, key: String, tile: Arc<ElevationGrid>, max_size: usize) {
        if self.tiles.contains_key(&key) {
            self.touch(&key);
            return;
        }

        while self.tiles.len() >= max_size.max(1) && !self.access_order.is_empty() {
            let oldest = self.access_order.remove(0);
            self.tiles.remove(&oldest);
        }

        self.tiles.insert(key.clone(), tile);
        self.access_order.push(key);
    }

    fn remove(&mut self, key: &str) {
        self.tiles.remove(key);
        self.access_order.retain(|k| k != key);
    }

    fn len(&self) -> usize {
        self.tiles.len()
    }

    fn clear(&mut self) {
        self.tiles.clear();
        self.access_order.clear();
    }
}

/// A folder of adjacent elevation tiles treated as one coverage area.
///
/// Opening indexes the tiles (from a JSON sidecar, or by reading each tile's
/// header); elevation samples are only read when a tile is first needed.
///
/// ```no_run
/// use topo_dem::{GeoBounds, TileDatabase};
///
/// let db = TileDatabase::open("gtopo30")?;
/// let alps = db.assemble(&GeoBounds::new(5.0, 48.0, 16.0, 44.0))?;
/// # Ok::<(), topo_dem::DemError>(())
/// ```
#[derive(Debug)]
pub struct TileDatabase {
    folder: PathBuf,
    kind: DatabaseKind,
    dataset: DatasetInfo,
    tiles: Vec<TileInfo>,
    cache: RwLock<TileCache>,
    max_cache_size: usize,
}

/// GTOPO30 tiles are named like `gt30w180n90.dem`.
fn is_gtopo30_name(name: &str) -> bool {
    let b = name.as_bytes();
    b.len() == 15
        && name.starts_with("gt30")
        && matches!(b[4], b'w' | b'e')
        && b[5..8].iter().all(u8::is_ascii_digit)
        && matches!(b[8], b'n' | b's')
        && b[9..11].iter().all(u8::is_ascii_digit)
        && name.ends_with(".dem")
}

fn tile_from_source(path: &Path) -> Result<TileInfo> {
    let source = DemSource::open(path)?;
    let meta = source.metadata();
    let bounds = meta.bounds.normalized();
    let pixels_per_degree = metadata::pixels_per_degree(meta.width, meta.height, &bounds)
        .ok_or_else(|| DemError::InvalidBounds(bounds.to_string()))?;
    Ok(TileInfo {
        name: stem(path),
        path: path.to_path_buf(),
        bounds,
        width: meta.width,
        height: meta.height,
        pixels_per_degree,
    })
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Strict overlap test (touching edges do not count), optionally shifting the tile's longitudes.
fn overlaps(tile: &GeoBounds, sel: &GeoBounds, shift: f64) -> bool {
    tile.west + shift < sel.east
        && tile.east + shift > sel.west
        && tile.south < sel.north
        && tile.north > sel.south
}

/// Express a wrapped selection (west > east) with east extended past 180.
pub(crate) fn extended(bounds: &GeoBounds) -> GeoBounds {
    bounds.unwrapped()
}

impl TileDatabase {
    /// Open a database folder with the default cache size.
    pub fn open<P: AsRef<Path>>(folder: P) -> Result<Self> {
        Self::with_cache_size(folder, DEFAULT_MAX_CACHE_SIZE)
    }

    /// Open a database folder keeping at most `max_cache_size` tiles in memory.
    pub fn with_cache_size<P: AsRef<Path>>(folder: P, max_cache_size: usize) -> Result<Self> {
        let folder = folder.as_ref().to_path_buf();
        if !folder.is_dir() {
            return Err(DemError::NoDemFiles(folder));
        }

        let (kind, dataset, tiles) = match Self::load_from_metadata(&folder)? {
            Some((dataset, tiles)) => (DatabaseKind::Metadata, dataset, tiles),
            None => Self::scan(&folder)?,
        };
        if tiles.is_empty() {
            return Err(DemError::NoDemFiles(folder));
        }

        info!(
            folder = %folder.display(),
            tiles = tiles.len(),
            kind = ?kind,
            "Opened tile database"
        );
        Ok(Self {
            folder,
            kind,
            dataset,
            tiles,
            cache: RwLock::new(TileCache::default()),
            max_cache_size,
        })
    }

    fn load_from_metadata(folder: &Path) -> Result<Option<(DatasetInfo, Vec<TileInfo>)>> {
        let Some(json) = metadata::find_files(folder, "json")?
            .into_iter()
            .find(|p| p.parent() == Some(folder))
        else {
            return Ok(None);
        };

        let file = match MetadataFile::load(&json) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %json.display(), error = %e, "Ignoring unreadable metadata file");
                return Ok(None);
            }
        };

        let mut tiles = Vec::new();
        for (name, entry) in file.tiles {
            let path = folder.join(&entry.file_path);
            if !path.exists() {
                warn!(tile = %name, path = %path.display(), "Tile file listed in metadata is missing");
                continue;
            }
            let bounds = GeoBounds::from_array(entry.bounds).normalized();
            let [width, height] = entry.dimensions;
            let Some(pixels_per_degree) = metadata::pixels_per_degree(width, height, &bounds) else {
                warn!(tile = %name, "Tile has degenerate bounds");
                continue;
            };
            tiles.push(TileInfo {
                name,
                path,
                bounds,
                width,
                height,
                pixels_per_degree,
            });
        }

        if tiles.is_empty() {
            return Ok(None);
        }
        debug!(path = %json.display(), tiles = tiles.len(), "Loaded tiles from metadata");
        Ok(Some((file.dataset_info, tiles)))
    }

    fn scan(folder: &Path) -> Result<(DatabaseKind, DatasetInfo, Vec<TileInfo>)> {
        let gtopo = metadata::folder_name(folder).to_lowercase().contains("gtopo30");
        let (kind, candidates) = if gtopo {
            let files = metadata::find_files(folder, "dem")?
                .into_iter()
                .filter(|p| p.file_name().is_some_and(|n| is_gtopo30_name(&n.to_string_lossy())))
                .collect::<Vec<_>>();
            (DatabaseKind::Gtopo30, files)
        } else {
            (DatabaseKind::Generic, metadata::find_dem_files(folder)?)
        };

        let mut tiles: Vec<TileInfo> = Vec::new();
        let mut seen = HashSet::new();
        for path in candidates {
            match tile_from_source(&path) {
                Ok(tile) => {
                    if seen.insert(tile.name.clone()) {
                        debug!(tile = %tile.name, bounds = %tile.bounds, "Found tile");
                        tiles.push(tile);
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Could not index tile"),
            }
        }

        let mut dataset = DatasetInfo::scanned(folder, tiles.len());
        if let [only] = tiles.as_slice() {
            dataset.total_dimensions = Some([only.width, only.height]);
        }
        if !tiles.is_empty() {
            let avg = tiles.iter().map(|t| t.pixels_per_degree).sum::<f64>() / tiles.len() as f64;
            dataset.resolution_degrees = Some(1.0 / avg);
        }
        Ok((kind, dataset, tiles))
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn kind(&self) -> DatabaseKind {
        self.kind
    }

    pub fn tiles(&self) -> &[TileInfo] {
        &self.tiles
    }

    pub fn tile(&self, name: &str) -> Option<&TileInfo> {
        self.tiles.iter().find(|t| t.name == name)
    }

    /// Bounding box of every tile.
    pub fn global_bounds(&self) -> Option<GeoBounds> {
        let first = self.tiles.first()?.bounds;
        Some(self.tiles.iter().skip(1).fold(first, |acc, t| {
            GeoBounds::new(
                acc.west.min(t.bounds.west),
                acc.north.max(t.bounds.north),
                acc.east.max(t.bounds.east),
                acc.south.min(t.bounds.south),
            )
        }))
    }

    /// Resolution of the first tile in degrees per pixel.
    pub fn resolution(&self) -> Option<(f64, f64)> {
        self.tiles.first().map(TileInfo::resolution)
    }

    /// Tiles overlapping `bounds`, including tiles reached across the antimeridian.
    pub fn tiles_for_bounds(&self, bounds: &GeoBounds) -> Vec<&TileInfo> {
        let sel = extended(bounds);
        let mut shifts = vec![0.0];
        if sel.east > 180.0 {
            shifts.push(360.0);
        }
        if sel.west < -180.0 {
            shifts.push(-360.0);
        }

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for shift in shifts {
            for tile in &self.tiles {
                if overlaps(&tile.bounds, &sel, shift) && seen.insert(tile.name.as_str()) {
                    found.push(tile);
                }
            }
        }
        found
    }

    /// Dataset name and sizing figures.
    pub fn dataset_info(&self) -> DatasetSummary {
        let bounds = self.global_bounds();
        let (total_width_pixels, total_height_pixels) = match (self.dataset.total_dimensions, bounds, self.dataset.resolution_degrees) {
            (Some([w, h]), _, _) => (w, h),
            (None, Some(b), Some(res)) if res > 0.0 => (
                (b.width_deg().abs() / res) as usize,
                (b.height_deg().abs() / res) as usize,
            ),
            _ => (0, 0),
        };
        let pixels_per_degree = match (self.dataset.resolution_degrees, bounds) {
            (Some(res), _) if res > 0.0 => 1.0 / res,
            (_, Some(b)) if total_width_pixels > 0 && b.width_deg().abs() > 0.0 => {
                total_width_pixels as f64 / b.width_deg().abs()
            }
            _ => 0.0,
        };
        DatasetSummary {
            name: self.dataset.name.clone(),
            source: self.dataset.source.clone(),
            kind: self.kind,
            tiles_loaded: self.loaded_tile_count(),
            tiles_total: self.tiles.len(),
            bounds,
            total_width_pixels,
            total_height_pixels,
            pixels_per_degree,
        }
    }

    /// Load a tile into the cache if it is not already there.
    pub fn load_tile(&self, name: &str) -> Result<()> {
        self.tile_data(name).map(|_| ())
    }

    /// Elevation samples of a tile, loading it on first use.
    pub fn tile_data(&self, name: &str) -> Result<Arc<ElevationGrid>> {
        {
            let cache = self.cache.read().map_err(|_| DemError::CacheLockPoisoned)?;
            if let Some(grid) = cache.get(name) {
                return Ok(grid);
            }
        }

        let tile = self
            .tile(name)
            .ok_or_else(|| DemError::TileNotFound(name.to_string()))?;
        let grid = Arc::new(DemSource::open(&tile.path)?.read(None)?);

        let mut cache = self.cache.write().map_err(|_| DemError::CacheLockPoisoned)?;
        cache.insert(name.to_string(), Arc::clone(&grid), self.max_cache_size);
        cache.touch(name);
        metrics::gauge!(metric_defs::DATABASE_TILES_LOADED.name).set(cache.len() as f64);
        Ok(grid)
    }

    /// Drop a tile's samples from the cache.
    pub fn unload_tile(&self, name: &str) -> Result<()> {
        let mut cache = self.cache.write().map_err(|_| DemError::CacheLockPoisoned)?;
        cache.remove(name);
        metrics::gauge!(metric_defs::DATABASE_TILES_LOADED.name).set(cache.len() as f64);
        Ok(())
    }

    pub fn is_tile_loaded(&self, name: &str) -> bool {
        self.cache.read().map(|c| c.get(name).is_some()).unwrap_or(false)
    }

    pub fn loaded_tile_count(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Clear all loaded tiles. They remain indexed and reload on demand.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    /// Output resolution for assembling `tiles`.
    pub fn assembly_ppd(tiles: &[&TileInfo]) -> f64 {
        tiles
            .iter()
            .map(|t| t.pixels_per_degree)
            .fold(MIN_ASSEMBLY_PPD, f64::max)
    }

    /// Mosaic every overlapping tile into one grid covering `bounds`.
    ///
    /// Tiles are resampled to the finest tile resolution (at least 120 px/deg).
    /// Returns `None` when the result holds no valid samples. Tiles that fail
    /// to load are skipped.
    pub fn assemble(&self, bounds: &GeoBounds) -> Result<Option<ElevationGrid>> {
        let tiles = self.tiles_for_bounds(bounds);
        if tiles.is_empty() {
            return Ok(None);
        }
        let ppd = Self::assembly_ppd(&tiles);
        self.assemble_tiles(&tiles, &extended(bounds), ppd, "in_memory")
    }

    /// Mosaic `tiles` into a grid covering `sel` at `ppd` pixels per degree.
    pub(crate) fn assemble_tiles(
        &self,
        tiles: &[&TileInfo],
        sel: &GeoBounds,
        ppd: f64,
        strategy: &'static str,
    ) -> Result<Option<ElevationGrid>> {
        let (west, east) = (sel.west, sel.east);
        let (mut out_w, mut crosses) = output_dimensions(west, east, ppd);
        let out_h = (sel.height_deg() * ppd) as usize;
        if out_w == 0 && (west + 180.0).abs() < 0.1 && (east - 180.0).abs() < 0.1 {
            out_w = (360.0 * ppd) as usize;
            crosses = false;
        }

        let mut out = ElevationGrid::nodata(out_w, out_h);
        let mut placed = 0u64;
        for tile in tiles {
            match self.place_tile(&mut out, tile, sel, ppd, crosses) {
                Ok(true) => placed += 1,
                Ok(false) => {}
                Err(DemError::CacheLockPoisoned) => return Err(DemError::CacheLockPoisoned),
                Err(e) => {
                    warn!(tile = %tile.name, error = %e, "Skipping tile during assembly");
                    metrics::counter!(metric_defs::ASSEMBLY_TILES_FAILED.name).increment(1);
                }
            }
        }
        metrics::counter!(metric_defs::ASSEMBLY_TILES_PLACED.name, "strategy" => strategy).increment(placed);

        let valid = out.valid_count();
        debug!(
            width = out_w,
            height = out_h,
            tiles = placed,
            valid,
            "Assembled tiles"
        );
        Ok((valid > 0).then_some(out))
    }

    fn place_tile(&self, out: &mut ElevationGrid, tile: &TileInfo, sel: &GeoBounds, ppd: f64, crosses: bool) -> Result<bool> {
        let (west, east, north, south) = (sel.west, sel.east, sel.north, sel.south);
        let tb = tile.bounds;

        // Tiles reached across the antimeridian are matched in shifted coordinates
        let shift = if crosses && !overlaps(&tb, sel, 0.0) {
            if east > 180.0 {
                360.0
            } else if west < -180.0 {
                -360.0
            } else {
                0.0
            }
        } else {
            0.0
        };

        let iw = west.max(tb.west + shift);
        let ie = east.min(tb.east + shift);
        let i_north = north.min(tb.north);
        let i_south = south.max(tb.south);

        let mut ox0 = longitude_to_x(iw, west, east, out.width());
        let mut ox1 = longitude_to_x(ie, west, east, out.width());
        if ox1 < ox0 {
            std::mem::swap(&mut ox0, &mut ox1);
        }
        let oy0 = ((north - i_north) * ppd) as i64;
        let oy1 = ((north - i_south) * ppd) as i64;

        let (tw, te) = if shift > 0.0 {
            ((iw - 360.0).max(tb.west), (ie - 360.0).min(tb.east))
        } else if shift < 0.0 {
            (
                if iw < -180.0 { iw + 360.0 } else { iw },
                if ie < -179.99 { ie + 360.0 } else { ie },
            )
        } else {
            (iw, ie)
        };

        let grid = self.tile_data(&tile.name)?;
        let (tile_w, tile_h) = (grid.width() as i64, grid.height() as i64);
        if tile_w == 0 || tile_h == 0 {
            return Ok(false);
        }
        let wdeg = tb.width_deg();
        let hdeg = tb.height_deg();
        let tx0 = ((tw - tb.west) / wdeg * tile_w as f64) as i64;
        let tx1 = ((te - tb.west) / wdeg * tile_w as f64) as i64;
        let ty0 = ((tb.north - i_north) / hdeg * tile_h as f64) as i64;
        let ty1 = ((tb.north - i_south) / hdeg * tile_h as f64) as i64;

        let tx0 = tx0.clamp(0, tile_w - 1);
        let tx1 = tx1.min(tile_w).max(tx0 + 1);
        let ty0 = ty0.clamp(0, tile_h - 1);
        let ty1 = ty1.min(tile_h).max(ty0 + 1);

        let target_w = ox1 - ox0;
        let target_h = oy1 - oy0;
        if target_w <= 0 || target_h <= 0 || ox0 < 0 || oy0 < 0 {
            return Ok(false);
        }

        let cropped = grid.crop(tx0 as usize, ty0 as usize, tx1 as usize, ty1 as usize);
        let resized = nan_aware_resize(&cropped, target_w as usize, target_h as usize);
        out.place(&resized, ox0 as usize, oy0 as usize);
        debug!(
            tile = %tile.name,
            shift,
            out_x = ox0,
            out_y = oy0,
            width = target_w,
            height = target_h,
            "Placed tile"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gtopo30_name() {
        assert!(is_gtopo30_name("gt30w180n90.dem"));
        assert!(is_gtopo30_name("gt30e020s10.dem"));
        assert!(!is_gtopo30_name("gt30w180n90.hdr"));
        assert!(!is_gtopo30_name("GT30W180N90.DEM"));
        assert!(!is_gtopo30_name("gt30x180n90.dem"));
    }

    #[test]
    fn test_tile_cache_eviction() {
        let mut cache = TileCache::default();
        let grid = Arc::new(ElevationGrid::filled(1, 1, 0.0));
        cache.insert("a".into(), Arc::clone(&grid), 2);
        cache.insert("b".into(), Arc::clone(&grid), 2);
        cache.touch("a");
        cache.insert("c".into(), Arc::clone(&grid), 2);

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
        assert_eq!(cache.len(), 2);

        cache.remove("a");
        assert_eq!(cache.access_order, vec!["c".to_string()]);
    }

    #[test]
    fn test_overlaps_is_strict() {
        let tile = GeoBounds::new(-180.0, 90.0, -140.0, 40.0);
        assert!(!overlaps(&tile, &GeoBounds::new(-140.0, 60.0, -100.0, 50.0), 0.0));
        assert!(overlaps(&tile, &GeoBounds::new(170.0, 60.0, 190.0, 50.0), 360.0));
    }

    #[test]
    fn test_extended_selection() {
        let b = extended(&GeoBounds::new(170.0, 10.0, -170.0, 0.0));
        assert_eq!(b.east, 190.0);
        let c = extended(&GeoBounds::new(10.0, 10.0, 20.0, 0.0));
        assert_eq!(c.east, 20.0);
    }
}
