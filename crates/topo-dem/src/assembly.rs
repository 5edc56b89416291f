//! Assembling large selections to disk, in memory or chunk by chunk.

use crate::bil::{self, BilWriter};
use crate::database::{extended, TileDatabase};
use crate::geotiff;
use crate::reader::extension_lower;
use crate::resample::nan_aware_resize;
use crate::{DemError, ElevationGrid, GeoBounds, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use topo_metrics::metric_defs;
use tracing::{debug, info, warn};

/// Default working-memory budget in MB used for strategy decisions.
pub const DEFAULT_MEMORY_BUDGET_MB: u64 = 8192;

/// Default target chunk size in MB.
pub const DEFAULT_CHUNK_SIZE_MB: u64 = 200;

/// Bytes per output sample including processing overhead.
const BYTES_PER_PIXEL: f64 = 4.0 * 2.5;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Assembly settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyConfig {
    /// Memory available for assembly, in MB.
    pub memory_budget_mb: u64,
    /// Target size of one chunk, in MB.
    pub chunk_size_mb: u64,
    /// Always use chunked assembly.
    pub force_chunked: bool,
    /// Always assemble in memory.
    pub force_in_memory: bool,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            memory_budget_mb: DEFAULT_MEMORY_BUDGET_MB,
            chunk_size_mb: DEFAULT_CHUNK_SIZE_MB,
            force_chunked: false,
            force_in_memory: false,
        }
    }
}

impl AssemblyConfig {
    pub fn with_memory_budget_mb(mut self, mb: u64) -> Self {
        self.memory_budget_mb = mb;
        self
    }

    pub fn with_chunk_size_mb(mut self, mb: u64) -> Self {
        self.chunk_size_mb = mb;
        self
    }

    pub fn with_force_chunked(mut self, force: bool) -> Self {
        self.force_chunked = force;
        self
    }

    pub fn with_force_in_memory(mut self, force: bool) -> Self {
        self.force_in_memory = force;
        self
    }

    /// Pick a strategy for an assembly needing `estimated_gb`.
    ///
    /// Forcing chunked wins over forcing in-memory. Otherwise the data is
    /// assembled in memory while it needs less than half of the budget.
    pub fn choose_strategy(&self, estimated_gb: f64) -> AssemblyStrategy {
        if self.force_chunked {
            return AssemblyStrategy::Chunked;
        }
        if self.force_in_memory {
            return AssemblyStrategy::InMemory;
        }
        let threshold_gb = self.memory_budget_mb as f64 / 1024.0 * 0.5;
        if estimated_gb < threshold_gb {
            AssemblyStrategy::InMemory
        } else {
            AssemblyStrategy::Chunked
        }
    }
}

/// How an assembly is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyStrategy {
    InMemory,
    Chunked,
}

impl AssemblyStrategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            AssemblyStrategy::InMemory => "in_memory",
            AssemblyStrategy::Chunked => "chunked",
        }
    }
}

/// Working memory in GB to assemble `bounds` at `ppd`, scaled by the fraction `scale`.
/// Wrapped selections (west > east) are measured across the antimeridian.
pub fn estimate_memory_gb(bounds: &GeoBounds, ppd: f64, scale: f64) -> f64 {
    let sel = extended(bounds);
    let full_w = (sel.width_deg() * ppd) as i64;
    let full_h = (sel.height_deg() * ppd) as i64;
    let w = (full_w as f64 * scale) as i64;
    let h = (full_h as f64 * scale) as i64;
    (w * h) as f64 * BYTES_PER_PIXEL / GIB
}

/// Division of an output raster into a grid of chunks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkLayout {
    pub total_width: usize,
    pub total_height: usize,
    pub rows: usize,
    pub cols: usize,
    pub chunk_width: usize,
    pub chunk_height: usize,
    pub chunk_width_deg: f64,
    pub chunk_height_deg: f64,
}

impl ChunkLayout {
    /// Lay out chunks of roughly `chunk_mb` over a `total_w x total_h` output
    /// spanning `wdeg x hdeg` degrees.
    pub fn compute(total_w: usize, total_h: usize, wdeg: f64, hdeg: f64, chunk_mb: u64) -> Self {
        let pixels_per_chunk = ((chunk_mb as f64 / 1024.0 * GIB / BYTES_PER_PIXEL) as usize).max(1);
        let total = total_w * total_h;

        let (mut rows, mut cols) = (1usize, 1usize);
        if total > pixels_per_chunk {
            let needed = total as f64 / pixels_per_chunk as f64;
            let side = needed.sqrt() as usize + 1;
            let edge = (pixels_per_chunk as f64).sqrt();
            rows = side.min((total_h as f64 / edge).ceil() as usize).max(1);
            cols = side.min((total_w as f64 / edge).ceil() as usize).max(1);
            while ((rows * cols) as f64) < needed {
                if rows <= cols {
                    rows += 1;
                } else {
                    cols += 1;
                }
            }
        }

        Self {
            total_width: total_w,
            total_height: total_h,
            rows,
            cols,
            chunk_width: total_w / cols,
            chunk_height: total_h / rows,
            chunk_width_deg: wdeg / cols as f64,
            chunk_height_deg: hdeg / rows as f64,
        }
    }

    pub fn num_chunks(&self) -> usize {
        self.rows * self.cols
    }

    /// Geographic bounds of chunk `(row, col)` within `bounds`.
    pub fn chunk_bounds(&self, row: usize, col: usize, bounds: &GeoBounds) -> GeoBounds {
        GeoBounds::new(
            bounds.west + col as f64 * self.chunk_width_deg,
            bounds.north - row as f64 * self.chunk_height_deg,
            (bounds.west + (col + 1) as f64 * self.chunk_width_deg).min(bounds.east),
            (bounds.north - (row + 1) as f64 * self.chunk_height_deg).max(bounds.south),
        )
    }

    /// Output rows covered by chunk row `row`. The last row takes the remainder.
    fn band_rows(&self, row: usize) -> (usize, usize) {
        let start = row * self.chunk_height;
        let end = if row + 1 == self.rows {
            self.total_height
        } else {
            start + self.chunk_height
        };
        (start, end)
    }
}

/// Path for a temporary assembled DEM: `{temp}/{prefix}_{%Y%m%d_%H%M%S}.dem`.
pub fn temp_output_path(prefix: &str) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    std::env::temp_dir().join(format!("{prefix}_{stamp}.dem"))
}

/// Remove a temporary DEM and its header. Failures are logged.
pub fn cleanup_temp_dem(path: &Path) {
    for file in [path.to_path_buf(), bil::header_path(path)] {
        if file.exists() {
            match std::fs::remove_file(&file) {
                Ok(()) => debug!(path = %file.display(), "Removed temporary file"),
                Err(e) => warn!(path = %file.display(), error = %e, "Failed to remove temporary file"),
            }
        }
    }
}

fn scaled(len: usize, scale: f64) -> usize {
    ((len as f64 * scale) as usize).max(1)
}

fn is_geotiff_path(path: &Path) -> bool {
    matches!(extension_lower(path).as_deref(), Some("tif" | "tiff"))
}

/// Writes database selections to DEM or GeoTIFF files.
#[derive(Debug, Clone, Default)]
pub struct DemAssembler {
    config: AssemblyConfig,
}

impl DemAssembler {
    pub fn new(config: AssemblyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    /// Assemble `bounds` at `scale_pct` percent of full resolution into memory.
    pub fn assemble_grid(&self, db: &TileDatabase, bounds: &GeoBounds, scale_pct: f64) -> Result<ElevationGrid> {
        let scale = Self::scale_fraction(scale_pct)?;
        let grid = db
            .assemble(bounds)?
            .ok_or_else(|| DemError::NoData(bounds.to_string()))?;
        if scale == 1.0 {
            return Ok(grid);
        }
        Ok(nan_aware_resize(&grid, scaled(grid.width(), scale), scaled(grid.height(), scale)))
    }

    /// Assemble `bounds` into `output`, a `.dem` (with `.hdr`) or `.tif` file.
    pub fn assemble_to_file(&self, db: &TileDatabase, bounds: &GeoBounds, scale_pct: f64, output: &Path) -> Result<PathBuf> {
        let scale = Self::scale_fraction(scale_pct)?;
        let tiles = db.tiles_for_bounds(bounds);
        if tiles.is_empty() {
            return Err(DemError::NoData(bounds.to_string()));
        }
        let ppd = TileDatabase::assembly_ppd(&tiles);
        let estimate = estimate_memory_gb(bounds, ppd, scale);
        let strategy = self.config.choose_strategy(estimate);
        info!(
            bounds = %bounds,
            tiles = tiles.len(),
            estimate_gb = estimate,
            strategy = strategy.as_str(),
            "Assembling selection"
        );

        match strategy {
            AssemblyStrategy::InMemory => {
                let grid = self.assemble_grid(db, bounds, scale_pct)?;
                self.write_output(output, &grid, &extended(bounds))?;
            }
            AssemblyStrategy::Chunked => self.assemble_chunked(db, bounds, ppd, scale, output)?,
        }
        info!(path = %output.display(), "Assembly complete");
        Ok(output.to_path_buf())
    }

    fn scale_fraction(scale_pct: f64) -> Result<f64> {
        if !(1.0..=100.0).contains(&scale_pct) {
            return Err(DemError::InvalidScale(scale_pct));
        }
        Ok(scale_pct / 100.0)
    }

    fn write_output(&self, output: &Path, grid: &ElevationGrid, bounds: &GeoBounds) -> Result<()> {
        if is_geotiff_path(output) {
            geotiff::write_geotiff(output, grid, bounds)
        } else {
            bil::write_bil(output, grid, bounds).map(|_| ())
        }
    }

    fn assemble_chunked(&self, db: &TileDatabase, bounds: &GeoBounds, ppd: f64, scale: f64, output: &Path) -> Result<()> {
        let sel = extended(bounds);
        let total_w = (sel.width_deg() * ppd * scale) as usize;
        let total_h = (sel.height_deg() * ppd * scale) as usize;
        let layout = ChunkLayout::compute(total_w, total_h, sel.width_deg(), sel.height_deg(), self.config.chunk_size_mb);
        info!(
            width = total_w,
            height = total_h,
            rows = layout.rows,
            cols = layout.cols,
            "Chunk layout"
        );

        // GeoTIFF output is encoded in one pass, so bands are collected
        let mut full = is_geotiff_path(output).then(|| ElevationGrid::nodata(total_w, total_h));
        let mut writer = match full {
            Some(_) => None,
            None => Some(BilWriter::create(output, total_w, total_h, &sel)?),
        };

        for row in 0..layout.rows {
            let (start, end) = layout.band_rows(row);
            let mut band = ElevationGrid::nodata(total_w, end - start);
            for col in 0..layout.cols {
                let chunk = layout.chunk_bounds(row, col, &sel);
                let tiles = db.tiles_for_bounds(&chunk);
                metrics::counter!(metric_defs::ASSEMBLY_CHUNKS.name).increment(1);
                if tiles.is_empty() {
                    debug!(row, col, "No tiles for chunk");
                    continue;
                }
                let Some(data) = db.assemble_tiles(&tiles, &chunk, ppd, AssemblyStrategy::Chunked.as_str())? else {
                    continue;
                };
                let data = if scale == 1.0 {
                    data
                } else {
                    nan_aware_resize(&data, scaled(data.width(), scale), scaled(data.height(), scale))
                };
                band.place(&data, col * layout.chunk_width, 0);
            }

            match (&mut writer, &mut full) {
                (Some(w), _) => {
                    for r in band.rows() {
                        w.write_row(r)?;
                    }
                }
                (None, Some(grid)) => grid.place(&band, 0, start),
                (None, None) => {}
            }
            debug!(row, rows = layout.rows, "Finished chunk row");
        }

        if let Some(w) = writer {
            w.finish()?;
        }
        if let Some(grid) = full {
            geotiff::write_geotiff(output, &grid, &sel)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_estimate_memory() {
        let b = GeoBounds::new(0.0, 10.0, 10.0, 0.0);
        // 1200 x 1200 px at full scale
        let gb = estimate_memory_gb(&b, 120.0, 1.0);
        assert_relative_eq!(gb, 1200.0 * 1200.0 * 10.0 / GIB);
        let half = estimate_memory_gb(&b, 120.0, 0.5);
        assert_relative_eq!(half, 600.0 * 600.0 * 10.0 / GIB);
    }

    #[test]
    fn test_estimate_memory_wrapped_selection() {
        // 176..-176 spans 8 degrees, 960 x 240 px
        let wrapped = GeoBounds::new(176.0, 2.0, -176.0, 0.0);
        let gb = estimate_memory_gb(&wrapped, 120.0, 1.0);
        assert!(gb > 0.0);
        assert_relative_eq!(gb, 960.0 * 240.0 * 10.0 / GIB);
        assert_relative_eq!(gb, estimate_memory_gb(&GeoBounds::new(176.0, 2.0, 184.0, 0.0), 120.0, 1.0));
        assert_eq!(
            AssemblyConfig::default().with_memory_budget_mb(0).choose_strategy(gb),
            AssemblyStrategy::Chunked
        );
    }

    #[test]
    fn test_choose_strategy() {
        let config = AssemblyConfig::default().with_memory_budget_mb(2048);
        assert_eq!(config.choose_strategy(0.5), AssemblyStrategy::InMemory);
        assert_eq!(config.choose_strategy(1.0), AssemblyStrategy::Chunked);
        assert_eq!(
            config.clone().with_force_in_memory(true).choose_strategy(100.0),
            AssemblyStrategy::InMemory
        );
        assert_eq!(
            config.with_force_chunked(true).choose_strategy(0.0),
            AssemblyStrategy::Chunked
        );
    }

    #[test]
    fn test_single_chunk_layout() {
        let layout = ChunkLayout::compute(1000, 1000, 10.0, 10.0, 200);
        assert_eq!(layout.num_chunks(), 1);
        assert_eq!(layout.chunk_width, 1000);
        assert_relative_eq!(layout.chunk_height_deg, 10.0);
    }

    #[test]
    fn test_multi_chunk_layout() {
        // 1 MB chunks hold 104857 pixels
        let layout = ChunkLayout::compute(1000, 500, 20.0, 10.0, 1);
        assert!(layout.num_chunks() as f64 >= 500_000.0 / 104_857.0);
        assert_eq!(layout.chunk_width, 1000 / layout.cols);
        assert_relative_eq!(layout.chunk_width_deg, 20.0 / layout.cols as f64);

        let b = GeoBounds::new(0.0, 10.0, 20.0, 0.0);
        let last = layout.chunk_bounds(layout.rows - 1, layout.cols - 1, &b);
        assert_relative_eq!(last.east, 20.0);
        assert_relative_eq!(last.south, 0.0, epsilon = 1e-9);
        assert_eq!(layout.band_rows(layout.rows - 1).1, 500);
    }

    #[test]
    fn test_temp_output_path() {
        let path = temp_output_path("assembled_dem");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("assembled_dem_"));
        assert!(name.ends_with(".dem"));
        assert_eq!(name.len(), "assembled_dem_".len() + 15 + 4);
    }

    #[test]
    fn test_scale_fraction() {
        assert!(matches!(DemAssembler::scale_fraction(0.0), Err(DemError::InvalidScale(_))));
        assert_relative_eq!(DemAssembler::scale_fraction(50.0).unwrap(), 0.5);
    }
}
