//! # topo-dem
//!
//! Elevation data for terrain rendering: single DEM files, tiled databases and
//! the geometry needed to cut selections out of them.
//!
//! ## Overview
//!
//! ### Single files
//!
//! Two on-disk formats are read:
//! - BIL/DEM rasters with an ESRI `.hdr` header, plus optional `.prj`
//!   (projection) and `.stx` (statistics) sidecars. GTOPO30 tiles use this layout.
//! - GeoTIFF rasters in geographic (lat/lon) coordinates. Files that look like
//!   photographs or scanned maps are rejected before reading.
//!
//! Samples are loaded into an [`ElevationGrid`] of `f32` with `NaN` for no-data.
//!
//! ### Tiled databases
//!
//! A folder of adjacent tiles is indexed by a `*_metadata.json` sidecar when
//! present, or by scanning (GTOPO30 file naming when the folder name contains
//! `gtopo30`). Tiles are loaded lazily into an LRU cache and mosaicked on
//! request. Selections may cross the antimeridian, either as `west > east`
//! or with longitudes extended past ±180°.
//!
//! ## Examples
//!
//! ### Reading a DEM file
//!
//! ```no_run
//! use topo_dem::DemSource;
//!
//! let source = DemSource::open("gt30w120n40.dem")?;
//! println!("{}", source.summary());
//!
//! // Every 4th row and column
//! let grid = source.read(Some(4))?;
//! println!("{} x {}", grid.width(), grid.height());
//! # Ok::<(), topo_dem::DemError>(())
//! ```
//!
//! ### Exporting a selection from a tiled database
//!
//! ```no_run
//! use std::path::Path;
//! use topo_dem::{AssemblyConfig, DemAssembler, GeoBounds, TileDatabase};
//!
//! let db = TileDatabase::open("gtopo30")?;
//! let pacific = GeoBounds::new(170.0, 60.0, -170.0, 50.0);
//!
//! let assembler = DemAssembler::new(AssemblyConfig::default().with_memory_budget_mb(4096));
//! assembler.assemble_to_file(&db, &pacific, 50.0, Path::new("pacific.dem"))?;
//! # Ok::<(), topo_dem::DemError>(())
//! ```

mod assembly;
mod bil;
mod bounds;
mod coords;
mod database;
mod error;
mod geotiff;
mod grid;
mod meridian;
mod metadata;
mod reader;
mod recent;
mod resample;

pub use assembly::{
    cleanup_temp_dem, estimate_memory_gb, temp_output_path, AssemblyConfig, AssemblyStrategy, ChunkLayout,
    DemAssembler, DEFAULT_CHUNK_SIZE_MB, DEFAULT_MEMORY_BUDGET_MB,
};
pub use bil::{
    header_path, read_bil_data, read_projection, read_stats, write_bil, BandStats, BilHeader, BilWriter, ByteOrder,
    ProjectionInfo, OUTPUT_NODATA,
};
pub use bounds::GeoBounds;
pub use coords::{
    clamp_to_database_bounds, dms_to_float, float_to_dms, format_coordinate_clean, format_distance_km_miles,
    parse_coordinate_input, snap_to_pixel_grid, validate_and_format_coordinate, DatabaseBounds,
};
pub use database::{DatabaseKind, DatasetSummary, TileDatabase, TileInfo, DEFAULT_MAX_CACHE_SIZE, MIN_ASSEMBLY_PPD};
pub use error::DemError;
pub use geotiff::{
    inspect_geotiff, open_elevation_geotiff, read_geotiff, validate_elevation, write_geotiff, ElevationCheck,
    GeoTiffInfo, SampleKind,
};
pub use grid::ElevationGrid;
pub use meridian::{longitude_span, longitude_to_x, normalize_longitude, output_dimensions, split_bounds, LongitudeSpan};
pub use metadata::{create_metadata_file, DatasetInfo, MetadataFile, TileEntry, CREATED_BY, DEFAULT_RESOLUTION_DEGREES};
pub use reader::{grayscale_preview, is_dem_extension, DemFormat, DemMetadata, DemSource, DEFAULT_PREVIEW_SIZE};
pub use recent::{DatabaseType, RecentDatabase, RecentDatabases, DEFAULT_MAX_RECENT};
pub use resample::{block_average, nan_aware_resize, scale_memory_estimate_mb, scale_percentage, scaled_dimensions};

/// Result type for DEM operations.
pub type Result<T> = std::result::Result<T, DemError>;
