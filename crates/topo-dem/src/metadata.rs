//! JSON sidecar describing a multi-file database.
//!
//! The sidecar lives in the database folder as `<folder>_metadata.json` and
//! records the geographic bounds and pixel dimensions of every tile so a
//! database can be opened without reading each tile header.

use crate::reader::{extension_lower, DemSource};
use crate::{DemError, GeoBounds, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default resolution when no tile reports one (30 arc-seconds).
pub const DEFAULT_RESOLUTION_DEGREES: f64 = 0.00833333333333;

/// Tool identifier written into new sidecars.
pub const CREATED_BY: &str = concat!("topoimg ", env!("CARGO_PKG_VERSION"));

/// Top-level sidecar document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFile {
    pub dataset_info: DatasetInfo,
    pub tiles: BTreeMap<String, TileEntry>,
}

/// Per-tile record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileEntry {
    /// Path relative to the database folder.
    pub file_path: String,
    /// `[width, height]` in pixels.
    pub dimensions: [usize; 2],
    /// `[west, north, east, south]`.
    pub bounds: [f64; 4],
    #[serde(default)]
    pub bounds_desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_degrees: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodata_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bits_per_sample: Option<u32>,
}

/// Dataset-wide description. Only `name` is required when reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_arcsec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_degrees: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_dimensions: Option<[usize; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bounds: Option<[f64; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds_desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tiles: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinate_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodata_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl DatasetInfo {
    /// Description used when a folder is scanned without a sidecar.
    pub fn scanned(folder: &Path, tile_count: usize) -> Self {
        Self {
            name: format!("Custom Dataset ({})", folder_name(folder)),
            description: Some(format!("Scanned DEM files from {}", folder.display())),
            total_tiles: Some(tile_count),
            source: Some("Dynamic scanning".to_string()),
            ..Default::default()
        }
    }
}

impl MetadataFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

pub(crate) fn folder_name(folder: &Path) -> String {
    folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| folder.display().to_string())
}

/// Recursively collect files below `dir` whose extension is `ext`, sorted.
pub(crate) fn find_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if extension_lower(&path).as_deref() == Some(ext) {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Every readable DEM file below `dir`, grouped by extension in the order dem, bil, tif, tiff.
pub(crate) fn find_dem_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for ext in ["dem", "bil", "tif", "tiff"] {
        files.extend(find_files(dir, ext)?);
    }
    Ok(files)
}

/// Average pixels per degree over both axes, or `None` for degenerate bounds.
pub(crate) fn pixels_per_degree(width: usize, height: usize, bounds: &GeoBounds) -> Option<f64> {
    let (wdeg, hdeg) = (bounds.width_deg(), bounds.height_deg());
    (wdeg > 0.0 && hdeg > 0.0).then(|| (width as f64 / wdeg + height as f64 / hdeg) / 2.0)
}

/// Scan `folder` and write `<folder>/<folder name>_metadata.json`.
///
/// Returns the sidecar path. Unreadable files are skipped with a warning.
pub fn create_metadata_file<P: AsRef<Path>>(folder: P, name: Option<&str>) -> Result<PathBuf> {
    let folder = folder.as_ref();
    if !folder.is_dir() {
        return Err(DemError::NoDemFiles(folder.to_path_buf()));
    }

    let mut tiles = BTreeMap::new();
    let mut all_bounds: Vec<GeoBounds> = Vec::new();
    let mut resolutions = Vec::new();

    for path in find_dem_files(folder)? {
        let source = match DemSource::open(&path) {
            Ok(source) => source,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable DEM file");
                continue;
            }
        };
        let meta = source.metadata();
        let bounds = meta.bounds.normalized();
        if let Some(ppd) = pixels_per_degree(meta.width, meta.height, &bounds) {
            resolutions.push(ppd);
        }

        let relative = path.strip_prefix(folder).unwrap_or(&path);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        tiles.insert(
            stem,
            TileEntry {
                file_path: relative.to_string_lossy().into_owned(),
                dimensions: [meta.width, meta.height],
                bounds: bounds.to_array(),
                bounds_desc: bounds.describe(),
                resolution_degrees: Some([
                    bounds.width_deg() / meta.width.max(1) as f64,
                    bounds.height_deg() / meta.height.max(1) as f64,
                ]),
                nodata_value: Some(meta.nodata.unwrap_or(-9999.0)),
                byte_order: Some("little_endian".to_string()),
                data_format: extension_lower(&path).map(|e| e.to_ascii_uppercase()),
                bits_per_sample: Some(16),
            },
        );
        all_bounds.push(bounds);
    }

    if all_bounds.is_empty() {
        return Err(DemError::NoDemFiles(folder.to_path_buf()));
    }
    if all_bounds.len() == 1 {
        warn!(folder = %folder.display(), "Metadata created for a single file");
    }

    let total = all_bounds.iter().skip(1).fold(all_bounds[0], |acc, b| {
        GeoBounds::new(
            acc.west.min(b.west),
            acc.north.max(b.north),
            acc.east.max(b.east),
            acc.south.min(b.south),
        )
    });
    let avg_ppd = if resolutions.is_empty() {
        None
    } else {
        Some(resolutions.iter().sum::<f64>() / resolutions.len() as f64)
    };
    let resolution_degrees = avg_ppd.map_or(DEFAULT_RESOLUTION_DEGREES, |p| 1.0 / p);
    let valid = all_bounds.len();

    let dataset_info = DatasetInfo {
        name: name
            .map(str::to_string)
            .unwrap_or_else(|| format!("Custom Database ({})", folder_name(folder))),
        description: Some(format!(
            "Multi-file database created from {}",
            folder.display()
        )),
        resolution_arcsec: Some(avg_ppd.map_or(30.0, |p| 3600.0 / p)),
        resolution_degrees: Some(resolution_degrees),
        total_dimensions: Some([
            (total.width_deg() / resolution_degrees) as usize,
            (total.height_deg() / resolution_degrees) as usize,
        ]),
        total_bounds: Some(total.to_array()),
        bounds_desc: Some(total.describe()),
        total_tiles: Some(valid),
        coverage: Some(format!(
            "{valid} tiles covering {:.1}° × {:.1}°",
            total.width_deg(),
            total.height_deg()
        )),
        source: Some("User-created multi-file database".to_string()),
        coordinate_system: Some("Geographic (WGS84)".to_string()),
        datum: Some("WGS84".to_string()),
        nodata_value: Some(-9999.0),
        data_type: Some("int16".to_string()),
        byte_order: Some("little_endian".to_string()),
        created_date: Some(chrono::Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
        created_by: Some(CREATED_BY.to_string()),
    };

    let out = folder.join(format!("{}_metadata.json", folder_name(folder)));
    MetadataFile { dataset_info, tiles }.save(&out)?;
    info!(path = %out.display(), tiles = valid, "Wrote database metadata");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bil::write_bil, ElevationGrid};
    use approx::assert_relative_eq;

    #[test]
    fn test_create_metadata_file() {
        let root = tempfile::TempDir::new().unwrap();
        let folder = root.path().join("alps");
        std::fs::create_dir_all(folder.join("sub")).unwrap();

        let grid = ElevationGrid::filled(10, 10, 500.0);
        write_bil(folder.join("a.dem"), &grid, &GeoBounds::new(0.0, 10.0, 10.0, 0.0)).unwrap();
        write_bil(folder.join("sub/b.dem"), &grid, &GeoBounds::new(10.0, 10.0, 20.0, 0.0)).unwrap();

        let path = create_metadata_file(&folder, None).unwrap();
        assert_eq!(path, folder.join("alps_metadata.json"));

        let meta = MetadataFile::load(&path).unwrap();
        assert_eq!(meta.dataset_info.name, "Custom Database (alps)");
        assert_eq!(meta.dataset_info.total_tiles, Some(2));
        assert_eq!(meta.dataset_info.total_bounds, Some([0.0, 10.0, 20.0, 0.0]));
        assert_eq!(meta.dataset_info.total_dimensions, Some([20, 10]));
        assert_relative_eq!(meta.dataset_info.resolution_arcsec.unwrap(), 3600.0);
        assert_eq!(
            meta.dataset_info.coverage.as_deref(),
            Some("2 tiles covering 20.0° × 10.0°")
        );

        let b = &meta.tiles["b"];
        assert_eq!(Path::new(&b.file_path), Path::new("sub/b.dem"));
        assert_eq!(b.dimensions, [10, 10]);
        assert_eq!(b.data_format.as_deref(), Some("DEM"));
        assert_eq!(b.bounds_desc, "10.0°E, 10.0°N, 20.0°E, 0.0°N");
    }

    #[test]
    fn test_create_metadata_file_empty_folder() {
        let root = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            create_metadata_file(root.path(), Some("x")),
            Err(DemError::NoDemFiles(_))
        ));
    }

    #[test]
    fn test_parse_minimal_sidecar() {
        let text = r#"{
            "dataset_info": {"name": "GTOPO30", "resolution_degrees": 0.008333333333333333},
            "tiles": {"gt30w180n90": {"file_path": "gt30w180n90.dem", "dimensions": [4800, 6000], "bounds": [-180, 90, -140, 40]}}
        }"#;
        let meta: MetadataFile = serde_json::from_str(text).unwrap();
        assert_eq!(meta.tiles["gt30w180n90"].dimensions, [4800, 6000]);
        assert_eq!(meta.dataset_info.total_tiles, None);
    }
}
