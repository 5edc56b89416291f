//! Format detection and a uniform view over single-file DEMs.

use crate::bil::{self, BandStats, BilHeader};
use crate::geotiff::{self, GeoTiffInfo};
use crate::{DemError, ElevationGrid, GeoBounds, Result};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default longest side of preview images.
pub const DEFAULT_PREVIEW_SIZE: u32 = 512;

/// On-disk format of a DEM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemFormat {
    Bil,
    GeoTiff,
}

/// Format-independent metadata for a DEM.
#[derive(Debug, Clone, PartialEq)]
pub struct DemMetadata {
    pub width: usize,
    pub height: usize,
    pub bounds: GeoBounds,
    /// Degrees per pixel `(x, y)`.
    pub pixel_size: (f64, f64),
    pub nodata: Option<f64>,
    pub layout: Option<String>,
    pub datum: Option<String>,
    pub stats: Option<BandStats>,
}

#[derive(Debug, Clone)]
enum Backing {
    Bil(BilHeader),
    GeoTiff(GeoTiffInfo),
}

/// An opened DEM file (BIL/DEM with sidecars, or GeoTIFF).
#[derive(Debug, Clone)]
pub struct DemSource {
    /// Path as given by the caller (file or directory).
    input: PathBuf,
    /// Data file actually read.
    data_path: PathBuf,
    backing: Backing,
    metadata: DemMetadata,
}

/// Whether `path` has an extension this crate can read.
pub fn is_dem_extension(path: &Path) -> bool {
    matches!(
        extension_lower(path).as_deref(),
        Some("dem" | "bil" | "tif" | "tiff")
    )
}

pub(crate) fn extension_lower(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase())
}

fn first_with_extension(dir: &Path, ext: &str) -> Result<Option<PathBuf>> {
    let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && extension_lower(p).as_deref() == Some(ext))
        .collect();
    matches.sort();
    Ok(matches.into_iter().next())
}

impl DemSource {
    /// Open a DEM file, or the first `.dem` (then `.bil`) file of a directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let input = path.as_ref().to_path_buf();

        if input.is_dir() {
            let data_path = match first_with_extension(&input, "dem")? {
                Some(p) => p,
                None => first_with_extension(&input, "bil")?
                    .ok_or_else(|| DemError::NoDemFiles(input.clone()))?,
            };
            return Self::open_bil(input, data_path);
        }

        match extension_lower(&input).as_deref() {
            Some("tif" | "tiff") => Self::open_geotiff(input),
            Some("dem" | "bil") => Self::open_bil(input.clone(), input),
            _ => Err(DemError::UnsupportedFormat(input.display().to_string())),
        }
    }

    fn open_bil(input: PathBuf, data_path: PathBuf) -> Result<Self> {
        let header = BilHeader::from_file(bil::header_path(&data_path))?;

        let prj = data_path.with_extension("prj");
        let datum = if prj.exists() {
            bil::read_projection(&prj)?.datum
        } else {
            None
        };

        let stx = data_path.with_extension("stx");
        let stats = if stx.exists() { bil::read_stats(&stx)? } else { None };

        let metadata = DemMetadata {
            width: header.ncols,
            height: header.nrows,
            bounds: header.bounds(),
            pixel_size: (header.xdim, header.ydim),
            nodata: Some(header.nodata),
            layout: header.layout.clone(),
            datum,
            stats,
        };
        info!(file = %file_name(&data_path), "Loaded BIL format DEM");
        Ok(Self {
            input,
            data_path,
            backing: Backing::Bil(header),
            metadata,
        })
    }

    fn open_geotiff(path: PathBuf) -> Result<Self> {
        let info = geotiff::open_elevation_geotiff(&path)?;
        let metadata = DemMetadata {
            width: info.width,
            height: info.height,
            bounds: info.bounds,
            pixel_size: info.pixel_size,
            nodata: info.nodata,
            layout: Some("GeoTIFF".to_string()),
            datum: Some("WGS84".to_string()),
            stats: None,
        };
        Ok(Self {
            input: path.clone(),
            data_path: path,
            backing: Backing::GeoTiff(info),
            metadata,
        })
    }

    pub fn format(&self) -> DemFormat {
        match self.backing {
            Backing::Bil(_) => DemFormat::Bil,
            Backing::GeoTiff(_) => DemFormat::GeoTiff,
        }
    }

    pub fn metadata(&self) -> &DemMetadata {
        &self.metadata
    }

    /// Path passed to [`DemSource::open`].
    pub fn input_path(&self) -> &Path {
        &self.input
    }

    /// Data file read by [`DemSource::read`].
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Load the elevation samples, optionally keeping every n-th row and column.
    pub fn read(&self, subsample: Option<usize>) -> Result<ElevationGrid> {
        let grid = match &self.backing {
            Backing::Bil(header) => bil::read_bil_data(&self.data_path, header, subsample)?,
            Backing::GeoTiff(info) => geotiff::read_geotiff(&self.data_path, info, subsample)?,
        };
        debug!(
            file = %file_name(&self.data_path),
            width = grid.width(),
            height = grid.height(),
            subsample = subsample.unwrap_or(1),
            "Read elevation data"
        );
        Ok(grid)
    }

    /// Multi-line description of the file.
    pub fn summary(&self) -> String {
        let m = &self.metadata;
        let b = &m.bounds;
        let mut lines = vec![
            format!("DEM File: {}", file_name(&self.input)),
            format!("Format: {}", m.layout.as_deref().unwrap_or("Unknown")),
            format!("Dimensions: {} × {} pixels", m.width, m.height),
            format!(
                "Bounds: {:.3}°W to {:.3}°E, {:.3}°S to {:.3}°N",
                b.west, b.east, b.south, b.north
            ),
            format!("Resolution: {:.6}° × {:.6}°", m.pixel_size.0, m.pixel_size.1),
        ];
        if let Some(stats) = &m.stats {
            lines.push(format!(
                "Elevation range: {:.0}m to {:.0}m",
                stats.min, stats.max
            ));
        }
        if let Some(nodata) = m.nodata {
            lines.push(format!("No data value: {nodata}"));
        }
        if let Some(datum) = &m.datum {
            lines.push(format!("Datum: {datum}"));
        }
        lines.join("\n")
    }

    /// Default preview location: `{stem}_preview.png` beside the input.
    pub fn default_preview_path(&self) -> PathBuf {
        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dem".to_string());
        self.input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{stem}_preview.png"))
    }

    /// Write a grayscale preview no larger than `size` on its longest side.
    pub fn write_preview(&self, output: Option<&Path>, size: u32) -> Result<PathBuf> {
        let size = size.max(1);
        let longest = self.metadata.width.max(self.metadata.height);
        let subsample = (longest / size as usize).max(1);
        let grid = self.read(Some(subsample))?;

        let preview = grayscale_preview(&grid);
        let preview = if preview.width().max(preview.height()) > size {
            preview.resize(size, size, FilterType::Lanczos3)
        } else {
            preview
        };

        let path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.default_preview_path());
        preview.save(&path)?;
        info!(path = %path.display(), "Wrote preview");
        Ok(path)
    }
}

/// Normalize a grid to 0..255 grayscale with no-data drawn black.
pub fn grayscale_preview(grid: &ElevationGrid) -> DynamicImage {
    let (width, height) = grid.dimensions();
    let pixels: Vec<u8> = match grid.min_max() {
        Some((lo, hi)) => {
            let range = hi - lo;
            grid.data()
                .iter()
                .map(|v| {
                    if v.is_nan() || range <= 0.0 {
                        0
                    } else {
                        (255.0 * (v - lo) / range) as u8
                    }
                })
                .collect()
        }
        None => vec![0; width * height],
    };
    let image = GrayImage::from_raw(width as u32, height as u32, pixels)
        .unwrap_or_else(|| GrayImage::new(width as u32, height as u32));
    DynamicImage::ImageLuma8(image)
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_sample(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(format!("{name}.dem"));
        let grid = ElevationGrid::new(4, 2, vec![0.0, 100.0, 200.0, 300.0, 400.0, f32::NAN, 600.0, 700.0]).unwrap();
        bil::write_bil(&path, &grid, &GeoBounds::new(-120.0, 40.0, -116.0, 38.0)).unwrap();
        path
    }

    #[test]
    fn test_open_directory_picks_dem() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_sample(dir.path(), "tile");
        let source = DemSource::open(dir.path()).unwrap();
        assert_eq!(source.format(), DemFormat::Bil);
        assert_eq!(source.data_path(), path.as_path());
    }

    #[test]
    fn test_unsupported_and_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            DemSource::open(dir.path()),
            Err(DemError::NoDemFiles(_))
        ));
        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, "x").unwrap();
        assert!(matches!(
            DemSource::open(&txt),
            Err(DemError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_summary_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_sample(dir.path(), "sample");
        std::fs::write(dir.path().join("sample.stx"), "1 -12 4321 100.5 20.1\n").unwrap();
        std::fs::write(dir.path().join("sample.prj"), "Projection GEOGRAPHIC\nDatum WGS84\n").unwrap();

        let summary = DemSource::open(&path).unwrap().summary();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines[0], "DEM File: sample.dem");
        assert_eq!(lines[1], "Format: BIL");
        assert_eq!(lines[2], "Dimensions: 4 × 2 pixels");
        assert_eq!(lines[3], "Bounds: -120.000°W to -116.000°E, 38.000°S to 40.000°N");
        assert_eq!(lines[4], "Resolution: 1.000000° × 1.000000°");
        assert_eq!(lines[5], "Elevation range: -12m to 4321m");
        assert_eq!(lines[6], "No data value: -9999");
        assert_eq!(lines[7], "Datum: WGS84");
    }

    #[test]
    fn test_write_preview() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = write_sample(dir.path(), "prev");
        let source = DemSource::open(&path).unwrap();
        let out = source.write_preview(None, DEFAULT_PREVIEW_SIZE).unwrap();
        assert_eq!(out, dir.path().join("prev_preview.png"));

        let img = image::open(&out).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (4, 2));
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
        assert_eq!(img.get_pixel(3, 1).0[0], 255);
        assert_eq!(img.get_pixel(1, 1).0[0], 0);
    }
}
