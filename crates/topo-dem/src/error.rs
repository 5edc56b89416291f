//! Error types for the DEM crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when reading, assembling, or writing elevation data.
#[derive(Debug, Error)]
pub enum DemError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding or encoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// JSON (de)serialization error for metadata or recent-database files.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image encoding error (previews).
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid GeoTIFF - missing required tags.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// The GeoTIFF looks like imagery rather than elevation data.
    #[error("File appears to contain {detected} data, not elevation data ({})", .reasons.join(", "))]
    NotElevationData {
        /// Detected content type (`image`, `uncertain`, `unknown`).
        detected: String,
        /// Scoring notes that led to the classification.
        reasons: Vec<String>,
    },

    /// The `.hdr` companion of a BIL file does not exist.
    #[error("Header file not found: {0}")]
    MissingHeader(PathBuf),

    /// A required key is missing from a BIL header.
    #[error("Header {path} is missing required field {field}")]
    MissingHeaderField {
        /// Header file.
        path: PathBuf,
        /// Missing key.
        field: &'static str,
    },

    /// A header value could not be parsed.
    #[error("Header field {field} has invalid value '{value}'")]
    InvalidHeaderValue {
        /// Header key.
        field: String,
        /// Raw value.
        value: String,
    },

    /// BIL data with a bit depth other than 16 or 32.
    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u32),

    /// File extension is not a recognized DEM format.
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// The projection file describes a projected (non lat/lon) system.
    #[error("Incompatible coordinate system: projected ({projection}) - requires lat/lon geographic data")]
    ProjectedCoordinateSystem {
        /// Projection name from the PRJ file.
        projection: String,
    },

    /// No DEM files found in a directory or database folder.
    #[error("No DEM files found in {0}")]
    NoDemFiles(PathBuf),

    /// Raw data is shorter than the header promises, or otherwise malformed.
    #[error("Invalid elevation data: {0}")]
    InvalidData(String),

    /// Grid dimensions do not match the supplied buffer.
    #[error("Grid dimensions {width}x{height} do not match {len} samples")]
    DimensionMismatch {
        /// Requested width.
        width: usize,
        /// Requested height.
        height: usize,
        /// Buffer length.
        len: usize,
    },

    /// Geographic bounds that are empty or inverted.
    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),

    /// Scale percentage outside 1..=100.
    #[error("Scale percentage must be between 1 and 100, got {0}")]
    InvalidScale(f64),

    /// A named tile is not part of the database.
    #[error("Tile not found: {0}")]
    TileNotFound(String),

    /// Assembly produced no valid elevation samples.
    #[error("No elevation data in bounds {0}")]
    NoData(String),

    /// Cache lock was poisoned (a thread panicked while holding the lock).
    #[error("Tile cache lock was poisoned")]
    CacheLockPoisoned,

    /// Unsupported data type in the TIFF file.
    #[error("Unsupported TIFF data type: {0}")]
    UnsupportedDataType(String),
}
