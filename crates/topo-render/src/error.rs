//! Error types for the render crate.

use std::path::PathBuf;
use thiserror::Error;
use topo_dem::DemError;
use topo_gradient::GradientError;

/// Errors that can occur while rendering or exporting terrain.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Reading or writing elevation data failed.
    #[error(transparent)]
    Dem(#[from] DemError),

    /// Gradient lookup or library failure.
    #[error(transparent)]
    Gradient(#[from] GradientError),

    /// Image encoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error writing output files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The output would exceed the pixel limit.
    #[error("Output too large: {width}x{height} = {pixels} pixels (max: {max}); reduce export scale to ~{suggested_percent}% or select a smaller area")]
    TooManyPixels {
        /// Output width.
        width: usize,
        /// Output height.
        height: usize,
        /// `width * height`.
        pixels: usize,
        /// Pixel limit.
        max: usize,
        /// Largest scale (percent) that fits.
        suggested_percent: u32,
    },

    /// Rendering needs more memory than the configured budget allows.
    #[error("Insufficient memory for rendering: needs {needed_gb:.1}GB, limit is {limit_gb:.1}GB; reduce export scale to ~{suggested_percent}%")]
    Memory {
        /// Estimated working set.
        needed_gb: f64,
        /// 85% of the memory budget.
        limit_gb: f64,
        /// Largest scale (percent) that fits.
        suggested_percent: u32,
    },

    /// The grid holds no samples.
    #[error("No elevation data to render")]
    EmptyGrid,

    /// A crop window that selects no pixels.
    #[error("Invalid selection bounds - results in zero or negative crop size: x={x0}-{x1}, y={y0}-{y1}")]
    EmptyCrop {
        /// Left column.
        x0: i64,
        /// Right column (exclusive).
        x1: i64,
        /// Top row.
        y0: i64,
        /// Bottom row (exclusive).
        y1: i64,
    },

    /// A selection crossing the antimeridian on data that does not.
    #[error("Selection {west}..{east} crosses the antimeridian, which the data does not cover")]
    WrappedSelection {
        /// Selection west edge.
        west: f64,
        /// Selection east edge.
        east: f64,
    },

    /// Shadow drop distance must be positive.
    #[error("Shadow drop distance must be positive, got {0}")]
    InvalidDropDistance(f64),

    /// Export scale must be positive.
    #[error("Export scale must be positive, got {0}")]
    InvalidScale(f64),

    /// Legend or image dimensions of zero.
    #[error("Invalid image size {width}x{height}")]
    InvalidImageSize {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// An output directory that does not exist.
    #[error("Output directory not found: {0}")]
    MissingDirectory(PathBuf),
}
