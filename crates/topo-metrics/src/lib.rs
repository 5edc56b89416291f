//! Metrics declarations for terrain rendering and DEM assembly.
//!
//! Every metric the workspace records is declared once as a [`Metric`]
//! constant in [`metric_defs`], so names cannot drift between the code that
//! records a value and the exporter that reads it. The `metrics` crate is
//! re-exported; no recorder is installed here.
//!
//! # Example
//!
//! ```rust,ignore
//! use topo_metrics::{describe_metrics, metric_defs, RenderLabels};
//!
//! describe_metrics();
//!
//! let labels = RenderLabels::new("Classic Elevation", "shading_and_gradient");
//! metrics::counter!(metric_defs::RENDER_COUNT.name, &labels.to_labels()).increment(1);
//! ```
//!
//! # Metric Type
//!
//! ```rust
//! use topo_metrics::{Metric, MetricKind};
//! use metrics::Unit;
//!
//! const TILES: Metric = Metric::counter("my.tiles")
//!     .with_description("Tiles processed")
//!     .with_unit(Unit::Count);
//!
//! assert_eq!(TILES.kind, MetricKind::Counter);
//! metrics::counter!(TILES.name).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// Counter, gauge or histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// A metric name plus what exporters need to know about it.
///
/// ```rust
/// use topo_metrics::Metric;
/// use metrics::Unit;
///
/// const PIXELS: Metric = Metric::counter("topo.render.pixels")
///     .with_description("Pixels rendered")
///     .with_unit(Unit::Count)
///     .with_labels(&["gradient_type"]);
///
/// assert_eq!(PIXELS.name, "topo.render.pixels");
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    pub name: &'static str,
    pub kind: MetricKind,
    pub description: &'static str,
    pub unit: Option<Unit>,
    /// Label keys the recording sites attach.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn of_kind(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    pub const fn counter(name: &'static str) -> Self {
        Self::of_kind(name, MetricKind::Counter)
    }

    pub const fn gauge(name: &'static str) -> Self {
        Self::of_kind(name, MetricKind::Gauge)
    }

    pub const fn histogram(name: &'static str) -> Self {
        Self::of_kind(name, MetricKind::Histogram)
    }

    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Register the description (and unit) with the installed recorder.
    pub fn describe(&self) {
        let (name, text) = (self.name, self.description);
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => describe_counter!(name, unit, text),
            (MetricKind::Counter, None) => describe_counter!(name, text),
            (MetricKind::Gauge, Some(unit)) => describe_gauge!(name, unit, text),
            (MetricKind::Gauge, None) => describe_gauge!(name, text),
            (MetricKind::Histogram, Some(unit)) => describe_histogram!(name, unit, text),
            (MetricKind::Histogram, None) => describe_histogram!(name, text),
        }
    }
}

/// All metric definitions for the workspace.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Label Keys
    // ========================================================================

    /// Labels present on render metrics.
    pub const RENDER_LABELS: &[&str] = &["gradient", "gradient_type"];

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Completed terrain renders.
    ///
    /// Labels: gradient, gradient_type
    pub const RENDER_COUNT: Metric = Metric::counter("topo.render.renders")
        .with_description("Completed terrain renders")
        .with_unit(Unit::Count)
        .with_labels(RENDER_LABELS);

    /// Output pixels produced by terrain renders.
    ///
    /// Labels: gradient, gradient_type
    pub const RENDER_PIXELS: Metric = Metric::counter("topo.render.pixels")
        .with_description("Output pixels produced by terrain renders")
        .with_unit(Unit::Count)
        .with_labels(RENDER_LABELS);

    /// Wall-clock time of one terrain render.
    ///
    /// Labels: gradient, gradient_type
    pub const RENDER_TIME: Metric = Metric::histogram("topo.render.time_ms")
        .with_description("Wall-clock time of one terrain render in milliseconds")
        .with_unit(Unit::Milliseconds)
        .with_labels(RENDER_LABELS);

    /// Pixels darkened by cast shadows.
    pub const SHADOW_PIXELS: Metric = Metric::counter("topo.shadow.pixels_shadowed")
        .with_description("Pixels with non-zero cast shadow intensity")
        .with_unit(Unit::Count);

    // ========================================================================
    // Assembly
    // ========================================================================

    /// Tiles copied into an assembled raster.
    ///
    /// Labels: strategy
    pub const ASSEMBLY_TILES_PLACED: Metric = Metric::counter("topo.assembly.tiles_placed")
        .with_description("Tiles copied into an assembled raster")
        .with_unit(Unit::Count)
        .with_labels(&["strategy"]);

    /// Tiles skipped because they could not be read or placed.
    pub const ASSEMBLY_TILES_FAILED: Metric = Metric::counter("topo.assembly.tiles_failed")
        .with_description("Tiles skipped during assembly")
        .with_unit(Unit::Count);

    /// Chunks written by chunked assembly.
    pub const ASSEMBLY_CHUNKS: Metric = Metric::counter("topo.assembly.chunks")
        .with_description("Chunks written by chunked assembly")
        .with_unit(Unit::Count);

    // ========================================================================
    // Database
    // ========================================================================

    /// Tiles currently held in the database cache.
    pub const DATABASE_TILES_LOADED: Metric = Metric::gauge("topo.database.tiles_loaded")
        .with_description("Tiles currently held in the tile cache")
        .with_unit(Unit::Count);

    /// Every declared metric, for [`describe_metrics`](crate::describe_metrics).
    pub const ALL: &[&Metric] = &[
        // Rendering
        &RENDER_COUNT,
        &RENDER_PIXELS,
        &RENDER_TIME,
        &SHADOW_PIXELS,
        // Assembly
        &ASSEMBLY_TILES_PLACED,
        &ASSEMBLY_TILES_FAILED,
        &ASSEMBLY_CHUNKS,
        // Database
        &DATABASE_TILES_LOADED,
    ];
}

/// Labels identifying the gradient a render used.
///
/// ```rust
/// use topo_metrics::RenderLabels;
///
/// let labels = RenderLabels::new("Grayscale Elevation", "gradient");
/// assert_eq!(labels.to_labels().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct RenderLabels {
    /// Gradient name.
    pub gradient: String,
    /// Gradient type (`gradient`, `shaded_relief`, ...).
    pub gradient_type: String,
}

impl RenderLabels {
    pub fn new(gradient: impl Into<String>, gradient_type: impl Into<String>) -> Self {
        Self {
            gradient: gradient.into(),
            gradient_type: gradient_type.into(),
        }
    }

    /// `(key, value)` pairs for the `metrics` macros.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![
            ("gradient", self.gradient.clone()),
            ("gradient_type", self.gradient_type.clone()),
        ]
    }
}

/// Describes all metrics with the installed recorder. Call once at startup.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}
