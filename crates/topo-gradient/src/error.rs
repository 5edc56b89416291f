//! Error types for the gradient crate.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when loading, saving, or exchanging gradients.
#[derive(Debug, Error)]
pub enum GradientError {
    /// I/O error reading or writing a gradient file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error for the gradient library.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed QGIS XML.
    #[error("XML read error: {0}")]
    XmlRead(#[from] xml::reader::Error),

    /// Failure emitting QGIS XML.
    #[error("XML write error: {0}")]
    XmlWrite(#[from] xml::writer::Error),

    /// The gradient file has neither the array nor the keyed layout.
    #[error("Unrecognized gradient file layout in {0}")]
    UnrecognizedLayout(PathBuf),

    /// No gradient with this name in the library.
    #[error("Gradient not found: {0}")]
    NotFound(String),

    /// A reorder request that does not name exactly the gradients in the library.
    #[error("Order list doesn't match current gradients (expected {expected}, got {got})")]
    ReorderMismatch {
        /// Number of gradients in the library.
        expected: usize,
        /// Number of names supplied.
        got: usize,
    },

    /// A color stop index outside the gradient.
    #[error("Color stop {index} out of range ({len} stops)")]
    StopOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of stops.
        len: usize,
    },
}
