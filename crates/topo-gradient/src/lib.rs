//! # topo-gradient
//!
//! Elevation color gradients: how an elevation value becomes a pixel color,
//! and how collections of gradients are stored and exchanged.
//!
//! ## Overview
//!
//! A [`Gradient`] places [`ColorStop`]s on a bar where position 0.0 is the
//! gradient's maximum elevation and 1.0 its minimum. Elevations between stops
//! are interpolated, stepped ([`Gradient::discrete`]) or banded (posterized
//! [`GradientType`]s). A gradient also carries the shading settings the
//! renderer uses: light direction, shading intensity, cast shadows and blend
//! strength.
//!
//! Gradients in percent units are stretched over the observed elevation range
//! of each render; gradients in meters use their own limits.
//!
//! [`GradientLibrary`] keeps an ordered, named collection in a JSON file and
//! seeds new files with four built-in gradients. QGIS style files can be
//! imported and exported through the [`qgis`] functions.
//!
//! ## Examples
//!
//! ### Coloring elevations
//!
//! ```
//! use topo_gradient::{ColorStop, Gradient, Rgba};
//!
//! let gradient = Gradient::new(
//!     "Sea to snow",
//!     0.0,
//!     4000.0,
//!     vec![
//!         ColorStop::new(0.0, Rgba::WHITE),
//!         ColorStop::new(1.0, Rgba::opaque(0, 64, 160)),
//!     ],
//! );
//! assert_eq!(gradient.color_at(4000.0), Rgba::WHITE);
//! assert_eq!(gradient.color_at(-10.0), Rgba::opaque(0, 64, 160));
//! ```
//!
//! ### Working with a library
//!
//! ```no_run
//! use topo_gradient::{GradientLibrary, HlsAdjustment};
//!
//! let mut library = GradientLibrary::load("gradients.json")?;
//! library.import_qgis("qgis_style.xml")?;
//!
//! let mut warmer = library.require("Desert Terrain")?.clone();
//! warmer.name = "Desert Terrain (warm)".into();
//! warmer.adjust_hls(HlsAdjustment::new(-10.0, 5.0, 10.0));
//! library.add(warmer)?;
//! # Ok::<(), topo_gradient::GradientError>(())
//! ```

mod color;
mod error;
mod gradient;
mod library;
pub mod qgis;

pub use color::{adjust_hls, hls_to_rgb, rgb_to_hls, ColorStop, HlsAdjustment, Rgba};
pub use error::GradientError;
pub use gradient::{ElevationUnits, Gradient, GradientType, DEFAULT_CREATED_BY};
pub use library::{default_gradients, GradientLibrary, DEFAULT_GRADIENTS_FILE};

/// Result type for gradient operations.
pub type Result<T> = std::result::Result<T, GradientError>;
