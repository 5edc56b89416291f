//! # topo-render
//!
//! Turns elevation grids into images.
//!
//! ## Pipeline
//!
//! A render builds up to four layers and composites them:
//!
//! 1. **Gradient**: each elevation colored by a [`topo_gradient::Gradient`],
//!    optionally stretched over an override elevation range.
//! 2. **Shading**: directional hillshade ([`hillshade`]), blended onto the
//!    gradient in hard-light mode at the gradient's blending strength.
//! 3. **Shadows**: cast shadows from height propagation along Bresenham lines
//!    ([`cast_shadows`]), darkening pixels toward the shadow color.
//! 4. **Composite**: the result, flattened onto white when saved.
//!
//! Shaded-relief gradients skip the color layer and render the hillshade
//! as gray.
//!
//! Exports are checked against a pixel limit and a memory budget first, see
//! [`check_render_memory`]. [`PrintSize`] converts the output pixel size into
//! physical print dimensions.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use topo_dem::DemSource;
//! use topo_gradient::GradientLibrary;
//! use topo_render::{ExportOptions, TerrainRenderer};
//!
//! let library = GradientLibrary::load("gradients.json")?;
//! let gradient = library.require("Classic Elevation")?;
//! let grid = DemSource::open("gt30w120n40.dem")?.read(None)?;
//!
//! let mut renderer = TerrainRenderer::new().with_memory_budget_mb(4096);
//! renderer.export_terrain(
//!     &grid,
//!     gradient,
//!     Path::new("sierra.jpg"),
//!     ExportOptions::default().with_scale(0.5).with_dpi(300.0),
//! )?;
//! println!("{:?}", renderer.stats());
//! # Ok::<(), topo_render::RenderError>(())
//! ```

mod composite;
mod error;
mod export;
mod hillshade;
mod layers;
mod memory;
mod print_size;
mod renderer;
mod shadows;

pub use composite::{apply_shadows, composite, composite_layers, flatten_on_white, hard_light};
pub use error::RenderError;
pub use export::{
    export_elevation, export_layers, render_legend, save_flattened, save_legend, save_rgb, OutputFormat, JPEG_QUALITY,
};
pub use hillshade::{hillshade, terrain_relief, ScalarMap, FALLBACK_RELIEF, MIN_RELIEF, NEUTRAL};
pub use layers::{elevation_layer, gradient_layer, shading_layer, shadow_layer};
pub use memory::{bytes_per_pixel, check_render_memory, estimate_render_gb, MAX_PIXELS, MEMORY_HEADROOM};
pub use print_size::{format_value, PrintSize, PrintUnits, SizeLock, CM_PER_INCH, PICAS_PER_INCH, POINTS_PER_INCH};
pub use renderer::{
    crop_to_bounds, default_render_path, selection_step, ExportOptions, RenderStats, TerrainLayers, TerrainRenderer,
};
pub use shadows::{bresenham_vector, cast_shadows, edge_starts, BresenhamLine};

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;
