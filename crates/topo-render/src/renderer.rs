//! Terrain rendering pipeline.

use crate::composite::{apply_shadows, composite_layers, gray_to_rgba};
use crate::export::save_flattened;
use crate::hillshade::hillshade;
use crate::layers::{elevation_layer, gradient_layer, shading_layer, shadow_layer};
use crate::memory::check_render_memory;
use crate::shadows::cast_shadows;
use crate::{RenderError, Result};
use image::{GrayImage, RgbaImage};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use topo_dem::{nan_aware_resize, DemSource, ElevationGrid, GeoBounds, DEFAULT_MEMORY_BUDGET_MB};
use topo_gradient::{Gradient, GradientType, Rgba};
use topo_metrics::{metric_defs, RenderLabels};
use tracing::{debug, info};

/// Gray painted under no-data in shaded-relief renders.
const RELIEF_NODATA: [u8; 4] = [128, 128, 128, 255];

/// Slack on the ±180 edges when deciding whether data covers the whole globe.
const GLOBE_TOLERANCE_DEG: f64 = 1e-3;

/// Counters updated by every render.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderStats {
    pub last_render_time: Duration,
    pub last_pixels_processed: usize,
    pub total_renders: u64,
}

/// Every layer of one render, for layered export.
#[derive(Debug, Clone)]
pub struct TerrainLayers {
    /// Grayscale elevation (black = min, white = max).
    pub elevation: RgbaImage,
    /// Gradient colors without shading.
    pub gradient: RgbaImage,
    /// Hillshade, for gradient types that shade.
    pub shading: Option<GrayImage>,
    /// Shadow mask, when the gradient casts shadows.
    pub shadows: Option<GrayImage>,
    /// Final composited image.
    pub composite: RgbaImage,
}

/// Options for [`TerrainRenderer::export_terrain`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportOptions {
    /// Output size relative to the grid (1.0 = 100%).
    pub scale: f64,
    /// Resolution recorded in JPEG output.
    pub dpi: Option<f64>,
    pub min_elevation: Option<f64>,
    pub max_elevation: Option<f64>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            dpi: None,
            min_elevation: None,
            max_elevation: None,
        }
    }
}

impl ExportOptions {
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_dpi(mut self, dpi: f64) -> Self {
        self.dpi = Some(dpi);
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_elevation = min;
        self.max_elevation = max;
        self
    }
}

/// Renders elevation grids to images with a gradient, hillshade and shadows.
#[derive(Debug, Clone)]
pub struct TerrainRenderer {
    memory_budget_mb: u64,
    stats: RenderStats,
}

impl Default for TerrainRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TerrainRenderer {
    pub fn new() -> Self {
        Self {
            memory_budget_mb: DEFAULT_MEMORY_BUDGET_MB,
            stats: RenderStats::default(),
        }
    }

    /// Memory available to a single render, used by [`Self::export_terrain`].
    pub fn with_memory_budget_mb(mut self, mb: u64) -> Self {
        self.memory_budget_mb = mb;
        self
    }

    pub fn memory_budget_mb(&self) -> u64 {
        self.memory_budget_mb
    }

    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    /// Render a grid to RGBA.
    ///
    /// `min`/`max` stretch the gradient over a different elevation range.
    /// `no_data` overrides the gradient's no-data color.
    pub fn render_terrain(
        &mut self,
        grid: &ElevationGrid,
        gradient: &Gradient,
        min: Option<f64>,
        max: Option<f64>,
        no_data: Option<Rgba>,
    ) -> Result<RgbaImage> {
        if grid.is_empty() {
            return Err(RenderError::EmptyGrid);
        }
        let start = Instant::now();
        let (width, height) = grid.dimensions();
        debug!(
            width,
            height,
            valid = grid.valid_count(),
            gradient = %gradient.name,
            gradient_type = %gradient.gradient_type,
            "Rendering terrain"
        );

        let image = if gradient.gradient_type == GradientType::ShadedRelief {
            self.shaded_relief(grid, gradient)?
        } else {
            let base = gradient_layer(grid, gradient, min, max, no_data);
            let shades = gradient.gradient_type.has_shading();
            let shading = shades.then(|| {
                let shade = hillshade(
                    grid,
                    gradient.light_direction as f64,
                    gradient.shading_intensity as f64,
                    min,
                    max,
                );
                shading_layer(&shade)
            });
            let shadows = if shades && gradient.cast_shadows {
                Some(self.shadow_mask(grid, gradient)?)
            } else {
                None
            };
            composite_layers(&base, shading.as_ref(), shadows.as_ref(), gradient)
        };

        self.record(gradient, width * height, start.elapsed());
        Ok(image)
    }

    fn shaded_relief(&self, grid: &ElevationGrid, gradient: &Gradient) -> Result<RgbaImage> {
        let shade = hillshade(
            grid,
            gradient.light_direction as f64,
            gradient.shading_intensity as f64,
            None,
            None,
        );
        let mut image = gray_to_rgba(&shading_layer(&shade));
        for (px, e) in image.pixels_mut().zip(grid.data()) {
            if e.is_nan() {
                px.0 = RELIEF_NODATA;
            }
        }
        // Shadows fall on no-data areas too
        if gradient.cast_shadows {
            let mask = self.shadow_mask(grid, gradient)?;
            apply_shadows(&mut image, &mask, gradient.shadow_color.unwrap_or(Rgba::BLACK));
        }
        Ok(image)
    }

    fn shadow_mask(&self, grid: &ElevationGrid, gradient: &Gradient) -> Result<GrayImage> {
        let shadow = cast_shadows(
            grid,
            gradient.light_direction as f64,
            gradient.shadow_drop_distance,
            gradient.shadow_soft_edge,
        )?;
        Ok(shadow_layer(&shadow))
    }

    fn record(&mut self, gradient: &Gradient, pixels: usize, elapsed: Duration) {
        self.stats.last_render_time = elapsed;
        self.stats.last_pixels_processed = pixels;
        self.stats.total_renders += 1;

        let labels = RenderLabels::new(gradient.name.clone(), gradient.gradient_type.as_str()).to_labels();
        metrics::counter!(metric_defs::RENDER_COUNT.name, &labels).increment(1);
        metrics::counter!(metric_defs::RENDER_PIXELS.name, &labels).increment(pixels as u64);
        metrics::histogram!(metric_defs::RENDER_TIME.name, &labels).record(elapsed.as_secs_f64() * 1000.0);

        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 { pixels as f64 / secs } else { 0.0 };
        info!(pixels, elapsed_ms = elapsed.as_millis() as u64, pixels_per_sec = rate as u64, "Terrain rendered");
    }

    /// Render every layer separately plus their composite.
    ///
    /// Shading is computed for every shading gradient type and shadows
    /// whenever the gradient casts them.
    pub fn render_layers(
        &mut self,
        grid: &ElevationGrid,
        gradient: &Gradient,
        min: Option<f64>,
        max: Option<f64>,
        no_data: Option<Rgba>,
    ) -> Result<TerrainLayers> {
        if grid.is_empty() {
            return Err(RenderError::EmptyGrid);
        }
        let start = Instant::now();
        let elevation = elevation_layer(grid, min, max, no_data);
        let base = gradient_layer(grid, gradient, min, max, no_data);
        let shading = gradient.gradient_type.has_shading().then(|| {
            shading_layer(&hillshade(
                grid,
                gradient.light_direction as f64,
                gradient.shading_intensity as f64,
                None,
                None,
            ))
        });
        let shadows = if gradient.cast_shadows {
            Some(self.shadow_mask(grid, gradient)?)
        } else {
            None
        };
        let composite = composite_layers(&base, shading.as_ref(), shadows.as_ref(), gradient);
        self.record(gradient, grid.len(), start.elapsed());

        Ok(TerrainLayers {
            elevation,
            gradient: base,
            shading,
            shadows,
            composite,
        })
    }

    /// Read a DEM, render it and save the image.
    ///
    /// Missing limits are taken from the data. Without `output` the image is
    /// written to `{stem}_{gradient}[_subsample{N}]_terrain.png` in the
    /// working directory.
    pub fn render_dem_file(
        &mut self,
        path: &Path,
        gradient: &Gradient,
        output: Option<&Path>,
        subsample: Option<usize>,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<PathBuf> {
        let source = DemSource::open(path)?;
        let grid = source.read(subsample)?;

        let (min, max) = match (min, max, grid.min_max()) {
            (Some(lo), Some(hi), _) => (Some(lo), Some(hi)),
            (lo, hi, Some((data_lo, data_hi))) => {
                info!(min = data_lo, max = data_hi, "Auto-detected elevation range");
                (lo.or(Some(data_lo as f64)), hi.or(Some(data_hi as f64)))
            }
            (lo, hi, None) => (lo, hi),
        };

        let image = self.render_terrain(&grid, gradient, min, max, None)?;
        let out = match output {
            Some(p) => p.to_path_buf(),
            None => default_render_path(path, &gradient.name, subsample),
        };
        save_flattened(&image, &out, None)?;
        info!(path = %out.display(), "Terrain image saved");
        Ok(out)
    }

    /// Render a grid subsampled to roughly `max_pixels`.
    pub fn render_selection(
        &mut self,
        grid: &ElevationGrid,
        gradient: &Gradient,
        max_pixels: usize,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<RgbaImage> {
        let step = selection_step(grid.len(), max_pixels);
        debug!(step, "Selection subsample");
        if step > 1 {
            self.render_terrain(&grid.subsample(step), gradient, min, max, None)
        } else {
            self.render_terrain(grid, gradient, min, max, None)
        }
    }

    /// Scale, check memory, render and save a grid.
    pub fn export_terrain(
        &mut self,
        grid: &ElevationGrid,
        gradient: &Gradient,
        path: &Path,
        options: ExportOptions,
    ) -> Result<()> {
        let scale = options.scale;
        if !(scale > 0.0) {
            return Err(RenderError::InvalidScale(scale));
        }
        let scaled;
        let grid = if scale != 1.0 {
            let (w, h) = grid.dimensions();
            let (new_w, new_h) = ((w as f64 * scale) as usize, (h as f64 * scale) as usize);
            if new_w == 0 || new_h == 0 {
                return Err(RenderError::InvalidScale(scale));
            }
            info!(from = ?(w, h), to = ?(new_w, new_h), "Scaling elevation data");
            scaled = nan_aware_resize(grid, new_w, new_h);
            &scaled
        } else {
            grid
        };

        check_render_memory(grid.width(), grid.height(), gradient, self.memory_budget_mb)?;
        let image = self.render_terrain(grid, gradient, options.min_elevation, options.max_elevation, None)?;
        save_flattened(&image, path, options.dpi)?;
        info!(path = %path.display(), width = image.width(), height = image.height(), "Export complete");
        Ok(())
    }
}

/// Subsample step that brings `total` pixels near `max_pixels`.
pub fn selection_step(total: usize, max_pixels: usize) -> usize {
    if max_pixels == 0 {
        return 1;
    }
    ((total as f64 / max_pixels as f64).sqrt() as usize).max(1)
}

/// `{stem}_{gradient with spaces as _}[_subsample{N}]_terrain.png`, using
/// the directory name when `dem_path` is a directory.
pub fn default_render_path(dem_path: &Path, gradient_name: &str, subsample: Option<usize>) -> PathBuf {
    let base = if dem_path.is_dir() {
        dem_path.file_name()
    } else {
        dem_path.file_stem()
    }
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_else(|| "terrain".to_string());
    let suffix = match subsample {
        Some(n) if n > 0 => format!("_subsample{n}"),
        _ => String::new(),
    };
    PathBuf::from(format!("{base}_{}{suffix}_terrain.png", gradient_name.replace(' ', "_")))
}

/// Cut the part of `grid` (covering `data_bounds`) inside `selection`.
///
/// Pixel edges are truncated toward zero and clamped so at least one pixel
/// remains. A wrapped selection (west > east) is read past 180 when the data
/// extends that far, or joined from both ends of a full-globe grid.
pub fn crop_to_bounds(grid: &ElevationGrid, data_bounds: &GeoBounds, selection: &GeoBounds) -> Result<ElevationGrid> {
    if selection.west > selection.east {
        return crop_wrapped(grid, data_bounds, selection);
    }
    let (width, height) = grid.dimensions();
    let (w, h) = (width as i64, height as i64);
    let d = data_bounds;
    let span_x = d.east - d.west;
    let span_y = d.north - d.south;

    let x_min = ((selection.west - d.west) / span_x * width as f64) as i64;
    let x_max = ((selection.east - d.west) / span_x * width as f64) as i64;
    let y_min = ((d.north - selection.north) / span_y * height as f64) as i64;
    let y_max = ((d.north - selection.south) / span_y * height as f64) as i64;

    let x0 = x_min.min(w - 1).max(0);
    let x1 = x_max.min(w).max(x0 + 1);
    let y0 = y_min.min(h - 1).max(0);
    let y1 = y_max.min(h).max(y0 + 1);

    if width == 0 || height == 0 || x1 <= x0 || y1 <= y0 {
        return Err(RenderError::EmptyCrop { x0, x1, y0, y1 });
    }
    debug!(x0, x1, y0, y1, "Cropping to selection");
    Ok(grid.crop(x0 as usize, y0 as usize, x1 as usize, y1 as usize))
}

fn crop_wrapped(grid: &ElevationGrid, data_bounds: &GeoBounds, selection: &GeoBounds) -> Result<ElevationGrid> {
    let d = data_bounds;
    let unwrapped = selection.unwrapped();
    if d.west <= unwrapped.west && d.east >= unwrapped.east {
        return crop_to_bounds(grid, d, &unwrapped);
    }
    let global = d.west <= -180.0 + GLOBE_TOLERANCE_DEG && d.east >= 180.0 - GLOBE_TOLERANCE_DEG;
    if !global {
        return Err(RenderError::WrappedSelection {
            west: selection.west,
            east: selection.east,
        });
    }

    let (north, south) = (selection.north, selection.south);
    let east_part = crop_to_bounds(grid, d, &GeoBounds::new(selection.west, north, d.east, south))?;
    let west_part = crop_to_bounds(grid, d, &GeoBounds::new(d.west, north, selection.east, south))?;
    let mut joined = ElevationGrid::nodata(east_part.width() + west_part.width(), east_part.height());
    joined.place(&east_part, 0, 0);
    joined.place(&west_part, east_part.width(), 0);
    debug!(
        east_cols = east_part.width(),
        west_cols = west_part.width(),
        "Joined selection across the antimeridian"
    );
    Ok(joined)
}
