//! Image and elevation file output.

use crate::composite::flatten_on_white;
use crate::renderer::TerrainLayers;
use crate::{RenderError, Result};
use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use topo_dem::{write_bil, write_geotiff, ElevationGrid, GeoBounds};
use topo_gradient::{Gradient, Rgba};
use tracing::{debug, info};

/// JPEG quality used for every export.
pub const JPEG_QUALITY: u8 = 95;
/// Share of the legend width covered by stop ticks.
const TICK_FRACTION: f64 = 0.2;

/// Raster container chosen from the output extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    /// `.jpg`/`.jpeg` (any case) is JPEG; everything else is PNG.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()).as_deref() {
            Some("jpg" | "jpeg") => OutputFormat::Jpeg,
            _ => OutputFormat::Png,
        }
    }
}

/// Write an RGB image, embedding `dpi` in the JFIF header for JPEG output.
pub fn save_rgb(image: &RgbImage, path: &Path, dpi: Option<f64>) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    let (width, height) = image.dimensions();
    let format = OutputFormat::from_path(path);
    match format {
        OutputFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
            if let Some(dpi) = dpi {
                encoder.set_pixel_density(PixelDensity::dpi(dpi.round().clamp(1.0, u16::MAX as f64) as u16));
            }
            encoder.write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)?;
        }
        OutputFormat::Png => {
            PngEncoder::new(&mut out).write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)?;
        }
    }
    out.flush()?;
    debug!(path = %path.display(), ?format, width, height, "Saved image");
    Ok(())
}

/// Flatten a rendered image onto white and write it.
pub fn save_flattened(image: &RgbaImage, path: &Path, dpi: Option<f64>) -> Result<()> {
    save_rgb(&flatten_on_white(image), path, dpi)
}

/// Write each layer as `{base}_{layer}.png` in `dir`, keeping transparency.
///
/// Returns the written paths in layer order.
pub fn export_layers(dir: &Path, base: &str, layers: &TerrainLayers) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RenderError::MissingDirectory(dir.to_path_buf()));
    }
    let path_for = |layer: &str| dir.join(format!("{base}_{layer}.png"));
    let mut written = Vec::new();

    for (name, image) in [("elevation", &layers.elevation), ("gradient", &layers.gradient)] {
        let path = path_for(name);
        image.save(&path)?;
        written.push(path);
    }
    for (name, mask) in [("shading", &layers.shading), ("shadows", &layers.shadows)] {
        if let Some(mask) = mask {
            let path = path_for(name);
            mask.save(&path)?;
            written.push(path);
        }
    }
    let path = path_for("composite");
    layers.composite.save(&path)?;
    written.push(path);

    info!(dir = %dir.display(), count = written.len(), "Exported layers");
    Ok(written)
}

/// Write elevation samples: BIL with sidecars for `.dem`/`.bil`, GeoTIFF
/// otherwise. Returns the data file written.
pub fn export_elevation(grid: &ElevationGrid, bounds: &GeoBounds, path: &Path) -> Result<PathBuf> {
    let ext = path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("dem" | "bil") => {
            write_bil(path, grid, bounds)?;
        }
        _ => write_geotiff(path, grid, bounds)?,
    }
    let written = path.to_path_buf();
    info!(path = %written.display(), width = grid.width(), height = grid.height(), "Exported elevation data");
    Ok(written)
}

/// Vertical color bar for `gradient`, top = `max_elevation`.
///
/// Rows sample the gradient at evenly spaced positions. The right part of
/// each row at a stop position is drawn black as a tick. Transparent colors
/// are flattened onto white.
pub fn render_legend(gradient: &Gradient, width: u32, height: u32) -> Result<RgbImage> {
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidImageSize { width, height });
    }
    let last_row = (height - 1).max(1) as f64;
    let tick_start = width - ((width as f64 * TICK_FRACTION).round() as u32).min(width);
    let tick_rows: Vec<u32> = gradient
        .color_stops
        .iter()
        .map(|s| (s.position.clamp(0.0, 1.0) * (height - 1) as f64).round() as u32)
        .collect();

    let mut legend = RgbaImage::new(width, height);
    for y in 0..height {
        let position = y as f64 / last_row;
        let color = gradient.color_at(gradient.elevation_at(position));
        let is_tick = tick_rows.contains(&y);
        for x in 0..width {
            let px = if is_tick && x >= tick_start { Rgba::BLACK } else { color };
            legend.put_pixel(x, y, image::Rgba(px.to_array()));
        }
    }
    Ok(flatten_on_white(&legend))
}

/// Render a legend and write it as PNG.
pub fn save_legend(gradient: &Gradient, width: u32, height: u32, path: &Path) -> Result<()> {
    let legend = render_legend(gradient, width, height)?;
    save_rgb(&legend, path, None)?;
    info!(gradient = %gradient.name, path = %path.display(), "Wrote legend");
    Ok(())
}
