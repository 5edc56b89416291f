//! Per-pixel layer generation: normalized elevation, gradient colors,
//! hillshade and shadow masks.

use crate::hillshade::ScalarMap;
use image::{GrayImage, RgbaImage};
use rayon::prelude::*;
use topo_dem::ElevationGrid;
use topo_gradient::{Gradient, Rgba};
use tracing::debug;

/// Gray level used when the elevation range is empty.
const FLAT_GRAY: u8 = 128;

/// Grayscale elevation: black at `min`, white at `max`.
///
/// Missing limits come from the data. No-data pixels are transparent unless
/// `no_data` is given.
pub fn elevation_layer(grid: &ElevationGrid, min: Option<f64>, max: Option<f64>, no_data: Option<Rgba>) -> RgbaImage {
    let (width, height) = grid.dimensions();
    let Some((data_min, data_max)) = grid.min_max() else {
        return RgbaImage::new(width as u32, height as u32);
    };
    let lo = min.unwrap_or(data_min as f64);
    let hi = max.unwrap_or(data_max as f64);
    let range = hi - lo;

    let mut image = RgbaImage::new(width as u32, height as u32);
    for (px, &e) in image.chunks_exact_mut(4).zip(grid.data()) {
        if e.is_nan() {
            let fill = match no_data {
                Some(color) => color.to_array(),
                None => {
                    let gray = if range == 0.0 { FLAT_GRAY } else { 0 };
                    [gray, gray, gray, 0]
                }
            };
            px.copy_from_slice(&fill);
            continue;
        }
        let v = if range == 0.0 {
            FLAT_GRAY
        } else {
            (255.0 * (e as f64 - lo) / range).clamp(0.0, 255.0) as u8
        };
        px.copy_from_slice(&[v, v, v, 255]);
    }
    image
}

/// Gradient colors for every pixel.
///
/// Elevations are normalized over the override range (falling back to the
/// gradient's own limits) and mapped onto the gradient. Posterized gradients
/// with an above color are looked up with the raw elevation so values above
/// the top stop get that color.
pub fn gradient_layer(
    grid: &ElevationGrid,
    gradient: &Gradient,
    min: Option<f64>,
    max: Option<f64>,
    no_data: Option<Rgba>,
) -> RgbaImage {
    let (width, height) = grid.dimensions();
    let no_data = no_data.or(gradient.no_data_color).unwrap_or(Rgba::TRANSPARENT).to_array();
    let lo = min.unwrap_or(gradient.min_elevation);
    let hi = max.unwrap_or(gradient.max_elevation);
    let range = hi - lo;
    let raw_lookup = gradient.gradient_type.is_posterized() && gradient.below_gradient_color.is_some();
    let span = gradient.max_elevation - gradient.min_elevation;
    debug!(gradient = %gradient.name, lo, hi, raw_lookup, "Coloring gradient layer");

    let mut image = RgbaImage::new(width as u32, height as u32);
    if width == 0 {
        return image;
    }
    image
        .par_chunks_mut(width * 4)
        .zip(grid.data().par_chunks(width))
        .for_each(|(out, row)| {
            for (px, &e) in out.chunks_exact_mut(4).zip(row) {
                if e.is_nan() {
                    px.copy_from_slice(&no_data);
                    continue;
                }
                let e = e as f64;
                let color = if raw_lookup {
                    gradient.color_at(e)
                } else {
                    let norm = if range > 0.0 { ((e - lo) / range).clamp(0.0, 1.0) } else { 0.0 };
                    gradient.color_at(gradient.min_elevation + norm * span)
                };
                px.copy_from_slice(&color.to_array());
            }
        });
    image
}

/// Hillshade brightness as 8-bit gray.
pub fn shading_layer(shade: &ScalarMap) -> GrayImage {
    shade.to_gray()
}

/// Shadow strength as an 8-bit mask (255 = full shadow).
pub fn shadow_layer(shadow: &ScalarMap) -> GrayImage {
    shadow.to_gray()
}
