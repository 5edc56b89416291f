//! Directional hillshading.

use image::GrayImage;
use rayon::prelude::*;
use topo_dem::ElevationGrid;
use tracing::debug;

/// Smallest relief used to scale elevation differences.
pub const MIN_RELIEF: f64 = 50.0;
/// Relief used when the grid has no valid samples.
pub const FALLBACK_RELIEF: f64 = 100.0;
/// Brightness of flat or unshadeable pixels.
pub const NEUTRAL: f32 = 0.5;

const CONTRAST: f64 = 1.2;

/// A per-pixel value in `0.0..=1.0`, such as hillshade brightness or shadow
/// strength.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarMap {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl ScalarMap {
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        (x < self.width && y < self.height).then(|| self.data[y * self.width + x])
    }

    /// Number of pixels with a value above zero.
    pub fn nonzero_count(&self) -> usize {
        self.data.iter().filter(|v| **v > 0.0).count()
    }

    /// Quantize to 8-bit gray (`value * 255`, truncated).
    pub fn to_gray(&self) -> GrayImage {
        let pixels: Vec<u8> = self.data.iter().map(|v| (v.clamp(0.0, 1.0) * 255.0) as u8).collect();
        GrayImage::from_raw(self.width as u32, self.height as u32, pixels)
            .unwrap_or_else(|| GrayImage::new(self.width as u32, self.height as u32))
    }
}

/// Relief used to normalize elevation differences: the explicit range when
/// both limits are given, otherwise the data range.
pub fn terrain_relief(grid: &ElevationGrid, min: Option<f64>, max: Option<f64>) -> f64 {
    match (min, max) {
        (Some(lo), Some(hi)) => (hi - lo).max(MIN_RELIEF),
        _ => match grid.min_max() {
            Some((lo, hi)) => ((hi - lo) as f64).max(MIN_RELIEF),
            None => FALLBACK_RELIEF,
        },
    }
}

/// Shade each pixel by comparing it with the terrain one pixel toward the
/// light.
///
/// `light_direction` is an azimuth in degrees (0 = north, clockwise) and
/// `intensity` a percentage. The neighbor is sampled bilinearly; pixels
/// whose neighbor falls off the grid or touches no-data stay at 0.5.
pub fn hillshade(
    grid: &ElevationGrid,
    light_direction: f64,
    intensity: f64,
    min: Option<f64>,
    max: Option<f64>,
) -> ScalarMap {
    let (width, height) = grid.dimensions();
    let mut shade = ScalarMap::filled(width, height, NEUTRAL);
    if width == 0 || height == 0 {
        return shade;
    }

    let relief = terrain_relief(grid, min, max);
    let rad = light_direction.to_radians();
    let (off_x, off_y) = (-rad.sin(), rad.cos());
    let scale = intensity / 100.0 * CONTRAST / relief;
    debug!(relief, light_direction, intensity, "Computing hillshade");

    let data = grid.data();
    let sample = |x: usize, y: usize| data[y * width + x] as f64;

    shade.data_mut().par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        for (x, out) in row.iter_mut().enumerate() {
            let current = sample(x, y);
            if current.is_nan() {
                continue;
            }
            let nx = x as f64 + off_x;
            let ny = y as f64 + off_y;
            if nx < 0.0 || nx >= (width - 1) as f64 || ny < 0.0 || ny >= (height - 1) as f64 {
                continue;
            }
            let (x0, y0) = (nx as usize, ny as usize);
            let (q00, q10, q01, q11) = (sample(x0, y0), sample(x0 + 1, y0), sample(x0, y0 + 1), sample(x0 + 1, y0 + 1));
            if q00.is_nan() || q10.is_nan() || q01.is_nan() || q11.is_nan() {
                continue;
            }
            let wx = nx - x0 as f64;
            let wy = ny - y0 as f64;
            let neighbor = q00 * (1.0 - wx) * (1.0 - wy) + q10 * wx * (1.0 - wy) + q01 * (1.0 - wx) * wy + q11 * wx * wy;
            *out = (NEUTRAL as f64 + (current - neighbor) * scale).clamp(0.0, 1.0) as f32;
        }
    });
    shade
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Elevation rising 10 m per column toward the east.
    fn east_ramp(w: usize, h: usize) -> ElevationGrid {
        let data = (0..h).flat_map(|_| (0..w).map(|x| x as f32 * 10.0)).collect();
        ElevationGrid::new(w, h, data).unwrap()
    }

    #[test]
    fn test_flat_terrain_is_neutral() {
        let grid = ElevationGrid::filled(5, 5, 100.0);
        let shade = hillshade(&grid, 315.0, 50.0, None, None);
        assert!(shade.data().iter().all(|v| *v == NEUTRAL));
    }

    #[test]
    fn test_shade_follows_neighbor_difference() {
        let grid = east_ramp(6, 6);
        // Light from the east samples one column west, 10 m lower
        let east = hillshade(&grid, 90.0, 100.0, Some(0.0), Some(100.0));
        // diff = +10, relief = 100 -> 0.5 + 0.1 * 1.2
        assert_relative_eq!(east.get(2, 2).unwrap(), 0.62, epsilon = 1e-5);

        let west = hillshade(&grid, 270.0, 100.0, Some(0.0), Some(100.0));
        assert_relative_eq!(west.get(2, 2).unwrap(), 0.38, epsilon = 1e-5);
    }

    #[test]
    fn test_edges_and_nodata_stay_neutral() {
        let mut grid = east_ramp(6, 6);
        let shade = hillshade(&grid, 270.0, 100.0, None, None);
        // Neighbor column 5 is the last column, which is out of range
        assert_eq!(shade.get(4, 2), Some(NEUTRAL));
        assert_eq!(hillshade(&grid, 90.0, 100.0, None, None).get(0, 2), Some(NEUTRAL));

        grid.set(3, 2, f32::NAN);
        let shade = hillshade(&grid, 270.0, 100.0, None, None);
        assert_eq!(shade.get(2, 2), Some(NEUTRAL));
        assert_eq!(shade.get(3, 2), Some(NEUTRAL));
    }

    #[test]
    fn test_relief_floor_and_fallback() {
        let grid = ElevationGrid::filled(3, 3, 5.0);
        assert_eq!(terrain_relief(&grid, None, None), MIN_RELIEF);
        assert_eq!(terrain_relief(&grid, Some(0.0), Some(400.0)), 400.0);
        assert_eq!(terrain_relief(&ElevationGrid::nodata(2, 2), None, None), FALLBACK_RELIEF);
    }

    #[test]
    fn test_to_gray_truncates() {
        let map = ScalarMap::filled(2, 1, 0.5);
        assert_eq!(map.to_gray().get_pixel(0, 0).0, [127]);
    }
}
