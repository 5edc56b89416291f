//! Cast shadows by height propagation along Bresenham lines.
//!
//! For a light azimuth, every pixel on the edges the light enters from
//! starts a Bresenham line across the grid. Walking the line, a running
//! shadow height drops by `drop_distance` per pixel; pixels below it are in
//! shadow, with intensity growing with the height difference.

use crate::hillshade::ScalarMap;
use crate::{RenderError, Result};
use topo_dem::ElevationGrid;
use topo_metrics::metric_defs;
use tracing::debug;

/// Length of the integer direction vector.
const VECTOR_LENGTH: f64 = 100.0;
/// Component magnitude above which an edge emits lines.
const EDGE_THRESHOLD: f64 = 0.1;

fn direction_components(direction: f64) -> (f64, f64) {
    let math = (90.0 - direction).rem_euclid(360.0).to_radians();
    (math.cos(), -math.sin())
}

/// Integer step vector for an azimuth (0 = north, clockwise), with image y
/// pointing down.
pub fn bresenham_vector(direction: f64) -> (i64, i64) {
    let (fx, fy) = direction_components(direction);
    let dx = (fx * VECTOR_LENGTH).round() as i64;
    let dy = (fy * VECTOR_LENGTH).round() as i64;
    if dx == 0 && dy == 0 {
        (1, 0)
    } else {
        (dx, dy)
    }
}

/// Edge pixels where lines for `direction` begin.
pub fn edge_starts(direction: f64, width: usize, height: usize) -> Vec<(i64, i64)> {
    let (fx, fy) = direction_components(direction);
    let (w, h) = (width as i64, height as i64);
    let mut starts = Vec::new();
    if fx < -EDGE_THRESHOLD {
        starts.extend((0..h).map(|y| (w - 1, y)));
    }
    if fx > EDGE_THRESHOLD {
        starts.extend((0..h).map(|y| (0, y)));
    }
    if fy > EDGE_THRESHOLD {
        starts.extend((0..w).map(|x| (x, 0)));
    }
    if fy < -EDGE_THRESHOLD {
        starts.extend((0..w).map(|x| (x, h - 1)));
    }
    starts
}

/// Pixels from `start` to `end` inclusive.
#[derive(Debug, Clone)]
pub struct BresenhamLine {
    x: i64,
    y: i64,
    end: (i64, i64),
    dx: i64,
    dy: i64,
    step_x: i64,
    step_y: i64,
    error: i64,
    done: bool,
}

impl BresenhamLine {
    pub fn new(start: (i64, i64), end: (i64, i64)) -> Self {
        let dx = (end.0 - start.0).abs();
        let dy = (end.1 - start.1).abs();
        Self {
            x: start.0,
            y: start.1,
            end,
            dx,
            dy,
            step_x: if start.0 < end.0 { 1 } else { -1 },
            step_y: if start.1 < end.1 { 1 } else { -1 },
            error: dx - dy,
            done: false,
        }
    }
}

impl Iterator for BresenhamLine {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let point = (self.x, self.y);
        if point == self.end {
            self.done = true;
            return Some(point);
        }
        let e2 = 2 * self.error;
        if e2 > -self.dy {
            self.error -= self.dy;
            self.x += self.step_x;
        }
        if e2 < self.dx {
            self.error += self.dx;
            self.y += self.step_y;
        }
        Some(point)
    }
}

/// Shadow strength per pixel, 0 (lit) to 1 (full shadow).
///
/// No-data counts as elevation 0. `soft_edge` spreads the shadow boundary
/// over that many drop distances; 0 gives hard shadows.
pub fn cast_shadows(grid: &ElevationGrid, light_direction: f64, drop_distance: f64, soft_edge: i32) -> Result<ScalarMap> {
    if drop_distance <= 0.0 || drop_distance.is_nan() {
        return Err(RenderError::InvalidDropDistance(drop_distance));
    }
    let (width, height) = grid.dimensions();
    let mut shadow = ScalarMap::filled(width, height, 0.0);
    if width == 0 || height == 0 {
        return Ok(shadow);
    }

    let direction = light_direction.rem_euclid(360.0);
    let (dx, dy) = bresenham_vector(direction);
    let gray_step = if soft_edge > 0 { 1.0 / soft_edge as f64 } else { 1.0 };
    let extent = 2 * width.max(height) as i64;
    let span = dx.abs().max(dy.abs()).max(1);
    let starts = edge_starts(direction, width, height);
    debug!(direction, dx, dy, starts = starts.len(), drop_distance, "Casting shadows");

    let elevation = |x: usize, y: usize| {
        let v = grid.data()[y * width + x] as f64;
        if v.is_nan() {
            0.0
        } else {
            v
        }
    };
    let out = shadow.data_mut();

    for start in starts {
        let target = (
            start.0 + (dx * extent).div_euclid(span),
            start.1 + (dy * extent).div_euclid(span),
        );
        let mut shadow_height = f64::NEG_INFINITY;
        for (x, y) in BresenhamLine::new(start, target) {
            if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                // Lines start inside the grid and cannot re-enter once out
                break;
            }
            let (x, y) = (x as usize, y as usize);
            let current = elevation(x, y);
            shadow_height = shadow_height.max(current - drop_distance);
            if shadow_height > current {
                let intensity = ((shadow_height - current) * gray_step / drop_distance).min(1.0) as f32;
                let cell = &mut out[y * width + x];
                *cell = cell.max(intensity);
                shadow_height = (shadow_height - drop_distance).max(current - drop_distance);
            } else {
                shadow_height = current - drop_distance;
            }
        }
    }

    let shadowed = shadow.nonzero_count();
    metrics::counter!(metric_defs::SHADOW_PIXELS.name).increment(shadowed as u64);
    debug!(shadowed, "Shadows cast");
    Ok(shadow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spike() -> ElevationGrid {
        let mut grid = ElevationGrid::filled(16, 3, 0.0);
        grid.set(2, 1, 10.0);
        grid
    }

    #[test]
    fn test_vectors() {
        assert_eq!(bresenham_vector(90.0), (100, 0));
        assert_eq!(bresenham_vector(0.0), (0, -100));
        assert_eq!(bresenham_vector(180.0), (0, 100));
        assert_eq!(bresenham_vector(315.0), (-71, -71));
    }

    #[test]
    fn test_edge_starts() {
        assert_eq!(edge_starts(90.0, 4, 3), vec![(0, 0), (0, 1), (0, 2)]);
        // North-west: east and south edges
        let starts = edge_starts(315.0, 4, 3);
        assert_eq!(starts.len(), 3 + 4);
        assert_eq!(starts[0], (3, 0));
        assert_eq!(starts[3], (0, 2));
    }

    #[test]
    fn test_bresenham_line() {
        let points: Vec<_> = BresenhamLine::new((0, 0), (4, 2)).collect();
        assert_eq!(points.first(), Some(&(0, 0)));
        assert_eq!(points.last(), Some(&(4, 2)));
        assert_eq!(points.len(), 5);
        let single: Vec<_> = BresenhamLine::new((3, 3), (3, 3)).collect();
        assert_eq!(single, vec![(3, 3)]);
    }

    #[test]
    fn test_hard_shadow_length() {
        let shadow = cast_shadows(&spike(), 90.0, 1.0, 0).unwrap();
        let row: Vec<f32> = (0..16).map(|x| shadow.get(x, 1).unwrap()).collect();
        // Height 10 drops 1 per pixel: shaded from x = 3 through x = 11
        for (x, v) in row.iter().enumerate() {
            let expected = if (3..=11).contains(&x) { 1.0 } else { 0.0 };
            assert_eq!(*v, expected, "x = {x}");
        }
        assert_eq!(shadow.nonzero_count(), 9);
    }

    #[test]
    fn test_soft_edge_fades() {
        let shadow = cast_shadows(&spike(), 90.0, 1.0, 3).unwrap();
        assert_relative_eq!(shadow.get(3, 1).unwrap(), 1.0);
        assert_relative_eq!(shadow.get(10, 1).unwrap(), 2.0 / 3.0, epsilon = 1e-6);
        assert_relative_eq!(shadow.get(11, 1).unwrap(), 1.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_nodata_is_sea_level_and_drop_validated() {
        let mut grid = spike();
        grid.set(5, 1, f32::NAN);
        let shadow = cast_shadows(&grid, 90.0, 1.0, 0).unwrap();
        assert_eq!(shadow.get(5, 1), Some(1.0));

        assert!(matches!(
            cast_shadows(&grid, 90.0, 0.0, 3),
            Err(RenderError::InvalidDropDistance(_))
        ));
    }
}
