//! In-memory elevation raster.

use crate::{DemError, Result};

/// A rectangular grid of elevation samples in meters.
///
/// Samples are stored row-major from north to south, west to east.
/// Missing data is represented by `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationGrid {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl ElevationGrid {
    /// Wrap an existing buffer. The buffer length must equal `width * height`.
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height {
            return Err(DemError::DimensionMismatch {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Create a grid with every sample set to `value`.
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Create a grid of no-data samples.
    pub fn nodata(width: usize, height: usize) -> Self {
        Self::filled(width, height, f32::NAN)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Get the dimensions as `(width, height)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Sample at `(x, y)`, or `None` outside the grid.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x < self.width && y < self.height {
            Some(self.data[y * self.width + x])
        } else {
            None
        }
    }

    /// Set the sample at `(x, y)`. Out-of-range writes are ignored.
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    /// Iterate rows from north to south.
    pub fn rows(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.width.max(1))
    }

    /// Mutably iterate rows from north to south.
    pub fn rows_mut(&mut self) -> std::slice::ChunksExactMut<'_, f32> {
        self.data.chunks_exact_mut(self.width.max(1))
    }

    /// Minimum and maximum over valid samples, or `None` if every sample is no-data.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Number of samples that are not `NaN`.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Copy the half-open window `[x0, x1) x [y0, y1)`, clamped to the grid.
    pub fn crop(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        let x0 = x0.min(x1);
        let y0 = y0.min(y1);
        let w = x1 - x0;
        let h = y1 - y0;
        let mut data = Vec::with_capacity(w * h);
        for y in y0..y1 {
            let start = y * self.width;
            data.extend_from_slice(&self.data[start + x0..start + x1]);
        }
        Self {
            width: w,
            height: h,
            data,
        }
    }

    /// Keep every `step`-th row and column, starting at the first.
    pub fn subsample(&self, step: usize) -> Self {
        if step <= 1 {
            return self.clone();
        }
        let w = self.width.div_ceil(step);
        let h = self.height.div_ceil(step);
        let mut data = Vec::with_capacity(w * h);
        for y in (0..self.height).step_by(step) {
            let row = &self.data[y * self.width..(y + 1) * self.width];
            data.extend(row.iter().step_by(step).copied());
        }
        Self {
            width: w,
            height: h,
            data,
        }
    }

    /// Copy `other` into this grid with its top-left corner at `(x, y)`, clipping at the edges.
    pub fn place(&mut self, other: &ElevationGrid, x: usize, y: usize) {
        if x >= self.width || y >= self.height {
            return;
        }
        let w = other.width.min(self.width - x);
        let h = other.height.min(self.height - y);
        for row in 0..h {
            let src = &other.data[row * other.width..row * other.width + w];
            let dst_start = (y + row) * self.width + x;
            self.data[dst_start..dst_start + w].copy_from_slice(src);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(w: usize, h: usize) -> ElevationGrid {
        let data = (0..w * h).map(|v| v as f32).collect();
        ElevationGrid::new(w, h, data).unwrap()
    }

    #[test]
    fn test_new_rejects_wrong_length() {
        assert!(ElevationGrid::new(3, 3, vec![0.0; 8]).is_err());
    }

    #[test]
    fn test_min_max_skips_nan() {
        let grid = ElevationGrid::new(2, 2, vec![f32::NAN, 5.0, -3.0, 7.0]).unwrap();
        assert_eq!(grid.min_max(), Some((-3.0, 7.0)));
        assert_eq!(grid.valid_count(), 3);
        assert_eq!(ElevationGrid::nodata(2, 2).min_max(), None);
    }

    #[test]
    fn test_crop_clamps() {
        let grid = ramp(4, 3);
        let c = grid.crop(1, 1, 10, 10);
        assert_eq!(c.dimensions(), (3, 2));
        assert_eq!(c.data(), &[5.0, 6.0, 7.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn test_subsample() {
        let grid = ramp(5, 5);
        let s = grid.subsample(2);
        assert_eq!(s.dimensions(), (3, 3));
        assert_eq!(s.get(1, 1), Some(12.0));
        assert_eq!(s.get(2, 2), Some(24.0));
    }

    #[test]
    fn test_place_clips() {
        let mut grid = ElevationGrid::nodata(3, 3);
        grid.place(&ramp(2, 2), 2, 2);
        assert_eq!(grid.get(2, 2), Some(0.0));
        assert_eq!(grid.valid_count(), 1);
    }
}
