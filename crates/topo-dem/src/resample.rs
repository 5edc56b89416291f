//! Resampling that keeps no-data areas from bleeding into valid elevations.

use crate::{DemError, ElevationGrid, Result};

/// Minimum interpolated validity for an output sample to be kept.
const VALID_THRESHOLD: f32 = 0.1;

/// Source coordinate for output index `i` when zooming `in_len` samples to `out_len`,
/// aligning the first and last samples.
fn source_coord(i: usize, in_len: usize, out_len: usize) -> f64 {
    if out_len <= 1 || in_len <= 1 {
        0.0
    } else {
        i as f64 * (in_len - 1) as f64 / (out_len - 1) as f64
    }
}

fn bilinear_zoom(src: &[f32], width: usize, height: usize, new_w: usize, new_h: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(new_w * new_h);
    for oy in 0..new_h {
        let sy = source_coord(oy, height, new_h);
        let y0 = (sy.floor() as usize).min(height - 1);
        let y1 = (y0 + 1).min(height - 1);
        let fy = (sy - y0 as f64) as f32;
        for ox in 0..new_w {
            let sx = source_coord(ox, width, new_w);
            let x0 = (sx.floor() as usize).min(width - 1);
            let x1 = (x0 + 1).min(width - 1);
            let fx = (sx - x0 as f64) as f32;

            let top = src[y0 * width + x0] * (1.0 - fx) + src[y0 * width + x1] * fx;
            let bottom = src[y1 * width + x0] * (1.0 - fx) + src[y1 * width + x1] * fx;
            out.push(top * (1.0 - fy) + bottom * fy);
        }
    }
    out
}

/// Resize to `new_w x new_h` while excluding `NaN` from interpolation.
///
/// Data (with `NaN` as 0) and the validity mask are interpolated separately;
/// each output is `data / mask` where the mask exceeds 0.1, otherwise `NaN`.
pub fn nan_aware_resize(grid: &ElevationGrid, new_w: usize, new_h: usize) -> ElevationGrid {
    let (width, height) = grid.dimensions();
    if grid.valid_count() == 0 || width == 0 || height == 0 {
        return ElevationGrid::nodata(new_w, new_h);
    }
    if (new_w, new_h) == (width, height) {
        return grid.clone();
    }

    let filled: Vec<f32> = grid.data().iter().map(|v| if v.is_nan() { 0.0 } else { *v }).collect();
    let mask: Vec<f32> = grid.data().iter().map(|v| if v.is_nan() { 0.0 } else { 1.0 }).collect();

    let data = bilinear_zoom(&filled, width, height, new_w, new_h);
    let weight = bilinear_zoom(&mask, width, height, new_w, new_h);

    let mut out = ElevationGrid::nodata(new_w, new_h);
    for ((dst, d), w) in out.data_mut().iter_mut().zip(data).zip(weight) {
        if w > VALID_THRESHOLD {
            *dst = d / w;
        }
    }
    out
}

/// Mean of the valid samples in each block of the input.
pub fn block_average(grid: &ElevationGrid, new_w: usize, new_h: usize) -> ElevationGrid {
    let (width, height) = grid.dimensions();
    let mut out = ElevationGrid::nodata(new_w, new_h);
    if new_w == 0 || new_h == 0 {
        return out;
    }
    let bh = height as f64 / new_h as f64;
    let bw = width as f64 / new_w as f64;

    for i in 0..new_h {
        let y0 = (i as f64 * bh) as usize;
        let y1 = (((i + 1) as f64 * bh) as usize).max(y0 + 1).min(height);
        for j in 0..new_w {
            let x0 = (j as f64 * bw) as usize;
            let x1 = (((j + 1) as f64 * bw) as usize).max(x0 + 1).min(width);
            let mut sum = 0.0f64;
            let mut count = 0usize;
            for y in y0..y1 {
                for x in x0..x1 {
                    if let Some(v) = grid.get(x, y).filter(|v| !v.is_nan()) {
                        sum += v as f64;
                        count += 1;
                    }
                }
            }
            if count > 0 {
                out.set(j, i, (sum / count as f64) as f32);
            }
        }
    }
    out
}

/// Output dimensions for scaling `width x height` by `pct` percent.
pub fn scaled_dimensions(width: usize, height: usize, pct: f64) -> Result<(usize, usize)> {
    if !(1.0..=100.0).contains(&pct) {
        return Err(DemError::InvalidScale(pct));
    }
    let factor = pct / 100.0;
    Ok((
        ((width as f64 * factor).round() as usize).max(1),
        ((height as f64 * factor).round() as usize).max(1),
    ))
}

/// Downscale by a percentage using exact area-weighted averaging of valid samples.
pub fn scale_percentage(grid: &ElevationGrid, pct: f64) -> Result<ElevationGrid> {
    let (out_w, out_h) = scaled_dimensions(grid.width(), grid.height(), pct)?;
    if pct == 100.0 {
        return Ok(grid.clone());
    }
    let (in_w, in_h) = grid.dimensions();
    let x_scale = in_w as f64 / out_w as f64;
    let y_scale = in_h as f64 / out_h as f64;
    let mut out = ElevationGrid::nodata(out_w, out_h);

    for oy in 0..out_h {
        let top = oy as f64 * y_scale;
        let bottom = (oy + 1) as f64 * y_scale;
        let top_px = top.floor().max(0.0) as usize;
        let bottom_px = (bottom.ceil() as usize).min(in_h);
        for ox in 0..out_w {
            let left = ox as f64 * x_scale;
            let right = (ox + 1) as f64 * x_scale;
            let left_px = left.floor().max(0.0) as usize;
            let right_px = (right.ceil() as usize).min(in_w);

            let mut total_weight = 0.0;
            let mut weighted_sum = 0.0;
            for iy in top_px..bottom_px {
                let overlap_h = bottom.min(iy as f64 + 1.0) - top.max(iy as f64);
                if overlap_h <= 0.0 {
                    continue;
                }
                for ix in left_px..right_px {
                    let Some(v) = grid.get(ix, iy).filter(|v| !v.is_nan()) else {
                        continue;
                    };
                    let overlap_w = right.min(ix as f64 + 1.0) - left.max(ix as f64);
                    if overlap_w > 0.0 {
                        let area = overlap_w * overlap_h;
                        weighted_sum += v as f64 * area;
                        total_weight += area;
                    }
                }
            }
            if total_weight > 0.0 {
                out.set(ox, oy, (weighted_sum / total_weight) as f32);
            }
        }
    }
    Ok(out)
}

/// Rough working-set estimate in MB for [`scale_percentage`].
pub fn scale_memory_estimate_mb(width: usize, height: usize, pct: f64) -> Result<f64> {
    let (out_w, out_h) = scaled_dimensions(width, height, pct)?;
    let input_mb = (width * height * 4) as f64 / (1024.0 * 1024.0);
    let output_mb = (out_w * out_h * 8) as f64 / (1024.0 * 1024.0);
    Ok(input_mb + output_mb + input_mb * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_nan_aware_resize_keeps_nodata_out() {
        let mut grid = ElevationGrid::filled(10, 10, 100.0);
        for x in 0..10 {
            grid.set(x, 0, f32::NAN);
            grid.set(x, 1, f32::NAN);
        }
        let out = nan_aware_resize(&grid, 5, 5);
        assert_eq!(out.dimensions(), (5, 5));
        assert!(out.get(2, 0).unwrap().is_nan());
        // Valid neighbours average to the same value, no pull toward zero
        for y in 1..5 {
            for x in 0..5 {
                if let Some(v) = out.get(x, y).filter(|v| !v.is_nan()) {
                    assert_relative_eq!(v, 100.0, epsilon = 1e-3);
                }
            }
        }
        assert_relative_eq!(out.get(2, 4).unwrap(), 100.0, epsilon = 1e-3);
    }

    #[test]
    fn test_nan_aware_resize_all_nan() {
        let out = nan_aware_resize(&ElevationGrid::nodata(4, 4), 2, 3);
        assert_eq!(out.dimensions(), (2, 3));
        assert_eq!(out.valid_count(), 0);
    }

    #[test]
    fn test_nan_aware_resize_upsample_ramp() {
        let grid = ElevationGrid::new(2, 1, vec![0.0, 10.0]).unwrap();
        let out = nan_aware_resize(&grid, 3, 1);
        assert_relative_eq!(out.data()[1], 5.0);
    }

    #[test]
    fn test_block_average() {
        let grid = ElevationGrid::new(4, 2, vec![1.0, 3.0, f32::NAN, 8.0, 5.0, 7.0, f32::NAN, f32::NAN]).unwrap();
        let out = block_average(&grid, 2, 1);
        assert_relative_eq!(out.data()[0], 4.0);
        assert_relative_eq!(out.data()[1], 8.0);
    }

    #[test]
    fn test_scale_percentage_area_weighted() {
        let grid = ElevationGrid::new(4, 4, (0..16).map(|v| v as f32).collect()).unwrap();
        let out = scale_percentage(&grid, 50.0).unwrap();
        assert_eq!(out.dimensions(), (2, 2));
        assert_relative_eq!(out.get(0, 0).unwrap(), 2.5);
        assert_relative_eq!(out.get(1, 1).unwrap(), 12.5);
    }

    #[test]
    fn test_scale_percentage_fractional_overlap() {
        // Three columns into two: each output pixel covers 1.5 input pixels
        let grid = ElevationGrid::new(3, 1, vec![0.0, 3.0, 6.0]).unwrap();
        let out = scale_percentage(&grid, 66.7).unwrap();
        assert_eq!(out.dimensions(), (2, 1));
        assert_relative_eq!(out.data()[0], 1.0);
        assert_relative_eq!(out.data()[1], 5.0);
    }

    #[test]
    fn test_scale_percentage_validation() {
        let grid = ElevationGrid::filled(2, 2, 1.0);
        assert!(matches!(scale_percentage(&grid, 0.5), Err(DemError::InvalidScale(_))));
        assert!(scale_percentage(&grid, 101.0).is_err());
        assert_eq!(scale_percentage(&grid, 100.0).unwrap(), grid);
        assert_eq!(scale_percentage(&ElevationGrid::filled(3, 3, 1.0), 1.0).unwrap().dimensions(), (1, 1));
    }

    #[test]
    fn test_scale_memory_estimate() {
        let mb = scale_memory_estimate_mb(1024, 1024, 50.0).unwrap();
        assert_relative_eq!(mb, 4.0 + 2.0 + 2.0);
    }
}
