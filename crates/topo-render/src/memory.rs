//! Pre-render size and memory checks.

use crate::{RenderError, Result};
use topo_gradient::Gradient;
use tracing::{debug, warn};

/// Largest output a single render may produce.
pub const MAX_PIXELS: usize = 500_000_000;
/// Share of the memory budget a render may use.
pub const MEMORY_HEADROOM: f64 = 0.85;
/// Share of the budget above which a render logs a warning.
const WARN_FRACTION: f64 = 0.7;

/// Working-set bytes per output pixel: elevation (f32), gradient RGBA,
/// optional shading and shadow masks, and blending temporaries.
pub fn bytes_per_pixel(has_shading: bool, has_shadows: bool) -> usize {
    4 + 4 + usize::from(has_shading) + usize::from(has_shading && has_shadows) + 8
}

/// Estimated working set, in GiB, for rendering `width x height` pixels.
pub fn estimate_render_gb(width: usize, height: usize, gradient: &Gradient) -> f64 {
    let has_shading = gradient.gradient_type.has_shading();
    let per_pixel = bytes_per_pixel(has_shading, gradient.cast_shadows);
    (width * height * per_pixel) as f64 / 1024f64.powi(3)
}

/// Reject renders over [`MAX_PIXELS`] or over 85% of `budget_mb`.
///
/// Errors carry the largest scale percentage that would fit.
pub fn check_render_memory(width: usize, height: usize, gradient: &Gradient, budget_mb: u64) -> Result<()> {
    let pixels = width * height;
    if pixels > MAX_PIXELS {
        return Err(RenderError::TooManyPixels {
            width,
            height,
            pixels,
            max: MAX_PIXELS,
            suggested_percent: suggested_percent(MAX_PIXELS as f64, pixels as f64),
        });
    }

    let needed_gb = estimate_render_gb(width, height, gradient);
    let budget_gb = budget_mb as f64 / 1024.0;
    let limit_gb = budget_gb * MEMORY_HEADROOM;
    debug!(width, height, needed_gb, limit_gb, "Render memory estimate");
    if needed_gb > limit_gb {
        return Err(RenderError::Memory {
            needed_gb,
            limit_gb,
            suggested_percent: suggested_percent(limit_gb, needed_gb),
        });
    }
    if needed_gb > budget_gb * WARN_FRACTION {
        warn!(needed_gb, budget_gb, "Render will use most of the memory budget");
    }
    Ok(())
}

fn suggested_percent(limit: f64, needed: f64) -> u32 {
    ((limit / needed).sqrt() * 100.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use topo_gradient::{ColorStop, GradientType, Rgba};

    fn gradient(kind: GradientType, shadows: bool) -> Gradient {
        let mut g = Gradient::new("g", 0.0, 1.0, vec![ColorStop::new(0.0, Rgba::BLACK)]).with_type(kind);
        g.cast_shadows = shadows;
        g
    }

    #[test]
    fn test_bytes_per_pixel() {
        assert_eq!(bytes_per_pixel(false, false), 16);
        assert_eq!(bytes_per_pixel(false, true), 16);
        assert_eq!(bytes_per_pixel(true, false), 17);
        assert_eq!(bytes_per_pixel(true, true), 18);
    }

    #[test]
    fn test_pixel_limit() {
        let g = gradient(GradientType::Gradient, false);
        let err = check_render_memory(40_000, 50_000, &g, u64::MAX / 2).unwrap_err();
        match err {
            RenderError::TooManyPixels { pixels, suggested_percent, .. } => {
                assert_eq!(pixels, 2_000_000_000);
                assert_eq!(suggested_percent, 50);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_memory_budget() {
        let g = gradient(GradientType::ShadingAndGradient, true);
        // 10000 x 10000 x 18 bytes is about 1.68 GiB
        assert!(check_render_memory(10_000, 10_000, &g, 4096).is_ok());
        let err = check_render_memory(10_000, 10_000, &g, 1024).unwrap_err();
        assert!(matches!(err, RenderError::Memory { suggested_percent: 71, .. }), "{err:?}");
    }
}
