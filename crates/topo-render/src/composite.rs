//! Layer compositing: hard-light hillshade blending and shadow darkening.

use image::{GrayImage, RgbaImage};
use rayon::prelude::*;
use topo_gradient::{Gradient, Rgba};
use tracing::debug;

/// Hard-light blend of one channel, both in `0.0..=1.0`.
pub fn hard_light(base: f32, overlay: f32) -> f32 {
    if overlay < 0.5 {
        2.0 * base * overlay
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - overlay)
    }
}

/// Blend `shading` over the RGB channels of `base` in hard-light mode.
///
/// `strength` is a percentage: 0 keeps the base, 100 is the plain blend, and
/// other values interpolate (or extrapolate above 100) between the two.
/// Alpha is untouched.
pub fn composite(base: &RgbaImage, shading: &GrayImage, strength: i32) -> RgbaImage {
    let mut out = base.clone();
    let width = base.width() as usize;
    if width == 0 || strength == 0 || shading.dimensions() != base.dimensions() {
        return out;
    }
    let s = strength as f32 / 100.0;

    out.par_chunks_mut(width * 4)
        .zip(shading.par_chunks(width))
        .for_each(|(row, shade_row)| {
            for (px, &shade) in row.chunks_exact_mut(4).zip(shade_row) {
                let o = shade as f32 / 255.0;
                for c in &mut px[..3] {
                    let b = *c as f32 / 255.0;
                    let hl = hard_light(b, o);
                    let blended = if s == 1.0 { hl } else { b + s * (hl - b) };
                    *c = (blended.clamp(0.0, 1.0) * 255.0) as u8;
                }
            }
        });
    out
}

/// Darken pixels toward `color` by their shadow strength.
///
/// Each channel is scaled by `(1 - i)(1 - c/255) + c/255` and truncated, so
/// a full shadow paints the shadow color's fraction of the pixel.
pub fn apply_shadows(image: &mut RgbaImage, shadows: &GrayImage, color: Rgba) {
    let width = image.width() as usize;
    if width == 0 || shadows.dimensions() != image.dimensions() {
        return;
    }
    let tint = [color.red, color.green, color.blue].map(|c| c as f64 / 255.0);

    image
        .par_chunks_mut(width * 4)
        .zip(shadows.par_chunks(width))
        .for_each(|(row, shadow_row)| {
            for (px, &s) in row.chunks_exact_mut(4).zip(shadow_row) {
                if s == 0 {
                    continue;
                }
                let i = s as f64 / 255.0;
                for (c, t) in px[..3].iter_mut().zip(tint) {
                    let scale = (1.0 - i) * (1.0 - t) + t;
                    *c = (*c as f64 * scale) as u8;
                }
            }
        });
}

/// Combine the gradient layer with optional shading and shadow layers.
///
/// For posterized gradients with an above color, pixels showing that color
/// before blending get it back afterwards so the band stays flat. Shadows
/// use the gradient's shadow color, or black.
pub fn composite_layers(
    gradient_layer: &RgbaImage,
    shading: Option<&GrayImage>,
    shadows: Option<&GrayImage>,
    gradient: &Gradient,
) -> RgbaImage {
    let mut result = match shading {
        Some(shading) => {
            let mut blended = composite(gradient_layer, shading, gradient.blending_strength);
            if let (true, Some(above)) = (gradient.gradient_type.is_posterized(), gradient.below_gradient_color) {
                let restored = restore_color(gradient_layer, &mut blended, above);
                debug!(restored, "Restored above-gradient pixels after blending");
            }
            blended
        }
        None => gradient_layer.clone(),
    };
    if let Some(shadows) = shadows {
        apply_shadows(&mut result, shadows, gradient.shadow_color.unwrap_or(Rgba::BLACK));
    }
    result
}

fn restore_color(before: &RgbaImage, after: &mut RgbaImage, color: Rgba) -> usize {
    let rgb = [color.red, color.green, color.blue];
    let mut restored = 0;
    for (src, dst) in before.pixels().zip(after.pixels_mut()) {
        if src.0[..3] == rgb {
            dst.0[..3].copy_from_slice(&rgb);
            restored += 1;
        }
    }
    restored
}

/// Composite an RGBA image onto opaque white.
pub fn flatten_on_white(image: &RgbaImage) -> image::RgbImage {
    let (width, height) = image.dimensions();
    let mut out = image::RgbImage::new(width, height);
    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        let a = src.0[3] as u32;
        for c in 0..3 {
            dst.0[c] = ((src.0[c] as u32 * a + 255 * (255 - a) + 127) / 255) as u8;
        }
    }
    out
}

/// Gray hillshade as opaque RGBA.
pub(crate) fn gray_to_rgba(gray: &GrayImage) -> RgbaImage {
    RgbaImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0];
        image::Rgba([v, v, v, 255])
    })
}
