//! RGBA colors, color stops and HLS adjustment.

use serde::{Deserialize, Serialize};

fn opaque() -> u8 {
    255
}

/// An 8-bit RGBA color.
///
/// Serialized as `{"red", "green", "blue", "alpha"}`. Missing channels read
/// as 0 and a missing alpha as 255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    #[serde(default)]
    pub red: u8,
    #[serde(default)]
    pub green: u8,
    #[serde(default)]
    pub blue: u8,
    #[serde(default = "opaque")]
    pub alpha: u8,
}

impl Rgba {
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);
    /// Returned for gradients with no stops.
    pub const FALLBACK_GRAY: Rgba = Rgba::opaque(128, 128, 128);
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    pub const fn opaque(red: u8, green: u8, blue: u8) -> Self {
        Self::new(red, green, blue, 255)
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.red, self.green, self.blue, self.alpha]
    }

    /// `#rrggbb`, alpha dropped.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }

    /// QGIS `r,g,b,a` notation.
    pub fn to_qgis(self) -> String {
        format!("{},{},{},{}", self.red, self.green, self.blue, self.alpha)
    }

    /// Parse QGIS `r,g,b,a`. Missing channels are 0 (alpha 255); anything
    /// unparsable gives opaque black.
    pub fn from_qgis(text: &str) -> Self {
        let parts: Vec<&str> = text.split(',').collect();
        let channel = |i: usize, default: u8| -> Option<u8> {
            match parts.get(i) {
                Some(p) => p.trim().parse::<u8>().ok(),
                None => Some(default),
            }
        };
        match (channel(0, 0), channel(1, 0), channel(2, 0), channel(3, 255)) {
            (Some(r), Some(g), Some(b), Some(a)) => Rgba::new(r, g, b, a),
            _ => Rgba::BLACK,
        }
    }
}

impl From<[u8; 4]> for Rgba {
    fn from(c: [u8; 4]) -> Self {
        Rgba::new(c[0], c[1], c[2], c[3])
    }
}

/// A color pinned to a position on the gradient bar.
///
/// Position 0.0 is the top of the bar (maximum elevation) and 1.0 the bottom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub position: f64,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    #[serde(default = "opaque")]
    pub alpha: u8,
}

impl ColorStop {
    pub fn new(position: f64, color: Rgba) -> Self {
        Self {
            position,
            red: color.red,
            green: color.green,
            blue: color.blue,
            alpha: color.alpha,
        }
    }

    pub fn color(&self) -> Rgba {
        Rgba::new(self.red, self.green, self.blue, self.alpha)
    }

    pub fn set_color(&mut self, color: Rgba) {
        self.red = color.red;
        self.green = color.green;
        self.blue = color.blue;
        self.alpha = color.alpha;
    }

    /// QGIS `pos;r,g,b,a` notation used inside the `stops` property.
    pub fn to_qgis(&self) -> String {
        format!("{};{}", self.position, self.color().to_qgis())
    }
}

/// Hue, lightness and saturation shifts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HlsAdjustment {
    /// Hue rotation in degrees.
    pub hue_degrees: f64,
    /// Lightness shift in percent (-100..=100).
    pub lightness_pct: f64,
    /// Saturation shift in percent (-100..=100).
    pub saturation_pct: f64,
}

impl HlsAdjustment {
    pub fn new(hue_degrees: f64, lightness_pct: f64, saturation_pct: f64) -> Self {
        Self {
            hue_degrees,
            lightness_pct,
            saturation_pct,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.hue_degrees == 0.0 && self.lightness_pct == 0.0 && self.saturation_pct == 0.0
    }

    pub fn apply(&self, color: Rgba) -> Rgba {
        adjust_hls(color, self.hue_degrees, self.lightness_pct, self.saturation_pct)
    }
}

/// Shift a color in HLS space. Channels are truncated back to 8 bits and
/// alpha is untouched.
pub fn adjust_hls(color: Rgba, hue_degrees: f64, lightness_pct: f64, saturation_pct: f64) -> Rgba {
    let (h, l, s) = rgb_to_hls(
        color.red as f64 / 255.0,
        color.green as f64 / 255.0,
        color.blue as f64 / 255.0,
    );
    let h = (h + hue_degrees / 360.0).rem_euclid(1.0);
    let l = (l + lightness_pct / 100.0).clamp(0.0, 1.0);
    let s = (s + saturation_pct / 100.0).clamp(0.0, 1.0);
    let (r, g, b) = hls_to_rgb(h, l, s);
    Rgba::new(to_byte(r), to_byte(g), to_byte(b), color.alpha)
}

fn to_byte(v: f64) -> u8 {
    (v * 255.0).clamp(0.0, 255.0) as u8
}

/// RGB in 0..1 to (hue, lightness, saturation) in 0..1.
pub fn rgb_to_hls(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let maxc = r.max(g).max(b);
    let minc = r.min(g).min(b);
    let sum = maxc + minc;
    let range = maxc - minc;
    let l = sum / 2.0;
    if range == 0.0 {
        return (0.0, l, 0.0);
    }
    let s = if l <= 0.5 { range / sum } else { range / (2.0 - sum) };
    let rc = (maxc - r) / range;
    let gc = (maxc - g) / range;
    let bc = (maxc - b) / range;
    let h = if r == maxc {
        bc - gc
    } else if g == maxc {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    ((h / 6.0).rem_euclid(1.0), l, s)
}

/// (hue, lightness, saturation) in 0..1 to RGB in 0..1.
pub fn hls_to_rgb(h: f64, l: f64, s: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (l, l, l);
    }
    let m2 = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let m1 = 2.0 * l - m2;
    (
        hue_channel(m1, m2, h + 1.0 / 3.0),
        hue_channel(m1, m2, h),
        hue_channel(m1, m2, h - 1.0 / 3.0),
    )
}

fn hue_channel(m1: f64, m2: f64, hue: f64) -> f64 {
    let hue = hue.rem_euclid(1.0);
    if hue < 1.0 / 6.0 {
        m1 + (m2 - m1) * hue * 6.0
    } else if hue < 0.5 {
        m2
    } else if hue < 2.0 / 3.0 {
        m1 + (m2 - m1) * (2.0 / 3.0 - hue) * 6.0
    } else {
        m1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_qgis_color_parsing() {
        assert_eq!(Rgba::from_qgis("10,20,30,40"), Rgba::new(10, 20, 30, 40));
        assert_eq!(Rgba::from_qgis("10,20,30"), Rgba::new(10, 20, 30, 255));
        assert_eq!(Rgba::from_qgis("10"), Rgba::new(10, 0, 0, 255));
        assert_eq!(Rgba::from_qgis("red,green"), Rgba::BLACK);
        assert_eq!(Rgba::from_qgis("300,0,0,255"), Rgba::BLACK);
        assert_eq!(Rgba::new(1, 2, 3, 4).to_qgis(), "1,2,3,4");
    }

    #[test]
    fn test_missing_channels_deserialize() {
        let c: Rgba = serde_json::from_str(r#"{"red": 12}"#).unwrap();
        assert_eq!(c, Rgba::new(12, 0, 0, 255));
        let s: ColorStop = serde_json::from_str(r#"{"position": 0.5, "red": 1, "green": 2, "blue": 3}"#).unwrap();
        assert_eq!(s.alpha, 255);
        assert!(serde_json::from_str::<ColorStop>(r#"{"position": 0.5, "red": 1}"#).is_err());
    }

    #[test]
    fn test_hls_round_trip_primaries() {
        let (h, l, s) = rgb_to_hls(1.0, 0.0, 0.0);
        assert_relative_eq!(h, 0.0);
        assert_relative_eq!(l, 0.5);
        assert_relative_eq!(s, 1.0);

        let (h, _, _) = rgb_to_hls(0.0, 0.0, 1.0);
        assert_relative_eq!(h, 2.0 / 3.0);

        let (r, g, b) = hls_to_rgb(1.0 / 3.0, 0.5, 1.0);
        assert_relative_eq!(r, 0.0, epsilon = 1e-12);
        assert_relative_eq!(g, 1.0, epsilon = 1e-12);
        assert_relative_eq!(b, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_adjust_hls() {
        let red = Rgba::new(255, 0, 0, 200);
        // Hue rotates red to green, keeping alpha
        let green = adjust_hls(red, 120.0, 0.0, 0.0);
        assert_eq!(green.green, 255);
        assert!(green.red <= 1 && green.blue <= 1);
        assert_eq!(green.alpha, 200);
        // Negative rotation wraps
        assert_eq!(adjust_hls(red, -240.0, 0.0, 0.0).green, green.green);

        assert_eq!(adjust_hls(red, 0.0, 100.0, 0.0), Rgba::new(255, 255, 255, 200));
        assert_eq!(adjust_hls(red, 0.0, -100.0, 0.0), Rgba::new(0, 0, 0, 200));

        let gray = adjust_hls(red, 0.0, 0.0, -100.0);
        assert_eq!(gray.red, gray.green);
        assert_eq!(gray.green, gray.blue);

        assert!(HlsAdjustment::default().is_identity());
    }
}
