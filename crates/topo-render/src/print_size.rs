//! Physical print size from pixel dimensions.
//!
//! Width, height and resolution are linked through the pixel dimensions:
//! one of them is locked and the other two follow. Sizes are held in inches
//! and shown in the selected [`PrintUnits`].

use std::fmt;
use std::str::FromStr;

pub const POINTS_PER_INCH: f64 = 72.0;
pub const PICAS_PER_INCH: f64 = 6.0;
pub const CM_PER_INCH: f64 = 2.54;

/// Display units for width and height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrintUnits {
    #[default]
    Inches,
    Points,
    Picas,
    Centimeters,
}

impl PrintUnits {
    /// Units per inch.
    pub fn per_inch(self) -> f64 {
        match self {
            PrintUnits::Inches => 1.0,
            PrintUnits::Points => POINTS_PER_INCH,
            PrintUnits::Picas => PICAS_PER_INCH,
            PrintUnits::Centimeters => CM_PER_INCH,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PrintUnits::Inches => "in.",
            PrintUnits::Points => "pts.",
            PrintUnits::Picas => "pi.",
            PrintUnits::Centimeters => "cm",
        }
    }
}

impl FromStr for PrintUnits {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" | "inch" | "inches" => Ok(PrintUnits::Inches),
            "pt" | "pts" | "points" => Ok(PrintUnits::Points),
            "pi" | "picas" => Ok(PrintUnits::Picas),
            "cm" | "centimeters" => Ok(PrintUnits::Centimeters),
            other => Err(format!("unknown units '{other}' (expected in, pt, pi or cm)")),
        }
    }
}

impl fmt::Display for PrintUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which quantity stays fixed when the others are recalculated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SizeLock {
    #[default]
    Width,
    Height,
    Resolution,
}

/// Linked width / height / resolution for a print of a pixel image.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintSize {
    width_in: f64,
    height_in: f64,
    pixels_per_inch: f64,
    lock: SizeLock,
    units: PrintUnits,
    pixel_width: u64,
    pixel_height: u64,
}

impl Default for PrintSize {
    fn default() -> Self {
        Self {
            width_in: 10.0,
            height_in: 10.0,
            pixels_per_inch: 300.0,
            lock: SizeLock::Width,
            units: PrintUnits::Inches,
            pixel_width: 3000,
            pixel_height: 3000,
        }
    }
}

impl PrintSize {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pixel_dimensions(&mut self, width: u64, height: u64) {
        self.pixel_width = width;
        self.pixel_height = height;
        self.recalculate();
    }

    pub fn set_lock(&mut self, lock: SizeLock) {
        self.lock = lock;
        self.recalculate();
    }

    /// Change display units; sizes are unaffected.
    pub fn set_units(&mut self, units: PrintUnits) {
        self.units = units;
    }

    /// Set the width in the current units and lock it.
    pub fn set_width(&mut self, width: f64) {
        self.width_in = width / self.units.per_inch();
        self.lock = SizeLock::Width;
        self.recalculate();
    }

    /// Set the height in the current units and lock it.
    pub fn set_height(&mut self, height: f64) {
        self.height_in = height / self.units.per_inch();
        self.lock = SizeLock::Height;
        self.recalculate();
    }

    /// Set pixels per inch and lock it.
    pub fn set_resolution(&mut self, ppi: f64) {
        self.pixels_per_inch = ppi;
        self.lock = SizeLock::Resolution;
        self.recalculate();
    }

    pub fn width(&self) -> f64 {
        self.width_in * self.units.per_inch()
    }

    pub fn height(&self) -> f64 {
        self.height_in * self.units.per_inch()
    }

    pub fn resolution(&self) -> f64 {
        self.pixels_per_inch
    }

    pub fn lock(&self) -> SizeLock {
        self.lock
    }

    pub fn units(&self) -> PrintUnits {
        self.units
    }

    pub fn pixel_dimensions(&self) -> (u64, u64) {
        (self.pixel_width, self.pixel_height)
    }

    pub fn unit_label(&self) -> &'static str {
        self.units.label()
    }

    /// RGBA buffer size of the output, in MiB.
    pub fn memory_estimate_mb(&self) -> f64 {
        (self.pixel_width as f64 * self.pixel_height as f64 * 4.0) / (1024.0 * 1024.0)
    }

    // Non-positive locked values leave the others untouched.
    fn recalculate(&mut self) {
        let (pw, ph) = (self.pixel_width as f64, self.pixel_height as f64);
        match self.lock {
            SizeLock::Width if self.width_in > 0.0 => {
                self.pixels_per_inch = pw / self.width_in;
                if self.pixels_per_inch > 0.0 {
                    self.height_in = ph / self.pixels_per_inch;
                }
            }
            SizeLock::Height if self.height_in > 0.0 => {
                self.pixels_per_inch = ph / self.height_in;
                if self.pixels_per_inch > 0.0 {
                    self.width_in = pw / self.pixels_per_inch;
                }
            }
            SizeLock::Resolution if self.pixels_per_inch > 0.0 => {
                self.width_in = pw / self.pixels_per_inch;
                self.height_in = ph / self.pixels_per_inch;
            }
            _ => {}
        }
    }
}

/// Display formatting with precision chosen by magnitude.
///
/// Values below 0.001 or from 10000 up use scientific notation with a
/// signed two-digit exponent (`1.235e+04`).
pub fn format_value(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude < 0.001 || magnitude >= 10_000.0 {
        scientific(value)
    } else if magnitude < 0.1 {
        format!("{value:.4}")
    } else if magnitude < 10.0 {
        format!("{value:.3}")
    } else if magnitude < 100.0 {
        format!("{value:.2}")
    } else {
        format!("{value:.1}")
    }
}

fn scientific(value: f64) -> String {
    let raw = format!("{value:.3e}");
    match raw.split_once('e') {
        Some((mantissa, exp)) => match exp.parse::<i32>() {
            Ok(exp) => {
                let sign = if exp < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exp.abs())
            }
            Err(_) => raw,
        },
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults() {
        let size = PrintSize::new();
        assert_eq!(size.width(), 10.0);
        assert_eq!(size.height(), 10.0);
        assert_eq!(size.resolution(), 300.0);
        assert_eq!(size.lock(), SizeLock::Width);
        assert_eq!(size.pixel_dimensions(), (3000, 3000));
    }

    #[test]
    fn test_width_lock_follows_pixels() {
        let mut size = PrintSize::new();
        size.set_pixel_dimensions(3000, 2000);
        assert_relative_eq!(size.resolution(), 300.0);
        assert_relative_eq!(size.height(), 2000.0 / 300.0);

        size.set_width(5.0);
        assert_relative_eq!(size.resolution(), 600.0);
        assert_relative_eq!(size.height(), 2000.0 / 600.0);
    }

    #[test]
    fn test_resolution_and_height_locks() {
        let mut size = PrintSize::new();
        size.set_pixel_dimensions(3000, 2000);
        size.set_resolution(150.0);
        assert_eq!(size.lock(), SizeLock::Resolution);
        assert_relative_eq!(size.width(), 20.0);
        assert_relative_eq!(size.height(), 2000.0 / 150.0);

        size.set_height(4.0);
        assert_relative_eq!(size.resolution(), 500.0);
        assert_relative_eq!(size.width(), 6.0);
    }

    #[test]
    fn test_units_convert_display_only() {
        let mut size = PrintSize::new();
        size.set_units(PrintUnits::Centimeters);
        assert_relative_eq!(size.width(), 25.4);
        assert_eq!(size.unit_label(), "cm");
        size.set_units(PrintUnits::Points);
        assert_relative_eq!(size.width(), 720.0);

        // Setting 36 picas = 6 inches
        size.set_units(PrintUnits::Picas);
        size.set_width(36.0);
        assert_relative_eq!(size.resolution(), 500.0);
        assert_eq!("cm".parse::<PrintUnits>(), Ok(PrintUnits::Centimeters));
        assert!("furlongs".parse::<PrintUnits>().is_err());
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(12345.678), "1.235e+04");
        assert_eq!(format_value(0.0005), "5.000e-04");
        assert_eq!(format_value(0.05), "0.0500");
        assert_eq!(format_value(2.5), "2.500");
        assert_eq!(format_value(42.0), "42.00");
        assert_eq!(format_value(300.0), "300.0");
    }

    #[test]
    fn test_memory_estimate() {
        let mut size = PrintSize::new();
        size.set_pixel_dimensions(1024, 1024);
        assert_relative_eq!(size.memory_estimate_mb(), 4.0);
    }
}
