//! Elevation color gradients.

use crate::color::{ColorStop, HlsAdjustment, Rgba};
use crate::{GradientError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Feet to meters.
const FEET_TO_METERS: f64 = 0.3048;

/// Default `created_by` for gradients made in this program.
pub const DEFAULT_CREATED_BY: &str = "TopoToImage";

/// How a gradient turns elevations into pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientType {
    /// Continuous color ramp.
    #[default]
    Gradient,
    /// Gray hillshade only.
    ShadedRelief,
    /// Flat color bands.
    Posterized,
    /// Color ramp blended with hillshade.
    ShadingAndGradient,
    /// Color bands blended with hillshade.
    ShadingAndPosterized,
}

impl GradientType {
    pub const ALL: [GradientType; 5] = [
        GradientType::Gradient,
        GradientType::ShadedRelief,
        GradientType::Posterized,
        GradientType::ShadingAndGradient,
        GradientType::ShadingAndPosterized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GradientType::Gradient => "gradient",
            GradientType::ShadedRelief => "shaded_relief",
            GradientType::Posterized => "posterized",
            GradientType::ShadingAndGradient => "shading_and_gradient",
            GradientType::ShadingAndPosterized => "shading_and_posterized",
        }
    }

    /// Whether a hillshade layer is computed.
    pub fn has_shading(&self) -> bool {
        matches!(
            self,
            GradientType::ShadedRelief | GradientType::ShadingAndGradient | GradientType::ShadingAndPosterized
        )
    }

    pub fn is_posterized(&self) -> bool {
        matches!(self, GradientType::Posterized | GradientType::ShadingAndPosterized)
    }
}

impl std::fmt::Display for GradientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the gradient's elevation limits are measured in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElevationUnits {
    /// Absolute elevations.
    #[default]
    Meters,
    /// Relative to the observed range of the rendered area.
    Percent,
    /// Legacy files only; converted to meters by [`Gradient::normalize`].
    Feet,
    /// Anything else found in a file; treated as meters.
    #[serde(other)]
    Unknown,
}

fn default_max_elevation() -> f64 {
    1000.0
}
fn default_created_by() -> String {
    DEFAULT_CREATED_BY.to_string()
}
fn default_light_direction() -> i32 {
    315
}
fn default_shading_intensity() -> i32 {
    50
}
fn default_drop_distance() -> f64 {
    1.0
}
fn default_soft_edge() -> i32 {
    3
}
fn default_blending_mode() -> String {
    "Multiply".to_string()
}
fn default_blending_strength() -> i32 {
    100
}
fn default_color_mode() -> String {
    "8-bit".to_string()
}

/// A named mapping from elevation to color plus its shading settings.
///
/// Fields missing from a file take the same defaults as [`Gradient::new`],
/// except that the elevation range defaults to 0..1000.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gradient {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub min_elevation: f64,
    #[serde(default = "default_max_elevation")]
    pub max_elevation: f64,
    #[serde(default)]
    pub color_stops: Vec<ColorStop>,
    /// Step between stops instead of interpolating.
    #[serde(default)]
    pub discrete: bool,
    #[serde(default = "default_created_by")]
    pub created_by: String,
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub shadow_color: Option<Rgba>,
    #[serde(default)]
    pub no_data_color: Option<Rgba>,
    /// Used above the topmost stop of posterized gradients.
    #[serde(default)]
    pub below_gradient_color: Option<Rgba>,

    #[serde(default)]
    pub gradient_type: GradientType,
    /// Light azimuth in degrees, 0 = north, clockwise.
    #[serde(default = "default_light_direction")]
    pub light_direction: i32,
    #[serde(default = "default_shading_intensity")]
    pub shading_intensity: i32,
    #[serde(default)]
    pub cast_shadows: bool,
    /// Elevation a shadow ray loses per pixel.
    #[serde(default = "default_drop_distance")]
    pub shadow_drop_distance: f64,
    #[serde(default = "default_soft_edge")]
    pub shadow_soft_edge: i32,
    #[serde(default = "default_blending_mode")]
    pub blending_mode: String,
    /// Percent; 100 = full hard-light blend.
    #[serde(default = "default_blending_strength")]
    pub blending_strength: i32,
    #[serde(default = "default_color_mode")]
    pub color_mode: String,
    #[serde(default)]
    pub units: ElevationUnits,
}

impl Gradient {
    pub fn new(name: impl Into<String>, min_elevation: f64, max_elevation: f64, color_stops: Vec<ColorStop>) -> Self {
        let mut gradient = Self {
            name: name.into(),
            description: String::new(),
            min_elevation,
            max_elevation,
            color_stops,
            discrete: false,
            created_by: default_created_by(),
            tags: Vec::new(),
            shadow_color: None,
            no_data_color: None,
            below_gradient_color: None,
            gradient_type: GradientType::default(),
            light_direction: default_light_direction(),
            shading_intensity: default_shading_intensity(),
            cast_shadows: false,
            shadow_drop_distance: default_drop_distance(),
            shadow_soft_edge: default_soft_edge(),
            blending_mode: default_blending_mode(),
            blending_strength: default_blending_strength(),
            color_mode: default_color_mode(),
            units: ElevationUnits::Meters,
        };
        gradient.normalize();
        gradient
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_type(mut self, gradient_type: GradientType) -> Self {
        self.gradient_type = gradient_type;
        self
    }

    pub fn with_discrete(mut self, discrete: bool) -> Self {
        self.discrete = discrete;
        self
    }

    pub fn with_units(mut self, units: ElevationUnits) -> Self {
        self.units = units;
        self.normalize();
        self
    }

    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    /// Convert legacy feet to meters, map unknown units to meters and sort
    /// the stops by position.
    pub fn normalize(&mut self) {
        match self.units {
            ElevationUnits::Feet => {
                warn!(gradient = %self.name, "Converting gradient from feet to meters");
                self.min_elevation *= FEET_TO_METERS;
                self.max_elevation *= FEET_TO_METERS;
                self.units = ElevationUnits::Meters;
            }
            ElevationUnits::Unknown => {
                warn!(gradient = %self.name, "Invalid units, defaulting to meters");
                self.units = ElevationUnits::Meters;
            }
            ElevationUnits::Meters | ElevationUnits::Percent => {}
        }
        self.color_stops.sort_by(|a, b| a.position.total_cmp(&b.position));
    }

    /// Bar position of an elevation: 0 at `max_elevation`, 1 at
    /// `min_elevation`, clamped. A zero-width range puts everything at or
    /// above it at the top.
    pub fn position_of(&self, elevation: f64) -> f64 {
        let range = self.max_elevation - self.min_elevation;
        if range == 0.0 {
            return if elevation >= self.min_elevation { 0.0 } else { 1.0 };
        }
        (1.0 - (elevation - self.min_elevation) / range).clamp(0.0, 1.0)
    }

    /// Elevation at a bar position.
    pub fn elevation_at(&self, position: f64) -> f64 {
        self.min_elevation + (1.0 - position) * (self.max_elevation - self.min_elevation)
    }

    /// Color for one elevation value.
    pub fn color_at(&self, elevation: f64) -> Rgba {
        let stops = &self.color_stops;
        match stops.len() {
            0 => return Rgba::FALLBACK_GRAY,
            1 => return stops[0].color(),
            _ => {}
        }
        if self.gradient_type.is_posterized() {
            return self.posterized_color_at(elevation);
        }

        let position = self.position_of(elevation);
        let (first, last) = (stops[0], stops[stops.len() - 1]);
        if position <= first.position {
            return first.color();
        }
        if position >= last.position {
            return last.color();
        }
        for pair in stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.position <= position && position <= b.position {
                if self.discrete {
                    return a.color();
                }
                let t = (position - a.position) / (b.position - a.position);
                let lerp = |x: u8, y: u8| (x as f64 + t * (y as f64 - x as f64)) as u8;
                return Rgba::new(
                    lerp(a.red, b.red),
                    lerp(a.green, b.green),
                    lerp(a.blue, b.blue),
                    lerp(a.alpha, b.alpha),
                );
            }
        }
        Rgba::FALLBACK_GRAY
    }

    fn posterized_color_at(&self, elevation: f64) -> Rgba {
        let stops = &self.color_stops;
        let (top, bottom) = (stops[0], stops[stops.len() - 1]);

        if elevation > self.elevation_at(top.position) {
            return self.below_gradient_color.unwrap_or_else(|| top.color());
        }
        if elevation < self.elevation_at(bottom.position) {
            return bottom.color();
        }
        posterized_band(stops, self.position_of(elevation))
    }

    /// Whether `elevation` falls above the topmost stop of a posterized
    /// gradient that has an above color set.
    pub fn is_above_posterized(&self, elevation: f64) -> bool {
        match (self.gradient_type.is_posterized(), self.below_gradient_color, self.color_stops.first()) {
            (true, Some(_), Some(top)) if self.color_stops.len() > 1 => elevation > self.elevation_at(top.position),
            _ => false,
        }
    }

    /// Elevation limits to color against. Percent gradients stretch over the
    /// observed data range when one is known.
    pub fn elevation_range(&self, data_min_max: Option<(f64, f64)>) -> (f64, f64) {
        match (self.units, data_min_max) {
            (ElevationUnits::Percent, Some(range)) => range,
            _ => (self.min_elevation, self.max_elevation),
        }
    }

    /// Copy of this gradient stretched over `[min, max]`.
    pub fn with_range(&self, min_elevation: f64, max_elevation: f64) -> Gradient {
        let mut g = self.clone();
        g.min_elevation = min_elevation;
        g.max_elevation = max_elevation;
        g
    }

    /// Apply an HLS shift to every stop and every special color.
    pub fn adjust_hls(&mut self, adjustment: HlsAdjustment) {
        for stop in &mut self.color_stops {
            stop.set_color(adjustment.apply(stop.color()));
        }
        for color in [
            &mut self.shadow_color,
            &mut self.no_data_color,
            &mut self.below_gradient_color,
        ]
        .into_iter()
        .flatten()
        {
            *color = adjustment.apply(*color);
        }
    }

    /// Apply an HLS shift to a single stop.
    pub fn adjust_stop_hls(&mut self, index: usize, adjustment: HlsAdjustment) -> Result<()> {
        let len = self.color_stops.len();
        let stop = self
            .color_stops
            .get_mut(index)
            .ok_or(GradientError::StopOutOfRange { index, len })?;
        stop.set_color(adjustment.apply(stop.color()));
        Ok(())
    }
}

/// Band lookup for posterized gradients: the stop at or above `position`
/// colors everything down to the next stop.
fn posterized_band(stops: &[ColorStop], position: f64) -> Rgba {
    for pair in stops.windows(2) {
        if pair[0].position <= position && position < pair[1].position {
            return pair[0].color();
        }
    }
    match stops.last() {
        Some(last) if position >= last.position => last.color(),
        _ => stops.first().map(ColorStop::color).unwrap_or(Rgba::FALLBACK_GRAY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(position: f64, r: u8, g: u8, b: u8) -> ColorStop {
        ColorStop::new(position, Rgba::opaque(r, g, b))
    }

    fn black_to_white() -> Gradient {
        Gradient::new("bw", 0.0, 100.0, vec![stop(1.0, 0, 0, 0), stop(0.0, 255, 255, 255)])
    }

    #[test]
    fn test_stops_sorted_on_create() {
        let g = black_to_white();
        assert_eq!(g.color_stops[0].position, 0.0);
        assert_eq!(g.color_stops[1].red, 0);
    }

    #[test]
    fn test_interpolation_truncates() {
        let g = black_to_white();
        assert_eq!(g.color_at(100.0), Rgba::WHITE);
        assert_eq!(g.color_at(0.0), Rgba::BLACK);
        // Clamped outside the range
        assert_eq!(g.color_at(500.0), Rgba::WHITE);
        assert_eq!(g.color_at(-50.0), Rgba::BLACK);
        // position 0.5 -> 255 - 0.5 * 255 = 127.5 -> 127
        assert_eq!(g.color_at(50.0), Rgba::opaque(127, 127, 127));
    }

    #[test]
    fn test_degenerate_stop_counts() {
        let mut g = black_to_white();
        g.color_stops.clear();
        assert_eq!(g.color_at(10.0), Rgba::FALLBACK_GRAY);
        g.color_stops.push(stop(0.3, 1, 2, 3));
        assert_eq!(g.color_at(10.0), Rgba::opaque(1, 2, 3));
    }

    #[test]
    fn test_discrete_uses_upper_stop() {
        let g = Gradient::new(
            "steps",
            0.0,
            100.0,
            vec![stop(0.0, 255, 0, 0), stop(0.5, 0, 255, 0), stop(1.0, 0, 0, 255)],
        )
        .with_discrete(true);
        assert_eq!(g.color_at(90.0), Rgba::opaque(255, 0, 0));
        assert_eq!(g.color_at(25.0), Rgba::opaque(0, 255, 0));
    }

    #[test]
    fn test_posterized_bands() {
        let mut g = Gradient::new(
            "poster",
            0.0,
            100.0,
            vec![stop(0.0, 255, 0, 0), stop(0.5, 255, 255, 0), stop(1.0, 0, 0, 255)],
        )
        .with_type(GradientType::Posterized);

        assert_eq!(g.color_at(80.0), Rgba::opaque(255, 0, 0));
        assert_eq!(g.color_at(20.0), Rgba::opaque(255, 255, 0));
        // Exactly on the last stop
        assert_eq!(g.color_at(0.0), Rgba::opaque(0, 0, 255));
        // Above the top stop without an above color
        assert_eq!(g.color_at(150.0), Rgba::opaque(255, 0, 0));
        assert!(!g.is_above_posterized(150.0));

        g.below_gradient_color = Some(Rgba::opaque(9, 9, 9));
        assert_eq!(g.color_at(150.0), Rgba::opaque(9, 9, 9));
        assert!(g.is_above_posterized(150.0));
        assert!(!g.is_above_posterized(100.0));
    }

    #[test]
    fn test_posterized_inner_stops() {
        let g = Gradient::new(
            "inner",
            0.0,
            100.0,
            vec![stop(0.2, 255, 0, 0), stop(0.8, 0, 255, 0)],
        )
        .with_type(GradientType::ShadingAndPosterized);
        // Top stop sits at elevation 80, bottom at 20
        assert_eq!(g.color_at(79.0), Rgba::opaque(255, 0, 0));
        assert_eq!(g.color_at(10.0), Rgba::opaque(0, 255, 0));
    }

    #[test]
    fn test_feet_and_unknown_units() {
        let json = r#"{"name": "legacy", "min_elevation": 0, "max_elevation": 1000, "units": "feet"}"#;
        let mut g: Gradient = serde_json::from_str(json).unwrap();
        g.normalize();
        assert_eq!(g.units, ElevationUnits::Meters);
        assert!((g.max_elevation - 304.8).abs() < 1e-9);

        let json = r#"{"name": "odd", "units": "fathoms"}"#;
        let mut g: Gradient = serde_json::from_str(json).unwrap();
        g.normalize();
        assert_eq!(g.units, ElevationUnits::Meters);
        assert_eq!((g.min_elevation, g.max_elevation), (0.0, 1000.0));
        assert_eq!(g.light_direction, 315);
        assert_eq!(g.blending_mode, "Multiply");
    }

    #[test]
    fn test_elevation_range_by_units() {
        let g = black_to_white();
        assert_eq!(g.elevation_range(Some((5.0, 6.0))), (0.0, 100.0));
        let g = g.with_units(ElevationUnits::Percent);
        assert_eq!(g.elevation_range(Some((5.0, 6.0))), (5.0, 6.0));
        assert_eq!(g.elevation_range(None), (0.0, 100.0));
    }

    #[test]
    fn test_gradient_type_flags() {
        assert!(!GradientType::Gradient.has_shading());
        assert!(!GradientType::Posterized.has_shading());
        assert!(GradientType::ShadedRelief.has_shading());
        assert!(GradientType::ShadingAndPosterized.has_shading());
        assert!(GradientType::ShadingAndPosterized.is_posterized());
        assert_eq!(
            serde_json::to_string(&GradientType::ShadingAndGradient).unwrap(),
            "\"shading_and_gradient\""
        );
    }

    #[test]
    fn test_adjust_hls_touches_special_colors() {
        let mut g = black_to_white();
        g.shadow_color = Some(Rgba::opaque(100, 100, 100));
        g.adjust_hls(HlsAdjustment::new(0.0, -100.0, 0.0));
        assert!(g.color_stops.iter().all(|s| s.color() == Rgba::BLACK));
        assert_eq!(g.shadow_color, Some(Rgba::BLACK));
        assert_eq!(g.no_data_color, None);

        assert!(g.adjust_stop_hls(5, HlsAdjustment::default()).is_err());
    }
}
