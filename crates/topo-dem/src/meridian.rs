//! Longitude arithmetic for selections that cross the antimeridian.
//!
//! A selection is described by a west and an east longitude. When west is
//! numerically greater than east (after normalization), or either edge lies
//! outside -180..180, the selection wraps through 180°.

use crate::GeoBounds;

const FULL_WORLD_TOLERANCE: f64 = 0.01;

/// Width and wrap information for a west/east longitude pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LongitudeSpan {
    /// Total width in degrees.
    pub width: f64,
    /// True when the span wraps through 180°.
    pub crosses_meridian: bool,
    /// First (or only) longitude range.
    pub region1: (f64, f64),
    /// Second range when the span crosses and does not cover the full world.
    pub region2: Option<(f64, f64)>,
}

/// Normalize a longitude to `(-180, 180]`, folding 180 onto -180.
pub fn normalize_longitude(lon: f64) -> f64 {
    let mut lon = lon;
    while lon > 180.0 {
        lon -= 360.0;
    }
    while lon <= -180.0 {
        lon += 360.0;
    }
    if (lon - 180.0).abs() < 1e-10 {
        lon = -180.0;
    }
    lon
}

fn is_full_world(west: f64, east: f64) -> bool {
    (west + 180.0).abs() < FULL_WORLD_TOLERANCE && (east - 180.0).abs() < FULL_WORLD_TOLERANCE
}

/// Compute the span between `west` and `east`.
pub fn longitude_span(west: f64, east: f64) -> LongitudeSpan {
    if is_full_world(west, east) {
        return LongitudeSpan {
            width: 360.0,
            crosses_meridian: true,
            region1: (-180.0, 180.0),
            region2: None,
        };
    }

    // A selection ending exactly on 180 from the west does not wrap.
    if (east - 180.0).abs() < FULL_WORLD_TOLERANCE
        && (-180.0..=180.0).contains(&west)
        && east - west > 0.0
        && east - west <= 180.0
    {
        return LongitudeSpan {
            width: east - west,
            crosses_meridian: false,
            region1: (west, east),
            region2: None,
        };
    }

    let west_n = normalize_longitude(west);
    let east_n = normalize_longitude(east);
    let crosses = east > 180.0 || west < -180.0 || west_n > east_n;

    if crosses {
        LongitudeSpan {
            width: (180.0 - west_n) + (east_n + 180.0),
            crosses_meridian: true,
            region1: (west_n, 180.0),
            region2: Some((-180.0, east_n)),
        }
    } else {
        let width = if west_n == east_n { 0.0 } else { east_n - west_n };
        LongitudeSpan {
            width,
            crosses_meridian: false,
            region1: (west_n, east_n),
            region2: None,
        }
    }
}

/// Map a longitude to a column in an output array of `array_width` columns
/// spanning `west..east`.
pub fn longitude_to_x(lon: f64, west: f64, east: f64, array_width: usize) -> i64 {
    let w = array_width as f64;

    if is_full_world(west, east) {
        let mut lon = lon;
        if lon > 180.0 {
            lon -= 360.0;
        } else if lon < -180.0 {
            lon += 360.0;
        }
        return ((lon + 180.0) / 360.0 * w) as i64;
    }

    let span = longitude_span(west, east);
    let lon_n = normalize_longitude(lon);

    if !span.crosses_meridian {
        let (west_n, east_n) = span.region1;
        if east_n == west_n {
            return 0;
        }
        // 180 normalizes to -180; put it back on the eastern edge when that is in range
        let lon_n = if lon_n < west_n && lon_n + 360.0 <= east_n {
            lon_n + 360.0
        } else {
            lon_n
        };
        return ((lon_n - west_n) / (east_n - west_n) * w) as i64;
    }

    let west_n = span.region1.0;
    let rel = if lon_n >= west_n {
        (lon_n - west_n) / span.width
    } else {
        ((180.0 - west_n) + (lon_n + 180.0)) / span.width
    };
    (rel * w) as i64
}

/// Split bounds into one region, or two when the longitude range wraps.
pub fn split_bounds(bounds: &GeoBounds) -> Vec<GeoBounds> {
    let span = longitude_span(bounds.west, bounds.east);
    let mut regions = vec![GeoBounds::new(
        span.region1.0,
        bounds.north,
        span.region1.1,
        bounds.south,
    )];
    if let Some((w, e)) = span.region2 {
        regions.push(GeoBounds::new(w, bounds.north, e, bounds.south));
    }
    regions
}

/// Output width in pixels for a longitude range at `pixels_per_degree`,
/// together with the wrap flag.
pub fn output_dimensions(west: f64, east: f64, pixels_per_degree: f64) -> (usize, bool) {
    let span = longitude_span(west, east);
    ((span.width * pixels_per_degree) as usize, span.crosses_meridian)
}
