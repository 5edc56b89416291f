//! Coordinate parsing, formatting, snapping and clamping.

use crate::database::DatasetSummary;
use tracing::warn;

/// Width in degrees above which a database is treated as global.
const GLOBAL_WIDTH_DEG: f64 = 359.99;

/// Extent and pixel size of a database, used to snap and clamp coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatabaseBounds {
    pub west: f64,
    pub north: f64,
    pub east: f64,
    pub south: f64,
    pub width_pixels: usize,
    pub height_pixels: usize,
}

impl DatabaseBounds {
    /// Bounds of a tile database, if it has any tiles.
    pub fn from_summary(summary: &DatasetSummary) -> Option<Self> {
        let b = summary.bounds?;
        Some(Self {
            west: b.west,
            north: b.north,
            east: b.east,
            south: b.south,
            width_pixels: summary.total_width_pixels,
            height_pixels: summary.total_height_pixels,
        })
    }

    fn is_global(&self) -> bool {
        (self.east - self.west).abs() >= GLOBAL_WIDTH_DEG
    }
}

fn hemisphere(value: f64, is_longitude: bool) -> char {
    match (is_longitude, value >= 0.0) {
        (true, true) => 'E',
        (true, false) => 'W',
        (false, true) => 'N',
        (false, false) => 'S',
    }
}

/// Format decimal degrees as `D°MM'SS"H`, keeping three decimals of seconds when fractional.
pub fn float_to_dms(value: f64, is_longitude: bool) -> String {
    let hemi = hemisphere(value, is_longitude);
    let abs = value.abs();
    let mut degrees = abs.trunc() as i64;
    let minutes_f = (abs - degrees as f64) * 60.0;
    let mut minutes = minutes_f.trunc() as i64;
    let mut seconds = (((minutes_f - minutes as f64) * 60.0) * 10_000.0).round() / 10_000.0;

    if seconds >= 60.0 {
        seconds = 0.0;
        minutes += 1;
        if minutes >= 60 {
            minutes = 0;
            degrees += 1;
        }
    }

    if seconds.fract() == 0.0 {
        format!("{degrees}°{minutes:02}'{:02}\"{hemi}", seconds as i64)
    } else {
        format!("{degrees}°{minutes:02}'{seconds:06.3}\"{hemi}")
    }
}

/// First run of digits and dots in `s`, with the byte offset just past it.
fn first_number(s: &str) -> Option<(&str, usize)> {
    let start = s.find(|c: char| c.is_ascii_digit() || c == '.')?;
    let len = s[start..]
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(s.len() - start);
    Some((&s[start..start + len], start + len))
}

fn parse_f64(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok()
}

fn parse_dms_lenient(text: &str) -> Option<f64> {
    let upper = text.to_uppercase();
    let negative = upper.contains(['W', 'S', '-']);
    let clean = text.replace('-', " ");

    let mut minutes = 0.0;
    let mut seconds = 0.0;
    let (degrees, mut remaining) = match clean.find('°') {
        Some(pos) if pos > 0 => (parse_f64(&clean[..pos])?, &clean[pos + '°'.len_utf8()..]),
        _ => {
            let numeric: String = clean.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
            let degrees = if numeric.is_empty() { 0.0 } else { parse_f64(&numeric)? };
            (degrees, "")
        }
    };

    if !remaining.is_empty() {
        match remaining.find('\'') {
            Some(pos) if pos > 0 => {
                minutes = parse_f64(&remaining[..pos])?;
                remaining = &remaining[pos + 1..];
            }
            _ => match first_number(remaining) {
                Some((num, end)) => {
                    minutes = parse_f64(num)?;
                    remaining = &remaining[end..];
                }
                None => remaining = "",
            },
        }
    }

    if !remaining.is_empty() {
        match remaining.find('"') {
            Some(pos) if pos > 0 => seconds = parse_f64(&remaining[..pos])?,
            _ => {
                if let Some((num, _)) = first_number(remaining) {
                    seconds = parse_f64(num)?;
                }
            }
        }
    }

    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    Some(if negative { -value.abs() } else { value })
}

/// Lenient conversion of decimal or DMS text to degrees. W and S are negative.
///
/// Unparsable text logs a warning and yields `0.0`.
pub fn dms_to_float(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }

    if !text.contains(['°', '\'', '"']) {
        let upper = text.to_uppercase();
        let numeric: String = upper.chars().filter(|c| !matches!(c, 'N' | 'S' | 'E' | 'W')).collect();
        if let Some(v) = parse_f64(&numeric) {
            return if upper.contains(['W', 'S']) { -v.abs() } else { v };
        }
    }

    parse_dms_lenient(text).unwrap_or_else(|| {
        warn!(input = text, "Could not parse coordinate");
        0.0
    })
}

/// `-?\d+`
fn whole_degrees(s: &str) -> Option<f64> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// `\d+(\.\d+)?`
fn unsigned_decimal(s: &str) -> Option<f64> {
    let (int, frac) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };
    let digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    if !digits(int) || frac.is_some_and(|f| !digits(f)) {
        return None;
    }
    s.parse().ok()
}

fn signed_for(value: f64, hemi: char) -> f64 {
    if matches!(hemi, 'S' | 'W') {
        -value
    } else {
        value
    }
}

/// Strict coordinate parsing for user input.
///
/// Accepts `D°M'S"H`, `D°M"H`, `D°H` and plain decimals. Minutes or seconds
/// of 60 or more are rejected.
pub fn parse_coordinate_input(input: &str) -> Option<f64> {
    let text = input.trim().to_uppercase();
    if text.is_empty() {
        return None;
    }

    if let Some((deg, rest)) = text.split_once('°') {
        let hemi = rest.chars().last().filter(|c| matches!(c, 'N' | 'S' | 'E' | 'W'))?;
        let body = &rest[..rest.len() - hemi.len_utf8()];
        let degrees = whole_degrees(deg)?;

        if body.is_empty() {
            return Some(signed_for(degrees, hemi));
        }
        let inner = body.strip_suffix('"')?;
        let (minutes, seconds) = match inner.split_once('\'') {
            Some((m, s)) => (m, Some(s)),
            None => (inner, None),
        };
        if minutes.is_empty() || !minutes.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let minutes: f64 = minutes.parse().ok()?;
        let seconds = match seconds {
            Some(s) => unsigned_decimal(s)?,
            None => 0.0,
        };
        if minutes >= 60.0 || seconds >= 60.0 {
            return None;
        }
        return Some(signed_for(degrees + minutes / 60.0 + seconds / 3600.0, hemi));
    }

    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Round to the nearest pixel edge, counted from the west (or south) edge.
pub fn snap_to_pixel_grid(value: f64, db: &DatabaseBounds, is_longitude: bool) -> f64 {
    if db.width_pixels == 0 || db.height_pixels == 0 {
        return value;
    }
    let (origin, per_pixel) = if is_longitude {
        (db.west, (db.east - db.west).abs() / db.width_pixels as f64)
    } else {
        (db.south, (db.north - db.south).abs() / db.height_pixels as f64)
    };
    if per_pixel <= 0.0 {
        return value;
    }
    origin + ((value - origin) / per_pixel).round() * per_pixel
}

/// Keep a coordinate inside the database.
///
/// Global databases allow longitudes within 360° of `other_longitude`
/// (or within ±540° without one) so selections may cross the antimeridian.
pub fn clamp_to_database_bounds(value: f64, db: &DatabaseBounds, is_longitude: bool, other_longitude: Option<f64>) -> f64 {
    if !is_longitude {
        return value.min(db.north).max(db.south);
    }
    if db.is_global() {
        match other_longitude {
            Some(other) => value.min(other + 360.0).max(other - 360.0),
            None => value.clamp(-540.0, 540.0),
        }
    } else {
        value.min(db.east).max(db.west)
    }
}

/// Parse, clamp, snap and format user input. Returns `None` for unparsable input.
pub fn validate_and_format_coordinate(
    input: &str,
    db: &DatabaseBounds,
    is_longitude: bool,
    use_dms: bool,
    other_longitude: Option<f64>,
) -> Option<(f64, String)> {
    let parsed = parse_coordinate_input(input)?;
    let clamped = clamp_to_database_bounds(parsed, db, is_longitude, other_longitude);

    let extended = is_longitude && db.is_global() && (clamped < db.west || clamped > db.east);
    let snapped = if extended {
        clamped
    } else {
        snap_to_pixel_grid(clamped, db, is_longitude)
    };
    Some((snapped, format_coordinate_clean(snapped, is_longitude, use_dms)))
}

/// Decimal without trailing zeros (whole numbers without a point), or DMS.
pub fn format_coordinate_clean(value: f64, is_longitude: bool, use_dms: bool) -> String {
    if use_dms {
        return float_to_dms(value, is_longitude);
    }
    if (value - value.round()).abs() < 1e-10 {
        format!("{value:.0}")
    } else {
        let s = format!("{value:.6}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn distance_decimals(value: f64) -> usize {
    if value < 1.0 {
        2
    } else if value < 100.0 {
        1
    } else {
        0
    }
}

/// `"X km (Y mi.)"` for a distance in miles.
pub fn format_distance_km_miles(miles: f64) -> String {
    let km = miles * 1.609344;
    format!(
        "{km:.kd$} km ({miles:.md$} mi.)",
        kd = distance_decimals(km),
        md = distance_decimals(miles)
    )
}
