//! Geographic bounding boxes.

use serde::{Deserialize, Serialize};

const SNAP_TOLERANCE: f64 = 1e-10;

/// Geographic bounds of a raster or selection, in decimal degrees.
///
/// East may exceed 180 (or west fall below -180) when a selection
/// wraps across the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    /// Western edge (longitude).
    pub west: f64,
    /// Northern edge (latitude).
    pub north: f64,
    /// Eastern edge (longitude).
    pub east: f64,
    /// Southern edge (latitude).
    pub south: f64,
}

impl GeoBounds {
    pub const fn new(west: f64, north: f64, east: f64, south: f64) -> Self {
        Self {
            west,
            north,
            east,
            south,
        }
    }

    /// The whole globe.
    pub const fn world() -> Self {
        Self::new(-180.0, 90.0, 180.0, -90.0)
    }

    /// Build from a `[west, north, east, south]` array.
    pub fn from_array(a: [f64; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.west, self.north, self.east, self.south]
    }

    pub fn width_deg(&self) -> f64 {
        self.east - self.west
    }

    pub fn height_deg(&self) -> f64 {
        self.north - self.south
    }

    /// Check if a coordinate is within the bounds.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }

    /// True when the boxes overlap or touch.
    pub fn intersects(&self, other: &GeoBounds) -> bool {
        !(self.east < other.west
            || self.west > other.east
            || self.south > other.north
            || self.north < other.south)
    }

    /// Overlapping region, or `None` when the boxes do not overlap with positive area.
    pub fn intersection(&self, other: &GeoBounds) -> Option<GeoBounds> {
        let west = self.west.max(other.west);
        let east = self.east.min(other.east);
        let north = self.north.min(other.north);
        let south = self.south.max(other.south);
        if west < east && south < north {
            Some(GeoBounds::new(west, north, east, south))
        } else {
            None
        }
    }

    /// A wrapped selection (west > east) with east moved past 180.
    pub fn unwrapped(&self) -> GeoBounds {
        if self.west > self.east {
            GeoBounds::new(self.west, self.north, self.east + 360.0, self.south)
        } else {
            *self
        }
    }

    /// Shift both longitudes by `delta` degrees.
    pub fn shifted(&self, delta: f64) -> GeoBounds {
        GeoBounds::new(self.west + delta, self.north, self.east + delta, self.south)
    }

    /// Snap edges that are within floating-point noise of a round value, then round to 6 decimals.
    pub fn normalized(&self) -> GeoBounds {
        let near = |v: f64, target: f64| (v - target).abs() < SNAP_TOLERANCE;

        let west = if near(self.west, 0.0) { 0.0 } else { self.west };
        let north = if near(self.north, 90.0) {
            90.0
        } else {
            self.north
        };
        let east = if near(self.east, 90.0) {
            90.0
        } else if near(self.east, 180.0) {
            180.0
        } else if near(self.east, 0.0) {
            0.0
        } else {
            self.east
        };
        let south = if near(self.south, 0.0) {
            0.0
        } else if near(self.south, -90.0) {
            -90.0
        } else {
            self.south
        };

        GeoBounds::new(round6(west), round6(north), round6(east), round6(south))
    }

    /// Short human-readable description, e.g. `"-180.0°W, 90.0°N, -140.0°W, 40.0°N"`.
    pub fn describe(&self) -> String {
        let ew = |v: f64| if v >= 0.0 { 'E' } else { 'W' };
        let ns = |v: f64| if v >= 0.0 { 'N' } else { 'S' };
        format!(
            "{:.1}°{}, {:.1}°{}, {:.1}°{}, {:.1}°{}",
            self.west,
            ew(self.west),
            self.north,
            ns(self.north),
            self.east,
            ew(self.east),
            self.south,
            ns(self.south)
        )
    }
}

fn round6(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

impl std::fmt::Display for GeoBounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "W {:.4}, N {:.4}, E {:.4}, S {:.4}",
            self.west, self.north, self.east, self.south
        )
    }
}
