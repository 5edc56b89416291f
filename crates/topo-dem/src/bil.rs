//! BIL (band interleaved by line) elevation files: `.dem`/`.bil` raw samples
//! with `.hdr` header, optional `.prj` projection and `.stx` statistics.

use crate::{DemError, ElevationGrid, GeoBounds, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// No-data value written to BIL and GeoTIFF outputs.
pub const OUTPUT_NODATA: i16 = -9999;

/// Sample byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Motorola, big-endian (`M`).
    BigEndian,
    /// Intel, little-endian (`I`).
    LittleEndian,
}

impl ByteOrder {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "M" | "MSBFIRST" => ByteOrder::BigEndian,
            _ => ByteOrder::LittleEndian,
        }
    }
}

/// Parsed `.hdr` header.
#[derive(Debug, Clone, PartialEq)]
pub struct BilHeader {
    pub nrows: usize,
    pub ncols: usize,
    pub nbits: u32,
    pub nodata: f64,
    /// Longitude of the center of the upper-left pixel.
    pub ulxmap: f64,
    /// Latitude of the center of the upper-left pixel.
    pub ulymap: f64,
    pub xdim: f64,
    pub ydim: f64,
    pub byte_order: ByteOrder,
    pub layout: Option<String>,
    /// Every key/value pair as read, keys uppercased.
    pub entries: BTreeMap<String, String>,
}

const REQUIRED_FIELDS: [&str; 8] = [
    "NROWS", "NCOLS", "NBITS", "NODATA", "ULXMAP", "ULYMAP", "XDIM", "YDIM",
];

impl BilHeader {
    /// Read and parse a header file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DemError::MissingHeader(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    /// Parse header text. `path` is only used for error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for line in text.lines() {
            let mut parts = line.split_whitespace();
            let (Some(key), Some(first)) = (parts.next(), parts.next()) else {
                continue;
            };
            let mut value = first.to_string();
            for rest in parts {
                value.push(' ');
                value.push_str(rest);
            }
            entries.insert(key.to_ascii_uppercase(), value);
        }

        for field in REQUIRED_FIELDS {
            if !entries.contains_key(field) {
                return Err(DemError::MissingHeaderField {
                    path: path.to_path_buf(),
                    field,
                });
            }
        }

        let byte_order = entries
            .get("BYTEORDER")
            .map(|v| ByteOrder::parse(v))
            .unwrap_or(ByteOrder::BigEndian);

        Ok(Self {
            nrows: parse_field(&entries, "NROWS")?,
            ncols: parse_field(&entries, "NCOLS")?,
            nbits: parse_field(&entries, "NBITS")?,
            nodata: parse_field(&entries, "NODATA")?,
            ulxmap: parse_field(&entries, "ULXMAP")?,
            ulymap: parse_field(&entries, "ULYMAP")?,
            xdim: parse_field(&entries, "XDIM")?,
            ydim: parse_field(&entries, "YDIM")?,
            byte_order,
            layout: entries.get("LAYOUT").cloned(),
            entries,
        })
    }

    /// Build the header describing `width x height` samples covering `bounds`.
    pub fn for_grid(width: usize, height: usize, bounds: &GeoBounds) -> Self {
        let xdim = bounds.width_deg() / width.max(1) as f64;
        let ydim = bounds.height_deg() / height.max(1) as f64;
        Self {
            nrows: height,
            ncols: width,
            nbits: 16,
            nodata: OUTPUT_NODATA as f64,
            ulxmap: bounds.west + xdim / 2.0,
            ulymap: bounds.north - ydim / 2.0,
            xdim,
            ydim,
            byte_order: ByteOrder::BigEndian,
            layout: Some("BIL".to_string()),
            entries: BTreeMap::new(),
        }
    }

    /// Geographic bounds of the raster edges (not pixel centers).
    pub fn bounds(&self) -> GeoBounds {
        let west = self.ulxmap - self.xdim / 2.0;
        let north = self.ulymap + self.ydim / 2.0;
        GeoBounds::new(
            west,
            north,
            west + self.ncols as f64 * self.xdim,
            north - self.nrows as f64 * self.ydim,
        )
    }

    /// Render the header in the 15-column `KEY value` layout used for written files.
    pub fn to_hdr_string(&self) -> String {
        let order = match self.byte_order {
            ByteOrder::BigEndian => "M",
            ByteOrder::LittleEndian => "I",
        };
        let row_bytes = self.ncols * (self.nbits as usize / 8);
        let lines: [(&str, String); 14] = [
            ("BYTEORDER", order.to_string()),
            ("LAYOUT", self.layout.clone().unwrap_or_else(|| "BIL".into())),
            ("NROWS", self.nrows.to_string()),
            ("NCOLS", self.ncols.to_string()),
            ("NBANDS", "1".into()),
            ("NBITS", self.nbits.to_string()),
            ("BANDROWBYTES", row_bytes.to_string()),
            ("TOTALROWBYTES", row_bytes.to_string()),
            ("BANDGAPBYTES", "0".into()),
            ("NODATA", format!("{}", self.nodata as i64)),
            ("ULXMAP", self.ulxmap.to_string()),
            ("ULYMAP", self.ulymap.to_string()),
            ("XDIM", self.xdim.to_string()),
            ("YDIM", self.ydim.to_string()),
        ];
        let mut out = String::new();
        for (key, value) in lines {
            out.push_str(&format!("{key:<15}{value}\n"));
        }
        out
    }
}

fn parse_field<T: std::str::FromStr>(entries: &BTreeMap<String, String>, field: &str) -> Result<T> {
    let raw = entries.get(field).map(String::as_str).unwrap_or_default();
    raw.trim().parse().or_else(|_| {
        // Integer fields are sometimes written as "6000.0"
        raw.trim()
            .parse::<f64>()
            .ok()
            .and_then(|v| format!("{}", v as i64).parse().ok())
            .ok_or_else(|| DemError::InvalidHeaderValue {
                field: field.to_string(),
                value: raw.to_string(),
            })
    })
}

// ============================================================================
// Projection and statistics sidecars
// ============================================================================

/// Contents of a `.prj` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionInfo {
    /// `KEY value` lines as written (ESRI style).
    pub entries: BTreeMap<String, String>,
    /// Datum name, when one could be found.
    pub datum: Option<String>,
    /// Human-readable classification.
    pub description: String,
}

/// Read and validate a projection file.
///
/// Projected coordinate systems are rejected. Unrecognized formats are
/// accepted with a warning.
pub fn read_projection<P: AsRef<Path>>(path: P) -> Result<ProjectionInfo> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let mut info = ProjectionInfo::default();

    for line in text.lines() {
        let mut parts = line.split_whitespace();
        if let (Some(key), Some(first)) = (parts.next(), parts.next()) {
            let value = std::iter::once(first).chain(parts).collect::<Vec<_>>().join(" ");
            info.entries.insert(key.to_string(), value);
        }
    }

    let upper = text.to_ascii_uppercase();
    if upper.contains("PROJECTION") && upper.contains("GEOGRAPHIC") {
        let datum = upper
            .lines()
            .find(|l| l.contains("DATUM"))
            .and_then(|l| l.split_whitespace().nth(1))
            .unwrap_or("Unknown");
        info.description = format!("Geographic coordinate system (Datum: {datum})");
        info.datum = info
            .entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("datum"))
            .map(|(_, v)| v.clone());
    } else if upper.contains("GEOGCS[") && !upper.contains("PROJCS[") {
        info.description = "Geographic coordinate system (WKT format)".to_string();
        info.datum = wkt_quoted_after(&text, "DATUM[");
    } else if upper.contains("PROJCS[") {
        let projection = upper
            .find("PROJECTION[")
            .and_then(|start| {
                let rest = &upper[start + "PROJECTION[".len()..];
                rest.find(']').map(|end| rest[..end].trim_matches('"').to_string())
            })
            .unwrap_or_else(|| "Unknown".to_string());
        return Err(DemError::ProjectedCoordinateSystem { projection });
    } else {
        warn!(path = %path.display(), "Unknown coordinate system format, assuming geographic");
        info.description = format!("Unknown coordinate system format in {}", file_name(path));
    }

    Ok(info)
}

fn wkt_quoted_after(text: &str, marker: &str) -> Option<String> {
    let upper = text.to_ascii_uppercase();
    let start = upper.find(marker)? + marker.len();
    let rest = &text[start..];
    let open = rest.find('"')?;
    let close = rest[open + 1..].find('"')?;
    Some(rest[open + 1..open + 1 + close].to_string())
}

/// Band statistics from a `.stx` file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandStats {
    pub band: u32,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
}

/// Read the first line of a statistics file. Returns `None` when it has fewer than five fields.
pub fn read_stats<P: AsRef<Path>>(path: P) -> Result<Option<BandStats>> {
    let text = std::fs::read_to_string(path)?;
    let Some(line) = text.lines().next() else {
        return Ok(None);
    };
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 {
        return Ok(None);
    }
    let num = |i: usize| -> Result<f64> {
        parts[i].parse().map_err(|_| DemError::InvalidHeaderValue {
            field: "STX".to_string(),
            value: parts[i].to_string(),
        })
    };
    Ok(Some(BandStats {
        band: num(0)? as u32,
        min: num(1)?,
        max: num(2)?,
        mean: num(3)?,
        stddev: num(4)?,
    }))
}

// ============================================================================
// Sample data
// ============================================================================

/// Read the samples of a BIL file into a grid, converting no-data to `NaN`.
///
/// `subsample` keeps every n-th row and column.
pub fn read_bil_data<P: AsRef<Path>>(
    path: P,
    header: &BilHeader,
    subsample: Option<usize>,
) -> Result<ElevationGrid> {
    let path = path.as_ref();
    let bytes_per_sample = match header.nbits {
        16 => 2,
        32 => 4,
        other => return Err(DemError::UnsupportedBitDepth(other)),
    };

    let expected = header.nrows * header.ncols * bytes_per_sample;
    let mut raw = Vec::with_capacity(expected);
    File::open(path)?.read_to_end(&mut raw)?;
    if raw.len() < expected {
        return Err(DemError::InvalidData(format!(
            "{} holds {} bytes, header requires {}",
            path.display(),
            raw.len(),
            expected
        )));
    }

    let nodata = header.nodata;
    let big = header.byte_order == ByteOrder::BigEndian;
    let data: Vec<f32> = raw[..expected]
        .chunks_exact(bytes_per_sample)
        .map(|b| {
            let v = match (bytes_per_sample, big) {
                (2, true) => i16::from_be_bytes([b[0], b[1]]) as f64,
                (2, false) => i16::from_le_bytes([b[0], b[1]]) as f64,
                (_, true) => i32::from_be_bytes([b[0], b[1], b[2], b[3]]) as f64,
                (_, false) => i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64,
            };
            if v == nodata {
                f32::NAN
            } else {
                v as f32
            }
        })
        .collect();

    let grid = ElevationGrid::new(header.ncols, header.nrows, data)?;
    debug!(
        path = %path.display(),
        width = header.ncols,
        height = header.nrows,
        "Loaded BIL samples"
    );
    Ok(match subsample {
        Some(step) if step > 1 => grid.subsample(step),
        _ => grid,
    })
}

fn encode_sample(v: f32) -> [u8; 2] {
    let s = if v.is_nan() { OUTPUT_NODATA } else { v as i16 };
    s.to_be_bytes()
}

/// Path of the header that accompanies a data file.
pub fn header_path(data_path: &Path) -> PathBuf {
    data_path.with_extension("hdr")
}

/// Write `grid` as a big-endian 16-bit BIL file plus `.hdr`.
///
/// `NaN` samples become -9999. Returns the header path.
pub fn write_bil<P: AsRef<Path>>(path: P, grid: &ElevationGrid, bounds: &GeoBounds) -> Result<PathBuf> {
    let path = path.as_ref();
    let mut writer = BilWriter::create(path, grid.width(), grid.height(), bounds)?;
    for row in grid.rows() {
        writer.write_row(row)?;
    }
    writer.finish()
}

/// Streaming BIL writer that accepts rows from north to south.
///
/// Used by chunked assembly so the full output never has to be held in memory.
#[derive(Debug)]
pub struct BilWriter {
    out: BufWriter<File>,
    header: BilHeader,
    header_path: PathBuf,
    rows_written: usize,
}

impl BilWriter {
    /// Create the data file and write the header immediately.
    pub fn create<P: AsRef<Path>>(path: P, width: usize, height: usize, bounds: &GeoBounds) -> Result<Self> {
        let path = path.as_ref();
        let header = BilHeader::for_grid(width, height, bounds);
        let header_path = header_path(path);
        std::fs::write(&header_path, header.to_hdr_string())?;
        Ok(Self {
            out: BufWriter::new(File::create(path)?),
            header,
            header_path,
            rows_written: 0,
        })
    }

    /// Append one row of samples. Shorter rows are padded with no-data.
    pub fn write_row(&mut self, row: &[f32]) -> Result<()> {
        if self.rows_written >= self.header.nrows {
            return Err(DemError::InvalidData(format!(
                "attempted to write more than {} rows",
                self.header.nrows
            )));
        }
        let width = self.header.ncols;
        let mut buf = Vec::with_capacity(width * 2);
        for x in 0..width {
            buf.extend_from_slice(&encode_sample(row.get(x).copied().unwrap_or(f32::NAN)));
        }
        self.out.write_all(&buf)?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Pad any missing rows with no-data and flush. Returns the header path.
    pub fn finish(mut self) -> Result<PathBuf> {
        while self.rows_written < self.header.nrows {
            self.write_row(&[])?;
        }
        self.out.flush()?;
        Ok(self.header_path)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const GTOPO_HDR: &str = "BYTEORDER      M
LAYOUT       BIL
NROWS         6000
NCOLS         4800
NBANDS        1
NBITS         16
BANDROWBYTES         9600
TOTALROWBYTES        9600
BANDGAPBYTES         0
NODATA        -9999
ULXMAP        -179.99583333333334
ULYMAP        89.99583333333334
XDIM          0.00833333333333
YDIM          0.00833333333333
";

    #[test]
    fn test_parse_gtopo30_header() {
        let h = BilHeader::parse(GTOPO_HDR, Path::new("w180n90.hdr")).unwrap();
        assert_eq!(h.nrows, 6000);
        assert_eq!(h.ncols, 4800);
        assert_eq!(h.nbits, 16);
        assert_eq!(h.byte_order, ByteOrder::BigEndian);
        assert_eq!(h.layout.as_deref(), Some("BIL"));

        let b = h.bounds().normalized();
        assert_relative_eq!(b.west, -180.0, epsilon = 1e-6);
        assert_relative_eq!(b.north, 90.0, epsilon = 1e-6);
        assert_relative_eq!(b.east, -140.0, epsilon = 1e-4);
        assert_relative_eq!(b.south, 40.0, epsilon = 1e-4);
    }

    #[test]
    fn test_missing_required_field() {
        let err = BilHeader::parse("NROWS 10\nNCOLS 10\n", Path::new("x.hdr")).unwrap_err();
        assert!(matches!(err, DemError::MissingHeaderField { field: "NBITS", .. }));
    }

    #[test]
    fn test_header_round_trip_layout() {
        let bounds = GeoBounds::new(10.0, 20.0, 12.0, 19.0);
        let h = BilHeader::for_grid(4, 2, &bounds);
        let text = h.to_hdr_string();
        assert!(text.starts_with("BYTEORDER      M\n"));
        assert!(text.contains("BANDROWBYTES   8\n"));
        assert!(text.contains("NODATA         -9999\n"));
        assert!(text.contains("ULXMAP         10.25\n"));

        let parsed = BilHeader::parse(&text, Path::new("x.hdr")).unwrap();
        assert_eq!(parsed.bounds(), bounds);
    }

    #[test]
    fn test_read_projection_variants() {
        let dir = tempfile::TempDir::new().unwrap();

        let esri = dir.path().join("a.prj");
        std::fs::write(&esri, "Projection    GEOGRAPHIC\nDatum         WGS84\nZunits        METERS\n").unwrap();
        let info = read_projection(&esri).unwrap();
        assert_eq!(info.datum.as_deref(), Some("WGS84"));

        let wkt = dir.path().join("b.prj");
        std::fs::write(&wkt, r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137,298.257223563]]]"#).unwrap();
        let info = read_projection(&wkt).unwrap();
        assert_eq!(info.datum.as_deref(), Some("D_WGS_1984"));

        let utm = dir.path().join("c.prj");
        std::fs::write(&utm, r#"PROJCS["UTM_10N",GEOGCS["WGS84"],PROJECTION["Transverse_Mercator"]]"#).unwrap();
        let err = read_projection(&utm).unwrap_err();
        match err {
            DemError::ProjectedCoordinateSystem { projection } => {
                assert_eq!(projection, "TRANSVERSE_MERCATOR")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_write_and_read_bil() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tile.dem");
        let grid = ElevationGrid::new(3, 2, vec![1.0, 2.5, f32::NAN, -40.0, 1200.0, 8848.0]).unwrap();
        let bounds = GeoBounds::new(0.0, 2.0, 3.0, 0.0);

        let hdr = write_bil(&path, &grid, &bounds).unwrap();
        assert_eq!(hdr, dir.path().join("tile.hdr"));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 12);

        let header = BilHeader::from_file(&hdr).unwrap();
        let read = read_bil_data(&path, &header, None).unwrap();
        assert_eq!(read.get(0, 0), Some(1.0));
        assert_eq!(read.get(1, 0), Some(2.0)); // truncated to i16
        assert!(read.get(2, 0).unwrap().is_nan());
        assert_eq!(read.get(2, 1), Some(8848.0));
    }

    #[test]
    fn test_little_endian_32_bit() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("le.bil");
        let mut bytes = Vec::new();
        for v in [100i32, -5, 7, -9999] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        std::fs::write(&path, bytes).unwrap();
        let text = "BYTEORDER I\nNROWS 2\nNCOLS 2\nNBITS 32\nNODATA -9999\nULXMAP 0.5\nULYMAP 1.5\nXDIM 1\nYDIM 1\n";
        let header = BilHeader::parse(text, Path::new("le.hdr")).unwrap();
        let grid = read_bil_data(&path, &header, None).unwrap();
        assert_eq!(grid.data()[..3], [100.0, -5.0, 7.0]);
        assert!(grid.data()[3].is_nan());
    }

    #[test]
    fn test_unsupported_bit_depth() {
        let header = BilHeader::parse(
            "NROWS 1\nNCOLS 1\nNBITS 8\nNODATA 0\nULXMAP 0\nULYMAP 0\nXDIM 1\nYDIM 1\n",
            Path::new("x.hdr"),
        )
        .unwrap();
        let err = read_bil_data("missing.bil", &header, None).unwrap_err();
        assert!(matches!(err, DemError::UnsupportedBitDepth(8)));
    }
}
