//! Single-band GeoTIFF elevation rasters.

use crate::{DemError, ElevationGrid, GeoBounds, Result};
use std::fs::File;
use std::io::{BufWriter, Read, Seek};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;
use tracing::{debug, info};

const MODEL_PIXEL_SCALE: Tag = Tag::ModelPixelScaleTag; // 33550
const MODEL_TIEPOINT: Tag = Tag::ModelTiepointTag; // 33922
const GEO_KEY_DIRECTORY: Tag = Tag::GeoKeyDirectoryTag; // 34735
const GDAL_METADATA: Tag = Tag::Unknown(42112);
const GDAL_NODATA: Tag = Tag::GdalNodata; // 42113

const SAMPLE_WINDOW: usize = 100;
const MIN_ELEVATION_CONFIDENCE: f64 = 0.6;

const ELEVATION_KEYWORDS: [&str; 6] = ["elevation", "dem", "height", "altitude", "terrain", "meters"];
const IMAGE_KEYWORDS: [&str; 5] = ["image", "rgb", "photo", "picture", "imagery"];

/// Storage type of the raster samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    Float,
    U8,
    U16,
    OtherInteger,
}

/// Header-level description of a GeoTIFF.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoTiffInfo {
    pub width: usize,
    pub height: usize,
    pub bands: u32,
    pub sample_kind: SampleKind,
    pub bounds: GeoBounds,
    /// Degrees per pixel `(x, y)`.
    pub pixel_size: (f64, f64),
    pub nodata: Option<f64>,
    /// ASCII metadata tags (ImageDescription, GDAL metadata) used for classification.
    pub text_tags: Vec<String>,
}

/// Outcome of elevation-vs-imagery classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationCheck {
    pub is_elevation: bool,
    /// Share of the winning score, 0..1.
    pub confidence: f64,
    /// `elevation`, `uncertain`, `image` or `unknown`.
    pub detected: String,
    pub reasons: Vec<String>,
}

fn open_decoder(path: &Path) -> Result<Decoder<File>> {
    let file = File::open(path)?;
    let decoder = Decoder::new(file)?;

    // Global 30 arc-second rasters are 43200 x 21600 samples
    let mut limits = Limits::default();
    limits.decoding_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.intermediate_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.ifd_value_size = 1024 * 1024 * 1024;
    Ok(decoder.with_limits(limits))
}

fn decode_samples(result: DecodingResult) -> (SampleKind, Vec<f32>) {
    match result {
        DecodingResult::F32(data) => (SampleKind::Float, data),
        DecodingResult::F64(data) => (SampleKind::Float, data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U8(data) => (SampleKind::U8, data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U16(data) => (SampleKind::U16, data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I16(data) => (SampleKind::OtherInteger, data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I32(data) => (SampleKind::OtherInteger, data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U32(data) => (SampleKind::OtherInteger, data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I8(data) => (SampleKind::OtherInteger, data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U64(data) => (SampleKind::OtherInteger, data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I64(data) => (SampleKind::OtherInteger, data.into_iter().map(|v| v as f32).collect()),
    }
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>, width: usize, height: usize) -> Result<(GeoBounds, (f64, f64))> {
    let tiepoint = decoder.get_tag_f64_vec(MODEL_TIEPOINT);
    let pixel_scale = decoder.get_tag_f64_vec(MODEL_PIXEL_SCALE);

    match (tiepoint, pixel_scale) {
        (Ok(tiepoint), Ok(scale)) if tiepoint.len() >= 6 && scale.len() >= 2 => {
            // Tiepoint format: [i, j, k, x, y, z] with (i, j) the raster position of (x, y)
            let west = tiepoint[3] - tiepoint[0] * scale[0];
            let north = tiepoint[4] + tiepoint[1] * scale[1];
            let bounds = GeoBounds::new(
                west,
                north,
                west + width as f64 * scale[0],
                north - height as f64 * scale[1],
            );
            Ok((bounds, (scale[0], scale[1])))
        }
        _ => Err(DemError::InvalidGeoTiff(
            "missing ModelTiepoint or ModelPixelScale tag".to_string(),
        )),
    }
}

/// Read tags and the first chunk, then classify the file.
///
/// Returns the header description and the classification; nothing is rejected here.
pub fn inspect_geotiff<P: AsRef<Path>>(path: P) -> Result<(GeoTiffInfo, ElevationCheck)> {
    let path = path.as_ref();
    let mut decoder = open_decoder(path)?;
    let (w, h) = decoder.dimensions()?;
    let (width, height) = (w as usize, h as usize);
    let bands = decoder.get_tag_u32(Tag::SamplesPerPixel).unwrap_or(1);
    let (bounds, pixel_size) = read_geotransform(&mut decoder, width, height)?;
    let nodata = decoder
        .get_tag_ascii_string(GDAL_NODATA)
        .ok()
        .and_then(|s| s.trim().trim_end_matches('\0').parse().ok());

    let mut text_tags = Vec::new();
    for tag in [Tag::ImageDescription, GDAL_METADATA] {
        if let Ok(text) = decoder.get_tag_ascii_string(tag) {
            text_tags.push(text);
        }
    }

    let chunk_dims = decoder.chunk_data_dimensions(0);
    let (sample_kind, chunk) = decode_samples(decoder.read_chunk(0)?);

    let window = if bands == 1 {
        let (cw, ch) = (chunk_dims.0 as usize, chunk_dims.1 as usize);
        let mut window = Vec::new();
        for y in 0..ch.min(SAMPLE_WINDOW) {
            let row = chunk.get(y * cw..(y * cw + cw.min(SAMPLE_WINDOW)));
            window.extend(row.into_iter().flatten().copied());
        }
        Some(window)
    } else {
        None
    };

    let info = GeoTiffInfo {
        width,
        height,
        bands,
        sample_kind,
        bounds,
        pixel_size,
        nodata,
        text_tags,
    };
    let check = validate_elevation(&info, window.as_deref());
    debug!(
        path = %path.display(),
        detected = %check.detected,
        confidence = check.confidence,
        "Classified GeoTIFF"
    );
    Ok((info, check))
}

/// Score whether a raster holds elevation values or imagery.
///
/// `window` is a top-left sample of the first band, used only for single-band files.
pub fn validate_elevation(info: &GeoTiffInfo, window: Option<&[f32]>) -> ElevationCheck {
    let mut reasons = Vec::new();
    let mut elevation = 0u32;
    let mut image = 0u32;

    if info.bands == 1 {
        elevation += 3;
        reasons.push("single band".to_string());
    } else if info.bands >= 3 {
        image += 3;
        reasons.push(format!("{} bands (RGB/RGBA imagery)", info.bands));
    }

    match info.sample_kind {
        SampleKind::Float => {
            elevation += 2;
            reasons.push("floating point data".to_string());
        }
        SampleKind::U8 => {
            image += 2;
            reasons.push("8-bit integer data (typical for images)".to_string());
        }
        SampleKind::U16 => {
            image += 1;
            reasons.push("16-bit integer data".to_string());
        }
        SampleKind::OtherInteger => {}
    }

    if info.bands == 1 {
        if let Some(window) = window {
            let valid: Vec<f32> = window
                .iter()
                .copied()
                .filter(|v| !v.is_nan() && info.nodata.map_or(true, |nd| *v as f64 != nd))
                .collect();
            if !valid.is_empty() {
                let min = valid.iter().copied().fold(f32::INFINITY, f32::min);
                let max = valid.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                if min >= -500.0 && max <= 10_000.0 {
                    elevation += 2;
                    reasons.push("elevation-like range (-500 to 10,000m)".to_string());
                } else if min >= 0.0 && max <= 255.0 {
                    image += 2;
                    reasons.push("8-bit image value range (0-255)".to_string());
                } else if min >= 0.0 && max <= 65_535.0 {
                    image += 1;
                    reasons.push("16-bit image value range".to_string());
                }
                if min < 0.0 {
                    elevation += 1;
                    reasons.push("has negative values (below sea level)".to_string());
                }
                if info.sample_kind == SampleKind::U8 && min >= 0.0 && max <= 255.0 {
                    image += 2;
                    reasons.push("values match 8-bit image pixel range".to_string());
                }
            }
        }
    }

    for text in &info.text_tags {
        let lower = text.to_lowercase();
        if ELEVATION_KEYWORDS.iter().any(|k| lower.contains(k)) {
            elevation += 1;
            reasons.push("elevation-related metadata".to_string());
            break;
        } else if IMAGE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            image += 1;
            reasons.push("image-related metadata".to_string());
            break;
        }
    }

    if info.sample_kind == SampleKind::U8 && info.bands == 3 {
        image += 3;
        reasons.push("RGB 8-bit format (typical image)".to_string());
    } else if info.sample_kind == SampleKind::U8 && info.bands == 4 {
        image += 3;
        reasons.push("RGBA 8-bit format (typical image)".to_string());
    }

    let total = elevation + image;
    if total == 0 {
        return ElevationCheck {
            is_elevation: false,
            confidence: 0.0,
            detected: "unknown".to_string(),
            reasons: vec!["insufficient data to classify".to_string()],
        };
    }

    if elevation > image {
        let confidence = elevation as f64 / total as f64;
        let is_elevation = confidence >= MIN_ELEVATION_CONFIDENCE;
        ElevationCheck {
            is_elevation,
            confidence,
            detected: if is_elevation { "elevation" } else { "uncertain" }.to_string(),
            reasons,
        }
    } else {
        ElevationCheck {
            is_elevation: false,
            confidence: image as f64 / total as f64,
            detected: "image".to_string(),
            reasons,
        }
    }
}

/// Inspect a GeoTIFF and reject it unless it classifies as elevation data.
pub fn open_elevation_geotiff<P: AsRef<Path>>(path: P) -> Result<GeoTiffInfo> {
    let path = path.as_ref();
    let (info, check) = inspect_geotiff(path)?;
    if !check.is_elevation {
        return Err(DemError::NotElevationData {
            detected: check.detected,
            reasons: check.reasons,
        });
    }
    info!(
        path = %path.display(),
        confidence = format!("{:.0}%", check.confidence * 100.0),
        "Loaded GeoTIFF elevation database"
    );
    Ok(info)
}

/// Decode the first band of a GeoTIFF into a grid, converting no-data to `NaN`.
pub fn read_geotiff<P: AsRef<Path>>(path: P, info: &GeoTiffInfo, subsample: Option<usize>) -> Result<ElevationGrid> {
    let path = path.as_ref();
    let mut decoder = open_decoder(path)?;
    let (_, samples) = decode_samples(decoder.read_image()?);

    let bands = info.bands.max(1) as usize;
    let mut data: Vec<f32> = if bands == 1 {
        samples
    } else {
        samples.into_iter().step_by(bands).collect()
    };
    if let Some(nodata) = info.nodata {
        for v in data.iter_mut() {
            if *v as f64 == nodata {
                *v = f32::NAN;
            }
        }
    }

    let grid = ElevationGrid::new(info.width, info.height, data)?;
    Ok(match subsample {
        Some(step) if step > 1 => grid.subsample(step),
        _ => grid,
    })
}

/// Write a single-band 32-bit float GeoTIFF in WGS84 geographic coordinates.
///
/// `NaN` samples are written as -9999 and flagged through GDAL_NODATA.
pub fn write_geotiff<P: AsRef<Path>>(path: P, grid: &ElevationGrid, bounds: &GeoBounds) -> Result<()> {
    let path = path.as_ref();
    let (width, height) = grid.dimensions();
    if width == 0 || height == 0 {
        return Err(DemError::InvalidData("cannot write an empty raster".to_string()));
    }
    let scale_x = bounds.width_deg() / width as f64;
    let scale_y = bounds.height_deg() / height as f64;
    let nodata = crate::bil::OUTPUT_NODATA as f32;
    let data: Vec<f32> = grid
        .data()
        .iter()
        .map(|v| if v.is_nan() { nodata } else { *v })
        .collect();

    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
    let mut image = encoder.new_image::<colortype::Gray32Float>(width as u32, height as u32)?;
    image
        .encoder()
        .write_tag(MODEL_PIXEL_SCALE, &[scale_x, scale_y, 0.0][..])?;
    image
        .encoder()
        .write_tag(MODEL_TIEPOINT, &[0.0, 0.0, 0.0, bounds.west, bounds.north, 0.0][..])?;
    // Version 1.1.0 with three keys: geographic model, pixel-is-area, EPSG:4326
    let geokeys: [u16; 16] = [1, 1, 0, 3, 1024, 0, 1, 2, 1025, 0, 1, 1, 2048, 0, 1, 4326];
    image.encoder().write_tag(GEO_KEY_DIRECTORY, &geokeys[..])?;
    image.encoder().write_tag(GDAL_NODATA, "-9999")?;
    image.write_data(&data)?;

    debug!(path = %path.display(), width, height, "Wrote GeoTIFF");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn info(bands: u32, kind: SampleKind) -> GeoTiffInfo {
        GeoTiffInfo {
            width: 10,
            height: 10,
            bands,
            sample_kind: kind,
            bounds: GeoBounds::new(0.0, 1.0, 1.0, 0.0),
            pixel_size: (0.1, 0.1),
            nodata: Some(-9999.0),
            text_tags: Vec::new(),
        }
    }

    #[test]
    fn test_float_single_band_is_elevation() {
        let window = [-12.0, 150.0, 2200.0, -9999.0];
        let check = validate_elevation(&info(1, SampleKind::Float), Some(&window));
        assert!(check.is_elevation);
        assert_eq!(check.detected, "elevation");
        assert_relative_eq!(check.confidence, 1.0);
        assert!(check.reasons.iter().any(|r| r.contains("below sea level")));
    }

    #[test]
    fn test_rgb_is_image() {
        let check = validate_elevation(&info(3, SampleKind::U8), None);
        assert!(!check.is_elevation);
        assert_eq!(check.detected, "image");
    }

    #[test]
    fn test_u8_single_band_is_uncertain_or_image() {
        // 3 (band) + 2 (range) vs 2 (u8) + 2 (u8 pixel range)
        let window = [0.0, 10.0, 200.0];
        let check = validate_elevation(&info(1, SampleKind::U8), Some(&window));
        assert_eq!(check.detected, "uncertain");
        assert!(!check.is_elevation);
    }

    #[test]
    fn test_no_indicators_is_unknown() {
        let check = validate_elevation(&info(2, SampleKind::OtherInteger), None);
        assert_eq!(check.detected, "unknown");
        assert_eq!(check.reasons, vec!["insufficient data to classify".to_string()]);
    }

    #[test]
    fn test_write_then_read_geotiff() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dem.tif");
        let grid = ElevationGrid::new(4, 2, vec![1.0, 2.0, 3.0, f32::NAN, 5.0, 6.0, 7.0, 8.0]).unwrap();
        let bounds = GeoBounds::new(-10.0, 50.0, -6.0, 48.0);
        write_geotiff(&path, &grid, &bounds).unwrap();

        let info = open_elevation_geotiff(&path).unwrap();
        assert_eq!((info.width, info.height), (4, 2));
        assert_eq!(info.bounds, bounds);
        assert_eq!(info.nodata, Some(-9999.0));

        let read = read_geotiff(&path, &info, None).unwrap();
        assert_eq!(read.get(2, 0), Some(3.0));
        assert!(read.get(3, 0).unwrap().is_nan());
        assert_eq!(read.get(3, 1), Some(8.0));
    }
}
