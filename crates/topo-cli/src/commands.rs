//! Command handlers.
//!
//! Each handler takes its parsed arguments plus the loaded [`CliConfig`] and
//! returns a human-readable report for stdout. Logging goes through
//! `tracing` to stderr.

use anyhow::{bail, Context as _};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use topo_dem::{
    create_metadata_file, scale_percentage, validate_and_format_coordinate, format_coordinate_clean,
    parse_coordinate_input, DatabaseBounds, DatabaseType, DemAssembler, DemSource, ElevationGrid, GeoBounds,
    RecentDatabases, TileDatabase,
};
use topo_gradient::{Gradient, GradientLibrary, HlsAdjustment};
use topo_render::{
    crop_to_bounds, export_elevation, export_layers, format_value, save_legend, ExportOptions, PrintSize,
};

use crate::cli::{
    AdjustArgs, CoordArgs, DbInfoArgs, ExportDemArgs, GradientsCommand, IndexArgs, InfoArgs, LayersArgs, LegendArgs,
    PreviewArgs, PrintSizeArgs, RecentCommand, RenderArgs,
};
use crate::config::CliConfig;

// ============================================================================
// Inputs
// ============================================================================

/// Elevation data loaded for a command, with its geographic extent.
#[derive(Debug)]
pub struct Selection {
    pub grid: ElevationGrid,
    pub bounds: GeoBounds,
}

/// Load a DEM file or tile database folder, cropped to `bounds` when given.
///
/// Folders are assembled through [`DemAssembler`] at `scale_pct`; files are
/// read whole (or every `subsample`th pixel) and cropped. Successful opens
/// are added to the recent list.
pub fn load_selection(
    input: &Path,
    bounds: Option<GeoBounds>,
    subsample: Option<usize>,
    scale_pct: f64,
    config: &CliConfig,
) -> anyhow::Result<Selection> {
    let selection = if input.is_dir() {
        let db = TileDatabase::with_cache_size(input, config.tile_cache_size)
            .with_context(|| format!("open tile database '{}'", input.display()))?;
        let bounds = match bounds.or_else(|| db.global_bounds()) {
            Some(b) => b,
            None => bail!("tile database '{}' has no tiles", input.display()),
        };
        let grid = DemAssembler::new(config.assembly_config())
            .assemble_grid(&db, &bounds, scale_pct)
            .with_context(|| format!("assemble {}", bounds.describe()))?;
        let grid = match subsample {
            Some(step) if step > 1 => grid.subsample(step),
            _ => grid,
        };
        remember(config, input, DatabaseType::MultiFile, Some(db.dataset_info().name.as_str()));
        Selection { grid, bounds }
    } else {
        let source = DemSource::open(input).with_context(|| format!("open DEM '{}'", input.display()))?;
        let data_bounds = source.metadata().bounds;
        let grid = source.read(subsample).with_context(|| format!("read DEM '{}'", input.display()))?;
        let (grid, bounds) = match bounds {
            Some(selection) => (crop_to_bounds(&grid, &data_bounds, &selection)?, selection.unwrapped()),
            None => (grid, data_bounds),
        };
        let grid = if scale_pct < 100.0 { scale_percentage(&grid, scale_pct)? } else { grid };
        remember(config, input, DatabaseType::SingleFile, None);
        Selection { grid, bounds }
    };
    info!(
        width = selection.grid.width(),
        height = selection.grid.height(),
        bounds = %selection.bounds.describe(),
        "Loaded elevation data"
    );
    Ok(selection)
}

fn remember(config: &CliConfig, path: &Path, kind: DatabaseType, name: Option<&str>) {
    let mut recent = RecentDatabases::load(&config.recent_file).with_max_recent(config.max_recent);
    if let Err(e) = recent.add(path, kind, name) {
        warn!(error = %e, "Could not update recent databases");
    }
}

fn load_library(config: &CliConfig) -> anyhow::Result<GradientLibrary> {
    GradientLibrary::load(&config.gradients_file)
        .with_context(|| format!("load gradients '{}'", config.gradients_file.display()))
}

/// Gradient range for a render: explicit limits win, percent gradients
/// stretch over the data.
fn render_range(gradient: &Gradient, grid: &ElevationGrid, min: Option<f64>, max: Option<f64>) -> (Option<f64>, Option<f64>) {
    if min.is_some() && max.is_some() {
        return (min, max);
    }
    let data = grid.min_max().map(|(lo, hi)| (lo as f64, hi as f64));
    let (lo, hi) = gradient.elevation_range(data);
    (min.or(Some(lo)), max.or(Some(hi)))
}

// ============================================================================
// DEM files
// ============================================================================

pub fn info(args: &InfoArgs) -> anyhow::Result<String> {
    let source = DemSource::open(&args.dem).with_context(|| format!("open DEM '{}'", args.dem.display()))?;
    Ok(source.summary())
}

pub fn preview(args: &PreviewArgs) -> anyhow::Result<String> {
    let source = DemSource::open(&args.dem).with_context(|| format!("open DEM '{}'", args.dem.display()))?;
    let path = source.write_preview(args.out.as_deref(), args.size)?;
    Ok(format!("Preview written to {}", path.display()))
}

// ============================================================================
// Rendering
// ============================================================================

pub fn render(args: &RenderArgs, config: &CliConfig) -> anyhow::Result<String> {
    if !(args.scale > 0.0 && args.scale <= 100.0) {
        bail!("scale must be in (0, 100], got {}", args.scale);
    }
    let library = load_library(config)?;
    let gradient = library.require(&args.gradient)?;
    let mut renderer = config.renderer();

    let simple = args.bounds.is_none() && args.scale == 100.0 && args.dpi.is_none() && args.dem.is_file();
    let out = if simple {
        renderer
            .render_dem_file(&args.dem, gradient, args.out.as_deref(), args.subsample, args.min, args.max)
            .with_context(|| format!("render '{}'", args.dem.display()))?
    } else {
        let selection = load_selection(&args.dem, args.bounds, args.subsample, 100.0, config)?;
        let (min, max) = render_range(gradient, &selection.grid, args.min, args.max);
        let out = args
            .out
            .clone()
            .unwrap_or_else(|| topo_render::default_render_path(&args.dem, &gradient.name, args.subsample));
        let mut options = ExportOptions::default().with_scale(args.scale / 100.0).with_range(min, max);
        if let Some(dpi) = args.dpi {
            options = options.with_dpi(dpi);
        }
        renderer
            .export_terrain(&selection.grid, gradient, &out, options)
            .with_context(|| format!("export '{}'", out.display()))?;
        out
    };

    let stats = renderer.stats();
    Ok(format!(
        "Rendered {} pixels in {:.2}s -> {}",
        stats.last_pixels_processed,
        stats.last_render_time.as_secs_f64(),
        out.display()
    ))
}

pub fn layers(args: &LayersArgs, config: &CliConfig) -> anyhow::Result<String> {
    let library = load_library(config)?;
    let gradient = library.require(&args.gradient)?;
    let selection = load_selection(&args.dem, args.bounds, args.subsample, 100.0, config)?;
    let (min, max) = render_range(gradient, &selection.grid, None, None);

    let mut renderer = config.renderer();
    let stack = renderer.render_layers(&selection.grid, gradient, min, max, None)?;
    let base = args.base.clone().unwrap_or_else(|| file_stem(&args.dem));
    let written = export_layers(&args.out_dir, &base, &stack)
        .with_context(|| format!("export layers to '{}'", args.out_dir.display()))?;

    let mut report = format!("Wrote {} layers:", written.len());
    for path in &written {
        let _ = write!(report, "\n  {}", path.display());
    }
    Ok(report)
}

pub fn legend(args: &LegendArgs, config: &CliConfig) -> anyhow::Result<String> {
    let library = load_library(config)?;
    let gradient = library.require(&args.gradient)?;
    save_legend(gradient, args.width, args.height, &args.out)
        .with_context(|| format!("write legend '{}'", args.out.display()))?;
    Ok(format!("Legend written to {}", args.out.display()))
}

pub fn export_dem(args: &ExportDemArgs, config: &CliConfig) -> anyhow::Result<String> {
    if !(1.0..=100.0).contains(&args.scale) {
        bail!("scale must be between 1 and 100, got {}", args.scale);
    }
    if args.input.is_dir() {
        return export_database(args, config);
    }
    let selection = load_selection(&args.input, args.bounds, None, args.scale, config)?;
    let path = export_elevation(&selection.grid, &selection.bounds, &args.out)
        .with_context(|| format!("write elevation '{}'", args.out.display()))?;
    let (w, h) = selection.grid.dimensions();
    Ok(format!("Exported {w} x {h} elevation grid to {}", path.display()))
}

/// Database selections stream through the assembler, chunked when they
/// exceed the memory budget.
fn export_database(args: &ExportDemArgs, config: &CliConfig) -> anyhow::Result<String> {
    let ext = args.out.extension().map(|e| e.to_string_lossy().to_ascii_lowercase());
    if !matches!(ext.as_deref(), Some("dem" | "bil" | "tif" | "tiff")) {
        bail!("database exports need a .dem, .bil, .tif or .tiff output, got '{}'", args.out.display());
    }
    let db = TileDatabase::with_cache_size(&args.input, config.tile_cache_size)
        .with_context(|| format!("open tile database '{}'", args.input.display()))?;
    let Some(bounds) = args.bounds.or_else(|| db.global_bounds()) else {
        bail!("tile database '{}' has no tiles", args.input.display());
    };
    let path = DemAssembler::new(config.assembly_config())
        .assemble_to_file(&db, &bounds, args.scale, &args.out)
        .with_context(|| format!("assemble {} to '{}'", bounds.describe(), args.out.display()))?;
    remember(config, &args.input, DatabaseType::MultiFile, Some(db.dataset_info().name.as_str()));
    let written = DemSource::open(&path).with_context(|| format!("reopen '{}'", path.display()))?;
    let meta = written.metadata();
    Ok(format!("Exported {} x {} elevation grid to {}", meta.width, meta.height, path.display()))
}

// ============================================================================
// Tile databases
// ============================================================================

pub fn index(args: &IndexArgs) -> anyhow::Result<String> {
    let path = create_metadata_file(&args.folder, args.name.as_deref())
        .with_context(|| format!("index '{}'", args.folder.display()))?;
    Ok(format!("Metadata written to {}", path.display()))
}

pub fn db_info(args: &DbInfoArgs, config: &CliConfig) -> anyhow::Result<String> {
    let db = TileDatabase::with_cache_size(&args.folder, config.tile_cache_size)
        .with_context(|| format!("open tile database '{}'", args.folder.display()))?;
    let summary = db.dataset_info();

    let mut report = format!("Dataset: {}", summary.name);
    if let Some(source) = &summary.source {
        let _ = write!(report, "\nSource: {source}");
    }
    let _ = write!(report, "\nType: {:?}", summary.kind);
    let _ = write!(report, "\nTiles: {}", summary.tiles_total);
    match summary.bounds {
        Some(b) => {
            let _ = write!(report, "\nBounds: {}", b.describe());
        }
        None => report.push_str("\nBounds: none"),
    }
    let _ = write!(
        report,
        "\nSize: {} x {} pixels at {:.1} px/deg",
        summary.total_width_pixels, summary.total_height_pixels, summary.pixels_per_degree
    );
    Ok(report)
}

// ============================================================================
// Gradients
// ============================================================================

pub fn gradients(command: &GradientsCommand, config: &CliConfig) -> anyhow::Result<String> {
    let mut library = load_library(config)?;
    match command {
        GradientsCommand::List => {
            let mut report = String::new();
            for g in library.gradients() {
                let _ = writeln!(
                    report,
                    "{:<28} {:<24} {} to {}",
                    g.name,
                    g.gradient_type.as_str(),
                    format_value(g.min_elevation),
                    format_value(g.max_elevation)
                );
            }
            Ok(report.trim_end().to_string())
        }
        GradientsCommand::ImportQgis { file } => {
            let names = library
                .import_qgis(file)
                .with_context(|| format!("import QGIS styles '{}'", file.display()))?;
            Ok(format!("Imported {} gradients: {}", names.len(), names.join(", ")))
        }
        GradientsCommand::ExportQgis { file, names } => {
            let count = library
                .export_qgis(file, names.as_slice())
                .with_context(|| format!("export QGIS styles '{}'", file.display()))?;
            Ok(format!("Exported {count} gradients to {}", file.display()))
        }
        GradientsCommand::Adjust(args) => adjust(&mut library, args),
    }
}

fn adjust(library: &mut GradientLibrary, args: &AdjustArgs) -> anyhow::Result<String> {
    let mut gradient = library.require(&args.name)?.clone();
    let adjustment = HlsAdjustment::new(args.hue, args.lightness, args.saturation);
    match args.stop {
        Some(index) => gradient.adjust_stop_hls(index, adjustment)?,
        None => gradient.adjust_hls(adjustment),
    }
    if let Some(name) = &args.save_as {
        gradient.name = name.clone();
    }
    let name = gradient.name.clone();
    library.add(gradient)?;
    Ok(format!("Saved gradient '{name}'"))
}

// ============================================================================
// Recent databases
// ============================================================================

pub fn recent(command: &RecentCommand, config: &CliConfig) -> anyhow::Result<String> {
    let mut recent = RecentDatabases::load(&config.recent_file).with_max_recent(config.max_recent);
    match command {
        RecentCommand::List => {
            let entries = recent.entries()?;
            if entries.is_empty() {
                return Ok("No recent databases".to_string());
            }
            let mut report = String::new();
            for entry in entries {
                let _ = writeln!(
                    report,
                    "{:<24} {:<12} {}  ({})",
                    entry.display_name,
                    format!("{:?}", entry.kind),
                    entry.path.display(),
                    entry.last_opened
                );
            }
            Ok(report.trim_end().to_string())
        }
        RecentCommand::Clear => {
            recent.clear()?;
            Ok("Recent databases cleared".to_string())
        }
    }
}

// ============================================================================
// Coordinates and print size
// ============================================================================

pub fn coord(args: &CoordArgs, config: &CliConfig) -> anyhow::Result<String> {
    let Some(db_path) = &args.db else {
        let Some(value) = parse_coordinate_input(&args.text) else {
            bail!("cannot parse coordinate '{}'", args.text);
        };
        return Ok(format_coordinate_clean(value, args.lon, args.dms));
    };

    let db = TileDatabase::with_cache_size(db_path, config.tile_cache_size)
        .with_context(|| format!("open tile database '{}'", db_path.display()))?;
    let Some(bounds) = DatabaseBounds::from_summary(&db.dataset_info()) else {
        bail!("tile database '{}' has no tiles", db_path.display());
    };
    match validate_and_format_coordinate(&args.text, &bounds, args.lon, args.dms, None) {
        Some((_, text)) => Ok(text),
        None => bail!("cannot parse coordinate '{}'", args.text),
    }
}

pub fn print_size(args: &PrintSizeArgs) -> anyhow::Result<String> {
    let mut size = PrintSize::new();
    size.set_units(args.units);
    size.set_pixel_dimensions(args.width_px, args.height_px);
    if let Some(w) = args.width {
        size.set_width(w);
    } else if let Some(h) = args.height {
        size.set_height(h);
    } else if let Some(ppi) = args.ppi {
        size.set_resolution(ppi);
    }
    let unit = size.unit_label();
    Ok(format!(
        "{} x {} {unit} at {} ppi ({} MB)",
        format_value(size.width()),
        format_value(size.height()),
        format_value(size.resolution()),
        format_value(size.memory_estimate_mb())
    ))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "terrain".to_string())
}

/// Default config location: `topoimg.yaml` in the working directory, if present.
pub fn default_config_path() -> Option<PathBuf> {
    let path = PathBuf::from("topoimg.yaml");
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use topo_gradient::{ColorStop, ElevationUnits, Rgba};

    #[test]
    fn test_render_range_percent_gradient() {
        let grid = ElevationGrid::new(2, 1, vec![100.0, 300.0]).unwrap();
        let percent = Gradient::new(
            "Pct",
            0.0,
            100.0,
            vec![ColorStop::new(0.0, Rgba::opaque(0, 0, 0)), ColorStop::new(1.0, Rgba::opaque(255, 255, 255))],
        )
        .with_units(ElevationUnits::Percent);
        assert_eq!(render_range(&percent, &grid, None, None), (Some(100.0), Some(300.0)));
        assert_eq!(render_range(&percent, &grid, Some(0.0), None), (Some(0.0), Some(300.0)));
        assert_eq!(render_range(&percent, &grid, Some(1.0), Some(2.0)), (Some(1.0), Some(2.0)));

        let meters = percent.clone().with_units(ElevationUnits::Meters);
        assert_eq!(render_range(&meters, &grid, None, None), (Some(0.0), Some(100.0)));
    }

    #[test]
    fn test_print_size_report() {
        let args = PrintSizeArgs {
            width_px: 3000,
            height_px: 1500,
            width: None,
            height: None,
            ppi: Some(300.0),
            units: topo_render::PrintUnits::Inches,
        };
        assert_eq!(print_size(&args).unwrap(), "10.00 x 5.000 in. at 300.0 ppi (17.17 MB)");
    }

    #[test]
    fn test_coord_without_database() {
        let config = CliConfig::default();
        let args = CoordArgs { text: "-120.5".into(), lon: true, dms: false, db: None };
        assert_eq!(coord(&args, &config).unwrap(), "-120.5");
        let bad = CoordArgs { text: "north-ish".into(), lon: false, dms: false, db: None };
        assert!(coord(&bad, &config).is_err());
    }
}
