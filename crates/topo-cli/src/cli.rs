//! Command-line definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use topo_dem::{GeoBounds, DEFAULT_PREVIEW_SIZE};
use topo_render::PrintUnits;

#[derive(Parser, Debug)]
#[command(name = "topoimg", version, about = "Render DEM elevation data as shaded terrain images")]
pub struct Cli {
    /// YAML settings file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show metadata and statistics for a DEM file.
    Info(InfoArgs),
    /// Write a grayscale preview PNG of a DEM file.
    Preview(PreviewArgs),
    /// Render a DEM file or tile database to a terrain image.
    Render(RenderArgs),
    /// Write each render layer as a separate PNG.
    Layers(LayersArgs),
    /// Write a color legend for a gradient.
    Legend(LegendArgs),
    /// Crop and rescale elevation data to a BIL or GeoTIFF file.
    ExportDem(ExportDemArgs),
    /// Create a metadata file for a folder of tiles.
    Index(IndexArgs),
    /// Summarize a tile database.
    DbInfo(DbInfoArgs),
    /// Manage the gradient library.
    #[command(subcommand)]
    Gradients(GradientsCommand),
    /// Manage the recently opened databases list.
    #[command(subcommand)]
    Recent(RecentCommand),
    /// Parse and format a coordinate.
    Coord(CoordArgs),
    /// Physical print size for an image.
    PrintSize(PrintSizeArgs),
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// DEM file (.dem, .bil, .tif).
    pub dem: PathBuf,
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    pub dem: PathBuf,

    /// Longest side of the preview, in pixels.
    #[arg(long, default_value_t = DEFAULT_PREVIEW_SIZE)]
    pub size: u32,

    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// DEM file or tile database folder.
    pub dem: PathBuf,

    /// Gradient name from the library.
    #[arg(short, long)]
    pub gradient: String,

    /// Output image (.png, .jpg). Defaults to a name built from the input.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Keep every Nth pixel when reading.
    #[arg(long)]
    pub subsample: Option<usize>,

    /// Lower end of the gradient range. A whole-file render without limits
    /// stretches over the data; selections use the gradient's own limits.
    #[arg(long, allow_hyphen_values = true)]
    pub min: Option<f64>,

    /// Upper end of the gradient range.
    #[arg(long, allow_hyphen_values = true)]
    pub max: Option<f64>,

    /// Selection as west,north,east,south in degrees.
    #[arg(long, allow_hyphen_values = true, value_parser = parse_bounds)]
    pub bounds: Option<GeoBounds>,

    /// Output size as a percentage of the data.
    #[arg(long, default_value_t = 100.0)]
    pub scale: f64,

    /// Resolution recorded in JPEG output.
    #[arg(long)]
    pub dpi: Option<f64>,
}

#[derive(Args, Debug)]
pub struct LayersArgs {
    pub dem: PathBuf,

    #[arg(short, long)]
    pub gradient: String,

    /// Directory for the layer files. Must exist.
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// File name prefix. Defaults to the input stem.
    #[arg(long)]
    pub base: Option<String>,

    #[arg(long, allow_hyphen_values = true, value_parser = parse_bounds)]
    pub bounds: Option<GeoBounds>,

    #[arg(long)]
    pub subsample: Option<usize>,
}

#[derive(Args, Debug)]
pub struct LegendArgs {
    #[arg(short, long)]
    pub gradient: String,

    #[arg(short, long)]
    pub out: PathBuf,

    #[arg(long, default_value_t = 100)]
    pub width: u32,

    #[arg(long, default_value_t = 512)]
    pub height: u32,
}

#[derive(Args, Debug)]
pub struct ExportDemArgs {
    /// DEM file or tile database folder.
    pub input: PathBuf,

    #[arg(long, allow_hyphen_values = true, value_parser = parse_bounds)]
    pub bounds: Option<GeoBounds>,

    /// Output file; .dem/.bil writes BIL, anything else GeoTIFF. Tile
    /// database exports take .dem, .bil, .tif or .tiff.
    #[arg(short, long)]
    pub out: PathBuf,

    /// Output size as a percentage of the data.
    #[arg(long, default_value_t = 100.0)]
    pub scale: f64,
}

#[derive(Args, Debug)]
pub struct IndexArgs {
    pub folder: PathBuf,

    /// Dataset name written to the metadata file.
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct DbInfoArgs {
    pub folder: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum GradientsCommand {
    /// List gradient names and types.
    List,
    /// Add color ramps from a QGIS style XML file.
    ImportQgis { file: PathBuf },
    /// Write gradients to a QGIS style XML file.
    ExportQgis {
        file: PathBuf,
        /// Gradients to export.
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Shift hue, lightness and saturation of a gradient.
    Adjust(AdjustArgs),
}

#[derive(Args, Debug)]
pub struct AdjustArgs {
    pub name: String,

    /// Hue rotation in degrees.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub hue: f64,

    /// Lightness change in percent.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub lightness: f64,

    /// Saturation change in percent.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub saturation: f64,

    /// Adjust only this color stop.
    #[arg(long)]
    pub stop: Option<usize>,

    /// Save under a new name instead of replacing the gradient.
    #[arg(long)]
    pub save_as: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum RecentCommand {
    List,
    Clear,
}

#[derive(Args, Debug)]
pub struct CoordArgs {
    /// Decimal degrees or DMS text, e.g. `40°30'15"N` or `-120.5`.
    #[arg(allow_hyphen_values = true)]
    pub text: String,

    /// Treat the value as a longitude.
    #[arg(long)]
    pub lon: bool,

    /// Format as degrees, minutes and seconds.
    #[arg(long)]
    pub dms: bool,

    /// Tile database to snap and clamp against.
    #[arg(long)]
    pub db: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PrintSizeArgs {
    #[arg(long)]
    pub width_px: u64,

    #[arg(long)]
    pub height_px: u64,

    /// Print width in `units`.
    #[arg(long, conflicts_with_all = ["height", "ppi"])]
    pub width: Option<f64>,

    /// Print height in `units`.
    #[arg(long, conflicts_with = "ppi")]
    pub height: Option<f64>,

    /// Pixels per inch.
    #[arg(long)]
    pub ppi: Option<f64>,

    /// in, pt, pi or cm.
    #[arg(long, default_value = "in")]
    pub units: PrintUnits,
}

/// Parse `west,north,east,south`.
pub fn parse_bounds(text: &str) -> Result<GeoBounds, String> {
    let parts = text
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("'{}': {e}", p.trim())))
        .collect::<Result<Vec<_>, _>>()?;
    let [west, north, east, south] = parts[..] else {
        return Err(format!("expected west,north,east,south, got {} values", parts.len()));
    };
    if north <= south {
        return Err(format!("north ({north}) must be greater than south ({south})"));
    }
    Ok(GeoBounds::new(west, north, east, south))
}
