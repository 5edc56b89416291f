//! # topo-cli
//!
//! The `topoimg` command-line front end.
//!
//! Commands cover the whole workflow: inspecting DEM files and tile
//! databases, rendering terrain images and layer stacks, exporting cropped
//! elevation data, and maintaining the gradient library and the recent
//! databases list.
//!
//! ```text
//! topoimg index ~/gtopo30 --name "GTOPO30"
//! topoimg render ~/gtopo30 -g "Classic Elevation" --bounds -125,50,-110,35 --scale 50 -o west.jpg
//! topoimg gradients adjust Desert --hue -20 --save-as "Desert Dusk"
//! ```
//!
//! Settings come from `--config <file.yaml>` or `topoimg.yaml` in the
//! working directory (see [`CliConfig`]).

pub mod cli;
pub mod commands;
pub mod config;

pub use cli::{Cli, Command};
pub use config::CliConfig;

/// Run a parsed command and return its report.
pub fn run(cli: &Cli) -> anyhow::Result<String> {
    let config_path = cli.config.clone().or_else(commands::default_config_path);
    let config = CliConfig::load(config_path.as_deref())?;
    tracing::debug!(?config, "Loaded configuration");

    match &cli.command {
        Command::Info(args) => commands::info(args),
        Command::Preview(args) => commands::preview(args),
        Command::Render(args) => commands::render(args, &config),
        Command::Layers(args) => commands::layers(args, &config),
        Command::Legend(args) => commands::legend(args, &config),
        Command::ExportDem(args) => commands::export_dem(args, &config),
        Command::Index(args) => commands::index(args),
        Command::DbInfo(args) => commands::db_info(args, &config),
        Command::Gradients(command) => commands::gradients(command, &config),
        Command::Recent(command) => commands::recent(command, &config),
        Command::Coord(args) => commands::coord(args, &config),
        Command::PrintSize(args) => commands::print_size(args),
    }
}
