use clap::Parser;
use tracing_subscriber::EnvFilter;

use topo_cli::{run, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    topo_metrics::describe_metrics();

    let report = run(&cli)?;
    if !report.is_empty() {
        println!("{report}");
    }
    Ok(())
}
