// USAGE: run from the simulation output directory; the dataset name is taken
// from the first other/*.ts.nc found and the figure lands next to it as
// <name>.evolution.<filetype>.

use anyhow::Result;
use clap::Parser;
use std::path::Path;

use evolution_overview::{discover_dataset, plot::render_evolution};

/// Plot the state-evolution overview figure for a UCLALES run.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Output image format (svg or png)
    #[arg(long, default_value = "svg")]
    filetype: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let base = Path::new(".");
    let name = discover_dataset(base)?;
    log::info!("plotting evolution for `{name}`");

    let out = render_evolution(base, &name, &args.filetype, base)?;
    log::info!("wrote `{}`", out.display());
    Ok(())
}
