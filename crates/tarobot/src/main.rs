//! tarobot - Tarot card readings from the command line

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use tarobot::{backend, cli, App, Config};
use tarot::SpreadBuilder;

fn main() -> Result<()> {
    init_logging(cli::diagnostics_requested(std::env::args_os()));

    let config = Config::load()?;
    let resolver = config.card_resolver()?;
    let registry = config.spread_registry()?;

    let matches = cli::build_command(&config, &registry).get_matches();
    let command = cli::parse_command(&matches, &registry)?;

    let generator = backend::from_config(&config.generation)?;
    let app = App::new(config, resolver, SpreadBuilder::new(registry), generator);
    app.run(&command)?;

    Ok(())
}

/// Log to stderr; RUST_LOG overrides the default filter
fn init_logging(verbose: bool) {
    let default = if verbose {
        "tarobot=debug,tarot=debug"
    } else {
        "tarobot=info,tarot=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
