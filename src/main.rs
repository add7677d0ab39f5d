pub mod action;
pub mod app;
pub mod checkpoint;
pub mod cli;
pub mod components;
pub mod config;
pub mod constants;
pub mod game;
pub mod neat;
pub mod trainer;
pub mod tui;
pub mod utils;

use std::sync::{atomic::AtomicBool, Arc};

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing::info;

use crate::{
    app::App,
    checkpoint::Checkpointer,
    cli::Cli,
    config::Config,
    neat::NeatConfig,
    trainer::Trainer,
    utils::{initialize_logging, initialize_panic_handler},
};

async fn tokio_main() -> Result<()> {
    let args = Cli::parse();

    initialize_logging(args.headless)?;

    initialize_panic_handler()?;

    let mut config = Config::new()?;
    args.apply(&mut config.simulation);

    let simulation = &config.simulation;
    let neat = NeatConfig::load(&simulation.neat_config)
        .wrap_err_with(|| format!("failed to load {}", simulation.neat_config.display()))?;
    let trainer = Trainer::new(
        neat,
        config.game.clone(),
        Checkpointer::new(simulation.checkpoint_path.clone()),
        simulation.generations,
        simulation.seed,
    );

    if args.headless {
        let shutdown = Arc::new(AtomicBool::new(false));
        signal_hook::flag::register(SIGINT, Arc::clone(&shutdown))?;
        signal_hook::flag::register(SIGTERM, Arc::clone(&shutdown))?;
        if let Some(best) = trainer.run_headless(&shutdown)? {
            info!(genome = best.key, fitness = ?best.fitness, size = ?best.size(), "best genome");
        }
    } else {
        let mut app = App::new(config, trainer);
        app.run().await?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = tokio_main().await {
        eprintln!("{} error: Something went wrong", env!("CARGO_PKG_NAME"));
        Err(e)
    } else {
        Ok(())
    }
}
