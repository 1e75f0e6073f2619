use anyhow::Result;
use clap::Parser;

use crate::config::{Cli, ViewerConfig};

mod asset_loader;
mod camera;
mod config;
mod controls;
mod engine;
mod gui;
mod lights;
mod material;
mod math;
mod model;
mod rendering;
mod scene_graph;
mod viewer;
mod viewport;
mod window;

fn main() -> Result<()> {
    pretty_env_logger::init();

    let config = ViewerConfig::from_cli(Cli::parse())?;
    log::info!("Opening {}", config.model_path.display());

    window::run(config)?;

    Ok(())
}
