//! SOOMFON Stream Controller Driver CLI
//!
//! A command-line interface for driving SOOMFON panels: event monitoring,
//! LCD images and display control.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use soomfon_driver::DriverConfig;

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(DriverConfig::default_path);
    let config = DriverConfig::load(&config_path)
        .with_context(|| format!("Loading config from {}", config_path.display()))?;

    // Initialize logging
    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    debug!("Using config {}", config_path.display());

    match cli.command {
        Commands::List => commands::device::list(&config),
        Commands::Monitor { json } => commands::device::monitor(&config, json),
        Commands::Wake => commands::display::wake(&config),
        Commands::Clear { button } => commands::display::clear(&config, button),
        Commands::Brightness { percent } => commands::display::brightness(&config, percent),
        Commands::Refresh => commands::display::refresh(&config),
        Commands::Image {
            button,
            file,
            fit,
            rotate,
            flip_h,
            flip_v,
            background,
        } => {
            let options = soomfon_panel::ImageOptions {
                fit: fit.into(),
                rotation: rotate,
                flip_horizontal: flip_h,
                flip_vertical: flip_v,
                background: background.unwrap_or([0, 0, 0]),
                ..Default::default()
            };
            commands::display::image(&config, button, &file, &options)
        }
        Commands::Solid { button, r, g, b } => commands::display::solid(&config, button, [r, g, b]),
        Commands::Gradient { button } => commands::display::gradient(&config, button),
        Commands::Raw { bytes } => commands::display::raw(&config, &bytes),
        Commands::Shutdown => commands::display::shutdown(&config),
    }
}
