//! Command handlers for the CLI application.
//!
//! - `device`: enumeration and event monitoring (list, monitor)
//! - `display`: one-shot display commands (wake, clear, brightness, image, ...)

pub mod device;
pub mod display;

use anyhow::{Context, Result};
use soomfon_driver::DriverConfig;
use soomfon_panel::{Panel, PanelConfig};
use soomfon_transport::HidDiscovery;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Build a panel from the driver config
pub fn build_panel(config: &DriverConfig, panel_config: PanelConfig) -> Result<Panel> {
    let discovery = Arc::new(HidDiscovery::with_filter(config.device_filter()));
    Panel::new(discovery, panel_config).context("Initializing panel")
}

/// Open the first panel for a one-shot command
///
/// No reconnect loop, no keep-alive and no configured brightness: the
/// command either reaches the device now or fails.
pub fn open_panel(config: &DriverConfig) -> Result<Panel> {
    let mut panel_config = config.panel_config();
    panel_config.session.auto_reconnect = false;
    panel_config.keep_alive = None;
    panel_config.brightness = None;

    let panel = build_panel(config, panel_config)?;
    let info = panel.connect().context("No panel connected")?;
    tracing::info!("Using {} at {}", info.label(), info.device_path);
    Ok(panel)
}

/// Set up a Ctrl-C handler that sets the given flag to false when triggered.
/// Returns the Arc<AtomicBool> for use in the main loop.
pub fn setup_interrupt_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .ok();

    running
}
