//! Device command handlers.

use super::{build_panel, setup_interrupt_handler};
use anyhow::{bail, Context, Result};
use soomfon_driver::DriverConfig;
use soomfon_transport::{DeviceDiscovery, HidDiscovery, SessionEvent};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{info, warn};

/// List matching panels without opening them
pub fn list(config: &DriverConfig) -> Result<()> {
    let discovery = HidDiscovery::with_filter(config.device_filter());
    let devices = discovery.list_devices().context("Enumerating HID devices")?;

    if devices.is_empty() {
        println!(
            "No panels found (VID={:04x} PID={:04x} page={:04x})",
            config.device.vendor_id, config.device.product_id, config.device.usage_page
        );
        return Ok(());
    }

    println!("Found {} panel(s):", devices.len());
    for d in &devices {
        println!(
            "  VID={:04x} PID={:04x} usage={:04x} page={:04x} if={} {}",
            d.vid, d.pid, d.usage, d.usage_page, d.interface_number, d.device_path
        );
        println!(
            "      {} / {} serial={}",
            d.manufacturer.as_deref().unwrap_or("?"),
            d.product_name.as_deref().unwrap_or("?"),
            d.serial.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

/// Print decoded events until Ctrl-C, reconnecting as configured
///
/// The configured brightness is reapplied by the panel on every connect.
pub fn monitor(config: &DriverConfig, json: bool) -> Result<()> {
    let panel = build_panel(config, config.panel_config())?;

    panel.session().add_listener(move |event| match event {
        SessionEvent::Connected(info) => {
            eprintln!("Connected: {} at {}", info.label(), info.device_path)
        }
        SessionEvent::Disconnected => eprintln!("Disconnected"),
        SessionEvent::Error(cause) => eprintln!("Error: {cause}"),
        SessionEvent::Data(_) => {}
    });

    panel.add_listener(move |event| {
        if json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!("Failed to serialize event: {}", e),
            }
        } else {
            println!("{event}");
        }
    });

    match panel.connect() {
        Ok(_) => {}
        Err(e) if config.session.auto_reconnect => {
            warn!("{}; waiting for a panel", e);
        }
        Err(e) => bail!("No panel connected: {e}"),
    }

    let running = setup_interrupt_handler();
    info!("Monitoring events, press Ctrl-C to stop");
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    panel.disconnect();
    Ok(())
}
