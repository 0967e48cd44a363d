//! Display command handlers.

use super::open_panel;
use anyhow::{Context, Result};
use image::Rgb;
use soomfon_driver::{parse_hex_bytes, DriverConfig};
use soomfon_panel::codec;
use soomfon_panel::ImageOptions;
use soomfon_transport::protocol::{cmd, layout};
use std::path::Path;

const LCD_W: u32 = layout::LCD_WIDTH as u32;
const LCD_H: u32 = layout::LCD_HEIGHT as u32;

pub fn wake(config: &DriverConfig) -> Result<()> {
    open_panel(config)?.wake_display()?;
    println!("Display woken");
    Ok(())
}

pub fn clear(config: &DriverConfig, button: Option<u8>) -> Result<()> {
    let panel = open_panel(config)?;
    panel.clear_screen(button)?;
    panel.refresh_sync()?;
    match button {
        Some(b) => println!("Cleared button {b}"),
        None => println!("Cleared all buttons"),
    }
    Ok(())
}

pub fn brightness(config: &DriverConfig, percent: u8) -> Result<()> {
    open_panel(config)?.set_brightness(percent)?;
    println!("Brightness set to {percent}%");
    Ok(())
}

pub fn refresh(config: &DriverConfig) -> Result<()> {
    open_panel(config)?.refresh_sync()?;
    println!("Display refreshed");
    Ok(())
}

/// Decode an image file and show it on one LCD button
pub fn image(config: &DriverConfig, button: u8, file: &Path, options: &ImageOptions) -> Result<()> {
    let payload = codec::process_image_file(file, options)
        .with_context(|| format!("Processing {}", file.display()))?;

    let panel = open_panel(config)?;
    panel.set_button_image(button, &payload)?;
    panel.refresh_sync()?;
    println!("Uploaded {} to button {button}", file.display());
    Ok(())
}

pub fn solid(config: &DriverConfig, button: u8, color: [u8; 3]) -> Result<()> {
    let payload = codec::solid_color(Rgb(color), LCD_W, LCD_H);

    let panel = open_panel(config)?;
    panel.set_button_image(button, &payload)?;
    panel.refresh_sync()?;
    println!(
        "Button {button} set to #{:02x}{:02x}{:02x}",
        color[0], color[1], color[2]
    );
    Ok(())
}

pub fn gradient(config: &DriverConfig, button: u8) -> Result<()> {
    let payload = codec::gradient(LCD_W, LCD_H);

    let panel = open_panel(config)?;
    panel.set_button_image(button, &payload)?;
    panel.refresh_sync()?;
    println!("Gradient shown on button {button}");
    Ok(())
}

/// Send a raw report built from hex arguments
pub fn raw(config: &DriverConfig, args: &[String]) -> Result<()> {
    let bytes = parse_hex_bytes(args).map_err(anyhow::Error::msg)?;

    let panel = open_panel(config)?;
    panel.send_raw_packet(&bytes)?;
    match bytes.get(1) {
        Some(&code) => println!("Sent {} bytes (cmd 0x{:02x} {})", bytes.len(), code, cmd::name(code)),
        None => println!("Sent {} bytes", bytes.len()),
    }
    Ok(())
}

pub fn shutdown(config: &DriverConfig) -> Result<()> {
    open_panel(config)?.shutdown()?;
    println!("Panel released");
    Ok(())
}
