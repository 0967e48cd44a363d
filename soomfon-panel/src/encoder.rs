//! Command encoder: one method per outbound command
//!
//! Every method validates its arguments before building any report, so an
//! `InvalidArgument` error guarantees nothing was written.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::ReentrantMutex;
use soomfon_transport::protocol::{
    build_image_data, build_image_header, build_report, cmd, image_chunk_count, layout, timing,
    IMAGE_CHUNK_SIZE, REPORT_SIZE,
};
use soomfon_transport::ReportWriter;
use tracing::{debug, info};

use crate::codec::{process_source_image, ImageOptions};
use crate::error::PanelError;

/// Encoder tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Pause between non-final image data reports
    pub chunk_delay: Duration,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            chunk_delay: Duration::from_millis(timing::IMAGE_CHUNK_DELAY_MS),
        }
    }
}

/// Builds and writes outbound reports
pub struct CommandEncoder {
    writer: Arc<dyn ReportWriter>,
    config: EncoderConfig,
    /// Held for a whole command so multi-report transfers are never interleaved
    write_lock: ReentrantMutex<()>,
}

impl CommandEncoder {
    pub fn new(writer: Arc<dyn ReportWriter>, config: EncoderConfig) -> Self {
        Self {
            writer,
            config,
            write_lock: ReentrantMutex::new(()),
        }
    }

    pub fn config(&self) -> EncoderConfig {
        self.config
    }

    fn send(&self, command: u8, payload: &[u8]) -> Result<(), PanelError> {
        let report = build_report(command, payload);
        debug!("Sending {} {:02X?}", cmd::name(command), payload);
        let _guard = self.write_lock.lock();
        self.writer.write_report(&report)?;
        Ok(())
    }

    /// Wake the displays from sleep
    pub fn wake_display(&self) -> Result<(), PanelError> {
        self.send(cmd::WAKE_DISPLAY, &[])
    }

    /// Clear one LCD button, or all of them when `button` is `None`
    pub fn clear_screen(&self, button: Option<u8>) -> Result<(), PanelError> {
        let target = match button {
            Some(index) => {
                check_lcd_index(index)?;
                index
            }
            None => cmd::CLEAR_ALL,
        };
        self.send(cmd::CLEAR_SCREEN, &[target])
    }

    /// Set display brightness in percent (0-100)
    pub fn set_brightness(&self, percent: u8) -> Result<(), PanelError> {
        if percent > 100 {
            return Err(PanelError::InvalidArgument(format!(
                "brightness {} out of range 0-100",
                percent
            )));
        }
        self.send(cmd::SET_BRIGHTNESS, &[percent])
    }

    /// Commit pending framebuffer changes to the displays
    pub fn refresh_sync(&self) -> Result<(), PanelError> {
        self.send(cmd::REFRESH_SYNC, &[])
    }

    /// Keep the device in host-controlled mode
    pub fn keep_alive(&self) -> Result<(), PanelError> {
        self.send(cmd::KEEP_ALIVE, &[])
    }

    /// Release the device
    pub fn halt(&self) -> Result<(), PanelError> {
        self.send(cmd::HALT, &[])
    }

    /// Clear every screen, then halt
    pub fn shutdown(&self) -> Result<(), PanelError> {
        info!("Shutting down panel");
        let _guard = self.write_lock.lock();
        self.clear_screen(None)?;
        self.halt()
    }

    /// Transfer a packed 5-6-5 image to one LCD button
    ///
    /// Writes one header report followed by `ceil(len / 59)` data reports with
    /// sequence numbers `0..k`. Only the final data report carries the is-last
    /// flag, and it is the last report written. Sleeps `chunk_delay` between
    /// data reports to let the device drain its receive buffer.
    ///
    /// Does not refresh the display; see [`upload_button_image`](Self::upload_button_image).
    pub fn set_button_image(&self, button: u8, payload: &[u8]) -> Result<(), PanelError> {
        check_lcd_index(button)?;
        if payload.len() != layout::LCD_IMAGE_SIZE {
            return Err(PanelError::InvalidArgument(format!(
                "image payload must be {} bytes ({}x{} 5-6-5), got {}",
                layout::LCD_IMAGE_SIZE,
                layout::LCD_WIDTH,
                layout::LCD_HEIGHT,
                payload.len()
            )));
        }

        let chunk_count = image_chunk_count(payload.len());
        debug!(
            "Image transfer to button {}: {} bytes in {} chunks",
            button,
            payload.len(),
            chunk_count
        );

        let header = build_image_header(
            button,
            payload.len() as u32,
            layout::LCD_WIDTH,
            layout::LCD_HEIGHT,
        );
        let _guard = self.write_lock.lock();
        self.writer.write_report(&header)?;

        for (sequence, chunk) in payload.chunks(IMAGE_CHUNK_SIZE).enumerate() {
            let is_last = sequence + 1 == chunk_count;
            let report = build_image_data(sequence as u16, chunk, is_last);
            self.writer.write_report(&report)?;

            if !is_last && !self.config.chunk_delay.is_zero() {
                std::thread::sleep(self.config.chunk_delay);
            }
        }

        Ok(())
    }

    /// Decode an encoded image, transfer it to one LCD button and refresh
    ///
    /// `options.width`/`height` are ignored; the LCD size always applies.
    pub fn upload_button_image(
        &self,
        button: u8,
        source: &[u8],
        options: &ImageOptions,
    ) -> Result<(), PanelError> {
        check_lcd_index(button)?;
        let options = ImageOptions {
            width: u32::from(layout::LCD_WIDTH),
            height: u32::from(layout::LCD_HEIGHT),
            ..options.clone()
        };
        let payload = process_source_image(source, &options)?;
        let _guard = self.write_lock.lock();
        self.set_button_image(button, &payload)?;
        self.refresh_sync()
    }

    /// Write one report verbatim, zero-padded to the report size
    pub fn send_raw_packet(&self, bytes: &[u8]) -> Result<(), PanelError> {
        if bytes.is_empty() || bytes.len() > REPORT_SIZE {
            return Err(PanelError::InvalidArgument(format!(
                "raw packet must be 1-{} bytes, got {}",
                REPORT_SIZE,
                bytes.len()
            )));
        }

        let mut report = [0u8; REPORT_SIZE];
        report[..bytes.len()].copy_from_slice(bytes);
        debug!("Sending raw packet {:02X?}", &report[..bytes.len().min(16)]);
        let _guard = self.write_lock.lock();
        self.writer.write_report(&report)?;
        Ok(())
    }
}

fn check_lcd_index(button: u8) -> Result<(), PanelError> {
    if button >= layout::LCD_COUNT {
        return Err(PanelError::InvalidArgument(format!(
            "button {} is not an LCD button (0-{})",
            button,
            layout::LCD_COUNT - 1
        )));
    }
    Ok(())
}
