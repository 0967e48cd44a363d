//! High-level interface for SOOMFON stream controller panels
//!
//! This crate sits on top of `soomfon-transport` and provides:
//!
//! - [`ReportDecoder`]: raw reports → debounced button/encoder events
//! - [`CommandEncoder`]: typed commands and chunked LCD image transfer
//! - [`codec`]: 5-6-5 pixel packing and source image processing
//! - [`Panel`]: a session wired to a decoder and an encoder

pub mod codec;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod events;

mod timer;

pub use codec::{Fit, ImageOptions, Rotation};
pub use decoder::{DecoderConfig, ReportDecoder};
pub use encoder::{CommandEncoder, EncoderConfig};
pub use error::PanelError;
pub use events::{
    ButtonEvent, ButtonEventKind, ButtonType, EncoderEvent, EncoderEventKind, PanelEvent,
};

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use soomfon_transport::protocol::timing;
use soomfon_transport::{
    ConnectionState, DeviceDiscovery, HidDiscovery, ListenerId, Session, SessionConfig,
    SessionEvent, TransportDeviceInfo, TransportError,
};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Everything needed to build a [`Panel`]
#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub session: SessionConfig,
    pub decoder: DecoderConfig,
    pub encoder: EncoderConfig,
    /// Interval of the keep-alive report; `None` disables it
    pub keep_alive: Option<Duration>,
    /// Brightness applied on every connect, including reconnects
    pub brightness: Option<u8>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            decoder: DecoderConfig::default(),
            encoder: EncoderConfig::default(),
            keep_alive: Some(Duration::from_secs(timing::KEEP_ALIVE_INTERVAL_SECS)),
            brightness: None,
        }
    }
}

/// Background thread writing keep-alive reports while connected
struct KeepAlive {
    stop: Arc<(Mutex<bool>, Condvar)>,
    thread: Option<JoinHandle<()>>,
}

impl KeepAlive {
    fn spawn(
        session: Arc<Session>,
        encoder: Arc<CommandEncoder>,
        interval: Duration,
    ) -> Result<Self, PanelError> {
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let signal = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("soomfon-keep-alive".into())
            .spawn(move || {
                let (lock, cvar) = &*signal;
                let mut stopped = lock.lock();
                loop {
                    cvar.wait_for(&mut stopped, interval);
                    if *stopped {
                        break;
                    }
                    if !session.is_connected() {
                        continue;
                    }
                    if let Err(e) = encoder.keep_alive() {
                        warn!("Keep-alive failed: {}", e);
                    }
                }
                debug!("Keep-alive thread exiting");
            })
            .map_err(|e| TransportError::Internal(format!("spawn keep-alive: {e}")))?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.stop;
        *lock.lock() = true;
        cvar.notify_all();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

/// A panel: transport session, report decoder and command encoder wired together
///
/// Raw reports flow from the session into the decoder; decoder state is reset
/// whenever the session connects or disconnects so no button stays "held"
/// across a session boundary.
pub struct Panel {
    session: Arc<Session>,
    decoder: Arc<ReportDecoder>,
    encoder: Arc<CommandEncoder>,
    session_listener: ListenerId,
    keep_alive: Option<KeepAlive>,
}

impl Panel {
    /// Build a disconnected panel over a discovery backend
    pub fn new(discovery: Arc<dyn DeviceDiscovery>, config: PanelConfig) -> Result<Self, PanelError> {
        if let Some(level) = config.brightness.filter(|&level| level > 100) {
            return Err(PanelError::InvalidArgument(format!(
                "brightness {} out of range 0-100",
                level
            )));
        }

        let session = Arc::new(Session::new(discovery, config.session));
        let decoder = Arc::new(ReportDecoder::new(config.decoder)?);
        let encoder = Arc::new(CommandEncoder::new(session.clone(), config.encoder));

        let sink = Arc::clone(&decoder);
        let commands = Arc::clone(&encoder);
        let brightness = config.brightness;
        let session_listener = session.add_listener(move |event| match event {
            SessionEvent::Data(report) => sink.process_report(report),
            SessionEvent::Connected(_) => {
                sink.reset();
                if let Some(level) = brightness {
                    if let Err(e) = commands.set_brightness(level) {
                        warn!("Failed to apply brightness {}%: {}", level, e);
                    }
                }
            }
            SessionEvent::Disconnected => sink.reset(),
            SessionEvent::Error(_) => {}
        });

        let keep_alive = match config.keep_alive {
            Some(interval) if !interval.is_zero() => Some(KeepAlive::spawn(
                Arc::clone(&session),
                Arc::clone(&encoder),
                interval,
            )?),
            _ => None,
        };

        Ok(Self {
            session,
            decoder,
            encoder,
            session_listener,
            keep_alive,
        })
    }

    /// Build a panel over hidapi with the stock device filter
    pub fn hid(config: PanelConfig) -> Result<Self, PanelError> {
        Self::new(Arc::new(HidDiscovery::new()), config)
    }

    // === Session ===

    pub fn connect(&self) -> Result<TransportDeviceInfo, PanelError> {
        Ok(self.session.connect()?)
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn device_info(&self) -> Option<TransportDeviceInfo> {
        self.session.device_info()
    }

    pub fn list_devices(&self) -> Result<Vec<TransportDeviceInfo>, PanelError> {
        Ok(self.session.list_devices()?)
    }

    pub fn set_auto_reconnect(&self, enabled: bool) {
        self.session.set_auto_reconnect(enabled);
    }

    /// The underlying session (connection events, raw writes)
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The report decoder (timing adjustments)
    pub fn decoder(&self) -> &ReportDecoder {
        &self.decoder
    }

    /// Whether the keep-alive thread is running
    pub fn keep_alive_enabled(&self) -> bool {
        self.keep_alive.is_some()
    }

    // === Events ===

    /// Register a callback for decoded button/encoder events
    pub fn add_listener<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&PanelEvent) + Send + Sync + 'static,
    {
        self.decoder.add_listener(f)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.decoder.remove_listener(id)
    }

    /// Subscribe to decoded events via broadcast channel
    pub fn subscribe(&self) -> broadcast::Receiver<PanelEvent> {
        self.decoder.subscribe()
    }

    // === Commands ===

    pub fn wake_display(&self) -> Result<(), PanelError> {
        self.encoder.wake_display()
    }

    pub fn clear_screen(&self, button: Option<u8>) -> Result<(), PanelError> {
        self.encoder.clear_screen(button)
    }

    pub fn set_brightness(&self, percent: u8) -> Result<(), PanelError> {
        self.encoder.set_brightness(percent)
    }

    pub fn refresh_sync(&self) -> Result<(), PanelError> {
        self.encoder.refresh_sync()
    }

    pub fn set_button_image(&self, button: u8, payload: &[u8]) -> Result<(), PanelError> {
        self.encoder.set_button_image(button, payload)
    }

    /// Decode, transfer and display an encoded image on one LCD button
    pub fn upload_button_image(
        &self,
        button: u8,
        source: &[u8],
        options: &ImageOptions,
    ) -> Result<(), PanelError> {
        self.encoder.upload_button_image(button, source, options)
    }

    pub fn send_raw_packet(&self, bytes: &[u8]) -> Result<(), PanelError> {
        self.encoder.send_raw_packet(bytes)
    }

    /// Clear every screen, then halt
    pub fn shutdown(&self) -> Result<(), PanelError> {
        self.encoder.shutdown()
    }
}

impl Drop for Panel {
    fn drop(&mut self) {
        // Stop keep-alive before the session goes away
        self.keep_alive.take();
        self.session.remove_listener(self.session_listener);
        self.session.disconnect();
    }
}
