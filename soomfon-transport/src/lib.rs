//! Transport layer for SOOMFON stream controller panels
//!
//! This crate owns everything that touches the wire:
//!
//! - Wire protocol constants and report builders ([`protocol`])
//! - Stateless input report parsing ([`event_parser`])
//! - Device discovery and the hidapi backend
//! - The connection [`Session`] with its report loop and auto-reconnect

pub mod error;
pub mod event_parser;
pub mod listeners;
pub mod protocol;
pub mod session;
pub mod types;

mod discovery;
mod hid;

pub use discovery::{DeviceDiscovery, DeviceFilter, HidDiscovery};
pub use error::TransportError;
pub use event_parser::{parse_frame, Frame, RawInput};
pub use hid::HidTransport;
pub use listeners::{ListenerHub, ListenerId};
pub use session::{Session, SessionConfig};
pub use types::{ConnectionState, SessionEvent, TransportDeviceInfo};

/// An open command-and-event interface - all backends implement this
///
/// Implementations serialize access to the underlying handle internally, so
/// one reader thread and any number of writers may share an `Arc`.
pub trait Transport: Send + Sync {
    /// Write one output report (report ID byte first)
    fn write_report(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Read one input report
    ///
    /// Returns `Ok(0)` when `timeout_ms` elapses without data.
    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError>;

    /// Identity of the opened interface
    fn device_info(&self) -> &TransportDeviceInfo;
}

/// Sink for fully built output reports
///
/// The command encoder writes through this so it can drive either a live
/// [`Session`] or a recording double in tests.
pub trait ReportWriter: Send + Sync {
    fn write_report(&self, report: &[u8]) -> Result<(), TransportError>;
}
