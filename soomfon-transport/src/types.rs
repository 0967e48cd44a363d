//! Common types for the transport layer

use serde::{Deserialize, Serialize};

/// Lifecycle state of a transport session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    /// No device handle is open
    #[default]
    Disconnected,
    /// Enumerating and opening the device
    Connecting,
    /// Handle open and read loop running
    Connected,
    /// Last I/O or open attempt failed; handle closed
    Error,
}

impl ConnectionState {
    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Device identification information
///
/// Captured when the interface is enumerated and immutable for the lifetime
/// of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportDeviceInfo {
    /// USB Vendor ID
    pub vid: u16,
    /// USB Product ID
    pub pid: u16,
    /// Platform-specific interface path
    pub device_path: String,
    /// Serial number if available
    pub serial: Option<String>,
    /// Manufacturer string if available
    pub manufacturer: Option<String>,
    /// Product name if available
    pub product_name: Option<String>,
    /// USB interface number (-1 when the backend does not report it)
    pub interface_number: i32,
    /// HID usage page of the interface
    pub usage_page: u16,
    /// HID usage of the interface
    pub usage: u16,
}

impl TransportDeviceInfo {
    /// Short label for logs: `VID:PID (product)`
    pub fn label(&self) -> String {
        match &self.product_name {
            Some(name) => format!("{:04X}:{:04X} ({})", self.vid, self.pid, name),
            None => format!("{:04X}:{:04X}", self.vid, self.pid),
        }
    }
}

/// Notifications published by a transport session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session reached `Connected`
    Connected(TransportDeviceInfo),
    /// Handle closed, either by request or after an error
    Disconnected,
    /// An open or I/O failure; always followed by `Disconnected` when a
    /// handle was open
    Error(String),
    /// One raw, non-empty input report in arrival order
    Data(Vec<u8>),
}
