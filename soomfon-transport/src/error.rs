//! Transport error types

use thiserror::Error;

/// Errors that can occur during transport operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    #[error("Device not connected")]
    NotConnected,

    #[error("Failed to write to device: {0}")]
    WriteFailed(String),

    #[error("Failed to read from device: {0}")]
    ReadError(String),

    #[error("HID permission denied: {0}")]
    HidPermissionDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransportError {
    /// Map an hidapi error raised while opening an interface
    pub fn open(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if is_permission_error(&msg) {
            TransportError::HidPermissionDenied(msg)
        } else {
            TransportError::OpenFailed(msg)
        }
    }

    /// Map an hidapi error raised by a write
    pub fn write(e: hidapi::HidError) -> Self {
        TransportError::WriteFailed(e.to_string())
    }

    /// Map an hidapi error raised by a read
    pub fn read(e: hidapi::HidError) -> Self {
        TransportError::ReadError(e.to_string())
    }
}

fn is_permission_error(msg: &str) -> bool {
    msg.contains("Permission denied") || msg.contains("EPERM") || msg.contains("EACCES")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_detection() {
        assert!(is_permission_error("open failed: Permission denied"));
        assert!(!is_permission_error("No such device"));
    }
}
