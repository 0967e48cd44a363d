//! hidapi-backed transport for the command-and-event interface

use hidapi::HidDevice;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::TransportError;
use crate::types::TransportDeviceInfo;
use crate::Transport;

/// HID transport over the vendor interface
///
/// Reports are written with `hid_write` and read with `hid_read_timeout`.
/// The handle is closed when the last reference is dropped.
pub struct HidTransport {
    device: Mutex<HidDevice>,
    info: TransportDeviceInfo,
}

impl HidTransport {
    /// Wrap an opened device
    pub fn new(device: HidDevice, info: TransportDeviceInfo) -> Self {
        Self {
            device: Mutex::new(device),
            info,
        }
    }
}

impl Transport for HidTransport {
    fn write_report(&self, data: &[u8]) -> Result<(), TransportError> {
        let device = self.device.lock();
        let written = device.write(data).map_err(TransportError::write)?;
        if written != data.len() {
            debug!("Short write: {} of {} bytes", written, data.len());
        }
        Ok(())
    }

    fn read_report(&self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError> {
        let device = self.device.lock();
        device
            .read_timeout(buf, timeout_ms)
            .map_err(TransportError::read)
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }
}

impl Drop for HidTransport {
    fn drop(&mut self) {
        debug!("Closing HID handle {}", self.info.device_path);
    }
}
