//! Device discovery for SOOMFON panels

use std::sync::Arc;

use hidapi::HidApi;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::hid::HidTransport;
use crate::protocol::device;
use crate::types::TransportDeviceInfo;
use crate::Transport;

/// Device discovery abstraction
///
/// The session only talks to this trait, so tests can substitute a fake
/// backend for hidapi.
pub trait DeviceDiscovery: Send + Sync {
    /// List matching command-and-event interfaces without opening them
    fn list_devices(&self) -> Result<Vec<TransportDeviceInfo>, TransportError>;

    /// Open a previously listed interface
    fn open_device(&self, info: &TransportDeviceInfo)
        -> Result<Arc<dyn Transport>, TransportError>;
}

/// VID/PID/usage-page triple selecting the command-and-event interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceFilter {
    pub vendor_id: u16,
    pub product_id: u16,
    pub usage_page: u16,
}

impl Default for DeviceFilter {
    fn default() -> Self {
        Self {
            vendor_id: device::VENDOR_ID,
            product_id: device::PRODUCT_ID,
            usage_page: device::USAGE_PAGE,
        }
    }
}

impl DeviceFilter {
    /// Whether an enumerated interface is the one we drive
    pub fn matches(&self, vid: u16, pid: u16, usage_page: u16) -> bool {
        vid == self.vendor_id && pid == self.product_id && usage_page == self.usage_page
    }
}

/// hidapi-based discovery
pub struct HidDiscovery {
    filter: DeviceFilter,
}

impl Default for HidDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl HidDiscovery {
    /// Discover the stock SOOMFON vendor interface
    pub fn new() -> Self {
        Self::with_filter(DeviceFilter::default())
    }

    /// Discover interfaces matching a custom filter (rebadged units)
    pub fn with_filter(filter: DeviceFilter) -> Self {
        Self { filter }
    }

    /// The active filter
    pub fn filter(&self) -> DeviceFilter {
        self.filter
    }
}

fn to_info(d: &hidapi::DeviceInfo) -> TransportDeviceInfo {
    TransportDeviceInfo {
        vid: d.vendor_id(),
        pid: d.product_id(),
        device_path: d.path().to_string_lossy().to_string(),
        serial: d.serial_number().map(|s| s.to_string()),
        manufacturer: d.manufacturer_string().map(|s| s.to_string()),
        product_name: d.product_string().map(|s| s.to_string()),
        interface_number: d.interface_number(),
        usage_page: d.usage_page(),
        usage: d.usage(),
    }
}

impl DeviceDiscovery for HidDiscovery {
    fn list_devices(&self) -> Result<Vec<TransportDeviceInfo>, TransportError> {
        let api = HidApi::new().map_err(TransportError::open)?;

        let devices: Vec<TransportDeviceInfo> = api
            .device_list()
            .filter(|d| self.filter.matches(d.vendor_id(), d.product_id(), d.usage_page()))
            .map(|d| {
                let info = to_info(d);
                debug!(
                    "Found interface: VID={:04X} PID={:04X} if={} page={:04X} usage={:04X} path={}",
                    info.vid,
                    info.pid,
                    info.interface_number,
                    info.usage_page,
                    info.usage,
                    info.device_path
                );
                info
            })
            .collect();

        info!("Found {} matching interfaces", devices.len());
        Ok(devices)
    }

    fn open_device(
        &self,
        info: &TransportDeviceInfo,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        let api = HidApi::new().map_err(TransportError::open)?;

        let hid_info = api
            .device_list()
            .find(|d| d.path().to_string_lossy() == info.device_path.as_str())
            .ok_or_else(|| TransportError::DeviceNotFound(info.device_path.clone()))?;

        let device = hid_info.open_device(&api).map_err(TransportError::open)?;
        // Reads are bounded by read_timeout; writes must block until queued
        device
            .set_blocking_mode(true)
            .map_err(TransportError::open)?;

        info!("Opened {} at {}", info.label(), info.device_path);
        Ok(Arc::new(HidTransport::new(device, info.clone())))
    }
}
