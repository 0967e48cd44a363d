//! Transport session: connection lifecycle, report loop and auto-reconnect
//!
//! ```text
//!   connect() ──► Connecting ──► Connected ──(I/O error)──► Error ──┐
//!        ▲            │                │                            │
//!        │            └──(open fails)──┴──► Error                   │
//!        └───────────── reconnect loop (fixed interval) ◄───────────┘
//! ```
//!
//! One session owns at most one open handle. A dedicated thread reads reports
//! with a short timeout and publishes each non-empty report as
//! [`SessionEvent::Data`] in arrival order. Any read or write failure closes
//! the handle, publishes `Error` then `Disconnected`, and (when enabled)
//! starts the background reconnect loop. `connect()` never blocks on retries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::discovery::{DeviceDiscovery, HidDiscovery};
use crate::error::TransportError;
use crate::listeners::{ListenerHub, ListenerId};
use crate::protocol::{timing, REPORT_SIZE};
use crate::types::{ConnectionState, SessionEvent, TransportDeviceInfo};
use crate::{ReportWriter, Transport};

/// Granularity at which the reconnect loop notices it was cancelled
const RECONNECT_POLL_SLICE: Duration = Duration::from_millis(20);

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Start the background reconnect loop after failures
    pub auto_reconnect: bool,
    /// Delay between reconnect attempts
    pub reconnect_interval: Duration,
    /// Read timeout of the report loop in milliseconds
    pub read_timeout_ms: i32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_interval: Duration::from_millis(timing::RECONNECT_INTERVAL_MS),
            read_timeout_ms: timing::READ_TIMEOUT_MS,
        }
    }
}

/// An open handle plus the thread reading from it
struct ActiveLink {
    transport: Arc<dyn Transport>,
    info: TransportDeviceInfo,
    shutdown: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl ActiveLink {
    /// Stop the report loop; joins unless called from the loop itself
    fn close(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.reader.take() {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

struct Slot {
    state: ConnectionState,
    /// Bumped for every new link so stale loops cannot tear down a newer one
    generation: u64,
    link: Option<ActiveLink>,
}

struct SessionInner {
    discovery: Arc<dyn DeviceDiscovery>,
    read_timeout_ms: i32,
    reconnect_interval: Mutex<Duration>,
    auto_reconnect: AtomicBool,
    /// Set by `connect()`, cleared by `disconnect()`
    wanted: AtomicBool,
    reconnecting: AtomicBool,
    connect_lock: Mutex<()>,
    slot: Mutex<Slot>,
    events: ListenerHub<SessionEvent>,
}

/// Connection to one panel
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create a disconnected session over a discovery backend
    pub fn new(discovery: Arc<dyn DeviceDiscovery>, config: SessionConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                discovery,
                read_timeout_ms: config.read_timeout_ms.max(1),
                reconnect_interval: Mutex::new(config.reconnect_interval),
                auto_reconnect: AtomicBool::new(config.auto_reconnect),
                wanted: AtomicBool::new(false),
                reconnecting: AtomicBool::new(false),
                connect_lock: Mutex::new(()),
                slot: Mutex::new(Slot {
                    state: ConnectionState::Disconnected,
                    generation: 0,
                    link: None,
                }),
                events: ListenerHub::new("session"),
            }),
        }
    }

    /// Create a session over hidapi with the stock device filter
    pub fn hid(config: SessionConfig) -> Self {
        Self::new(Arc::new(HidDiscovery::new()), config)
    }

    /// Open the first matching interface and start the report loop
    ///
    /// Returns the cached identity if already connected. On failure the
    /// error is returned immediately and, if auto-reconnect is enabled,
    /// background retries are scheduled.
    pub fn connect(&self) -> Result<TransportDeviceInfo, TransportError> {
        self.inner.wanted.store(true, Ordering::SeqCst);
        match self.inner.connect_once() {
            Ok(info) => Ok(info),
            Err(e) => {
                warn!("Connect failed: {}", e);
                self.inner.events.emit(&SessionEvent::Error(e.to_string()));
                self.inner.schedule_reconnect();
                Err(e)
            }
        }
    }

    /// Close the handle and stop the report loop and any reconnect attempts
    ///
    /// Safe to call when already disconnected.
    pub fn disconnect(&self) {
        self.inner.wanted.store(false, Ordering::SeqCst);
        let link = {
            let mut slot = self.inner.slot.lock();
            slot.generation += 1;
            slot.state = ConnectionState::Disconnected;
            slot.link.take()
        };

        if let Some(link) = link {
            info!("Disconnecting from {}", link.info.label());
            link.close();
            self.inner.events.emit(&SessionEvent::Disconnected);
        }
    }

    /// Write one report to the device
    pub fn write(&self, data: &[u8]) -> Result<(), TransportError> {
        self.inner.write(data)
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.inner.slot.lock().state
    }

    /// Whether reports can be written
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Identity of the connected device
    pub fn device_info(&self) -> Option<TransportDeviceInfo> {
        self.inner
            .slot
            .lock()
            .link
            .as_ref()
            .map(|link| link.info.clone())
    }

    /// List matching interfaces without opening them
    pub fn list_devices(&self) -> Result<Vec<TransportDeviceInfo>, TransportError> {
        self.inner.discovery.list_devices()
    }

    /// Enable or disable the background reconnect loop
    pub fn set_auto_reconnect(&self, enabled: bool) {
        self.inner.auto_reconnect.store(enabled, Ordering::SeqCst);
        if enabled {
            self.inner.schedule_reconnect();
        }
    }

    /// Whether auto-reconnect is enabled
    pub fn auto_reconnect(&self) -> bool {
        self.inner.auto_reconnect.load(Ordering::SeqCst)
    }

    /// Change the delay between reconnect attempts
    pub fn set_reconnect_interval(&self, interval: Duration) {
        *self.inner.reconnect_interval.lock() = interval;
    }

    /// Register a callback for session events
    ///
    /// Callbacks run on the thread that produced the event (the report loop
    /// for `Data`).
    pub fn add_listener<F>(&self, f: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.inner.events.add_listener(f)
    }

    /// Unregister a callback
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.events.remove_listener(id)
    }

    /// Subscribe to session events via broadcast channel
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }
}

impl ReportWriter for Session {
    fn write_report(&self, report: &[u8]) -> Result<(), TransportError> {
        self.write(report)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl SessionInner {
    fn connect_once(self: &Arc<Self>) -> Result<TransportDeviceInfo, TransportError> {
        let _guard = self.connect_lock.lock();

        {
            let mut slot = self.slot.lock();
            if let (ConnectionState::Connected, Some(link)) = (slot.state, slot.link.as_ref()) {
                return Ok(link.info.clone());
            }
            slot.state = ConnectionState::Connecting;
        }
        info!("Attempting to connect to panel...");

        let transport = match self.open_first() {
            Ok(transport) => transport,
            Err(e) => {
                let mut slot = self.slot.lock();
                // A disconnect() issued while opening wins over the failure
                slot.state = if self.wanted.load(Ordering::SeqCst) {
                    ConnectionState::Error
                } else {
                    ConnectionState::Disconnected
                };
                return Err(e);
            }
        };
        let info = transport.device_info().clone();
        let shutdown = Arc::new(AtomicBool::new(false));

        let generation = {
            let mut slot = self.slot.lock();
            // disconnect() raced with a reconnect attempt
            if !self.wanted.load(Ordering::SeqCst) {
                slot.state = ConnectionState::Disconnected;
                return Err(TransportError::NotConnected);
            }
            slot.generation += 1;
            slot.state = ConnectionState::Connected;
            slot.link = Some(ActiveLink {
                transport: Arc::clone(&transport),
                info: info.clone(),
                shutdown: Arc::clone(&shutdown),
                reader: None,
            });
            slot.generation
        };

        info!("Connected to panel {} at {}", info.label(), info.device_path);
        // Published before the loop starts so Connected precedes any Data
        self.events.emit(&SessionEvent::Connected(info.clone()));

        let inner = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("soomfon-report-reader".into())
            .spawn(move || inner.run_report_loop(transport, shutdown, generation));

        match spawned {
            Ok(handle) => {
                let mut slot = self.slot.lock();
                let current = slot.generation == generation;
                match slot.link.as_mut() {
                    Some(link) if current => link.reader = Some(handle),
                    // Torn down while spawning; the loop sees its shutdown flag
                    _ => drop(handle),
                }
                Ok(info)
            }
            Err(e) => {
                let err = TransportError::Internal(format!("spawn report reader: {e}"));
                self.fail(generation, &err);
                Err(err)
            }
        }
    }

    fn open_first(&self) -> Result<Arc<dyn Transport>, TransportError> {
        let devices = self.discovery.list_devices()?;
        let first = devices.first().ok_or_else(|| {
            TransportError::DeviceNotFound("no matching command-and-event interface".into())
        })?;
        self.discovery.open_device(first)
    }

    fn write(self: &Arc<Self>, data: &[u8]) -> Result<(), TransportError> {
        let (transport, generation) = {
            let slot = self.slot.lock();
            match (slot.state, slot.link.as_ref()) {
                (ConnectionState::Connected, Some(link)) => {
                    (Arc::clone(&link.transport), slot.generation)
                }
                _ => return Err(TransportError::NotConnected),
            }
        };

        debug!(
            "Writing report ({} bytes): {:02X?}",
            data.len(),
            &data[..data.len().min(16)]
        );
        transport.write_report(data).map_err(|e| {
            self.fail(generation, &e);
            e
        })
    }

    /// Tear down the link after an I/O failure
    fn fail(self: &Arc<Self>, generation: u64, cause: &TransportError) {
        let link = {
            let mut slot = self.slot.lock();
            if slot.generation != generation || slot.link.is_none() {
                return;
            }
            slot.state = ConnectionState::Error;
            slot.link.take()
        };

        if let Some(link) = link {
            warn!("Lost panel {}: {}", link.info.label(), cause);
            link.close();
        }
        self.events.emit(&SessionEvent::Error(cause.to_string()));
        self.events.emit(&SessionEvent::Disconnected);
        self.schedule_reconnect();
    }

    fn run_report_loop(
        self: Arc<Self>,
        transport: Arc<dyn Transport>,
        shutdown: Arc<AtomicBool>,
        generation: u64,
    ) {
        debug!("Report reader thread started");
        let mut buf = [0u8; REPORT_SIZE];

        while !shutdown.load(Ordering::SeqCst) {
            match transport.read_report(&mut buf, self.read_timeout_ms) {
                Ok(len) if len > 0 => {
                    debug!("Read {} bytes: {:02X?}", len, &buf[..len.min(16)]);
                    self.events.emit(&SessionEvent::Data(buf[..len].to_vec()));
                }
                Ok(_) => {
                    // Timeout, no data - loop continues to check shutdown
                }
                Err(e) => {
                    if !shutdown.load(Ordering::SeqCst) {
                        self.fail(generation, &e);
                    }
                    break;
                }
            }
        }

        debug!("Report reader thread exiting");
    }

    fn should_reconnect(&self) -> bool {
        self.auto_reconnect.load(Ordering::SeqCst)
            && self.wanted.load(Ordering::SeqCst)
            && self.slot.lock().state != ConnectionState::Connected
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        if !self.should_reconnect() || self.reconnecting.swap(true, Ordering::SeqCst) {
            return;
        }

        let inner = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("soomfon-reconnect".into())
            .spawn(move || inner.run_reconnect_loop());

        if let Err(e) = spawned {
            self.reconnecting.store(false, Ordering::SeqCst);
            warn!("Failed to spawn reconnect thread: {}", e);
        }
    }

    fn run_reconnect_loop(self: Arc<Self>) {
        loop {
            let mut attempt = 0u32;
            while self.should_reconnect() {
                if !self.wait_interval() {
                    break;
                }
                attempt += 1;
                match self.connect_once() {
                    Ok(info) => {
                        info!("Reconnected to {} after {} attempts", info.label(), attempt);
                        break;
                    }
                    Err(e) => debug!("Reconnect attempt {} failed: {}", attempt, e),
                }
            }

            self.reconnecting.store(false, Ordering::SeqCst);
            // A failure may have slipped in between the last check and the store
            if !self.should_reconnect() || self.reconnecting.swap(true, Ordering::SeqCst) {
                return;
            }
        }
    }

    /// Sleep one reconnect interval; false if reconnecting was cancelled
    fn wait_interval(&self) -> bool {
        let deadline = Instant::now() + *self.reconnect_interval.lock();
        loop {
            if !self.should_reconnect() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(RECONNECT_POLL_SLICE.min(deadline - now));
        }
    }
}
