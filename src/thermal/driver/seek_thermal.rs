use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, info, instrument, warn};

use crate::thermal::common::error::{Result, ThermalError};
use crate::thermal::driver::config::DriverConfig;
use crate::thermal::driver::events::{EventDispatcher, ThermalEvent};
use crate::thermal::protocol::{self, SHUTDOWN_PAYLOAD, SHUTDOWN_REQUEST};
use crate::thermal::usb::{DeviceHandle, DeviceTransport, RusbTransport};

const WORKER_THREAD_NAME: &str = "seek-thermal-worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Continuous,
    SingleShot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Disconnected,
    Connecting,
    Idle,
    Streaming(StreamMode),
}

/// Cooperative stop flag polled by the worker once per iteration.
///
/// Setting it never blocks, so it is safe to use from listeners running on
/// the worker thread.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct OpenDevice<H> {
    handle: H,
    claimed: bool,
}

impl<H: DeviceHandle> OpenDevice<H> {
    fn initialize(&mut self, config: &DriverConfig) -> Result<()> {
        self.handle.claim_interface(config.interface)?;
        self.claimed = true;
        protocol::initialize(&mut self.handle, config.timeout)
    }
}

struct Inner<T: DeviceTransport> {
    transport: T,
    config: DriverConfig,
    device: ReentrantMutex<RefCell<Option<OpenDevice<T::Handle>>>>,
    events: Arc<EventDispatcher>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Set by the worker for as long as its loop and final events run
    worker_thread: Mutex<Option<ThreadId>>,
    stop: StopSignal,
    open: AtomicBool,
    connecting: AtomicBool,
    running: AtomicBool,
    single: AtomicBool,
}

/// Driver for the Seek Thermal camera.
///
/// Owns the device handle and at most one acquisition worker. Every public
/// call is safe from any thread; failures are logged, turned into a full
/// teardown and reported as [`ThermalEvent::Disconnected`].
pub struct SeekThermal<T: DeviceTransport> {
    inner: Arc<Inner<T>>,
}

impl SeekThermal<RusbTransport> {
    pub fn new(config: DriverConfig) -> Result<Self> {
        Ok(Self::with_transport(
            RusbTransport::new()?,
            config,
            Arc::new(EventDispatcher::new()),
        ))
    }
}

impl<T: DeviceTransport> SeekThermal<T> {
    pub fn with_transport(transport: T, config: DriverConfig, events: Arc<EventDispatcher>) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                device: ReentrantMutex::new(RefCell::new(None)),
                events,
                worker: Mutex::new(None),
                worker_thread: Mutex::new(None),
                stop: StopSignal::default(),
                open: AtomicBool::new(false),
                connecting: AtomicBool::new(false),
                running: AtomicBool::new(false),
                single: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.inner.config
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.inner.events
    }

    /// Opens the camera and runs the initialization handshake.
    ///
    /// An open session is closed first. Returns `true` only if the whole
    /// handshake succeeded; on failure the device is already torn down.
    #[instrument(skip(self))]
    pub fn connect(&self) -> bool {
        self.inner.connecting.store(true, Ordering::SeqCst);
        self.inner.events.emit(ThermalEvent::Connecting);

        if self.is_open() {
            info!("Already connected, closing previous session");
            self.close();
        }

        let connected = self.inner.open_device();
        self.inner.connecting.store(false, Ordering::SeqCst);
        connected
    }

    /// Stops the worker, sends the shutdown command, releases and closes
    /// the device. Does nothing if already closed.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Acquires one frame on the calling thread.
    ///
    /// Returns `None` when the device is not connected or the transfer
    /// failed; in the latter case the device has been closed.
    pub fn get_frame(&self) -> Option<Vec<u16>> {
        self.inner.get_frame()
    }

    /// Starts continuous acquisition.
    pub fn get_stream(&self) -> bool {
        self.start_worker(StreamMode::Continuous)
    }

    /// Acquires a single frame on the worker thread.
    pub fn get_one(&self) -> bool {
        self.start_worker(StreamMode::SingleShot)
    }

    /// Stops acquisition.
    ///
    /// From any thread but the worker this blocks until the worker has
    /// exited. From the worker itself it only raises the stop flag.
    pub fn stop_streaming(&self) {
        self.inner.stop_worker();
    }

    /// Raises the stop flag without waiting.
    pub fn request_stop(&self) {
        self.inner.stop.request();
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.inner.stop.clone()
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst) && !self.inner.single.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> DriverState {
        if self.inner.connecting.load(Ordering::SeqCst) {
            DriverState::Connecting
        } else if !self.is_open() {
            DriverState::Disconnected
        } else if self.inner.running.load(Ordering::SeqCst) {
            if self.inner.single.load(Ordering::SeqCst) {
                DriverState::Streaming(StreamMode::SingleShot)
            } else {
                DriverState::Streaming(StreamMode::Continuous)
            }
        } else {
            DriverState::Idle
        }
    }

    fn start_worker(&self, mode: StreamMode) -> bool {
        if self.inner.is_worker_thread() {
            warn!("Acquisition cannot be restarted from the worker thread");
            return false;
        }
        if !self.is_open() {
            warn!("Cannot start acquisition: {}", ThermalError::NotConnected);
            return false;
        }

        self.inner.stop_worker();

        self.inner.stop.clear();
        self.inner
            .single
            .store(mode == StreamMode::SingleShot, Ordering::SeqCst);
        self.inner.running.store(true, Ordering::SeqCst);

        // Held across the spawn so a concurrent stop always finds the handle
        let mut slot = self.inner.worker.lock();
        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || inner.run_worker());

        match spawned {
            Ok(handle) => {
                debug!(?mode, "Acquisition worker spawned");
                *slot = Some(handle);
                true
            }
            Err(e) => {
                self.inner.running.store(false, Ordering::SeqCst);
                warn!("Failed to spawn acquisition worker: {}", ThermalError::Io(e));
                false
            }
        }
    }
}

impl<T: DeviceTransport> Drop for SeekThermal<T> {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl<T: DeviceTransport> Inner<T> {
    fn open_device(&self) -> bool {
        let guard = self.device.lock();

        let handle = match self.transport.open(self.config.vendor_id, self.config.product_id) {
            Ok(Some(handle)) => handle,
            Ok(None) => {
                drop(guard);
                warn!(
                    "{}",
                    ThermalError::DeviceNotFound {
                        vendor_id: self.config.vendor_id,
                        product_id: self.config.product_id,
                    }
                );
                self.events.emit(ThermalEvent::Disconnected);
                return false;
            }
            Err(e) => {
                drop(guard);
                warn!("Failed to open device: {}", e);
                self.events.emit(ThermalEvent::Disconnected);
                return false;
            }
        };

        let mut device = OpenDevice {
            handle,
            claimed: false,
        };
        let initialized = device.initialize(&self.config);
        *guard.borrow_mut() = Some(device);
        drop(guard);

        match initialized {
            Ok(()) => {
                self.open.store(true, Ordering::SeqCst);
                info!(
                    "Connected to {:04x}:{:04x}",
                    self.config.vendor_id, self.config.product_id
                );
                self.events.emit(ThermalEvent::Connected);
                true
            }
            Err(e) => {
                warn!("{}", ThermalError::InitializationFailure(Box::new(e)));
                self.close();
                false
            }
        }
    }

    fn close(&self) {
        self.stop_worker();

        let closed = {
            let guard = self.device.lock();
            let device = guard.borrow_mut().take();
            self.open.store(false, Ordering::SeqCst);

            match device {
                Some(mut device) => {
                    for _ in 0..self.config.shutdown_repeats {
                        if let Err(e) = protocol::control_out(
                            &mut device.handle,
                            SHUTDOWN_REQUEST,
                            &SHUTDOWN_PAYLOAD,
                            self.config.timeout,
                        ) {
                            debug!("Shutdown command failed: {}", e);
                        }
                    }

                    if device.claimed {
                        if let Err(e) = device.handle.release_interface(self.config.interface) {
                            warn!("Failed to release interface {}: {}", self.config.interface, e);
                        }
                    }
                    true
                }
                None => false,
            }
        };

        if closed {
            info!("Disconnected");
            self.events.emit(ThermalEvent::Disconnected);
        }
    }

    fn get_frame(&self) -> Option<Vec<u16>> {
        let guard = self.device.lock();
        let result = match guard.borrow_mut().as_mut() {
            Some(device) => protocol::acquire_frame(&mut device.handle, self.config.timeout),
            None => {
                debug!("get_frame: {}", ThermalError::NotConnected);
                return None;
            }
        };
        drop(guard);

        match result {
            Ok(pixels) => Some(pixels),
            Err(e) => {
                warn!("Frame acquisition failed, closing device: {}", e);
                self.close();
                None
            }
        }
    }

    fn run_worker(&self) {
        let id = thread::current().id();
        *self.worker_thread.lock() = Some(id);
        let single = self.single.load(Ordering::SeqCst);

        if !single {
            info!("Streaming started");
            self.events.emit(ThermalEvent::StreamingStarted);
        }

        while !self.stop.is_requested() {
            let Some(pixels) = self.get_frame() else {
                break;
            };
            self.events.emit(ThermalEvent::NewFrame(pixels));

            if single {
                break;
            }
        }

        self.running.store(false, Ordering::SeqCst);

        if !single {
            info!("Streaming stopped");
            self.events.emit(ThermalEvent::StreamingStopped);
        }

        let mut worker_thread = self.worker_thread.lock();
        if *worker_thread == Some(id) {
            *worker_thread = None;
        }
    }

    fn is_worker_thread(&self) -> bool {
        *self.worker_thread.lock() == Some(thread::current().id())
    }

    fn stop_worker(&self) {
        self.stop.request();

        // The loop picks up the flag on its next iteration
        if self.is_worker_thread() {
            return;
        }

        let Some(handle) = self.worker.lock().take() else {
            return;
        };

        if handle.join().is_err() {
            warn!("Acquisition worker panicked");
            self.running.store(false, Ordering::SeqCst);
        }
    }
}
