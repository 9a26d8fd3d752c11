//! Driver plus calibration, wired together
//!
//! A [`ThermalSession`] owns a [`SeekThermal`] driver and a
//! [`CalibrationCoordinator`] sharing one event dispatcher. Every
//! `NewFrame` from the worker is fed to the coordinator on the worker
//! thread; a stop that falls due after calibration only raises the driver's
//! stop flag.

use std::sync::mpsc;
use std::sync::Arc;

use tracing::info;

use crate::thermal::calibration::{CalibrationCoordinator, FrameOutcome, RangeMode};
use crate::thermal::common::error::Result;
use crate::thermal::driver::{
    DriverConfig, DriverState, EventDispatcher, EventListener, SeekThermal, ThermalEvent,
};
use crate::thermal::usb::{DeviceTransport, RusbTransport};

pub struct ThermalSession<T: DeviceTransport> {
    driver: SeekThermal<T>,
    coordinator: Arc<CalibrationCoordinator>,
}

impl ThermalSession<RusbTransport> {
    pub fn new(config: DriverConfig) -> Result<Self> {
        Ok(Self::with_transport(RusbTransport::new()?, config))
    }
}

impl<T: DeviceTransport> ThermalSession<T> {
    pub fn with_transport(transport: T, config: DriverConfig) -> Self {
        let events = Arc::new(EventDispatcher::new());
        let coordinator = Arc::new(CalibrationCoordinator::new(Arc::clone(&events)));
        let driver = SeekThermal::with_transport(transport, config, Arc::clone(&events));

        let weak = Arc::downgrade(&coordinator);
        let stop = driver.stop_signal();
        events.subscribe(move |event: &ThermalEvent| {
            let ThermalEvent::NewFrame(pixels) = event else {
                return;
            };
            let Some(coordinator) = weak.upgrade() else {
                return;
            };
            if let FrameOutcome::Displayed { stop_streaming: true } =
                coordinator.on_new_frame(pixels.clone())
            {
                info!("Calibrated frame taken, stopping stream");
                stop.request();
            }
        });

        Self {
            driver,
            coordinator,
        }
    }

    pub fn connect(&self) -> bool {
        self.driver.connect()
    }

    pub fn close(&self) {
        self.driver.close();
    }

    pub fn get_stream(&self) -> bool {
        self.driver.get_stream()
    }

    pub fn get_one(&self) -> bool {
        self.driver.get_one()
    }

    pub fn stop_streaming(&self) {
        self.driver.stop_streaming();
    }

    /// Streams until the first regular frame after the next offset
    /// calibration has been published, then stops.
    pub fn take_one(&self) -> bool {
        self.coordinator.request_stop_after_calibration();
        self.driver.get_stream()
    }

    pub fn request_extra_calibration(&self) {
        self.coordinator.request_extra_calibration();
    }

    pub fn set_use_extra_calibration(&self, enabled: bool) {
        self.coordinator.set_use_extra_calibration(enabled);
    }

    pub fn set_range_mode(&self, range: RangeMode) {
        self.coordinator.set_range_mode(range);
    }

    pub fn subscribe(&self, listener: impl EventListener + 'static) {
        self.driver.events().subscribe(listener);
    }

    pub fn subscribe_channel(&self) -> mpsc::Receiver<ThermalEvent> {
        self.driver.events().subscribe_channel()
    }

    pub fn state(&self) -> DriverState {
        self.driver.state()
    }

    pub fn is_open(&self) -> bool {
        self.driver.is_open()
    }

    pub fn is_streaming(&self) -> bool {
        self.driver.is_streaming()
    }

    pub fn driver(&self) -> &SeekThermal<T> {
        &self.driver
    }

    pub fn coordinator(&self) -> &Arc<CalibrationCoordinator> {
        &self.coordinator
    }
}
