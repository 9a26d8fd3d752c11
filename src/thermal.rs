//! Seek Thermal camera support
//!
//! The USB protocol driver, frame decoding and calibration, and the
//! session type that wires them together.

pub mod calibration;
pub mod common;
pub mod driver;
pub mod frame;
pub mod protocol;
pub mod session;
pub mod usb;

pub use common::{Result, ThermalError};

pub use frame::{
    FrameKind,
    GainCalibration,
    OffsetCalibration,
    ThermalFrame,
};

pub use driver::{
    DriverConfig,
    DriverConfigBuilder,
    DriverState,
    EventDispatcher,
    EventKind,
    EventListener,
    SeekThermal,
    StopSignal,
    StreamMode,
    ThermalEvent,
};

pub use calibration::{
    CalibrationCoordinator,
    DisplayFrame,
    FrameOutcome,
    RangeMode,
};

pub use session::ThermalSession;

pub use usb::{DeviceHandle, DeviceTransport, RusbTransport};
