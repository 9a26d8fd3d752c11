//! Camera driver module
//!
//! Session lifecycle (connect, handshake, shutdown), the acquisition worker
//! and the event fan-out that carries frames to collaborators.

mod config;
mod events;
mod seek_thermal;


pub use config::{DriverConfig, DriverConfigBuilder};
pub use events::{EventDispatcher, EventKind, EventListener, ThermalEvent};
pub use seek_thermal::{DriverState, SeekThermal, StopSignal, StreamMode};
