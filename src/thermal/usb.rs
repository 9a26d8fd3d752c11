//! USB transport module
//!
//! The driver talks to the camera through the [`DeviceTransport`] and
//! [`DeviceHandle`] traits so the protocol logic can run against a real
//! `rusb` context or a scripted mock.

mod transport;
mod rusb_transport;

#[cfg(test)]
pub(crate) mod mock;

pub use rusb_transport::RusbTransport;
pub use transport::{DeviceHandle, DeviceTransport};
