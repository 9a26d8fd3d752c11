//! Common utilities module
//!
//! Shared error type used across the driver, the frame decoder and the
//! calibration coordinator.

pub mod error;

pub use error::{Result, ThermalError};
