//! Driver configuration types

use std::time::Duration;

use crate::thermal::protocol::{INTERFACE, PRODUCT_ID, VENDOR_ID};

/// Configuration for a [`SeekThermal`](super::SeekThermal) driver
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// USB vendor ID to look for
    pub vendor_id: u16,
    /// USB product ID to look for
    pub product_id: u16,
    /// Interface claimed for the session
    pub interface: u8,
    /// Timeout applied to every control and bulk transfer
    pub timeout: Duration,
    /// How many times the shutdown command is sent on close
    pub shutdown_repeats: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            interface: INTERFACE,
            timeout: Duration::from_millis(1000),
            shutdown_repeats: 3,
        }
    }
}

impl DriverConfig {
    pub fn builder() -> DriverConfigBuilder {
        DriverConfigBuilder::default()
    }
}

/// Builder for DriverConfig
#[derive(Default)]
pub struct DriverConfigBuilder {
    vendor_id: Option<u16>,
    product_id: Option<u16>,
    interface: Option<u8>,
    timeout: Option<Duration>,
    shutdown_repeats: Option<usize>,
}

impl DriverConfigBuilder {
    pub fn vendor_id(mut self, vendor_id: u16) -> Self {
        self.vendor_id = Some(vendor_id);
        self
    }

    pub fn product_id(mut self, product_id: u16) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn interface(mut self, interface: u8) -> Self {
        self.interface = Some(interface);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn shutdown_repeats(mut self, repeats: usize) -> Self {
        self.shutdown_repeats = Some(repeats);
        self
    }

    pub fn build(self) -> DriverConfig {
        let default = DriverConfig::default();
        DriverConfig {
            vendor_id: self.vendor_id.unwrap_or(default.vendor_id),
            product_id: self.product_id.unwrap_or(default.product_id),
            interface: self.interface.unwrap_or(default.interface),
            timeout: self.timeout.unwrap_or(default.timeout),
            shutdown_repeats: self.shutdown_repeats.unwrap_or(default.shutdown_repeats),
        }
    }
}
