//! `rusb` backed transport used with real hardware.

use std::time::Duration;

use rusb::{Context, Direction, Recipient, RequestType, UsbContext};
use tracing::debug;

use crate::thermal::common::error::{Result, ThermalError};
use crate::thermal::usb::transport::{DeviceHandle, DeviceTransport};

pub struct RusbTransport {
    context: Context,
}

impl RusbTransport {
    pub fn new() -> Result<Self> {
        Ok(Self {
            context: Context::new()?,
        })
    }
}

impl DeviceTransport for RusbTransport {
    type Handle = RusbHandle;

    fn open(&self, vendor_id: u16, product_id: u16) -> Result<Option<RusbHandle>> {
        for device in self.context.devices()?.iter() {
            let descriptor = match device.device_descriptor() {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    debug!("Skipping device without descriptor: {}", e);
                    continue;
                }
            };

            if descriptor.vendor_id() == vendor_id && descriptor.product_id() == product_id {
                debug!(
                    bus = device.bus_number(),
                    address = device.address(),
                    "Opening {:04x}:{:04x}",
                    vendor_id,
                    product_id
                );
                return Ok(Some(RusbHandle {
                    handle: device.open()?,
                }));
            }
        }

        Ok(None)
    }
}

pub struct RusbHandle {
    handle: rusb::DeviceHandle<Context>,
}

fn map_usb_error(e: rusb::Error) -> ThermalError {
    match e {
        rusb::Error::Timeout => ThermalError::Timeout,
        other => ThermalError::Usb(other),
    }
}

impl DeviceHandle for RusbHandle {
    fn claim_interface(&mut self, interface: u8) -> Result<()> {
        self.handle.claim_interface(interface).map_err(map_usb_error)
    }

    fn release_interface(&mut self, interface: u8) -> Result<()> {
        self.handle.release_interface(interface).map_err(map_usb_error)
    }

    fn write_control(&mut self, request: u8, data: &[u8], timeout: Duration) -> Result<usize> {
        self.handle
            .write_control(
                rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Interface),
                request,
                0,
                0,
                data,
                timeout,
            )
            .map_err(map_usb_error)
    }

    fn read_control(&mut self, request: u8, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        self.handle
            .read_control(
                rusb::request_type(Direction::In, RequestType::Vendor, Recipient::Interface),
                request,
                0,
                0,
                buf,
                timeout,
            )
            .map_err(map_usb_error)
    }

    fn read_bulk(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        self.handle
            .read_bulk(endpoint, buf, timeout)
            .map_err(map_usb_error)
    }
}
