use std::time::Duration;

use crate::thermal::common::error::Result;

/// Finds and opens the camera.
pub trait DeviceTransport: Send + Sync + 'static {
    type Handle: DeviceHandle;

    /// Opens the first device matching the IDs, or `None` if there is none.
    fn open(&self, vendor_id: u16, product_id: u16) -> Result<Option<Self::Handle>>;
}

/// An open device. Dropping the handle closes it.
///
/// Control requests are vendor requests addressed to the interface with
/// value and index 0. Every call returns the number of bytes actually
/// transferred.
pub trait DeviceHandle: Send + 'static {
    fn claim_interface(&mut self, interface: u8) -> Result<()>;

    fn release_interface(&mut self, interface: u8) -> Result<()>;

    fn write_control(&mut self, request: u8, data: &[u8], timeout: Duration) -> Result<usize>;

    fn read_control(&mut self, request: u8, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    fn read_bulk(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> Result<usize>;
}
