use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThermalError {
    #[error("No device found with ID {vendor_id:04x}:{product_id:04x}")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("Device initialization failed: {0}")]
    InitializationFailure(#[source] Box<ThermalError>),

    #[error("Control request {request:#04x} transferred {actual} bytes, expected {expected}")]
    ShortTransfer {
        request: u8,
        expected: usize,
        actual: usize,
    },

    #[error("Partial frame: received {received} of {expected} bytes")]
    PartialFrame { received: usize, expected: usize },

    #[error("USB transfer timed out")]
    Timeout,

    #[error("Device is not connected")]
    NotConnected,

    #[error("Invalid frame length: {0} pixels")]
    InvalidFrameLength(usize),

    #[error("Calibration has {actual} entries, frame has {expected} pixels")]
    CalibrationSizeMismatch { expected: usize, actual: usize },

    #[error("Frame shape mismatch: expected {expected} pixels, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ThermalError>;
