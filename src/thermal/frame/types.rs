//! Frame geometry and calibration vector types

/// Width of the decoded pixel grid
pub const FRAME_WIDTH: usize = 206;
/// Height of the decoded pixel grid
pub const FRAME_HEIGHT: usize = 156;
/// Number of pixels in a decoded frame
pub const PIXEL_COUNT: usize = FRAME_WIDTH * FRAME_HEIGHT;
/// Pixel index carrying the frame kind
pub const FRAME_KIND_PIXEL: usize = 10;

/// Classification of a decoded frame, read from pixel 10
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Shutter frame used to refresh the offset calibration
    OffsetCalibration,
    /// Regular thermal image
    Regular,
    /// Flat-field frame used to derive the gain calibration
    GainCalibration,
    /// Anything else the camera sends; ignored
    Other(u8),
}

impl From<u8> for FrameKind {
    fn from(id: u8) -> Self {
        match id {
            1 => FrameKind::OffsetCalibration,
            3 => FrameKind::Regular,
            4 => FrameKind::GainCalibration,
            other => FrameKind::Other(other),
        }
    }
}

/// Per-pixel multiplicative correction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GainCalibration(Vec<f64>);

/// Per-pixel additive correction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetCalibration(Vec<i32>);

impl GainCalibration {
    pub fn new(multipliers: Vec<f64>) -> Self {
        Self(multipliers)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl OffsetCalibration {
    pub fn new(deltas: Vec<i32>) -> Self {
        Self(deltas)
    }

    pub fn values(&self) -> &[i32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
