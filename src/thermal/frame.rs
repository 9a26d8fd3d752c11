//! Frame decoding and calibration
//!
//! A [`ThermalFrame`] owns one decoded 206x156 pixel grid together with its
//! bad-pixel mask and the statistics derived from the good pixels. It knows
//! how to derive gain and offset calibration vectors from itself, how to
//! apply them, and how to repair bad pixels from their neighbours.
//!
//! The bad-pixel mask only ever grows: it starts as the sensor's fixed
//! calibration pattern and [`ThermalFrame::add_bad_pixels`] unions more
//! pixels into it.

pub mod types;
mod pattern;


use tracing::debug;

use crate::thermal::common::error::{Result, ThermalError};

pub use pattern::{is_pattern_index, is_pattern_pixel};
pub use types::{
    FrameKind, GainCalibration, OffsetCalibration, FRAME_HEIGHT, FRAME_KIND_PIXEL, FRAME_WIDTH,
    PIXEL_COUNT,
};

/// A decoded thermal frame with its bad-pixel mask and statistics.
#[derive(Debug, Clone)]
pub struct ThermalFrame {
    pixels: Vec<u16>,
    bad_pixels: Vec<bool>,
    kind: FrameKind,
    min_val: u16,
    max_val: u16,
    avg_val: u16,
}

impl Default for ThermalFrame {
    fn default() -> Self {
        Self {
            pixels: Vec::new(),
            bad_pixels: Vec::new(),
            kind: FrameKind::Other(0),
            min_val: u16::MAX,
            max_val: 0,
            avg_val: 0,
        }
    }
}

impl ThermalFrame {
    /// Builds a frame from a decoded pixel vector.
    ///
    /// The vector must hold exactly [`PIXEL_COUNT`] values. The bad-pixel
    /// mask starts out as the calibration pattern and the statistics are
    /// computed immediately.
    pub fn from_pixels(pixels: Vec<u16>) -> Result<Self> {
        if pixels.len() != PIXEL_COUNT {
            return Err(ThermalError::InvalidFrameLength(pixels.len()));
        }

        let bad_pixels = (0..PIXEL_COUNT).map(is_pattern_index).collect();
        let kind = FrameKind::from(pixels[FRAME_KIND_PIXEL] as u8);

        let mut frame = Self {
            pixels,
            bad_pixels,
            kind,
            ..Self::default()
        };
        frame.compute_min_max();

        Ok(frame)
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u16> {
        if x >= FRAME_WIDTH {
            return None;
        }
        self.pixels.get(y * FRAME_WIDTH + x).copied()
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn min_val(&self) -> u16 {
        self.min_val
    }

    pub fn max_val(&self) -> u16 {
        self.max_val
    }

    pub fn avg_val(&self) -> u16 {
        self.avg_val
    }

    pub fn is_bad(&self, index: usize) -> bool {
        self.bad_pixels.get(index).copied().unwrap_or(false)
    }

    pub fn bad_pixel_count(&self) -> usize {
        self.bad_pixels.iter().filter(|&&bad| bad).count()
    }

    /// Recomputes min, max and average over the pixels not flagged bad.
    ///
    /// A frame with no good pixel reports 0 for all three.
    pub fn compute_min_max(&mut self) {
        let mut min_val = u16::MAX;
        let mut max_val = 0u16;
        let mut total: u64 = 0;
        let mut count: u64 = 0;

        for (&val, &bad) in self.pixels.iter().zip(&self.bad_pixels) {
            if bad {
                continue;
            }
            min_val = min_val.min(val);
            max_val = max_val.max(val);
            total += u64::from(val);
            count += 1;
        }

        if count == 0 {
            self.min_val = 0;
            self.max_val = 0;
            self.avg_val = 0;
            return;
        }

        self.min_val = min_val;
        self.max_val = max_val;
        self.avg_val = (total / count) as u16;
    }

    /// Offset that brings every pixel to the frame average.
    ///
    /// Zero-valued pixels are treated as unmeasured and get no correction.
    pub fn offset_calibration(&self) -> OffsetCalibration {
        let avg = i32::from(self.avg_val);

        OffsetCalibration::new(
            self.pixels
                .iter()
                .map(|&val| if val == 0 { 0 } else { avg - i32::from(val) })
                .collect(),
        )
    }

    /// Adds the per-pixel deltas, clamping the result to the u16 range.
    ///
    /// An empty calibration leaves the frame untouched.
    pub fn apply_offset_calibration(&mut self, calibration: &OffsetCalibration) -> Result<()> {
        if calibration.is_empty() {
            return Ok(());
        }
        self.check_calibration_len(calibration.len())?;

        for (pixel, &delta) in self.pixels.iter_mut().zip(calibration.values()) {
            *pixel = (i32::from(*pixel) + delta).clamp(0, i32::from(u16::MAX)) as u16;
        }

        Ok(())
    }

    /// Multiplier that brings every pixel to the frame average.
    ///
    /// Zero-valued pixels and pattern pixels get a multiplier of 1.0.
    pub fn gain_calibration(&self) -> GainCalibration {
        let avg = f64::from(self.avg_val);

        GainCalibration::new(
            self.pixels
                .iter()
                .enumerate()
                .map(|(index, &val)| {
                    if val == 0 || is_pattern_index(index) {
                        1.0
                    } else {
                        avg / f64::from(val)
                    }
                })
                .collect(),
        )
    }

    /// Multiplies every pixel, rounding and clamping to the u16 range.
    ///
    /// An empty calibration leaves the frame untouched.
    pub fn apply_gain_calibration(&mut self, calibration: &GainCalibration) -> Result<()> {
        if calibration.is_empty() {
            return Ok(());
        }
        self.check_calibration_len(calibration.len())?;

        for (pixel, &multiplier) in self.pixels.iter_mut().zip(calibration.values()) {
            let scaled = (f64::from(*pixel) * multiplier).round();
            *pixel = scaled.clamp(0.0, f64::from(u16::MAX)) as u16;
        }

        Ok(())
    }

    /// Indices of non-pattern pixels that currently read exactly 0.
    pub fn zero_pixels(&self) -> Vec<usize> {
        self.pixels
            .iter()
            .enumerate()
            .filter(|&(index, &val)| val == 0 && !is_pattern_index(index))
            .map(|(index, _)| index)
            .collect()
    }

    /// Flags the given pixels as bad. Existing entries are never cleared.
    pub fn add_bad_pixels(&mut self, indices: &[usize]) {
        for &index in indices {
            match self.bad_pixels.get_mut(index) {
                Some(bad) => *bad = true,
                None => debug!(index, "Ignoring out-of-range bad pixel"),
            }
        }
    }

    /// Replaces every bad pixel with the mean of its good 4-neighbours,
    /// or with the frame average when it has none.
    pub fn fix_bad_pixels(&mut self) {
        for index in 0..self.pixels.len() {
            if self.bad_pixels[index] {
                self.pixels[index] = self.repaired_value(index, None);
            }
        }
    }

    /// Repairs an explicit list of pixels, regardless of the bad-pixel mask.
    ///
    /// With `use_own_value` the pixel's current value takes part in the mean
    /// with weight 2.
    pub fn fix_pixels(&mut self, indices: &[usize], use_own_value: bool) {
        for &index in indices {
            let Some(&own) = self.pixels.get(index) else {
                debug!(index, "Ignoring out-of-range pixel");
                continue;
            };
            self.pixels[index] = self.repaired_value(index, use_own_value.then_some(own));
        }
    }

    /// Saturating per-pixel subtraction (floor at 0).
    pub fn subtract(&mut self, other: &ThermalFrame) -> Result<()> {
        self.check_shape(other)?;
        for (pixel, &val) in self.pixels.iter_mut().zip(&other.pixels) {
            *pixel = pixel.saturating_sub(val);
        }
        Ok(())
    }

    /// Saturating per-pixel addition (ceiling at 65535).
    pub fn add(&mut self, other: &ThermalFrame) -> Result<()> {
        self.check_shape(other)?;
        for (pixel, &val) in self.pixels.iter_mut().zip(&other.pixels) {
            *pixel = pixel.saturating_add(val);
        }
        Ok(())
    }

    /// Pixel counts per value over `[min_val, max_val]`.
    ///
    /// Values outside that range are not counted.
    pub fn histogram(&self) -> Vec<u32> {
        if self.is_empty() || self.max_val < self.min_val {
            return Vec::new();
        }

        let mut bins = vec![0u32; usize::from(self.max_val - self.min_val) + 1];
        for &val in &self.pixels {
            if (self.min_val..=self.max_val).contains(&val) {
                bins[usize::from(val - self.min_val)] += 1;
            }
        }
        bins
    }

    fn repaired_value(&self, index: usize, own: Option<u16>) -> u16 {
        let x = index % FRAME_WIDTH;
        let y = index / FRAME_WIDTH;

        let (mut total, mut count) = match own {
            Some(val) => (u32::from(val) * 2, 2u32),
            None => (0u32, 0u32),
        };

        let mut neighbours = [None; 4];
        if y > 0 {
            neighbours[0] = Some(index - FRAME_WIDTH);
        }
        if y + 1 < FRAME_HEIGHT {
            neighbours[1] = Some(index + FRAME_WIDTH);
        }
        if x > 0 {
            neighbours[2] = Some(index - 1);
        }
        if x + 1 < FRAME_WIDTH {
            neighbours[3] = Some(index + 1);
        }

        for neighbour in neighbours.into_iter().flatten() {
            if !self.bad_pixels[neighbour] {
                total += u32::from(self.pixels[neighbour]);
                count += 1;
            }
        }

        if count == 0 {
            self.avg_val
        } else {
            (total / count) as u16
        }
    }

    fn check_calibration_len(&self, actual: usize) -> Result<()> {
        if actual != self.pixels.len() {
            return Err(ThermalError::CalibrationSizeMismatch {
                expected: self.pixels.len(),
                actual,
            });
        }
        Ok(())
    }

    fn check_shape(&self, other: &ThermalFrame) -> Result<()> {
        if other.pixels.len() != self.pixels.len() {
            return Err(ThermalError::ShapeMismatch {
                expected: self.pixels.len(),
                actual: other.pixels.len(),
            });
        }
        Ok(())
    }
}
