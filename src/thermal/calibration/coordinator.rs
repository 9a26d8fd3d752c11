use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::{debug, info, instrument, warn};

use crate::thermal::common::error::Result;
use crate::thermal::driver::{EventDispatcher, ThermalEvent};
use crate::thermal::frame::{FrameKind, GainCalibration, OffsetCalibration, ThermalFrame};

pub const DEFAULT_MANUAL_RANGE: (u16, u16) = (2000, 18000);

/// How the value range handed to the display is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RangeMode {
    /// Follow the displayed frame's min and max
    #[default]
    Auto,
    Manual { low: u16, high: u16 },
}

impl RangeMode {
    /// Manual range with `low` clamped to at most `high`.
    pub fn manual(low: u16, high: u16) -> Self {
        RangeMode::Manual {
            low: low.min(high),
            high,
        }
    }

    pub fn default_manual() -> Self {
        Self::manual(DEFAULT_MANUAL_RANGE.0, DEFAULT_MANUAL_RANGE.1)
    }
}

/// A calibrated frame together with the value range it should be shown with.
#[derive(Debug, Clone)]
pub struct DisplayFrame {
    pub frame: ThermalFrame,
    pub min: u16,
    pub max: u16,
}

/// What [`CalibrationCoordinator::on_new_frame`] did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    GainCalibrated,
    OffsetCalibrated,
    /// The frame became the current display frame. `stop_streaming` is set
    /// when a stop after calibration was pending and is now due.
    Displayed { stop_streaming: bool },
    Ignored,
}

#[derive(Default)]
struct CalibrationState {
    gain: GainCalibration,
    offset: OffsetCalibration,
    unknown_gain: Vec<usize>,
    extra: OffsetCalibration,
    capture_extra: bool,
    use_extra: bool,
    first_after_calibration: bool,
    stop_after_calibration: bool,
    current: Option<ThermalFrame>,
    range: RangeMode,
}

impl CalibrationState {
    fn absorb_gain_frame(&mut self, frame: &ThermalFrame) {
        self.gain = frame.gain_calibration();
        self.unknown_gain = frame.zero_pixels();
        debug!(unknown_gain = self.unknown_gain.len(), "Gain calibration updated");
    }

    fn absorb_offset_frame(&mut self, mut frame: ThermalFrame) -> Result<()> {
        frame.apply_gain_calibration(&self.gain)?;
        frame.compute_min_max();
        self.offset = frame.offset_calibration();
        self.first_after_calibration = true;
        debug!(avg = frame.avg_val(), "Offset calibration updated");
        Ok(())
    }

    /// Calibrates a regular frame, makes it current and reports whether a
    /// pending stop is now due.
    fn calibrate_regular_frame(&mut self, mut frame: ThermalFrame) -> Result<bool> {
        let zero_pixels = frame.zero_pixels();
        frame.add_bad_pixels(&zero_pixels);
        frame.add_bad_pixels(&self.unknown_gain);

        frame.apply_gain_calibration(&self.gain)?;
        frame.apply_offset_calibration(&self.offset)?;
        frame.compute_min_max();
        frame.fix_bad_pixels();

        let mut stop_streaming = false;
        if self.first_after_calibration {
            self.first_after_calibration = false;

            if self.capture_extra {
                self.capture_extra = false;
                self.extra = frame.offset_calibration();
                info!("Extra calibration captured");
            }
            if self.stop_after_calibration {
                self.stop_after_calibration = false;
                stop_streaming = true;
            }
        }

        self.current = Some(frame);
        Ok(stop_streaming)
    }

    fn display_frame(&self) -> Result<Option<DisplayFrame>> {
        let Some(current) = &self.current else {
            return Ok(None);
        };

        let mut frame = current.clone();
        if self.use_extra && !self.extra.is_empty() {
            frame.apply_offset_calibration(&self.extra)?;
            frame.compute_min_max();
        }

        let (min, max) = match self.range {
            RangeMode::Auto => (frame.min_val(), frame.max_val()),
            RangeMode::Manual { low, high } => (low, high),
        };

        Ok(Some(DisplayFrame { frame, min, max }))
    }
}

/// Per-session calibration state machine.
///
/// Routes decoded frames by kind: gain and offset calibration frames update
/// the stored vectors, regular frames are calibrated, repaired and published
/// as [`ThermalEvent::FrameReady`]. All state sits behind one re-entrant
/// lock so listeners of that event may call back into the coordinator.
pub struct CalibrationCoordinator {
    state: ReentrantMutex<RefCell<CalibrationState>>,
    events: Arc<EventDispatcher>,
}

impl CalibrationCoordinator {
    pub fn new(events: Arc<EventDispatcher>) -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(CalibrationState::default())),
            events,
        }
    }

    #[instrument(level = "debug", skip_all)]
    pub fn on_new_frame(&self, pixels: Vec<u16>) -> FrameOutcome {
        let frame = match ThermalFrame::from_pixels(pixels) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Rejected frame: {}", e);
                return FrameOutcome::Ignored;
            }
        };

        let guard = self.state.lock();
        let kind = frame.kind();

        let outcome = {
            let mut state = guard.borrow_mut();
            match kind {
                FrameKind::GainCalibration => {
                    state.absorb_gain_frame(&frame);
                    Ok(FrameOutcome::GainCalibrated)
                }
                FrameKind::OffsetCalibration => state
                    .absorb_offset_frame(frame)
                    .map(|()| FrameOutcome::OffsetCalibrated),
                FrameKind::Regular => state
                    .calibrate_regular_frame(frame)
                    .map(|stop_streaming| FrameOutcome::Displayed { stop_streaming }),
                FrameKind::Other(code) => {
                    debug!(code, "Ignoring frame of unknown kind");
                    Ok(FrameOutcome::Ignored)
                }
            }
        };

        match outcome {
            Ok(outcome) => {
                if let FrameOutcome::Displayed { .. } = outcome {
                    self.publish();
                }
                outcome
            }
            Err(e) => {
                warn!(?kind, "Calibration failed: {}", e);
                FrameOutcome::Ignored
            }
        }
    }

    /// Captures an extra offset baseline from the first regular frame after
    /// the next offset calibration, and switches its use on.
    pub fn request_extra_calibration(&self) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.capture_extra = true;
        state.use_extra = true;
    }

    /// Enables or disables the extra baseline and re-publishes the current
    /// frame.
    pub fn set_use_extra_calibration(&self, enabled: bool) {
        self.state.lock().borrow_mut().use_extra = enabled;
        self.publish();
    }

    pub fn use_extra_calibration(&self) -> bool {
        self.state.lock().borrow().use_extra
    }

    /// Asks for streaming to stop on the first regular frame after the next
    /// offset calibration.
    pub fn request_stop_after_calibration(&self) {
        self.state.lock().borrow_mut().stop_after_calibration = true;
    }

    pub fn set_range_mode(&self, range: RangeMode) {
        self.state.lock().borrow_mut().range = range;
        self.publish();
    }

    pub fn range_mode(&self) -> RangeMode {
        self.state.lock().borrow().range
    }

    pub fn current_frame(&self) -> Option<ThermalFrame> {
        self.state.lock().borrow().current.clone()
    }

    pub fn display_frame(&self) -> Option<DisplayFrame> {
        let guard = self.state.lock();
        let display = guard.borrow().display_frame();
        match display {
            Ok(display) => display,
            Err(e) => {
                warn!("Cannot build display frame: {}", e);
                None
            }
        }
    }

    pub fn gain_calibration(&self) -> GainCalibration {
        self.state.lock().borrow().gain.clone()
    }

    pub fn offset_calibration(&self) -> OffsetCalibration {
        self.state.lock().borrow().offset.clone()
    }

    pub fn extra_calibration(&self) -> OffsetCalibration {
        self.state.lock().borrow().extra.clone()
    }

    pub fn unknown_gain_pixels(&self) -> Vec<usize> {
        self.state.lock().borrow().unknown_gain.clone()
    }

    /// Emits the current display frame. The lock is only held across the
    /// emit when the caller already holds it, as `on_new_frame` does;
    /// setters emit unlocked so their listeners may join the worker.
    fn publish(&self) {
        if let Some(display) = self.display_frame() {
            self.events.emit(ThermalEvent::FrameReady(display));
        }
    }
}
