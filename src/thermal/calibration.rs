//! Calibration state machine
//!
//! Ties the three frame kinds coming off the wire to the stored gain and
//! offset vectors and decides when a regular frame is ready for display.

mod coordinator;


pub use coordinator::{
    CalibrationCoordinator, DisplayFrame, FrameOutcome, RangeMode, DEFAULT_MANUAL_RANGE,
};
