use crate::thermal::frame::types::FRAME_WIDTH;

const PATTERN_PERIOD: i64 = 15;

/// Whether `(x, y)` lies on the sensor's fixed calibration pattern.
///
/// The pattern repeats every 15 columns; row `y` starts at column
/// `(10 - 4y) mod 15`. These pixels never carry thermal data.
pub fn is_pattern_pixel(x: usize, y: usize) -> bool {
    let start = (10 - 4 * y as i64).rem_euclid(PATTERN_PERIOD);
    let x = x as i64;

    x >= start && (x - start) % PATTERN_PERIOD == 0
}

/// Same as [`is_pattern_pixel`] for a linear pixel index
pub fn is_pattern_index(index: usize) -> bool {
    is_pattern_pixel(index % FRAME_WIDTH, index / FRAME_WIDTH)
}
