//! Seek Thermal wire protocol
//!
//! Device identity, the fixed initialization handshake, frame acquisition
//! over the bulk endpoint, and decoding of the raw 208-sample rows into the
//! 206x156 pixel grid.

use std::time::Duration;

use tracing::{debug, instrument};

use crate::thermal::common::error::{Result, ThermalError};
use crate::thermal::frame::{FRAME_HEIGHT, FRAME_WIDTH, PIXEL_COUNT};
use crate::thermal::usb::DeviceHandle;

pub const VENDOR_ID: u16 = 0x289D;
pub const PRODUCT_ID: u16 = 0x0010;
pub const INTERFACE: u8 = 0;
pub const BULK_ENDPOINT: u8 = 0x81;

/// Samples per row on the wire; the last two are padding.
pub const RAW_ROW_STRIDE: usize = 208;
/// Bytes delivered per frame acquisition.
pub const RAW_FRAME_BYTES: usize = RAW_ROW_STRIDE * FRAME_HEIGHT * 2;

pub const ARM_REQUEST: u8 = 0x53;
pub const ARM_PAYLOAD: [u8; 4] = [0xC0, 0x7E, 0x00, 0x00];

pub const SHUTDOWN_REQUEST: u8 = 0x3C;
pub const SHUTDOWN_PAYLOAD: [u8; 2] = [0x00, 0x00];

/// One control transfer of the initialization handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStep {
    Out { request: u8, payload: &'static [u8] },
    In { request: u8, length: usize },
}

pub const INIT_SEQUENCE: &[ControlStep] = &[
    ControlStep::Out { request: 0x56, payload: &[0x01] },
    ControlStep::Out { request: 0x56, payload: &[0x00, 0x00] },
    ControlStep::In { request: 0x4E, length: 4 },
    ControlStep::In { request: 0x36, length: 12 },
    ControlStep::Out { request: 0x56, payload: &[0x06, 0x00, 0x08, 0x00, 0x00, 0x00] },
    ControlStep::In { request: 0x58, length: 0x0C },
    ControlStep::Out { request: 0x56, payload: &[0x01, 0x00, 0x00, 0x06, 0x00, 0x00] },
    ControlStep::In { request: 0x58, length: 0x02 },
    ControlStep::Out { request: 0x56, payload: &[0x01, 0x00, 0x01, 0x06, 0x00, 0x00] },
    ControlStep::In { request: 0x58, length: 0x02 },
    ControlStep::Out { request: 0x56, payload: &[0x20, 0x00, 0x30, 0x00, 0x00, 0x00] },
    ControlStep::In { request: 0x58, length: 0x40 },
    ControlStep::Out { request: 0x56, payload: &[0x20, 0x00, 0x50, 0x00, 0x00, 0x00] },
    ControlStep::In { request: 0x58, length: 0x40 },
    ControlStep::Out { request: 0x56, payload: &[0x0C, 0x00, 0x70, 0x00, 0x00, 0x00] },
    ControlStep::In { request: 0x58, length: 0x18 },
    ControlStep::Out { request: 0x3E, payload: &[0x08, 0x00] },
    ControlStep::In { request: 0x3D, length: 0x02 },
    ControlStep::Out { request: 0x3C, payload: &[0x01, 0x00] },
    ControlStep::In { request: 0x3D, length: 0x02 },
];

/// Sends a control-out request and checks the whole payload went through.
pub fn control_out<H: DeviceHandle>(
    handle: &mut H,
    request: u8,
    payload: &[u8],
    timeout: Duration,
) -> Result<()> {
    let actual = handle.write_control(request, payload, timeout)?;
    if actual != payload.len() {
        return Err(ThermalError::ShortTransfer {
            request,
            expected: payload.len(),
            actual,
        });
    }
    Ok(())
}

/// Reads exactly `length` bytes from a control-in request.
pub fn control_in<H: DeviceHandle>(
    handle: &mut H,
    request: u8,
    length: usize,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let mut data = vec![0u8; length];
    let actual = handle.read_control(request, &mut data, timeout)?;
    if actual != length {
        return Err(ThermalError::ShortTransfer {
            request,
            expected: length,
            actual,
        });
    }
    Ok(data)
}

/// Runs the handshake. The replies are read back but not interpreted.
pub fn initialize<H: DeviceHandle>(handle: &mut H, timeout: Duration) -> Result<()> {
    for step in INIT_SEQUENCE {
        match *step {
            ControlStep::Out { request, payload } => {
                debug!(request, len = payload.len(), "init control out");
                control_out(handle, request, payload, timeout)?;
            }
            ControlStep::In { request, length } => {
                let reply = control_in(handle, request, length, timeout)?;
                debug!(request, ?reply, "init control in");
            }
        }
    }
    Ok(())
}

/// Arms the camera and reads one full frame from the bulk endpoint.
#[instrument(level = "debug", skip(handle))]
pub fn acquire_frame<H: DeviceHandle>(handle: &mut H, timeout: Duration) -> Result<Vec<u16>> {
    control_out(handle, ARM_REQUEST, &ARM_PAYLOAD, timeout)?;

    let mut raw = vec![0u8; RAW_FRAME_BYTES];
    let mut total = 0;

    while total < raw.len() {
        let partial = |received| ThermalError::PartialFrame {
            received,
            expected: RAW_FRAME_BYTES,
        };

        let transferred = match handle.read_bulk(BULK_ENDPOINT, &mut raw[total..], timeout) {
            Ok(0) | Err(ThermalError::Timeout) => return Err(partial(total)),
            Ok(n) => n,
            Err(e) => return Err(e),
        };
        total += transferred;
    }

    debug!(bytes = total, "bulk transfer complete");
    decode_raw_frame(&raw)
}

/// Decodes a raw wire buffer into the 206x156 pixel grid.
///
/// Samples are little-endian u16; the two trailing samples of every
/// 208-sample row are dropped.
pub fn decode_raw_frame(raw: &[u8]) -> Result<Vec<u16>> {
    if raw.len() != RAW_FRAME_BYTES {
        return Err(ThermalError::PartialFrame {
            received: raw.len(),
            expected: RAW_FRAME_BYTES,
        });
    }

    let mut pixels = Vec::with_capacity(PIXEL_COUNT);
    for row in raw.chunks_exact(RAW_ROW_STRIDE * 2) {
        pixels.extend(
            row.chunks_exact(2)
                .take(FRAME_WIDTH)
                .map(|sample| u16::from_le_bytes([sample[0], sample[1]])),
        );
    }

    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thermal::frame::{FrameKind, ThermalFrame, FRAME_KIND_PIXEL};
    use crate::thermal::usb::mock::{encode_raw_frame, MockCall, MockTransport};
    use crate::thermal::usb::DeviceTransport;

    const TIMEOUT: Duration = Duration::from_millis(1000);

    #[test]
    fn test_raw_frame_size() {
        assert_eq!(RAW_FRAME_BYTES, 64_896);
    }

    #[test]
    fn test_decode_frame_kind() {
        let mut raw = vec![0u8; RAW_FRAME_BYTES];
        raw[FRAME_KIND_PIXEL * 2] = 3;

        let pixels = decode_raw_frame(&raw).unwrap();

        assert_eq!(pixels.len(), PIXEL_COUNT);
        assert_eq!(pixels[FRAME_KIND_PIXEL], 3);
        assert!(
            pixels
                .iter()
                .enumerate()
                .all(|(i, &p)| i == FRAME_KIND_PIXEL || p == 0)
        );

        let frame = ThermalFrame::from_pixels(pixels).unwrap();
        assert_eq!(frame.kind(), FrameKind::Regular);
    }

    #[test]
    fn test_decode_drops_padding_and_reads_little_endian() {
        let mut raw = vec![0u8; RAW_FRAME_BYTES];
        // row 1, column 0
        let offset = RAW_ROW_STRIDE * 2;
        raw[offset] = 0x34;
        raw[offset + 1] = 0x12;
        // padding samples of row 0
        for b in &mut raw[FRAME_WIDTH * 2..RAW_ROW_STRIDE * 2] {
            *b = 0xFF;
        }

        let pixels = decode_raw_frame(&raw).unwrap();

        assert_eq!(pixels[FRAME_WIDTH], 0x1234);
        assert!(pixels[..FRAME_WIDTH].iter().all(|&p| p == 0));
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let result = decode_raw_frame(&[0u8; 100]);
        assert!(matches!(
            result,
            Err(ThermalError::PartialFrame { received: 100, expected: RAW_FRAME_BYTES })
        ));
    }

    #[test]
    fn test_initialize_sends_sequence_in_order() {
        let transport = MockTransport::new();
        let mut handle = transport.open(VENDOR_ID, PRODUCT_ID).unwrap().unwrap();

        initialize(&mut handle, TIMEOUT).unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), INIT_SEQUENCE.len());
        assert_eq!(calls[0], MockCall::ControlOut(0x56, vec![0x01]));
        assert_eq!(calls[3], MockCall::ControlIn(0x36, 12));
        assert_eq!(calls[19], MockCall::ControlIn(0x3D, 2));
    }

    #[test]
    fn test_initialize_stops_at_short_reply() {
        let transport = MockTransport::new();
        transport.configure(|s| s.short_reply = Some(0x36));
        let mut handle = transport.open(VENDOR_ID, PRODUCT_ID).unwrap().unwrap();

        let result = initialize(&mut handle, TIMEOUT);

        assert!(matches!(
            result,
            Err(ThermalError::ShortTransfer { request: 0x36, expected: 12, actual: 11 })
        ));
        assert_eq!(transport.calls().len(), 4);
    }

    #[test]
    fn test_acquire_frame_accumulates_chunks() {
        let transport = MockTransport::new();
        transport.configure(|s| s.bulk_chunk = 1000);
        let mut pixels = vec![7u16; PIXEL_COUNT];
        pixels[FRAME_KIND_PIXEL] = 4;
        transport.push_frame(encode_raw_frame(&pixels));
        let mut handle = transport.open(VENDOR_ID, PRODUCT_ID).unwrap().unwrap();

        let decoded = acquire_frame(&mut handle, TIMEOUT).unwrap();

        assert_eq!(decoded, pixels);
        let calls = transport.calls();
        assert_eq!(calls[0], MockCall::ControlOut(ARM_REQUEST, ARM_PAYLOAD.to_vec()));
        let bulk_reads = calls.iter().filter(|c| **c == MockCall::Bulk(BULK_ENDPOINT)).count();
        assert_eq!(bulk_reads, RAW_FRAME_BYTES.div_ceil(1000));
    }

    #[test]
    fn test_acquire_frame_timeout_is_partial_frame() {
        let transport = MockTransport::new();
        transport.configure(|s| s.fail_bulk_after = Some(5000));
        let mut handle = transport.open(VENDOR_ID, PRODUCT_ID).unwrap().unwrap();

        let result = acquire_frame(&mut handle, TIMEOUT);

        assert!(matches!(
            result,
            Err(ThermalError::PartialFrame { received: 5000, expected: RAW_FRAME_BYTES })
        ));
    }
}
