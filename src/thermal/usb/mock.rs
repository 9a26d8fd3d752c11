//! Scripted transport for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::thermal::common::error::{Result, ThermalError};
use crate::thermal::frame::{FRAME_HEIGHT, FRAME_KIND_PIXEL, FRAME_WIDTH};
use crate::thermal::protocol::{RAW_FRAME_BYTES, RAW_ROW_STRIDE};
use crate::thermal::usb::transport::{DeviceHandle, DeviceTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MockCall {
    Claim(u8),
    Release(u8),
    ControlOut(u8, Vec<u8>),
    ControlIn(u8, usize),
    Bulk(u8),
    Closed,
}

pub(crate) struct MockState {
    pub present: bool,
    /// Request answered with one byte less than asked for
    pub short_reply: Option<u8>,
    /// Request answered with a transport error
    pub control_error: Option<u8>,
    pub frames: VecDeque<Vec<u8>>,
    pub default_frame: Vec<u8>,
    pub bulk_chunk: usize,
    pub bulk_delay: Duration,
    /// Bulk reads time out once this many bytes have been served
    pub fail_bulk_after: Option<usize>,
    pub bulk_served: usize,
    pub opened: usize,
    pub calls: Vec<MockCall>,
}

#[derive(Clone)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                present: true,
                short_reply: None,
                control_error: None,
                frames: VecDeque::new(),
                default_frame: raw_frame(3, 1000),
                bulk_chunk: 16384,
                bulk_delay: Duration::ZERO,
                fail_bulk_after: None,
                bulk_served: 0,
                opened: 0,
                calls: Vec::new(),
            })),
        }
    }

    pub fn absent() -> Self {
        let transport = Self::new();
        transport.configure(|s| s.present = false);
        transport
    }

    pub fn configure(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn push_frame(&self, raw: Vec<u8>) {
        self.state.lock().unwrap().frames.push_back(raw);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }
}

impl DeviceTransport for MockTransport {
    type Handle = MockHandle;

    fn open(&self, _vendor_id: u16, _product_id: u16) -> Result<Option<MockHandle>> {
        let mut state = self.state.lock().unwrap();
        if !state.present {
            return Ok(None);
        }
        state.opened += 1;

        Ok(Some(MockHandle {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
            offset: 0,
        }))
    }
}

pub(crate) struct MockHandle {
    state: Arc<Mutex<MockState>>,
    pending: Vec<u8>,
    offset: usize,
}

impl MockHandle {
    fn control_reply(&self, request: u8, len: usize) -> Result<usize> {
        let state = self.state.lock().unwrap();
        if state.control_error == Some(request) {
            return Err(ThermalError::Usb(rusb::Error::Pipe));
        }
        if state.short_reply == Some(request) {
            return Ok(len.saturating_sub(1));
        }
        Ok(len)
    }
}

impl DeviceHandle for MockHandle {
    fn claim_interface(&mut self, interface: u8) -> Result<()> {
        self.state.lock().unwrap().calls.push(MockCall::Claim(interface));
        Ok(())
    }

    fn release_interface(&mut self, interface: u8) -> Result<()> {
        self.state.lock().unwrap().calls.push(MockCall::Release(interface));
        Ok(())
    }

    fn write_control(&mut self, request: u8, data: &[u8], _timeout: Duration) -> Result<usize> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(MockCall::ControlOut(request, data.to_vec()));
        self.control_reply(request, data.len())
    }

    fn read_control(&mut self, request: u8, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(MockCall::ControlIn(request, buf.len()));
        buf.fill(0xAA);
        self.control_reply(request, buf.len())
    }

    fn read_bulk(&mut self, endpoint: u8, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        let (n, delay) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(MockCall::Bulk(endpoint));

            if let Some(limit) = state.fail_bulk_after {
                if state.bulk_served >= limit {
                    return Err(ThermalError::Timeout);
                }
            }

            if self.offset >= self.pending.len() {
                self.pending = match state.frames.pop_front() {
                    Some(frame) => frame,
                    None => state.default_frame.clone(),
                };
                self.offset = 0;
            }

            let mut n = buf.len().min(state.bulk_chunk).min(self.pending.len() - self.offset);
            if let Some(limit) = state.fail_bulk_after {
                n = n.min(limit - state.bulk_served);
            }
            buf[..n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
            self.offset += n;
            state.bulk_served += n;

            (n, state.bulk_delay)
        };

        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        Ok(n)
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.calls.push(MockCall::Closed);
        }
    }
}

/// Encodes a full wire buffer from a decoded pixel grid. Padding columns
/// are filled with 0xFFFF.
pub(crate) fn encode_raw_frame(pixels: &[u16]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(RAW_FRAME_BYTES);
    for y in 0..FRAME_HEIGHT {
        for x in 0..RAW_ROW_STRIDE {
            let val = if x < FRAME_WIDTH {
                pixels[y * FRAME_WIDTH + x]
            } else {
                0xFFFF
            };
            raw.extend_from_slice(&val.to_le_bytes());
        }
    }
    raw
}

/// Wire buffer for a frame of the given kind with every other pixel at `value`.
pub(crate) fn raw_frame(kind: u8, value: u16) -> Vec<u8> {
    let mut pixels = vec![value; FRAME_WIDTH * FRAME_HEIGHT];
    pixels[FRAME_KIND_PIXEL] = u16::from(kind);
    encode_raw_frame(&pixels)
}
