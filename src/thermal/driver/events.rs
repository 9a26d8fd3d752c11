//! Connection, streaming and frame events
//!
//! Listeners are called synchronously on the thread that raised the event,
//! which for frame and streaming events is the acquisition worker.

use std::sync::{mpsc, Arc};

use parking_lot::RwLock;

use crate::thermal::calibration::DisplayFrame;

#[derive(Debug, Clone)]
pub enum ThermalEvent {
    /// `connect()` was called; raised before any USB I/O
    Connecting,
    /// The handshake completed
    Connected,
    /// The device was closed, or a connection attempt failed
    Disconnected,
    /// The continuous worker started
    StreamingStarted,
    /// The continuous worker is about to exit
    StreamingStopped,
    /// A decoded, uncalibrated pixel grid straight off the wire
    NewFrame(Vec<u16>),
    /// A calibrated frame ready for display
    FrameReady(DisplayFrame),
}

/// Payload-free discriminant of [`ThermalEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Connecting,
    Connected,
    Disconnected,
    StreamingStarted,
    StreamingStopped,
    NewFrame,
    FrameReady,
}

impl ThermalEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ThermalEvent::Connecting => EventKind::Connecting,
            ThermalEvent::Connected => EventKind::Connected,
            ThermalEvent::Disconnected => EventKind::Disconnected,
            ThermalEvent::StreamingStarted => EventKind::StreamingStarted,
            ThermalEvent::StreamingStopped => EventKind::StreamingStopped,
            ThermalEvent::NewFrame(_) => EventKind::NewFrame,
            ThermalEvent::FrameReady(_) => EventKind::FrameReady,
        }
    }
}

pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &ThermalEvent);
}

impl<F> EventListener for F
where
    F: Fn(&ThermalEvent) + Send + Sync,
{
    fn on_event(&self, event: &ThermalEvent) {
        self(event)
    }
}

/// Fans every event out to all registered listeners.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl EventListener + 'static) {
        self.listeners.write().push(Arc::new(listener));
    }

    /// Registers a listener that forwards a copy of every event into a channel.
    pub fn subscribe_channel(&self) -> mpsc::Receiver<ThermalEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribe(move |event: &ThermalEvent| {
            // A dropped receiver just means nobody is listening anymore
            let _ = tx.send(event.clone());
        });
        rx
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn emit(&self, event: ThermalEvent) {
        // Snapshot so listeners may subscribe from inside a callback
        let listeners = self.listeners.read().clone();
        for listener in &listeners {
            listener.on_event(&event);
        }
    }
}
