// Outbound notifications for observers. Engines get a cloned sender each;
// nothing in here depends on who is listening.
use tokio::sync::mpsc;

use crate::framebuffer::types::{Frame, PixelFormat};

pub const EVENT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub enum BridgeEvent {
    DeviceFound,
    DeviceWaitTimeout,
    DeviceDisconnected,
    ScreenTurnedOn,
    ScreenTurnedOff,
    FramebufferFound {
        width: u32,
        height: u32,
        format: PixelFormat,
    },
    NewFrame(Frame),
    Error(String),
    /// Operator-facing status line (wake hints, capability downgrades).
    Prompt(String),
}

/// Helper to create the bridge event channel.
pub fn create_event_channel() -> (mpsc::Sender<BridgeEvent>, mpsc::Receiver<BridgeEvent>) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}
