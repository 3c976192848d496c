// Command plumbing for the capture pipeline.
use tokio::sync::mpsc;

use super::types::CaptureCommand;

/// Helper to create the capture command channel.
pub fn create_capture_channels() -> (
    mpsc::Sender<CaptureCommand>,
    mpsc::Receiver<CaptureCommand>,
) {
    mpsc::channel(32)
}
