// Command plumbing for the input engine.
use tokio::sync::mpsc;

use super::types::InputCommand;

/// Helper to create the input command channel.
pub fn create_input_channels() -> (mpsc::Sender<InputCommand>, mpsc::Receiver<InputCommand>) {
    mpsc::channel(32)
}
