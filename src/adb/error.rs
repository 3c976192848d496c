use std::time::Duration;
use thiserror::Error;

/// A specialized `Result` type for bridge operations.
pub type AdbResult<T> = Result<T, AdbError>;

/// The error type for all operations that touch the adb client or the
/// payloads it returns.
#[derive(Debug, Error)]
pub enum AdbError {
    #[error("Failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "'{program}' not found on PATH. Install the Android platform tools and make sure 'adb' is reachable."
    )]
    ClientNotFound { program: String },

    #[error("Operation timed out after {duration:?}: {description}")]
    Timeout {
        duration: Duration,
        description: String,
    },

    #[error("A command is already running on this executor: {command}")]
    ExecutorBusy { command: String },

    #[error("Command '{command}' exited with status {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("Framebuffer header too short: got {got} bytes, need {need}")]
    ShortHeader { got: usize, need: usize },

    #[error("Unknown framebuffer pixel format code {code}")]
    UnknownPixelFormat { code: u32 },

    #[error("Framebuffer payload length {got} does not match expected {expected}")]
    FrameLengthMismatch { got: usize, expected: usize },

    #[error("Frame of {len} bytes does not fit {width}x{height} at any known pixel depth")]
    FrameGeometry { len: usize, width: u32, height: u32 },

    #[error("Unexpected output from '{command}': {output}")]
    UnexpectedOutput { command: String, output: String },

    #[error("Host decompressor '{program}' failed: {description}")]
    DecompressFailed {
        program: String,
        description: String,
    },

    #[error("No power key candidates survived probing")]
    NoPowerKeyCandidates,

    #[error("Frame encoding failed: {source}")]
    Encode {
        #[from]
        source: image::ImageError,
    },

    #[error("Task failed to complete: {source}")]
    JoinError {
        #[from]
        source: tokio::task::JoinError,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl AdbError {
    /// True for failures a capture/injection loop should absorb and retry
    /// after backing off, rather than treat as fatal.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AdbError::Timeout { .. }
                | AdbError::CommandFailed { .. }
                | AdbError::ShortHeader { .. }
                | AdbError::UnknownPixelFormat { .. }
                | AdbError::FrameLengthMismatch { .. }
                | AdbError::FrameGeometry { .. }
                | AdbError::UnexpectedOutput { .. }
                | AdbError::DecompressFailed { .. }
        )
    }

    /// Payload/parse problems: skip the sample and retry, no error event.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            AdbError::ShortHeader { .. }
                | AdbError::UnknownPixelFormat { .. }
                | AdbError::FrameLengthMismatch { .. }
                | AdbError::FrameGeometry { .. }
                | AdbError::UnexpectedOutput { .. }
        )
    }

    /// True when the program behind a command could not be started at all.
    pub fn is_program_missing(&self) -> bool {
        match self {
            AdbError::ClientNotFound { .. } => true,
            AdbError::SpawnFailed { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AdbError::Timeout { .. })
    }
}
