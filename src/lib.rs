pub mod adb;
pub mod args;
pub mod config;
pub mod events;
pub mod framebuffer;
pub mod input;
pub mod png;

pub use adb::{AdbError, AdbResult, DeviceLink};
pub use config::BridgeConfig;
pub use events::{BridgeEvent, create_event_channel};
