// Input discovery and injection: power key probing, wake flow, screen
// power tracking, raw event synthesis.

pub mod channels;
pub mod engine;
pub mod keylayout;
pub mod sendevent;
pub mod types;

pub use channels::create_input_channels;
pub use engine::{InputEngine, classify_sdk};
pub use keylayout::{layout_file_for, parse_input_devices, power_keycode_for};
pub use sendevent::{join_batch, key_event_batch, multi_touch_batch, single_touch_batch};
pub use types::{InputCommand, OsType, POWER_KEY_COMMON, PowerKeyCandidate, WakePhase};
