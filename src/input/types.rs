// Input discovery data model and on-device paths.
use std::fmt;

use serde::Serialize;

/// Key-layout files live here, one per named input device.
pub const KEYLAYOUT_DIR: &str = "/system/usr/keylayout/";
pub const KEYLAYOUT_EXT: &str = ".kl";
/// Kernel listing of input devices and their event handlers.
pub const PROC_INPUT_DEVICES: &str = "/proc/bus/input/devices";
/// Event device nodes are `INPUT_DEV_PREFIX<N>`.
pub const INPUT_DEV_PREFIX: &str = "/dev/input/event";
/// LCD backlight brightness; zero means the screen is dark.
pub const SYS_LCD_BACKLIGHT: &str = "/sys/class/leds/lcd-backlight/brightness";
/// Linux KEY_POWER scancode, the mapping most layouts use.
pub const POWER_KEY_COMMON: u32 = 116;

/// One wake path discovered on the device: which event node to write and
/// which keycode its layout maps to POWER. `wake_succeeded` is sticky so
/// a known-good candidate is tried first on later wakes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PowerKeyCandidate {
    /// Layout file name, e.g. `qwerty.kl`.
    pub key_layout: String,
    /// N in `/dev/input/eventN`.
    pub event_device_index: u32,
    pub power_keycode: u32,
    pub wake_succeeded: bool,
}

impl PowerKeyCandidate {
    pub fn new(key_layout: impl Into<String>, event_device_index: u32, power_keycode: u32) -> Self {
        Self {
            key_layout: key_layout.into(),
            event_device_index,
            power_keycode,
            wake_succeeded: false,
        }
    }

    pub fn event_device_path(&self) -> String {
        format!("{INPUT_DEV_PREFIX}{}", self.event_device_index)
    }
}

/// Coarse OS classification; it decides which touch protocol to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OsType {
    Ics,
    Jb,
    Unknown,
}

impl fmt::Display for OsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OsType::Ics => "ICS",
            OsType::Jb => "JB",
            OsType::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// Wake flow phases, in order of progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakePhase {
    Probing,
    CandidatesReady,
    Waking,
    Success,
    Exhausted,
}

#[derive(Debug, Clone)]
pub enum InputCommand {
    /// Re-run power key discovery.
    ProbePowerKeys,
    /// Try to wake the screen via the discovered candidates.
    WakeUp,
    /// Inject a key press/release pair for a raw keycode.
    VirtualKey(u32),
    /// Inject a touch; a press without release starts a gesture that the
    /// matching release finishes.
    VirtualClick {
        x: u32,
        y: u32,
        press: bool,
        release: bool,
    },
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_device_path() {
        let candidate = PowerKeyCandidate::new("qwerty.kl", 2, POWER_KEY_COMMON);
        assert_eq!(candidate.event_device_path(), "/dev/input/event2");
        assert!(
            !candidate.wake_succeeded,
            "a fresh candidate has not proven itself yet"
        );
    }
}
