// Parsers for the kernel input listing and Android key-layout files.
use super::types::{KEYLAYOUT_DIR, KEYLAYOUT_EXT};

/// One device from `/proc/bus/input/devices`: its advertised name and the
/// index of its `eventN` handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDeviceEntry {
    pub name: String,
    pub event_index: u32,
}

/// Pick the `N: Name="..."` / `H: Handlers=... eventN` pairs out of the
/// kernel listing. Devices without an event handler are ignored.
pub fn parse_input_devices(listing: &str) -> Vec<InputDeviceEntry> {
    let mut entries = Vec::new();
    let mut name: Option<String> = None;
    for line in listing.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            name = None;
            continue;
        }
        if let Some(rest) = line.strip_prefix("N: Name=") {
            name = Some(rest.trim_matches('"').to_string());
        } else if let Some(rest) = line.strip_prefix("H: Handlers=") {
            let index = rest
                .split_whitespace()
                .filter_map(|h| h.strip_prefix("event"))
                .find_map(|n| n.parse::<u32>().ok());
            if let (Some(device_name), Some(event_index)) = (name.as_ref(), index) {
                entries.push(InputDeviceEntry {
                    name: device_name.clone(),
                    event_index,
                });
            }
        }
    }
    entries
}

/// Path of the key-layout file matching an input device name.
pub fn layout_file_for(device_name: &str) -> String {
    format!("{KEYLAYOUT_DIR}{device_name}{KEYLAYOUT_EXT}")
}

/// Find the keycode a layout maps to a key name. Layout lines read
/// `key <code> <NAME> [flags...]`; comment and malformed lines are
/// skipped.
pub fn keycode_for(layout: &str, key_name: &str) -> Option<u32> {
    for line in layout.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut words = line.split_whitespace();
        if words.next() != Some("key") {
            continue;
        }
        let Some(code) = words.next().and_then(|w| w.parse::<u32>().ok()) else {
            continue;
        };
        if words.next() == Some(key_name) {
            return Some(code);
        }
    }
    None
}

/// The POWER mapping, the one wake injection needs.
pub fn power_keycode_for(layout: &str) -> Option<u32> {
    keycode_for(layout, "POWER")
}
