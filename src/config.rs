//! Runtime knobs for the capture and input engines
use serde::Serialize;

use crate::adb::connection::{DELAY_FAST, DELAY_NORMAL, DELAY_SLOW};

/// zlib's example tool; `-d` gunzips in place.
pub const DEFAULT_DECOMPRESSOR: &str = "minigzip";

#[derive(Debug, Clone, Serialize)]
pub struct BridgeConfig {
    /// Pacing delay between capture cycles once streaming, milliseconds
    pub capture_delay_ms: u64,
    /// Value passed to `screencap -q` when the device build supports it
    pub screencap_quality: u32,
    /// Value passed to `screencap -s` when the device build supports it
    pub screencap_speed: u32,
    /// Attempt compressed captures when a host decompressor is present
    pub enable_compress: bool,
    /// Host program that inflates compressed captures
    pub decompressor: String,
    /// Consecutive capture failures before the link is declared lost
    pub max_capture_failures: u32,
    /// Settle time between a wake sequence and the screen-state check, ms
    pub wake_settle_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            capture_delay_ms: DELAY_NORMAL,
            screencap_quality: 50,
            screencap_speed: 1,
            enable_compress: true,
            decompressor: DEFAULT_DECOMPRESSOR.to_string(),
            max_capture_failures: 3,
            wake_settle_ms: 500,
        }
    }
}

/// Preset tuned for live preview: fast pace, cheap frames.
pub fn create_preview_config() -> BridgeConfig {
    BridgeConfig {
        capture_delay_ms: DELAY_FAST,
        screencap_quality: 30,
        screencap_speed: 2,
        ..BridgeConfig::default()
    }
}

/// Preset tuned for occasional stills: slow pace, full quality,
/// no compression detour.
pub fn create_still_config() -> BridgeConfig {
    BridgeConfig {
        capture_delay_ms: DELAY_SLOW,
        screencap_quality: 90,
        enable_compress: false,
        ..BridgeConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_streamable() {
        let config = BridgeConfig::default();
        assert_eq!(config.capture_delay_ms, DELAY_NORMAL);
        assert!(config.enable_compress);
        assert_eq!(config.decompressor, DEFAULT_DECOMPRESSOR);
        assert!(config.max_capture_failures > 0);
    }

    #[test]
    fn test_presets_diverge_where_it_matters() {
        let preview = create_preview_config();
        assert_eq!(preview.capture_delay_ms, DELAY_FAST);
        assert!(preview.screencap_quality < BridgeConfig::default().screencap_quality);

        let still = create_still_config();
        assert_eq!(still.capture_delay_ms, DELAY_SLOW);
        assert!(!still.enable_compress);
    }
}
