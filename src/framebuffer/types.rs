// Framebuffer data model: header geometry, pixel formats, frames.
use std::fmt;

use serde::Serialize;

/// The capture payload starts with three little-endian u32 words:
/// width, height, pixel format code.
pub const FB_HEADER_BYTES: usize = 12;

/// Geometry assumed before the first successful probe.
pub const DEFAULT_FB_WIDTH: u32 = 320;
pub const DEFAULT_FB_HEIGHT: u32 = 530;

/// Android framebuffer pixel formats, by wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PixelFormat {
    Rgba8888,
    Rgbx8888,
    Rgb888,
    Rgbx565,
}

impl PixelFormat {
    pub fn from_code(code: u32) -> Option<PixelFormat> {
        match code {
            1 => Some(PixelFormat::Rgba8888),
            2 => Some(PixelFormat::Rgbx8888),
            3 => Some(PixelFormat::Rgb888),
            4 => Some(PixelFormat::Rgbx565),
            _ => None,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            PixelFormat::Rgba8888 => 1,
            PixelFormat::Rgbx8888 => 2,
            PixelFormat::Rgb888 => 3,
            PixelFormat::Rgbx565 => 4,
        }
    }

    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgba8888 | PixelFormat::Rgbx8888 => 4,
            PixelFormat::Rgb888 => 3,
            PixelFormat::Rgbx565 => 2,
        }
    }

    /// True for formats whose fourth byte is alpha/padding that the
    /// consumer-facing RGB888 stream drops.
    pub fn has_filler_byte(self) -> bool {
        self.bytes_per_pixel() == 4
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Rgba8888 => "RGBA_8888",
            PixelFormat::Rgbx8888 => "RGBX_8888",
            PixelFormat::Rgb888 => "RGB_888",
            PixelFormat::Rgbx565 => "RGBX_565",
        };
        write!(f, "{name}")
    }
}

/// Probed capture geometry for the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FbDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl FbDescriptor {
    pub fn bytes_per_pixel(&self) -> u32 {
        self.format.bytes_per_pixel()
    }

    /// Raw pixel payload length for one frame, header excluded.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * self.bytes_per_pixel() as usize
    }
}

impl Default for FbDescriptor {
    fn default() -> Self {
        Self {
            width: DEFAULT_FB_WIDTH,
            height: DEFAULT_FB_HEIGHT,
            format: PixelFormat::Rgba8888,
        }
    }
}

/// One published frame: packed RGB888 (or the device's native packing for
/// formats without a filler byte), plus capture timing metadata.
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub duration_ms: u128,
    pub index: u64, // sequential frame count (per pipeline instance)
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    WaitingForDevice,
    ProbingCapabilities,
    Streaming,
    Paused,
    Disconnected,
}

#[derive(Debug, Clone)]
pub enum CaptureCommand {
    SetPaused(bool),
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_codes_round_trip() {
        for code in 1..=4 {
            let format = PixelFormat::from_code(code).expect("codes 1-4 are known");
            assert_eq!(format.code(), code);
        }
        assert_eq!(PixelFormat::from_code(0), None, "0 is not a wire code");
        assert_eq!(PixelFormat::from_code(99), None);
    }

    #[test]
    fn test_bytes_per_pixel_table() {
        assert_eq!(PixelFormat::Rgba8888.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Rgbx8888.bytes_per_pixel(), 4);
        assert_eq!(PixelFormat::Rgb888.bytes_per_pixel(), 3);
        assert_eq!(PixelFormat::Rgbx565.bytes_per_pixel(), 2);
    }

    #[test]
    fn test_format_display_matches_android_names() {
        assert_eq!(PixelFormat::Rgba8888.to_string(), "RGBA_8888");
        assert_eq!(PixelFormat::Rgbx8888.to_string(), "RGBX_8888");
        assert_eq!(PixelFormat::Rgb888.to_string(), "RGB_888");
        assert_eq!(
            PixelFormat::Rgbx565.to_string(),
            "RGBX_565",
            "code 4 is the 16-bit format with an X channel, not plain 565"
        );
    }

    #[test]
    fn test_frame_len_uses_geometry_and_depth() {
        let desc = FbDescriptor {
            width: 296,
            height: 522,
            format: PixelFormat::Rgba8888,
        };
        assert_eq!(desc.frame_len(), 296 * 522 * 4);
    }
}
