// Payload normalization: header decoding and pixel repacking.
use crate::adb::error::{AdbError, AdbResult};

use super::types::{FB_HEADER_BYTES, FbDescriptor, PixelFormat};

/// Decode the capture header: width, height, format code, each a
/// little-endian u32.
pub fn parse_fb_header(bytes: &[u8]) -> AdbResult<FbDescriptor> {
    if bytes.len() < FB_HEADER_BYTES {
        return Err(AdbError::ShortHeader {
            got: bytes.len(),
            need: FB_HEADER_BYTES,
        });
    }
    let width = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let height = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let code = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    let format =
        PixelFormat::from_code(code).ok_or(AdbError::UnknownPixelFormat { code })?;
    Ok(FbDescriptor {
        width,
        height,
        format,
    })
}

/// Pack 4-byte RGBX/RGBA pixels into 3-byte RGB, dropping the filler.
/// Output is exactly three quarters of the input.
pub fn pack_rgb888(pixels: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() / 4 * 3);
    for px in pixels.chunks_exact(4) {
        out.extend_from_slice(&px[..3]);
    }
    out
}

/// Expand 16-bit RGBX_565 (little-endian) to RGB888, replicating the
/// high bits into the low bits so full white stays full white.
pub fn expand_rgbx565(pixels: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() / 2 * 3);
    for px in pixels.chunks_exact(2) {
        let v = u16::from_le_bytes([px[0], px[1]]);
        let r = ((v >> 11) & 0x1f) as u8;
        let g = ((v >> 5) & 0x3f) as u8;
        let b = (v & 0x1f) as u8;
        out.push((r << 3) | (r >> 2));
        out.push((g << 2) | (g >> 4));
        out.push((b << 3) | (b >> 2));
    }
    out
}
