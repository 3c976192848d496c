// Still encoding: normalized frames to PNG via the image crate.
use std::io::Cursor;
use std::path::Path;

use image::{ImageBuffer, Rgb, codecs::png::PngEncoder};
use log::debug;

use crate::adb::error::{AdbError, AdbResult};
use crate::framebuffer::convert::{expand_rgbx565, pack_rgb888};
use crate::framebuffer::types::Frame;

/// Encode a frame as PNG. Frames leave the capture pipeline with 3-byte
/// pixels (filler formats already packed) or raw RGBX_565; both are
/// handled, as are unpacked 4-byte payloads fed in directly.
pub fn frame_to_png(frame: &Frame) -> AdbResult<Vec<u8>> {
    let pixel_count = (frame.width as usize) * (frame.height as usize);
    let len = frame.bytes.len();
    if pixel_count == 0 || len % pixel_count != 0 {
        return Err(frame_geometry_error(frame));
    }

    let rgb = match len / pixel_count {
        3 => frame.bytes.clone(),
        2 => expand_rgbx565(&frame.bytes),
        4 => pack_rgb888(&frame.bytes),
        _ => return Err(frame_geometry_error(frame)),
    };

    let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_raw(frame.width, frame.height, rgb)
            .ok_or_else(|| frame_geometry_error(frame))?;

    let mut data = Vec::new();
    let mut cursor = Cursor::new(&mut data);
    let encoder = PngEncoder::new(&mut cursor);
    img.write_with_encoder(encoder)?;
    Ok(data)
}

/// Encode a frame and write it to disk, e.g. for the screenshot mode.
pub async fn save_frame_png(frame: &Frame, path: impl AsRef<Path>) -> AdbResult<()> {
    let png = frame_to_png(frame)?;
    tokio::fs::write(path.as_ref(), &png).await?;
    debug!("wrote {} ({} bytes)", path.as_ref().display(), png.len());
    Ok(())
}

fn frame_geometry_error(frame: &Frame) -> AdbError {
    AdbError::FrameGeometry {
        len: frame.bytes.len(),
        width: frame.width,
        height: frame.height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, bytes: Vec<u8>) -> Frame {
        Frame {
            bytes,
            width,
            height,
            duration_ms: 0,
            index: 1,
        }
    }

    #[test]
    fn test_rgb_frame_round_trips() {
        let bytes = vec![
            255, 0, 0, /* */ 0, 255, 0, //
            0, 0, 255, /* */ 9, 8, 7,
        ];
        let png = frame_to_png(&frame(2, 2, bytes)).expect("encode");

        let decoded = image::load_from_memory(&png).expect("decode").to_rgb8();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(decoded.get_pixel(1, 0).0, [0, 255, 0]);
        assert_eq!(decoded.get_pixel(1, 1).0, [9, 8, 7]);
    }

    #[test]
    fn test_rgbx565_frame_expands_before_encoding() {
        // red, green as little-endian 565 words
        let bytes = vec![0x00, 0xF8, 0xE0, 0x07];
        let png = frame_to_png(&frame(2, 1, bytes)).expect("encode");

        let decoded = image::load_from_memory(&png).expect("decode").to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(decoded.get_pixel(1, 0).0, [0, 255, 0]);
    }

    #[test]
    fn test_four_byte_payload_drops_filler() {
        let bytes = vec![1, 2, 3, 99, 4, 5, 6, 99];
        let png = frame_to_png(&frame(2, 1, bytes)).expect("encode");

        let decoded = image::load_from_memory(&png).expect("decode").to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0).0, [1, 2, 3]);
        assert_eq!(decoded.get_pixel(1, 0).0, [4, 5, 6]);
    }

    #[test]
    fn test_geometry_mismatch_rejected() {
        let err = frame_to_png(&frame(2, 2, vec![0; 5])).expect_err("5 bytes for 4 pixels");
        assert!(matches!(err, AdbError::FrameGeometry { len: 5, .. }));

        let err = frame_to_png(&frame(2, 2, vec![0; 4])).expect_err("1 byte per pixel");
        assert!(matches!(err, AdbError::FrameGeometry { .. }));

        let err = frame_to_png(&frame(0, 0, Vec::new())).expect_err("empty frame");
        assert!(matches!(err, AdbError::FrameGeometry { .. }));
    }
}
