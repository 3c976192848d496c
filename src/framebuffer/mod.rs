// Framebuffer acquisition: capability probing, paced capture, payload
// normalization, frame publication.

pub mod channels;
pub mod convert;
pub mod engine;
pub mod types;

pub use channels::create_capture_channels;
pub use convert::{expand_rgbx565, pack_rgb888, parse_fb_header};
pub use engine::{FbEngine, GZ_FILE};
pub use types::{
    CaptureCommand, CaptureState, FB_HEADER_BYTES, FbDescriptor, Frame, PixelFormat,
};
