//! GIF codec: GIF89a decode/encode with LZW compression, octree
//! palette quantization and animation support.

pub mod decoder;
pub mod encoder;
pub mod lzw;
pub mod quantizer;

use std::io::Read;

use crate::error::Result;
use crate::image::Image;

pub use encoder::Encoder;

/// One composited animation frame.
pub struct Frame {
    /// Full-canvas RGBA state after this frame is drawn.
    pub image: Image,
    /// Display time in centiseconds (0 means unspecified).
    pub delay_cs: u16,
}

/// A decoded GIF: one frame for static images, several for animations.
pub struct Animation {
    pub width: u16,
    pub height: u16,
    pub frames: Vec<Frame>,
    /// NETSCAPE2.0 loop count; `Some(0)` loops forever.
    pub repeat: Option<u16>,
}

/// Decode a GIF stream from a reader.
pub fn decode<R: Read>(mut reader: R) -> Result<Animation> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    decoder::decode(&data)
}

/// Decode a GIF stream already held in memory.
pub fn decode_slice(data: &[u8]) -> Result<Animation> {
    decoder::decode(data)
}
