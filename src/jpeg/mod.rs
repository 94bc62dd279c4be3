//! JPEG codec: baseline and progressive decoding, baseline encoding.

pub mod bitread;
pub mod bitwrite;
pub mod dct;
pub mod decoder;
pub mod encoder;
pub mod entropy;
pub mod huffman;
pub mod marker;
pub mod quant;

use std::io::Read;

use crate::error::Result;
use crate::image::Image;

pub use encoder::Encoder;

/// Decode a JPEG stream from a reader.
pub fn decode<R: Read>(mut reader: R) -> Result<Image> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    decoder::decode(&data)
}

/// Decode a JPEG stream already held in memory.
pub fn decode_slice(data: &[u8]) -> Result<Image> {
    decoder::decode(data)
}
