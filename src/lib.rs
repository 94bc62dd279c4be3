//! # rasterfmt
//!
//! Pure Rust JPEG and GIF codecs sharing one in-memory [`Image`] type.
//!
//! - **JPEG decode** - baseline (SOF0/SOF1) and progressive (SOF2)
//!   streams per ITU T.81, with restart markers and chroma subsampling
//! - **JPEG encode** - baseline 4:4:4 with the standard Annex K
//!   quantization and Huffman tables
//! - **GIF decode** - GIF87a/GIF89a, animation compositing with
//!   transparency, disposal and interlacing
//! - **GIF encode** - GIF89a with per-frame octree quantization and
//!   NETSCAPE2.0 looping
//!
//! ## Quick Start
//!
//! ```no_run
//! use rasterfmt::{jpeg, Result};
//!
//! # fn main() -> Result<()> {
//! let data = std::fs::read("photo.jpg")?;
//! let image = jpeg::decode_slice(&data)?;
//!
//! let mut out = Vec::new();
//! jpeg::Encoder::new().quality(85).encode(&image, &mut out)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Animated GIF
//!
//! ```no_run
//! use rasterfmt::{gif, Result};
//!
//! # fn main() -> Result<()> {
//! let data = std::fs::read("anim.gif")?;
//! let anim = gif::decode_slice(&data)?;
//!
//! let mut out = Vec::new();
//! gif::Encoder::new()
//!     .palette_size(128)
//!     .repeat(anim.repeat)
//!     .encode_animation(&anim.frames, &mut out)?;
//! # Ok(())
//! # }
//! ```

/// RGB <-> YCbCr and grayscale conversions.
pub mod color;

/// Shared constants: block geometry, zigzag order, standard tables.
pub mod consts;

/// GIF decoding, encoding, LZW and octree quantization.
pub mod gif;

/// JPEG decoding, encoding and the supporting codec pieces.
pub mod jpeg;

mod error;
mod image;

/// Error type for every fallible operation in the crate.
pub use error::Error;

/// Convenience alias, `Result<T, Error>`.
pub use error::Result;

/// Packed RGBA image shared by both codecs.
pub use image::Image;

/// Number of coefficients in an 8x8 DCT block (64).
pub use consts::DCTSIZE2;
