//! GIF89a encoding.
//!
//! Each frame is quantized independently to its own local color table,
//! then LZW-compressed and framed into data sub-blocks. Animations get
//! a NETSCAPE2.0 looping extension before any frame data.

use std::io::Write;

use log::debug;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::gif::lzw;
use crate::gif::quantizer::{quantize_frame, QuantizedFrame};
use crate::gif::Frame;
use crate::image::Image;

/// GIF encoder options.
///
/// ```no_run
/// use rasterfmt::gif::Encoder;
/// # fn demo(frames: &[rasterfmt::gif::Frame]) -> rasterfmt::Result<()> {
/// let mut out = Vec::new();
/// Encoder::new()
///     .palette_size(128)
///     .repeat(Some(0))
///     .encode_animation(frames, &mut out)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Encoder {
    palette_size: u16,
    repeat: Option<u16>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Encoder {
            palette_size: 256,
            repeat: None,
        }
    }

    /// Maximum colors per frame palette (2-256). Validated at encode
    /// time.
    pub fn palette_size(mut self, size: u16) -> Self {
        self.palette_size = size;
        self
    }

    /// Loop count for animations. `Some(0)` loops forever, `None`
    /// plays once without a looping extension.
    pub fn repeat(mut self, repeat: Option<u16>) -> Self {
        self.repeat = repeat;
        self
    }

    /// Encode a single still image. Returns the number of bytes
    /// written.
    pub fn encode<W: Write>(&self, image: &Image, output: W) -> Result<usize> {
        let frame = Frame {
            image: image.clone(),
            delay_cs: 0,
        };
        self.encode_animation(std::slice::from_ref(&frame), output)
    }

    /// Encode a sequence of frames. The logical screen is sized to the
    /// first frame; later frames may be smaller but never larger.
    /// Returns the number of bytes written.
    pub fn encode_animation<W: Write>(&self, frames: &[Frame], mut output: W) -> Result<usize> {
        let first = frames.first().ok_or(Error::EmptyAnimation)?;
        let screen_w = u16::try_from(first.image.width()).map_err(|_| Error::InvalidDimensions {
            width: first.image.width(),
            height: first.image.height(),
        })?;
        let screen_h = u16::try_from(first.image.height()).map_err(|_| {
            Error::InvalidDimensions {
                width: first.image.width(),
                height: first.image.height(),
            }
        })?;
        for frame in frames.iter() {
            if frame.image.width() > screen_w as u32 || frame.image.height() > screen_h as u32 {
                return Err(Error::FrameOutOfBounds);
            }
        }

        let quantized = self.quantize_all(frames)?;
        debug!(
            "encoding {} frame(s), screen {}x{}",
            frames.len(),
            screen_w,
            screen_h
        );

        let mut written = 0usize;
        let mut put = |output: &mut W, bytes: &[u8]| -> Result<()> {
            output.write_all(bytes)?;
            written += bytes.len();
            Ok(())
        };

        put(&mut output, b"GIF89a")?;
        put(&mut output, &screen_w.to_le_bytes())?;
        put(&mut output, &screen_h.to_le_bytes())?;
        // No global color table; color resolution 8 bits.
        put(&mut output, &[0x70, 0, 0])?;

        if self.repeat.is_some() || frames.len() > 1 {
            let loops = self.repeat.unwrap_or(0);
            let mut ext = vec![0x21, 0xFF, 11];
            ext.extend_from_slice(b"NETSCAPE2.0");
            ext.extend_from_slice(&[3, 0x01]);
            ext.extend_from_slice(&loops.to_le_bytes());
            ext.push(0);
            put(&mut output, &ext)?;
        }

        for (frame, q) in frames.iter().zip(quantized.iter()) {
            self.write_frame(frame, q, &mut output, &mut written)?;
        }

        output.write_all(&[0x3B])?;
        written += 1;
        Ok(written)
    }

    #[cfg(feature = "rayon")]
    fn quantize_all(&self, frames: &[Frame]) -> Result<Vec<QuantizedFrame>> {
        frames
            .par_iter()
            .map(|f| quantize_frame(&f.image, self.palette_size))
            .collect()
    }

    #[cfg(not(feature = "rayon"))]
    fn quantize_all(&self, frames: &[Frame]) -> Result<Vec<QuantizedFrame>> {
        frames
            .iter()
            .map(|f| quantize_frame(&f.image, self.palette_size))
            .collect()
    }

    fn write_frame<W: Write>(
        &self,
        frame: &Frame,
        q: &QuantizedFrame,
        output: &mut W,
        written: &mut usize,
    ) -> Result<()> {
        let width = frame.image.width() as u16;
        let height = frame.image.height() as u16;

        // Color tables must hold a power-of-two entry count, minimum 2.
        let padded = q.palette.len().next_power_of_two().max(2);
        let size_field = (padded.trailing_zeros() - 1) as u8;
        let min_code_size = (size_field + 1).max(2);

        let mut section = Vec::new();

        let mut gce_packed = 0x04u8; // disposal: do not dispose
        let mut transparent = 0u8;
        if let Some(idx) = q.transparent_index {
            gce_packed |= 0x01;
            transparent = idx;
        }
        section.extend_from_slice(&[0x21, 0xF9, 4, gce_packed]);
        section.extend_from_slice(&frame.delay_cs.to_le_bytes());
        section.push(transparent);
        section.push(0);

        section.push(0x2C);
        section.extend_from_slice(&0u16.to_le_bytes());
        section.extend_from_slice(&0u16.to_le_bytes());
        section.extend_from_slice(&width.to_le_bytes());
        section.extend_from_slice(&height.to_le_bytes());
        section.push(0x80 | size_field);
        for i in 0..padded {
            let c = q.palette.get(i).copied().unwrap_or([0, 0, 0]);
            section.extend_from_slice(&c);
        }

        section.push(min_code_size);
        let compressed = lzw::encode(min_code_size, &q.indices)?;
        section.extend_from_slice(&lzw::frame_sub_blocks(&compressed));

        output.write_all(&section)?;
        *written += section.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gif::decoder;

    fn checker(width: u32, height: u32, a: (u8, u8, u8), b: (u8, u8, u8)) -> Image {
        let mut image = Image::new(width, height).unwrap();
        for y in 0..height {
            for x in 0..width {
                let c = if (x + y) % 2 == 0 { a } else { b };
                image.put_pixel(x, y, (c.0, c.1, c.2, 255));
            }
        }
        image
    }

    #[test]
    fn test_still_roundtrip_exact() {
        // Two colors fit the palette, so the roundtrip is lossless.
        let image = checker(8, 8, (255, 0, 0), (0, 0, 255));
        let mut data = Vec::new();
        let written = Encoder::new().encode(&image, &mut data).unwrap();
        assert_eq!(written, data.len());

        let anim = decoder::decode(&data).unwrap();
        assert_eq!(anim.frames.len(), 1);
        assert_eq!(anim.frames[0].image, image);
    }

    #[test]
    fn test_single_frame_has_no_loop_extension() {
        let image = checker(4, 4, (1, 2, 3), (4, 5, 6));
        let mut data = Vec::new();
        Encoder::new().encode(&image, &mut data).unwrap();
        assert!(!data.windows(11).any(|w| w == b"NETSCAPE2.0"));
    }

    #[test]
    fn test_animation_roundtrip() {
        let frames = vec![
            Frame {
                image: checker(6, 4, (250, 250, 250), (10, 10, 10)),
                delay_cs: 10,
            },
            Frame {
                image: checker(6, 4, (0, 200, 0), (200, 0, 200)),
                delay_cs: 25,
            },
        ];
        let mut data = Vec::new();
        Encoder::new()
            .repeat(Some(3))
            .encode_animation(&frames, &mut data)
            .unwrap();

        let anim = decoder::decode(&data).unwrap();
        assert_eq!(anim.repeat, Some(3));
        assert_eq!(anim.frames.len(), 2);
        assert_eq!(anim.frames[0].delay_cs, 10);
        assert_eq!(anim.frames[1].delay_cs, 25);
        assert_eq!(anim.frames[0].image, frames[0].image);
        assert_eq!(anim.frames[1].image, frames[1].image);
    }

    #[test]
    fn test_empty_animation_rejected() {
        let mut data = Vec::new();
        assert!(matches!(
            Encoder::new().encode_animation(&[], &mut data),
            Err(Error::EmptyAnimation)
        ));
    }

    #[test]
    fn test_bad_palette_size() {
        let image = checker(2, 2, (0, 0, 0), (255, 255, 255));
        let mut data = Vec::new();
        assert!(matches!(
            Encoder::new().palette_size(1).encode(&image, &mut data),
            Err(Error::InvalidPaletteSize(1))
        ));
    }

    #[test]
    fn test_oversized_later_frame_rejected() {
        let frames = vec![
            Frame {
                image: checker(4, 4, (0, 0, 0), (255, 255, 255)),
                delay_cs: 0,
            },
            Frame {
                image: checker(8, 4, (0, 0, 0), (255, 255, 255)),
                delay_cs: 0,
            },
        ];
        let mut data = Vec::new();
        assert!(matches!(
            Encoder::new().encode_animation(&frames, &mut data),
            Err(Error::FrameOutOfBounds)
        ));
    }

    #[test]
    fn test_transparent_pixels_survive() {
        // One transparent pixel forces a reserved palette slot and a
        // graphic control transparency flag.
        let mut image = checker(4, 4, (200, 40, 40), (40, 40, 200));
        image.put_pixel(1, 1, (0, 0, 0, 0));
        let mut data = Vec::new();
        Encoder::new().encode(&image, &mut data).unwrap();

        // Decoding over a blank canvas leaves the pixel untouched.
        let anim = decoder::decode(&data).unwrap();
        assert_eq!(anim.frames[0].image.get_pixel(1, 1), (0, 0, 0, 0));
        assert_eq!(anim.frames[0].image.get_pixel(0, 0), (200, 40, 40, 255));
    }

    #[test]
    fn test_quantized_many_colors() {
        // 256 distinct grays through a 16-color budget still decode to
        // grays within the merge error.
        let mut image = Image::new(16, 16).unwrap();
        for y in 0..16u32 {
            for x in 0..16u32 {
                let v = (y * 16 + x) as u8;
                image.put_pixel(x, y, (v, v, v, 255));
            }
        }
        let mut data = Vec::new();
        Encoder::new()
            .palette_size(16)
            .encode(&image, &mut data)
            .unwrap();

        let anim = decoder::decode(&data).unwrap();
        for y in 0..16u32 {
            for x in 0..16u32 {
                let v = (y * 16 + x) as i32;
                let (r, g, b, a) = anim.frames[0].image.get_pixel(x, y);
                assert_eq!(a, 255);
                assert!((r as i32 - v).abs() <= 32, "pixel ({},{})", x, y);
                assert_eq!(r, g);
                assert_eq!(g, b);
            }
        }
    }
}
