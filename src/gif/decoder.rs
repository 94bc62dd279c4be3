//! GIF container decoding and frame compositing.
//!
//! Walks the section stream with a flat match on each introducer byte,
//! decompresses image data through [`crate::gif::lzw`], and composites
//! every frame onto a persistent canvas honoring transparency, frame
//! disposal and interlacing.
//!
//! Reference: GIF89a specification (GIF87a streams are accepted too).

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::gif::lzw;
use crate::gif::{Animation, Frame};
use crate::image::Image;

const INTRODUCER_EXTENSION: u8 = 0x21;
const INTRODUCER_IMAGE: u8 = 0x2C;
const INTRODUCER_TRAILER: u8 = 0x3B;

const LABEL_GRAPHIC_CONTROL: u8 = 0xF9;
const LABEL_COMMENT: u8 = 0xFE;
const LABEL_PLAIN_TEXT: u8 = 0x01;
const LABEL_APPLICATION: u8 = 0xFF;

/// Interlace passes: (first row, step).
const INTERLACE_PASSES: [(usize, usize); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];

/// What happens to the canvas once a frame has been displayed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Disposal {
    /// Unspecified or "do not dispose": the frame stays put.
    Keep,
    /// Clear the frame's rectangle back to transparent.
    RestoreToBackground,
    /// Put back the canvas as it was before this frame was drawn.
    RestoreToPrevious,
}

/// Pending graphic control parameters for the next image.
#[derive(Clone, Copy)]
struct GraphicControl {
    disposal: Disposal,
    transparent_index: Option<u8>,
    delay_cs: u16,
}

impl Default for GraphicControl {
    fn default() -> Self {
        GraphicControl {
            disposal: Disposal::Keep,
            transparent_index: None,
            delay_cs: 0,
        }
    }
}

/// All mutable decode state for a single stream.
struct DecodeContext<'a> {
    data: &'a [u8],
    pos: usize,
    width: u16,
    height: u16,
    global_palette: Option<Vec<[u8; 3]>>,
    canvas: Image,
    frames: Vec<Frame>,
    repeat: Option<u16>,
    pending: GraphicControl,
}

impl<'a> DecodeContext<'a> {
    fn read_u8(&mut self) -> Result<u8> {
        if self.pos >= self.data.len() {
            return Err(Error::UnexpectedEof);
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn read_u16_le(&mut self) -> Result<u16> {
        let lo = self.read_u8()? as u16;
        let hi = self.read_u8()? as u16;
        Ok((hi << 8) | lo)
    }

    fn read_slice(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(Error::UnexpectedEof);
        }
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn read_color_table(&mut self, entries: usize) -> Result<Vec<[u8; 3]>> {
        let raw = self.read_slice(entries * 3)?;
        Ok(raw.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
    }

    /// Concatenate data sub-blocks until the zero-length terminator.
    fn read_sub_blocks(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let len = self.read_u8()? as usize;
            if len == 0 {
                return Ok(out);
            }
            out.extend_from_slice(self.read_slice(len)?);
        }
    }

    fn skip_sub_blocks(&mut self) -> Result<()> {
        loop {
            let len = self.read_u8()? as usize;
            if len == 0 {
                return Ok(());
            }
            self.read_slice(len)?;
        }
    }

    fn parse_extension(&mut self) -> Result<()> {
        let label = self.read_u8()?;
        match label {
            LABEL_GRAPHIC_CONTROL => {
                let block_size = self.read_u8()?;
                if block_size != 4 {
                    return Err(Error::BadSegmentLength {
                        marker: LABEL_GRAPHIC_CONTROL,
                        length: block_size as u16,
                    });
                }
                let packed = self.read_u8()?;
                let delay_cs = self.read_u16_le()?;
                let transparent = self.read_u8()?;
                let terminator = self.read_u8()?;
                if terminator != 0 {
                    return Err(Error::BadSegmentLength {
                        marker: LABEL_GRAPHIC_CONTROL,
                        length: terminator as u16,
                    });
                }

                let disposal = match (packed >> 2) & 0x07 {
                    2 => Disposal::RestoreToBackground,
                    3 => Disposal::RestoreToPrevious,
                    _ => Disposal::Keep,
                };
                let transparent_index = if packed & 0x01 != 0 {
                    Some(transparent)
                } else {
                    None
                };
                self.pending = GraphicControl {
                    disposal,
                    transparent_index,
                    delay_cs,
                };
            }
            LABEL_APPLICATION => {
                let block_size = self.read_u8()? as usize;
                let ident = self.read_slice(block_size)?;
                if ident == b"NETSCAPE2.0" {
                    let payload = self.read_sub_blocks()?;
                    if payload.len() >= 3 && payload[0] == 0x01 {
                        let loops = (payload[2] as u16) << 8 | payload[1] as u16;
                        debug!("NETSCAPE2.0 loop count {}", loops);
                        self.repeat = Some(loops);
                    }
                } else {
                    self.skip_sub_blocks()?;
                }
            }
            LABEL_COMMENT | LABEL_PLAIN_TEXT => self.skip_sub_blocks()?,
            _ => self.skip_sub_blocks()?,
        }
        Ok(())
    }

    fn parse_image(&mut self) -> Result<()> {
        let left = self.read_u16_le()? as usize;
        let top = self.read_u16_le()? as usize;
        let width = self.read_u16_le()? as usize;
        let height = self.read_u16_le()? as usize;
        let packed = self.read_u8()?;

        if left + width > self.width as usize || top + height > self.height as usize {
            return Err(Error::FrameOutOfBounds);
        }

        let interlaced = packed & 0x40 != 0;
        let local_palette = if packed & 0x80 != 0 {
            let entries = 2usize << (packed & 0x07);
            Some(self.read_color_table(entries)?)
        } else {
            None
        };
        let palette: Vec<[u8; 3]> = match local_palette {
            Some(p) => p,
            None => self
                .global_palette
                .clone()
                .ok_or(Error::MissingColorTable)?,
        };

        let min_code_size = self.read_u8()?;
        let data = self.read_sub_blocks()?;
        let indices = lzw::decode(min_code_size, &data, width * height)?;
        if indices.len() < width * height {
            return Err(Error::UnexpectedEof);
        }

        let control = std::mem::take(&mut self.pending);
        trace!(
            "frame {}x{} at ({},{}), interlaced={}, disposal={:?}",
            width,
            height,
            left,
            top,
            interlaced,
            control.disposal
        );

        let saved = if control.disposal == Disposal::RestoreToPrevious {
            Some(self.canvas.pixels().to_vec())
        } else {
            None
        };

        // Scatter rows in interlace pass order when flagged.
        let mut src_row = 0usize;
        let draw_row = |ctx: &mut Self, y: usize, row: usize| -> Result<()> {
            for x in 0..width {
                let idx = indices[row * width + x];
                if Some(idx) == control.transparent_index {
                    continue;
                }
                let color = palette
                    .get(idx as usize)
                    .copied()
                    .ok_or(Error::BadColorIndex(idx))?;
                ctx.canvas.put_pixel(
                    (left + x) as u32,
                    (top + y) as u32,
                    (color[0], color[1], color[2], 255),
                );
            }
            Ok(())
        };

        if interlaced {
            for &(start, step) in INTERLACE_PASSES.iter() {
                let mut y = start;
                while y < height {
                    draw_row(self, y, src_row)?;
                    src_row += 1;
                    y += step;
                }
            }
        } else {
            for y in 0..height {
                draw_row(self, y, src_row)?;
                src_row += 1;
            }
        }

        self.frames.push(Frame {
            image: self.canvas.clone(),
            delay_cs: control.delay_cs,
        });

        match control.disposal {
            Disposal::Keep => {}
            Disposal::RestoreToBackground => {
                for y in top..top + height {
                    for x in left..left + width {
                        self.canvas.put_pixel(x as u32, y as u32, (0, 0, 0, 0));
                    }
                }
            }
            Disposal::RestoreToPrevious => {
                if let Some(saved) = saved {
                    self.canvas.pixels_mut().copy_from_slice(&saved);
                }
            }
        }
        Ok(())
    }
}

/// Decode a complete GIF stream from a byte slice.
pub fn decode(data: &[u8]) -> Result<Animation> {
    if data.len() < 6 || (&data[0..6] != b"GIF89a" && &data[0..6] != b"GIF87a") {
        return Err(Error::BadSignature);
    }

    let mut ctx = DecodeContext {
        data,
        pos: 6,
        width: 0,
        height: 0,
        global_palette: None,
        canvas: Image::new(1, 1)?,
        frames: Vec::new(),
        repeat: None,
        pending: GraphicControl::default(),
    };

    ctx.width = ctx.read_u16_le()?;
    ctx.height = ctx.read_u16_le()?;
    let packed = ctx.read_u8()?;
    let _background = ctx.read_u8()?;
    let _aspect = ctx.read_u8()?;
    if ctx.width == 0 || ctx.height == 0 {
        return Err(Error::InvalidDimensions {
            width: ctx.width as u32,
            height: ctx.height as u32,
        });
    }
    debug!("screen {}x{}", ctx.width, ctx.height);

    if packed & 0x80 != 0 {
        let entries = 2usize << (packed & 0x07);
        ctx.global_palette = Some(ctx.read_color_table(entries)?);
    }
    ctx.canvas = Image::new(ctx.width as u32, ctx.height as u32)?;

    loop {
        let introducer = ctx.read_u8()?;
        match introducer {
            INTRODUCER_IMAGE => ctx.parse_image()?,
            INTRODUCER_EXTENSION => ctx.parse_extension()?,
            INTRODUCER_TRAILER => break,
            m => return Err(Error::UnexpectedMarker(m)),
        }
    }

    if ctx.frames.is_empty() {
        return Err(Error::EmptyAnimation);
    }
    Ok(Animation {
        width: ctx.width,
        height: ctx.height,
        frames: ctx.frames,
        repeat: ctx.repeat,
    })
}
