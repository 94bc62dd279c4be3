//! Bit-level reader for JPEG entropy-coded data.
//!
//! Presents byte-stuffed compressed data as individual bits, MSB-first.
//! Inside entropy data a 0xFF source byte must be followed by a 0x00
//! stuffing byte (which is discarded); any other follower is a marker
//! boundary. The reader never consumes a marker while filling bits.

use crate::consts::JPEG_RST0;
use crate::error::{Error, Result};

/// Bit reader over a complete JPEG byte stream.
///
/// The reader owns a cursor into the slice; the surrounding segment
/// parser resumes from [`BitReader::byte_position`] once a scan ends.
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Bits buffered so far, right-aligned
    bit_buf: u32,
    /// Number of valid bits in `bit_buf`
    bit_count: u32,
}

impl<'a> BitReader<'a> {
    /// Create a reader starting at `pos` within `data`.
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            bit_buf: 0,
            bit_count: 0,
        }
    }

    /// Byte offset of the first unconsumed stream byte.
    ///
    /// Only meaningful once the sub-byte buffer has been discarded via
    /// [`BitReader::finish_scan`] or a restart.
    pub fn byte_position(&self) -> usize {
        self.pos
    }

    /// Pull one source byte into the bit buffer.
    ///
    /// Errors on end of stream; a 0xFF not followed by 0x00 is a marker
    /// boundary and reported as a missing stuffing byte.
    fn fill_byte(&mut self) -> Result<()> {
        if self.pos >= self.data.len() {
            return Err(Error::UnexpectedEof);
        }
        let b = self.data[self.pos];
        if b == 0xFF {
            match self.data.get(self.pos + 1) {
                Some(0x00) => self.pos += 2,
                Some(&found) => return Err(Error::MissingStuffingByte { found }),
                None => return Err(Error::UnexpectedEof),
            }
        } else {
            self.pos += 1;
        }
        self.bit_buf = (self.bit_buf << 8) | b as u32;
        self.bit_count += 8;
        Ok(())
    }

    /// Buffer at least `n` bits (n <= 25).
    pub fn ensure_bits(&mut self, n: u32) -> Result<()> {
        debug_assert!(n <= 25);
        while self.bit_count < n {
            self.fill_byte()?;
        }
        Ok(())
    }

    /// Consume and return a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> Result<u32> {
        self.ensure_bits(1)?;
        self.bit_count -= 1;
        Ok((self.bit_buf >> self.bit_count) & 1)
    }

    /// Consume and return `n` bits, MSB-first (n <= 16).
    #[inline]
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        if n == 0 {
            return Ok(0);
        }
        self.ensure_bits(n)?;
        self.bit_count -= n;
        Ok((self.bit_buf >> self.bit_count) & ((1 << n) - 1))
    }

    /// Read `t` bits and sign-extend per T.81 Annex F (RECEIVE+EXTEND).
    ///
    /// A value below 2^(t-1) encodes a negative magnitude:
    /// v + ((-1) << t) + 1.
    #[inline]
    pub fn receive_extend(&mut self, t: u8) -> Result<i32> {
        if t == 0 {
            return Ok(0);
        }
        let v = self.read_bits(t as u32)? as i32;
        if v < (1 << (t - 1)) {
            Ok(v + ((-1) << t) + 1)
        } else {
            Ok(v)
        }
    }

    /// Opportunistically buffer up to 8 bits and return them
    /// left-aligned in a byte, along with the count available.
    ///
    /// Unlike [`BitReader::ensure_bits`] this stops quietly at a marker
    /// boundary or end of stream, padding the missing low bits with
    /// zeros. Used by the Huffman fast path, which must peek past the
    /// last real code of a scan without consuming the trailing marker.
    #[inline]
    pub fn peek_prefix(&mut self) -> (u8, u32) {
        while self.bit_count < 8 {
            if self.pos >= self.data.len() {
                break;
            }
            let b = self.data[self.pos];
            if b == 0xFF {
                match self.data.get(self.pos + 1) {
                    Some(0x00) => self.pos += 2,
                    _ => break, // marker boundary; leave it unconsumed
                }
            } else {
                self.pos += 1;
            }
            self.bit_buf = (self.bit_buf << 8) | b as u32;
            self.bit_count += 8;
        }
        let avail = self.bit_count.min(8);
        if avail == 0 {
            return (0, 0);
        }
        let top = (self.bit_buf >> (self.bit_count - avail)) & ((1 << avail) - 1);
        ((top as u8) << (8 - avail), avail)
    }

    /// Consume `n` already-buffered bits (used after a fast-path hit).
    #[inline]
    pub fn consume_bits(&mut self, n: u32) {
        debug_assert!(n <= self.bit_count);
        self.bit_count -= n;
    }

    /// Discard sub-byte padding and require the restart marker
    /// 0xFFD0 + `marker_num` at the current byte position, then reset
    /// the bit buffer.
    pub fn restart(&mut self, marker_num: u8) -> Result<()> {
        // A scan is byte-aligned at a restart; entire buffered bytes
        // would mean the decoder overran the entropy data.
        debug_assert!(self.bit_count < 8);
        self.bit_buf = 0;
        self.bit_count = 0;

        if self.pos + 1 >= self.data.len() {
            return Err(Error::UnexpectedEof);
        }
        let found = self.data[self.pos + 1];
        if self.data[self.pos] != 0xFF || found != JPEG_RST0 + (marker_num & 0x07) {
            return Err(Error::BadRestartMarker {
                expected: marker_num & 0x07,
                found,
            });
        }
        self.pos += 2;
        Ok(())
    }

    /// Discard any buffered sub-byte padding so the byte position is
    /// valid for the segment parser again.
    pub fn finish_scan(&mut self) {
        debug_assert!(self.bit_count < 8);
        self.bit_buf = 0;
        self.bit_count = 0;
    }
}
