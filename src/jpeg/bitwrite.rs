//! Bitstream writer for JPEG entropy coding.
//!
//! Accumulates bits in a 64-bit buffer and flushes complete bytes to
//! the output, stuffing a 0x00 after every emitted 0xFF so entropy data
//! can never alias a marker.

use std::io::Write;

/// Size of the bit buffer in bits
const BIT_BUF_SIZE: i32 = 64;

/// Bitstream writer with automatic 0xFF byte stuffing.
pub struct BitWriter<W: Write> {
    output: W,
    /// Bit accumulation buffer
    put_buffer: u64,
    /// Number of free bits remaining in the buffer
    free_bits: i32,
    /// Total bytes written (stuffing included)
    bytes_written: usize,
}

impl<W: Write> BitWriter<W> {
    /// Create a new bitstream writer.
    pub fn new(output: W) -> Self {
        Self {
            output,
            put_buffer: 0,
            free_bits: BIT_BUF_SIZE,
            bytes_written: 0,
        }
    }

    /// Write `size` bits (right-aligned in `code`, 1-16).
    #[inline]
    pub fn put_bits(&mut self, code: u32, size: u8) -> std::io::Result<()> {
        debug_assert!(size <= 16, "Size must be <= 16 bits");
        debug_assert!((code as u64) < (1u64 << size), "Code exceeds size bits");

        let size = size as i32;
        self.free_bits -= size;

        if self.free_bits < 0 {
            let overflow = (-self.free_bits) as u32;
            // Top part fills the buffer exactly; flush, then restart the
            // buffer with the low `overflow` bits.
            self.put_buffer =
                (self.put_buffer << (size + self.free_bits)) | ((code as u64) >> overflow);
            self.flush_full_buffer()?;
            self.free_bits += BIT_BUF_SIZE;
            self.put_buffer = (code as u64) & ((1u64 << overflow) - 1);
        } else {
            self.put_buffer = (self.put_buffer << size) | (code as u64);
        }

        Ok(())
    }

    /// Write all 8 bytes of the full buffer, stuffing 0xFF bytes.
    fn flush_full_buffer(&mut self) -> std::io::Result<()> {
        let buffer = self.put_buffer;
        for i in (0..8).rev() {
            self.emit_byte_stuffed((buffer >> (i * 8)) as u8)?;
        }
        Ok(())
    }

    #[inline]
    fn emit_byte_stuffed(&mut self, byte: u8) -> std::io::Result<()> {
        self.output.write_all(&[byte])?;
        self.bytes_written += 1;
        if byte == 0xFF {
            self.output.write_all(&[0x00])?;
            self.bytes_written += 1;
        }
        Ok(())
    }

    /// Flush remaining bits, padding with 1-bits to the byte boundary.
    ///
    /// JPEG requires 1-bit padding so the tail cannot form a marker
    /// prefix by accident.
    pub fn flush(&mut self) -> std::io::Result<()> {
        let bits_in_buffer = BIT_BUF_SIZE - self.free_bits;
        if bits_in_buffer > 0 {
            let padding_bits = (8 - (bits_in_buffer % 8)) % 8;
            let total_bits = bits_in_buffer + padding_bits;

            let mut buffer = self.put_buffer << (BIT_BUF_SIZE - bits_in_buffer);
            if padding_bits > 0 {
                buffer |= ((1u64 << padding_bits) - 1) << (BIT_BUF_SIZE - total_bits);
            }

            for i in 0..(total_bits / 8) {
                self.emit_byte_stuffed((buffer >> (56 - i * 8)) as u8)?;
            }

            self.put_buffer = 0;
            self.free_bits = BIT_BUF_SIZE;
        }
        Ok(())
    }

    /// Write raw bytes (markers), bypassing bit stuffing.
    ///
    /// The bit buffer must be byte-aligned (flushed) first.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        debug_assert!(
            self.free_bits == BIT_BUF_SIZE,
            "Buffer must be flushed before writing raw bytes"
        );
        self.output.write_all(bytes)?;
        self.bytes_written += bytes.len();
        Ok(())
    }

    /// Total bytes written so far.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// Consume the writer and return the underlying output.
    pub fn into_inner(self) -> W {
        self.output
    }

    /// Get a mutable reference to the underlying output.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.output
    }
}
