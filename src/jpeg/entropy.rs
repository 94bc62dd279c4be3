//! Huffman entropy encoder for baseline scans.
//!
//! DC coefficients are coded differentially per component; AC
//! coefficients are run-length coded in zigzag order with the EOB and
//! ZRL symbols.
//!
//! Reference: ITU-T T.81 Section F.1.2

use std::io::Write;

use crate::consts::{DCTSIZE2, JPEG_NATURAL_ORDER};
use crate::error::Result;
use crate::jpeg::bitwrite::BitWriter;
use crate::jpeg::huffman::HuffEncoder;

/// End of Block, coded as run=0 size=0.
const EOB: u8 = 0x00;

/// Zero Run Length, 16 consecutive zeros.
const ZRL: u8 = 0xF0;

/// Number of bits needed to represent a value (the JPEG "category").
/// 0 needs 0 bits, -1/1 need 1 bit, -3..-2/2..3 need 2 bits, and so on.
#[inline]
pub fn jpeg_nbits(value: i16) -> u8 {
    if value == 0 {
        return 0;
    }
    (16 - value.unsigned_abs().leading_zeros()) as u8
}

/// Category bits for a coefficient. Negative values code as value - 1
/// truncated to `nbits`, which makes the top bit 0 for negatives.
#[inline]
fn magnitude_bits(value: i16) -> (u8, u16) {
    let nbits = jpeg_nbits(value);
    if value < 0 {
        let bits = (value as u16).wrapping_sub(1) & ((1u16 << nbits) - 1);
        (nbits, bits)
    } else {
        (nbits, value as u16)
    }
}

/// Entropy encoder state for one scan.
pub struct EntropyEncoder<'a, W: Write> {
    writer: &'a mut BitWriter<W>,
    /// Last DC value per component, for differential coding.
    last_dc_val: [i16; 4],
}

impl<'a, W: Write> EntropyEncoder<'a, W> {
    pub fn new(writer: &'a mut BitWriter<W>) -> Self {
        Self {
            writer,
            last_dc_val: [0; 4],
        }
    }

    /// Reset DC predictions, as required after a restart marker.
    pub fn reset_dc(&mut self) {
        self.last_dc_val = [0; 4];
    }

    /// Flush the bit buffer to a byte boundary, emit RSTn and reset the
    /// DC predictions.
    pub fn emit_restart(&mut self, restart_num: u8) -> Result<()> {
        self.writer.flush()?;
        self.writer.write_bytes(&[0xFF, 0xD0 + (restart_num & 0x07)])?;
        self.reset_dc();
        Ok(())
    }

    /// Encode one 8x8 block of quantized coefficients in natural order.
    pub fn encode_block(
        &mut self,
        block: &[i16; DCTSIZE2],
        component: usize,
        dc_table: &HuffEncoder,
        ac_table: &HuffEncoder,
    ) -> Result<()> {
        self.encode_dc(block[0], component, dc_table)?;
        self.encode_ac(block, ac_table)
    }

    fn encode_dc(&mut self, dc: i16, component: usize, dc_table: &HuffEncoder) -> Result<()> {
        let diff = dc.wrapping_sub(self.last_dc_val[component]);
        self.last_dc_val[component] = dc;

        let (nbits, bits) = magnitude_bits(diff);
        let (code, size) = dc_table.get_code(nbits);
        self.writer.put_bits(code, size)?;
        if nbits > 0 {
            self.writer.put_bits(bits as u32, nbits)?;
        }
        Ok(())
    }

    fn encode_ac(&mut self, block: &[i16; DCTSIZE2], ac_table: &HuffEncoder) -> Result<()> {
        let mut run = 0u8;

        for &natural_idx in JPEG_NATURAL_ORDER[1..].iter() {
            let coef = block[natural_idx];
            if coef == 0 {
                run += 1;
                continue;
            }

            while run >= 16 {
                let (code, size) = ac_table.get_code(ZRL);
                self.writer.put_bits(code, size)?;
                run -= 16;
            }

            let (nbits, bits) = magnitude_bits(coef);
            let symbol = (run << 4) | nbits;
            let (code, size) = ac_table.get_code(symbol);
            self.writer.put_bits(code, size)?;
            self.writer.put_bits(bits as u32, nbits)?;
            run = 0;
        }

        if run > 0 {
            let (code, size) = ac_table.get_code(EOB);
            self.writer.put_bits(code, size)?;
        }
        Ok(())
    }

    /// Flush remaining bits, padding with 1-bits to a byte boundary.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
