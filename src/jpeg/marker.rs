//! JPEG marker emission for encoding.
//!
//! Writes the file-format segments around the entropy-coded data:
//! SOI, APP0 (JFIF), DQT, SOF, DHT, SOS, DRI and EOI.
//!
//! Reference: ITU-T T.81 Section B
use std::io::Write;

use crate::consts::{
    JPEG_APP0, JPEG_DHT, JPEG_DQT, JPEG_DRI, JPEG_EOI, JPEG_SOF0, JPEG_SOF2, JPEG_SOI, JPEG_SOS,
};
use crate::error::Result;
use crate::jpeg::huffman::HuffSpec;
use crate::jpeg::quant::QuantTable;

const JFIF_ID: [u8; 5] = *b"JFIF\0";

/// JFIF version 1.01
const JFIF_VERSION: [u8; 2] = [1, 1];

/// Per-component frame parameters as written into SOF.
#[derive(Clone, Copy)]
pub struct SofComponent {
    pub id: u8,
    pub h_samp: u8,
    pub v_samp: u8,
    pub quant_idx: u8,
}

/// Per-component scan parameters as written into SOS.
#[derive(Clone, Copy)]
pub struct SosComponent {
    pub id: u8,
    pub dc_idx: u8,
    pub ac_idx: u8,
}

/// Marker writer for JPEG encoding.
pub struct MarkerWriter<W: Write> {
    output: W,
    bytes_written: usize,
}

impl<W: Write> MarkerWriter<W> {
    pub fn new(output: W) -> Self {
        Self {
            output,
            bytes_written: 0,
        }
    }

    fn emit_byte(&mut self, byte: u8) -> Result<()> {
        self.output.write_all(&[byte])?;
        self.bytes_written += 1;
        Ok(())
    }

    /// Write a 2-byte value in big-endian order.
    fn emit_2bytes(&mut self, value: u16) -> Result<()> {
        self.emit_byte((value >> 8) as u8)?;
        self.emit_byte(value as u8)?;
        Ok(())
    }

    /// Write a marker (0xFF followed by marker code).
    fn emit_marker(&mut self, marker: u8) -> Result<()> {
        self.emit_byte(0xFF)?;
        self.emit_byte(marker)?;
        Ok(())
    }

    pub fn write_soi(&mut self) -> Result<()> {
        self.emit_marker(JPEG_SOI)
    }

    pub fn write_eoi(&mut self) -> Result<()> {
        self.emit_marker(JPEG_EOI)
    }

    /// Write APP0 (JFIF) with no thumbnail. `density_unit` is 0 for
    /// aspect-ratio-only, 1 for dots/inch, 2 for dots/cm.
    pub fn write_jfif_app0(
        &mut self,
        density_unit: u8,
        x_density: u16,
        y_density: u16,
    ) -> Result<()> {
        self.emit_marker(JPEG_APP0)?;
        self.emit_2bytes(16)?;

        for &b in &JFIF_ID {
            self.emit_byte(b)?;
        }
        self.emit_byte(JFIF_VERSION[0])?;
        self.emit_byte(JFIF_VERSION[1])?;

        self.emit_byte(density_unit)?;
        self.emit_2bytes(x_density)?;
        self.emit_2bytes(y_density)?;

        // thumbnail width and height
        self.emit_byte(0)?;
        self.emit_byte(0)?;

        Ok(())
    }

    /// Write a DQT segment holding one table. Entries above 255 force
    /// 16-bit precision.
    pub fn write_dqt(&mut self, table_index: u8, table: &QuantTable) -> Result<()> {
        let zigzag = table.zigzag_values();
        let use_16bit = zigzag.iter().any(|&v| v > 255);

        self.emit_marker(JPEG_DQT)?;
        let payload = if use_16bit { 128 } else { 64 } as u16;
        self.emit_2bytes(2 + 1 + payload)?;

        // Pq in high nibble, Tq in low nibble
        let pq_tq = if use_16bit {
            0x10 | (table_index & 0x0F)
        } else {
            table_index & 0x0F
        };
        self.emit_byte(pq_tq)?;

        for &value in zigzag.iter() {
            if use_16bit {
                self.emit_2bytes(value)?;
            } else {
                self.emit_byte(value as u8)?;
            }
        }

        Ok(())
    }

    /// Write SOF0 (baseline) or SOF2 (progressive).
    pub fn write_sof(
        &mut self,
        progressive: bool,
        height: u16,
        width: u16,
        components: &[SofComponent],
    ) -> Result<()> {
        let marker = if progressive { JPEG_SOF2 } else { JPEG_SOF0 };
        self.emit_marker(marker)?;

        let num_components = components.len() as u16;
        self.emit_2bytes(8 + 3 * num_components)?;

        // 8-bit sample precision
        self.emit_byte(8)?;
        self.emit_2bytes(height)?;
        self.emit_2bytes(width)?;
        self.emit_byte(num_components as u8)?;

        for comp in components {
            self.emit_byte(comp.id)?;
            self.emit_byte((comp.h_samp << 4) | comp.v_samp)?;
            self.emit_byte(comp.quant_idx)?;
        }

        Ok(())
    }

    /// Write a DHT segment holding one table.
    pub fn write_dht(&mut self, table_index: u8, is_ac: bool, spec: &HuffSpec) -> Result<()> {
        let num_symbols = spec.num_symbols();

        self.emit_marker(JPEG_DHT)?;
        self.emit_2bytes(2 + 1 + 16 + num_symbols as u16)?;

        // Tc in high nibble, Th in low nibble
        let tc_th = if is_ac {
            0x10 | (table_index & 0x0F)
        } else {
            table_index & 0x0F
        };
        self.emit_byte(tc_th)?;

        for i in 1..=16 {
            self.emit_byte(spec.bits[i])?;
        }
        for i in 0..num_symbols {
            self.emit_byte(spec.huffval[i])?;
        }

        Ok(())
    }

    /// Write SOS for a scan covering `components`, with spectral
    /// selection `ss..=se` and successive approximation `ah`/`al`.
    pub fn write_sos(
        &mut self,
        components: &[SosComponent],
        ss: u8,
        se: u8,
        ah: u8,
        al: u8,
    ) -> Result<()> {
        self.emit_marker(JPEG_SOS)?;
        self.emit_2bytes(6 + 2 * components.len() as u16)?;

        self.emit_byte(components.len() as u8)?;
        for comp in components {
            self.emit_byte(comp.id)?;
            self.emit_byte((comp.dc_idx << 4) | comp.ac_idx)?;
        }

        self.emit_byte(ss)?;
        self.emit_byte(se)?;
        self.emit_byte((ah << 4) | al)?;

        Ok(())
    }

    /// Write DRI. An interval of 0 writes nothing.
    pub fn write_dri(&mut self, interval: u16) -> Result<()> {
        if interval == 0 {
            return Ok(());
        }
        self.emit_marker(JPEG_DRI)?;
        self.emit_2bytes(4)?;
        self.emit_2bytes(interval)?;
        Ok(())
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn into_inner(self) -> W {
        self.output
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.output
    }
}
