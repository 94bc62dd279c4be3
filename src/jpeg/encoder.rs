//! Baseline JPEG encoder.
//!
//! Fixed 4:4:4 sampling with the Annex K quantization and Huffman
//! tables. RGBA input is converted to YCbCr per 8x8 tile, transformed,
//! quantized and entropy-coded in interleaved MCU order.

use std::io::Write;

use log::debug;

use crate::color::{rgb_to_gray, rgb_to_ycbcr};
use crate::consts::{
    AC_CHROMINANCE_BITS, AC_CHROMINANCE_VALUES, AC_LUMINANCE_BITS, AC_LUMINANCE_VALUES,
    DC_CHROMINANCE_BITS, DC_CHROMINANCE_VALUES, DC_LUMINANCE_BITS, DC_LUMINANCE_VALUES, DCTSIZE,
    DCTSIZE2,
};
use crate::error::{Error, Result};
use crate::image::Image;
use crate::jpeg::bitwrite::BitWriter;
use crate::jpeg::dct::forward_dct_8x8;
use crate::jpeg::entropy::EntropyEncoder;
use crate::jpeg::huffman::{HuffEncoder, HuffSpec};
use crate::jpeg::marker::{MarkerWriter, SofComponent, SosComponent};
use crate::jpeg::quant::QuantTable;

/// Builder-style JPEG encoder.
///
/// # Example
/// ```no_run
/// use rasterfmt::jpeg::Encoder;
/// # let image = rasterfmt::Image::new(16, 16).unwrap();
/// let mut out = Vec::new();
/// Encoder::new().quality(85).encode(&image, &mut out).unwrap();
/// ```
#[derive(Clone)]
pub struct Encoder {
    quality: u8,
    restart_interval: u16,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    pub fn new() -> Self {
        Encoder {
            quality: 75,
            restart_interval: 0,
        }
    }

    /// Set quality level (1-100). Out-of-range values are rejected when
    /// encoding starts.
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Emit a restart marker every `interval` MCUs (0 disables).
    pub fn restart_interval(mut self, interval: u16) -> Self {
        self.restart_interval = interval;
        self
    }

    /// Encode an RGBA image as a color (YCbCr 4:4:4) baseline stream.
    /// Returns the number of bytes written.
    pub fn encode<W: Write>(&self, image: &Image, output: W) -> Result<usize> {
        self.encode_planes(image, output, false)
    }

    /// Encode an RGBA image as a single-component grayscale stream.
    pub fn encode_gray<W: Write>(&self, image: &Image, output: W) -> Result<usize> {
        self.encode_planes(image, output, true)
    }

    fn encode_planes<W: Write>(&self, image: &Image, output: W, gray: bool) -> Result<usize> {
        let lum_quant = QuantTable::luminance(self.quality)?;
        let chrom_quant = QuantTable::chrominance(self.quality)?;

        let dc_lum_spec = HuffSpec::new(DC_LUMINANCE_BITS, &DC_LUMINANCE_VALUES)?;
        let ac_lum_spec = HuffSpec::new(AC_LUMINANCE_BITS, &AC_LUMINANCE_VALUES)?;
        let dc_chrom_spec = HuffSpec::new(DC_CHROMINANCE_BITS, &DC_CHROMINANCE_VALUES)?;
        let ac_chrom_spec = HuffSpec::new(AC_CHROMINANCE_BITS, &AC_CHROMINANCE_VALUES)?;
        let dc_lum = HuffEncoder::from_spec(&dc_lum_spec)?;
        let ac_lum = HuffEncoder::from_spec(&ac_lum_spec)?;
        let dc_chrom = HuffEncoder::from_spec(&dc_chrom_spec)?;
        let ac_chrom = HuffEncoder::from_spec(&ac_chrom_spec)?;

        // JPEG frame dimensions are 16-bit fields.
        if image.width() > u16::MAX as u32 || image.height() > u16::MAX as u32 {
            return Err(Error::InvalidDimensions {
                width: image.width(),
                height: image.height(),
            });
        }
        let width = image.width() as usize;
        let height = image.height() as usize;
        let mcus_w = width.div_ceil(DCTSIZE);
        let mcus_h = height.div_ceil(DCTSIZE);
        debug!(
            "encoding {}x{} ({} MCUs, quality {}, gray={})",
            width,
            height,
            mcus_w * mcus_h,
            self.quality,
            gray
        );

        let mut mw = MarkerWriter::new(output);
        mw.write_soi()?;
        mw.write_jfif_app0(1, 72, 72)?;
        mw.write_dqt(0, &lum_quant)?;
        if !gray {
            mw.write_dqt(1, &chrom_quant)?;
        }

        let sof_comps: Vec<SofComponent> = if gray {
            vec![SofComponent {
                id: 1,
                h_samp: 1,
                v_samp: 1,
                quant_idx: 0,
            }]
        } else {
            vec![
                SofComponent {
                    id: 1,
                    h_samp: 1,
                    v_samp: 1,
                    quant_idx: 0,
                },
                SofComponent {
                    id: 2,
                    h_samp: 1,
                    v_samp: 1,
                    quant_idx: 1,
                },
                SofComponent {
                    id: 3,
                    h_samp: 1,
                    v_samp: 1,
                    quant_idx: 1,
                },
            ]
        };
        mw.write_sof(false, height as u16, width as u16, &sof_comps)?;

        mw.write_dht(0, false, &dc_lum_spec)?;
        mw.write_dht(0, true, &ac_lum_spec)?;
        if !gray {
            mw.write_dht(1, false, &dc_chrom_spec)?;
            mw.write_dht(1, true, &ac_chrom_spec)?;
        }
        mw.write_dri(self.restart_interval)?;

        let sos_comps: Vec<SosComponent> = sof_comps
            .iter()
            .map(|c| SosComponent {
                id: c.id,
                dc_idx: if c.id == 1 { 0 } else { 1 },
                ac_idx: if c.id == 1 { 0 } else { 1 },
            })
            .collect();
        mw.write_sos(&sos_comps, 0, 63, 0, 0)?;

        let header_bytes = mw.bytes_written();
        let mut writer = BitWriter::new(mw.get_mut());
        {
            let mut entropy = EntropyEncoder::new(&mut writer);
            let mut restarts_to_go = self.restart_interval as usize;
            let mut next_rst = 0u8;

            let mut tiles = [[0i16; DCTSIZE2]; 3];
            let mut coeffs = [0i16; DCTSIZE2];
            let mut quantized = [0i16; DCTSIZE2];

            for mcu in 0..mcus_w * mcus_h {
                if self.restart_interval > 0 && restarts_to_go == 0 && mcu > 0 {
                    entropy.emit_restart(next_rst)?;
                    next_rst = (next_rst + 1) & 0x07;
                    restarts_to_go = self.restart_interval as usize;
                }

                let mcu_x = mcu % mcus_w;
                let mcu_y = mcu / mcus_w;
                gather_tile(image, mcu_x * DCTSIZE, mcu_y * DCTSIZE, gray, &mut tiles);

                let ncomps = if gray { 1 } else { 3 };
                for c in 0..ncomps {
                    let quant = if c == 0 { &lum_quant } else { &chrom_quant };
                    let (dc_t, ac_t) = if c == 0 {
                        (&dc_lum, &ac_lum)
                    } else {
                        (&dc_chrom, &ac_chrom)
                    };
                    forward_dct_8x8(&tiles[c], &mut coeffs);
                    for i in 0..DCTSIZE2 {
                        quantized[i] = quant.quantize(coeffs[i], i);
                    }
                    entropy.encode_block(&quantized, c, dc_t, ac_t)?;
                }

                if self.restart_interval > 0 {
                    restarts_to_go -= 1;
                }
            }
            entropy.flush()?;
        }
        let entropy_bytes = writer.bytes_written();

        mw.write_eoi()?;
        Ok(header_bytes + entropy_bytes + 2)
    }
}

/// Collect one 8x8 tile of centered YCbCr (or gray) samples, replicating
/// edge pixels outside the image.
fn gather_tile(image: &Image, px: usize, py: usize, gray: bool, tiles: &mut [[i16; DCTSIZE2]; 3]) {
    let last_x = image.width() - 1;
    let last_y = image.height() - 1;
    for ty in 0..DCTSIZE {
        for tx in 0..DCTSIZE {
            let sx = ((px + tx) as u32).min(last_x);
            let sy = ((py + ty) as u32).min(last_y);
            let (r, g, b, _) = image.get_pixel(sx, sy);
            let i = ty * DCTSIZE + tx;
            if gray {
                tiles[0][i] = rgb_to_gray(r, g, b) as i16 - 128;
            } else {
                let (y, cb, cr) = rgb_to_ycbcr(r, g, b);
                tiles[0][i] = y as i16 - 128;
                tiles[1][i] = cb as i16 - 128;
                tiles[2][i] = cr as i16 - 128;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::jpeg::decoder;

    fn solid_image(width: u32, height: u32, rgba: (u8, u8, u8, u8)) -> Image {
        let mut image = Image::new(width, height).unwrap();
        for y in 0..height {
            for x in 0..width {
                image.put_pixel(x, y, rgba);
            }
        }
        image
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let image = solid_image(8, 8, (10, 10, 10, 255));
        let mut out = Vec::new();
        let err = Encoder::new().quality(0).encode(&image, &mut out);
        assert!(matches!(err, Err(Error::InvalidQuality(0))));
    }

    #[test]
    fn test_uniform_gray_roundtrip() {
        // A flat tile survives quantization exactly up to rounding.
        let image = solid_image(8, 8, (128, 128, 128, 255));
        let mut out = Vec::new();
        Encoder::new().quality(90).encode_gray(&image, &mut out).unwrap();

        let decoded = decoder::decode(&out).unwrap();
        assert_eq!(decoded.width(), 8);
        let (r, g, b, _) = decoded.get_pixel(3, 5);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert!((r as i32 - 128).abs() <= 2);
    }

    #[test]
    fn test_solid_color_roundtrip() {
        let image = solid_image(16, 16, (200, 60, 30, 255));
        let mut out = Vec::new();
        let written = Encoder::new().quality(95).encode(&image, &mut out).unwrap();
        assert_eq!(written, out.len());

        let decoded = decoder::decode(&out).unwrap();
        assert_eq!(decoded.width(), 16);
        assert_eq!(decoded.height(), 16);
        for &(x, y) in &[(0u32, 0u32), (8, 3), (15, 15)] {
            let (r, g, b, a) = decoded.get_pixel(x, y);
            assert_eq!(a, 255);
            assert!((r as i32 - 200).abs() <= 4, "r={} at ({},{})", r, x, y);
            assert!((g as i32 - 60).abs() <= 4, "g={} at ({},{})", g, x, y);
            assert!((b as i32 - 30).abs() <= 4, "b={} at ({},{})", b, x, y);
        }
    }

    #[test]
    fn test_odd_dimensions_pad_by_replication() {
        // 10x6 forces partial tiles on both axes.
        let image = solid_image(10, 6, (90, 140, 190, 255));
        let mut out = Vec::new();
        Encoder::new().quality(90).encode(&image, &mut out).unwrap();

        let decoded = decoder::decode(&out).unwrap();
        assert_eq!(decoded.width(), 10);
        assert_eq!(decoded.height(), 6);
        let (r, g, b, _) = decoded.get_pixel(9, 5);
        assert!((r as i32 - 90).abs() <= 5);
        assert!((g as i32 - 140).abs() <= 5);
        assert!((b as i32 - 190).abs() <= 5);
    }

    #[test]
    fn test_restart_interval_stream_decodes() {
        // 32x8 = 4 MCUs; interval 2 puts one RST in the middle.
        let mut image = solid_image(32, 8, (0, 0, 0, 255));
        for x in 0..32 {
            for y in 0..8 {
                let v = (x * 8) as u8;
                image.put_pixel(x, y, (v, v, v, 255));
            }
        }
        let mut out = Vec::new();
        Encoder::new()
            .quality(85)
            .restart_interval(2)
            .encode(&image, &mut out)
            .unwrap();

        // DRI must be present.
        assert!(out.windows(2).any(|w| w == [0xFF, 0xDD]));
        let decoded = decoder::decode(&out).unwrap();
        assert_eq!(decoded.width(), 32);
        let (r, _, _, _) = decoded.get_pixel(0, 0);
        assert!((r as i32) <= 16);
    }
}
