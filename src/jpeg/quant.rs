//! Quantization tables.
//!
//! The encoder divides scaled DCT coefficients by `q << 3` (the extra 3
//! bits absorb the forward transform's 8x scale); the decoder multiplies
//! by the raw table entry. Base tables are the Annex K luminance and
//! chrominance tables, scaled by the usual IJG quality curve.

use crate::consts::{DCTSIZE2, JPEG_NATURAL_ORDER, STD_CHROMINANCE_QUANT, STD_LUMINANCE_QUANT};
use crate::error::{Error, Result};

/// One quantization table in natural (row-major) order.
#[derive(Clone)]
pub struct QuantTable {
    values: [u16; DCTSIZE2],
}

impl QuantTable {
    /// Builds a table from base entries, scaled for `quality` (1..=100).
    pub fn from_quality(base: &[u16; DCTSIZE2], quality: u8) -> Result<Self> {
        if quality == 0 || quality > 100 {
            return Err(Error::InvalidQuality(quality));
        }
        let q = quality as i32;
        let scale = if q < 50 { 5000 / q } else { 200 - 2 * q };
        let mut values = [0u16; DCTSIZE2];
        for i in 0..DCTSIZE2 {
            let v = (base[i] as i32 * scale + 50) / 100;
            values[i] = v.clamp(1, 255) as u16;
        }
        Ok(QuantTable { values })
    }

    pub fn luminance(quality: u8) -> Result<Self> {
        Self::from_quality(&STD_LUMINANCE_QUANT, quality)
    }

    pub fn chrominance(quality: u8) -> Result<Self> {
        Self::from_quality(&STD_CHROMINANCE_QUANT, quality)
    }

    /// Builds a table from entries supplied in zigzag order, as they
    /// appear in a DQT segment.
    pub fn from_zigzag(zigzag: &[u16; DCTSIZE2]) -> Self {
        let mut values = [0u16; DCTSIZE2];
        for i in 0..DCTSIZE2 {
            values[JPEG_NATURAL_ORDER[i]] = zigzag[i];
        }
        QuantTable { values }
    }

    /// Table entry at a natural-order position.
    #[inline]
    pub fn value(&self, i: usize) -> u16 {
        self.values[i]
    }

    /// Entries in zigzag order, as written into a DQT segment.
    pub fn zigzag_values(&self) -> [u16; DCTSIZE2] {
        let mut out = [0u16; DCTSIZE2];
        for i in 0..DCTSIZE2 {
            out[i] = self.values[JPEG_NATURAL_ORDER[i]];
        }
        out
    }

    /// Quantizes one coefficient. The divisor carries the forward
    /// transform's 8x scale; ties round away from zero.
    #[inline]
    pub fn quantize(&self, coef: i16, i: usize) -> i16 {
        let divisor = (self.values[i] as i32) << 3;
        let c = coef as i32;
        let q = if c >= 0 {
            (c + divisor / 2) / divisor
        } else {
            (c - divisor / 2) / divisor
        };
        q as i16
    }

    /// Dequantizes one coefficient.
    #[inline]
    pub fn dequantize(&self, coef: i16, i: usize) -> i32 {
        coef as i32 * self.values[i] as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_50_is_base_table() {
        let t = QuantTable::luminance(50).unwrap();
        for i in 0..DCTSIZE2 {
            assert_eq!(t.value(i), STD_LUMINANCE_QUANT[i].clamp(1, 255));
        }
    }

    #[test]
    fn test_quality_100_is_all_ones() {
        let t = QuantTable::luminance(100).unwrap();
        for i in 0..DCTSIZE2 {
            assert_eq!(t.value(i), 1);
        }
    }

    #[test]
    fn test_low_quality_coarser_than_high() {
        let lo = QuantTable::luminance(10).unwrap();
        let hi = QuantTable::luminance(90).unwrap();
        for i in 0..DCTSIZE2 {
            assert!(lo.value(i) >= hi.value(i));
        }
    }

    #[test]
    fn test_quality_out_of_range() {
        assert!(matches!(QuantTable::luminance(0), Err(Error::InvalidQuality(0))));
        assert!(matches!(QuantTable::luminance(101), Err(Error::InvalidQuality(101))));
    }

    #[test]
    fn test_quantize_ties_away_from_zero() {
        let ones = [1u16; DCTSIZE2];
        let t = QuantTable::from_zigzag(&ones);
        // divisor is 8
        assert_eq!(t.quantize(4, 0), 1);
        assert_eq!(t.quantize(-4, 0), -1);
        assert_eq!(t.quantize(3, 0), 0);
        assert_eq!(t.quantize(-3, 0), 0);
        assert_eq!(t.quantize(12, 0), 2);
    }

    #[test]
    fn test_zigzag_roundtrip() {
        let t = QuantTable::luminance(75).unwrap();
        let zz = t.zigzag_values();
        let back = QuantTable::from_zigzag(&zz);
        for i in 0..DCTSIZE2 {
            assert_eq!(t.value(i), back.value(i));
        }
    }

    #[test]
    fn test_quantize_dequantize_bounds_error() {
        let t = QuantTable::luminance(50).unwrap();
        // quantize then dequantize stays within one divisor step
        let coef = 1000i16;
        let q = t.quantize(coef, 0);
        let d = t.dequantize(q, 0);
        let step = (t.value(0) as i32) << 3;
        assert!((d * 8 - coef as i32).abs() <= step / 2 + step % 2);
    }
}
