//! Shared constants: DCT geometry, zigzag order, JPEG markers, and the
//! ITU T.81 Annex K reference tables used by the encode path.

/// One dimension of a DCT block.
pub const DCTSIZE: usize = 8;

/// Number of coefficients in a DCT block.
pub const DCTSIZE2: usize = 64;

/// Maximum number of components in one scan.
pub const MAX_COMPS_IN_SCAN: usize = 4;

/// Natural (row-major) position of the k-th zigzag-ordered coefficient.
///
/// `JPEG_NATURAL_ORDER[k]` is where zigzag index `k` lives inside the
/// 8x8 block; low frequencies come first.
pub const JPEG_NATURAL_ORDER: [usize; DCTSIZE2] = [
    0, 1, 8, 16, 9, 2, 3, 10, //
    17, 24, 32, 25, 18, 11, 4, 5, //
    12, 19, 26, 33, 40, 48, 41, 34, //
    27, 20, 13, 6, 7, 14, 21, 28, //
    35, 42, 49, 56, 57, 50, 43, 36, //
    29, 22, 15, 23, 30, 37, 44, 51, //
    58, 59, 52, 45, 38, 31, 39, 46, //
    53, 60, 61, 54, 47, 55, 62, 63,
];

// =============================================================================
// JPEG markers (second byte after 0xFF)
// =============================================================================

/// Start of image
pub const JPEG_SOI: u8 = 0xD8;
/// End of image
pub const JPEG_EOI: u8 = 0xD9;
/// Baseline DCT frame
pub const JPEG_SOF0: u8 = 0xC0;
/// Extended sequential DCT frame
pub const JPEG_SOF1: u8 = 0xC1;
/// Progressive DCT frame
pub const JPEG_SOF2: u8 = 0xC2;
/// Define Huffman table
pub const JPEG_DHT: u8 = 0xC4;
/// Start of scan
pub const JPEG_SOS: u8 = 0xDA;
/// Define quantization table
pub const JPEG_DQT: u8 = 0xDB;
/// Define restart interval
pub const JPEG_DRI: u8 = 0xDD;
/// First restart marker (RST0..RST7 = 0xD0..0xD7)
pub const JPEG_RST0: u8 = 0xD0;
/// First application segment (APP0..APP15 = 0xE0..0xEF)
pub const JPEG_APP0: u8 = 0xE0;
/// Comment segment
pub const JPEG_COM: u8 = 0xFE;

// =============================================================================
// Annex K quantization tables (natural order)
// =============================================================================

/// Reference luminance quantization table (T.81 table K.1).
pub const STD_LUMINANCE_QUANT: [u16; DCTSIZE2] = [
    16, 11, 10, 16, 24, 40, 51, 61, //
    12, 12, 14, 19, 26, 58, 60, 55, //
    14, 13, 16, 24, 40, 57, 69, 56, //
    14, 17, 22, 29, 51, 87, 80, 62, //
    18, 22, 37, 56, 68, 109, 103, 77, //
    24, 35, 55, 64, 81, 104, 113, 92, //
    49, 64, 78, 87, 103, 121, 120, 101, //
    72, 92, 95, 98, 112, 100, 103, 99,
];

/// Reference chrominance quantization table (T.81 table K.2).
pub const STD_CHROMINANCE_QUANT: [u16; DCTSIZE2] = [
    17, 18, 24, 47, 99, 99, 99, 99, //
    18, 21, 26, 66, 99, 99, 99, 99, //
    24, 26, 56, 99, 99, 99, 99, 99, //
    47, 66, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99, //
    99, 99, 99, 99, 99, 99, 99, 99,
];

// =============================================================================
// Annex K Huffman tables
//
// `*_BITS[l]` is the number of codes of length l (index 0 unused),
// `*_VALUES` the symbols in canonical order.
// =============================================================================

/// DC luminance code-length counts (T.81 table K.3).
pub const DC_LUMINANCE_BITS: [u8; 17] =
    [0, 0, 1, 5, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0];

/// DC luminance symbols.
pub const DC_LUMINANCE_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// DC chrominance code-length counts (T.81 table K.4).
pub const DC_CHROMINANCE_BITS: [u8; 17] =
    [0, 0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0];

/// DC chrominance symbols.
pub const DC_CHROMINANCE_VALUES: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];

/// AC luminance code-length counts (T.81 table K.5).
pub const AC_LUMINANCE_BITS: [u8; 17] =
    [0, 0, 2, 1, 3, 3, 2, 4, 3, 5, 5, 4, 4, 0, 0, 1, 0x7D];

/// AC luminance symbols (162 entries).
pub const AC_LUMINANCE_VALUES: [u8; 162] = [
    0x01, 0x02, 0x03, 0x00, 0x04, 0x11, 0x05, 0x12, //
    0x21, 0x31, 0x41, 0x06, 0x13, 0x51, 0x61, 0x07, //
    0x22, 0x71, 0x14, 0x32, 0x81, 0x91, 0xA1, 0x08, //
    0x23, 0x42, 0xB1, 0xC1, 0x15, 0x52, 0xD1, 0xF0, //
    0x24, 0x33, 0x62, 0x72, 0x82, 0x09, 0x0A, 0x16, //
    0x17, 0x18, 0x19, 0x1A, 0x25, 0x26, 0x27, 0x28, //
    0x29, 0x2A, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, //
    0x3A, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, 0x49, //
    0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, 0x59, //
    0x5A, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, 0x69, //
    0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, 0x79, //
    0x7A, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89, //
    0x8A, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97, 0x98, //
    0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6, 0xA7, //
    0xA8, 0xA9, 0xAA, 0xB2, 0xB3, 0xB4, 0xB5, 0xB6, //
    0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3, 0xC4, 0xC5, //
    0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2, 0xD3, 0xD4, //
    0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, 0xE1, 0xE2, //
    0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, 0xEA, //
    0xF1, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, //
    0xF9, 0xFA,
];

/// AC chrominance code-length counts (T.81 table K.6).
pub const AC_CHROMINANCE_BITS: [u8; 17] =
    [0, 0, 2, 1, 2, 4, 4, 3, 4, 7, 5, 4, 4, 0, 1, 2, 0x77];

/// AC chrominance symbols (162 entries).
pub const AC_CHROMINANCE_VALUES: [u8; 162] = [
    0x00, 0x01, 0x02, 0x03, 0x11, 0x04, 0x05, 0x21, //
    0x31, 0x06, 0x12, 0x41, 0x51, 0x07, 0x61, 0x71, //
    0x13, 0x22, 0x32, 0x81, 0x08, 0x14, 0x42, 0x91, //
    0xA1, 0xB1, 0xC1, 0x09, 0x23, 0x33, 0x52, 0xF0, //
    0x15, 0x62, 0x72, 0xD1, 0x0A, 0x16, 0x24, 0x34, //
    0xE1, 0x25, 0xF1, 0x17, 0x18, 0x19, 0x1A, 0x26, //
    0x27, 0x28, 0x29, 0x2A, 0x35, 0x36, 0x37, 0x38, //
    0x39, 0x3A, 0x43, 0x44, 0x45, 0x46, 0x47, 0x48, //
    0x49, 0x4A, 0x53, 0x54, 0x55, 0x56, 0x57, 0x58, //
    0x59, 0x5A, 0x63, 0x64, 0x65, 0x66, 0x67, 0x68, //
    0x69, 0x6A, 0x73, 0x74, 0x75, 0x76, 0x77, 0x78, //
    0x79, 0x7A, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87, //
    0x88, 0x89, 0x8A, 0x92, 0x93, 0x94, 0x95, 0x96, //
    0x97, 0x98, 0x99, 0x9A, 0xA2, 0xA3, 0xA4, 0xA5, //
    0xA6, 0xA7, 0xA8, 0xA9, 0xAA, 0xB2, 0xB3, 0xB4, //
    0xB5, 0xB6, 0xB7, 0xB8, 0xB9, 0xBA, 0xC2, 0xC3, //
    0xC4, 0xC5, 0xC6, 0xC7, 0xC8, 0xC9, 0xCA, 0xD2, //
    0xD3, 0xD4, 0xD5, 0xD6, 0xD7, 0xD8, 0xD9, 0xDA, //
    0xE2, 0xE3, 0xE4, 0xE5, 0xE6, 0xE7, 0xE8, 0xE9, //
    0xEA, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF8, //
    0xF9, 0xFA,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zigzag_is_permutation() {
        let mut seen = [false; DCTSIZE2];
        for &i in JPEG_NATURAL_ORDER.iter() {
            assert!(!seen[i]);
            seen[i] = true;
        }
    }

    #[test]
    fn test_bits_sum_matches_values() {
        let sum: usize = AC_LUMINANCE_BITS.iter().map(|&b| b as usize).sum();
        assert_eq!(sum, AC_LUMINANCE_VALUES.len());
        let sum: usize = AC_CHROMINANCE_BITS.iter().map(|&b| b as usize).sum();
        assert_eq!(sum, AC_CHROMINANCE_VALUES.len());
        let sum: usize = DC_LUMINANCE_BITS.iter().map(|&b| b as usize).sum();
        assert_eq!(sum, DC_LUMINANCE_VALUES.len());
        let sum: usize = DC_CHROMINANCE_BITS.iter().map(|&b| b as usize).sum();
        assert_eq!(sum, DC_CHROMINANCE_VALUES.len());
    }
}
