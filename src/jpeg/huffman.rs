//! Canonical Huffman tables for JPEG entropy coding.
//!
//! A table arrives as 16 code-length counts plus the symbol values in
//! canonical order (the DHT payload). Codes are assigned per T.81
//! Annex C: increasing length, increasing value, so equal-length codes
//! are consecutive integers and no short code prefixes a longer one.
//!
//! Decoding uses a 256-entry fast table indexed by the next 8 buffered
//! bits, falling back to the min/max-code walk for longer codes.

use crate::error::{Error, Result};
use crate::jpeg::bitread::BitReader;

/// Maximum number of symbols in one table.
pub const MAX_HUFF_SYMBOLS: usize = 256;

/// A Huffman table as carried in a DHT segment.
#[derive(Clone)]
pub struct HuffSpec {
    /// bits[l] = number of codes of length l (index 0 unused)
    pub bits: [u8; 17],
    /// Symbol values in canonical order
    pub huffval: [u8; MAX_HUFF_SYMBOLS],
}

impl Default for HuffSpec {
    fn default() -> Self {
        Self {
            bits: [0; 17],
            huffval: [0; MAX_HUFF_SYMBOLS],
        }
    }
}

impl HuffSpec {
    /// Build a spec from length counts and symbol values.
    pub fn new(bits: [u8; 17], values: &[u8]) -> Result<Self> {
        let total: usize = bits[1..=16].iter().map(|&b| b as usize).sum();
        if total > MAX_HUFF_SYMBOLS || total != values.len() {
            return Err(Error::InvalidHuffmanTable);
        }
        let mut huffval = [0u8; MAX_HUFF_SYMBOLS];
        huffval[..values.len()].copy_from_slice(values);
        Ok(Self { bits, huffval })
    }

    /// Total number of symbols defined by this spec.
    pub fn num_symbols(&self) -> usize {
        self.bits[1..=16].iter().map(|&b| b as usize).sum()
    }

    /// Assign canonical (code, size) pairs in symbol-definition order.
    ///
    /// Returns `huffsize`/`huffcode` parallel to `huffval`, or an error
    /// if the lengths overflow the code space.
    fn assign_codes(&self) -> Result<(Vec<u8>, Vec<u32>)> {
        let mut sizes = Vec::with_capacity(self.num_symbols());
        for l in 1..=16u8 {
            for _ in 0..self.bits[l as usize] {
                sizes.push(l);
            }
        }

        let mut codes = Vec::with_capacity(sizes.len());
        let mut code = 0u32;
        let mut prev_size = sizes.first().copied().unwrap_or(0);
        for &size in &sizes {
            code <<= size - prev_size;
            prev_size = size;
            if code >= (1u32 << size) {
                return Err(Error::InvalidHuffmanTable);
            }
            codes.push(code);
            code += 1;
        }
        Ok((sizes, codes))
    }
}

/// Number of bits resolved per fast-table entry is packed in the high
/// byte; the symbol in the low byte. Zero means "unresolved in <= 8 bits".
type FastEntry = u16;

/// Derived decoding tables for one Huffman table.
pub struct HuffDecoder {
    /// Smallest code of each length (index by length 1..=16)
    min_code: [i32; 17],
    /// Largest code of each length, -1 if the length is unused
    max_code: [i32; 17],
    /// Index into `huffval` of the first symbol of each length
    val_ptr: [usize; 17],
    /// Symbol values in canonical order
    huffval: [u8; MAX_HUFF_SYMBOLS],
    /// Fast lookup keyed by the next 8 bits, left-aligned
    lookup: [FastEntry; 256],
}

impl HuffDecoder {
    /// Derive decoding tables from a table spec.
    pub fn from_spec(spec: &HuffSpec) -> Result<Self> {
        let (sizes, codes) = spec.assign_codes()?;

        let mut min_code = [0i32; 17];
        let mut max_code = [-1i32; 17];
        let mut val_ptr = [0usize; 17];

        let mut k = 0usize;
        for l in 1..=16usize {
            let count = spec.bits[l] as usize;
            if count > 0 {
                val_ptr[l] = k;
                min_code[l] = codes[k] as i32;
                max_code[l] = codes[k + count - 1] as i32;
                k += count;
            }
        }

        let mut lookup = [0 as FastEntry; 256];
        for (i, (&size, &code)) in sizes.iter().zip(codes.iter()).enumerate() {
            if size <= 8 {
                let prefix = (code << (8 - size)) as usize;
                for suffix in 0..(1usize << (8 - size)) {
                    lookup[prefix | suffix] = ((size as u16) << 8) | spec.huffval[i] as u16;
                }
            }
        }

        Ok(Self {
            min_code,
            max_code,
            val_ptr,
            huffval: spec.huffval,
            lookup,
        })
    }

    /// Decode one symbol from the bit reader.
    #[inline]
    pub fn decode(&self, reader: &mut BitReader<'_>) -> Result<u8> {
        let (prefix, avail) = reader.peek_prefix();
        let entry = self.lookup[prefix as usize];
        if entry != 0 {
            let size = (entry >> 8) as u32;
            if size <= avail {
                reader.consume_bits(size);
                return Ok(entry as u8);
            }
        }
        self.decode_slow(reader)
    }

    /// Walk lengths 1..=16 comparing against max_code per length.
    fn decode_slow(&self, reader: &mut BitReader<'_>) -> Result<u8> {
        let mut code = 0i32;
        for l in 1..=16usize {
            code = (code << 1) | reader.read_bit()? as i32;
            if code <= self.max_code[l] {
                let idx = self.val_ptr[l] + (code - self.min_code[l]) as usize;
                return Ok(self.huffval[idx]);
            }
        }
        Err(Error::BadHuffmanCode)
    }
}

/// Derived encoding tables: per-symbol code and bit-length.
pub struct HuffEncoder {
    codes: [u32; MAX_HUFF_SYMBOLS],
    sizes: [u8; MAX_HUFF_SYMBOLS],
}

impl HuffEncoder {
    /// Derive encoding tables from a table spec.
    pub fn from_spec(spec: &HuffSpec) -> Result<Self> {
        let (huffsizes, huffcodes) = spec.assign_codes()?;

        let mut codes = [0u32; MAX_HUFF_SYMBOLS];
        let mut sizes = [0u8; MAX_HUFF_SYMBOLS];
        for (i, (&size, &code)) in huffsizes.iter().zip(huffcodes.iter()).enumerate() {
            let symbol = spec.huffval[i] as usize;
            if sizes[symbol] != 0 {
                // Same symbol defined twice
                return Err(Error::InvalidHuffmanTable);
            }
            codes[symbol] = code;
            sizes[symbol] = size;
        }
        Ok(Self { codes, sizes })
    }

    /// (code, size) for a symbol; size 0 means the symbol has no code.
    #[inline]
    pub fn get_code(&self, symbol: u8) -> (u32, u8) {
        (self.codes[symbol as usize], self.sizes[symbol as usize])
    }
}
