//! LZW codec for GIF image data.
//!
//! Variable-width codes from `min_code_size + 1` up to 12 bits, packed
//! LSB-first. The dictionary holds at most 4096 entries; streams that
//! keep going without a Clear code once the table is full (deferred
//! clear) are accepted on decode.
//!
//! Reference: GIF89a specification, Appendix F.

use std::collections::HashMap;

use crate::error::{Error, Result};

const MAX_CODE_BITS: u32 = 12;
const TABLE_SIZE: usize = 1 << MAX_CODE_BITS;

/// LSB-first bit unpacker over the concatenated image sub-blocks.
struct CodeReader<'a> {
    data: &'a [u8],
    pos: usize,
    acc: u32,
    nbits: u32,
}

impl<'a> CodeReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        CodeReader {
            data,
            pos: 0,
            acc: 0,
            nbits: 0,
        }
    }

    fn read_code(&mut self, width: u32) -> Result<u16> {
        while self.nbits < width {
            if self.pos >= self.data.len() {
                return Err(Error::UnexpectedEof);
            }
            self.acc |= (self.data[self.pos] as u32) << self.nbits;
            self.pos += 1;
            self.nbits += 8;
        }
        let code = (self.acc & ((1 << width) - 1)) as u16;
        self.acc >>= width;
        self.nbits -= width;
        Ok(code)
    }
}

/// LSB-first bit packer.
struct CodeWriter {
    out: Vec<u8>,
    acc: u32,
    nbits: u32,
}

impl CodeWriter {
    fn new() -> Self {
        CodeWriter {
            out: Vec::new(),
            acc: 0,
            nbits: 0,
        }
    }

    fn write_code(&mut self, code: u16, width: u32) {
        self.acc |= (code as u32) << self.nbits;
        self.nbits += width;
        while self.nbits >= 8 {
            self.out.push((self.acc & 0xFF) as u8);
            self.acc >>= 8;
            self.nbits -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.nbits > 0 {
            self.out.push((self.acc & 0xFF) as u8);
        }
        self.out
    }
}

/// Decode `pixel_count` palette indices from concatenated sub-block
/// payloads.
pub fn decode(min_code_size: u8, data: &[u8], pixel_count: usize) -> Result<Vec<u8>> {
    if !(2..=8).contains(&min_code_size) {
        return Err(Error::BadLzwMinCodeSize(min_code_size));
    }
    let clear = 1u16 << min_code_size;
    let end = clear + 1;

    let mut prefix = [0u16; TABLE_SIZE];
    let mut suffix = [0u8; TABLE_SIZE];
    let mut first = [0u8; TABLE_SIZE];
    for c in 0..clear {
        suffix[c as usize] = c as u8;
        first[c as usize] = c as u8;
    }

    let mut width = min_code_size as u32 + 1;
    let mut next = (end + 1) as usize;
    let mut prev: Option<u16> = None;

    let mut reader = CodeReader::new(data);
    let mut out = Vec::with_capacity(pixel_count);
    // Scratch for reversing a dictionary chain.
    let mut stack = Vec::with_capacity(TABLE_SIZE);

    while out.len() < pixel_count {
        let code = reader.read_code(width)?;

        if code == clear {
            width = min_code_size as u32 + 1;
            next = (end + 1) as usize;
            prev = None;
            continue;
        }
        if code == end {
            break;
        }

        let prev_code = match prev {
            None => {
                if code >= clear {
                    return Err(Error::BadLzwCode(code));
                }
                out.push(code as u8);
                prev = Some(code);
                continue;
            }
            Some(p) => p,
        };

        // The only legal not-yet-defined code is the next free slot
        // (the KwKwK case).
        let first_byte = if (code as usize) < next {
            emit_sequence(code, &prefix, &suffix, clear, &mut stack, &mut out)?;
            first[code as usize]
        } else if code as usize == next && next < TABLE_SIZE {
            let k = first[prev_code as usize];
            emit_sequence(prev_code, &prefix, &suffix, clear, &mut stack, &mut out)?;
            out.push(k);
            k
        } else {
            return Err(Error::BadLzwCode(code));
        };

        if next < TABLE_SIZE {
            prefix[next] = prev_code;
            suffix[next] = first_byte;
            first[next] = first[prev_code as usize];
            next += 1;
            if next == (1 << width) && width < MAX_CODE_BITS {
                width += 1;
            }
        }
        prev = Some(code);
    }

    out.truncate(pixel_count);
    Ok(out)
}

/// Append the byte sequence for `code` to `out` by walking the prefix
/// chain.
fn emit_sequence(
    code: u16,
    prefix: &[u16; TABLE_SIZE],
    suffix: &[u8; TABLE_SIZE],
    clear: u16,
    stack: &mut Vec<u8>,
    out: &mut Vec<u8>,
) -> Result<()> {
    stack.clear();
    let mut c = code;
    while c >= clear {
        stack.push(suffix[c as usize]);
        c = prefix[c as usize];
        if stack.len() > TABLE_SIZE {
            return Err(Error::BadLzwCode(code));
        }
    }
    out.push(c as u8);
    while let Some(b) = stack.pop() {
        out.push(b);
    }
    Ok(())
}

/// Encode palette indices into an unframed LZW code stream.
///
/// Emits a Clear code first; the dictionary is rebuilt with another
/// Clear whenever it would exceed 4096 entries, and the stream ends
/// with the End code.
pub fn encode(min_code_size: u8, pixels: &[u8]) -> Result<Vec<u8>> {
    if !(2..=8).contains(&min_code_size) {
        return Err(Error::BadLzwMinCodeSize(min_code_size));
    }
    let clear = 1u16 << min_code_size;
    let end = clear + 1;

    let mut width = min_code_size as u32 + 1;
    let mut next = end + 1;
    let mut dict: HashMap<(u16, u8), u16> = HashMap::new();

    let mut writer = CodeWriter::new();
    writer.write_code(clear, width);

    let mut prev: Option<u16> = None;
    for &p in pixels {
        if (p as u16) >= clear {
            return Err(Error::BadColorIndex(p));
        }
        let pr = match prev {
            None => {
                prev = Some(p as u16);
                continue;
            }
            Some(pr) => pr,
        };

        if let Some(&c) = dict.get(&(pr, p)) {
            prev = Some(c);
            continue;
        }

        writer.write_code(pr, width);
        if next as usize == TABLE_SIZE {
            writer.write_code(clear, width);
            dict.clear();
            next = end + 1;
            width = min_code_size as u32 + 1;
        } else {
            dict.insert((pr, p), next);
            next += 1;
            // The decoder's table runs one insert behind.
            if next as usize == (1 << width) + 1 && width < MAX_CODE_BITS {
                width += 1;
            }
        }
        prev = Some(p as u16);
    }

    if let Some(pr) = prev {
        writer.write_code(pr, width);
    }
    writer.write_code(end, width);
    Ok(writer.finish())
}

/// Split raw code bytes into <=255-byte sub-blocks with a zero-length
/// terminator.
pub fn frame_sub_blocks(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 255 + 2);
    for chunk in data.chunks(255) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out.push(0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_roundtrip_simple() {
        let pixels = [0u8, 1, 2, 3, 2, 1, 0, 0, 1, 1, 2, 2];
        let encoded = encode(2, &pixels).unwrap();
        let decoded = decode(2, &encoded, pixels.len()).unwrap();
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn test_roundtrip_single_run_kwkwk() {
        // A run of one symbol exercises the code == next case on the
        // second code.
        let pixels = [5u8; 100];
        let encoded = encode(4, &pixels).unwrap();
        let decoded = decode(4, &encoded, pixels.len()).unwrap();
        assert_eq!(decoded, pixels.as_slice());
    }

    #[test]
    fn test_roundtrip_empty() {
        let encoded = encode(2, &[]).unwrap();
        let decoded = decode(2, &encoded, 0).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_roundtrip_with_dictionary_reset() {
        // Enough random 8-bit data to overflow the 4096-entry table and
        // force a mid-stream Clear code.
        let mut rng = SmallRng::seed_from_u64(17);
        let pixels: Vec<u8> = (0..20_000).map(|_| rng.gen()).collect();
        let encoded = encode(8, &pixels).unwrap();
        let decoded = decode(8, &encoded, pixels.len()).unwrap();
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn test_roundtrip_repetitive_long() {
        let pixels: Vec<u8> = (0..50_000u32).map(|i| ((i / 7) % 16) as u8).collect();
        let encoded = encode(4, &pixels).unwrap();
        assert!(encoded.len() < pixels.len() / 2, "no compression achieved");
        let decoded = decode(4, &encoded, pixels.len()).unwrap();
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn test_bad_min_code_size() {
        assert!(matches!(encode(1, &[0]), Err(Error::BadLzwMinCodeSize(1))));
        assert!(matches!(encode(9, &[0]), Err(Error::BadLzwMinCodeSize(9))));
        assert!(matches!(
            decode(0, &[0], 1),
            Err(Error::BadLzwMinCodeSize(0))
        ));
    }

    #[test]
    fn test_pixel_out_of_alphabet() {
        assert!(matches!(encode(2, &[4]), Err(Error::BadColorIndex(4))));
    }

    #[test]
    fn test_unpopulated_code_rejected() {
        // min size 2: clear=4, end=5, next free slot=6. The code 7
        // references a slot that can never be populated yet.
        // Codes 1 then 7 packed LSB-first at 3 bits: 0b00_111_001.
        let data = [0b0011_1001u8];
        assert!(matches!(decode(2, &data, 10), Err(Error::BadLzwCode(7))));
    }

    #[test]
    fn test_deferred_clear_stream() {
        // A stream of literal codes only, never clearing: once the
        // table fills the decoder must hold width at 12 bits and keep
        // going.
        let mcs = 8u8;
        let clear = 1u16 << mcs;
        let pixels: Vec<u8> = (0..6000u32).map(|i| (i % 251) as u8).collect();

        let mut writer = CodeWriter::new();
        let mut width = mcs as u32 + 1;
        let mut next = (clear + 2) as usize;
        writer.write_code(clear, width);
        for (i, &p) in pixels.iter().enumerate() {
            writer.write_code(p as u16, width);
            // Mirror the decoder's insert-and-grow rule (no insert after
            // the first code, none once the table is full).
            if i > 0 && next < TABLE_SIZE {
                next += 1;
                if next == (1 << width) && width < MAX_CODE_BITS {
                    width += 1;
                }
            }
        }
        writer.write_code(clear + 1, width);
        let data = writer.finish();

        let decoded = decode(mcs, &data, pixels.len()).unwrap();
        assert_eq!(decoded, pixels);
    }

    #[test]
    fn test_frame_sub_blocks() {
        let data = vec![7u8; 300];
        let framed = frame_sub_blocks(&data);
        assert_eq!(framed[0], 255);
        assert_eq!(framed[256], 45);
        assert_eq!(*framed.last().unwrap(), 0);
        assert_eq!(framed.len(), 300 + 2 + 1);
    }
}
