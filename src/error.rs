//! Error types for the rasterfmt codecs.

use std::fmt;
use std::io;

/// Result type for codec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for codec operations.
///
/// Variants fall into three families: stream faults (the input ended
/// early), format violations (a well-formed stream could never contain
/// this), and entropy-decode faults (the compressed payload is corrupt).
/// All are fatal for the current decode; no partial image is returned.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The input stream ended before the decoder was satisfied.
    UnexpectedEof,
    /// A 0xFF byte inside JPEG entropy data was not followed by the
    /// mandatory 0x00 stuffing byte.
    MissingStuffingByte {
        /// The byte that followed 0xFF instead of 0x00
        found: u8,
    },
    /// The file does not start with a recognized signature.
    BadSignature,
    /// A segment or section declared an impossible length.
    BadSegmentLength {
        /// Marker or introducer byte of the offending segment
        marker: u8,
        /// Declared length
        length: u16,
    },
    /// A marker appeared where the format forbids it.
    UnexpectedMarker(u8),
    /// Start-of-scan seen before any frame header.
    ScanBeforeFrame,
    /// Sample precision other than 8 bits.
    UnsupportedPrecision(u8),
    /// Two frame components share one identifier.
    DuplicateComponent(u8),
    /// A scan referenced a component id absent from the frame header.
    UnknownComponent(u8),
    /// Sampling factors outside 1..=4, or equal to 3.
    UnsupportedSampling {
        /// Horizontal sampling factor
        h: u8,
        /// Vertical sampling factor
        v: u8,
    },
    /// Quantization or Huffman table slot outside 0..=3.
    BadTableIndex(u8),
    /// A scan referenced a table slot that was never defined.
    MissingTable {
        /// Table slot
        index: u8,
        /// True for Huffman tables, false for quantization tables
        huffman: bool,
    },
    /// A restart marker was absent or out of sequence.
    BadRestartMarker {
        /// Marker number the decoder expected (0-7)
        expected: u8,
        /// Byte actually found after 0xFF
        found: u8,
    },
    /// A Huffman table carried more than 256 codes, or its code lengths
    /// overflow the canonical assignment.
    InvalidHuffmanTable,
    /// No code matched across all 16 lengths.
    BadHuffmanCode,
    /// Invalid progressive scan parameters (Ss/Se/Ah/Al).
    InvalidScanSpec {
        /// Reason for the invalid specification
        reason: &'static str,
    },
    /// An LZW code referenced a dictionary slot that has not been
    /// populated yet.
    BadLzwCode(u16),
    /// GIF minimum code size outside the representable range.
    BadLzwMinCodeSize(u8),
    /// A GIF image used palette lookups with no local or global table.
    MissingColorTable,
    /// A decoded index fell outside the active color table.
    BadColorIndex(u8),
    /// An image descriptor does not fit inside the logical screen.
    FrameOutOfBounds,
    /// Invalid image dimensions (zero width or height).
    InvalidDimensions {
        /// Image width
        width: u32,
        /// Image height
        height: u32,
    },
    /// Pixel buffer size doesn't match dimensions.
    BufferSizeMismatch {
        /// Expected buffer size in bytes
        expected: usize,
        /// Actual buffer size in bytes
        actual: usize,
    },
    /// Invalid quality value (must be 1-100).
    InvalidQuality(u8),
    /// Invalid palette size request (must be 2-256).
    InvalidPaletteSize(u16),
    /// Animation with no frames.
    EmptyAnimation,
    /// I/O error from the underlying stream.
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnexpectedEof => write!(f, "Unexpected end of stream"),
            Error::MissingStuffingByte { found } => {
                write!(
                    f,
                    "0xFF in entropy data followed by 0x{:02X} instead of stuffing byte 0x00",
                    found
                )
            }
            Error::BadSignature => write!(f, "Unrecognized file signature"),
            Error::BadSegmentLength { marker, length } => {
                write!(f, "Segment 0x{:02X} declares bad length {}", marker, length)
            }
            Error::UnexpectedMarker(m) => write!(f, "Unexpected marker 0x{:02X}", m),
            Error::ScanBeforeFrame => write!(f, "SOS segment before SOF"),
            Error::UnsupportedPrecision(p) => {
                write!(f, "Unsupported sample precision: {} bits (only 8 supported)", p)
            }
            Error::DuplicateComponent(id) => write!(f, "Duplicate component id {}", id),
            Error::UnknownComponent(id) => write!(f, "Scan references unknown component id {}", id),
            Error::UnsupportedSampling { h, v } => {
                write!(f, "Unsupported sampling factors: {}x{}", h, v)
            }
            Error::BadTableIndex(idx) => write!(f, "Table index {} out of range", idx),
            Error::MissingTable { index, huffman } => {
                let kind = if *huffman { "Huffman" } else { "quantization" };
                write!(f, "Scan uses undefined {} table {}", kind, index)
            }
            Error::BadRestartMarker { expected, found } => {
                write!(
                    f,
                    "Expected restart marker 0xFFD{}, found 0xFF{:02X}",
                    expected, found
                )
            }
            Error::InvalidHuffmanTable => write!(f, "Invalid Huffman table definition"),
            Error::BadHuffmanCode => write!(f, "No Huffman code matched in 16 bit-lengths"),
            Error::InvalidScanSpec { reason } => write!(f, "Invalid scan parameters: {}", reason),
            Error::BadLzwCode(code) => {
                write!(f, "LZW code {} references an uninitialized slot", code)
            }
            Error::BadLzwMinCodeSize(n) => write!(f, "Invalid LZW minimum code size {}", n),
            Error::MissingColorTable => write!(f, "Image has neither local nor global color table"),
            Error::BadColorIndex(idx) => write!(f, "Pixel index {} outside color table", idx),
            Error::FrameOutOfBounds => {
                write!(f, "Image descriptor exceeds the logical screen bounds")
            }
            Error::InvalidDimensions { width, height } => {
                write!(f, "Invalid image dimensions: {}x{}", width, height)
            }
            Error::BufferSizeMismatch { expected, actual } => {
                write!(f, "Buffer size mismatch: expected {}, got {}", expected, actual)
            }
            Error::InvalidQuality(q) => {
                write!(f, "Invalid quality value: {} (must be 1-100)", q)
            }
            Error::InvalidPaletteSize(n) => {
                write!(f, "Invalid palette size: {} (must be 2-256)", n)
            }
            Error::EmptyAnimation => write!(f, "Animation contains no frames"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = Error::UnsupportedSampling { h: 3, v: 1 };
        assert!(err.to_string().contains("3x1"));

        let err = Error::BadRestartMarker {
            expected: 2,
            found: 0xD5,
        };
        assert!(err.to_string().contains("0xFFD2"));
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::Other, "boom");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
