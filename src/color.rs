//! Color space conversion routines.
//!
//! Explicit, named conversion functions per color-space pair. JPEG uses
//! the CCIR 601-1 (BT.601) YCbCr definition; the conversions use
//! fixed-point arithmetic:
//!
//! ```text
//! Y  =  0.29900 * R + 0.58700 * G + 0.11400 * B
//! Cb = -0.16874 * R - 0.33126 * G + 0.50000 * B + 128
//! Cr =  0.50000 * R - 0.41869 * G - 0.08131 * B + 128
//! ```

/// Fixed-point precision bits (16 bits gives ~4 decimal digits precision)
const SCALEBITS: i32 = 16;

/// Half unit for rounding during right shift
const ONE_HALF: i32 = 1 << (SCALEBITS - 1);

/// Center value for Cb/Cr (added after the shift)
const CBCR_CENTER: i32 = 128;

/// Fixed-point constant: FIX(x) = round(x * 2^SCALEBITS)
const fn fix(x: f64) -> i32 {
    (x * ((1i64 << SCALEBITS) as f64) + 0.5) as i32
}

const FIX_0_29900: i32 = fix(0.29900); // Y coefficient for R
const FIX_0_58700: i32 = fix(0.58700); // Y coefficient for G
const FIX_0_11400: i32 = fix(0.11400); // Y coefficient for B
const FIX_0_16874: i32 = fix(0.16874); // Cb coefficient for R (negated)
const FIX_0_33126: i32 = fix(0.33126); // Cb coefficient for G (negated)
const FIX_0_50000: i32 = fix(0.50000); // Cb coefficient for B, Cr coefficient for R
const FIX_0_41869: i32 = fix(0.41869); // Cr coefficient for G (negated)
const FIX_0_08131: i32 = fix(0.08131); // Cr coefficient for B (negated)

const FIX_1_40200: i32 = fix(1.40200); // R coefficient for Cr
const FIX_0_34414: i32 = fix(0.34414); // G coefficient for Cb (negated)
const FIX_0_71414: i32 = fix(0.71414); // G coefficient for Cr (negated)
const FIX_1_77200: i32 = fix(1.77200); // B coefficient for Cb

/// Convert a single RGB pixel to YCbCr.
#[inline]
pub fn rgb_to_ycbcr(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = r as i32;
    let g = g as i32;
    let b = b as i32;

    let y = (FIX_0_29900 * r + FIX_0_58700 * g + FIX_0_11400 * b + ONE_HALF) >> SCALEBITS;
    let cb = ((-FIX_0_16874 * r - FIX_0_33126 * g + FIX_0_50000 * b + ONE_HALF) >> SCALEBITS)
        + CBCR_CENTER;
    let cr = ((FIX_0_50000 * r - FIX_0_41869 * g - FIX_0_08131 * b + ONE_HALF) >> SCALEBITS)
        + CBCR_CENTER;

    (
        y.clamp(0, 255) as u8,
        cb.clamp(0, 255) as u8,
        cr.clamp(0, 255) as u8,
    )
}

/// Convert a single YCbCr pixel back to RGB.
#[inline]
pub fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = (y as i32) << SCALEBITS;
    let cb = cb as i32 - CBCR_CENTER;
    let cr = cr as i32 - CBCR_CENTER;

    let r = (y + FIX_1_40200 * cr + ONE_HALF) >> SCALEBITS;
    let g = (y - FIX_0_34414 * cb - FIX_0_71414 * cr + ONE_HALF) >> SCALEBITS;
    let b = (y + FIX_1_77200 * cb + ONE_HALF) >> SCALEBITS;

    (
        r.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        b.clamp(0, 255) as u8,
    )
}

/// Convert a single RGB pixel to grayscale (Y component only).
#[inline]
pub fn rgb_to_gray(r: u8, g: u8, b: u8) -> u8 {
    let r = r as i32;
    let g = g as i32;
    let b = b as i32;

    ((FIX_0_29900 * r + FIX_0_58700 * g + FIX_0_11400 * b + ONE_HALF) >> SCALEBITS) as u8
}
