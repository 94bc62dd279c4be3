//! Forward and inverse 8x8 DCT.
//!
//! Both directions use the Loeffler-Ligtenberg-Moschytz integer
//! butterfly (12 multiplies, 32 adds per 1-D pass) in 13-bit fixed
//! point. The forward transform's output is scaled up by a factor of 8;
//! that scale is removed during quantization (divisor = q << 3), and
//! the inverse transform folds the same factor into its final descale.
//!
//! Reference: C. Loeffler, A. Ligtenberg and G. Moschytz,
//! "Practical Fast 1-D DCT Algorithms with 11 Multiplications",
//! Proc. ICASSP 1989, pp. 988-991.

use crate::consts::{DCTSIZE, DCTSIZE2};

const CONST_BITS: i32 = 13;
const PASS1_BITS: i32 = 2;

// Fixed-point constants: FIX(x) = round(x * (1 << CONST_BITS))
const FIX_0_298631336: i32 = 2446;
const FIX_0_390180644: i32 = 3196;
const FIX_0_541196100: i32 = 4433;
const FIX_0_765366865: i32 = 6270;
const FIX_0_899976223: i32 = 7373;
const FIX_1_175875602: i32 = 9633;
const FIX_1_501321110: i32 = 12299;
const FIX_1_847759065: i32 = 15137;
const FIX_1_961570560: i32 = 16069;
const FIX_2_053119869: i32 = 16819;
const FIX_2_562915447: i32 = 20995;
const FIX_3_072711026: i32 = 25172;

/// Right-shift with rounding.
#[inline]
fn descale(x: i32, n: i32) -> i32 {
    (x + (1 << (n - 1))) >> n
}

/// Forward DCT on one 8x8 block of centered samples.
///
/// Input values are expected around 0 (pixel - 128); the output is 64
/// coefficients in row-major order, scaled up by 8.
pub fn forward_dct_8x8(samples: &[i16; DCTSIZE2], coeffs: &mut [i16; DCTSIZE2]) {
    let mut data = [0i32; DCTSIZE2];
    for i in 0..DCTSIZE2 {
        data[i] = samples[i] as i32;
    }

    // Pass 1: rows. Results scaled by sqrt(8) * 2^PASS1_BITS.
    for row in 0..DCTSIZE {
        let base = row * DCTSIZE;

        let tmp0 = data[base] + data[base + 7];
        let tmp7 = data[base] - data[base + 7];
        let tmp1 = data[base + 1] + data[base + 6];
        let tmp6 = data[base + 1] - data[base + 6];
        let tmp2 = data[base + 2] + data[base + 5];
        let tmp5 = data[base + 2] - data[base + 5];
        let tmp3 = data[base + 3] + data[base + 4];
        let tmp4 = data[base + 3] - data[base + 4];

        // Even part
        let tmp10 = tmp0 + tmp3;
        let tmp13 = tmp0 - tmp3;
        let tmp11 = tmp1 + tmp2;
        let tmp12 = tmp1 - tmp2;

        data[base] = (tmp10 + tmp11) << PASS1_BITS;
        data[base + 4] = (tmp10 - tmp11) << PASS1_BITS;

        let z1 = (tmp12 + tmp13) * FIX_0_541196100;
        data[base + 2] = descale(z1 + tmp13 * FIX_0_765366865, CONST_BITS - PASS1_BITS);
        data[base + 6] = descale(z1 - tmp12 * FIX_1_847759065, CONST_BITS - PASS1_BITS);

        // Odd part
        let z1 = tmp4 + tmp7;
        let z2 = tmp5 + tmp6;
        let z3 = tmp4 + tmp6;
        let z4 = tmp5 + tmp7;
        let z5 = (z3 + z4) * FIX_1_175875602;

        let tmp4 = tmp4 * FIX_0_298631336;
        let tmp5 = tmp5 * FIX_2_053119869;
        let tmp6 = tmp6 * FIX_3_072711026;
        let tmp7 = tmp7 * FIX_1_501321110;
        let z1 = z1 * (-FIX_0_899976223);
        let z2 = z2 * (-FIX_2_562915447);
        let z3 = z3 * (-FIX_1_961570560) + z5;
        let z4 = z4 * (-FIX_0_390180644) + z5;

        data[base + 7] = descale(tmp4 + z1 + z3, CONST_BITS - PASS1_BITS);
        data[base + 5] = descale(tmp5 + z2 + z4, CONST_BITS - PASS1_BITS);
        data[base + 3] = descale(tmp6 + z2 + z3, CONST_BITS - PASS1_BITS);
        data[base + 1] = descale(tmp7 + z1 + z4, CONST_BITS - PASS1_BITS);
    }

    // Pass 2: columns. Removes PASS1_BITS, leaves the factor of 8.
    for col in 0..DCTSIZE {
        let tmp0 = data[col] + data[DCTSIZE * 7 + col];
        let tmp7 = data[col] - data[DCTSIZE * 7 + col];
        let tmp1 = data[DCTSIZE + col] + data[DCTSIZE * 6 + col];
        let tmp6 = data[DCTSIZE + col] - data[DCTSIZE * 6 + col];
        let tmp2 = data[DCTSIZE * 2 + col] + data[DCTSIZE * 5 + col];
        let tmp5 = data[DCTSIZE * 2 + col] - data[DCTSIZE * 5 + col];
        let tmp3 = data[DCTSIZE * 3 + col] + data[DCTSIZE * 4 + col];
        let tmp4 = data[DCTSIZE * 3 + col] - data[DCTSIZE * 4 + col];

        // Even part
        let tmp10 = tmp0 + tmp3;
        let tmp13 = tmp0 - tmp3;
        let tmp11 = tmp1 + tmp2;
        let tmp12 = tmp1 - tmp2;

        data[col] = descale(tmp10 + tmp11, PASS1_BITS);
        data[DCTSIZE * 4 + col] = descale(tmp10 - tmp11, PASS1_BITS);

        let z1 = (tmp12 + tmp13) * FIX_0_541196100;
        data[DCTSIZE * 2 + col] = descale(
            z1 + tmp13 * FIX_0_765366865,
            CONST_BITS + PASS1_BITS,
        );
        data[DCTSIZE * 6 + col] = descale(
            z1 - tmp12 * FIX_1_847759065,
            CONST_BITS + PASS1_BITS,
        );

        // Odd part
        let z1 = tmp4 + tmp7;
        let z2 = tmp5 + tmp6;
        let z3 = tmp4 + tmp6;
        let z4 = tmp5 + tmp7;
        let z5 = (z3 + z4) * FIX_1_175875602;

        let tmp4 = tmp4 * FIX_0_298631336;
        let tmp5 = tmp5 * FIX_2_053119869;
        let tmp6 = tmp6 * FIX_3_072711026;
        let tmp7 = tmp7 * FIX_1_501321110;
        let z1 = z1 * (-FIX_0_899976223);
        let z2 = z2 * (-FIX_2_562915447);
        let z3 = z3 * (-FIX_1_961570560) + z5;
        let z4 = z4 * (-FIX_0_390180644) + z5;

        data[DCTSIZE * 7 + col] = descale(tmp4 + z1 + z3, CONST_BITS + PASS1_BITS);
        data[DCTSIZE * 5 + col] = descale(tmp5 + z2 + z4, CONST_BITS + PASS1_BITS);
        data[DCTSIZE * 3 + col] = descale(tmp6 + z2 + z3, CONST_BITS + PASS1_BITS);
        data[DCTSIZE + col] = descale(tmp7 + z1 + z4, CONST_BITS + PASS1_BITS);
    }

    for i in 0..DCTSIZE2 {
        coeffs[i] = data[i] as i16;
    }
}

/// Inverse DCT on one 8x8 block of dequantized coefficients.
///
/// The output samples are re-biased by +128 and clamped to 0..=255.
/// A column or row whose AC terms are all zero short-circuits to a flat
/// DC value.
pub fn inverse_dct_8x8(coeffs: &[i32; DCTSIZE2], samples: &mut [u8; DCTSIZE2]) {
    let mut ws = [0i32; DCTSIZE2];

    // Pass 1: columns into the workspace.
    for col in 0..DCTSIZE {
        let ac_all_zero = (1..DCTSIZE).all(|row| coeffs[DCTSIZE * row + col] == 0);
        if ac_all_zero {
            let dcval = coeffs[col] << PASS1_BITS;
            for row in 0..DCTSIZE {
                ws[DCTSIZE * row + col] = dcval;
            }
            continue;
        }

        // Even part
        let z2 = coeffs[DCTSIZE * 2 + col];
        let z3 = coeffs[DCTSIZE * 6 + col];
        let z1 = (z2 + z3) * FIX_0_541196100;
        let tmp2 = z1 - z3 * FIX_1_847759065;
        let tmp3 = z1 + z2 * FIX_0_765366865;

        let z2 = coeffs[col];
        let z3 = coeffs[DCTSIZE * 4 + col];
        let tmp0 = (z2 + z3) << CONST_BITS;
        let tmp1 = (z2 - z3) << CONST_BITS;

        let tmp10 = tmp0 + tmp3;
        let tmp13 = tmp0 - tmp3;
        let tmp11 = tmp1 + tmp2;
        let tmp12 = tmp1 - tmp2;

        // Odd part
        let tmp0 = coeffs[DCTSIZE * 7 + col];
        let tmp1 = coeffs[DCTSIZE * 5 + col];
        let tmp2 = coeffs[DCTSIZE * 3 + col];
        let tmp3 = coeffs[DCTSIZE + col];

        let z1 = tmp0 + tmp3;
        let z2 = tmp1 + tmp2;
        let z3 = tmp0 + tmp2;
        let z4 = tmp1 + tmp3;
        let z5 = (z3 + z4) * FIX_1_175875602;

        let tmp0 = tmp0 * FIX_0_298631336;
        let tmp1 = tmp1 * FIX_2_053119869;
        let tmp2 = tmp2 * FIX_3_072711026;
        let tmp3 = tmp3 * FIX_1_501321110;
        let z1 = z1 * (-FIX_0_899976223);
        let z2 = z2 * (-FIX_2_562915447);
        let z3 = z3 * (-FIX_1_961570560) + z5;
        let z4 = z4 * (-FIX_0_390180644) + z5;

        let tmp0 = tmp0 + z1 + z3;
        let tmp1 = tmp1 + z2 + z4;
        let tmp2 = tmp2 + z2 + z3;
        let tmp3 = tmp3 + z1 + z4;

        ws[col] = descale(tmp10 + tmp3, CONST_BITS - PASS1_BITS);
        ws[DCTSIZE * 7 + col] = descale(tmp10 - tmp3, CONST_BITS - PASS1_BITS);
        ws[DCTSIZE + col] = descale(tmp11 + tmp2, CONST_BITS - PASS1_BITS);
        ws[DCTSIZE * 6 + col] = descale(tmp11 - tmp2, CONST_BITS - PASS1_BITS);
        ws[DCTSIZE * 2 + col] = descale(tmp12 + tmp1, CONST_BITS - PASS1_BITS);
        ws[DCTSIZE * 5 + col] = descale(tmp12 - tmp1, CONST_BITS - PASS1_BITS);
        ws[DCTSIZE * 3 + col] = descale(tmp13 + tmp0, CONST_BITS - PASS1_BITS);
        ws[DCTSIZE * 4 + col] = descale(tmp13 - tmp0, CONST_BITS - PASS1_BITS);
    }

    // Pass 2: rows out of the workspace, final descale removes the
    // remaining fixed-point scale plus the factor of 8.
    for row in 0..DCTSIZE {
        let base = row * DCTSIZE;

        let ac_all_zero = (1..DCTSIZE).all(|i| ws[base + i] == 0);
        if ac_all_zero {
            let dcval = clamp_sample(descale(ws[base], PASS1_BITS + 3));
            for i in 0..DCTSIZE {
                samples[base + i] = dcval;
            }
            continue;
        }

        // Even part
        let z2 = ws[base + 2];
        let z3 = ws[base + 6];
        let z1 = (z2 + z3) * FIX_0_541196100;
        let tmp2 = z1 - z3 * FIX_1_847759065;
        let tmp3 = z1 + z2 * FIX_0_765366865;

        let tmp0 = (ws[base] + ws[base + 4]) << CONST_BITS;
        let tmp1 = (ws[base] - ws[base + 4]) << CONST_BITS;

        let tmp10 = tmp0 + tmp3;
        let tmp13 = tmp0 - tmp3;
        let tmp11 = tmp1 + tmp2;
        let tmp12 = tmp1 - tmp2;

        // Odd part
        let tmp0 = ws[base + 7];
        let tmp1 = ws[base + 5];
        let tmp2 = ws[base + 3];
        let tmp3 = ws[base + 1];

        let z1 = tmp0 + tmp3;
        let z2 = tmp1 + tmp2;
        let z3 = tmp0 + tmp2;
        let z4 = tmp1 + tmp3;
        let z5 = (z3 + z4) * FIX_1_175875602;

        let tmp0 = tmp0 * FIX_0_298631336;
        let tmp1 = tmp1 * FIX_2_053119869;
        let tmp2 = tmp2 * FIX_3_072711026;
        let tmp3 = tmp3 * FIX_1_501321110;
        let z1 = z1 * (-FIX_0_899976223);
        let z2 = z2 * (-FIX_2_562915447);
        let z3 = z3 * (-FIX_1_961570560) + z5;
        let z4 = z4 * (-FIX_0_390180644) + z5;

        let tmp0 = tmp0 + z1 + z3;
        let tmp1 = tmp1 + z2 + z4;
        let tmp2 = tmp2 + z2 + z3;
        let tmp3 = tmp3 + z1 + z4;

        let shift = CONST_BITS + PASS1_BITS + 3;
        samples[base] = clamp_sample(descale(tmp10 + tmp3, shift));
        samples[base + 7] = clamp_sample(descale(tmp10 - tmp3, shift));
        samples[base + 1] = clamp_sample(descale(tmp11 + tmp2, shift));
        samples[base + 6] = clamp_sample(descale(tmp11 - tmp2, shift));
        samples[base + 2] = clamp_sample(descale(tmp12 + tmp1, shift));
        samples[base + 5] = clamp_sample(descale(tmp12 - tmp1, shift));
        samples[base + 3] = clamp_sample(descale(tmp13 + tmp0, shift));
        samples[base + 4] = clamp_sample(descale(tmp13 - tmp0, shift));
    }
}

/// Re-bias a centered sample by +128 and clamp to 0..=255.
#[inline]
fn clamp_sample(v: i32) -> u8 {
    (v + 128).clamp(0, 255) as u8
}
