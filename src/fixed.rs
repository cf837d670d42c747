//! Fixed-point pixel arithmetic shared by the pyramid code and the seam cost.
//!
//! Pyramid bands hold signed integers with a fixed number of fraction bits so
//! that reduce, expand and collapse are exact and reproducible. The closed set
//! of band pixel types is `i32` (one channel) and `[i32; 3]` (RGB).

use std::fmt::Debug;

/// Fraction bits of blend weights.
pub const MASK_FRACTION_BITS: u32 = 16;
/// Weight meaning "this image only".
pub const MASK_ONE: i32 = 1 << MASK_FRACTION_BITS;

/// Bit layout of a signed fixed-point value stored in an `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPoint {
    /// Bits for sign, integer part and headroom for band differences.
    pub integer_bits: u32,
    pub fraction_bits: u32,
}

impl FixedPoint {
    pub const fn new(integer_bits: u32, fraction_bits: u32) -> Self {
        assert!(
            integer_bits + fraction_bits <= 31,
            "fixed-point layout does not fit in i32"
        );
        Self {
            integer_bits,
            fraction_bits,
        }
    }

    /// Promote a native channel value.
    #[inline]
    pub fn from_native(self, value: u32) -> i32 {
        (value as i32) << self.fraction_bits
    }

    /// Round back to a native channel value in `0..=max`.
    #[inline]
    pub fn to_native(self, value: i32, max: u32) -> u32 {
        let rounded = div_round(value as i64, 1i64 << self.fraction_bits);
        rounded.clamp(0, max as i64) as u32
    }
}

/// Bits per channel of the source images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelDepth {
    U8,
    U16,
}

impl ChannelDepth {
    pub const fn bits(self) -> u32 {
        match self {
            ChannelDepth::U8 => 8,
            ChannelDepth::U16 => 16,
        }
    }

    pub const fn max(self) -> u32 {
        (1 << self.bits()) - 1
    }

    /// Fixed-point layout of image bands built from this depth.
    pub const fn fixed(self) -> FixedPoint {
        match self {
            ChannelDepth::U8 => U8_LAYOUT,
            ChannelDepth::U16 => U16_LAYOUT,
        }
    }

    /// Right shift that maps a band value onto an 8-bit scale.
    pub const fn eight_bit_shift(self) -> u32 {
        self.fixed().fraction_bits + self.bits() - 8
    }
}

const U8_LAYOUT: FixedPoint = FixedPoint::new(10, 8);
const U16_LAYOUT: FixedPoint = FixedPoint::new(18, 8);
const _: () = assert!(MASK_FRACTION_BITS + 2 <= 31);

/// Integer division rounding half away from zero. `den` must be positive.
#[inline]
pub fn div_round(num: i64, den: i64) -> i64 {
    if num >= 0 {
        (num + den / 2) / den
    } else {
        -((-num + den / 2) / den)
    }
}

/// Arithmetic needed by pyramids and seam costs for one band pixel type.
pub trait PyramidPixel: Copy + Default + PartialEq + Debug + Send + Sync + 'static {
    /// Accumulator type wide enough for weighted sums.
    type Wide: Copy + Default + Send + Sync;

    fn promote(self) -> Self::Wide;
    fn wide_add(a: Self::Wide, b: Self::Wide) -> Self::Wide;
    fn wide_scale(a: Self::Wide, k: i64) -> Self::Wide;
    /// Divide an accumulator by a positive weight sum, rounding.
    fn demote(a: Self::Wide, den: i64) -> Self;

    fn plus(self, other: Self) -> Self;
    fn minus(self, other: Self) -> Self;
    /// Multiply by a blend weight with `MASK_FRACTION_BITS` fraction bits.
    fn weighted(self, weight: i32) -> Self;
    fn clamp_to(self, lo: i32, hi: i32) -> Self;

    /// Dissimilarity of two pixels on a 0..=255 scale.
    fn mismatch(self, other: Self, shift: u32) -> u8;
    /// Single-channel brightness, for previews.
    fn brightness(self) -> i64;
}

impl PyramidPixel for i32 {
    type Wide = i64;

    #[inline]
    fn promote(self) -> i64 {
        self as i64
    }

    #[inline]
    fn wide_add(a: i64, b: i64) -> i64 {
        a + b
    }

    #[inline]
    fn wide_scale(a: i64, k: i64) -> i64 {
        a * k
    }

    #[inline]
    fn demote(a: i64, den: i64) -> i32 {
        div_round(a, den) as i32
    }

    #[inline]
    fn plus(self, other: i32) -> i32 {
        self + other
    }

    #[inline]
    fn minus(self, other: i32) -> i32 {
        self - other
    }

    #[inline]
    fn weighted(self, weight: i32) -> i32 {
        div_round(self as i64 * weight as i64, MASK_ONE as i64) as i32
    }

    #[inline]
    fn clamp_to(self, lo: i32, hi: i32) -> i32 {
        self.max(lo).min(hi)
    }

    fn mismatch(self, other: i32, shift: u32) -> u8 {
        ((self - other).unsigned_abs() >> shift).min(255) as u8
    }

    fn brightness(self) -> i64 {
        self as i64
    }
}

impl PyramidPixel for [i32; 3] {
    type Wide = [i64; 3];

    #[inline]
    fn promote(self) -> [i64; 3] {
        self.map(|c| c as i64)
    }

    #[inline]
    fn wide_add(a: [i64; 3], b: [i64; 3]) -> [i64; 3] {
        [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
    }

    #[inline]
    fn wide_scale(a: [i64; 3], k: i64) -> [i64; 3] {
        a.map(|c| c * k)
    }

    #[inline]
    fn demote(a: [i64; 3], den: i64) -> [i32; 3] {
        a.map(|c| div_round(c, den) as i32)
    }

    #[inline]
    fn plus(self, other: [i32; 3]) -> [i32; 3] {
        [self[0] + other[0], self[1] + other[1], self[2] + other[2]]
    }

    #[inline]
    fn minus(self, other: [i32; 3]) -> [i32; 3] {
        [self[0] - other[0], self[1] - other[1], self[2] - other[2]]
    }

    #[inline]
    fn weighted(self, weight: i32) -> [i32; 3] {
        self.map(|c| c.weighted(weight))
    }

    #[inline]
    fn clamp_to(self, lo: i32, hi: i32) -> [i32; 3] {
        self.map(|c| c.clamp_to(lo, hi))
    }

    /// The larger of the luminance and hue differences.
    fn mismatch(self, other: [i32; 3], shift: u32) -> u8 {
        let a = to_rgb8(self, shift);
        let b = to_rgb8(other, shift);
        let luma = (luminance(a) - luminance(b)).abs();
        let hue_diff = {
            let d = (hue(a) - hue(b)).abs();
            d.min(256.0 - d)
        };
        luma.max(hue_diff).round().clamp(0.0, 255.0) as u8
    }

    fn brightness(self) -> i64 {
        (self[0] as i64 * 299 + self[1] as i64 * 587 + self[2] as i64 * 114) / 1000
    }
}

fn to_rgb8(px: [i32; 3], shift: u32) -> [f32; 3] {
    px.map(|c| (c.max(0) >> shift).min(255) as f32)
}

fn luminance([r, g, b]: [f32; 3]) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// HSV hue mapped onto `0.0..256.0`; grays have hue 0.
fn hue([r, g, b]: [f32; 3]) -> f32 {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let chroma = max - min;
    if chroma == 0.0 {
        return 0.0;
    }
    let sector = if max == r {
        ((g - b) / chroma).rem_euclid(6.0)
    } else if max == g {
        (b - r) / chroma + 2.0
    } else {
        (r - g) / chroma + 4.0
    };
    sector * 256.0 / 6.0
}
