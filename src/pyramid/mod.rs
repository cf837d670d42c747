//! Gaussian and Laplacian pyramids over fixed-point bands.
//!
//! Band 0 is full resolution and every later band halves both sides, rounding
//! up. Pixels outside the supplied coverage are extrapolated from the band
//! above (push-pull), so Laplacian detail outside a footprint is zero.

pub mod compose;
pub mod kernel;

use image::{GrayImage, Luma};
use log::{debug, warn};

use crate::error::BlendResult;
use crate::executor::RowExecutor;
use crate::fixed::{ChannelDepth, PyramidPixel, div_round};
use crate::plane::Plane;

use self::kernel::{expand, reduce, reduced_size};

/// Deepest pyramid ever built.
pub const MAX_LEVELS: usize = 29;
/// Smallest side a reduced band may have.
pub const MIN_BAND_SIZE: usize = 8;

/// Number of bands a `width` x `height` canvas supports.
///
/// Halving continues while both halved sides stay at least [`MIN_BAND_SIZE`].
/// With `wrap` the width must also be even, so the seam across the edge stays
/// aligned at every level.
pub fn max_levels(width: usize, height: usize, wrap: bool) -> usize {
    let (mut w, mut h) = (width, height);
    let mut levels = 1;
    while levels < MAX_LEVELS {
        let (nw, nh) = reduced_size(w, h);
        if nw < MIN_BAND_SIZE || nh < MIN_BAND_SIZE || (wrap && w % 2 != 0) {
            break;
        }
        (w, h) = (nw, nh);
        levels += 1;
    }
    levels
}

/// Resolve the number of bands to build, clamping an explicit request to what the canvas allows.
pub fn choose_levels(width: usize, height: usize, wrap: bool, requested: Option<usize>) -> usize {
    let max = max_levels(width, height, wrap);
    match requested {
        Some(0) => {
            warn!("a pyramid needs at least one level; using 1");
            1
        }
        Some(n) if n > max => {
            warn!("{n} pyramid levels requested but a {width}x{height} canvas supports {max}");
            max
        }
        Some(n) => n,
        None => max,
    }
}

/// A stack of bands from full resolution to the coarsest level.
#[derive(Debug, Clone, PartialEq)]
pub struct Pyramid<P> {
    bands: Vec<Plane<P>>,
}

impl<P: PyramidPixel> Pyramid<P> {
    pub fn from_bands(bands: Vec<Plane<P>>) -> Self {
        Self { bands }
    }

    /// Gaussian pyramid of `image`, extrapolated outside `coverage`.
    pub fn gaussian<E: RowExecutor>(
        image: Plane<P>,
        coverage: &Plane<bool>,
        levels: usize,
        wrap: bool,
        executor: &E,
    ) -> BlendResult<Self> {
        let bands = build(image, coverage, levels, wrap, false, executor)?;
        Ok(Self { bands })
    }

    /// Laplacian pyramid of `image`, extrapolated outside `coverage`.
    ///
    /// The top band holds the coarsest Gaussian level; every other band is the
    /// difference to the expansion of the level above.
    pub fn laplacian<E: RowExecutor>(
        image: Plane<P>,
        coverage: &Plane<bool>,
        levels: usize,
        wrap: bool,
        executor: &E,
    ) -> BlendResult<Self> {
        let bands = build(image, coverage, levels, wrap, true, executor)?;
        Ok(Self { bands })
    }

    pub fn levels(&self) -> usize {
        self.bands.len()
    }

    pub fn band(&self, level: usize) -> &Plane<P> {
        &self.bands[level]
    }

    pub fn bands(&self) -> &[Plane<P>] {
        &self.bands
    }

    pub fn into_bands(self) -> Vec<Plane<P>> {
        self.bands
    }

    /// Rebuild the full-resolution band: `R_l = L_l + expand(R_{l+1})`.
    pub fn collapse<E: RowExecutor>(self, wrap: bool, executor: &E) -> BlendResult<Plane<P>> {
        let mut bands = self.bands;
        let Some(mut result) = bands.pop() else {
            return Plane::try_filled(0, 0, P::default());
        };
        while let Some(mut band) = bands.pop() {
            let (w, h) = band.dimensions();
            let up = expand(&result, w, h, wrap, executor)?;
            for (value, add) in band.as_mut_slice().iter_mut().zip(up.as_slice()) {
                *value = value.plus(*add);
            }
            result = band;
        }
        Ok(result)
    }
}

/// Reduce down to `levels` bands, fill uncovered pixels top-down, and optionally
/// turn the Gaussian bands into Laplacian ones in the same pass.
fn build<P, E>(
    image: Plane<P>,
    coverage: &Plane<bool>,
    levels: usize,
    wrap: bool,
    laplacian: bool,
    executor: &E,
) -> BlendResult<Vec<Plane<P>>>
where
    P: PyramidPixel,
    E: RowExecutor,
{
    let levels = levels.max(1);
    let mut bands = Vec::with_capacity(levels);
    let mut covers = Vec::with_capacity(levels);
    bands.push(image);
    covers.push(coverage.clone());
    for level in 1..levels {
        let (band, cover) = reduce(&bands[level - 1], &covers[level - 1], wrap, executor)?;
        bands.push(band);
        covers.push(cover);
    }

    let top = levels - 1;
    fill_with_mean(&mut bands[top], &covers[top]);
    // Expansion of the Gaussian band two levels up, waiting to be subtracted.
    let mut pending: Option<Plane<P>> = None;
    for level in (0..top).rev() {
        let (w, h) = bands[level].dimensions();
        let up = expand(&bands[level + 1], w, h, wrap, executor)?;
        for ((value, &covered), &guess) in bands[level]
            .as_mut_slice()
            .iter_mut()
            .zip(covers[level].as_slice())
            .zip(up.as_slice())
        {
            if !covered {
                *value = guess;
            }
        }
        if laplacian {
            if let Some(prev) = pending.take() {
                subtract(&mut bands[level + 1], &prev);
            }
            pending = Some(up);
        }
    }
    if let Some(prev) = pending {
        subtract(&mut bands[0], &prev);
    }
    debug!(
        "built {} band(s) from {}x{}",
        bands.len(),
        bands[0].width(),
        bands[0].height()
    );
    Ok(bands)
}

fn subtract<P: PyramidPixel>(band: &mut Plane<P>, other: &Plane<P>) {
    for (value, &o) in band.as_mut_slice().iter_mut().zip(other.as_slice()) {
        *value = value.minus(o);
    }
}

fn fill_with_mean<P: PyramidPixel>(band: &mut Plane<P>, coverage: &Plane<bool>) {
    let mut acc = P::Wide::default();
    let mut count = 0i64;
    for (value, &covered) in band.as_slice().iter().zip(coverage.as_slice()) {
        if covered {
            acc = P::wide_add(acc, value.promote());
            count += 1;
        }
    }
    let mean = if count > 0 { P::demote(acc, count) } else { P::default() };
    for (value, &covered) in band.as_mut_slice().iter_mut().zip(coverage.as_slice()) {
        if !covered {
            *value = mean;
        }
    }
}

/// 8-bit preview of a band. Detail bands are centred on mid-gray.
pub fn band_preview<P: PyramidPixel>(band: &Plane<P>, depth: ChannelDepth, detail: bool) -> GrayImage {
    let shift = depth.eight_bit_shift();
    let (w, h) = band.dimensions();
    GrayImage::from_fn(w as u32, h as u32, |x, y| {
        let v = div_round(band.get(x as usize, y as usize).brightness(), 1i64 << shift);
        let v = if detail { v + 128 } else { v };
        Luma([v.clamp(0, 255) as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{RayonExecutor, SequentialExecutor};

    mod max_levels {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn halves_until_eight() {
                assert_eq!(max_levels(7, 100, false), 1);
                assert_eq!(max_levels(16, 16, false), 2);
                assert_eq!(max_levels(100, 100, false), 4); // 100, 50, 25, 13
                assert_eq!(max_levels(1 << 20, 1 << 20, false), 18);
            }

            #[test]
            fn wrap_needs_even_width() {
                assert_eq!(max_levels(100, 100, true), 3); // 100, 50, 25 is odd
                assert_eq!(max_levels(64, 64, true), 4);
            }

            #[test]
            fn requests_are_clamped() {
                assert_eq!(choose_levels(100, 100, false, Some(2)), 2);
                assert_eq!(choose_levels(100, 100, false, Some(40)), 4);
                assert_eq!(choose_levels(100, 100, false, Some(0)), 1);
                assert_eq!(choose_levels(100, 100, false, None), 4);
            }
        }
    }

    mod laplacian {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn detail_is_zero_outside_coverage() {
                let image = Plane::try_from_fn(32, 32, |x, y| ((x * 37 + y * 11) % 251) as i32 * 256).unwrap();
                let coverage = Plane::try_from_fn(32, 32, |x, _| x < 12).unwrap();
                let pyramid = Pyramid::laplacian(image, &coverage, 3, false, &SequentialExecutor).unwrap();
                let band = pyramid.band(0);
                for y in 0..32 {
                    for x in 12..32 {
                        assert_eq!(band.get(x, y), 0, "({x}, {y})");
                    }
                }
            }

            #[test]
            fn empty_coverage_fills_with_zero() {
                let image = Plane::try_filled(16, 16, 1000i32).unwrap();
                let coverage = Plane::try_filled(16, 16, false).unwrap();
                let pyramid = Pyramid::gaussian(image, &coverage, 2, false, &SequentialExecutor).unwrap();
                assert!(pyramid.bands().iter().all(|b| b.as_slice().iter().all(|&v| v == 0)));
            }

            #[test]
            fn gaussian_mask_extrapolates_outside_union() {
                let mask = Plane::try_filled(16, 16, 65536i32).unwrap();
                let union = Plane::try_from_fn(16, 16, |x, _| x < 8).unwrap();
                let pyramid = Pyramid::gaussian(mask, &union, 2, false, &SequentialExecutor).unwrap();
                assert!(pyramid.band(1).as_slice().iter().all(|&v| v == 65536));
            }
        }

        mod prop {
            use super::*;
            use proptest::prelude::*;

            proptest! {
                #![proptest_config(ProptestConfig::with_cases(48))]

                /// Building and collapsing a scalar pyramid reproduces the input exactly.
                #[test]
                fn scalar_round_trip(
                    w in 1usize..48,
                    h in 1usize..48,
                    seed in any::<u32>(),
                    wrap in any::<bool>(),
                    wide in any::<bool>(),
                ) {
                    let depth = if wide { ChannelDepth::U16 } else { ChannelDepth::U8 };
                    let fixed = depth.fixed();
                    let max = depth.max();
                    let image = Plane::try_from_fn(w, h, |x, y| {
                        let v = (x as u32).wrapping_mul(2654435761).wrapping_add(y as u32 * 40503).wrapping_add(seed);
                        fixed.from_native(v % (max + 1))
                    }).unwrap();
                    let coverage = Plane::try_filled(w, h, true).unwrap();
                    let levels = max_levels(w, h, wrap);
                    let pyramid = Pyramid::laplacian(image.clone(), &coverage, levels, wrap, &SequentialExecutor).unwrap();
                    prop_assert_eq!(pyramid.levels(), levels);
                    let back = pyramid.collapse(wrap, &SequentialExecutor).unwrap();
                    prop_assert_eq!(&back, &image);
                    for (a, b) in back.as_slice().iter().zip(image.as_slice()) {
                        prop_assert_eq!(fixed.to_native(*a, max), fixed.to_native(*b, max));
                    }
                }

                /// RGB pyramids round-trip exactly under partial coverage and a thread pool.
                #[test]
                fn rgb_round_trip_with_partial_coverage(
                    w in 8usize..40,
                    h in 8usize..40,
                    cut in 1usize..7,
                    wrap in any::<bool>(),
                ) {
                    let image = Plane::try_from_fn(w, h, |x, y| {
                        [(x * 7 % 256) as i32 * 256, (y * 13 % 256) as i32 * 256, ((x + y) % 256) as i32 * 256]
                    }).unwrap();
                    let coverage = Plane::try_from_fn(w, h, |x, _| x % 8 >= cut).unwrap();
                    let executor = RayonExecutor::new(Some(2)).unwrap();
                    let levels = max_levels(w, h, wrap);
                    let pyramid = Pyramid::laplacian(image.clone(), &coverage, levels, wrap, &executor).unwrap();
                    let back = pyramid.collapse(wrap, &executor).unwrap();
                    for y in 0..h {
                        for x in 0..w {
                            if coverage.get(x, y) {
                                prop_assert_eq!(back.get(x, y), image.get(x, y));
                            }
                        }
                    }
                }
            }
        }
    }

    mod band_preview {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn detail_is_centred() {
                let band = Plane::try_from_fn(2, 1, |x, _| if x == 0 { -(10i32 << 8) } else { 300 << 8 }).unwrap();
                let detail = band_preview(&band, ChannelDepth::U8, true);
                let plain = band_preview(&band, ChannelDepth::U8, false);
                assert_eq!(detail.get_pixel(0, 0)[0], 118);
                assert_eq!(plain.get_pixel(0, 0)[0], 0);
                assert_eq!(plain.get_pixel(1, 0)[0], 255);
            }

            #[test]
            fn white_sixteen_bit_color_band_is_white() {
                let band = Plane::try_from_fn(2, 2, |_, _| [65535i32 << 8; 3]).unwrap();
                let plain = band_preview(&band, ChannelDepth::U16, false);
                assert!(plain.pixels().all(|p| p[0] == 255));
            }
        }
    }
}
