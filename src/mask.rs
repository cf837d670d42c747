//! Blend weight masks: seam masks to weights and per-pixel normalization.

use image::{GrayImage, Luma};
use ndarray::Array2;

use crate::error::BlendResult;
use crate::executor::RowExecutor;
use crate::fixed::MASK_ONE;
use crate::plane::Plane;

/// How per-image weight maps are turned into blend masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightMode {
    /// Weights are normalized so that each covered pixel sums to [`MASK_ONE`].
    Soft,
    /// The highest weight takes the whole pixel.
    WinnerTakeAll,
}

/// Convert a row-major `height x width` array into a plane.
pub fn array_to_plane(array: &Array2<f32>) -> BlendResult<Plane<f32>> {
    let (h, w) = array.dim();
    Plane::try_from_fn(w, h, |x, y| array[[y, x]])
}

/// White and black blend weights for a seam mask: 255 gives the white image everything.
pub fn seam_weights(mask: &GrayImage) -> BlendResult<(Plane<i32>, Plane<i32>)> {
    let (w, h) = mask.dimensions();
    let white = Plane::try_from_fn(w as usize, h as usize, |x, y| {
        mask_weight(mask.get_pixel(x as u32, y as u32)[0])
    })?;
    let black = Plane::try_from_fn(w as usize, h as usize, |x, y| MASK_ONE - white.get(x, y))?;
    Ok((white, black))
}

/// Blend weight of an 8-bit mask value, mapping 255 exactly onto [`MASK_ONE`].
#[inline]
pub fn mask_weight(value: u8) -> i32 {
    ((value as i64 * MASK_ONE as i64 + 127) / 255) as i32
}

/// Turn raw per-image weights into integer blend masks.
///
/// For every pixel covered by at least one image, the masks of the covering
/// images sum to exactly [`MASK_ONE`]; images that do not cover a pixel get 0
/// there. Negative and non-finite weights count as 0. When every covering
/// image has zero weight the pixel is shared equally.
pub fn normalize_weights<E: RowExecutor>(
    weights: &[Plane<f32>],
    coverage: &[Plane<bool>],
    mode: WeightMode,
    executor: &E,
) -> BlendResult<Vec<Plane<i32>>> {
    let n = weights.len();
    let Some(first) = weights.first() else {
        return Ok(Vec::new());
    };
    let (w, h) = first.dimensions();

    // Interleaved so one row of the buffer holds every image's share of one canvas row.
    let mut shares = Plane::try_filled(w * n, h, 0i32)?;
    executor.for_each_row(shares.as_mut_slice(), w * n, |y, row| {
        let mut raw = vec![0f64; n];
        let mut covered = vec![false; n];
        for x in 0..w {
            for i in 0..n {
                covered[i] = coverage[i].get(x, y);
                let v = weights[i].get(x, y) as f64;
                raw[i] = if covered[i] && v.is_finite() && v > 0.0 { v } else { 0.0 };
            }
            let out = &mut row[x * n..(x + 1) * n];
            match mode {
                WeightMode::Soft => split_pixel(&raw, &covered, out),
                WeightMode::WinnerTakeAll => pick_winner(&raw, &covered, out),
            }
        }
    });

    (0..n)
        .map(|i| Plane::try_from_fn(w, h, |x, y| shares.get(x * n + i, y)))
        .collect()
}

/// Largest-remainder split of [`MASK_ONE`]; ties in the remainder go to the lowest index.
fn split_pixel(raw: &[f64], covered: &[bool], out: &mut [i32]) {
    out.fill(0);
    let count = covered.iter().filter(|&&c| c).count();
    if count == 0 {
        return;
    }
    let total: f64 = raw.iter().sum();
    let ideal: Vec<f64> = raw
        .iter()
        .zip(covered)
        .map(|(&v, &c)| match (c, total > 0.0) {
            (false, _) => 0.0,
            (true, true) => v / total * MASK_ONE as f64,
            (true, false) => MASK_ONE as f64 / count as f64,
        })
        .collect();

    let mut assigned = 0i32;
    for (o, &v) in out.iter_mut().zip(&ideal) {
        *o = v.floor() as i32;
        assigned += *o;
    }
    let mut order: Vec<usize> = (0..out.len()).filter(|&i| covered[i]).collect();
    order.sort_by(|&a, &b| {
        let (ra, rb) = (ideal[a] - ideal[a].floor(), ideal[b] - ideal[b].floor());
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    for &i in order.iter().cycle().take((MASK_ONE - assigned).max(0) as usize) {
        out[i] += 1;
    }
}

/// Give the whole pixel to the covering image with the highest weight, lowest index on ties.
fn pick_winner(raw: &[f64], covered: &[bool], out: &mut [i32]) {
    out.fill(0);
    let mut best: Option<usize> = None;
    for i in (0..raw.len()).filter(|&i| covered[i]) {
        if best.is_none_or(|b| raw[i] > raw[b]) {
            best = Some(i);
        }
    }
    if let Some(i) = best {
        out[i] = MASK_ONE;
    }
}

/// Convert a blend mask to an 8-bit grayscale image, 255 for [`MASK_ONE`].
pub fn weight_to_gray_image(weights: &Plane<i32>) -> GrayImage {
    let (w, h) = weights.dimensions();
    GrayImage::from_fn(w as u32, h as u32, |x, y| {
        let value = weights.get(x as usize, y as usize).clamp(0, MASK_ONE) as i64;
        let byte = (value * 255 + MASK_ONE as i64 / 2) / MASK_ONE as i64;
        Luma([byte as u8])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SequentialExecutor;

    fn planes(n: usize, w: usize, h: usize, f: impl Fn(usize, usize, usize) -> f32) -> Vec<Plane<f32>> {
        (0..n)
            .map(|i| Plane::try_from_fn(w, h, |x, y| f(i, x, y)).unwrap())
            .collect()
    }

    fn full(n: usize, w: usize, h: usize) -> Vec<Plane<bool>> {
        (0..n).map(|_| Plane::try_filled(w, h, true).unwrap()).collect()
    }

    mod seam_weights {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn white_and_black_are_complementary() {
                let mut mask = GrayImage::new(3, 1);
                mask.put_pixel(0, 0, Luma([255]));
                mask.put_pixel(1, 0, Luma([0]));
                mask.put_pixel(2, 0, Luma([128]));
                let (white, black) = seam_weights(&mask).unwrap();
                assert_eq!(white.row(0)[..2], [MASK_ONE, 0]);
                assert_eq!(black.row(0)[..2], [0, MASK_ONE]);
                assert_eq!(white.get(2, 0) + black.get(2, 0), MASK_ONE);
            }
        }
    }

    mod normalize_weights {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn proportional_split() {
                let weights = planes(2, 1, 1, |i, _, _| if i == 0 { 3.0 } else { 1.0 });
                let masks =
                    normalize_weights(&weights, &full(2, 1, 1), WeightMode::Soft, &SequentialExecutor)
                        .unwrap();
                assert_eq!(masks[0].get(0, 0), 49152);
                assert_eq!(masks[1].get(0, 0), 16384);
            }

            #[test]
            fn remainder_goes_to_lowest_index_on_ties() {
                // Thirds of 65536: 21845.33 each, one unit left over.
                let weights = planes(3, 1, 1, |_, _, _| 1.0);
                let masks =
                    normalize_weights(&weights, &full(3, 1, 1), WeightMode::Soft, &SequentialExecutor)
                        .unwrap();
                let values: Vec<i32> = masks.iter().map(|m| m.get(0, 0)).collect();
                assert_eq!(values, vec![21846, 21845, 21845]);
            }

            #[test]
            fn zero_weights_share_equally_among_covering_images() {
                let weights = planes(3, 1, 1, |_, _, _| 0.0);
                let mut coverage = full(3, 1, 1);
                coverage[1].set(0, 0, false);
                let masks =
                    normalize_weights(&weights, &coverage, WeightMode::Soft, &SequentialExecutor)
                        .unwrap();
                let values: Vec<i32> = masks.iter().map(|m| m.get(0, 0)).collect();
                assert_eq!(values, vec![32768, 0, 32768]);
            }

            #[test]
            fn uncovered_pixels_get_nothing() {
                let weights = planes(2, 2, 1, |_, _, _| 5.0);
                let coverage = vec![
                    Plane::try_from_fn(2, 1, |x, _| x == 0).unwrap(),
                    Plane::try_filled(2, 1, false).unwrap(),
                ];
                let masks =
                    normalize_weights(&weights, &coverage, WeightMode::Soft, &SequentialExecutor)
                        .unwrap();
                assert_eq!(masks[0].row(0), &[MASK_ONE, 0]);
                assert_eq!(masks[1].row(0), &[0, 0]);
            }

            #[test]
            fn negative_and_nan_weights_count_as_zero() {
                let weights = planes(2, 1, 1, |i, _, _| if i == 0 { f32::NAN } else { -4.0 });
                let masks =
                    normalize_weights(&weights, &full(2, 1, 1), WeightMode::Soft, &SequentialExecutor)
                        .unwrap();
                assert_eq!(masks[0].get(0, 0), 32768);
                assert_eq!(masks[1].get(0, 0), 32768);
            }

            #[test]
            fn winner_takes_all_with_low_index_ties() {
                let weights = planes(3, 2, 1, |i, x, _| if x == 0 { [1.0, 5.0, 2.0][i] } else { 7.0 });
                let masks = normalize_weights(
                    &weights,
                    &full(3, 2, 1),
                    WeightMode::WinnerTakeAll,
                    &SequentialExecutor,
                )
                .unwrap();
                assert_eq!(masks[1].get(0, 0), MASK_ONE);
                assert_eq!(masks[0].get(1, 0), MASK_ONE);
                assert_eq!(masks[1].get(1, 0) + masks[2].get(1, 0), 0);
            }

            #[test]
            fn no_images_no_masks() {
                let masks =
                    normalize_weights(&[], &[], WeightMode::Soft, &SequentialExecutor).unwrap();
                assert!(masks.is_empty());
            }
        }

        mod prop {
            use super::*;
            use proptest::prelude::*;

            proptest! {
                /// Covered pixels always sum to MASK_ONE and uncovered ones get no weight.
                #[test]
                fn masks_sum_to_one(
                    n in 1usize..5,
                    values in proptest::collection::vec((0f32..100.0, any::<bool>()), 4 * 3 * 4),
                    hard in any::<bool>(),
                ) {
                    let (w, h) = (3, 4);
                    let weights = planes(n, w, h, |i, x, y| values[(i * h + y) * w + x].0);
                    let coverage: Vec<Plane<bool>> = (0..n)
                        .map(|i| Plane::try_from_fn(w, h, |x, y| values[(i * h + y) * w + x].1).unwrap())
                        .collect();
                    let mode = if hard { WeightMode::WinnerTakeAll } else { WeightMode::Soft };
                    let masks = normalize_weights(&weights, &coverage, mode, &SequentialExecutor).unwrap();
                    for y in 0..h {
                        for x in 0..w {
                            let any = coverage.iter().any(|c| c.get(x, y));
                            let sum: i32 = masks.iter().map(|m| m.get(x, y)).sum();
                            prop_assert_eq!(sum, if any { MASK_ONE } else { 0 });
                            for (m, c) in masks.iter().zip(&coverage) {
                                let v = m.get(x, y);
                                prop_assert!(v >= 0);
                                if !c.get(x, y) {
                                    prop_assert_eq!(v, 0);
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    mod weight_to_gray_image {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn full_weight_is_white() {
                let plane = Plane::try_from_fn(3, 1, |x, _| [0, MASK_ONE / 2, MASK_ONE][x]).unwrap();
                let image = weight_to_gray_image(&plane);
                assert_eq!(image.get_pixel(0, 0)[0], 0);
                assert_eq!(image.get_pixel(1, 0)[0], 128);
                assert_eq!(image.get_pixel(2, 0)[0], 255);
            }

            #[test]
            fn out_of_range_is_clamped() {
                let plane = Plane::try_from_fn(2, 1, |x, _| [-5, MASK_ONE * 2][x]).unwrap();
                let image = weight_to_gray_image(&plane);
                assert_eq!(image.get_pixel(0, 0)[0], 0);
                assert_eq!(image.get_pixel(1, 0)[0], 255);
            }
        }
    }

    mod array_to_plane {
        use super::*;

        mod unit {
            use super::*;

            #[test]
            fn rows_follow_first_axis() {
                let array = Array2::from_shape_fn((2, 3), |(y, x)| (y * 10 + x) as f32);
                let plane = array_to_plane(&array).unwrap();
                assert_eq!(plane.dimensions(), (3, 2));
                assert_eq!(plane.get(2, 1), 12.0);
            }
        }
    }
}
