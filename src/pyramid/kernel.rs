//! Masked reduce and normalized expand with the 5-tap binomial kernel.

use crate::error::BlendResult;
use crate::executor::RowExecutor;
use crate::fixed::PyramidPixel;
use crate::plane::Plane;

/// The binomial kernel `[1 4 6 4 1]`.
pub const KERNEL: [i64; 5] = [1, 4, 6, 4, 1];

/// Source index and weight of every tap contributing to one output position.
type Taps = Vec<Vec<(usize, i64)>>;

fn resolve(index: i64, len: usize, wrap: bool) -> Option<usize> {
    if wrap {
        Some(index.rem_euclid(len as i64) as usize)
    } else if index >= 0 && (index as usize) < len {
        Some(index as usize)
    } else {
        None
    }
}

fn reduce_taps(fine_len: usize, coarse_len: usize, wrap: bool) -> Taps {
    (0..coarse_len)
        .map(|c| {
            KERNEL
                .iter()
                .enumerate()
                .filter_map(|(i, &k)| {
                    resolve(2 * c as i64 + i as i64 - 2, fine_len, wrap).map(|f| (f, k))
                })
                .collect()
        })
        .collect()
}

fn expand_taps(fine_len: usize, coarse_len: usize, wrap: bool) -> Taps {
    (0..fine_len)
        .map(|f| {
            let half = (f / 2) as i64;
            let candidates: &[(i64, i64)] = if f % 2 == 0 {
                &[(half - 1, 1), (half, 6), (half + 1, 1)]
            } else {
                &[(half, 4), (half + 1, 4)]
            };
            candidates
                .iter()
                .filter_map(|&(c, k)| resolve(c, coarse_len, wrap).map(|c| (c, k)))
                .collect()
        })
        .collect()
}

/// Size of the band above a `width` x `height` band.
pub fn reduced_size(width: usize, height: usize) -> (usize, usize) {
    (width.div_ceil(2), height.div_ceil(2))
}

/// Halve `fine`, averaging only covered pixels under each 5x5 window.
///
/// A coarse pixel is covered when any of its taps is covered; uncovered coarse
/// pixels are left at zero. Horizontal taps wrap when `wrap` is set.
pub fn reduce<P, E>(
    fine: &Plane<P>,
    coverage: &Plane<bool>,
    wrap: bool,
    executor: &E,
) -> BlendResult<(Plane<P>, Plane<bool>)>
where
    P: PyramidPixel,
    E: RowExecutor,
{
    let (w, h) = fine.dimensions();
    let (cw, ch) = reduced_size(w, h);
    let xt = reduce_taps(w, cw, wrap);
    let yt = reduce_taps(h, ch, false);

    let mut covered = Plane::try_filled(cw, ch, false)?;
    executor.for_each_row(covered.as_mut_slice(), cw, |cy, row| {
        for (cx, value) in row.iter_mut().enumerate() {
            *value = yt[cy]
                .iter()
                .any(|&(y, _)| xt[cx].iter().any(|&(x, _)| coverage.get(x, y)));
        }
    });

    let mut coarse = Plane::try_filled(cw, ch, P::default())?;
    executor.for_each_row(coarse.as_mut_slice(), cw, |cy, row| {
        for (cx, value) in row.iter_mut().enumerate() {
            let mut acc = P::Wide::default();
            let mut total = 0i64;
            for &(y, ky) in &yt[cy] {
                for &(x, kx) in &xt[cx] {
                    if coverage.get(x, y) {
                        acc = P::wide_add(acc, P::wide_scale(fine.get(x, y).promote(), kx * ky));
                        total += kx * ky;
                    }
                }
            }
            if total > 0 {
                *value = P::demote(acc, total);
            }
        }
    });
    Ok((coarse, covered))
}

/// Upsample `coarse` to `width` x `height`.
///
/// Each output pixel is normalized by the kernel weights that fell inside the
/// coarse band, with a single rounding division.
pub fn expand<P, E>(
    coarse: &Plane<P>,
    width: usize,
    height: usize,
    wrap: bool,
    executor: &E,
) -> BlendResult<Plane<P>>
where
    P: PyramidPixel,
    E: RowExecutor,
{
    let (cw, ch) = coarse.dimensions();
    let xt = expand_taps(width, cw, wrap);
    let yt = expand_taps(height, ch, false);
    let x_weight: Vec<i64> = xt.iter().map(|t| t.iter().map(|&(_, k)| k).sum()).collect();

    // Horizontal pass, unnormalized.
    let mut rows = Plane::try_filled(width, ch, P::Wide::default())?;
    executor.for_each_row(rows.as_mut_slice(), width, |cy, row| {
        for (x, acc) in row.iter_mut().enumerate() {
            *acc = xt[x].iter().fold(P::Wide::default(), |a, &(cx, k)| {
                P::wide_add(a, P::wide_scale(coarse.get(cx, cy).promote(), k))
            });
        }
    });

    let mut fine = Plane::try_filled(width, height, P::default())?;
    executor.for_each_row(fine.as_mut_slice(), width, |y, row| {
        let y_weight: i64 = yt[y].iter().map(|&(_, k)| k).sum();
        for (x, value) in row.iter_mut().enumerate() {
            let acc = yt[y].iter().fold(P::Wide::default(), |a, &(cy, k)| {
                P::wide_add(a, P::wide_scale(rows.get(x, cy), k))
            });
            *value = P::demote(acc, x_weight[x] * y_weight);
        }
    });
    Ok(fine)
}
