//! Band-wise weighted accumulation of Laplacian pyramids.

use log::debug;

use crate::error::BlendResult;
use crate::executor::RowExecutor;
use crate::fixed::PyramidPixel;
use crate::plane::Plane;
use crate::pyramid::Pyramid;
use crate::pyramid::kernel::reduced_size;

/// Running sum of `L_i · M_i` over every image, one band per level.
#[derive(Debug, Clone)]
pub struct Accumulator<P> {
    bands: Vec<Plane<P>>,
    wrap: bool,
}

impl<P: PyramidPixel> Accumulator<P> {
    /// Zeroed bands for a `width` x `height` canvas.
    pub fn new(width: usize, height: usize, levels: usize, wrap: bool) -> BlendResult<Self> {
        let mut bands = Vec::with_capacity(levels);
        let (mut w, mut h) = (width, height);
        for _ in 0..levels.max(1) {
            bands.push(Plane::try_filled(w, h, P::default())?);
            (w, h) = reduced_size(w, h);
        }
        Ok(Self { bands, wrap })
    }

    pub fn levels(&self) -> usize {
        self.bands.len()
    }

    /// Fold one image into the sum. Both pyramids are consumed band by band and
    /// must have as many levels as the accumulator.
    pub fn add<E: RowExecutor>(
        &mut self,
        image: Pyramid<P>,
        mask: Pyramid<i32>,
        executor: &E,
    ) {
        debug_assert_eq!(image.levels(), self.levels());
        debug_assert_eq!(mask.levels(), self.levels());
        for ((target, detail), weight) in self
            .bands
            .iter_mut()
            .zip(image.into_bands())
            .zip(mask.into_bands())
        {
            let width = target.width();
            executor.for_each_row(target.as_mut_slice(), width, |y, row| {
                let (detail, weight) = (detail.row(y), weight.row(y));
                for ((value, &d), &m) in row.iter_mut().zip(detail).zip(weight) {
                    *value = value.plus(d.weighted(m));
                }
            });
        }
    }

    /// Collapse the sum and keep only pixels inside `union`; everything else is zero.
    pub fn finish<E: RowExecutor>(self, union: &Plane<bool>, executor: &E) -> BlendResult<Plane<P>> {
        debug!("collapsing {} band(s)", self.bands.len());
        let mut result = Pyramid::from_bands(self.bands).collapse(self.wrap, executor)?;
        for (value, &covered) in result.as_mut_slice().iter_mut().zip(union.as_slice()) {
            if !covered {
                *value = P::default();
            }
        }
        Ok(result)
    }
}
