//! Pixel mismatch cost field that guides seam placement.

use crate::error::BlendResult;
use crate::executor::RowExecutor;
use crate::fixed::{ChannelDepth, PyramidPixel};
use crate::footprint::{Footprint, Rect};
use crate::plane::Plane;
use crate::seam::ring::Point;

/// Cost of pixels the seam must not cross.
pub const FORBIDDEN: u8 = 255;
/// Cost of pixels outside both images once paths are routed.
pub const FREE: u8 = 1;

/// Per-pixel seam cost on a grid subsampled by `stride`.
#[derive(Debug, Clone)]
pub struct CostField {
    cost: Plane<u8>,
    stride: u32,
    canvas: (u32, u32),
}

impl CostField {
    /// Mismatch between two images where both are covered, [`FORBIDDEN`] elsewhere.
    pub fn mismatch<P, E>(
        white: (&Plane<P>, &Footprint),
        black: (&Plane<P>, &Footprint),
        depth: ChannelDepth,
        stride: u32,
        executor: &E,
    ) -> BlendResult<Self>
    where
        P: PyramidPixel,
        E: RowExecutor,
    {
        let stride = stride.max(1);
        let canvas = white.1.dimensions();
        let (cw, ch) = (canvas.0.div_ceil(stride), canvas.1.div_ceil(stride));
        let mut cost = Plane::try_filled(cw as usize, ch as usize, FORBIDDEN)?;
        let shift = depth.eight_bit_shift();
        executor.for_each_row(cost.as_mut_slice(), cw as usize, |cy, row| {
            let y = cy as u32 * stride;
            for (cx, value) in row.iter_mut().enumerate() {
                let x = cx as u32 * stride;
                if white.1.covered(x, y) && black.1.covered(x, y) {
                    let (a, b) = (
                        white.0.get(x as usize, y as usize),
                        black.0.get(x as usize, y as usize),
                    );
                    *value = a.mismatch(b, shift);
                }
            }
        });
        Ok(Self {
            cost,
            stride,
            canvas,
        })
    }

    /// Build directly from cost values; `canvas` is the full-resolution size.
    pub fn from_plane(cost: Plane<u8>, stride: u32, canvas: (u32, u32)) -> Self {
        Self {
            cost,
            stride: stride.max(1),
            canvas,
        }
    }

    /// Make pixels outside both footprints cheap to cross.
    pub fn open_uncovered(&mut self, white: &Footprint, black: &Footprint) {
        let stride = self.stride;
        let width = self.cost.width();
        for (i, value) in self.cost.as_mut_slice().iter_mut().enumerate() {
            let (x, y) = ((i % width) as u32 * stride, (i / width) as u32 * stride);
            if !white.covered(x, y) && !black.covered(x, y) {
                *value = FREE;
            }
        }
    }

    pub fn width(&self) -> usize {
        self.cost.width()
    }

    pub fn height(&self) -> usize {
        self.cost.height()
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn plane(&self) -> &Plane<u8> {
        &self.cost
    }

    /// Whole grid as a rectangle.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.cost.width() as u32, self.cost.height() as u32)
    }

    #[inline]
    pub fn at(&self, p: Point) -> u8 {
        self.cost.get(p.x as usize, p.y as usize)
    }

    /// Grid cell of a canvas point, clamped into the grid.
    pub fn to_grid(&self, p: Point) -> Point {
        let s = self.stride as i32;
        let x = p.x.clamp(0, self.canvas.0 as i32 - 1) / s;
        let y = p.y.clamp(0, self.canvas.1 as i32 - 1) / s;
        Point::new(
            x.min(self.cost.width() as i32 - 1),
            y.min(self.cost.height() as i32 - 1),
        )
    }

    /// Canvas point of a grid cell.
    pub fn to_canvas(&self, p: Point) -> Point {
        let s = self.stride as i32;
        Point::new(p.x * s, p.y * s)
    }

    /// Sum of costs in the 3x3 window around a grid cell.
    pub fn window_sum(&self, p: Point) -> u32 {
        let mut sum = 0u32;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if let Some(c) = self.cost.get_checked((p.x + dx) as i64, (p.y + dy) as i64) {
                    sum += c as u32;
                }
            }
        }
        sum
    }

    /// Cost of the 8-connected digital line from `a` to `b`, excluding `a`.
    pub fn line_cost(&self, a: Point, b: Point) -> u64 {
        let mut total = 0u64;
        let (dx, dy) = ((b.x - a.x).abs(), -(b.y - a.y).abs());
        let (sx, sy) = (if a.x < b.x { 1 } else { -1 }, if a.y < b.y { 1 } else { -1 });
        let (mut x, mut y) = (a.x, a.y);
        let mut err = dx + dy;
        while (x, y) != (b.x, b.y) {
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
            total += self.at(Point::new(x, y)) as u64;
        }
        total
    }
}
