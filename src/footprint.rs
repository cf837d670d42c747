use image::{GrayImage, Luma};
use imageproc::contrast::{ThresholdType, threshold};

use crate::error::BlendResult;
use crate::plane::Plane;

/// Axis-aligned integer rectangle in output coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            (self.right().max(other.right()) - x) as u32,
            (self.bottom().max(other.bottom()) - y) as u32,
        )
    }

    /// Common part of both rectangles, if any.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (right > x && bottom > y).then(|| Rect::new(x, y, (right - x) as u32, (bottom - y) as u32))
    }

    /// Grow on every side by `margin`, then clip to `bounds`.
    pub fn grown_within(&self, margin: u32, bounds: &Rect) -> Option<Rect> {
        let m = margin as i32;
        Rect::new(
            self.x - m,
            self.y - m,
            self.width + 2 * margin,
            self.height + 2 * margin,
        )
        .intersection(bounds)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.right() && y < self.bottom()
    }
}

/// How a new image relates to the composite it is blended into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// The footprints are disjoint.
    None,
    /// Each footprint has pixels the other lacks.
    Partial,
    /// The new image covers the whole composite.
    Complete,
    /// The composite already covers the whole new image.
    Redundant,
}

/// Binary coverage mask of one image on the working canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct Footprint {
    mask: GrayImage,
}

impl Footprint {
    /// Binarize an alpha channel: any non-zero value counts as covered.
    pub fn from_alpha(alpha: &GrayImage) -> Self {
        Self {
            mask: threshold(alpha, 0, ThresholdType::Binary),
        }
    }

    pub fn full(width: u32, height: u32) -> Self {
        Self {
            mask: GrayImage::from_pixel(width, height, Luma([255])),
        }
    }

    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            mask: GrayImage::new(width, height),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.mask.dimensions()
    }

    #[inline]
    pub fn covered(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y)[0] != 0
    }

    pub fn set(&mut self, x: u32, y: u32, covered: bool) {
        self.mask
            .put_pixel(x, y, Luma([if covered { 255 } else { 0 }]));
    }

    pub fn is_empty(&self) -> bool {
        self.mask.as_raw().iter().all(|&v| v == 0)
    }

    pub fn count(&self) -> usize {
        self.mask.as_raw().iter().filter(|&&v| v != 0).count()
    }

    pub fn union(&self, other: &Footprint) -> Footprint {
        self.combine(other, |a, b| a || b)
    }

    pub fn intersection(&self, other: &Footprint) -> Footprint {
        self.combine(other, |a, b| a && b)
    }

    fn combine(&self, other: &Footprint, op: impl Fn(bool, bool) -> bool) -> Footprint {
        let (w, h) = self.dimensions();
        let mask = GrayImage::from_fn(w, h, |x, y| {
            Luma([if op(self.covered(x, y), other.covered(x, y)) {
                255
            } else {
                0
            }])
        });
        Footprint { mask }
    }

    /// Coverage as a boolean plane for the pyramid code.
    pub fn coverage(&self) -> BlendResult<Plane<bool>> {
        let (w, h) = self.dimensions();
        Plane::try_from_fn(w as usize, h as usize, |x, y| {
            self.covered(x as u32, y as u32)
        })
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.mask
    }

    pub fn into_image(self) -> GrayImage {
        self.mask
    }

    /// Classify how `white` relates to the composite footprint `self`.
    pub fn overlap_with(&self, white: &Footprint) -> Overlap {
        let mut shared = false;
        let mut black_only = false;
        let mut white_only = false;
        for (&b, &w) in self.mask.as_raw().iter().zip(white.mask.as_raw()) {
            match (b != 0, w != 0) {
                (true, true) => shared = true,
                (true, false) => black_only = true,
                (false, true) => white_only = true,
                (false, false) => {}
            }
        }
        match (shared, black_only, white_only) {
            (false, _, _) => Overlap::None,
            (true, false, _) => Overlap::Complete,
            (true, true, false) => Overlap::Redundant,
            (true, true, true) => Overlap::Partial,
        }
    }
}
