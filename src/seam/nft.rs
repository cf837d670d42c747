//! Nearest-feature transform over a pair of footprints.
//!
//! Pixels covered by exactly one image are features of that image. Every other
//! pixel is given to whichever image owns the closest feature pixel, which puts
//! the boundary between the two labels halfway through the overlap.

use image::{GrayImage, Luma};
use imageproc::distance_transform::euclidean_squared_distance_transform;
use log::debug;

use crate::error::{BlendError, BlendResult};
use crate::footprint::Footprint;

/// Label of pixels assigned to the white (incoming) image.
pub const WHITE: u8 = 255;
/// Label of pixels assigned to the black (composite) image.
pub const BLACK: u8 = 0;

/// Two-label partition of the working canvas sampled on a regular grid.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMap {
    labels: GrayImage,
    stride: u32,
}

impl RegionMap {
    pub fn new(labels: GrayImage, stride: u32) -> Self {
        Self {
            labels,
            stride: stride.max(1),
        }
    }

    pub fn labels(&self) -> &GrayImage {
        &self.labels
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    #[inline]
    pub fn is_white(&self, x: u32, y: u32) -> bool {
        self.labels.get_pixel(x, y)[0] == WHITE
    }

    /// Nearest-neighbour upsampling onto a `width` x `height` canvas.
    pub fn upsample(&self, width: u32, height: u32) -> GrayImage {
        let (lw, lh) = self.labels.dimensions();
        GrayImage::from_fn(width, height, |x, y| {
            let sx = (x / self.stride).min(lw.saturating_sub(1));
            let sy = (y / self.stride).min(lh.saturating_sub(1));
            *self.labels.get_pixel(sx, sy)
        })
    }
}

/// Partition the canvas between `white` and `black`, sampling every `stride` pixels.
///
/// With `wraparound` the left and right canvas edges are treated as adjacent.
/// Fails when either image has no pixels of its own.
pub fn nearest_feature_transform(
    white: &Footprint,
    black: &Footprint,
    stride: u32,
    wraparound: bool,
) -> BlendResult<RegionMap> {
    let stride = stride.max(1);
    let (w, h) = white.dimensions();
    let (gw, gh) = (w.div_ceil(stride), h.div_ceil(stride));

    let mut white_features = GrayImage::new(gw, gh);
    let mut black_features = GrayImage::new(gw, gh);
    let (mut any_white, mut any_black) = (false, false);
    for gy in 0..gh {
        for gx in 0..gw {
            let (x, y) = (gx * stride, gy * stride);
            match (white.covered(x, y), black.covered(x, y)) {
                (true, false) => {
                    white_features.put_pixel(gx, gy, Luma([255]));
                    any_white = true;
                }
                (false, true) => {
                    black_features.put_pixel(gx, gy, Luma([255]));
                    any_black = true;
                }
                _ => {}
            }
        }
    }
    if !any_white {
        return Err(BlendError::DegenerateOverlap(
            "the incoming image has no pixels outside the composite",
        ));
    }
    if !any_black {
        return Err(BlendError::DegenerateOverlap(
            "the composite has no pixels outside the incoming image",
        ));
    }

    debug!("nearest-feature transform on a {gw}x{gh} grid (stride {stride}, wraparound {wraparound})");
    let (to_white, to_black) = if wraparound {
        (
            wrapped_distances(&white_features),
            wrapped_distances(&black_features),
        )
    } else {
        (
            euclidean_squared_distance_transform(&white_features),
            euclidean_squared_distance_transform(&black_features),
        )
    };

    let labels = GrayImage::from_fn(gw, gh, |x, y| {
        let dw = to_white.get_pixel(x, y)[0];
        let db = to_black.get_pixel(x, y)[0];
        Luma([if dw <= db { WHITE } else { BLACK }])
    });
    Ok(RegionMap::new(labels, stride))
}

/// Squared distances on a horizontally periodic grid, computed on three tiled copies.
fn wrapped_distances(features: &GrayImage) -> image::ImageBuffer<Luma<f64>, Vec<f64>> {
    let (w, h) = features.dimensions();
    let tiled = GrayImage::from_fn(3 * w, h, |x, y| *features.get_pixel(x % w, y));
    let distances = euclidean_squared_distance_transform(&tiled);
    image::ImageBuffer::from_fn(w, h, |x, y| *distances.get_pixel(x + w, y))
}
