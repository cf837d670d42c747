//! Placement of source images on the shared output canvas.

use log::{debug, info};

use crate::error::{BlendError, BlendResult};
use crate::executor::RowExecutor;
use crate::footprint::{Footprint, Rect};
use crate::plane::Plane;
use crate::source::{LayerPixel, SourceImage};

/// One or more source images drawn onto the canvas.
///
/// Pixels outside the footprint are zero.
#[derive(Debug, Clone)]
pub struct Layer<P> {
    pixels: Plane<P>,
    footprint: Footprint,
    /// Indices of the source images painted into this layer.
    sources: Vec<usize>,
}

impl<P: LayerPixel> Layer<P> {
    pub fn pixels(&self) -> &Plane<P> {
        &self.pixels
    }

    pub fn footprint(&self) -> &Footprint {
        &self.footprint
    }

    pub fn sources(&self) -> &[usize] {
        &self.sources
    }

    /// First source index, used to name the layer in logs and artifacts.
    pub fn index(&self) -> usize {
        self.sources.first().copied().unwrap_or(0)
    }

    pub fn into_parts(self) -> (Plane<P>, Footprint) {
        (self.pixels, self.footprint)
    }

    /// Paint `other`'s covered pixels over this layer and extend the footprint.
    pub fn paste(&mut self, other: &Layer<P>) {
        let (w, _) = self.footprint.dimensions();
        for (i, (value, &src)) in self
            .pixels
            .as_mut_slice()
            .iter_mut()
            .zip(other.pixels.as_slice())
            .enumerate()
        {
            let (x, y) = ((i % w as usize) as u32, (i / w as usize) as u32);
            if other.footprint.covered(x, y) {
                *value = src;
            }
        }
        self.footprint = self.footprint.union(&other.footprint);
        self.sources.extend_from_slice(&other.sources);
    }

    /// Replace pixels with `pixels` and coverage with `footprint`, keeping the sources.
    pub fn replace(&mut self, pixels: Plane<P>, footprint: Footprint, sources: &[usize]) {
        self.pixels = pixels;
        self.footprint = footprint;
        self.sources.extend_from_slice(sources);
    }
}

/// Smallest rectangle holding every image.
pub fn union_rect(images: &[SourceImage]) -> BlendResult<Rect> {
    let mut rects = images.iter().map(SourceImage::rect);
    let first = rects.next().ok_or(BlendError::NoImages)?;
    Ok(rects.fold(first, |acc, r| acc.union(&r)))
}

/// Draw source `index` onto a canvas covering `canvas`.
pub fn place<P, E>(image: &SourceImage, index: usize, canvas: Rect, executor: &E) -> BlendResult<Layer<P>>
where
    P: LayerPixel,
    E: RowExecutor,
{
    let (w, h) = (canvas.width as usize, canvas.height as usize);
    let (ox, oy) = image.offset();
    let (sw, sh) = image.pixels().dimensions();
    let (dx, dy) = (ox - canvas.x, oy - canvas.y);
    let source_of = |x: usize, y: usize| -> Option<(u32, u32)> {
        let (sx, sy) = (x as i64 - dx as i64, y as i64 - dy as i64);
        (sx >= 0 && sy >= 0 && sx < sw as i64 && sy < sh as i64).then_some((sx as u32, sy as u32))
    };

    let mut pixels = Plane::try_filled(w, h, P::default())?;
    executor.for_each_row(pixels.as_mut_slice(), w, |y, row| {
        for (x, value) in row.iter_mut().enumerate() {
            if let Some((sx, sy)) = source_of(x, y)
                && image.footprint().covered(sx, sy)
            {
                *value = P::sample(image.pixels(), sx, sy);
            }
        }
    });

    let mut footprint = Footprint::empty(canvas.width, canvas.height);
    for y in 0..h {
        for x in 0..w {
            if let Some((sx, sy)) = source_of(x, y)
                && image.footprint().covered(sx, sy)
            {
                footprint.set(x as u32, y as u32, true);
            }
        }
    }
    if footprint.is_empty() {
        return Err(BlendError::EmptyFootprint { index });
    }
    debug!("placed image {index} at ({ox}, {oy}) covering {} pixels", footprint.count());
    Ok(Layer {
        pixels,
        footprint,
        sources: vec![index],
    })
}

/// Merge layers greedily into groups whose members do not overlap.
///
/// The first remaining layer starts a group and every later layer that does
/// not touch the group's footprint joins it. Groups keep the order of their
/// first member.
pub fn assemble<P: LayerPixel>(layers: Vec<Layer<P>>) -> Vec<Layer<P>> {
    let mut remaining: Vec<Option<Layer<P>>> = layers.into_iter().map(Some).collect();
    let mut groups = Vec::new();
    for i in 0..remaining.len() {
        let Some(mut group) = remaining[i].take() else {
            continue;
        };
        for slot in remaining.iter_mut().skip(i + 1) {
            let disjoint = slot
                .as_ref()
                .is_some_and(|layer| group.footprint.intersection(&layer.footprint).is_empty());
            if disjoint && let Some(layer) = slot.take() {
                group.paste(&layer);
            }
        }
        if group.sources.len() > 1 {
            info!("assembled images {:?} into one layer", group.sources);
        }
        groups.push(group);
    }
    groups
}
