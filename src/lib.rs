pub mod assemble;
pub mod config;
pub mod error;
pub mod executor;
pub mod export;
pub mod fixed;
pub mod footprint;
pub mod mask;
pub mod plane;
pub mod pyramid;
pub mod seam;
pub mod source;

pub use config::{AnnealOptions, BlendOptions, SeamOptions};
pub use error::{BlendError, BlendResult, ErrorKind};
pub use executor::{RayonExecutor, RowExecutor, SequentialExecutor};
pub use export::{ArtifactDirectory, ArtifactSink, Composite, NoArtifacts};
pub use footprint::{Footprint, Overlap, Rect};
pub use mask::WeightMode;
pub use source::{Gray16Image, PixelFormat, Rgb16Image, SourceImage, SourcePixels};

use log::{debug, info, warn};
use ndarray::Array2;

use crate::assemble::{Layer, assemble, place, union_rect};
use crate::fixed::ChannelDepth;
use crate::mask::{array_to_plane, normalize_weights, seam_weights, weight_to_gray_image};
use crate::plane::Plane;
use crate::pyramid::compose::Accumulator;
use crate::pyramid::{Pyramid, band_preview, choose_levels};
use crate::seam::create_seam_mask;
use crate::source::LayerPixel;

/// Entry point for compositing positioned images into one seamless output.
#[derive(Debug)]
pub struct Blender<E = RayonExecutor> {
    options: BlendOptions,
    executor: E,
}

impl Blender<RayonExecutor> {
    /// Create a blender whose raster work runs on rayon with `options.threads` workers.
    pub fn new(options: BlendOptions) -> BlendResult<Self> {
        let executor = RayonExecutor::new(options.threads)?;
        Ok(Self { options, executor })
    }
}

impl<E: RowExecutor> Blender<E> {
    /// Create a blender that runs raster work on a custom executor.
    pub fn with_executor(options: BlendOptions, executor: E) -> Self {
        Self { options, executor }
    }

    pub fn options(&self) -> &BlendOptions {
        &self.options
    }

    /// Blend the images in order, each one into the composite of those before it.
    pub fn blend(&self, images: &[SourceImage]) -> BlendResult<Composite> {
        self.blend_with(images, &NoArtifacts)
    }

    /// Like [`Blender::blend`], handing seam masks and band previews to `sink`.
    pub fn blend_with<S: ArtifactSink>(&self, images: &[SourceImage], sink: &S) -> BlendResult<Composite> {
        let format = common_format(images)?;
        if format.is_color() {
            self.blend_layers::<[i32; 3], S>(images, format.depth(), sink)
        } else {
            self.blend_layers::<i32, S>(images, format.depth(), sink)
        }
    }

    /// Blend all images at once using one weight map per image.
    ///
    /// Each map is `height x width` like its image. Weights are normalized per
    /// pixel over the images that cover it.
    pub fn fuse(&self, images: &[SourceImage], weights: &[Array2<f32>]) -> BlendResult<Composite> {
        self.fuse_with(images, weights, &NoArtifacts)
    }

    /// Like [`Blender::fuse`], handing normalized weight masks and band previews to `sink`.
    pub fn fuse_with<S: ArtifactSink>(
        &self,
        images: &[SourceImage],
        weights: &[Array2<f32>],
        sink: &S,
    ) -> BlendResult<Composite> {
        let format = common_format(images)?;
        if weights.len() != images.len() {
            return Err(BlendError::WeightCountMismatch {
                images: images.len(),
                weights: weights.len(),
            });
        }
        for (index, (image, map)) in images.iter().zip(weights).enumerate() {
            let (h, w) = map.dim();
            let expected = image.pixels().dimensions();
            let found = (w as u32, h as u32);
            if expected != found {
                return Err(BlendError::WeightSizeMismatch {
                    index,
                    expected,
                    found,
                });
            }
        }
        if format.is_color() {
            self.fuse_layers::<[i32; 3], S>(images, weights, format.depth(), sink)
        } else {
            self.fuse_layers::<i32, S>(images, weights, format.depth(), sink)
        }
    }

    fn blend_layers<P: LayerPixel, S: ArtifactSink>(
        &self,
        images: &[SourceImage],
        depth: ChannelDepth,
        sink: &S,
    ) -> BlendResult<Composite> {
        let canvas = union_rect(images)?;
        info!(
            "blending {} image(s) on a {}x{} canvas",
            images.len(),
            canvas.width,
            canvas.height
        );
        let layers = self.place_all::<P>(images, canvas)?;
        let layers = if self.options.one_at_a_time {
            layers
        } else {
            assemble(layers)
        };

        let mut layers = layers.into_iter();
        let mut composite = layers.next().ok_or(BlendError::NoImages)?;
        if layers.len() == 0 {
            info!("single input layer, passing it through");
        }
        for white in layers {
            let index = white.index();
            self.blend_pair(&mut composite, white, depth, sink)
                .map_err(|err| err.in_pair(index))?;
        }
        finish(&composite, depth, canvas.x, canvas.y)
    }

    /// Fold `white` into `black` according to how their footprints overlap.
    fn blend_pair<P: LayerPixel, S: ArtifactSink>(
        &self,
        black: &mut Layer<P>,
        white: Layer<P>,
        depth: ChannelDepth,
        sink: &S,
    ) -> BlendResult<()> {
        let index = white.index();
        match black.footprint().overlap_with(white.footprint()) {
            Overlap::None => {
                info!("image {index} does not overlap the composite, pasting it");
                black.paste(&white);
            }
            Overlap::Redundant => {
                warn!("image {index} lies entirely under the composite and contributes nothing");
            }
            Overlap::Complete => {
                info!("image {index} covers the whole composite and replaces it");
                let sources = white.sources().to_vec();
                let (pixels, footprint) = white.into_parts();
                black.replace(pixels, footprint, &sources);
            }
            Overlap::Partial => {
                info!("blending image {index} into the composite");
                let seam = create_seam_mask(
                    (white.pixels(), white.footprint()),
                    (black.pixels(), black.footprint()),
                    depth,
                    self.options.wraparound,
                    &self.options.seam,
                    sink.wants_visualization(),
                    &self.executor,
                )?;
                sink.seam_mask(index, &seam.mask)?;
                if let Some(visualization) = &seam.visualization {
                    sink.seam_visualization(index, visualization)?;
                }

                let (white_mask, black_mask) = seam_weights(&seam.mask)?;
                let union = black.footprint().union(white.footprint());
                let white_sources = white.sources().to_vec();
                let white_coverage = white.footprint().coverage()?;
                let (white_pixels, _) = white.into_parts();
                // The composite is only an input image before anything was blended into it.
                let black_artifact = (black.sources().len() == 1).then(|| black.index());
                let inputs = vec![
                    BlendInput {
                        artifact: black_artifact,
                        coverage: black.footprint().coverage()?,
                        pixels: black.pixels().clone(),
                        mask: black_mask,
                    },
                    BlendInput {
                        artifact: Some(index),
                        coverage: white_coverage,
                        pixels: white_pixels,
                        mask: white_mask,
                    },
                ];
                let pixels = self.composite(inputs, &union.coverage()?, depth, sink)?;
                black.replace(pixels, union, &white_sources);
            }
        }
        Ok(())
    }

    fn fuse_layers<P: LayerPixel, S: ArtifactSink>(
        &self,
        images: &[SourceImage],
        weights: &[Array2<f32>],
        depth: ChannelDepth,
        sink: &S,
    ) -> BlendResult<Composite> {
        let canvas = union_rect(images)?;
        info!(
            "fusing {} image(s) on a {}x{} canvas",
            images.len(),
            canvas.width,
            canvas.height
        );
        let layers = self.place_all::<P>(images, canvas)?;
        if let [single] = layers.as_slice() {
            info!("single input layer, passing it through");
            return finish(single, depth, canvas.x, canvas.y);
        }

        let (w, h) = (canvas.width as usize, canvas.height as usize);
        let mut raw = Vec::with_capacity(layers.len());
        let mut coverage = Vec::with_capacity(layers.len());
        for layer in &layers {
            let (image, map) = (&images[layer.index()], &weights[layer.index()]);
            let local = array_to_plane(map)?;
            let (dx, dy) = (
                (image.offset().0 - canvas.x) as i64,
                (image.offset().1 - canvas.y) as i64,
            );
            raw.push(Plane::try_from_fn(w, h, |x, y| {
                local.get_checked(x as i64 - dx, y as i64 - dy).unwrap_or(0.0)
            })?);
            coverage.push(layer.footprint().coverage()?);
        }
        let mode = if self.options.hard_mask {
            WeightMode::WinnerTakeAll
        } else {
            WeightMode::Soft
        };
        let masks = normalize_weights(&raw, &coverage, mode, &self.executor)?;
        drop(raw);
        for (layer, mask) in layers.iter().zip(&masks) {
            sink.seam_mask(layer.index(), &weight_to_gray_image(mask))?;
        }

        let mut union = Footprint::empty(canvas.width, canvas.height);
        for layer in &layers {
            union = union.union(layer.footprint());
        }
        let inputs = layers
            .into_iter()
            .zip(coverage)
            .zip(masks)
            .map(|((layer, coverage), mask)| {
                let artifact = Some(layer.index());
                let (pixels, _) = layer.into_parts();
                BlendInput {
                    artifact,
                    coverage,
                    pixels,
                    mask,
                }
            })
            .collect();
        let pixels = self.composite(inputs, &union.coverage()?, depth, sink)?;
        let stored = P::store(&pixels, depth);
        Composite::new(stored, union.into_image(), (canvas.x, canvas.y))
    }

    /// Place every image on the canvas, dropping those with nothing opaque.
    ///
    /// Fails only when no image has a non-empty footprint.
    fn place_all<P: LayerPixel>(&self, images: &[SourceImage], canvas: Rect) -> BlendResult<Vec<Layer<P>>> {
        let mut layers = Vec::with_capacity(images.len());
        let mut first_empty = None;
        for (index, image) in images.iter().enumerate() {
            match place(image, index, canvas, &self.executor) {
                Ok(layer) => layers.push(layer),
                Err(BlendError::EmptyFootprint { index }) => {
                    warn!("image {index} has no opaque pixels, skipping it");
                    first_empty.get_or_insert(index);
                }
                Err(err) => return Err(err),
            }
        }
        match first_empty {
            Some(index) if layers.is_empty() => Err(BlendError::EmptyFootprint { index }),
            _ => Ok(layers),
        }
    }

    /// Build the pyramids of every input, sum them band by band and collapse the result.
    fn composite<P: LayerPixel, S: ArtifactSink>(
        &self,
        inputs: Vec<BlendInput<P>>,
        union: &Plane<bool>,
        depth: ChannelDepth,
        sink: &S,
    ) -> BlendResult<Plane<P>> {
        let (w, h) = union.dimensions();
        let wrap = self.options.wraparound;
        let levels = choose_levels(w, h, wrap, self.options.levels);
        debug!("using {levels} pyramid level(s)");

        let mut accumulator = Accumulator::new(w, h, levels, wrap)?;
        for input in inputs {
            let laplacian = Pyramid::laplacian(input.pixels, &input.coverage, levels, wrap, &self.executor)?;
            drop(input.coverage);
            let mask = Pyramid::gaussian(input.mask, union, levels, wrap, &self.executor)?;
            if sink.wants_pyramids()
                && let Some(index) = input.artifact
            {
                for (level, band) in laplacian.bands().iter().enumerate() {
                    let detail = level + 1 < laplacian.levels();
                    sink.pyramid_band(index, level, &band_preview(band, depth, detail))?;
                }
            }
            accumulator.add(laplacian, mask, &self.executor);
        }

        let mut result = accumulator.finish(union, &self.executor)?;
        let max = depth.fixed().from_native(depth.max());
        result.map_in_place(|value| value.clamp_to(0, max));
        Ok(result)
    }
}

/// One image's share of a multiresolution blend.
struct BlendInput<P> {
    /// Input index for pyramid previews, if the pixels belong to a single input.
    artifact: Option<usize>,
    pixels: Plane<P>,
    coverage: Plane<bool>,
    mask: Plane<i32>,
}

/// Pixel format shared by every image.
fn common_format(images: &[SourceImage]) -> BlendResult<PixelFormat> {
    let first = images.first().ok_or(BlendError::NoImages)?;
    let expected = first.format();
    for (index, image) in images.iter().enumerate().skip(1) {
        let found = image.format();
        if found != expected {
            return Err(BlendError::PixelFormatMismatch {
                index,
                expected,
                found,
            });
        }
    }
    Ok(expected)
}

fn finish<P: LayerPixel>(layer: &Layer<P>, depth: ChannelDepth, x: i32, y: i32) -> BlendResult<Composite> {
    let pixels = P::store(layer.pixels(), depth);
    Composite::new(pixels, layer.footprint().as_image().clone(), (x, y))
}
