use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, ImageBuffer, LumaA, RgbImage, Rgba};
use log::debug;

use crate::error::{BlendError, BlendResult};
use crate::source::SourcePixels;

/// Blended output: pixels on the union canvas, a binary alpha, and the canvas origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    pixels: SourcePixels,
    alpha: GrayImage,
    offset: (i32, i32),
}

impl Composite {
    pub fn new(pixels: SourcePixels, alpha: GrayImage, offset: (i32, i32)) -> BlendResult<Self> {
        let expected = pixels.dimensions();
        let found = alpha.dimensions();
        if expected != found {
            return Err(BlendError::AlphaMismatch { expected, found });
        }
        Ok(Self {
            pixels,
            alpha,
            offset,
        })
    }

    pub fn pixels(&self) -> &SourcePixels {
        &self.pixels
    }

    /// 255 where any input covered the pixel.
    pub fn alpha(&self) -> &GrayImage {
        &self.alpha
    }

    /// Position of the canvas origin in input coordinates.
    pub fn offset(&self) -> (i32, i32) {
        self.offset
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Pixels and alpha combined into one image of the input depth.
    pub fn to_dynamic(&self) -> DynamicImage {
        compose_output(&self.pixels, &self.alpha)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> BlendResult<()> {
        self.to_dynamic().save(path.as_ref())?;
        Ok(())
    }
}

/// Attach an alpha channel to blended pixels. Both must have the same size.
fn compose_output(pixels: &SourcePixels, alpha: &GrayImage) -> DynamicImage {
    let (w, h) = pixels.dimensions();
    let a = |x: u32, y: u32| alpha.get_pixel(x, y)[0];
    match pixels {
        SourcePixels::Luma8(img) => DynamicImage::ImageLumaA8(ImageBuffer::from_fn(w, h, |x, y| {
            LumaA([img.get_pixel(x, y)[0], a(x, y)])
        })),
        SourcePixels::Rgb8(img) => DynamicImage::ImageRgba8(ImageBuffer::from_fn(w, h, |x, y| {
            let [r, g, b] = img.get_pixel(x, y).0;
            Rgba([r, g, b, a(x, y)])
        })),
        SourcePixels::Luma16(img) => DynamicImage::ImageLumaA16(ImageBuffer::from_fn(w, h, |x, y| {
            LumaA([img.get_pixel(x, y)[0], wide_alpha(a(x, y))])
        })),
        SourcePixels::Rgb16(img) => DynamicImage::ImageRgba16(ImageBuffer::from_fn(w, h, |x, y| {
            let [r, g, b] = img.get_pixel(x, y).0;
            Rgba([r, g, b, wide_alpha(a(x, y))])
        })),
    }
}

fn wide_alpha(value: u8) -> u16 {
    value as u16 * 257
}

/// Receiver for intermediate rasters produced while blending.
///
/// `index` is the position of the incoming image in the input list. Every
/// method defaults to doing nothing.
pub trait ArtifactSink {
    /// Whether seam visualizations should be rendered at all.
    fn wants_visualization(&self) -> bool {
        false
    }

    /// Whether pyramid band previews should be rendered at all.
    fn wants_pyramids(&self) -> bool {
        false
    }

    /// Blend mask of one image, 255 where it carries full weight.
    fn seam_mask(&self, _index: usize, _mask: &GrayImage) -> BlendResult<()> {
        Ok(())
    }

    fn seam_visualization(&self, _index: usize, _image: &RgbImage) -> BlendResult<()> {
        Ok(())
    }

    fn pyramid_band(&self, _index: usize, _level: usize, _band: &GrayImage) -> BlendResult<()> {
        Ok(())
    }
}

/// Drops every artifact.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArtifacts;

impl ArtifactSink for NoArtifacts {}

/// Writes artifacts as numbered PNG files into a directory.
#[derive(Debug, Clone)]
pub struct ArtifactDirectory {
    root: PathBuf,
    visualize: bool,
    pyramids: bool,
}

impl ArtifactDirectory {
    /// Create `root` if needed. Seam masks are always written.
    pub fn new(root: impl Into<PathBuf>) -> BlendResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            visualize: false,
            pyramids: false,
        })
    }

    /// Also write seam visualizations.
    pub fn with_visualization(mut self, enabled: bool) -> Self {
        self.visualize = enabled;
        self
    }

    /// Also write previews of every pyramid band.
    pub fn with_pyramids(mut self, enabled: bool) -> Self {
        self.pyramids = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: String) -> PathBuf {
        self.root.join(name)
    }
}

impl ArtifactSink for ArtifactDirectory {
    fn wants_visualization(&self) -> bool {
        self.visualize
    }

    fn wants_pyramids(&self) -> bool {
        self.pyramids
    }

    fn seam_mask(&self, index: usize, mask: &GrayImage) -> BlendResult<()> {
        let path = self.path(format!("seam-mask-{:04}.png", index));
        mask.save(&path)?;
        debug!("seam mask written to {}", path.display());
        Ok(())
    }

    fn seam_visualization(&self, index: usize, image: &RgbImage) -> BlendResult<()> {
        let path = self.path(format!("seam-visual-{:04}.png", index));
        image.save(&path)?;
        debug!("seam visualization written to {}", path.display());
        Ok(())
    }

    fn pyramid_band(&self, index: usize, level: usize, band: &GrayImage) -> BlendResult<()> {
        let path = self.path(format!("pyramid-{:04}-level-{:02}.png", index, level));
        band.save(&path)?;
        Ok(())
    }
}
