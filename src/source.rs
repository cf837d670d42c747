use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

use crate::error::{BlendError, BlendResult};
use crate::fixed::{ChannelDepth, PyramidPixel};
use crate::footprint::{Footprint, Rect};
use crate::plane::Plane;

/// 16-bit grayscale buffer.
pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;
/// 16-bit RGB buffer.
pub type Rgb16Image = ImageBuffer<Rgb<u16>, Vec<u16>>;

/// Pixel layout of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Luma8,
    Rgb8,
    Luma16,
    Rgb16,
}

impl PixelFormat {
    pub fn depth(self) -> ChannelDepth {
        match self {
            PixelFormat::Luma8 | PixelFormat::Rgb8 => ChannelDepth::U8,
            PixelFormat::Luma16 | PixelFormat::Rgb16 => ChannelDepth::U16,
        }
    }

    pub fn is_color(self) -> bool {
        matches!(self, PixelFormat::Rgb8 | PixelFormat::Rgb16)
    }
}

/// Decoded pixels of one source image, without alpha.
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePixels {
    Luma8(GrayImage),
    Rgb8(RgbImage),
    Luma16(Gray16Image),
    Rgb16(Rgb16Image),
}

impl SourcePixels {
    pub fn format(&self) -> PixelFormat {
        match self {
            SourcePixels::Luma8(_) => PixelFormat::Luma8,
            SourcePixels::Rgb8(_) => PixelFormat::Rgb8,
            SourcePixels::Luma16(_) => PixelFormat::Luma16,
            SourcePixels::Rgb16(_) => PixelFormat::Rgb16,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            SourcePixels::Luma8(img) => img.dimensions(),
            SourcePixels::Rgb8(img) => img.dimensions(),
            SourcePixels::Luma16(img) => img.dimensions(),
            SourcePixels::Rgb16(img) => img.dimensions(),
        }
    }

    /// Native channel values of one pixel; grayscale pixels repeat their value.
    fn channels(&self, x: u32, y: u32) -> [u32; 3] {
        match self {
            SourcePixels::Luma8(img) => [img.get_pixel(x, y)[0] as u32; 3],
            SourcePixels::Rgb8(img) => img.get_pixel(x, y).0.map(|c| c as u32),
            SourcePixels::Luma16(img) => [img.get_pixel(x, y)[0] as u32; 3],
            SourcePixels::Rgb16(img) => img.get_pixel(x, y).0.map(|c| c as u32),
        }
    }
}

/// Band pixel types that can be loaded from and stored to [`SourcePixels`].
pub trait LayerPixel: PyramidPixel {
    /// Fixed-point value of the source pixel at `(x, y)`.
    fn sample(pixels: &SourcePixels, x: u32, y: u32) -> Self;

    /// Round a plane back into native pixels of the given depth.
    fn store(plane: &Plane<Self>, depth: ChannelDepth) -> SourcePixels;
}

impl LayerPixel for i32 {
    fn sample(pixels: &SourcePixels, x: u32, y: u32) -> i32 {
        let fixed = pixels.format().depth().fixed();
        fixed.from_native(pixels.channels(x, y)[0])
    }

    fn store(plane: &Plane<i32>, depth: ChannelDepth) -> SourcePixels {
        let fixed = depth.fixed();
        let (w, h) = (plane.width() as u32, plane.height() as u32);
        let native = |x: u32, y: u32| fixed.to_native(plane.get(x as usize, y as usize), depth.max());
        match depth {
            ChannelDepth::U8 => {
                SourcePixels::Luma8(GrayImage::from_fn(w, h, |x, y| Luma([native(x, y) as u8])))
            }
            ChannelDepth::U16 => SourcePixels::Luma16(Gray16Image::from_fn(w, h, |x, y| {
                Luma([native(x, y) as u16])
            })),
        }
    }
}

impl LayerPixel for [i32; 3] {
    fn sample(pixels: &SourcePixels, x: u32, y: u32) -> [i32; 3] {
        let fixed = pixels.format().depth().fixed();
        pixels.channels(x, y).map(|c| fixed.from_native(c))
    }

    fn store(plane: &Plane<[i32; 3]>, depth: ChannelDepth) -> SourcePixels {
        let fixed = depth.fixed();
        let (w, h) = (plane.width() as u32, plane.height() as u32);
        let native = |x: u32, y: u32| {
            plane
                .get(x as usize, y as usize)
                .map(|c| fixed.to_native(c, depth.max()))
        };
        match depth {
            ChannelDepth::U8 => SourcePixels::Rgb8(RgbImage::from_fn(w, h, |x, y| {
                Rgb(native(x, y).map(|c| c as u8))
            })),
            ChannelDepth::U16 => SourcePixels::Rgb16(Rgb16Image::from_fn(w, h, |x, y| {
                Rgb(native(x, y).map(|c| c as u16))
            })),
        }
    }
}

/// One positioned input: pixels, a binary footprint and an offset on the output canvas.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pixels: SourcePixels,
    footprint: Footprint,
    offset: (i32, i32),
}

impl SourceImage {
    /// Pair pixels with an alpha channel of the same size.
    pub fn new(pixels: SourcePixels, alpha: &GrayImage) -> BlendResult<Self> {
        let expected = pixels.dimensions();
        let found = alpha.dimensions();
        if expected != found {
            return Err(BlendError::AlphaMismatch { expected, found });
        }
        Ok(Self {
            pixels,
            footprint: Footprint::from_alpha(alpha),
            offset: (0, 0),
        })
    }

    /// Pixels that cover their whole extent.
    pub fn opaque(pixels: SourcePixels) -> Self {
        let (w, h) = pixels.dimensions();
        Self {
            pixels,
            footprint: Footprint::full(w, h),
            offset: (0, 0),
        }
    }

    /// Split a decoded image into pixels and footprint.
    pub fn from_dynamic(image: DynamicImage) -> BlendResult<Self> {
        match image {
            DynamicImage::ImageLuma8(img) => Ok(Self::opaque(SourcePixels::Luma8(img))),
            DynamicImage::ImageRgb8(img) => Ok(Self::opaque(SourcePixels::Rgb8(img))),
            DynamicImage::ImageLuma16(img) => Ok(Self::opaque(SourcePixels::Luma16(img))),
            DynamicImage::ImageRgb16(img) => Ok(Self::opaque(SourcePixels::Rgb16(img))),
            DynamicImage::ImageLumaA8(img) => {
                let pixels = GrayImage::from_fn(img.width(), img.height(), |x, y| {
                    Luma([img.get_pixel(x, y)[0]])
                });
                let alpha = alpha_of(img.width(), img.height(), |x, y| img.get_pixel(x, y)[1] != 0);
                Self::new(SourcePixels::Luma8(pixels), &alpha)
            }
            DynamicImage::ImageRgba8(img) => {
                let pixels = RgbImage::from_fn(img.width(), img.height(), |x, y| {
                    let [r, g, b, _] = img.get_pixel(x, y).0;
                    Rgb([r, g, b])
                });
                let alpha = alpha_of(img.width(), img.height(), |x, y| img.get_pixel(x, y)[3] != 0);
                Self::new(SourcePixels::Rgb8(pixels), &alpha)
            }
            DynamicImage::ImageLumaA16(img) => {
                let pixels = Gray16Image::from_fn(img.width(), img.height(), |x, y| {
                    Luma([img.get_pixel(x, y)[0]])
                });
                let alpha = alpha_of(img.width(), img.height(), |x, y| img.get_pixel(x, y)[1] != 0);
                Self::new(SourcePixels::Luma16(pixels), &alpha)
            }
            DynamicImage::ImageRgba16(img) => {
                let pixels = Rgb16Image::from_fn(img.width(), img.height(), |x, y| {
                    let [r, g, b, _] = img.get_pixel(x, y).0;
                    Rgb([r, g, b])
                });
                let alpha = alpha_of(img.width(), img.height(), |x, y| img.get_pixel(x, y)[3] != 0);
                Self::new(SourcePixels::Rgb16(pixels), &alpha)
            }
            other => Err(BlendError::UnsupportedFormat(other.color())),
        }
    }

    /// Place the image at `(x, y)` on the output canvas.
    pub fn with_offset(mut self, x: i32, y: i32) -> Self {
        self.offset = (x, y);
        self
    }

    pub fn pixels(&self) -> &SourcePixels {
        &self.pixels
    }

    pub fn footprint(&self) -> &Footprint {
        &self.footprint
    }

    pub fn offset(&self) -> (i32, i32) {
        self.offset
    }

    pub fn format(&self) -> PixelFormat {
        self.pixels.format()
    }

    /// Extent of the image on the output canvas.
    pub fn rect(&self) -> Rect {
        let (w, h) = self.pixels.dimensions();
        Rect::new(self.offset.0, self.offset.1, w, h)
    }
}

fn alpha_of(width: u32, height: u32, covered: impl Fn(u32, u32) -> bool) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        Luma([if covered(x, y) { 255 } else { 0 }])
    })
}
