//! Drawing surface the pipeline reads from and writes back to
//!
//! Mirrors the handful of canvas operations the compositing pass needs:
//! resize, draw an image, read and write RGBA pixels, read a mask at the
//! surface's own size, and encode the final pixels.

use crate::{
    config::MaskScaling,
    error::{ChromaKeyError, Result},
    services::format::{EncodedBlob, OutputEncoder, OutputMime},
    types::{Frame, MaskImage},
};
use image::{imageops, DynamicImage, RgbaImage};

/// RGBA surface holding the composited result of a pass
///
/// The default surface is empty (0x0) until resized.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DrawingSurface {
    pixels: RgbaImage,
}

impl DrawingSurface {
    /// Transparent surface of the given size
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Resize the surface, clearing its contents
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pixels = RgbaImage::new(width, height);
    }

    /// Draw `image` at the origin, stretched to fill the surface
    pub fn draw_image(&mut self, image: &DynamicImage) {
        let (width, height) = self.dimensions();
        self.pixels = if (image.width(), image.height()) == (width, height) {
            image.to_rgba8()
        } else {
            imageops::resize(
                &image.to_rgba8(),
                width,
                height,
                imageops::FilterType::Triangle,
            )
        };
    }

    /// Copy the surface pixels out into a frame
    #[must_use]
    pub fn read_pixels(&self) -> Frame {
        Frame::from_rgba(self.pixels.clone())
    }

    /// Copy a frame back onto the surface
    ///
    /// # Errors
    /// - `DimensionMismatch` when the frame size differs from the surface
    pub fn write_pixels(&mut self, frame: &Frame) -> Result<()> {
        if frame.dimensions() != self.dimensions() {
            return Err(ChromaKeyError::dimension_mismatch(
                self.dimensions(),
                frame.dimensions(),
            ));
        }
        self.pixels.copy_from_slice(frame.as_rgba().as_raw());
        Ok(())
    }

    /// Read `mask` at the surface's dimensions
    ///
    /// # Errors
    /// - `DimensionMismatch` under [`MaskScaling::Strict`] when sizes differ
    pub fn read_mask(&self, mask: &DynamicImage, scaling: MaskScaling) -> Result<MaskImage> {
        let sampled = MaskImage::from_image(mask);
        if sampled.dimensions() == self.dimensions() {
            return Ok(sampled);
        }
        match scaling {
            MaskScaling::Strict => Err(ChromaKeyError::dimension_mismatch(
                self.dimensions(),
                sampled.dimensions(),
            )),
            MaskScaling::Resize => {
                tracing::debug!(
                    from = ?sampled.dimensions(),
                    to = ?self.dimensions(),
                    "Stretching mask to surface"
                );
                Ok(sampled.resized(self.width(), self.height()))
            },
        }
    }

    #[must_use]
    pub fn as_image(&self) -> &RgbaImage {
        &self.pixels
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    /// Encode the surface as a binary image
    ///
    /// Unknown MIME types fall back to PNG.
    ///
    /// # Errors
    /// - Encoder failures
    pub fn to_blob(&self, mime: &str, jpeg_quality: u8) -> Result<EncodedBlob> {
        OutputEncoder::new(jpeg_quality).to_blob(&self.pixels, OutputMime::parse_or_png(mime))
    }

    /// Encode the surface as a `data:` URL
    ///
    /// # Errors
    /// - Encoder failures
    pub fn to_data_url(&self, mime: &str, jpeg_quality: u8) -> Result<String> {
        OutputEncoder::new(jpeg_quality).to_data_url(&self.pixels, OutputMime::parse_or_png(mime))
    }
}

impl From<RgbaImage> for DrawingSurface {
    fn from(pixels: RgbaImage) -> Self {
        Self { pixels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba};

    #[test]
    fn test_draw_then_read_round_trips_pixels() {
        let source = RgbaImage::from_fn(3, 2, |x, y| Rgba([x as u8, y as u8, 9, 200]));
        let mut surface = DrawingSurface::new(3, 2);
        surface.draw_image(&DynamicImage::ImageRgba8(source.clone()));

        assert_eq!(surface.read_pixels().into_rgba(), source);
    }

    #[test]
    fn test_draw_stretches_to_surface() {
        let mut surface = DrawingSurface::new(4, 4);
        surface.draw_image(&DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            2,
            2,
            Rgba([50, 60, 70, 255]),
        )));
        assert_eq!(surface.dimensions(), (4, 4));
        assert!(surface.as_image().pixels().all(|p| *p == Rgba([50, 60, 70, 255])));
    }

    #[test]
    fn test_resize_clears() {
        let surface = DrawingSurface::default();
        assert_eq!(surface.dimensions(), (0, 0));

        let mut surface = DrawingSurface::from(RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 4])));
        surface.resize(5, 1);
        assert_eq!(surface.dimensions(), (5, 1));
        assert!(surface.as_image().pixels().all(|p| *p == Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn test_write_pixels_checks_dimensions() {
        let mut surface = DrawingSurface::new(2, 2);
        let frame = Frame::from_rgba(RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 9])));
        surface.write_pixels(&frame).unwrap();
        assert_eq!(surface.as_image(), frame.as_rgba());

        let err = surface.write_pixels(&Frame::new(3, 2)).unwrap_err();
        assert!(matches!(err, ChromaKeyError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_read_mask_strict_and_resize() {
        let surface = DrawingSurface::new(4, 4);
        let small = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([255])));

        let err = surface.read_mask(&small, MaskScaling::Strict).unwrap_err();
        assert!(matches!(
            err,
            ChromaKeyError::DimensionMismatch {
                frame: (4, 4),
                mask: (2, 2)
            }
        ));

        let mask = surface.read_mask(&small, MaskScaling::Resize).unwrap();
        assert_eq!(mask.dimensions(), (4, 4));
        assert!(mask.confidences().all(|c| c == 255));
    }

    #[test]
    fn test_data_url_prefix() {
        let surface = DrawingSurface::new(1, 1);
        let url = surface.to_data_url("image/png", 92).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }
}
