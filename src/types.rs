//! Core data types shared across the pipeline

use crate::error::{ChromaKeyError, Result};
use image::{imageops, DynamicImage, GrayImage, ImageBuffer, Luma, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Lifecycle of the segmentation engine binding
///
/// `Uninitialized -> Ready -> Destroyed`. Once destroyed the binding never
/// becomes ready again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessorState {
    /// Constructed, engine not yet configured
    #[default]
    Uninitialized,
    /// Engine configured and accepting submissions
    Ready,
    /// Engine released
    Destroyed,
}

impl ProcessorState {
    #[must_use]
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Ready => write!(f, "ready"),
            Self::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Fill color written over background pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChromaKeyColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl ChromaKeyColor {
    /// Pure green, the conventional chroma-key fill
    pub const GREEN: Self = Self::new(0, 255, 0);
    /// Pure blue
    pub const BLUE: Self = Self::new(0, 0, 255);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Opaque RGBA pixel for this color
    #[must_use]
    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, 255])
    }
}

impl Default for ChromaKeyColor {
    fn default() -> Self {
        Self::GREEN
    }
}

impl fmt::Display for ChromaKeyColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for ChromaKeyColor {
    type Err = ChromaKeyError;

    /// Accepts `"r,g,b"` with decimal channels or `"#rrggbb"`
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || {
            ChromaKeyError::invalid_config(format!(
                "Invalid chroma key color '{}': expected 'r,g,b' or '#rrggbb'",
                s
            ))
        };

        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(invalid());
            }
            let channel = |range: std::ops::Range<usize>| {
                hex.get(range)
                    .and_then(|part| u8::from_str_radix(part, 16).ok())
                    .ok_or_else(invalid)
            };
            return Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?));
        }

        let channels = s
            .split(',')
            .map(|part| part.trim().parse::<u8>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>>>()?;
        match channels.as_slice() {
            [r, g, b] => Ok(Self::new(*r, *g, *b)),
            _ => Err(invalid()),
        }
    }
}

/// Correlates an engine result with the ingestion call that submitted it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(uuid::Uuid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an image to be processed comes from
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Encoded file contents (PNG, JPEG, ...)
    File(Vec<u8>),
    /// Encoded image on the local filesystem
    Path(PathBuf),
    /// Remote `http(s)` URL or a `data:` URL
    Url(String),
    /// Already decoded image, passed through untouched
    Decoded(DynamicImage),
}

impl ImageSource {
    /// Short label for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Path(_) => "path",
            Self::Url(_) => "url",
            Self::Decoded(_) => "decoded",
        }
    }
}

/// RGBA pixel buffer owned by a single processing pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: RgbaImage,
}

impl Frame {
    /// Transparent black frame of the given size
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    #[must_use]
    pub fn from_rgba(pixels: RgbaImage) -> Self {
        Self { pixels }
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

    /// Pixel at `(x, y)`, `None` when out of bounds
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba<u8>> {
        self.pixels.get_pixel_checked(x, y).copied()
    }

    /// Mutable pixels in row-major order
    pub fn pixels_mut(&mut self) -> impl Iterator<Item = &mut Rgba<u8>> {
        self.pixels.pixels_mut()
    }

    #[must_use]
    pub fn as_rgba(&self) -> &RgbaImage {
        &self.pixels
    }

    #[must_use]
    pub fn into_rgba(self) -> RgbaImage {
        self.pixels
    }
}

/// Per-pixel foreground confidence (0 = background, 255 = foreground)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskImage {
    confidence: GrayImage,
}

impl MaskImage {
    #[must_use]
    pub fn from_confidence(confidence: GrayImage) -> Self {
        Self { confidence }
    }

    /// Sample the red channel of an engine-produced mask image
    #[must_use]
    pub fn from_image(image: &DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let confidence = ImageBuffer::from_fn(rgba.width(), rgba.height(), |x, y| {
            Luma([rgba.get_pixel(x, y)[0]])
        });
        Self { confidence }
    }

    /// Build a mask from row-major confidence values
    ///
    /// # Errors
    /// - `data.len()` differs from `width * height`
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let len = data.len();
        GrayImage::from_raw(width, height, data)
            .map(Self::from_confidence)
            .ok_or_else(|| {
                ChromaKeyError::invalid_config(format!(
                    "Mask data has {} values, expected {} for {}x{}",
                    len,
                    u64::from(width) * u64::from(height),
                    width,
                    height
                ))
            })
    }

    /// Mask with the same confidence everywhere
    #[must_use]
    pub fn uniform(width: u32, height: u32, confidence: u8) -> Self {
        Self {
            confidence: GrayImage::from_pixel(width, height, Luma([confidence])),
        }
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.confidence.dimensions()
    }

    #[must_use]
    pub fn confidence_at(&self, x: u32, y: u32) -> Option<u8> {
        self.confidence.get_pixel_checked(x, y).map(|p| p[0])
    }

    /// Confidence values in row-major order
    pub fn confidences(&self) -> impl Iterator<Item = u8> + '_ {
        self.confidence.as_raw().iter().copied()
    }

    /// Bilinear rescale, matching how a drawing surface stretches an image
    #[must_use]
    pub fn resized(&self, width: u32, height: u32) -> Self {
        Self {
            confidence: imageops::resize(
                &self.confidence,
                width,
                height,
                imageops::FilterType::Triangle,
            ),
        }
    }
}

/// One submission handed to the segmentation engine
#[derive(Debug, Clone)]
pub struct SegmentationRequest {
    pub id: RequestId,
    pub image: Arc<DynamicImage>,
}

/// What the engine reports back for a submission
#[derive(Debug, Clone)]
pub struct SegmentationResult {
    /// Echo of [`SegmentationRequest::id`]
    pub request_id: RequestId,
    /// The image the mask was computed for
    pub image: Arc<DynamicImage>,
    /// Foreground mask, absent when the engine found nothing to segment
    pub mask: Option<DynamicImage>,
}
