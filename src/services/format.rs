//! Output conversion service
//!
//! Encodes a composited surface into a binary blob or a `data:` URL. Both
//! conversions only read the final pixel state.

use crate::error::{ChromaKeyError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat, RgbaImage};
use std::fmt;
use std::io::Cursor;

/// MIME types the encoder can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputMime {
    #[default]
    Png,
    Jpeg,
    #[cfg(feature = "webp-support")]
    WebP,
}

impl OutputMime {
    /// Parse a MIME type string such as `image/png`
    ///
    /// # Errors
    /// - `UnsupportedFormat` for anything the encoder cannot produce
    pub fn parse(mime: &str) -> Result<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Ok(Self::Png),
            "image/jpeg" | "image/jpg" => Ok(Self::Jpeg),
            #[cfg(feature = "webp-support")]
            "image/webp" => Ok(Self::WebP),
            other => Err(ChromaKeyError::unsupported_format(other)),
        }
    }

    /// Parse a MIME type, falling back to PNG like a canvas encoder does
    #[must_use]
    pub fn parse_or_png(mime: &str) -> Self {
        Self::parse(mime).unwrap_or_else(|_| {
            log::warn!("Unsupported output MIME type '{}', encoding as image/png", mime);
            Self::Png
        })
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            #[cfg(feature = "webp-support")]
            Self::WebP => "image/webp",
        }
    }

    /// File extension without the dot
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            #[cfg(feature = "webp-support")]
            Self::WebP => "webp",
        }
    }

    #[must_use]
    pub fn supports_transparency(self) -> bool {
        !matches!(self, Self::Jpeg)
    }

    /// Guess the MIME type from a file extension
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            #[cfg(feature = "webp-support")]
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }
}

impl fmt::Display for OutputMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded image bytes tagged with their MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBlob {
    pub mime: OutputMime,
    pub bytes: Vec<u8>,
}

impl EncodedBlob {
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Encodes RGBA pixels into the supported output formats
#[derive(Debug, Clone, Copy)]
pub struct OutputEncoder {
    jpeg_quality: u8,
}

impl OutputEncoder {
    #[must_use]
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    /// Encode pixels to bytes in the given format
    ///
    /// JPEG output drops the alpha channel.
    ///
    /// # Errors
    /// - Encoder failures
    pub fn encode(&self, pixels: &RgbaImage, mime: OutputMime) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        match mime {
            OutputMime::Png => {
                pixels.write_to(&mut buffer, ImageFormat::Png)?;
            },
            OutputMime::Jpeg => {
                let rgb = DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();
                let encoder = JpegEncoder::new_with_quality(&mut buffer, self.jpeg_quality);
                rgb.write_with_encoder(encoder)?;
            },
            #[cfg(feature = "webp-support")]
            OutputMime::WebP => {
                pixels.write_to(&mut buffer, ImageFormat::WebP)?;
            },
        }
        Ok(buffer.into_inner())
    }

    /// Encode pixels into a tagged blob
    ///
    /// # Errors
    /// - Encoder failures
    pub fn to_blob(&self, pixels: &RgbaImage, mime: OutputMime) -> Result<EncodedBlob> {
        Ok(EncodedBlob {
            mime,
            bytes: self.encode(pixels, mime)?,
        })
    }

    /// Encode pixels into a base64 `data:` URL
    ///
    /// # Errors
    /// - Encoder failures
    pub fn to_data_url(&self, pixels: &RgbaImage, mime: OutputMime) -> Result<String> {
        let bytes = self.encode(pixels, mime)?;
        Ok(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
    }
}

impl Default for OutputEncoder {
    fn default() -> Self {
        Self::new(92)
    }
}
