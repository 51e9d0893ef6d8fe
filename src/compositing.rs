//! Chroma-key compositing
//!
//! Replaces every background pixel of a [`Frame`] with the chroma-key color.
//! A pixel is background when its mask confidence is below
//! [`BACKGROUND_THRESHOLD`]; foreground pixels are left byte-for-byte intact.
//! There is no blending at the boundary, so reapplying the same mask to an
//! already composited frame is a no-op.

use crate::{
    error::{ChromaKeyError, Result},
    types::{ChromaKeyColor, Frame, MaskImage},
};

/// Confidence at or above which a pixel counts as foreground
pub const BACKGROUND_THRESHOLD: u8 = 128;

/// Pixel counts from one compositing pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompositeStats {
    pub background_pixels: u64,
    pub foreground_pixels: u64,
}

impl CompositeStats {
    #[must_use]
    pub fn total_pixels(&self) -> u64 {
        self.background_pixels + self.foreground_pixels
    }

    /// Share of the frame replaced by the chroma key, 0.0 for an empty frame
    #[must_use]
    pub fn background_ratio(&self) -> f64 {
        match self.total_pixels() {
            0 => 0.0,
            total => self.background_pixels as f64 / total as f64,
        }
    }
}

/// Stateless hard-threshold compositor
pub struct ChromaKeyCompositor;

impl ChromaKeyCompositor {
    /// Whether a confidence value classifies its pixel as background
    #[must_use]
    pub fn is_background(confidence: u8) -> bool {
        confidence < BACKGROUND_THRESHOLD
    }

    /// Overwrite background pixels of `frame` in place
    ///
    /// # Errors
    /// - `DimensionMismatch` when frame and mask sizes differ; the frame is
    ///   left untouched
    pub fn apply(
        frame: &mut Frame,
        mask: &MaskImage,
        color: ChromaKeyColor,
    ) -> Result<CompositeStats> {
        if frame.dimensions() != mask.dimensions() {
            return Err(ChromaKeyError::dimension_mismatch(
                frame.dimensions(),
                mask.dimensions(),
            ));
        }

        let fill = color.to_rgba();
        let mut stats = CompositeStats::default();

        for (pixel, confidence) in frame.pixels_mut().zip(mask.confidences()) {
            if Self::is_background(confidence) {
                *pixel = fill;
                stats.background_pixels += 1;
            } else {
                stats.foreground_pixels += 1;
            }
        }

        Ok(stats)
    }
}
