#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Chroma-Key Background Replacement
//!
//! Replaces the background of still images with a solid chroma-key color,
//! driven by a person/foreground segmentation mask. The output is meant for
//! downstream keying: every pixel the mask marks as background becomes an
//! opaque fill color, every foreground pixel is left untouched.
//!
//! The segmentation model is an injected capability ([`SegmentationEngine`]).
//! This crate ships [`StaticMaskEngine`], which answers with an externally
//! supplied or generated mask; real model bindings implement the same trait.
//!
//! ## Features
//!
//! - **Hard-threshold compositing**: confidence below 128 is background
//! - **Request correlation**: each call awaits its own result; overlap beyond
//!   the configured limit fails fast with `Busy`
//! - **Ingestion**: encoded bytes, file paths, `http(s)://` and `data:` URLs,
//!   or already decoded images
//! - **Output conversion**: PNG, JPEG, WebP blobs and base64 data URLs
//! - **CLI Integration**: optional command-line tool (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chromakey_bgremove::{ChromaKeyProcessor, ProcessorConfig, StaticMaskEngine};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mask = image::open("mask.png")?;
//! let processor = ChromaKeyProcessor::with_engine(
//!     ProcessorConfig::default(),
//!     StaticMaskEngine::new(mask),
//! )?;
//! processor.initialize().await?;
//!
//! processor.set_chroma_key_color(0, 0, 255);
//! let surface = processor.process_path("photo.jpg").await?;
//! let blob = processor.to_blob(&surface, "image/png")?;
//! std::fs::write("keyed.png", &blob.bytes)?;
//!
//! processor.teardown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line tool and tracing subscriber setup
//! - `webp-support` (default): WebP output
//! - `tracing-json`: JSON log output for the CLI

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositing;
pub mod config;
pub mod delivery;
pub mod error;
pub mod inference;
pub mod processor;
pub mod services;
pub mod surface;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

// Public API exports
pub use backends::{MaskProvider, StaticMaskEngine};
pub use compositing::{ChromaKeyCompositor, CompositeStats, BACKGROUND_THRESHOLD};
pub use config::{EngineOptions, MaskScaling, ModelVariant, ProcessorConfig, ProcessorConfigBuilder};
pub use delivery::{PendingResult, ResultDelivery};
pub use error::{ChromaKeyError, Result};
pub use inference::{EngineBinding, ResultHandler, SegmentationEngine};
pub use processor::ChromaKeyProcessor;
pub use services::{EncodedBlob, OutputEncoder, OutputMime, SourceLoader};
pub use surface::DrawingSurface;
pub use types::{
    ChromaKeyColor, Frame, ImageSource, MaskImage, ProcessorState, RequestId, SegmentationRequest,
    SegmentationResult,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Replace the background of `image` using a precomputed `mask`
///
/// One-shot helper that spins up a processor around a [`StaticMaskEngine`],
/// runs a single pass, and tears it down again.
///
/// # Examples
///
/// ```rust,no_run
/// use chromakey_bgremove::{replace_background, ProcessorConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let image = image::open("photo.jpg")?;
/// let mask = image::open("photo-mask.png")?;
/// let surface = replace_background(image, mask, ProcessorConfig::default()).await?;
/// surface.as_image().save("keyed.png")?;
/// # Ok(())
/// # }
/// ```
pub async fn replace_background(
    image: image::DynamicImage,
    mask: image::DynamicImage,
    config: ProcessorConfig,
) -> Result<DrawingSurface> {
    let processor = ChromaKeyProcessor::with_engine(config, StaticMaskEngine::new(mask))?;
    processor.initialize().await?;
    let result = processor.process_image(image).await;
    processor.teardown().await;
    result
}
