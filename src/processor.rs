//! Chroma-key processor
//!
//! `ChromaKeyProcessor` is the public facade shared by library callers and the
//! CLI. It owns the engine binding, the result delivery, and the current
//! chroma-key color, and turns each ingestion call into exactly one awaited
//! composited surface.

use crate::{
    config::ProcessorConfig,
    delivery::ResultDelivery,
    error::{ChromaKeyError, Result},
    inference::{EngineBinding, SegmentationEngine},
    services::{EncodedBlob, SourceLoader},
    surface::DrawingSurface,
    types::{ChromaKeyColor, ImageSource, ProcessorState, SegmentationRequest},
};
use image::DynamicImage;
use instant::Instant;
use log::{debug, info};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{info as trace_info, instrument, warn};

/// Replaces image backgrounds with a chroma-key color using an injected
/// segmentation engine
pub struct ChromaKeyProcessor {
    config: ProcessorConfig,
    binding: EngineBinding,
    delivery: Arc<ResultDelivery>,
    chroma_key: Arc<RwLock<ChromaKeyColor>>,
    loader: SourceLoader,
}

impl ChromaKeyProcessor {
    /// Create a processor around `engine`
    ///
    /// The engine is not touched until [`ChromaKeyProcessor::initialize`].
    ///
    /// # Errors
    /// - `InvalidConfig` when the configuration fails validation
    /// - `Internal` when the HTTP client for URL sources cannot be built
    pub fn new(config: ProcessorConfig, engine: Box<dyn SegmentationEngine>) -> Result<Self> {
        config.validate()?;

        let chroma_key = Arc::new(RwLock::new(config.chroma_key));
        let delivery = Arc::new(ResultDelivery::new(
            config.max_in_flight,
            config.mask_scaling,
            Arc::clone(&chroma_key),
        ));
        let loader = SourceLoader::new(config.fetch_timeout())?;
        let binding = EngineBinding::new(engine, config.engine);

        Ok(Self {
            config,
            binding,
            delivery,
            chroma_key,
            loader,
        })
    }

    /// Create a processor from a concrete engine value
    ///
    /// # Errors
    /// - Same as [`ChromaKeyProcessor::new`]
    pub fn with_engine<E>(config: ProcessorConfig, engine: E) -> Result<Self>
    where
        E: SegmentationEngine + 'static,
    {
        Self::new(config, Box::new(engine))
    }

    /// Configure the engine and register the result handler
    ///
    /// Calling this again while ready is a no-op.
    ///
    /// # Errors
    /// - `EngineInvocation` when the engine rejects its configuration
    /// - `EngineNotReady` after [`ChromaKeyProcessor::teardown`]
    pub async fn initialize(&self) -> Result<()> {
        self.binding.initialize(self.delivery.handler()).await
    }

    /// Process encoded image bytes (PNG, JPEG, ...)
    pub async fn process_file(&self, bytes: Vec<u8>) -> Result<DrawingSurface> {
        self.process_source(ImageSource::File(bytes)).await
    }

    /// Process an image file on disk
    pub async fn process_path<P: AsRef<Path>>(&self, path: P) -> Result<DrawingSurface> {
        self.process_source(ImageSource::Path(path.as_ref().to_path_buf()))
            .await
    }

    /// Process an `http(s)://` or `data:` URL
    pub async fn process_url(&self, url: &str) -> Result<DrawingSurface> {
        self.process_source(ImageSource::Url(url.to_string())).await
    }

    /// Process an already decoded image
    pub async fn process_image(&self, image: DynamicImage) -> Result<DrawingSurface> {
        self.process_source(ImageSource::Decoded(image)).await
    }

    /// Load `source`, segment it, and composite the chroma-key background
    ///
    /// Every call resolves exactly once. The returned surface always has the
    /// dimensions of the loaded image.
    ///
    /// # Errors
    /// - `EngineNotReady` before initialization or after teardown
    /// - `SourceLoad` when the source cannot be read or decoded
    /// - `Busy` when `max_in_flight` requests are already waiting
    /// - `EngineInvocation` when the engine's submit call fails
    /// - `NoSegmentationResult` when the engine finds no mask
    /// - `DimensionMismatch` when the mask does not fit the image
    /// - `ResultTimeout` when `result_timeout_ms` elapses first
    #[instrument(skip(self, source), fields(source_kind = source.kind()))]
    pub async fn process_source(&self, source: ImageSource) -> Result<DrawingSurface> {
        self.binding.ensure_ready()?;
        let started = Instant::now();

        let image = self.loader.load(source).await?;
        debug!("Loaded source image {}x{}", image.width(), image.height());

        let pending = self.delivery.register()?;
        let id = pending.id();
        let request = SegmentationRequest {
            id,
            image: Arc::new(image),
        };
        if let Err(e) = self.binding.submit(request).await {
            self.delivery.cancel(id);
            return Err(e);
        }

        let outcome = match self.config.result_timeout_ms {
            Some(ms) => {
                if let Ok(outcome) =
                    tokio::time::timeout(Duration::from_millis(ms), pending.recv()).await
                {
                    outcome
                } else {
                    self.delivery.cancel(id);
                    warn!(request_id = %id, timeout_ms = ms, "Gave up waiting for segmentation result");
                    return Err(ChromaKeyError::ResultTimeout(ms));
                }
            },
            None => pending.recv().await,
        };
        let surface = outcome?;

        trace_info!(
            request_id = %id,
            width = surface.width(),
            height = surface.height(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Background replaced"
        );
        Ok(surface)
    }

    /// Change the fill color used by every later compositing pass
    pub fn set_chroma_key_color(&self, r: u8, g: u8, b: u8) {
        self.set_chroma_key(ChromaKeyColor::new(r, g, b));
    }

    pub fn set_chroma_key(&self, color: ChromaKeyColor) {
        *self
            .chroma_key
            .write()
            .unwrap_or_else(PoisonError::into_inner) = color;
        debug!("Chroma key color set to {}", color);
    }

    #[must_use]
    pub fn chroma_key_color(&self) -> ChromaKeyColor {
        *self.chroma_key.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn state(&self) -> ProcessorState {
        self.binding.state()
    }

    /// Number of requests currently waiting for an engine result
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.delivery.in_flight()
    }

    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Encode a surface; unknown MIME types fall back to PNG
    ///
    /// # Errors
    /// - Encoding failures from the image crate
    pub fn to_blob(&self, surface: &DrawingSurface, mime: &str) -> Result<EncodedBlob> {
        surface.to_blob(mime, self.config.jpeg_quality)
    }

    /// Encode a surface as a `data:` URL; unknown MIME types fall back to PNG
    ///
    /// # Errors
    /// - Encoding failures from the image crate
    pub fn to_data_url(&self, surface: &DrawingSurface, mime: &str) -> Result<String> {
        surface.to_data_url(mime, self.config.jpeg_quality)
    }

    /// Release the engine for good and fail every waiting request
    pub async fn teardown(&self) {
        self.binding.teardown().await;
        let failed = self
            .delivery
            .fail_all(|| ChromaKeyError::engine_not_ready("processor was torn down"));
        info!("Chroma-key processor torn down ({} pending requests failed)", failed);
    }
}
