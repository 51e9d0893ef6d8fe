//! Engine backed by an externally supplied mask
//!
//! Useful when segmentation already happened elsewhere (a mask file next to
//! the photo, a mask computed by another service) and as a deterministic
//! stand-in for a real model. Results are delivered from a spawned task, so
//! callers observe the same asynchronous behavior as with a model-backed
//! engine.

use crate::{
    config::EngineOptions,
    error::{ChromaKeyError, Result},
    inference::{ResultHandler, SegmentationEngine},
    types::{SegmentationRequest, SegmentationResult},
};
use async_trait::async_trait;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Duration;

/// Produces a mask for an input image, or `None` when nothing was found
pub type MaskProvider = Arc<dyn Fn(&DynamicImage) -> Option<DynamicImage> + Send + Sync>;

/// Segmentation engine that answers with a precomputed or generated mask
pub struct StaticMaskEngine {
    provider: MaskProvider,
    latency: Option<Duration>,
    options: Option<EngineOptions>,
    handler: Option<ResultHandler>,
    released: bool,
}

impl StaticMaskEngine {
    /// Answer every submission with `mask`
    #[must_use]
    pub fn new(mask: DynamicImage) -> Self {
        let mask = Arc::new(mask);
        Self::from_fn(move |_| Some(mask.as_ref().clone()))
    }

    /// Compute each mask from the submitted image
    ///
    /// The provider always sees the image as submitted. With `mirror_input`
    /// set, its mask is flipped together with the image.
    pub fn from_fn<F>(provider: F) -> Self
    where
        F: Fn(&DynamicImage) -> Option<DynamicImage> + Send + Sync + 'static,
    {
        Self {
            provider: Arc::new(provider),
            latency: None,
            options: None,
            handler: None,
            released: false,
        }
    }

    /// Delay each result, simulating inference time
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn segment(
        request: SegmentationRequest,
        provider: &MaskProvider,
        mirror_input: bool,
    ) -> SegmentationResult {
        let mask = provider(request.image.as_ref());
        let (image, mask) = if mirror_input {
            (
                Arc::new(request.image.fliph()),
                mask.map(|mask| mask.fliph()),
            )
        } else {
            (request.image, mask)
        };
        SegmentationResult {
            request_id: request.id,
            image,
            mask,
        }
    }
}

#[async_trait]
impl SegmentationEngine for StaticMaskEngine {
    fn configure(&mut self, options: &EngineOptions) -> Result<()> {
        if self.released {
            return Err(ChromaKeyError::engine_invocation("engine already released"));
        }
        tracing::debug!(
            model_variant = ?options.model_variant,
            mirror_input = options.mirror_input,
            "Static mask engine configured"
        );
        self.options = Some(*options);
        Ok(())
    }

    fn register_result_handler(&mut self, handler: ResultHandler) {
        self.handler = Some(handler);
    }

    async fn submit(&mut self, request: SegmentationRequest) -> Result<()> {
        if self.released {
            return Err(ChromaKeyError::engine_invocation("engine already released"));
        }
        let options = self
            .options
            .ok_or_else(|| ChromaKeyError::engine_invocation("submit before configure"))?;
        let handler = self
            .handler
            .clone()
            .ok_or_else(|| ChromaKeyError::engine_invocation("no result handler registered"))?;
        let provider = Arc::clone(&self.provider);
        let latency = self.latency;

        tokio::spawn(async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            handler(Self::segment(request, &provider, options.mirror_input));
        });
        Ok(())
    }

    fn release(&mut self) {
        self.handler = None;
        self.released = true;
    }

    fn name(&self) -> &str {
        "static-mask"
    }
}
