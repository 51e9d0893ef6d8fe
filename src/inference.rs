//! Segmentation engine abstraction and lifecycle binding
//!
//! The segmentation model is an external, stateful capability: it is
//! configured once, told where to push results, then fed images. Results come
//! back asynchronously through the registered handler, never as the return
//! value of `submit`.

use crate::{
    config::EngineOptions,
    error::{ChromaKeyError, Result},
    types::{ProcessorState, SegmentationRequest, SegmentationResult},
};
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Callback the engine invokes once per completed submission
pub type ResultHandler = Arc<dyn Fn(SegmentationResult) + Send + Sync>;

/// Trait for segmentation engines
#[async_trait]
pub trait SegmentationEngine: Send {
    /// Apply model options before any submission
    ///
    /// # Errors
    /// - Engine rejects the options or fails to load its model
    fn configure(&mut self, options: &EngineOptions) -> Result<()>;

    /// Register the single handler that receives every result
    fn register_result_handler(&mut self, handler: ResultHandler);

    /// Start segmenting an image
    ///
    /// Returns once the engine has accepted the request. The result is
    /// delivered later through the registered handler, echoing `request.id`.
    ///
    /// # Errors
    /// - Engine not configured or already released
    /// - Engine refused the image
    async fn submit(&mut self, request: SegmentationRequest) -> Result<()>;

    /// Free engine resources; no further calls are made afterwards
    fn release(&mut self);

    /// Engine name for logging
    fn name(&self) -> &str {
        "segmentation-engine"
    }
}

/// Owns an engine and gates access to it by [`ProcessorState`]
pub struct EngineBinding {
    engine: Mutex<Option<Box<dyn SegmentationEngine>>>,
    state: RwLock<ProcessorState>,
    options: EngineOptions,
}

impl EngineBinding {
    #[must_use]
    pub fn new(engine: Box<dyn SegmentationEngine>, options: EngineOptions) -> Self {
        Self {
            engine: Mutex::new(Some(engine)),
            state: RwLock::new(ProcessorState::Uninitialized),
            options,
        }
    }

    #[must_use]
    pub fn state(&self) -> ProcessorState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ProcessorState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Fail with `EngineNotReady` unless the binding is `Ready`
    ///
    /// # Errors
    /// - `EngineNotReady` in any other state
    pub fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            ProcessorState::Ready => Ok(()),
            ProcessorState::Uninitialized => Err(ChromaKeyError::engine_not_ready(
                "initialize() has not completed",
            )),
            ProcessorState::Destroyed => Err(ChromaKeyError::engine_not_ready(
                "engine has been torn down",
            )),
        }
    }

    /// Configure the engine, register `handler`, and become `Ready`
    ///
    /// Calling this again while `Ready` is a no-op. A failed configure leaves
    /// the binding `Uninitialized` so the call can be retried.
    ///
    /// # Errors
    /// - `EngineNotReady` after teardown
    /// - `EngineInvocation` when the engine rejects its configuration
    pub async fn initialize(&self, handler: ResultHandler) -> Result<()> {
        let mut guard = self.engine.lock().await;
        match self.state() {
            ProcessorState::Ready => return Ok(()),
            ProcessorState::Destroyed => {
                return Err(ChromaKeyError::engine_not_ready(
                    "engine has been torn down and cannot be reinitialized",
                ))
            },
            ProcessorState::Uninitialized => {},
        }

        let engine = guard
            .as_mut()
            .ok_or_else(|| ChromaKeyError::internal("engine missing before teardown"))?;

        info!(engine = engine.name(), options = ?self.options, "Initializing segmentation engine");
        engine
            .configure(&self.options)
            .map_err(|e| Self::invocation_error("configure", e))?;
        engine.register_result_handler(handler);

        self.set_state(ProcessorState::Ready);
        info!(engine = engine.name(), "Segmentation engine ready");
        Ok(())
    }

    /// Forward a request to the engine
    ///
    /// # Errors
    /// - `EngineNotReady` unless `Ready`
    /// - `EngineInvocation` when the engine's submit call fails
    pub async fn submit(&self, request: SegmentationRequest) -> Result<()> {
        let mut guard = self.engine.lock().await;
        self.ensure_ready()?;
        let engine = guard
            .as_mut()
            .ok_or_else(|| ChromaKeyError::engine_not_ready("engine has been released"))?;

        debug!(
            request_id = %request.id,
            width = request.image.width(),
            height = request.image.height(),
            "Submitting image to segmentation engine"
        );
        engine
            .submit(request)
            .await
            .map_err(|e| Self::invocation_error("submit", e))
    }

    /// Release the engine and move to `Destroyed` for good
    pub async fn teardown(&self) {
        let mut guard = self.engine.lock().await;
        if let Some(mut engine) = guard.take() {
            engine.release();
            info!(engine = engine.name(), "Segmentation engine released");
        }
        self.set_state(ProcessorState::Destroyed);
    }

    fn invocation_error(stage: &str, error: ChromaKeyError) -> ChromaKeyError {
        match error {
            invocation @ ChromaKeyError::EngineInvocation(_) => invocation,
            other => ChromaKeyError::engine_invocation(format!("{} failed: {}", stage, other)),
        }
    }
}
