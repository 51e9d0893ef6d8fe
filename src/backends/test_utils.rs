//! Test utilities and a mock segmentation engine
//!
//! `MockEngine` is cloneable; every clone shares the same state, so a test can
//! box one clone into a processor and keep another to inspect calls and to
//! decide when results are delivered.

use crate::{
    config::EngineOptions,
    error::{ChromaKeyError, Result},
    inference::{ResultHandler, SegmentationEngine},
    types::{SegmentationRequest, SegmentationResult},
};
use async_trait::async_trait;
use image::{DynamicImage, GrayImage, Luma};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Mask the mock reports for each request
#[derive(Debug, Clone)]
pub enum MockMask {
    /// Same-size mask with full confidence everywhere
    Foreground,
    /// Same-size mask with zero confidence everywhere
    Background,
    /// No mask at all
    Missing,
    /// This exact image, whatever the request size
    Fixed(DynamicImage),
}

#[derive(Default)]
struct MockState {
    calls: Vec<String>,
    handler: Option<ResultHandler>,
    options: Option<EngineOptions>,
    pending: VecDeque<SegmentationRequest>,
    fail_configure: bool,
    fail_submit: bool,
    auto_respond: bool,
    mask: Option<MockMask>,
}

/// Mock engine that holds submissions until told to respond
#[derive(Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond synchronously from inside `submit`
    #[must_use]
    pub fn auto_respond(self, enabled: bool) -> Self {
        self.state.lock().unwrap().auto_respond = enabled;
        self
    }

    #[must_use]
    pub fn with_mask(self, mask: MockMask) -> Self {
        self.state.lock().unwrap().mask = Some(mask);
        self
    }

    #[must_use]
    pub fn failing_configure(self, fail: bool) -> Self {
        self.set_fail_configure(fail);
        self
    }

    pub fn set_fail_configure(&self, fail: bool) {
        self.state.lock().unwrap().fail_configure = fail;
    }

    pub fn set_fail_submit(&self, fail: bool) {
        self.state.lock().unwrap().fail_submit = fail;
    }

    pub fn call_history(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn configured_options(&self) -> Option<EngineOptions> {
        self.state.lock().unwrap().options
    }

    pub fn pending_requests(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Deliver the result for the oldest held request
    ///
    /// Returns `false` when nothing is pending.
    pub fn respond_next(&self) -> bool {
        let (request, mask) = {
            let mut state = self.state.lock().unwrap();
            match state.pending.pop_front() {
                Some(request) => (request, state.mask.clone().unwrap_or(MockMask::Foreground)),
                None => return false,
            }
        };
        self.respond_with(Self::build_result(request, &mask));
        true
    }

    /// Push an arbitrary result through the registered handler
    pub fn respond_with(&self, result: SegmentationResult) {
        let handler = self.state.lock().unwrap().handler.clone();
        if let Some(handler) = handler {
            handler(result);
        }
    }

    fn build_result(request: SegmentationRequest, mask: &MockMask) -> SegmentationResult {
        let (width, height) = (request.image.width(), request.image.height());
        let mask = match mask {
            MockMask::Foreground => Some(DynamicImage::ImageLuma8(GrayImage::from_pixel(
                width,
                height,
                Luma([255]),
            ))),
            MockMask::Background => Some(DynamicImage::ImageLuma8(GrayImage::from_pixel(
                width,
                height,
                Luma([0]),
            ))),
            MockMask::Missing => None,
            MockMask::Fixed(image) => Some(image.clone()),
        };
        SegmentationResult {
            request_id: request.id,
            image: request.image,
            mask,
        }
    }

    fn record_call(state: &mut MockState, method: &str) {
        state.calls.push(method.to_string());
    }
}

#[async_trait]
impl SegmentationEngine for MockEngine {
    fn configure(&mut self, options: &EngineOptions) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        Self::record_call(&mut state, "configure");
        if state.fail_configure {
            return Err(ChromaKeyError::internal("mock configure failure"));
        }
        state.options = Some(*options);
        Ok(())
    }

    fn register_result_handler(&mut self, handler: ResultHandler) {
        let mut state = self.state.lock().unwrap();
        Self::record_call(&mut state, "register_result_handler");
        state.handler = Some(handler);
    }

    async fn submit(&mut self, request: SegmentationRequest) -> Result<()> {
        let auto_respond = {
            let mut state = self.state.lock().unwrap();
            Self::record_call(&mut state, "submit");
            if state.fail_submit {
                return Err(ChromaKeyError::internal("mock submit failure"));
            }
            state.pending.push_back(request);
            state.auto_respond
        };
        if auto_respond {
            self.respond_next();
        }
        Ok(())
    }

    fn release(&mut self) {
        let mut state = self.state.lock().unwrap();
        Self::record_call(&mut state, "release");
        state.handler = None;
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestId;

    #[tokio::test]
    async fn test_mock_holds_until_respond() {
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);

        let mut engine = MockEngine::new().with_mask(MockMask::Background);
        engine.configure(&EngineOptions::default()).unwrap();
        engine.register_result_handler(Arc::new(move |result: SegmentationResult| {
            sink.lock().unwrap().push(result.request_id);
        }));

        let id = RequestId::new();
        engine
            .submit(SegmentationRequest {
                id,
                image: Arc::new(DynamicImage::new_rgba8(2, 2)),
            })
            .await
            .unwrap();

        assert_eq!(engine.pending_requests(), 1);
        assert!(delivered.lock().unwrap().is_empty());

        assert!(engine.respond_next());
        assert!(!engine.respond_next());
        assert_eq!(*delivered.lock().unwrap(), vec![id]);
    }
}
