//! Result delivery
//!
//! Turns the engine's push-style callback into one awaited result per
//! ingestion call. Each call registers a `RequestId` together with a fresh
//! oneshot channel; the engine echoes the ID back and the handler resolves
//! exactly that channel. At most `max_in_flight` requests may wait at once.
//! Beyond that, registration fails with `Busy` instead of displacing an
//! earlier caller.

use crate::{
    compositing::{ChromaKeyCompositor, CompositeStats},
    config::MaskScaling,
    error::{ChromaKeyError, Result},
    inference::ResultHandler,
    surface::DrawingSurface,
    types::{ChromaKeyColor, RequestId, SegmentationResult},
};
use image::DynamicImage;
use instant::Instant;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::oneshot;
use tracing::{debug, warn};

type Outcome = Result<DrawingSurface>;

struct PendingRequest {
    notifier: oneshot::Sender<Outcome>,
    registered_at: Instant,
}

/// Receiving half handed back to the ingestion call that registered
#[derive(Debug)]
pub struct PendingResult {
    id: RequestId,
    receiver: oneshot::Receiver<Outcome>,
}

impl PendingResult {
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for this request's single outcome
    ///
    /// # Errors
    /// - Whatever the pass produced (`NoSegmentationResult`,
    ///   `DimensionMismatch`, `EngineNotReady` on teardown)
    /// - `Internal` if the delivery side dropped the request without answering
    pub async fn recv(self) -> Outcome {
        let id = self.id;
        self.receiver.await.unwrap_or_else(|_| {
            Err(ChromaKeyError::internal(format!(
                "request {} was dropped without a result",
                id
            )))
        })
    }
}

/// Correlates engine results with waiting callers and runs the compositing pass
pub struct ResultDelivery {
    pending: Mutex<HashMap<RequestId, PendingRequest>>,
    max_in_flight: usize,
    mask_scaling: MaskScaling,
    chroma_key: Arc<RwLock<ChromaKeyColor>>,
}

impl ResultDelivery {
    #[must_use]
    pub fn new(
        max_in_flight: usize,
        mask_scaling: MaskScaling,
        chroma_key: Arc<RwLock<ChromaKeyColor>>,
    ) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            max_in_flight: max_in_flight.max(1),
            mask_scaling,
            chroma_key,
        }
    }

    /// Handler to register with the engine
    #[must_use]
    pub fn handler(self: &Arc<Self>) -> ResultHandler {
        let delivery = Arc::clone(self);
        Arc::new(move |result: SegmentationResult| delivery.handle_result(result))
    }

    /// Reserve a slot for a new request
    ///
    /// # Errors
    /// - `Busy` when `max_in_flight` requests are already waiting
    pub fn register(&self) -> Result<PendingResult> {
        let mut pending = self.lock_pending();
        if pending.len() >= self.max_in_flight {
            return Err(ChromaKeyError::Busy {
                in_flight: pending.len(),
            });
        }

        let id = RequestId::new();
        let (notifier, receiver) = oneshot::channel();
        pending.insert(
            id,
            PendingRequest {
                notifier,
                registered_at: Instant::now(),
            },
        );
        debug!(request_id = %id, in_flight = pending.len(), "Registered pending request");
        Ok(PendingResult { id, receiver })
    }

    /// Forget a request, e.g. after its submit failed or it timed out
    ///
    /// Returns whether the request was still pending.
    pub fn cancel(&self, id: RequestId) -> bool {
        self.lock_pending().remove(&id).is_some()
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.lock_pending().len()
    }

    /// Resolve every pending request with an error built by `make_error`
    ///
    /// Returns how many requests were failed.
    pub fn fail_all<F>(&self, make_error: F) -> usize
    where
        F: Fn() -> ChromaKeyError,
    {
        let drained: Vec<_> = self.lock_pending().drain().collect();
        let count = drained.len();
        for (id, request) in drained {
            if request.notifier.send(Err(make_error())).is_err() {
                debug!(request_id = %id, "Requester gone before failure was delivered");
            }
        }
        count
    }

    /// Engine callback: composite the result and resolve its request
    pub fn handle_result(&self, result: SegmentationResult) {
        let Some(request) = self.lock_pending().remove(&result.request_id) else {
            warn!(
                request_id = %result.request_id,
                "Dropping segmentation result with no pending request"
            );
            return;
        };

        let outcome = match result.mask.as_ref() {
            None => {
                warn!(request_id = %result.request_id, "Segmentation engine returned no mask");
                Err(ChromaKeyError::NoSegmentationResult)
            },
            Some(mask) => self.composite(&result.image, mask).map(|(surface, stats)| {
                debug!(
                    request_id = %result.request_id,
                    background_pixels = stats.background_pixels,
                    foreground_pixels = stats.foreground_pixels,
                    waited_ms = request.registered_at.elapsed().as_millis() as u64,
                    "Composited segmentation result"
                );
                surface
            }),
        };

        if request.notifier.send(outcome).is_err() {
            debug!(request_id = %result.request_id, "Requester gone before result was delivered");
        }
    }

    /// One compositing pass over `image` using `mask`
    ///
    /// # Errors
    /// - `DimensionMismatch` when the mask cannot be read at the image size
    pub fn composite(
        &self,
        image: &DynamicImage,
        mask: &DynamicImage,
    ) -> Result<(DrawingSurface, CompositeStats)> {
        let started = Instant::now();
        let mut surface = DrawingSurface::default();
        surface.resize(image.width(), image.height());
        surface.draw_image(image);

        let mut frame = surface.read_pixels();
        let mask = surface.read_mask(mask, self.mask_scaling)?;
        let color = *self.chroma_key.read().unwrap_or_else(PoisonError::into_inner);
        let stats = ChromaKeyCompositor::apply(&mut frame, &mask, color)?;
        surface.write_pixels(&frame)?;

        debug!(
            width = surface.width(),
            height = surface.height(),
            chroma_key = %color,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Compositing pass finished"
        );
        Ok((surface, stats))
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
