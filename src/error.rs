//! Error types for chroma-key background replacement

use thiserror::Error;

/// Result type alias for chroma-key operations
pub type Result<T> = std::result::Result<T, ChromaKeyError>;

/// Error kinds surfaced by the processing pipeline
#[derive(Error, Debug)]
pub enum ChromaKeyError {
    /// Operation attempted while the segmentation engine is not `Ready`
    #[error("Segmentation engine not ready: {0}")]
    EngineNotReady(String),

    /// The source image could not be read or decoded
    #[error("Failed to load image source: {0}")]
    SourceLoad(String),

    /// Frame and mask disagree on size
    #[error("Dimension mismatch: frame is {}x{}, mask is {}x{}", frame.0, frame.1, mask.0, mask.1)]
    DimensionMismatch {
        /// Frame dimensions (width, height)
        frame: (u32, u32),
        /// Mask dimensions (width, height)
        mask: (u32, u32),
    },

    /// The external engine rejected a configure or submit call
    #[error("Segmentation engine invocation failed: {0}")]
    EngineInvocation(String),

    /// The engine completed without producing a mask
    #[error("Segmentation engine produced no mask")]
    NoSegmentationResult,

    /// Too many requests are already awaiting a result
    #[error("Processor busy: {in_flight} request(s) already in flight")]
    Busy {
        /// Number of requests currently awaiting a result
        in_flight: usize,
    },

    /// No result arrived within the configured timeout
    #[error("Timed out after {0} ms waiting for a segmentation result")]
    ResultTimeout(u64),

    /// Unsupported output or input format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input/output errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChromaKeyError {
    /// Create a new engine-not-ready error
    pub fn engine_not_ready<S: Into<String>>(msg: S) -> Self {
        Self::EngineNotReady(msg.into())
    }

    /// Create a new source load error
    pub fn source_load<S: Into<String>>(msg: S) -> Self {
        Self::SourceLoad(msg.into())
    }

    /// Create a new engine invocation error
    pub fn engine_invocation<S: Into<String>>(msg: S) -> Self {
        Self::EngineInvocation(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a dimension mismatch error
    #[must_use]
    pub fn dimension_mismatch(frame: (u32, u32), mask: (u32, u32)) -> Self {
        Self::DimensionMismatch { frame, mask }
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// Whether the caller may retry the same request after fixing engine state
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::EngineNotReady(_) | Self::Busy { .. } | Self::ResultTimeout(_)
        )
    }
}
