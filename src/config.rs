//! Configuration types for chroma-key processing

use crate::{
    error::{ChromaKeyError, Result},
    types::ChromaKeyColor,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Segmentation model variant requested from the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    /// Square-input general model
    General,
    /// Landscape-input model, more accurate on wide photos
    #[default]
    Landscape,
}

/// Options passed to the engine's `configure` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub model_variant: ModelVariant,
    /// Flip input horizontally before segmenting (selfie mode)
    pub mirror_input: bool,
}

/// How a mask whose size differs from the frame is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaskScaling {
    /// Reject with `DimensionMismatch`
    #[default]
    Strict,
    /// Stretch the mask over the frame
    Resize,
}

/// Configuration for the chroma-key processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub engine: EngineOptions,
    /// Initial chroma-key fill; can be changed later on the processor
    pub chroma_key: ChromaKeyColor,
    pub mask_scaling: MaskScaling,
    /// Maximum number of requests awaiting an engine result at once
    pub max_in_flight: usize,
    /// Give up on a submitted request after this many milliseconds
    pub result_timeout_ms: Option<u64>,
    /// Timeout for fetching remote image URLs
    pub fetch_timeout_secs: u64,
    /// JPEG quality (1-100) used by output conversion
    pub jpeg_quality: u8,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            engine: EngineOptions::default(),
            chroma_key: ChromaKeyColor::default(),
            mask_scaling: MaskScaling::default(),
            max_in_flight: 1,
            result_timeout_ms: None,
            fetch_timeout_secs: 30,
            jpeg_quality: 92,
        }
    }
}

impl ProcessorConfig {
    /// Create a new processor configuration builder
    #[must_use]
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::new()
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    /// - `max_in_flight` is zero
    /// - `jpeg_quality` outside 1-100
    /// - zero timeouts
    pub fn validate(&self) -> Result<()> {
        if self.max_in_flight == 0 {
            return Err(ChromaKeyError::config_value_error(
                "max_in_flight",
                self.max_in_flight,
                ">= 1",
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ChromaKeyError::config_value_error(
                "JPEG quality",
                self.jpeg_quality,
                "1-100",
            ));
        }
        if self.result_timeout_ms == Some(0) {
            return Err(ChromaKeyError::config_value_error(
                "result_timeout_ms",
                0,
                ">= 1",
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ChromaKeyError::config_value_error(
                "fetch_timeout_secs",
                0,
                ">= 1",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn result_timeout(&self) -> Option<Duration> {
        self.result_timeout_ms.map(Duration::from_millis)
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Parse and validate a JSON configuration
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    /// - Malformed JSON
    /// - Values rejected by [`ProcessorConfig::validate`]
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ChromaKeyError::invalid_config(format!("Malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file
    ///
    /// # Errors
    /// - File cannot be read
    /// - Contents rejected by [`ProcessorConfig::from_json_str`]
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }
}

/// Builder for `ProcessorConfig`
#[derive(Debug, Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn model_variant(mut self, variant: ModelVariant) -> Self {
        self.config.engine.model_variant = variant;
        self
    }

    #[must_use]
    pub fn mirror_input(mut self, mirror: bool) -> Self {
        self.config.engine.mirror_input = mirror;
        self
    }

    #[must_use]
    pub fn chroma_key(mut self, color: ChromaKeyColor) -> Self {
        self.config.chroma_key = color;
        self
    }

    #[must_use]
    pub fn mask_scaling(mut self, scaling: MaskScaling) -> Self {
        self.config.mask_scaling = scaling;
        self
    }

    #[must_use]
    pub fn max_in_flight(mut self, max: usize) -> Self {
        self.config.max_in_flight = max;
        self
    }

    #[must_use]
    pub fn result_timeout(mut self, timeout: Duration) -> Self {
        self.config.result_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    #[must_use]
    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Build the processor configuration
    ///
    /// # Errors
    /// - Configuration validation failures
    pub fn build(self) -> Result<ProcessorConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProcessorConfig::default();
        assert_eq!(config.engine.model_variant, ModelVariant::Landscape);
        assert!(!config.engine.mirror_input);
        assert_eq!(config.chroma_key, ChromaKeyColor::new(0, 255, 0));
        assert_eq!(config.mask_scaling, MaskScaling::Strict);
        assert_eq!(config.max_in_flight, 1);
        assert!(config.result_timeout().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_chain() {
        let config = ProcessorConfig::builder()
            .model_variant(ModelVariant::General)
            .mirror_input(true)
            .chroma_key(ChromaKeyColor::BLUE)
            .mask_scaling(MaskScaling::Resize)
            .max_in_flight(4)
            .result_timeout(Duration::from_millis(250))
            .jpeg_quality(80)
            .build()
            .unwrap();

        assert_eq!(config.engine.model_variant, ModelVariant::General);
        assert!(config.engine.mirror_input);
        assert_eq!(config.chroma_key, ChromaKeyColor::BLUE);
        assert_eq!(config.mask_scaling, MaskScaling::Resize);
        assert_eq!(config.max_in_flight, 4);
        assert_eq!(config.result_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.jpeg_quality, 80);
    }

    #[test]
    fn test_builder_clamps_quality() {
        let config = ProcessorConfig::builder().jpeg_quality(0).build().unwrap();
        assert_eq!(config.jpeg_quality, 1);
        let config = ProcessorConfig::builder().jpeg_quality(200).build().unwrap();
        assert_eq!(config.jpeg_quality, 100);
    }

    #[test]
    fn test_validation_rejects_zero_in_flight() {
        let err = ProcessorConfig::builder().max_in_flight(0).build().unwrap_err();
        assert!(err.to_string().contains("max_in_flight"));
    }

    #[test]
    fn test_json_partial_config_uses_defaults() {
        let config = ProcessorConfig::from_json_str(
            r#"{ "chroma_key": { "r": 255, "g": 0, "b": 0 }, "mask_scaling": "resize" }"#,
        )
        .unwrap();
        assert_eq!(config.chroma_key, ChromaKeyColor::new(255, 0, 0));
        assert_eq!(config.mask_scaling, MaskScaling::Resize);
        assert_eq!(config.engine.model_variant, ModelVariant::Landscape);
        assert_eq!(config.jpeg_quality, 92);
    }

    #[test]
    fn test_json_invalid_config() {
        assert!(ProcessorConfig::from_json_str("{ not json").is_err());
        assert!(ProcessorConfig::from_json_str(r#"{ "jpeg_quality": 0 }"#).is_err());
        assert!(ProcessorConfig::from_json_str(r#"{ "chroma_key": { "r": 300, "g": 0, "b": 0 } }"#).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = ProcessorConfig::builder()
            .mirror_input(true)
            .result_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(ProcessorConfig::from_json_str(&json).unwrap(), config);
    }
}
