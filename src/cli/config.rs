//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::{Cli, CliOutputFormat};
use crate::{
    config::{MaskScaling, ProcessorConfig},
    services::OutputMime,
};
use anyhow::{Context, Result};
use std::path::Path;

/// Convert CLI arguments to a `ProcessorConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Start from `--config` (or defaults) and apply flag overrides
    pub(crate) fn from_cli(cli: &Cli) -> Result<ProcessorConfig> {
        let mut config = match &cli.config {
            Some(path) => ProcessorConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?,
            None => ProcessorConfig::default(),
        };

        if let Some(color) = cli.color {
            config.chroma_key = color;
        }
        if cli.mirror {
            config.engine.mirror_input = true;
        }
        if cli.resize_mask {
            config.mask_scaling = MaskScaling::Resize;
        }
        if let Some(quality) = cli.jpeg_quality {
            config.jpeg_quality = quality;
        }
        if let Some(timeout_ms) = cli.timeout_ms {
            config.result_timeout_ms = Some(timeout_ms);
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Pick the output MIME type: explicit `--format`, then the output
    /// file's extension, then PNG
    pub(crate) fn output_mime(cli: &Cli) -> OutputMime {
        if let Some(format) = cli.format {
            return format.into();
        }
        cli.output
            .as_deref()
            .filter(|output| *output != "-")
            .and_then(|output| Path::new(output).extension())
            .and_then(|ext| ext.to_str())
            .and_then(OutputMime::from_extension)
            .unwrap_or_default()
    }

    /// Reject flag combinations that cannot work
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if cli.input.trim().is_empty() {
            anyhow::bail!("Input must not be empty");
        }
        if !cli.mask.exists() {
            anyhow::bail!("Mask file does not exist: {}", cli.mask.display());
        }
        if let Some(quality) = cli.jpeg_quality {
            if !(1..=100).contains(&quality) {
                anyhow::bail!("JPEG quality must be between 1 and 100, got {}", quality);
            }
        }
        Ok(())
    }

    /// Inputs that have no file path to derive a default output from
    pub(crate) fn is_remote_or_stdin(input: &str) -> bool {
        input == "-"
            || input.starts_with("http://")
            || input.starts_with("https://")
            || input.starts_with("data:")
    }
}

impl From<CliOutputFormat> for OutputMime {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Png => Self::Png,
            CliOutputFormat::Jpeg => Self::Jpeg,
            #[cfg(feature = "webp-support")]
            CliOutputFormat::Webp => Self::WebP,
        }
    }
}
