//! Chroma-key CLI tool
//!
//! Replaces the background of one image using a precomputed segmentation mask.

use super::config::CliConfigBuilder;
use crate::{
    backends::StaticMaskEngine,
    processor::ChromaKeyProcessor,
    services::OutputMime,
    surface::DrawingSurface,
    tracing_config::{init_cli_tracing, TracingFormat},
    types::ChromaKeyColor,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Chroma-key background replacement CLI tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "chromakey-bgremove")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input image: file path, http(s):// or data: URL, or "-" for stdin
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// Segmentation mask image (bright = foreground, dark = background)
    #[arg(short, long, value_name = "MASK")]
    pub mask: PathBuf,

    /// Output file. Use "-" for stdout [default: <input>-keyed.<ext>, or stdout]
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Output format [default: from output extension, else png]
    #[arg(short, long, value_enum)]
    pub format: Option<CliOutputFormat>,

    /// Chroma-key fill as "r,g,b" or "#rrggbb" [default: 0,255,0]
    #[arg(short, long, value_name = "COLOR")]
    pub color: Option<ChromaKeyColor>,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Mirror the input horizontally before segmenting (selfie mode)
    #[arg(long)]
    pub mirror: bool,

    /// Stretch a mask of different size over the image instead of failing
    #[arg(long)]
    pub resize_mask: bool,

    /// Write a base64 data URL instead of binary image data
    #[arg(long)]
    pub data_url: bool,

    /// JPEG quality (1-100)
    #[arg(long)]
    pub jpeg_quality: Option<u8>,

    /// Give up if the engine has not answered after this many milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[cfg(feature = "tracing-json")]
    #[arg(long)]
    pub json_logs: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Jpeg,
    #[cfg(feature = "webp-support")]
    Webp,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_cli_tracing(cli.verbose, tracing_format(&cli)).context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    let mime = CliConfigBuilder::output_mime(&cli);

    info!("Input: {}", cli.input);
    info!("Mask: {}", cli.mask.display());
    info!("Chroma key: {}, output: {}", config.chroma_key, mime);

    let mask = image::open(&cli.mask)
        .with_context(|| format!("Failed to load mask {}", cli.mask.display()))?;
    let processor = ChromaKeyProcessor::with_engine(config, StaticMaskEngine::new(mask))
        .context("Failed to create processor")?;
    processor
        .initialize()
        .await
        .context("Failed to initialize segmentation engine")?;

    let start = Instant::now();
    let spinner = spinner("Replacing background")?;
    let outcome = process_input(&processor, &cli.input).await;
    spinner.finish_and_clear();
    processor.teardown().await;

    let surface = outcome.with_context(|| format!("Failed to process {}", cli.input))?;
    let (width, height) = surface.dimensions();
    info!(
        "Processed {}x{} image in {:.2}s",
        width,
        height,
        start.elapsed().as_secs_f64()
    );

    let data = encode_output(&processor, &surface, mime, cli.data_url)?;
    match resolve_output(&cli, mime) {
        Some(path) => {
            std::fs::write(&path, &data)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Saved {}", path.display());
        },
        None => {
            write_stdout(&data)?;
            debug!(bytes = data.len(), "Wrote output to stdout");
        },
    }
    Ok(())
}

#[cfg(feature = "tracing-json")]
fn tracing_format(cli: &Cli) -> TracingFormat {
    if cli.json_logs {
        TracingFormat::Json
    } else {
        TracingFormat::Console
    }
}

#[cfg(not(feature = "tracing-json"))]
fn tracing_format(_cli: &Cli) -> TracingFormat {
    TracingFormat::Console
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
            .context("Invalid progress template")?,
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

/// Dispatch the input string to the matching ingestion call
async fn process_input(processor: &ChromaKeyProcessor, input: &str) -> crate::Result<DrawingSurface> {
    match InputKind::classify(input) {
        InputKind::Stdin => {
            let bytes = read_stdin().map_err(|e| crate::ChromaKeyError::source_load(e.to_string()))?;
            processor.process_file(bytes).await
        },
        InputKind::Url => processor.process_url(input).await,
        InputKind::Path => processor.process_path(input).await,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Stdin,
    Url,
    Path,
}

impl InputKind {
    fn classify(input: &str) -> Self {
        if input == "-" {
            Self::Stdin
        } else if CliConfigBuilder::is_remote_or_stdin(input) {
            Self::Url
        } else {
            Self::Path
        }
    }
}

fn encode_output(
    processor: &ChromaKeyProcessor,
    surface: &DrawingSurface,
    mime: OutputMime,
    data_url: bool,
) -> Result<Vec<u8>> {
    if data_url {
        let url = processor
            .to_data_url(surface, mime.as_str())
            .context("Failed to encode data URL")?;
        Ok(url.into_bytes())
    } else {
        let blob = processor
            .to_blob(surface, mime.as_str())
            .context("Failed to encode output image")?;
        Ok(blob.bytes)
    }
}

/// Output file, or `None` for stdout
fn resolve_output(cli: &Cli, mime: OutputMime) -> Option<PathBuf> {
    match cli.output.as_deref() {
        Some("-") => None,
        Some(path) => Some(PathBuf::from(path)),
        None if CliConfigBuilder::is_remote_or_stdin(&cli.input) => None,
        None => Some(generate_output_path(Path::new(&cli.input), mime, cli.data_url)),
    }
}

/// `photo.jpg` becomes `photo-keyed.png` next to the input
fn generate_output_path(input: &Path, mime: OutputMime, data_url: bool) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let extension = if data_url { "txt" } else { mime.extension() };
    input.with_file_name(format!("{}-keyed.{}", stem, extension))
}

fn read_stdin() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    io::stdin()
        .read_to_end(&mut buffer)
        .context("Failed to read image data from stdin")?;
    if buffer.is_empty() {
        anyhow::bail!("No data received from stdin");
    }
    Ok(buffer)
}

fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(data)
        .context("Failed to write output to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}
