//! Image source loading service
//!
//! Normalizes every [`ImageSource`] variant into a decoded image before it is
//! handed to the segmentation engine. Any failure to read or decode is a
//! `SourceLoad` error for that request.

use crate::{
    error::{ChromaKeyError, Result},
    types::ImageSource,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use reqwest::{header, Client, Url};
use std::path::Path;
use std::time::Duration;

/// Loads and decodes images from files, paths, and URLs
#[derive(Debug, Clone)]
pub struct SourceLoader {
    client: Client,
}

impl SourceLoader {
    /// Create a loader whose remote fetches give up after `fetch_timeout`
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(fetch_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| ChromaKeyError::internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Decode any source into a single in-memory image
    ///
    /// # Errors
    /// - `SourceLoad` when the source cannot be read or decoded
    pub async fn load(&self, source: ImageSource) -> Result<DynamicImage> {
        match source {
            ImageSource::File(bytes) => Self::decode_bytes(&bytes),
            ImageSource::Path(path) => Self::load_path(&path).await,
            ImageSource::Url(url) => self.fetch_url(&url).await,
            ImageSource::Decoded(image) => Ok(image),
        }
    }

    /// Decode encoded image bytes, detecting the format from content
    ///
    /// # Errors
    /// - `SourceLoad` for empty or undecodable data
    pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(ChromaKeyError::source_load("image data is empty"));
        }
        image::load_from_memory(bytes).map_err(|e| {
            ChromaKeyError::source_load(format!(
                "Failed to decode image ({} bytes): {}",
                bytes.len(),
                e
            ))
        })
    }

    /// Read and decode an image file
    ///
    /// # Errors
    /// - `SourceLoad` when the file is missing, unreadable, or undecodable
    pub async fn load_path(path: &Path) -> Result<DynamicImage> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ChromaKeyError::source_load(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "Read image file");
        Self::decode_bytes(&bytes)
    }

    /// Fetch and decode an `http(s)` or `data:` URL
    ///
    /// # Errors
    /// - `SourceLoad` for malformed URLs, unsupported schemes, non-success
    ///   responses, transport failures, or undecodable payloads
    pub async fn fetch_url(&self, url: &str) -> Result<DynamicImage> {
        let parsed = Url::parse(url)
            .map_err(|e| ChromaKeyError::source_load(format!("Invalid URL '{}': {}", url, e)))?;

        match parsed.scheme() {
            "data" => Self::decode_bytes(&Self::data_url_payload(url)?),
            "http" | "https" => {
                let bytes = self.fetch_bytes(parsed).await?;
                Self::decode_bytes(&bytes)
            },
            other => Err(ChromaKeyError::source_load(format!(
                "Unsupported URL scheme '{}' in '{}'",
                other, url
            ))),
        }
    }

    async fn fetch_bytes(&self, url: Url) -> Result<Vec<u8>> {
        tracing::debug!(url = %url, "Fetching remote image");
        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, "image/*")
            .send()
            .await
            .map_err(|e| Self::fetch_error(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChromaKeyError::source_load(format!(
                "Fetching '{}' returned HTTP {}",
                url, status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Self::fetch_error(&url, e))?;
        Ok(bytes.to_vec())
    }

    fn fetch_error(url: &Url, error: reqwest::Error) -> ChromaKeyError {
        ChromaKeyError::source_load(format!("Failed to fetch '{}': {}", url, error))
    }

    /// Extract the payload of a `data:` URL
    ///
    /// Only base64 payloads carry binary image data; anything else is taken
    /// as raw bytes.
    fn data_url_payload(url: &str) -> Result<Vec<u8>> {
        let body = url
            .strip_prefix("data:")
            .ok_or_else(|| ChromaKeyError::source_load("not a data URL"))?;
        let (meta, payload) = body
            .split_once(',')
            .ok_or_else(|| ChromaKeyError::source_load("data URL has no payload separator"))?;

        if meta.split(';').any(|param| param.eq_ignore_ascii_case("base64")) {
            STANDARD
                .decode(payload.trim())
                .map_err(|e| ChromaKeyError::source_load(format!("Invalid base64 payload: {}", e)))
        } else {
            Ok(payload.as_bytes().to_vec())
        }
    }
}
