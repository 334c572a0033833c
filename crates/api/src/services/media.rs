//! Image hosting.
//!
//! Product photos and avatars are uploaded to Cloudinary with a signed
//! request; only the returned `secure_url` is stored.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::CloudinaryConfig;

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Errors from the media host.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Uploads are not configured.
    #[error("media host not configured")]
    NotConfigured,

    /// The upload itself is unacceptable.
    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    /// The host rejected the upload.
    #[error("upload rejected: {0}")]
    Rejected(String),

    /// The host could not be reached.
    #[error("media host request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Where an upload is filed on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFolder {
    Products,
    Avatars,
}

impl MediaFolder {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Products => "solestore/products",
            Self::Avatars => "solestore/avatars",
        }
    }
}

/// An image field on a create or edit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// Keep or set a hosted URL.
    Url(String),
    /// Upload new image bytes.
    Upload { bytes: Vec<u8>, filename: String },
}

/// Stores image bytes and returns their public URL.
#[async_trait]
pub trait MediaHost: Send + Sync {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        folder: MediaFolder,
    ) -> Result<String, MediaError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    error: Option<UploadError>,
}

#[derive(Debug, Deserialize)]
struct UploadError {
    message: String,
}

/// Cloudinary signed-upload client.
#[derive(Clone)]
pub struct CloudinaryClient {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryClient {
    #[must_use]
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn upload_url(&self) -> String {
        format!(
            "https://api.cloudinary.com/v1_1/{}/image/upload",
            self.config.cloud_name
        )
    }
}

/// Cloudinary signature: SHA-256 hex of the sorted `key=value` pairs joined
/// with `&`, immediately followed by the API secret.
fn sign_params(params: &BTreeMap<&str, String>, api_secret: &str) -> String {
    let to_sign = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl MediaHost for CloudinaryClient {
    #[tracing::instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        folder: MediaFolder,
    ) -> Result<String, MediaError> {
        validate_upload(&bytes)?;

        let mut params = BTreeMap::new();
        params.insert("folder", folder.as_str().to_string());
        params.insert("timestamp", Utc::now().timestamp().to_string());
        let signature = sign_params(&params, self.config.api_secret.expose_secret());

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string()),
            )
            .text("api_key", self.config.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256");
        for (key, value) in params {
            form = form.text(key, value);
        }

        let response = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await?;
        let status = response.status();
        let body: UploadResponse = response.json().await?;

        match body {
            UploadResponse {
                secure_url: Some(url),
                ..
            } if status.is_success() => {
                tracing::info!(%url, "image uploaded");
                Ok(url)
            }
            UploadResponse {
                error: Some(err), ..
            } => Err(MediaError::Rejected(err.message)),
            _ => Err(MediaError::Rejected(format!("unexpected response ({status})"))),
        }
    }
}

/// Reject empty or oversized uploads before they leave the process.
///
/// # Errors
///
/// Returns `MediaError::InvalidUpload` when the bytes are unusable.
pub fn validate_upload(bytes: &[u8]) -> Result<(), MediaError> {
    if bytes.is_empty() {
        return Err(MediaError::InvalidUpload("file is empty".to_string()));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(MediaError::InvalidUpload(format!(
            "file exceeds {} MiB",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Media host used when Cloudinary is not configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledMediaHost;

#[async_trait]
impl MediaHost for DisabledMediaHost {
    async fn upload(
        &self,
        _bytes: Vec<u8>,
        _filename: &str,
        _folder: MediaFolder,
    ) -> Result<String, MediaError> {
        Err(MediaError::NotConfigured)
    }
}

/// Whether an image field already holds a hosted URL rather than new data.
#[must_use]
pub fn is_remote_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("https://") || value.starts_with("http://")
}
