//! HTTP upload of captured media frames.
//!
//! Frames are posted as base64 JSON to `<endpoint>/v1/frames`. The session
//! uses [`BackgroundUploader`] as a fire-and-forget [`FrameSink`]: failures
//! are logged and otherwise ignored.

use crate::media::{FrameSink, MediaFrame};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Upload endpoint configuration.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Base URL, e.g. `http://127.0.0.1:8080`
    pub endpoint: String,
    /// Bearer authentication token
    pub token: String,
}

impl UploadConfig {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }

    pub fn frames_url(&self) -> String {
        format!("{}/v1/frames", self.endpoint.trim_end_matches('/'))
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.endpoint.trim_end_matches('/'))
    }
}

/// Upload failures.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Upload config error: {0}")]
    Config(String),
    #[error("Upload network error: {0}")]
    Network(String),
    #[error("Upload server error ({status}): {message}")]
    Server { status: u16, message: String },
}

/// Request body for the frames endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct FrameUpload {
    pub device_id: String,
    pub captured_at: String,
    pub mime_type: String,
    /// Base64 image bytes
    pub data: String,
}

impl FrameUpload {
    pub fn from_frame(frame: &MediaFrame, device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            captured_at: frame.captured_at.to_rfc3339(),
            mime_type: frame.mime_type.clone(),
            data: STANDARD.encode(&frame.bytes),
        }
    }
}

/// Async client for the frames endpoint.
pub struct UploadClient {
    config: UploadConfig,
    client: reqwest::Client,
    device_id: String,
}

impl UploadClient {
    pub fn new(config: UploadConfig) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| UploadError::Config(format!("Failed to create HTTP client: {e}")))?;

        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let instance = uuid::Uuid::new_v4().simple().to_string();
        let device_id = format!("sentinel-{}-{}", hostname, &instance[..8]);

        Ok(Self {
            config,
            client,
            device_id,
        })
    }

    /// Check that the endpoint answers its health route.
    pub async fn test_connection(&self) -> Result<bool, UploadError> {
        let response = self
            .client
            .get(self.config.health_url())
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    /// Post one frame.
    pub async fn upload(&self, frame: &MediaFrame) -> Result<(), UploadError> {
        let body = FrameUpload::from_frame(frame, &self.device_id);

        let response = self
            .client
            .post(self.config.frames_url())
            .header("Authorization", format!("Bearer {}", self.config.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(UploadError::Server {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

/// Frame sink that uploads on its own runtime without blocking the caller.
pub struct BackgroundUploader {
    client: Arc<UploadClient>,
    runtime: tokio::runtime::Runtime,
}

impl BackgroundUploader {
    pub fn new(config: UploadConfig) -> Result<Self, UploadError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("frame-upload")
            .enable_all()
            .build()
            .map_err(|e| UploadError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            client: Arc::new(UploadClient::new(config)?),
            runtime,
        })
    }

    /// Upload and wait for the result.
    pub fn upload_blocking(&self, frame: &MediaFrame) -> Result<(), UploadError> {
        self.runtime.block_on(self.client.upload(frame))
    }

    pub fn test_connection(&self) -> Result<bool, UploadError> {
        self.runtime.block_on(self.client.test_connection())
    }

    pub fn device_id(&self) -> &str {
        self.client.device_id()
    }
}

impl FrameSink for BackgroundUploader {
    fn submit(&mut self, frame: MediaFrame) {
        let client = Arc::clone(&self.client);
        self.runtime.spawn(async move {
            if let Err(e) = client.upload(&frame).await {
                tracing::warn!("Frame upload failed: {}", e);
            }
        });
    }
}
