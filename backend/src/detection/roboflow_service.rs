use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client as HttpClient;
use shared::Detection;
use std::time::Duration;
use url::Url;

use super::models::parse_detection_response;
use crate::config::DetectionConfig;

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum DetectionServiceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Detection service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed detection response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("Invalid detection endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

impl DetectionServiceError {
    fn is_retryable(&self) -> bool {
        match self {
            DetectionServiceError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            DetectionServiceError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[async_trait]
pub trait DetectionService: Send + Sync {
    /// Returns the predictions for one encoded image, in service order.
    async fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, DetectionServiceError>;
}

#[derive(Clone)]
pub struct RoboflowService {
    http_client: HttpClient,
    request_url: Url,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl RoboflowService {
    pub fn new(config: &DetectionConfig) -> Result<Self, DetectionServiceError> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            request_url: Self::build_request_url(config)?,
            max_attempts: config.max_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    pub fn build_request_url(config: &DetectionConfig) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&config.endpoint)?;
        url.query_pairs_mut()
            .append_pair("api_key", &config.api_key)
            .append_pair("confidence", &config.confidence.to_string())
            .append_pair("overlap", &config.overlap.to_string());
        Ok(url)
    }

    async fn send_once(&self, image: &[u8]) -> Result<Vec<Detection>, DetectionServiceError> {
        let part = Part::bytes(image.to_vec())
            .file_name("image.png")
            .mime_str("image/png")?;
        let form = Form::new().part("file", part);

        let response = self
            .http_client
            .post(self.request_url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| e.without_url())?;

        let status = response.status();
        let body = response.text().await.map_err(|e| e.without_url())?;
        if !status.is_success() {
            return Err(DetectionServiceError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        log::debug!("Detection response: {}", body);
        Ok(parse_detection_response(&body)?)
    }
}

#[async_trait]
impl DetectionService for RoboflowService {
    async fn detect(&self, image: &[u8]) -> Result<Vec<Detection>, DetectionServiceError> {
        let mut attempt = 1;
        loop {
            match self.send_once(image).await {
                Ok(detections) => {
                    log::info!("Detection service returned {} prediction(s)", detections.len());
                    return Ok(detections);
                }
                Err(e) if attempt < self.max_attempts && e.is_retryable() => {
                    log::warn!(
                        "Detection attempt {}/{} failed: {}",
                        attempt,
                        self.max_attempts,
                        e
                    );
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
