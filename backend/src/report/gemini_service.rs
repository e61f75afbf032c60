use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::ReportConfig;

#[derive(Debug, thiserror::Error)]
pub enum ReportGenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Generative service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Malformed generative response: {0}")]
    MalformedResponse(#[from] serde_json::Error),
    #[error("Generative service returned no text")]
    EmptyOutput,
    #[error("No API key configured for the generative service")]
    MissingApiKey,
    #[error("Invalid generative endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ReportGenerationError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Concatenated text of the first candidate, trimmed.
pub fn extract_text(body: &str) -> Result<String, ReportGenerationError> {
    let response: GenerateResponse = serde_json::from_str(body)?;
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        return Err(ReportGenerationError::EmptyOutput);
    }
    Ok(text.to_string())
}

#[derive(Clone)]
pub struct GeminiService {
    http_client: HttpClient,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl GeminiService {
    pub fn new(config: &ReportConfig) -> Result<Self, ReportGenerationError> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn generate_url(&self, api_key: &str) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        ))?;
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }
}

#[async_trait]
impl TextGenerator for GeminiService {
    async fn generate(&self, prompt: &str) -> Result<String, ReportGenerationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ReportGenerationError::MissingApiKey)?;
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .http_client
            .post(self.generate_url(api_key)?)
            .json(&request)
            .send()
            .await
            .map_err(|e| e.without_url())?;

        let status = response.status();
        let body = response.text().await.map_err(|e| e.without_url())?;
        if !status.is_success() {
            return Err(ReportGenerationError::Status {
                status: status.as_u16(),
                body: body.chars().take(512).collect(),
            });
        }
        extract_text(&body)
    }
}
