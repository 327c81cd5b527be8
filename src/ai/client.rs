use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument, warn};

use super::error::AiError;

/// One generation call. Images are already base64-encoded.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub endpoint: String,
    pub model: String,
    pub prompt: String,
    pub images: Vec<String>,
    pub format_json: bool,
    pub temperature: Option<f64>,
    pub timeout: Duration,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, req: &GenerateRequest) -> Result<String, AiError>;

    /// Names of the models installed on the endpoint.
    async fn list_models(&self, endpoint: &str, timeout: Duration) -> Result<Vec<String>, AiError>;
}

#[derive(Serialize)]
struct OllamaGenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f64,
}

#[derive(Deserialize)]
struct OllamaGenerateReply {
    #[serde(default)]
    response: String,
}

#[derive(Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaTag>,
}

#[derive(Deserialize)]
struct OllamaTag {
    name: Option<String>,
    model: Option<String>,
}

fn model_names(tags: OllamaTags) -> Vec<String> {
    let mut names: Vec<String> = tags
        .models
        .into_iter()
        .filter_map(|t| t.name.or(t.model))
        .filter(|n| !n.trim().is_empty())
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Non-streaming client for an Ollama server.
#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new() -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http })
    }

    fn url(endpoint: &str, path: &str) -> String {
        format!("{}/{}", endpoint.trim_end_matches('/'), path)
    }
}

fn unreachable(endpoint: &str, e: reqwest::Error) -> AiError {
    error!(error = %e, endpoint, "model service request failed");
    if e.is_timeout() {
        AiError::ServiceUnavailable(format!("model service at {endpoint} timed out"))
    } else if e.is_connect() {
        AiError::ServiceUnavailable(format!(
            "cannot reach the model service at {endpoint}; check that it is running"
        ))
    } else {
        AiError::ServiceUnavailable(e.to_string())
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    #[instrument(skip(self, req), fields(model = %req.model, images = req.images.len()))]
    async fn generate(&self, req: &GenerateRequest) -> Result<String, AiError> {
        let body = OllamaGenerateBody {
            model: &req.model,
            prompt: &req.prompt,
            stream: false,
            images: (!req.images.is_empty()).then_some(req.images.as_slice()),
            format: req.format_json.then_some("json"),
            options: req.temperature.map(|temperature| OllamaOptions { temperature }),
        };

        let response = self
            .http
            .post(Self::url(&req.endpoint, "api/generate"))
            .timeout(req.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| unreachable(&req.endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "model service answered with an error status");
            return Err(AiError::ServiceUnavailable(format!(
                "model service answered {status}"
            )));
        }

        let reply: OllamaGenerateReply = response
            .json()
            .await
            .map_err(|e| unreachable(&req.endpoint, e))?;

        let text = reply.response.trim();
        if text.is_empty() {
            return Err(AiError::EmptyResponse);
        }
        debug!(chars = text.len(), "model reply received");
        Ok(text.to_string())
    }

    #[instrument(skip(self))]
    async fn list_models(&self, endpoint: &str, timeout: Duration) -> Result<Vec<String>, AiError> {
        let response = self
            .http
            .get(Self::url(endpoint, "api/tags"))
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| unreachable(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::ServiceUnavailable(format!(
                "model service answered {status}"
            )));
        }

        let tags: OllamaTags = response.json().await.map_err(|e| unreachable(endpoint, e))?;
        Ok(model_names(tags))
    }
}
