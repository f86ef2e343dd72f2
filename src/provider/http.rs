//! OpenAI-compatible HTTP generation service.

use super::{ContentPart, GenerationRequest, GenerationService, ImageRequest, VideoRequest};
use crate::config::ProviderConfig;
use crate::error::PipelineError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const PROVIDER_HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// Helper function to map transport errors to PipelineError
fn map_http_error(error: reqwest::Error) -> PipelineError {
    if let Some(status) = error.status() {
        return status_error(status, &error.to_string());
    }
    if error.is_timeout() {
        PipelineError::ProviderRequestFailed(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        PipelineError::ProviderRequestFailed(format!("Connection error: {}", error))
    } else {
        PipelineError::ProviderError(format!("HTTP error: {}", error))
    }
}

fn status_error(status: StatusCode, body: &str) -> PipelineError {
    match status.as_u16() {
        401 => PipelineError::ProviderAuthFailed(format!("Authentication failed: {}", body)),
        429 => PipelineError::ProviderRateLimit(format!("Rate limit exceeded: {}", body)),
        404 => PipelineError::ProviderModelNotFound(format!("Model not found: {}", body)),
        _ => PipelineError::ProviderRequestFailed(format!(
            "Request failed with status {}: {}",
            status, body
        )),
    }
}

fn build_provider_http_client(timeout: Duration) -> Result<Client, PipelineError> {
    Client::builder()
        .connect_timeout(PROVIDER_HTTP_CONNECT_TIMEOUT)
        .timeout(timeout)
        .build()
        .map_err(|e| PipelineError::ProviderError(format!("Failed to create HTTP client: {}", e)))
}

fn data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct MediaResponse {
    data: Vec<MediaItem>,
}

#[derive(Deserialize)]
struct MediaItem {
    b64_json: Option<String>,
    url: Option<String>,
}

pub struct HttpGenerationService {
    client: Client,
    api_key: String,
    config: ProviderConfig,
}

impl HttpGenerationService {
    pub fn new(config: ProviderConfig) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::ProviderNotConfigured)?;
        let api_key = config.resolve_api_key()?;
        let client = build_provider_http_client(Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn chat_body(&self, request: &GenerationRequest) -> Value {
        let parts: Vec<Value> = request
            .content
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => json!({ "type": "text", "text": text }),
                ContentPart::Image(bytes) => json!({
                    "type": "image_url",
                    "image_url": { "url": data_url(bytes, "image/png") }
                }),
            })
            .collect();

        let mut body = json!({
            "model": self.config.text_model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": parts }
            ],
        });
        if request.task.is_structured() {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response, PipelineError> {
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(status_error(status, &error_text));
        }
        Ok(response)
    }

    /// First media item as bytes, decoding base64 or following a URL.
    async fn media_bytes(&self, response: reqwest::Response) -> Result<Vec<u8>, PipelineError> {
        let media: MediaResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::ProviderError(format!("Failed to parse response: {}", e)))?;
        let item = media
            .data
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::ProviderError("No media in response".to_string()))?;

        if let Some(b64) = item.b64_json {
            return STANDARD
                .decode(b64.as_bytes())
                .map_err(|e| PipelineError::ProviderError(format!("Invalid base64 payload: {}", e)));
        }
        let url = item
            .url
            .ok_or_else(|| PipelineError::ProviderError("Media item has no payload".to_string()))?;
        let bytes = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_http_error)?
            .error_for_status()
            .map_err(map_http_error)?
            .bytes()
            .await
            .map_err(map_http_error)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl GenerationService for HttpGenerationService {
    async fn generate_text(&self, request: GenerationRequest) -> Result<String, PipelineError> {
        debug!(task = request.task.as_str(), images = request.image_count(), "text generation");
        let body = self.chat_body(&request);
        let response = self.post(&self.endpoint("chat/completions"), &body).await?;
        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::ProviderError(format!("Failed to parse response: {}", e)))?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| PipelineError::ProviderError("No choices in response".to_string()))
    }

    async fn generate_image(&self, request: ImageRequest) -> Result<Vec<u8>, PipelineError> {
        debug!(references = request.references.len(), "image generation");
        let (endpoint, body) = if request.references.is_empty() {
            (
                &self.config.image_endpoint,
                json!({ "model": self.config.image_model, "prompt": request.prompt, "n": 1 }),
            )
        } else {
            let images: Vec<Value> = request
                .references
                .iter()
                .map(|bytes| json!({ "image_url": data_url(bytes, "image/png") }))
                .collect();
            (
                &self.config.image_edit_endpoint,
                json!({
                    "model": self.config.image_model,
                    "prompt": request.prompt,
                    "images": images,
                    "n": 1
                }),
            )
        };
        let response = self.post(&self.endpoint(endpoint), &body).await?;
        self.media_bytes(response).await
    }

    async fn generate_video(&self, request: VideoRequest) -> Result<Vec<u8>, PipelineError> {
        debug!(frames = request.frames.len(), "video generation");
        let mut body = json!({ "model": self.config.video_model, "prompt": request.prompt });
        if let Some(first) = request.frames.first() {
            body["first_frame"] = json!(data_url(first, "image/png"));
        }
        if let Some(last) = request.frames.get(1) {
            body["last_frame"] = json!(data_url(last, "image/png"));
        }
        let response = self.post(&self.endpoint(&self.config.video_endpoint), &body).await?;
        self.media_bytes(response).await
    }

    fn provider_name(&self) -> &str {
        "openai-compatible"
    }
}
