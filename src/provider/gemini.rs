//! Gemini generateContent 供应商实现
//!
//! Google Gemini `generateContent` REST provider.
//! - Request: `contents[0].parts` holds the prompt text (and `inline_data` for images).
//! - Structured requests set `generationConfig.responseMimeType = "application/json"`
//!   and `generationConfig.responseSchema`.
//! - Response: text of `candidates[0].content.parts[*]`.
//! - API key travels in the `x-goog-api-key` header, never in the URL.

use async_trait::async_trait;
use base64::Engine as _;
use bytes::Bytes;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use super::{Provider, ProviderError};
use crate::config::{ApiKey, GatewayConfig};
use crate::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

/// Finish reasons that mean the candidate was withheld on policy grounds.
const BLOCKED_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: Url,
    api_key: ApiKey,
    text_model: String,
    vision_model: String,
}

impl GeminiProvider {
    /// Build from gateway config. An empty API key is a configuration error.
    pub fn from_config(cfg: &GatewayConfig) -> Result<Self> {
        if cfg.api_key.is_empty() {
            return Err(Error::config("GEMINI_API_KEY is not set"));
        }
        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;
        let base_url = Url::parse(DEFAULT_BASE_URL)
            .map_err(|e| Error::config(format!("invalid base url: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: cfg.api_key.clone(),
            text_model: cfg.text_model.clone(),
            vision_model: cfg.vision_model.clone(),
        })
    }

    /// Point the provider at another endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        self.base_url = Url::parse(&normalized)
            .map_err(|e| Error::config(format!("invalid base url '{}': {}", base_url, e)))?;
        Ok(self)
    }

    pub fn text_model(&self) -> &str {
        &self.text_model
    }

    pub fn vision_model(&self) -> &str {
        &self.vision_model
    }

    fn endpoint(&self, model: &str) -> std::result::Result<Url, ProviderError> {
        let url = self
            .base_url
            .join(&format!("models/{}:generateContent", model))
            .map_err(|e| ProviderError::Other(format!("invalid endpoint for model {}: {}", model, e)))?;
        Ok(url)
    }

    async fn post(&self, model: &str, body: &Value) -> std::result::Result<String, ProviderError> {
        let url = self.endpoint(model)?;
        let request_id = uuid::Uuid::new_v4().to_string();
        let resp = self
            .client
            .post(url)
            .header("x-goog-api-key", self.api_key.expose())
            .header("x-request-id", &request_id)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        let payload: Value = match resp.json().await {
            Ok(v) => v,
            Err(e) if status.is_success() => {
                return Err(ProviderError::Other(format!("unreadable response body: {}", e.without_url())))
            }
            Err(_) => Value::Null,
        };

        if !status.is_success() {
            let message = payload
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            tracing::debug!(request_id = %request_id, status = status.as_u16(), "gemini request rejected");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        extract_text(&payload)
    }
}

pub(crate) fn text_body(prompt: &str, schema: Option<&Value>) -> Value {
    let mut body = json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt }],
        }],
    });
    if let Some(schema) = schema {
        body["generationConfig"] = json!({
            "responseMimeType": "application/json",
            "responseSchema": schema,
        });
    }
    body
}

pub(crate) fn vision_body(image: &[u8], mime_type: &str, prompt: &str) -> Value {
    let data = base64::engine::general_purpose::STANDARD.encode(image);
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                { "text": prompt },
                { "inline_data": { "mime_type": mime_type, "data": data } },
            ],
        }],
    })
}

/// Pull the candidate text out of a generateContent response.
pub(crate) fn extract_text(body: &Value) -> std::result::Result<String, ProviderError> {
    if let Some(reason) = body
        .pointer("/promptFeedback/blockReason")
        .and_then(|r| r.as_str())
    {
        return Err(ProviderError::ContentBlocked(format!("prompt blocked: {}", reason)));
    }

    let finish_reason = body
        .pointer("/candidates/0/finishReason")
        .and_then(|r| r.as_str());
    if let Some(reason) = finish_reason {
        if BLOCKED_FINISH_REASONS.contains(&reason) {
            return Err(ProviderError::ContentBlocked(format!("candidate finished with {}", reason)));
        }
    }

    let text: String = body
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ProviderError::Other("provider returned no text".into()));
    }
    Ok(text)
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    let (timeout, connect) = (e.is_timeout(), e.is_connect());
    let e = e.without_url();
    if timeout {
        ProviderError::Transport(format!("request timeout: {}", e))
    } else if connect {
        ProviderError::Transport(format!("connection error: {}", e))
    } else {
        ProviderError::Transport(format!("network error: {}", e))
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_text(
        &self,
        prompt: &str,
        schema: Option<&Value>,
    ) -> std::result::Result<String, ProviderError> {
        let body = text_body(prompt, schema);
        self.post(&self.text_model, &body).await
    }

    async fn describe_image(
        &self,
        image: Bytes,
        mime_type: &str,
        prompt: &str,
    ) -> std::result::Result<String, ProviderError> {
        let body = vision_body(&image, mime_type, prompt);
        self.post(&self.vision_model, &body).await
    }
}
