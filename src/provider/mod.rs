//! 供应商边界：文本生成与视觉描述的统一调用契约。
//!
//! # Provider Boundary
//!
//! The only wire protocol the gateway speaks: a text-generation call taking
//! a prompt and an optional JSON schema, and a vision call taking image
//! bytes plus a prompt. Both return raw text. Provider-specific failures are
//! reported as [`ProviderError`], which only the failure classifier reads.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Provider`] | Async trait implemented by every backend |
//! | [`ProviderError`] | Raw failure shape (status code, message, internal deadline marker) |
//! | [`GeminiProvider`] | `generateContent` REST implementation |

pub mod gemini;

pub use gemini::GeminiProvider;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Raw provider failure before classification.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// Credentials missing or rejected before any request was sent.
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// Non-success HTTP status with the provider's message.
    #[error("provider returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Prompt or candidate blocked by the provider's content policy.
    #[error("content blocked by provider: {0}")]
    ContentBlocked(String),

    /// Raised by the timeout executor when the deadline passed.
    #[error("deadline of {}ms exceeded", .0.as_millis())]
    DeadlineExceeded(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    /// Status-code-like field, when the failure carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Backend that turns prompts into text.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Short identifier used in logs (e.g. "gemini").
    fn name(&self) -> &str;

    /// Generate text for `prompt`. With a schema the provider is asked for
    /// JSON conforming to it, but the reply is still returned verbatim.
    async fn generate_text(&self, prompt: &str, schema: Option<&Value>) -> Result<String, ProviderError>;

    /// Describe an image.
    async fn describe_image(
        &self,
        image: Bytes,
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, ProviderError>;
}
