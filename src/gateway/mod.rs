//! 弹性调用网关：所有供应商调用的唯一入口。
//!
//! # Resilient Call Gateway
//!
//! [`Gateway::call`] is the single choke point every provider call passes
//! through:
//!
//! 1. breaker admission; a denied key fails with `Unavailable` and the
//!    remaining cooldown, without touching the network
//! 2. up to `max_retries` attempts, each raced against the deadline
//! 3. on success: breaker success, then JSON repair when a schema was given
//! 4. on failure: classify; `Config`/`Safety` surface at once and never touch
//!    the breaker; `RateLimit` on the final attempt surfaces as `RateLimit`;
//!    everything else feeds the breaker and backs off before the next attempt,
//!    unless that failure opened the breaker, which ends the loop
//! 5. retries exhausted: `Unavailable` wrapping the last failure

mod builder;
mod health;

pub use builder::GatewayBuilder;
pub use health::HealthReport;

use bytes::Bytes;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::GatewayConfig;
use crate::provider::{Provider, ProviderError};
use crate::resilience::circuit_breaker::{Admission, BreakerRegistry};
use crate::resilience::classify::{classify, FailureKind};
use crate::resilience::retry::{RetryPolicy, Sleeper};
use crate::resilience::timeout::run_with_timeout;
use crate::structured::parse_structured;
use crate::types::{Modality, OperationKey};
use crate::{Error, ErrorContext, Result};

/// What gets sent to the provider.
#[derive(Debug, Clone)]
pub enum Payload {
    Text(String),
    Image {
        bytes: Bytes,
        mime_type: String,
        prompt: String,
    },
}

/// One gateway call.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub payload: Payload,
    /// Provider-facing schema; when present the reply is parsed into JSON.
    pub schema: Option<Value>,
    pub timeout: Option<Duration>,
    /// Marks the cheaper retry variant in logs.
    pub short_prompt: bool,
}

impl CallRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            payload: Payload::Text(prompt.into()),
            schema: None,
            timeout: None,
            short_prompt: false,
        }
    }

    pub fn image(bytes: impl Into<Bytes>, mime_type: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            payload: Payload::Image {
                bytes: bytes.into(),
                mime_type: mime_type.into(),
                prompt: prompt.into(),
            },
            schema: None,
            timeout: None,
            short_prompt: false,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_short_prompt(mut self, short: bool) -> Self {
        self.short_prompt = short;
        self
    }
}

/// Successful gateway result.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Json(Value),
}

impl Reply {
    pub fn into_text(self) -> String {
        match self {
            Reply::Text(text) => text,
            Reply::Json(value) => value.to_string(),
        }
    }

    pub fn into_json(self) -> Result<Value> {
        match self {
            Reply::Json(value) => Ok(value),
            Reply::Text(text) => parse_structured(&text),
        }
    }
}

/// Returns an unresolved HalfOpen probe to the registry when the call ends
/// without a breaker verdict (non-qualifying failure, or the caller dropped
/// the future mid-flight).
struct ProbeGuard {
    breakers: Arc<BreakerRegistry>,
    key: OperationKey,
    probe: Option<u64>,
}

impl ProbeGuard {
    fn resolve(&mut self) {
        self.probe = None;
    }
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        if let Some(id) = self.probe.take() {
            self.breakers.release_probe(&self.key, id);
        }
    }
}

pub struct Gateway {
    provider: Arc<dyn Provider>,
    breakers: Arc<BreakerRegistry>,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    default_timeout: Duration,
    text_model: String,
    vision_model: String,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Gateway over the Gemini provider described by `cfg`.
    pub fn from_config(cfg: &GatewayConfig) -> Result<Self> {
        GatewayBuilder::new().with_config(cfg).build()
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn text_model(&self) -> &str {
        &self.text_model
    }

    pub fn vision_model(&self) -> &str {
        &self.vision_model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn key(&self, modality: Modality, operation: &str) -> OperationKey {
        let model = match modality {
            Modality::Text => &self.text_model,
            Modality::Vision => &self.vision_model,
        };
        OperationKey::new(model, modality, operation)
    }

    /// Count a structural failure that persisted across a short-prompt retry.
    pub fn report_malformed_output(&self, key: &OperationKey) {
        self.breakers.record_failure(key, FailureKind::MalformedOutput);
    }

    pub fn health(&self) -> HealthReport {
        HealthReport::collect(self)
    }

    pub async fn call(&self, key: &OperationKey, request: CallRequest) -> Result<Reply> {
        let ctx = || ErrorContext::new().with_operation_key(key.as_str());

        let probe = match self.breakers.admit(key) {
            Admission::Denied { cooldown_remaining } => {
                return Err(Error::Unavailable {
                    message: "circuit breaker open".into(),
                    cooldown_remaining: Some(cooldown_remaining),
                    last_failure: None,
                    context: ctx().with_source("breaker"),
                });
            }
            Admission::Admitted => None,
            Admission::Probe(id) => Some(id),
        };
        let mut guard = ProbeGuard {
            breakers: self.breakers.clone(),
            key: key.clone(),
            probe,
        };

        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let structured = request.schema.is_some();
        let max = self.retry.max_retries;
        let mut last: Option<(FailureKind, ProviderError)> = None;

        for attempt in 1..=max {
            let started = Instant::now();
            let outcome = run_with_timeout(self.invoke(&request), timeout).await;

            let err = match outcome {
                Ok(text) => {
                    self.breakers.record_success(key);
                    guard.resolve();
                    info!(
                        key = %key,
                        attempt,
                        retries = attempt - 1,
                        duration_ms = started.elapsed().as_millis() as u64,
                        structured,
                        short_prompt = request.short_prompt,
                        "ai_call_ok"
                    );
                    if !structured {
                        return Ok(Reply::Text(text));
                    }
                    return parse_structured(&text).map(Reply::Json).map_err(|e| {
                        e.with_context(
                            ctx()
                                .with_attempt(attempt)
                                .with_source("json_repair"),
                        )
                    });
                }
                Err(err) => err,
            };

            let kind = classify(&err);
            if matches!(kind, FailureKind::Config | FailureKind::Safety) {
                warn!(key = %key, reason = kind.name(), attempt, "ai_call_fail");
                return Err(Error::from(err).with_context(
                    ctx()
                        .with_attempt(attempt)
                        .with_details(kind.name())
                        .with_source("gateway"),
                ));
            }

            self.breakers.record_failure(key, kind);
            if kind.is_qualifying() {
                guard.resolve();
            }

            if kind == FailureKind::RateLimit && attempt == max {
                warn!(key = %key, reason = kind.name(), attempt, final_attempt = true, "ai_call_fail");
                return Err(Error::rate_limit("AI rate limited").with_context(
                    ctx()
                        .with_attempt(attempt)
                        .with_details(err.to_string())
                        .with_source("gateway"),
                ));
            }

            let will_retry = self.retry.has_attempts_after(attempt);
            let cooldown = self.breakers.cooldown_remaining(key);
            if will_retry && !cooldown.is_zero() {
                // this attempt opened the breaker; further attempts are not admitted
                warn!(key = %key, reason = kind.name(), attempt, "ai_call_fail");
                return Err(Error::Unavailable {
                    message: format!("circuit breaker opened: {}", err),
                    cooldown_remaining: Some(cooldown),
                    last_failure: Some(kind),
                    context: ctx()
                        .with_attempt(attempt)
                        .with_details(kind.name())
                        .with_source("breaker"),
                });
            }
            warn!(key = %key, reason = kind.name(), attempt, will_retry, "ai_call_retry");
            last = Some((kind, err));

            if will_retry {
                self.sleeper.sleep(self.retry.delay(attempt)).await;
            }
        }

        let (kind, err) = match last {
            Some(pair) => pair,
            None => (FailureKind::Unknown, ProviderError::Other("no attempt made".into())),
        };
        warn!(key = %key, reason = kind.name(), attempts = max, "ai_call_fail");
        Err(Error::Unavailable {
            message: format!("retries exhausted: {}", err),
            cooldown_remaining: None,
            last_failure: Some(kind),
            context: ctx()
                .with_attempt(max)
                .with_details(kind.name())
                .with_source("gateway"),
        })
    }

    fn invoke(
        &self,
        request: &CallRequest,
    ) -> impl Future<Output = std::result::Result<String, ProviderError>> + Send + 'static {
        let provider = self.provider.clone();
        let payload = request.payload.clone();
        let schema = request.schema.clone();
        async move {
            match payload {
                Payload::Text(prompt) => provider.generate_text(&prompt, schema.as_ref()).await,
                Payload::Image {
                    bytes,
                    mime_type,
                    prompt,
                } => provider.describe_image(bytes, &mime_type, &prompt).await,
            }
        }
    }
}
