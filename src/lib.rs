//! # wellness-ai-gateway
//!
//! 面向生成式文本/视觉服务的弹性调用网关：熔断、超时、重试、PII 脱敏与结构化输出修复。
//!
//! Resilient gateway in front of a latency-variable, failure-prone generative
//! text/vision provider. Every provider call passes through a single choke
//! point that enforces timeouts, retries with backoff, per-operation circuit
//! breaking, outbound PII redaction and best-effort structured-output repair,
//! and never fabricates content on failure.
//!
//! ## Data flow
//!
//! ```text
//! caller -> AiOperations -> Redactor -> Gateway
//!        -> [BreakerRegistry -> run_with_timeout -> Provider]
//!        -> parse_structured -> normalize -> typed record | Error
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wellness_ai_gateway::{AiOperations, GatewayConfig, Language};
//!
//! #[tokio::main]
//! async fn main() -> wellness_ai_gateway::Result<()> {
//!     let config = GatewayConfig::from_env()?;
//!     let ops = AiOperations::from_config(config)?;
//!
//!     let insights = ops
//!         .journal_insights("Exams next week and I can't sleep.", Language::En)
//!         .await?;
//!     println!("{}", insights.summary.summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`resilience`] | Breaker registry, timeout executor, retry policy, failure classification |
//! | [`gateway`] | The resilient call gateway and its health report |
//! | [`provider`] | Provider boundary trait and the Gemini REST implementation |
//! | [`guardrails`] | PII redaction, crisis detection, response safety |
//! | [`structured`] | JSON repair, schema generation and validation |
//! | [`operations`] | Typed operation façade (one method per product operation) |
//! | [`types`] | Operation keys, emotion vocabulary, language preference |
//! | [`config`] | Gateway configuration (env, YAML, builder) |

pub mod config;
pub mod error;
pub mod gateway;
pub mod guardrails;
pub mod operations;
pub mod provider;
pub mod resilience;
pub mod structured;
pub mod types;

pub use config::{ApiKey, GatewayConfig};
pub use error::{Error, ErrorContext, ErrorKind};
pub use gateway::{CallRequest, Gateway, GatewayBuilder, HealthReport, Payload, Reply};
pub use guardrails::{CrisisDetector, CrisisSignal, RedactionMap, Redactor};
pub use operations::AiOperations;
pub use provider::{GeminiProvider, Provider, ProviderError};
pub use resilience::circuit_breaker::{BreakerConfig, BreakerPhase, BreakerRegistry, BreakerSnapshot};
pub use resilience::classify::{classify, FailureKind};
pub use structured::parse_structured;
pub use types::{Emotion, Language, Modality, OperationKey};

/// Result type alias for the gateway.
pub type Result<T> = std::result::Result<T, Error>;
