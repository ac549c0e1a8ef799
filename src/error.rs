use crate::provider::ProviderError;
use crate::resilience::classify::{classify, FailureKind};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Structured error context attached to every gateway failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Operation key of the call that failed (e.g. "gemini-1.5-pro:text:journal_insights")
    pub operation_key: Option<String>,
    /// 1-based attempt number within the retry loop, when known
    pub attempt: Option<u32>,
    /// Additional detail such as the classified failure reason
    pub details: Option<String>,
    /// Component that raised the error (e.g. "gateway", "json_repair")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation_key(mut self, key: impl Into<String>) -> Self {
        self.operation_key = Some(key.into());
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Flat view of the error taxonomy, convenient for matching and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Safety,
    RateLimit,
    Timeout,
    Unavailable,
    StructuredOutput,
    InvalidInput,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::Safety => "safety",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::StructuredOutput => "structured_output",
            ErrorKind::InvalidInput => "invalid_input",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unified error type for the gateway and the typed operations built on it.
///
/// Every variant is a typed failure the caller maps to its own user-facing
/// message; nothing in this crate substitutes placeholder content.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid credentials/configuration. Never retried, never counted by the breaker.
    #[error("AI configuration error: {message}{}", format_context(.context))]
    Config {
        message: String,
        context: ErrorContext,
    },

    /// Provider rejected the content on policy grounds.
    #[error("AI safety rejection: {message}{}", format_context(.context))]
    Safety {
        message: String,
        context: ErrorContext,
    },

    /// Provider throttling on the final attempt.
    #[error("AI rate limited: {message}{}", format_context(.context))]
    RateLimit {
        message: String,
        context: ErrorContext,
    },

    #[error("AI request timed out after {}ms{}", .timeout.as_millis(), format_context(.context))]
    Timeout {
        timeout: Duration,
        context: ErrorContext,
    },

    /// Breaker open, or retries exhausted.
    #[error("AI unavailable: {message}{}{}", format_cooldown(.cooldown_remaining), format_context(.context))]
    Unavailable {
        message: String,
        cooldown_remaining: Option<Duration>,
        last_failure: Option<FailureKind>,
        context: ErrorContext,
    },

    /// Schema-required JSON could not be produced, repaired or validated.
    #[error("Structured output error: {message}{}", format_context(.context))]
    StructuredOutput {
        message: String,
        context: ErrorContext,
    },

    /// Caller input rejected before any provider call was made.
    #[error("Invalid input: {message}{}", format_context(.context))]
    InvalidInput {
        message: String,
        context: ErrorContext,
    },
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref key) = ctx.operation_key {
        parts.push(format!("key: {}", key));
    }
    if let Some(attempt) = ctx.attempt {
        parts.push(format!("attempt: {}", attempt));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn format_cooldown(remaining: &Option<Duration>) -> String {
    match remaining {
        Some(d) => format!(" [retry in {}s]", d.as_secs()),
        None => String::new(),
    }
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn safety(msg: impl Into<String>) -> Self {
        Error::Safety {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn rate_limit(msg: impl Into<String>) -> Self {
        Error::RateLimit {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn timeout(timeout: Duration) -> Self {
        Error::Timeout {
            timeout,
            context: ErrorContext::new(),
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Error::Unavailable {
            message: msg.into(),
            cooldown_remaining: None,
            last_failure: None,
            context: ErrorContext::new(),
        }
    }

    pub fn structured_output(msg: impl Into<String>) -> Self {
        Error::StructuredOutput {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    /// Replace the structured context carried by this error.
    pub fn with_context(mut self, ctx: ErrorContext) -> Self {
        *self.context_mut() = ctx;
        self
    }

    pub fn context(&self) -> &ErrorContext {
        match self {
            Error::Config { context, .. }
            | Error::Safety { context, .. }
            | Error::RateLimit { context, .. }
            | Error::Timeout { context, .. }
            | Error::Unavailable { context, .. }
            | Error::StructuredOutput { context, .. }
            | Error::InvalidInput { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Error::Config { context, .. }
            | Error::Safety { context, .. }
            | Error::RateLimit { context, .. }
            | Error::Timeout { context, .. }
            | Error::Unavailable { context, .. }
            | Error::StructuredOutput { context, .. }
            | Error::InvalidInput { context, .. } => context,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config { .. } => ErrorKind::Config,
            Error::Safety { .. } => ErrorKind::Safety,
            Error::RateLimit { .. } => ErrorKind::RateLimit,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Unavailable { .. } => ErrorKind::Unavailable,
            Error::StructuredOutput { .. } => ErrorKind::StructuredOutput,
            Error::InvalidInput { .. } => ErrorKind::InvalidInput,
        }
    }

    /// Whether a latency-sensitive operation may try once more with its short prompt.
    pub fn allows_short_prompt_retry(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Timeout | ErrorKind::Unavailable | ErrorKind::StructuredOutput
        )
    }

    /// Remaining breaker cooldown, when the failure came from an open breaker.
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        match self {
            Error::Unavailable {
                cooldown_remaining, ..
            } => *cooldown_remaining,
            _ => None,
        }
    }
}

/// Surface a single raw provider failure in the gateway taxonomy.
impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        let kind = classify(&err);
        let context = ErrorContext::new().with_details(kind.name());
        match (kind, &err) {
            (FailureKind::Config, _) => Error::Config {
                message: err.to_string(),
                context,
            },
            (FailureKind::Safety, _) => Error::Safety {
                message: err.to_string(),
                context,
            },
            (FailureKind::RateLimit, _) => Error::RateLimit {
                message: err.to_string(),
                context,
            },
            (_, ProviderError::DeadlineExceeded(timeout)) => Error::Timeout {
                timeout: *timeout,
                context,
            },
            _ => Error::Unavailable {
                message: err.to_string(),
                cooldown_remaining: None,
                last_failure: Some(kind),
                context,
            },
        }
    }
}
