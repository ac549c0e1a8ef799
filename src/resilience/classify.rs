//! Failure classification.
//!
//! The single place that couples the resilience core to provider error
//! shapes. Only structural facts are inspected: a status-code-like field,
//! the internal deadline marker, and message substrings. Swapping providers
//! means touching this function and nothing else.

use serde::Serialize;
use std::fmt;

use crate::provider::ProviderError;

const CONFIG_MARKERS: &[&str] = &["api key", "api_key", "credential"];
const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out", "deadline"];
const NETWORK_MARKERS: &[&str] = &["dns", "network", "connection", "connect", "unreachable"];

/// Classified provider failure; drives control flow and breaker feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Config,
    Safety,
    RateLimit,
    Timeout,
    ServerError,
    Network,
    Unknown,
    /// Structured output still unusable after a short-prompt retry.
    MalformedOutput,
}

impl FailureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FailureKind::Config => "config",
            FailureKind::Safety => "safety",
            FailureKind::RateLimit => "rate_limit",
            FailureKind::Timeout => "timeout",
            FailureKind::ServerError => "server_error",
            FailureKind::Network => "network",
            FailureKind::Unknown => "unknown",
            FailureKind::MalformedOutput => "malformed_output",
        }
    }

    /// Whether this failure indicates provider unavailability and counts toward opening the breaker.
    pub fn is_qualifying(&self) -> bool {
        matches!(
            self,
            FailureKind::Timeout
                | FailureKind::RateLimit
                | FailureKind::ServerError
                | FailureKind::Network
                | FailureKind::MalformedOutput
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Map a raw provider failure to its [`FailureKind`], in priority order.
pub fn classify(err: &ProviderError) -> FailureKind {
    let status = err.status();
    let msg = err.to_string().to_lowercase();

    if matches!(err, ProviderError::NotConfigured(_))
        || matches!(status, Some(401) | Some(403))
        || CONFIG_MARKERS.iter().any(|m| msg.contains(m))
    {
        return FailureKind::Config;
    }
    if matches!(err, ProviderError::ContentBlocked(_)) {
        return FailureKind::Safety;
    }
    if let Some(code) = status {
        if (400..500).contains(&code) && code != 429 && code != 408 {
            return FailureKind::Safety;
        }
        if code == 429 {
            return FailureKind::RateLimit;
        }
    }
    if matches!(err, ProviderError::DeadlineExceeded(_)) || status == Some(408) {
        return FailureKind::Timeout;
    }
    if matches!(status, Some(code) if code >= 500) {
        return FailureKind::ServerError;
    }
    if TIMEOUT_MARKERS.iter().any(|m| msg.contains(m)) {
        return FailureKind::Timeout;
    }
    if NETWORK_MARKERS.iter().any(|m| msg.contains(m)) {
        return FailureKind::Network;
    }
    FailureKind::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn status(code: u16, message: &str) -> ProviderError {
        ProviderError::Status {
            status: code,
            message: message.to_string(),
        }
    }

    #[test]
    fn classification_table() {
        let cases = vec![
            (ProviderError::NotConfigured("no key".into()), FailureKind::Config),
            (status(401, "unauthenticated"), FailureKind::Config),
            (status(403, "forbidden"), FailureKind::Config),
            (status(400, "API key not valid. Please pass a valid API key."), FailureKind::Config),
            (ProviderError::ContentBlocked("SAFETY".into()), FailureKind::Safety),
            (status(400, "invalid argument"), FailureKind::Safety),
            (status(404, "model not found"), FailureKind::Safety),
            (status(429, "resource exhausted"), FailureKind::RateLimit),
            (status(408, "request timeout"), FailureKind::Timeout),
            (ProviderError::DeadlineExceeded(Duration::from_secs(1)), FailureKind::Timeout),
            (status(500, "internal"), FailureKind::ServerError),
            (status(503, "overloaded"), FailureKind::ServerError),
            (ProviderError::Transport("request timeout: operation timed out".into()), FailureKind::Timeout),
            (ProviderError::Transport("dns error: failed to lookup".into()), FailureKind::Network),
            (ProviderError::Transport("connection error: refused".into()), FailureKind::Network),
            (ProviderError::Other("something odd".into()), FailureKind::Unknown),
        ];
        for (err, expected) in cases {
            assert_eq!(classify(&err), expected, "classifying {:?}", err);
        }
    }

    #[test]
    fn server_error_wins_over_timeout_wording() {
        assert_eq!(classify(&status(504, "gateway timeout")), FailureKind::ServerError);
    }

    #[test]
    fn qualifying_kinds() {
        assert!(FailureKind::Timeout.is_qualifying());
        assert!(FailureKind::RateLimit.is_qualifying());
        assert!(FailureKind::ServerError.is_qualifying());
        assert!(FailureKind::Network.is_qualifying());
        assert!(!FailureKind::Config.is_qualifying());
        assert!(!FailureKind::Safety.is_qualifying());
        assert!(!FailureKind::Unknown.is_qualifying());
    }
}
