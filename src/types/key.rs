use serde::{Deserialize, Serialize};
use std::fmt;

/// Call shape of an operation; part of the operation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Vision,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Vision => "vision",
        }
    }
}

/// Identifies a distinct (model, modality, operation) call site.
///
/// Each key owns exactly one breaker state in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationKey(String);

impl OperationKey {
    pub fn new(model: &str, modality: Modality, operation: &str) -> Self {
        Self(format!("{}:{}:{}", model, modality.as_str(), operation))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trailing operation segment, e.g. `journal_insights`.
    pub fn operation(&self) -> &str {
        self.0.rsplit(':').next().unwrap_or(&self.0)
    }
}

impl From<&str> for OperationKey {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for OperationKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
