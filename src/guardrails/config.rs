//! Guardrails configuration

use serde::{Deserialize, Serialize};

/// Built-in crisis phrases, matched case-insensitively as substrings.
pub const DEFAULT_CRISIS_WORDS: &[&str] = &[
    "suicide",
    "kill myself",
    "end my life",
    "hurt myself",
    "self-harm",
    "cut myself",
    "i want to die",
    "no reason to live",
];

/// Safety settings for guardrails applied around provider calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Gate for [`should_block`](super::should_block). Crisis detection always runs.
    pub enable_filters: bool,
    pub crisis_words: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            enable_filters: true,
            crisis_words: DEFAULT_CRISIS_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl SafetyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filters(mut self, enabled: bool) -> Self {
        self.enable_filters = enabled;
        self
    }

    pub fn with_crisis_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.crisis_words = words
            .into_iter()
            .map(|w| w.into().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        self
    }
}
