//! Keyword guardrails: crisis detection on user text and safety filtering of model replies.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::config::SafetyConfig;

pub const CRISIS_CATEGORY: &str = "self_harm";
const CRISIS_CONFIDENCE: f32 = 0.85;
const HELPLINE_NOTE: &str =
    "\n\nIf you're in immediate danger, please reach out to a trusted adult or local helpline.";
const BLOCK_PHRASES: &[&str] = &["how to hurt", "self-harm instructions"];

static SENSITIVE_TERMS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:suicide|kill)").expect("valid sensitive-term pattern"));

/// Outcome of a crisis keyword scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrisisSignal {
    pub triggered: bool,
    pub category: Option<String>,
    pub confidence: f32,
}

impl CrisisSignal {
    fn clear() -> Self {
        Self {
            triggered: false,
            category: None,
            confidence: 0.0,
        }
    }
}

/// Heuristic crisis keyword scan over free user text.
#[derive(Debug, Clone)]
pub struct CrisisDetector {
    words: Vec<String>,
}

impl CrisisDetector {
    pub fn new(cfg: &SafetyConfig) -> Self {
        Self {
            words: cfg
                .crisis_words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
        }
    }

    pub fn detect(&self, text: &str) -> CrisisSignal {
        if text.trim().is_empty() {
            return CrisisSignal::clear();
        }
        let lowered = text.to_lowercase();
        if self.words.iter().any(|w| lowered.contains(w.as_str())) {
            CrisisSignal {
                triggered: true,
                category: Some(CRISIS_CATEGORY.to_string()),
                confidence: CRISIS_CONFIDENCE,
            }
        } else {
            CrisisSignal::clear()
        }
    }
}

impl Default for CrisisDetector {
    fn default() -> Self {
        Self::new(&SafetyConfig::default())
    }
}

/// Mask sensitive terms in a plain-text reply and append a helpline note.
pub fn apply_response_safety(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }
    let mut cleaned = SENSITIVE_TERMS.replace_all(text, "[sensitive]").into_owned();
    cleaned.push_str(HELPLINE_NOTE);
    cleaned
}

/// Whether a reply must be withheld. Always `false` when filters are disabled.
pub fn should_block(cfg: &SafetyConfig, response_text: &str) -> bool {
    if !cfg.enable_filters {
        return false;
    }
    let lowered = response_text.to_lowercase();
    BLOCK_PHRASES.iter().any(|p| lowered.contains(p))
}
