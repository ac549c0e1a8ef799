//! PII (Personally Identifiable Information) redaction

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt;

static URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bhttps?://[^\s<>]+").expect("valid url pattern"));
static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}").expect("valid email pattern")
});
// 7+ digits, any run of separators between digits, optional leading '+'
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+?[0-9](?:[ .\-]*[0-9]){6,}").expect("valid phone pattern"));

/// Upper bound on redaction passes; a pass that finds nothing ends early.
const MAX_PASSES: usize = 4;

/// Kind of personally identifying substring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiiKind {
    Url,
    Email,
    Phone,
}

impl PiiKind {
    /// Placeholder tag, e.g. `EM` in `<<EM:0>>`.
    pub fn tag(&self) -> &'static str {
        match self {
            PiiKind::Url => "URL",
            PiiKind::Email => "EM",
            PiiKind::Phone => "PH",
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            PiiKind::Url => &URL_PATTERN,
            PiiKind::Email => &EMAIL_PATTERN,
            PiiKind::Phone => &PHONE_PATTERN,
        }
    }
}

/// Placeholder to original substring, in insertion order.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RedactionMap {
    entries: Vec<(String, String)>,
}

impl RedactionMap {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, placeholder: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(p, _)| p == placeholder)
            .map(|(_, original)| original.as_str())
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    /// Put the original substrings back. Later placeholders are undone first
    /// so nested replacements unwind correctly.
    pub fn restore(&self, masked: &str) -> String {
        self.entries
            .iter()
            .rev()
            .fold(masked.to_string(), |acc, (placeholder, original)| {
                acc.replace(placeholder.as_str(), original)
            })
    }
}

// Originals are PII; keep them out of debug output.
impl fmt::Debug for RedactionMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedactionMap")
            .field("placeholders", &self.placeholders().collect::<Vec<_>>())
            .finish()
    }
}

/// Masks URLs, emails and phone-like digit runs with positional placeholders.
///
/// The URL pass runs first so addresses embedded in links are masked as part
/// of the link. Passes repeat until no pattern matches, so the output never
/// contains a substring matching any of the three patterns, and running the
/// redactor over its own output leaves it unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Redactor;

impl Redactor {
    const ORDER: [PiiKind; 3] = [PiiKind::Url, PiiKind::Email, PiiKind::Phone];

    pub fn new() -> Self {
        Self
    }

    pub fn redact(&self, text: &str) -> (String, RedactionMap) {
        let mut map = RedactionMap::default();
        let mut counters = [0usize; 3];
        let mut masked = text.to_string();

        for _ in 0..MAX_PASSES {
            let mut changed = false;
            for (slot, kind) in Self::ORDER.iter().enumerate() {
                let pattern = kind.pattern();
                if !pattern.is_match(&masked) {
                    continue;
                }
                changed = true;
                masked = pattern
                    .replace_all(&masked, |caps: &Captures| {
                        let placeholder = format!("<<{}:{}>>", kind.tag(), counters[slot]);
                        counters[slot] += 1;
                        map.entries.push((placeholder.clone(), caps[0].to_string()));
                        placeholder
                    })
                    .into_owned();
            }
            if !changed {
                break;
            }
        }
        (masked, map)
    }

    /// Masked text only; the map is discarded.
    pub fn redact_text(&self, text: &str) -> String {
        self.redact(text).0
    }

    pub fn contains_pii(&self, text: &str) -> bool {
        Self::ORDER.iter().any(|k| k.pattern().is_match(text))
    }
}
