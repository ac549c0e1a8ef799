//! 内容安全模块：出站 PII 脱敏、危机关键词检测与回复安全过滤。
//!
//! # Guardrails Module
//!
//! Privacy and safety checks applied around provider calls.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Redactor`] | Masks URLs, emails and phone-like digit runs before text leaves the process |
//! | [`RedactionMap`] | Placeholder-to-original mapping for one redaction call |
//! | [`CrisisDetector`] | Keyword scan of user text for self-harm signals |
//! | [`apply_response_safety`] | Masks sensitive terms in plain-text replies, appends a helpline note |
//! | [`should_block`] | Gate for replies that must never be shown |
//! | [`SafetyConfig`] | Filter flag and crisis word list |
//!
//! ## Example
//!
//! ```rust
//! use wellness_ai_gateway::guardrails::Redactor;
//!
//! let (masked, map) = Redactor::new().redact("Mail me at asha@example.com");
//! assert_eq!(masked, "Mail me at <<EM:0>>");
//! assert_eq!(map.restore(&masked), "Mail me at asha@example.com");
//! ```

mod config;
mod filters;
mod pii;

pub use config::{SafetyConfig, DEFAULT_CRISIS_WORDS};
pub use filters::{apply_response_safety, should_block, CrisisDetector, CrisisSignal, CRISIS_CATEGORY};
pub use pii::{PiiKind, RedactionMap, Redactor};
