//! Best-effort repair of near-JSON model output.
//!
//! Each step runs only when the previous candidate did not parse into a JSON
//! object, and the pipeline stops at the first success:
//!
//! 1. parse the trimmed text as-is
//! 2. strip Markdown code-fence wrapping
//! 3. drop prose before the first `{` (and after the last `}`)
//! 4. remove trailing commas before `}` / `]`
//! 5. when double quotes are scarce and single quotes dominate, swap quote style
//!
//! Repairs are purely syntactic. Missing fields are never filled in here.
//! Raw model text is never logged.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::{Error, ErrorContext, Result};

static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)\s*```").expect("valid fence pattern"));
static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([}\]])").expect("valid trailing comma pattern"));

/// Which pipeline step produced the parsed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStep {
    Direct,
    StrippedFence,
    IsolatedObject,
    RemovedTrailingCommas,
    SwappedQuotes,
}

impl RepairStep {
    pub fn name(&self) -> &'static str {
        match self {
            RepairStep::Direct => "direct",
            RepairStep::StrippedFence => "stripped_fence",
            RepairStep::IsolatedObject => "isolated_object",
            RepairStep::RemovedTrailingCommas => "removed_trailing_commas",
            RepairStep::SwappedQuotes => "swapped_quotes",
        }
    }
}

fn parse_object(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(v @ Value::Object(_)) => Some(v),
        _ => None,
    }
}

fn failure(message: &str) -> Error {
    Error::structured_output(message).with_context(ErrorContext::new().with_source("json_repair"))
}

/// Run the repair pipeline, reporting the step that succeeded.
pub fn repair(raw: &str) -> Result<(Value, RepairStep)> {
    let mut text = raw.trim().to_string();
    if let Some(v) = parse_object(&text) {
        return Ok((v, RepairStep::Direct));
    }

    if let Some(inner) = FENCE.captures(&text).and_then(|c| c.get(1)) {
        text = inner.as_str().to_string();
        if let Some(v) = parse_object(&text) {
            return Ok((v, RepairStep::StrippedFence));
        }
    }

    let start = text
        .find('{')
        .ok_or_else(|| failure("no JSON object found in model output"))?;
    let end = text.rfind('}').filter(|end| *end > start).map(|end| end + 1);
    text = match end {
        Some(end) => text[start..end].to_string(),
        None => text[start..].to_string(),
    };
    if let Some(v) = parse_object(&text) {
        return Ok((v, RepairStep::IsolatedObject));
    }

    text = TRAILING_COMMA.replace_all(&text, "$1").into_owned();
    if let Some(v) = parse_object(&text) {
        return Ok((v, RepairStep::RemovedTrailingCommas));
    }

    if text.matches('"').count() < 2 && text.matches('\'').count() >= 2 {
        text = text.replace('\'', "\"");
        if let Some(v) = parse_object(&text) {
            return Ok((v, RepairStep::SwappedQuotes));
        }
    }

    Err(failure("could not parse structured JSON output"))
}

/// Parse model output into a JSON object, repairing common defects.
pub fn parse_structured(raw: &str) -> Result<Value> {
    repair(raw).map(|(value, _)| value)
}
