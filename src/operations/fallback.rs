use std::future::Future;
use tracing::warn;

use super::prompts::PromptVariant;
use crate::gateway::Gateway;
use crate::types::OperationKey;
use crate::{ErrorKind, Result};

/// Run `attempt` with the full prompt; on `Timeout`, `Unavailable` or
/// `StructuredOutput` run it exactly once more with the short prompt.
///
/// The second failure is returned as is. When it is a structural failure
/// again, the key's breaker is told so.
pub async fn with_short_prompt_retry<T, F, Fut>(
    gateway: &Gateway,
    key: &OperationKey,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut(PromptVariant) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let first = match attempt(PromptVariant::Full).await {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    if !first.allows_short_prompt_retry() {
        return Err(first);
    }

    warn!(key = %key, reason = first.kind().name(), "ai_short_prompt_retry");
    match attempt(PromptVariant::Short).await {
        Ok(value) => Ok(value),
        Err(second) => {
            if second.kind() == ErrorKind::StructuredOutput {
                gateway.report_malformed_output(key);
            }
            Err(second)
        }
    }
}
