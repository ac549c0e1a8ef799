use serde::Serialize;

use super::Gateway;
use crate::resilience::circuit_breaker::{BreakerPhase, BreakerSnapshot};

/// Point-in-time view of gateway configuration and breaker state.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// False while any breaker is open.
    pub ok: bool,
    pub provider: String,
    pub text_model: String,
    pub vision_model: String,
    pub timeout_secs: f64,
    pub retries: u32,
    pub breakers: Vec<BreakerSnapshot>,
}

impl HealthReport {
    pub(crate) fn collect(gateway: &Gateway) -> Self {
        let breakers = gateway.breakers().snapshots();
        let ok = breakers.iter().all(|b| b.phase != BreakerPhase::Open);
        Self {
            ok,
            provider: gateway.provider_name().to_string(),
            text_model: gateway.text_model().to_string(),
            vision_model: gateway.vision_model().to_string(),
            timeout_secs: gateway.default_timeout().as_secs_f64(),
            retries: gateway.retry_policy().max_retries,
            breakers,
        }
    }

    pub fn open_breakers(&self) -> impl Iterator<Item = &BreakerSnapshot> {
        self.breakers.iter().filter(|b| b.phase == BreakerPhase::Open)
    }
}
