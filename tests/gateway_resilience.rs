//! Gateway resilience scenarios against a scripted provider.

mod support;

use async_trait::async_trait;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use support::*;
use wellness_ai_gateway::resilience::{Admission, ManualClock, RetryPolicy, Sleeper};
use wellness_ai_gateway::{
    BreakerPhase, BreakerRegistry, CallRequest, ErrorKind, FailureKind, Gateway, GatewayConfig, OperationKey,
    ProviderError, Reply,
};

fn key() -> OperationKey {
    OperationKey::from("test-model:text:journal_insights")
}

fn failures(h: &Harness, key: &OperationKey) -> u32 {
    h.gateway
        .breakers()
        .snapshot(key)
        .map(|s| s.consecutive_failures)
        .unwrap_or(0)
}

#[tokio::test]
async fn two_server_errors_then_success() {
    let h = harness(
        vec![status(500, "internal"), status(503, "overloaded"), text("ok")],
        fixed_breaker(3),
        3,
    );
    let k = key();

    let reply = h.gateway.call(&k, CallRequest::text("hi")).await.unwrap();
    assert_eq!(reply, Reply::Text("ok".into()));
    assert_eq!(h.provider.calls(), 3);
    assert_eq!(failures(&h, &k), 0);

    let delays = h.sleeper.delays();
    assert_eq!(delays.len(), 2, "exactly two backoff sleeps");
    assert!(delays[1] > delays[0], "backoff grows: {:?}", delays);
    assert!(delays[0] >= Duration::from_millis(600));
    assert!(delays[1] >= Duration::from_millis(1200));
}

#[tokio::test]
async fn config_failures_are_not_retried_or_counted() {
    let h = harness(vec![status(401, "API key not valid"), status(401, "API key not valid")], fixed_breaker(1), 3);
    let k = key();

    for _ in 0..2 {
        let err = h.gateway.call(&k, CallRequest::text("hi")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
    assert_eq!(h.provider.calls(), 2);
    assert!(h.sleeper.delays().is_empty());
    assert_eq!(failures(&h, &k), 0);
    assert!(h.gateway.breakers().allow(&k));
}

#[tokio::test]
async fn safety_failures_are_not_retried_or_counted() {
    let h = harness(
        vec![
            Step::Fail(ProviderError::ContentBlocked("SAFETY".into())),
            status(400, "bad request"),
        ],
        fixed_breaker(1),
        3,
    );
    let k = key();

    let err = h.gateway.call(&k, CallRequest::text("a")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Safety);
    let err = h.gateway.call(&k, CallRequest::text("b")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Safety);

    assert_eq!(h.provider.calls(), 2);
    assert_eq!(failures(&h, &k), 0);
    assert!(h.gateway.breakers().allow(&k));
}

#[tokio::test]
async fn rate_limit_on_final_attempt_surfaces_as_rate_limit() {
    let h = harness(
        vec![status(429, "quota"), status(429, "quota"), status(429, "quota")],
        fixed_breaker(5),
        3,
    );
    let k = key();

    let err = h.gateway.call(&k, CallRequest::text("hi")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimit);
    assert_eq!(err.context().attempt, Some(3));
    assert_eq!(h.provider.calls(), 3);
    assert_eq!(h.sleeper.delays().len(), 2);
    assert_eq!(failures(&h, &k), 3);
}

#[tokio::test]
async fn exhausted_retries_become_unavailable_and_open_the_breaker() {
    let h = harness(
        vec![
            network("connection reset"),
            network("connection reset"),
            network("connection reset"),
        ],
        fixed_breaker(3),
        3,
    );
    let k = key();

    let err = h.gateway.call(&k, CallRequest::text("hi")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    match &err {
        wellness_ai_gateway::Error::Unavailable { last_failure, .. } => {
            assert_eq!(*last_failure, Some(FailureKind::Network));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(h.gateway.breakers().snapshot(&k).unwrap().phase, BreakerPhase::Open);

    // denied without touching the provider
    let err = h.gateway.call(&k, CallRequest::text("again")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(err.cooldown_remaining(), Some(Duration::from_secs(30)));
    assert_eq!(h.provider.calls(), 3);
}

#[tokio::test]
async fn breaker_opening_mid_call_stops_the_retry_loop() {
    let h = harness(vec![status(500, "a"), status(500, "b"), text("never")], fixed_breaker(2), 3);
    let k = key();

    let err = h.gateway.call(&k, CallRequest::text("hi")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(err.cooldown_remaining().is_some());
    assert_eq!(h.provider.calls(), 2);
    assert_eq!(h.sleeper.delays().len(), 1);
}

#[tokio::test]
async fn open_breaker_reports_remaining_cooldown_then_admits_probe() {
    let h = harness(
        vec![status(500, "x"), status(500, "x"), status(500, "x"), text("recovered")],
        fixed_breaker(3),
        1,
    );
    let k = key();

    for _ in 0..3 {
        let err = h.gateway.call(&k, CallRequest::text("hi")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }
    assert_eq!(h.gateway.breakers().snapshot(&k).unwrap().phase, BreakerPhase::Open);

    h.clock.advance(Duration::from_secs(1));
    let err = h.gateway.call(&k, CallRequest::text("hi")).await.unwrap_err();
    assert_eq!(err.cooldown_remaining(), Some(Duration::from_secs(29)));
    assert!(err.to_string().contains("retry in 29s"));
    assert_eq!(h.provider.calls(), 3);

    h.clock.advance(Duration::from_secs(29));
    let reply = h.gateway.call(&k, CallRequest::text("hi")).await.unwrap();
    assert_eq!(reply.into_text(), "recovered");

    let snap = h.gateway.breakers().snapshot(&k).unwrap();
    assert_eq!(snap.phase, BreakerPhase::Closed);
    assert_eq!(snap.consecutive_failures, 0);
    assert_eq!(snap.cooldown_secs, 0);
}

#[tokio::test]
async fn failed_probe_reopens_with_longer_cooldown() {
    let breaker = fixed_breaker(1).with_cooldowns(Duration::from_secs(30), Duration::from_secs(120));
    let h = harness(vec![status(500, "x"), status(502, "x")], breaker, 1);
    let k = key();

    h.gateway.call(&k, CallRequest::text("hi")).await.unwrap_err();
    let first = h.gateway.breakers().snapshot(&k).unwrap().cooldown_secs;

    h.clock.advance(Duration::from_secs(121));
    h.gateway.call(&k, CallRequest::text("probe")).await.unwrap_err();
    let snap = h.gateway.breakers().snapshot(&k).unwrap();
    assert_eq!(snap.phase, BreakerPhase::Open);
    assert!(snap.cooldown_secs > first || snap.cooldown_secs == 120);
}

#[tokio::test]
async fn safety_failure_on_probe_rearms_it() {
    let h = harness(
        vec![
            status(500, "x"),
            Step::Fail(ProviderError::ContentBlocked("SAFETY".into())),
            text("fine"),
        ],
        fixed_breaker(1),
        1,
    );
    let k = key();

    h.gateway.call(&k, CallRequest::text("hi")).await.unwrap_err();
    h.clock.advance(Duration::from_secs(30));

    let err = h.gateway.call(&k, CallRequest::text("probe")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Safety);
    assert_eq!(h.gateway.breakers().snapshot(&k).unwrap().phase, BreakerPhase::HalfOpen);

    let reply = h.gateway.call(&k, CallRequest::text("probe again")).await.unwrap();
    assert_eq!(reply.into_text(), "fine");
}

/// Tries to get admitted by the same key while the gateway backs off.
struct AdmitDuringBackoff {
    breakers: Arc<BreakerRegistry>,
    key: OperationKey,
    seen: Mutex<Vec<Admission>>,
}

#[async_trait]
impl Sleeper for AdmitDuringBackoff {
    async fn sleep(&self, _duration: Duration) {
        let admission = self.breakers.admit(&self.key);
        self.seen.lock().unwrap().push(admission);
    }
}

#[tokio::test]
async fn half_open_call_retrying_after_unknown_failure_keeps_exclusive_admission() {
    let k = key();
    let clock = Arc::new(ManualClock::new());
    let breakers = Arc::new(BreakerRegistry::with_clock(fixed_breaker(1), clock.clone()));
    breakers.record_failure(&k, FailureKind::ServerError);
    clock.advance(Duration::from_secs(30));

    let provider = ScriptedProvider::new(vec![Step::Fail(ProviderError::Other("something odd".into())), text("ok")]);
    let sleeper = Arc::new(AdmitDuringBackoff {
        breakers: breakers.clone(),
        key: k.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let config = GatewayConfig::new().with_text_model("test-model");
    let gateway = Gateway::builder()
        .with_config(&config)
        .with_provider(provider.clone())
        .with_breakers(breakers.clone())
        .with_sleeper(sleeper.clone())
        .with_retry_policy(RetryPolicy::from_config(&config).with_max_retries(2))
        .build()
        .unwrap();

    let reply = gateway.call(&k, CallRequest::text("hi")).await.unwrap();
    assert_eq!(reply.into_text(), "ok");
    assert_eq!(provider.calls(), 2);

    let seen = sleeper.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert!(!seen[0].is_admitted(), "second caller admitted during backoff: {:?}", seen);
    assert_eq!(breakers.snapshot(&k).unwrap().phase, BreakerPhase::Closed);
}

#[tokio::test]
async fn dropped_probe_caller_returns_the_token() {
    let h = harness(vec![status(500, "x"), Step::Hang, text("fine")], fixed_breaker(1), 1);
    let k = key();

    h.gateway.call(&k, CallRequest::text("hi")).await.unwrap_err();
    h.clock.advance(Duration::from_secs(30));

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        h.gateway.call(&k, CallRequest::text("probe")),
    )
    .await;
    assert!(abandoned.is_err(), "probe call should still be pending");

    let reply = h.gateway.call(&k, CallRequest::text("next probe")).await.unwrap();
    assert_eq!(reply.into_text(), "fine");
}

#[tokio::test]
async fn timeouts_are_retried() {
    let h = harness_with_timeout(
        vec![Step::Hang, text("late but fine")],
        fixed_breaker(3),
        3,
        Duration::from_millis(50),
    );
    let k = key();

    let reply = h.gateway.call(&k, CallRequest::text("hi")).await.unwrap();
    assert_eq!(reply.into_text(), "late but fine");
    assert_eq!(h.provider.calls(), 2);
    assert_eq!(h.sleeper.delays().len(), 1);
}

#[tokio::test]
async fn per_call_timeout_override_wins() {
    let h = harness(vec![Step::Hang], fixed_breaker(3), 1);
    let k = key();

    let err = h
        .gateway
        .call(&k, CallRequest::text("hi").with_timeout(Duration::from_millis(30)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(failures(&h, &k), 1);
    assert_eq!(
        h.gateway.breakers().snapshot(&k).unwrap().last_failure,
        Some(FailureKind::Timeout)
    );
}

#[tokio::test]
async fn structured_reply_is_repaired() {
    let h = harness(vec![text("Sure!\n```json\n{\"summary\": \"ok\",}\n```")], fixed_breaker(3), 3);
    let k = key();

    let reply = h
        .gateway
        .call(&k, CallRequest::text("hi").with_schema(json!({"type": "object"})))
        .await
        .unwrap();
    assert_eq!(reply, Reply::Json(json!({"summary": "ok"})));
}

#[tokio::test]
async fn unrepairable_reply_is_structured_output_without_retry() {
    let h = harness(vec![text("I cannot help with JSON today"), text("{}")], fixed_breaker(1), 3);
    let k = key();

    let err = h
        .gateway
        .call(&k, CallRequest::text("hi").with_schema(json!({"type": "object"})))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StructuredOutput);
    assert_eq!(err.context().source.as_deref(), Some("json_repair"));
    assert_eq!(h.provider.calls(), 1);
    assert_eq!(failures(&h, &k), 0);
}

#[tokio::test]
async fn unknown_failures_are_retried_but_not_counted() {
    let h = harness(
        vec![
            Step::Fail(ProviderError::Other("weird".into())),
            Step::Fail(ProviderError::Other("weird".into())),
        ],
        fixed_breaker(1),
        2,
    );
    let k = key();

    let err = h.gateway.call(&k, CallRequest::text("hi")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(h.provider.calls(), 2);
    assert_eq!(failures(&h, &k), 0);
    assert!(h.gateway.breakers().allow(&k));
}

#[tokio::test]
async fn keys_are_isolated() {
    let h = harness(vec![status(500, "x"), text("other key is fine")], fixed_breaker(1), 1);
    let a = OperationKey::from("test-model:text:a");
    let b = OperationKey::from("test-model:text:b");

    h.gateway.call(&a, CallRequest::text("hi")).await.unwrap_err();
    assert!(!h.gateway.breakers().allow(&a));
    let reply = h.gateway.call(&b, CallRequest::text("hi")).await.unwrap();
    assert_eq!(reply.into_text(), "other key is fine");
}

#[tokio::test]
async fn health_reports_open_breakers() {
    let h = harness(vec![status(500, "x")], fixed_breaker(1), 1);
    let k = key();
    assert!(h.gateway.health().ok);

    h.gateway.call(&k, CallRequest::text("hi")).await.unwrap_err();
    let report = h.gateway.health();
    assert!(!report.ok);
    assert_eq!(report.provider, "scripted");
    assert_eq!(report.text_model, "test-model");
    assert_eq!(report.open_breakers().count(), 1);

    let as_json = serde_json::to_value(&report).unwrap();
    assert_eq!(as_json["breakers"][0]["phase"], "open");
}
