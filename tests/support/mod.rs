//! Shared fixtures: a scripted in-memory provider and a sleeper that records
//! backoff delays instead of waiting them out.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wellness_ai_gateway::resilience::{ManualClock, RetryPolicy, Sleeper};
use wellness_ai_gateway::{BreakerConfig, Gateway, GatewayConfig, Provider, ProviderError};

/// One scripted provider outcome.
#[derive(Debug, Clone)]
pub enum Step {
    Text(String),
    Fail(ProviderError),
    /// Never answers within any reasonable deadline.
    Hang,
}

pub fn text(s: &str) -> Step {
    Step::Text(s.to_string())
}

pub fn status(code: u16, message: &str) -> Step {
    Step::Fail(ProviderError::Status {
        status: code,
        message: message.to_string(),
    })
}

pub fn network(message: &str) -> Step {
    Step::Fail(ProviderError::Transport(message.to_string()))
}

#[derive(Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn push(&self, step: Step) {
        self.steps.lock().unwrap().push_back(step);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    async fn next(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Text(t)) => Ok(t),
            Some(Step::Fail(e)) => Err(e),
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
            None => Err(ProviderError::Other("script exhausted".into())),
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_text(&self, prompt: &str, _schema: Option<&Value>) -> Result<String, ProviderError> {
        self.next(prompt).await
    }

    async fn describe_image(&self, _image: Bytes, _mime_type: &str, prompt: &str) -> Result<String, ProviderError> {
        self.next(prompt).await
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

pub struct Harness {
    pub gateway: Arc<Gateway>,
    pub provider: Arc<ScriptedProvider>,
    pub sleeper: Arc<RecordingSleeper>,
    pub clock: Arc<ManualClock>,
}

/// Breaker with a fixed 30s cooldown, so timings are deterministic.
pub fn fixed_breaker(threshold: u32) -> BreakerConfig {
    BreakerConfig::new()
        .with_failure_threshold(threshold)
        .with_cooldowns(Duration::from_secs(30), Duration::from_secs(30))
        .with_reopen_jitter(Duration::ZERO)
}

pub fn harness(steps: impl IntoIterator<Item = Step>, breaker: BreakerConfig, retries: u32) -> Harness {
    harness_with_timeout(steps, breaker, retries, Duration::from_secs(5))
}

pub fn harness_with_timeout(
    steps: impl IntoIterator<Item = Step>,
    breaker: BreakerConfig,
    retries: u32,
    timeout: Duration,
) -> Harness {
    let provider = ScriptedProvider::new(steps);
    let sleeper = RecordingSleeper::new();
    let clock = Arc::new(ManualClock::new());
    let config = GatewayConfig::new()
        .with_text_model("test-model")
        .with_vision_model("test-vision")
        .with_breaker(breaker);
    let gateway = Gateway::builder()
        .with_config(&config)
        .with_provider(provider.clone())
        .with_clock(clock.clone())
        .with_sleeper(sleeper.clone())
        .with_retry_policy(RetryPolicy::from_config(&config).with_max_retries(retries))
        .with_timeout(timeout)
        .build()
        .expect("gateway builds");
    Harness {
        gateway: Arc::new(gateway),
        provider,
        sleeper,
        clock,
    }
}
