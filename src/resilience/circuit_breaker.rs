//! Per-operation-key circuit breaker registry.
//!
//! One [`BreakerState`] per [`OperationKey`], created lazily on first use and
//! kept for the lifetime of the registry. Every read-modify-write, including
//! the admission check, happens under a single mutex so two callers can never
//! both take the HalfOpen probe.
//!
//! - **Closed**: admits everything; qualifying failures count toward the threshold.
//! - **Open**: denies until `reopen_at`, then hands the probe to the caller that noticed.
//! - **HalfOpen**: exactly one probe in flight. Success closes; a qualifying
//!   failure reopens with `min(max, max(base, prev * 2))` plus reopen jitter.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::classify::FailureKind;
use super::clock::{Clock, SystemClock};
use crate::config::de_secs;
use crate::types::OperationKey;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    #[serde(deserialize_with = "de_secs")]
    pub base_cooldown: Duration,
    #[serde(deserialize_with = "de_secs")]
    pub max_cooldown: Duration,
    /// A granted probe that has not resolved within this window is treated as lost.
    #[serde(deserialize_with = "de_secs")]
    pub half_open_probe_interval: Duration,
    /// Upper bound of the random extra delay added to `reopen_at` on reopen.
    #[serde(deserialize_with = "de_secs")]
    pub reopen_jitter: Duration,
    /// Minimum spacing between breaker warnings for one key.
    #[serde(deserialize_with = "de_secs")]
    pub log_rate_limit: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            base_cooldown: Duration::from_secs(30),
            max_cooldown: Duration::from_secs(120),
            half_open_probe_interval: Duration::from_secs(10),
            reopen_jitter: Duration::from_secs(5),
            log_rate_limit: Duration::from_secs(60),
        }
    }
}

impl BreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_cooldowns(mut self, base: Duration, max: Duration) -> Self {
        self.base_cooldown = base;
        self.max_cooldown = max;
        self
    }

    pub fn with_half_open_probe_interval(mut self, interval: Duration) -> Self {
        self.half_open_probe_interval = interval;
        self
    }

    pub fn with_reopen_jitter(mut self, jitter: Duration) -> Self {
        self.reopen_jitter = jitter;
        self
    }

    pub fn with_log_rate_limit(mut self, every: Duration) -> Self {
        self.log_rate_limit = every;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(Error::config("breaker failure_threshold must be greater than 0"));
        }
        if self.max_cooldown < self.base_cooldown {
            return Err(Error::config("breaker max_cooldown must be >= base_cooldown"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerPhase {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
struct BreakerState {
    phase: BreakerPhase,
    consecutive_failures: u32,
    cooldown: Duration,
    reopen_at: Option<Instant>,
    probe_available: bool,
    probe_id: u64,
    probe_granted_at: Option<Instant>,
    last_log_at: Option<Instant>,
    last_failure: Option<FailureKind>,
}

impl BreakerState {
    fn new() -> Self {
        Self {
            phase: BreakerPhase::Closed,
            consecutive_failures: 0,
            cooldown: Duration::ZERO,
            reopen_at: None,
            probe_available: true,
            probe_id: 0,
            probe_granted_at: None,
            last_log_at: None,
            last_failure: None,
        }
    }

    fn grant_probe(&mut self, now: Instant) -> u64 {
        self.phase = BreakerPhase::HalfOpen;
        self.probe_available = false;
        self.probe_id += 1;
        self.probe_granted_at = Some(now);
        self.probe_id
    }

    fn rearm_probe(&mut self) {
        self.probe_available = true;
        self.probe_granted_at = None;
    }

    fn open(&mut self, now: Instant, cooldown: Duration, extra: Duration) {
        self.phase = BreakerPhase::Open;
        self.consecutive_failures = 0;
        self.cooldown = cooldown;
        self.reopen_at = Some(now + cooldown + extra);
        self.rearm_probe();
    }

    fn should_log(&mut self, now: Instant, every: Duration) -> bool {
        match self.last_log_at {
            Some(last) if now.saturating_duration_since(last) < every => false,
            _ => {
                self.last_log_at = Some(now);
                true
            }
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Breaker closed; call freely.
    Admitted,
    /// Caller holds the single HalfOpen probe; the id is needed to release it.
    Probe(u64),
    Denied { cooldown_remaining: Duration },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::Denied { .. })
    }
}

/// Serializable view of one key's breaker.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub key: OperationKey,
    pub phase: BreakerPhase,
    pub consecutive_failures: u32,
    pub cooldown_secs: u64,
    pub cooldown_remaining_secs: u64,
    pub probe_available: bool,
    pub last_failure: Option<FailureKind>,
}

/// Process-wide breaker registry keyed by operation.
pub struct BreakerRegistry {
    cfg: BreakerConfig,
    clock: Arc<dyn Clock>,
    states: Mutex<HashMap<OperationKey, BreakerState>>,
}

impl BreakerRegistry {
    pub fn new(cfg: BreakerConfig) -> Self {
        Self::with_clock(cfg, Arc::new(SystemClock))
    }

    pub fn with_clock(cfg: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cfg,
            clock,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.cfg
    }

    // A panic while holding the lock leaves the map in a consistent state
    // (every mutation is a plain field assignment), so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<OperationKey, BreakerState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admission check that consumes the HalfOpen probe when granted.
    pub fn admit(&self, key: &OperationKey) -> Admission {
        let now = self.clock.now();
        let mut states = self.lock();
        let st = states.entry(key.clone()).or_insert_with(BreakerState::new);

        match st.phase {
            BreakerPhase::Closed => Admission::Admitted,
            BreakerPhase::Open => {
                let reopen_at = st.reopen_at.unwrap_or(now);
                if now >= reopen_at {
                    let id = st.grant_probe(now);
                    info!(key = %key, "ai_breaker_half_open");
                    Admission::Probe(id)
                } else {
                    let remaining = reopen_at - now;
                    if st.should_log(now, self.cfg.log_rate_limit) {
                        warn!(
                            key = %key,
                            cooldown_remaining_s = remaining.as_secs(),
                            "ai_breaker_open"
                        );
                    }
                    Admission::Denied {
                        cooldown_remaining: remaining,
                    }
                }
            }
            BreakerPhase::HalfOpen => {
                let probe_lost = st
                    .probe_granted_at
                    .map(|at| now.saturating_duration_since(at) >= self.cfg.half_open_probe_interval)
                    .unwrap_or(true);
                if st.probe_available || probe_lost {
                    Admission::Probe(st.grant_probe(now))
                } else {
                    let remaining = st
                        .probe_granted_at
                        .map(|at| (at + self.cfg.half_open_probe_interval).saturating_duration_since(now))
                        .unwrap_or(Duration::ZERO);
                    Admission::Denied {
                        cooldown_remaining: remaining,
                    }
                }
            }
        }
    }

    /// `true` when the call may proceed.
    pub fn allow(&self, key: &OperationKey) -> bool {
        self.admit(key).is_admitted()
    }

    pub fn record_success(&self, key: &OperationKey) {
        let mut states = self.lock();
        let st = states.entry(key.clone()).or_insert_with(BreakerState::new);
        if st.phase != BreakerPhase::Closed {
            info!(key = %key, "ai_breaker_closed");
        }
        st.phase = BreakerPhase::Closed;
        st.consecutive_failures = 0;
        st.cooldown = Duration::ZERO;
        st.reopen_at = None;
        st.rearm_probe();
    }

    pub fn record_failure(&self, key: &OperationKey, reason: FailureKind) {
        let now = self.clock.now();
        let mut states = self.lock();
        let st = states.entry(key.clone()).or_insert_with(BreakerState::new);

        // The probe stays with its caller until release_probe; the same call may retry.
        if !reason.is_qualifying() {
            return;
        }
        st.last_failure = Some(reason);

        match st.phase {
            BreakerPhase::Closed => {
                st.consecutive_failures = st.consecutive_failures.saturating_add(1);
                if st.consecutive_failures >= self.cfg.failure_threshold {
                    let cooldown = self.initial_cooldown();
                    st.open(now, cooldown, Duration::ZERO);
                    if st.should_log(now, self.cfg.log_rate_limit) {
                        warn!(
                            key = %key,
                            reason = reason.name(),
                            cooldown_s = cooldown.as_secs(),
                            "ai_breaker_open"
                        );
                    }
                }
            }
            BreakerPhase::HalfOpen => {
                let cooldown = self.escalated_cooldown(st.cooldown);
                let extra = random_up_to(self.cfg.reopen_jitter);
                st.open(now, cooldown, extra);
                if st.should_log(now, self.cfg.log_rate_limit) {
                    warn!(
                        key = %key,
                        reason = reason.name(),
                        cooldown_s = cooldown.as_secs(),
                        "ai_breaker_reopen"
                    );
                }
            }
            // Stragglers admitted before the breaker opened; the cooldown already covers them.
            BreakerPhase::Open => {}
        }
    }

    /// Return an unresolved probe token (caller dropped, or the outcome said nothing about availability).
    pub fn release_probe(&self, key: &OperationKey, probe_id: u64) {
        let mut states = self.lock();
        if let Some(st) = states.get_mut(key) {
            if st.phase == BreakerPhase::HalfOpen && st.probe_id == probe_id && !st.probe_available {
                st.rearm_probe();
            }
        }
    }

    /// Time until the key admits calls again; zero when it admits now.
    pub fn cooldown_remaining(&self, key: &OperationKey) -> Duration {
        let now = self.clock.now();
        let states = self.lock();
        match states.get(key) {
            Some(st) if st.phase == BreakerPhase::Open => st
                .reopen_at
                .map(|at| at.saturating_duration_since(now))
                .unwrap_or(Duration::ZERO),
            _ => Duration::ZERO,
        }
    }

    pub fn reset(&self, key: &OperationKey) {
        let mut states = self.lock();
        states.insert(key.clone(), BreakerState::new());
    }

    pub fn snapshot(&self, key: &OperationKey) -> Option<BreakerSnapshot> {
        let now = self.clock.now();
        let states = self.lock();
        states.get(key).map(|st| snapshot_of(key, st, now))
    }

    /// Snapshots of every key seen so far, sorted by key.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let now = self.clock.now();
        let states = self.lock();
        let mut out: Vec<_> = states.iter().map(|(k, st)| snapshot_of(k, st, now)).collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    fn initial_cooldown(&self) -> Duration {
        let span = self.cfg.max_cooldown.saturating_sub(self.cfg.base_cooldown);
        self.cfg.base_cooldown + random_up_to(span)
    }

    fn escalated_cooldown(&self, previous: Duration) -> Duration {
        previous
            .saturating_mul(2)
            .max(self.cfg.base_cooldown)
            .min(self.cfg.max_cooldown)
    }
}

fn random_up_to(bound: Duration) -> Duration {
    let ms = bound.as_millis() as u64;
    if ms == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(rand::thread_rng().gen_range(0..=ms))
    }
}

fn snapshot_of(key: &OperationKey, st: &BreakerState, now: Instant) -> BreakerSnapshot {
    let remaining = match st.phase {
        BreakerPhase::Open => st
            .reopen_at
            .map(|at| at.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO),
        _ => Duration::ZERO,
    };
    BreakerSnapshot {
        key: key.clone(),
        phase: st.phase,
        consecutive_failures: st.consecutive_failures,
        cooldown_secs: st.cooldown.as_secs(),
        cooldown_remaining_secs: remaining.as_secs(),
        probe_available: st.probe_available,
        last_failure: st.last_failure,
    }
}
