//! 弹性模块：熔断注册表、超时执行器、重试退避与失败分类。
//!
//! # Resilience Primitives Module
//!
//! The building blocks the [`Gateway`](crate::Gateway) composes around every
//! provider call.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`circuit_breaker`] | Per-operation-key breaker registry (Closed / Open / HalfOpen) |
//! | [`timeout`] | Deadline-bounded execution of provider futures and blocking closures |
//! | [`retry`] | Exponential backoff with jitter, injectable sleeping |
//! | [`classify`] | Maps raw provider failures onto [`FailureKind`](classify::FailureKind) |
//! | [`clock`] | Injectable monotonic clock (system or manual) |
//!
//! ## Circuit Breaker
//!
//! ```rust
//! use wellness_ai_gateway::resilience::circuit_breaker::{BreakerConfig, BreakerRegistry};
//! use wellness_ai_gateway::{FailureKind, OperationKey};
//!
//! let registry = BreakerRegistry::new(BreakerConfig::new().with_failure_threshold(3));
//! let key = OperationKey::from("gemini-1.5-pro:text:journal_insights");
//!
//! if registry.allow(&key) {
//!     // call the provider...
//!     registry.record_failure(&key, FailureKind::ServerError);
//! }
//! ```

pub mod circuit_breaker;
pub mod classify;
pub mod clock;
pub mod retry;
pub mod timeout;

pub use circuit_breaker::{Admission, BreakerConfig, BreakerPhase, BreakerRegistry, BreakerSnapshot};
pub use classify::{classify, FailureKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use retry::{RetryPolicy, Sleeper, TokioSleeper};
pub use timeout::{run_blocking_with_timeout, run_with_timeout};
