//! Circuit breaker for destination protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: destination assumed down, requests fail fast
//! - Half-Open: testing if destination recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold
//! Open → Half-Open: first attempt after recovery timeout
//! Half-Open → Closed: probe request succeeds
//! Half-Open → Open: probe request fails
//! ```
//!
//! # Design Decisions
//! - Per-destination circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering recovering destination)
//! - The probe is held until it reports or is released, never expired by time
//! - All fields change together under one lock

use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Current state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Numeric encoding used for the state gauge.
    pub fn as_gauge(self) -> f64 {
        match self {
            Self::Closed => 0.0,
            Self::HalfOpen => 1.0,
            Self::Open => 2.0,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Answer to [`CircuitBreaker::attempt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit closed, the call may proceed.
    Allowed,
    /// The single half-open trial call. Its outcome decides the next state.
    ///
    /// A caller that gives up without reporting must hand the id back through
    /// [`CircuitBreaker::release_probe`].
    Probe { id: u64 },
    /// The call must not be attempted.
    Rejected {
        /// Time until the breaker will consider a probe.
        retry_after: Duration,
    },
}

impl Admission {
    pub fn is_permitted(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&CircuitBreakerConfig> for BreakerSettings {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            recovery_timeout: config.recovery_timeout(),
        }
    }
}

/// Point-in-time copy of the breaker's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure: Option<Instant>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    /// Id of the outstanding half-open probe.
    probe: Option<u64>,
    next_probe_id: u64,
}

/// Three-state circuit breaker guarding one destination.
#[derive(Debug)]
pub struct CircuitBreaker {
    label: String,
    settings: BreakerSettings,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self::with_label("default", settings)
    }

    /// Create a breaker whose logs and metrics carry `label`.
    pub fn with_label(label: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            label: label.into(),
            settings,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                probe: None,
                next_probe_id: 0,
            }),
        }
    }

    pub fn settings(&self) -> BreakerSettings {
        self.settings
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Same breaker state under a different label.
    pub fn relabel(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ask to run one operation.
    ///
    /// An open circuit whose recovery timeout has elapsed moves to half-open
    /// and hands out exactly one [`Admission::Probe`]. Every further attempt
    /// is rejected until that probe reports through [`on_success`] or
    /// [`on_failure`], or is handed back with [`release_probe`].
    ///
    /// [`on_success`]: Self::on_success
    /// [`on_failure`]: Self::on_failure
    /// [`release_probe`]: Self::release_probe
    pub fn attempt(&self) -> Admission {
        let mut inner = self.lock();
        let now = Instant::now();
        let timeout = self.settings.recovery_timeout;

        match inner.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure
                    .map_or(Duration::MAX, |at| now.saturating_duration_since(at));
                if elapsed > timeout {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    Self::issue_probe(&mut inner)
                } else {
                    Admission::Rejected {
                        retry_after: timeout.saturating_sub(elapsed),
                    }
                }
            }
            CircuitState::HalfOpen => match inner.probe {
                Some(_) => Admission::Rejected { retry_after: timeout },
                None => {
                    tracing::debug!(service = %self.label, "Re-issuing released half-open probe");
                    Self::issue_probe(&mut inner)
                }
            },
        }
    }

    fn issue_probe(inner: &mut Inner) -> Admission {
        let id = inner.next_probe_id;
        inner.next_probe_id = inner.next_probe_id.wrapping_add(1);
        inner.probe = Some(id);
        Admission::Probe { id }
    }

    /// Hand back a probe that will never report.
    ///
    /// No-op unless `id` is still the outstanding probe, so a late release
    /// cannot free a probe issued afterwards.
    pub fn release_probe(&self, id: u64) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen && inner.probe == Some(id) {
            inner.probe = None;
            tracing::debug!(service = %self.label, probe = id, "Half-open probe released without outcome");
        }
    }

    /// Record a successful operation.
    pub fn on_success(&self) {
        let mut inner = self.lock();
        inner.failure_count = 0;
        inner.probe = None;
        if inner.state != CircuitState::Closed {
            self.transition(&mut inner, CircuitState::Closed);
        }
    }

    /// Record a failed operation.
    pub fn on_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        inner.probe = None;

        match inner.state {
            CircuitState::Closed if inner.failure_count >= self.settings.failure_threshold => {
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::HalfOpen => {
                self.transition(&mut inner, CircuitState::Open);
            }
            _ => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure: inner.last_failure,
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;

        match to {
            CircuitState::Open => tracing::warn!(
                service = %self.label,
                from = %from,
                failure_count = inner.failure_count,
                "Circuit opened"
            ),
            _ => tracing::info!(service = %self.label, from = %from, to = %to, "Circuit state changed"),
        }
        metrics::record_circuit_state(&self.label, to);
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerSettings::default())
    }
}
