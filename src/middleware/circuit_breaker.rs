use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Externally visible breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests pass through
    Closed,
    /// Backend considered down; requests fail fast
    Open,
    /// Cool-down elapsed; trial requests decide whether to close again
    HalfOpen,
}

/// Thresholds for opening and closing the circuit
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: usize,
    /// Time spent open before trial requests are let through
    pub cool_down: Duration,
    /// Consecutive trial successes that close the circuit
    pub success_threshold: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cool_down: Duration::from_secs(60),
            success_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed { failures: usize },
    Open { since: Instant },
    HalfOpen { successes: usize },
}

/// Fail-fast guard around the translation backend.
///
/// Shared by clones; all clones observe the same state.
#[derive(Clone)]
pub struct CircuitBreaker {
    phase: Arc<Mutex<Phase>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::with_config(CircuitBreakerConfig::default())
    }

    pub fn with_config(config: CircuitBreakerConfig) -> Self {
        Self {
            phase: Arc::new(Mutex::new(Phase::Closed { failures: 0 })),
            config,
        }
    }

    /// Whether a request may be sent now. Moves Open -> HalfOpen once the
    /// cool-down has elapsed.
    pub fn allow_request(&self) -> bool {
        let mut phase = self.phase.lock();
        match *phase {
            Phase::Closed { .. } | Phase::HalfOpen { .. } => true,
            Phase::Open { since } if since.elapsed() >= self.config.cool_down => {
                *phase = Phase::HalfOpen { successes: 0 };
                true
            }
            Phase::Open { .. } => false,
        }
    }

    pub fn record_success(&self) {
        let mut phase = self.phase.lock();
        *phase = match *phase {
            Phase::HalfOpen { successes } if successes + 1 >= self.config.success_threshold => {
                info!("Translation backend recovered, closing circuit");
                Phase::Closed { failures: 0 }
            }
            Phase::HalfOpen { successes } => Phase::HalfOpen { successes: successes + 1 },
            Phase::Closed { .. } | Phase::Open { .. } => Phase::Closed { failures: 0 },
        };
    }

    pub fn record_failure(&self) {
        let mut phase = self.phase.lock();
        *phase = match *phase {
            Phase::Closed { failures } if failures + 1 >= self.config.failure_threshold => {
                warn!("{} consecutive translation failures, opening circuit", failures + 1);
                Phase::Open { since: Instant::now() }
            }
            Phase::Closed { failures } => Phase::Closed { failures: failures + 1 },
            Phase::HalfOpen { .. } | Phase::Open { .. } => Phase::Open { since: Instant::now() },
        };
    }

    pub fn state(&self) -> CircuitState {
        match *self.phase.lock() {
            Phase::Closed { .. } => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(cool_down: Duration) -> CircuitBreaker {
        CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 2,
            cool_down,
            success_threshold: 2,
        })
    }

    #[test]
    fn test_opens_after_consecutive_failures() {
        let breaker = breaker(Duration::from_secs(60));

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_success();
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_request());
    }

    #[test]
    fn test_half_open_recovery_and_relapse() {
        let breaker = breaker(Duration::from_millis(20));
        breaker.record_failure();
        breaker.record_failure();

        std::thread::sleep(Duration::from_millis(40));
        assert!(breaker.allow_request());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(40));
        assert!(breaker.allow_request());
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_clones_share_state() {
        let breaker = breaker(Duration::from_secs(60));
        let clone = breaker.clone();
        clone.record_failure();
        clone.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!clone.allow_request());

        breaker.record_success();
        assert_eq!(clone.state(), CircuitState::Closed);
    }
}
